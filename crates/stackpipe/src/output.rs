use std::io::IsTerminal;
use std::path::PathBuf;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use stackpipe_stack::ImageStack;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One line of the `run` report.
#[derive(Debug, Serialize)]
pub struct ResultSummary {
    pub index: usize,
    pub title: String,
    pub bit_depth: u32,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub slices: u32,
    pub frames: u32,
    pub planes: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl ResultSummary {
    pub fn new(index: usize, stack: &ImageStack, file: Option<PathBuf>) -> Self {
        let dims = stack.dims();
        Self {
            index,
            title: stack.title().to_string(),
            bit_depth: stack.bit_depth().bits(),
            width: dims.width,
            height: dims.height,
            channels: dims.channels,
            slices: dims.slices,
            frames: dims.frames,
            planes: stack.plane_count(),
            extra: stack.header().extra.clone(),
            file,
        }
    }

    fn geometry(&self) -> String {
        format!(
            "{}x{} c={} z={} t={}",
            self.width, self.height, self.channels, self.slices, self.frames
        )
    }
}

pub fn print_results(results: &[ResultSummary], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for result in results {
                println!(
                    "{}",
                    serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            println!("{}", results_table(results));
        }
        OutputFormat::Pretty => {
            if results.is_empty() {
                println!("no results");
            }
            for result in results {
                println!(
                    "#{} {:?} {}-bit {} planes={}{}",
                    result.index,
                    result.title,
                    result.bit_depth,
                    result.geometry(),
                    result.planes,
                    result
                        .file
                        .as_ref()
                        .map(|path| format!(" -> {}", path.display()))
                        .unwrap_or_default()
                );
            }
        }
    }
}

fn results_table(results: &[ResultSummary]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "TITLE", "DEPTH", "GEOMETRY", "PLANES", "FILE"]);
    for result in results {
        table.add_row(vec![
            result.index.to_string(),
            result.title.clone(),
            result.bit_depth.to_string(),
            result.geometry(),
            result.planes.to_string(),
            result
                .file
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}
