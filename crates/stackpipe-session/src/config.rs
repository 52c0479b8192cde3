use std::sync::Arc;
use std::time::Duration;

use stackpipe_frame::FrameConfig;

use crate::lifecycle::Lifecycle;

/// Controls transfer session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Frame limits applied to both directions.
    pub frame: FrameConfig,
    /// Kill the worker if the whole session takes longer than this.
    /// `None` waits indefinitely.
    pub deadline: Option<Duration>,
    /// Close the worker's stdin once the request is sent, so workers that
    /// read until EOF see the end of input.
    pub close_input_after_send: bool,
    /// Registry whose shutdown kills this session's worker. Default: the
    /// process-wide [`Lifecycle::global`].
    pub lifecycle: Option<Arc<Lifecycle>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            deadline: None,
            close_input_after_send: true,
            lifecycle: Some(Lifecycle::global()),
        }
    }
}
