use url::form_urlencoded;

use crate::error::HeaderError;

/// Ordered string-to-string mapping carried in a header frame.
///
/// Keys are unique; inserting an existing key replaces its value in place.
/// On the wire each key and value is form-encoded (UTF-8, space as `+`), so
/// the encoded text never contains a raw `&`, `=` or newline from user data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<(String, String)>,
}

impl Header {
    /// Create an empty header (the sentinel when sent on its own).
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode as `key=value` pairs joined by `&`.
    ///
    /// An empty header encodes to the empty string.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.entries.iter())
            .finish()
    }

    /// Decode `key=value` pairs joined by `&`.
    ///
    /// Each pair splits on its first `=`; a pair without `=` gets an empty
    /// value, and an empty segment (`a=1&&b=2`) is the pair `"" -> ""`.
    /// Later duplicates replace earlier ones. Only the empty text decodes to
    /// an empty header.
    pub fn decode(text: &str) -> Self {
        if text.is_empty() {
            return Self::new();
        }
        text.split('&')
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .collect()
    }

    /// Decode a raw frame payload, which must be UTF-8.
    pub fn from_payload(payload: &[u8]) -> Result<Self, HeaderError> {
        let text = std::str::from_utf8(payload).map_err(|_| HeaderError::InvalidUtf8)?;
        Ok(Self::decode(text))
    }
}

/// Form-decode one key or value: `+` is a space, `%XX` is a byte. Bytes that
/// are not UTF-8 become U+FFFD.
fn decode_component(text: &str) -> String {
    let spaced = text.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Header {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut header = Header::new();
        for (key, value) in iter {
            header.insert(key, value);
        }
        header
    }
}

impl IntoIterator for Header {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
