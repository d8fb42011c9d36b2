//! Ordered, case-insensitive header storage.
//!
//! Headers keep the casing and order they arrived with so that a relayed
//! message looks the same on the wire as the one that was received.

use crate::http::parser::ParseError;

/// Header list that preserves insertion order and allows repeated names.
///
/// Lookups compare names ASCII case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header, keeping any existing ones with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces the first header with this name and drops the rest.
    ///
    /// The original casing of the name is kept when the header already exists;
    /// otherwise the header is appended.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut replaced = false;
        self.entries.retain_mut(|(key, existing)| {
            if !key.eq_ignore_ascii_case(name) {
                return true;
            }
            if replaced {
                return false;
            }
            *existing = value.clone();
            replaced = true;
            true
        });

        if !replaced {
            self.entries.push((name.to_string(), value));
        }
    }

    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes every header named `name`. Returns true if any was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// True when the final transfer coding is `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.get_all("Transfer-Encoding")
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|coding| !coding.is_empty())
            .last()
            .is_some_and(|coding| coding.eq_ignore_ascii_case("chunked"))
    }

    /// Parses `Content-Length`, rejecting garbage and conflicting repeats.
    pub fn content_length(&self) -> Result<Option<u64>, ParseError> {
        let mut length = None;

        for value in self.get_all("Content-Length").flat_map(|v| v.split(',')) {
            let parsed = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::InvalidContentLength)?;

            match length {
                Some(existing) if existing != parsed => {
                    return Err(ParseError::InvalidContentLength);
                }
                _ => length = Some(parsed),
            }
        }

        Ok(length)
    }

    /// Appends the headers in wire format (`Name: value\r\n` each).
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        for (key, value) in &self.entries {
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
