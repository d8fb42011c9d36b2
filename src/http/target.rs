//! Request target decomposition.
//!
//! Splits the target of a request into the pieces the rest of the proxy
//! works with: the path (and its non-empty segments), and the query string
//! (and its decoded key/value pairs).

use url::Url;
use url::form_urlencoded;

/// Query keys and values as two parallel lists.
///
/// Keys are in order of first appearance. `keys[i]` belongs to `values[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

impl ParsedQuery {
    /// Decodes an `application/x-www-form-urlencoded` query string.
    ///
    /// A key that appears more than once keeps its first position; its values
    /// are joined with `,`.
    pub fn parse(query: &str) -> Self {
        let mut parsed = ParsedQuery::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match parsed.keys.iter().position(|k| *k == key) {
                Some(index) => {
                    let existing = &mut parsed.values[index];
                    existing.push(',');
                    existing.push_str(&value);
                }
                None => {
                    parsed.keys.push(key.into_owned());
                    parsed.values.push(value.into_owned());
                }
            }
        }

        parsed
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|index| self.values[index].as_str())
    }
}

/// A request target split into path and query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    raw: String,
    path: String,
    query: Option<String>,
}

impl RequestTarget {
    /// Splits a request target. Never fails.
    ///
    /// Accepts origin-form (`/path?query`) as well as absolute-form
    /// (`http://host/path?query`), which clients send to a configured proxy.
    /// Fragments are dropped.
    pub fn parse(raw: &str) -> Self {
        if let Some(absolute) = parse_absolute(raw) {
            return absolute;
        }

        let without_fragment = raw.split_once('#').map_or(raw, |(before, _)| before);
        let (path, query) = match without_fragment.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (without_fragment, None),
        };

        Self {
            raw: raw.to_string(),
            path: path.to_string(),
            query,
        }
    }

    /// The target exactly as it appeared in the request line.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Non-empty path segments, in order.
    ///
    /// `/a//b/` yields `["a", "b"]`. Segments are not percent-decoded.
    pub fn segments(&self) -> Vec<String> {
        path_segments(&self.path)
    }

    /// Decoded query pairs; empty when there is no query string.
    pub fn query_pairs(&self) -> ParsedQuery {
        self.query
            .as_deref()
            .map(ParsedQuery::parse)
            .unwrap_or_default()
    }

    /// Path plus `?query` when a query was present; `/` for an empty path.
    pub fn path_and_query(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        match &self.query {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        }
    }

    /// True when the target looks like a script resource.
    pub fn is_script(&self) -> bool {
        self.raw.contains(".js")
    }
}

/// Splits a path on `/` and drops empty segments.
pub fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_absolute(raw: &str) -> Option<RequestTarget> {
    let scheme_end = raw.find("://")?;
    let scheme = &raw[..scheme_end];
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return None;
    }

    let url = Url::parse(raw).ok()?;
    Some(RequestTarget {
        raw: raw.to_string(),
        path: url.path().to_string(),
        query: url.query().map(str::to_string),
    })
}
