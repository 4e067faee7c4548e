//! URL query helpers for the dashboard.

/// Splits `/path?query` into its path and decoded query pairs.
pub fn split_url(url: &str) -> (&str, Query) {
    match url.split_once('?') {
        Some((path, query)) => (path, Query::parse(query)),
        None => (url, Query::default()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self(pairs)
    }

    /// First value for `name`, treating an empty value as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Decodes `application/x-www-form-urlencoded` text. Malformed escapes are
/// kept literally and invalid UTF-8 is replaced.
pub fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

/// Percent-encodes everything except unreserved characters.
pub fn encode(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}
