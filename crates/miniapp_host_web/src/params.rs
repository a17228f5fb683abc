//! `application/x-www-form-urlencoded` parsing for `location.search` and `location.hash`.

use std::collections::BTreeMap;

/// Parsed query pairs; the first occurrence of a key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: BTreeMap<String, String>,
}

impl QueryParams {
    /// Parses `raw`, ignoring one leading `?` or `#`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw
            .strip_prefix('?')
            .or_else(|| raw.strip_prefix('#'))
            .unwrap_or(raw);
        let mut pairs = BTreeMap::new();
        for part in raw.split('&').filter(|part| !part.is_empty()) {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            pairs
                .entry(decode_component(key))
                .or_insert_with(|| decode_component(value));
        }
        Self { pairs }
    }

    /// Value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    /// Value for `key` when it is non-empty.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    /// Iterates pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns whether no pairs were parsed.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Search params first, then hash params.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationParams {
    /// Pairs from `location.search`.
    pub search: QueryParams,
    /// Pairs from `location.hash`.
    pub hash: QueryParams,
}

impl LocationParams {
    /// Parses both location parts.
    pub fn parse(search: &str, hash: &str) -> Self {
        Self {
            search: QueryParams::parse(search),
            hash: QueryParams::parse(hash),
        }
    }

    /// Non-empty value from search, falling back to hash.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.search
            .get_non_empty(key)
            .or_else(|| self.hash.get_non_empty(key))
    }

    /// Returns whether any of `keys` has a non-empty value.
    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.get(key).is_some())
    }
}

/// Percent-encodes `raw` the way `encodeURIComponent` does.
pub fn encode_component(raw: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(char::from(byte)),
            _ => {
                encoded.push('%');
                encoded.push(char::from(HEX[usize::from(byte >> 4)]));
                encoded.push(char::from(HEX[usize::from(byte & 0x0f)]));
            }
        }
    }
    encoded
}

fn decode_component(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => {
                decoded.push(b' ');
                index += 1;
            }
            b'%' if index + 2 < bytes.len() => {
                match (hex_value(bytes[index + 1]), hex_value(bytes[index + 2])) {
                    (Some(high), Some(low)) => {
                        decoded.push(high << 4 | low);
                        index += 3;
                    }
                    _ => {
                        decoded.push(b'%');
                        index += 1;
                    }
                }
            }
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_and_decodes_pairs() {
        let params = QueryParams::parse("?vk_language=ru&ref=a%20b+c&flag&vk_language=en&bad=%zz%");

        assert_eq!(params.get("vk_language"), Some("ru"));
        assert_eq!(params.get("ref"), Some("a b c"));
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get("bad"), Some("%zz%"));
        assert_eq!(params.get_non_empty("flag"), None);
    }

    #[test]
    fn location_params_prefer_search_then_hash() {
        let params = LocationParams::parse(
            "?tgWebAppVersion=",
            "#tgWebAppVersion=7.10&tgWebAppPlatform=ios",
        );

        assert_eq!(params.get("tgWebAppVersion"), Some("7.10"));
        assert!(params.has_any(&["missing", "tgWebAppPlatform"]));
        assert!(!params.has_any(&["vk_app_id"]));
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(
            encode_component("https://t.me/app?x=1&y=два"),
            "https%3A%2F%2Ft.me%2Fapp%3Fx%3D1%26y%3D%D0%B4%D0%B2%D0%B0"
        );
        assert_eq!(encode_component("it's (ok)!"), "it's%20(ok)!");
    }
}
