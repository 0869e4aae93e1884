//! Key-value parameter bag used by surrounding layers (messages, jobs).
//!
//! Not part of the Autocrypt core proper; kept small and self-contained
//! because peer-state persistence shares its packed-string idiom with the
//! surrounding store.

use std::fmt;
use std::str;

/// An object for handling key=value parameter lists; the key is always a
/// single opaque byte.
///
/// Packed representation: newline-separated `K=V` lines. Unknown keys found
/// while parsing are silently dropped (they may come from a newer or older
/// version of a caller that used a key this build doesn't know about).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: std::collections::BTreeMap<u8, String>,
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.inner.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}={}", *key as char, value)?;
        }
        Ok(())
    }
}

impl Params {
    pub fn new() -> Self {
        Default::default()
    }

    /// Gets the value of `key`, with trailing whitespace trimmed.
    pub fn get(&self, key: u8) -> Option<&str> {
        self.inner.get(&key).map(|s| s.trim_end())
    }

    pub fn get_int(&self, key: u8) -> Option<i64> {
        self.get(key).and_then(|s| s.parse().ok())
    }

    pub fn get_float(&self, key: u8) -> Option<f64> {
        self.get(key).and_then(|s| s.parse().ok())
    }

    pub fn exists(&self, key: u8) -> bool {
        self.inner.contains_key(&key)
    }

    /// Sets `key` to `value`; any prior occurrence is replaced.
    pub fn set(&mut self, key: u8, value: impl Into<String>) -> &mut Self {
        self.inner.insert(key, value.into());
        self
    }

    pub fn set_int(&mut self, key: u8, value: i64) -> &mut Self {
        self.set(key, value.to_string())
    }

    pub fn set_float(&mut self, key: u8, value: f64) -> &mut Self {
        self.set(key, value.to_string())
    }

    /// Removes `key` if present. Equivalent to "setting to nothing".
    pub fn remove(&mut self, key: u8) -> &mut Self {
        self.inner.remove(&key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Empties the bag in place, discarding all previously set keys.
    pub fn empty(&mut self) {
        self.inner.clear();
    }

    /// Replaces the whole bag's contents with a packed `K=V\n...` string.
    pub fn set_from_packed(&mut self, packed: &str) {
        self.empty();
        if let Ok(parsed) = packed.parse::<Params>() {
            self.inner = parsed.inner;
        }
    }

    /// Replaces the whole bag's contents with an `&`-joined string, as found
    /// e.g. in a URL query component. Only the `&` → `\n` substitution is
    /// performed here; the caller is responsible for URL-decoding first.
    pub fn set_from_urlencoded(&mut self, urlencoded: &str) {
        let packed = urlencoded.replace('&', "\n");
        self.set_from_packed(&packed);
    }
}

impl str::FromStr for Params {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut inner = std::collections::BTreeMap::new();
        for line in s.lines() {
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next();
            if let (Some(k), Some(v)) = (key.as_bytes().first().copied(), value) {
                inner.insert(k, v.to_string());
            }
        }
        Ok(Params { inner })
    }
}
