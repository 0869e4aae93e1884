//! Cryptographic key module

use std::io::Cursor;

use pgp::composed::Deserializable;
use pgp::types::PublicKeyTrait;

pub use pgp::composed::SignedPublicKey;

/// Error type for key handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Could not decode base64")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("rPGP error: {}", _0)]
    Pgp(#[from] pgp::errors::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The kind of key material held by a [`Key`].
///
/// Only `Public` keys ever travel over Autocrypt headers or gossip; `Private`
/// is kept around so the variant set mirrors what the on-disk keypairs table
/// can hold, even though the peer-state engine itself never stores one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Public,
    Private,
}

/// An immutable holder of a raw OpenPGP key blob.
///
/// The blob is kept as-is; parsing into an rPGP key happens lazily whenever
/// [`Key::fingerprint`] or [`Key::is_usable`] is called, so that a malformed
/// blob still round-trips through persistence instead of being rejected at
/// construction time.
#[derive(Debug, Clone)]
pub struct Key {
    kind: KeyType,
    bytes: Vec<u8>,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}
impl Eq for Key {}

impl Key {
    /// Wraps a raw key blob without attempting to parse it.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, kind: KeyType) -> Self {
        Key {
            kind,
            bytes: bytes.into(),
        }
    }

    /// Parses a key from an rPGP public key, keeping its canonical byte
    /// representation so later round-trips through `from_bytes` compare
    /// equal.
    pub fn from_public(key: &SignedPublicKey) -> Result<Self> {
        Ok(Key::from_bytes(
            pgp::ser::Serialize::to_bytes(key)?,
            KeyType::Public,
        ))
    }

    pub fn kind(&self) -> KeyType {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte-equality of the underlying blobs.
    pub fn equals(&self, other: &Key) -> bool {
        self == other
    }

    /// Non-empty blob that is short enough it could even conceivably be a key.
    pub fn is_usable(&self) -> bool {
        !self.bytes.is_empty()
    }

    fn parse_public(&self) -> Option<SignedPublicKey> {
        if self.bytes.is_empty() {
            return None;
        }
        SignedPublicKey::from_bytes(Cursor::new(&self.bytes)).ok()
    }

    /// Uppercase hex of the OpenPGP v4 fingerprint; empty string if the blob
    /// does not parse as a usable public key. The empty string is a
    /// deliberate sentinel (not an error) so malformed keys still persist.
    pub fn fingerprint(&self) -> String {
        match self.kind {
            KeyType::Public => self
                .parse_public()
                .map(|k| hex::encode_upper(k.fingerprint().as_bytes()))
                .unwrap_or_default(),
            KeyType::Private => String::new(),
        }
    }
}

/// Make a fingerprint human-readable: groups of four hex digits, a newline
/// after every five groups.
pub fn format_fingerprint(fingerprint: &str) -> String {
    let mut res = String::new();
    for (i, c) in fingerprint.chars().enumerate() {
        if i > 0 && i % 20 == 0 {
            res += "\n";
        } else if i > 0 && i % 4 == 0 {
            res += " ";
        }
        res.push(c);
    }
    res
}

/// Strips whitespace and formatting from a human-entered fingerprint,
/// returning the bare uppercase hex.
pub fn normalize_fingerprint(fp: &str) -> String {
    fp.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect()
}
