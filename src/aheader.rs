//! # Autocrypt header module.
//!
//! Parse and render [Autocrypt headers](https://autocrypt.org/en/latest/level1.html#the-autocrypt-header).

use std::collections::BTreeMap;
use std::str::FromStr;
use std::{fmt, str};

use anyhow::{bail, Context as _, Error, Result};
use num_derive::{FromPrimitive, ToPrimitive};

use crate::key::{Key, KeyType};

/// Case-insensitive, ASCII-only address comparison.
///
/// Unicode normalization is deliberately out of scope; addresses in this
/// layer are treated as opaque ASCII identifiers.
pub fn addr_cmp(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Looks up the first header matching `name`, case-insensitively.
fn get_header_value<'a>(headers: &'a [mailparse::MailHeader<'a>], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.get_key_ref().eq_ignore_ascii_case(name))
        .map(|h| h.get_value())
}

/// Possible values for the `prefer-encrypt` attribute.
///
/// Discriminants match the persisted `prefer_encrypted` column values:
/// `nopreference=0`, `mutual=1`, `reset=20`.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum EncryptPreference {
    #[default]
    NoPreference = 0,
    Mutual = 1,
    /// A purely local state; a received header never sets this value, it is
    /// only ever produced by `degrade_encryption`.
    Reset = 20,
}

impl fmt::Display for EncryptPreference {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EncryptPreference::Mutual => write!(fmt, "mutual"),
            EncryptPreference::NoPreference => write!(fmt, "nopreference"),
            EncryptPreference::Reset => write!(fmt, "reset"),
        }
    }
}

impl str::FromStr for EncryptPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mutual" => Ok(EncryptPreference::Mutual),
            "nopreference" => Ok(EncryptPreference::NoPreference),
            _ => bail!("Cannot parse encryption preference {}", s),
        }
    }
}

/// A parsed `Autocrypt:` or `Autocrypt-Gossip:` header.
#[derive(Debug)]
pub struct Aheader {
    pub addr: String,
    pub public_key: Key,
    pub prefer_encrypt: EncryptPreference,
}

impl Aheader {
    pub fn new(addr: String, public_key: Key, prefer_encrypt: EncryptPreference) -> Self {
        Aheader {
            addr,
            public_key,
            prefer_encrypt,
        }
    }

    /// Looks for a direct `Autocrypt:` header addressed to `wanted_from`.
    ///
    /// Returns `Ok(None)` if there is no such header at all; returns an error
    /// if the header is present but malformed or addressed to someone else.
    pub fn from_headers(
        wanted_from: &str,
        headers: &[mailparse::MailHeader<'_>],
    ) -> Result<Option<Self>> {
        match get_header_value(headers, "Autocrypt") {
            Some(value) => {
                let header = Self::from_str(&value)?;
                if !addr_cmp(&header.addr, wanted_from) {
                    bail!(
                        "Autocrypt header address {:?} is not {:?}",
                        header.addr,
                        wanted_from
                    );
                }
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }

    /// Collects every `Autocrypt-Gossip:` header present on the message.
    ///
    /// Unlike the direct header, several gossip headers may legitimately be
    /// present (one per other recipient); malformed individual entries are
    /// skipped rather than aborting the whole parse.
    pub fn all_gossip_headers(headers: &[mailparse::MailHeader<'_>]) -> Vec<Self> {
        headers
            .iter()
            .filter(|h| h.get_key_ref().eq_ignore_ascii_case("Autocrypt-Gossip"))
            .filter_map(|h| Self::from_str(&h.get_value()).ok())
            .collect()
    }
}

impl fmt::Display for Aheader {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "addr={};", self.addr)?;
        if self.prefer_encrypt == EncryptPreference::Mutual {
            write!(fmt, " prefer-encrypt=mutual;")?;
        }

        // adds a whitespace every 78 characters, so that mail libraries
        // can wrap the line according to RFC 5322 before every whitespace
        let keydata = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            self.public_key.as_bytes(),
        )
        .chars()
        .enumerate()
        .fold(String::new(), |mut res, (i, c)| {
            if i % 78 == 78 - "keydata=".len() {
                res.push(' ')
            }
            res.push(c);
            res
        });
        write!(fmt, " keydata={}", keydata)
    }
}

impl str::FromStr for Aheader {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut attributes: BTreeMap<String, String> = s
            .split(';')
            .filter_map(|a| {
                let attribute: Vec<&str> = a.trim().splitn(2, '=').collect();
                match &attribute[..] {
                    [key, value] => Some((key.trim().to_string(), value.trim().to_string())),
                    _ => None,
                }
            })
            .collect();

        let addr = match attributes.remove("addr") {
            Some(addr) => addr,
            None => bail!("Autocrypt header has no addr"),
        };

        let raw_keydata = attributes
            .remove("keydata")
            .context("keydata attribute is not found")?;
        let cleaned: String = raw_keydata.split_whitespace().collect();
        let key_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, cleaned)
            .context("autocrypt keydata cannot be decoded")?;
        // A key that fails to parse as valid OpenPGP makes the whole header
        // invalid; once constructed, Key itself never re-validates.
        pgp::composed::Deserializable::from_bytes(std::io::Cursor::new(&key_bytes))
            .map(|_: pgp::composed::SignedPublicKey| ())
            .context("autocrypt key cannot be parsed")?;
        let public_key = Key::from_bytes(key_bytes, KeyType::Public);

        let prefer_encrypt = attributes
            .remove("prefer-encrypt")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();

        // Autocrypt level 1: unknown attributes starting with an underscore
        // can be safely ignored; any other unknown attribute invalidates the
        // header.
        if attributes.keys().any(|k| !k.starts_with('_')) {
            bail!("Unknown Autocrypt attribute found");
        }

        Ok(Aheader {
            addr,
            public_key,
            prefer_encrypt,
        })
    }
}
