//! Autocrypt level-1 peer-state engine.
//!
//! Tracks, per remote address, the Autocrypt key material and stated
//! encryption preference observed on inbound mail, detects security
//! regressions (encryption pause, fingerprint change), and persists the
//! result in a SQLite table compatible with the surrounding mailbox.

pub mod log;

pub mod aheader;
pub mod context;
pub mod events;
pub mod key;
pub mod param;
pub mod peerstate;
pub mod sql;

#[cfg(test)]
pub(crate) mod test_utils;
