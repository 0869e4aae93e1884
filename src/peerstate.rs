//! # [Autocrypt Peer State](https://autocrypt.org/level1.html#peer-state-management) module

use bitflags::bitflags;

use crate::aheader::{addr_cmp, Aheader, EncryptPreference};
use crate::key::Key;

bitflags! {
    /// Which persistence path [`crate::sql::Sql::save`] should take for a
    /// peer state the next time it is saved. An optimization of the save
    /// path: a correct implementation could instead diff against the
    /// on-disk row, but tracking dirtiness as the update happens is cheaper.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ToSave: u8 {
        const TIMESTAMPS = 0x01;
        const ALL = 0x02;
    }
}

bitflags! {
    /// Security-relevant regressions observed during the latest update.
    /// Both bits can be set by a single `apply_header` call (a preference
    /// downgrade and a key change can coincide), hence a bitset rather than
    /// a single optional enum.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DegradeEvent: u8 {
        /// Recoverable by a subsequent encrypted mail.
        const ENCRYPTION_PAUSED = 0x01;
        /// Recoverable by a new out-of-band verification.
        const FINGERPRINT_CHANGED = 0x02;
    }
}

/// Out-of-band verification level of a peer's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum VerifiedStatus {
    #[default]
    No = 0,
    OneWay = 1,
    Bidirectional = 2,
}

impl VerifiedStatus {
    pub fn from_db(v: i64) -> Self {
        match v {
            1 => VerifiedStatus::OneWay,
            2 => VerifiedStatus::Bidirectional,
            _ => VerifiedStatus::No,
        }
    }
}

/// Per-address record of observed Autocrypt data.
///
/// `to_save` and `degrade_event` are transient: they describe what happened
/// during the most recent mutation and are not part of the persisted row
/// (`to_save` drives which UPDATE the adapter runs; `degrade_event` is
/// drained by the caller after being acted upon).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerState {
    pub addr: String,
    pub last_seen: i64,
    pub last_seen_autocrypt: i64,
    pub prefer_encrypt: EncryptPreference,
    pub public_key: Option<Key>,
    pub gossip_timestamp: i64,
    pub gossip_key: Option<Key>,
    pub fingerprint: Option<String>,
    pub verified: VerifiedStatus,
    pub to_save: ToSave,
    pub degrade_event: DegradeEvent,
}

impl PeerState {
    pub fn new(addr: impl Into<String>) -> Self {
        PeerState {
            addr: addr.into(),
            last_seen: 0,
            last_seen_autocrypt: 0,
            prefer_encrypt: EncryptPreference::NoPreference,
            public_key: None,
            gossip_timestamp: 0,
            gossip_key: None,
            fingerprint: None,
            verified: VerifiedStatus::No,
            to_save: ToSave::empty(),
            degrade_event: DegradeEvent::empty(),
        }
    }

    /// Initializes a fresh peer state from a direct Autocrypt header.
    pub fn init_from_header(header: &Aheader, message_time: i64) -> Self {
        let mut res = Self::new(header.addr.clone());
        res.last_seen = message_time;
        res.last_seen_autocrypt = message_time;
        res.prefer_encrypt = header.prefer_encrypt;
        res.public_key = Some(header.public_key.clone());
        res.to_save = ToSave::ALL;
        res.recalc_fingerprint();
        res
    }

    /// Initializes a fresh peer state from a gossip header found inside an
    /// encrypted message. `prefer_encrypt` stays at its default and
    /// `last_seen_autocrypt` is left at zero, matching the asymmetry the
    /// original implementation exhibits between gossip and silent dropout.
    pub fn init_from_gossip(gossip: &Aheader, message_time: i64) -> Self {
        let mut res = Self::new(gossip.addr.clone());
        res.gossip_timestamp = message_time;
        res.gossip_key = Some(gossip.public_key.clone());
        res.to_save = ToSave::ALL;
        res.recalc_fingerprint();
        res
    }

    /// Returns the effective key: the direct key if usable, else the gossip
    /// key if usable, else nothing. Never merges the two.
    pub fn peek_key(&self) -> Option<&Key> {
        self.public_key
            .as_ref()
            .filter(|k| k.is_usable())
            .or_else(|| self.gossip_key.as_ref().filter(|k| k.is_usable()))
    }

    /// Recomputes `fingerprint` from [`PeerState::peek_key`]. Marks
    /// `to_save |= ALL` and clears `verified` on any change; raises
    /// `FINGERPRINT_CHANGED` only if a fingerprint existed before (a
    /// first-ever fingerprint is not a degrade event).
    pub fn recalc_fingerprint(&mut self) {
        let old = self.fingerprint.take();
        let new = self
            .peek_key()
            .map(|k| k.fingerprint())
            .filter(|fp| !fp.is_empty());

        let changed = match (&old, &new) {
            (None, None) => false,
            (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
            _ => true,
        };

        self.fingerprint = new;

        if changed {
            self.to_save |= ToSave::ALL;
            self.verified = VerifiedStatus::No;
            if old.is_some() {
                self.degrade_event |= DegradeEvent::FINGERPRINT_CHANGED;
            }
        }
    }

    /// Applies a direct Autocrypt header observed on an incoming message.
    /// Returns `false` (no-op) on any precondition violation or a stale
    /// timestamp; returns `true` if the header was accepted (which does not
    /// necessarily mean any field actually changed).
    pub fn apply_header(&mut self, header: &Aheader, message_time: i64) -> bool {
        if !addr_cmp(&self.addr, &header.addr) {
            return false;
        }
        if !header.public_key.is_usable() {
            return false;
        }
        if message_time <= self.last_seen_autocrypt {
            return false;
        }

        self.last_seen = message_time;
        self.last_seen_autocrypt = message_time;
        self.to_save |= ToSave::TIMESTAMPS;

        // `reset` is a purely local state and never arrives in a header; if
        // somehow observed it is ignored by construction (only Mutual and
        // NoPreference compare unequal to themselves below in a meaningful
        // way for Reset, since Reset never equals a freshly-parsed header).
        if matches!(
            header.prefer_encrypt,
            EncryptPreference::Mutual | EncryptPreference::NoPreference
        ) && header.prefer_encrypt != self.prefer_encrypt
        {
            if self.prefer_encrypt == EncryptPreference::Mutual {
                self.degrade_event |= DegradeEvent::ENCRYPTION_PAUSED;
            }
            self.prefer_encrypt = header.prefer_encrypt;
            self.to_save |= ToSave::ALL;
        }

        let key_differs = match &self.public_key {
            Some(existing) => !existing.equals(&header.public_key),
            None => true,
        };
        if key_differs {
            self.public_key = Some(header.public_key.clone());
            self.recalc_fingerprint();
            self.to_save |= ToSave::ALL;
        }

        true
    }

    /// Applies a gossip header found inside an encrypted multi-recipient
    /// message. Does not touch `prefer_encrypt` or `last_seen_autocrypt`.
    pub fn apply_gossip(&mut self, gossip: &Aheader, message_time: i64) -> bool {
        if !addr_cmp(&self.addr, &gossip.addr) {
            return false;
        }
        if !gossip.public_key.is_usable() {
            return false;
        }
        if message_time <= self.gossip_timestamp {
            return false;
        }

        self.gossip_timestamp = message_time;
        self.to_save |= ToSave::TIMESTAMPS;

        let key_differs = match &self.gossip_key {
            Some(existing) => !existing.equals(&gossip.public_key),
            None => true,
        };
        if key_differs {
            self.gossip_key = Some(gossip.public_key.clone());
            self.recalc_fingerprint();
            self.to_save |= ToSave::ALL;
        }

        true
    }

    /// Invoked when a message arrives without an Autocrypt header from a
    /// peer that previously provided one. Note that only `last_seen`, not
    /// `last_seen_autocrypt`, advances here.
    pub fn degrade_encryption(&mut self, message_time: i64) {
        if self.prefer_encrypt == EncryptPreference::Mutual {
            self.degrade_event |= DegradeEvent::ENCRYPTION_PAUSED;
        }
        self.prefer_encrypt = EncryptPreference::Reset;
        self.last_seen = message_time;
        self.to_save |= ToSave::ALL;
    }

    /// Records an out-of-band verification of `fp`. Succeeds only if the
    /// current fingerprint is non-empty and matches (case-insensitively).
    pub fn set_verified(&mut self, fp: &str, level: VerifiedStatus) -> bool {
        if level == VerifiedStatus::No {
            return false;
        }
        match &self.fingerprint {
            Some(current) if current.eq_ignore_ascii_case(fp) => {
                self.prefer_encrypt = EncryptPreference::Mutual;
                self.verified = level;
                self.to_save |= ToSave::ALL;
                true
            }
            _ => false,
        }
    }

    /// Renders an `Autocrypt-Gossip:` header value for this peer's effective
    /// key. `prefer-encrypt` is never included, per the Autocrypt gossip
    /// rule. Returns `None` if no usable key is available.
    pub fn render_gossip_header(&self) -> Option<String> {
        let key = self.peek_key()?.clone();
        let header = Aheader::new(self.addr.clone(), key, EncryptPreference::NoPreference);
        Some(header.to_string())
    }

    /// Renders a direct `Autocrypt:` header value, including
    /// `prefer-encrypt` when it is `mutual`. Used when composing an
    /// outbound header for the local identity's own key.
    pub fn render_header(&self) -> Option<String> {
        let key = self.peek_key()?.clone();
        let header = Aheader::new(self.addr.clone(), key, self.prefer_encrypt);
        Some(header.to_string())
    }
}
