//! Context module
//!
//! Bundles the database handle and the event sink into the one piece of
//! ambient state the public API threads through, rather than passing a
//! loose handful of parameters to every function.

use std::path::Path;
use std::sync::Arc;

use crate::aheader::Aheader;
use crate::events::{Event, EventEmitter, Events};
use crate::peerstate::{PeerState, ToSave, VerifiedStatus};
use crate::sql::{self, Sql};
use crate::warn;

/// Opaque degrade-event outcome of processing one message against a peer's
/// stored state, returned by [`Context::receive_autocrypt`] so the caller
/// can decide whether to surface a UI notification.
pub use crate::peerstate::DegradeEvent;

#[derive(Clone)]
pub struct Context {
    inner: Arc<InnerContext>,
}

struct InnerContext {
    sql: Sql,
    events: Events,
}

impl Context {
    /// Opens (creating if absent) the SQLite database at `db_path` and
    /// ensures its schema exists, in one step.
    pub fn new(db_path: impl AsRef<Path>) -> sql::Result<Self> {
        Ok(Context {
            inner: Arc::new(InnerContext {
                sql: Sql::open(db_path)?,
                events: Events::default(),
            }),
        })
    }

    /// An ephemeral context backed by an in-memory database; used by tests.
    pub fn new_in_memory() -> sql::Result<Self> {
        Ok(Context {
            inner: Arc::new(InnerContext {
                sql: Sql::open_in_memory()?,
                events: Events::default(),
            }),
        })
    }

    pub fn sql(&self) -> &Sql {
        &self.inner.sql
    }

    pub fn get_event_emitter(&self) -> EventEmitter {
        self.inner.events.get_emitter()
    }

    /// Used by the `info!`/`warn!`/`error!` macros.
    pub fn call_cb(&self, event: Event) {
        self.inner.events.emit(event);
    }

    /// Loads the stored peer state for `addr`, if any.
    pub fn load_peerstate(&self, addr: &str) -> sql::Result<Option<PeerState>> {
        self.inner.sql.load_by_addr(addr)
    }

    /// Loads the stored peer state matching `fingerprint`, if any.
    pub fn load_peerstate_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> sql::Result<Option<PeerState>> {
        self.inner.sql.load_by_fingerprint(fingerprint)
    }

    /// Processes a direct Autocrypt header from an incoming message: loads
    /// or creates the peer state, applies the header, persists the result,
    /// and logs any degrade events. Returns the updated peer state.
    pub fn receive_autocrypt_header(
        &self,
        header: &Aheader,
        message_time: i64,
    ) -> sql::Result<PeerState> {
        let existing = self.inner.sql.load_by_addr(&header.addr)?;
        let (mut peerstate, create) = match existing {
            Some(ps) => (ps, false),
            None => (PeerState::init_from_header(header, message_time), true),
        };
        if !create {
            peerstate.apply_header(header, message_time);
        }
        self.persist(&mut peerstate, create)?;
        Ok(peerstate)
    }

    /// Processes a gossip header found inside an encrypted message; same
    /// load-or-create shape as [`Context::receive_autocrypt_header`].
    pub fn receive_gossip_header(
        &self,
        gossip: &Aheader,
        message_time: i64,
    ) -> sql::Result<PeerState> {
        let existing = self.inner.sql.load_by_addr(&gossip.addr)?;
        let (mut peerstate, create) = match existing {
            Some(ps) => (ps, false),
            None => (PeerState::init_from_gossip(gossip, message_time), true),
        };
        if !create {
            peerstate.apply_gossip(gossip, message_time);
        }
        self.persist(&mut peerstate, create)?;
        Ok(peerstate)
    }

    /// Records that a message from `addr` arrived without an Autocrypt
    /// header, degrading the peer's encryption preference if it had
    /// previously been `mutual`. A no-op (returns `Ok(None)`) if there is
    /// no stored peer state to degrade.
    pub fn degrade_encryption(
        &self,
        addr: &str,
        message_time: i64,
    ) -> sql::Result<Option<PeerState>> {
        let Some(mut peerstate) = self.inner.sql.load_by_addr(addr)? else {
            return Ok(None);
        };
        peerstate.degrade_encryption(message_time);
        self.persist(&mut peerstate, false)?;
        Ok(Some(peerstate))
    }

    /// Records an out-of-band verification of `addr`'s current fingerprint.
    pub fn set_verified(
        &self,
        addr: &str,
        fingerprint: &str,
        level: VerifiedStatus,
    ) -> sql::Result<bool> {
        let Some(mut peerstate) = self.inner.sql.load_by_addr(addr)? else {
            return Ok(false);
        };
        if !peerstate.set_verified(fingerprint, level) {
            return Ok(false);
        }
        self.persist(&mut peerstate, false)?;
        Ok(true)
    }

    fn persist(&self, peerstate: &mut PeerState, create: bool) -> sql::Result<()> {
        if !peerstate.degrade_event.is_empty() {
            warn!(
                self,
                "peer {} degraded: {:?}", peerstate.addr, peerstate.degrade_event
            );
        }
        self.inner.sql.save(peerstate, create)?;
        peerstate.to_save = ToSave::empty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aheader::EncryptPreference;
    use crate::test_utils::{alice_public_key, TestContext};

    #[test]
    fn receive_then_load_roundtrips() {
        let ctx = Context::new_in_memory().unwrap();
        let header = Aheader::new(
            "a@x".to_string(),
            alice_public_key(),
            EncryptPreference::Mutual,
        );
        let ps = ctx.receive_autocrypt_header(&header, 1000).unwrap();
        assert_eq!(ps.addr, "a@x");

        let loaded = ctx.load_peerstate("a@x").unwrap().unwrap();
        assert_eq!(loaded.prefer_encrypt, EncryptPreference::Mutual);
    }

    #[test]
    fn degrade_without_prior_state_is_noop() {
        let ctx = Context::new_in_memory().unwrap();
        assert!(ctx.degrade_encryption("nobody@x", 1000).unwrap().is_none());
    }

    #[test]
    fn degrade_emits_warning_event() {
        let ctx = Context::new_in_memory().unwrap();
        let header = Aheader::new(
            "a@x".to_string(),
            alice_public_key(),
            EncryptPreference::Mutual,
        );
        ctx.receive_autocrypt_header(&header, 1000).unwrap();

        let emitter = ctx.get_event_emitter();
        ctx.degrade_encryption("a@x", 2000).unwrap();

        let events: Vec<_> = emitter.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Warning(msg) if msg.contains("degraded"))));
    }

    #[test]
    fn peerstate_survives_reopening_the_database() {
        let tctx = TestContext::new();
        let header = Aheader::new(
            "a@x".to_string(),
            alice_public_key(),
            EncryptPreference::Mutual,
        );
        tctx.receive_autocrypt_header(&header, 1000).unwrap();

        let reopened = tctx.reopen();
        let loaded = reopened.load_peerstate("a@x").unwrap().unwrap();
        assert_eq!(loaded.prefer_encrypt, EncryptPreference::Mutual);
        assert_eq!(loaded.last_seen_autocrypt, 1000);
    }
}
