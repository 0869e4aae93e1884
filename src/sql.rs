//! Persistence adapter for peer states.
//!
//! Wraps a single [`rusqlite::Connection`] behind a [`std::sync::Mutex`].
//! There is no connection pool: the engine is strictly single-writer (see
//! the concurrency notes on [`crate::context::Context`]), so pooling would
//! only add checkout overhead without buying any real parallelism.

use std::path::Path;
use std::sync::Mutex;

use num_traits::{FromPrimitive, ToPrimitive};

use crate::aheader::EncryptPreference;
use crate::key::{Key, KeyType};
use crate::peerstate::{PeerState, ToSave, VerifiedStatus};

/// Error type for the persistence adapter.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS acpeerstates (
    addr TEXT PRIMARY KEY COLLATE NOCASE,
    last_seen INTEGER NOT NULL DEFAULT 0,
    last_seen_autocrypt INTEGER NOT NULL DEFAULT 0,
    prefer_encrypted INTEGER NOT NULL DEFAULT 0,
    public_key BLOB,
    gossip_timestamp INTEGER NOT NULL DEFAULT 0,
    gossip_key BLOB,
    fingerprint TEXT,
    verified INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS acpeerstates_index1 ON acpeerstates (fingerprint COLLATE NOCASE);
"#;

/// Owns the single database connection used by the peer-state engine.
pub struct Sql {
    conn: Mutex<rusqlite::Connection>,
}

impl std::fmt::Debug for Sql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sql").finish_non_exhaustive()
    }
}

fn prefer_encrypt_to_i64(p: EncryptPreference) -> i64 {
    p.to_i64().unwrap_or(0)
}

fn prefer_encrypt_from_i64(v: i64) -> EncryptPreference {
    EncryptPreference::from_i64(v).unwrap_or_default()
}

fn row_to_peerstate(row: &rusqlite::Row) -> rusqlite::Result<PeerState> {
    let public_key: Option<Vec<u8>> = row.get("public_key")?;
    let gossip_key: Option<Vec<u8>> = row.get("gossip_key")?;
    Ok(PeerState {
        addr: row.get("addr")?,
        last_seen: row.get("last_seen")?,
        last_seen_autocrypt: row.get("last_seen_autocrypt")?,
        prefer_encrypt: prefer_encrypt_from_i64(row.get("prefer_encrypted")?),
        public_key: public_key.map(|b| Key::from_bytes(b, KeyType::Public)),
        gossip_timestamp: row.get("gossip_timestamp")?,
        gossip_key: gossip_key.map(|b| Key::from_bytes(b, KeyType::Public)),
        fingerprint: row.get::<_, Option<String>>("fingerprint")?.filter(|s| !s.is_empty()),
        verified: VerifiedStatus::from_db(row.get("verified")?),
        to_save: ToSave::empty(),
        degrade_event: crate::peerstate::DegradeEvent::empty(),
    })
}

const SELECT_COLUMNS: &str = "addr, last_seen, last_seen_autocrypt, prefer_encrypted, \
     public_key, gossip_timestamp, gossip_key, fingerprint, verified";

impl Sql {
    /// Opens (creating if absent) the database at `path` and ensures the
    /// schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Sql {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database; used by tests and ephemeral contexts.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Sql {
            conn: Mutex::new(conn),
        })
    }

    pub fn load_by_addr(&self, addr: &str) -> Result<Option<PeerState>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM acpeerstates WHERE addr = ?1 COLLATE NOCASE"
        ))?;
        let mut rows = stmt.query_map([addr], row_to_peerstate)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn load_by_fingerprint(&self, fingerprint: &str) -> Result<Option<PeerState>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM acpeerstates WHERE fingerprint = ?1 COLLATE NOCASE LIMIT 1"
        ))?;
        let mut rows = stmt.query_map([fingerprint], row_to_peerstate)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Saves `peerstate` according to its `to_save` bitset. If `create` is
    /// set, a bare `(addr)` row is inserted first; a primary-key collision
    /// on that insert is tolerated (the subsequent UPDATE still applies).
    pub fn save(&self, peerstate: &PeerState, create: bool) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        if create {
            let mut stmt = conn.prepare_cached("INSERT OR IGNORE INTO acpeerstates (addr) VALUES (?1)")?;
            stmt.execute(rusqlite::params![peerstate.addr])?;
        }

        if create || peerstate.to_save.contains(ToSave::ALL) {
            let mut stmt = conn.prepare_cached(
                "UPDATE acpeerstates SET last_seen=?1, last_seen_autocrypt=?2, \
                 prefer_encrypted=?3, public_key=?4, gossip_timestamp=?5, gossip_key=?6, \
                 fingerprint=?7, verified=?8 WHERE addr=?9",
            )?;
            stmt.execute(rusqlite::params![
                peerstate.last_seen,
                peerstate.last_seen_autocrypt,
                prefer_encrypt_to_i64(peerstate.prefer_encrypt),
                peerstate.public_key.as_ref().map(|k| k.as_bytes()),
                peerstate.gossip_timestamp,
                peerstate.gossip_key.as_ref().map(|k| k.as_bytes()),
                peerstate.fingerprint,
                peerstate.verified as i64,
                peerstate.addr,
            ])?;
            return Ok(true);
        }

        if peerstate.to_save.contains(ToSave::TIMESTAMPS) {
            let mut stmt = conn.prepare_cached(
                "UPDATE acpeerstates SET last_seen=?1, last_seen_autocrypt=?2, \
                 gossip_timestamp=?3 WHERE addr=?4",
            )?;
            stmt.execute(rusqlite::params![
                peerstate.last_seen,
                peerstate.last_seen_autocrypt,
                peerstate.gossip_timestamp,
                peerstate.addr,
            ])?;
            return Ok(true);
        }

        Ok(false)
    }
}
