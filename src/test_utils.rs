//! Utilities to help writing tests.
//!
//! This module is only compiled for test runs. It provides two fixture
//! keys, `alice` and `bob`, so the peer-state tests can exercise key
//! rotation and fingerprint comparisons without generating fresh key
//! material on every call.

use std::ops::Deref;
use std::sync::OnceLock;

use smallvec::smallvec;
use tempfile::TempDir;

use pgp::composed::{KeyType as PgpKeyType, SecretKeyParamsBuilder};
use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::types::{CompressionAlgorithm, SecretKeyTrait};

use crate::context::Context;
use crate::key::{Key, KeyType};

/// A [`Context`] backed by a database file inside a fresh temporary
/// directory, for tests that need to exercise on-disk persistence rather
/// than the in-memory shortcut.
///
/// The directory (and its `db.sqlite`) is removed when this value drops.
pub struct TestContext {
    ctx: Context,
    dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let ctx = Context::new(dir.path().join("db.sqlite")).expect("open context db");
        TestContext { ctx, dir }
    }

    /// Reopens a fresh [`Context`] pointed at the same on-disk database,
    /// simulating a process restart.
    pub fn reopen(&self) -> Context {
        Context::new(self.dir.path().join("db.sqlite")).expect("reopen context db")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

/// A real OpenPGP public key fixture (`<a@example.de>`), embedded as the
/// base64 body of an Autocrypt `keydata` attribute. Reused verbatim from the
/// upstream Autocrypt test corpus rather than generated, so this fixture
/// stays stable across runs.
const ALICE_RAWKEY: &str = "xsBNBFzG3j0BCAC6iNhT8zydvCXi8LI/gFnkadMbfmSE/rTJskRRra/utGbLyDta/yTrJgWL7O3y/g4HdDW/dN2z26Y6W13IMzx9gLInn1KQZChtqWAcr/ReUucXcymwcfg1mdkBGk3TSLeLihN6CJx8Wsv8ig+kgAzte4f5rqEEAJVQ9WZHuti7UiYs6oRzqTo06CRe9owVXxzdMf0VDQtf7ZFm9dpzKKbhH7Lu8880iiotQ9/yRCkDGp9fNThsrLdZiK6OIAcIBAqi2rI89aS1dAmnRbktQieCx5izzyYkR1KvVL3gTTllHOzfKVEC2asmtWu2e4se/+O4WMIS1eGrn7GeWVb0Vwc5ABEBAAHNETxhQEBiLmV4YW1wbGUuZGU+wsCJBBABCAAzAhkBBQJcxt5FAhsDBAsJCAcGFQgJCgsCAxYCARYhBI4xxYKBgH3ANh5cufaKrc9mtiMLAAoJEPaKrc9mtiML938H/18F+3Wf9/JaAy/8hCO1v4S2PVBhxaKCokaNFtkfaMRne2l087LscCFPiFNyb4mv6Z3YeK8Xpxlp2sI0ecvdiqLUOGfnxS6tQrj+83EjtIrZ/hXOk1h121QFWH9Zg2VNHtODXjAgdLDC0NWUrclR0ZOqEDQHeo0ibTILdokVfXFN25wakPmGaYJP2y729cb1ve7RzvIvwn+Dddfxo3ao72rBfLi7l4NQ4S0KsY4cw+/6l5bRCKYCP77wZtvCwUvfVVosLdT43agtSiBI49+ayqvZ8OCvSJa61i+v81brTiEy9GBod4eAp45Ibsuemkw+gon4ZOvUXHTjwFB+h63MrozOwE0EXMbePQEIAL/vauf1zK8JgCu3V+G+SOX0iWw5xUlCPX+ERpBbWfwu3uAqn4wYXD3JDE/fVAF668xiV4eTPtlSUd5h0mn+G7uXMMOtkb+20SoEt50f8zw8TrL9t+ZsV11GKZWJpCar5AhXWsn6EEi8I2hLL5vn55ZZmHuGgN4jjmkRl3ToKCLhaXwTBjCJem7N5EH7F75wErEITa55v4Lb4Nfca7vnvtYrI1OA446xa8gHra0SINelTD09/JM/Fw4sWVPBaRZmJK/Tnu79N23No9XBUubmFPv1pNexZsQclicnTpt/BEWhiun7d6lfGB63K1aoHRTR1pcrWvBuALuuz0gqar2zlI0AEQEAAcLAdgQYAQgAIAUCXMbeRQIbDBYhBI4xxYKBgH3ANh5cufaKrc9mtiMLAAoJEPaKrc9mtiMLKSEIAIyLCRO2OyZ0IYRvRPpMn4p7E+7Pfcz/0mSkOy+1hshgJnqivXurm8zwGrwdMqeV4eslKR9H1RUdWGUQJNbtwmmjrt5DHpIhYHl5t3FpCBaGbV20Omo00Q38lBl9MtrmZkZw+ktEk6X+0xCKssMF+2MADkSOIufbR5HrDVB89VZOHCO9DeXvCUUAw2hyJiL/LHmLzJ40zYoTmb+F//f0k0j+tRdbkefyRoCmwG7YGiT+2hnCdgcezswnzah5J3ZKlrg7jOGo1LxtbvNUzxNBbC6S/aNgwm6qxo7xegRhmEl5uZ16zwyj4qz+xkjGy25Of5mWfUDoNw7OT7sjUbHOOMc=";

/// Generates a fresh 2048-bit RSA OpenPGP keypair for `addr`, self-signed and
/// unencrypted. Mirrors the shape of the upstream `create_keypair` helper,
/// but we only ever need the public half for peer-state fixtures.
fn gen_key(addr: &str) -> Key {
    let key_params = SecretKeyParamsBuilder::default()
        .key_type(PgpKeyType::Rsa(2048))
        .can_certify(false)
        .can_sign(true)
        .primary_user_id(format!("<{addr}>"))
        .passphrase(None)
        .preferred_symmetric_algorithms(smallvec![SymmetricKeyAlgorithm::AES256])
        .preferred_hash_algorithms(smallvec![HashAlgorithm::SHA2_256])
        .preferred_compression_algorithms(smallvec![CompressionAlgorithm::ZLIB])
        .build()
        .expect("valid secret key params");

    let secret_key = key_params
        .generate(rand::thread_rng())
        .expect("key generation");
    let signed_secret_key = secret_key
        .sign(rand::thread_rng(), String::new)
        .expect("self-sign secret key");
    let public_key = signed_secret_key.public_key();
    let signed_public_key = public_key
        .sign(rand::thread_rng(), &signed_secret_key, String::new)
        .expect("self-sign public key");

    Key::from_public(&signed_public_key).expect("serialize generated public key")
}

/// A real, parseable public key for `a@example.de`. Cheap: decoded once from
/// an embedded fixture rather than generated.
pub fn alice_public_key() -> Key {
    let cleaned: String = ALICE_RAWKEY.split_whitespace().collect();
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, cleaned)
        .expect("fixture key decodes");
    Key::from_bytes(bytes, KeyType::Public)
}

/// A second, distinct public key for `bob@example.net`. Generated once per
/// test binary and cached, since RSA key generation is too slow to repeat
/// per test.
pub fn bob_public_key() -> Key {
    static BOB: OnceLock<Key> = OnceLock::new();
    BOB.get_or_init(|| gen_key("bob@example.net")).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_usable_and_distinct() {
        let a = alice_public_key();
        let b = bob_public_key();
        assert!(a.is_usable());
        assert!(b.is_usable());
        assert_ne!(a.fingerprint(), "");
        assert_ne!(b.fingerprint(), "");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
