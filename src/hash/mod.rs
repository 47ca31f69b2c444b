use std::fmt::Write;

use digest::DynDigest;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha512};
use tracing::warn;

/// A named one-way hash exposed to the authentication drivers.
///
/// The registry only needs name-based lookup: schemes receive a
/// `&'static HashAlgorithm` at construction and call [`HashAlgorithm::hex_digest`]
/// to derive verifier material (Digest A1/A2, hashed stored secrets).
pub struct HashAlgorithm {
    pub name: &'static str,
    pub block_size: usize,
    pub digest_size: usize,
    factory: fn() -> Box<dyn DynDigest>,
}

impl HashAlgorithm {
    pub fn digester(&self) -> Box<dyn DynDigest> {
        (self.factory)()
    }

    /// Digest the concatenation of `parts` and return the lowercase hex form.
    pub fn hex_digest(&self, parts: &[&[u8]]) -> String {
        let mut digester = self.digester();
        for part in parts {
            digester.update(part);
        }

        let digest = digester.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

fn md5_digester() -> Box<dyn DynDigest> {
    Box::new(Md5::new())
}

fn sha1_digester() -> Box<dyn DynDigest> {
    Box::new(Sha1::new())
}

fn sha224_digester() -> Box<dyn DynDigest> {
    Box::new(Sha224::new())
}

fn sha256_digester() -> Box<dyn DynDigest> {
    Box::new(Sha256::new())
}

fn sha512_digester() -> Box<dyn DynDigest> {
    Box::new(Sha512::new())
}

pub static REGISTRY: &[HashAlgorithm] = &[
    HashAlgorithm {
        name: "md5",
        block_size: 64,
        digest_size: 16,
        factory: md5_digester,
    },
    HashAlgorithm {
        name: "sha1",
        block_size: 64,
        digest_size: 20,
        factory: sha1_digester,
    },
    HashAlgorithm {
        name: "sha224",
        block_size: 64,
        digest_size: 28,
        factory: sha224_digester,
    },
    HashAlgorithm {
        name: "sha256",
        block_size: 64,
        digest_size: 32,
        factory: sha256_digester,
    },
    HashAlgorithm {
        name: "sha512",
        block_size: 128,
        digest_size: 64,
        factory: sha512_digester,
    },
];

pub fn lookup(name: &str) -> Option<&'static HashAlgorithm> {
    REGISTRY.iter().find(|algorithm| algorithm.name == name)
}

fn available_names() -> String {
    REGISTRY
        .iter()
        .map(|algorithm| algorithm.name)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Resolve the configured algorithm name.
///
/// An unknown name warns with the list of available algorithms and falls back
/// to md5; no configured name selects md5 as well.
pub fn select(configured: Option<&str>) -> Option<&'static HashAlgorithm> {
    if let Some(name) = configured {
        if let Some(algorithm) = lookup(name) {
            return Some(algorithm);
        }
        warn!("bad algorithm {name} ({})", available_names());
    }

    lookup("md5")
}
