//! Torrent metainfo loading.
//!
//! Only what the client needs: the raw document (sent to the daemon by
//! `add`), its info hash, the top-level name and the announce URL.

use serde::Deserialize;
use serde_bencode::value::Value;
use sha1::{Digest, Sha1};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MetainfoError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid bencode ({0})")]
    Decode(#[from] serde_bencode::Error),
    #[error("missing info dictionary")]
    MissingInfo,
}

#[derive(Deserialize)]
struct RawMetainfo {
    info: Value,
    #[serde(default)]
    announce: Option<String>,
}

/// A loaded torrent metainfo document.
#[derive(Debug, Clone)]
pub struct Metainfo {
    raw: Vec<u8>,
    info_hash: [u8; 20],
    name: Option<String>,
    announce: Option<String>,
    simple: bool,
}

impl Metainfo {
    /// Read and decode a metainfo file.
    pub fn load(path: &Path) -> Result<Self, MetainfoError> {
        let raw = std::fs::read(path)?;
        debug!("Read {} bytes of metainfo from {}", raw.len(), path.display());
        Self::from_bytes(raw)
    }

    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, MetainfoError> {
        let parsed: RawMetainfo = serde_bencode::from_bytes(&raw)?;
        let info = match &parsed.info {
            Value::Dict(dict) => dict,
            _ => return Err(MetainfoError::MissingInfo),
        };

        let info_bytes = serde_bencode::to_bytes(&parsed.info)?;
        let info_hash: [u8; 20] = Sha1::digest(&info_bytes).into();

        let name = match info.get(b"name".as_slice()) {
            Some(Value::Bytes(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        };
        let simple = !info.contains_key(b"files".as_slice());

        Ok(Self {
            raw,
            info_hash,
            name,
            announce: parsed.announce,
            simple,
        })
    }

    pub fn info_hash(&self) -> [u8; 20] {
        self.info_hash
    }

    /// Whether the torrent holds a single file rather than a directory tree.
    pub fn is_simple(&self) -> bool {
        self.simple
    }

    /// The `name` entry of the info dictionary.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn announce(&self) -> Option<&str> {
        self.announce.as_deref()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }
}
