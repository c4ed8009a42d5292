//! Turning command line tokens into torrent references.

use crate::metainfo::{Metainfo, MetainfoError};
use crate::protocol::TorrentRef;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("bad torrent '{token}' (number out of range)")]
    OutOfRange { token: String },
    #[error("bad torrent '{token}' ({reason})")]
    Metainfo { token: String, reason: MetainfoError },
}

/// Resolve one token.
///
/// A token made only of decimal digits is a torrent number and never touches
/// the filesystem. Anything else is a path to a metainfo file, referenced by
/// its info hash.
pub fn resolve(token: &str) -> Result<TorrentRef, ResolveError> {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        return token
            .parse::<u32>()
            .map(TorrentRef::Num)
            .map_err(|_| ResolveError::OutOfRange {
                token: token.to_string(),
            });
    }

    let metainfo = Metainfo::load(Path::new(token)).map_err(|reason| ResolveError::Metainfo {
        token: token.to_string(),
        reason,
    })?;
    debug!("Resolved '{}' to info hash {}", token, hex::encode(metainfo.info_hash()));
    Ok(TorrentRef::Hash(metainfo.info_hash()))
}

/// Resolve every token, stopping at the first failure.
pub fn resolve_all<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<TorrentRef>, ResolveError> {
    tokens.iter().map(|t| resolve(t.as_ref())).collect()
}
