//! IPC protocol definitions for talking to btpd.
//!
//! The protocol uses JSON over the daemon's Unix domain socket. Point
//! operations get a single `code` reply; a batch query (`tget`) gets one
//! `torrent` frame per target followed by a closing `done` frame.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Error codes reported by the daemon, either for a whole call, for one
/// torrent of a batch query, or for a single attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum IpcError {
    #[error("bad content directory")]
    BadContentDir,
    #[error("bad torrent")]
    BadTorrent,
    #[error("bad torrent entry")]
    BadTorrentEntry,
    #[error("bad tracker")]
    BadTracker,
    #[error("torrent is active")]
    TorrentActive,
    #[error("torrent isn't active")]
    TorrentNotActive,
    #[error("torrent already exists")]
    TorrentExists,
    #[error("torrent is inactive")]
    TorrentInactive,
    #[error("no such torrent")]
    NoSuchTorrent,
    #[error("no such key")]
    NoSuchKey,
}

/// A canonical reference to a torrent known to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentRef {
    /// Session-assigned torrent number.
    Num(u32),
    /// SHA-1 info hash of the torrent's metainfo.
    Hash([u8; 20]),
}

/// Daemon-side selection used when no explicit torrents are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentFilter {
    All,
    Active,
    Inactive,
}

/// The targets of a batch query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Targets {
    Torrents(Vec<TorrentRef>),
    Filter(TorrentFilter),
}

/// Run state of a torrent, as reported for [`AttributeKey::State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentState {
    Inactive,
    Starting,
    Stopping,
    Leeching,
    Seeding,
}

impl TorrentState {
    /// Single-character code used in list and stat output.
    pub fn code(self) -> char {
        match self {
            TorrentState::Inactive => 'I',
            TorrentState::Starting => '+',
            TorrentState::Stopping => '-',
            TorrentState::Leeching => 'L',
            TorrentState::Seeding => 'S',
        }
    }

    pub fn from_num(value: i64) -> Option<Self> {
        match value {
            0 => Some(TorrentState::Inactive),
            1 => Some(TorrentState::Starting),
            2 => Some(TorrentState::Stopping),
            3 => Some(TorrentState::Leeching),
            4 => Some(TorrentState::Seeding),
            _ => None,
        }
    }
}

/// How the value of an attribute is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Num,
    Str,
}

/// A queryable torrent attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKey {
    Num,
    State,
    Name,
    Dir,
    Label,
    ContentSize,
    ContentGot,
    PeerCount,
    PieceCount,
    PiecesSeen,
    PiecesGot,
    SessionUp,
    SessionDown,
    RateUp,
    RateDown,
    TotalUp,
    InfoHash,
    TrackersGood,
}

impl AttributeKey {
    pub fn kind(self) -> SlotKind {
        match self {
            AttributeKey::Name
            | AttributeKey::Dir
            | AttributeKey::Label
            | AttributeKey::InfoHash => SlotKind::Str,
            _ => SlotKind::Num,
        }
    }
}

/// One attribute value in a batch query reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultSlot {
    Err(IpcError),
    Num(i64),
    Str(Vec<u8>),
}

impl ResultSlot {
    fn matches(&self, kind: SlotKind) -> bool {
        match self {
            ResultSlot::Err(_) => true,
            ResultSlot::Num(_) => kind == SlotKind::Num,
            ResultSlot::Str(_) => kind == SlotKind::Str,
        }
    }
}

/// The reply for one target of a batch query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentResult {
    /// Position of the target in the request (or daemon order for filters).
    pub index: usize,
    /// Set when nothing could be read for this torrent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<IpcError>,
    /// Values in the same order as the requested keys.
    #[serde(default)]
    pub slots: Vec<ResultSlot>,
}

impl TorrentResult {
    /// Pair the slots with the keys they were requested for.
    pub fn values<'a>(&'a self, keys: &'a [AttributeKey]) -> Result<TorrentValues<'a>, IpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(TorrentValues {
                keys,
                slots: &self.slots,
            }),
        }
    }

    /// Whether the slots line up with `keys` in count and encoding.
    pub fn is_well_formed(&self, keys: &[AttributeKey]) -> bool {
        if self.error.is_some() {
            return true;
        }
        self.slots.len() == keys.len()
            && self
                .slots
                .iter()
                .zip(keys)
                .all(|(slot, key)| slot.matches(key.kind()))
    }
}

/// Keyed view over the slots of one successful torrent result.
#[derive(Debug, Clone, Copy)]
pub struct TorrentValues<'a> {
    keys: &'a [AttributeKey],
    slots: &'a [ResultSlot],
}

impl<'a> TorrentValues<'a> {
    fn slot(&self, key: AttributeKey) -> Result<&'a ResultSlot, IpcError> {
        self.keys
            .iter()
            .position(|k| *k == key)
            .and_then(|i| self.slots.get(i))
            .ok_or(IpcError::NoSuchKey)
    }

    pub fn num(&self, key: AttributeKey) -> Result<i64, IpcError> {
        match self.slot(key)? {
            ResultSlot::Num(n) => Ok(*n),
            ResultSlot::Err(err) => Err(*err),
            ResultSlot::Str(_) => Err(IpcError::NoSuchKey),
        }
    }

    pub fn bytes(&self, key: AttributeKey) -> Result<&'a [u8], IpcError> {
        match self.slot(key)? {
            ResultSlot::Str(s) => Ok(s),
            ResultSlot::Err(err) => Err(*err),
            ResultSlot::Num(_) => Err(IpcError::NoSuchKey),
        }
    }

    /// Raw string value, or the description of the error that replaced it.
    /// The daemon's bytes are kept as sent, they need not be UTF-8.
    pub fn bytes_or_error(&self, key: AttributeKey) -> Vec<u8> {
        match self.bytes(key) {
            Ok(bytes) => bytes.to_vec(),
            Err(err) => err.to_string().into_bytes(),
        }
    }
}

/// Add a torrent to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    /// Raw metainfo document.
    #[serde(with = "hex::serde")]
    pub metainfo: Vec<u8>,
    /// Absolute content directory.
    pub content_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Message type for IPC requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Add(AddRequest),
    Del { torrent: TorrentRef },
    Start { torrent: TorrentRef },
    StartAll,
    Stop { torrent: TorrentRef },
    StopAll,
    /// Global rate limits in bytes per second.
    Rate { up: u64, down: u64 },
    /// Shut the daemon down.
    Die,
    /// Batch query of `keys` for every target.
    Tget {
        targets: Targets,
        keys: Vec<AttributeKey>,
    },
}

/// Reply frames sent by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Result of a point operation.
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<IpcError>,
    },
    /// One target of a batch query.
    Torrent(TorrentResult),
    /// End of a batch query.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<IpcError>,
    },
}

#[cfg(test)]
impl Response {
    pub fn ok() -> Self {
        Response::Code { error: None }
    }

    pub fn error(err: IpcError) -> Self {
        Response::Code { error: Some(err) }
    }
}

/// Framing for messages: length-prefixed JSON.
/// Format: 4 bytes (big-endian u32) length + JSON payload
pub mod framing {
    use std::io;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Metainfo documents travel inside `add`, so frames are allowed to be
    /// larger than any reply.
    pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

    /// Write a length-prefixed message.
    pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
    where
        W: AsyncWriteExt + Unpin,
        T: serde::Serialize,
    {
        let json = serde_json::to_vec(message)?;
        if json.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("message too large: {} bytes", json.len()),
            ));
        }
        let len = json.len() as u32;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(&json).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read a length-prefixed message.
    pub async fn read_message<R, T>(reader: &mut R) -> io::Result<T>
    where
        R: AsyncReadExt + Unpin,
        T: serde::de::DeserializeOwned,
    {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("message too large: {} bytes", len),
            ));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        let message = serde_json::from_slice(&buf)?;
        Ok(message)
    }
}
