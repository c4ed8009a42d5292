//! Unix socket channel to the btpd daemon.
//!
//! One [`Channel`] is opened per command invocation and every request of that
//! command travels over it in turn.

use crate::config::{socket_path, Config};
use crate::protocol::{
    framing, AddRequest, AttributeKey, IpcError, Message, Response, Targets, TorrentRef,
    TorrentResult,
};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("cannot open connection to btpd in {} ({reason})", dir.display())]
    Open { dir: PathBuf, reason: io::Error },
    #[error("error in communication with btpd ({0})")]
    Communication(io::Error),
    #[error("error in communication with btpd ({0})")]
    Protocol(String),
    #[error("command failed ({0})")]
    Command(IpcError),
}

impl ChannelError {
    /// Whether the error makes the channel unusable for the rest of the command.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ChannelError::Command(_))
    }
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        ChannelError::Communication(err)
    }
}

/// An open connection to the daemon.
pub struct Channel {
    stream: UnixStream,
    reply_timeout: Duration,
}

impl Channel {
    /// Connect to the daemon living in `dir`.
    pub async fn open(dir: &Path, config: &Config) -> Result<Self, ChannelError> {
        let path = socket_path(dir);
        let open_err = |reason| ChannelError::Open {
            dir: dir.to_path_buf(),
            reason,
        };

        let stream = tokio::time::timeout(config.connect_timeout(), UnixStream::connect(&path))
            .await
            .map_err(|_| {
                open_err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connection timed out",
                ))
            })?
            .map_err(open_err)?;

        info!("Connected to btpd at {}", path.display());
        Ok(Self {
            stream,
            reply_timeout: config.reply_timeout(),
        })
    }

    async fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        framing::write_message(&mut self.stream, message).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Response, ChannelError> {
        tokio::time::timeout(self.reply_timeout, framing::read_message(&mut self.stream))
            .await
            .map_err(|_| {
                ChannelError::Communication(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "reply timed out",
                ))
            })?
            .map_err(ChannelError::Communication)
    }

    /// Send a point operation and wait for its code.
    async fn request(&mut self, message: Message) -> Result<(), ChannelError> {
        debug!("Sending {:?}", message);
        self.send(&message).await?;
        match self.recv().await? {
            Response::Code { error: None } => Ok(()),
            Response::Code { error: Some(err) } => Err(ChannelError::Command(err)),
            other => Err(ChannelError::Protocol(format!("unexpected reply {:?}", other))),
        }
    }

    pub async fn add(&mut self, request: AddRequest) -> Result<(), ChannelError> {
        self.request(Message::Add(request)).await
    }

    pub async fn del(&mut self, torrent: TorrentRef) -> Result<(), ChannelError> {
        self.request(Message::Del { torrent }).await
    }

    pub async fn start(&mut self, torrent: TorrentRef) -> Result<(), ChannelError> {
        self.request(Message::Start { torrent }).await
    }

    pub async fn start_all(&mut self) -> Result<(), ChannelError> {
        self.request(Message::StartAll).await
    }

    pub async fn stop(&mut self, torrent: TorrentRef) -> Result<(), ChannelError> {
        self.request(Message::Stop { torrent }).await
    }

    pub async fn stop_all(&mut self) -> Result<(), ChannelError> {
        self.request(Message::StopAll).await
    }

    /// Set the global upload and download limits, in bytes per second.
    pub async fn rate(&mut self, up: u64, down: u64) -> Result<(), ChannelError> {
        self.request(Message::Rate { up, down }).await
    }

    /// Ask the daemon to shut down.
    pub async fn die(&mut self) -> Result<(), ChannelError> {
        self.request(Message::Die).await
    }

    /// Batch query `keys` for every target.
    ///
    /// Results come back in target order, one per target. Nothing is returned
    /// until the daemon has answered for every target, so a communication
    /// failure part way through never yields partial results.
    pub async fn tget(
        &mut self,
        targets: &Targets,
        keys: &[AttributeKey],
    ) -> Result<Vec<TorrentResult>, ChannelError> {
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(ChannelError::Protocol(format!("duplicate key {:?}", key)));
            }
        }

        self.send(&Message::Tget {
            targets: targets.clone(),
            keys: keys.to_vec(),
        })
        .await?;

        let expected = match targets {
            Targets::Torrents(list) => Some(list.len()),
            Targets::Filter(_) => None,
        };

        let mut results = Vec::new();
        loop {
            match self.recv().await? {
                Response::Torrent(result) => {
                    if result.index != results.len() {
                        return Err(ChannelError::Protocol(format!(
                            "result {} arrived at position {}",
                            result.index,
                            results.len()
                        )));
                    }
                    if expected.is_some_and(|n| result.index >= n) {
                        return Err(ChannelError::Protocol(format!(
                            "result {} for a request of {} torrents",
                            result.index,
                            expected.unwrap_or_default()
                        )));
                    }
                    if !result.is_well_formed(keys) {
                        return Err(ChannelError::Protocol(format!(
                            "malformed values for result {}",
                            result.index
                        )));
                    }
                    results.push(result);
                }
                Response::Done { error: None } => break,
                Response::Done { error: Some(err) } => return Err(ChannelError::Command(err)),
                other => {
                    return Err(ChannelError::Protocol(format!("unexpected reply {:?}", other)))
                }
            }
        }

        if let Some(n) = expected {
            if results.len() != n {
                return Err(ChannelError::Protocol(format!(
                    "got {} results for {} torrents",
                    results.len(),
                    n
                )));
            }
        }
        debug!("Batch query returned {} results", results.len());
        Ok(results)
    }
}
