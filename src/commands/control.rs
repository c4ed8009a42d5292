//! Point operations: add, del, start, stop, rate and kill.

use super::Failures;
use crate::client::{Channel, ChannelError};
use crate::config::Config;
use crate::metainfo::Metainfo;
use crate::protocol::{AddRequest, TorrentRef};
use crate::rate::parse_rate;
use crate::resolve::resolve;
use anyhow::{bail, Result};
use clap::Args;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Use DIR as content directory for the torrent
    #[arg(short = 'd', value_name = "DIR")]
    pub dir: PathBuf,

    /// Set the name displayed for the torrent
    #[arg(short = 'n', value_name = "NAME")]
    pub name: Option<String>,

    /// Set the label, the announce URL by default
    #[arg(short = 'l', value_name = "LABEL")]
    pub label: Option<String>,

    /// Don't activate the torrent after adding it
    #[arg(short = 'N', long = "nostart")]
    pub no_start: bool,

    /// Append the torrent top directory (if any) to the content path
    #[arg(short = 'T', long = "topdir")]
    pub topdir: bool,

    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DelArgs {
    #[arg(value_name = "TORRENT", required = true)]
    pub torrents: Vec<String>,
}

/// Arguments shared by `start` and `stop`.
#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Apply to every torrent
    #[arg(short = 'a', conflicts_with = "torrents")]
    pub all: bool,

    #[arg(value_name = "TORRENT", required_unless_present = "all")]
    pub torrents: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RateArgs {
    /// Upload limit, a number with an optional unit (b, k, m, g). Kilobytes by default
    #[arg(value_parser = parse_rate)]
    pub up: u64,

    /// Download limit, same format as the upload limit
    #[arg(value_parser = parse_rate)]
    pub down: u64,
}

/// Per-torrent operations taking a torrent reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Del,
    Start,
    Stop,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Del => "del",
            Operation::Start => "start",
            Operation::Stop => "stop",
        }
    }
}

/// Where the content of `metainfo` goes, as an absolute path.
fn content_dir(dir: &Path, metainfo: &Metainfo, topdir: bool) -> io::Result<PathBuf> {
    let mut dir = dir.to_path_buf();
    if topdir && !metainfo.is_simple() {
        if let Some(name) = metainfo.name() {
            dir.push(name);
        }
    }
    std::path::absolute(dir)
}

/// Add every file and return how many made it. Channel failures abort.
async fn add_files(channel: &mut Channel, args: &AddArgs) -> Result<usize, ChannelError> {
    let mut loaded = 0;
    for file in &args.files {
        let metainfo = match Metainfo::load(file) {
            Ok(metainfo) => metainfo,
            Err(err) => {
                eprintln!("error loading '{}' ({}).", file.display(), err);
                continue;
            }
        };
        let content_dir = match content_dir(&args.dir, &metainfo, args.topdir) {
            Ok(dir) => dir,
            Err(err) => {
                eprintln!("cannot make '{}' absolute ({}).", args.dir.display(), err);
                continue;
            }
        };

        let hash = metainfo.info_hash();
        let label = args
            .label
            .clone()
            .or_else(|| metainfo.announce().map(str::to_string));
        debug!("Adding {} into {}", file.display(), content_dir.display());
        let request = AddRequest {
            metainfo: metainfo.into_bytes(),
            content_dir,
            name: args.name.clone(),
            label,
        };

        let mut result = channel.add(request).await;
        if result.is_ok() && !args.no_start {
            result = channel.start(TorrentRef::Hash(hash)).await;
        }
        match result {
            Ok(()) => {
                info!("Added {}", file.display());
                loaded += 1;
            }
            Err(ChannelError::Command(code)) => {
                eprintln!("command failed for '{}' ({}).", file.display(), code);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(loaded)
}

/// Apply `op` to each token in turn. Tokens that fail are reported and
/// skipped.
async fn apply(
    channel: &mut Channel,
    op: Operation,
    tokens: &[String],
) -> Result<Failures, ChannelError> {
    let mut failures = Failures::new(op.name());
    for token in tokens {
        let torrent = match resolve(token) {
            Ok(torrent) => torrent,
            Err(err) => {
                failures.skip(err);
                continue;
            }
        };
        let result = match op {
            Operation::Del => channel.del(torrent).await,
            Operation::Start => channel.start(torrent).await,
            Operation::Stop => channel.stop(torrent).await,
        };
        if let Err(err) = result {
            failures.report(token, err)?;
        }
    }
    Ok(failures)
}

pub async fn add(btpd_dir: &Path, config: &Config, args: AddArgs) -> Result<()> {
    let mut channel = Channel::open(btpd_dir, config).await?;
    let loaded = add_files(&mut channel, &args).await?;
    if loaded != args.files.len() {
        bail!("error loaded {} of {} files", loaded, args.files.len());
    }
    Ok(())
}

pub async fn del(btpd_dir: &Path, config: &Config, args: DelArgs) -> Result<()> {
    let mut channel = Channel::open(btpd_dir, config).await?;
    apply(&mut channel, Operation::Del, &args.torrents)
        .await?
        .finish(args.torrents.len())
}

pub async fn start(btpd_dir: &Path, config: &Config, args: ToggleArgs) -> Result<()> {
    let mut channel = Channel::open(btpd_dir, config).await?;
    if args.all {
        channel.start_all().await?;
        return Ok(());
    }
    apply(&mut channel, Operation::Start, &args.torrents)
        .await?
        .finish(args.torrents.len())
}

pub async fn stop(btpd_dir: &Path, config: &Config, args: ToggleArgs) -> Result<()> {
    let mut channel = Channel::open(btpd_dir, config).await?;
    if args.all {
        channel.stop_all().await?;
        return Ok(());
    }
    apply(&mut channel, Operation::Stop, &args.torrents)
        .await?
        .finish(args.torrents.len())
}

pub async fn rate(btpd_dir: &Path, config: &Config, args: RateArgs) -> Result<()> {
    let mut channel = Channel::open(btpd_dir, config).await?;
    debug!("Setting rates to {} up, {} down", args.up, args.down);
    channel.rate(args.up, args.down).await?;
    Ok(())
}

pub async fn kill(btpd_dir: &Path, config: &Config) -> Result<()> {
    let mut channel = Channel::open(btpd_dir, config).await?;
    channel.die().await?;
    info!("btpd is shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::socket::tests::fake_daemon;
    use crate::metainfo::tests::{MULTI, SIMPLE};
    use crate::protocol::{IpcError, Message, Response};
    use tempfile::TempDir;

    fn torrent_files(dir: &TempDir) -> (PathBuf, PathBuf) {
        let multi = dir.path().join("multi.torrent");
        let simple = dir.path().join("simple.torrent");
        std::fs::write(&multi, MULTI).unwrap();
        std::fs::write(&simple, SIMPLE).unwrap();
        (multi, simple)
    }

    fn add_args(files: Vec<PathBuf>) -> AddArgs {
        AddArgs {
            dir: PathBuf::from("/srv/dl"),
            name: None,
            label: None,
            no_start: false,
            topdir: false,
            files,
        }
    }

    fn hash_of(doc: &[u8]) -> [u8; 20] {
        Metainfo::from_bytes(doc.to_vec()).unwrap().info_hash()
    }

    #[tokio::test]
    async fn test_add_then_start_by_hash() {
        let files = tempfile::tempdir().unwrap();
        let (multi, _) = torrent_files(&files);
        let (dir, daemon) = fake_daemon(vec![
            Some(vec![Response::ok()]),
            Some(vec![Response::ok()]),
        ]);

        let mut channel = Channel::open(dir.path(), &Config::default()).await.unwrap();
        let loaded = add_files(&mut channel, &add_args(vec![multi])).await.unwrap();
        assert_eq!(loaded, 1);
        drop(channel);

        let received = daemon.await.unwrap();
        assert_eq!(
            received,
            vec![
                Message::Add(AddRequest {
                    metainfo: MULTI.to_vec(),
                    content_dir: PathBuf::from("/srv/dl"),
                    name: None,
                    label: Some("http://tracker/announce".to_string()),
                }),
                Message::Start {
                    torrent: TorrentRef::Hash(hash_of(MULTI)),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_add_topdir_and_nostart() {
        let files = tempfile::tempdir().unwrap();
        let (multi, simple) = torrent_files(&files);
        let (dir, daemon) = fake_daemon(vec![
            Some(vec![Response::ok()]),
            Some(vec![Response::ok()]),
        ]);

        let mut args = add_args(vec![multi, simple]);
        args.topdir = true;
        args.no_start = true;
        args.label = Some("mine".to_string());

        let mut channel = Channel::open(dir.path(), &Config::default()).await.unwrap();
        assert_eq!(add_files(&mut channel, &args).await.unwrap(), 2);
        drop(channel);

        let received = daemon.await.unwrap();
        let dirs: Vec<_> = received
            .iter()
            .map(|m| match m {
                Message::Add(request) => {
                    assert_eq!(request.label.as_deref(), Some("mine"));
                    request.content_dir.clone()
                }
                other => panic!("unexpected request {:?}", other),
            })
            .collect();
        // only multi-file torrents get a top directory
        assert_eq!(dirs, vec![PathBuf::from("/srv/dl/dir"), PathBuf::from("/srv/dl")]);
    }

    #[tokio::test]
    async fn test_add_counts_failed_files() {
        let files = tempfile::tempdir().unwrap();
        let (multi, simple) = torrent_files(&files);
        let missing = files.path().join("missing.torrent");
        let (dir, daemon) = fake_daemon(vec![
            Some(vec![Response::error(IpcError::TorrentExists)]),
            Some(vec![Response::ok()]),
            Some(vec![Response::ok()]),
        ]);

        let mut channel = Channel::open(dir.path(), &Config::default()).await.unwrap();
        let loaded = add_files(&mut channel, &add_args(vec![multi, missing, simple]))
            .await
            .unwrap();
        assert_eq!(loaded, 1);
        drop(channel);

        // the refused add is not followed by a start
        let received = daemon.await.unwrap();
        assert_eq!(received.len(), 3);
        assert!(matches!(received[1], Message::Add(_)));
        assert_eq!(
            received[2],
            Message::Start {
                torrent: TorrentRef::Hash(hash_of(SIMPLE)),
            }
        );
    }

    #[tokio::test]
    async fn test_apply_continues_past_failures() {
        let (dir, daemon) = fake_daemon(vec![
            Some(vec![Response::error(IpcError::NoSuchTorrent)]),
            Some(vec![Response::ok()]),
        ]);
        let tokens = vec![
            "4".to_string(),
            "/nonexistent/file.torrent".to_string(),
            "9".to_string(),
        ];

        let mut channel = Channel::open(dir.path(), &Config::default()).await.unwrap();
        let failures = apply(&mut channel, Operation::Del, &tokens).await.unwrap();
        assert_eq!(failures.failed(), 2);
        drop(channel);

        let received = daemon.await.unwrap();
        assert_eq!(
            received,
            vec![
                Message::Del {
                    torrent: TorrentRef::Num(4)
                },
                Message::Del {
                    torrent: TorrentRef::Num(9)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_apply_stops_on_channel_failure() {
        let (dir, daemon) = fake_daemon(vec![None]);
        let tokens = vec!["1".to_string(), "2".to_string()];

        let mut channel = Channel::open(dir.path(), &Config::default()).await.unwrap();
        let err = apply(&mut channel, Operation::Stop, &tokens).await.unwrap_err();
        assert!(err.is_fatal());

        let received = daemon.await.unwrap();
        assert_eq!(
            received,
            vec![Message::Stop {
                torrent: TorrentRef::Num(1)
            }]
        );
    }

    #[tokio::test]
    async fn test_start_all() {
        let (dir, daemon) = fake_daemon(vec![Some(vec![Response::ok()])]);
        let args = ToggleArgs {
            all: true,
            torrents: Vec::new(),
        };
        start(dir.path(), &Config::default(), args).await.unwrap();
        assert_eq!(daemon.await.unwrap(), vec![Message::StartAll]);
    }

    #[tokio::test]
    async fn test_rate_and_kill_errors_are_fatal() {
        let (dir, daemon) = fake_daemon(vec![Some(vec![Response::error(IpcError::NoSuchKey)])]);
        let args = RateArgs {
            up: 10 << 10,
            down: 1 << 20,
        };
        let err = rate(dir.path(), &Config::default(), args).await.unwrap_err();
        assert_eq!(err.to_string(), "command failed (no such key)");
        assert_eq!(
            daemon.await.unwrap(),
            vec![Message::Rate {
                up: 10 << 10,
                down: 1 << 20
            }]
        );

        let (dir, daemon) = fake_daemon(vec![Some(vec![Response::error(IpcError::BadTorrent)])]);
        assert!(kill(dir.path(), &Config::default()).await.is_err());
        assert_eq!(daemon.await.unwrap(), vec![Message::Die]);
    }
}
