//! The `stat` command: totals for active torrents, optionally per torrent
//! and optionally repeated every few seconds.

use crate::client::Channel;
use crate::config::Config;
use crate::protocol::{
    AttributeKey, Targets, TorrentFilter, TorrentResult, TorrentState, TorrentValues,
};
use crate::render::{percent, rate, ratio, size};
use crate::resolve::resolve_all;
use anyhow::{anyhow, Result};
use clap::Args;
use std::io::{self, Write};
use std::ops::AddAssign;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Args)]
pub struct StatArgs {
    /// Display individual lines for each torrent
    #[arg(short = 'i')]
    pub individual: bool,

    /// Display the name of each torrent. Implies '-i'
    #[arg(short = 'n')]
    pub names: bool,

    /// Display stats every n seconds
    #[arg(short = 'w', value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub watch: Option<u64>,

    /// Only display stats for the given torrents
    #[arg(value_name = "TORRENT")]
    pub torrents: Vec<String>,
}

pub const STAT_KEYS: &[AttributeKey] = &[
    AttributeKey::State,
    AttributeKey::Num,
    AttributeKey::Name,
    AttributeKey::PeerCount,
    AttributeKey::TrackersGood,
    AttributeKey::PieceCount,
    AttributeKey::PiecesSeen,
    AttributeKey::SessionUp,
    AttributeKey::SessionDown,
    AttributeKey::TotalUp,
    AttributeKey::RateUp,
    AttributeKey::RateDown,
    AttributeKey::ContentGot,
    AttributeKey::ContentSize,
];

/// In aggregate mode the header is repeated every this many cycles.
const HEADER_EVERY: u32 = 20;

const HEADER: &str = "  HAVE   DLOAD      RTDWN   ULOAD       RTUP   RATIO CONN  AVAIL  TR";

/// Transfer figures of one torrent, or the sum over several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    pub content_got: i64,
    pub content_size: i64,
    pub downloaded: i64,
    pub uploaded: i64,
    pub rate_up: i64,
    pub rate_down: i64,
    pub total_up: i64,
    pub peers: i64,
    pub trackers_good: i64,
    pub pieces_seen: i64,
    pub torrent_pieces: i64,
    /// Number of torrents that make up the figures.
    pub torrents: u32,
}

impl Stat {
    fn from_values(values: &TorrentValues<'_>) -> Result<Self> {
        Ok(Self {
            content_got: values.num(AttributeKey::ContentGot)?,
            content_size: values.num(AttributeKey::ContentSize)?,
            downloaded: values.num(AttributeKey::SessionDown)?,
            uploaded: values.num(AttributeKey::SessionUp)?,
            rate_up: values.num(AttributeKey::RateUp)?,
            rate_down: values.num(AttributeKey::RateDown)?,
            total_up: values.num(AttributeKey::TotalUp)?,
            peers: values.num(AttributeKey::PeerCount)?,
            trackers_good: values.num(AttributeKey::TrackersGood)?,
            pieces_seen: values.num(AttributeKey::PiecesSeen)?,
            torrent_pieces: values.num(AttributeKey::PieceCount)?,
            torrents: 1,
        })
    }

    fn write_row<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "{}{}{}{}{}{}{:>4} {}{:>3}",
            percent(self.content_got, self.content_size),
            size(self.downloaded),
            rate(self.rate_down),
            size(self.uploaded),
            rate(self.rate_up),
            ratio(self.total_up, self.content_size),
            self.peers,
            percent(self.pieces_seen, self.torrent_pieces),
            self.trackers_good,
        )
    }
}

impl AddAssign for Stat {
    fn add_assign(&mut self, other: Self) {
        self.content_got += other.content_got;
        self.content_size += other.content_size;
        self.downloaded += other.downloaded;
        self.uploaded += other.uploaded;
        self.rate_up += other.rate_up;
        self.rate_down += other.rate_down;
        self.total_up += other.total_up;
        self.peers += other.peers;
        self.trackers_good += other.trackers_good;
        self.pieces_seen += other.pieces_seen;
        self.torrent_pieces += other.torrent_pieces;
        self.torrents += other.torrents;
    }
}

/// Number, state and figures of an active torrent; `None` when inactive.
fn active_torrent(values: &TorrentValues<'_>) -> Result<Option<(i64, TorrentState, Stat)>> {
    let state = values.num(AttributeKey::State)?;
    let state =
        TorrentState::from_num(state).ok_or_else(|| anyhow!("unrecognized torrent state"))?;
    if state == TorrentState::Inactive {
        return Ok(None);
    }
    let num = values.num(AttributeKey::Num)?;
    Ok(Some((num, state, Stat::from_values(values)?)))
}

/// Prints stat cycles. Keeps the header countdown between cycles.
#[derive(Debug)]
pub struct StatPrinter {
    individual: bool,
    names: bool,
    header_countdown: u32,
}

impl StatPrinter {
    pub fn new(individual: bool, names: bool) -> Self {
        Self {
            individual: individual || names,
            names,
            header_countdown: 1,
        }
    }

    /// Print one cycle of results of a [`STAT_KEYS`] query and return the
    /// totals over the active torrents.
    pub fn print_cycle<W: Write>(
        &mut self,
        results: &[TorrentResult],
        out: &mut W,
    ) -> io::Result<Stat> {
        self.header_countdown -= 1;
        if self.header_countdown == 0 {
            if self.individual {
                self.header_countdown = 1;
                write!(out, " NUM ST ")?;
            } else {
                self.header_countdown = HEADER_EVERY;
            }
            writeln!(out, "{}", HEADER)?;
        }

        let mut total = Stat::default();
        for result in results {
            let values = match result.values(STAT_KEYS) {
                Ok(values) => values,
                Err(err) => {
                    debug!("Skipping torrent at {}: {}", result.index, err);
                    continue;
                }
            };
            let (num, state, stat) = match active_torrent(&values) {
                Ok(Some(active)) => active,
                Ok(None) => continue,
                Err(err) => {
                    warn!("Skipping torrent at {}: {}", result.index, err);
                    continue;
                }
            };

            total += stat;
            if self.individual {
                if self.names {
                    out.write_all(&values.bytes_or_error(AttributeKey::Name))?;
                    writeln!(out)?;
                }
                write!(out, "{:>4} {}. ", num, state.code())?;
                stat.write_row(out)?;
            }
        }

        if self.names {
            writeln!(out, "-------")?;
        }
        if self.individual {
            write!(out, "        ")?;
        }
        total.write_row(out)?;
        Ok(total)
    }
}

pub async fn run(btpd_dir: &Path, config: &Config, args: StatArgs) -> Result<()> {
    let targets = if args.torrents.is_empty() {
        Targets::Filter(TorrentFilter::Active)
    } else {
        Targets::Torrents(resolve_all(&args.torrents)?)
    };

    let mut channel = Channel::open(btpd_dir, config).await?;
    let mut printer = StatPrinter::new(args.individual, args.names);
    let interval = args.watch.map(Duration::from_secs);

    loop {
        let results = channel.tget(&targets, STAT_KEYS).await?;
        {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            printer.print_cycle(&results, &mut out)?;
            out.flush()?;
        }

        match interval {
            Some(interval) => {
                debug!("Next stat cycle in {:?}", interval);
                tokio::time::sleep(interval).await;
            }
            None => return Ok(()),
        }
    }
}
