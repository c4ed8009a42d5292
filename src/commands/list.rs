//! The `list` command.

use crate::client::Channel;
use crate::config::Config;
use crate::protocol::{
    AttributeKey, Targets, TorrentFilter, TorrentResult, TorrentState, TorrentValues,
};
use crate::render::{percent, ratio, size, write_column, Template};
use crate::resolve::resolve_all;
use anyhow::{anyhow, Result};
use clap::Args;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// List active torrents
    #[arg(short = 'a', conflicts_with = "torrents")]
    pub active: bool,

    /// List inactive torrents
    #[arg(short = 'i', conflicts_with = "torrents")]
    pub inactive: bool,

    /// Output template, e.g. '%n\t%p\n'
    #[arg(short = 'f', long = "format", value_name = "FORMAT")]
    pub format: Option<String>,

    /// The torrents to list (number or torrent file)
    #[arg(value_name = "TORRENT")]
    pub torrents: Vec<String>,
}

impl ListArgs {
    fn filter(&self) -> TorrentFilter {
        match (self.active, self.inactive) {
            (true, false) => TorrentFilter::Active,
            (false, true) => TorrentFilter::Inactive,
            _ => TorrentFilter::All,
        }
    }
}

/// Width of the name column in table output.
const NAME_WIDTH: usize = 40;

pub const LIST_KEYS: &[AttributeKey] = &[
    AttributeKey::Num,
    AttributeKey::State,
    AttributeKey::Name,
    AttributeKey::TotalUp,
    AttributeKey::ContentSize,
    AttributeKey::ContentGot,
    AttributeKey::PeerCount,
    AttributeKey::PieceCount,
    AttributeKey::PiecesSeen,
    AttributeKey::PiecesGot,
    AttributeKey::SessionUp,
    AttributeKey::SessionDown,
    AttributeKey::RateUp,
    AttributeKey::RateDown,
    AttributeKey::InfoHash,
    AttributeKey::Dir,
    AttributeKey::Label,
];

/// One torrent as shown by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub num: u32,
    pub peers: u32,
    pub state: TorrentState,
    pub name: Vec<u8>,
    pub dir: Vec<u8>,
    pub label: Vec<u8>,
    pub hash: String,
    pub content_got: i64,
    pub content_size: i64,
    pub total_up: i64,
    pub downloaded: i64,
    pub uploaded: i64,
    pub rate_up: i64,
    pub rate_down: i64,
    pub torrent_pieces: u32,
    pub pieces_have: u32,
    pub pieces_seen: u32,
}

impl Item {
    /// Build an item from a result of a [`LIST_KEYS`] query.
    ///
    /// Name, directory and label fall back to the error text when the
    /// daemon could not supply them; every other field is required.
    pub fn from_values(values: &TorrentValues<'_>) -> Result<Self> {
        let state = values.num(AttributeKey::State)?;
        let state =
            TorrentState::from_num(state).ok_or_else(|| anyhow!("unrecognized torrent state"))?;

        Ok(Self {
            num: values.num(AttributeKey::Num)? as u32,
            peers: values.num(AttributeKey::PeerCount)? as u32,
            state,
            name: values.bytes_or_error(AttributeKey::Name),
            dir: values.bytes_or_error(AttributeKey::Dir),
            label: values.bytes_or_error(AttributeKey::Label),
            hash: hex::encode(values.bytes(AttributeKey::InfoHash)?),
            content_got: values.num(AttributeKey::ContentGot)?,
            content_size: values.num(AttributeKey::ContentSize)?,
            total_up: values.num(AttributeKey::TotalUp)?,
            downloaded: values.num(AttributeKey::SessionDown)?,
            uploaded: values.num(AttributeKey::SessionUp)?,
            rate_up: values.num(AttributeKey::RateUp)?,
            rate_down: values.num(AttributeKey::RateDown)?,
            torrent_pieces: values.num(AttributeKey::PieceCount)? as u32,
            pieces_have: values.num(AttributeKey::PiecesGot)? as u32,
            pieces_seen: values.num(AttributeKey::PiecesSeen)? as u32,
        })
    }

    fn write_row<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_column(out, &self.name, NAME_WIDTH)?;
        writeln!(
            out,
            " {:>4} {}. {}{}{}",
            self.num,
            self.state.code(),
            percent(self.content_got, self.content_size),
            size(self.content_size),
            ratio(self.total_up, self.content_size),
        )
    }
}

/// Items ordered by the bytes of their name. Items with equal names keep
/// their arrival order.
#[derive(Debug, Default)]
pub struct ItemList {
    items: Vec<Item>,
}

impl ItemList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: Item) {
        let pos = self
            .items
            .iter()
            .position(|p| item.name < p.name)
            .unwrap_or(self.items.len());
        self.items.insert(pos, item);
    }

    /// Collect the results of a [`LIST_KEYS`] query. `tokens` names the
    /// targets in error messages; filter queries pass no tokens.
    pub fn collect(results: &[TorrentResult], tokens: &[String]) -> Result<Self> {
        let mut list = Self::new();
        for result in results {
            let target = tokens
                .get(result.index)
                .cloned()
                .unwrap_or_else(|| format!("#{}", result.index));
            let item = result
                .values(LIST_KEYS)
                .map_err(anyhow::Error::from)
                .and_then(|values| Item::from_values(&values))
                .map_err(|e| anyhow!("list failed for '{}' ({})", target, e))?;
            list.insert(item);
        }
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Print the list, as a table or through `template`.
    pub fn print<W: Write>(&self, template: Option<&Template>, out: &mut W) -> io::Result<()> {
        match template {
            Some(template) => {
                for item in self.iter() {
                    template.render(item, out)?;
                }
            }
            None => {
                writeln!(out, "{:<40}  NUM ST   HAVE    SIZE   RATIO", "NAME")?;
                for item in self.iter() {
                    item.write_row(out)?;
                }
            }
        }
        Ok(())
    }
}

pub async fn run(btpd_dir: &Path, config: &Config, args: ListArgs) -> Result<()> {
    let targets = if args.torrents.is_empty() {
        Targets::Filter(args.filter())
    } else {
        Targets::Torrents(resolve_all(&args.torrents)?)
    };
    let format = args.format.as_deref().or(config.list_format.as_deref());
    let template = format.map(Template::parse);

    let mut channel = Channel::open(btpd_dir, config).await?;
    let results = channel.tget(&targets, LIST_KEYS).await?;
    let list = ItemList::collect(&results, &args.torrents)?;
    debug!("Listing {} torrents", list.len());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    list.print(template.as_ref(), &mut out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::{IpcError, ResultSlot};

    pub(crate) fn item(name: &str, num: u32) -> Item {
        Item {
            num,
            peers: 5,
            state: TorrentState::Leeching,
            name: name.as_bytes().to_vec(),
            dir: b"/srv/dl".to_vec(),
            label: b"linux".to_vec(),
            hash: "ab".repeat(20),
            content_got: 250,
            content_size: 1000,
            total_up: 1500,
            downloaded: 100,
            uploaded: 200,
            rate_up: 30,
            rate_down: 40,
            torrent_pieces: 64,
            pieces_have: 16,
            pieces_seen: 60,
        }
    }

    /// Slots for [`LIST_KEYS`], in key order.
    pub(crate) fn list_slots(num: i64, name: &str) -> Vec<ResultSlot> {
        vec![
            ResultSlot::Num(num),
            ResultSlot::Num(3),
            ResultSlot::Str(name.as_bytes().to_vec()),
            ResultSlot::Num(1500),
            ResultSlot::Num(1000),
            ResultSlot::Num(250),
            ResultSlot::Num(5),
            ResultSlot::Num(64),
            ResultSlot::Num(60),
            ResultSlot::Num(16),
            ResultSlot::Num(200),
            ResultSlot::Num(100),
            ResultSlot::Num(30),
            ResultSlot::Num(40),
            ResultSlot::Str(vec![0xab; 20]),
            ResultSlot::Str(b"/srv/dl".to_vec()),
            ResultSlot::Str(b"linux".to_vec()),
        ]
    }

    fn result(index: usize, slots: Vec<ResultSlot>) -> TorrentResult {
        TorrentResult {
            index,
            error: None,
            slots,
        }
    }

    fn names(list: &ItemList) -> Vec<(&str, u32)> {
        list.iter()
            .map(|i| (std::str::from_utf8(&i.name).unwrap(), i.num))
            .collect()
    }

    #[test]
    fn test_item_from_values() {
        let res = result(0, list_slots(3, "ubuntu.iso"));
        let values = res.values(LIST_KEYS).unwrap();
        assert_eq!(Item::from_values(&values).unwrap(), item("ubuntu.iso", 3));
    }

    #[test]
    fn test_sorted_by_name_bytes() {
        let mut list = ItemList::new();
        for (name, num) in [("b", 1), ("a", 2), ("B", 3), ("c", 4)] {
            list.insert(item(name, num));
        }
        assert_eq!(names(&list), vec![("B", 3), ("a", 2), ("b", 1), ("c", 4)]);
    }

    #[test]
    fn test_equal_names_keep_arrival_order() {
        let mut list = ItemList::new();
        for (name, num) in [("same", 1), ("other", 2), ("same", 3), ("same", 4)] {
            list.insert(item(name, num));
        }
        assert_eq!(
            names(&list),
            vec![("other", 2), ("same", 1), ("same", 3), ("same", 4)]
        );
    }

    #[test]
    fn test_missing_text_uses_error_description() {
        let mut slots = list_slots(1, "x");
        slots[2] = ResultSlot::Err(IpcError::BadTorrentEntry);
        slots[16] = ResultSlot::Err(IpcError::NoSuchKey);
        let list = ItemList::collect(&[result(0, slots)], &[]).unwrap();
        let item = list.iter().next().unwrap();
        assert_eq!(item.name, b"bad torrent entry");
        assert_eq!(item.label, b"no such key");
        assert_eq!(item.dir, b"/srv/dl");
    }

    #[test]
    fn test_missing_number_is_fatal() {
        let mut slots = list_slots(1, "x");
        slots[5] = ResultSlot::Err(IpcError::BadTorrentEntry);
        let err = ItemList::collect(&[result(0, slots)], &["debian.torrent".to_string()])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "list failed for 'debian.torrent' (bad torrent entry)"
        );
    }

    #[test]
    fn test_torrent_error_is_fatal() {
        let failed = TorrentResult {
            index: 1,
            error: Some(IpcError::NoSuchTorrent),
            slots: Vec::new(),
        };
        let err = ItemList::collect(&[result(0, list_slots(1, "x")), failed], &[]).unwrap_err();
        assert_eq!(err.to_string(), "list failed for '#1' (no such torrent)");
    }

    #[test]
    fn test_unknown_state_is_fatal() {
        let mut slots = list_slots(1, "x");
        slots[1] = ResultSlot::Num(42);
        assert!(ItemList::collect(&[result(0, slots)], &[]).is_err());
    }

    #[test]
    fn test_table_output() {
        let mut list = ItemList::new();
        list.insert(item("zeta", 12));
        list.insert(item("alpha", 3));
        let mut out = Vec::new();
        list.print(None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            format!("{:<40}  NUM ST   HAVE    SIZE   RATIO", "NAME")
        );
        assert_eq!(
            lines[1],
            format!("{:<40}    3 L.  25.0%   0.00M    1.50 ", "alpha")
        );
        assert!(lines[2].starts_with("zeta"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_table_truncates_long_names() {
        let mut list = ItemList::new();
        list.insert(item(&"n".repeat(60), 1));
        let mut out = Vec::new();
        list.print(None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with(&format!("{}    1 L.", "n".repeat(40))));
    }

    #[test]
    fn test_template_output_has_no_header() {
        let mut list = ItemList::new();
        list.insert(item("b", 2));
        list.insert(item("a", 1));
        let mut out = Vec::new();
        list.print(Some(&Template::parse("%#:%n\\n")), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1:a\n2:b\n");
    }

    #[test]
    fn test_names_sort_and_print_as_raw_bytes() {
        let mut first = list_slots(1, "");
        first[2] = ResultSlot::Str(b"\xee\x80\x80".to_vec());
        let mut second = list_slots(2, "");
        second[2] = ResultSlot::Str(b"\xe9t\xe9".to_vec());

        let list = ItemList::collect(&[result(0, first), result(1, second)], &[]).unwrap();
        let order: Vec<u32> = list.iter().map(|i| i.num).collect();
        assert_eq!(order, vec![2, 1]);

        let mut out = Vec::new();
        list.print(Some(&Template::parse("%n\\n")), &mut out).unwrap();
        assert_eq!(out, b"\xe9t\xe9\n\xee\x80\x80\n");

        let mut table = Vec::new();
        list.print(None, &mut table).unwrap();
        let row = &table[table.iter().position(|b| *b == b'\n').unwrap() + 1..];
        assert!(row.starts_with(b"\xe9t\xe9"));
        assert_eq!(row[3..40], [b' '; 37]);
        assert!(row[40..].starts_with(b"    2 L. "));
    }

    #[test]
    fn test_filter_selection() {
        let args = |active, inactive| ListArgs {
            active,
            inactive,
            format: None,
            torrents: Vec::new(),
        };
        assert_eq!(args(false, false).filter(), TorrentFilter::All);
        assert_eq!(args(true, true).filter(), TorrentFilter::All);
        assert_eq!(args(true, false).filter(), TorrentFilter::Active);
        assert_eq!(args(false, true).filter(), TorrentFilter::Inactive);
    }
}
