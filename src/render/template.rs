//! User supplied output templates for `list -f`.
//!
//! A template is literal text with `%` field codes and `\n` / `\t` escapes:
//!
//! | code | field                      | code | field                    |
//! |------|----------------------------|------|--------------------------|
//! | `%#` | torrent number             | `%d` | content directory        |
//! | `%^` | upload rate (B/s)          | `%g` | content bytes downloaded |
//! | `%A` | pieces seen                | `%h` | info hash (hex)          |
//! | `%D` | downloaded this session    | `%l` | label                    |
//! | `%H` | pieces have                | `%n` | name                     |
//! | `%P` | peer count                 | `%p` | percent done             |
//! | `%S` | content size               | `%r` | upload ratio             |
//! | `%T` | torrent piece count        | `%s` | content size (scaled)    |
//! | `%U` | uploaded this session      | `%t` | state character          |
//! | `%u` | total uploaded             | `%v` | download rate (B/s)      |
//! | `%%` | a literal `%`              |      |                          |
//!
//! Unknown codes and unknown escapes produce nothing. A lone `%` at the end
//! is printed as is; a lone `\` at the end is dropped.

use super::{percent, ratio, size};
use crate::commands::list::Item;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Num,
    RateUp,
    PiecesSeen,
    Downloaded,
    PiecesHave,
    Peers,
    ContentSize,
    Uploaded,
    TorrentPieces,
    Dir,
    ContentGot,
    Hash,
    Label,
    Name,
    Percent,
    Ratio,
    Size,
    State,
    TotalUp,
    RateDown,
}

impl Field {
    fn from_code(code: char) -> Option<Self> {
        let field = match code {
            '#' => Field::Num,
            '^' => Field::RateUp,
            'A' => Field::PiecesSeen,
            'D' => Field::Downloaded,
            'H' => Field::PiecesHave,
            'P' => Field::Peers,
            'S' => Field::ContentSize,
            'U' => Field::Uploaded,
            'T' => Field::TorrentPieces,
            'd' => Field::Dir,
            'g' => Field::ContentGot,
            'h' => Field::Hash,
            'l' => Field::Label,
            'n' => Field::Name,
            'p' => Field::Percent,
            'r' => Field::Ratio,
            's' => Field::Size,
            't' => Field::State,
            'u' => Field::TotalUp,
            'v' => Field::RateDown,
            _ => return None,
        };
        Some(field)
    }

    fn write<W: Write>(self, item: &Item, out: &mut W) -> io::Result<()> {
        let text = match self {
            Field::Dir => return out.write_all(&item.dir),
            Field::Label => return out.write_all(&item.label),
            Field::Name => return out.write_all(&item.name),
            Field::Num => item.num.to_string(),
            Field::RateUp => item.rate_up.to_string(),
            Field::PiecesSeen => item.pieces_seen.to_string(),
            Field::Downloaded => item.downloaded.to_string(),
            Field::PiecesHave => item.pieces_have.to_string(),
            Field::Peers => item.peers.to_string(),
            Field::ContentSize => item.content_size.to_string(),
            Field::Uploaded => item.uploaded.to_string(),
            Field::TorrentPieces => item.torrent_pieces.to_string(),
            Field::ContentGot => item.content_got.to_string(),
            Field::Hash => item.hash.clone(),
            Field::Percent => percent(item.content_got, item.content_size),
            Field::Ratio => ratio(item.total_up, item.content_size),
            Field::Size => size(item.content_size),
            Field::State => item.state.code().to_string(),
            Field::TotalUp => item.total_up.to_string(),
            Field::RateDown => item.rate_down.to_string(),
        };
        out.write_all(text.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed output template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(format: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = format.chars();

        while let Some(c) = chars.next() {
            match c {
                '%' => match chars.next() {
                    Some('%') => literal.push('%'),
                    Some(code) => {
                        if let Some(field) = Field::from_code(code) {
                            if !literal.is_empty() {
                                segments.push(Segment::Literal(std::mem::take(&mut literal)));
                            }
                            segments.push(Segment::Field(field));
                        }
                    }
                    None => {
                        literal.push('%');
                        break;
                    }
                },
                '\\' => match chars.next() {
                    Some('n') => literal.push('\n'),
                    Some('t') => literal.push('\t'),
                    Some(_) => {}
                    None => break,
                },
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Write one item through the template.
    pub fn render<W: Write>(&self, item: &Item, out: &mut W) -> io::Result<()> {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.write_all(text.as_bytes())?,
                Segment::Field(field) => field.write(item, out)?,
            }
        }
        Ok(())
    }
}
