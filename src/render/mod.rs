//! Formatting of torrent figures for list and stat output.
//!
//! Every helper returns a fixed-width column followed by a single space, so
//! columns can be concatenated directly into a row.

pub mod template;

pub use template::Template;

use std::io::{self, Write};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Values at or above this many units are shown in the next larger unit.
const UNIT_THRESHOLD: f64 = 999.995;

/// `part` as a percentage of `whole`, truncated to one decimal.
/// A zero `whole` shows as 0.0%.
pub fn percent(part: i64, whole: i64) -> String {
    let value = if whole > 0 {
        (1000.0 * part as f64 / whole as f64).floor() / 10.0
    } else {
        0.0
    };
    format!("{:5.1}% ", value)
}

/// A transfer rate in kB/s or MB/s.
pub fn rate(rate: i64) -> String {
    let rate = rate as f64;
    if rate >= UNIT_THRESHOLD * KIB {
        format!("{:6.2}MB/s ", rate / MIB)
    } else {
        format!("{:6.2}kB/s ", rate / KIB)
    }
}

/// A byte count in megabytes or gigabytes.
pub fn size(size: i64) -> String {
    let size = size as f64;
    if size >= UNIT_THRESHOLD * MIB {
        format!("{:6.2}G ", size / GIB)
    } else {
        format!("{:6.2}M ", size / MIB)
    }
}

/// `part / whole` with two decimals. A zero `whole` shows as 0.00.
pub fn ratio(part: i64, whole: i64) -> String {
    let value = if whole > 0 {
        part as f64 / whole as f64
    } else {
        0.0
    };
    format!("{:7.2} ", value)
}

/// Write `text` cut or padded with spaces to exactly `width` bytes.
pub fn write_column<W: Write>(out: &mut W, text: &[u8], width: usize) -> io::Result<()> {
    let text = &text[..text.len().min(width)];
    out.write_all(text)?;
    write!(out, "{:1$}", "", width - text.len())
}
