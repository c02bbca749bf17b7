//! Storage statistics over a stream of event records

use crate::event::EventRecord;
use crate::width::ElementWidth;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Counts for records stored at one element width
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WidthStats {
    pub inline: u64,
    pub external: u64,
    /// Total payload elements across these records
    pub elements: u64,
    /// Heap bytes owned by the external records
    pub heap_bytes: u64,
}

/// Tracks storage usage for a set of records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub records: u64,
    pub valid: u64,
    /// Keyed by width in bits
    pub by_width: BTreeMap<u8, WidthStats>,
}

impl StorageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: &EventRecord) {
        self.records += 1;
        if record.is_valid() {
            self.valid += 1;
        }

        let entry = self.by_width.entry(record.width().bits()).or_default();
        if record.is_inline() {
            entry.inline += 1;
        } else {
            entry.external += 1;
        }
        entry.elements += record.len() as u64;
        entry.heap_bytes += record.heap_bytes() as u64;
    }

    pub fn inline_records(&self) -> u64 {
        self.by_width.values().map(|w| w.inline).sum()
    }

    pub fn external_records(&self) -> u64 {
        self.by_width.values().map(|w| w.external).sum()
    }

    pub fn heap_bytes(&self) -> u64 {
        self.by_width.values().map(|w| w.heap_bytes).sum()
    }

    /// Fraction of records that needed no heap allocation (1.0 when empty)
    pub fn inline_ratio(&self) -> f64 {
        if self.records == 0 {
            1.0
        } else {
            self.inline_records() as f64 / self.records as f64
        }
    }

    /// Render the summary table
    pub fn format_summary(&self) -> String {
        let mut out = String::new();
        if self.records == 0 {
            out.push_str("No records.\n");
            return out;
        }

        let _ = writeln!(out, "width      inline   external   elements  heap bytes");
        let _ = writeln!(out, "------ ---------- ---------- ---------- -----------");
        for width in ElementWidth::ALL {
            if let Some(stats) = self.by_width.get(&width.bits()) {
                let _ = writeln!(
                    out,
                    "{:<6} {:>10} {:>10} {:>10} {:>11}",
                    width.to_string(),
                    stats.inline,
                    stats.external,
                    stats.elements,
                    stats.heap_bytes
                );
            }
        }
        let _ = writeln!(out, "------ ---------- ---------- ---------- -----------");
        let _ = writeln!(
            out,
            "{} records ({} valid), {:.1}% inline, {} heap bytes",
            self.records,
            self.valid,
            self.inline_ratio() * 100.0,
            self.heap_bytes()
        );
        out
    }

    pub fn print_summary(&self) {
        print!("{}", self.format_summary());
    }
}
