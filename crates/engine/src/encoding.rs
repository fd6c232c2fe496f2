//! Text encoding detection for CSV files.
//!
//! Detection runs over a bounded prefix of the file:
//! BOM signatures first, then `chardetng`, then a zero-byte heuristic for
//! BOM-less UTF-16. When nothing matches the caller falls back to its own
//! candidate list, so detection itself never fails.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::DEFAULT_SNIFF_BUDGET;

/// A decode strategy for text files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8, tolerating (and stripping) a leading BOM.
    Utf8Sig,
    /// UTF-8 without BOM handling.
    Utf8,
    /// UTF-16 honouring a BOM, little endian when there is none.
    Utf16,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
    /// Any other `encoding_rs` encoding (legacy code pages, CJK, ...).
    Codec(&'static Encoding),
}

impl TextEncoding {
    /// Wraps an `encoding_rs` encoding, mapping the Unicode ones to their own variants.
    #[must_use]
    pub fn from_encoding(encoding: &'static Encoding) -> Self {
        if encoding == encoding_rs::UTF_8 {
            Self::Utf8
        } else if encoding == encoding_rs::UTF_16LE {
            Self::Utf16Le
        } else if encoding == encoding_rs::UTF_16BE {
            Self::Utf16Be
        } else {
            Self::Codec(encoding)
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8Sig => "utf-8-sig",
            Self::Utf8 => "utf-8",
            Self::Utf16 => "utf-16",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::Utf32Le => "utf-32le",
            Self::Utf32Be => "utf-32be",
            Self::Latin1 => "latin-1",
            Self::Codec(enc) => enc.name(),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Longest signatures first: the UTF-32 LE BOM starts with the UTF-16 LE one.
const BOMS: &[(&[u8], TextEncoding)] = &[
    (&[0x00, 0x00, 0xFE, 0xFF], TextEncoding::Utf32Be),
    (&[0xFF, 0xFE, 0x00, 0x00], TextEncoding::Utf32Le),
    (&[0xEF, 0xBB, 0xBF], TextEncoding::Utf8Sig),
    (&[0xFF, 0xFE], TextEncoding::Utf16Le),
    (&[0xFE, 0xFF], TextEncoding::Utf16Be),
];

/// Share of sampled code units that must carry a zero byte on one side.
const UTF16_ZERO_RATIO: f64 = 0.4;
/// Upper bound on zero bytes on the other side.
const UTF16_NOISE_RATIO: f64 = 0.05;

#[derive(Debug, Clone, Copy)]
pub struct EncodingSniffer {
    budget: usize,
}

impl Default for EncodingSniffer {
    fn default() -> Self {
        Self::new(DEFAULT_SNIFF_BUDGET)
    }
}

impl EncodingSniffer {
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self { budget: budget.max(4) }
    }

    /// Proposes an encoding for `bytes`, or `None` when no strategy is confident.
    #[must_use]
    pub fn detect(&self, bytes: &[u8]) -> Option<TextEncoding> {
        let sample = &bytes[..bytes.len().min(self.budget)];
        detect_prefix(sample, sample.len() == bytes.len())
    }

    /// Reads at most the sniff budget from `path` and runs the detection chain.
    ///
    /// I/O failures yield `None`; the caller's fallback chain deals with the file.
    pub fn detect_file(&self, path: &Path) -> Option<TextEncoding> {
        let mut prefix = Vec::with_capacity(self.budget.min(64 * 1024));
        let file = File::open(path).ok()?;
        // One extra byte tells whether the prefix is the whole file.
        let read = file
            .take(self.budget as u64 + 1)
            .read_to_end(&mut prefix)
            .ok()?;
        let complete = read <= self.budget;
        prefix.truncate(self.budget);
        detect_prefix(&prefix, complete)
    }
}

fn detect_prefix(bytes: &[u8], complete: bool) -> Option<TextEncoding> {
    detect_bom(bytes)
        .or_else(|| detect_statistical(bytes, complete))
        .or_else(|| detect_utf16_without_bom(bytes))
}

fn detect_bom(bytes: &[u8]) -> Option<TextEncoding> {
    BOMS.iter()
        .find(|(bom, _)| bytes.starts_with(bom))
        .map(|(_, encoding)| *encoding)
}

/// `chardetng` guess, accepted only when the detector vouches for it.
///
/// Samples with NUL bytes are left to the UTF-16 heuristic: no byte-oriented
/// encoding `chardetng` knows produces them in text.
fn detect_statistical(bytes: &[u8], complete: bool) -> Option<TextEncoding> {
    if bytes.contains(&0) {
        return None;
    }
    if bytes.is_ascii() {
        // Plain ASCII reads identically as UTF-8.
        return Some(TextEncoding::Utf8);
    }
    if is_utf8_prefix(bytes, complete) {
        return Some(TextEncoding::Utf8);
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, complete);
    let (encoding, confident) = detector.guess_assess(None, true);
    confident.then(|| TextEncoding::from_encoding(encoding))
}

/// Valid UTF-8, allowing a sequence cut off by the sniff budget.
fn is_utf8_prefix(bytes: &[u8], complete: bool) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(err) => !complete && err.error_len().is_none(),
    }
}

/// Zero-byte distribution check for UTF-16 text that lacks a BOM.
fn detect_utf16_without_bom(bytes: &[u8]) -> Option<TextEncoding> {
    let units = bytes.len() / 2;
    if units < 2 {
        return None;
    }
    let (mut even_zeros, mut odd_zeros) = (0usize, 0usize);
    for pair in bytes.chunks_exact(2) {
        if pair[0] == 0 {
            even_zeros += 1;
        }
        if pair[1] == 0 {
            odd_zeros += 1;
        }
    }
    let ratio = |n: usize| n as f64 / units as f64;
    if ratio(odd_zeros) >= UTF16_ZERO_RATIO && ratio(even_zeros) <= UTF16_NOISE_RATIO {
        Some(TextEncoding::Utf16Le)
    } else if ratio(even_zeros) >= UTF16_ZERO_RATIO && ratio(odd_zeros) <= UTF16_NOISE_RATIO {
        Some(TextEncoding::Utf16Be)
    } else {
        None
    }
}
