//! Pattern-based sensitive-data suggestions.
//!
//! Text comes from the page's text layer, one entry per line. Rectangles
//! are fractional estimates from line and column position: the detector has
//! no glyph metrics, so callers are expected to review suggestions before
//! applying them.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{DetectionKind, Suggestion};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?(?:\(\d{3}\)\s?|\b\d{3}[-.\s])\d{3}[-.\s]\d{4}\b").unwrap()
});

static SSN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());

static CREDIT_CARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d(?:[ -]?\d){12,18}\b").unwrap());

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}[/-]\d{1,2}[/-](?:\d{4}|\d{2}))\b").unwrap()
});

static IP_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").unwrap());

/// Left and top margin, as a page fraction.
const MARGIN: f64 = 0.05;
/// Usable width and height, as a page fraction.
const USABLE: f64 = 0.9;
/// Tallest line estimate.
const MAX_LINE_HEIGHT: f64 = 0.025;
/// Lines shorter than this are assumed to share the page's column grid.
const MIN_COLUMNS: usize = 80;

impl DetectionKind {
    fn pattern(self) -> &'static Regex {
        match self {
            Self::Email => &EMAIL,
            Self::Phone => &PHONE,
            Self::Ssn => &SSN,
            Self::CreditCard => &CREDIT_CARD,
            Self::Date => &DATE,
            Self::IpAddress => &IP_ADDRESS,
        }
    }

    const fn confidence(self) -> f64 {
        match self {
            Self::Email => 0.95,
            Self::Ssn | Self::CreditCard => 0.9,
            Self::IpAddress => 0.85,
            Self::Phone => 0.8,
            Self::Date => 0.7,
        }
    }

    fn accepts(self, matched: &str) -> bool {
        match self {
            Self::CreditCard => luhn(matched),
            Self::IpAddress => matched.split('.').all(|octet| octet.parse::<u8>().is_ok()),
            _ => true,
        }
    }
}

/// Scan one page's text.
///
/// An empty `kinds` slice means every kind. Suggestions below `threshold`
/// are dropped; the rest come back in reading order.
pub fn scan(page_number: u32, text: &str, kinds: &[DetectionKind], threshold: f64) -> Vec<Suggestion> {
    let kinds: &[DetectionKind] = if kinds.is_empty() { &DetectionKind::ALL } else { kinds };
    let lines: Vec<&str> = text.lines().collect();
    let line_height = (USABLE / lines.len().max(1) as f64).min(MAX_LINE_HEIGHT);

    let mut found = Vec::new();
    for (row, line) in lines.iter().enumerate() {
        let columns = line.chars().count().max(MIN_COLUMNS) as f64;
        let column_width = USABLE / columns;
        let y = MARGIN + row as f64 * line_height;

        for &kind in kinds {
            if kind.confidence() < threshold {
                continue;
            }
            for m in kind.pattern().find_iter(line) {
                if !kind.accepts(m.as_str()) {
                    continue;
                }
                let column = line[..m.start()].chars().count() as f64;
                let span = m.as_str().chars().count() as f64;
                let x = (MARGIN + column * column_width).min(1.0);
                found.push(Suggestion {
                    kind,
                    text: m.as_str().to_string(),
                    confidence: kind.confidence(),
                    page_number,
                    x,
                    y: y.min(1.0),
                    width: (span * column_width).min(1.0 - x),
                    height: line_height.min(1.0 - y).max(0.0),
                });
            }
        }
    }
    found.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    found
}

/// Luhn checksum over the digits of `candidate`, ignoring separators.
fn luhn(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}
