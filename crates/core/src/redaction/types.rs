//! Redaction value types.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{Provider, UploadedObject};

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number.
    pub page_number: u32,
    /// Width in points.
    pub width_pt: f64,
    /// Height in points.
    pub height_pt: f64,
}

/// A caller-supplied redaction area, top-left origin.
///
/// Coordinates are dual-mode: a value in `[0, 1]` is a fraction of the page
/// dimension, any other value is absolute points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionRectangle {
    /// 1-based page number.
    pub page_number: u32,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Fill color as `#RRGGBB`, `RRGGBB` or `#RGB`.
    #[serde(default)]
    pub color: Option<String>,
}

impl RedactionRectangle {
    /// Create a rectangle with the call's default color.
    #[must_use]
    pub const fn new(page_number: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page_number,
            x,
            y,
            width,
            height,
            color: None,
        }
    }

    /// Set the fill color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Options for one apply call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOptions {
    /// Fill color for rectangles that do not name one.
    #[serde(default)]
    pub color: Option<String>,
}

/// Result of an apply call.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Redacted document.
    pub document: Bytes,
    /// Size of the original document.
    pub original_size: usize,
    /// Size of the redacted document.
    pub redacted_size: usize,
    /// Wall time spent decoding, painting and encoding.
    pub processing_time_ms: u64,
    /// Rectangles painted.
    pub redactions_applied: usize,
}

/// One invalid rectangle, or an invalid call option when `index` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionViolation {
    /// Position in the submitted list.
    pub index: Option<usize>,
    /// Page the rectangle named.
    pub page_number: Option<u32>,
    /// What is wrong.
    pub message: String,
}

impl fmt::Display for RedactionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "redaction {index}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Prepared, nothing applied yet.
    Created,
    /// At least one apply succeeded.
    Redacted,
    /// Redacted output persisted.
    Saved,
}

/// Returned by prepare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedSession {
    /// Session identifier.
    pub session_id: String,
    /// Number of pages.
    pub page_count: usize,
    /// Per-page dimensions.
    pub pages: Vec<PageInfo>,
}

/// Session metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetails {
    /// Session identifier.
    pub session_id: String,
    /// Source provider.
    pub provider: Provider,
    /// Source bucket.
    pub bucket: String,
    /// Source key.
    pub key: String,
    /// Lifecycle state.
    pub state: SessionState,
    /// Number of pages.
    pub page_count: usize,
    /// Per-page dimensions.
    pub pages: Vec<PageInfo>,
    /// Rectangles from the last successful apply.
    pub redactions: Vec<RedactionRectangle>,
    /// Size of the source document.
    pub original_size: usize,
    /// Size of the last redacted output.
    pub redacted_size: Option<usize>,
    /// When the session was prepared.
    pub created_at: DateTime<Utc>,
    /// When the last apply succeeded.
    pub redacted_at: Option<DateTime<Utc>>,
    /// Where the redacted output was saved.
    pub saved_to: Option<UploadedObject>,
}

/// Where to save redacted output. Unset fields default to the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveTarget {
    /// Destination provider.
    #[serde(default)]
    pub provider: Option<Provider>,
    /// Destination bucket.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Destination key.
    #[serde(default)]
    pub key: Option<String>,
}

/// Rendered page preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// Page rendered.
    pub page_number: u32,
    /// MIME type of `image`.
    pub content_type: &'static str,
    /// Image body.
    pub image: String,
}

/// Sensitive-data categories the detector looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// US social security number.
    Ssn,
    /// Payment card number.
    CreditCard,
    /// Calendar date.
    Date,
    /// IPv4 address.
    IpAddress,
}

impl DetectionKind {
    /// Every kind, in reporting order.
    pub const ALL: [Self; 6] = [
        Self::Email,
        Self::Phone,
        Self::Ssn,
        Self::CreditCard,
        Self::Date,
        Self::IpAddress,
    ];

    /// Snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ssn => "ssn",
            Self::CreditCard => "credit_card",
            Self::Date => "date",
            Self::IpAddress => "ip_address",
        }
    }
}

impl fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown detection type '{s}'"))
    }
}

/// A suggested redaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// What was found.
    #[serde(rename = "type")]
    pub kind: DetectionKind,
    /// Matched text.
    pub text: String,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f64,
    /// Page the text is on.
    pub page_number: u32,
    /// Estimated left edge, as a page fraction.
    pub x: f64,
    /// Estimated top edge, as a page fraction.
    pub y: f64,
    /// Estimated width, as a page fraction.
    pub width: f64,
    /// Estimated height, as a page fraction.
    pub height: f64,
}

impl Suggestion {
    /// The suggestion as a rectangle ready for apply.
    #[must_use]
    pub const fn to_rectangle(&self) -> RedactionRectangle {
        RedactionRectangle::new(self.page_number, self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_kind_parse() {
        assert_eq!("credit_card".parse::<DetectionKind>(), Ok(DetectionKind::CreditCard));
        assert!("passport".parse::<DetectionKind>().is_err());
    }

    #[test]
    fn test_rectangle_deserializes_without_color() {
        let rect: RedactionRectangle = serde_json::from_str(
            r#"{"page_number":1,"x":0.1,"y":0.2,"width":0.3,"height":0.05}"#,
        )
        .unwrap();
        assert_eq!(rect, RedactionRectangle::new(1, 0.1, 0.2, 0.3, 0.05));
    }

    #[test]
    fn test_suggestion_serializes_kind_as_type() {
        let s = Suggestion {
            kind: DetectionKind::Email,
            text: "a@b.io".into(),
            confidence: 0.9,
            page_number: 1,
            x: 0.1,
            y: 0.1,
            width: 0.1,
            height: 0.02,
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["type"], "email");
    }

    #[test]
    fn test_violation_display() {
        let v = RedactionViolation {
            index: Some(2),
            page_number: Some(9),
            message: "page 9 does not exist".into(),
        };
        assert_eq!(v.to_string(), "redaction 2: page 9 does not exist");
    }
}
