//! Coordinate resolution, validation and colors.

use std::fmt;

use super::types::{PageInfo, RedactionRectangle, RedactionViolation};

/// Tolerance for bounds checks, in points.
const EPSILON: f64 = 1e-6;

/// Resolve a dual-mode value: `[0, 1]` is a fraction of `dimension`,
/// anything else is absolute points.
#[must_use]
pub fn resolve_coordinate(value: f64, dimension: f64) -> f64 {
    if (0.0..=1.0).contains(&value) {
        value * dimension
    } else {
        value
    }
}

/// A validated rectangle in absolute points, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRect {
    /// Page number.
    pub page_number: u32,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Fill color.
    pub color: Rgb,
}

impl ResolvedRect {
    /// Bottom edge in PDF space for a page of the given height.
    #[must_use]
    pub fn pdf_bottom(&self, page_height: f64) -> f64 {
        page_height - self.y - self.height
    }
}

/// An sRGB fill color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Rgb {
    /// Black.
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };

    /// Parse `#RRGGBB`, `RRGGBB` or `#RGB`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (hex, short_allowed) = match trimmed.strip_prefix('#') {
            Some(rest) => (rest, true),
            None => (trimmed, false),
        };
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            3 if short_allowed => {
                let expand = |i: usize| channel(&hex[i..=i]).map(|v| v * 17);
                Some(Self {
                    r: expand(0)?,
                    g: expand(1)?,
                    b: expand(2)?,
                })
            }
            _ => None,
        }
    }

    /// Channels scaled to `[0, 1]` for PDF color operators.
    #[must_use]
    pub fn unit(&self) -> (f64, f64, f64) {
        (
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Validate every rectangle against the page list and resolve it.
///
/// All violations are collected; nothing is resolved if any exist.
pub fn resolve_all(
    rects: &[RedactionRectangle],
    pages: &[PageInfo],
    fallback: Rgb,
) -> Result<Vec<ResolvedRect>, Vec<RedactionViolation>> {
    let mut resolved = Vec::with_capacity(rects.len());
    let mut violations = Vec::new();

    for (index, rect) in rects.iter().enumerate() {
        let mut problems = Vec::new();
        let page = if rect.page_number < 1 {
            problems.push("page number must be at least 1".to_string());
            None
        } else {
            let page = pages.iter().find(|p| p.page_number == rect.page_number);
            if page.is_none() {
                problems.push(format!(
                    "page {} does not exist (document has {} page(s))",
                    rect.page_number,
                    pages.len()
                ));
            }
            page
        };

        for (name, value) in [
            ("x", rect.x),
            ("y", rect.y),
            ("width", rect.width),
            ("height", rect.height),
        ] {
            if !value.is_finite() {
                problems.push(format!("{name} must be a finite number"));
            } else if value < 0.0 {
                problems.push(format!("{name} must not be negative"));
            }
        }
        if rect.width.is_finite() && rect.width <= 0.0 {
            problems.push("width must be positive".to_string());
        }
        if rect.height.is_finite() && rect.height <= 0.0 {
            problems.push("height must be positive".to_string());
        }

        let color = match rect.color.as_deref() {
            Some(raw) => Rgb::parse(raw).unwrap_or_else(|| {
                problems.push(format!("color '{raw}' is not a hex color"));
                fallback
            }),
            None => fallback,
        };

        if let (Some(page), true) = (page, problems.is_empty()) {
            let candidate = ResolvedRect {
                page_number: rect.page_number,
                x: resolve_coordinate(rect.x, page.width_pt),
                y: resolve_coordinate(rect.y, page.height_pt),
                width: resolve_coordinate(rect.width, page.width_pt),
                height: resolve_coordinate(rect.height, page.height_pt),
                color,
            };
            check_bounds(&candidate, page, &mut problems);
            if problems.is_empty() {
                resolved.push(candidate);
            }
        }

        violations.extend(problems.into_iter().map(|message| RedactionViolation {
            index: Some(index),
            page_number: Some(rect.page_number),
            message,
        }));
    }

    if violations.is_empty() {
        Ok(resolved)
    } else {
        Err(violations)
    }
}

fn check_bounds(rect: &ResolvedRect, page: &PageInfo, problems: &mut Vec<String>) {
    if rect.x > page.width_pt + EPSILON {
        problems.push(format!(
            "x {:.2} lies outside the page width {:.2}",
            rect.x, page.width_pt
        ));
    } else if rect.x + rect.width > page.width_pt + EPSILON {
        problems.push(format!(
            "x + width {:.2} exceeds the page width {:.2}",
            rect.x + rect.width,
            page.width_pt
        ));
    }
    if rect.y > page.height_pt + EPSILON {
        problems.push(format!(
            "y {:.2} lies outside the page height {:.2}",
            rect.y, page.height_pt
        ));
    } else if rect.y + rect.height > page.height_pt + EPSILON {
        problems.push(format!(
            "y + height {:.2} exceeds the page height {:.2}",
            rect.y + rect.height,
            page.height_pt
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn letter() -> Vec<PageInfo> {
        vec![
            PageInfo {
                page_number: 1,
                width_pt: 600.0,
                height_pt: 800.0,
            },
            PageInfo {
                page_number: 2,
                width_pt: 600.0,
                height_pt: 800.0,
            },
        ]
    }

    #[test]
    fn test_fractional_and_absolute_resolve_alike() {
        let pages = letter();
        let fractional =
            resolve_all(&[RedactionRectangle::new(1, 0.5, 0.0, 0.25, 0.1)], &pages, Rgb::BLACK)
                .unwrap();
        let absolute = resolve_all(
            &[RedactionRectangle::new(1, 300.0, 0.0, 150.0, 80.0)],
            &pages,
            Rgb::BLACK,
        )
        .unwrap();
        assert_eq!(fractional[0].x, 300.0);
        assert_eq!(fractional[0].width, 150.0);
        assert_eq!(fractional, absolute);
    }

    #[test]
    fn test_every_invalid_rectangle_is_reported() {
        let violations = resolve_all(
            &[
                RedactionRectangle::new(1, 0.1, 0.1, 0.1, 0.1),
                RedactionRectangle::new(7, 0.1, 0.1, 0.1, 0.1),
                RedactionRectangle::new(1, 500.0, 10.0, 200.0, 10.0),
            ],
            &letter(),
            Rgb::BLACK,
        )
        .unwrap_err();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].index, Some(1));
        assert_eq!(violations[1].index, Some(2));
    }

    #[rstest]
    #[case(RedactionRectangle::new(0, 0.1, 0.1, 0.1, 0.1), "at least 1")]
    #[case(RedactionRectangle::new(1, -1.0, 0.1, 0.1, 0.1), "x must not be negative")]
    #[case(RedactionRectangle::new(1, 0.1, f64::NAN, 0.1, 0.1), "y must be a finite")]
    #[case(RedactionRectangle::new(1, 0.1, 0.1, 0.0, 0.1), "width must be positive")]
    #[case(RedactionRectangle::new(1, 0.1, 0.1, 0.1, 0.0), "height must be positive")]
    #[case(RedactionRectangle::new(1, 700.0, 0.1, 5.0, 0.1), "outside the page width")]
    #[case(RedactionRectangle::new(1, 0.1, 790.0, 0.1, 20.0), "exceeds the page height")]
    #[case(RedactionRectangle::new(1, 0.1, 0.1, 0.1, 0.1).with_color("blue"), "not a hex color")]
    fn test_single_violation(#[case] rect: RedactionRectangle, #[case] expected: &str) {
        let violations = resolve_all(&[rect], &letter(), Rgb::BLACK).unwrap_err();
        assert!(
            violations.iter().any(|v| v.message.contains(expected)),
            "{violations:?}"
        );
    }

    #[test]
    fn test_full_page_rectangle_is_valid() {
        let resolved =
            resolve_all(&[RedactionRectangle::new(2, 0.0, 0.0, 1.0, 1.0)], &letter(), Rgb::BLACK)
                .unwrap();
        assert_eq!(resolved[0].width, 600.0);
        assert_eq!(resolved[0].height, 800.0);
        assert_eq!(resolved[0].pdf_bottom(800.0), 0.0);
    }

    #[test]
    fn test_y_flip() {
        let rect = ResolvedRect {
            page_number: 1,
            x: 0.0,
            y: 100.0,
            width: 10.0,
            height: 50.0,
            color: Rgb::BLACK,
        };
        assert_eq!(rect.pdf_bottom(800.0), 650.0);
    }

    #[rstest]
    #[case("#ff0000", Some(Rgb { r: 255, g: 0, b: 0 }))]
    #[case("00FF7f", Some(Rgb { r: 0, g: 255, b: 127 }))]
    #[case("#fff", Some(Rgb { r: 255, g: 255, b: 255 }))]
    #[case("fff", None)]
    #[case("#12345", None)]
    #[case("#gg0000", None)]
    #[case("", None)]
    fn test_parse_color(#[case] raw: &str, #[case] expected: Option<Rgb>) {
        assert_eq!(Rgb::parse(raw), expected);
    }

    #[test]
    fn test_rectangle_color_overrides_fallback() {
        let red = Rgb { r: 255, g: 0, b: 0 };
        let resolved = resolve_all(
            &[
                RedactionRectangle::new(1, 0.1, 0.1, 0.1, 0.1).with_color("#00f"),
                RedactionRectangle::new(1, 0.1, 0.1, 0.1, 0.1),
            ],
            &letter(),
            red,
        )
        .unwrap();
        assert_eq!(resolved[0].color.to_string(), "#0000ff");
        assert_eq!(resolved[1].color, red);
    }
}
