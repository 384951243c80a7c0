//! SVG page previews.

use std::fmt::Write as _;

use super::geometry::ResolvedRect;
use super::types::PageInfo;

/// MIME type of rendered previews.
pub const PREVIEW_CONTENT_TYPE: &str = "image/svg+xml";

/// Render the page outline with each overlay at its resolved position.
///
/// SVG shares the caller's top-left origin, so no flip is needed here.
pub fn render(page: &PageInfo, rects: &[ResolvedRect]) -> String {
    let (w, h) = (page.width_pt, page.height_pt);
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.2}" height="{h:.2}" viewBox="0 0 {w:.2} {h:.2}" data-page="{}">"#,
        page.page_number
    );
    let _ = writeln!(
        svg,
        r##"  <rect x="0" y="0" width="{w:.2}" height="{h:.2}" fill="#ffffff" stroke="#888888" stroke-width="1"/>"##
    );
    for rect in rects {
        let _ = writeln!(
            svg,
            r#"  <rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
            rect.x, rect.y, rect.width, rect.height, rect.color
        );
    }
    svg.push_str("</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redaction::geometry::Rgb;

    #[test]
    fn test_render_draws_outline_and_overlays() {
        let page = PageInfo {
            page_number: 2,
            width_pt: 612.0,
            height_pt: 792.0,
        };
        let rect = ResolvedRect {
            page_number: 2,
            x: 61.2,
            y: 79.2,
            width: 100.0,
            height: 20.0,
            color: Rgb { r: 255, g: 0, b: 0 },
        };
        let svg = render(&page, &[rect]);

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"viewBox="0 0 612.00 792.00""#));
        assert!(svg.contains(r##"<rect x="61.20" y="79.20" width="100.00" height="20.00" fill="#ff0000"/>"##));
        assert_eq!(svg.matches("<rect").count(), 2);
        assert!(svg.trim_end().ends_with("</svg>"));
    }
}
