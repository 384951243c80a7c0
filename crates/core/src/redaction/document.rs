//! PDF access through `lopdf`.

use std::fmt::Write as _;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::error::RedactionError;
use super::geometry::ResolvedRect;
use super::types::PageInfo;

/// US Letter, used when no MediaBox is found anywhere in the page tree.
const DEFAULT_MEDIA_BOX: MediaBox = MediaBox {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct MediaBox {
    llx: f64,
    lly: f64,
    urx: f64,
    ury: f64,
}

impl MediaBox {
    fn width(&self) -> f64 {
        self.urx - self.llx
    }

    fn height(&self) -> f64 {
        self.ury - self.lly
    }
}

/// A decoded PDF.
pub(crate) struct PdfDocument {
    inner: Document,
}

impl PdfDocument {
    /// Decode bytes. Documents without pages are rejected.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, RedactionError> {
        let inner = Document::load_mem(bytes).map_err(|e| RedactionError::decode(e.to_string()))?;
        if inner.get_pages().is_empty() {
            return Err(RedactionError::decode("document has no pages"));
        }
        Ok(Self { inner })
    }

    /// Page dimensions, in page order.
    pub(crate) fn pages(&self) -> Result<Vec<PageInfo>, RedactionError> {
        self.inner
            .get_pages()
            .into_iter()
            .map(|(page_number, id)| {
                let media_box = self.media_box(id)?;
                Ok(PageInfo {
                    page_number,
                    width_pt: media_box.width(),
                    height_pt: media_box.height(),
                })
            })
            .collect()
    }

    fn page_id(&self, page_number: u32) -> Result<ObjectId, RedactionError> {
        self.inner
            .get_pages()
            .get(&page_number)
            .copied()
            .ok_or_else(|| RedactionError::decode(format!("page {page_number} is missing")))
    }

    /// MediaBox of a page, inherited through `Parent` links.
    fn media_box(&self, page_id: ObjectId) -> Result<MediaBox, RedactionError> {
        let mut current = Some(page_id);
        let mut depth = 0;
        while let Some(id) = current {
            depth += 1;
            if depth > 64 {
                return Err(RedactionError::decode("page tree is cyclic"));
            }
            let node = self
                .inner
                .get_dictionary(id)
                .map_err(|e| RedactionError::decode(e.to_string()))?;
            if let Ok(raw) = node.get(b"MediaBox") {
                return self.parse_box(raw);
            }
            current = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
        Ok(DEFAULT_MEDIA_BOX)
    }

    fn parse_box(&self, raw: &Object) -> Result<MediaBox, RedactionError> {
        let invalid = || RedactionError::decode("MediaBox is malformed");
        let (_, resolved) = self
            .inner
            .dereference(raw)
            .map_err(|e| RedactionError::decode(e.to_string()))?;
        let values = resolved.as_array().map_err(|_| invalid())?;
        if values.len() != 4 {
            return Err(invalid());
        }
        let mut coords = [0.0_f64; 4];
        for (slot, value) in coords.iter_mut().zip(values) {
            let (_, value) = self
                .inner
                .dereference(value)
                .map_err(|e| RedactionError::decode(e.to_string()))?;
            *slot = number(value).ok_or_else(invalid)?;
        }
        let [a, b, c, d] = coords;
        Ok(MediaBox {
            llx: a.min(c),
            lly: b.min(d),
            urx: a.max(c),
            ury: b.max(d),
        })
    }

    /// Paint opaque rectangles over a page.
    ///
    /// Existing content is wrapped in `q`/`Q` so its graphics state cannot
    /// leak into the overlay, which is appended as a new content stream.
    pub(crate) fn paint(&mut self, page_number: u32, rects: &[ResolvedRect]) -> Result<(), RedactionError> {
        if rects.is_empty() {
            return Ok(());
        }
        let page_id = self.page_id(page_number)?;
        let media_box = self.media_box(page_id)?;
        let existing = self.content_refs(page_id)?;

        let mut overlay = String::from("Q\n");
        for rect in rects {
            let (r, g, b) = rect.color.unit();
            let x = media_box.llx + rect.x;
            let y = media_box.lly + rect.pdf_bottom(media_box.height());
            let _ = writeln!(
                overlay,
                "q {r:.4} {g:.4} {b:.4} rg {x:.3} {y:.3} {w:.3} {h:.3} re f Q",
                w = rect.width,
                h = rect.height,
            );
        }

        let prefix = self
            .inner
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let suffix = self
            .inner
            .add_object(Stream::new(Dictionary::new(), overlay.into_bytes()));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(prefix));
        contents.extend(existing);
        contents.push(Object::Reference(suffix));

        let page = self
            .inner
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| RedactionError::decode(e.to_string()))?;
        page.set("Contents", Object::Array(contents));
        Ok(())
    }

    /// A page's content streams as a flat list of objects.
    fn content_refs(&self, page_id: ObjectId) -> Result<Vec<Object>, RedactionError> {
        let page = self
            .inner
            .get_dictionary(page_id)
            .map_err(|e| RedactionError::decode(e.to_string()))?;
        Ok(match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.inner.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            Ok(other) => vec![other.clone()],
            Err(_) => Vec::new(),
        })
    }

    /// Text layer of one page, lines separated by newlines.
    pub(crate) fn page_text(&self, page_number: u32) -> String {
        self.inner.extract_text(&[page_number]).unwrap_or_default()
    }

    pub(crate) fn encode(mut self) -> Result<Vec<u8>, RedactionError> {
        let mut out = Vec::new();
        self.inner
            .save_to(&mut out)
            .map_err(|e| RedactionError::encode(e.to_string()))?;
        Ok(out)
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(v) => Some(*v as f64),
        Object::Real(v) => Some(f64::from(*v)),
        _ => None,
    }
}
