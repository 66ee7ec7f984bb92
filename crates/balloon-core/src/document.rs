//! Loaded source document
//!
//! Only page 1 is ever addressed. The handle keeps the raw bytes (sent to
//! the text-resolution backend as-is) together with the page geometry
//! read once at load time.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lopdf::{Document, Object, ObjectId};
use serde::Serialize;

use crate::error::BalloonError;

/// Identifies one loaded document; results tagged with an older epoch
/// belong to a document (or balloon set) that has since been replaced.
pub type Epoch = u64;

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_epoch() -> Epoch {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// Intrinsic page size in PDF points, as displayed (page `/Rotate` applied)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct DocumentHandle {
    name: String,
    bytes: Arc<[u8]>,
    page_count: u32,
    page_size: PageSize,
    epoch: Epoch,
}

impl DocumentHandle {
    /// Parse PDF bytes and read the first page's geometry
    pub fn load(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Result<Self, BalloonError> {
        let bytes: Arc<[u8]> = bytes.into();
        let doc = Document::load_mem(&bytes)?;

        let pages = doc.get_pages();
        let page_count = pages.len() as u32;
        let first = pages
            .get(&1)
            .copied()
            .ok_or_else(|| BalloonError::Pdf("document has no pages".to_string()))?;

        Ok(Self {
            name: name.into(),
            bytes,
            page_count,
            page_size: first_page_size(&doc, first)?,
            epoch: next_epoch(),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, BalloonError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        Self::load(name, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without its extension, used for export names
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// Session epoch stamped at load; every load gets a fresh one
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

fn first_page_size(doc: &Document, page_id: ObjectId) -> Result<PageSize, BalloonError> {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .ok_or_else(|| BalloonError::Pdf("page 1 has no MediaBox".to_string()))?;
    let values = media_box
        .as_array()
        .map_err(|e| BalloonError::Pdf(format!("MediaBox is not an array: {}", e)))?
        .iter()
        .map(|o| o.as_float().map(f64::from))
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| BalloonError::Pdf(format!("MediaBox entry is not a number: {}", e)))?;

    let &[x0, y0, x1, y1] = values.as_slice() else {
        return Err(BalloonError::Pdf(format!(
            "MediaBox has {} entries, expected 4",
            values.len()
        )));
    };
    let (width, height) = ((x1 - x0).abs(), (y1 - y0).abs());
    if width == 0.0 || height == 0.0 {
        return Err(BalloonError::Pdf("page 1 has an empty MediaBox".to_string()));
    }

    let rotate = inherited(doc, page_id, b"Rotate")
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0);
    if rotate.rem_euclid(180) == 90 {
        Ok(PageSize {
            width: height,
            height: width,
        })
    } else {
        Ok(PageSize { width, height })
    }
}

/// Look up a page attribute, following `/Parent` for inheritable keys
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    // Bounded walk guards against cyclic /Parent chains
    for _ in 0..32 {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}


#[cfg(test)]
mod tests {
    use super::fixtures::pdf;
    use super::*;

    #[test]
    fn test_load_reads_letter_size() {
        let handle = DocumentHandle::load("drawing.pdf", pdf(612, 792, 0, false)).unwrap();
        assert_eq!(handle.page_count(), 1);
        assert_eq!(
            handle.page_size(),
            PageSize {
                width: 612.0,
                height: 792.0
            }
        );
        assert_eq!(handle.stem(), "drawing");
    }

    #[test]
    fn test_each_load_gets_new_epoch() {
        let bytes = pdf(100, 100, 0, false);
        let a = DocumentHandle::load("a.pdf", bytes.clone()).unwrap();
        let b = DocumentHandle::load("a.pdf", bytes).unwrap();
        assert!(b.epoch() > a.epoch());
        assert_eq!(a.clone().epoch(), a.epoch());
    }

    #[test]
    fn test_media_box_inherited_from_parent() {
        let handle = DocumentHandle::load("a.pdf", pdf(842, 595, 0, true)).unwrap();
        assert_eq!(handle.page_size().width, 842.0);
        assert_eq!(handle.page_size().height, 595.0);
    }

    #[test]
    fn test_rotate_swaps_dimensions() {
        let handle = DocumentHandle::load("a.pdf", pdf(612, 792, 90, false)).unwrap();
        assert_eq!(handle.page_size().width, 792.0);
        assert_eq!(handle.page_size().height, 612.0);
    }

    #[test]
    fn test_non_pdf_is_rejected() {
        let err = DocumentHandle::load("notes.txt", b"hello".to_vec()).unwrap_err();
        assert!(matches!(err, BalloonError::Pdf(_)));
    }

    #[test]
    fn test_stem_without_extension() {
        let handle = DocumentHandle::load("drawing", pdf(100, 100, 0, false)).unwrap();
        assert_eq!(handle.stem(), "drawing");
    }
}
