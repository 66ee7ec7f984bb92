//! Coordinate transformation between viewport pixels and document space
//!
//! Document space is the normalized `[0,1]×[0,1]` frame of the unrotated
//! page, top-left origin. Viewport space is whatever the pointer reports:
//! pixels relative to the same origin as `ViewportBounds`.
//!
//! `ViewportBounds` is the on-screen bounding box of the page *as drawn*,
//! so it already carries the zoom factor and, for quarter-turn rotations,
//! swapped width and height. Dividing by it removes zoom, which is why no
//! zoom term appears in the math below.

use serde::{Deserialize, Serialize};

use crate::view::ViewState;

/// Pointer position in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportPoint {
    pub x: f64,
    pub y: f64,
}

impl ViewportPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box of the drawn page in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewportBounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Normalized position on the page, independent of zoom and rotation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocPoint {
    pub nx: f64,
    pub ny: f64,
}

impl DocPoint {
    pub fn new(nx: f64, ny: f64) -> Self {
        Self { nx, ny }
    }

    pub fn is_within_page(&self) -> bool {
        (0.0..=1.0).contains(&self.nx) && (0.0..=1.0).contains(&self.ny)
    }

    /// Largest distance by which either component leaves `[0,1]`
    pub fn overshoot(&self) -> f64 {
        let axis = |v: f64| {
            if v < 0.0 {
                -v
            } else if v > 1.0 {
                v - 1.0
            } else {
                0.0
            }
        };
        axis(self.nx).max(axis(self.ny))
    }

    pub fn clamped(&self) -> Self {
        Self {
            nx: self.nx.clamp(0.0, 1.0),
            ny: self.ny.clamp(0.0, 1.0),
        }
    }

    /// Pixel position on an unrotated page raster of the given size
    pub fn to_page_pixels(&self, page_width: f64, page_height: f64) -> (f64, f64) {
        (self.nx * page_width, self.ny * page_height)
    }
}

/// Map a pointer position to document space.
///
/// Not clamped: points in the page padding come back slightly outside
/// `[0,1]` and the store boundary decides what to do with them.
pub fn to_document_space(
    point: ViewportPoint,
    bounds: ViewportBounds,
    view: &ViewState,
) -> DocPoint {
    let (cx, cy) = bounds.center();
    let dx = point.x - cx;
    let dy = point.y - cy;

    // Undo the on-screen rotation (clockwise, y down)
    let (cos, sin) = view.rotation.cos_sin();
    let rx = dx * cos + dy * sin;
    let ry = -dx * sin + dy * cos;

    let (frame_w, frame_h) = unrotated_frame(bounds, view);
    let u = rx / frame_w + 0.5;
    let v = ry / frame_h + 0.5;

    if view.orientation_swapped() {
        // Landscape view of a portrait page: visual x runs down the page,
        // visual y runs from the page's right edge to its left
        DocPoint::new(v, 1.0 - u)
    } else {
        DocPoint::new(u, v)
    }
}

/// Inverse of [`to_document_space`]
pub fn to_viewport_space(
    doc: DocPoint,
    bounds: ViewportBounds,
    view: &ViewState,
) -> ViewportPoint {
    let (u, v) = if view.orientation_swapped() {
        (1.0 - doc.ny, doc.nx)
    } else {
        (doc.nx, doc.ny)
    };

    let (frame_w, frame_h) = unrotated_frame(bounds, view);
    let rx = (u - 0.5) * frame_w;
    let ry = (v - 0.5) * frame_h;

    let (cos, sin) = view.rotation.cos_sin();
    let dx = rx * cos - ry * sin;
    let dy = rx * sin + ry * cos;

    let (cx, cy) = bounds.center();
    ViewportPoint::new(cx + dx, cy + dy)
}

/// Size of the page frame before the rotation was applied
fn unrotated_frame(bounds: ViewportBounds, view: &ViewState) -> (f64, f64) {
    if view.rotation.is_quarter_turn() {
        (bounds.height, bounds.width)
    } else {
        (bounds.width, bounds.height)
    }
}
