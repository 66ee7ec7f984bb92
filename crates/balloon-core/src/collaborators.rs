//! Interfaces of the external collaborators
//!
//! The engine never talks to a transport directly. Rendering, text
//! extraction and document generation are reached through these traits
//! and only their returned values touch engine state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{DocumentHandle, PageSize};
use crate::error::BalloonError;
use crate::export::MappingEntry;
use crate::surface::RasterSurface;

/// Output of rendering page 1 at some zoom
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Unrotated page size in pixels
    pub pixel_width: f64,
    pub pixel_height: f64,
    /// Raster of the page, when the renderer produces one
    pub surface: Option<Arc<RasterSurface>>,
}

pub trait PdfRenderer: Send + Sync {
    fn render(&self, document: &DocumentHandle, zoom: f64) -> Result<RenderedPage, BalloonError>;

    fn intrinsic_page_size(&self, document: &DocumentHandle) -> Result<PageSize, BalloonError>;
}

/// A point on the rendered page, in the pixel frame it was measured in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
    pub frame_width: f64,
    pub frame_height: f64,
}

#[async_trait]
pub trait TextResolver: Send + Sync {
    /// Nearby text candidates for `point`, most relevant first
    async fn resolve(
        &self,
        document: &DocumentHandle,
        point: PixelPoint,
    ) -> Result<Vec<String>, BalloonError>;
}

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Fill `template` with `mapping` and return the generated file.
    ///
    /// Server-side rejections (missing template, malformed mapping) come
    /// back as `BalloonError::Server`, connection failures as `Transport`.
    async fn generate(
        &self,
        template: &str,
        mapping: &[MappingEntry],
    ) -> Result<Vec<u8>, BalloonError>;
}
