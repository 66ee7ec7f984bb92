//! Geometry-only page renderer
//!
//! Reports the pixel size page 1 would have at a given zoom and passes
//! through a raster produced elsewhere (for example a PNG exported by a
//! viewer). Real rasterisation stays outside this crate.

use std::sync::Arc;

use crate::collaborators::{PdfRenderer, RenderedPage};
use crate::document::{DocumentHandle, PageSize};
use crate::error::BalloonError;
use crate::surface::RasterSurface;

/// Pixels per PDF point at zoom 1.0
pub const DEFAULT_RENDER_SCALE: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct PageGeometryRenderer {
    render_scale: f64,
    surface: Option<Arc<RasterSurface>>,
}

impl Default for PageGeometryRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_SCALE)
    }
}

impl PageGeometryRenderer {
    pub fn new(render_scale: f64) -> Self {
        Self {
            render_scale,
            surface: None,
        }
    }

    pub fn with_surface(mut self, surface: RasterSurface) -> Self {
        self.surface = Some(Arc::new(surface));
        self
    }
}

impl PdfRenderer for PageGeometryRenderer {
    fn render(&self, document: &DocumentHandle, zoom: f64) -> Result<RenderedPage, BalloonError> {
        let size = document.page_size();
        let scale = self.render_scale * zoom;
        Ok(RenderedPage {
            pixel_width: size.width * scale,
            pixel_height: size.height * scale,
            surface: self.surface.clone(),
        })
    }

    fn intrinsic_page_size(&self, document: &DocumentHandle) -> Result<PageSize, BalloonError> {
        Ok(document.page_size())
    }
}
