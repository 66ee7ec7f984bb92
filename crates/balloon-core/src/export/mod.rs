//! Report and annotated-PDF export
//!
//! Both exports work from a snapshot of the balloon list; nothing here
//! mutates engine state.

mod payload;
mod raster;

pub use payload::{build_mapping, placeholder_key, placeholder_mapping, MappingEntry};
pub use raster::{render_annotated_pdf, PageLayout, A4_HEIGHT, A4_WIDTH};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::collaborators::DocumentGenerator;
use crate::error::{BalloonError, Operation};
use crate::store::Balloon;
use crate::surface::RasterSurface;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PDF_MIME: &str = "application/pdf";

/// A generated file ready to be saved
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Write into `dir` under the artifact's own filename.
    ///
    /// The bytes go to a temp file in the same directory first and are
    /// renamed into place, so a failed write never leaves a partial file.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, BalloonError> {
        let dir = dir.as_ref();
        let target = dir.join(&self.filename);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, &self.bytes)?;
        tmp.persist(&target).map_err(|e| BalloonError::Io(e.error))?;
        Ok(target)
    }
}

pub struct ExportCoordinator {
    generator: Arc<dyn DocumentGenerator>,
    template: String,
    report_filename: String,
    separator: String,
    timeout: Duration,
}

impl ExportCoordinator {
    pub fn new(generator: Arc<dyn DocumentGenerator>, timeout: Duration) -> Self {
        Self {
            generator,
            template: "dimensional_report".to_string(),
            report_filename: "filled_report.docx".to_string(),
            separator: " ".to_string(),
            timeout,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_report_filename(mut self, filename: impl Into<String>) -> Self {
        self.report_filename = filename.into();
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Send the balloon mapping to the generator and wrap the result.
    ///
    /// An empty balloon list is rejected before the generator is called.
    pub async fn export_report(&self, balloons: &[Balloon]) -> Result<Artifact, BalloonError> {
        if balloons.is_empty() {
            return Err(BalloonError::Validation(
                "no balloons to export".to_string(),
            ));
        }
        let mapping = build_mapping(balloons, &self.separator);
        debug!(entries = mapping.len(), template = %self.template, "Requesting report");

        let ms = self.timeout.as_millis() as u64;
        let bytes = tokio::time::timeout(
            self.timeout,
            self.generator.generate(&self.template, &mapping),
        )
        .await
        .map_err(|_| BalloonError::Timeout {
            operation: Operation::Generate,
            ms,
        })??;

        if bytes.is_empty() {
            warn!("Generator returned an empty document");
            return Err(BalloonError::Server {
                status: 200,
                message: "generator returned an empty document".to_string(),
            });
        }
        info!(bytes = bytes.len(), filename = %self.report_filename, "Report generated");
        Ok(Artifact {
            filename: self.report_filename.clone(),
            mime_type: DOCX_MIME.to_string(),
            bytes,
        })
    }

    /// Flatten the page raster and balloon markers into `annotated_<stem>.pdf`
    pub fn export_raster(
        &self,
        surface: Option<&RasterSurface>,
        balloons: &[Balloon],
        stem: &str,
    ) -> Result<Artifact, BalloonError> {
        let surface = surface.ok_or_else(|| {
            BalloonError::Validation("no rendered page surface to export".to_string())
        })?;
        let bytes = render_annotated_pdf(surface, balloons)?;
        info!(balloons = balloons.len(), bytes = bytes.len(), "Annotated PDF built");
        Ok(Artifact {
            filename: format!("annotated_{}.pdf", stem),
            mime_type: PDF_MIME.to_string(),
            bytes,
        })
    }
}
