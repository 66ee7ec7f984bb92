//! Engine configuration
//!
//! Loaded from TOML. Every section and key is optional; missing values
//! fall back to the defaults below.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::registry::DEFAULT_TYPES;
use crate::render::DEFAULT_RENDER_SCALE;
use crate::view::{DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, DEFAULT_ZOOM_STEP};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub types: TypesConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl EngineConfig {
    /// Load and validate a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let view = &self.view;
        if !(view.min_zoom > 0.0) || !view.max_zoom.is_finite() {
            bail!("view.min_zoom must be positive and view.max_zoom finite");
        }
        if view.min_zoom > view.max_zoom {
            bail!(
                "view.min_zoom ({}) is greater than view.max_zoom ({})",
                view.min_zoom,
                view.max_zoom
            );
        }
        if !(view.zoom_step > 0.0) {
            bail!("view.zoom_step must be positive");
        }
        if !(view.render_scale > 0.0) {
            bail!("view.render_scale must be positive");
        }
        if self.backend.resolve_timeout_ms == 0 || self.backend.generate_timeout_ms == 0 {
            bail!("backend timeouts must be greater than zero");
        }
        if !(self.placement.reject_tolerance >= 0.0) {
            bail!("placement.reject_tolerance must not be negative");
        }
        if self.types.defaults.iter().all(|t| t.trim().is_empty()) {
            bail!("types.defaults must name at least one balloon type");
        }
        Ok(())
    }
}

/// Where the text-resolution and document-generation endpoints live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
    #[serde(default = "default_generate_timeout_ms")]
    pub generate_timeout_ms: u64,
}

impl BackendConfig {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_millis(self.generate_timeout_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            generate_timeout_ms: default_generate_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000/api".to_string()
}

fn default_resolve_timeout_ms() -> u64 {
    15_000
}

fn default_generate_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,
    /// Pixels per PDF point at zoom 1.0
    #[serde(default = "default_render_scale")]
    pub render_scale: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            zoom_step: default_zoom_step(),
            render_scale: default_render_scale(),
        }
    }
}

fn default_min_zoom() -> f64 {
    DEFAULT_MIN_ZOOM
}

fn default_max_zoom() -> f64 {
    DEFAULT_MAX_ZOOM
}

fn default_zoom_step() -> f64 {
    DEFAULT_ZOOM_STEP
}

fn default_render_scale() -> f64 {
    DEFAULT_RENDER_SCALE
}

/// What to do with a click or drag that lands off the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfBoundsPolicy {
    #[default]
    Clamp,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default)]
    pub out_of_bounds: OutOfBoundsPolicy,
    /// Overshoot still accepted (and clamped) under `reject`
    #[serde(default)]
    pub reject_tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypesConfig {
    #[serde(default = "default_types")]
    pub defaults: Vec<String>,
}

impl Default for TypesConfig {
    fn default() -> Self {
        Self {
            defaults: default_types(),
        }
    }
}

fn default_types() -> Vec<String> {
    DEFAULT_TYPES.iter().map(|t| t.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_report_filename")]
    pub report_filename: String,
    #[serde(default = "default_template")]
    pub template: String,
    /// Joins resolution candidates in the report text
    #[serde(default = "default_text_separator")]
    pub text_separator: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            report_filename: default_report_filename(),
            template: default_template(),
            text_separator: default_text_separator(),
        }
    }
}

fn default_report_filename() -> String {
    "filled_report.docx".to_string()
}

fn default_template() -> String {
    "dimensional_report".to_string()
}

fn default_text_separator() -> String {
    " ".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = EngineConfig::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000/api");
        assert_eq!(config.backend.resolve_timeout(), Duration::from_secs(15));
        assert_eq!(config.backend.generate_timeout(), Duration::from_secs(30));
        assert_eq!(config.view.render_scale, 1.5);
        assert_eq!(config.placement.out_of_bounds, OutOfBoundsPolicy::Clamp);
        assert_eq!(config.types.defaults.len(), 9);
        assert_eq!(config.export.report_filename, "filled_report.docx");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let toml = r#"
            [backend]
            base_url = "http://qa-box:8080/api"

            [placement]
            out_of_bounds = "reject"
            reject_tolerance = 0.02

            [types]
            defaults = ["Diameter", "Thread"]
        "#;
        let config = EngineConfig::from_str(toml).unwrap();
        assert_eq!(config.backend.base_url, "http://qa-box:8080/api");
        assert_eq!(config.backend.resolve_timeout_ms, 15_000);
        assert_eq!(config.placement.out_of_bounds, OutOfBoundsPolicy::Reject);
        assert_eq!(config.placement.reject_tolerance, 0.02);
        assert_eq!(config.types.defaults, vec!["Diameter", "Thread"]);
        assert_eq!(config.view.max_zoom, 4.0);
    }

    #[test]
    fn test_inverted_zoom_bounds_rejected() {
        let err = EngineConfig::from_str("[view]\nmin_zoom = 5.0\nmax_zoom = 2.0\n").unwrap_err();
        assert!(err.to_string().contains("min_zoom"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(EngineConfig::from_str("[backend]\nresolve_timeout_ms = 0\n").is_err());
    }

    #[test]
    fn test_unknown_policy_is_parse_error() {
        let err = EngineConfig::from_str("[placement]\nout_of_bounds = \"wrap\"\n").unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn test_from_file_reports_path() {
        let err = EngineConfig::from_file("/nonexistent/balloon.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/balloon.toml"));
    }
}
