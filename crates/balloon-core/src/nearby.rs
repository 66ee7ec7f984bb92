//! Offline nearby-text lookup over a pre-extracted word span set

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::collaborators::{PixelPoint, TextResolver};
use crate::document::DocumentHandle;
use crate::error::BalloonError;

/// Search radius as a fraction of the larger page side
pub const MAXDIST_FACTOR: f64 = 0.03;
/// How many spans to fall back to when none lie within the radius
pub const FALLBACK_COUNT: usize = 3;

/// One extracted word, in PDF points with a top-left origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub text: String,
    pub cx: f64,
    pub cy: f64,
}

impl TextSpan {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64, text: impl Into<String>) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            text: text.into(),
            cx: (x0 + x1) / 2.0,
            cy: (y0 + y1) / 2.0,
        }
    }

    fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.cx - x).hypot(self.cy - y)
    }
}

/// Word spans of page 1 together with the page size they were measured on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpans {
    pub page_width: f64,
    pub page_height: f64,
    pub spans: Vec<TextSpan>,
}

impl PageSpans {
    pub fn from_json(json: &str) -> Result<Self, BalloonError> {
        serde_json::from_str(json)
            .map_err(|e| BalloonError::Validation(format!("invalid span set: {}", e)))
    }

    /// Search radius scaled to this page
    pub fn max_distance(&self) -> f64 {
        self.page_width.max(self.page_height) * MAXDIST_FACTOR
    }

    /// Spans nearest to (`x`, `y`) in points, closest first
    pub fn nearby(&self, x: f64, y: f64) -> Vec<&TextSpan> {
        find_nearby_text(&self.spans, x, y, self.max_distance())
    }
}

/// Spans whose centre lies within `max_distance`, sorted by distance.
/// When none qualify the three nearest are returned instead.
pub fn find_nearby_text(spans: &[TextSpan], x: f64, y: f64, max_distance: f64) -> Vec<&TextSpan> {
    let mut sorted: Vec<(f64, &TextSpan)> =
        spans.iter().map(|s| (s.distance_to(x, y), s)).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let within: Vec<&TextSpan> = sorted
        .iter()
        .take_while(|(d, _)| *d <= max_distance)
        .map(|(_, s)| *s)
        .collect();
    if !within.is_empty() {
        return within;
    }
    sorted.into_iter().take(FALLBACK_COUNT).map(|(_, s)| s).collect()
}

/// `TextResolver` answering from a span set fetched ahead of time
pub struct SpanIndexResolver {
    spans: PageSpans,
}

impl SpanIndexResolver {
    pub fn new(spans: PageSpans) -> Self {
        Self { spans }
    }
}

#[async_trait]
impl TextResolver for SpanIndexResolver {
    async fn resolve(
        &self,
        _document: &DocumentHandle,
        point: PixelPoint,
    ) -> Result<Vec<String>, BalloonError> {
        if point.frame_width <= 0.0 || point.frame_height <= 0.0 {
            return Err(BalloonError::Validation(
                "pixel frame has no size".to_string(),
            ));
        }
        let x = point.x / point.frame_width * self.spans.page_width;
        let y = point.y / point.frame_height * self.spans.page_height;
        Ok(self
            .spans
            .nearby(x, y)
            .into_iter()
            .map(|s| s.text.clone())
            .collect())
    }
}
