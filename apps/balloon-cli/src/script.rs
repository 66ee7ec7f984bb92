//! Session scripts
//!
//! A script is a JSON object with an ordered list of interaction steps.
//! Pointer coordinates are viewport pixels under the view state at the
//! moment the step runs, exactly as a pointer event would report them.
//!
//! ```json
//! {
//!   "origin": [0, 0],
//!   "steps": [
//!     { "action": "place", "x": 100, "y": 50 },
//!     { "action": "zoom_in" },
//!     { "action": "move", "id": 1, "x": 240, "y": 130 },
//!     { "action": "label", "id": 1, "text": "Ø 14.76" }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{bail, Context};
use balloon_core::{AnnotationEngine, BalloonId, Orientation, ViewportPoint};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Script {
    /// Top-left of the drawn page in viewport pixels
    #[serde(default)]
    pub origin: Option<(f64, f64)>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Place {
        x: f64,
        y: f64,
    },
    Move {
        id: BalloonId,
        x: f64,
        y: f64,
    },
    Relabel {
        id: BalloonId,
        #[serde(rename = "type")]
        kind: String,
    },
    /// `null` or a missing `text` clears the label
    Label {
        id: BalloonId,
        #[serde(default)]
        text: Option<String>,
    },
    Remove {
        id: BalloonId,
    },
    Reset,
    AddType {
        label: String,
    },
    SelectType {
        label: String,
    },
    ZoomIn,
    ZoomOut,
    SetZoom {
        zoom: f64,
    },
    Rotate {
        #[serde(default)]
        direction: Direction,
    },
    Orientation {
        value: Orientation,
    },
    AutoOrientation,
}

impl Script {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse session script")
    }
}

/// Run every step in order, merging finished resolutions between steps.
///
/// Steps the engine rejects as invalid (a click off the page under the
/// `reject` policy, an unknown type) are logged and skipped; any other
/// error aborts the replay.
pub fn replay(engine: &mut AnnotationEngine, script: &Script) -> anyhow::Result<()> {
    if let Some((left, top)) = script.origin {
        engine.set_viewport_origin(left, top);
    }
    for (index, step) in script.steps.iter().enumerate() {
        debug!(index, ?step, "Replaying step");
        if let Err(e) = apply(engine, step) {
            match e.downcast_ref::<balloon_core::BalloonError>() {
                Some(err) if err.is_validation() => {
                    warn!(index, error = %err, "Step skipped");
                }
                _ => return Err(e.context(format!("step {} failed", index + 1))),
            }
        }
        for event in engine.poll_events() {
            debug!(?event, "Resolution event");
        }
    }
    Ok(())
}

fn apply(engine: &mut AnnotationEngine, step: &Step) -> anyhow::Result<()> {
    match step {
        Step::Place { x, y } => {
            engine.click(ViewportPoint::new(*x, *y))?;
        }
        Step::Move { id, x, y } => {
            if !engine.drag_to(*id, ViewportPoint::new(*x, *y))? {
                warn!(balloon_id = id, "No balloon to move");
            }
        }
        Step::Relabel { id, kind } => {
            engine.relabel(*id, kind.clone());
        }
        Step::Label { id, text } => {
            engine.set_label(*id, text.clone());
        }
        Step::Remove { id } => {
            engine.remove(*id);
        }
        Step::Reset => engine.reset_all(),
        Step::AddType { label } => {
            engine.add_custom_type(label.clone());
        }
        Step::SelectType { label } => {
            if !engine.select_type(label) {
                return Err(balloon_core::BalloonError::Validation(format!(
                    "unknown balloon type '{}'",
                    label
                ))
                .into());
            }
        }
        Step::ZoomIn => engine.zoom_in()?,
        Step::ZoomOut => engine.zoom_out()?,
        Step::SetZoom { zoom } => {
            if !(*zoom > 0.0) {
                bail!("zoom must be positive, got {}", zoom);
            }
            engine.set_zoom(*zoom)?
        }
        Step::Rotate { direction } => match direction {
            Direction::Clockwise => engine.rotate_clockwise(),
            Direction::CounterClockwise => engine.rotate_counter_clockwise(),
        },
        Step::Orientation { value } => engine.set_orientation(*value),
        Step::AutoOrientation => engine.enable_auto_orientation(),
    }
    Ok(())
}
