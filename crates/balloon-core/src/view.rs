//! Zoom, rotation and orientation of the displayed page

use serde::{Deserialize, Serialize};

pub const DEFAULT_ZOOM: f64 = 1.0;
pub const DEFAULT_MIN_ZOOM: f64 = 0.25;
pub const DEFAULT_MAX_ZOOM: f64 = 4.0;
pub const DEFAULT_ZOOM_STEP: f64 = 0.25;

/// Clockwise on-screen rotation in quarter turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Any multiple of 90, negative values included
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn clockwise(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }

    pub fn counter_clockwise(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg270,
            Rotation::Deg90 => Rotation::Deg0,
            Rotation::Deg180 => Rotation::Deg90,
            Rotation::Deg270 => Rotation::Deg180,
        }
    }

    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Exact cosine and sine, no trigonometry rounding
    pub fn cos_sin(self) -> (f64, f64) {
        match self {
            Rotation::Deg0 => (1.0, 0.0),
            Rotation::Deg90 => (0.0, 1.0),
            Rotation::Deg180 => (-1.0, 0.0),
            Rotation::Deg270 => (0.0, -1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Landscape only when strictly wider than tall
    pub fn of_size(width: f64, height: f64) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    zoom: f64,
    pub rotation: Rotation,
    orientation: Orientation,
    auto_orientation: bool,
    /// Orientation of the loaded page itself; portrait until known
    page_orientation: Orientation,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::with_zoom_limits(DEFAULT_MIN_ZOOM, DEFAULT_MAX_ZOOM, DEFAULT_ZOOM_STEP)
    }
}

impl ViewState {
    /// Unusable limits (non-positive, inverted or NaN) fall back to the defaults
    pub fn with_zoom_limits(min_zoom: f64, max_zoom: f64, zoom_step: f64) -> Self {
        let (min_zoom, max_zoom) = if min_zoom > 0.0 && min_zoom <= max_zoom {
            (min_zoom, max_zoom)
        } else {
            (DEFAULT_MIN_ZOOM, DEFAULT_MAX_ZOOM)
        };
        let zoom_step = if zoom_step > 0.0 { zoom_step } else { DEFAULT_ZOOM_STEP };
        Self {
            zoom: DEFAULT_ZOOM.clamp(min_zoom, max_zoom),
            rotation: Rotation::Deg0,
            orientation: Orientation::Portrait,
            auto_orientation: true,
            page_orientation: Orientation::Portrait,
            min_zoom,
            max_zoom,
            zoom_step,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn auto_orientation(&self) -> bool {
        self.auto_orientation
    }

    /// Clamped into the configured zoom range; NaN is ignored
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_nan() {
            return;
        }
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + self.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - self.zoom_step);
    }

    pub fn reset_zoom(&mut self) {
        self.set_zoom(DEFAULT_ZOOM);
    }

    pub fn rotate_clockwise(&mut self) {
        self.rotation = self.rotation.clockwise();
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.rotation = self.rotation.counter_clockwise();
    }

    /// Explicit choice; turns auto orientation off
    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
        self.auto_orientation = false;
    }

    pub fn enable_auto_orientation(&mut self) {
        self.auto_orientation = true;
        self.orientation = self.page_orientation;
    }

    /// Called once the page's intrinsic size is known
    pub fn page_size_known(&mut self, width: f64, height: f64) {
        self.page_orientation = Orientation::of_size(width, height);
        if self.auto_orientation {
            self.orientation = self.page_orientation;
        }
    }

    /// True when the page is displayed turned onto its side, i.e. the
    /// chosen orientation disagrees with the page's own.
    pub fn orientation_swapped(&self) -> bool {
        self.orientation != self.page_orientation
    }

    /// Back to defaults for a newly loaded document
    pub fn reset(&mut self) {
        *self = Self::with_zoom_limits(self.min_zoom, self.max_zoom, self.zoom_step);
    }
}
