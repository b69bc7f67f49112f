use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Coordinate space the backend uses when it spawns objectives.
///
/// Spawn payloads are expressed in pixels of this canvas; the client converts
/// them into fractions so every device can project them onto its own surface.
/// The version travels with the payload so a server-side change of reference
/// resolution is visible instead of silently misaligning targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCanvas {
    /// Revision of the reference resolution.
    pub version: u32,
    /// Width in reference pixels.
    pub width: f64,
    /// Height in reference pixels.
    pub height: f64,
}

impl ReferenceCanvas {
    /// Portrait 1080x1920 canvas used by the first backend revision.
    pub const V1: Self = Self {
        version: 1,
        width: 1080.0,
        height: 1920.0,
    };

    /// Whether both extents are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Map reference-space `(cx, cy, r)` to normalized `(x, y, radius)`.
    ///
    /// The radius is relative to the shorter side so circles stay round on
    /// any aspect ratio.
    pub fn normalize(&self, cx: f64, cy: f64, r: f64) -> (f64, f64, f64) {
        (
            fraction(cx, self.width),
            fraction(cy, self.height),
            fraction(r, self.width.min(self.height)),
        )
    }
}

impl Default for ReferenceCanvas {
    fn default() -> Self {
        Self::V1
    }
}

fn fraction(value: f64, extent: f64) -> f64 {
    if !value.is_finite() || !extent.is_finite() || extent <= 0.0 {
        return 0.0;
    }
    (value / extent).clamp(0.0, 1.0)
}

/// Raw spawn data as received from the event stream, tagged with the canvas
/// it was expressed against and the local reception time.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPayload {
    /// Identifier the backend expects back when the objective is hit.
    pub spawn_id: String,
    /// Center x in reference pixels.
    pub cx: f64,
    /// Center y in reference pixels.
    pub cy: f64,
    /// Radius in reference pixels.
    pub r: f64,
    /// Canvas the coordinates refer to.
    pub canvas: ReferenceCanvas,
    /// When the client received the payload.
    pub received_at: SystemTime,
}

/// Tappable target currently shown to both players.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Backend spawn identifier.
    pub id: String,
    /// Center x as a fraction of the surface width.
    pub normalized_x: f64,
    /// Center y as a fraction of the surface height.
    pub normalized_y: f64,
    /// Radius as a fraction of the shorter surface side.
    pub normalized_radius: f64,
    /// When the objective became known locally.
    pub created_at: SystemTime,
}

impl Objective {
    /// Build an objective from a spawn payload.
    pub fn from_spawn(spawn: &SpawnPayload) -> Self {
        let (normalized_x, normalized_y, normalized_radius) =
            spawn.canvas.normalize(spawn.cx, spawn.cy, spawn.r);
        Self {
            id: spawn.spawn_id.clone(),
            normalized_x,
            normalized_y,
            normalized_radius,
            created_at: spawn.received_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(cx: f64, cy: f64, r: f64, canvas: ReferenceCanvas) -> SpawnPayload {
        SpawnPayload {
            spawn_id: "s1".into(),
            cx,
            cy,
            r,
            canvas,
            received_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn spawn_is_normalized_against_reference_canvas() {
        let objective = Objective::from_spawn(&spawn(540.0, 960.0, 108.0, ReferenceCanvas::V1));
        assert_eq!(objective.id, "s1");
        assert_eq!(objective.normalized_x, 0.5);
        assert_eq!(objective.normalized_y, 0.5);
        assert_eq!(objective.normalized_radius, 0.1);
    }

    #[test]
    fn canvas_version_changes_the_mapping() {
        let landscape = ReferenceCanvas {
            version: 2,
            width: 1920.0,
            height: 1080.0,
        };
        let objective = Objective::from_spawn(&spawn(960.0, 270.0, 54.0, landscape));
        assert_eq!(objective.normalized_x, 0.5);
        assert_eq!(objective.normalized_y, 0.25);
        assert_eq!(objective.normalized_radius, 0.05);
    }

    #[test]
    fn out_of_range_coordinates_are_clamped() {
        let objective = Objective::from_spawn(&spawn(-10.0, 5000.0, f64::NAN, ReferenceCanvas::V1));
        assert_eq!(objective.normalized_x, 0.0);
        assert_eq!(objective.normalized_y, 1.0);
        assert_eq!(objective.normalized_radius, 0.0);
    }

    #[test]
    fn degenerate_canvas_is_invalid() {
        let canvas = ReferenceCanvas {
            version: 9,
            width: 0.0,
            height: 1920.0,
        };
        assert!(!canvas.is_valid());
        assert_eq!(canvas.normalize(10.0, 10.0, 10.0), (0.0, 10.0 / 1920.0, 0.0));
        assert!(ReferenceCanvas::V1.is_valid());
    }
}
