use crate::state::Objective;

/// Drawing surface size in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Surface width.
    pub width: f64,
    /// Surface height.
    pub height: f64,
}

impl Viewport {
    /// Surface of `width` x `height` pixels.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether anything can be drawn on this surface.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Screen placement of a normalized objective, radius unscaled.
    pub fn project(&self, objective: &Objective) -> ScreenCircle {
        if self.is_empty() {
            return ScreenCircle::default();
        }
        ScreenCircle {
            x: objective.normalized_x * self.width,
            y: objective.normalized_y * self.height,
            radius: objective.normalized_radius * self.width.min(self.height),
        }
    }
}

/// Circle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenCircle {
    /// Center x.
    pub x: f64,
    /// Center y.
    pub y: f64,
    /// Radius.
    pub radius: f64,
}

impl ScreenCircle {
    /// Same center, radius multiplied by `factor`.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            radius: self.radius * factor,
            ..self
        }
    }

    /// Same radius, center moved by `(dx, dy)`.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Distance from the center to `(px, py)`.
    pub fn distance_to(&self, px: f64, py: f64) -> f64 {
        (px - self.x).hypot(py - self.y)
    }

    /// Boundary-inclusive containment test.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        self.distance_to(px, py) <= self.radius
    }
}
