//! Time-based objective effects: pulse, countdown arc and placement ripple.

use std::{f64::consts::PI, time::Duration};

/// Nominal on-screen lifetime of an objective. One pulse cycle pair and the
/// full countdown sweep are mapped onto it.
pub const OBJECTIVE_LIFETIME: Duration = Duration::from_millis(2500);

/// Peak relative growth of the pulsing radius.
const PULSE_AMPLITUDE: f64 = 0.1;
/// Ripple growth in pixels per second.
pub const RIPPLE_SPEED: f64 = 500.0;
/// Ripple is fully faded at this multiple of the objective radius.
const RIPPLE_REACH: f64 = 3.0;
const OPAQUE: f64 = u8::MAX as f64;

/// Radius multiplier at `age`. Keeps oscillating past the nominal lifetime.
pub fn pulse_scale(age: Duration) -> f64 {
    let progress = age.as_secs_f64() / OBJECTIVE_LIFETIME.as_secs_f64();
    1.0 + PULSE_AMPLITUDE * (progress * 4.0 * PI).sin()
}

/// Fraction of the nominal lifetime still left, in `[0, 1]`.
pub fn remaining_fraction(age: Duration) -> f64 {
    let progress = age.as_secs_f64() / OBJECTIVE_LIFETIME.as_secs_f64();
    1.0 - progress.min(1.0)
}

/// Severity band of the countdown arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTier {
    /// More than half the lifetime left.
    Plenty,
    /// More than a quarter left.
    Low,
    /// A quarter or less left.
    Critical,
}

impl TimerTier {
    /// Band for a remaining fraction.
    pub fn for_remaining(remaining: f64) -> Self {
        if remaining > 0.5 {
            TimerTier::Plenty
        } else if remaining > 0.25 {
            TimerTier::Low
        } else {
            TimerTier::Critical
        }
    }
}

/// Expanding ring shown when an objective is placed or hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    radius: f64,
    alpha: u8,
}

impl Default for Ripple {
    fn default() -> Self {
        Self::armed()
    }
}

impl Ripple {
    /// Fresh ripple: zero radius, fully opaque.
    pub fn armed() -> Self {
        Self {
            radius: 0.0,
            alpha: u8::MAX,
        }
    }

    /// Already faded ripple.
    pub fn spent() -> Self {
        Self {
            radius: 0.0,
            alpha: 0,
        }
    }

    /// Current ring radius in pixels.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Current opacity.
    pub fn alpha(&self) -> u8 {
        self.alpha
    }

    /// Whether the ring is still drawn.
    pub fn is_visible(&self) -> bool {
        self.alpha > 0
    }

    /// Grow by `dt` and fade against `objective_radius`.
    ///
    /// Alpha never increases, even when the objective radius pulses outward.
    pub fn advance(&mut self, dt: Duration, objective_radius: f64) {
        if !self.is_visible() {
            return;
        }
        self.radius += RIPPLE_SPEED * dt.as_secs_f64();
        let reach = objective_radius * RIPPLE_REACH;
        let faded = if reach > 0.0 {
            ((1.0 - self.radius / reach) * OPAQUE).clamp(0.0, OPAQUE) as u8
        } else {
            0
        };
        self.alpha = self.alpha.min(faded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn pulse_starts_at_nominal_and_peaks_at_an_eighth() {
        assert_eq!(pulse_scale(Duration::ZERO), 1.0);
        assert!((pulse_scale(Duration::from_micros(312_500)) - 1.1).abs() < 1e-12);
        let late = pulse_scale(Duration::from_millis(3_100));
        assert!(late != 1.0 && (0.9..=1.1).contains(&late));
    }

    #[test]
    fn countdown_tiers() {
        assert_eq!(remaining_fraction(Duration::ZERO), 1.0);
        assert_eq!(remaining_fraction(Duration::from_secs(10)), 0.0);
        assert_eq!(TimerTier::for_remaining(0.75), TimerTier::Plenty);
        assert_eq!(TimerTier::for_remaining(0.5), TimerTier::Low);
        assert_eq!(TimerTier::for_remaining(0.3), TimerTier::Low);
        assert_eq!(TimerTier::for_remaining(0.25), TimerTier::Critical);
        assert_eq!(TimerTier::for_remaining(0.0), TimerTier::Critical);
    }

    #[test]
    fn ripple_fades_monotonically_and_terminates() {
        let mut ripple = Ripple::armed();
        let mut previous = ripple.alpha();
        let mut ticks = 0;
        while ripple.is_visible() {
            // Objective radius wobbling like a pulse must not bring the ring back.
            let radius = 100.0 * (1.0 + 0.1 * (ticks as f64).sin());
            ripple.advance(FRAME, radius);
            assert!(ripple.alpha() <= previous);
            previous = ripple.alpha();
            ticks += 1;
            assert!(ticks <= 100, "ripple never faded");
        }
        assert_eq!(ripple.alpha(), 0);

        let radius = ripple.radius();
        ripple.advance(FRAME, 100.0);
        assert_eq!(ripple.radius(), radius);
    }

    #[test]
    fn ripple_on_empty_objective_disappears_at_once() {
        let mut ripple = Ripple::armed();
        ripple.advance(FRAME, 0.0);
        assert!(!ripple.is_visible());
    }
}
