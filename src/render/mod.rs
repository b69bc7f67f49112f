//! Objective animation and screen-space hit testing.
//!
//! The engine is driven by the host's frame loop: feed it the latest
//! [`SessionState`] with [`AnimationHitEngine::sync`], advance it with
//! [`AnimationHitEngine::tick`] for as long as it asks for more frames, and
//! forward pointer presses to [`AnimationHitEngine::pointer_down`]. It never
//! touches the session; a hit only yields an [`ObjectiveTapped`] for the
//! controller to submit.

mod effects;
mod particles;
mod viewport;

use std::time::{Duration, SystemTime};

use rand::{SeedableRng, rngs::StdRng};
use serde::Deserialize;
use tracing::debug;

use crate::state::{Objective, SessionState, SessionStatus};

pub use effects::{OBJECTIVE_LIFETIME, Ripple, TimerTier, pulse_scale, remaining_fraction};
pub use particles::{BURST_SIZE, Particle};
pub use viewport::{ScreenCircle, Viewport};

/// Offset of the drop shadow in pixels, both axes.
const SHADOW_OFFSET: f64 = 10.0;
/// Gap between the objective edge and the countdown arc.
const TIMER_ARC_GAP: f64 = 30.0;
/// Countdown arc starts at twelve o'clock.
const TIMER_START_DEGREES: f64 = -90.0;

/// Which radius a pointer press is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitRadiusPolicy {
    /// The pulsing radius the player sees.
    #[default]
    Animated,
    /// The radius sent by the backend, ignoring the pulse.
    Nominal,
}

/// A press landed on the objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectiveTapped {
    /// Spawn id to report back.
    pub objective_id: String,
}

/// Whether the host should schedule another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Something is still moving.
    Continue,
    /// Nothing to animate until the next sync or hit.
    Idle,
}

/// Renderer-agnostic description of one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Objective with its shadow and countdown.
    pub objective: Option<ObjectiveSprite>,
    /// Placement or hit ring.
    pub ripple: Option<RippleRing>,
    /// Live hit particles.
    pub particles: Vec<ParticleSprite>,
}

/// Drawable objective.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveSprite {
    /// Spawn id.
    pub id: String,
    /// Pulsed body.
    pub body: ScreenCircle,
    /// Shadow under the body.
    pub shadow: ScreenCircle,
    /// Remaining-time indicator.
    pub timer: TimerArc,
}

/// Countdown arc around the objective, angles in degrees clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerArc {
    /// Circle the arc lies on.
    pub circle: ScreenCircle,
    /// Start angle.
    pub start_degrees: f64,
    /// Sweep angle.
    pub sweep_degrees: f64,
    /// Color band.
    pub tier: TimerTier,
}

/// Fading ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RippleRing {
    /// Ring geometry.
    pub circle: ScreenCircle,
    /// Opacity.
    pub alpha: u8,
}

/// Drawable particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSprite {
    /// Particle disc.
    pub circle: ScreenCircle,
    /// Opacity.
    pub alpha: u8,
}

#[derive(Debug, Clone)]
struct ActiveObjective {
    objective: Objective,
    age: Duration,
}

/// Animation state for the objective on screen plus its hit effects.
#[derive(Debug)]
pub struct AnimationHitEngine {
    viewport: Viewport,
    hit_radius: HitRadiusPolicy,
    active: Option<ActiveObjective>,
    ripple: Ripple,
    particles: Vec<Particle>,
    rng: StdRng,
}

impl AnimationHitEngine {
    /// Engine with an OS-seeded particle generator.
    pub fn new(hit_radius: HitRadiusPolicy) -> Self {
        Self::with_rng(hit_radius, StdRng::from_os_rng())
    }

    /// Engine with reproducible particle bursts.
    pub fn with_seed(hit_radius: HitRadiusPolicy, seed: u64) -> Self {
        Self::with_rng(hit_radius, StdRng::seed_from_u64(seed))
    }

    fn with_rng(hit_radius: HitRadiusPolicy, rng: StdRng) -> Self {
        Self {
            viewport: Viewport::default(),
            hit_radius,
            active: None,
            ripple: Ripple::spent(),
            particles: Vec::new(),
            rng,
        }
    }

    /// Surface size changed. Objectives stay normalized, so the next frame
    /// re-projects them.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport = Viewport::new(width, height);
    }

    /// Current surface.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Follow `state`, using the wall clock to age a newly seen objective.
    pub fn sync(&mut self, state: &SessionState) -> bool {
        self.sync_at(state, SystemTime::now())
    }

    /// Follow `state` as of `now`. Returns whether the shown objective changed.
    ///
    /// The objective is shown only while the match is running. Seeing the
    /// same objective id again keeps its age and effects.
    pub fn sync_at(&mut self, state: &SessionState, now: SystemTime) -> bool {
        let wanted = match state.status {
            SessionStatus::InGame => state.current_objective.as_ref(),
            _ => None,
        };
        match (wanted, self.active.as_ref()) {
            (None, None) => false,
            (None, Some(_)) => {
                self.active = None;
                self.particles.clear();
                self.ripple = Ripple::spent();
                true
            }
            (Some(objective), Some(active)) if active.objective.id == objective.id => false,
            (Some(objective), _) => {
                let age = now
                    .duration_since(objective.created_at)
                    .unwrap_or(Duration::ZERO);
                debug!(
                    objective_id = %objective.id,
                    age_ms = age.as_millis() as u64,
                    "objective shown"
                );
                self.active = Some(ActiveObjective {
                    objective: objective.clone(),
                    age,
                });
                self.ripple = Ripple::armed();
                true
            }
        }
    }

    /// Advance every effect by `dt`.
    pub fn tick(&mut self, dt: Duration) -> TickOutcome {
        if let Some(active) = self.active.as_mut() {
            active.age += dt;
        }
        match self.body() {
            Some(body) => self.ripple.advance(dt, body.radius),
            None => self.ripple = Ripple::spent(),
        }
        particles::advance(&mut self.particles, dt);

        if self.is_animating() {
            TickOutcome::Continue
        } else {
            TickOutcome::Idle
        }
    }

    /// Whether another tick would change the picture.
    pub fn is_animating(&self) -> bool {
        let ripple = self.active.is_some() && self.ripple.is_visible();
        let fresh = self
            .active
            .as_ref()
            .is_some_and(|active| active.age < OBJECTIVE_LIFETIME);
        ripple || fresh || !self.particles.is_empty()
    }

    /// Hit-test a press at screen coordinates `(px, py)`.
    ///
    /// A hit bursts particles and re-arms the ripple; the objective stays on
    /// screen until the session removes it.
    pub fn pointer_down(&mut self, px: f64, py: f64) -> Option<ObjectiveTapped> {
        let active = self.active.as_ref()?;
        let target = self.hit_circle()?;
        if !target.contains(px, py) {
            return None;
        }
        let objective_id = active.objective.id.clone();
        debug!(%objective_id, px, py, "objective tapped");
        self.particles
            .extend(particles::burst(&mut self.rng, target.x, target.y));
        self.ripple = Ripple::armed();
        Some(ObjectiveTapped { objective_id })
    }

    /// Radius a press is currently tested against.
    pub fn current_radius(&self) -> Option<f64> {
        self.hit_circle().map(|circle| circle.radius)
    }

    /// Id of the objective on screen.
    pub fn objective_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.objective.id.as_str())
    }

    /// Live particles.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Placement ring state.
    pub fn ripple(&self) -> Ripple {
        self.ripple
    }

    /// Describe what to draw now.
    pub fn frame(&self) -> Frame {
        let objective = self.active.as_ref().zip(self.body()).map(|(active, body)| {
            let remaining = remaining_fraction(active.age);
            ObjectiveSprite {
                id: active.objective.id.clone(),
                body,
                shadow: body.offset(SHADOW_OFFSET, SHADOW_OFFSET),
                timer: TimerArc {
                    circle: ScreenCircle {
                        radius: body.radius + TIMER_ARC_GAP,
                        ..body
                    },
                    start_degrees: TIMER_START_DEGREES,
                    sweep_degrees: 360.0 * remaining,
                    tier: TimerTier::for_remaining(remaining),
                },
            }
        });
        let ripple = self
            .body()
            .filter(|_| self.ripple.is_visible())
            .map(|body| RippleRing {
                circle: ScreenCircle {
                    radius: self.ripple.radius(),
                    ..body
                },
                alpha: self.ripple.alpha(),
            });
        let particles = self
            .particles
            .iter()
            .map(|particle| ParticleSprite {
                circle: ScreenCircle {
                    x: particle.x,
                    y: particle.y,
                    radius: particle.size,
                },
                alpha: particle.alpha(),
            })
            .collect();

        Frame {
            objective,
            ripple,
            particles,
        }
    }

    /// Nominal placement on the current surface.
    fn placement(&self) -> Option<ScreenCircle> {
        let active = self.active.as_ref()?;
        if self.viewport.is_empty() {
            return None;
        }
        Some(self.viewport.project(&active.objective))
    }

    /// Pulsed placement.
    fn body(&self) -> Option<ScreenCircle> {
        let age = self.active.as_ref()?.age;
        Some(self.placement()?.scaled(pulse_scale(age)))
    }

    fn hit_circle(&self) -> Option<ScreenCircle> {
        match self.hit_radius {
            HitRadiusPolicy::Animated => self.body(),
            HitRadiusPolicy::Nominal => self.placement(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);
    const EPSILON: f64 = 1e-6;
    /// Age at which the pulse is at its peak (x1.1).
    const PEAK: Duration = Duration::from_micros(312_500);

    fn in_game(id: &str, created_at: SystemTime) -> SessionState {
        let mut state = SessionState::placeholder("A");
        state.status = SessionStatus::InGame;
        state.current_objective = Some(Objective {
            id: id.into(),
            normalized_x: 0.5,
            normalized_y: 0.5,
            normalized_radius: 0.1,
            created_at,
        });
        state
    }

    fn engine(policy: HitRadiusPolicy, age: Duration) -> AnimationHitEngine {
        let mut engine = AnimationHitEngine::with_seed(policy, 42);
        engine.resize(1000.0, 1000.0);
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        assert!(engine.sync_at(&in_game("s1", now - age), now));
        engine
    }

    #[test]
    fn nominal_hit_boundary_is_inclusive() {
        let mut engine = engine(HitRadiusPolicy::Nominal, PEAK);
        assert_eq!(engine.current_radius(), Some(100.0));

        assert_eq!(engine.pointer_down(600.0 + EPSILON, 500.0), None);
        assert!(engine.particles().is_empty());

        let tap = engine.pointer_down(600.0 - EPSILON, 500.0);
        assert_eq!(
            tap,
            Some(ObjectiveTapped {
                objective_id: "s1".into()
            })
        );
        assert_eq!(engine.particles().len(), BURST_SIZE);
    }

    #[test]
    fn animated_hit_uses_the_pulsed_radius() {
        let mut engine = engine(HitRadiusPolicy::Animated, PEAK);
        let radius = engine.current_radius().unwrap();
        assert!((radius - 110.0).abs() < 1e-9);

        assert!(engine.pointer_down(500.0, 500.0 + radius + EPSILON).is_none());
        assert!(engine.pointer_down(500.0, 500.0 + radius - EPSILON).is_some());
        // Inside the pulse but outside the nominal radius.
        assert!(engine.pointer_down(605.0, 500.0).is_some());
    }

    #[test]
    fn miss_and_no_objective_do_nothing() {
        let mut engine = AnimationHitEngine::with_seed(HitRadiusPolicy::Animated, 1);
        engine.resize(1000.0, 1000.0);
        assert_eq!(engine.pointer_down(500.0, 500.0), None);
        assert_eq!(engine.frame(), Frame::default());
        assert_eq!(engine.tick(FRAME), TickOutcome::Idle);
    }

    #[test]
    fn objective_hidden_outside_the_match() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
        let mut engine = engine(HitRadiusPolicy::Animated, Duration::ZERO);
        engine.pointer_down(500.0, 500.0);
        assert!(!engine.particles().is_empty());

        let mut finished = in_game("s1", now);
        finished.status = SessionStatus::Finished;
        assert!(engine.sync_at(&finished, now));
        assert_eq!(engine.objective_id(), None);
        assert!(engine.particles().is_empty());
        assert!(!engine.is_animating());
    }

    #[test]
    fn same_objective_keeps_its_effects() {
        let mut engine = engine(HitRadiusPolicy::Animated, Duration::ZERO);
        for _ in 0..10 {
            engine.tick(FRAME);
        }
        let ripple = engine.ripple();
        assert!(ripple.radius() > 0.0);

        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        assert!(!engine.sync_at(&in_game("s1", now), now));
        assert_eq!(engine.ripple(), ripple);

        assert!(engine.sync_at(&in_game("s2", now), now));
        assert_eq!(engine.ripple(), Ripple::armed());
    }

    #[test]
    fn loop_goes_idle_once_everything_settled() {
        let mut engine = engine(HitRadiusPolicy::Animated, Duration::ZERO);
        assert!(engine.pointer_down(500.0, 500.0).is_some());

        let mut ticks = 0;
        while engine.tick(FRAME) == TickOutcome::Continue {
            ticks += 1;
            assert!(ticks < 1_000, "engine never went idle");
        }
        // The countdown alone keeps it busy for the whole nominal lifetime.
        assert!(ticks as f64 * FRAME.as_secs_f64() >= OBJECTIVE_LIFETIME.as_secs_f64() - 0.02);
        assert!(engine.particles().is_empty());
        assert!(!engine.ripple().is_visible());

        // Still drawn afterwards, still pulsing, but no longer self-scheduling.
        let frame = engine.frame();
        let sprite = frame.objective.unwrap();
        assert_eq!(sprite.timer.sweep_degrees, 0.0);
        assert_eq!(sprite.timer.tier, TimerTier::Critical);
    }

    #[test]
    fn frame_geometry() {
        let engine = engine(HitRadiusPolicy::Animated, Duration::ZERO);
        let frame = engine.frame();
        let sprite = frame.objective.unwrap();

        assert_eq!(sprite.body.radius, 100.0);
        assert_eq!((sprite.shadow.x, sprite.shadow.y), (510.0, 510.0));
        assert_eq!(sprite.timer.circle.radius, 130.0);
        assert_eq!(sprite.timer.start_degrees, -90.0);
        assert_eq!(sprite.timer.sweep_degrees, 360.0);
        assert_eq!(sprite.timer.tier, TimerTier::Plenty);

        let ripple = frame.ripple.unwrap();
        assert_eq!(ripple.alpha, u8::MAX);
        assert_eq!(ripple.circle.radius, 0.0);
    }

    #[test]
    fn resize_reprojects_the_objective() {
        let mut engine = engine(HitRadiusPolicy::Nominal, Duration::ZERO);
        engine.resize(2000.0, 1000.0);
        let body = engine.frame().objective.unwrap().body;
        assert_eq!((body.x, body.y, body.radius), (1000.0, 500.0, 100.0));
    }

    #[test]
    fn policy_reads_from_config_names() {
        let policy: HitRadiusPolicy = serde_json::from_str("\"nominal\"").unwrap();
        assert_eq!(policy, HitRadiusPolicy::Nominal);
        assert_eq!(HitRadiusPolicy::default(), HitRadiusPolicy::Animated);
    }
}
