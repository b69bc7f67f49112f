use std::{f64::consts::TAU, time::Duration};

use rand::Rng;

/// Particles per hit burst.
pub const BURST_SIZE: usize = 20;
/// Downward acceleration in pixels per second squared.
const GRAVITY: f64 = 500.0;

/// One spark of a hit burst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Position x.
    pub x: f64,
    /// Position y.
    pub y: f64,
    /// Velocity x in pixels per second.
    pub vx: f64,
    /// Velocity y in pixels per second.
    pub vy: f64,
    /// Time left to live.
    pub life: Duration,
    /// Drawn radius.
    pub size: f64,
}

impl Particle {
    /// Integrate one step. Returns whether the particle is still alive.
    pub fn step(&mut self, dt: Duration) -> bool {
        self.life = self.life.saturating_sub(dt);
        let dt = dt.as_secs_f64();
        self.x += self.vx * dt;
        self.y += self.vy * dt;
        self.vy += GRAVITY * dt;
        !self.life.is_zero()
    }

    /// Opacity proportional to the remaining life.
    pub fn alpha(&self) -> u8 {
        (self.life.as_secs_f64() * f64::from(u8::MAX)).clamp(0.0, f64::from(u8::MAX)) as u8
    }
}

/// [`BURST_SIZE`] particles leaving `(x, y)` at evenly spaced angles.
pub fn burst<R: Rng + ?Sized>(rng: &mut R, x: f64, y: f64) -> Vec<Particle> {
    (0..BURST_SIZE)
        .map(|i| {
            let angle = i as f64 / BURST_SIZE as f64 * TAU;
            let speed = rng.random_range(200.0..400.0);
            Particle {
                x,
                y,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                life: Duration::from_secs_f64(rng.random_range(0.5..1.0)),
                size: rng.random_range(8.0..16.0),
            }
        })
        .collect()
}

/// Step every particle and drop the dead ones.
pub fn advance(particles: &mut Vec<Particle>, dt: Duration) {
    particles.retain_mut(|particle| particle.step(dt));
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn burst_stays_within_bands() {
        let mut rng = StdRng::seed_from_u64(7);
        let particles = burst(&mut rng, 10.0, 20.0);
        assert_eq!(particles.len(), BURST_SIZE);
        for particle in &particles {
            assert_eq!((particle.x, particle.y), (10.0, 20.0));
            let speed = particle.vx.hypot(particle.vy);
            assert!((200.0 - 1e-9..400.0 + 1e-9).contains(&speed));
            let life = particle.life.as_secs_f64();
            assert!((0.5..1.0).contains(&life));
            assert!((8.0..16.0).contains(&particle.size));
        }
        // First particle heads straight right.
        assert!(particles[0].vx > 0.0 && particles[0].vy == 0.0);
    }

    fn resting(life: Duration) -> Particle {
        Particle {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            life,
            size: 8.0,
        }
    }

    #[test]
    fn particle_dies_exactly_when_life_is_used_up() {
        let dt = Duration::from_millis(250);
        let mut particles = vec![resting(Duration::from_millis(750))];

        advance(&mut particles, dt);
        advance(&mut particles, dt);
        assert_eq!(particles.len(), 1);
        assert_eq!(particles[0].alpha(), 63);

        advance(&mut particles, dt);
        assert!(particles.is_empty());
    }

    #[test]
    fn decimal_steps_do_not_leave_a_sliver_of_life() {
        for step_ms in [50u64, 100] {
            let dt = Duration::from_millis(step_ms);
            for ticks in 1..=20u32 {
                let mut particles = vec![resting(dt * ticks)];
                for _ in 1..ticks {
                    advance(&mut particles, dt);
                }
                assert_eq!(particles.len(), 1, "alive before tick {ticks} at {step_ms}ms");
                advance(&mut particles, dt);
                assert!(particles.is_empty(), "dead after tick {ticks} at {step_ms}ms");
            }
        }

        // Overshooting the remaining life still removes the particle.
        let mut particles = vec![resting(Duration::from_millis(120))];
        advance(&mut particles, Duration::from_millis(100));
        advance(&mut particles, Duration::from_millis(100));
        assert!(particles.is_empty());
    }

    #[test]
    fn gravity_pulls_down() {
        let mut particle = Particle {
            x: 0.0,
            y: 0.0,
            vx: 100.0,
            vy: 0.0,
            life: Duration::from_secs(1),
            size: 8.0,
        };
        assert!(particle.step(Duration::from_millis(500)));
        assert_eq!(particle.x, 50.0);
        assert_eq!(particle.y, 0.0);
        assert_eq!(particle.vy, 250.0);
    }
}
