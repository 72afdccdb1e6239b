//! Movement validation policy.
//!
//! A proposed position update passes three checks in order: rate, bounds,
//! speed. Rejections never disconnect the client; the frame is dropped and
//! bounds/speed rejections are counted as violations by the caller.

use std::time::{Duration, Instant};

use crate::world::constants::{movement, world};
use crate::world::registry::Player;

/// Outcome of validating one proposed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveVerdict {
    Accept,
    /// Sent faster than the per-player throttle allows. Dropped silently.
    RejectRateLimited,
    /// Target outside the world rectangle (or not a finite number).
    RejectOutOfBounds,
    /// Straight-line distance exceeds the per-move speed budget.
    RejectSpeedViolation,
}

impl MoveVerdict {
    #[inline]
    pub fn is_accept(&self) -> bool {
        matches!(self, MoveVerdict::Accept)
    }

    /// Whether this rejection counts toward the violation metric. Rate
    /// limiting is expected from normal clients and stays uncounted.
    #[inline]
    pub fn counts_as_violation(&self) -> bool {
        matches!(
            self,
            MoveVerdict::RejectOutOfBounds | MoveVerdict::RejectSpeedViolation
        )
    }
}

/// Configuration for move validation.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Minimum interval between accepted moves per player.
    pub throttle: Duration,
    pub world_width: f64,
    pub world_height: f64,
    /// Maximum accepted straight-line distance is `max_speed * speed_buffer`.
    pub max_speed: f64,
    pub speed_buffer: f64,
    /// Toggle for the speed check. Defaults to enabled.
    pub speed_check: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(movement::THROTTLE_MS),
            world_width: world::WIDTH,
            world_height: world::HEIGHT,
            max_speed: movement::MAX_SPEED,
            speed_buffer: movement::SPEED_BUFFER,
            speed_check: true,
        }
    }
}

/// Stateless move validator. All mutable state (last accepted move time)
/// lives on the player record; on `Accept` the caller must stamp
/// `last_move_at` before evaluating the next frame, which makes the limiter
/// a leaky bucket of size one.
#[derive(Debug, Clone, Default)]
pub struct MoveValidator {
    config: ValidatorConfig,
}

impl MoveValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, x: f64, y: f64, player: &Player, now: Instant) -> MoveVerdict {
        if let Some(last) = player.last_move_at {
            if now.duration_since(last) < self.config.throttle {
                return MoveVerdict::RejectRateLimited;
            }
        }

        // NaN fails every range comparison, so test inclusion rather than
        // exclusion. World bounds are inclusive on all edges.
        let in_bounds = x >= 0.0
            && x <= self.config.world_width
            && y >= 0.0
            && y <= self.config.world_height;
        if !in_bounds {
            return MoveVerdict::RejectOutOfBounds;
        }

        if self.config.speed_check {
            let dist = ((x - player.x).powi(2) + (y - player.y).powi(2)).sqrt();
            if dist > self.config.max_speed * self.config.speed_buffer {
                return MoveVerdict::RejectSpeedViolation;
            }
        }

        MoveVerdict::Accept
    }
}
