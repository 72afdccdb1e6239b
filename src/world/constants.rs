//! World and synchronization tuning constants.

/// World geometry
pub mod world {
    /// World width in units
    pub const WIDTH: f64 = 5000.0;
    /// World height in units
    pub const HEIGHT: f64 = 5000.0;
    /// Side length of one AOI grid cell
    pub const CELL_SIZE: f64 = 200.0;
    /// Lower bound of the random spawn area on each axis
    pub const SPAWN_MIN: f64 = 50.0;
    /// Upper bound of the random spawn area on each axis
    pub const SPAWN_MAX: f64 = 350.0;
}

/// Tick and broadcast scheduling
pub mod sync {
    /// Room tick rate in Hz
    pub const TICK_RATE: u32 = 15;
    /// Tick period in milliseconds
    pub const TICK_INTERVAL_MS: u64 = 1000 / TICK_RATE as u64;
    /// Minimum time between full snapshots per room
    pub const SNAPSHOT_INTERVAL_MS: u64 = 3000;
}

/// Movement validation
pub mod movement {
    /// Minimum time between accepted moves per player (20 Hz cap)
    pub const THROTTLE_MS: u64 = 50;
    /// Nominal maximum speed in units per accepted move
    pub const MAX_SPEED: f64 = 20.0;
    /// Slack multiplier on MAX_SPEED for lag spikes and jitter
    pub const SPEED_BUFFER: f64 = 5.0;
}

/// World-object interaction
pub mod interaction {
    /// Collision radius for pickups
    pub const PICKUP_RADIUS: f64 = 50.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval() {
        assert_eq!(sync::TICK_INTERVAL_MS, 66);
    }

    #[test]
    fn test_spawn_area_inside_world() {
        assert!(world::SPAWN_MIN >= 0.0);
        assert!(world::SPAWN_MAX <= world::WIDTH);
        assert!(world::SPAWN_MAX <= world::HEIGHT);
    }

    #[test]
    fn test_throttle_faster_than_tick() {
        // Clients may move at most once per throttle window; the window must
        // not be slower than the tick or accepted moves would queue up.
        assert!(movement::THROTTLE_MS <= sync::TICK_INTERVAL_MS);
    }

    #[test]
    fn test_speed_budget() {
        assert_eq!(movement::MAX_SPEED * movement::SPEED_BUFFER, 100.0);
    }
}
