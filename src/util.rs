//! Small shared helpers.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::world::constants::world;

/// Milliseconds since the Unix epoch, as carried in wire `ts` fields.
#[inline]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Random spawn position inside the starting area near the world origin.
pub fn random_spawn() -> (f64, f64) {
    let mut rng = rand::thread_rng();
    (
        rng.gen_range(world::SPAWN_MIN..world::SPAWN_MAX),
        rng.gen_range(world::SPAWN_MIN..world::SPAWN_MAX),
    )
}

/// Random `#rrggbb` player color.
pub fn random_color() -> String {
    let mut rng = rand::thread_rng();
    format!("#{:06x}", rng.gen_range(0u32..0x100_0000))
}
