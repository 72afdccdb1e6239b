//! Room lifecycle: one actor task per room, tracked in a shared table.

pub mod actor;
pub mod manager;
