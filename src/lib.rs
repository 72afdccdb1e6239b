//! World Sync Server Library
//!
//! A real-time authoritative server that keeps connected clients' view of a
//! shared 2D world synchronized at a fixed tick rate. Each room runs as an
//! independent actor task with grid-based area-of-interest filtering and a
//! snapshot/delta broadcast protocol over WebSocket.

pub mod config;
pub mod metrics;
pub mod net;
pub mod persist;
pub mod room;
pub mod util;
pub mod world;
