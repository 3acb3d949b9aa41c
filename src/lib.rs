//! Adaptive typing-speed trainer.
//!
//! The library holds the practice engine (timing, scheduling, targets), the
//! persisted models and the dual-layer persistence. The `wordpace` binary is
//! a terminal front end over it.

pub mod config;
pub mod engine;
pub mod model;
pub mod session;
pub mod store;
