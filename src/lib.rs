//! Workout Engine: template-driven generation of timed, spoken workout scripts.
//!
//! Assembles pre-authored content blocks into a script for a requested sport
//! and goal, balancing variety across sessions, landing near a target
//! duration, and applying sport-specific structure (surprise rounds, vinyasa
//! transitions, difficulty progression).

pub mod core;
pub mod schema;
