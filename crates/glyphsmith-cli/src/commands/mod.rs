//! CLI command implementations

pub mod generate;
pub mod icon;
pub mod round;
pub mod sizes;
