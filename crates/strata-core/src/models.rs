//! Domain models for Strata.
//!
//! These are the core types shared across all crates.

pub mod actor;
pub mod assignment;
pub mod group;
pub mod permission;
pub mod role;
pub mod user;
