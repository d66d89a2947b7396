//! # sprinkler-domain
//!
//! Pure domain model for the sprinkler controller.
//!
//! ## Responsibilities
//! - Foundational types: small integer identifiers, error taxonomy, timestamps
//! - Define **Zones** (one irrigation output line each)
//! - Define **Programs** (ordered zone runs on a weekly schedule)
//! - Weekly **day masks** and next-run computation
//! - The **catalog** of zone and program slots, with cascade rules
//! - Transient **execution state** and the **recovery** computation used
//!   to resume a program after a restart
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod catalog;
pub mod days;
pub mod execution;
pub mod program;
pub mod recovery;
pub mod zone;

/// Number of zone slots.
pub const MAX_ZONES: u8 = 8;

/// Number of program slots.
pub const MAX_PROGRAMS: u8 = 4;

/// Maximum number of zone references held by one program.
pub const MAX_ZONES_PER_PROGRAM: usize = 8;

/// Longest zone or program name, in characters.
pub const MAX_NAME_LEN: usize = 31;
