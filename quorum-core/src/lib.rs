//! Domain model for the Quorum peer-review engine.
//!
//! This crate holds pure data: entity types, their small state machines,
//! and the panel decision rule. No I/O, no async, no clocks other than
//! timestamps passed in or taken at construction. The orchestration engine
//! in `quorum-engine` drives these types through injected ports.

pub mod ids;
pub mod invitation;
pub mod manuscript;
pub mod outcome;
pub mod review;
pub mod user;

pub use ids::*;
pub use invitation::*;
pub use manuscript::*;
pub use outcome::*;
pub use review::*;
pub use user::*;
