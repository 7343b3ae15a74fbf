#![forbid(unsafe_code)]

//! SQLite-backed versioning engine: append-only record versions, isolated
//! branches over a single trunk and an atomic merge back into it.

mod store;

pub use store::*;
