//! # trenches-core
//! Foundation types and traits for the Trenches league.

pub mod constants;
pub mod error;
pub mod memory;
pub mod traits;
pub mod types;
