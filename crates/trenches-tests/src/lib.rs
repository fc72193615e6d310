//! Integration test suite for the Trenches league.
//!
//! Scenarios run the scoring engine, ranking, refresh and settlement
//! together over the in-memory store.

pub mod helpers;
