//! # trenches-power: Calling power scoring engine.
//!
//! Turns a caller's call history into one comparable score:
//! - **Performance**: percentage gain from start to highest valuation.
//! - **Temporal weight**: a 24h ramp-up followed by hyperbolic weekly decay.
//! - **Formulas**: interchangeable bundles of weight, base, correction and
//!   constancy functions, selected through [`FormulaPreset`].
//! - **Normalization**: identity or a bounded sigmoid.
//!
//! Everything here is pure. The evaluation instant is always passed in.

pub mod aggregate;
pub mod engine;
pub mod formula;
pub mod performance;
pub mod sigmoid;
pub mod temporal;

pub use engine::{compute_power, CallingPowerEngine};
pub use formula::{FormulaPreset, PowerFormula};
pub use sigmoid::{Normalization, SigmoidNormalizer};
