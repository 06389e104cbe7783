pub mod indicators;
pub mod engine;
pub mod patterns;
pub mod structure;
pub mod analyzer;

#[cfg(test)]
mod indicators_tests;

pub use engine::*;
pub use patterns::*;
pub use structure::*;
pub use analyzer::*;
