//! Library crate for proxy-probe exposing reusable modules.
pub mod aggregator;
pub mod candidates;
pub mod config;
pub mod evaluator;
pub mod output;
pub mod pool;
pub mod probe;
pub mod types;
