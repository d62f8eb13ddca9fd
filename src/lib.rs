//! Library crate for regresshion-check exposing reusable modules.
pub mod classify;
pub mod error;
pub mod ports;
pub mod probe;
pub mod report;
pub mod scanner;
pub mod targets;
pub mod types;
pub mod versions;
