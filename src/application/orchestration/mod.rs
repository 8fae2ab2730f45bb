//! Engine wiring: feed, detector, risk, executor.

pub mod engine;

pub use engine::{Engine, EngineInput, EngineParts, EngineSummary};
