//! Data models for test suites
//!
//! Variants, test definitions and result types shared across the engine.

mod result;
mod test_def;
mod variant;

pub use result::{IterationOutcome, IterationResult, RunReport, Verdict};
pub use test_def::{
    test_identifier, SetupFunction, SetupOutput, TeardownFunction, Test, TestDefinition,
    TestFunction,
};
pub use variant::{Payload, Variants, BASE_VARIANT};
