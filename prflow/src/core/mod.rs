//! Deterministic, pure logic shared by the scheduler and the validator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod action;
pub mod context;
pub mod extract;
pub mod gate;
pub mod lint;
pub mod progress;
pub mod registry;
pub mod score;
pub mod selector;
pub mod syntax;
pub mod types;
