//! Action scheduling, validation and publication gating for automated pull requests.
//!
//! A run schedules a dependency graph of actions against one shared context,
//! validates the files those actions produced, and gates publication on the
//! resulting score. The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (ready set, selection, scoring, gating).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (processes, files, advisor, config).
//!   Behind traits so tests can script them.
//!
//! Orchestration modules ([`scheduler`], [`validate`], [`pipeline`]) coordinate
//! core logic with I/O to implement CLI commands.

pub mod actions;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
