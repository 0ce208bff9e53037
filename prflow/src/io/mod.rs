//! I/O helpers: processes, files, config, advisor and reports.

pub mod advisor;
pub mod config;
pub mod init;
pub mod process;
pub mod prompt;
pub mod report;
pub mod runner;
