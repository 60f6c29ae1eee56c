//! Shellgate Library
//!
//! Runs shell commands on behalf of an agent: one child process per
//! invocation, confirmation before untrusted commands, incremental output
//! and cancellation that takes down the whole process tree.

pub mod approval;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod tools;
