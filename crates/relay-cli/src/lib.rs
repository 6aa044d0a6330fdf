//! Library half of the `relay` binary, so command implementations can be
//! exercised from integration tests.

pub mod commands;
