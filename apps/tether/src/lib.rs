//! # tether
//!
//! Library half of the operator binary, so the command implementations can
//! be exercised from integration tests.

pub mod cli;
