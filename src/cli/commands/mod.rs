//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod distribute;
pub mod init;
pub mod status;
pub mod validate;
