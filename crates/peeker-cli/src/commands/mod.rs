//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod decode;
pub mod device;
pub mod pattern;
pub mod serve;
