//! CLI command implementations.

pub mod config_cmd;
pub mod info;
pub mod run;
