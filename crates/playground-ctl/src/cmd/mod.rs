//! CLI command modules.

pub mod cache;
pub mod http;
pub mod key;
pub mod run;
