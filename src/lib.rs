pub mod cli;
pub mod config;
mod log;
pub mod relay;
pub mod signals;
pub mod trace;

#[macro_use]
extern crate tracing;

pub use config::Config;
