mod logger;
mod syslog;

pub use logger::{Logger, Sink};
pub use syslog::Syslog;
