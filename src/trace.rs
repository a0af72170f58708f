use tracing::Level;
use tracing_subscriber::fmt::fmt;

use crate::log::{Logger, Syslog};

/// Install the process wide subscriber, stdout by default or the system
/// logger when `syslog` is set.
pub fn init(level: Level, timestamp: bool, syslog: bool) {
    if syslog {
        let logger = Logger::new(level, Syslog::open());
        if let Err(err) = tracing::subscriber::set_global_default(logger) {
            eprintln!("install syslog logger failed, {}", err);
        }

        return;
    }

    let base = fmt().with_max_level(level).with_target(false);

    if timestamp {
        base.init()
    } else {
        base.without_time().init()
    }
}

