use std::ffi::{CStr, CString};

use tracing::Level;

use super::Sink;

/// `openlog` keeps the pointer, so the ident has to live forever
const IDENT: &CStr = c"udptunnel";
const FORMAT: &CStr = c"%s";

/// Writes log lines to the system logger, facility `LOG_DAEMON`.
pub struct Syslog {
    _private: (),
}

impl Syslog {
    pub fn open() -> Self {
        unsafe {
            libc::openlog(IDENT.as_ptr(), libc::LOG_PID | libc::LOG_NDELAY, libc::LOG_DAEMON);
        }

        Self { _private: () }
    }
}

impl Drop for Syslog {
    fn drop(&mut self) {
        unsafe { libc::closelog() }
    }
}

fn priority(level: Level) -> libc::c_int {
    match level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        _ => libc::LOG_DEBUG,
    }
}

impl Sink for Syslog {
    fn write(&self, level: Level, line: &str) {
        let line = match CString::new(line) {
            Ok(line) => line,
            Err(_) => match CString::new(line.replace('\0', "")) {
                Ok(line) => line,
                Err(_) => return,
            },
        };

        unsafe { libc::syslog(priority(level), FORMAT.as_ptr(), line.as_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities() {
        assert_eq!(priority(Level::ERROR), libc::LOG_ERR);
        assert_eq!(priority(Level::WARN), libc::LOG_WARNING);
        assert_eq!(priority(Level::INFO), libc::LOG_INFO);
        assert_eq!(priority(Level::TRACE), libc::LOG_DEBUG);
    }
}
