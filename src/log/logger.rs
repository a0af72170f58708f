use std::cell::RefCell;
use std::error::Error;
use std::fmt;
use std::fmt::Write;
use std::fmt::{Debug, Display};

use tracing::field::Field;
use tracing::span::{Attributes, Record};
use tracing::{field, Event, Id, Level, Metadata, Subscriber};

/// Destination of formatted log lines.
pub trait Sink: Send + Sync + 'static {
    fn write(&self, level: Level, line: &str);
}

/// A span-less subscriber rendering each event as one line of
/// `module message key=value...` and handing it to a `Sink`.
pub struct Logger<S> {
    level: Level,
    sink: S,
}

impl<S: Sink> Logger<S> {
    pub fn new(level: Level, sink: S) -> Self {
        Self { level, sink }
    }
}

impl<S: Sink> Subscriber for Logger<S> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= self.level
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        // spans are never enabled, see above
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        thread_local! {
            static BUF: RefCell<String> = RefCell::new(String::new());
        }

        BUF.with(|buf| {
            let borrow = buf.try_borrow_mut();
            let mut a;
            let mut b;
            let buf = match borrow {
                Ok(buf) => {
                    a = buf;
                    &mut *a
                }
                _ => {
                    b = String::new();
                    &mut b
                }
            };

            let metadata = event.metadata();

            if let Some(module) = metadata.module_path() {
                buf.push_str(module);
                buf.push(' ');
            }

            event.record(&mut Visitor { buf: &mut *buf });

            self.sink.write(*metadata.level(), buf);

            buf.clear();
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Renders an error into a list of sources, *including* the error
struct ErrorSourceList<'a>(&'a (dyn std::error::Error + 'static));

impl<'a> Display for ErrorSourceList<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        let mut curr = Some(self.0);
        while let Some(curr_err) = curr {
            list.entry(&format_args!("{}", curr_err));
            curr = curr_err.source();
        }
        list.finish()
    }
}

struct Visitor<'a> {
    buf: &'a mut String,
}

impl<'a> field::Visit for Visitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.record_debug(field, &format_args!("{}", value))
        } else {
            self.record_debug(field, &value)
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if let Some(source) = value.source() {
            self.record_debug(
                field,
                &format_args!("{}, {}.sources: {}", value, field, ErrorSourceList(source)),
            )
        } else {
            self.record_debug(field, &format_args!("{}", value))
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        // writing into a String never fails
        let _ = match field.name() {
            "message" => write!(self.buf, "{:?}", value),
            name => {
                let name = name.strip_prefix("r#").unwrap_or(name);
                write!(self.buf, " {}={:?}", name, value)
            }
        };
    }
}
