use std::fmt::Formatter;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::Level;
use tunnel::{SessionOpts, TcpSocketOpts, DEFAULT_KEEPALIVE_INTERVAL};

use crate::cli::Cli;
use crate::relay::{client, server};

const DEFAULT_UDP_ADDR: &str = "127.0.0.1:20000";

fn default_udp() -> String {
    DEFAULT_UDP_ADDR.to_string()
}

const fn default_keepalive() -> u64 {
    DEFAULT_KEEPALIVE_INTERVAL.as_secs()
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Log {
    /// Defaults to `debug` when verbose, `info` otherwise
    #[serde(default, deserialize_with = "deserialize_log_level")]
    pub level: Option<Level>,

    #[serde(default = "default_true")]
    pub timestamp: bool,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: None,
            timestamp: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tcp {
    #[serde(default = "default_true")]
    pub nodelay: bool,

    /// Idle seconds before TCP keepalive probes are sent
    pub keepalive: Option<u64>,
}

impl Default for Tcp {
    fn default() -> Self {
        Self {
            nodelay: true,
            keepalive: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Worker threads for tokio runtime, if it is not set,
    /// use num_cpu::get()
    pub worker: Option<usize>,

    pub listen: Option<String>,

    pub connect: Option<String>,

    #[serde(default = "default_udp")]
    pub udp: String,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub syslog: bool,

    /// Keepalive interval in seconds
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,

    #[serde(default)]
    pub log: Log,

    #[serde(default)]
    pub tcp: Tcp,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker: None,
            listen: None,
            connect: None,
            udp: default_udp(),
            verbose: false,
            syslog: false,
            keepalive: default_keepalive(),
            log: Log::default(),
            tcp: Tcp::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Server { listen: String },
    Client { connect: String },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("read config failed, {0}")]
    Io(#[from] std::io::Error),

    #[error("deserialize config failed, {0}")]
    Deserialize(#[from] serde_yaml::Error),

    #[error("you need to specify exactly one of listen/connect")]
    Role,

    #[error("keepalive interval must be greater than zero")]
    InvalidKeepalive,
}

impl Config {
    /// Build the configuration from the optional file named by `cli`, then
    /// apply the flags on top of it.
    pub fn load(cli: Cli) -> Result<Self, Error> {
        let mut conf = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        // a role given on the command line replaces the file's role entirely
        if cli.listen.is_some() || cli.connect.is_some() {
            conf.listen = cli.listen;
            conf.connect = cli.connect;
        }
        if let Some(udp) = cli.udp {
            conf.udp = udp;
        }
        if let Some(keepalive) = cli.keepalive {
            conf.keepalive = keepalive;
        }
        conf.verbose |= cli.verbose;
        conf.syslog |= cli.syslog;

        if conf.keepalive == 0 {
            return Err(Error::InvalidKeepalive);
        }

        Ok(conf)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read(path)?;
        let cfg = serde_yaml::from_slice::<Config>(content.as_slice())?;

        Ok(cfg)
    }

    pub fn role(&self) -> Result<Role, Error> {
        match (&self.listen, &self.connect) {
            (Some(listen), None) => Ok(Role::Server {
                listen: listen.clone(),
            }),
            (None, Some(connect)) => Ok(Role::Client {
                connect: connect.clone(),
            }),
            _ => Err(Error::Role),
        }
    }

    pub fn worker(&self) -> usize {
        if let Some(worker) = self.worker {
            worker
        } else {
            num_cpus::get()
        }
    }

    pub fn log_level(&self) -> Level {
        match self.log.level {
            Some(level) => level,
            None if self.verbose => Level::DEBUG,
            None => Level::INFO,
        }
    }

    pub fn session_opts(&self) -> SessionOpts {
        SessionOpts {
            verbose: self.verbose,
            keepalive: Duration::from_secs(self.keepalive),
        }
    }

    pub fn tcp_opts(&self) -> TcpSocketOpts {
        TcpSocketOpts {
            nodelay: self.tcp.nodelay,
            keepalive: self.tcp.keepalive.map(Duration::from_secs),
        }
    }

    pub fn server(&self, listen: String) -> server::Config {
        server::Config {
            listen,
            udp: self.udp.clone(),
            session: self.session_opts(),
            tcp: self.tcp_opts(),
        }
    }

    pub fn client(&self, connect: String) -> client::Config {
        client::Config {
            connect,
            udp: self.udp.clone(),
            session: self.session_opts(),
            tcp: self.tcp_opts(),
        }
    }
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<Option<Level>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor {}

    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = Level;

        fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
            formatter.write_str("trace, debug, info, warn and error")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Level::from_str(v)
                .map_err(|err| serde::de::Error::custom(format!("invalid level {}", err)))
        }
    }

    deserializer.deserialize_any(Visitor {}).map(Some)
}
