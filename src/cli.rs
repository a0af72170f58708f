use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgGroup, Parser};

/// Long flags also accepted with a single leading dash, e.g. `-listen`.
const SINGLE_DASH_FLAGS: &[&str] = &[
    "listen",
    "connect",
    "udp",
    "verbose",
    "syslog",
    "keepalive",
    "config",
    "help",
];

#[derive(Debug, Parser)]
#[command(
    name = "udptunnel",
    version,
    about = "Tunnel UDP datagrams over a TCP connection"
)]
#[command(group(ArgGroup::new("role").args(["listen", "connect"]).multiple(false)))]
pub struct Cli {
    /// Run as server, accept tunnel connections on this TCP address
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Run as client, connect to the tunnel server at this TCP address
    #[arg(long, value_name = "ADDR")]
    pub connect: Option<String>,

    /// Server: UDP target to forward to. Client: local UDP address to
    /// listen on [default: 127.0.0.1:20000]
    #[arg(long, value_name = "ADDR")]
    pub udp: Option<String>,

    /// Log dropped datagrams, keepalives and new connections
    #[arg(long)]
    pub verbose: bool,

    /// Send logs to syslog instead of stdout
    #[arg(long)]
    pub syslog: bool,

    /// Seconds without UDP traffic before a keepalive frame is sent
    #[arg(long, value_name = "SECS")]
    pub keepalive: Option<u64>,

    /// Optional YAML configuration file, flags take precedence over it
    #[arg(long, env = "UDPTUNNEL_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Rewrite `-flag` and `-flag=value` spellings of the long flags into
/// their `--flag` form. The program name is left untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(i, arg)| match arg.to_str() {
            Some(s) if i > 0 && is_single_dash_flag(s) => OsString::from(format!("-{}", s)),
            _ => arg,
        })
        .collect()
}

fn is_single_dash_flag(arg: &str) -> bool {
    let name = match arg.strip_prefix('-') {
        Some(rest) if !rest.starts_with('-') => rest,
        _ => return false,
    };
    let name = name.split_once('=').map_or(name, |(name, _)| name);

    SINGLE_DASH_FLAGS.contains(&name)
}
