use std::process::exit;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use udptunnel::cli::{normalize_args, Cli};
use udptunnel::config::{Config, Role};
use udptunnel::relay::{self, client::Client, server::Server};

fn main() {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    let conf = match Config::load(cli) {
        Ok(conf) => conf,
        Err(err) => {
            eprintln!("Error: load config failed, {}", err);
            exit(1);
        }
    };

    let role = match conf.role() {
        Ok(role) => role,
        Err(err) => {
            eprintln!("Error: {}", err);
            exit(1);
        }
    };

    udptunnel::trace::init(conf.log_level(), conf.log.timestamp, conf.syslog);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(conf.worker())
        .thread_name("udptunnel-worker")
        .enable_io()
        .enable_time()
        .build()
        .expect("build tokio runtime failed");

    let code = runtime.block_on(async move {
        let shutdown = CancellationToken::new();

        tokio::select! {
            signal = udptunnel::signals::shutdown() => {
                info!(message = "shutdown signal received", signal);
                shutdown.cancel();
                0
            },
            result = run(role, &conf, shutdown.clone()) => match result {
                Ok(()) => 0,
                Err(err) => {
                    error!(message = "udp tunnel terminated", %err);
                    eprintln!("Error: {}", err);
                    1
                }
            },
        }
    });

    runtime.shutdown_timeout(Duration::from_secs(5));
    exit(code);
}

async fn run(role: Role, conf: &Config, shutdown: CancellationToken) -> Result<(), relay::Error> {
    match role {
        Role::Server { listen } => {
            let server = Server::bind(conf.server(listen)).await?;
            server.serve(shutdown).await
        }
        Role::Client { connect } => {
            let client = Client::connect(conf.client(connect)).await?;
            client.run(&shutdown).await
        }
    }
}
