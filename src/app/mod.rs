pub mod config;
pub mod logging;
pub mod shutdown;

pub use config::{Command, Config, ConfigError, LogLevel};
pub use logging::{LoggingError, LoggingSystem, setup_logging};

use crate::ack::{Beacon, Milestone};
use crate::domain::{ApiCall, ErrorParams};
use crate::probe::{ProcessAdapter, ProcessProbe, Transport, install_panic_hook};
use crate::sender::{HttpSender, SenderConfig, StdoutSender};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub struct App {
    config: Config,
    beacon: Beacon,
    adapter: Arc<ProcessAdapter>,
}

impl App {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let (file_patch, cli_patch) = config.resolve().context("invalid beacon configuration")?;

        let mut probe = ProcessProbe::new();
        if let Some(network) = &config.network {
            probe = probe.with_network(network.clone());
        }

        let transport = if config.dry_run {
            Transport::Stdout(StdoutSender::new())
        } else {
            let sender_config = SenderConfig {
                timeout: config.timeout(),
                ..SenderConfig::default()
            };
            Transport::Http(HttpSender::new(sender_config).context("failed to create HTTP sender")?)
        };

        let adapter = Arc::new(ProcessAdapter::new(probe, transport));
        let beacon = Beacon::new(file_patch, adapter.clone()).context("failed to create beacon")?;
        beacon.set_options(cli_patch);
        adapter.probe().mark(Milestone::ContentLoaded);

        let options = beacon.options();
        if options.is_enabled() {
            info!(app = %options.app, host = %options.host, sample = options.sample, "beacon configured");
        } else {
            warn!("No app configured, nothing will be delivered");
        }

        Ok(Self {
            config,
            beacon,
            adapter,
        })
    }

    pub fn beacon(&self) -> &Beacon {
        &self.beacon
    }

    pub async fn run(self) -> anyhow::Result<()> {
        install_panic_hook(self.beacon.clone());

        let beacon = &self.beacon;
        match self.config.command.clone() {
            Command::Error {
                message,
                error_type,
                file,
                line,
                column,
                stack,
            } => {
                let params = file.map(|file| {
                    ErrorParams::new(file, line, column).with_stack(stack.unwrap_or_default())
                });
                let outcome = beacon.ack_error(&message, error_type.as_deref(), params);
                info!(?outcome, "error submitted");
            }
            Command::Api {
                api,
                failed,
                cost,
                code,
                detail,
            } => {
                let mut call = ApiCall::new(api, !failed);
                call.cost = cost;
                call.code = code;
                call.detail = detail;
                let outcome = beacon.ack_api(call);
                info!(?outcome, "api outcome submitted");
            }
            Command::Count { name } => {
                let outcome = beacon.ack_count(&name);
                info!(?outcome, "count submitted");
            }
            Command::Stat { name, value } => {
                let outcome = beacon.ack_statistic(&name, value);
                info!(?outcome, "statistic submitted");
            }
            Command::Log { message } => {
                let outcome = beacon.ack_log(&message);
                info!(?outcome, "log submitted");
            }
            Command::Ready => {
                beacon.ready();
            }
            Command::Pipe => {
                let forwarded = pipe_stdin(beacon).await?;
                info!(lines = forwarded, "stdin closed");
            }
        }

        let flushed = shutdown::drain(beacon, &self.adapter, self.config.timeout()).await;
        info!(flushed, stats = ?beacon.stats(), "beacon drained");
        Ok(())
    }
}

/// Forwards each stdin line as a LOG record until EOF or a shutdown signal.
async fn pipe_stdin(beacon: &Beacon) -> anyhow::Result<usize> {
    let token = shutdown::shutdown_token();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut forwarded = 0;

    beacon.ready();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) if line.is_empty() => {}
                    Some(line) => {
                        beacon.ack_log(&line);
                        forwarded += 1;
                    }
                    None => break,
                }
            }
        }
    }

    Ok(forwarded)
}

pub async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    if let Err(e) = setup_logging(config.log_level) {
        eprintln!("Warning: {e}");
    }

    App::from_config(config)?.run().await
}
