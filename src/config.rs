//! Command-line configuration of a model-server instance.

use anyhow::{Context, Result, anyhow, bail};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_STORE_NAME: &str = "modelStore";
pub const DEFAULT_PARTITIONS: u32 = 8;
pub const DEFAULT_REBALANCE_MS: u64 = 1000;

/// Offset between the gossip port and the HTTP port when `--http` is not given.
pub const HTTP_PORT_OFFSET: u16 = 1000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub seeds: Vec<SocketAddr>,
    pub partitions: u32,
    pub store_name: String,
    pub log_level: tracing::Level,
    pub rebalance_interval: Duration,
    /// Unrecognized arguments, reported once logging is up.
    pub ignored: Vec<String>,
}

impl ServerConfig {
    pub fn usage(program: &str) -> String {
        format!(
            "Usage: {program} --bind <addr:port> [--seed <addr:port>]... [--http <addr:port>]\n\
             \x20      [--partitions <n>] [--store <name>] [--log-level <level>] [--rebalance-ms <ms>]\n\
             Example: {program} --bind 127.0.0.1:5000\n\
             Example: {program} --bind 127.0.0.1:5001 --seed 127.0.0.1:5000"
        )
    }

    /// Parses `args` as passed to the process, program name first.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut bind_addr: Option<SocketAddr> = None;
        let mut http_addr: Option<SocketAddr> = None;
        let mut seeds: Vec<SocketAddr> = vec![];
        let mut partitions = DEFAULT_PARTITIONS;
        let mut store_name = DEFAULT_STORE_NAME.to_string();
        let mut log_level = tracing::Level::INFO;
        let mut rebalance_ms = DEFAULT_REBALANCE_MS;
        let mut ignored = Vec::new();

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = || {
                args.get(i + 1)
                    .map(String::as_str)
                    .ok_or_else(|| anyhow!("{} requires a value", flag))
            };

            match flag {
                "--bind" => {
                    bind_addr = Some(value()?.parse().context("invalid --bind address")?);
                }
                "--http" => {
                    http_addr = Some(value()?.parse().context("invalid --http address")?);
                }
                "--seed" => {
                    seeds.push(value()?.parse().context("invalid --seed address")?);
                }
                "--partitions" => {
                    partitions = value()?.parse().context("invalid --partitions")?;
                    if partitions == 0 {
                        bail!("--partitions must be at least 1");
                    }
                }
                "--store" => {
                    store_name = value()?.to_string();
                }
                "--log-level" => {
                    log_level = value()?
                        .parse()
                        .map_err(|_| anyhow!("invalid --log-level"))?;
                }
                "--rebalance-ms" => {
                    rebalance_ms = value()?.parse().context("invalid --rebalance-ms")?;
                }
                _ => {
                    ignored.push(flag.to_string());
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        let bind_addr = bind_addr.ok_or_else(|| anyhow!("--bind is required"))?;
        let http_addr = match http_addr {
            Some(addr) => addr,
            None if bind_addr.port() == 0 => {
                bail!("--http is required when --bind uses port 0");
            }
            None => {
                let port = bind_addr
                    .port()
                    .checked_add(HTTP_PORT_OFFSET)
                    .ok_or_else(|| anyhow!("gossip port too high to derive an HTTP port"))?;
                SocketAddr::new(bind_addr.ip(), port)
            }
        };

        Ok(Self {
            bind_addr,
            http_addr,
            seeds,
            partitions,
            store_name,
            log_level,
            rebalance_interval: Duration::from_millis(rebalance_ms.max(10)),
            ignored,
        })
    }
}
