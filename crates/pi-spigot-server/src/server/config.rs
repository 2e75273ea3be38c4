//! Command line and environment configuration for the server binary.

use anyhow::bail;
use clap::Parser;
use pi_spigot::{MAX_REQUEST_DIGITS, PoolConfig, RespawnPolicy};
use std::time::Duration;

/// Runtime configuration for the `pi-spigot-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first when present). The defaults reproduce the classic
/// deployment: three workers listening on port 3000 and at most 257 digits.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pi-spigot-server",
    version,
    about = "An HTTP service computing digits of pi over a BBP worker pool"
)]
pub struct CliArgs {
    /// Number of worker threads extracting digits in parallel.
    ///
    /// Every cycle of a request is split across all of them, so this is also
    /// the maximum parallelism of a single request.
    ///
    /// Environment variable: `WORKER_POOL_SIZE`
    #[arg(long, env = "WORKER_POOL_SIZE", default_value_t = 3)]
    pub worker_pool_size: usize,

    /// Interface to bind.
    ///
    /// Environment variable: `HOST`
    #[arg(long, env = "HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// TCP port to listen on.
    ///
    /// Environment variable: `PORT`
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Largest `n` a client may request.
    ///
    /// Past a few hundred positions the `f64` spigot starts losing digits, so
    /// raise this with care.
    ///
    /// Environment variable: `MAX_DIGITS`
    #[arg(long, env = "MAX_DIGITS", default_value_t = 257)]
    pub max_digits: u64,

    /// Leave crashed workers dead instead of replacing them.
    ///
    /// Every request reaching a dead worker then fails until restart.
    ///
    /// Environment variable: `NO_RESPAWN`
    #[arg(long, env = "NO_RESPAWN", default_value_t = false)]
    pub no_respawn: bool,

    /// Seconds to wait for each shutdown phase of the worker pool.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub pool: PoolConfig,
    pub max_digits: u64,
    pub server_addr: String,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.worker_pool_size == 0 {
            bail!("WORKER_POOL_SIZE must be greater than 0");
        }

        if args.max_digits == 0 {
            bail!("MAX_DIGITS must be greater than 0");
        }

        if args.max_digits > MAX_REQUEST_DIGITS {
            bail!(
                "MAX_DIGITS ({}) exceeds the largest supported request (max = {})",
                args.max_digits,
                MAX_REQUEST_DIGITS
            );
        }

        let respawn = if args.no_respawn {
            RespawnPolicy::Never
        } else {
            RespawnPolicy::OnFailure
        };

        Ok(Self {
            pool: PoolConfig {
                size: args.worker_pool_size,
                respawn,
                shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            },
            max_digits: args.max_digits,
            server_addr: format!("{}:{}", args.host, args.port),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let argv = std::iter::once("pi-spigot-server").chain(args.iter().copied());
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--worker-pool-size",
            "8",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--max-digits",
            "100",
            "--no-respawn",
            "--shutdown-timeout",
            "1",
        ])
        .unwrap();

        assert_eq!(config.pool.size, 8);
        assert_eq!(config.pool.respawn, RespawnPolicy::Never);
        assert_eq!(config.pool.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.max_digits, 100);
        assert_eq!(config.server_addr, "127.0.0.1:8080");
    }

    #[test]
    fn empty_pool_is_rejected() {
        let err = parse(&["--worker-pool-size", "0"]).unwrap_err();
        assert!(err.to_string().contains("WORKER_POOL_SIZE"));
    }

    #[test]
    fn zero_max_digits_is_rejected() {
        let err = parse(&["--max-digits", "0"]).unwrap_err();
        assert!(err.to_string().contains("MAX_DIGITS"));
    }

    #[test]
    fn oversized_max_digits_is_rejected() {
        let too_many = (MAX_REQUEST_DIGITS + 1).to_string();
        let err = parse(&["--max-digits", too_many.as_str()]).unwrap_err();
        assert!(err.to_string().contains("MAX_DIGITS"));
    }
}
