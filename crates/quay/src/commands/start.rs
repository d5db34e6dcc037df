//! Start command - launches the Quay demo server.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use quay_config::{QuayConfig, SessionSection};
use quay_server::{Server, ServerConfig};
use quay_session::SessionConfig;

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Mark the session cookie Secure (overrides config)
    #[arg(long)]
    pub secure: bool,

    /// Session data TTL in seconds (overrides config)
    #[arg(long)]
    pub ttl: Option<u64>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    if ctx.verbose {
        for path in loaded.loaded_from() {
            info!(path = %path.display(), "Loaded config file");
        }
    }

    let config = server_config(&args, &loaded.config)?;

    info!(
        addr = %config.bind_address,
        ttl_secs = config.session.ttl.as_secs(),
        secure = config.session.secure,
        "Starting Quay"
    );

    Server::new(config).run().await?;
    Ok(())
}

/// Resolve the server configuration from file values and CLI overrides.
fn server_config(args: &StartArgs, file: &QuayConfig) -> Result<ServerConfig> {
    let mut server = file.server();
    if let Some(bind) = &args.bind {
        server.bind = bind.clone();
    }
    if let Some(port) = args.port {
        server.port = port;
    }

    let bind_address: SocketAddr = server
        .address()
        .parse()
        .with_context(|| format!("invalid bind address '{}'", server.address()))?;

    let mut section = file.session();
    if args.secure {
        section.secure = true;
    }
    if let Some(ttl) = args.ttl {
        anyhow::ensure!(ttl > 0, "--ttl must be greater than zero");
        section.ttl_secs = ttl;
    }

    Ok(ServerConfig::new(session_config(&section))
        .with_bind_address(bind_address)
        .with_request_logging(server.request_logging))
}

/// Map the `[session]` table onto the engine's settings.
fn session_config(section: &SessionSection) -> SessionConfig {
    let mut config = SessionConfig::new()
        .with_ttl(Duration::from_secs(section.ttl_secs))
        .with_cookie_lifetime(Duration::from_secs(section.cookie_lifetime_secs))
        .with_cookie_name(section.cookie_name.clone())
        .with_secure(section.secure);

    if let Some(domain) = &section.domain {
        config = config.with_domain(domain.clone());
    }
    if let Some(salt) = &section.salt {
        config = config.with_salt(salt.clone());
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> StartArgs {
        StartArgs {
            port: None,
            bind: None,
            secure: false,
            ttl: None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = server_config(&args(), &QuayConfig::new()).unwrap();

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.session.ttl.as_secs(), 1_209_600);
        assert!(!config.session.secure);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = QuayConfig::from_toml(
            "[server]\nport = 9000\n[session]\nttl_secs = 60\nsalt = \"pepper\"\n",
        )
        .unwrap();
        let args = StartArgs {
            port: Some(3000),
            bind: Some("0.0.0.0".to_string()),
            secure: true,
            ttl: None,
        };

        let config = server_config(&args, &file).unwrap();

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.session.ttl.as_secs(), 60);
        assert!(config.session.secure);
        assert_eq!(config.session.salt, "pepper");
    }

    #[test]
    fn test_invalid_bind_address() {
        let args = StartArgs {
            bind: Some("not an address".to_string()),
            ..args()
        };

        assert!(server_config(&args, &QuayConfig::new()).is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let args = StartArgs {
            ttl: Some(0),
            ..args()
        };

        assert!(server_config(&args, &QuayConfig::new()).is_err());
    }
}
