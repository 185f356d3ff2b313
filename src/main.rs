//! # scanlens
//!
//! Relay binary: loads settings, starts logging, connects to Workers AI and
//! serves the chat WebSocket until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scanlens_llm::{WorkersAiClient, WorkersAiConfig};
use scanlens_logging::LoggingConfig;
use scanlens_server::{ScanlensServer, ServerConfig};
use scanlens_settings::ScanlensSettings;
use secrecy::SecretString;

/// Security scan assistant relay.
#[derive(Parser, Debug)]
#[command(name = "scanlens", about = "Chat relay between scan-log clients and a hosted LLM")]
struct Cli {
    /// Settings file (defaults to `~/.scanlens/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Model identifier (overrides settings).
    #[arg(long)]
    model: Option<String>,
}

impl Cli {
    /// CLI flags win over file and environment.
    fn apply(&self, settings: &mut ScanlensSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(model) = &self.model {
            settings.inference.model.clone_from(model);
        }
    }
}

fn server_config(settings: &ScanlensSettings) -> ServerConfig {
    ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        model: settings.inference.model.clone(),
        ..ServerConfig::default()
    }
}

fn workers_ai_config(settings: &ScanlensSettings) -> Result<WorkersAiConfig> {
    let inference = &settings.inference;
    let account_id = inference
        .account_id
        .clone()
        .context("missing Cloudflare account ID (set CLOUDFLARE_ACCOUNT_ID or inference.accountId)")?;
    let api_token = inference
        .api_token
        .clone()
        .context("missing Cloudflare API token (set CLOUDFLARE_API_TOKEN or inference.apiToken)")?;

    Ok(WorkersAiConfig::new(account_id, SecretString::from(api_token))
        .with_base_url(inference.base_url.clone())
        .with_connect_timeout(Duration::from_secs(inference.connect_timeout_secs)))
}

fn report_shutdown(drained: bool) {
    if drained {
        tracing::info!("Shutdown complete");
    } else {
        tracing::warn!("Shutdown forced: server task aborted before draining");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(scanlens_settings::settings_path);
    let mut settings = scanlens_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings);

    let installed = scanlens_logging::init_logging(&LoggingConfig {
        level: settings.logging.level.clone(),
        json: settings.logging.json,
    });
    if !installed {
        tracing::debug!("global subscriber already set, keeping it");
    }
    tracing::debug!(path = %settings_path.display(), ?settings, "settings loaded");

    let inference = WorkersAiClient::new(workers_ai_config(&settings)?)
        .context("Failed to build Workers AI client")?;

    let server = ScanlensServer::new(server_config(&settings), Arc::new(inference));
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("scanlens listening on http://{addr} (WebSocket at ws://{addr}/connect)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    report_shutdown(server.shutdown().drain(handle, None).await);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_credentials() -> ScanlensSettings {
        let mut s = ScanlensSettings::default();
        s.inference.account_id = Some("acct".into());
        s.inference.api_token = Some("tok".into());
        s
    }

    #[test]
    fn forced_shutdown_is_a_warning() {
        let (logs, _guard) = scanlens_logging::capture_logs();
        report_shutdown(true);
        report_shutdown(false);
        assert!(logs.has_event(tracing::Level::INFO, "Shutdown complete"));
        assert!(logs.has_event(tracing::Level::WARN, "Shutdown forced"));
    }

    #[test]
    fn cli_defaults_are_empty() {
        let cli = Cli::try_parse_from(["scanlens"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.model.is_none());
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::try_parse_from([
            "scanlens",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--model",
            "@cf/other",
            "--config",
            "/tmp/s.json",
        ])
        .unwrap();
        let mut s = ScanlensSettings::default();
        cli.apply(&mut s);
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.inference.model, "@cf/other");
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.json")));
    }

    #[test]
    fn cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["scanlens", "--port", "70000"]).is_err());
    }

    #[test]
    fn server_config_from_settings() {
        let cfg = server_config(&ScanlensSettings::default());
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8787);
        assert_eq!(cfg.model, "@cf/meta/llama-3-8b-instruct");
    }

    #[test]
    fn workers_ai_config_requires_credentials() {
        let err = workers_ai_config(&ScanlensSettings::default()).unwrap_err();
        assert!(err.to_string().contains("account ID"));

        let mut s = ScanlensSettings::default();
        s.inference.account_id = Some("acct".into());
        let err = workers_ai_config(&s).unwrap_err();
        assert!(err.to_string().contains("API token"));
    }

    #[test]
    fn workers_ai_config_from_settings() {
        let mut s = settings_with_credentials();
        s.inference.base_url = "http://localhost:9".into();
        let cfg = workers_ai_config(&s).unwrap();
        assert_eq!(cfg.account_id, "acct");
        assert_eq!(cfg.base_url, "http://localhost:9");
    }
}
