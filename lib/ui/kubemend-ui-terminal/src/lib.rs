//! Command-line front end.

pub mod cli;
pub mod commands;
pub mod format;
pub mod logging;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use kubemend_adapter_assistant::ChatCompletionsAssistant;
use kubemend_adapter_kube::KubeClusterPort;
use kubemend_application::Runtime;
use kubemend_domain::KubemendConfig;
use kubemend_ports::PortSet;

pub use cli::{Cli, Command, OutputFormat};
pub use logging::init_tracing;

/// Resolve the configuration file and apply command-line overrides.
pub fn load_config(cli: &Cli) -> Result<KubemendConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(KubemendConfig::default_path);
    let mut config = KubemendConfig::load_or_default(&path)?;
    if let Some(kubeconfig) = &cli.kubeconfig {
        config.cluster.kubeconfig = Some(kubeconfig.clone());
    }
    if let Some(context) = &cli.context {
        config.cluster.context = Some(context.clone());
    }
    Ok(config)
}

pub async fn build_runtime(config: &KubemendConfig) -> Result<Runtime> {
    let cluster = KubeClusterPort::connect(&config.cluster).await?;
    let assistant = ChatCompletionsAssistant::new(&config.assistant)?;
    if !assistant.has_credentials() {
        warn!(
            env = %config.assistant.api_key_env,
            "no diagnostic assistant credential; diagnosis will be unavailable"
        );
    }
    let ports = PortSet::new(Arc::new(cluster), Arc::new(assistant));
    Ok(Runtime::new(ports, config.monitoring.clone()))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

pub async fn run() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let runtime = build_runtime(&config).await?;
    let mut stdout = std::io::stdout();
    match cli.command {
        Command::Monitor(args) => {
            commands::monitor(&runtime, args, cli.format, shutdown_signal(), &mut stdout).await
        }
        command => commands::execute(&runtime, command, cli.format, &mut stdout).await,
    }
}
