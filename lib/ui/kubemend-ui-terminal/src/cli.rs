use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use kubemend_domain::MonitoringTarget;

#[derive(Debug, Parser)]
#[command(name = "kubemend")]
#[command(about = "Watch pod logs, classify errors, and remediate workloads")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (YAML)
    #[arg(long, env = "KUBEMEND_CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Kubeconfig file (overrides config)
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context (overrides config)
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List namespaces
    Namespaces,
    /// List pods in a namespace
    Pods {
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Fetch recent logs of a pod and classify them
    Logs {
        pod: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
        #[arg(short, long)]
        container: Option<String>,
    },
    /// Show Warning and Error events, newest first
    Events {
        /// Restrict to one namespace (all namespaces when omitted)
        #[arg(short, long)]
        namespace: Option<String>,
    },
    /// Delete a pod so its controller recreates it
    Restart {
        pod: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Ask the diagnostic assistant about log text
    Diagnose(DiagnoseArgs),
    /// Poll pods for errors until interrupted
    Monitor(MonitorArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct DiagnoseArgs {
    /// Read logs from this file instead of stdin
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Pod the logs came from; fixes target it
    #[arg(long)]
    pub pod: Option<String>,

    #[arg(long)]
    pub container: Option<String>,

    /// Apply high-confidence suggestions without confirmation
    #[arg(long)]
    pub apply_high: bool,
}

impl DiagnoseArgs {
    pub fn target(&self) -> Option<MonitoringTarget> {
        let pod = self.pod.as_ref()?;
        Some(MonitoringTarget::new(
            self.namespace.as_deref().unwrap_or("default"),
            pod.as_str(),
            self.container.clone(),
        ))
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct MonitorArgs {
    /// Namespace to watch; repeatable (configured namespaces when omitted)
    #[arg(short, long = "namespace")]
    pub namespaces: Vec<String>,

    /// Apply the built-in remediation for each error batch
    #[arg(long)]
    pub auto_fix: bool,

    /// Send each batch to the diagnostic assistant
    #[arg(long)]
    pub diagnose: bool,

    /// Apply high-confidence suggestions from diagnoses
    #[arg(long)]
    pub auto_apply: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_monitor_accepts_repeated_namespaces() {
        let cli = Cli::try_parse_from([
            "kubemend", "monitor", "-n", "prod", "-n", "staging", "--auto-fix",
        ])
        .unwrap();
        let Command::Monitor(args) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(args.namespaces, vec!["prod", "staging"]);
        assert!(args.auto_fix);
        assert!(!args.auto_apply);
    }

    #[test]
    fn test_pod_commands_take_namespace_flag() {
        let cli = Cli::try_parse_from(["kubemend", "logs", "api-0", "-n", "prod", "-c", "app"])
            .unwrap();
        let Command::Logs {
            pod,
            namespace,
            container,
        } = cli.command
        else {
            panic!("expected logs");
        };
        assert_eq!((pod.as_str(), namespace.as_str()), ("api-0", "prod"));
        assert_eq!(container.as_deref(), Some("app"));

        let cli = Cli::try_parse_from(["kubemend", "restart", "api-0"]).unwrap();
        let Command::Restart { pod, namespace } = cli.command else {
            panic!("expected restart");
        };
        assert_eq!((pod.as_str(), namespace.as_str()), ("api-0", "default"));

        // Positional namespaces are not accepted.
        assert!(Cli::try_parse_from(["kubemend", "pods", "prod"]).is_err());
    }

    #[test]
    fn test_diagnose_target_needs_pod() {
        let cli = Cli::try_parse_from(["kubemend", "diagnose", "--namespace", "prod"]).unwrap();
        let Command::Diagnose(args) = cli.command else {
            panic!("expected diagnose");
        };
        assert_eq!(args.target(), None);

        let args = DiagnoseArgs {
            pod: Some("api-0".into()),
            ..DiagnoseArgs::default()
        };
        assert_eq!(args.target().unwrap().to_string(), "default/api-0");
    }

    #[test]
    fn test_global_format_flag() {
        let cli = Cli::try_parse_from(["kubemend", "pods", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
