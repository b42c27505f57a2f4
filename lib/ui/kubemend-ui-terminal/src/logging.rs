use tracing_subscriber::EnvFilter;

const CRATES: [&str; 5] = [
    "kubemend",
    "kubemend_application",
    "kubemend_adapter_kube",
    "kubemend_adapter_assistant",
    "kubemend_ui_terminal",
];

pub fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|krate| format!("{krate}={level}")));
    directives.join(",")
}

/// Log to stderr so command output on stdout stays clean. `RUST_LOG` wins
/// over the built-in filter.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        let quiet = default_filter(false);
        assert!(quiet.starts_with("warn,"));
        assert!(quiet.contains("kubemend_application=info"));
        assert!(default_filter(true).contains("kubemend_adapter_kube=debug"));
    }
}
