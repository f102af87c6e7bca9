use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level;
/// output goes to stderr so it never mixes with the transcript.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Scopes the level to our own crates; dependencies stay at `warn`
fn filter_directive(level: &str) -> String {
    let level = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    format!("warn,kbchat={level},kbchat_core={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_levels_fall_back_to_info() {
        assert_eq!(filter_directive("DEBUG"), "warn,kbchat=debug,kbchat_core=debug");
        assert_eq!(filter_directive("loud"), "warn,kbchat=info,kbchat_core=info");
    }
}
