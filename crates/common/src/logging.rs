//! Logging and tracing initialization.

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is unset.
///
/// A bare level applies to the kinetrack crates only and keeps everything
/// else at `warn`. Anything containing a directive is used as written.
pub fn default_filter(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        return "warn,kinetrack=info".to_string();
    }
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    format!("warn,kinetrack={level}")
}

/// Initialize the tracing subscriber. Diagnostics go to stderr so that
/// command output on stdout stays machine-readable.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.level)));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.with_target(true).compact().finish())
    };
    if installed.is_ok() {
        tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_scopes_to_kinetrack() {
        assert_eq!(default_filter("debug"), "warn,kinetrack=debug");
        assert_eq!(default_filter(" trace "), "warn,kinetrack=trace");
    }

    #[test]
    fn test_empty_level_falls_back_to_info() {
        assert_eq!(default_filter(""), "warn,kinetrack=info");
    }

    #[test]
    fn test_directives_pass_through() {
        assert_eq!(
            default_filter("kinetrack_kinematics_core=trace"),
            "kinetrack_kinematics_core=trace"
        );
        assert_eq!(default_filter("info,serde=warn"), "info,serde=warn");
    }
}
