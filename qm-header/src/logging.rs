use owo_colors::OwoColorize;
use std::sync::OnceLock;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    init_with_default("info")
}

/// Installs the global subscriber. `RUST_LOG` wins when set; otherwise
/// `directive` (for example `"header=trace"`) selects what is logged.
pub fn init_with_default(directive: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::builder()
        .with_default_directive(directive.parse()?)
        .from_env_lossy();
    // Violations are reported on stderr, the same stream ANSI support is probed on.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi_enabled())
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| e as Box<dyn std::error::Error>)?;
    Ok(())
}

pub fn category_fatal() -> String {
    if ansi_enabled() {
        format!("{}", "FATAL".bright_red().bold())
    } else {
        "FATAL".to_string()
    }
}

pub fn category_deopt() -> String {
    if ansi_enabled() {
        format!("{}", "DEOPT".bright_yellow().bold())
    } else {
        "DEOPT".to_string()
    }
}

pub fn category_stack_map() -> String {
    if ansi_enabled() {
        format!("{}", "STACKMAP".bright_cyan().bold())
    } else {
        "STACKMAP".to_string()
    }
}

fn ansi_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(detect_ansi)
}

fn detect_ansi() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    supports_color::on_cached(Stream::Stderr).is_some()
}
