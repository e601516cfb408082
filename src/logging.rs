//! Console logging setup
//!
//! Installs a `tracing` subscriber that prints `[HH:MM:SS]  INFO message`
//! lines. `--verbose` enables debug lines; `RUST_LOG` overrides both.

use tracing::info;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

/// Total width of a section banner.
pub const BANNER_WIDTH: usize = 69;

/// Local wall-clock time, seconds precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockTime;

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "[{}]", chrono::Local::now().format("%H:%M:%S"))
    }
}

/// Default filter directive for the given verbosity.
pub fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("{}={}", env!("CARGO_CRATE_NAME"), level)
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ClockTime)
        .with_target(false)
        .with_ansi(atty::is(atty::Stream::Stdout))
        .try_init();
}

/// Build a section banner: `==TITLE=====...`, padded to [`BANNER_WIDTH`].
pub fn banner(title: &str) -> String {
    let title = title.to_uppercase();
    let fill = BANNER_WIDTH.saturating_sub(2 + title.chars().count());
    format!("=={}{}", title, "=".repeat(fill))
}

/// Log a section banner.
pub fn section(title: &str) {
    info!("{}", banner(title));
}

/// Log `label: value` with the label padded to a fixed column.
pub fn field(label: &str, value: impl std::fmt::Display) {
    info!("{:<20}: {}", label, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_width() {
        let b = banner(" scss-config > ");
        assert!(b.starts_with("== SCSS-CONFIG > ="));
        assert_eq!(b.chars().count(), BANNER_WIDTH);
    }

    #[test]
    fn test_banner_long_title_not_truncated() {
        let title = "x".repeat(80);
        assert_eq!(banner(&title), format!("=={}", "X".repeat(80)));
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "assetflow=info");
        assert_eq!(default_directive(true), "assetflow=debug");
    }
}
