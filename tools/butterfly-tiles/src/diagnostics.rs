//! Scoped log output
//!
//! A [`Diagnostics`] value describes which severities reach stderr. The
//! subscriber it builds is installed only for the duration of [`Diagnostics::scope`],
//! so library callers never have their global logger replaced.

use tracing::{Level, Metadata};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Layer};

/// Severity window `[max_severity, min_severity]` of emitted events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    /// Least severe level shown (e.g. `INFO` hides debug and trace)
    pub min_severity: Level,
    /// Most severe level shown, normally `ERROR`
    pub max_severity: Level,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            min_severity: Level::INFO,
            max_severity: Level::ERROR,
        }
    }
}

impl Diagnostics {
    /// `-v` adds debug then trace, `-q` keeps warnings and errors only
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let min_severity = if quiet {
            Level::WARN
        } else {
            match verbose {
                0 => Level::INFO,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            }
        };
        Self {
            min_severity,
            ..Self::default()
        }
    }

    /// `tracing` orders `ERROR` lowest and `TRACE` highest
    pub fn admits(&self, level: &Level) -> bool {
        *level <= self.min_severity && *level >= self.max_severity
    }

    /// Run `f` with a stderr subscriber filtered to this window
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        let window = *self;
        let filter = filter_fn(move |meta: &Metadata<'_>| window.admits(meta.level()));
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        );
        tracing::subscriber::with_default(subscriber, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window() {
        let d = Diagnostics::default();
        assert!(d.admits(&Level::ERROR));
        assert!(d.admits(&Level::INFO));
        assert!(!d.admits(&Level::DEBUG));
    }

    #[test]
    fn test_verbosity_levels() {
        assert!(Diagnostics::from_verbosity(1, false).admits(&Level::DEBUG));
        assert!(!Diagnostics::from_verbosity(1, false).admits(&Level::TRACE));
        assert!(Diagnostics::from_verbosity(3, false).admits(&Level::TRACE));

        let quiet = Diagnostics::from_verbosity(2, true);
        assert!(quiet.admits(&Level::WARN));
        assert!(!quiet.admits(&Level::INFO));
    }

    #[test]
    fn test_max_severity_cuts_errors() {
        let d = Diagnostics {
            min_severity: Level::DEBUG,
            max_severity: Level::WARN,
        };
        assert!(!d.admits(&Level::ERROR));
        assert!(d.admits(&Level::WARN));
    }

    #[test]
    fn test_scope_returns_value() {
        let value = Diagnostics::default().scope(|| {
            tracing::info!("inside scope");
            42
        });
        assert_eq!(value, 42);
    }
}
