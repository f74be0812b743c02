//! Subscriber setup
//!
//! The crate only emits `tracing` events, all under [`TARGET`]. Registration,
//! container creation and lifecycle transitions are `debug`; lookups,
//! constructor selection and cache fills are `trace`; rollbacks and hook
//! failures swallowed while stopping are `warn`.
//!
//! Installing a subscriber is left to the application. With `logging-json` or
//! `logging-pretty` this module can install a `tracing-subscriber` registry:
//!
//! ```rust,ignore
//! use wiring_injector::logging;
//! use tracing::Level;
//!
//! // container events at TRACE, everything else at WARN, RUST_LOG wins if set
//! logging::builder()
//!     .trace()
//!     .others(Level::WARN)
//!     .from_env()
//!     .compact()
//!     .init();
//! ```
//!
//! Without either subscriber feature the initializers do nothing.

use tracing::Level;

/// Target of every event emitted by this crate
pub const TARGET: &str = "wiring_injector";

/// Output format of the installed layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event; plain text unless `logging-json` is on
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Settings of the subscriber installed by [`LoggingBuilder::init`]
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    /// Level of [`TARGET`]
    level: Level,
    /// Level of every other target; `None` silences them
    others: Option<Level>,
    format: LogFormat,
    from_env: bool,
    source_location: bool,
    thread_info: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            others: Some(Level::DEBUG),
            format: LogFormat::default(),
            from_env: false,
            source_location: false,
            thread_info: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level of container events; other targets follow unless set with [`others`](Self::others)
    pub fn level(mut self, level: Level) -> Self {
        if self.others == Some(self.level) {
            self.others = Some(level);
        }
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.level(Level::INFO)
    }

    pub fn warn(self) -> Self {
        self.level(Level::WARN)
    }

    /// Level of events from other crates
    pub fn others(mut self, level: Level) -> Self {
        self.others = Some(level);
        self
    }

    /// Drop every event not emitted under [`TARGET`]
    pub fn di_only(mut self) -> Self {
        self.others = None;
        self
    }

    /// Prefer `RUST_LOG` over the configured levels when it parses
    pub fn from_env(mut self) -> Self {
        self.from_env = true;
        self
    }

    /// Print the file and line of each event
    pub fn with_source_location(mut self) -> Self {
        self.source_location = true;
        self
    }

    /// Print the id and name of the emitting thread
    pub fn with_thread_info(mut self) -> Self {
        self.thread_info = true;
        self
    }

    pub fn json(self) -> Self {
        self.format(LogFormat::Json)
    }

    pub fn pretty(self) -> Self {
        self.format(LogFormat::Pretty)
    }

    pub fn compact(self) -> Self {
        self.format(LogFormat::Compact)
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// `EnvFilter` directives for the configured levels
    #[cfg_attr(not(any(feature = "logging-json", feature = "logging-pretty")), allow(dead_code))]
    fn directives(&self) -> String {
        match self.others {
            Some(others) if others == self.level => self.level.to_string(),
            Some(others) => format!("{others},{TARGET}={}", self.level),
            None => format!("{TARGET}={}", self.level),
        }
    }

    /// Install the subscriber globally.
    ///
    /// Does nothing when another subscriber is already installed.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let configured = || EnvFilter::new(self.directives());
        let filter = if self.from_env {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| configured())
        } else {
            configured()
        };

        let layer = fmt::layer()
            .with_target(true)
            .with_file(self.source_location)
            .with_line_number(self.source_location)
            .with_thread_ids(self.thread_info)
            .with_thread_names(self.thread_info);

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init(),
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => registry.with(layer).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
        };
        if installed.is_err() {
            tracing::debug!(target: TARGET, "Subscriber already installed, keeping it");
        }
    }

    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {}
}

pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// JSON when `logging-json` is on, pretty otherwise
pub fn init() {
    if cfg!(feature = "logging-json") {
        init_json();
    } else {
        init_pretty();
    }
}

/// Everything at DEBUG as JSON lines:
///
/// ```json
/// {"timestamp":"2026-01-01T00:00:00.000Z","level":"DEBUG","fields":{"message":"Registered component","key":"app::Db"},"target":"wiring_injector"}
/// ```
pub fn init_json() {
    builder().json().init();
}

pub fn init_pretty() {
    builder().pretty().init();
}

/// Container events at DEBUG, nothing else
pub fn init_di_only() {
    builder().di_only().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let builder = LoggingBuilder::default();
        assert_eq!(builder.format, LogFormat::Json);
        assert!(!builder.from_env);
        assert_eq!(builder.directives(), "DEBUG");
    }

    #[test]
    fn test_level_moves_other_targets_until_set() {
        assert_eq!(builder().trace().directives(), "TRACE");
        assert_eq!(
            builder().others(Level::WARN).trace().directives(),
            "WARN,wiring_injector=TRACE"
        );
        assert_eq!(builder().trace().others(Level::INFO).directives(), "INFO,wiring_injector=TRACE");
    }

    #[test]
    fn test_di_only_silences_other_targets() {
        let builder = builder()
            .di_only()
            .info()
            .compact()
            .with_source_location()
            .with_thread_info()
            .from_env();

        assert_eq!(builder.directives(), "wiring_injector=INFO");
        assert_eq!(builder.format, LogFormat::Compact);
        assert!(builder.source_location && builder.thread_info && builder.from_env);
    }
}
