//! Logging configuration for trajfold.
//!
//! Run phases always emit `tracing` events. Per-block and per-frame events are
//! opt-in through [`LogConfig`] because a long trajectory produces a lot of
//! them.

use tracing::Level;

/// Controls how chatty an analysis run is.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for trajfold components
    pub base_level: Level,
    /// Whether to log block start and completion
    pub log_block_details: bool,
    /// Whether to log every processed frame
    pub log_frame_details: bool,
    /// Whether to log timings on completion
    pub log_timings: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_block_details: true,
            log_frame_details: false,
            log_timings: true,
        }
    }
}

impl LogConfig {
    /// Logs everything, down to individual frames.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_block_details: true,
            log_frame_details: true,
            log_timings: true,
        }
    }

    /// Minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_block_details: false,
            log_frame_details: false,
            log_timings: false,
        }
    }

    /// Whether per-block performance details are logged.
    pub fn perf_enabled(&self) -> bool {
        self.base_level >= Level::DEBUG
    }
}

/// Macro for performance logging, enabled at a `DEBUG` or finer base level.
#[macro_export]
macro_rules! log_perf {
    ($config:expr, $($arg:tt)*) => {
        if $config.perf_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional per-block logging.
#[macro_export]
macro_rules! log_block {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_block_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional per-frame logging.
#[macro_export]
macro_rules! log_frame {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_frame_details {
            tracing::trace!($($arg)*);
        }
    };
}

/// Subscriber setup for binaries and tests.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global `tracing` subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for everything else
        pub level: Level,
        /// Log level for trajfold itself
        pub trajfold_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                trajfold_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                trajfold_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                trajfold_level: Level::TRACE,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_trajfold_level(mut self, level: Level) -> Self {
            self.trajfold_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},trajfold={}",
                    self.level.as_str().to_lowercase(),
                    self.trajfold_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs a global `tracing` subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use trajfold::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
