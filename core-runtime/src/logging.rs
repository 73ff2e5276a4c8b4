//! # Logging
//!
//! One-shot `tracing-subscriber` setup for the media engine plus the helpers
//! the engine crates use to keep local paths and feed credentials out of logs.
//!
//! Events always go to stdout in the configured [`LogFormat`]. When a
//! [`LoggerSink`] is configured, each event that passes the filter is also
//! mirrored to the host logger as a [`LogEntry`]. Before an entry leaves the
//! process, path fields are reduced to their basename and URL fields lose
//! their query string.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//! use std::sync::Arc;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//! init_logging(config)?;
//! ```
//!
//! Call sites that log a file use [`file_label`] so the basename is all that
//! reaches stdout too:
//!
//! ```ignore
//! info!(local_path = %file_label(&destination), "Download completed");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::error::{Error, Result};

/// Crates whose events follow the configured level.
const ENGINE_TARGETS: &[&str] = &[
    "core_runtime",
    "core_cache",
    "core_playback",
    "core_service",
    "bridge_desktop",
];

/// Chatty dependencies capped at `warn` by the default filter.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "reqwest", "sqlx"];

/// Fields holding a filesystem path.
const PATH_FIELDS: &[&str] = &["path", "file", "local_path", "partial_path", "destination"];

/// Fields holding a URL that may carry a private-feed token.
const URL_FIELDS: &[&str] = &["url", "source", "source_url", "feed_url", "image_url"];

/// Stdout format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the engine crates.
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; replaces the default filter.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Scrub path and URL fields in entries forwarded to the sink.
    pub scrub_forwarded: bool,
    pub display_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            scrub_forwarded: true,
            display_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_scrubbing(mut self, scrub: bool) -> Self {
        self.scrub_forwarded = scrub;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let sink = config
        .logger_sink
        .clone()
        .map(|sink| SinkForwarder::new(sink, config.scrub_forwarded));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer(&config))
        .with(sink)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => {
            let level = level_directive(config.level);
            std::iter::once("warn".to_string())
                .chain(ENGINE_TARGETS.iter().map(|target| format!("{target}={level}")))
                .chain(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")))
                .collect::<Vec<_>>()
                .join(",")
        }
    };

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {e}")))
}

fn stdout_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// Mirrors events to the host [`LoggerSink`].
struct SinkForwarder {
    sink: Arc<dyn LoggerSink>,
    scrub: bool,
}

impl SinkForwarder {
    fn new(sink: Arc<dyn LoggerSink>, scrub: bool) -> Self {
        Self { sink, scrub }
    }

    fn entry_for(&self, event: &Event<'_>, level: LogLevel) -> LogEntry {
        let metadata = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (name, value) in fields.values {
            let value = if self.scrub {
                scrub_field(&name, &value)
            } else {
                value
            };
            entry = entry.with_field(name, value);
        }
        entry
    }
}

impl<S> Layer<S> for SinkForwarder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let level = log_level(*event.metadata().level());
        if level < self.sink.min_level() {
            return;
        }

        let mut entry = self.entry_for(event, level);
        entry.span_id = ctx.lookup_current().map(|span| span.name().to_string());

        let sink = Arc::clone(&self.sink);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = sink.log(entry).await {
                        eprintln!("LoggerSink error: {e}");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("LoggerSink error: {e}");
                }
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: HashMap<String, String>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

fn log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

fn scrub_field(name: &str, value: &str) -> String {
    if PATH_FIELDS.contains(&name) {
        strip_path(value).to_string()
    } else if URL_FIELDS.contains(&name) {
        strip_query(value).to_string()
    } else {
        value.to_string()
    }
}

/// Last component of a `/` or `\` separated path.
pub fn strip_path(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

/// Basename of `path`, for log fields.
pub fn file_label(path: &Path) -> String {
    strip_path(&path.to_string_lossy()).to_string()
}

/// `url` without its query string or fragment.
///
/// Private feeds and some CDNs put the listener's token in the query.
pub fn strip_query(url: &str) -> &str {
    url.find(|c| c == '?' || c == '#')
        .map_or(url, |end| &url[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for RecordingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    fn forwarding_to(sink: &Arc<RecordingSink>, scrub: bool) -> impl Subscriber + Send + Sync {
        let sink: Arc<dyn LoggerSink> = sink.clone();
        tracing_subscriber::registry().with(SinkForwarder::new(sink, scrub))
    }

    #[test]
    fn default_filter_covers_engine_crates() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let filter = build_filter(&config).unwrap().to_string();
        assert!(filter.contains("core_playback=debug"));
        assert!(filter.contains("core_cache=debug"));
        assert!(filter.contains("sqlx=warn"));
    }

    #[test]
    fn custom_filter_replaces_default() {
        let config = LoggingConfig::default().with_filter("core_cache=trace");
        let filter = build_filter(&config).unwrap().to_string();
        assert!(filter.contains("core_cache=trace"));
        assert!(!filter.contains("core_playback"));
    }

    #[test]
    fn invalid_filter_is_a_config_error() {
        let config = LoggingConfig::default().with_filter("core_cache=loud");
        assert!(matches!(build_filter(&config), Err(Error::Config(_))));
    }

    #[test]
    fn forwarded_entries_carry_message_and_fields() {
        let sink = Arc::new(RecordingSink::default());
        let _guard = tracing::subscriber::set_default(forwarding_to(&sink, false));

        tracing::info!(
            target: "core_playback",
            asset_id = "ep-42",
            percent = 40u8,
            "Download progress"
        );
        tracing::trace!(target: "core_playback", "below the sink level");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "core_playback");
        assert_eq!(entries[0].message, "Download progress");
        assert_eq!(entries[0].fields.get("asset_id"), Some(&"ep-42".to_string()));
        assert_eq!(entries[0].fields.get("percent"), Some(&"40".to_string()));
    }

    #[test]
    fn forwarded_paths_and_urls_are_scrubbed() {
        let sink = Arc::new(RecordingSink::default());
        let _guard = tracing::subscriber::set_default(forwarding_to(&sink, true));

        tracing::warn!(
            local_path = "/home/someone/.local/share/echonotes/Downloads/ep.mp3",
            source_url = "https://feeds.example.com/private/ep.mp3?token=abc",
            title = "Episode 1",
            "Download failed"
        );

        let entries = sink.entries.lock().unwrap();
        let fields = &entries[0].fields;
        assert_eq!(fields.get("local_path"), Some(&"ep.mp3".to_string()));
        assert_eq!(
            fields.get("source_url"),
            Some(&"https://feeds.example.com/private/ep.mp3".to_string())
        );
        assert_eq!(fields.get("title"), Some(&"Episode 1".to_string()));
    }

    #[test]
    fn path_and_query_helpers() {
        assert_eq!(strip_path("/home/user/Downloads/ep.mp3"), "ep.mp3");
        assert_eq!(strip_path("C:\\Users\\me\\Downloads\\ep.mp3"), "ep.mp3");
        assert_eq!(strip_path("/var/log/"), "");
        assert_eq!(file_label(Path::new("/data/Downloads/ep-1.mp3")), "ep-1.mp3");
        assert_eq!(strip_query("https://x/ep.mp3#t=10"), "https://x/ep.mp3");
        assert_eq!(strip_query("https://x/ep.mp3"), "https://x/ep.mp3");
    }
}
