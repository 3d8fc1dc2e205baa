//! 日志初始化
//!
//! 容器本身只通过 `tracing` 宏输出日志；应用启动时用 [`LoggingConfig`] 安装订阅者：
//! 一个 `EnvFilter` 加上按 [`LogFormat`] 选择的 `fmt` 层。

use std::fmt;
use std::str::FromStr;

use tracing::{Level, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::env::Environment;
use crate::error::{ContainerError, ContainerResult};

/// 从环境读取日志配置时使用的属性键
pub const LOGGING_LEVEL_PROPERTY: &str = "logging.level";
pub const LOGGING_FORMAT_PROPERTY: &str = "logging.format";
pub const LOGGING_FILTER_PROPERTY: &str = "logging.filter";

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [LogLevel::Trace, LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 紧凑格式（默认）
    Compact,
    /// 完整格式
    Full,
    Json,
    /// 多行输出，适合开发
    Pretty,
}

impl LogFormat {
    const ALL: [LogFormat; 4] = [LogFormat::Compact, LogFormat::Full, LogFormat::Json, LogFormat::Pretty];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Full => "full",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

fn parse_named<T: Copy>(all: &[T], name: fn(&T) -> &'static str, kind: &str, text: &str) -> ContainerResult<T> {
    let wanted = text.trim().to_ascii_lowercase();
    all.iter()
        .copied()
        .find(|candidate| name(candidate) == wanted)
        .ok_or_else(|| ContainerError::IllegalState(format!("Invalid log {}: '{}'", kind, text)))
}

impl FromStr for LogLevel {
    type Err = ContainerError;

    fn from_str(s: &str) -> ContainerResult<Self> {
        if s.trim().eq_ignore_ascii_case("warning") {
            return Ok(LogLevel::Warn);
        }
        parse_named(&Self::ALL, Self::as_str, "level", s)
    }
}

impl FromStr for LogFormat {
    type Err = ContainerError;

    fn from_str(s: &str) -> ContainerResult<Self> {
        parse_named(&Self::ALL, Self::as_str, "format", s)
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub show_timestamp: bool,
    /// 模块路径
    pub show_target: bool,
    pub show_thread_ids: bool,
    pub show_thread_names: bool,
    /// `EnvFilter` 指令，例如 `sprig_core=debug,hyper=warn`；优先于 `level`
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            show_timestamp: true,
            show_target: false,
            show_thread_ids: false,
            show_thread_names: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_timestamp(mut self, show: bool) -> Self {
        self.show_timestamp = show;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn show_thread_ids(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self
    }

    pub fn show_thread_names(mut self, show: bool) -> Self {
        self.show_thread_names = show;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 读取 `RUST_LOG`、`LOG_LEVEL` 与 `LOG_FORMAT`，无法识别的值被忽略
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok();
        let defaults = Self::default();
        Self {
            level: var("LOG_LEVEL").and_then(|v| v.parse().ok()).unwrap_or(defaults.level),
            format: var("LOG_FORMAT").and_then(|v| v.parse().ok()).unwrap_or(defaults.format),
            filter: var("RUST_LOG"),
            ..defaults
        }
    }

    /// 从容器环境读取 `logging.level`、`logging.format` 与 `logging.filter`
    ///
    /// 与 [`from_env`](Self::from_env) 不同，无法识别的值会报错。
    pub fn from_environment(environment: &Environment) -> ContainerResult<Self> {
        let mut config = Self::default();
        if let Some(level) = environment.get_string(LOGGING_LEVEL_PROPERTY)? {
            config.level = level.parse()?;
        }
        if let Some(format) = environment.get_string(LOGGING_FORMAT_PROPERTY)? {
            config.format = format.parse()?;
        }
        config.filter = environment.get_string(LOGGING_FILTER_PROPERTY)?;
        Ok(config)
    }

    fn env_filter(&self) -> EnvFilter {
        let by_level = || EnvFilter::new(self.level.as_str());
        match &self.filter {
            Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| by_level()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| by_level()),
        }
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_thread_names(self.show_thread_names);
        match (self.format, self.show_timestamp) {
            (LogFormat::Compact, true) => layer.compact().boxed(),
            (LogFormat::Compact, false) => layer.compact().without_time().boxed(),
            (LogFormat::Full, true) => layer.boxed(),
            (LogFormat::Full, false) => layer.without_time().boxed(),
            (LogFormat::Json, true) => layer.json().boxed(),
            (LogFormat::Json, false) => layer.json().without_time().boxed(),
            (LogFormat::Pretty, true) => layer.pretty().boxed(),
            (LogFormat::Pretty, false) => layer.pretty().without_time().boxed(),
        }
    }

    /// 安装全局订阅者
    ///
    /// 已经存在全局订阅者时返回 [`ContainerError::LoggingInitFailed`]。
    pub fn init(self) -> ContainerResult<()> {
        tracing_subscriber::registry()
            .with(self.env_filter())
            .with(self.fmt_layer())
            .try_init()
            .map_err(|e| ContainerError::LoggingInitFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::env::MapPropertySource;

    #[test]
    fn test_names_parse_case_insensitively() {
        assert_eq!(" DEBUG ".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(LogLevel::Error.to_string(), "error");
        assert!(matches!("loud".parse::<LogLevel>(), Err(ContainerError::IllegalState(_))));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_builder_overrides_defaults() {
        let config = LoggingConfig::new()
            .level(LogLevel::Trace)
            .format(LogFormat::Pretty)
            .show_timestamp(false)
            .show_thread_names(true)
            .filter("sprig_core=debug");

        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.show_timestamp);
        assert!(config.show_thread_names);
        assert!(!config.show_thread_ids);
        assert_eq!(config.filter.as_deref(), Some("sprig_core=debug"));
    }

    #[test]
    fn test_config_from_environment() {
        let environment = Environment::empty();
        environment.add_property_source(Arc::new(
            MapPropertySource::new("app")
                .with_property(LOGGING_LEVEL_PROPERTY, "debug")
                .with_property(LOGGING_FORMAT_PROPERTY, "json")
                .with_property(LOGGING_FILTER_PROPERTY, "sprig_core=trace"),
        ));
        let config = LoggingConfig::from_environment(&environment).unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter.as_deref(), Some("sprig_core=trace"));

        let invalid = Environment::empty();
        invalid.add_property_source(Arc::new(MapPropertySource::new("bad").with_property(LOGGING_LEVEL_PROPERTY, "loud")));
        assert!(LoggingConfig::from_environment(&invalid).is_err());
    }
}
