use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::constants::{SYSTEM_ENVIRONMENT_SOURCE_NAME, SYSTEM_PROPERTIES_SOURCE_NAME};
use crate::error::{ContainerError, ContainerResult};

/// 配置值类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// 转换为字符串
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 转换为整数
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 转换为浮点数
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 转换为布尔值
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// 文本形式；数组以逗号连接，嵌套表没有文本形式
    pub fn to_text(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Array(items) => Some(
                items
                    .iter()
                    .filter_map(ConfigValue::to_text)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ConfigValue::Object(_) => None,
        }
    }

    /// 转为 `toml::Value`，供 serde 绑定使用
    pub fn to_toml(&self) -> toml::Value {
        match self {
            ConfigValue::String(s) => toml::Value::String(s.clone()),
            ConfigValue::Int(i) => toml::Value::Integer(*i),
            ConfigValue::Float(f) => toml::Value::Float(*f),
            ConfigValue::Bool(b) => toml::Value::Boolean(*b),
            ConfigValue::Array(items) => toml::Value::Array(items.iter().map(ConfigValue::to_toml).collect()),
            ConfigValue::Object(map) => toml::Value::Table(
                map.iter().map(|(k, v)| (k.clone(), v.to_toml())).collect(),
            ),
        }
    }

    fn from_toml(value: &toml::Value) -> ConfigValue {
        match value {
            toml::Value::String(s) => ConfigValue::String(s.clone()),
            toml::Value::Integer(i) => ConfigValue::Int(*i),
            toml::Value::Float(f) => ConfigValue::Float(*f),
            toml::Value::Boolean(b) => ConfigValue::Bool(*b),
            toml::Value::Array(arr) => ConfigValue::Array(arr.iter().map(Self::from_toml).collect()),
            toml::Value::Table(table) => ConfigValue::Object(
                table.iter().map(|(k, v)| (k.clone(), Self::from_toml(v))).collect(),
            ),
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => write!(f, "{:?}", self),
        }
    }
}

/// 配置源 trait
///
/// 名称在一个 [`MutablePropertySources`](super::MutablePropertySources) 链中唯一。
pub trait PropertySource: Send + Sync {
    /// 获取配置源名称
    fn name(&self) -> &str;

    /// 获取配置值
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// 获取所有配置键
    fn keys(&self) -> Vec<String>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl fmt::Debug for dyn PropertySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertySource {{name='{}'}}", self.name())
    }
}

/// 内存配置源
#[derive(Debug, Clone)]
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        Self {
            name: name.into(),
            properties: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }
}

/// TOML 文件配置源，嵌套表展平为点分隔的键
#[derive(Debug, Clone)]
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
}

impl TomlPropertySource {
    /// 从文件加载 TOML 配置
    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let name = path.to_string_lossy().to_string();
        let content = fs::read_to_string(path).map_err(|e| ContainerError::ConfigurationLoad {
            source_name: name.clone(),
            message: format!("Failed to read config file: {}", e),
        })?;
        Self::parse(&content, name)
    }

    /// 从字符串解析 TOML 配置
    pub fn parse(content: &str, name: impl Into<String>) -> ContainerResult<Self> {
        let name = name.into();
        let value: toml::Value = toml::from_str(content).map_err(|e| ContainerError::ConfigurationLoad {
            source_name: name.clone(),
            message: format!("Failed to parse TOML: {}", e),
        })?;

        let mut properties = HashMap::new();
        Self::flatten_toml(&value, String::new(), &mut properties);
        tracing::debug!("Loaded {} properties from '{}'", properties.len(), name);
        Ok(Self { name, properties })
    }

    /// 展平 TOML 结构
    /// 例如: { database: { url: "xxx" } } -> { "database.url": "xxx" }
    fn flatten_toml(value: &toml::Value, prefix: String, result: &mut HashMap<String, ConfigValue>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    Self::flatten_toml(val, new_prefix, result);
                }
            }
            other => {
                result.insert(prefix, ConfigValue::from_toml(other));
            }
        }
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }
}

/// 进程环境变量
///
/// 查找时依次尝试原名、`.` 与 `-` 替换为 `_` 的形式，以及它们的大写形式，
/// 因此 `server.port` 可以匹配 `SERVER_PORT`。
#[derive(Debug, Clone)]
pub struct SystemEnvironmentPropertySource {
    name: String,
    vars: HashMap<String, String>,
}

impl SystemEnvironmentPropertySource {
    /// 读取当前进程的环境变量快照
    pub fn new() -> Self {
        Self::with_vars(std::env::vars())
    }

    pub fn with_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            name: SYSTEM_ENVIRONMENT_SOURCE_NAME.to_string(),
            vars: vars.into_iter().collect(),
        }
    }

    /// 实际命中的环境变量名
    pub fn resolve_property_name(&self, key: &str) -> Option<String> {
        self.check_property_name(key)
            .or_else(|| self.check_property_name(&key.to_uppercase()))
    }

    fn check_property_name(&self, key: &str) -> Option<String> {
        let candidates = [
            key.to_string(),
            key.replace('.', "_"),
            key.replace('-', "_"),
            key.replace(['.', '-'], "_"),
        ];
        candidates.into_iter().find(|c| self.vars.contains_key(c))
    }
}

impl Default for SystemEnvironmentPropertySource {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertySource for SystemEnvironmentPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        let actual = self.resolve_property_name(key)?;
        if actual != key {
            tracing::trace!("Property '{}' resolved to environment variable '{}'", key, actual);
        }
        self.vars.get(&actual).cloned().map(ConfigValue::String)
    }

    fn keys(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }
}

/// 系统属性：来自命令行的 `-Dkey=value` 参数
#[derive(Debug, Clone)]
pub struct SystemPropertiesPropertySource {
    name: String,
    properties: HashMap<String, String>,
}

impl SystemPropertiesPropertySource {
    /// 解析当前进程的命令行参数
    pub fn from_process_args() -> Self {
        Self::from_args(std::env::args().skip(1))
    }

    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let properties = args
            .into_iter()
            .filter_map(|arg| {
                let arg = arg.as_ref();
                let definition = arg.strip_prefix("-D")?;
                let (key, value) = definition.split_once('=').unwrap_or((definition, ""));
                (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect();
        Self {
            name: SYSTEM_PROPERTIES_SOURCE_NAME.to_string(),
            properties,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl PropertySource for SystemPropertiesPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned().map(ConfigValue::String)
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_flattening() {
        let source = TomlPropertySource::parse(
            r#"
            name = "demo"
            [server]
            port = 8080
            hosts = ["a", "b"]
            [server.tls]
            enabled = true
            "#,
            "application.toml",
        )
        .unwrap();
        assert_eq!(source.get("name"), Some(ConfigValue::String("demo".into())));
        assert_eq!(source.get("server.port").and_then(|v| v.as_i64()), Some(8080));
        assert_eq!(source.get("server.tls.enabled").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(source.get("server.hosts").and_then(|v| v.to_text()), Some("a,b".into()));
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = TomlPropertySource::parse("= broken", "bad.toml").unwrap_err();
        assert!(matches!(err, ContainerError::ConfigurationLoad { .. }));
    }

    #[test]
    fn test_relaxed_environment_names() {
        let source = SystemEnvironmentPropertySource::with_vars(vec![
            ("SERVER_PORT".to_string(), "9090".to_string()),
            ("my_flag".to_string(), "on".to_string()),
        ]);
        assert_eq!(source.get("server.port").and_then(|v| v.as_i64()), Some(9090));
        assert_eq!(source.get("my-flag").and_then(|v| v.as_bool()), Some(true));
        assert!(source.get("missing.key").is_none());
    }

    #[test]
    fn test_system_properties_from_args() {
        let source = SystemPropertiesPropertySource::from_args(["-Dapp.mode=fast", "--other", "-Dflag"]);
        assert_eq!(source.get("app.mode").and_then(|v| v.to_text()), Some("fast".into()));
        assert_eq!(source.get("flag").and_then(|v| v.to_text()), Some(String::new()));
        assert!(source.get("--other").is_none());
    }
}
