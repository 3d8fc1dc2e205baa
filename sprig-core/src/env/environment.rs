use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use crate::constants::{ACTIVE_PROFILES_PROPERTY, DEFAULT_PROFILES_PROPERTY, RESERVED_DEFAULT_PROFILE};
use crate::convert::ConversionService;
use crate::error::{ContainerError, ContainerResult};
use crate::types::ResolvableType;
use crate::value::Value;

use super::{
    ConfigValue, MutablePropertySources, Profiles, PropertyResolver, PropertySource,
    PropertySourcesPropertyResolver, SystemEnvironmentPropertySource, SystemPropertiesPropertySource,
};

/// Environment - 配置管理器
///
/// 持有按优先级排列的配置源与 profile 状态。默认包含两个配置源：
/// `systemProperties`（`-Dkey=value` 启动参数）与 `systemEnvironment`（环境变量），
/// 前者优先。激活的 profile 未显式设置时，首次查询时读取 `sprig.profiles.active`。
pub struct Environment {
    sources: Arc<MutablePropertySources>,
    resolver: PropertySourcesPropertyResolver,
    active_profiles: RwLock<Option<Vec<String>>>,
    default_profiles: RwLock<Option<Vec<String>>>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("active_profiles", &self.active_profiles())
            .field("default_profiles", &self.default_profiles())
            .field("property_sources", &self.sources.names())
            .finish()
    }
}

impl Environment {
    /// 包含系统属性与环境变量配置源的标准环境
    pub fn new() -> Self {
        let env = Self::empty();
        env.sources.add_last(Arc::new(SystemPropertiesPropertySource::from_process_args()));
        env.sources.add_last(Arc::new(SystemEnvironmentPropertySource::new()));
        env
    }

    /// 不含任何配置源
    pub fn empty() -> Self {
        let sources = Arc::new(MutablePropertySources::new());
        Self {
            resolver: PropertySourcesPropertyResolver::new(sources.clone()),
            sources,
            active_profiles: RwLock::new(None),
            default_profiles: RwLock::new(None),
        }
    }

    pub fn property_sources(&self) -> &Arc<MutablePropertySources> {
        &self.sources
    }

    /// 添加最低优先级的配置源
    pub fn add_property_source(&self, source: Arc<dyn PropertySource>) {
        self.sources.add_last(source);
    }

    pub fn resolver(&self) -> &PropertySourcesPropertyResolver {
        &self.resolver
    }

    pub fn set_conversion_service(&self, service: Arc<dyn ConversionService>) {
        self.resolver.set_conversion_service(service);
    }

    pub fn set_required_properties(&self, keys: &[&str]) {
        self.resolver.set_required_properties(keys);
    }

    pub fn validate_required_properties(&self) -> ContainerResult<()> {
        self.resolver.validate_required_properties()
    }

    // ---- profiles ----

    pub fn active_profiles(&self) -> Vec<String> {
        if let Some(active) = self.active_profiles.read().as_ref() {
            return active.clone();
        }
        let from_property = self.profiles_property(ACTIVE_PROFILES_PROPERTY);
        let mut active = self.active_profiles.write();
        active.get_or_insert(from_property).clone()
    }

    pub fn set_active_profiles(&self, profiles: &[&str]) -> ContainerResult<()> {
        let profiles = validate_profiles(profiles)?;
        tracing::debug!("Activating profiles {:?}", profiles);
        *self.active_profiles.write() = Some(profiles);
        Ok(())
    }

    pub fn add_active_profile(&self, profile: &str) -> ContainerResult<()> {
        let profile = validate_profiles(&[profile])?.remove(0);
        let mut active = self.active_profiles();
        if !active.contains(&profile) {
            tracing::debug!("Activating profile '{}'", profile);
            active.push(profile);
        }
        *self.active_profiles.write() = Some(active);
        Ok(())
    }

    /// 没有激活任何 profile 时生效的 profile，默认是 `default`
    pub fn default_profiles(&self) -> Vec<String> {
        if let Some(defaults) = self.default_profiles.read().as_ref() {
            return defaults.clone();
        }
        let mut from_property = self.profiles_property(DEFAULT_PROFILES_PROPERTY);
        if from_property.is_empty() {
            from_property.push(RESERVED_DEFAULT_PROFILE.to_string());
        }
        let mut defaults = self.default_profiles.write();
        defaults.get_or_insert(from_property).clone()
    }

    pub fn set_default_profiles(&self, profiles: &[&str]) -> ContainerResult<()> {
        *self.default_profiles.write() = Some(validate_profiles(profiles)?);
        Ok(())
    }

    /// 单个 profile 是否生效：已激活，或者没有激活任何 profile 且属于默认 profile
    pub fn is_profile_active(&self, profile: &str) -> bool {
        let active = self.active_profiles();
        active.iter().any(|p| p == profile)
            || (active.is_empty() && self.default_profiles().iter().any(|p| p == profile))
    }

    /// 任一表达式匹配当前 profile 即接受
    pub fn accepts_profiles(&self, expressions: &[&str]) -> ContainerResult<bool> {
        let profiles = Profiles::of(expressions)?;
        Ok(self.matches_profiles(&profiles))
    }

    pub fn matches_profiles(&self, profiles: &Profiles) -> bool {
        profiles.matches(&|profile| self.is_profile_active(profile))
    }

    fn profiles_property(&self, key: &str) -> Vec<String> {
        match self.resolver.get_property(key) {
            Ok(Some(value)) => split_profiles(&value),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Ignoring unresolvable property '{}': {}", key, e);
                Vec::new()
            }
        }
    }

    /// 合并父环境：追加本环境没有的配置源，并合并 profile
    pub fn merge(&self, parent: &Environment) {
        for source in parent.sources.snapshot() {
            if !self.sources.contains(source.name()) {
                self.sources.add_last(source);
            }
        }
        let parent_active = parent.active_profiles();
        if !parent_active.is_empty() {
            let mut active = self.active_profiles();
            for profile in parent_active {
                if !active.contains(&profile) {
                    active.push(profile);
                }
            }
            *self.active_profiles.write() = Some(active);
        }
        let parent_defaults = parent.default_profiles();
        let mut defaults: Vec<String> = self
            .default_profiles()
            .into_iter()
            .filter(|p| p != RESERVED_DEFAULT_PROFILE)
            .collect();
        for profile in parent_defaults {
            if !defaults.contains(&profile) {
                defaults.push(profile);
            }
        }
        *self.default_profiles.write() = Some(defaults);
    }

    // ---- typed access ----

    /// 原始配置值
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.resolver.get_raw(key)
    }

    pub fn get_string(&self, key: &str) -> ContainerResult<Option<String>> {
        self.resolver.get_property(key)
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> ContainerResult<String> {
        self.resolver.get_property_or(key, default)
    }

    pub fn get_i64(&self, key: &str) -> ContainerResult<Option<i64>> {
        self.get_typed::<i64>(key)
    }

    pub fn get_f64(&self, key: &str) -> ContainerResult<Option<f64>> {
        self.get_typed::<f64>(key)
    }

    pub fn get_bool(&self, key: &str) -> ContainerResult<Option<bool>> {
        self.get_typed::<bool>(key)
    }

    /// 支持 TOML 数组与逗号分隔字符串两种形式
    pub fn get_string_array(&self, key: &str) -> ContainerResult<Option<Vec<String>>> {
        match self.get(key) {
            Some(ConfigValue::Array(items)) => items
                .iter()
                .filter_map(ConfigValue::to_text)
                .map(|item| self.resolver.resolve_required_placeholders(&item))
                .collect::<ContainerResult<Vec<_>>>()
                .map(Some),
            Some(_) => Ok(self.get_string(key)?.map(|text| {
                text.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })),
            None => Ok(None),
        }
    }

    pub fn get_typed<T: Any + Send + Sync + Clone>(&self, key: &str) -> ContainerResult<Option<T>> {
        self.resolver.get_typed::<T>(key)
    }

    pub fn get_property_as(&self, key: &str, target: &ResolvableType) -> ContainerResult<Option<Value>> {
        self.resolver.get_property_as(key, target)
    }

    /// 把 `prefix.` 下的所有键绑定到一个 serde 结构
    ///
    /// 高优先级配置源的值覆盖低优先级的；字符串值中的占位符会先被解析。
    pub fn bind<T: DeserializeOwned>(&self, prefix: &str) -> ContainerResult<T> {
        let mut root = toml::map::Map::new();
        let key_prefix = format!("{}.", prefix);
        for source in self.sources.snapshot().iter().rev() {
            for key in source.keys() {
                let Some(relative) = key.strip_prefix(&key_prefix) else {
                    continue;
                };
                let Some(value) = source.get(&key) else {
                    continue;
                };
                let value = match value {
                    ConfigValue::String(text) => toml::Value::String(self.resolver.resolve_required_placeholders(&text)?),
                    other => other.to_toml(),
                };
                insert_path(&mut root, relative, value);
            }
        }
        toml::Value::Table(root)
            .try_into::<T>()
            .map_err(|e| ContainerError::ConfigurationLoad {
                source_name: prefix.to_string(),
                message: format!("Failed to bind properties: {}", e),
            })
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyResolver for Environment {
    fn contains_property(&self, key: &str) -> bool {
        self.resolver.contains_property(key)
    }

    fn get_property(&self, key: &str) -> ContainerResult<Option<String>> {
        self.resolver.get_property(key)
    }

    fn resolve_placeholders(&self, text: &str) -> ContainerResult<String> {
        self.resolver.resolve_placeholders(text)
    }

    fn resolve_required_placeholders(&self, text: &str) -> ContainerResult<String> {
        self.resolver.resolve_required_placeholders(text)
    }
}

fn split_profiles(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_profiles(profiles: &[&str]) -> ContainerResult<Vec<String>> {
    profiles
        .iter()
        .map(|profile| {
            let profile = profile.trim();
            if profile.is_empty() {
                Err(ContainerError::IllegalArgument("Invalid profile []: must contain text".to_string()))
            } else if profile.starts_with('!') {
                Err(ContainerError::IllegalArgument(format!(
                    "Invalid profile [{}]: must not begin with ! operator",
                    profile
                )))
            } else {
                Ok(profile.to_string())
            }
        })
        .collect()
}

/// 按 `.` 分段写入嵌套表；与已有标量冲突的键被忽略
fn insert_path(table: &mut toml::map::Map<String, toml::Value>, path: &str, value: toml::Value) {
    match path.split_once('.') {
        None => {
            table.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
            match entry {
                toml::Value::Table(child) => insert_path(child, rest, value),
                _ => tracing::warn!("Property '{}' conflicts with a scalar value, skipping", path),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{MapPropertySource, TomlPropertySource};
    use serde::Deserialize;

    #[test]
    fn test_profiles_from_property_and_defaults() {
        let env = Environment::empty();
        assert_eq!(env.default_profiles(), vec!["default"]);
        assert!(env.is_profile_active("default"));

        let env = Environment::empty();
        env.add_property_source(Arc::new(
            MapPropertySource::new("app").with_property(ACTIVE_PROFILES_PROPERTY, "dev, eu"),
        ));
        assert_eq!(env.active_profiles(), vec!["dev", "eu"]);
        assert!(!env.is_profile_active("default"));
        assert!(env.accepts_profiles(&["dev & eu"]).unwrap());
        assert!(!env.accepts_profiles(&["prod"]).unwrap());
        assert!(env.set_active_profiles(&["!prod"]).is_err());
    }

    #[test]
    fn test_system_sources_are_ordered() {
        let env = Environment::new();
        assert_eq!(env.property_sources().names(), vec!["systemProperties", "systemEnvironment"]);
    }

    #[test]
    fn test_typed_getters() {
        let env = Environment::empty();
        env.add_property_source(Arc::new(
            TomlPropertySource::parse(
                "[server]\nport = 8080\nhosts = [\"a\", \"b\"]\nname = \"${app:demo}\"\n",
                "app.toml",
            )
            .unwrap(),
        ));
        assert_eq!(env.get_i64("server.port").unwrap(), Some(8080));
        assert_eq!(env.get_string("server.name").unwrap().unwrap(), "demo");
        assert_eq!(env.get_string_array("server.hosts").unwrap().unwrap(), vec!["a", "b"]);
        assert_eq!(env.get_bool("server.missing").unwrap(), None);
    }

    #[derive(Debug, Deserialize)]
    struct ServerConfig {
        port: i64,
        name: String,
        tls: TlsConfig,
    }

    #[derive(Debug, Deserialize)]
    struct TlsConfig {
        enabled: bool,
    }

    #[test]
    fn test_bind_prefers_higher_precedence() {
        let env = Environment::empty();
        env.add_property_source(Arc::new(
            TomlPropertySource::parse("[server]\nport = 80\nname = \"base\"\n[server.tls]\nenabled = true\n", "file")
                .unwrap(),
        ));
        env.property_sources().add_first(Arc::new(
            MapPropertySource::new("overrides").with_property("server.name", "edge-${region:eu}"),
        ));
        let config: ServerConfig = env.bind("server").unwrap();
        assert_eq!(config.port, 80);
        assert_eq!(config.name, "edge-eu");
        assert!(config.tls.enabled);
    }

    #[test]
    fn test_merge_parent() {
        let parent = Environment::empty();
        parent.add_property_source(Arc::new(MapPropertySource::new("parent").with_property("k", "v")));
        parent.set_active_profiles(&["prod"]).unwrap();

        let child = Environment::empty();
        child.merge(&parent);
        assert_eq!(child.get_string("k").unwrap().unwrap(), "v");
        assert!(child.is_profile_active("prod"));
    }
}
