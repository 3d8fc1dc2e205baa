use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::convert::{ConversionService, DefaultConversionService};
use crate::error::{ContainerError, ContainerResult};
use crate::types::ResolvableType;
use crate::value::Value;

use super::{ConfigValue, MutablePropertySources, PlaceholderHelper};

/// 属性查找与占位符解析
pub trait PropertyResolver: Send + Sync {
    fn contains_property(&self, key: &str) -> bool;

    /// 取值并解析其中嵌套的占位符
    fn get_property(&self, key: &str) -> ContainerResult<Option<String>>;

    fn get_property_or(&self, key: &str, default: &str) -> ContainerResult<String> {
        Ok(self.get_property(key)?.unwrap_or_else(|| default.to_string()))
    }

    fn get_required_property(&self, key: &str) -> ContainerResult<String> {
        self.get_property(key)?
            .ok_or_else(|| ContainerError::IllegalState(format!("Required key '{}' not found", key)))
    }

    /// 无法解析的占位符原样保留
    fn resolve_placeholders(&self, text: &str) -> ContainerResult<String>;

    /// 无法解析的占位符报错
    fn resolve_required_placeholders(&self, text: &str) -> ContainerResult<String>;
}

/// 基于 [`MutablePropertySources`] 的解析器
pub struct PropertySourcesPropertyResolver {
    sources: Arc<MutablePropertySources>,
    conversion_service: RwLock<Arc<dyn ConversionService>>,
    required_properties: RwLock<Vec<String>>,
    ignore_unresolvable_nested: AtomicBool,
    strict_helper: PlaceholderHelper,
    lenient_helper: PlaceholderHelper,
}

impl PropertySourcesPropertyResolver {
    pub fn new(sources: Arc<MutablePropertySources>) -> Self {
        Self {
            sources,
            conversion_service: RwLock::new(Arc::new(DefaultConversionService::new())),
            required_properties: RwLock::new(Vec::new()),
            ignore_unresolvable_nested: AtomicBool::new(false),
            strict_helper: PlaceholderHelper::standard(false),
            lenient_helper: PlaceholderHelper::standard(true),
        }
    }

    pub fn property_sources(&self) -> &Arc<MutablePropertySources> {
        &self.sources
    }

    pub fn set_conversion_service(&self, service: Arc<dyn ConversionService>) {
        *self.conversion_service.write() = service;
    }

    pub fn conversion_service(&self) -> Arc<dyn ConversionService> {
        self.conversion_service.read().clone()
    }

    /// 属性值中嵌套的占位符无法解析时是否保留原样
    pub fn set_ignore_unresolvable_nested_placeholders(&self, ignore: bool) {
        self.ignore_unresolvable_nested.store(ignore, Ordering::Relaxed);
    }

    pub fn set_required_properties(&self, keys: &[&str]) {
        let mut required = self.required_properties.write();
        for key in keys {
            if !required.iter().any(|k| k == key) {
                required.push(key.to_string());
            }
        }
    }

    /// 所有必需属性都存在，否则一次性列出缺失项
    pub fn validate_required_properties(&self) -> ContainerResult<()> {
        let missing: Vec<String> = self
            .required_properties
            .read()
            .iter()
            .filter(|key| !self.contains_property(key))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::MissingRequiredProperties(missing))
        }
    }

    /// 未经占位符解析的原始值
    pub fn get_raw(&self, key: &str) -> Option<ConfigValue> {
        match self.sources.find(key) {
            Some((value, source)) => {
                tracing::trace!("Found key '{}' in PropertySource '{}'", key, source);
                Some(value)
            }
            None => {
                tracing::trace!("Could not find key '{}' in any property source", key);
                None
            }
        }
    }

    /// 取值并转换为目标类型
    pub fn get_property_as(&self, key: &str, target: &ResolvableType) -> ContainerResult<Option<Value>> {
        let Some(text) = self.get_property(key)? else {
            return Ok(None);
        };
        let service = self.conversion_service();
        service
            .convert(Value::Text(text), target)
            .map(Some)
            .map_err(|e| match e {
                ContainerError::TypeMismatch {
                    property: None,
                    value,
                    required_type,
                    message,
                } => ContainerError::TypeMismatch {
                    property: Some(key.to_string()),
                    value,
                    required_type,
                    message,
                },
                other => other,
            })
    }

    pub fn get_typed<T: Any + Send + Sync + Clone>(&self, key: &str) -> ContainerResult<Option<T>> {
        match self.get_property_as(key, &ResolvableType::of::<T>())? {
            Some(value) => value.get::<T>().map(Some),
            None => Ok(None),
        }
    }

    fn raw_text(&self, key: &str) -> Option<String> {
        self.get_raw(key).and_then(|value| value.to_text())
    }

    fn resolve_with(&self, helper: &PlaceholderHelper, text: &str) -> ContainerResult<String> {
        helper.replace_placeholders(text, &|key| self.raw_text(key))
    }
}

impl PropertyResolver for PropertySourcesPropertyResolver {
    fn contains_property(&self, key: &str) -> bool {
        self.sources.snapshot().iter().any(|source| source.contains(key))
    }

    fn get_property(&self, key: &str) -> ContainerResult<Option<String>> {
        let Some(text) = self.raw_text(key) else {
            return Ok(None);
        };
        let helper = if self.ignore_unresolvable_nested.load(Ordering::Relaxed) {
            &self.lenient_helper
        } else {
            &self.strict_helper
        };
        self.resolve_with(helper, &text).map(Some)
    }

    fn resolve_placeholders(&self, text: &str) -> ContainerResult<String> {
        self.resolve_with(&self.lenient_helper, text)
    }

    fn resolve_required_placeholders(&self, text: &str) -> ContainerResult<String> {
        self.resolve_with(&self.strict_helper, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapPropertySource;

    fn resolver(pairs: &[(&str, &str)]) -> PropertySourcesPropertyResolver {
        let sources = Arc::new(MutablePropertySources::new());
        sources.add_last(Arc::new(MapPropertySource::from_pairs(
            "test",
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )));
        PropertySourcesPropertyResolver::new(sources)
    }

    #[test]
    fn test_nested_resolution_in_values() {
        let resolver = resolver(&[("host", "localhost"), ("url", "http://${host}:${port:8080}")]);
        assert_eq!(resolver.get_property("url").unwrap().unwrap(), "http://localhost:8080");
        assert_eq!(resolver.get_property("missing").unwrap(), None);
        assert_eq!(resolver.get_property_or("missing", "x").unwrap(), "x");
    }

    #[test]
    fn test_self_referencing_property_is_circular() {
        let resolver = resolver(&[("a", "${a}")]);
        assert!(matches!(
            resolver.get_property("a"),
            Err(ContainerError::CircularPlaceholder { .. })
        ));
    }

    #[test]
    fn test_strict_and_lenient_text_resolution() {
        let resolver = resolver(&[("name", "sprig")]);
        assert_eq!(resolver.resolve_placeholders("${name}/${other}").unwrap(), "sprig/${other}");
        assert!(resolver.resolve_required_placeholders("${name}/${other}").is_err());
    }

    #[test]
    fn test_typed_access_and_required_validation() {
        let resolver = resolver(&[("port", "9090"), ("bad", "x")]);
        assert_eq!(resolver.get_typed::<u16>("port").unwrap(), Some(9090));
        assert!(matches!(
            resolver.get_typed::<u16>("bad"),
            Err(ContainerError::TypeMismatch { property: Some(ref p), .. }) if p == "bad"
        ));

        resolver.set_required_properties(&["port", "db.url", "db.user"]);
        match resolver.validate_required_properties() {
            Err(ContainerError::MissingRequiredProperties(missing)) => {
                assert_eq!(missing, vec!["db.url", "db.user"]);
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }
}
