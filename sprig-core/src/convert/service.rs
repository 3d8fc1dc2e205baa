use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};
use crate::types::ResolvableType;
use crate::value::Value;

/// 单个转换函数
pub type ConverterFn = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// 类型转换服务
///
/// 源类型由值本身决定（文本视为 `String`，对象取其 `TypeId`），
/// 目标类型按 [`ResolvableType`] 的类型名匹配。
pub trait ConversionService: Send + Sync {
    fn can_convert(&self, value: &Value, target: &ResolvableType) -> bool;

    fn convert(&self, value: Value, target: &ResolvableType) -> ContainerResult<Value>;
}

fn source_type_id(value: &Value) -> Option<TypeId> {
    match value {
        Value::Text(_) => Some(TypeId::of::<String>()),
        Value::Object(o) => Some((**o).type_id()),
        _ => None,
    }
}

fn already_matches(value: &Value, target: &ResolvableType) -> bool {
    match (value, target) {
        (_, ResolvableType::Unresolved | ResolvableType::Variable(_)) => true,
        (Value::Null | Value::Provider(_), _) => true,
        (Value::Text(_), t) => t.type_id() == Some(TypeId::of::<String>()),
        (Value::Object(o), t) => t.type_id().is_some() && t.type_id() == Some((**o).type_id()),
        _ => false,
    }
}

/// 以 (源类型, 目标类型名) 为键注册转换函数的转换服务
///
/// 另外内置集合转换：列表逐个元素转换，逗号分隔的文本拆分为列表，映射逐个值转换。
#[derive(Default)]
pub struct GenericConversionService {
    converters: RwLock<HashMap<(TypeId, String), ConverterFn>>,
}

impl GenericConversionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 `S -> T` 的转换
    pub fn add_converter<S, T, F>(&self, f: F)
    where
        S: Any + Send + Sync,
        T: Any + Send + Sync,
        F: Fn(&S) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let converter: ConverterFn = Arc::new(move |value: &Value| {
            let source = value.downcast::<S>().map_err(anyhow::Error::from)?;
            f(&source).map(Value::object)
        });
        self.converters
            .write()
            .insert((TypeId::of::<S>(), type_name::<T>().to_string()), converter);
    }

    /// 注册到按名称引用的目标类型的转换
    pub fn add_named_converter<S: Any + Send + Sync>(&self, target: impl Into<String>, converter: ConverterFn) {
        self.converters
            .write()
            .insert((TypeId::of::<S>(), target.into()), converter);
    }

    fn find_converter(&self, value: &Value, target: &ResolvableType) -> Option<ConverterFn> {
        let source = source_type_id(value)?;
        let target = target.raw_name()?;
        self.converters.read().get(&(source, target.to_string())).cloned()
    }

    fn convert_elements(&self, items: Vec<Value>, element: &ResolvableType) -> ContainerResult<Vec<Value>> {
        items.into_iter().map(|item| self.convert(item, element)).collect()
    }
}

impl ConversionService for GenericConversionService {
    fn can_convert(&self, value: &Value, target: &ResolvableType) -> bool {
        if already_matches(value, target) {
            return true;
        }
        if let Some(element) = target.element_type() {
            return match value {
                Value::List(items) => items.iter().all(|item| self.can_convert(item, element)),
                Value::Text(text) => text
                    .split(',')
                    .all(|part| self.can_convert(&Value::text(part.trim()), element)),
                _ => false,
            };
        }
        if target.is_map() {
            return match value {
                Value::Map(entries) => entries.iter().all(|(_, v)| self.can_convert(v, target.generic(1))),
                _ => false,
            };
        }
        if target.is_optional() {
            return self.can_convert(value, target.generic(0));
        }
        self.find_converter(value, target).is_some()
    }

    fn convert(&self, value: Value, target: &ResolvableType) -> ContainerResult<Value> {
        if already_matches(&value, target) {
            return Ok(value);
        }
        if let Some(element) = target.element_type() {
            return match value {
                Value::List(items) => Ok(Value::List(self.convert_elements(items, element)?)),
                Value::Text(text) => {
                    let parts = text
                        .split(',')
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(Value::text)
                        .collect();
                    Ok(Value::List(self.convert_elements(parts, element)?))
                }
                other => Err(not_supported(&other, target)),
            };
        }
        if target.is_map() {
            return match value {
                Value::Map(entries) => entries
                    .into_iter()
                    .map(|(k, v)| self.convert(v, target.generic(1)).map(|v| (k, v)))
                    .collect::<ContainerResult<Vec<_>>>()
                    .map(Value::Map),
                other => Err(not_supported(&other, target)),
            };
        }
        if target.is_optional() {
            return self.convert(value, target.generic(0));
        }
        let converter = self
            .find_converter(&value, target)
            .ok_or_else(|| not_supported(&value, target))?;
        converter(&value).map_err(|e| {
            ContainerError::type_mismatch(None, value.describe(), target.to_string(), e.to_string())
        })
    }
}

fn not_supported(value: &Value, target: &ResolvableType) -> ContainerError {
    let source_type = match value {
        Value::Text(_) => type_name::<String>().to_string(),
        other => other.describe(),
    };
    ContainerError::ConversionNotSupported {
        source_type,
        target_type: target.to_string(),
    }
}

/// 预置了常用文本转换的转换服务
///
/// 字符串到整数、浮点、布尔、字符、路径，以及数值到字符串。
pub struct DefaultConversionService {
    inner: GenericConversionService,
}

impl DefaultConversionService {
    pub fn new() -> Self {
        let inner = GenericConversionService::new();
        Self::add_default_converters(&inner);
        Self { inner }
    }

    pub fn add_default_converters(service: &GenericConversionService) {
        macro_rules! parse_from_text {
            ($($ty:ty),*) => {
                $(
                    service.add_converter::<String, $ty, _>(|s| {
                        s.trim().parse::<$ty>().map_err(|e| anyhow!("{}", e))
                    });
                    service.add_converter::<$ty, String, _>(|v| Ok(v.to_string()));
                )*
            };
        }
        parse_from_text!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

        service.add_converter::<String, bool, _>(|s| parse_bool(s));
        service.add_converter::<bool, String, _>(|b| Ok(b.to_string()));
        service.add_converter::<String, char, _>(|s| {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(anyhow!("Can only convert a [String] with length of 1 to a [char]; string value '{}' has length of {}", s, s.chars().count())),
            }
        });
        service.add_converter::<String, PathBuf, _>(|s| Ok(PathBuf::from(s)));
    }
}

fn parse_bool(text: &str) -> anyhow::Result<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(anyhow!("Invalid boolean value '{}'", other)),
    }
}

impl Default for DefaultConversionService {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for DefaultConversionService {
    type Target = GenericConversionService;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl ConversionService for DefaultConversionService {
    fn can_convert(&self, value: &Value, target: &ResolvableType) -> bool {
        self.inner.can_convert(value, target)
    }

    fn convert(&self, value: Value, target: &ResolvableType) -> ContainerResult<Value> {
        self.inner.convert(value, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_to_primitives() {
        let service = DefaultConversionService::new();
        let port = service.convert(Value::text("8080"), &ResolvableType::of::<u16>()).unwrap();
        assert_eq!(port.get::<u16>().unwrap(), 8080);

        let flag = service.convert(Value::text("on"), &ResolvableType::of::<bool>()).unwrap();
        assert!(flag.get::<bool>().unwrap());
    }

    #[test]
    fn test_comma_separated_text_to_list() {
        let service = DefaultConversionService::new();
        let target = ResolvableType::vec_of(ResolvableType::of::<i32>());
        let list = service.convert(Value::text("1, 2,3"), &target).unwrap();
        let values: Vec<i32> = list.list::<i32>().unwrap().into_iter().map(|v| *v).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_number_is_type_mismatch() {
        let service = DefaultConversionService::new();
        let err = service
            .convert(Value::text("abc"), &ResolvableType::of::<u32>())
            .unwrap_err();
        assert!(matches!(err, ContainerError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_target_not_supported() {
        struct Unknown;
        let service = DefaultConversionService::new();
        let target = ResolvableType::of::<Unknown>();
        assert!(!service.can_convert(&Value::text("x"), &target));
        assert!(matches!(
            service.convert(Value::text("x"), &target),
            Err(ContainerError::ConversionNotSupported { .. })
        ));
    }

    #[test]
    fn test_custom_converter() {
        #[derive(Debug, PartialEq)]
        struct Money(i64);
        let service = GenericConversionService::new();
        service.add_converter::<String, Money, _>(|s| Ok(Money(s.trim_start_matches('$').parse()?)));
        let money = service.convert(Value::text("$12"), &ResolvableType::of::<Money>()).unwrap();
        assert_eq!(*money.downcast::<Money>().unwrap(), Money(12));
    }
}
