use std::sync::Arc;

use crate::error::{ContainerError, ContainerResult};
use crate::types::ResolvableType;
use crate::value::Value;

use super::{ConversionService, DefaultConversionService, PropertyEditorRegistry};

/// 把配置值转换为注入点需要的类型
pub trait TypeConverter {
    fn convert_if_necessary(
        &self,
        value: Value,
        required_type: &ResolvableType,
        property: Option<&str>,
    ) -> ContainerResult<Value>;
}

/// 依次尝试自定义编辑器、转换服务与内置转换
pub struct SimpleTypeConverter {
    editors: PropertyEditorRegistry,
    conversion_service: Option<Arc<dyn ConversionService>>,
    defaults: Arc<DefaultConversionService>,
}

impl SimpleTypeConverter {
    pub fn new(defaults: Arc<DefaultConversionService>) -> Self {
        Self {
            editors: PropertyEditorRegistry::new(),
            conversion_service: None,
            defaults,
        }
    }

    pub fn with_conversion_service(mut self, service: Option<Arc<dyn ConversionService>>) -> Self {
        self.conversion_service = service;
        self
    }

    pub fn editors(&self) -> &PropertyEditorRegistry {
        &self.editors
    }
}

impl TypeConverter for SimpleTypeConverter {
    fn convert_if_necessary(
        &self,
        value: Value,
        required_type: &ResolvableType,
        property: Option<&str>,
    ) -> ContainerResult<Value> {
        if let Value::Text(text) = &value {
            if let Some(editor) = self.editors.find_custom_editor(required_type, property) {
                return editor.set_as_text(text).map_err(|e| {
                    ContainerError::type_mismatch(property, text.clone(), required_type.to_string(), e.to_string())
                });
            }
        }
        if let Some(service) = &self.conversion_service {
            if service.can_convert(&value, required_type) {
                return service.convert(value, required_type).map_err(|e| with_property(e, property));
            }
        }
        self.defaults
            .convert(value, required_type)
            .map_err(|e| with_property(e, property))
    }
}

fn with_property(error: ContainerError, property: Option<&str>) -> ContainerError {
    match error {
        ContainerError::TypeMismatch {
            property: None,
            value,
            required_type,
            message,
        } => ContainerError::TypeMismatch {
            property: property.map(str::to_string),
            value,
            required_type,
            message,
        },
        ContainerError::ConversionNotSupported {
            source_type,
            target_type,
        } if property.is_some() => ContainerError::type_mismatch(
            property,
            source_type,
            target_type,
            "no matching editors or conversion strategy found",
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::text_editor;

    #[test]
    fn test_custom_editor_takes_precedence() {
        let converter = SimpleTypeConverter::new(Arc::new(DefaultConversionService::new()));
        converter.editors().register_custom_editor(
            &ResolvableType::of::<u32>(),
            text_editor(|s| Ok(Value::object(s.len() as u32))),
        );
        let converted = converter
            .convert_if_necessary(Value::text("12345"), &ResolvableType::of::<u32>(), None)
            .unwrap();
        assert_eq!(converted.get::<u32>().unwrap(), 5);
    }

    #[test]
    fn test_failure_names_property() {
        let converter = SimpleTypeConverter::new(Arc::new(DefaultConversionService::new()));
        let err = converter
            .convert_if_necessary(Value::text("x"), &ResolvableType::of::<u8>(), Some("retries"))
            .unwrap_err();
        assert!(matches!(err, ContainerError::TypeMismatch { property: Some(ref p), .. } if p == "retries"));
    }
}
