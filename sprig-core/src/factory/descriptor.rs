use std::fmt;

use crate::annotation::Annotation;
use crate::types::{ParameterMetadata, PropertyMetadata, ResolvableType};

/// 注入点描述：需要的类型、名称、注解以及是否必需
#[derive(Debug, Clone)]
pub struct DependencyDescriptor {
    dependency_type: ResolvableType,
    dependency_name: Option<String>,
    annotations: Vec<Annotation>,
    required: bool,
    eager: bool,
    injection_point: String,
}

impl DependencyDescriptor {
    pub fn new(dependency_type: ResolvableType, required: bool) -> Self {
        let injection_point = format!("type '{}'", dependency_type);
        Self {
            required: required && !dependency_type.is_optional(),
            dependency_type,
            dependency_name: None,
            annotations: Vec::new(),
            eager: true,
            injection_point,
        }
    }

    /// 构造器或方法的第 `index` 个参数
    pub fn for_parameter(owner: &str, index: usize, param: &ParameterMetadata, required: bool) -> Self {
        let mut descriptor = Self::new(param.ty.clone(), required);
        descriptor.dependency_name = param.name.clone();
        descriptor.annotations = param.annotations.clone();
        descriptor.injection_point = match &param.name {
            Some(name) => format!("parameter {} ('{}') of {}", index, name, owner),
            None => format!("parameter {} of {}", index, owner),
        };
        descriptor
    }

    pub fn for_property(owner: &str, property: &PropertyMetadata, required: bool) -> Self {
        let mut descriptor = Self::new(property.ty.clone(), required);
        descriptor.dependency_name = Some(property.name.clone());
        descriptor.annotations = property.annotations.clone();
        descriptor.injection_point = format!("property '{}' of {}", property.name, owner);
        descriptor
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.dependency_name = Some(name.into());
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// 为假时匹配类型不会触发 FactoryBean 的提前创建
    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn dependency_type(&self) -> &ResolvableType {
        &self.dependency_type
    }

    pub fn dependency_name(&self) -> Option<&str> {
        self.dependency_name.as_deref()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    pub fn injection_point(&self) -> &str {
        &self.injection_point
    }

    /// 包装类型（`Option`、`ObjectProvider`、集合元素）内层的描述
    pub(crate) fn nested(&self, inner: ResolvableType, required: bool) -> Self {
        Self {
            required: required && !inner.is_optional(),
            dependency_type: inner,
            dependency_name: self.dependency_name.clone(),
            annotations: self.annotations.clone(),
            eager: self.eager,
            injection_point: self.injection_point.clone(),
        }
    }

    pub(crate) fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.injection_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_type_is_never_required() {
        let descriptor = DependencyDescriptor::new(ResolvableType::option_of(ResolvableType::class("Repo")), true);
        assert!(!descriptor.is_required());

        let inner = descriptor.nested(ResolvableType::class("Repo"), false);
        assert_eq!(inner.dependency_type().raw_name(), Some("Repo"));
        assert!(!inner.is_required());
    }

    #[test]
    fn test_parameter_injection_point() {
        let param = ParameterMetadata::new("repo", ResolvableType::class("Repo"));
        let descriptor = DependencyDescriptor::for_parameter("Service(repo: Repo)", 0, &param, true);
        assert_eq!(descriptor.dependency_name(), Some("repo"));
        assert_eq!(descriptor.to_string(), "parameter 0 ('repo') of Service(repo: Repo)");
    }
}
