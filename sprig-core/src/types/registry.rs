use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::annotation;
use crate::error::{ContainerError, ContainerResult};
use crate::event;
use crate::value::BeanObject;

use super::{ResolvableType, TypeKind, TypeMetadata};

/// 类型自省能力：按名称取得类型元数据
pub trait TypeIntrospector: Send + Sync {
    fn describe(&self, type_name: &str) -> Option<Arc<TypeMetadata>>;

    /// 具体 Rust 类型注册时使用的名称
    fn registered_name(&self, _type_id: TypeId) -> Option<String> {
        None
    }
}

/// 通过 inventory 在编译期收集的类型描述
///
/// ```ignore
/// sprig_core::register_type!(|| TypeMetadata::of::<UserService>()
///     .default_constructor(|| Ok(UserService::default()))
///     .build());
/// ```
pub struct TypeSubmission {
    pub describe: fn() -> TypeMetadata,
}

inventory::collect!(TypeSubmission);

/// 提交一个类型描述，供 [`TypeRegistry::from_inventory`] 收集
#[macro_export]
macro_rules! register_type {
    ($describe:expr) => {
        $crate::inventory::submit! {
            $crate::types::TypeSubmission { describe: $describe }
        }
    };
}

/// 类型元数据注册表
///
/// 每个 bean 工厂拥有一个注册表；标准注解与容器事件类型在创建时预先注册。
pub struct TypeRegistry {
    types: RwLock<HashMap<String, Arc<TypeMetadata>>>,
    by_type_id: RwLock<HashMap<TypeId, String>>,
}

impl TypeRegistry {
    /// 包含标准注解与事件类型的注册表
    pub fn new() -> Self {
        let registry = Self::empty();
        for metadata in annotation::standard::annotation_types() {
            registry.register(metadata);
        }
        for metadata in event::standard_event_types() {
            registry.register(metadata);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            by_type_id: RwLock::new(HashMap::new()),
        }
    }

    /// 标准类型加上所有通过 [`register_type!`] 提交的类型
    pub fn from_inventory() -> Self {
        let registry = Self::new();
        for submission in inventory::iter::<TypeSubmission> {
            let metadata = (submission.describe)();
            tracing::debug!("Collected type metadata for '{}'", metadata.name());
            registry.register(metadata);
        }
        registry
    }

    /// 注册（或替换）类型描述
    ///
    /// 同名的注解类型不会被普通类型覆盖，此时记录警告并返回原有的注解类型。
    pub fn register(&self, metadata: TypeMetadata) -> Arc<TypeMetadata> {
        if let Some(annotation) = self.shadowed_annotation(&metadata) {
            tracing::warn!(
                "Ignoring type metadata for '{}': the name is taken by an annotation type",
                metadata.name()
            );
            return annotation;
        }
        self.insert(metadata)
    }

    /// 与 [`register`](Self::register) 相同，但覆盖注解类型时返回错误
    pub fn try_register(&self, metadata: TypeMetadata) -> ContainerResult<Arc<TypeMetadata>> {
        if self.shadowed_annotation(&metadata).is_some() {
            return Err(ContainerError::IllegalArgument(format!(
                "Type '{}' would shadow the annotation type of the same name",
                metadata.name()
            )));
        }
        Ok(self.insert(metadata))
    }

    fn shadowed_annotation(&self, metadata: &TypeMetadata) -> Option<Arc<TypeMetadata>> {
        if metadata.kind() == TypeKind::Annotation {
            return None;
        }
        self.types
            .read()
            .get(metadata.name())
            .filter(|existing| existing.kind() == TypeKind::Annotation)
            .cloned()
    }

    fn insert(&self, metadata: TypeMetadata) -> Arc<TypeMetadata> {
        let metadata = Arc::new(metadata);
        if let Some(type_id) = metadata.type_id() {
            self.by_type_id.write().insert(type_id, metadata.name().to_string());
        }
        let previous = self
            .types
            .write()
            .insert(metadata.name().to_string(), metadata.clone());
        if previous.is_some() {
            tracing::debug!("Replaced type metadata for '{}'", metadata.name());
        }
        metadata
    }

    /// 实例的具体类型对应的描述
    pub fn describe_instance(&self, bean: &BeanObject) -> Option<Arc<TypeMetadata>> {
        let name = self.by_type_id.read().get(&(**bean).type_id()).cloned()?;
        self.describe(&name)
    }

    /// 带 `TypeId` 的类型换成注册时使用的名称，其余原样返回
    pub fn canonicalize(&self, ty: ResolvableType) -> ResolvableType {
        match ty {
            ResolvableType::Class {
                name,
                generics,
                type_id: Some(type_id),
            } => ResolvableType::Class {
                name: self.registered_name(type_id).unwrap_or(name),
                generics,
                type_id: Some(type_id),
            },
            other => other,
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.read().contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeIntrospector for TypeRegistry {
    fn describe(&self, type_name: &str) -> Option<Arc<TypeMetadata>> {
        self.types.read().get(type_name).cloned()
    }

    fn registered_name(&self, type_id: TypeId) -> Option<String> {
        self.by_type_id.read().get(&type_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_types_are_preregistered() {
        let registry = TypeRegistry::new();
        assert!(registry.contains(annotation::standard::AUTOWIRED));
        assert!(registry.contains(event::CONTEXT_REFRESHED_EVENT));
        assert!(TypeRegistry::empty().is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let registry = TypeRegistry::empty();
        registry.register(TypeMetadata::interface("Greeter").build());
        registry.register(
            TypeMetadata::interface("Greeter")
                .type_params(&["T"])
                .build(),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.describe("Greeter").unwrap().type_params().len(), 1);
    }

    #[test]
    fn test_plain_types_cannot_shadow_annotation_types() {
        struct Component;
        let registry = TypeRegistry::new();
        let kept = registry.register(TypeMetadata::named::<Component>(annotation::standard::COMPONENT).build());
        assert_eq!(kept.kind(), TypeKind::Annotation);
        assert_eq!(
            registry.describe(annotation::standard::COMPONENT).unwrap().kind(),
            TypeKind::Annotation
        );
        assert!(matches!(
            registry.try_register(TypeMetadata::named::<Component>(annotation::standard::COMPONENT).build()),
            Err(ContainerError::IllegalArgument(_))
        ));
        assert!(registry.try_register(TypeMetadata::named::<Component>("Widget").build()).is_ok());
    }

    #[test]
    fn test_describe_instance_by_type_id() {
        struct Engine;
        let registry = TypeRegistry::empty();
        registry.register(TypeMetadata::named::<Engine>("Engine").build());
        let bean: BeanObject = Arc::new(Engine);
        assert_eq!(registry.describe_instance(&bean).unwrap().name(), "Engine");
        let other: BeanObject = Arc::new(1u8);
        assert!(registry.describe_instance(&other).is_none());
    }
}
