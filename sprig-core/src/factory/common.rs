use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::annotation::{standard, SearchStrategy};
use crate::bean::MutablePropertyValues;
use crate::bean_post_processor::{
    BeanPostProcessor, DestructionAwareBeanPostProcessor, InstantiationAwareBeanPostProcessor,
};
use crate::constants::LOWEST_PRECEDENCE;
use crate::error::{ContainerError, ContainerResult};
use crate::types::TypeMetadata;
use crate::value::{Args, BeanObject, Value};

use super::default::DefaultListableBeanFactory;
use super::{BeanFactory, ConfigurableBeanFactory, DependencyDescriptor};

/// 一个类型上的生命周期方法与 `@Resource` 属性
#[derive(Debug, Default)]
struct LifecycleMetadata {
    init_methods: Vec<usize>,
    destroy_methods: Vec<usize>,
    resources: Vec<(usize, Option<String>)>,
}

/// 处理 `@PostConstruct`、`@PreDestroy` 与 `@Resource`
///
/// 方法上的注解沿类型层级查找，子类覆盖方法时不必重复声明。
pub struct CommonAnnotationBeanPostProcessor {
    factory: Weak<DefaultListableBeanFactory>,
    cache: RwLock<HashMap<String, Arc<LifecycleMetadata>>>,
}

impl CommonAnnotationBeanPostProcessor {
    pub const TYPE_NAME: &'static str = "CommonAnnotationBeanPostProcessor";

    pub fn new(factory: Weak<DefaultListableBeanFactory>) -> Self {
        Self {
            factory,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn type_metadata() -> TypeMetadata {
        TypeMetadata::named::<Self>(Self::TYPE_NAME)
            .bean_post_processor()
            .priority_ordered()
            .build()
    }

    fn factory(&self) -> ContainerResult<Arc<DefaultListableBeanFactory>> {
        self.factory
            .upgrade()
            .ok_or_else(|| ContainerError::IllegalState("Bean factory has already been dropped".to_string()))
    }

    fn lifecycle_metadata(
        &self,
        factory: &DefaultListableBeanFactory,
        metadata: &TypeMetadata,
    ) -> ContainerResult<Arc<LifecycleMetadata>> {
        if let Some(cached) = self.cache.read().get(metadata.name()) {
            return Ok(cached.clone());
        }

        let mut lifecycle = LifecycleMetadata::default();
        for (index, method) in metadata.methods().iter().enumerate() {
            if method.is_static {
                continue;
            }
            let merged = factory
                .introspector
                .for_method(metadata.name(), method, SearchStrategy::TypeHierarchy)?;
            let init = merged.is_present(standard::POST_CONSTRUCT);
            let destroy = merged.is_present(standard::PRE_DESTROY);
            if (init || destroy) && !method.params.is_empty() {
                return Err(ContainerError::IllegalState(format!(
                    "Lifecycle annotation requires a no-arg method: {}.{}",
                    metadata.name(),
                    method.signature()
                )));
            }
            if init {
                tracing::trace!("Found init method on class [{}]: {}", metadata.name(), method.name);
                lifecycle.init_methods.push(index);
            }
            if destroy {
                tracing::trace!("Found destroy method on class [{}]: {}", metadata.name(), method.name);
                lifecycle.destroy_methods.push(index);
            }
        }
        for (index, property) in metadata.properties().iter().enumerate() {
            if property.annotations.is_empty() {
                continue;
            }
            let source = format!("{}.{}", metadata.name(), property.name);
            let merged = factory.introspector.for_annotations(&property.annotations, &source)?;
            if let Some(resource) = merged.get(standard::RESOURCE) {
                let name = resource.string("name").filter(|n| !n.is_empty()).map(str::to_string);
                lifecycle.resources.push((index, name));
            }
        }

        let lifecycle = Arc::new(lifecycle);
        self.cache.write().insert(metadata.name().to_string(), lifecycle.clone());
        Ok(lifecycle)
    }

    fn metadata_of(&self, factory: &DefaultListableBeanFactory, bean: &BeanObject) -> Option<Arc<TypeMetadata>> {
        factory.types.describe_instance(bean)
    }

    fn invoke(metadata: &TypeMetadata, bean: &BeanObject, index: usize) -> anyhow::Result<()> {
        metadata.methods()[index].call(Some(bean), &Args::empty()).map(|_: Value| ())
    }

    /// `@Resource`：先按名称查找，未显式指定名称且没有同名 bean 时按类型查找
    fn inject_resource(
        &self,
        factory: &DefaultListableBeanFactory,
        bean: &BeanObject,
        bean_name: &str,
        metadata: &TypeMetadata,
        index: usize,
        explicit_name: Option<&str>,
    ) -> ContainerResult<()> {
        let property = &metadata.properties()[index];
        let resource_name = explicit_name.unwrap_or(&property.name);
        let value = if explicit_name.is_none() && !factory.contains_bean(resource_name) {
            let descriptor = DependencyDescriptor::for_property(metadata.name(), property, true);
            let mut autowired = Vec::new();
            let value = factory
                .do_resolve_dependency(&descriptor, Some(bean_name), &mut autowired)
                .map_err(|e| ContainerError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: descriptor.to_string(),
                    source: Box::new(e),
                })?;
            for name in autowired {
                factory.register_dependent_bean(&name, bean_name);
            }
            value
        } else {
            let resource = factory.get_typed_bean(resource_name, &property.ty).map_err(|e| {
                ContainerError::wrap_creation(
                    bean_name,
                    format!("Injection of resource dependency '{}' failed", resource_name),
                    e,
                )
            })?;
            factory.register_dependent_bean(resource_name, bean_name);
            Value::Object(resource)
        };
        property.set(bean, value).map_err(|e| ContainerError::BeanCreation {
            bean_name: bean_name.to_string(),
            message: format!("Injection of resource dependency '{}' failed", property.name),
            source: Some(Box::new(ContainerError::Other(e))),
        })
    }
}

impl BeanPostProcessor for CommonAnnotationBeanPostProcessor {
    fn post_process_before_initialization(
        &self,
        bean: BeanObject,
        bean_name: &str,
    ) -> ContainerResult<Option<BeanObject>> {
        let factory = self.factory()?;
        let Some(metadata) = self.metadata_of(&factory, &bean) else {
            return Ok(Some(bean));
        };
        let lifecycle = self.lifecycle_metadata(&factory, &metadata)?;
        for &index in &lifecycle.init_methods {
            tracing::trace!(
                "Invoking init method on bean '{}': {}",
                bean_name,
                metadata.methods()[index].name
            );
            Self::invoke(&metadata, &bean, index).map_err(|e| ContainerError::BeanCreation {
                bean_name: bean_name.to_string(),
                message: format!("Invocation of init method '{}' failed", metadata.methods()[index].name),
                source: Some(Box::new(ContainerError::Other(e))),
            })?;
        }
        Ok(Some(bean))
    }

    fn name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE - 3
    }

    fn as_instantiation_aware(&self) -> Option<&dyn InstantiationAwareBeanPostProcessor> {
        Some(self)
    }

    fn as_destruction_aware(&self) -> Option<&dyn DestructionAwareBeanPostProcessor> {
        Some(self)
    }
}

impl InstantiationAwareBeanPostProcessor for CommonAnnotationBeanPostProcessor {
    fn post_process_properties(
        &self,
        pvs: MutablePropertyValues,
        bean: &BeanObject,
        metadata: &TypeMetadata,
        bean_name: &str,
    ) -> ContainerResult<Option<MutablePropertyValues>> {
        let factory = self.factory()?;
        let lifecycle = self.lifecycle_metadata(&factory, metadata)?;
        for (index, name) in &lifecycle.resources {
            if pvs.contains(&metadata.properties()[*index].name) {
                continue;
            }
            self.inject_resource(&factory, bean, bean_name, metadata, *index, name.as_deref())?;
        }
        Ok(Some(pvs))
    }
}

impl DestructionAwareBeanPostProcessor for CommonAnnotationBeanPostProcessor {
    fn post_process_before_destruction(&self, bean: &BeanObject, bean_name: &str) -> ContainerResult<()> {
        let factory = self.factory()?;
        let Some(metadata) = self.metadata_of(&factory, bean) else {
            return Ok(());
        };
        let lifecycle = self.lifecycle_metadata(&factory, &metadata)?;
        for &index in &lifecycle.destroy_methods {
            let method = &metadata.methods()[index].name;
            tracing::trace!("Invoking destroy method on bean '{}': {}", bean_name, method);
            if let Err(e) = Self::invoke(&metadata, bean, index) {
                tracing::warn!("Destroy method '{}' on bean with name '{}' failed: {:#}", method, bean_name, e);
            }
        }
        Ok(())
    }

    fn requires_destruction(&self, bean: &BeanObject, _bean_name: &str) -> bool {
        let Ok(factory) = self.factory() else {
            return false;
        };
        self.metadata_of(&factory, bean)
            .and_then(|metadata| self.lifecycle_metadata(&factory, &metadata).ok())
            .is_some_and(|lifecycle| !lifecycle.destroy_methods.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, OnceLock};

    use super::*;
    use crate::annotation::Annotation;
    use crate::bean::{BeanDefinition, BeanDefinitionRegistry};
    use crate::factory::BeanFactoryExt;
    use crate::types::{MethodMetadata, PropertyMetadata, ResolvableType};

    static STARTED: AtomicUsize = AtomicUsize::new(0);
    static STOPPED: AtomicUsize = AtomicUsize::new(0);

    struct Pool;

    struct Worker {
        pool: OnceLock<Arc<Pool>>,
    }

    #[test]
    fn test_lifecycle_annotations_and_resource_injection() {
        let factory = DefaultListableBeanFactory::new();
        let types = factory.types();
        types.register(TypeMetadata::named::<Pool>("Pool").default_constructor(|| Ok(Pool)).build());
        types.register(
            TypeMetadata::named::<Worker>("Worker")
                .default_constructor(|| Ok(Worker { pool: OnceLock::new() }))
                .property(
                    PropertyMetadata::new("pool", ResolvableType::class("Pool"))
                        .annotated(Annotation::new(standard::RESOURCE).with("name", "mainPool"))
                        .setter(|w: &Worker, v: Value| {
                            let _ = w.pool.set(v.downcast::<Pool>()?);
                            Ok(())
                        }),
                )
                .method(
                    MethodMetadata::new("start")
                        .annotated(Annotation::new(standard::POST_CONSTRUCT))
                        .action(|w: &Worker| {
                            assert!(w.pool.get().is_some());
                            STARTED.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }),
                )
                .method(
                    MethodMetadata::new("stop")
                        .annotated(Annotation::new(standard::PRE_DESTROY))
                        .action(|_: &Worker| {
                            STOPPED.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }),
                )
                .build(),
        );
        factory.add_bean_post_processor(Arc::new(CommonAnnotationBeanPostProcessor::new(Arc::downgrade(&factory))));
        factory.register_bean_definition("mainPool", BeanDefinition::class("Pool")).unwrap();
        factory.register_bean_definition("worker", BeanDefinition::class("Worker")).unwrap();

        let worker = factory.get_bean_as::<Worker>("worker").unwrap();
        assert!(worker.pool.get().is_some());
        assert_eq!(STARTED.load(Ordering::SeqCst), 1);

        factory.destroy_singletons();
        assert_eq!(STOPPED.load(Ordering::SeqCst), 1);
    }
}
