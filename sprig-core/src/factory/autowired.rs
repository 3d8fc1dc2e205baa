use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::annotation::{standard, Annotation, MergedAnnotation, SearchStrategy};
use crate::bean::MutablePropertyValues;
use crate::bean_post_processor::{
    BeanPostProcessor, InstantiationAwareBeanPostProcessor, SmartInstantiationAwareBeanPostProcessor,
};
use crate::constants::LOWEST_PRECEDENCE;
use crate::error::{ContainerError, ContainerResult};
use crate::types::TypeMetadata;
use crate::value::{Args, BeanObject, Value};

use super::default::DefaultListableBeanFactory;
use super::{ConfigurableBeanFactory, DependencyDescriptor};

/// 需要注入的成员，按在类型元数据中的位置记录
#[derive(Debug, Clone)]
enum InjectedElement {
    Property { index: usize, required: bool },
    Method { index: usize, required: bool },
}

/// 处理 `@Autowired`、`@Inject` 与 `@Value` 注入点
///
/// 构造器：返回标注了注解的候选构造器供工厂选择。
/// 属性与方法：在属性值写入之前按类型解析依赖并注入。
pub struct AutowiredAnnotationBeanPostProcessor {
    factory: Weak<DefaultListableBeanFactory>,
    injection_cache: RwLock<HashMap<String, Arc<Vec<InjectedElement>>>>,
    constructor_cache: RwLock<HashMap<String, Option<Vec<usize>>>>,
}

impl AutowiredAnnotationBeanPostProcessor {
    pub const TYPE_NAME: &'static str = "AutowiredAnnotationBeanPostProcessor";

    pub fn new(factory: Weak<DefaultListableBeanFactory>) -> Self {
        Self {
            factory,
            injection_cache: RwLock::new(HashMap::new()),
            constructor_cache: RwLock::new(HashMap::new()),
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

    /// 注入注解；`@Inject` 与 `@Value` 总是必需的
    fn find_autowired<'a>(mut merged: impl Iterator<Item = &'a MergedAnnotation>) -> Option<bool> {
        merged.find_map(|annotation| match annotation.type_name() {
            standard::AUTOWIRED => Some(annotation.bool("required").unwrap_or(true)),
            standard::INJECT | standard::VALUE => Some(true),
            _ => None,
        })
    }

    fn autowired_on(
        factory: &DefaultListableBeanFactory,
        annotations: &[Annotation],
        source: &str,
    ) -> ContainerResult<Option<bool>> {
        if annotations.is_empty() {
            return Ok(None);
        }
        let merged = factory.introspector.for_annotations(annotations, source)?;
        Ok(Self::find_autowired(merged.iter()))
    }

    fn injection_metadata(
        &self,
        factory: &DefaultListableBeanFactory,
        metadata: &TypeMetadata,
    ) -> ContainerResult<Arc<Vec<InjectedElement>>> {
        if let Some(cached) = self.injection_cache.read().get(metadata.name()) {
            return Ok(cached.clone());
        }

        let mut elements = Vec::new();
        for (index, property) in metadata.properties().iter().enumerate() {
            let source = format!("{}.{}", metadata.name(), property.name);
            if let Some(required) = Self::autowired_on(factory, &property.annotations, &source)? {
                if !property.is_writable() {
                    return Err(ContainerError::BeanDefinitionStore {
                        bean_name: metadata.name().to_string(),
                        message: format!("Autowired property '{}' has no setter", property.name),
                    });
                }
                elements.push(InjectedElement::Property { index, required });
            }
        }
        for (index, method) in metadata.methods().iter().enumerate() {
            if method.is_static {
                tracing::info!(
                    "Autowired annotation is not supported on static methods: {}.{}",
                    metadata.name(),
                    method.name
                );
                continue;
            }
            let merged = factory
                .introspector
                .for_method(metadata.name(), method, SearchStrategy::TypeHierarchy)?;
            if let Some(required) = Self::find_autowired(merged.iter()) {
                if method.params.is_empty() {
                    tracing::info!(
                        "Autowired annotation should only be used on methods with parameters: {}.{}",
                        metadata.name(),
                        method.name
                    );
                }
                elements.push(InjectedElement::Method { index, required });
            }
        }

        let elements = Arc::new(elements);
        self.injection_cache
            .write()
            .insert(metadata.name().to_string(), elements.clone());
        Ok(elements)
    }

    fn inject_property(
        &self,
        factory: &DefaultListableBeanFactory,
        bean: &BeanObject,
        bean_name: &str,
        metadata: &TypeMetadata,
        index: usize,
        required: bool,
    ) -> ContainerResult<()> {
        let property = &metadata.properties()[index];
        let descriptor = DependencyDescriptor::for_property(metadata.name(), property, required);
        let mut autowired = Vec::new();
        let value = factory
            .do_resolve_dependency(&descriptor, Some(bean_name), &mut autowired)
            .map_err(|e| ContainerError::UnsatisfiedDependency {
                bean_name: bean_name.to_string(),
                injection_point: descriptor.to_string(),
                source: Box::new(e),
            })?;
        register_dependents(factory, bean_name, &autowired);
        if value.is_null() && !property.ty.is_optional() {
            return Ok(());
        }
        property.set(bean, value).map_err(|e| ContainerError::BeanCreation {
            bean_name: bean_name.to_string(),
            message: format!("Injection of autowired dependency '{}' failed", property.name),
            source: Some(Box::new(ContainerError::Other(e))),
        })
    }

    fn inject_method(
        &self,
        factory: &DefaultListableBeanFactory,
        bean: &BeanObject,
        bean_name: &str,
        metadata: &TypeMetadata,
        index: usize,
        required: bool,
    ) -> ContainerResult<()> {
        let method = &metadata.methods()[index];
        let owner = format!("{}.{}", metadata.name(), method.signature());
        let mut values = Vec::with_capacity(method.params.len());
        let mut autowired = Vec::new();
        for (position, param) in method.params.iter().enumerate() {
            let descriptor = DependencyDescriptor::for_parameter(&owner, position, param, required);
            let value = factory
                .do_resolve_dependency(&descriptor, Some(bean_name), &mut autowired)
                .map_err(|e| ContainerError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: descriptor.to_string(),
                    source: Box::new(e),
                })?;
            if value.is_null() && !param.ty.is_optional() && !required {
                tracing::trace!("Skipping optional autowired method {} of bean '{}'", owner, bean_name);
                return Ok(());
            }
            values.push(value);
        }
        register_dependents(factory, bean_name, &autowired);
        method
            .call(Some(bean), &Args::new(values))
            .map(|_: Value| ())
            .map_err(|e| ContainerError::BeanCreation {
                bean_name: bean_name.to_string(),
                message: format!("Injection of autowired dependencies via {} failed", owner),
                source: Some(Box::new(ContainerError::Other(e))),
            })
    }
}

fn register_dependents(factory: &DefaultListableBeanFactory, bean_name: &str, autowired: &[String]) {
    for name in autowired {
        factory.register_dependent_bean(name, bean_name);
        tracing::trace!("Autowiring by type from bean name '{}' to bean named '{}'", bean_name, name);
    }
}

impl BeanPostProcessor for AutowiredAnnotationBeanPostProcessor {
    fn name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE - 2
    }

    fn as_instantiation_aware(&self) -> Option<&dyn InstantiationAwareBeanPostProcessor> {
        Some(self)
    }

    fn as_smart_instantiation_aware(&self) -> Option<&dyn SmartInstantiationAwareBeanPostProcessor> {
        Some(self)
    }
}

impl InstantiationAwareBeanPostProcessor for AutowiredAnnotationBeanPostProcessor {
    fn post_process_properties(
        &self,
        pvs: MutablePropertyValues,
        bean: &BeanObject,
        metadata: &TypeMetadata,
        bean_name: &str,
    ) -> ContainerResult<Option<MutablePropertyValues>> {
        let factory = self.factory()?;
        let elements = self.injection_metadata(&factory, metadata)?;
        for element in elements.iter() {
            match *element {
                InjectedElement::Property { index, required } => {
                    // 定义中显式给出的属性值优先
                    if pvs.contains(&metadata.properties()[index].name) {
                        continue;
                    }
                    self.inject_property(&factory, bean, bean_name, metadata, index, required)?;
                }
                InjectedElement::Method { index, required } => {
                    self.inject_method(&factory, bean, bean_name, metadata, index, required)?;
                }
            }
        }
        Ok(Some(pvs))
    }
}

impl SmartInstantiationAwareBeanPostProcessor for AutowiredAnnotationBeanPostProcessor {
    fn determine_candidate_constructors(
        &self,
        metadata: &TypeMetadata,
        bean_name: &str,
    ) -> ContainerResult<Option<Vec<usize>>> {
        if let Some(cached) = self.constructor_cache.read().get(metadata.name()) {
            return Ok(cached.clone());
        }
        let factory = self.factory()?;
        let constructors = metadata.constructors();

        let mut candidates = Vec::new();
        let mut required_constructor: Option<usize> = None;
        let mut default_constructor = None;
        for (index, constructor) in constructors.iter().enumerate() {
            if constructor.params.is_empty() {
                default_constructor = Some(index);
            }
            let source = constructor.signature(metadata.name());
            let Some(required) = Self::autowired_on(&factory, &constructor.annotations, &source)? else {
                continue;
            };
            if let Some(previous) = required_constructor {
                return Err(ContainerError::BeanCreation {
                    bean_name: bean_name.to_string(),
                    message: format!(
                        "Invalid autowire-marked constructor: {}. Found constructor with 'required' Autowired annotation already: {}",
                        source,
                        constructors[previous].signature(metadata.name())
                    ),
                    source: None,
                });
            }
            if required {
                if !candidates.is_empty() {
                    return Err(ContainerError::bean_creation(
                        bean_name,
                        format!(
                            "Invalid autowire-marked constructors: {:?}. Found constructor with 'required' Autowired annotation: {}",
                            candidates,
                            source
                        ),
                    ));
                }
                required_constructor = Some(index);
            }
            candidates.push(index);
        }

        let result = if !candidates.is_empty() {
            if required_constructor.is_none() {
                if let Some(default) = default_constructor {
                    if !candidates.contains(&default) {
                        candidates.push(default);
                    }
                }
            }
            Some(candidates)
        } else if constructors.len() == 1 && !constructors[0].params.is_empty() {
            Some(vec![0])
        } else {
            None
        };
        self.constructor_cache
            .write()
            .insert(metadata.name().to_string(), result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex, OnceLock};

    use super::*;
    use crate::bean::{BeanDefinition, BeanDefinitionRegistry};
    use crate::factory::BeanFactoryExt;
    use crate::types::{MethodMetadata, ParameterMetadata, PropertyMetadata, ResolvableType};

    struct Repository;

    struct Service {
        repository: OnceLock<Arc<Repository>>,
        timeout: OnceLock<u64>,
        audit: Mutex<Option<String>>,
    }

    struct Handler {
        repository: Arc<Repository>,
    }

    fn factory() -> Arc<DefaultListableBeanFactory> {
        let factory = DefaultListableBeanFactory::new();
        let types = factory.types();
        types.register(TypeMetadata::named::<Repository>("Repository").default_constructor(|| Ok(Repository)).build());
        types.register(
            TypeMetadata::named::<Service>("Service")
                .default_constructor(|| {
                    Ok(Service {
                        repository: OnceLock::new(),
                        timeout: OnceLock::new(),
                        audit: Mutex::new(None),
                    })
                })
                .property(
                    PropertyMetadata::new("repository", ResolvableType::class("Repository"))
                        .annotated(Annotation::new(standard::AUTOWIRED))
                        .setter(|s: &Service, v: Value| {
                            let _ = s.repository.set(v.downcast::<Repository>()?);
                            Ok(())
                        }),
                )
                .property(
                    PropertyMetadata::new("timeout", ResolvableType::of::<u64>())
                        .annotated(Annotation::value(standard::VALUE, "30"))
                        .setter(|s: &Service, v: Value| {
                            let _ = s.timeout.set(v.get::<u64>()?);
                            Ok(())
                        }),
                )
                .method(
                    MethodMetadata::new("set_audit")
                        .param(ParameterMetadata::new("audit", ResolvableType::class("Audit")))
                        .annotated(Annotation::new(standard::AUTOWIRED).with("required", false))
                        .invoke::<Service, _>(|s, args| {
                            *s.audit.lock().unwrap() = Some(args.text(0)?);
                            Ok(Value::Null)
                        }),
                )
                .build(),
        );
        types.register(
            TypeMetadata::named::<Handler>("Handler")
                .constructor(
                    vec![ParameterMetadata::new("repository", ResolvableType::class("Repository"))],
                    |args| Ok(Handler { repository: args.bean::<Repository>(0)? }),
                )
                .build(),
        );
        types.register(AutowiredAnnotationBeanPostProcessor::type_metadata());
        factory.add_bean_post_processor(Arc::new(AutowiredAnnotationBeanPostProcessor::new(Arc::downgrade(&factory))));
        factory.register_bean_definition("repository", BeanDefinition::class("Repository")).unwrap();
        factory
    }

    #[test]
    fn test_property_value_and_optional_method_injection() {
        let factory = factory();
        factory.register_bean_definition("service", BeanDefinition::class("Service")).unwrap();

        let service = factory.get_bean_as::<Service>("service").unwrap();
        let repository = factory.get_bean_as::<Repository>("repository").unwrap();
        assert!(Arc::ptr_eq(service.repository.get().unwrap(), &repository));
        assert_eq!(service.timeout.get(), Some(&30));
        assert!(service.audit.lock().unwrap().is_none());
        assert_eq!(factory.dependent_beans("repository"), vec!["service".to_string()]);
    }

    #[test]
    fn test_single_constructor_is_autowired() {
        let factory = factory();
        factory.register_bean_definition("handler", BeanDefinition::class("Handler")).unwrap();
        let handler = factory.get_bean_as::<Handler>("handler").unwrap();
        let repository = factory.get_bean_as::<Repository>("repository").unwrap();
        assert!(Arc::ptr_eq(&handler.repository, &repository));
    }
}
