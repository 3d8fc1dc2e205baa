use std::sync::Arc;

use crate::bean::{AutowireMode, BeanDefinition, BeanMetadataValue, MutablePropertyValues};
use crate::error::{ContainerError, ContainerResult};
use crate::scope::Scope;
use crate::types::{ResolvableType, TypeMetadata};
use crate::value::{Args, BeanObject, Value};

use super::default::{same_object, DefaultListableBeanFactory};
use super::disposable::DisposableBeanAdapter;
use super::{AutowireCapableBeanFactory, BeanFactory, ConfigurableBeanFactory, DependencyDescriptor};

/// bean 的实例化、属性注入与初始化
impl DefaultListableBeanFactory {
    /// 按合并后的定义创建一个完整的实例
    pub(crate) fn create_from_definition(
        &self,
        bean_name: &str,
        mbd: &Arc<BeanDefinition>,
        args: Option<&Args>,
    ) -> ContainerResult<BeanObject> {
        tracing::trace!("Creating instance of bean '{}'", bean_name);
        self.resolve_bean_class(bean_name, mbd)?;

        if let Some(bean) = self.resolve_before_instantiation(bean_name, mbd)? {
            return Ok(bean);
        }

        let bean = self.do_create(bean_name, mbd, args)?;
        tracing::trace!("Finished creating instance of bean '{}'", bean_name);
        Ok(bean)
    }

    fn resolve_bean_class(&self, bean_name: &str, mbd: &BeanDefinition) -> ContainerResult<()> {
        if mbd.instance_supplier.is_some() || mbd.factory_bean_name.is_some() {
            return Ok(());
        }
        let Some(class_name) = mbd.bean_class_name.as_deref() else {
            return Err(ContainerError::bean_creation(
                bean_name,
                "Bean definition has neither a bean class nor a factory bean",
            ));
        };
        if self.metadata_for_class(class_name).is_none() {
            return Err(ContainerError::CannotLoadBeanClass {
                bean_name: bean_name.to_string(),
                class_name: class_name.to_string(),
            });
        }
        Ok(())
    }

    /// 让 InstantiationAware 处理器有机会直接返回实例（例如代理）
    fn resolve_before_instantiation(&self, bean_name: &str, mbd: &BeanDefinition) -> ContainerResult<Option<BeanObject>> {
        if mbd.synthetic || mbd.instance_supplier.is_some() || mbd.has_factory_method() {
            return Ok(None);
        }
        let Some(metadata) = mbd.bean_class_name.as_deref().and_then(|c| self.metadata_for_class(c)) else {
            return Ok(None);
        };
        for processor in self.bean_post_processors() {
            let Some(aware) = processor.as_instantiation_aware() else {
                continue;
            };
            if let Some(bean) = aware.post_process_before_instantiation(&metadata, bean_name)? {
                tracing::debug!(
                    "Bean '{}' instantiated by {} before default instantiation",
                    bean_name,
                    processor.name()
                );
                return self
                    .apply_bean_post_processors_after_initialization(bean, bean_name)
                    .map(Some);
            }
        }
        Ok(None)
    }

    fn do_create(&self, bean_name: &str, mbd: &Arc<BeanDefinition>, args: Option<&Args>) -> ContainerResult<BeanObject> {
        let instance = self.create_bean_instance(bean_name, mbd, args)?;
        let metadata = self
            .types
            .describe_instance(&instance)
            .or_else(|| mbd.bean_class_name.as_deref().and_then(|c| self.metadata_for_class(c)));

        let early_exposure = mbd.is_singleton()
            && self.is_allow_circular_references()
            && self.singletons.is_currently_in_creation(bean_name);
        if early_exposure {
            tracing::trace!(
                "Eagerly caching bean '{}' to allow for resolving potential circular references",
                bean_name
            );
            let factory = self.self_ref.clone();
            let name = bean_name.to_string();
            let definition = mbd.clone();
            let raw = instance.clone();
            self.singletons.add_singleton_factory(
                bean_name,
                Box::new(move || match factory.upgrade() {
                    Some(factory) => factory.early_bean_reference(&name, &definition, raw),
                    None => Ok(raw),
                }),
            );
        }

        let result = self
            .populate(bean_name, mbd, &instance, metadata.as_deref())
            .and_then(|_| self.initialize(bean_name, instance.clone(), Some(mbd), metadata.as_deref()));
        let mut exposed = match result {
            Ok(initialized) => initialized,
            Err(e) => {
                return Err(ContainerError::wrap_creation(bean_name, "Initialization of bean failed", e));
            }
        };

        if early_exposure {
            if let Some(early) = self.singletons.early_reference(bean_name) {
                if same_object(&exposed, &instance) {
                    exposed = early;
                } else if self.singletons.has_dependent_beans(bean_name) {
                    let dependents = self.singletons.dependent_beans(bean_name);
                    return Err(ContainerError::BeanCurrentlyInCreation {
                        bean_name: bean_name.to_string(),
                        message: format!(
                            "Bean with name '{}' has been injected into other beans [{}] in its raw version as part of a circular reference, but has eventually been wrapped. This means that said other beans do not use the final version of the bean.",
                            bean_name,
                            dependents.join(",")
                        ),
                    });
                }
            }
        }

        self.register_disposable_bean_if_necessary(bean_name, &exposed, mbd);
        Ok(exposed)
    }

    fn register_disposable_bean_if_necessary(&self, bean_name: &str, bean: &BeanObject, mbd: &BeanDefinition) {
        if mbd.is_prototype() {
            return;
        }
        let metadata = self.types.describe_instance(bean);
        let processors = self.bean_post_processors();
        let Some(adapter) = DisposableBeanAdapter::new(bean_name, bean.clone(), metadata.as_deref(), mbd, &processors)
        else {
            return;
        };
        match mbd.scope() {
            Scope::Singleton => self.singletons.register_disposable_bean(bean_name, adapter),
            Scope::Custom(scope_name) => match self.registered_scope(&scope_name) {
                Some(scope) => scope.register_destruction_callback(bean_name, Box::new(move || adapter.destroy())),
                None => tracing::warn!(
                    "No Scope registered for scope name '{}'; destruction callback of bean '{}' dropped",
                    scope_name,
                    bean_name
                ),
            },
            Scope::Prototype => {}
        }
    }

    /// 循环引用时暴露给其他 bean 的早期引用
    pub(super) fn early_bean_reference(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        bean: BeanObject,
    ) -> ContainerResult<BeanObject> {
        if mbd.synthetic {
            return Ok(bean);
        }
        let mut exposed = bean;
        for processor in self.bean_post_processors() {
            if let Some(smart) = processor.as_smart_instantiation_aware() {
                exposed = smart.get_early_bean_reference(exposed, bean_name)?;
            }
        }
        Ok(exposed)
    }

    /// 依次尝试：实例提供函数、工厂方法、构造器
    fn create_bean_instance(&self, bean_name: &str, mbd: &BeanDefinition, args: Option<&Args>) -> ContainerResult<BeanObject> {
        if let Some(supplier) = &mbd.instance_supplier {
            return supplier().map_err(|e| ContainerError::BeanCreation {
                bean_name: bean_name.to_string(),
                message: "Instantiation of supplied bean failed".to_string(),
                source: Some(Box::new(ContainerError::Other(e))),
            });
        }
        if mbd.has_factory_method() {
            return self.instantiate_using_factory_method(bean_name, mbd, args);
        }

        let class_name = mbd.describe_class();
        let metadata = self
            .metadata_for_class(class_name)
            .ok_or_else(|| ContainerError::CannotLoadBeanClass {
                bean_name: bean_name.to_string(),
                class_name: class_name.to_string(),
            })?;
        if !metadata.is_instantiable() {
            return Err(ContainerError::BeanInstantiation {
                class_name: class_name.to_string(),
                message: "Is it an abstract type or an interface?".to_string(),
                source: None,
            });
        }

        let candidates = self.determine_constructors_from_post_processors(bean_name, &metadata)?;
        if candidates.is_some()
            || mbd.autowire_mode == AutowireMode::Constructor
            || mbd.has_constructor_args()
            || args.is_some_and(|a| !a.is_empty())
        {
            return self.autowire_constructor(bean_name, mbd, &metadata, candidates, args);
        }

        if let Some(default) = metadata.constructors().iter().find(|c| c.params.is_empty()) {
            return default.instantiate(&Args::empty()).map_err(|e| ContainerError::BeanInstantiation {
                class_name: class_name.to_string(),
                message: "Constructor threw exception".to_string(),
                source: Some(e.into()),
            });
        }
        if metadata.constructors().len() == 1 {
            return self.autowire_constructor(bean_name, mbd, &metadata, Some(vec![0]), args);
        }
        Err(ContainerError::BeanInstantiation {
            class_name: class_name.to_string(),
            message: "No default constructor found".to_string(),
            source: None,
        })
    }

    fn determine_constructors_from_post_processors(
        &self,
        bean_name: &str,
        metadata: &TypeMetadata,
    ) -> ContainerResult<Option<Vec<usize>>> {
        for processor in self.bean_post_processors() {
            if let Some(smart) = processor.as_smart_instantiation_aware() {
                if let Some(candidates) = smart.determine_candidate_constructors(metadata, bean_name)? {
                    if !candidates.is_empty() {
                        return Ok(Some(candidates));
                    }
                }
            }
        }
        Ok(None)
    }

    /// 属性注入：自动装配、处理器注入、定义中的属性值
    pub(super) fn populate(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        bean: &BeanObject,
        metadata: Option<&TypeMetadata>,
    ) -> ContainerResult<()> {
        if !mbd.synthetic {
            for processor in self.bean_post_processors() {
                if let Some(aware) = processor.as_instantiation_aware() {
                    if !aware.post_process_after_instantiation(bean, bean_name)? {
                        tracing::trace!("Property population of bean '{}' skipped by {}", bean_name, processor.name());
                        return Ok(());
                    }
                }
            }
        }

        let mut pvs = mbd.property_values.clone();
        if let Some(metadata) = metadata {
            match mbd.autowire_mode {
                AutowireMode::ByName => self.autowire_by_name(bean_name, metadata, &mut pvs),
                AutowireMode::ByType => self.autowire_by_type(bean_name, metadata, &mut pvs)?,
                AutowireMode::No | AutowireMode::Constructor => {}
            }

            if !mbd.synthetic {
                for processor in self.bean_post_processors() {
                    if let Some(aware) = processor.as_instantiation_aware() {
                        match aware.post_process_properties(pvs, bean, metadata, bean_name)? {
                            Some(processed) => pvs = processed,
                            None => return Ok(()),
                        }
                    }
                }
            }
        }

        if pvs.is_empty() {
            return Ok(());
        }
        self.apply_property_values(bean_name, mbd, bean, metadata, pvs)
    }

    fn autowire_by_name(&self, bean_name: &str, metadata: &TypeMetadata, pvs: &mut MutablePropertyValues) {
        for property in metadata.properties() {
            if !property.is_writable() || property.is_simple() || pvs.contains(&property.name) {
                continue;
            }
            if self.contains_bean(&property.name) {
                pvs.add(property.name.clone(), BeanMetadataValue::reference(property.name.clone()));
                tracing::trace!(
                    "Added autowiring by name from bean name '{}' via property '{}' to bean named '{}'",
                    bean_name,
                    property.name,
                    property.name
                );
            } else {
                tracing::trace!(
                    "Not autowiring property '{}' of bean '{}' by name: no matching bean found",
                    property.name,
                    bean_name
                );
            }
        }
    }

    fn autowire_by_type(
        &self,
        bean_name: &str,
        metadata: &TypeMetadata,
        pvs: &mut MutablePropertyValues,
    ) -> ContainerResult<()> {
        for property in metadata.properties() {
            if !property.is_writable() || property.is_simple() || pvs.contains(&property.name) {
                continue;
            }
            let descriptor = DependencyDescriptor::for_property(metadata.name(), property, false);
            let mut autowired = Vec::new();
            let value = self
                .do_resolve_dependency(&descriptor, Some(bean_name), &mut autowired)
                .map_err(|e| ContainerError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: descriptor.to_string(),
                    source: Box::new(e),
                })?;
            if value.is_null() {
                continue;
            }
            pvs.add(property.name.clone(), BeanMetadataValue::Typed(value));
            for autowired_name in autowired {
                self.register_dependent_bean(&autowired_name, bean_name);
                tracing::trace!(
                    "Autowiring by type from bean name '{}' via property '{}' to bean named '{}'",
                    bean_name,
                    property.name,
                    autowired_name
                );
            }
        }
        Ok(())
    }

    fn apply_property_values(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        bean: &BeanObject,
        metadata: Option<&TypeMetadata>,
        pvs: MutablePropertyValues,
    ) -> ContainerResult<()> {
        for pv in pvs {
            let property = metadata
                .and_then(|m| m.property(&pv.name))
                .filter(|p| p.is_writable())
                .ok_or_else(|| ContainerError::NotWritableProperty {
                    property: pv.name.clone(),
                    class_name: metadata.map_or_else(|| mbd.describe_class().to_string(), |m| m.name().to_string()),
                })?;
            let resolved = self
                .resolve_metadata_value(bean_name, mbd, &pv.value)
                .map_err(|e| ContainerError::wrap_creation(
                    bean_name,
                    format!("Cannot resolve value of property '{}'", pv.name),
                    e,
                ))?;
            let converted = if resolved.is_null() {
                resolved
            } else {
                self.convert_value(resolved, &property.ty, Some(&pv.name))?
            };
            property.set(bean, converted).map_err(|e| ContainerError::BeanCreation {
                bean_name: bean_name.to_string(),
                message: format!("Error setting property '{}'", pv.name),
                source: Some(Box::new(ContainerError::Other(e))),
            })?;
        }
        Ok(())
    }

    /// Aware 回调、初始化前处理器、初始化方法、初始化后处理器
    pub(crate) fn initialize(
        &self,
        bean_name: &str,
        bean: BeanObject,
        mbd: Option<&BeanDefinition>,
        metadata: Option<&TypeMetadata>,
    ) -> ContainerResult<BeanObject> {
        if let Some(metadata) = metadata {
            self.invoke_aware_methods(bean_name, &bean, metadata)?;
        }

        let synthetic = mbd.is_some_and(|m| m.synthetic);
        let mut wrapped = bean;
        if !synthetic {
            wrapped = self.apply_bean_post_processors_before_initialization(wrapped, bean_name)?;
        }

        self.invoke_init_methods(bean_name, &wrapped, mbd)
            .map_err(|e| ContainerError::wrap_creation(bean_name, "Invocation of init method failed", e))?;

        if !synthetic {
            wrapped = self.apply_bean_post_processors_after_initialization(wrapped, bean_name)?;
        }
        Ok(wrapped)
    }

    fn invoke_aware_methods(&self, bean_name: &str, bean: &BeanObject, metadata: &TypeMetadata) -> ContainerResult<()> {
        let capabilities = metadata.capabilities();
        if let Some(aware) = capabilities.bean_name_aware.as_ref().and_then(|cast| cast(bean)) {
            aware.set_bean_name(bean_name);
        }
        if let Some(aware) = capabilities.bean_factory_aware.as_ref().and_then(|cast| cast(bean)) {
            let factory = self.self_arc()?;
            aware.set_bean_factory(&factory).map_err(|e| ContainerError::BeanCreation {
                bean_name: bean_name.to_string(),
                message: "Invocation of BeanFactoryAware callback failed".to_string(),
                source: Some(Box::new(ContainerError::Other(e))),
            })?;
        }
        Ok(())
    }

    fn invoke_init_methods(&self, bean_name: &str, bean: &BeanObject, mbd: Option<&BeanDefinition>) -> ContainerResult<()> {
        let metadata = self.types.describe_instance(bean);
        let initializing = metadata
            .as_ref()
            .and_then(|m| m.capabilities().initializing_bean.clone())
            .and_then(|cast| cast(bean));
        if let Some(initializing) = &initializing {
            tracing::trace!("Invoking after_properties_set() on bean with name '{}'", bean_name);
            initializing.after_properties_set().map_err(|e| ContainerError::BeanCreation {
                bean_name: bean_name.to_string(),
                message: "after_properties_set() failed".to_string(),
                source: Some(Box::new(ContainerError::Other(e))),
            })?;
        }

        let Some(mbd) = mbd else {
            return Ok(());
        };
        for method_name in &mbd.init_method_names {
            if initializing.is_some() && method_name == "after_properties_set" {
                continue;
            }
            let method = metadata
                .as_ref()
                .and_then(|m| m.no_arg_method(method_name))
                .ok_or_else(|| ContainerError::BeanDefinitionStore {
                    bean_name: bean_name.to_string(),
                    message: format!(
                        "Could not find an init method named '{}' on bean with name '{}'",
                        method_name, bean_name
                    ),
                })?;
            tracing::trace!("Invoking init method '{}' on bean with name '{}'", method_name, bean_name);
            method.call(Some(bean), &Args::empty()).map_err(|e| ContainerError::BeanCreation {
                bean_name: bean_name.to_string(),
                message: format!("Init method '{}' failed", method_name),
                source: Some(Box::new(ContainerError::Other(e))),
            })?;
        }
        Ok(())
    }
}

impl AutowireCapableBeanFactory for DefaultListableBeanFactory {
    fn create_bean(&self, class_name: &str) -> ContainerResult<BeanObject> {
        let mbd = Arc::new(BeanDefinition::class(class_name).prototype());
        self.create_from_definition(class_name, &mbd, None)
    }

    fn autowire_bean(&self, existing: &BeanObject) -> ContainerResult<()> {
        let metadata = self.types.describe_instance(existing).ok_or_else(|| {
            ContainerError::IllegalArgument("Cannot autowire an instance of an unregistered type".to_string())
        })?;
        let mbd = BeanDefinition::class(metadata.name()).prototype();
        self.populate(metadata.name(), &mbd, existing, Some(&metadata))
    }

    fn configure_bean(&self, existing: BeanObject, bean_name: &str) -> ContainerResult<BeanObject> {
        let mbd = self.get_merged_bean_definition(bean_name)?;
        let metadata = self.types.describe_instance(&existing);
        self.populate(bean_name, &mbd, &existing, metadata.as_deref())?;
        self.initialize(bean_name, existing, Some(&mbd), metadata.as_deref())
    }

    fn initialize_bean(&self, existing: BeanObject, bean_name: &str) -> ContainerResult<BeanObject> {
        let metadata = self.types.describe_instance(&existing);
        self.initialize(bean_name, existing, None, metadata.as_deref())
    }

    fn apply_bean_post_processors_before_initialization(
        &self,
        existing: BeanObject,
        bean_name: &str,
    ) -> ContainerResult<BeanObject> {
        let mut result = existing;
        for processor in self.bean_post_processors() {
            match processor.post_process_before_initialization(result.clone(), bean_name)? {
                Some(current) => result = current,
                None => return Ok(result),
            }
        }
        Ok(result)
    }

    fn apply_bean_post_processors_after_initialization(
        &self,
        existing: BeanObject,
        bean_name: &str,
    ) -> ContainerResult<BeanObject> {
        let mut result = existing;
        for processor in self.bean_post_processors() {
            match processor.post_process_after_initialization(result.clone(), bean_name)? {
                Some(current) => result = current,
                None => return Ok(result),
            }
        }
        Ok(result)
    }

    fn destroy_bean(&self, existing: &BeanObject) {
        let metadata = self.types.describe_instance(existing);
        let name = metadata
            .as_ref()
            .map_or_else(|| "(anonymous)".to_string(), |m| m.name().to_string());
        let processors = self.bean_post_processors();
        if let Some(adapter) =
            DisposableBeanAdapter::new(&name, existing.clone(), metadata.as_deref(), &BeanDefinition::new(), &processors)
        {
            adapter.destroy();
        }
    }

    fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean_name: Option<&str>,
    ) -> ContainerResult<Value> {
        let mut autowired = Vec::new();
        self.do_resolve_dependency(descriptor, requesting_bean_name, &mut autowired)
    }

    fn resolve_named_bean(&self, required_type: &ResolvableType) -> ContainerResult<(String, BeanObject)> {
        match self.resolve_named_bean_inner(required_type)? {
            Some(found) => Ok(found),
            None => Err(ContainerError::NoSuchBeanOfType {
                required_type: required_type.to_string(),
                message: "expected at least 1 bean which qualifies as autowire candidate".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::bean::{AutowireMode, BeanDefinition, BeanDefinitionRegistry};
    use crate::bean_post_processor::BeanPostProcessor;
    use crate::constants::INFER_METHOD;
    use crate::error::{ContainerError, ContainerResult};
    use crate::factory::{
        AutowireCapableBeanFactory, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, DefaultListableBeanFactory,
    };
    use crate::lifecycle::{BeanNameAware, DisposableBean, InitializingBean};
    use crate::types::{MethodMetadata, PropertyMetadata, ResolvableType, TypeMetadata};
    use crate::value::{BeanObject, Value};

    #[derive(Default)]
    struct Engine;

    #[derive(Default)]
    struct Car {
        engine: Mutex<Option<Arc<Engine>>>,
        model: Mutex<String>,
        name: Mutex<String>,
        initialized: AtomicBool,
        started: AtomicUsize,
    }

    impl InitializingBean for Car {
        fn after_properties_set(&self) -> anyhow::Result<()> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    impl BeanNameAware for Car {
        fn set_bean_name(&self, name: &str) {
            *self.name.lock().unwrap() = name.to_string();
        }
    }

    static CLOSED: AtomicUsize = AtomicUsize::new(0);

    struct Pool;

    impl DisposableBean for Pool {
        fn destroy(&self) -> anyhow::Result<()> {
            CLOSED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn factory() -> Arc<DefaultListableBeanFactory> {
        let factory = DefaultListableBeanFactory::new();
        let types = factory.types();
        types.register(TypeMetadata::named::<Engine>("Engine").default_constructor(|| Ok(Engine)).build());
        types.register(
            TypeMetadata::named::<Car>("Car")
                .default_constructor(|| Ok(Car::default()))
                .property(
                    PropertyMetadata::new("engine", ResolvableType::class("Engine")).setter(|car: &Car, value: Value| {
                        *car.engine.lock().unwrap() = Some(value.downcast::<Engine>()?);
                        Ok(())
                    }),
                )
                .property(
                    PropertyMetadata::new("model", ResolvableType::of::<String>()).setter(|car: &Car, value: Value| {
                        *car.model.lock().unwrap() = value.get::<String>()?;
                        Ok(())
                    }),
                )
                .method(MethodMetadata::new("start").action(|car: &Car| {
                    car.started.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
                .initializing_bean()
                .bean_name_aware()
                .build(),
        );
        types.register(
            TypeMetadata::named::<Pool>("Pool")
                .default_constructor(|| Ok(Pool))
                .disposable_bean()
                .build(),
        );
        factory
    }

    #[test]
    fn test_properties_callbacks_and_init_method() {
        let factory = factory();
        factory.register_bean_definition("engine", BeanDefinition::class("Engine")).unwrap();
        factory
            .register_bean_definition(
                "car",
                BeanDefinition::class("Car")
                    .with_property("engine", crate::bean::BeanMetadataValue::reference("engine"))
                    .with_property("model", "roadster")
                    .with_init_method("start"),
            )
            .unwrap();

        let car = factory.get_bean_as::<Car>("car").unwrap();
        assert!(car.engine.lock().unwrap().is_some());
        assert_eq!(*car.model.lock().unwrap(), "roadster");
        assert_eq!(*car.name.lock().unwrap(), "car");
        assert!(car.initialized.load(Ordering::SeqCst));
        assert_eq!(car.started.load(Ordering::SeqCst), 1);
        assert_eq!(factory.dependent_beans("engine"), vec!["car"]);
    }

    #[test]
    fn test_autowire_by_type() {
        let factory = factory();
        factory.register_bean_definition("engine", BeanDefinition::class("Engine")).unwrap();
        factory
            .register_bean_definition("car", BeanDefinition::class("Car").with_autowire(AutowireMode::ByType))
            .unwrap();
        let car = factory.get_bean_as::<Car>("car").unwrap();
        assert!(car.engine.lock().unwrap().is_some());
    }

    #[test]
    fn test_unknown_property_and_missing_init_method_fail() {
        let factory = factory();
        factory
            .register_bean_definition("car", BeanDefinition::class("Car").with_property("wheels", "4"))
            .unwrap();
        let err = factory.get_bean("car").unwrap_err();
        assert!(err
            .causes()
            .any(|e| matches!(e, ContainerError::NotWritableProperty { .. })));

        factory
            .register_bean_definition("other", BeanDefinition::class("Car").with_init_method("missing"))
            .unwrap();
        assert!(factory.get_bean("other").is_err());
    }

    #[test]
    fn test_destroy_singletons_runs_disposable_and_inferred() {
        let factory = factory();
        factory
            .register_bean_definition("pool", BeanDefinition::class("Pool").with_destroy_method(INFER_METHOD))
            .unwrap();
        factory.get_bean("pool").unwrap();
        let before = CLOSED.load(Ordering::SeqCst);
        factory.destroy_singletons();
        assert_eq!(CLOSED.load(Ordering::SeqCst), before + 1);
        assert_eq!(factory.singleton_count(), 0);
    }

    struct Tagging {
        seen: Mutex<Vec<String>>,
    }

    impl BeanPostProcessor for Tagging {
        fn post_process_after_initialization(
            &self,
            bean: BeanObject,
            bean_name: &str,
        ) -> ContainerResult<Option<BeanObject>> {
            self.seen.lock().unwrap().push(bean_name.to_string());
            Ok(Some(bean))
        }
    }

    #[test]
    fn test_post_processors_see_created_beans() {
        let factory = factory();
        let tagging = Arc::new(Tagging { seen: Mutex::new(Vec::new()) });
        factory.add_bean_post_processor(tagging.clone());
        factory.register_bean_definition("engine", BeanDefinition::class("Engine")).unwrap();
        factory.get_bean("engine").unwrap();
        let created = factory.create_bean("Engine").unwrap();
        assert!(created.is::<Engine>());
        assert_eq!(*tagging.seen.lock().unwrap(), vec!["engine", "Engine"]);
    }

    struct Halter {
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl BeanPostProcessor for Halter {
        fn post_process_before_initialization(
            &self,
            _bean: BeanObject,
            _bean_name: &str,
        ) -> ContainerResult<Option<BeanObject>> {
            self.seen.lock().unwrap().push("halter:before");
            Ok(None)
        }

        fn post_process_after_initialization(
            &self,
            _bean: BeanObject,
            _bean_name: &str,
        ) -> ContainerResult<Option<BeanObject>> {
            self.seen.lock().unwrap().push("halter:after");
            Ok(None)
        }
    }

    struct Skipped {
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl BeanPostProcessor for Skipped {
        fn post_process_before_initialization(
            &self,
            bean: BeanObject,
            _bean_name: &str,
        ) -> ContainerResult<Option<BeanObject>> {
            self.seen.lock().unwrap().push("skipped:before");
            Ok(Some(bean))
        }

        fn post_process_after_initialization(
            &self,
            bean: BeanObject,
            _bean_name: &str,
        ) -> ContainerResult<Option<BeanObject>> {
            self.seen.lock().unwrap().push("skipped:after");
            Ok(Some(bean))
        }
    }

    #[test]
    fn test_none_from_post_processor_stops_the_chain() {
        let factory = factory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        factory.add_bean_post_processor(Arc::new(Halter { seen: seen.clone() }));
        factory.add_bean_post_processor(Arc::new(Skipped { seen: seen.clone() }));
        factory.register_bean_definition("engine", BeanDefinition::class("Engine")).unwrap();

        // 中断后保留上一步的结果
        let engine = factory.get_bean("engine").unwrap();
        assert!(engine.is::<Engine>());
        assert_eq!(*seen.lock().unwrap(), vec!["halter:before", "halter:after"]);
    }

    #[test]
    fn test_unregistered_class_cannot_be_loaded() {
        let factory = factory();
        factory.register_bean_definition("ghost", BeanDefinition::class("Ghost")).unwrap();
        assert!(matches!(
            factory.get_bean("ghost"),
            Err(ContainerError::CannotLoadBeanClass { .. })
        ));
    }
}
