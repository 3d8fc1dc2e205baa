use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::annotation::AnnotationIntrospector;
use crate::bean::{AliasRegistry, BeanDefinition, BeanDefinitionRegistry, SimpleAliasRegistry};
use crate::bean_post_processor::BeanPostProcessor;
use crate::constants::FACTORY_BEAN_PREFIX;
use crate::convert::{
    ConversionService, DefaultConversionService, PropertyEditor, PropertyEditorRegistrar,
    PropertyEditorRegistry, SimpleTypeConverter,
};
use crate::error::{ContainerError, ContainerResult};
use crate::scope::{BeanScope, Scope};
use crate::types::{ResolvableType, TypeIntrospector, TypeRegistry};
use crate::utils::dependency::ThreadCreationTracker;
use crate::value::{Args, BeanObject};

use super::singleton::DefaultSingletonBeanRegistry;
use super::{
    AutowireCapableBeanFactory, BeanFactory, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DependencyDescriptor, DependencySupplier, HierarchicalBeanFactory, ObjectProvider, StringValueResolver,
};

const MAX_PARENT_DEPTH: usize = 64;

/// 名称是否以 `&` 开头（请求 FactoryBean 本身）
pub fn is_factory_dereference(name: &str) -> bool {
    name.starts_with(FACTORY_BEAN_PREFIX)
}

/// 去掉全部 `&` 前缀
pub(crate) fn strip_factory_prefix(name: &str) -> &str {
    name.trim_start_matches(FACTORY_BEAN_PREFIX)
}

/// 两个对象是否为同一实例
pub(crate) fn same_object(a: &BeanObject, b: &BeanObject) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// DefaultListableBeanFactory - 默认的 Bean 工厂实现
///
/// 管理 bean 定义的注册、合并与 bean 的创建、依赖解析、生命周期和销毁。
/// 工厂总是以 `Arc` 持有，内部通过弱引用访问自身，以便在回调中传递。
pub struct DefaultListableBeanFactory {
    pub(super) self_ref: Weak<DefaultListableBeanFactory>,
    pub(super) parent: RwLock<Option<Arc<DefaultListableBeanFactory>>>,
    pub(super) types: Arc<TypeRegistry>,
    pub(super) introspector: AnnotationIntrospector,
    pub(super) aliases: SimpleAliasRegistry,
    pub(super) definitions: RwLock<HashMap<String, BeanDefinition>>,
    pub(super) definition_names: RwLock<Vec<String>>,
    pub(super) manual_singleton_names: RwLock<Vec<String>>,
    pub(super) merged_definitions: RwLock<HashMap<String, Arc<BeanDefinition>>>,
    pub(super) singletons: DefaultSingletonBeanRegistry,
    pub(super) factory_bean_objects: RwLock<HashMap<String, BeanObject>>,
    pub(super) post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,
    pub(super) scopes: RwLock<HashMap<String, Arc<dyn BeanScope>>>,
    pub(super) resolvable_dependencies: RwLock<Vec<(ResolvableType, DependencySupplier)>>,
    pub(super) conversion_service: RwLock<Option<Arc<dyn ConversionService>>>,
    pub(super) default_conversion: Arc<DefaultConversionService>,
    pub(super) editor_registrars: RwLock<Vec<Arc<dyn PropertyEditorRegistrar>>>,
    pub(super) custom_editors: PropertyEditorRegistry,
    pub(super) value_resolvers: RwLock<Vec<StringValueResolver>>,
    pub(super) prototypes_in_creation: ThreadCreationTracker,
    pub(super) allow_definition_overriding: AtomicBool,
    pub(super) allow_circular_references: AtomicBool,
    pub(super) configuration_frozen: AtomicBool,
    pub(super) inner_bean_counter: AtomicUsize,
}

/// 原型或自定义作用域 bean 的创建标记
struct PrototypeCreation<'a> {
    tracker: &'a ThreadCreationTracker,
    name: &'a str,
}

impl<'a> PrototypeCreation<'a> {
    fn start(tracker: &'a ThreadCreationTracker, name: &'a str) -> ContainerResult<Self> {
        if !tracker.start_creating(name) {
            return Err(ContainerError::currently_in_creation(name));
        }
        Ok(Self { tracker, name })
    }
}

impl Drop for PrototypeCreation<'_> {
    fn drop(&mut self) {
        self.tracker.finish_creating(self.name);
    }
}

impl DefaultListableBeanFactory {
    /// 使用包含标准注解与事件类型的注册表
    pub fn new() -> Arc<Self> {
        Self::with_types(Arc::new(TypeRegistry::new()))
    }

    pub fn with_types(types: Arc<TypeRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            parent: RwLock::new(None),
            introspector: AnnotationIntrospector::new(types.clone() as Arc<dyn TypeIntrospector>),
            types,
            aliases: SimpleAliasRegistry::new(),
            definitions: RwLock::new(HashMap::new()),
            definition_names: RwLock::new(Vec::new()),
            manual_singleton_names: RwLock::new(Vec::new()),
            merged_definitions: RwLock::new(HashMap::new()),
            singletons: DefaultSingletonBeanRegistry::new(),
            factory_bean_objects: RwLock::new(HashMap::new()),
            post_processors: RwLock::new(Vec::new()),
            scopes: RwLock::new(HashMap::new()),
            resolvable_dependencies: RwLock::new(Vec::new()),
            conversion_service: RwLock::new(None),
            default_conversion: Arc::new(DefaultConversionService::new()),
            editor_registrars: RwLock::new(Vec::new()),
            custom_editors: PropertyEditorRegistry::new(),
            value_resolvers: RwLock::new(Vec::new()),
            prototypes_in_creation: ThreadCreationTracker::new(),
            allow_definition_overriding: AtomicBool::new(true),
            allow_circular_references: AtomicBool::new(true),
            configuration_frozen: AtomicBool::new(false),
            inner_bean_counter: AtomicUsize::new(0),
        })
    }

    /// 子工厂与父工厂共享类型注册表
    pub fn with_parent(parent: Arc<DefaultListableBeanFactory>) -> Arc<Self> {
        let factory = Self::with_types(parent.types.clone());
        *factory.parent.write() = Some(parent);
        factory
    }

    pub(crate) fn self_arc(&self) -> ContainerResult<Arc<Self>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| ContainerError::IllegalState("Bean factory has already been dropped".to_string()))
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// 别名解析为规范名称，并去掉 `&` 前缀
    pub fn transformed_bean_name(&self, name: &str) -> String {
        self.aliases.canonical_name(strip_factory_prefix(name))
    }

    /// 规范名称，保留 `&` 前缀
    pub(super) fn original_bean_name(&self, name: &str) -> String {
        let canonical = self.transformed_bean_name(name);
        if is_factory_dereference(name) {
            format!("{}{}", FACTORY_BEAN_PREFIX, canonical)
        } else {
            canonical
        }
    }

    pub(super) fn has_local_definition(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    fn check_not_frozen(&self, name: &str) -> ContainerResult<()> {
        if self.configuration_frozen.load(Ordering::SeqCst) {
            return Err(ContainerError::BeanDefinitionStore {
                bean_name: name.to_string(),
                message: "Cannot modify bean definitions after the configuration has been frozen".to_string(),
            });
        }
        Ok(())
    }

    /// 合并后的定义，带缓存
    pub(crate) fn merged_definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>> {
        if let Some(merged) = self.merged_definitions.read().get(name) {
            return Ok(merged.clone());
        }
        let definition = self.definitions.read().get(name).cloned();
        let Some(definition) = definition else {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.merged_definition(name);
            }
            return Err(ContainerError::NoSuchBeanDefinition { name: name.to_string() });
        };
        let merged = Arc::new(self.merge(name, &definition, 0)?);
        self.merged_definitions
            .write()
            .entry(name.to_string())
            .or_insert_with(|| merged.clone());
        Ok(merged)
    }

    /// 与父定义链合并
    pub(super) fn merge(&self, name: &str, definition: &BeanDefinition, depth: usize) -> ContainerResult<BeanDefinition> {
        let Some(parent_name) = &definition.parent_name else {
            return Ok(definition.clone());
        };
        if depth > MAX_PARENT_DEPTH {
            return Err(ContainerError::BeanDefinitionStore {
                bean_name: name.to_string(),
                message: format!("Parent definition chain starting at '{}' is circular", parent_name),
            });
        }
        let parent_name = self.transformed_bean_name(parent_name);
        let unresolved = |message: String| ContainerError::BeanDefinitionStore {
            bean_name: name.to_string(),
            message,
        };
        let mut merged = if parent_name != name {
            let local = self.definitions.read().get(&parent_name).cloned();
            match (local, self.parent_bean_factory()) {
                (Some(parent), _) => self.merge(&parent_name, &parent, depth + 1)?,
                (None, Some(factory)) => (*factory.merged_definition(&parent_name)?).clone(),
                (None, None) => {
                    return Err(unresolved(format!(
                        "Could not resolve parent bean definition '{}'",
                        parent_name
                    )))
                }
            }
        } else {
            match self.parent_bean_factory() {
                Some(factory) => (*factory.merged_definition(&parent_name)?).clone(),
                None => {
                    return Err(unresolved(format!(
                        "Parent name '{}' is equal to bean name '{}': cannot be resolved without a parent bean factory",
                        parent_name, name
                    )))
                }
            }
        };
        merged.override_from(definition);
        Ok(merged)
    }

    /// 丢弃合并缓存与已创建的实例，子定义一并处理
    pub(super) fn reset_bean_definition(&self, name: &str) {
        let mut visited = HashSet::new();
        self.reset_bean_definition_inner(name, &mut visited);
    }

    fn reset_bean_definition_inner(&self, name: &str, visited: &mut HashSet<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        self.merged_definitions.write().remove(name);
        self.destroy_singleton(name);
        let children: Vec<String> = self
            .definitions
            .read()
            .iter()
            .filter(|(child, def)| child.as_str() != name && def.parent_name.as_deref() == Some(name))
            .map(|(child, _)| child.clone())
            .collect();
        for child in children {
            self.reset_bean_definition_inner(&child, visited);
        }
    }

    pub fn destroy_singleton(&self, name: &str) {
        self.singletons.destroy_singleton(name);
        self.factory_bean_objects.write().remove(name);
        self.manual_singleton_names.write().retain(|n| n != name);
    }

    /// 获取 bean 的完整流程
    pub(crate) fn do_get_bean(
        &self,
        name: &str,
        required: Option<&ResolvableType>,
        args: Option<&Args>,
    ) -> ContainerResult<BeanObject> {
        let bean_name = self.transformed_bean_name(name);
        tracing::trace!("Requesting bean: '{}'", bean_name);

        if args.is_none() {
            if let Some(shared) = self.singletons.get_singleton_early(&bean_name, true)? {
                if self.singletons.is_currently_in_creation(&bean_name) {
                    tracing::trace!(
                        "Returning eagerly cached instance of singleton bean '{}' that is not fully initialized yet - a consequence of a circular reference",
                        bean_name
                    );
                } else {
                    tracing::trace!("Returning cached instance of singleton bean '{}'", bean_name);
                }
                let merged = self.merged_definitions.read().get(&bean_name).cloned();
                let bean = self.object_for_bean_instance(shared, name, &bean_name, merged.as_deref())?;
                return self.check_required_type(bean, &bean_name, required);
            }
        }

        if self.prototypes_in_creation.is_creating(&bean_name) {
            return Err(ContainerError::currently_in_creation(&bean_name));
        }

        if !self.has_local_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.do_get_bean(&self.original_bean_name(name), required, args);
            }
        }

        let mbd = self.merged_definition(&bean_name)?;
        if mbd.is_abstract {
            return Err(ContainerError::BeanIsAbstract { bean_name });
        }

        for dependency in &mbd.depends_on {
            let dependency = self.transformed_bean_name(dependency);
            if self.singletons.is_dependent(&bean_name, &dependency) {
                return Err(ContainerError::bean_creation(
                    &bean_name,
                    format!(
                        "Circular depends-on relationship between '{}' and '{}'",
                        bean_name, dependency
                    ),
                ));
            }
            self.singletons.register_dependent_bean(&dependency, &bean_name);
            self.get_bean(&dependency).map_err(|e| {
                ContainerError::wrap_creation(
                    &bean_name,
                    format!("'{}' depends on missing bean '{}'", bean_name, dependency),
                    e,
                )
            })?;
        }

        let instance = match mbd.scope() {
            Scope::Singleton => {
                let shared = self.singletons.get_or_create(&bean_name, || {
                    self.create_from_definition(&bean_name, &mbd, args).inspect_err(|_| {
                        // 循环引用时可能已经提前暴露，创建失败后全部清除
                        self.destroy_singleton(&bean_name);
                    })
                })?;
                self.object_for_bean_instance(shared, name, &bean_name, Some(&mbd))?
            }
            Scope::Prototype => {
                tracing::debug!("Creating new instance of prototype bean '{}'", bean_name);
                let prototype = {
                    let _creation = PrototypeCreation::start(&self.prototypes_in_creation, &bean_name)?;
                    self.create_from_definition(&bean_name, &mbd, args)?
                };
                self.object_for_bean_instance(prototype, name, &bean_name, Some(&mbd))?
            }
            Scope::Custom(scope_name) => {
                let scope = self.scopes.read().get(&scope_name).cloned().ok_or_else(|| {
                    ContainerError::IllegalState(format!("No Scope registered for scope name '{}'", scope_name))
                })?;
                let scoped = scope.get(&bean_name, &mut || {
                    let _creation = PrototypeCreation::start(&self.prototypes_in_creation, &bean_name)?;
                    self.create_from_definition(&bean_name, &mbd, args)
                })?;
                self.object_for_bean_instance(scoped, name, &bean_name, Some(&mbd))?
            }
        };
        self.check_required_type(instance, &bean_name, required)
    }

    fn check_required_type(
        &self,
        bean: BeanObject,
        bean_name: &str,
        required: Option<&ResolvableType>,
    ) -> ContainerResult<BeanObject> {
        let Some(required) = required else {
            return Ok(bean);
        };
        let actual = self
            .types
            .describe_instance(&bean)
            .map(|m| m.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        self.adapt_bean(bean, required)
            .ok_or_else(|| ContainerError::BeanNotOfRequiredType {
                bean_name: bean_name.to_string(),
                required_type: required.to_string(),
                actual_type: actual,
            })
    }

    /// 实例可赋给 `required` 时返回它，接口类型返回以接口装箱的对象
    pub(crate) fn adapt_bean(&self, bean: BeanObject, required: &ResolvableType) -> Option<BeanObject> {
        if matches!(required, ResolvableType::Unresolved | ResolvableType::Variable(_)) {
            return Some(bean);
        }
        if required.type_id().is_some_and(|id| id == (*bean).type_id()) {
            return Some(bean);
        }
        let metadata = self.types.describe_instance(&bean)?;
        if !required.is_assignable_from(&metadata.as_type(), self.types.as_ref()) {
            return None;
        }
        let raw = required.raw_name()?;
        if metadata.name() == raw {
            return Some(bean);
        }
        match metadata.capabilities().cast(raw, &bean) {
            Some(adapted) => Some(adapted),
            None => Some(bean),
        }
    }

    /// 实例是否可以赋给 `required`，不做适配
    pub(crate) fn instance_assignable(&self, bean: &BeanObject, required: &ResolvableType) -> bool {
        if matches!(required, ResolvableType::Unresolved | ResolvableType::Variable(_)) {
            return true;
        }
        if required.type_id().is_some_and(|id| id == (**bean).type_id()) {
            return true;
        }
        self.types
            .describe_instance(bean)
            .is_some_and(|m| required.is_assignable_from(&m.as_type(), self.types.as_ref()))
    }

    /// 实例是 FactoryBean 且请求的不是工厂本身时返回其产物
    pub(super) fn object_for_bean_instance(
        &self,
        instance: BeanObject,
        name: &str,
        bean_name: &str,
        mbd: Option<&BeanDefinition>,
    ) -> ContainerResult<BeanObject> {
        let factory = self
            .types
            .describe_instance(&instance)
            .and_then(|m| m.capabilities().factory_bean.clone())
            .and_then(|cast| cast(&instance));
        if is_factory_dereference(name) {
            if factory.is_none() {
                return Err(ContainerError::BeanIsNotAFactory {
                    bean_name: bean_name.to_string(),
                });
            }
            return Ok(instance);
        }
        let Some(factory) = factory else {
            return Ok(instance);
        };
        let should_post_process = mbd.map_or(true, |m| !m.synthetic);
        self.object_from_factory_bean(factory.as_ref(), bean_name, should_post_process)
    }

    fn object_from_factory_bean(
        &self,
        factory: &dyn crate::bean::FactoryBean,
        bean_name: &str,
        should_post_process: bool,
    ) -> ContainerResult<BeanObject> {
        if factory.is_singleton() && self.singletons.contains_singleton(bean_name) {
            if let Some(cached) = self.factory_bean_objects.read().get(bean_name) {
                return Ok(cached.clone());
            }
            let mut object = self.do_get_object_from_factory_bean(factory, bean_name)?;
            if let Some(existing) = self.factory_bean_objects.read().get(bean_name) {
                return Ok(existing.clone());
            }
            if should_post_process {
                if self.singletons.is_currently_in_creation(bean_name) {
                    return Ok(object);
                }
                object = self
                    .apply_bean_post_processors_after_initialization(object, bean_name)
                    .map_err(|e| {
                        ContainerError::wrap_creation(
                            bean_name,
                            "Post-processing of FactoryBean's singleton object failed",
                            e,
                        )
                    })?;
            }
            if self.singletons.contains_singleton(bean_name) {
                let mut cache = self.factory_bean_objects.write();
                return Ok(cache.entry(bean_name.to_string()).or_insert(object).clone());
            }
            return Ok(object);
        }
        let object = self.do_get_object_from_factory_bean(factory, bean_name)?;
        if should_post_process {
            return self
                .apply_bean_post_processors_after_initialization(object, bean_name)
                .map_err(|e| {
                    ContainerError::wrap_creation(bean_name, "Post-processing of FactoryBean's object failed", e)
                });
        }
        Ok(object)
    }

    fn do_get_object_from_factory_bean(
        &self,
        factory: &dyn crate::bean::FactoryBean,
        bean_name: &str,
    ) -> ContainerResult<BeanObject> {
        factory.get_object().map_err(|e| ContainerError::BeanCreation {
            bean_name: bean_name.to_string(),
            message: "FactoryBean threw exception on object creation".to_string(),
            source: Some(Box::new(ContainerError::Other(e))),
        })
    }

    /// 单例缓存中的 FactoryBean 对象本身
    pub(super) fn factory_bean_instance(&self, bean_name: &str) -> ContainerResult<Option<Arc<dyn crate::bean::FactoryBean>>> {
        let instance = self.do_get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, bean_name), None, None)?;
        Ok(self
            .types
            .describe_instance(&instance)
            .and_then(|m| m.capabilities().factory_bean.clone())
            .and_then(|cast| cast(&instance)))
    }

    /// 创建时使用的类型转换器：自定义编辑器、转换服务与内置转换
    pub(super) fn type_converter(&self) -> SimpleTypeConverter {
        let converter = SimpleTypeConverter::new(self.default_conversion.clone())
            .with_conversion_service(self.conversion_service.read().clone());
        self.custom_editors.copy_to(converter.editors());
        for registrar in self.editor_registrars.read().iter() {
            registrar.register_custom_editors(converter.editors());
        }
        converter
    }

    pub(super) fn register_manual_singleton_name(&self, name: &str) {
        if self.has_local_definition(name) {
            return;
        }
        let mut names = self.manual_singleton_names.write();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    pub(super) fn next_inner_bean_id(&self) -> usize {
        self.inner_bean_counter.fetch_add(1, Ordering::SeqCst)
    }
}

impl fmt::Display for DefaultListableBeanFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DefaultListableBeanFactory: defining beans [{}]",
            self.definition_names.read().join(",")
        )?;
        match self.parent.read().as_ref() {
            Some(parent) => write!(f, "; parent: {}", parent),
            None => write!(f, "; root of factory hierarchy"),
        }
    }
}

impl fmt::Debug for DefaultListableBeanFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultListableBeanFactory")
            .field("definitions", &self.definition_names.read().len())
            .field("singletons", &self.singletons.singleton_count())
            .field("frozen", &self.configuration_frozen.load(Ordering::SeqCst))
            .finish()
    }
}

impl AliasRegistry for DefaultListableBeanFactory {
    fn register_alias(&self, name: &str, alias: &str) -> ContainerResult<()> {
        self.aliases.register_alias(name, alias)
    }

    fn remove_alias(&self, alias: &str) -> ContainerResult<()> {
        self.aliases.remove_alias(alias)
    }

    fn is_alias(&self, name: &str) -> bool {
        self.aliases.is_alias(name)
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        self.aliases.aliases(name)
    }
}

impl BeanDefinitionRegistry for DefaultListableBeanFactory {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> ContainerResult<()> {
        if name.is_empty() {
            return Err(ContainerError::BeanDefinitionStore {
                bean_name: String::new(),
                message: "Bean name must not be empty".to_string(),
            });
        }
        if definition.bean_class_name.is_none()
            && definition.parent_name.is_none()
            && definition.factory_bean_name.is_none()
            && definition.instance_supplier.is_none()
        {
            return Err(ContainerError::BeanDefinitionStore {
                bean_name: name.to_string(),
                message: "Bean definition specifies neither a class, a parent, a factory bean nor an instance supplier"
                    .to_string(),
            });
        }
        self.check_not_frozen(name)?;

        let replaced = {
            let mut definitions = self.definitions.write();
            if let Some(existing) = definitions.get(name) {
                if !self.allow_definition_overriding.load(Ordering::SeqCst) {
                    return Err(ContainerError::BeanDefinitionOverride {
                        bean_name: name.to_string(),
                        message: format!(
                            "Cannot register bean definition [{}] for bean '{}' since there is already [{}] bound",
                            definition.describe_class(),
                            name,
                            existing.describe_class()
                        ),
                    });
                }
                tracing::info!(
                    "Overriding bean definition for bean '{}': replacing [{}] with [{}]",
                    name,
                    existing.describe_class(),
                    definition.describe_class()
                );
                definitions.insert(name.to_string(), definition);
                true
            } else {
                if self.aliases.is_alias(name) {
                    if !self.allow_definition_overriding.load(Ordering::SeqCst) {
                        return Err(ContainerError::BeanDefinitionOverride {
                            bean_name: name.to_string(),
                            message: format!(
                                "Cannot register bean definition for bean '{}' since there is already an alias with that name",
                                name
                            ),
                        });
                    }
                    self.aliases.remove_alias(name)?;
                }
                definitions.insert(name.to_string(), definition);
                self.definition_names.write().push(name.to_string());
                self.manual_singleton_names.write().retain(|n| n != name);
                false
            }
        };

        if replaced || self.singletons.contains_singleton(name) {
            self.reset_bean_definition(name);
        } else {
            self.merged_definitions.write().remove(name);
        }
        tracing::debug!("Bean definition registered successfully: '{}'", name);
        Ok(())
    }

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()> {
        self.check_not_frozen(name)?;
        if self.definitions.write().remove(name).is_none() {
            return Err(ContainerError::NoSuchBeanDefinition { name: name.to_string() });
        }
        self.definition_names.write().retain(|n| n != name);
        self.reset_bean_definition(name);
        tracing::debug!("Removed bean definition '{}'", name);
        Ok(())
    }

    fn get_bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition> {
        self.definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::NoSuchBeanDefinition { name: name.to_string() })
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.has_local_definition(name)
    }

    fn bean_definition_names(&self) -> Vec<String> {
        self.definition_names.read().clone()
    }

    fn bean_definition_count(&self) -> usize {
        self.definition_names.read().len()
    }

    fn modify_bean_definition(
        &self,
        name: &str,
        modifier: &mut dyn FnMut(&mut BeanDefinition),
    ) -> ContainerResult<()> {
        self.check_not_frozen(name)?;
        let mut definition = self.get_bean_definition(name)?;
        modifier(&mut definition);
        self.definitions.write().insert(name.to_string(), definition);
        let mut visited = HashSet::new();
        self.clear_merged_recursively(name, &mut visited);
        Ok(())
    }
}

impl DefaultListableBeanFactory {
    fn clear_merged_recursively(&self, name: &str, visited: &mut HashSet<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        self.merged_definitions.write().remove(name);
        let children: Vec<String> = self
            .definitions
            .read()
            .iter()
            .filter(|(_, def)| def.parent_name.as_deref() == Some(name))
            .map(|(child, _)| child.clone())
            .collect();
        for child in children {
            self.clear_merged_recursively(&child, visited);
        }
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> ContainerResult<BeanObject> {
        self.do_get_bean(name, None, None)
    }

    fn get_bean_with_args(&self, name: &str, args: Args) -> ContainerResult<BeanObject> {
        self.do_get_bean(name, None, Some(&args))
    }

    fn get_typed_bean(&self, name: &str, required_type: &ResolvableType) -> ContainerResult<BeanObject> {
        self.do_get_bean(name, Some(required_type), None)
    }

    fn get_bean_of_type(&self, required_type: &ResolvableType) -> ContainerResult<BeanObject> {
        self.resolve_named_bean(required_type).map(|(_, bean)| bean)
    }

    fn get_bean_provider(&self, required_type: &ResolvableType) -> ObjectProvider {
        ObjectProvider::new(
            self.self_ref.clone(),
            DependencyDescriptor::new(required_type.clone(), false),
            None,
        )
    }

    fn contains_bean(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        if self.singletons.contains_singleton(&bean_name) || self.has_local_definition(&bean_name) {
            return !is_factory_dereference(name) || self.is_factory_bean(&bean_name).unwrap_or(false);
        }
        self.parent_bean_factory()
            .is_some_and(|parent| parent.contains_bean(&self.original_bean_name(name)))
    }

    fn is_singleton(&self, name: &str) -> ContainerResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);
        if let Some(instance) = self.singletons.get_singleton_early(&bean_name, false)? {
            let factory = self
                .types
                .describe_instance(&instance)
                .and_then(|m| m.capabilities().factory_bean.clone())
                .and_then(|cast| cast(&instance));
            return Ok(match factory {
                Some(factory) => dereference || factory.is_singleton(),
                None => !dereference,
            });
        }
        if !self.has_local_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.is_singleton(&self.original_bean_name(name));
            }
        }
        let mbd = self.merged_definition(&bean_name)?;
        if !mbd.is_singleton() {
            return Ok(false);
        }
        if self.is_factory_bean(&bean_name)? {
            if dereference {
                return Ok(true);
            }
            return Ok(self
                .factory_bean_instance(&bean_name)?
                .is_some_and(|factory| factory.is_singleton()));
        }
        Ok(!dereference)
    }

    fn is_prototype(&self, name: &str) -> ContainerResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        if !self.has_local_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.is_prototype(&self.original_bean_name(name));
            }
        }
        let mbd = self.merged_definition(&bean_name)?;
        if mbd.is_prototype() {
            return Ok(!is_factory_dereference(name) || self.is_factory_bean(&bean_name)?);
        }
        if is_factory_dereference(name) || !self.is_factory_bean(&bean_name)? {
            return Ok(false);
        }
        Ok(self
            .factory_bean_instance(&bean_name)?
            .is_some_and(|factory| !factory.is_singleton()))
    }

    fn is_type_match(&self, name: &str, type_to_match: &ResolvableType) -> ContainerResult<bool> {
        self.is_type_match_inner(name, type_to_match, true)
    }

    fn get_type(&self, name: &str) -> ContainerResult<Option<ResolvableType>> {
        self.get_type_inner(name, true)
    }

    fn get_aliases(&self, name: &str) -> Vec<String> {
        let bean_name = self.transformed_bean_name(name);
        let prefix = if is_factory_dereference(name) { FACTORY_BEAN_PREFIX } else { "" };
        let requested = strip_factory_prefix(name);
        let mut result = Vec::new();
        if requested != bean_name {
            result.push(format!("{}{}", prefix, bean_name));
        }
        for alias in self.aliases.aliases(&bean_name) {
            if alias != requested {
                result.push(format!("{}{}", prefix, alias));
            }
        }
        if !self.singletons.contains_singleton(&bean_name) && !self.has_local_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                result.extend(parent.get_aliases(&self.original_bean_name(name)));
            }
        }
        result
    }
}

impl HierarchicalBeanFactory for DefaultListableBeanFactory {
    fn parent_bean_factory(&self) -> Option<Arc<DefaultListableBeanFactory>> {
        self.parent.read().clone()
    }

    fn contains_local_bean(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        (self.singletons.contains_singleton(&bean_name) || self.has_local_definition(&bean_name))
            && (!is_factory_dereference(name) || self.is_factory_bean(&bean_name).unwrap_or(false))
    }
}

impl ConfigurableBeanFactory for DefaultListableBeanFactory {
    fn set_parent_bean_factory(&self, parent: Arc<DefaultListableBeanFactory>) -> ContainerResult<()> {
        let mut current = self.parent.write();
        if let Some(existing) = current.as_ref() {
            if !Arc::ptr_eq(existing, &parent) {
                return Err(ContainerError::IllegalState(
                    "Already associated with parent BeanFactory".to_string(),
                ));
            }
        }
        *current = Some(parent);
        Ok(())
    }

    fn type_registry(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    fn annotation_introspector(&self) -> &AnnotationIntrospector {
        &self.introspector
    }

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        let mut processors = self.post_processors.write();
        processors.retain(|p| !Arc::ptr_eq(p, &processor));
        tracing::debug!("Registered BeanPostProcessor: {}", processor.name());
        processors.push(processor);
    }

    fn bean_post_processor_count(&self) -> usize {
        self.post_processors.read().len()
    }

    fn bean_post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.post_processors.read().clone()
    }

    fn register_scope(&self, name: &str, scope: Arc<dyn BeanScope>) -> ContainerResult<()> {
        if name == Scope::Singleton.name() || name == Scope::Prototype.name() {
            return Err(ContainerError::IllegalArgument(
                "Cannot replace existing scopes 'singleton' and 'prototype'".to_string(),
            ));
        }
        if self.scopes.write().insert(name.to_string(), scope).is_some() {
            tracing::debug!("Replacing scope '{}'", name);
        } else {
            tracing::debug!("Registered scope '{}'", name);
        }
        Ok(())
    }

    fn registered_scope_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn registered_scope(&self, name: &str) -> Option<Arc<dyn BeanScope>> {
        self.scopes.read().get(name).cloned()
    }

    fn set_conversion_service(&self, service: Arc<dyn ConversionService>) {
        *self.conversion_service.write() = Some(service);
    }

    fn conversion_service(&self) -> Option<Arc<dyn ConversionService>> {
        self.conversion_service.read().clone()
    }

    fn add_property_editor_registrar(&self, registrar: Arc<dyn PropertyEditorRegistrar>) {
        self.editor_registrars.write().push(registrar);
    }

    fn register_custom_editor(&self, ty: &ResolvableType, editor: Arc<dyn PropertyEditor>) {
        self.custom_editors.register_custom_editor(ty, editor);
    }

    fn add_embedded_value_resolver(&self, resolver: StringValueResolver) {
        self.value_resolvers.write().push(resolver);
    }

    fn has_embedded_value_resolver(&self) -> bool {
        !self.value_resolvers.read().is_empty()
    }

    fn resolve_embedded_value(&self, value: &str) -> ContainerResult<String> {
        let resolvers = self.value_resolvers.read().clone();
        let mut result = value.to_string();
        for resolver in resolvers {
            result = resolver(&result)?;
        }
        Ok(result)
    }

    fn register_singleton(&self, name: &str, object: BeanObject) -> ContainerResult<()> {
        self.singletons.register_singleton(name, object)?;
        self.register_manual_singleton_name(name);
        tracing::debug!("Registered singleton '{}'", name);
        Ok(())
    }

    fn get_singleton(&self, name: &str) -> Option<BeanObject> {
        self.singletons.get_singleton(&self.transformed_bean_name(name))
    }

    fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.contains_singleton(name)
    }

    fn singleton_names(&self) -> Vec<String> {
        self.singletons.singleton_names()
    }

    fn singleton_count(&self) -> usize {
        self.singletons.singleton_count()
    }

    fn register_dependent_bean(&self, name: &str, dependent: &str) {
        let canonical = self.transformed_bean_name(name);
        self.singletons.register_dependent_bean(&canonical, dependent);
    }

    fn dependent_beans(&self, name: &str) -> Vec<String> {
        self.singletons.dependent_beans(name)
    }

    fn dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.singletons.dependencies_for_bean(name)
    }

    fn is_currently_in_creation(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        self.singletons.is_currently_in_creation(&bean_name)
            || self.prototypes_in_creation.is_creating(&bean_name)
    }

    fn get_merged_bean_definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>> {
        self.merged_definition(&self.transformed_bean_name(name))
    }

    fn is_factory_bean(&self, name: &str) -> ContainerResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        if let Some(instance) = self.singletons.get_singleton_early(&bean_name, false)? {
            return Ok(self
                .types
                .describe_instance(&instance)
                .is_some_and(|m| m.capabilities().factory_bean.is_some()));
        }
        if !self.has_local_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.is_factory_bean(&bean_name);
            }
        }
        let mbd = self.merged_definition(&bean_name)?;
        Ok(self
            .predict_bean_type(&bean_name, &mbd)
            .is_some_and(|ty| self.is_factory_bean_type(&ty)))
    }

    fn set_allow_bean_definition_overriding(&self, allow: bool) {
        self.allow_definition_overriding.store(allow, Ordering::SeqCst);
        self.aliases.set_allow_alias_overriding(allow);
    }

    fn is_allow_bean_definition_overriding(&self) -> bool {
        self.allow_definition_overriding.load(Ordering::SeqCst)
    }

    fn set_allow_circular_references(&self, allow: bool) {
        self.allow_circular_references.store(allow, Ordering::SeqCst);
    }

    fn is_allow_circular_references(&self) -> bool {
        self.allow_circular_references.load(Ordering::SeqCst)
    }

    fn destroy_scoped_bean(&self, name: &str) {
        let Ok(mbd) = self.merged_definition(name) else {
            return;
        };
        let Scope::Custom(scope_name) = mbd.scope() else {
            tracing::warn!("Bean '{}' is not in a custom scope; nothing to destroy", name);
            return;
        };
        let Some(scope) = self.registered_scope(&scope_name) else {
            return;
        };
        if let Some(instance) = scope.remove(name) {
            self.destroy_bean(&instance);
        }
    }

    fn destroy_singletons(&self) {
        tracing::debug!("Destroying singletons in {}", self);
        self.singletons.destroy_singletons();
        self.factory_bean_objects.write().clear();
        self.manual_singleton_names.write().clear();
    }
}

impl ConfigurableListableBeanFactory for DefaultListableBeanFactory {
    fn register_resolvable_dependency(&self, ty: ResolvableType, value: BeanObject) {
        self.register_resolvable_supplier(ty, Arc::new(move || Some(value.clone())));
    }

    fn register_resolvable_supplier(&self, ty: ResolvableType, supplier: DependencySupplier) {
        let mut dependencies = self.resolvable_dependencies.write();
        dependencies.retain(|(existing, _)| existing.to_string() != ty.to_string());
        dependencies.push((ty, supplier));
    }

    fn is_autowire_candidate(&self, name: &str, descriptor: &DependencyDescriptor) -> ContainerResult<bool> {
        self.is_autowire_candidate_inner(name, descriptor)
    }

    fn freeze_configuration(&self) {
        self.configuration_frozen.store(true, Ordering::SeqCst);
        tracing::debug!("Bean factory configuration frozen");
    }

    fn is_configuration_frozen(&self) -> bool {
        self.configuration_frozen.load(Ordering::SeqCst)
    }

    fn preinstantiate_singletons(&self) -> ContainerResult<()> {
        let names = self.bean_definition_names();
        tracing::info!("Pre-instantiating {} singleton beans", names.len());

        for name in &names {
            let mbd = self.merged_definition(name)?;
            if mbd.is_abstract || !mbd.is_singleton() || self.is_lazy_init(name, &mbd) {
                continue;
            }
            if self.is_factory_bean(name)? {
                let eager = self
                    .factory_bean_instance(name)?
                    .is_some_and(|factory| factory.is_eager_init());
                if eager {
                    self.get_bean(name)?;
                }
            } else {
                self.get_bean(name)?;
            }
        }

        for name in &names {
            let Some(instance) = self.singletons.get_singleton(name) else {
                continue;
            };
            let smart = self
                .types
                .describe_instance(&instance)
                .and_then(|m| m.capabilities().smart_initializing_singleton.clone())
                .and_then(|cast| cast(&instance));
            if let Some(smart) = smart {
                tracing::trace!("Invoking after_singletons_instantiated() on bean '{}'", name);
                smart.after_singletons_instantiated().map_err(|e| ContainerError::BeanCreation {
                    bean_name: name.clone(),
                    message: "Callback after singleton instantiation failed".to_string(),
                    source: Some(Box::new(ContainerError::Other(e))),
                })?;
            }
        }
        Ok(())
    }

    fn clear_metadata_cache(&self) {
        self.merged_definitions.write().clear();
        self.introspector.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::BeanDefinition;
    use crate::factory::BeanFactoryExt;
    use crate::types::TypeMetadata;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        id: usize,
    }

    static CREATED: AtomicUsize = AtomicUsize::new(0);

    fn factory() -> Arc<DefaultListableBeanFactory> {
        let factory = DefaultListableBeanFactory::new();
        factory.types().register(
            TypeMetadata::named::<Counter>("Counter")
                .default_constructor(|| {
                    Ok(Counter {
                        id: CREATED.fetch_add(1, Ordering::SeqCst),
                    })
                })
                .build(),
        );
        factory
    }

    #[test]
    fn test_singleton_identity_and_prototype_distinct() {
        let factory = factory();
        factory
            .register_bean_definition("single", BeanDefinition::class("Counter"))
            .unwrap();
        factory
            .register_bean_definition("proto", BeanDefinition::class("Counter").prototype())
            .unwrap();

        let a = factory.get_bean("single").unwrap();
        let b = factory.get_bean("single").unwrap();
        assert!(same_object(&a, &b));

        let p1 = factory.get_bean_as::<Counter>("proto").unwrap();
        let p2 = factory.get_bean_as::<Counter>("proto").unwrap();
        assert_ne!(p1.id, p2.id);
        assert!(factory.is_singleton("single").unwrap());
        assert!(factory.is_prototype("proto").unwrap());
    }

    #[test]
    fn test_aliases_and_missing_beans() {
        let factory = factory();
        factory
            .register_bean_definition("counter", BeanDefinition::class("Counter"))
            .unwrap();
        factory.register_alias("counter", "tally").unwrap();
        let by_alias = factory.get_bean("tally").unwrap();
        let by_name = factory.get_bean("counter").unwrap();
        assert!(same_object(&by_alias, &by_name));
        assert_eq!(factory.get_aliases("counter"), vec!["tally"]);
        assert_eq!(factory.get_aliases("tally"), vec!["counter"]);

        assert!(matches!(
            factory.get_bean("nothing"),
            Err(ContainerError::NoSuchBeanDefinition { .. })
        ));
    }

    #[test]
    fn test_overriding_can_be_disallowed() {
        let factory = factory();
        factory.set_allow_bean_definition_overriding(false);
        factory
            .register_bean_definition("counter", BeanDefinition::class("Counter"))
            .unwrap();
        assert!(matches!(
            factory.register_bean_definition("counter", BeanDefinition::class("Counter")),
            Err(ContainerError::BeanDefinitionOverride { .. })
        ));
    }

    #[test]
    fn test_child_definition_inherits_from_parent() {
        let factory = factory();
        factory
            .register_bean_definition("template", BeanDefinition::class("Counter").prototype().with_abstract(true))
            .unwrap();
        factory
            .register_bean_definition("child", BeanDefinition::child("template"))
            .unwrap();

        let merged = factory.get_merged_bean_definition("child").unwrap();
        assert_eq!(merged.bean_class_name.as_deref(), Some("Counter"));
        assert!(merged.is_prototype());
        assert!(!merged.is_abstract);
        assert!(matches!(
            factory.get_bean("template"),
            Err(ContainerError::BeanIsAbstract { .. })
        ));
        assert!(factory.get_bean_as::<Counter>("child").is_ok());
    }

    #[test]
    fn test_frozen_configuration_rejects_changes() {
        let factory = factory();
        factory.freeze_configuration();
        assert!(factory
            .register_bean_definition("counter", BeanDefinition::class("Counter"))
            .is_err());
    }

    #[test]
    fn test_parent_factory_lookup() {
        let parent = factory();
        parent
            .register_bean_definition("shared", BeanDefinition::class("Counter"))
            .unwrap();
        let child = DefaultListableBeanFactory::with_parent(parent.clone());
        assert!(child.contains_bean("shared"));
        assert!(!child.contains_local_bean("shared"));
        let from_child = child.get_bean("shared").unwrap();
        let from_parent = parent.get_bean("shared").unwrap();
        assert!(same_object(&from_child, &from_parent));
    }

    struct Sleepy;

    #[test]
    fn test_lazy_annotation_skips_preinstantiation() {
        let factory = factory();
        factory.types().register(
            TypeMetadata::named::<Sleepy>("Sleepy")
                .annotated(crate::annotation::Annotation::new(crate::annotation::standard::LAZY))
                .default_constructor(|| Ok(Sleepy))
                .build(),
        );
        factory.register_bean_definition("sleepy", BeanDefinition::class("Sleepy")).unwrap();
        factory
            .register_bean_definition("eager", BeanDefinition::class("Sleepy").with_lazy(false))
            .unwrap();

        factory.preinstantiate_singletons().unwrap();
        assert!(!factory.contains_singleton("sleepy"));
        assert!(factory.contains_singleton("eager"));
        assert!(factory.get_bean("sleepy").is_ok());
    }
}
