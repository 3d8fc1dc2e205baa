use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Instant, SystemTime};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::annotation::MergedAnnotation;
use crate::bean::{AliasRegistry, BeanDefinition, BeanDefinitionRegistry, Role};
use crate::constants::{
    APPLICATION_EVENT_MULTICASTER_BEAN_NAME, AUTOWIRED_ANNOTATION_PROCESSOR_BEAN_NAME,
    COMMON_ANNOTATION_PROCESSOR_BEAN_NAME, CONVERSION_SERVICE_BEAN_NAME, ENVIRONMENT_BEAN_NAME,
    EVENT_LISTENER_PROCESSOR_BEAN_NAME, LIFECYCLE_PROCESSOR_BEAN_NAME, MESSAGE_SOURCE_BEAN_NAME,
    PLACEHOLDER_CONFIGURER_BEAN_NAME, SYSTEM_ENVIRONMENT_BEAN_NAME, SYSTEM_ENVIRONMENT_SOURCE_NAME,
    SYSTEM_PROPERTIES_BEAN_NAME, SYSTEM_PROPERTIES_SOURCE_NAME,
};
use crate::env::{Environment, PropertyResolver, PropertySource, PropertySourcesPlaceholderConfigurer};
use crate::error::{ContainerError, ContainerResult};
use crate::event::{
    ApplicationEvent, ApplicationEventMulticaster, ApplicationEventPublisher, ApplicationListener,
    ContextClosedEvent, ContextRefreshedEvent, ContextStartedEvent, ContextStoppedEvent,
    EventListenerMethodProcessor, PayloadApplicationEvent, SimpleApplicationEventMulticaster,
};
use crate::factory::{
    invoke_bean_factory_post_processors, register_bean_post_processors, AutowireCapableBeanFactory,
    AutowiredAnnotationBeanPostProcessor, BeanFactory, BeanFactoryExt, CommonAnnotationBeanPostProcessor,
    ConfigurableBeanFactory, ConfigurableListableBeanFactory, DefaultListableBeanFactory,
    HierarchicalBeanFactory, ListableBeanFactory, ObjectProvider,
};
use crate::lifecycle::BeanFactoryPostProcessor;
use crate::types::{ResolvableType, TypeMetadata, TypeRegistry};
use crate::value::{Args, BeanObject};

use super::message::format_message;
use super::support::{ApplicationContextAwareProcessor, ApplicationListenerDetector};
use super::{
    ApplicationContext, ConfigurableApplicationContext, DefaultLifecycleProcessor, LifecycleProcessor,
    MessageSource, StaticMessageSource, APPLICATION_CONTEXT_INTERFACE, EVENT_PUBLISHER_INTERFACE,
};

/// Shutdown hook类型
pub type ShutdownHook = Box<dyn Fn() -> ContainerResult<()> + Send + Sync>;

/// 创建上下文所需的设置，由构建器填充
struct ContextSettings {
    id: Option<String>,
    display_name: Option<String>,
    application_name: String,
    parent: Option<Arc<GenericApplicationContext>>,
    environment: Arc<Environment>,
    types: Arc<TypeRegistry>,
    async_events: bool,
}

/// 通用应用上下文
///
/// 持有一个 [`DefaultListableBeanFactory`]，bean 定义可以在刷新之前通过
/// [`BeanDefinitionRegistry`] 直接注册。只能刷新一次；需要重新加载时创建新的上下文。
///
/// 刷新失败时已创建的单例全部销毁，上下文保持非活动状态。
pub struct GenericApplicationContext {
    self_ref: Weak<GenericApplicationContext>,

    id: String,
    display_name: String,
    application_name: String,
    parent: Option<Arc<GenericApplicationContext>>,

    /// Bean 工厂 - 负责 Bean 的创建和管理
    bean_factory: Arc<DefaultListableBeanFactory>,

    /// 配置环境
    environment: Arc<Environment>,

    /// 事件多播器是否异步执行监听器
    async_events: bool,

    refreshed: AtomicBool,
    active: AtomicBool,
    closed: AtomicBool,
    startup_date: RwLock<Option<SystemTime>>,

    /// 刷新与关闭互斥；同一线程内可重入
    startup_shutdown_monitor: ReentrantMutex<()>,

    bean_factory_post_processors: RwLock<Vec<Arc<dyn BeanFactoryPostProcessor>>>,
    application_listeners: RwLock<Vec<Arc<dyn ApplicationListener>>>,

    /// 多播器就绪之前发布的事件
    early_events: Mutex<Option<Vec<Arc<dyn ApplicationEvent>>>>,

    multicaster: RwLock<Option<Arc<dyn ApplicationEventMulticaster>>>,
    message_source: RwLock<Option<Arc<dyn MessageSource>>>,
    lifecycle_processor: RwLock<Option<Arc<dyn LifecycleProcessor>>>,

    /// Shutdown hooks
    shutdown_hooks: RwLock<Vec<ShutdownHook>>,
}

impl GenericApplicationContext {
    /// 使用标准环境与 inventory 中收集的类型
    pub fn new() -> Arc<Self> {
        Self::create(ContextSettings {
            id: None,
            display_name: None,
            application_name: String::new(),
            parent: None,
            environment: Arc::new(Environment::new()),
            types: Arc::new(TypeRegistry::from_inventory()),
            async_events: false,
        })
    }

    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    fn create(settings: ContextSettings) -> Arc<Self> {
        let bean_factory = DefaultListableBeanFactory::with_types(settings.types);
        Arc::new_cyclic(|self_ref: &Weak<Self>| {
            let identity = format!("GenericApplicationContext@{:x}", self_ref.as_ptr() as *const () as usize);
            let id = settings.id.unwrap_or_else(|| identity.clone());
            Self {
                self_ref: self_ref.clone(),
                display_name: settings.display_name.unwrap_or(identity),
                id,
                application_name: settings.application_name,
                parent: settings.parent,
                bean_factory,
                environment: settings.environment,
                async_events: settings.async_events,
                refreshed: AtomicBool::new(false),
                active: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                startup_date: RwLock::new(None),
                startup_shutdown_monitor: ReentrantMutex::new(()),
                bean_factory_post_processors: RwLock::new(Vec::new()),
                application_listeners: RwLock::new(Vec::new()),
                early_events: Mutex::new(None),
                multicaster: RwLock::new(None),
                message_source: RwLock::new(None),
                lifecycle_processor: RwLock::new(None),
                shutdown_hooks: RwLock::new(Vec::new()),
            }
        })
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        self.bean_factory.types()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 注册 shutdown hook
    ///
    /// Shutdown hook 会在上下文关闭、单例销毁之前按注册顺序执行
    pub fn register_shutdown_hook<F>(&self, hook: F)
    where
        F: Fn() -> ContainerResult<()> + Send + Sync + 'static,
    {
        let mut hooks = self.shutdown_hooks.write();
        hooks.push(Box::new(hook));
        tracing::debug!("Registered shutdown hook, total: {}", hooks.len());
    }

    /// 已注册的静态监听器
    pub fn application_listeners(&self) -> Vec<Arc<dyn ApplicationListener>> {
        self.application_listeners.read().clone()
    }

    pub fn bean_factory_post_processors(&self) -> Vec<Arc<dyn BeanFactoryPostProcessor>> {
        self.bean_factory_post_processors.read().clone()
    }

    pub(crate) fn multicaster(&self) -> Option<Arc<dyn ApplicationEventMulticaster>> {
        self.multicaster.read().clone()
    }

    fn require_multicaster(&self) -> ContainerResult<Arc<dyn ApplicationEventMulticaster>> {
        self.multicaster().ok_or_else(|| {
            ContainerError::IllegalState(format!(
                "ApplicationEventMulticaster not initialized - call 'refresh' before multicasting events via the context: {}",
                self.display_name
            ))
        })
    }

    fn require_lifecycle_processor(&self) -> ContainerResult<Arc<dyn LifecycleProcessor>> {
        self.lifecycle_processor.read().clone().ok_or_else(|| {
            ContainerError::IllegalState(format!(
                "LifecycleProcessor not initialized - call 'refresh' before invoking lifecycle methods via the context: {}",
                self.display_name
            ))
        })
    }

    fn assert_active(&self) -> ContainerResult<()> {
        if self.active.load(Ordering::SeqCst) {
            return Ok(());
        }
        let state = if self.closed.load(Ordering::SeqCst) {
            "has been closed already"
        } else {
            "has not been refreshed yet"
        };
        Err(ContainerError::IllegalState(format!("{} {}", self.display_name, state)))
    }

    // ---- refresh ----

    fn do_refresh(&self) -> ContainerResult<()> {
        self.prepare_refresh()?;
        self.prepare_bean_factory()?;

        tracing::debug!("Invoking BeanFactoryPostProcessors");
        let programmatic = self.bean_factory_post_processors();
        invoke_bean_factory_post_processors(&self.bean_factory, &programmatic)?;

        tracing::debug!("Registering BeanPostProcessors");
        register_bean_post_processors(&self.bean_factory)?;

        self.init_message_source()?;
        self.init_application_event_multicaster()?;
        self.register_listeners()?;
        self.finish_bean_factory_initialization()?;
        self.finish_refresh()
    }

    fn prepare_refresh(&self) -> ContainerResult<()> {
        *self.startup_date.write() = Some(SystemTime::now());
        self.closed.store(false, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        tracing::info!("Refreshing {}", self.display_name);

        self.environment.validate_required_properties()?;
        *self.early_events.lock() = Some(Vec::new());
        Ok(())
    }

    /// 注册容器自身需要的类型、处理器、可注入对象与环境单例
    fn prepare_bean_factory(&self) -> ContainerResult<()> {
        let factory = &self.bean_factory;
        let types = factory.types();
        for metadata in infrastructure_types() {
            if !types.contains(metadata.name()) {
                types.register(metadata);
            }
        }

        factory.add_bean_post_processor(Arc::new(ApplicationContextAwareProcessor::new(self.self_ref.clone())));

        let weak_factory = Arc::downgrade(factory);
        factory.register_resolvable_supplier(
            ResolvableType::of::<DefaultListableBeanFactory>(),
            Arc::new(move || weak_factory.upgrade().map(|f| f as BeanObject)),
        );
        let weak = self.self_ref.clone();
        factory.register_resolvable_supplier(
            ResolvableType::of::<GenericApplicationContext>(),
            Arc::new(move || weak.upgrade().map(|c| c as BeanObject)),
        );
        let weak = self.self_ref.clone();
        factory.register_resolvable_supplier(
            ResolvableType::class(APPLICATION_CONTEXT_INTERFACE),
            Arc::new(move || {
                weak.upgrade()
                    .map(|c| Arc::new(c as Arc<dyn ApplicationContext>) as BeanObject)
            }),
        );
        let weak = self.self_ref.clone();
        factory.register_resolvable_supplier(
            ResolvableType::class(EVENT_PUBLISHER_INTERFACE),
            Arc::new(move || {
                weak.upgrade()
                    .map(|c| Arc::new(c as Arc<dyn ApplicationEventPublisher>) as BeanObject)
            }),
        );
        factory.register_resolvable_dependency(ResolvableType::of::<Environment>(), self.environment.clone());

        factory.add_bean_post_processor(Arc::new(ApplicationListenerDetector::new(self.self_ref.clone())));

        if !factory.contains_local_bean(ENVIRONMENT_BEAN_NAME) {
            factory.register_singleton(ENVIRONMENT_BEAN_NAME, self.environment.clone())?;
        }
        for (bean_name, source_name) in [
            (SYSTEM_PROPERTIES_BEAN_NAME, SYSTEM_PROPERTIES_SOURCE_NAME),
            (SYSTEM_ENVIRONMENT_BEAN_NAME, SYSTEM_ENVIRONMENT_SOURCE_NAME),
        ] {
            if factory.contains_local_bean(bean_name) {
                continue;
            }
            let values = self
                .environment
                .property_sources()
                .get(source_name)
                .map(|source| snapshot_of(source.as_ref()))
                .unwrap_or_default();
            factory.register_singleton(bean_name, Arc::new(values))?;
        }

        self.register_annotation_processors()
    }

    fn register_annotation_processors(&self) -> ContainerResult<()> {
        let factory = &self.bean_factory;

        if !factory.contains_bean_definition(AUTOWIRED_ANNOTATION_PROCESSOR_BEAN_NAME) {
            let weak = Arc::downgrade(factory);
            factory.register_bean_definition(
                AUTOWIRED_ANNOTATION_PROCESSOR_BEAN_NAME,
                infrastructure(AutowiredAnnotationBeanPostProcessor::TYPE_NAME, move || {
                    Ok(AutowiredAnnotationBeanPostProcessor::new(weak.clone()))
                }),
            )?;
        }
        if !factory.contains_bean_definition(COMMON_ANNOTATION_PROCESSOR_BEAN_NAME) {
            let weak = Arc::downgrade(factory);
            factory.register_bean_definition(
                COMMON_ANNOTATION_PROCESSOR_BEAN_NAME,
                infrastructure(CommonAnnotationBeanPostProcessor::TYPE_NAME, move || {
                    Ok(CommonAnnotationBeanPostProcessor::new(weak.clone()))
                }),
            )?;
        }
        if !factory.contains_bean_definition(EVENT_LISTENER_PROCESSOR_BEAN_NAME) {
            let weak: Weak<dyn ConfigurableApplicationContext> = self.self_ref.clone();
            factory.register_bean_definition(
                EVENT_LISTENER_PROCESSOR_BEAN_NAME,
                infrastructure(EventListenerMethodProcessor::TYPE_NAME, move || {
                    Ok(EventListenerMethodProcessor::new(weak.clone()))
                }),
            )?;
        }
        let configurers = factory.get_bean_names_for_type(
            &ResolvableType::class(PropertySourcesPlaceholderConfigurer::TYPE_NAME),
            true,
            false,
        );
        if configurers.is_empty() {
            let environment = self.environment.clone();
            factory.register_bean_definition(
                PLACEHOLDER_CONFIGURER_BEAN_NAME,
                infrastructure(PropertySourcesPlaceholderConfigurer::TYPE_NAME, move || {
                    Ok(PropertySourcesPlaceholderConfigurer::new(environment.clone()))
                }),
            )?;
        }
        Ok(())
    }

    /// 使用名为 `messageSource` 的 bean，没有时注册一个只委托父上下文的空消息源
    fn init_message_source(&self) -> ContainerResult<()> {
        let factory = &self.bean_factory;
        let parent = self.parent.clone().map(|p| p as Arc<dyn MessageSource>);

        let source: Arc<dyn MessageSource> = if factory.contains_local_bean(MESSAGE_SOURCE_BEAN_NAME) {
            let bean = factory.get_bean(MESSAGE_SOURCE_BEAN_NAME)?;
            let source = factory
                .types()
                .describe_instance(&bean)
                .and_then(|m| m.capabilities().message_source.clone())
                .and_then(|cast| cast(&bean))
                .ok_or_else(|| ContainerError::BeanNotOfRequiredType {
                    bean_name: MESSAGE_SOURCE_BEAN_NAME.to_string(),
                    required_type: "MessageSource".to_string(),
                    actual_type: "unknown".to_string(),
                })?;
            if source.parent_message_source().is_none() && parent.is_some() {
                source.set_parent_message_source(parent);
            }
            tracing::trace!("Using MessageSource [{}]", MESSAGE_SOURCE_BEAN_NAME);
            source
        } else {
            let source = Arc::new(StaticMessageSource::new());
            source.set_parent_message_source(parent);
            factory.register_singleton(MESSAGE_SOURCE_BEAN_NAME, source.clone())?;
            tracing::trace!("No '{}' bean, using empty StaticMessageSource", MESSAGE_SOURCE_BEAN_NAME);
            source
        };
        *self.message_source.write() = Some(source);
        Ok(())
    }

    fn init_application_event_multicaster(&self) -> ContainerResult<()> {
        let factory = &self.bean_factory;
        let multicaster: Arc<dyn ApplicationEventMulticaster> =
            if factory.contains_local_bean(APPLICATION_EVENT_MULTICASTER_BEAN_NAME) {
                tracing::trace!("Using ApplicationEventMulticaster [{}]", APPLICATION_EVENT_MULTICASTER_BEAN_NAME);
                factory.get_named_interface::<dyn ApplicationEventMulticaster>(
                    APPLICATION_EVENT_MULTICASTER_BEAN_NAME,
                    SimpleApplicationEventMulticaster::INTERFACE_NAME,
                )?
            } else {
                let types = factory.types().clone();
                let simple = Arc::new(if self.async_events {
                    SimpleApplicationEventMulticaster::new_async(types)
                } else {
                    SimpleApplicationEventMulticaster::new(types)
                });
                simple.set_bean_factory(factory);
                factory.register_singleton(APPLICATION_EVENT_MULTICASTER_BEAN_NAME, simple.clone())?;
                tracing::trace!(
                    "No '{}' bean, using SimpleApplicationEventMulticaster (async: {})",
                    APPLICATION_EVENT_MULTICASTER_BEAN_NAME,
                    self.async_events
                );
                simple
            };
        *self.multicaster.write() = Some(multicaster);
        Ok(())
    }

    /// 静态监听器与监听器 bean 名称交给多播器，然后发布缓存的早期事件
    fn register_listeners(&self) -> ContainerResult<()> {
        let multicaster = self.require_multicaster()?;
        for listener in self.application_listeners() {
            multicaster.add_application_listener(listener);
        }
        let listener_beans = self
            .bean_factory
            .bean_names_with_capability(&|c| c.application_listener.is_some());
        for name in listener_beans {
            multicaster.add_application_listener_bean(&name);
        }

        let early = self.early_events.lock().take();
        for event in early.into_iter().flatten() {
            multicaster.multicast_event(event)?;
        }
        Ok(())
    }

    fn finish_bean_factory_initialization(&self) -> ContainerResult<()> {
        let factory = &self.bean_factory;

        if factory.contains_bean(CONVERSION_SERVICE_BEAN_NAME) {
            let bean = factory.get_bean(CONVERSION_SERVICE_BEAN_NAME)?;
            let service = factory
                .types()
                .describe_instance(&bean)
                .and_then(|m| m.capabilities().conversion_service.clone())
                .and_then(|cast| cast(&bean));
            match service {
                Some(service) => factory.set_conversion_service(service),
                None => tracing::warn!(
                    "Bean '{}' does not implement ConversionService, ignoring it",
                    CONVERSION_SERVICE_BEAN_NAME
                ),
            }
        }

        if !factory.has_embedded_value_resolver() {
            let environment = self.environment.clone();
            factory.add_embedded_value_resolver(Arc::new(move |text: &str| environment.resolve_placeholders(text)));
        }

        factory.freeze_configuration();
        factory.preinstantiate_singletons()
    }

    fn finish_refresh(&self) -> ContainerResult<()> {
        self.bean_factory.clear_metadata_cache();

        let factory = &self.bean_factory;
        let processor: Arc<dyn LifecycleProcessor> = if factory.contains_local_bean(LIFECYCLE_PROCESSOR_BEAN_NAME) {
            tracing::trace!("Using LifecycleProcessor [{}]", LIFECYCLE_PROCESSOR_BEAN_NAME);
            factory.get_named_interface::<dyn LifecycleProcessor>(
                LIFECYCLE_PROCESSOR_BEAN_NAME,
                DefaultLifecycleProcessor::INTERFACE_NAME,
            )?
        } else {
            let default = Arc::new(DefaultLifecycleProcessor::new(Arc::downgrade(factory)));
            factory.register_singleton(LIFECYCLE_PROCESSOR_BEAN_NAME, default.clone())?;
            default
        };
        *self.lifecycle_processor.write() = Some(processor.clone());

        processor.on_refresh()?;
        self.publish_event(Arc::new(ContextRefreshedEvent::new(self.id.clone())))
    }

    fn cancel_refresh(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.early_events.lock().take();
    }

    fn do_close(&self) {
        if !self.active.load(Ordering::SeqCst)
            || self
                .closed
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return;
        }
        tracing::info!("Closing {}", self.display_name);

        if let Err(e) = self.publish_event(Arc::new(ContextClosedEvent::new(self.id.clone()))) {
            tracing::warn!("Exception thrown from ApplicationListener handling ContextClosedEvent: {}", e);
        }

        if let Some(processor) = self.lifecycle_processor.read().clone() {
            processor.on_close();
        }

        let hooks = self.shutdown_hooks.read();
        tracing::debug!("Executing {} shutdown hook(s)", hooks.len());
        for (idx, hook) in hooks.iter().enumerate() {
            match hook() {
                Ok(()) => tracing::debug!("Shutdown hook {} executed successfully", idx + 1),
                Err(e) => tracing::warn!("Shutdown hook {} failed: {}", idx + 1, e),
            }
        }
        drop(hooks);

        self.bean_factory.destroy_singletons();

        // 监听器可能持有上下文本身
        if let Some(multicaster) = self.multicaster() {
            multicaster.remove_all_listeners();
        }
        self.application_listeners.write().clear();

        self.active.store(false, Ordering::SeqCst);
        tracing::info!("Closed {}", self.display_name);
    }
}

/// 容器内置组件的类型描述
fn infrastructure_types() -> Vec<TypeMetadata> {
    vec![
        AutowiredAnnotationBeanPostProcessor::type_metadata(),
        CommonAnnotationBeanPostProcessor::type_metadata(),
        EventListenerMethodProcessor::type_metadata(),
        PropertySourcesPlaceholderConfigurer::type_metadata(),
        SimpleApplicationEventMulticaster::type_metadata(),
        StaticMessageSource::type_metadata(),
        DefaultLifecycleProcessor::type_metadata(),
    ]
}

/// 以命名类型注册的内置 bean 定义
fn infrastructure<T, F>(type_name: &str, supplier: F) -> BeanDefinition
where
    T: Any + Send + Sync,
    F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
{
    let mut definition = BeanDefinition::with_supplier(supplier)
        .with_role(Role::Infrastructure)
        .with_target_type(ResolvableType::class(type_name));
    definition.bean_class_name = Some(type_name.to_string());
    definition
}

fn snapshot_of(source: &dyn PropertySource) -> HashMap<String, String> {
    source
        .keys()
        .into_iter()
        .filter_map(|key| {
            let value = source.get(&key)?.to_text()?;
            Some((key, value))
        })
        .collect()
}

impl fmt::Debug for GenericApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericApplicationContext")
            .field("id", &self.id)
            .field("active", &self.active.load(Ordering::SeqCst))
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .field("bean_definitions", &self.bean_factory.bean_definition_count())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl fmt::Display for GenericApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)?;
        if let Some(date) = *self.startup_date.read() {
            if let Ok(elapsed) = date.elapsed() {
                write!(f, ", started {:?} ago", elapsed)?;
            }
        }
        if let Some(parent) = &self.parent {
            write!(f, ", parent: {}", parent.display_name)?;
        }
        Ok(())
    }
}

impl ApplicationContext for GenericApplicationContext {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn application_name(&self) -> String {
        self.application_name.clone()
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn startup_date(&self) -> Option<SystemTime> {
        *self.startup_date.read()
    }

    fn parent(&self) -> Option<Arc<dyn ApplicationContext>> {
        self.parent.clone().map(|p| p as Arc<dyn ApplicationContext>)
    }

    fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    fn autowire_capable_bean_factory(&self) -> ContainerResult<Arc<dyn AutowireCapableBeanFactory>> {
        self.assert_active()?;
        let factory: Arc<dyn AutowireCapableBeanFactory> = self.bean_factory.clone();
        Ok(factory)
    }
}

impl ConfigurableApplicationContext for GenericApplicationContext {
    fn bean_factory(&self) -> &Arc<DefaultListableBeanFactory> {
        &self.bean_factory
    }

    fn add_bean_factory_post_processor(&self, processor: Arc<dyn BeanFactoryPostProcessor>) {
        self.bean_factory_post_processors.write().push(processor);
    }

    fn add_application_listener(&self, listener: Arc<dyn ApplicationListener>) {
        if let Some(multicaster) = self.multicaster() {
            multicaster.add_application_listener(listener.clone());
        }
        let mut listeners = self.application_listeners.write();
        if !listeners.iter().any(|l| std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(&listener))) {
            listeners.push(listener);
        }
    }

    fn refresh(&self) -> ContainerResult<()> {
        let _guard = self.startup_shutdown_monitor.lock();
        if self.refreshed.swap(true, Ordering::SeqCst) {
            return Err(ContainerError::IllegalState(
                "GenericApplicationContext does not support multiple refresh attempts: just call 'refresh' once"
                    .to_string(),
            ));
        }
        let started = Instant::now();
        match self.do_refresh() {
            Ok(()) => {
                tracing::info!(
                    "Refreshed {} with {} bean definition(s) in {:?}",
                    self.display_name,
                    self.bean_factory.bean_definition_count(),
                    started.elapsed()
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "Exception encountered during context initialization - cancelling refresh attempt: {}",
                    e
                );
                self.bean_factory.destroy_singletons();
                self.cancel_refresh();
                Err(e)
            }
        }
    }

    fn start(&self) -> ContainerResult<()> {
        self.require_lifecycle_processor()?.start()?;
        self.publish_event(Arc::new(ContextStartedEvent::new(self.id.clone())))
    }

    fn stop(&self) -> ContainerResult<()> {
        self.require_lifecycle_processor()?.stop();
        self.publish_event(Arc::new(ContextStoppedEvent::new(self.id.clone())))
    }

    fn is_running(&self) -> bool {
        self.lifecycle_processor
            .read()
            .as_ref()
            .is_some_and(|processor| processor.is_running())
    }

    fn close(&self) {
        let _guard = self.startup_shutdown_monitor.lock();
        self.do_close();
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl ApplicationEventPublisher for GenericApplicationContext {
    /// 多播器就绪之前的事件先缓存，之后一并发布；事件同时转发给父上下文
    fn publish_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
        tracing::trace!("Publishing event in {}: {}", self.display_name, event.event_type());
        let buffered = match self.early_events.lock().as_mut() {
            Some(buffer) => {
                buffer.push(event.clone());
                true
            }
            None => false,
        };
        if !buffered {
            self.require_multicaster()?.multicast_event(event.clone())?;
        }
        if let Some(parent) = &self.parent {
            parent.publish_event(event)?;
        }
        Ok(())
    }

    fn publish_object(&self, payload: BeanObject, payload_type: ResolvableType) -> ContainerResult<()> {
        self.publish_event(Arc::new(PayloadApplicationEvent::from_object(
            self.id.clone(),
            payload,
            payload_type,
        )))
    }
}

impl MessageSource for GenericApplicationContext {
    fn get_message_or(&self, code: &str, args: &[&str], default_message: Option<&str>, locale: &str) -> Option<String> {
        match self.message_source.read().clone() {
            Some(source) => source.get_message_or(code, args, default_message, locale),
            None => {
                tracing::warn!(
                    "MessageSource not initialized - call 'refresh' before accessing messages via the context: {}",
                    self.display_name
                );
                default_message.map(|message| format_message(message, args))
            }
        }
    }

    fn get_message(&self, code: &str, args: &[&str], locale: &str) -> ContainerResult<String> {
        let source = self.message_source.read().clone().ok_or_else(|| {
            ContainerError::IllegalState(format!(
                "MessageSource not initialized - call 'refresh' before accessing messages via the context: {}",
                self.display_name
            ))
        })?;
        source.get_message(code, args, locale)
    }

    fn parent_message_source(&self) -> Option<Arc<dyn MessageSource>> {
        self.parent.clone().map(|p| p as Arc<dyn MessageSource>)
    }
}

// ---- 委托给 bean 工厂 ----

impl BeanFactory for GenericApplicationContext {
    fn get_bean(&self, name: &str) -> ContainerResult<BeanObject> {
        self.bean_factory.get_bean(name)
    }

    fn get_bean_with_args(&self, name: &str, args: Args) -> ContainerResult<BeanObject> {
        self.bean_factory.get_bean_with_args(name, args)
    }

    fn get_typed_bean(&self, name: &str, required_type: &ResolvableType) -> ContainerResult<BeanObject> {
        self.bean_factory.get_typed_bean(name, required_type)
    }

    fn get_bean_of_type(&self, required_type: &ResolvableType) -> ContainerResult<BeanObject> {
        self.bean_factory.get_bean_of_type(required_type)
    }

    fn get_bean_provider(&self, required_type: &ResolvableType) -> ObjectProvider {
        self.bean_factory.get_bean_provider(required_type)
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.bean_factory.contains_bean(name)
    }

    fn is_singleton(&self, name: &str) -> ContainerResult<bool> {
        self.bean_factory.is_singleton(name)
    }

    fn is_prototype(&self, name: &str) -> ContainerResult<bool> {
        self.bean_factory.is_prototype(name)
    }

    fn is_type_match(&self, name: &str, type_to_match: &ResolvableType) -> ContainerResult<bool> {
        self.bean_factory.is_type_match(name, type_to_match)
    }

    fn get_type(&self, name: &str) -> ContainerResult<Option<ResolvableType>> {
        self.bean_factory.get_type(name)
    }

    fn get_aliases(&self, name: &str) -> Vec<String> {
        self.bean_factory.get_aliases(name)
    }
}

impl HierarchicalBeanFactory for GenericApplicationContext {
    fn parent_bean_factory(&self) -> Option<Arc<DefaultListableBeanFactory>> {
        self.bean_factory.parent_bean_factory()
    }

    fn contains_local_bean(&self, name: &str) -> bool {
        self.bean_factory.contains_local_bean(name)
    }
}

impl ListableBeanFactory for GenericApplicationContext {
    fn get_bean_names_for_type(
        &self,
        ty: &ResolvableType,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String> {
        self.bean_factory
            .get_bean_names_for_type(ty, include_non_singletons, allow_eager_init)
    }

    fn get_beans_of_type(&self, ty: &ResolvableType) -> ContainerResult<Vec<(String, BeanObject)>> {
        self.bean_factory.get_beans_of_type(ty)
    }

    fn get_bean_names_for_annotation(&self, annotation_type: &str) -> ContainerResult<Vec<String>> {
        self.bean_factory.get_bean_names_for_annotation(annotation_type)
    }

    fn find_annotation_on_bean(&self, name: &str, annotation_type: &str) -> ContainerResult<Option<MergedAnnotation>> {
        self.bean_factory.find_annotation_on_bean(name, annotation_type)
    }
}

impl AliasRegistry for GenericApplicationContext {
    fn register_alias(&self, name: &str, alias: &str) -> ContainerResult<()> {
        self.bean_factory.register_alias(name, alias)
    }

    fn remove_alias(&self, alias: &str) -> ContainerResult<()> {
        self.bean_factory.remove_alias(alias)
    }

    fn is_alias(&self, name: &str) -> bool {
        self.bean_factory.is_alias(name)
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        self.bean_factory.aliases(name)
    }
}

impl BeanDefinitionRegistry for GenericApplicationContext {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> ContainerResult<()> {
        self.bean_factory.register_bean_definition(name, definition)
    }

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()> {
        self.bean_factory.remove_bean_definition(name)
    }

    fn get_bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition> {
        self.bean_factory.get_bean_definition(name)
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.bean_factory.contains_bean_definition(name)
    }

    fn bean_definition_names(&self) -> Vec<String> {
        self.bean_factory.bean_definition_names()
    }

    fn bean_definition_count(&self) -> usize {
        self.bean_factory.bean_definition_count()
    }

    fn modify_bean_definition(
        &self,
        name: &str,
        modify: &mut dyn FnMut(&mut BeanDefinition),
    ) -> ContainerResult<()> {
        self.bean_factory.modify_bean_definition(name, modify)
    }
}

/// 应用上下文构建器
///
/// 收集定义、单例、配置源与监听器，`build` 时一次性注册到新的上下文。
pub struct ApplicationContextBuilder {
    id: Option<String>,
    display_name: Option<String>,
    application_name: String,
    parent: Option<Arc<GenericApplicationContext>>,
    environment: Option<Arc<Environment>>,
    property_sources: Vec<Arc<dyn PropertySource>>,
    active_profiles: Vec<String>,
    types: Option<Arc<TypeRegistry>>,
    extra_types: Vec<TypeMetadata>,
    definitions: Vec<(String, BeanDefinition)>,
    singletons: Vec<(String, BeanObject)>,
    aliases: Vec<(String, String)>,
    bean_factory_post_processors: Vec<Arc<dyn BeanFactoryPostProcessor>>,
    listeners: Vec<Arc<dyn ApplicationListener>>,
    async_events: bool,
    allow_bean_definition_overriding: Option<bool>,
    allow_circular_references: Option<bool>,
}

impl ApplicationContextBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            display_name: None,
            application_name: String::new(),
            parent: None,
            environment: None,
            property_sources: Vec::new(),
            active_profiles: Vec::new(),
            types: None,
            extra_types: Vec::new(),
            definitions: Vec::new(),
            singletons: Vec::new(),
            aliases: Vec::new(),
            bean_factory_post_processors: Vec::new(),
            listeners: Vec::new(),
            async_events: false,
            allow_bean_definition_overriding: None,
            allow_circular_references: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// 父上下文：bean 查找、消息与事件都会委托给它
    pub fn parent(mut self, parent: Arc<GenericApplicationContext>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// 使用现有环境，默认创建包含系统属性与环境变量的标准环境
    pub fn environment(mut self, environment: Arc<Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// 添加配置源到 Environment，先添加的优先
    pub fn add_property_source(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.property_sources.push(source);
        self
    }

    /// 设置激活的 profiles
    pub fn active_profiles(mut self, profiles: &[&str]) -> Self {
        self.active_profiles = profiles.iter().map(|p| p.to_string()).collect();
        self
    }

    /// 类型注册表，默认使用父上下文的注册表或从 inventory 收集
    pub fn types(mut self, types: Arc<TypeRegistry>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn register_type(mut self, metadata: TypeMetadata) -> Self {
        self.extra_types.push(metadata);
        self
    }

    /// 设置是否异步处理事件
    ///
    /// 默认为 false（同步处理）
    /// 设置为 true 时，监听器在当前 tokio 运行时的独立任务中执行
    pub fn async_events(mut self, async_events: bool) -> Self {
        self.async_events = async_events;
        self
    }

    pub fn allow_bean_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_bean_definition_overriding = Some(allow);
        self
    }

    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = Some(allow);
        self
    }

    /// 注册 Bean 定义
    pub fn register(mut self, name: impl Into<String>, definition: BeanDefinition) -> Self {
        self.definitions.push((name.into(), definition));
        self
    }

    /// 注册单例 Bean
    pub fn register_singleton<T, F>(self, name: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(name, BeanDefinition::with_supplier(factory))
    }

    /// 注册原型 Bean
    pub fn register_prototype<T, F>(self, name: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(name, BeanDefinition::with_supplier(factory).prototype())
    }

    /// 注册已经创建好的对象，不执行任何回调
    pub fn register_instance(mut self, name: impl Into<String>, object: BeanObject) -> Self {
        self.singletons.push((name.into(), object));
        self
    }

    pub fn register_alias(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.push((name.into(), alias.into()));
        self
    }

    pub fn add_bean_factory_post_processor(mut self, processor: Arc<dyn BeanFactoryPostProcessor>) -> Self {
        self.bean_factory_post_processors.push(processor);
        self
    }

    pub fn add_listener(mut self, listener: Arc<dyn ApplicationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// 构建上下文，尚未刷新
    pub fn build(self) -> ContainerResult<Arc<GenericApplicationContext>> {
        let environment = self.environment.unwrap_or_else(|| Arc::new(Environment::new()));
        for source in self.property_sources.into_iter().rev() {
            environment.property_sources().add_first(source);
        }
        if !self.active_profiles.is_empty() {
            let profiles: Vec<&str> = self.active_profiles.iter().map(String::as_str).collect();
            environment.set_active_profiles(&profiles)?;
        }
        if let Some(parent) = &self.parent {
            environment.merge(&parent.environment);
        }

        let types = self
            .types
            .or_else(|| self.parent.as_ref().map(|p| p.types().clone()))
            .unwrap_or_else(|| Arc::new(TypeRegistry::from_inventory()));
        for metadata in self.extra_types {
            types.register(metadata);
        }

        let parent_factory = self.parent.as_ref().map(|p| p.bean_factory.clone());
        let context = GenericApplicationContext::create(ContextSettings {
            id: self.id,
            display_name: self.display_name,
            application_name: self.application_name,
            parent: self.parent,
            environment,
            types,
            async_events: self.async_events,
        });

        let factory = &context.bean_factory;
        if let Some(parent_factory) = parent_factory {
            factory.set_parent_bean_factory(parent_factory)?;
        }
        if let Some(allow) = self.allow_bean_definition_overriding {
            factory.set_allow_bean_definition_overriding(allow);
        }
        if let Some(allow) = self.allow_circular_references {
            factory.set_allow_circular_references(allow);
        }
        for (name, definition) in self.definitions {
            factory.register_bean_definition(&name, definition)?;
        }
        for (name, object) in self.singletons {
            factory.register_singleton(&name, object)?;
        }
        for (name, alias) in self.aliases {
            factory.register_alias(&name, &alias)?;
        }
        for processor in self.bean_factory_post_processors {
            context.add_bean_factory_post_processor(processor);
        }
        for listener in self.listeners {
            context.add_application_listener(listener);
        }

        tracing::debug!("Built {} with {} bean definition(s)", context.display_name, factory.bean_definition_count());
        Ok(context)
    }

    /// 构建并刷新上下文
    pub fn run(self) -> ContainerResult<Arc<GenericApplicationContext>> {
        let context = self.build()?;
        context.refresh()?;
        Ok(context)
    }
}

impl Default for ApplicationContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::annotation::{standard, Annotation};
    use crate::context::{ApplicationContextAware, ApplicationEventPublisherAware, EnvironmentAware};
    use crate::env::MapPropertySource;
    use crate::event::{TypedApplicationListener, CONTEXT_REFRESHED_EVENT};
    use crate::types::{MethodMetadata, ParameterMetadata};
    use crate::value::Value;

    fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
            .environment(Arc::new(Environment::empty()))
            .types(Arc::new(TypeRegistry::new()))
    }

    fn counting<E: Any + Send + Sync>(counter: &Arc<AtomicUsize>) -> Arc<dyn ApplicationListener> {
        let counter = counter.clone();
        Arc::new(TypedApplicationListener::new(move |_: &E| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    #[test]
    fn test_second_refresh_is_rejected() {
        let context = builder().build().unwrap();
        context.refresh().unwrap();
        assert!(context.is_active());
        let err = context.refresh().unwrap_err();
        assert!(matches!(err, ContainerError::IllegalState(_)));
    }

    #[test]
    fn test_refresh_and_close_publish_context_events() {
        let refreshed = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let context = builder()
            .add_listener(counting::<ContextRefreshedEvent>(&refreshed))
            .add_listener(counting::<ContextClosedEvent>(&closed))
            .run()
            .unwrap();
        assert_eq!(refreshed.load(Ordering::SeqCst), 1);
        assert!(context.startup_date().is_some());

        context.close();
        context.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(!context.is_active());
        assert!(context.is_closed());
    }

    #[test]
    fn test_failed_refresh_destroys_created_singletons() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let hook_counter = destroyed.clone();
        let context = builder()
            .register_singleton("first", || Ok(String::from("created")))
            .register_singleton("broken", || -> anyhow::Result<String> { anyhow::bail!("boom") })
            .build()
            .unwrap();
        context.register_shutdown_hook(move || {
            hook_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(context.refresh().is_err());
        assert!(!context.is_active());
        assert_eq!(context.bean_factory().singleton_count(), 0);
        // 失败的刷新不执行关闭流程
        context.close();
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shutdown_hooks_run_on_close() {
        let calls = Arc::new(AtomicUsize::new(0));
        let context = builder().run().unwrap();
        let counter = calls.clone();
        context.register_shutdown_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        context.register_shutdown_hook(|| Err(ContainerError::IllegalState("hook failed".to_string())));
        context.close();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_before_refresh_fails() {
        let context = builder().build().unwrap();
        let err = context.publish(String::from("too early")).unwrap_err();
        assert!(matches!(err, ContainerError::IllegalState(_)));
    }

    #[derive(Default)]
    struct Probe {
        environment: RwLock<Option<Arc<Environment>>>,
        context_id: RwLock<Option<String>>,
        publisher: RwLock<Option<Arc<dyn ApplicationEventPublisher>>>,
    }

    impl EnvironmentAware for Probe {
        fn set_environment(&self, environment: &Arc<Environment>) {
            *self.environment.write() = Some(environment.clone());
        }
    }

    impl ApplicationContextAware for Probe {
        fn set_application_context(&self, context: Arc<dyn ApplicationContext>) -> anyhow::Result<()> {
            *self.context_id.write() = Some(context.id());
            Ok(())
        }
    }

    impl ApplicationEventPublisherAware for Probe {
        fn set_application_event_publisher(&self, publisher: Arc<dyn ApplicationEventPublisher>) {
            *self.publisher.write() = Some(publisher);
        }
    }

    #[test]
    fn test_aware_callbacks_receive_context_services() {
        let context = builder()
            .id("probe-context")
            .register_type(
                TypeMetadata::of::<Probe>()
                    .environment_aware()
                    .application_context_aware()
                    .event_publisher_aware()
                    .build(),
            )
            .register_singleton("probe", || Ok(Probe::default()))
            .run()
            .unwrap();

        let probe = context.get_bean_as::<Probe>("probe").unwrap();
        assert!(probe.environment.read().is_some());
        assert_eq!(probe.context_id.read().as_deref(), Some("probe-context"));
        assert!(probe.publisher.read().is_some());
        context.close();
    }

    struct Audit {
        seen: AtomicUsize,
    }

    impl ApplicationListener for Audit {
        fn on_application_event(&self, _event: &Arc<dyn ApplicationEvent>) -> anyhow::Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn event_types(&self) -> Vec<ResolvableType> {
            vec![ResolvableType::of::<String>()]
        }

        fn listener_name(&self) -> &str {
            "audit"
        }
    }

    #[test]
    fn test_listener_beans_receive_published_payloads_once() {
        let context = builder()
            .register_type(TypeMetadata::of::<Audit>().application_listener().build())
            .register_singleton("audit", || Ok(Audit { seen: AtomicUsize::new(0) }))
            .run()
            .unwrap();

        context.publish(String::from("login")).unwrap();
        let audit = context.get_bean_as::<Audit>("audit").unwrap();
        assert_eq!(audit.seen.load(Ordering::SeqCst), 1);

        let multicaster = context.multicaster().unwrap();
        context.close();
        assert_eq!(multicaster.listener_count(), 0);
    }

    struct Greeter {
        greetings: parking_lot::Mutex<Vec<String>>,
    }

    fn greeter_type() -> TypeMetadata {
        TypeMetadata::of::<Greeter>()
            .method(
                MethodMetadata::new("on_refresh")
                    .param(ParameterMetadata::new("event", ResolvableType::class(CONTEXT_REFRESHED_EVENT)))
                    .returns(ResolvableType::of::<String>())
                    .annotated(Annotation::new(standard::EVENT_LISTENER))
                    .invoke::<Greeter, _>(|_, _| Ok(Value::text("hello"))),
            )
            .method(
                MethodMetadata::new("on_greeting")
                    .param(ParameterMetadata::new("greeting", ResolvableType::of::<String>()))
                    .annotated(Annotation::new(standard::EVENT_LISTENER))
                    .invoke::<Greeter, _>(|greeter, args| {
                        let text = args.bean::<String>(0)?;
                        greeter.greetings.lock().push((*text).clone());
                        Ok(Value::Null)
                    }),
            )
            .build()
    }

    #[test]
    fn test_event_listener_methods_publish_follow_up_events() {
        let context = builder()
            .register_type(greeter_type())
            .register_singleton("greeter", || {
                Ok(Greeter {
                    greetings: parking_lot::Mutex::new(Vec::new()),
                })
            })
            .run()
            .unwrap();

        let greeter = context.get_bean_as::<Greeter>("greeter").unwrap();
        assert_eq!(*greeter.greetings.lock(), vec!["hello".to_string()]);

        context.publish(String::from("hi")).unwrap();
        assert_eq!(greeter.greetings.lock().len(), 2);
    }

    #[test]
    fn test_messages_fall_back_to_parent_context() {
        let messages = StaticMessageSource::new();
        messages.add_message("app.title", "", "Inventory {0}");
        let parent = builder()
            .register_instance(MESSAGE_SOURCE_BEAN_NAME, Arc::new(messages))
            .run()
            .unwrap();
        let child = builder().parent(parent.clone()).run().unwrap();

        assert_eq!(child.get_message("app.title", &["v2"], "en").unwrap(), "Inventory v2");
        assert!(matches!(
            child.get_message("app.missing", &[], "en"),
            Err(ContainerError::NoSuchMessage { .. })
        ));
        assert_eq!(
            child.get_message_or("app.missing", &[], Some("fallback"), "en").as_deref(),
            Some("fallback")
        );
    }

    #[test]
    fn test_child_events_reach_parent_listeners() {
        let received = Arc::new(AtomicUsize::new(0));
        let parent = builder().add_listener(counting::<String>(&received)).run().unwrap();
        let child = builder().parent(parent.clone()).run().unwrap();

        child.publish(String::from("from child")).unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_autowire_facade_requires_active_context() {
        let context = builder().build().unwrap();
        assert!(context.autowire_capable_bean_factory().is_err());
        context.refresh().unwrap();
        assert!(context.autowire_capable_bean_factory().is_ok());
        context.close();
        assert!(matches!(
            context.autowire_capable_bean_factory(),
            Err(ContainerError::IllegalState(message)) if message.contains("closed")
        ));
    }

    #[test]
    fn test_environment_beans_and_placeholders() {
        let context = builder()
            .add_property_source(Arc::new(MapPropertySource::new("app").with_property("app.name", "inventory")))
            .run()
            .unwrap();

        assert!(context.contains_bean(ENVIRONMENT_BEAN_NAME));
        assert!(context.contains_bean(SYSTEM_PROPERTIES_BEAN_NAME));
        assert_eq!(
            context.bean_factory().resolve_embedded_value("${app.name}").unwrap(),
            "inventory"
        );
        assert!(context.get_bean_as::<Environment>(ENVIRONMENT_BEAN_NAME).is_ok());
    }
}
