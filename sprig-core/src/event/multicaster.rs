use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};
use crate::factory::{BeanFactory, DefaultListableBeanFactory};
use crate::types::{ResolvableType, TypeIntrospector, TypeMetadata, TypeRegistry};

use super::{ApplicationEvent, ApplicationListener, ErrorHandler, PayloadApplicationEvent, APPLICATION_EVENT};

/// 事件多播器 trait
///
/// 负责将事件传播到所有匹配的监听器。监听器既可以直接以实例注册，
/// 也可以以 bean 名称注册，后者在每次广播时从 bean 工厂取得。
pub trait ApplicationEventMulticaster: Send + Sync {
    fn add_application_listener(&self, listener: Arc<dyn ApplicationListener>);

    fn add_application_listener_bean(&self, bean_name: &str);

    fn remove_application_listener(&self, listener: &Arc<dyn ApplicationListener>);

    fn remove_application_listener_bean(&self, bean_name: &str);

    fn remove_all_listeners(&self);

    /// 广播事件到所有匹配的监听器
    ///
    /// 同步模式下，监听器返回的错误会中断后续监听器并传递给发布方；
    /// 设置了错误处理器时改为交给处理器。
    fn multicast_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()>;

    /// 获取监听器数量（实例与 bean 名称）
    fn listener_count(&self) -> usize;
}

/// 按事件类型缓存的匹配结果
#[derive(Clone, Default)]
struct CachedRetrieval {
    listeners: Vec<Arc<dyn ApplicationListener>>,
    bean_names: Vec<String>,
}

type CacheKey = (TypeId, String);

/// 简单事件多播器实现
///
/// 默认同步执行；异步模式下每个监听器在当前 tokio 运行时中各自执行，
/// 没有运行时时降级为同步执行。
pub struct SimpleApplicationEventMulticaster {
    types: Arc<TypeRegistry>,
    bean_factory: RwLock<Option<Weak<DefaultListableBeanFactory>>>,
    listeners: RwLock<Vec<Arc<dyn ApplicationListener>>>,
    listener_beans: RwLock<Vec<String>>,
    retriever_cache: RwLock<HashMap<CacheKey, CachedRetrieval>>,
    error_handler: RwLock<Option<ErrorHandler>>,
    async_mode: bool,
}

impl SimpleApplicationEventMulticaster {
    pub const TYPE_NAME: &'static str = "SimpleApplicationEventMulticaster";
    pub const INTERFACE_NAME: &'static str = "ApplicationEventMulticaster";

    /// 创建同步模式的多播器
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            bean_factory: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
            listener_beans: RwLock::new(Vec::new()),
            retriever_cache: RwLock::new(HashMap::new()),
            error_handler: RwLock::new(None),
            async_mode: false,
        }
    }

    /// 创建异步模式的多播器
    pub fn new_async(types: Arc<TypeRegistry>) -> Self {
        Self {
            async_mode: true,
            ..Self::new(types)
        }
    }

    pub fn type_metadata() -> TypeMetadata {
        TypeMetadata::named::<Self>(Self::TYPE_NAME)
            .implements_as::<dyn ApplicationEventMulticaster>(ResolvableType::class(Self::INTERFACE_NAME), |m| {
                m as Arc<dyn ApplicationEventMulticaster>
            })
            .build()
    }

    /// 用于按名称取得监听器 bean
    pub fn set_bean_factory(&self, factory: &Arc<DefaultListableBeanFactory>) {
        *self.bean_factory.write() = Some(Arc::downgrade(factory));
        self.retriever_cache.write().clear();
    }

    pub fn is_async(&self) -> bool {
        self.async_mode
    }

    /// 设置错误处理器
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&dyn ApplicationListener, &Arc<dyn ApplicationEvent>, &anyhow::Error) + Send + Sync + 'static,
    {
        *self.error_handler.write() = Some(Arc::new(handler));
    }

    /// 移除错误处理器
    pub fn remove_error_handler(&self) {
        *self.error_handler.write() = None;
    }

    /// 监听器是否接收该事件
    fn supports_event(&self, listener: &dyn ApplicationListener, event: &dyn ApplicationEvent) -> bool {
        let event_type = event.event_type();
        let concrete = event.as_any().type_id();
        let payload = event.downcast_ref::<PayloadApplicationEvent>();
        listener.event_types().iter().any(|declared| {
            if matches!(declared, ResolvableType::Unresolved) || declared.raw_name() == Some(APPLICATION_EVENT) {
                return true;
            }
            if declared.type_id() == Some(concrete) {
                return true;
            }
            if declared.is_assignable_from(&event_type, self.types.as_ref() as &dyn TypeIntrospector) {
                return true;
            }
            payload.is_some_and(|payload| {
                declared.type_id() == Some((**payload.payload()).type_id())
                    || declared.is_assignable_from(payload.payload_type(), self.types.as_ref() as &dyn TypeIntrospector)
            })
        })
    }

    fn factory(&self) -> Option<Arc<DefaultListableBeanFactory>> {
        self.bean_factory.read().as_ref().and_then(Weak::upgrade)
    }

    fn listener_bean(
        &self,
        factory: &DefaultListableBeanFactory,
        bean_name: &str,
    ) -> ContainerResult<Option<Arc<dyn ApplicationListener>>> {
        let bean = factory.get_bean(bean_name)?;
        Ok(factory
            .types()
            .describe_instance(&bean)
            .and_then(|m| m.capabilities().application_listener.clone())
            .and_then(|cast| cast(&bean)))
    }

    /// 匹配事件的监听器，按顺序值排序
    fn retrieve_listeners(&self, event: &dyn ApplicationEvent) -> ContainerResult<Vec<Arc<dyn ApplicationListener>>> {
        let key: CacheKey = (event.as_any().type_id(), event.event_type().to_string());
        let cached = self.retriever_cache.read().get(&key).cloned();
        let factory = self.factory();

        let retrieval = match cached {
            Some(retrieval) => retrieval,
            None => {
                let mut retrieval = CachedRetrieval::default();
                for listener in self.listeners.read().iter() {
                    if self.supports_event(listener.as_ref(), event) {
                        retrieval.listeners.push(listener.clone());
                    }
                }
                if let Some(factory) = &factory {
                    let bean_names = self.listener_beans.read().clone();
                    for name in bean_names {
                        match self.listener_bean(factory, &name)? {
                            Some(listener) if self.supports_event(listener.as_ref(), event) => {
                                retrieval.bean_names.push(name);
                            }
                            Some(_) => {}
                            None => tracing::debug!("Bean '{}' is not an ApplicationListener", name),
                        }
                    }
                }
                self.retriever_cache.write().insert(key, retrieval.clone());
                retrieval
            }
        };

        let mut result = retrieval.listeners;
        if let Some(factory) = &factory {
            for name in &retrieval.bean_names {
                if let Some(listener) = self.listener_bean(factory, name)? {
                    let already = result.iter().any(|l| same_listener(l, &listener));
                    if !already {
                        result.push(listener);
                    }
                }
            }
        }
        result.sort_by_key(|listener| listener.order());
        Ok(result)
    }

    /// 调用单个监听器，panic 按错误处理
    fn invoke_listener(
        listener: &Arc<dyn ApplicationListener>,
        event: &Arc<dyn ApplicationEvent>,
        error_handler: Option<&ErrorHandler>,
    ) -> ContainerResult<()> {
        let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_application_event(event)))
            .unwrap_or_else(|panic| Err(anyhow::anyhow!("Listener panicked: {}", panic_message(panic.as_ref()))));
        let Err(err) = outcome else {
            return Ok(());
        };
        match error_handler {
            Some(handler) => {
                handler(listener.as_ref(), event, &err);
                Ok(())
            }
            None => Err(ContainerError::Other(err.context(format!(
                "Listener '{}' failed while handling event '{}'",
                listener.listener_name(),
                event.event_type()
            )))),
        }
    }
}

fn same_listener(a: &Arc<dyn ApplicationListener>, b: &Arc<dyn ApplicationListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl ApplicationEventMulticaster for SimpleApplicationEventMulticaster {
    fn add_application_listener(&self, listener: Arc<dyn ApplicationListener>) {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return;
        }
        tracing::debug!("Added event listener: {}", listener.listener_name());
        listeners.push(listener);
        self.retriever_cache.write().clear();
    }

    fn add_application_listener_bean(&self, bean_name: &str) {
        let mut beans = self.listener_beans.write();
        if !beans.iter().any(|b| b == bean_name) {
            beans.push(bean_name.to_string());
            tracing::debug!("Added event listener bean: {}", bean_name);
        }
        self.retriever_cache.write().clear();
    }

    fn remove_application_listener(&self, listener: &Arc<dyn ApplicationListener>) {
        self.listeners.write().retain(|l| !same_listener(l, listener));
        self.retriever_cache.write().clear();
        tracing::debug!("Removed event listener: {}", listener.listener_name());
    }

    fn remove_application_listener_bean(&self, bean_name: &str) {
        self.listener_beans.write().retain(|b| b != bean_name);
        self.retriever_cache.write().clear();
    }

    fn remove_all_listeners(&self) {
        self.listeners.write().clear();
        self.listener_beans.write().clear();
        self.retriever_cache.write().clear();
        tracing::debug!("Removed all event listeners");
    }

    fn multicast_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()> {
        let listeners = self.retrieve_listeners(event.as_ref())?;
        tracing::debug!(
            "Multicasting event: {} to {} listener(s) (async_mode: {})",
            event.event_type(),
            listeners.len(),
            self.async_mode
        );

        let error_handler = self.error_handler.read().clone();

        if self.async_mode {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                for listener in listeners {
                    let event = event.clone();
                    let error_handler = error_handler.clone();
                    handle.spawn(async move {
                        if let Err(e) = Self::invoke_listener(&listener, &event, error_handler.as_ref()) {
                            tracing::error!("{:#}", e);
                        }
                    });
                }
                return Ok(());
            }
            tracing::warn!("No tokio runtime available, falling back to sync execution");
        }

        for listener in &listeners {
            Self::invoke_listener(listener, &event, error_handler.as_ref())?;
        }
        Ok(())
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().len() + self.listener_beans.read().len()
    }
}
