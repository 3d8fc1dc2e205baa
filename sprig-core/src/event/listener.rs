use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::constants::LOWEST_PRECEDENCE;
use crate::types::ResolvableType;

use super::{ApplicationEvent, PayloadApplicationEvent, APPLICATION_EVENT};

/// 事件监听器 trait
///
/// 默认接收所有事件；声明 [`event_types`](Self::event_types) 以缩小范围。
/// 声明的类型既可以是事件类型，也可以是 [`PayloadApplicationEvent`] 负载的类型。
pub trait ApplicationListener: Send + Sync {
    fn on_application_event(&self, event: &Arc<dyn ApplicationEvent>) -> anyhow::Result<()>;

    fn event_types(&self) -> Vec<ResolvableType> {
        vec![ResolvableType::class(APPLICATION_EVENT)]
    }

    /// 值越小越先收到事件
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    /// 获取监听器名称（用于日志）
    fn listener_name(&self) -> &str {
        "AnonymousListener"
    }
}

/// 错误处理器类型
///
/// 设置后监听器的错误交给它处理，不再传播给发布方。
pub type ErrorHandler = Arc<dyn Fn(&dyn ApplicationListener, &Arc<dyn ApplicationEvent>, &anyhow::Error) + Send + Sync>;

/// 用闭包处理某一具体类型事件的监听器
///
/// `E` 可以是实现了 [`ApplicationEvent`] 的事件类型，也可以是以
/// [`PayloadApplicationEvent`] 发布的任意负载类型。
pub struct TypedApplicationListener<E, F> {
    name: String,
    order: i32,
    handler: F,
    _marker: PhantomData<fn(&E)>,
}

impl<E, F> TypedApplicationListener<E, F>
where
    E: Any + Send + Sync,
    F: Fn(&E) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self {
            name: format!("TypedApplicationListener<{}>", type_name::<E>()),
            order: LOWEST_PRECEDENCE,
            handler,
            _marker: PhantomData,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl<E, F> ApplicationListener for TypedApplicationListener<E, F>
where
    E: Any + Send + Sync,
    F: Fn(&E) -> anyhow::Result<()> + Send + Sync,
{
    fn on_application_event(&self, event: &Arc<dyn ApplicationEvent>) -> anyhow::Result<()> {
        let typed = event.as_any().downcast_ref::<E>().or_else(|| {
            event
                .downcast_ref::<PayloadApplicationEvent>()
                .and_then(|payload| payload.payload_as::<E>())
        });
        match typed {
            Some(typed) => (self.handler)(typed),
            None => Ok(()),
        }
    }

    fn event_types(&self) -> Vec<ResolvableType> {
        vec![ResolvableType::of::<E>()]
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn listener_name(&self) -> &str {
        &self.name
    }
}
