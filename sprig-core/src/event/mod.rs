//! 事件系统
//!
//! 事件通过 [`ApplicationEventMulticaster`] 分发给匹配的 [`ApplicationListener`]。
//! 监听器按声明的事件类型匹配，类型之间的继承关系来自类型注册表；
//! 不实现 [`ApplicationEvent`] 的对象以 [`PayloadApplicationEvent`] 包装后发布。

mod events;
mod listener;
mod method;
mod multicaster;

use std::any::Any;
use std::sync::Arc;

pub use events::{
    ApplicationEvent, ContextClosedEvent, ContextRefreshedEvent, ContextStartedEvent,
    ContextStoppedEvent, PayloadApplicationEvent,
};
pub use listener::{ApplicationListener, ErrorHandler, TypedApplicationListener};
pub use method::{ApplicationListenerMethodAdapter, EventListenerMethodProcessor};
pub use multicaster::{ApplicationEventMulticaster, SimpleApplicationEventMulticaster};

use crate::error::ContainerResult;
use crate::types::{ResolvableType, TypeMetadata};
use crate::value::BeanObject;

pub const APPLICATION_EVENT: &str = "ApplicationEvent";
pub const APPLICATION_CONTEXT_EVENT: &str = "ApplicationContextEvent";
pub const CONTEXT_REFRESHED_EVENT: &str = "ContextRefreshedEvent";
pub const CONTEXT_STARTED_EVENT: &str = "ContextStartedEvent";
pub const CONTEXT_STOPPED_EVENT: &str = "ContextStoppedEvent";
pub const CONTEXT_CLOSED_EVENT: &str = "ContextClosedEvent";
pub const PAYLOAD_APPLICATION_EVENT: &str = "PayloadApplicationEvent";

/// 事件发布者
pub trait ApplicationEventPublisher: Send + Sync {
    fn publish_event(&self, event: Arc<dyn ApplicationEvent>) -> ContainerResult<()>;

    /// 发布任意对象，以 [`PayloadApplicationEvent`] 包装
    fn publish_object(&self, payload: BeanObject, payload_type: ResolvableType) -> ContainerResult<()> {
        self.publish_event(Arc::new(PayloadApplicationEvent::from_object("", payload, payload_type)))
    }

    fn publish<T: Any + Send + Sync>(&self, payload: T) -> ContainerResult<()>
    where
        Self: Sized,
    {
        self.publish_object(Arc::new(payload), ResolvableType::of::<T>())
    }
}

/// 容器事件的类型层级
pub fn standard_event_types() -> Vec<TypeMetadata> {
    let context_event = || ResolvableType::class(APPLICATION_CONTEXT_EVENT);
    vec![
        TypeMetadata::abstract_type(APPLICATION_EVENT).build(),
        TypeMetadata::abstract_type(APPLICATION_CONTEXT_EVENT)
            .extends(ResolvableType::class(APPLICATION_EVENT))
            .build(),
        TypeMetadata::named::<ContextRefreshedEvent>(CONTEXT_REFRESHED_EVENT)
            .extends(context_event())
            .build(),
        TypeMetadata::named::<ContextStartedEvent>(CONTEXT_STARTED_EVENT)
            .extends(context_event())
            .build(),
        TypeMetadata::named::<ContextStoppedEvent>(CONTEXT_STOPPED_EVENT)
            .extends(context_event())
            .build(),
        TypeMetadata::named::<ContextClosedEvent>(CONTEXT_CLOSED_EVENT)
            .extends(context_event())
            .build(),
        TypeMetadata::named::<PayloadApplicationEvent>(PAYLOAD_APPLICATION_EVENT)
            .type_params(&["T"])
            .extends(ResolvableType::class(APPLICATION_EVENT))
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;

    #[test]
    fn test_context_events_are_application_events() {
        let registry = TypeRegistry::new();
        let base = ResolvableType::class(APPLICATION_EVENT);
        for name in [CONTEXT_REFRESHED_EVENT, CONTEXT_CLOSED_EVENT, PAYLOAD_APPLICATION_EVENT] {
            assert!(base.is_assignable_from(&ResolvableType::class(name), &registry), "{}", name);
        }
        assert!(!ResolvableType::class(APPLICATION_CONTEXT_EVENT)
            .is_assignable_from(&ResolvableType::class(PAYLOAD_APPLICATION_EVENT), &registry));
    }
}
