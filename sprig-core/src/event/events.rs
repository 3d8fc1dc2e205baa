use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::types::ResolvableType;
use crate::value::BeanObject;

use super::{
    CONTEXT_CLOSED_EVENT, CONTEXT_REFRESHED_EVENT, CONTEXT_STARTED_EVENT, CONTEXT_STOPPED_EVENT,
    PAYLOAD_APPLICATION_EVENT,
};

/// 应用事件 trait - 所有事件都必须实现此 trait
///
/// `event_type` 用于匹配监听器：监听器声明的类型可以赋值自事件类型时才会收到事件。
/// 事件类型之间的继承关系来自类型注册表。
pub trait ApplicationEvent: Any + Send + Sync {
    fn event_type(&self) -> ResolvableType;

    fn timestamp(&self) -> SystemTime;

    /// 事件源的描述，例如发布事件的上下文 id
    fn source(&self) -> &str {
        ""
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn ApplicationEvent {
    pub fn downcast_ref<E: ApplicationEvent>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    pub fn is<E: ApplicationEvent>(&self) -> bool {
        self.as_any().is::<E>()
    }
}

impl fmt::Debug for dyn ApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationEvent")
            .field("type", &self.event_type().to_string())
            .field("source", &self.source())
            .finish()
    }
}

macro_rules! context_event {
    ($(#[$doc:meta])* $name:ident, $type_name:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            /// 发布事件的上下文 id
            pub context_id: String,
            pub timestamp: SystemTime,
        }

        impl $name {
            pub fn new(context_id: impl Into<String>) -> Self {
                Self {
                    context_id: context_id.into(),
                    timestamp: SystemTime::now(),
                }
            }
        }

        impl ApplicationEvent for $name {
            fn event_type(&self) -> ResolvableType {
                ResolvableType::class($type_name)
            }

            fn timestamp(&self) -> SystemTime {
                self.timestamp
            }

            fn source(&self) -> &str {
                &self.context_id
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

context_event!(
    /// 上下文刷新完成，所有非延迟单例已经就绪
    ContextRefreshedEvent,
    CONTEXT_REFRESHED_EVENT
);

context_event!(
    /// 上下文显式启动
    ContextStartedEvent,
    CONTEXT_STARTED_EVENT
);

context_event!(
    /// 上下文显式停止
    ContextStoppedEvent,
    CONTEXT_STOPPED_EVENT
);

context_event!(
    /// 上下文开始关闭，此时单例尚未销毁
    ContextClosedEvent,
    CONTEXT_CLOSED_EVENT
);

/// 包装任意对象的事件
///
/// 发布不实现 [`ApplicationEvent`] 的对象时使用；监听器声明负载的类型即可收到。
#[derive(Clone)]
pub struct PayloadApplicationEvent {
    payload: BeanObject,
    payload_type: ResolvableType,
    source: String,
    timestamp: SystemTime,
}

impl PayloadApplicationEvent {
    pub fn new<T: Any + Send + Sync>(source: impl Into<String>, payload: T) -> Self {
        Self::from_object(source, Arc::new(payload), ResolvableType::of::<T>())
    }

    /// 负载已经是容器对象时使用，需要给出它的类型
    pub fn from_object(source: impl Into<String>, payload: BeanObject, payload_type: ResolvableType) -> Self {
        Self {
            payload,
            payload_type,
            source: source.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn payload(&self) -> &BeanObject {
        &self.payload
    }

    pub fn payload_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn payload_type(&self) -> &ResolvableType {
        &self.payload_type
    }
}

impl fmt::Debug for PayloadApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("payload_type", &self.payload_type.to_string())
            .field("source", &self.source)
            .finish()
    }
}

impl ApplicationEvent for PayloadApplicationEvent {
    fn event_type(&self) -> ResolvableType {
        ResolvableType::with_generics(PAYLOAD_APPLICATION_EVENT, vec![self.payload_type.clone()])
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
