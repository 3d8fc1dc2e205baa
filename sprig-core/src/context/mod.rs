//! 应用上下文
//!
//! [`GenericApplicationContext`] 在 bean 工厂之上加入环境、消息、事件与生命周期管理。
//! 刷新只能进行一次：依次调用工厂后处理器、注册 bean 后处理器、初始化消息源与事件多播器、
//! 实例化全部非延迟单例，最后启动生命周期组件并发布 [`ContextRefreshedEvent`](crate::event::ContextRefreshedEvent)。
//! 任何一步失败都会销毁已创建的单例，上下文回到非活动状态。

mod generic;
mod lifecycle;
mod message;
mod support;

use std::sync::Arc;
use std::time::SystemTime;

pub use generic::{ApplicationContextBuilder, GenericApplicationContext, ShutdownHook};
pub use lifecycle::{DefaultLifecycleProcessor, LifecycleProcessor};
pub use message::{MessageSource, StaticMessageSource};
pub use support::{ApplicationContextAwareProcessor, ApplicationListenerDetector};

use crate::env::Environment;
use crate::error::ContainerResult;
use crate::event::{ApplicationEventPublisher, ApplicationListener};
use crate::factory::{AutowireCapableBeanFactory, DefaultListableBeanFactory, HierarchicalBeanFactory, ListableBeanFactory};
use crate::lifecycle::BeanFactoryPostProcessor;

/// 按类型注入上下文时使用的接口名
pub const APPLICATION_CONTEXT_INTERFACE: &str = "ApplicationContext";
pub const EVENT_PUBLISHER_INTERFACE: &str = "ApplicationEventPublisher";

pub trait EnvironmentAware: Send + Sync {
    fn set_environment(&self, environment: &Arc<Environment>);
}

pub trait ApplicationEventPublisherAware: Send + Sync {
    fn set_application_event_publisher(&self, publisher: Arc<dyn ApplicationEventPublisher>);
}

/// 需要访问所在上下文的 bean
///
/// 持有的上下文引用在关闭上下文、销毁单例后释放。
pub trait ApplicationContextAware: Send + Sync {
    fn set_application_context(&self, context: Arc<dyn ApplicationContext>) -> anyhow::Result<()>;
}

/// 只读的应用上下文视图
pub trait ApplicationContext:
    ListableBeanFactory + HierarchicalBeanFactory + MessageSource + ApplicationEventPublisher
{
    fn id(&self) -> String;

    fn application_name(&self) -> String {
        String::new()
    }

    fn display_name(&self) -> String;

    /// 首次刷新的时间
    fn startup_date(&self) -> Option<SystemTime>;

    fn parent(&self) -> Option<Arc<dyn ApplicationContext>>;

    fn environment(&self) -> &Arc<Environment>;

    /// 只在上下文活动期间（刷新成功且未关闭）可用
    fn autowire_capable_bean_factory(&self) -> ContainerResult<Arc<dyn AutowireCapableBeanFactory>>;
}

/// 可刷新、启动、关闭的上下文
pub trait ConfigurableApplicationContext: ApplicationContext {
    fn bean_factory(&self) -> &Arc<DefaultListableBeanFactory>;

    /// 刷新时先于容器中定义的处理器执行
    fn add_bean_factory_post_processor(&self, processor: Arc<dyn BeanFactoryPostProcessor>);

    fn add_application_listener(&self, listener: Arc<dyn ApplicationListener>);

    fn refresh(&self) -> ContainerResult<()>;

    fn start(&self) -> ContainerResult<()>;

    fn stop(&self) -> ContainerResult<()>;

    fn is_running(&self) -> bool;

    /// 重复调用没有效果
    fn close(&self);

    fn is_active(&self) -> bool;
}
