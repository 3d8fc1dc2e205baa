// sprig-core: IoC 容器核心
//
// 提供：
// - bean 定义模型、别名与父子定义合并
// - 依赖注入引擎（构造函数、setter、字段与方法注入，循环引用的提前暴露）
// - 带 `${...}` 占位符与 profile 的环境配置
// - 事件、消息与生命周期管理的应用上下文

pub mod annotation;
pub mod bean;
pub mod bean_post_processor;
pub mod constants;
pub mod context;
pub mod convert;
pub mod env;
pub mod error;
pub mod event;
pub mod factory;
pub mod lifecycle;
pub mod logging;
pub mod scope;
pub mod types;
pub mod utils;
pub mod value;

// 重新导出常用类型
pub use bean::{AliasRegistry, BeanDefinition, BeanDefinitionRegistry, BeanMetadataValue, FactoryBean};
pub use bean_post_processor::BeanPostProcessor;
pub use context::{
    ApplicationContext, ApplicationContextBuilder, ConfigurableApplicationContext,
    GenericApplicationContext, MessageSource, ShutdownHook,
};
pub use env::{ConfigValue, Environment, MapPropertySource, PropertySource, TomlPropertySource};
pub use error::{ContainerError, ContainerResult};
pub use event::{
    ApplicationEvent, ApplicationEventMulticaster, ApplicationEventPublisher, ApplicationListener,
    SimpleApplicationEventMulticaster, TypedApplicationListener,
};
pub use factory::{
    AutowireCapableBeanFactory, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory,
    ConfigurableListableBeanFactory, DefaultListableBeanFactory, HierarchicalBeanFactory,
    ListableBeanFactory, ListableBeanFactoryExt, ObjectProvider,
};
pub use lifecycle::{BeanFactoryPostProcessor, Lifecycle, SmartInitializingSingleton};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use scope::Scope;
pub use types::{ResolvableType, TypeMetadata, TypeRegistry};
pub use value::{Args, BeanObject, Value};

// 导出 inventory，供 register_type! 宏使用
pub use inventory;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::annotation::{standard, Annotation};
    pub use crate::bean::{AliasRegistry, BeanDefinition, BeanDefinitionRegistry, BeanMetadataValue, FactoryBean};
    pub use crate::bean_post_processor::BeanPostProcessor;
    pub use crate::context::{
        ApplicationContext, ApplicationContextAware, ApplicationContextBuilder, ConfigurableApplicationContext,
        EnvironmentAware, GenericApplicationContext, MessageSource,
    };
    pub use crate::env::{Environment, MapPropertySource, PropertyResolver, PropertySource, TomlPropertySource};
    pub use crate::error::{ContainerError, ContainerResult};
    pub use crate::event::{ApplicationEvent, ApplicationEventPublisher, ApplicationListener, TypedApplicationListener};
    pub use crate::factory::{
        AutowireCapableBeanFactory, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory,
        ConfigurableListableBeanFactory, DefaultListableBeanFactory, HierarchicalBeanFactory,
        ListableBeanFactory, ListableBeanFactoryExt,
    };
    pub use crate::lifecycle::{
        BeanFactoryPostProcessor, DisposableBean, InitializingBean, Lifecycle, SmartInitializingSingleton,
    };
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::scope::Scope;
    pub use crate::types::{MethodMetadata, ParameterMetadata, PropertyMetadata, ResolvableType, TypeMetadata, TypeRegistry};
    pub use crate::value::{Args, BeanObject, Value};
    pub use crate::{register_type, utils};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
