//! bean 生命周期回调接口
//!
//! 回调都以 `&self` 调用，需要保存状态的实现使用内部可变性
//! （`OnceLock`、`Mutex`、原子类型等）。

use std::sync::Arc;

use crate::bean::BeanDefinitionRegistry;
use crate::constants::LOWEST_PRECEDENCE;
use crate::error::ContainerResult;
use crate::factory::{ConfigurableListableBeanFactory, DefaultListableBeanFactory};

/// 属性注入完成后调用，先于自定义 init 方法
pub trait InitializingBean: Send + Sync {
    fn after_properties_set(&self) -> anyhow::Result<()>;
}

/// 容器销毁单例时调用，先于自定义 destroy 方法
pub trait DisposableBean: Send + Sync {
    fn destroy(&self) -> anyhow::Result<()>;
}

/// 在属性注入之后、初始化回调之前获得自己的 bean 名称
pub trait BeanNameAware: Send + Sync {
    fn set_bean_name(&self, name: &str);
}

/// 获得所在的 bean 工厂
///
/// 需要长期持有时请保存 `Arc::downgrade` 得到的弱引用，避免引用环。
pub trait BeanFactoryAware: Send + Sync {
    fn set_bean_factory(&self, bean_factory: &Arc<DefaultListableBeanFactory>) -> anyhow::Result<()>;
}

/// 所有非延迟单例实例化完成后回调
pub trait SmartInitializingSingleton: Send + Sync {
    fn after_singletons_instantiated(&self) -> anyhow::Result<()>;
}

/// 可启动、停止的组件
///
/// `phase` 越小越早启动、越晚停止。`is_auto_startup` 为真时在上下文刷新完成后自动启动。
pub trait Lifecycle: Send + Sync {
    fn start(&self) -> anyhow::Result<()>;

    fn stop(&self) -> anyhow::Result<()>;

    fn is_running(&self) -> bool;

    fn is_auto_startup(&self) -> bool {
        true
    }

    fn phase(&self) -> i32 {
        0
    }
}

/// 可排序的组件，值越小优先级越高
pub trait Ordered: Send + Sync {
    fn order(&self) -> i32;
}

/// BeanFactoryPostProcessor trait
///
/// 在 bean 定义全部加载之后、任何普通 bean 实例化之前修改定义。
///
/// # 示例
///
/// ```ignore
/// struct LazyEverything;
///
/// impl BeanFactoryPostProcessor for LazyEverything {
///     fn post_process_bean_factory(
///         &self,
///         bean_factory: &dyn ConfigurableListableBeanFactory,
///     ) -> ContainerResult<()> {
///         for name in bean_factory.bean_definition_names() {
///             bean_factory.modify_bean_definition(&name, &mut |def| def.lazy_init = Some(true))?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait BeanFactoryPostProcessor: Send + Sync {
    fn post_process_bean_factory(
        &self,
        bean_factory: &dyn ConfigurableListableBeanFactory,
    ) -> ContainerResult<()>;

    /// 同一批处理器内的顺序
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    /// 注册阶段的后处理器返回自身
    fn as_registry_post_processor(&self) -> Option<&dyn BeanDefinitionRegistryPostProcessor> {
        None
    }
}

/// 可以继续注册 bean 定义的后处理器，先于所有 [`BeanFactoryPostProcessor`] 执行
pub trait BeanDefinitionRegistryPostProcessor: BeanFactoryPostProcessor {
    fn post_process_bean_definition_registry(
        &self,
        registry: &dyn BeanDefinitionRegistry,
    ) -> ContainerResult<()>;
}
