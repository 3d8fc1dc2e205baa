//! Bean 工厂
//!
//! [`DefaultListableBeanFactory`] 持有 bean 定义与单例缓存，负责实例化、依赖解析、
//! 属性注入、初始化与销毁。能力按接口拆分（[`BeanFactory`]、[`ListableBeanFactory`]、
//! [`AutowireCapableBeanFactory`]、[`ConfigurableListableBeanFactory`]），
//! 具体工厂实现它们的并集。

mod autowired;
mod common;
mod constructor;
mod create;
mod default;
mod delegate;
mod descriptor;
mod disposable;
mod lookup;
mod order;
mod provider;
mod resolve;
mod singleton;
mod traits;

pub use autowired::AutowiredAnnotationBeanPostProcessor;
pub use common::CommonAnnotationBeanPostProcessor;
pub use default::{is_factory_dereference, DefaultListableBeanFactory};
pub use delegate::{invoke_bean_factory_post_processors, register_bean_post_processors};
pub use descriptor::DependencyDescriptor;
pub use order::OrderComparator;
pub use provider::ObjectProvider;
pub use traits::{
    AutowireCapableBeanFactory, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory,
    ConfigurableListableBeanFactory, DependencySupplier, HierarchicalBeanFactory, ListableBeanFactory,
    ListableBeanFactoryExt, StringValueResolver,
};
