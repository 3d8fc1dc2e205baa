//! Bean 定义模型
//!
//! [`BeanDefinition`] 是创建 bean 的配方：类型、作用域、依赖、构造参数、属性值以及
//! 生命周期方法。定义通过 [`BeanDefinitionRegistry`] 注册，使用前与父定义合并。

mod alias;
mod definition;
mod factory_bean;
mod property_values;
mod registry;

pub use alias::{AliasRegistry, SimpleAliasRegistry};
pub use definition::{
    AutowireMode, BeanDefinition, BeanMetadataValue, BeanReference, InstanceSupplier, Role,
};
pub use factory_bean::FactoryBean;
pub use property_values::{ConstructorArgumentValues, MutablePropertyValues, PropertyValue, ValueHolder};
pub use registry::{generate_bean_name, register_with_aliases, BeanDefinitionRegistry};
