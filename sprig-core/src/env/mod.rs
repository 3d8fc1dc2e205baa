//! 环境与配置
//!
//! [`Environment`] 组合了按优先级排列的配置源链、`${...}` 占位符解析与 profile。
//! 配置值可以来自内存、TOML 文件、启动参数（`-Dkey=value`）和环境变量。

mod configurer;
mod environment;
mod placeholder;
mod profiles;
mod property_source;
mod resolver;
mod sources;

pub use configurer::PropertySourcesPlaceholderConfigurer;
pub use environment::Environment;
pub use placeholder::PlaceholderHelper;
pub use profiles::{ProfileExpression, Profiles};
pub use property_source::{
    ConfigValue, MapPropertySource, PropertySource, SystemEnvironmentPropertySource,
    SystemPropertiesPropertySource, TomlPropertySource,
};
pub use resolver::{PropertyResolver, PropertySourcesPropertyResolver};
pub use sources::MutablePropertySources;
