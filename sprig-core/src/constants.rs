//! 容器使用的常量
//!
//! 内置 bean 的名称、属性键与排序边界，集中定义以免各处硬编码。

/// 排序值最小者优先
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 以此前缀请求 bean 时返回 FactoryBean 本身而非其产物
pub const FACTORY_BEAN_PREFIX: &str = "&";

/// 销毁方法名设为此值时，自动探测 `close` / `shutdown`
pub const INFER_METHOD: &str = "(inferred)";

/// 内部 bean 生成名称的前缀
pub const INNER_BEAN_PREFIX: &str = "(inner bean)";

/// 生成名称时同名 bean 的序号分隔符
pub const GENERATED_BEAN_NAME_SEPARATOR: &str = "#";

// 内置 bean 名称
pub const ENVIRONMENT_BEAN_NAME: &str = "environment";
pub const SYSTEM_PROPERTIES_BEAN_NAME: &str = "systemProperties";
pub const SYSTEM_ENVIRONMENT_BEAN_NAME: &str = "systemEnvironment";
pub const MESSAGE_SOURCE_BEAN_NAME: &str = "messageSource";
pub const APPLICATION_EVENT_MULTICASTER_BEAN_NAME: &str = "applicationEventMulticaster";
pub const LIFECYCLE_PROCESSOR_BEAN_NAME: &str = "lifecycleProcessor";
pub const CONVERSION_SERVICE_BEAN_NAME: &str = "conversionService";

pub const AUTOWIRED_ANNOTATION_PROCESSOR_BEAN_NAME: &str = "sprig.internalAutowiredAnnotationProcessor";
pub const COMMON_ANNOTATION_PROCESSOR_BEAN_NAME: &str = "sprig.internalCommonAnnotationProcessor";
pub const EVENT_LISTENER_PROCESSOR_BEAN_NAME: &str = "sprig.internalEventListenerProcessor";
pub const PLACEHOLDER_CONFIGURER_BEAN_NAME: &str = "sprig.internalPlaceholderConfigurer";

// 属性源名称
pub const SYSTEM_PROPERTIES_SOURCE_NAME: &str = "systemProperties";
pub const SYSTEM_ENVIRONMENT_SOURCE_NAME: &str = "systemEnvironment";

// profile 相关属性
pub const ACTIVE_PROFILES_PROPERTY: &str = "sprig.profiles.active";
pub const DEFAULT_PROFILES_PROPERTY: &str = "sprig.profiles.default";
pub const RESERVED_DEFAULT_PROFILE: &str = "default";

// 占位符语法
pub const PLACEHOLDER_PREFIX: &str = "${";
pub const PLACEHOLDER_SUFFIX: &str = "}";
pub const VALUE_SEPARATOR: &str = ":";
pub const ESCAPE_CHARACTER: char = '\\';
