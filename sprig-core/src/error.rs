//! 容器统一错误类型
//!
//! 用户回调（构造器、setter、init/destroy 方法、监听器）返回 `anyhow::Result`，
//! 容器自身的失败统一使用 [`ContainerError`]。创建失败会沿依赖链层层包装，
//! 可以通过 [`ContainerError::causes`] 逐级查看。

use thiserror::Error;

/// 容器操作的结果类型
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("No bean named '{name}' available")]
    NoSuchBeanDefinition { name: String },

    #[error("No qualifying bean of type '{required_type}' available: {message}")]
    NoSuchBeanOfType {
        required_type: String,
        message: String,
    },

    #[error("No qualifying bean of type '{required_type}' available: {message}")]
    NoUniqueBeanDefinition {
        required_type: String,
        candidates: Vec<String>,
        message: String,
    },

    #[error("Error creating bean with name '{bean_name}': {message}")]
    BeanCurrentlyInCreation { bean_name: String, message: String },

    #[error("Error creating bean with name '{bean_name}': {message}")]
    BeanCreation {
        bean_name: String,
        message: String,
        #[source]
        source: Option<Box<ContainerError>>,
    },

    #[error("Error creating bean with name '{bean_name}': Unsatisfied dependency expressed through {injection_point}: {source}")]
    UnsatisfiedDependency {
        bean_name: String,
        injection_point: String,
        #[source]
        source: Box<ContainerError>,
    },

    #[error("Failed to instantiate [{class_name}]: {message}")]
    BeanInstantiation {
        class_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid bean definition with name '{bean_name}': {message}")]
    BeanDefinitionStore { bean_name: String, message: String },

    #[error("Invalid bean definition with name '{bean_name}': {message}")]
    BeanDefinitionOverride { bean_name: String, message: String },

    #[error("Error creating bean with name '{bean_name}': Bean definition is abstract")]
    BeanIsAbstract { bean_name: String },

    #[error("Bean named '{bean_name}' is expected to be of type '{required_type}' but was actually of type '{actual_type}'")]
    BeanNotOfRequiredType {
        bean_name: String,
        required_type: String,
        actual_type: String,
    },

    #[error("Bean named '{bean_name}' is expected to be a FactoryBean")]
    BeanIsNotAFactory { bean_name: String },

    #[error("Cannot find class [{class_name}] for bean with name '{bean_name}'")]
    CannotLoadBeanClass {
        bean_name: String,
        class_name: String,
    },

    #[error("Invalid property '{property}' of bean class [{class_name}]: Bean property '{property}' is not writable or has an invalid setter method")]
    NotWritableProperty {
        property: String,
        class_name: String,
    },

    #[error("Failed to convert {} of type '{value}' to required type '{required_type}'{}", property_label(.property), detail(.message))]
    TypeMismatch {
        property: Option<String>,
        value: String,
        required_type: String,
        message: String,
    },

    #[error("No converter found capable of converting from type '{source_type}' to type '{target_type}'")]
    ConversionNotSupported {
        source_type: String,
        target_type: String,
    },

    #[error("Cannot register alias '{alias}' for name '{name}': Circular reference - '{name}' is a direct or indirect alias for '{alias}' already")]
    CircularAlias { alias: String, name: String },

    #[error("Could not resolve placeholder '{placeholder}' in value \"{value}\"")]
    UnresolvablePlaceholder { placeholder: String, value: String },

    #[error("Circular placeholder reference '{placeholder}' in property definitions")]
    CircularPlaceholder { placeholder: String },

    #[error("The following properties were declared as required but could not be resolved: {0:?}")]
    MissingRequiredProperties(Vec<String>),

    #[error("No message found under code '{code}' for locale '{locale}'")]
    NoSuchMessage { code: String, locale: String },

    #[error("Failed to load property source '{source_name}': {message}")]
    ConfigurationLoad {
        source_name: String,
        message: String,
    },

    #[error("Annotation configuration error: {0}")]
    AnnotationConfiguration(String),

    #[error("{0}")]
    IllegalState(String),

    #[error("{0}")]
    IllegalArgument(String),

    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn property_label(property: &Option<String>) -> String {
    match property {
        Some(name) => format!("property '{}'", name),
        None => "value".to_string(),
    }
}

fn detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!("; {}", message)
    }
}

impl ContainerError {
    pub fn bean_creation(bean_name: impl Into<String>, message: impl Into<String>) -> Self {
        ContainerError::BeanCreation {
            bean_name: bean_name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// 用创建失败包装下层错误；已是同名 bean 的创建错误时原样返回
    pub fn wrap_creation(bean_name: &str, message: impl Into<String>, cause: ContainerError) -> Self {
        let same_bean = matches!(
            &cause,
            ContainerError::BeanCreation { bean_name: n, .. }
            | ContainerError::BeanCurrentlyInCreation { bean_name: n, .. }
            | ContainerError::UnsatisfiedDependency { bean_name: n, .. } if n == bean_name
        );
        if same_bean {
            return cause;
        }
        ContainerError::BeanCreation {
            bean_name: bean_name.to_string(),
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    pub fn currently_in_creation(bean_name: impl Into<String>) -> Self {
        ContainerError::BeanCurrentlyInCreation {
            bean_name: bean_name.into(),
            message: "Requested bean is currently in creation: Is there an unresolvable circular reference?"
                .to_string(),
        }
    }

    pub fn no_unique(required_type: impl Into<String>, candidates: Vec<String>) -> Self {
        let message = format!(
            "expected single matching bean but found {}: {}",
            candidates.len(),
            candidates.join(",")
        );
        ContainerError::NoUniqueBeanDefinition {
            required_type: required_type.into(),
            candidates,
            message,
        }
    }

    pub fn type_mismatch(
        property: Option<&str>,
        value: impl Into<String>,
        required_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ContainerError::TypeMismatch {
            property: property.map(str::to_string),
            value: value.into(),
            required_type: required_type.into(),
            message: message.into(),
        }
    }

    /// 直接包装的下一层容器错误
    pub fn cause(&self) -> Option<&ContainerError> {
        match self {
            ContainerError::BeanCreation { source, .. } => source.as_deref(),
            ContainerError::UnsatisfiedDependency { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// 从自身开始遍历整条错误链
    pub fn causes(&self) -> impl Iterator<Item = &ContainerError> {
        std::iter::successors(Some(self), |e| e.cause())
    }

    pub fn root_cause(&self) -> &ContainerError {
        self.causes().last().unwrap_or(self)
    }

    /// 错误链中是否出现了“正在创建中”（无法解决的循环引用）
    pub fn is_currently_in_creation(&self) -> bool {
        self.causes()
            .any(|e| matches!(e, ContainerError::BeanCurrentlyInCreation { .. }))
    }

    pub fn is_no_such_bean(&self) -> bool {
        self.causes().any(|e| {
            matches!(
                e,
                ContainerError::NoSuchBeanDefinition { .. } | ContainerError::NoSuchBeanOfType { .. }
            )
        })
    }

    pub fn is_no_unique_bean(&self) -> bool {
        self.causes()
            .any(|e| matches!(e, ContainerError::NoUniqueBeanDefinition { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_creation_keeps_same_bean_error() {
        let inner = ContainerError::bean_creation("a", "boom");
        let wrapped = ContainerError::wrap_creation("a", "outer", inner);
        assert!(matches!(wrapped, ContainerError::BeanCreation { ref message, .. } if message == "boom"));
    }

    #[test]
    fn test_cause_chain() {
        let root = ContainerError::currently_in_creation("a");
        let dep = ContainerError::UnsatisfiedDependency {
            bean_name: "b".into(),
            injection_point: "constructor parameter 0".into(),
            source: Box::new(root),
        };
        let top = ContainerError::wrap_creation("a", "Unexpected failure", dep);
        assert_eq!(top.causes().count(), 3);
        assert!(top.is_currently_in_creation());
        assert!(matches!(top.root_cause(), ContainerError::BeanCurrentlyInCreation { .. }));
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = ContainerError::type_mismatch(Some("port"), "abc", "u16", "invalid digit");
        assert_eq!(
            err.to_string(),
            "Failed to convert property 'port' of type 'abc' to required type 'u16'; invalid digit"
        );
    }
}
