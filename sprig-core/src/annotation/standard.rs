//! 容器识别的标准注解
//!
//! `lang.` 前缀的注解属于语言层面的元注解，扫描时会被当作普通注解过滤掉。

use crate::constants::{HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE};
use crate::types::TypeMetadata;

use super::{Annotation, AttributeMethod, AttributeValue};

pub const INHERITED: &str = "lang.Inherited";
pub const DOCUMENTED: &str = "lang.Documented";
pub const AUTOWIRED: &str = "Autowired";
pub const INJECT: &str = "Inject";
pub const QUALIFIER: &str = "Qualifier";
pub const VALUE: &str = "Value";
pub const PRIMARY: &str = "Primary";
pub const LAZY: &str = "Lazy";
pub const ORDER: &str = "Order";
pub const PRIORITY: &str = "Priority";
pub const POST_CONSTRUCT: &str = "PostConstruct";
pub const PRE_DESTROY: &str = "PreDestroy";
pub const RESOURCE: &str = "Resource";
pub const EVENT_LISTENER: &str = "EventListener";
pub const COMPONENT: &str = "Component";

/// 以 `lang.` 开头的注解不参与元注解遍历
pub fn is_plain_annotation(type_name: &str) -> bool {
    type_name.starts_with("lang.")
}

/// 标准库类型不会携带容器注解，扫描时直接跳过
pub fn is_plain_type(type_name: &str) -> bool {
    const PRIMITIVES: &[&str] = &[
        "bool", "char", "str", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32",
        "u64", "u128", "usize", "f32", "f64", "()",
    ];
    type_name.starts_with("std::")
        || type_name.starts_with("core::")
        || type_name.starts_with("alloc::")
        || PRIMITIVES.contains(&type_name)
}

/// 标准注解类型的元数据
pub fn annotation_types() -> Vec<TypeMetadata> {
    vec![
        TypeMetadata::annotation_type(INHERITED).build(),
        TypeMetadata::annotation_type(DOCUMENTED).build(),
        TypeMetadata::annotation_type(AUTOWIRED)
            .attribute(AttributeMethod::new("required").default_value(true))
            .build(),
        TypeMetadata::annotation_type(INJECT).build(),
        TypeMetadata::annotation_type(QUALIFIER)
            .annotated(Annotation::new(INHERITED))
            .attribute(AttributeMethod::new("value").default_value(""))
            .build(),
        TypeMetadata::annotation_type(VALUE)
            .attribute(AttributeMethod::new("value"))
            .build(),
        TypeMetadata::annotation_type(PRIMARY).build(),
        TypeMetadata::annotation_type(LAZY)
            .attribute(AttributeMethod::new("value").default_value(true))
            .build(),
        TypeMetadata::annotation_type(ORDER)
            .attribute(AttributeMethod::new("value").default_value(LOWEST_PRECEDENCE))
            .build(),
        TypeMetadata::annotation_type(PRIORITY)
            .attribute(AttributeMethod::new("value").default_value(HIGHEST_PRECEDENCE))
            .build(),
        TypeMetadata::annotation_type(POST_CONSTRUCT).build(),
        TypeMetadata::annotation_type(PRE_DESTROY).build(),
        TypeMetadata::annotation_type(RESOURCE)
            .attribute(AttributeMethod::new("name").default_value(""))
            .build(),
        TypeMetadata::annotation_type(EVENT_LISTENER)
            .attribute(
                AttributeMethod::new("classes")
                    .default_value(AttributeValue::Array(Vec::new()))
                    .mirror_of("value"),
            )
            .attribute(
                AttributeMethod::new("value")
                    .default_value(AttributeValue::Array(Vec::new()))
                    .mirror_of("classes"),
            )
            .build(),
        TypeMetadata::annotation_type(COMPONENT)
            .attribute(AttributeMethod::new("value").default_value(""))
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_filters() {
        assert!(is_plain_annotation(INHERITED));
        assert!(!is_plain_annotation(QUALIFIER));
        assert!(is_plain_type("alloc::string::String"));
        assert!(is_plain_type("u32"));
        assert!(!is_plain_type("app::UserService"));
    }
}
