//! 注解模型与合并注解查询
//!
//! 注解以数据形式声明在 [`TypeMetadata`](crate::types::TypeMetadata) 上。
//! 查询时沿类型层级与元注解展开，得到属性已合并的 [`MergedAnnotation`]。

mod merged;
mod model;
mod scanner;
pub mod standard;

pub use merged::{MergedAnnotation, MergedAnnotations, Selector};
pub use model::{AliasFor, Annotation, AttributeMethod, AttributeValue};
pub use scanner::{AnnotatedElement, AnnotationIntrospector, SearchStrategy};
pub use standard::{is_plain_annotation, is_plain_type};
