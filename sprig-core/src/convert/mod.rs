//! 类型转换
//!
//! 配置中的文本值在注入前转换为目标类型：先找自定义的 [`PropertyEditor`]，
//! 再交给 [`ConversionService`]。

mod editor;
mod service;
mod type_converter;

pub use editor::{text_editor, PropertyEditor, PropertyEditorRegistrar, PropertyEditorRegistry};
pub use service::{ConversionService, ConverterFn, DefaultConversionService, GenericConversionService};
pub use type_converter::{SimpleTypeConverter, TypeConverter};
