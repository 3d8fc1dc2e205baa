//! 类型描述与自省
//!
//! 容器不依赖运行时反射，所有类型信息都来自 [`TypeMetadata`]。

mod metadata;
mod registry;
mod resolvable;

pub use metadata::{
    Capabilities, Caster, ConstructorMetadata, DynCaster, Instantiator, MethodInvoker,
    MethodMetadata, ParameterMetadata, PropertyMetadata, PropertySetter, TypeKind, TypeMetadata,
    TypeMetadataBuilder,
};
pub use registry::{TypeIntrospector, TypeRegistry, TypeSubmission};
pub use resolvable::{
    short_type_name, ResolvableType, MAP_TYPE, OPTION_TYPE, PROVIDER_TYPE, VEC_TYPE,
};
