use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::annotation::Annotation;
use crate::scope::Scope;
use crate::types::ResolvableType;
use crate::value::{BeanObject, Value};

use super::{ConstructorArgumentValues, MutablePropertyValues, ValueHolder};

/// 直接提供实例的回调，优先于构造器与工厂方法
pub type InstanceSupplier = Arc<dyn Fn() -> anyhow::Result<BeanObject> + Send + Sync>;

/// 自动装配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutowireMode {
    /// 只使用显式配置和注解
    #[default]
    No,
    /// 按属性名匹配 bean 名称
    ByName,
    /// 按属性类型匹配
    ByType,
    /// 自动选择并装配构造器
    Constructor,
}

/// bean 在应用中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Application,
    Support,
    Infrastructure,
}

/// bean 引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanReference {
    pub name: String,
    /// 只在父工厂中查找
    pub to_parent: bool,
}

/// 定义中的属性值或构造参数值，创建 bean 时才解析为 [`Value`]
#[derive(Clone)]
pub enum BeanMetadataValue {
    Null,
    /// 文本，可包含 `${...}` 占位符，按目标类型转换
    Literal(String),
    /// 已经是最终值
    Typed(Value),
    Reference(BeanReference),
    /// 内部 bean，每次解析都按定义创建
    Inner(Box<BeanDefinition>),
    List(Vec<BeanMetadataValue>),
    Map(Vec<(String, BeanMetadataValue)>),
}

impl BeanMetadataValue {
    pub fn reference(name: impl Into<String>) -> Self {
        BeanMetadataValue::Reference(BeanReference {
            name: name.into(),
            to_parent: false,
        })
    }

    pub fn parent_reference(name: impl Into<String>) -> Self {
        BeanMetadataValue::Reference(BeanReference {
            name: name.into(),
            to_parent: true,
        })
    }

    pub fn inner(definition: BeanDefinition) -> Self {
        BeanMetadataValue::Inner(Box::new(definition))
    }

    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        BeanMetadataValue::Typed(Value::object(value))
    }

    /// 对所有文本做替换（占位符解析使用）
    pub fn visit_text<E>(&mut self, f: &mut dyn FnMut(&str) -> Result<String, E>) -> Result<(), E> {
        match self {
            BeanMetadataValue::Literal(text) => {
                *text = f(text)?;
            }
            BeanMetadataValue::Typed(Value::Text(text)) => {
                *text = f(text)?;
            }
            BeanMetadataValue::Reference(reference) => {
                reference.name = f(&reference.name)?;
            }
            BeanMetadataValue::Inner(definition) => definition.visit_text(f)?,
            BeanMetadataValue::List(items) => {
                for item in items {
                    item.visit_text(f)?;
                }
            }
            BeanMetadataValue::Map(entries) => {
                for (key, value) in entries {
                    *key = f(key)?;
                    value.visit_text(f)?;
                }
            }
            BeanMetadataValue::Null | BeanMetadataValue::Typed(_) => {}
        }
        Ok(())
    }
}

impl fmt::Debug for BeanMetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanMetadataValue::Null => write!(f, "null"),
            BeanMetadataValue::Literal(text) => write!(f, "{:?}", text),
            BeanMetadataValue::Typed(value) => write!(f, "{:?}", value),
            BeanMetadataValue::Reference(r) => write!(f, "<{}>", r.name),
            BeanMetadataValue::Inner(def) => write!(f, "inner {}", def.describe_class()),
            BeanMetadataValue::List(items) => f.debug_list().entries(items).finish(),
            BeanMetadataValue::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
        }
    }
}

impl From<&str> for BeanMetadataValue {
    fn from(value: &str) -> Self {
        BeanMetadataValue::Literal(value.to_string())
    }
}

impl From<String> for BeanMetadataValue {
    fn from(value: String) -> Self {
        BeanMetadataValue::Literal(value)
    }
}

impl From<Value> for BeanMetadataValue {
    fn from(value: Value) -> Self {
        BeanMetadataValue::Typed(value)
    }
}

impl From<BeanReference> for BeanMetadataValue {
    fn from(value: BeanReference) -> Self {
        BeanMetadataValue::Reference(value)
    }
}

/// Bean 定义 - 描述如何创建和管理 Bean
///
/// 定义在容器刷新前注册，可由 BeanFactoryPostProcessor 修改；
/// 带 `parent_name` 的子定义在使用前与父定义合并。
#[derive(Clone, Default)]
pub struct BeanDefinition {
    /// 类型名，对应 [`TypeRegistry`](crate::types::TypeRegistry) 中的描述
    pub bean_class_name: Option<String>,
    pub parent_name: Option<String>,
    /// `None` 时沿用父定义，最终默认为单例
    pub scope: Option<Scope>,
    pub is_abstract: bool,
    pub lazy_init: Option<bool>,
    pub autowire_mode: AutowireMode,
    pub depends_on: Vec<String>,
    pub autowire_candidate: bool,
    pub primary: bool,
    pub qualifiers: Vec<Annotation>,
    pub factory_bean_name: Option<String>,
    pub factory_method_name: Option<String>,
    pub constructor_args: ConstructorArgumentValues,
    pub property_values: MutablePropertyValues,
    pub init_method_names: Vec<String>,
    pub destroy_method_names: Vec<String>,
    pub role: Role,
    pub description: Option<String>,
    pub instance_supplier: Option<InstanceSupplier>,
    /// 无法从类型名推断时使用的目标类型
    pub target_type: Option<ResolvableType>,
    /// FactoryBean 产物的类型，用于不实例化时的类型匹配
    pub factory_bean_object_type: Option<ResolvableType>,
    /// 由容器自身生成的定义不经过 BeanPostProcessor 的初始化回调
    pub synthetic: bool,
    pub lenient_constructor_resolution: bool,
}

impl BeanDefinition {
    pub fn new() -> Self {
        Self {
            autowire_candidate: true,
            lenient_constructor_resolution: true,
            ..Default::default()
        }
    }

    /// 以 Rust 类型名作为 bean 类型
    pub fn of<T: Any>() -> Self {
        Self::class(type_name::<T>())
    }

    pub fn class(class_name: impl Into<String>) -> Self {
        let mut definition = Self::new();
        definition.bean_class_name = Some(class_name.into());
        definition
    }

    /// 继承父定义的子定义
    pub fn child(parent_name: impl Into<String>) -> Self {
        let mut definition = Self::new();
        definition.parent_name = Some(parent_name.into());
        definition
    }

    /// 由回调直接提供实例
    pub fn with_supplier<T, F>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let mut definition = Self::of::<T>();
        definition.target_type = Some(ResolvableType::of::<T>());
        definition.instance_supplier = Some(Arc::new(move || f().map(|t| Arc::new(t) as BeanObject)));
        definition
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn prototype(self) -> Self {
        self.with_scope(Scope::Prototype)
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_autowire(mut self, mode: AutowireMode) -> Self {
        self.autowire_mode = mode;
        self
    }

    pub fn with_autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = candidate;
        self
    }

    pub fn with_depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn with_qualifier(mut self, qualifier: Annotation) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// 静态工厂方法（未设置工厂 bean 时）或实例工厂方法
    pub fn with_factory_method(mut self, method: impl Into<String>) -> Self {
        self.factory_method_name = Some(method.into());
        self
    }

    pub fn with_factory_bean(mut self, bean: impl Into<String>, method: impl Into<String>) -> Self {
        self.factory_bean_name = Some(bean.into());
        self.factory_method_name = Some(method.into());
        self
    }

    pub fn with_constructor_arg(mut self, value: impl Into<super::BeanMetadataValue>) -> Self {
        self.constructor_args.add_generic(ValueHolder::new(value));
        self
    }

    pub fn with_indexed_arg(mut self, index: usize, value: impl Into<super::BeanMetadataValue>) -> Self {
        self.constructor_args.add_indexed(index, ValueHolder::new(value));
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<super::BeanMetadataValue>) -> Self {
        self.property_values.add(name, value);
        self
    }

    pub fn with_init_method(mut self, name: impl Into<String>) -> Self {
        self.init_method_names.push(name.into());
        self
    }

    pub fn with_destroy_method(mut self, name: impl Into<String>) -> Self {
        self.destroy_method_names.push(name.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_target_type(mut self, ty: ResolvableType) -> Self {
        self.target_type = Some(ty);
        self
    }

    pub fn with_factory_bean_object_type(mut self, ty: ResolvableType) -> Self {
        self.factory_bean_object_type = Some(ty);
        self
    }

    pub fn with_synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// 生效的作用域，未设置时为单例
    pub fn scope(&self) -> Scope {
        self.scope.clone().unwrap_or_default()
    }

    pub fn is_singleton(&self) -> bool {
        self.scope() == Scope::Singleton
    }

    pub fn is_prototype(&self) -> bool {
        self.scope() == Scope::Prototype
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    pub fn has_constructor_args(&self) -> bool {
        !self.constructor_args.is_empty()
    }

    pub fn has_factory_method(&self) -> bool {
        self.factory_method_name.is_some()
    }

    /// 用于日志与错误信息
    pub fn describe_class(&self) -> &str {
        self.bean_class_name.as_deref().unwrap_or("<unknown>")
    }

    /// 以 `other`（子定义）中设置过的值覆盖当前定义
    pub fn override_from(&mut self, other: &BeanDefinition) {
        if other.bean_class_name.is_some() {
            self.bean_class_name = other.bean_class_name.clone();
        }
        if other.scope.is_some() {
            self.scope = other.scope.clone();
        }
        self.is_abstract = other.is_abstract;
        if other.lazy_init.is_some() {
            self.lazy_init = other.lazy_init;
        }
        if other.factory_bean_name.is_some() {
            self.factory_bean_name = other.factory_bean_name.clone();
        }
        if other.factory_method_name.is_some() {
            self.factory_method_name = other.factory_method_name.clone();
        }
        self.constructor_args.merge(&other.constructor_args);
        self.property_values.merge(&other.property_values);
        self.autowire_mode = other.autowire_mode;
        self.depends_on = other.depends_on.clone();
        self.autowire_candidate = other.autowire_candidate;
        self.primary = other.primary;
        self.qualifiers.extend(other.qualifiers.iter().cloned());
        if other.instance_supplier.is_some() {
            self.instance_supplier = other.instance_supplier.clone();
        }
        if !other.init_method_names.is_empty() {
            self.init_method_names = other.init_method_names.clone();
        }
        if !other.destroy_method_names.is_empty() {
            self.destroy_method_names = other.destroy_method_names.clone();
        }
        if other.target_type.is_some() {
            self.target_type = other.target_type.clone();
        }
        if other.factory_bean_object_type.is_some() {
            self.factory_bean_object_type = other.factory_bean_object_type.clone();
        }
        self.role = other.role;
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        self.synthetic = other.synthetic;
        self.lenient_constructor_resolution = other.lenient_constructor_resolution;
    }

    /// 对定义中所有文本值做替换
    pub fn visit_text<E>(&mut self, f: &mut dyn FnMut(&str) -> Result<String, E>) -> Result<(), E> {
        if let Some(parent) = &self.parent_name {
            self.parent_name = Some(f(parent)?);
        }
        if let Some(class_name) = &self.bean_class_name {
            self.bean_class_name = Some(f(class_name)?);
        }
        if let Some(factory_bean) = &self.factory_bean_name {
            self.factory_bean_name = Some(f(factory_bean)?);
        }
        if let Some(factory_method) = &self.factory_method_name {
            self.factory_method_name = Some(f(factory_method)?);
        }
        for pv in self.property_values.iter_mut() {
            pv.value.visit_text(f)?;
        }
        for holder in self.constructor_args.indexed_mut() {
            holder.value.visit_text(f)?;
        }
        for holder in self.constructor_args.generic_mut() {
            holder.value.visit_text(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("class", &self.bean_class_name)
            .field("parent", &self.parent_name)
            .field("scope", &self.scope())
            .field("abstract", &self.is_abstract)
            .field("lazy_init", &self.lazy_init)
            .field("autowire_mode", &self.autowire_mode)
            .field("depends_on", &self.depends_on)
            .field("primary", &self.primary)
            .field("factory_bean", &self.factory_bean_name)
            .field("factory_method", &self.factory_method_name)
            .field("property_values", &self.property_values.len())
            .field("has_supplier", &self.instance_supplier.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_overrides_parent() {
        let mut merged = BeanDefinition::class("app::Pool")
            .prototype()
            .with_property("size", "5")
            .with_property("name", "base")
            .with_init_method("open");
        let child = BeanDefinition::child("pool")
            .with_property("size", "10")
            .with_lazy(true);

        merged.override_from(&child);

        assert_eq!(merged.bean_class_name.as_deref(), Some("app::Pool"));
        assert!(merged.is_prototype());
        assert!(merged.is_lazy_init());
        assert_eq!(merged.property_values.len(), 2);
        assert!(matches!(
            &merged.property_values.get("size").unwrap().value,
            BeanMetadataValue::Literal(v) if v == "10"
        ));
        assert_eq!(merged.init_method_names, vec!["open".to_string()]);
    }

    #[test]
    fn test_visit_text_reaches_nested_values() {
        let mut definition = BeanDefinition::class("${type}")
            .with_property("url", "${db.url}")
            .with_property(
                "targets",
                BeanMetadataValue::List(vec!["${a}".into(), BeanMetadataValue::reference("${ref}")]),
            );
        definition
            .visit_text::<()>(&mut |s| Ok(s.replace("${", "<").replace('}', ">")))
            .unwrap();
        assert_eq!(definition.bean_class_name.as_deref(), Some("<type>"));
        let BeanMetadataValue::List(items) = &definition.property_values.get("targets").unwrap().value else {
            panic!("expected list");
        };
        assert!(matches!(&items[1], BeanMetadataValue::Reference(r) if r.name == "<ref>"));
    }

    #[test]
    fn test_defaults() {
        let definition = BeanDefinition::new();
        assert!(definition.is_singleton());
        assert!(definition.autowire_candidate);
        assert!(!definition.is_lazy_init());
    }
}
