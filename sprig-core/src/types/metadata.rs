use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::anyhow;

use crate::annotation::{Annotation, AttributeMethod};
use crate::bean::FactoryBean;
use crate::bean_post_processor::BeanPostProcessor;
use crate::context::{
    ApplicationContextAware, ApplicationEventPublisherAware, EnvironmentAware, MessageSource,
};
use crate::convert::ConversionService;
use crate::event::ApplicationListener;
use crate::lifecycle::{
    BeanDefinitionRegistryPostProcessor, BeanFactoryAware, BeanFactoryPostProcessor,
    BeanNameAware, DisposableBean, InitializingBean, Lifecycle, Ordered,
    SmartInitializingSingleton,
};
use crate::value::{Args, BeanObject, Value};

use super::ResolvableType;

/// 把对象转换为某个 trait 对象；对象类型不符时返回 `None`
pub type Caster<I> = Arc<dyn Fn(&BeanObject) -> Option<Arc<I>> + Send + Sync>;
/// 把对象适配为以接口形式装箱的对象
pub type DynCaster = Arc<dyn Fn(&BeanObject) -> Option<BeanObject> + Send + Sync>;
pub type Instantiator = Arc<dyn Fn(&Args) -> anyhow::Result<BeanObject> + Send + Sync>;
pub type MethodInvoker = Arc<dyn Fn(Option<&BeanObject>, &Args) -> anyhow::Result<Value> + Send + Sync>;
pub type PropertySetter = Arc<dyn Fn(&BeanObject, Value) -> anyhow::Result<()> + Send + Sync>;

fn cast_to<T, I>(convert: fn(Arc<T>) -> Arc<I>) -> Caster<I>
where
    T: Any + Send + Sync,
    I: ?Sized + 'static,
{
    Arc::new(move |obj: &BeanObject| obj.clone().downcast::<T>().ok().map(convert))
}

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Abstract,
    Interface,
    Annotation,
}

/// 构造器参数或方法参数
#[derive(Debug, Clone)]
pub struct ParameterMetadata {
    pub name: Option<String>,
    pub ty: ResolvableType,
    pub annotations: Vec<Annotation>,
}

impl ParameterMetadata {
    pub fn new(name: impl Into<String>, ty: ResolvableType) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            annotations: Vec::new(),
        }
    }

    pub fn unnamed(ty: ResolvableType) -> Self {
        Self {
            name: None,
            ty,
            annotations: Vec::new(),
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// 构造器
#[derive(Clone)]
pub struct ConstructorMetadata {
    pub params: Vec<ParameterMetadata>,
    pub annotations: Vec<Annotation>,
    instantiate: Instantiator,
}

impl ConstructorMetadata {
    pub fn new<T, F>(params: Vec<ParameterMetadata>, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Args) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            params,
            annotations: Vec::new(),
            instantiate: Arc::new(move |args: &Args| {
                f(args).map(|instance| Arc::new(instance) as BeanObject)
            }),
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn instantiate(&self, args: &Args) -> anyhow::Result<BeanObject> {
        (self.instantiate)(args)
    }

    pub fn signature(&self, owner: &str) -> String {
        format!("{}({})", owner, describe_params(&self.params))
    }
}

impl fmt::Debug for ConstructorMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorMetadata")
            .field("params", &self.params)
            .field("annotations", &self.annotations)
            .finish()
    }
}

fn describe_params(params: &[ParameterMetadata]) -> String {
    params
        .iter()
        .map(|p| match &p.name {
            Some(name) => format!("{}: {}", name, p.ty),
            None => p.ty.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// 方法：生命周期回调、事件监听方法、工厂方法
#[derive(Clone)]
pub struct MethodMetadata {
    pub name: String,
    pub params: Vec<ParameterMetadata>,
    pub return_type: Option<ResolvableType>,
    pub annotations: Vec<Annotation>,
    pub is_static: bool,
    invoker: Option<MethodInvoker>,
}

impl MethodMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: None,
            annotations: Vec::new(),
            is_static: false,
            invoker: None,
        }
    }

    pub fn param(mut self, param: ParameterMetadata) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: ResolvableType) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// 实例方法
    pub fn invoke<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &Args) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.is_static = false;
        self.invoker = Some(Arc::new(move |target: Option<&BeanObject>, args: &Args| {
            let target = target.ok_or_else(|| anyhow!("method '{}' requires a target instance", name))?;
            let bean = target
                .clone()
                .downcast::<T>()
                .map_err(|_| anyhow!("target of '{}' is not an instance of {}", name, type_name::<T>()))?;
            f(&bean, args)
        }));
        self
    }

    /// 无参数、无返回值的实例方法
    pub fn action<T, F>(self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.invoke::<T, _>(move |bean, _| f(bean).map(|_| Value::Null))
    }

    /// 静态工厂方法
    pub fn factory<R, F>(mut self, f: F) -> Self
    where
        R: Any + Send + Sync,
        F: Fn(&Args) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.is_static = true;
        if self.return_type.is_none() {
            self.return_type = Some(ResolvableType::of::<R>());
        }
        self.invoker = Some(Arc::new(move |_: Option<&BeanObject>, args: &Args| {
            f(args).map(Value::object)
        }));
        self
    }

    /// 由工厂 bean 实例调用的工厂方法
    pub fn instance_factory<T, R, F>(self, f: F) -> Self
    where
        T: Any + Send + Sync,
        R: Any + Send + Sync,
        F: Fn(&T, &Args) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let mut method = self.invoke::<T, _>(move |bean, args| f(bean, args).map(Value::object));
        if method.return_type.is_none() {
            method.return_type = Some(ResolvableType::of::<R>());
        }
        method
    }

    pub fn is_invocable(&self) -> bool {
        self.invoker.is_some()
    }

    pub fn call(&self, target: Option<&BeanObject>, args: &Args) -> anyhow::Result<Value> {
        let invoker = self
            .invoker
            .as_ref()
            .ok_or_else(|| anyhow!("method '{}' is not invocable", self.name))?;
        invoker(target, args)
    }

    pub fn param_types(&self) -> Vec<ResolvableType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    /// 名称与参数类型都相同即视为同一方法（覆盖关系）
    pub fn has_signature(&self, name: &str, params: &[ResolvableType]) -> bool {
        self.name == name
            && self.params.len() == params.len()
            && self.params.iter().zip(params).all(|(p, ty)| &p.ty == ty)
    }

    pub fn signature(&self) -> String {
        format!("{}({})", self.name, describe_params(&self.params))
    }
}

impl fmt::Debug for MethodMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMetadata")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .field("annotations", &self.annotations)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// 可写属性（setter 或字段注入点）
#[derive(Clone)]
pub struct PropertyMetadata {
    pub name: String,
    pub ty: ResolvableType,
    pub annotations: Vec<Annotation>,
    setter: Option<PropertySetter>,
}

impl PropertyMetadata {
    pub fn new(name: impl Into<String>, ty: ResolvableType) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Vec::new(),
            setter: None,
        }
    }

    pub fn setter<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.setter = Some(Arc::new(move |target: &BeanObject, value: Value| {
            let bean = target
                .clone()
                .downcast::<T>()
                .map_err(|_| anyhow!("cannot set '{}' on an object that is not {}", name, type_name::<T>()))?;
            f(&bean, value)
        }));
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// 简单类型（字符串、数字等标准库类型）不参与按类型/按名称的自动装配
    pub fn is_simple(&self) -> bool {
        match &self.ty {
            ResolvableType::Class { name, .. } => crate::annotation::is_plain_type(name),
            ResolvableType::Array(component) => matches!(
                component.as_ref(),
                ResolvableType::Class { name, .. } if crate::annotation::is_plain_type(name)
            ),
            _ => false,
        }
    }

    pub fn set(&self, target: &BeanObject, value: Value) -> anyhow::Result<()> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| anyhow!("property '{}' is not writable", self.name))?;
        setter(target, value)
    }
}

impl fmt::Debug for PropertyMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("annotations", &self.annotations)
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

/// 类型实现的容器回调接口
///
/// 每一项都是把实例转换为对应 trait 对象的函数，由
/// [`TypeMetadataBuilder`] 在编译期根据 trait 约束生成。
#[derive(Clone, Default)]
pub struct Capabilities {
    pub initializing_bean: Option<Caster<dyn InitializingBean>>,
    pub disposable_bean: Option<Caster<dyn DisposableBean>>,
    pub bean_name_aware: Option<Caster<dyn BeanNameAware>>,
    pub bean_factory_aware: Option<Caster<dyn BeanFactoryAware>>,
    pub environment_aware: Option<Caster<dyn EnvironmentAware>>,
    pub application_context_aware: Option<Caster<dyn ApplicationContextAware>>,
    pub event_publisher_aware: Option<Caster<dyn ApplicationEventPublisherAware>>,
    pub factory_bean: Option<Caster<dyn FactoryBean>>,
    pub smart_initializing_singleton: Option<Caster<dyn SmartInitializingSingleton>>,
    pub lifecycle: Option<Caster<dyn Lifecycle>>,
    pub ordered: Option<Caster<dyn Ordered>>,
    pub priority_ordered: bool,
    pub application_listener: Option<Caster<dyn ApplicationListener>>,
    pub bean_post_processor: Option<Caster<dyn BeanPostProcessor>>,
    pub bean_factory_post_processor: Option<Caster<dyn BeanFactoryPostProcessor>>,
    pub registry_post_processor: bool,
    pub message_source: Option<Caster<dyn MessageSource>>,
    pub conversion_service: Option<Caster<dyn ConversionService>>,
    casts: HashMap<String, DynCaster>,
}

impl Capabilities {
    /// 把实例适配为某个接口；没有声明该接口时返回 `None`
    pub fn cast(&self, interface: &str, bean: &BeanObject) -> Option<BeanObject> {
        self.casts.get(interface).and_then(|cast| cast(bean))
    }

    pub fn has_cast(&self, interface: &str) -> bool {
        self.casts.contains_key(interface)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut present = Vec::new();
        let flags = [
            ("InitializingBean", self.initializing_bean.is_some()),
            ("DisposableBean", self.disposable_bean.is_some()),
            ("BeanNameAware", self.bean_name_aware.is_some()),
            ("BeanFactoryAware", self.bean_factory_aware.is_some()),
            ("EnvironmentAware", self.environment_aware.is_some()),
            ("ApplicationContextAware", self.application_context_aware.is_some()),
            ("ApplicationEventPublisherAware", self.event_publisher_aware.is_some()),
            ("FactoryBean", self.factory_bean.is_some()),
            ("SmartInitializingSingleton", self.smart_initializing_singleton.is_some()),
            ("Lifecycle", self.lifecycle.is_some()),
            ("Ordered", self.ordered.is_some()),
            ("PriorityOrdered", self.priority_ordered),
            ("ApplicationListener", self.application_listener.is_some()),
            ("BeanPostProcessor", self.bean_post_processor.is_some()),
            ("BeanFactoryPostProcessor", self.bean_factory_post_processor.is_some()),
            ("MessageSource", self.message_source.is_some()),
            ("ConversionService", self.conversion_service.is_some()),
        ];
        for (name, on) in flags {
            if on {
                present.push(name.to_string());
            }
        }
        present.extend(self.casts.keys().cloned());
        f.debug_list().entries(present).finish()
    }
}

/// 类型元数据：容器对一个类型所知的一切
///
/// 容器不做运行时反射，类型通过 [`TypeMetadata::of`] 等构建器描述自身：
/// 继承关系、注解、构造器、属性、方法以及实现的回调接口。
#[derive(Debug, Clone)]
pub struct TypeMetadata {
    name: String,
    kind: TypeKind,
    type_id: Option<std::any::TypeId>,
    type_params: Vec<String>,
    super_type: Option<ResolvableType>,
    interfaces: Vec<ResolvableType>,
    enclosing: Option<String>,
    annotations: Vec<Annotation>,
    attributes: Vec<AttributeMethod>,
    constructors: Vec<ConstructorMetadata>,
    properties: Vec<PropertyMetadata>,
    methods: Vec<MethodMetadata>,
    capabilities: Capabilities,
}

impl TypeMetadata {
    /// 描述 Rust 类型 `T`，类型名取 `std::any::type_name`
    pub fn of<T: Any + Send + Sync>() -> TypeMetadataBuilder<T> {
        let mut builder = TypeMetadataBuilder::new(type_name::<T>(), TypeKind::Class);
        builder.metadata.type_id = Some(std::any::TypeId::of::<T>());
        builder
    }

    /// 以自定义名称描述 Rust 类型 `T`
    pub fn named<T: Any + Send + Sync>(name: impl Into<String>) -> TypeMetadataBuilder<T> {
        let mut builder = TypeMetadataBuilder::new(name, TypeKind::Class);
        builder.metadata.type_id = Some(std::any::TypeId::of::<T>());
        builder
    }

    pub fn interface(name: impl Into<String>) -> TypeMetadataBuilder<()> {
        TypeMetadataBuilder::new(name, TypeKind::Interface)
    }

    pub fn abstract_type(name: impl Into<String>) -> TypeMetadataBuilder<()> {
        TypeMetadataBuilder::new(name, TypeKind::Abstract)
    }

    pub fn annotation_type(name: impl Into<String>) -> TypeMetadataBuilder<()> {
        TypeMetadataBuilder::new(name, TypeKind::Annotation)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// 以 Rust 类型描述时对应的 `TypeId`
    pub fn type_id(&self) -> Option<std::any::TypeId> {
        self.type_id
    }

    pub fn is_instantiable(&self) -> bool {
        self.kind == TypeKind::Class
    }

    pub fn is_annotation(&self) -> bool {
        self.kind == TypeKind::Annotation
    }

    pub fn type_params(&self) -> &[String] {
        &self.type_params
    }

    pub fn super_type(&self) -> Option<&ResolvableType> {
        self.super_type.as_ref()
    }

    pub fn interfaces(&self) -> &[ResolvableType] {
        &self.interfaces
    }

    /// 父类在前，接口按声明顺序在后
    pub fn super_types(&self) -> impl Iterator<Item = &ResolvableType> {
        self.super_type.iter().chain(self.interfaces.iter())
    }

    pub fn enclosing(&self) -> Option<&str> {
        self.enclosing.as_deref()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn attributes(&self) -> &[AttributeMethod] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeMethod> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn constructors(&self) -> &[ConstructorMetadata] {
        &self.constructors
    }

    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn methods(&self) -> &[MethodMetadata] {
        &self.methods
    }

    /// 按名称查找无参方法
    pub fn no_arg_method(&self, name: &str) -> Option<&MethodMetadata> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.params.is_empty() && !m.is_static)
    }

    pub fn find_method(&self, name: &str, params: &[ResolvableType]) -> Option<&MethodMetadata> {
        self.methods.iter().find(|m| m.has_signature(name, params))
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// 该类型作为 bean 类型时的描述，类型参数保留为变量
    pub fn as_type(&self) -> ResolvableType {
        ResolvableType::Class {
            name: self.name.clone(),
            generics: self
                .type_params
                .iter()
                .map(|p| ResolvableType::variable(p.clone()))
                .collect(),
            type_id: self.type_id,
        }
    }

    /// 实例是否就是该类型（仅对 Rust 类型可判断）
    pub fn is_instance(&self, bean: &BeanObject) -> bool {
        self.type_id == Some((**bean).type_id())
    }
}

/// [`TypeMetadata`] 构建器
pub struct TypeMetadataBuilder<T> {
    metadata: TypeMetadata,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypeMetadataBuilder<T> {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            metadata: TypeMetadata {
                name: name.into(),
                kind,
                type_id: None,
                type_params: Vec::new(),
                super_type: None,
                interfaces: Vec::new(),
                enclosing: None,
                annotations: Vec::new(),
                attributes: Vec::new(),
                constructors: Vec::new(),
                properties: Vec::new(),
                methods: Vec::new(),
                capabilities: Capabilities::default(),
            },
            _marker: PhantomData,
        }
    }

    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.metadata.kind = kind;
        self
    }

    pub fn type_params(mut self, params: &[&str]) -> Self {
        self.metadata.type_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn extends(mut self, parent: ResolvableType) -> Self {
        self.metadata.super_type = Some(parent);
        self
    }

    pub fn implements(mut self, interface: ResolvableType) -> Self {
        self.metadata.interfaces.push(interface);
        self
    }

    pub fn enclosed_in(mut self, name: impl Into<String>) -> Self {
        self.metadata.enclosing = Some(name.into());
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.metadata.annotations.push(annotation);
        self
    }

    pub fn attribute(mut self, attribute: AttributeMethod) -> Self {
        self.metadata.attributes.push(attribute);
        self
    }

    pub fn method(mut self, method: MethodMetadata) -> Self {
        self.metadata.methods.push(method);
        self
    }

    pub fn property(mut self, property: PropertyMetadata) -> Self {
        self.metadata.properties.push(property);
        self
    }

    /// 标记为 PriorityOrdered 处理器，在普通处理器之前实例化
    pub fn priority_ordered(mut self) -> Self {
        self.metadata.capabilities.priority_ordered = true;
        self
    }

    pub fn build(self) -> TypeMetadata {
        self.metadata
    }
}

impl<T: Any + Send + Sync> TypeMetadataBuilder<T> {
    pub fn constructor<F>(mut self, params: Vec<ParameterMetadata>, f: F) -> Self
    where
        F: Fn(&Args) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.metadata.constructors.push(ConstructorMetadata::new(params, f));
        self
    }

    pub fn constructor_with(mut self, constructor: ConstructorMetadata) -> Self {
        self.metadata.constructors.push(constructor);
        self
    }

    /// 无参构造器
    pub fn default_constructor<F>(self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.constructor(Vec::new(), move |_| f())
    }

    /// 声明实现了接口 `interface`，并提供到该接口 trait 对象的转换
    pub fn implements_as<I>(mut self, interface: ResolvableType, convert: fn(Arc<T>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        if let Some(raw) = interface.raw_name() {
            let cast: DynCaster = Arc::new(move |obj: &BeanObject| {
                obj.clone()
                    .downcast::<T>()
                    .ok()
                    .map(|t| Arc::new(convert(t)) as BeanObject)
            });
            self.metadata.capabilities.casts.insert(raw.to_string(), cast);
        }
        self.metadata.interfaces.push(interface);
        self
    }

    pub fn initializing_bean(mut self) -> Self
    where
        T: InitializingBean,
    {
        self.metadata.capabilities.initializing_bean =
            Some(cast_to::<T, dyn InitializingBean>(|t| t));
        self
    }

    pub fn disposable_bean(mut self) -> Self
    where
        T: DisposableBean,
    {
        self.metadata.capabilities.disposable_bean = Some(cast_to::<T, dyn DisposableBean>(|t| t));
        self
    }

    pub fn bean_name_aware(mut self) -> Self
    where
        T: BeanNameAware,
    {
        self.metadata.capabilities.bean_name_aware = Some(cast_to::<T, dyn BeanNameAware>(|t| t));
        self
    }

    pub fn bean_factory_aware(mut self) -> Self
    where
        T: BeanFactoryAware,
    {
        self.metadata.capabilities.bean_factory_aware =
            Some(cast_to::<T, dyn BeanFactoryAware>(|t| t));
        self
    }

    pub fn environment_aware(mut self) -> Self
    where
        T: EnvironmentAware,
    {
        self.metadata.capabilities.environment_aware =
            Some(cast_to::<T, dyn EnvironmentAware>(|t| t));
        self
    }

    pub fn application_context_aware(mut self) -> Self
    where
        T: ApplicationContextAware,
    {
        self.metadata.capabilities.application_context_aware =
            Some(cast_to::<T, dyn ApplicationContextAware>(|t| t));
        self
    }

    pub fn event_publisher_aware(mut self) -> Self
    where
        T: ApplicationEventPublisherAware,
    {
        self.metadata.capabilities.event_publisher_aware =
            Some(cast_to::<T, dyn ApplicationEventPublisherAware>(|t| t));
        self
    }

    pub fn factory_bean(mut self) -> Self
    where
        T: FactoryBean,
    {
        self.metadata.capabilities.factory_bean = Some(cast_to::<T, dyn FactoryBean>(|t| t));
        self
    }

    pub fn smart_initializing_singleton(mut self) -> Self
    where
        T: SmartInitializingSingleton,
    {
        self.metadata.capabilities.smart_initializing_singleton =
            Some(cast_to::<T, dyn SmartInitializingSingleton>(|t| t));
        self
    }

    pub fn lifecycle(mut self) -> Self
    where
        T: Lifecycle,
    {
        self.metadata.capabilities.lifecycle = Some(cast_to::<T, dyn Lifecycle>(|t| t));
        self
    }

    pub fn ordered(mut self) -> Self
    where
        T: Ordered,
    {
        self.metadata.capabilities.ordered = Some(cast_to::<T, dyn Ordered>(|t| t));
        self
    }

    pub fn application_listener(mut self) -> Self
    where
        T: ApplicationListener,
    {
        self.metadata.capabilities.application_listener =
            Some(cast_to::<T, dyn ApplicationListener>(|t| t));
        self
    }

    pub fn bean_post_processor(mut self) -> Self
    where
        T: BeanPostProcessor,
    {
        self.metadata.capabilities.bean_post_processor =
            Some(cast_to::<T, dyn BeanPostProcessor>(|t| t));
        self
    }

    pub fn bean_factory_post_processor(mut self) -> Self
    where
        T: BeanFactoryPostProcessor,
    {
        self.metadata.capabilities.bean_factory_post_processor =
            Some(cast_to::<T, dyn BeanFactoryPostProcessor>(|t| t));
        self
    }

    /// 注册阶段的后处理器，先于普通 BeanFactoryPostProcessor 执行
    pub fn registry_post_processor(mut self) -> Self
    where
        T: BeanDefinitionRegistryPostProcessor,
    {
        self.metadata.capabilities.bean_factory_post_processor =
            Some(cast_to::<T, dyn BeanFactoryPostProcessor>(|t| t));
        self.metadata.capabilities.registry_post_processor = true;
        self
    }

    pub fn message_source(mut self) -> Self
    where
        T: MessageSource,
    {
        self.metadata.capabilities.message_source = Some(cast_to::<T, dyn MessageSource>(|t| t));
        self
    }

    pub fn conversion_service(mut self) -> Self
    where
        T: ConversionService,
    {
        self.metadata.capabilities.conversion_service =
            Some(cast_to::<T, dyn ConversionService>(|t| t));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Service {
        ready: AtomicBool,
    }

    impl InitializingBean for Service {
        fn after_properties_set(&self) -> anyhow::Result<()> {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn describe() -> TypeMetadata {
        TypeMetadata::named::<Service>("Service")
            .default_constructor(|| {
                Ok(Service {
                    ready: AtomicBool::new(false),
                })
            })
            .method(MethodMetadata::new("reset").action::<Service, _>(|s| {
                s.ready.store(false, Ordering::SeqCst);
                Ok(())
            }))
            .initializing_bean()
            .build()
    }

    #[test]
    fn test_instantiate_and_capability_cast() {
        let metadata = describe();
        let bean = metadata.constructors()[0].instantiate(&Args::empty()).unwrap();
        assert!(metadata.is_instance(&bean));

        let init = metadata.capabilities().initializing_bean.as_ref().unwrap();
        init(&bean).unwrap().after_properties_set().unwrap();
        assert!(bean.downcast_ref::<Service>().unwrap().ready.load(Ordering::SeqCst));

        metadata.no_arg_method("reset").unwrap().call(Some(&bean), &Args::empty()).unwrap();
        assert!(!bean.downcast_ref::<Service>().unwrap().ready.load(Ordering::SeqCst));
    }

    #[test]
    fn test_invoking_on_wrong_target_fails() {
        let metadata = describe();
        let other: BeanObject = Arc::new(5u8);
        let err = metadata.no_arg_method("reset").unwrap().call(Some(&other), &Args::empty());
        assert!(err.is_err());
    }
}
