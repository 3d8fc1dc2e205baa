use std::any::{type_name, Any};
use std::sync::Arc;

use crate::annotation::{AnnotationIntrospector, MergedAnnotation};
use crate::bean::{BeanDefinition, BeanDefinitionRegistry};
use crate::bean_post_processor::BeanPostProcessor;
use crate::convert::{ConversionService, PropertyEditor, PropertyEditorRegistrar};
use crate::error::{ContainerError, ContainerResult};
use crate::scope::BeanScope;
use crate::types::{ResolvableType, TypeRegistry};
use crate::value::{Args, BeanObject};

use super::{DefaultListableBeanFactory, DependencyDescriptor, ObjectProvider};

/// 嵌入值解析器，例如解析 `${...}` 占位符
pub type StringValueResolver = Arc<dyn Fn(&str) -> ContainerResult<String> + Send + Sync>;

/// 可自动注入但不注册为 bean 的对象的提供函数
pub type DependencySupplier = Arc<dyn Fn() -> Option<BeanObject> + Send + Sync>;

/// BeanFactory trait - 访问容器的根接口
///
/// 此 trait 不包含泛型方法，因此可以作为 trait object 使用。
/// 泛型便捷方法见 [`BeanFactoryExt`]。
pub trait BeanFactory: Send + Sync {
    /// 按名称或别名获取 bean；`&` 前缀返回 FactoryBean 本身
    fn get_bean(&self, name: &str) -> ContainerResult<BeanObject>;

    /// 以显式参数创建原型 bean
    fn get_bean_with_args(&self, name: &str, args: Args) -> ContainerResult<BeanObject>;

    /// 按名称获取并校验类型；接口类型返回以接口装箱的对象
    fn get_typed_bean(&self, name: &str, required_type: &ResolvableType) -> ContainerResult<BeanObject>;

    /// 按类型获取唯一匹配的 bean
    fn get_bean_of_type(&self, required_type: &ResolvableType) -> ContainerResult<BeanObject>;

    /// 延迟解析的访问器，每次调用时才查找
    fn get_bean_provider(&self, required_type: &ResolvableType) -> ObjectProvider;

    fn contains_bean(&self, name: &str) -> bool;

    fn is_singleton(&self, name: &str) -> ContainerResult<bool>;

    fn is_prototype(&self, name: &str) -> ContainerResult<bool>;

    fn is_type_match(&self, name: &str, type_to_match: &ResolvableType) -> ContainerResult<bool>;

    /// 不创建 bean 的前提下尽量确定其类型
    fn get_type(&self, name: &str) -> ContainerResult<Option<ResolvableType>>;

    fn get_aliases(&self, name: &str) -> Vec<String>;
}

/// BeanFactory 的泛型扩展方法
pub trait BeanFactoryExt: BeanFactory {
    /// 按名称获取具体类型的 bean
    fn get_bean_as<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        let bean = self.get_bean(name)?;
        bean.downcast::<T>().map_err(|_| ContainerError::BeanNotOfRequiredType {
            bean_name: name.to_string(),
            required_type: type_name::<T>().to_string(),
            actual_type: self
                .get_type(name)
                .ok()
                .flatten()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// 按类型获取唯一的 bean
    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        let bean = self.get_bean_of_type(&ResolvableType::of::<T>())?;
        bean.downcast::<T>().map_err(|_| ContainerError::BeanNotOfRequiredType {
            bean_name: String::new(),
            required_type: type_name::<T>().to_string(),
            actual_type: "unknown".to_string(),
        })
    }

    /// 按接口名获取唯一实现，返回 trait 对象
    fn get_interface<I: ?Sized + Send + Sync + 'static>(&self, interface: &str) -> ContainerResult<Arc<I>> {
        let bean = self.get_bean_of_type(&ResolvableType::class(interface))?;
        unbox_interface::<I>(bean, "", interface)
    }

    /// 按名称获取 bean 并适配为接口
    fn get_named_interface<I: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
        interface: &str,
    ) -> ContainerResult<Arc<I>> {
        let bean = self.get_typed_bean(name, &ResolvableType::class(interface))?;
        unbox_interface::<I>(bean, name, interface)
    }
}

impl<F: BeanFactory + ?Sized> BeanFactoryExt for F {}

fn unbox_interface<I: ?Sized + Send + Sync + 'static>(
    bean: BeanObject,
    name: &str,
    interface: &str,
) -> ContainerResult<Arc<I>> {
    bean.downcast::<Arc<I>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| ContainerError::BeanNotOfRequiredType {
            bean_name: name.to_string(),
            required_type: interface.to_string(),
            actual_type: format!("object not adapted to {}", type_name::<I>()),
        })
}

/// 具有父子层级的工厂
pub trait HierarchicalBeanFactory: BeanFactory {
    fn parent_bean_factory(&self) -> Option<Arc<DefaultListableBeanFactory>>;

    /// 只在当前工厂中查找，不询问父工厂
    fn contains_local_bean(&self, name: &str) -> bool;
}

/// 可枚举全部 bean 的工厂
///
/// 定义数量与名称的查询由 [`BeanDefinitionRegistry`] 提供。
pub trait ListableBeanFactory: BeanFactory {
    /// 按类型匹配的 bean 名称，按注册顺序
    ///
    /// `allow_eager_init` 为假时不会为了判断产物类型而创建 FactoryBean。
    fn get_bean_names_for_type(
        &self,
        ty: &ResolvableType,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String>;

    /// 名称与实例，接口类型的实例已适配
    fn get_beans_of_type(&self, ty: &ResolvableType) -> ContainerResult<Vec<(String, BeanObject)>>;

    fn get_bean_names_for_annotation(&self, annotation_type: &str) -> ContainerResult<Vec<String>>;

    /// bean 类型（或其工厂方法）上的合并注解
    fn find_annotation_on_bean(
        &self,
        name: &str,
        annotation_type: &str,
    ) -> ContainerResult<Option<MergedAnnotation>>;
}

/// ListableBeanFactory 的泛型扩展方法
pub trait ListableBeanFactoryExt: ListableBeanFactory {
    fn get_beans_of<T: Any + Send + Sync>(&self) -> ContainerResult<Vec<(String, Arc<T>)>> {
        let beans = self.get_beans_of_type(&ResolvableType::of::<T>())?;
        Ok(beans
            .into_iter()
            .filter_map(|(name, bean)| bean.downcast::<T>().ok().map(|b| (name, b)))
            .collect())
    }

    fn get_interfaces_of<I: ?Sized + Send + Sync + 'static>(
        &self,
        interface: &str,
    ) -> ContainerResult<Vec<(String, Arc<I>)>> {
        let beans = self.get_beans_of_type(&ResolvableType::class(interface))?;
        Ok(beans
            .into_iter()
            .filter_map(|(name, bean)| bean.downcast::<Arc<I>>().ok().map(|b| (name, (*b).clone())))
            .collect())
    }
}

impl<F: ListableBeanFactory + ?Sized> ListableBeanFactoryExt for F {}

/// 为容器之外创建的对象提供装配与生命周期处理
pub trait AutowireCapableBeanFactory: BeanFactory {
    /// 按类型元数据完整创建一个新实例（原型语义，不缓存）
    fn create_bean(&self, class_name: &str) -> ContainerResult<BeanObject>;

    /// 对已有实例执行注解注入
    fn autowire_bean(&self, existing: &BeanObject) -> ContainerResult<()>;

    /// 以同名定义为模板装配并初始化已有实例
    fn configure_bean(&self, existing: BeanObject, bean_name: &str) -> ContainerResult<BeanObject>;

    fn initialize_bean(&self, existing: BeanObject, bean_name: &str) -> ContainerResult<BeanObject>;

    fn apply_bean_post_processors_before_initialization(
        &self,
        existing: BeanObject,
        bean_name: &str,
    ) -> ContainerResult<BeanObject>;

    fn apply_bean_post_processors_after_initialization(
        &self,
        existing: BeanObject,
        bean_name: &str,
    ) -> ContainerResult<BeanObject>;

    /// 执行销毁回调，失败只记录日志
    fn destroy_bean(&self, existing: &BeanObject);

    fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean_name: Option<&str>,
    ) -> ContainerResult<crate::value::Value>;

    /// 按类型解析唯一的 bean 并返回其名称
    fn resolve_named_bean(&self, required_type: &ResolvableType) -> ContainerResult<(String, BeanObject)>;
}

/// 可配置的工厂：后处理器、作用域、类型转换与单例注册
pub trait ConfigurableBeanFactory: HierarchicalBeanFactory {
    /// 父工厂只能设置一次
    fn set_parent_bean_factory(&self, parent: Arc<DefaultListableBeanFactory>) -> ContainerResult<()>;

    fn type_registry(&self) -> &Arc<TypeRegistry>;

    fn annotation_introspector(&self) -> &AnnotationIntrospector;

    /// 同一个处理器重复添加时移到末尾
    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>);

    fn bean_post_processor_count(&self) -> usize;

    fn bean_post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>>;

    fn register_scope(&self, name: &str, scope: Arc<dyn BeanScope>) -> ContainerResult<()>;

    fn registered_scope_names(&self) -> Vec<String>;

    fn registered_scope(&self, name: &str) -> Option<Arc<dyn BeanScope>>;

    fn set_conversion_service(&self, service: Arc<dyn ConversionService>);

    fn conversion_service(&self) -> Option<Arc<dyn ConversionService>>;

    fn add_property_editor_registrar(&self, registrar: Arc<dyn PropertyEditorRegistrar>);

    fn register_custom_editor(&self, ty: &ResolvableType, editor: Arc<dyn PropertyEditor>);

    fn add_embedded_value_resolver(&self, resolver: StringValueResolver);

    fn has_embedded_value_resolver(&self) -> bool;

    /// 依次交给全部嵌入值解析器处理
    fn resolve_embedded_value(&self, value: &str) -> ContainerResult<String>;

    /// 注册一个已经完全初始化的对象，不执行任何回调
    fn register_singleton(&self, name: &str, object: BeanObject) -> ContainerResult<()>;

    fn get_singleton(&self, name: &str) -> Option<BeanObject>;

    fn contains_singleton(&self, name: &str) -> bool;

    /// 按注册顺序
    fn singleton_names(&self) -> Vec<String>;

    fn singleton_count(&self) -> usize;

    /// `dependent` 依赖 `name`，销毁 `name` 前先销毁 `dependent`
    fn register_dependent_bean(&self, name: &str, dependent: &str);

    fn dependent_beans(&self, name: &str) -> Vec<String>;

    fn dependencies_for_bean(&self, name: &str) -> Vec<String>;

    fn is_currently_in_creation(&self, name: &str) -> bool;

    /// 与父定义合并后的定义
    fn get_merged_bean_definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>>;

    fn is_factory_bean(&self, name: &str) -> ContainerResult<bool>;

    fn set_allow_bean_definition_overriding(&self, allow: bool);

    fn is_allow_bean_definition_overriding(&self) -> bool;

    fn set_allow_circular_references(&self, allow: bool);

    fn is_allow_circular_references(&self) -> bool;

    /// 从自定义作用域中移除并销毁
    fn destroy_scoped_bean(&self, name: &str);

    /// 逆序销毁全部单例
    fn destroy_singletons(&self);
}

/// 完整的可配置、可枚举工厂
pub trait ConfigurableListableBeanFactory:
    BeanDefinitionRegistry + ListableBeanFactory + AutowireCapableBeanFactory + ConfigurableBeanFactory
{
    /// 按类型注入时可用、但不是 bean 的对象，例如工厂或上下文本身
    fn register_resolvable_dependency(&self, ty: ResolvableType, value: BeanObject);

    /// 以函数提供的可注入对象，用于只保存弱引用的场景
    fn register_resolvable_supplier(&self, ty: ResolvableType, supplier: DependencySupplier);

    fn is_autowire_candidate(&self, name: &str, descriptor: &DependencyDescriptor) -> ContainerResult<bool>;

    /// 冻结后不再接受定义的注册与修改
    fn freeze_configuration(&self);

    fn is_configuration_frozen(&self) -> bool;

    /// 实例化全部非延迟单例，然后回调 SmartInitializingSingleton
    fn preinstantiate_singletons(&self) -> ContainerResult<()>;

    fn clear_metadata_cache(&self);
}
