use std::any::{type_name, Any};
use std::sync::{Arc, Weak};

use crate::error::{ContainerError, ContainerResult};
use crate::types::ResolvableType;
use crate::value::{BeanObject, Value};

use super::{AutowireCapableBeanFactory, DefaultListableBeanFactory, DependencyDescriptor};

/// 延迟解析的依赖
///
/// 注入时只保存描述，每次调用才向工厂查找；适合可选依赖、原型依赖
/// 以及需要打破构造期循环的场景。
#[derive(Clone)]
pub struct ObjectProvider {
    factory: Weak<DefaultListableBeanFactory>,
    descriptor: Arc<DependencyDescriptor>,
    requesting_bean: Option<String>,
}

impl ObjectProvider {
    pub(crate) fn new(
        factory: Weak<DefaultListableBeanFactory>,
        descriptor: DependencyDescriptor,
        requesting_bean: Option<&str>,
    ) -> Self {
        Self {
            factory,
            descriptor: Arc::new(descriptor),
            requesting_bean: requesting_bean.map(str::to_string),
        }
    }

    pub fn dependency_type(&self) -> &ResolvableType {
        self.descriptor.dependency_type()
    }

    fn factory(&self) -> ContainerResult<Arc<DefaultListableBeanFactory>> {
        self.factory.upgrade().ok_or_else(|| {
            ContainerError::IllegalState("Bean factory behind this provider has been dropped".to_string())
        })
    }

    fn resolve(&self, descriptor: &DependencyDescriptor) -> ContainerResult<Value> {
        self.factory()?
            .resolve_dependency(descriptor, self.requesting_bean.as_deref())
    }

    /// 唯一匹配的实例，找不到或不唯一时报错
    pub fn get_object(&self) -> ContainerResult<BeanObject> {
        let descriptor = (*self.descriptor).clone().with_required(true);
        match self.resolve(&descriptor)? {
            Value::Object(bean) => Ok(bean),
            other => Err(ContainerError::NoSuchBeanOfType {
                required_type: self.dependency_type().to_string(),
                message: format!("provider resolved to {}", other.describe()),
            }),
        }
    }

    /// 没有匹配时返回 `None`，多个匹配仍然报错
    pub fn get_if_available(&self) -> ContainerResult<Option<BeanObject>> {
        let descriptor = (*self.descriptor).clone().with_required(false);
        match self.resolve(&descriptor) {
            Ok(Value::Object(bean)) => Ok(Some(bean)),
            Ok(_) => Ok(None),
            Err(e) if e.is_currently_in_creation() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 没有匹配或匹配不唯一时都返回 `None`
    pub fn get_if_unique(&self) -> ContainerResult<Option<BeanObject>> {
        match self.get_if_available() {
            Err(e) if e.is_no_unique_bean() => Ok(None),
            other => other,
        }
    }

    /// 全部匹配的实例，按排序规则排列
    pub fn ordered_stream(&self) -> ContainerResult<Vec<BeanObject>> {
        let descriptor = self
            .descriptor
            .nested(ResolvableType::vec_of(self.dependency_type().clone()), false);
        match self.resolve(&descriptor)? {
            Value::List(items) => Ok(items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(bean) => Some(bean),
                    _ => None,
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    pub fn get<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        let bean = self.get_object()?;
        bean.downcast::<T>().map_err(|_| mismatch::<T>(self))
    }

    pub fn get_dyn<I: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Arc<I>> {
        let bean = self.get_object()?;
        bean.downcast::<Arc<I>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| mismatch::<Arc<I>>(self))
    }

    pub fn if_available<T: Any + Send + Sync>(&self) -> ContainerResult<Option<Arc<T>>> {
        match self.get_if_available()? {
            Some(bean) => bean.downcast::<T>().map(Some).map_err(|_| mismatch::<T>(self)),
            None => Ok(None),
        }
    }
}

fn mismatch<T>(provider: &ObjectProvider) -> ContainerError {
    ContainerError::BeanNotOfRequiredType {
        bean_name: provider.descriptor.injection_point().to_string(),
        required_type: type_name::<T>().to_string(),
        actual_type: provider.dependency_type().to_string(),
    }
}
