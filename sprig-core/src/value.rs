//! 容器内部流转的值
//!
//! bean 实例统一以 [`BeanObject`] 表示；注入点、构造参数与属性值使用 [`Value`]。
//! 接口形式的 bean 以 `Arc<Arc<dyn Trait>>` 的方式装箱，可通过
//! [`Value::downcast_dyn`] 取出。

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::error::{ContainerError, ContainerResult};
use crate::factory::ObjectProvider;

/// 容器管理的对象
pub type BeanObject = Arc<dyn Any + Send + Sync>;

/// 注入与转换使用的值
#[derive(Clone)]
pub enum Value {
    Null,
    Text(String),
    Object(BeanObject),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    Provider(ObjectProvider),
}

impl Value {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    /// 以接口形式装箱
    pub fn dyn_object<I: ?Sized + Send + Sync + 'static>(value: Arc<I>) -> Self {
        Value::Object(Arc::new(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Object(o) => o.downcast_ref::<String>().map(String::as_str),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BeanObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// 取出具体类型的实例
    pub fn downcast<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        match self {
            Value::Object(o) => o
                .clone()
                .downcast::<T>()
                .map_err(|_| self.mismatch::<T>("object is of a different type")),
            Value::Text(s) => {
                let boxed: BeanObject = Arc::new(s.clone());
                boxed
                    .downcast::<T>()
                    .map_err(|_| self.mismatch::<T>("no conversion was applied to the text value"))
            }
            Value::Null => Err(self.mismatch::<T>("value is null")),
            _ => Err(self.mismatch::<T>("")),
        }
    }

    /// 取出以接口形式装箱的实例
    pub fn downcast_dyn<I: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Arc<I>> {
        match self {
            Value::Object(o) => o
                .clone()
                .downcast::<Arc<I>>()
                .map(|boxed| (*boxed).clone())
                .map_err(|_| self.mismatch::<Arc<I>>("object was not adapted to the interface")),
            _ => Err(self.mismatch::<Arc<I>>("")),
        }
    }

    /// 克隆出具体值，适用于转换后的简单类型
    pub fn get<T: Any + Send + Sync + Clone>(&self) -> ContainerResult<T> {
        self.downcast::<T>().map(|v| (*v).clone())
    }

    pub fn optional<T: Any + Send + Sync>(&self) -> ContainerResult<Option<Arc<T>>> {
        match self {
            Value::Null => Ok(None),
            other => other.downcast::<T>().map(Some),
        }
    }

    pub fn list<T: Any + Send + Sync>(&self) -> ContainerResult<Vec<Arc<T>>> {
        match self {
            Value::List(items) => items.iter().map(Value::downcast::<T>).collect(),
            Value::Null => Ok(Vec::new()),
            _ => Err(self.mismatch::<Vec<Arc<T>>>("value is not a list")),
        }
    }

    pub fn dyn_list<I: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Vec<Arc<I>>> {
        match self {
            Value::List(items) => items.iter().map(Value::downcast_dyn::<I>).collect(),
            Value::Null => Ok(Vec::new()),
            _ => Err(self.mismatch::<Vec<Arc<I>>>("value is not a list")),
        }
    }

    pub fn map<T: Any + Send + Sync>(&self) -> ContainerResult<Vec<(String, Arc<T>)>> {
        match self {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| v.downcast::<T>().map(|t| (k.clone(), t)))
                .collect(),
            Value::Null => Ok(Vec::new()),
            _ => Err(self.mismatch::<Vec<(String, Arc<T>)>>("value is not a map")),
        }
    }

    pub fn provider(&self) -> ContainerResult<ObjectProvider> {
        match self {
            Value::Provider(p) => Ok(p.clone()),
            _ => Err(self.mismatch::<ObjectProvider>("value is not a provider")),
        }
    }

    /// 用于错误消息的简短描述
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Text(s) => s.clone(),
            Value::Object(_) => "object".to_string(),
            Value::List(items) => format!("list of {}", items.len()),
            Value::Map(entries) => format!("map of {}", entries.len()),
            Value::Provider(p) => format!("provider of {}", p.dependency_type()),
        }
    }

    fn mismatch<T>(&self, message: &str) -> ContainerError {
        ContainerError::type_mismatch(None, self.describe(), type_name::<T>(), message)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Value::Object(_) => write!(f, "Object(..)"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Value::Provider(p) => write!(f, "Provider({})", p.dependency_type()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<BeanObject> for Value {
    fn from(value: BeanObject) -> Self {
        Value::Object(value)
    }
}

/// 构造器与方法的实参
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> ContainerResult<&Value> {
        self.values.get(index).ok_or_else(|| {
            ContainerError::IllegalArgument(format!(
                "argument index {} out of range ({} arguments)",
                index,
                self.values.len()
            ))
        })
    }

    pub fn bean<T: Any + Send + Sync>(&self, index: usize) -> ContainerResult<Arc<T>> {
        self.get(index)?.downcast::<T>()
    }

    pub fn dyn_bean<I: ?Sized + Send + Sync + 'static>(&self, index: usize) -> ContainerResult<Arc<I>> {
        self.get(index)?.downcast_dyn::<I>()
    }

    pub fn value<T: Any + Send + Sync + Clone>(&self, index: usize) -> ContainerResult<T> {
        self.get(index)?.get::<T>()
    }

    pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> ContainerResult<Option<Arc<T>>> {
        self.get(index)?.optional::<T>()
    }

    pub fn list<T: Any + Send + Sync>(&self, index: usize) -> ContainerResult<Vec<Arc<T>>> {
        self.get(index)?.list::<T>()
    }

    pub fn dyn_list<I: ?Sized + Send + Sync + 'static>(&self, index: usize) -> ContainerResult<Vec<Arc<I>>> {
        self.get(index)?.dyn_list::<I>()
    }

    pub fn map<T: Any + Send + Sync>(&self, index: usize) -> ContainerResult<Vec<(String, Arc<T>)>> {
        self.get(index)?.map::<T>()
    }

    pub fn provider(&self, index: usize) -> ContainerResult<ObjectProvider> {
        self.get(index)?.provider()
    }

    pub fn text(&self, index: usize) -> ContainerResult<String> {
        let value = self.get(index)?;
        value
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| value.mismatch::<String>("value is not text"))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_downcast_concrete_and_text() {
        let v = Value::object(42u32);
        assert_eq!(*v.downcast::<u32>().unwrap(), 42);
        assert!(v.downcast::<String>().is_err());

        let t = Value::text("abc");
        assert_eq!(t.get::<String>().unwrap(), "abc");
    }

    #[test]
    fn test_downcast_interface() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let v = Value::dyn_object(greeter);
        assert_eq!(v.downcast_dyn::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn test_args_accessors() {
        let args = Args::new(vec![
            Value::object(1i64),
            Value::List(vec![Value::object(1u8), Value::object(2u8)]),
            Value::Null,
        ]);
        assert_eq!(args.value::<i64>(0).unwrap(), 1);
        assert_eq!(args.list::<u8>(1).unwrap().len(), 2);
        assert!(args.optional::<u8>(2).unwrap().is_none());
        assert!(args.get(3).is_err());
    }
}
