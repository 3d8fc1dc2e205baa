use std::collections::HashMap;
use std::fmt;
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::error::ContainerResult;
use crate::value::BeanObject;

/// Bean 的作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// 单例模式 - 容器中只有一个实例
    #[default]
    Singleton,

    /// 原型模式 - 每次请求都创建新实例
    Prototype,

    /// 通过 [`BeanScope`] 注册的自定义作用域
    Custom(String),
}

impl Scope {
    pub const SINGLETON: &'static str = "singleton";
    pub const PROTOTYPE: &'static str = "prototype";

    /// 空字符串视为单例
    pub fn from_name(name: &str) -> Self {
        match name {
            "" | Self::SINGLETON => Scope::Singleton,
            Self::PROTOTYPE => Scope::Prototype,
            other => Scope::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Scope::Singleton => Self::SINGLETON,
            Scope::Prototype => Self::PROTOTYPE,
            Scope::Custom(name) => name,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 自定义作用域
///
/// `get` 在作用域内没有实例时调用 `object_factory` 创建；创建期间不得持有作用域内部的锁，
/// 因为创建过程可能递归地请求同一作用域中的其他 bean。
pub trait BeanScope: Send + Sync {
    fn get(
        &self,
        name: &str,
        object_factory: &mut dyn FnMut() -> ContainerResult<BeanObject>,
    ) -> ContainerResult<BeanObject>;

    fn remove(&self, name: &str) -> Option<BeanObject>;

    fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send>);

    fn conversation_id(&self) -> Option<String> {
        None
    }
}

/// 线程作用域：每个线程持有各自的实例
///
/// 不支持销毁回调。
#[derive(Default)]
pub struct ThreadScope {
    objects: Mutex<HashMap<ThreadId, HashMap<String, BeanObject>>>,
}

impl ThreadScope {
    pub const NAME: &'static str = "thread";

    pub fn new() -> Self {
        Self::default()
    }
}

impl BeanScope for ThreadScope {
    fn get(
        &self,
        name: &str,
        object_factory: &mut dyn FnMut() -> ContainerResult<BeanObject>,
    ) -> ContainerResult<BeanObject> {
        let thread = std::thread::current().id();
        if let Some(existing) = self.objects.lock().get(&thread).and_then(|m| m.get(name)) {
            return Ok(existing.clone());
        }
        let created = object_factory()?;
        let mut objects = self.objects.lock();
        let scoped = objects.entry(thread).or_default();
        Ok(scoped.entry(name.to_string()).or_insert(created).clone())
    }

    fn remove(&self, name: &str) -> Option<BeanObject> {
        let thread = std::thread::current().id();
        self.objects.lock().get_mut(&thread)?.remove(name)
    }

    fn register_destruction_callback(&self, name: &str, _callback: Box<dyn FnOnce() + Send>) {
        tracing::warn!(
            "ThreadScope does not support destruction callbacks. Consider using a request scope instead: '{}'",
            name
        );
    }

    fn conversation_id(&self) -> Option<String> {
        Some(format!("{:?}", std::thread::current().id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_scope_names() {
        assert_eq!(Scope::from_name(""), Scope::Singleton);
        assert_eq!(Scope::from_name("prototype"), Scope::Prototype);
        assert_eq!(Scope::from_name("thread"), Scope::Custom("thread".into()));
        assert_eq!(Scope::default().to_string(), "singleton");
    }

    #[test]
    fn test_thread_scope_isolates_threads() {
        let scope = Arc::new(ThreadScope::new());
        let mut counter = 0u32;
        let mut factory = || {
            counter += 1;
            Ok(Arc::new(counter) as BeanObject)
        };
        let first = scope.get("bean", &mut factory).unwrap();
        let again = scope.get("bean", &mut factory).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let other = scope.clone();
        let from_other_thread = std::thread::spawn(move || {
            other
                .get("bean", &mut || Ok(Arc::new(99u32) as BeanObject))
                .unwrap()
                .downcast::<u32>()
                .map(|v| *v)
                .unwrap()
        })
        .join()
        .unwrap();
        assert_eq!(from_other_thread, 99);
        assert!(scope.remove("bean").is_some());
    }
}
