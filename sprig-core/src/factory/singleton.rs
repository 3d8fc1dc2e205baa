use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::error::{ContainerError, ContainerResult};
use crate::utils::dependency::{CreationTracker, ThreadCreationTracker};
use crate::value::BeanObject;

use super::disposable::DisposableBeanAdapter;

/// 提供早期引用的回调，只会被调用一次
pub(crate) type SingletonFactory = Box<dyn FnOnce() -> ContainerResult<BeanObject> + Send>;

/// 已在创建其他 bean 的线程等待某个单例的创建锁时的超时，超时视为跨线程的循环等待
const CREATION_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct EarlyCache {
    objects: HashMap<String, BeanObject>,
    factories: HashMap<String, SingletonFactory>,
}

/// 单例注册表
///
/// 三级缓存：完整的单例、提前暴露的早期引用、生成早期引用的回调。
/// 每个名称有独立的创建锁，保证同一单例只创建一次；早期引用只对正在创建它的线程可见。
/// 同时记录 bean 之间的依赖关系，销毁时先销毁依赖方。
#[derive(Default)]
pub(crate) struct DefaultSingletonBeanRegistry {
    singleton_objects: RwLock<HashMap<String, BeanObject>>,
    early: Mutex<EarlyCache>,
    registered: RwLock<Vec<String>>,
    creation_locks: Mutex<HashMap<String, Arc<ReentrantMutex<()>>>>,
    in_creation: CreationTracker,
    thread_in_creation: ThreadCreationTracker,
    destruction_in_progress: AtomicBool,
    disposable_beans: Mutex<Vec<(String, DisposableBeanAdapter)>>,
    contained_beans: RwLock<HashMap<String, Vec<String>>>,
    dependent_beans: RwLock<HashMap<String, Vec<String>>>,
    dependencies_for_bean: RwLock<HashMap<String, Vec<String>>>,
}

/// 单例创建期间的标记，离开作用域时清除
struct CreationGuard<'a> {
    registry: &'a DefaultSingletonBeanRegistry,
    name: &'a str,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.registry.in_creation.finish_creating(self.name);
        self.registry.thread_in_creation.finish_creating(self.name);
    }
}

impl DefaultSingletonBeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册外部创建好的单例；名称已被占用时报错
    pub fn register_singleton(&self, name: &str, object: BeanObject) -> ContainerResult<()> {
        if self.singleton_objects.read().contains_key(name) {
            return Err(ContainerError::IllegalState(format!(
                "Could not register object under bean name '{}': there is already an object bound",
                name
            )));
        }
        self.add_singleton(name, object);
        Ok(())
    }

    pub fn add_singleton(&self, name: &str, object: BeanObject) {
        self.singleton_objects.write().insert(name.to_string(), object);
        {
            let mut early = self.early.lock();
            early.objects.remove(name);
            early.factories.remove(name);
        }
        let mut registered = self.registered.write();
        if !registered.iter().any(|n| n == name) {
            registered.push(name.to_string());
        }
    }

    /// 登记提前暴露早期引用的回调（允许循环引用时使用）
    pub fn add_singleton_factory(&self, name: &str, factory: SingletonFactory) {
        if self.singleton_objects.read().contains_key(name) {
            return;
        }
        let mut early = self.early.lock();
        early.objects.remove(name);
        early.factories.insert(name.to_string(), factory);
    }

    /// 完整的单例，或当前线程正在创建的单例的早期引用
    ///
    /// `allow_early_reference` 为真时可以调用回调生成早期引用。
    pub fn get_singleton_early(&self, name: &str, allow_early_reference: bool) -> ContainerResult<Option<BeanObject>> {
        if let Some(object) = self.singleton_objects.read().get(name) {
            return Ok(Some(object.clone()));
        }
        if !self.thread_in_creation.is_creating(name) {
            return Ok(None);
        }
        let factory = {
            let mut early = self.early.lock();
            if let Some(object) = early.objects.get(name) {
                return Ok(Some(object.clone()));
            }
            if !allow_early_reference {
                return Ok(None);
            }
            match early.factories.remove(name) {
                Some(factory) => factory,
                None => return Ok(None),
            }
        };
        let object = factory()?;
        self.early.lock().objects.insert(name.to_string(), object.clone());
        Ok(Some(object))
    }

    /// 已经生成的早期引用，不触发回调
    pub fn early_reference(&self, name: &str) -> Option<BeanObject> {
        self.early.lock().objects.get(name).cloned()
    }

    /// 只返回完整的单例
    pub fn get_singleton(&self, name: &str) -> Option<BeanObject> {
        self.singleton_objects.read().get(name).cloned()
    }

    /// 取得单例，不存在时在该名称的创建锁内调用 `create`
    pub fn get_or_create(
        &self,
        name: &str,
        create: impl FnOnce() -> ContainerResult<BeanObject>,
    ) -> ContainerResult<BeanObject> {
        if let Some(object) = self.get_singleton(name) {
            return Ok(object);
        }

        let lock = self.creation_lock(name);
        let _lock_guard = if self.thread_in_creation.is_active() {
            lock.try_lock_for(CREATION_LOCK_TIMEOUT).ok_or_else(|| {
                ContainerError::BeanCurrentlyInCreation {
                    bean_name: name.to_string(),
                    message: format!(
                        "Timed out waiting for another thread to create it while creating [{}]",
                        self.thread_in_creation.current_chain().join(" -> ")
                    ),
                }
            })?
        } else {
            lock.lock()
        };

        if let Some(object) = self.get_singleton(name) {
            return Ok(object);
        }
        if self.destruction_in_progress.load(Ordering::SeqCst) {
            return Err(ContainerError::bean_creation(
                name,
                "Singleton bean creation not allowed while singletons of this factory are in destruction",
            ));
        }
        if !self.thread_in_creation.start_creating(name) {
            return Err(ContainerError::currently_in_creation(name));
        }
        self.in_creation.start_creating(name);

        let result = {
            let _guard = CreationGuard { registry: self, name };
            tracing::debug!("Creating shared instance of singleton bean '{}'", name);
            create()
        };

        match result {
            Ok(object) => {
                self.add_singleton(name, object.clone());
                tracing::debug!("Singleton bean '{}' created and cached", name);
                Ok(object)
            }
            Err(e) => {
                let mut early = self.early.lock();
                early.objects.remove(name);
                early.factories.remove(name);
                Err(e)
            }
        }
    }

    fn creation_lock(&self, name: &str) -> Arc<ReentrantMutex<()>> {
        self.creation_locks
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
            .clone()
    }

    pub fn remove_singleton(&self, name: &str) {
        self.singleton_objects.write().remove(name);
        {
            let mut early = self.early.lock();
            early.objects.remove(name);
            early.factories.remove(name);
        }
        self.registered.write().retain(|n| n != name);
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singleton_objects.read().contains_key(name)
    }

    pub fn singleton_names(&self) -> Vec<String> {
        self.registered.read().clone()
    }

    pub fn singleton_count(&self) -> usize {
        self.registered.read().len()
    }

    /// 任意线程正在创建该单例
    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.in_creation.is_creating(name)
    }

    /// 当前线程正在创建该单例
    pub fn is_in_creation_on_this_thread(&self, name: &str) -> bool {
        self.thread_in_creation.is_creating(name)
    }

    pub fn register_disposable_bean(&self, name: &str, adapter: DisposableBeanAdapter) {
        let mut disposables = self.disposable_beans.lock();
        disposables.retain(|(n, _)| n != name);
        disposables.push((name.to_string(), adapter));
    }

    /// 内部 bean 随外部 bean 一起销毁
    pub fn register_contained_bean(&self, contained: &str, containing: &str) {
        {
            let mut contained_beans = self.contained_beans.write();
            let list = contained_beans.entry(containing.to_string()).or_default();
            if list.iter().any(|n| n == contained) {
                return;
            }
            list.push(contained.to_string());
        }
        self.register_dependent_bean(contained, containing);
    }

    pub fn register_dependent_bean(&self, name: &str, dependent: &str) {
        {
            let mut dependents = self.dependent_beans.write();
            let list = dependents.entry(name.to_string()).or_default();
            if list.iter().any(|n| n == dependent) {
                return;
            }
            list.push(dependent.to_string());
        }
        let mut dependencies = self.dependencies_for_bean.write();
        let list = dependencies.entry(dependent.to_string()).or_default();
        if !list.iter().any(|n| n == name) {
            list.push(name.to_string());
        }
    }

    /// `dependent` 是否直接或间接依赖 `name`
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let mut visited = HashSet::new();
        self.is_dependent_inner(name, dependent, &mut visited)
    }

    fn is_dependent_inner(&self, name: &str, dependent: &str, visited: &mut HashSet<String>) -> bool {
        if !visited.insert(name.to_string()) {
            return false;
        }
        let direct = match self.dependent_beans.read().get(name) {
            Some(list) => list.clone(),
            None => return false,
        };
        if direct.iter().any(|d| d == dependent) {
            return true;
        }
        direct
            .iter()
            .any(|transitive| self.is_dependent_inner(transitive, dependent, visited))
    }

    pub fn has_dependent_beans(&self, name: &str) -> bool {
        self.dependent_beans.read().get(name).is_some_and(|l| !l.is_empty())
    }

    pub fn dependent_beans(&self, name: &str) -> Vec<String> {
        self.dependent_beans.read().get(name).cloned().unwrap_or_default()
    }

    pub fn dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.dependencies_for_bean.read().get(name).cloned().unwrap_or_default()
    }

    /// 按注册的逆序销毁全部可销毁单例，然后清空所有缓存
    pub fn destroy_singletons(&self) {
        tracing::debug!("Destroying singletons");
        self.destruction_in_progress.store(true, Ordering::SeqCst);

        let names: Vec<String> = self
            .disposable_beans
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        self.contained_beans.write().clear();
        self.dependent_beans.write().clear();
        self.dependencies_for_bean.write().clear();
        self.singleton_objects.write().clear();
        {
            let mut early = self.early.lock();
            early.objects.clear();
            early.factories.clear();
        }
        self.registered.write().clear();
        self.destruction_in_progress.store(false, Ordering::SeqCst);
        tracing::debug!("Singleton beans destruction completed");
    }

    /// 销毁单个单例，先销毁依赖它的 bean
    pub fn destroy_singleton(&self, name: &str) {
        self.remove_singleton(name);
        let adapter = {
            let mut disposables = self.disposable_beans.lock();
            disposables
                .iter()
                .position(|(n, _)| n == name)
                .map(|index| disposables.remove(index).1)
        };
        self.destroy_bean(name, adapter);
    }

    fn destroy_bean(&self, name: &str, adapter: Option<DisposableBeanAdapter>) {
        let dependents = self.dependent_beans.write().remove(name);
        if let Some(dependents) = dependents {
            tracing::trace!("Retrieved dependent beans for bean '{}': {:?}", name, dependents);
            for dependent in dependents {
                self.destroy_singleton(&dependent);
            }
        }

        if let Some(adapter) = adapter {
            adapter.destroy();
        }

        let contained = self.contained_beans.write().remove(name);
        if let Some(contained) = contained {
            for inner in contained {
                self.destroy_singleton(&inner);
            }
        }

        {
            let mut dependents = self.dependent_beans.write();
            dependents.retain(|_, list| {
                list.retain(|n| n != name);
                !list.is_empty()
            });
        }
        self.dependencies_for_bean.write().remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn object(value: u32) -> BeanObject {
        Arc::new(value)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = DefaultSingletonBeanRegistry::new();
        registry.register_singleton("a", object(1)).unwrap();
        assert!(registry.contains_singleton("a"));
        assert!(registry.register_singleton("a", object(2)).is_err());
        assert_eq!(registry.singleton_names(), vec!["a"]);
    }

    #[test]
    fn test_get_or_create_runs_factory_once() {
        let registry = DefaultSingletonBeanRegistry::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            registry
                .get_or_create("a", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(object(1))
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registry.is_currently_in_creation("a"));
    }

    #[test]
    fn test_reentrant_creation_is_a_cycle() {
        let registry = DefaultSingletonBeanRegistry::new();
        let result = registry.get_or_create("a", || registry.get_or_create("a", || Ok(object(1))));
        assert!(result.unwrap_err().is_currently_in_creation());
    }

    #[test]
    fn test_early_reference_visible_only_while_creating() {
        let registry = DefaultSingletonBeanRegistry::new();
        assert!(registry.get_singleton_early("a", true).unwrap().is_none());
        let seen = registry
            .get_or_create("a", || {
                registry.add_singleton_factory("a", Box::new(|| Ok(object(7))));
                let early = registry.get_singleton_early("a", true)?.unwrap();
                assert_eq!(*early.downcast_ref::<u32>().unwrap(), 7);
                Ok(early)
            })
            .unwrap();
        assert_eq!(*seen.downcast_ref::<u32>().unwrap(), 7);
        assert!(registry.early_reference("a").is_none());
    }

    #[test]
    fn test_dependents_are_tracked_transitively() {
        let registry = DefaultSingletonBeanRegistry::new();
        registry.register_dependent_bean("a", "b");
        registry.register_dependent_bean("b", "c");
        assert!(registry.is_dependent("a", "c"));
        assert!(!registry.is_dependent("c", "a"));
        assert_eq!(registry.dependencies_for_bean("b"), vec!["a"]);
    }
}
