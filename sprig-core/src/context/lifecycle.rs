use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{ContainerError, ContainerResult};
use crate::factory::{BeanFactory, ConfigurableBeanFactory, DefaultListableBeanFactory};
use crate::lifecycle::Lifecycle;
use crate::types::{Capabilities, ResolvableType, TypeMetadata};

/// 上下文刷新与关闭时驱动 [`Lifecycle`] bean
pub trait LifecycleProcessor: Send + Sync {
    /// 启动全部组件
    fn start(&self) -> ContainerResult<()>;

    /// 停止全部组件
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// 刷新完成：只启动 auto-startup 的组件
    fn on_refresh(&self) -> ContainerResult<()>;

    /// 上下文关闭
    fn on_close(&self);
}

/// 默认实现：按 phase 分组，启动时 phase 小的先启动，停止时相反
///
/// 组件依赖的 bean 如果也是 Lifecycle，会先于它启动、晚于它停止。
pub struct DefaultLifecycleProcessor {
    factory: Weak<DefaultListableBeanFactory>,
    running: AtomicBool,
}

impl DefaultLifecycleProcessor {
    pub const TYPE_NAME: &'static str = "DefaultLifecycleProcessor";
    pub const INTERFACE_NAME: &'static str = "LifecycleProcessor";

    pub fn new(factory: Weak<DefaultListableBeanFactory>) -> Self {
        Self {
            factory,
            running: AtomicBool::new(false),
        }
    }

    pub fn type_metadata() -> TypeMetadata {
        TypeMetadata::named::<Self>(Self::TYPE_NAME)
            .implements_as::<dyn LifecycleProcessor>(ResolvableType::class(Self::INTERFACE_NAME), |p| {
                p as Arc<dyn LifecycleProcessor>
            })
            .build()
    }

    /// 已创建的单例与尚未创建的非延迟单例中实现了 Lifecycle 的 bean
    fn lifecycle_beans(&self, factory: &DefaultListableBeanFactory) -> ContainerResult<Vec<(String, Arc<dyn Lifecycle>)>> {
        let mut beans = Vec::new();
        for name in factory.bean_names_with_capability(&|c: &Capabilities| c.lifecycle.is_some()) {
            let eligible = factory.contains_singleton(&name)
                || factory
                    .get_merged_bean_definition(&name)
                    .is_ok_and(|mbd| mbd.is_singleton() && !factory.is_lazy_init(&name, &mbd));
            if !eligible {
                continue;
            }
            if let Some(lifecycle) = Self::as_lifecycle(factory, &name)? {
                beans.push((name, lifecycle));
            }
        }
        Ok(beans)
    }

    fn as_lifecycle(factory: &DefaultListableBeanFactory, name: &str) -> ContainerResult<Option<Arc<dyn Lifecycle>>> {
        let bean = factory.get_bean(name)?;
        Ok(factory
            .types()
            .describe_instance(&bean)
            .and_then(|m| m.capabilities().lifecycle.clone())
            .and_then(|cast| cast(&bean)))
    }

    fn start_beans(&self, auto_startup_only: bool) -> ContainerResult<()> {
        let Some(factory) = self.factory.upgrade() else {
            return Ok(());
        };
        let beans = self.lifecycle_beans(&factory)?;
        let mut phases: BTreeMap<i32, Vec<(String, Arc<dyn Lifecycle>)>> = BTreeMap::new();
        for (name, bean) in beans {
            if !auto_startup_only || bean.is_auto_startup() {
                phases.entry(bean.phase()).or_default().push((name, bean));
            }
        }
        let mut started = HashSet::new();
        for (phase, members) in phases {
            tracing::debug!("Starting beans in phase {}", phase);
            for (name, bean) in members {
                Self::do_start(&factory, &name, &bean, auto_startup_only, &mut started)?;
            }
        }
        Ok(())
    }

    fn do_start(
        factory: &DefaultListableBeanFactory,
        name: &str,
        bean: &Arc<dyn Lifecycle>,
        auto_startup_only: bool,
        started: &mut HashSet<String>,
    ) -> ContainerResult<()> {
        if !started.insert(name.to_string()) {
            return Ok(());
        }
        for dependency in factory.dependencies_for_bean(name) {
            if let Some(dependency_bean) = Self::as_lifecycle(factory, &dependency)? {
                Self::do_start(factory, &dependency, &dependency_bean, auto_startup_only, started)?;
            }
        }
        if bean.is_running() || (auto_startup_only && !bean.is_auto_startup()) {
            return Ok(());
        }
        tracing::trace!("Starting bean '{}'", name);
        bean.start().map_err(|e| ContainerError::BeanCreation {
            bean_name: name.to_string(),
            message: "Failed to start bean".to_string(),
            source: Some(Box::new(ContainerError::Other(e))),
        })?;
        tracing::debug!("Successfully started bean '{}'", name);
        Ok(())
    }

    fn stop_beans(&self) {
        let Some(factory) = self.factory.upgrade() else {
            return;
        };
        let beans = match self.lifecycle_beans(&factory) {
            Ok(beans) => beans,
            Err(e) => {
                tracing::warn!("Failed to collect lifecycle beans for stopping: {}", e);
                return;
            }
        };
        let mut phases: BTreeMap<i32, Vec<(String, Arc<dyn Lifecycle>)>> = BTreeMap::new();
        for (name, bean) in beans {
            phases.entry(bean.phase()).or_default().push((name, bean));
        }
        let mut stopped = HashSet::new();
        for (phase, members) in phases.into_iter().rev() {
            tracing::debug!("Stopping beans in phase {}", phase);
            for (name, bean) in members {
                Self::do_stop(&factory, &name, &bean, &mut stopped);
            }
        }
    }

    fn do_stop(
        factory: &DefaultListableBeanFactory,
        name: &str,
        bean: &Arc<dyn Lifecycle>,
        stopped: &mut HashSet<String>,
    ) {
        if !stopped.insert(name.to_string()) {
            return;
        }
        for dependent in factory.dependent_beans(name) {
            match Self::as_lifecycle(factory, &dependent) {
                Ok(Some(dependent_bean)) => Self::do_stop(factory, &dependent, &dependent_bean, stopped),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to look up dependent bean '{}': {}", dependent, e),
            }
        }
        if !bean.is_running() {
            return;
        }
        tracing::trace!("Stopping bean '{}'", name);
        match bean.stop() {
            Ok(()) => tracing::debug!("Successfully stopped bean '{}'", name),
            Err(e) => tracing::warn!("Failed to stop bean '{}': {:#}", name, e),
        }
    }
}

impl LifecycleProcessor for DefaultLifecycleProcessor {
    fn start(&self) -> ContainerResult<()> {
        self.start_beans(false)?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stop_beans();
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn on_refresh(&self) -> ContainerResult<()> {
        self.start_beans(true)?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn on_close(&self) {
        self.stop_beans();
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{BeanDefinition, BeanDefinitionRegistry};
    use parking_lot::Mutex;

    struct PhasedService {
        name: &'static str,
        phase: i32,
        auto: bool,
        running: AtomicBool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Lifecycle for PhasedService {
        fn start(&self) -> anyhow::Result<()> {
            self.running.store(true, Ordering::SeqCst);
            self.log.lock().push(format!("start:{}", self.name));
            Ok(())
        }

        fn stop(&self) -> anyhow::Result<()> {
            self.running.store(false, Ordering::SeqCst);
            self.log.lock().push(format!("stop:{}", self.name));
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn is_auto_startup(&self) -> bool {
            self.auto
        }

        fn phase(&self) -> i32 {
            self.phase
        }
    }

    fn register(
        factory: &DefaultListableBeanFactory,
        name: &'static str,
        phase: i32,
        auto: bool,
        log: &Arc<Mutex<Vec<String>>>,
    ) {
        if !factory.types().contains("PhasedService") {
            factory
                .types()
                .try_register(TypeMetadata::named::<PhasedService>("PhasedService").lifecycle().build())
                .unwrap();
        }
        let log = log.clone();
        let mut definition = BeanDefinition::with_supplier(move || {
            Ok(PhasedService {
                name,
                phase,
                auto,
                running: AtomicBool::new(false),
                log: log.clone(),
            })
        });
        definition.bean_class_name = Some("PhasedService".to_string());
        definition.target_type = Some(ResolvableType::class("PhasedService"));
        factory.register_bean_definition(name, definition).unwrap();
    }

    #[test]
    fn test_phases_start_ascending_and_stop_descending() {
        let factory = DefaultListableBeanFactory::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        register(&factory, "late", 10, true, &log);
        register(&factory, "early", -5, true, &log);
        register(&factory, "manual", 0, false, &log);

        let processor = DefaultLifecycleProcessor::new(Arc::downgrade(&factory));
        processor.on_refresh().unwrap();
        assert_eq!(*log.lock(), vec!["start:early", "start:late"]);
        assert!(processor.is_running());

        processor.on_close();
        assert_eq!(*log.lock(), vec!["start:early", "start:late", "stop:late", "stop:early"]);
    }

    #[test]
    fn test_explicit_start_includes_manual_components() {
        let factory = DefaultListableBeanFactory::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        register(&factory, "manual", 0, false, &log);

        let processor = DefaultLifecycleProcessor::new(Arc::downgrade(&factory));
        processor.start().unwrap();
        assert_eq!(*log.lock(), vec!["start:manual"]);
        processor.stop();
        assert_eq!(log.lock().last().map(String::as_str), Some("stop:manual"));
    }
}
