use std::sync::{Arc, Weak};

use crate::bean_post_processor::{BeanPostProcessor, DestructionAwareBeanPostProcessor};
use crate::constants::HIGHEST_PRECEDENCE;
use crate::error::{ContainerError, ContainerResult};
use crate::event::ApplicationListener;
use crate::factory::ConfigurableBeanFactory;
use crate::value::BeanObject;

use super::{ApplicationContext, ConfigurableApplicationContext, GenericApplicationContext};

/// 回调 EnvironmentAware、ApplicationEventPublisherAware 与 ApplicationContextAware
pub struct ApplicationContextAwareProcessor {
    context: Weak<GenericApplicationContext>,
}

impl ApplicationContextAwareProcessor {
    pub fn new(context: Weak<GenericApplicationContext>) -> Self {
        Self { context }
    }
}

fn aware_failure(bean_name: &str, callback: &str, error: anyhow::Error) -> ContainerError {
    ContainerError::BeanCreation {
        bean_name: bean_name.to_string(),
        message: format!("Invocation of {} callback failed", callback),
        source: Some(Box::new(ContainerError::Other(error))),
    }
}

impl BeanPostProcessor for ApplicationContextAwareProcessor {
    fn post_process_before_initialization(&self, bean: BeanObject, bean_name: &str) -> ContainerResult<Option<BeanObject>> {
        let Some(context) = self.context.upgrade() else {
            return Ok(Some(bean));
        };
        let Some(metadata) = context.bean_factory().types().describe_instance(&bean) else {
            return Ok(Some(bean));
        };
        let capabilities = metadata.capabilities();

        if let Some(aware) = capabilities.environment_aware.as_ref().and_then(|cast| cast(&bean)) {
            aware.set_environment(context.environment());
        }
        if let Some(aware) = capabilities.event_publisher_aware.as_ref().and_then(|cast| cast(&bean)) {
            aware.set_application_event_publisher(context.clone());
        }
        if let Some(aware) = capabilities.application_context_aware.as_ref().and_then(|cast| cast(&bean)) {
            let view: Arc<dyn ApplicationContext> = context.clone();
            aware
                .set_application_context(view)
                .map_err(|e| aware_failure(bean_name, "ApplicationContextAware", e))?;
        }
        Ok(Some(bean))
    }

    fn name(&self) -> &str {
        "ApplicationContextAwareProcessor"
    }

    fn order(&self) -> i32 {
        HIGHEST_PRECEDENCE
    }
}

/// 把单例监听器 bean 注册到上下文，销毁时从多播器移除
pub struct ApplicationListenerDetector {
    context: Weak<GenericApplicationContext>,
}

impl ApplicationListenerDetector {
    pub fn new(context: Weak<GenericApplicationContext>) -> Self {
        Self { context }
    }

    fn listener_of(context: &GenericApplicationContext, bean: &BeanObject) -> Option<Arc<dyn ApplicationListener>> {
        context
            .bean_factory()
            .types()
            .describe_instance(bean)
            .and_then(|m| m.capabilities().application_listener.clone())
            .and_then(|cast| cast(bean))
    }
}

impl BeanPostProcessor for ApplicationListenerDetector {
    fn post_process_after_initialization(&self, bean: BeanObject, bean_name: &str) -> ContainerResult<Option<BeanObject>> {
        let Some(context) = self.context.upgrade() else {
            return Ok(Some(bean));
        };
        if let Some(listener) = Self::listener_of(&context, &bean) {
            let singleton = context
                .bean_factory()
                .get_merged_bean_definition(bean_name)
                .map(|mbd| mbd.is_singleton())
                .unwrap_or(true);
            if singleton {
                tracing::debug!("Detected ApplicationListener bean '{}'", bean_name);
                context.add_application_listener(listener);
            } else {
                tracing::warn!(
                    "Inner bean '{}' implements ApplicationListener but is not reachable for event multicasting by its containing ApplicationContext because it does not have singleton scope",
                    bean_name
                );
            }
        }
        Ok(Some(bean))
    }

    fn name(&self) -> &str {
        "ApplicationListenerDetector"
    }

    fn order(&self) -> i32 {
        crate::constants::LOWEST_PRECEDENCE
    }

    fn as_destruction_aware(&self) -> Option<&dyn DestructionAwareBeanPostProcessor> {
        Some(self)
    }
}

impl DestructionAwareBeanPostProcessor for ApplicationListenerDetector {
    fn post_process_before_destruction(&self, bean: &BeanObject, bean_name: &str) -> ContainerResult<()> {
        let Some(context) = self.context.upgrade() else {
            return Ok(());
        };
        if let (Some(listener), Some(multicaster)) = (Self::listener_of(&context, bean), context.multicaster()) {
            tracing::trace!("Removing ApplicationListener bean '{}' from the multicaster", bean_name);
            multicaster.remove_application_listener(&listener);
            multicaster.remove_application_listener_bean(bean_name);
        }
        Ok(())
    }

    fn requires_destruction(&self, bean: &BeanObject, _bean_name: &str) -> bool {
        self.context
            .upgrade()
            .is_some_and(|context| Self::listener_of(&context, bean).is_some())
    }
}
