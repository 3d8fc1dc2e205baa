use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::annotation::{standard, SearchStrategy};
use crate::bean::BeanDefinitionRegistry;
use crate::constants::LOWEST_PRECEDENCE;
use crate::context::ConfigurableApplicationContext;
use crate::error::{ContainerError, ContainerResult};
use crate::factory::{BeanFactory, ConfigurableBeanFactory};
use crate::lifecycle::SmartInitializingSingleton;
use crate::types::{MethodMetadata, ResolvableType, TypeIntrospector, TypeMetadata};
use crate::value::{Args, Value};

use super::{ApplicationEvent, ApplicationListener, PayloadApplicationEvent};

/// 把 `@EventListener` 方法适配为监听器
///
/// 监听方法最多一个参数。参数接收事件时以 `Arc<dyn ApplicationEvent>` 装箱传入
/// （用 `args.dyn_bean::<dyn ApplicationEvent>(0)` 取出），接收负载时直接传入负载对象。
/// 返回值不为空时作为后续事件发布，列表中的每个元素各自发布。
pub struct ApplicationListenerMethodAdapter {
    bean_name: String,
    listener_name: String,
    method: MethodMetadata,
    declared_types: Vec<ResolvableType>,
    order: i32,
    context: Weak<dyn ConfigurableApplicationContext>,
}

impl ApplicationListenerMethodAdapter {
    pub fn new(
        bean_name: &str,
        owner: &TypeMetadata,
        method: MethodMetadata,
        classes: Vec<ResolvableType>,
        order: Option<i32>,
        context: Weak<dyn ConfigurableApplicationContext>,
    ) -> ContainerResult<Self> {
        let listener_name = format!("{}.{}", owner.name(), method.signature());
        if method.params.len() > 1 {
            return Err(ContainerError::IllegalState(format!(
                "Maximum one parameter is allowed for event listener method: {}",
                listener_name
            )));
        }
        let declared_types = if !classes.is_empty() {
            classes
        } else if let Some(param) = method.params.first() {
            vec![param.ty.clone()]
        } else {
            return Err(ContainerError::IllegalState(format!(
                "Event parameter is mandatory for event listener method: {}",
                listener_name
            )));
        };
        Ok(Self {
            bean_name: bean_name.to_string(),
            listener_name,
            method,
            declared_types,
            order: order.unwrap_or(LOWEST_PRECEDENCE),
            context,
        })
    }

    fn context(&self) -> anyhow::Result<Arc<dyn ConfigurableApplicationContext>> {
        self.context
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("Application context of listener '{}' has been dropped", self.listener_name))
    }

    /// 事件本身与声明类型不符时改为传入负载
    fn resolve_arguments(&self, context: &dyn ConfigurableApplicationContext, event: &Arc<dyn ApplicationEvent>) -> Args {
        if self.method.params.is_empty() {
            return Args::empty();
        }
        let types = context.bean_factory().types().clone();
        let event_type = event.event_type();
        let accepts_event = self.declared_types.iter().any(|declared| {
            declared.type_id() == Some(event.as_any().type_id()) || declared.is_assignable_from(&event_type, types.as_ref())
        });
        let argument = match event.downcast_ref::<PayloadApplicationEvent>() {
            Some(payload) if !accepts_event => Value::Object(payload.payload().clone()),
            _ => Value::Object(Arc::new(event.clone())),
        };
        Args::new(vec![argument])
    }

    fn handle_result(&self, context: &dyn ConfigurableApplicationContext, result: Value) -> anyhow::Result<()> {
        match result {
            Value::Null => Ok(()),
            Value::List(items) => {
                for item in items {
                    self.handle_result(context, item)?;
                }
                Ok(())
            }
            Value::Text(text) => Ok(context.publish_object(Arc::new(text), ResolvableType::of::<String>())?),
            Value::Object(object) => {
                if let Some(event) = object.downcast_ref::<Arc<dyn ApplicationEvent>>() {
                    return Ok(context.publish_event(event.clone())?);
                }
                let payload_type = context
                    .bean_factory()
                    .types()
                    .describe_instance(&object)
                    .map(|m| m.as_type())
                    .or_else(|| self.method.return_type.clone())
                    .unwrap_or_else(ResolvableType::none);
                Ok(context.publish_object(object, payload_type)?)
            }
            other => {
                tracing::warn!(
                    "Ignoring result of type '{}' returned by event listener '{}'",
                    other.describe(),
                    self.listener_name
                );
                Ok(())
            }
        }
    }
}

impl ApplicationListener for ApplicationListenerMethodAdapter {
    fn on_application_event(&self, event: &Arc<dyn ApplicationEvent>) -> anyhow::Result<()> {
        let context = self.context()?;
        let bean = context.bean_factory().get_bean(&self.bean_name)?;
        let args = self.resolve_arguments(context.as_ref(), event);
        tracing::trace!("Invoking event listener method '{}'", self.listener_name);
        let result = self.method.call(Some(&bean), &args)?;
        self.handle_result(context.as_ref(), result)
    }

    fn event_types(&self) -> Vec<ResolvableType> {
        self.declared_types.clone()
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn listener_name(&self) -> &str {
        &self.listener_name
    }
}

/// 在全部单例就绪后扫描 `@EventListener` 方法并注册监听器
pub struct EventListenerMethodProcessor {
    context: Weak<dyn ConfigurableApplicationContext>,
    non_annotated_types: RwLock<HashSet<String>>,
}

impl EventListenerMethodProcessor {
    pub const TYPE_NAME: &'static str = "EventListenerMethodProcessor";

    pub fn new(context: Weak<dyn ConfigurableApplicationContext>) -> Self {
        Self {
            context,
            non_annotated_types: RwLock::new(HashSet::new()),
        }
    }

    pub fn type_metadata() -> TypeMetadata {
        TypeMetadata::named::<Self>(Self::TYPE_NAME)
            .smart_initializing_singleton()
            .build()
    }

    fn process_bean(&self, context: &Arc<dyn ConfigurableApplicationContext>, bean_name: &str) -> ContainerResult<()> {
        let factory = context.bean_factory();
        let Some(metadata) = factory
            .get_type(bean_name)?
            .and_then(|ty| ty.raw_name().and_then(|raw| factory.types().describe(raw)))
        else {
            return Ok(());
        };
        if self.non_annotated_types.read().contains(metadata.name()) {
            return Ok(());
        }

        let introspector = factory.annotation_introspector();
        let mut adapters = Vec::new();
        for method in metadata.methods().iter().filter(|m| !m.is_static) {
            let merged = introspector.for_method(metadata.name(), method, SearchStrategy::TypeHierarchy)?;
            let Some(listener) = merged.get(standard::EVENT_LISTENER) else {
                continue;
            };
            let order = merged
                .get(standard::ORDER)
                .and_then(|order| order.int("value"))
                .map(|value| value.clamp(i32::MIN as i64, i32::MAX as i64) as i32);
            let adapter = ApplicationListenerMethodAdapter::new(
                bean_name,
                &metadata,
                method.clone(),
                listener.classes("classes"),
                order,
                self.context.clone(),
            )?;
            adapters.push(adapter);
        }

        if adapters.is_empty() {
            tracing::trace!("No @EventListener annotations found on bean type: {}", metadata.name());
            self.non_annotated_types.write().insert(metadata.name().to_string());
            return Ok(());
        }
        tracing::debug!(
            "{} @EventListener method(s) processed on bean '{}'",
            adapters.len(),
            bean_name
        );
        for adapter in adapters {
            context.add_application_listener(Arc::new(adapter));
        }
        Ok(())
    }
}

impl SmartInitializingSingleton for EventListenerMethodProcessor {
    fn after_singletons_instantiated(&self) -> anyhow::Result<()> {
        let Some(context) = self.context.upgrade() else {
            return Ok(());
        };
        let factory = context.bean_factory().clone();
        let mut names = factory.bean_definition_names();
        for name in factory.singleton_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        for name in names {
            if factory
                .get_merged_bean_definition(&name)
                .is_ok_and(|mbd| mbd.is_abstract || !mbd.is_singleton())
            {
                continue;
            }
            self.process_bean(&context, &name)
                .map_err(|e| anyhow::Error::new(e).context(format!("Failed to process @EventListener methods on bean '{}'", name)))?;
        }
        Ok(())
    }
}
