//! 后处理器的调用与注册顺序
//!
//! BeanDefinitionRegistryPostProcessor 先于普通 BeanFactoryPostProcessor；
//! 同一类处理器中 PriorityOrdered 先于 Ordered，最后是其余处理器。

use std::collections::HashSet;
use std::sync::Arc;

use crate::bean_post_processor::BeanPostProcessor;
use crate::error::{ContainerError, ContainerResult};
use crate::lifecycle::BeanFactoryPostProcessor;
use crate::types::Capabilities;
use crate::value::BeanObject;

use super::default::DefaultListableBeanFactory;
use super::{BeanFactory, ConfigurableBeanFactory, ConfigurableListableBeanFactory, OrderComparator};

/// 从容器取出的处理器：名称、原始实例与适配后的接口
struct Located<P: ?Sized> {
    name: String,
    bean: BeanObject,
    processor: Arc<P>,
}

enum Tier {
    PriorityOrdered,
    Ordered,
    Rest,
}

fn tier_of(capabilities: &Capabilities) -> Tier {
    if capabilities.priority_ordered {
        Tier::PriorityOrdered
    } else if capabilities.ordered.is_some() {
        Tier::Ordered
    } else {
        Tier::Rest
    }
}

fn type_tier(factory: &DefaultListableBeanFactory, name: &str) -> Tier {
    let Ok(Some(ty)) = factory.get_type_inner(name, false) else {
        return Tier::Rest;
    };
    match ty.raw_name().and_then(|raw| factory.metadata_for_class(raw)) {
        Some(metadata) => tier_of(metadata.capabilities()),
        None => Tier::Rest,
    }
}

fn locate_factory_processor(
    factory: &DefaultListableBeanFactory,
    name: &str,
) -> ContainerResult<Located<dyn BeanFactoryPostProcessor>> {
    let bean = factory.get_bean(name)?;
    let processor = factory
        .types
        .describe_instance(&bean)
        .and_then(|m| m.capabilities().bean_factory_post_processor.clone())
        .and_then(|cast| cast(&bean))
        .ok_or_else(|| ContainerError::BeanNotOfRequiredType {
            bean_name: name.to_string(),
            required_type: "BeanFactoryPostProcessor".to_string(),
            actual_type: "unknown".to_string(),
        })?;
    Ok(Located {
        name: name.to_string(),
        bean,
        processor,
    })
}

fn locate_post_processor(
    factory: &DefaultListableBeanFactory,
    name: &str,
) -> ContainerResult<Located<dyn BeanPostProcessor>> {
    let bean = factory.get_bean(name)?;
    let processor = factory
        .types
        .describe_instance(&bean)
        .and_then(|m| m.capabilities().bean_post_processor.clone())
        .and_then(|cast| cast(&bean))
        .ok_or_else(|| ContainerError::BeanNotOfRequiredType {
            bean_name: name.to_string(),
            required_type: "BeanPostProcessor".to_string(),
            actual_type: "unknown".to_string(),
        })?;
    Ok(Located {
        name: name.to_string(),
        bean,
        processor,
    })
}

fn sort<P: ?Sized>(factory: &DefaultListableBeanFactory, items: &mut [Located<P>]) {
    let comparator = OrderComparator::new(&factory.types, &factory.introspector);
    comparator.sort(items, |item| &item.bean);
}

/// 依次调用全部 BeanFactoryPostProcessor
///
/// `programmatic` 是直接添加到上下文的处理器，按添加顺序先于容器中定义的同类处理器执行。
pub fn invoke_bean_factory_post_processors(
    factory: &Arc<DefaultListableBeanFactory>,
    programmatic: &[Arc<dyn BeanFactoryPostProcessor>],
) -> ContainerResult<()> {
    let clbf: &dyn ConfigurableListableBeanFactory = &**factory;
    let mut processed: HashSet<String> = HashSet::new();
    let mut registry_processors: Vec<Arc<dyn BeanFactoryPostProcessor>> = Vec::new();
    let mut regular: Vec<Arc<dyn BeanFactoryPostProcessor>> = Vec::new();

    for processor in programmatic {
        match processor.as_registry_post_processor() {
            Some(registry) => {
                registry.post_process_bean_definition_registry(&**factory)?;
                registry_processors.push(processor.clone());
            }
            None => regular.push(processor.clone()),
        }
    }

    let mut run_registry_round = |accept: &dyn Fn(&Tier) -> bool| -> ContainerResult<bool> {
        let mut current = Vec::new();
        for name in factory.bean_names_with_capability(&|c: &Capabilities| c.registry_post_processor) {
            if !processed.contains(&name) && accept(&type_tier(factory, &name)) {
                current.push(locate_factory_processor(factory, &name)?);
                processed.insert(name);
            }
        }
        if current.is_empty() {
            return Ok(false);
        }
        sort(factory, &mut current);
        for located in &current {
            if let Some(registry) = located.processor.as_registry_post_processor() {
                tracing::debug!("  ├─ Invoking BeanDefinitionRegistryPostProcessor '{}'", located.name);
                registry.post_process_bean_definition_registry(&**factory)?;
            }
        }
        registry_processors.extend(current.into_iter().map(|l| l.processor));
        Ok(true)
    };

    run_registry_round(&|tier| matches!(tier, Tier::PriorityOrdered))?;
    run_registry_round(&|tier| matches!(tier, Tier::Ordered))?;
    // 注册阶段的处理器可能继续注册新的处理器，直到不再出现新的名称为止
    while run_registry_round(&|_| true)? {}

    for processor in registry_processors.iter().chain(regular.iter()) {
        processor.post_process_bean_factory(clbf)?;
    }

    let mut priority = Vec::new();
    let mut ordered_names = Vec::new();
    let mut rest_names = Vec::new();
    for name in factory.bean_names_with_capability(&|c: &Capabilities| c.bean_factory_post_processor.is_some()) {
        if processed.contains(&name) {
            continue;
        }
        match type_tier(factory, &name) {
            Tier::PriorityOrdered => priority.push(locate_factory_processor(factory, &name)?),
            Tier::Ordered => ordered_names.push(name),
            Tier::Rest => rest_names.push(name),
        }
    }

    sort(factory, &mut priority);
    invoke_located(clbf, &priority)?;

    let mut ordered = ordered_names
        .iter()
        .map(|name| locate_factory_processor(factory, name))
        .collect::<ContainerResult<Vec<_>>>()?;
    sort(factory, &mut ordered);
    invoke_located(clbf, &ordered)?;

    let rest = rest_names
        .iter()
        .map(|name| locate_factory_processor(factory, name))
        .collect::<ContainerResult<Vec<_>>>()?;
    invoke_located(clbf, &rest)?;

    // 处理器可能修改了定义，合并缓存需要重建
    factory.clear_metadata_cache();
    Ok(())
}

fn invoke_located(
    factory: &dyn ConfigurableListableBeanFactory,
    processors: &[Located<dyn BeanFactoryPostProcessor>],
) -> ContainerResult<()> {
    for located in processors {
        tracing::debug!("  ├─ Invoking BeanFactoryPostProcessor '{}'", located.name);
        located.processor.post_process_bean_factory(factory)?;
    }
    Ok(())
}

/// 实例化容器中定义的 BeanPostProcessor 并按顺序注册
pub fn register_bean_post_processors(factory: &Arc<DefaultListableBeanFactory>) -> ContainerResult<()> {
    let names = factory.bean_names_with_capability(&|c: &Capabilities| c.bean_post_processor.is_some());
    tracing::info!("Registering BeanPostProcessors, found {} definition(s)", names.len());

    let target_count = factory.bean_post_processor_count() + 1 + names.len();
    factory.add_bean_post_processor(Arc::new(BeanPostProcessorChecker {
        factory: Arc::downgrade(factory),
        target_count,
    }));

    let mut priority = Vec::new();
    let mut ordered_names = Vec::new();
    let mut rest_names = Vec::new();
    for name in names {
        match type_tier(factory, &name) {
            Tier::PriorityOrdered => priority.push(locate_post_processor(factory, &name)?),
            Tier::Ordered => ordered_names.push(name),
            Tier::Rest => rest_names.push(name),
        }
    }

    sort(factory, &mut priority);
    register_located(factory, priority);

    let mut ordered = ordered_names
        .iter()
        .map(|name| locate_post_processor(factory, name))
        .collect::<ContainerResult<Vec<_>>>()?;
    sort(factory, &mut ordered);
    register_located(factory, ordered);

    let rest = rest_names
        .iter()
        .map(|name| locate_post_processor(factory, name))
        .collect::<ContainerResult<Vec<_>>>()?;
    register_located(factory, rest);

    tracing::info!(
        "BeanPostProcessor registration completed, {} processor(s) active",
        factory.bean_post_processor_count()
    );
    Ok(())
}

fn register_located(factory: &DefaultListableBeanFactory, processors: Vec<Located<dyn BeanPostProcessor>>) {
    for located in processors {
        tracing::debug!("  ├─ Registered BeanPostProcessor '{}'", located.name);
        factory.add_bean_post_processor(located.processor);
    }
}

/// 处理器尚未全部注册时就被创建的 bean 会错过部分处理，记录下来便于排查
struct BeanPostProcessorChecker {
    factory: std::sync::Weak<DefaultListableBeanFactory>,
    target_count: usize,
}

impl BeanPostProcessor for BeanPostProcessorChecker {
    fn post_process_after_initialization(
        &self,
        bean: BeanObject,
        bean_name: &str,
    ) -> ContainerResult<Option<BeanObject>> {
        let Some(factory) = self.factory.upgrade() else {
            return Ok(Some(bean));
        };
        let is_processor = factory
            .types
            .describe_instance(&bean)
            .is_some_and(|m| m.capabilities().bean_post_processor.is_some());
        let infrastructure = factory
            .local_definition(bean_name)
            .is_some_and(|mbd| mbd.role == crate::bean::Role::Infrastructure);
        if !is_processor && !infrastructure && factory.bean_post_processor_count() < self.target_count {
            tracing::info!(
                "Bean '{}' is not eligible for getting processed by all BeanPostProcessors (for example: not eligible for auto-proxying)",
                bean_name
            );
        }
        Ok(Some(bean))
    }

    fn name(&self) -> &str {
        "BeanPostProcessorChecker"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::bean::{BeanDefinition, BeanDefinitionRegistry};
    use crate::lifecycle::Ordered;
    use crate::types::TypeMetadata;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct Target;

    macro_rules! recorder {
        ($name:ident, $label:literal) => {
            struct $name(Log);

            impl BeanPostProcessor for $name {
                fn post_process_after_initialization(
                    &self,
                    bean: BeanObject,
                    _bean_name: &str,
                ) -> ContainerResult<Option<BeanObject>> {
                    if bean.is::<Target>() {
                        self.0.lock().push($label);
                    }
                    Ok(Some(bean))
                }
            }
        };
    }

    recorder!(Urgent, "priority");
    recorder!(Early, "ordered-1");
    recorder!(Late, "ordered-10");
    recorder!(Plain, "plain");

    impl Ordered for Early {
        fn order(&self) -> i32 {
            1
        }
    }

    impl Ordered for Late {
        fn order(&self) -> i32 {
            10
        }
    }

    #[test]
    fn test_post_processors_register_priority_then_ordered_then_rest() {
        let factory = DefaultListableBeanFactory::new();
        let types = factory.types();
        types.register(TypeMetadata::named::<Urgent>("Urgent").bean_post_processor().priority_ordered().build());
        types.register(TypeMetadata::named::<Early>("Early").bean_post_processor().ordered().build());
        types.register(TypeMetadata::named::<Late>("Late").bean_post_processor().ordered().build());
        types.register(TypeMetadata::named::<Plain>("Plain").bean_post_processor().build());
        types.register(TypeMetadata::named::<Target>("Target").default_constructor(|| Ok(Target)).build());

        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let (plain, late, urgent, early) = (log.clone(), log.clone(), log.clone(), log.clone());
        factory
            .register_bean_definition("plain", BeanDefinition::with_supplier(move || Ok(Plain(plain.clone()))))
            .unwrap();
        factory
            .register_bean_definition("late", BeanDefinition::with_supplier(move || Ok(Late(late.clone()))))
            .unwrap();
        factory
            .register_bean_definition("urgent", BeanDefinition::with_supplier(move || Ok(Urgent(urgent.clone()))))
            .unwrap();
        factory
            .register_bean_definition("early", BeanDefinition::with_supplier(move || Ok(Early(early.clone()))))
            .unwrap();
        factory.register_bean_definition("target", BeanDefinition::class("Target")).unwrap();

        register_bean_post_processors(&factory).unwrap();
        // 检查器加上四个处理器
        assert_eq!(factory.bean_post_processor_count(), 5);

        factory.get_bean("target").unwrap();
        assert_eq!(*log.lock(), vec!["priority", "ordered-1", "ordered-10", "plain"]);
    }
}
