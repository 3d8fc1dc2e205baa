use std::sync::Arc;

use crate::error::{ContainerError, ContainerResult};
use crate::factory::ConfigurableListableBeanFactory;
use crate::lifecycle::BeanFactoryPostProcessor;
use crate::types::TypeMetadata;

use super::{Environment, PropertyResolver};

/// 解析 bean 定义中的 `${...}` 占位符
///
/// 在所有普通 bean 实例化之前替换定义里的类名、工厂方法、属性值与构造参数中的占位符，
/// 并向工厂注册同一个解析器，供 `@Value` 注入使用。
pub struct PropertySourcesPlaceholderConfigurer {
    environment: Arc<Environment>,
    ignore_unresolvable: bool,
}

impl PropertySourcesPlaceholderConfigurer {
    pub const TYPE_NAME: &'static str = "PropertySourcesPlaceholderConfigurer";

    pub fn new(environment: Arc<Environment>) -> Self {
        Self {
            environment,
            ignore_unresolvable: false,
        }
    }

    /// 无法解析的占位符原样保留而不是报错
    pub fn ignore_unresolvable(mut self, ignore: bool) -> Self {
        self.ignore_unresolvable = ignore;
        self
    }

    pub fn type_metadata() -> TypeMetadata {
        TypeMetadata::named::<Self>(Self::TYPE_NAME)
            .bean_factory_post_processor()
            .priority_ordered()
            .build()
    }

    fn resolve(environment: &Environment, ignore_unresolvable: bool, text: &str) -> ContainerResult<String> {
        if ignore_unresolvable {
            environment.resolve_placeholders(text)
        } else {
            environment.resolve_required_placeholders(text)
        }
    }
}

impl BeanFactoryPostProcessor for PropertySourcesPlaceholderConfigurer {
    fn post_process_bean_factory(&self, bean_factory: &dyn ConfigurableListableBeanFactory) -> ContainerResult<()> {
        let environment = self.environment.clone();
        let ignore = self.ignore_unresolvable;

        for name in bean_factory.bean_definition_names() {
            let mut failure: Option<ContainerError> = None;
            bean_factory.modify_bean_definition(&name, &mut |definition| {
                if let Err(e) = definition.visit_text(&mut |text| Self::resolve(&environment, ignore, text)) {
                    failure = Some(e);
                }
            })?;
            if let Some(cause) = failure {
                return Err(ContainerError::BeanDefinitionStore {
                    bean_name: name,
                    message: format!("Could not resolve placeholder in bean definition: {}", cause),
                });
            }
            tracing::trace!("Resolved placeholders in bean definition '{}'", name);
        }

        bean_factory.add_embedded_value_resolver(Arc::new(move |text: &str| {
            Self::resolve(&environment, ignore, text)
        }));
        Ok(())
    }

    fn order(&self) -> i32 {
        crate::constants::LOWEST_PRECEDENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{BeanDefinition, BeanDefinitionRegistry, BeanMetadataValue};
    use crate::env::MapPropertySource;
    use crate::factory::{ConfigurableBeanFactory, DefaultListableBeanFactory};

    fn environment() -> Arc<Environment> {
        let env = Environment::empty();
        env.add_property_source(Arc::new(
            MapPropertySource::new("app")
                .with_property("db.host", "db.internal")
                .with_property("db.url", "jdbc://${db.host}:${db.port:5432}"),
        ));
        Arc::new(env)
    }

    fn literal(factory: &DefaultListableBeanFactory, bean: &str, property: &str) -> String {
        let definition = factory.get_bean_definition(bean).unwrap();
        match &definition.property_values.get(property).unwrap().value {
            BeanMetadataValue::Literal(text) => text.clone(),
            _ => panic!("expected literal"),
        }
    }

    #[test]
    fn test_definition_values_are_resolved() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "dataSource",
                BeanDefinition::class("DataSource").with_property("url", "${db.url}"),
            )
            .unwrap();

        let configurer = PropertySourcesPlaceholderConfigurer::new(environment());
        configurer.post_process_bean_factory(factory.as_ref()).unwrap();

        assert_eq!(literal(&factory, "dataSource", "url"), "jdbc://db.internal:5432");
        assert!(factory.has_embedded_value_resolver());
        assert_eq!(factory.resolve_embedded_value("${db.host}").unwrap(), "db.internal");
    }

    #[test]
    fn test_unresolvable_placeholder_fails_unless_ignored() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "client",
                BeanDefinition::class("Client").with_property("endpoint", "${missing}"),
            )
            .unwrap();

        let strict = PropertySourcesPlaceholderConfigurer::new(environment());
        let err = strict.post_process_bean_factory(factory.as_ref()).unwrap_err();
        assert!(matches!(err, ContainerError::BeanDefinitionStore { .. }));

        let lenient = PropertySourcesPlaceholderConfigurer::new(environment()).ignore_unresolvable(true);
        lenient.post_process_bean_factory(factory.as_ref()).unwrap();
        assert_eq!(literal(&factory, "client", "endpoint"), "${missing}");
    }
}
