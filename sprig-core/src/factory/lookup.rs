use std::sync::Arc;

use crate::annotation::{MergedAnnotation, SearchStrategy};
use crate::bean::{AliasRegistry, BeanDefinition, BeanDefinitionRegistry};
use crate::constants::FACTORY_BEAN_PREFIX;
use crate::error::ContainerResult;
use crate::types::{Capabilities, MethodMetadata, ResolvableType, TypeIntrospector, TypeMetadata};
use crate::value::BeanObject;

use super::default::{is_factory_dereference, DefaultListableBeanFactory};
use super::{HierarchicalBeanFactory, ListableBeanFactory};

/// 类型预测与按类型查找
impl DefaultListableBeanFactory {
    pub(crate) fn metadata_for_class(&self, class_name: &str) -> Option<Arc<TypeMetadata>> {
        self.types.describe(class_name)
    }

    /// 工厂方法的元数据：实例工厂方法在工厂 bean 的类型上查找
    pub(super) fn factory_method_metadata(&self, mbd: &BeanDefinition) -> Option<(Arc<TypeMetadata>, MethodMetadata)> {
        let method_name = mbd.factory_method_name.as_deref()?;
        let (owner, is_static) = match &mbd.factory_bean_name {
            Some(factory_bean) => {
                let factory_type = self.get_type_inner(factory_bean, false).ok().flatten()?;
                (self.metadata_for_class(factory_type.raw_name()?)?, false)
            }
            None => (self.metadata_for_class(mbd.bean_class_name.as_deref()?)?, true),
        };
        let method = owner
            .methods()
            .iter()
            .find(|m| m.name == method_name && m.is_static == is_static)?
            .clone();
        Some((owner, method))
    }

    /// 不创建实例的前提下预测 bean 的类型
    pub(crate) fn predict_bean_type(&self, bean_name: &str, mbd: &BeanDefinition) -> Option<ResolvableType> {
        if let Some(target) = &mbd.target_type {
            return Some(self.types.canonicalize(target.clone()));
        }
        if mbd.has_factory_method() {
            return self
                .factory_method_metadata(mbd)
                .and_then(|(_, method)| method.return_type)
                .map(|ty| self.types.canonicalize(ty));
        }
        let class_name = mbd.bean_class_name.as_deref()?;
        let Some(metadata) = self.metadata_for_class(class_name) else {
            return Some(ResolvableType::class(class_name));
        };
        for processor in self.post_processors.read().iter() {
            if let Some(smart) = processor.as_smart_instantiation_aware() {
                if let Some(predicted) = smart.predict_bean_type(&metadata, bean_name) {
                    return Some(predicted);
                }
            }
        }
        Some(metadata.as_type())
    }

    pub(crate) fn is_factory_bean_type(&self, ty: &ResolvableType) -> bool {
        ty.raw_name()
            .and_then(|raw| self.metadata_for_class(raw))
            .is_some_and(|m| m.capabilities().factory_bean.is_some())
    }

    /// FactoryBean 产物的类型；`allow_init` 为真时可以为此创建工厂
    fn type_for_factory_bean(&self, bean_name: &str, mbd: &BeanDefinition, allow_init: bool) -> Option<ResolvableType> {
        if let Some(ty) = &mbd.factory_bean_object_type {
            return Some(ty.clone());
        }
        let existing = self.singletons.get_singleton(bean_name);
        let factory = match existing {
            Some(instance) => self
                .types
                .describe_instance(&instance)
                .and_then(|m| m.capabilities().factory_bean.clone())
                .and_then(|cast| cast(&instance)),
            None if allow_init && mbd.is_singleton() => match self.factory_bean_instance(bean_name) {
                Ok(factory) => factory,
                Err(e) => {
                    tracing::debug!(
                        "Failed to determine object type of FactoryBean '{}': {}",
                        bean_name,
                        e
                    );
                    None
                }
            },
            None => None,
        };
        factory.and_then(|f| f.object_type())
    }

    fn instance_type(&self, instance: &BeanObject) -> Option<ResolvableType> {
        self.types.describe_instance(instance).map(|m| m.as_type())
    }

    pub(super) fn is_type_match_inner(
        &self,
        name: &str,
        type_to_match: &ResolvableType,
        allow_factory_bean_init: bool,
    ) -> ContainerResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);

        if let Some(instance) = self.singletons.get_singleton_early(&bean_name, false)? {
            let factory = self
                .types
                .describe_instance(&instance)
                .and_then(|m| m.capabilities().factory_bean.clone())
                .and_then(|cast| cast(&instance));
            return Ok(match factory {
                Some(factory) if !dereference => factory
                    .object_type()
                    .is_some_and(|ty| type_to_match.is_assignable_from(&ty, self.types.as_ref())),
                _ if dereference && !self.is_factory_bean_instance(&instance) => false,
                _ => self.instance_assignable(&instance, type_to_match),
            });
        }

        if !self.has_local_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.is_type_match_inner(&self.original_bean_name(name), type_to_match, allow_factory_bean_init);
            }
            if self.singletons.contains_singleton(&bean_name) {
                return Ok(false);
            }
        }

        let mbd = self.merged_definition(&bean_name)?;
        let Some(predicted) = self.predict_bean_type(&bean_name, &mbd) else {
            return Ok(false);
        };
        if self.is_factory_bean_type(&predicted) {
            if dereference {
                return Ok(type_to_match.is_assignable_from(&predicted, self.types.as_ref()));
            }
            return Ok(self
                .type_for_factory_bean(&bean_name, &mbd, allow_factory_bean_init)
                .is_some_and(|ty| type_to_match.is_assignable_from(&ty, self.types.as_ref())));
        }
        Ok(!dereference && type_to_match.is_assignable_from(&predicted, self.types.as_ref()))
    }

    fn is_factory_bean_instance(&self, instance: &BeanObject) -> bool {
        self.types
            .describe_instance(instance)
            .is_some_and(|m| m.capabilities().factory_bean.is_some())
    }

    pub(super) fn get_type_inner(&self, name: &str, allow_factory_bean_init: bool) -> ContainerResult<Option<ResolvableType>> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);

        if let Some(instance) = self.singletons.get_singleton_early(&bean_name, false)? {
            let factory = self
                .types
                .describe_instance(&instance)
                .and_then(|m| m.capabilities().factory_bean.clone())
                .and_then(|cast| cast(&instance));
            return Ok(match factory {
                Some(factory) if !dereference => factory.object_type(),
                _ => self.instance_type(&instance),
            });
        }

        if !self.has_local_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.get_type_inner(&self.original_bean_name(name), allow_factory_bean_init);
            }
        }

        let mbd = self.merged_definition(&bean_name)?;
        let Some(predicted) = self.predict_bean_type(&bean_name, &mbd) else {
            return Ok(None);
        };
        if self.is_factory_bean_type(&predicted) && !dereference {
            return Ok(self.type_for_factory_bean(&bean_name, &mbd, allow_factory_bean_init));
        }
        Ok(Some(predicted))
    }

    /// 类型声明了某种回调能力的 bean 名称，不创建实例
    pub(crate) fn bean_names_with_capability(&self, predicate: &dyn Fn(&Capabilities) -> bool) -> Vec<String> {
        let mut result = Vec::new();
        for name in self.bean_definition_names() {
            let Ok(mbd) = self.merged_definition(&name) else {
                continue;
            };
            if mbd.is_abstract {
                continue;
            }
            let matched = self
                .predict_bean_type(&name, &mbd)
                .and_then(|ty| ty.raw_name().and_then(|raw| self.metadata_for_class(raw)))
                .is_some_and(|m| predicate(m.capabilities()));
            if matched {
                result.push(name);
            }
        }
        for name in self.manual_singleton_names.read().iter() {
            let matched = self
                .singletons
                .get_singleton(name)
                .and_then(|instance| self.types.describe_instance(&instance))
                .is_some_and(|m| predicate(m.capabilities()));
            if matched && !result.contains(name) {
                result.push(name.clone());
            }
        }
        result
    }

    fn definition_matches_type(
        &self,
        name: &str,
        mbd: &BeanDefinition,
        ty: &ResolvableType,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> ContainerResult<Option<String>> {
        let is_factory = self
            .predict_bean_type(name, mbd)
            .is_some_and(|predicted| self.is_factory_bean_type(&predicted));
        let allow_init = allow_eager_init && (!mbd.is_lazy_init() || self.singletons.contains_singleton(name));
        if is_factory {
            if (include_non_singletons || mbd.is_singleton()) && self.is_type_match_inner(name, ty, allow_init)? {
                return Ok(Some(name.to_string()));
            }
            let factory_name = format!("{}{}", FACTORY_BEAN_PREFIX, name);
            if (include_non_singletons || mbd.is_singleton()) && self.is_type_match_inner(&factory_name, ty, false)? {
                return Ok(Some(factory_name));
            }
            return Ok(None);
        }
        if (include_non_singletons || mbd.is_singleton()) && self.is_type_match_inner(name, ty, allow_init)? {
            return Ok(Some(name.to_string()));
        }
        Ok(None)
    }

    /// 本工厂中定义的合并结果
    pub(crate) fn local_definition(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        if self.has_local_definition(name) {
            self.merged_definition(name).ok()
        } else {
            None
        }
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn get_bean_names_for_type(
        &self,
        ty: &ResolvableType,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String> {
        let mut result = Vec::new();
        for name in self.bean_definition_names() {
            if self.aliases.is_alias(&name) {
                continue;
            }
            let Ok(mbd) = self.merged_definition(&name) else {
                continue;
            };
            if mbd.is_abstract {
                continue;
            }
            match self.definition_matches_type(&name, &mbd, ty, include_non_singletons, allow_eager_init) {
                Ok(Some(matched)) => result.push(matched),
                Ok(None) => {}
                Err(e) if allow_eager_init => {
                    tracing::debug!("Ignoring bean '{}' while matching type {}: {}", name, ty, e);
                }
                Err(e) => {
                    tracing::trace!("Ignoring bean '{}' while matching type {}: {}", name, ty, e);
                }
            }
        }

        let manual = self.manual_singleton_names.read().clone();
        for name in manual {
            if result.contains(&name) || self.has_local_definition(&name) {
                continue;
            }
            let Some(instance) = self.singletons.get_singleton(&name) else {
                continue;
            };
            if self.is_factory_bean_instance(&instance) {
                if self.is_type_match_inner(&name, ty, false).unwrap_or(false) {
                    result.push(name);
                } else if self.instance_assignable(&instance, ty) {
                    result.push(format!("{}{}", FACTORY_BEAN_PREFIX, name));
                }
            } else if self.instance_assignable(&instance, ty) {
                result.push(name);
            }
        }
        result
    }

    fn get_beans_of_type(&self, ty: &ResolvableType) -> ContainerResult<Vec<(String, BeanObject)>> {
        let mut result = Vec::new();
        for name in self.get_bean_names_for_type(ty, true, true) {
            match self.do_get_bean(&name, None, None) {
                Ok(bean) => {
                    if let Some(adapted) = self.adapt_bean(bean, ty) {
                        result.push((name, adapted));
                    }
                }
                Err(e) if e.is_currently_in_creation() => {
                    tracing::trace!("Ignoring match to currently created bean '{}': {}", name, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    fn get_bean_names_for_annotation(&self, annotation_type: &str) -> ContainerResult<Vec<String>> {
        let mut names = Vec::new();
        let mut candidates: Vec<String> = self
            .bean_definition_names()
            .into_iter()
            .filter(|name| self.local_definition(name).is_some_and(|mbd| !mbd.is_abstract))
            .collect();
        for name in self.manual_singleton_names.read().iter() {
            if !candidates.contains(name) {
                candidates.push(name.clone());
            }
        }
        for name in candidates {
            if self.find_annotation_on_bean(&name, annotation_type)?.is_some() {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn find_annotation_on_bean(
        &self,
        name: &str,
        annotation_type: &str,
    ) -> ContainerResult<Option<MergedAnnotation>> {
        if let Some(ty) = self.get_type_inner(name, false)? {
            if let Some(raw) = ty.raw_name() {
                if self.types.contains(raw) {
                    let merged = self.introspector.for_type(raw, SearchStrategy::TypeHierarchy)?;
                    if let Some(found) = merged.get(annotation_type) {
                        return Ok(Some(found.clone()));
                    }
                }
            }
        }
        let bean_name = self.transformed_bean_name(name);
        if let Some(mbd) = self.local_definition(&bean_name) {
            if let Some((owner, method)) = self.factory_method_metadata(&mbd) {
                let merged = self
                    .introspector
                    .for_method(owner.name(), &method, SearchStrategy::TypeHierarchy)?;
                if let Some(found) = merged.get(annotation_type) {
                    return Ok(Some(found.clone()));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::bean::{BeanDefinition, BeanDefinitionRegistry, FactoryBean};
    use crate::factory::{BeanFactory, DefaultListableBeanFactory, ListableBeanFactory};
    use crate::types::{ResolvableType, TypeMetadata};
    use crate::value::BeanObject;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    struct Connection;
    struct ConnectionFactory;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    impl FactoryBean for ConnectionFactory {
        fn get_object(&self) -> anyhow::Result<BeanObject> {
            Ok(Arc::new(Connection))
        }

        fn object_type(&self) -> Option<ResolvableType> {
            Some(ResolvableType::class("Connection"))
        }
    }

    fn factory() -> Arc<DefaultListableBeanFactory> {
        let factory = DefaultListableBeanFactory::new();
        let types = factory.types();
        types.register(TypeMetadata::interface("Greeter").build());
        types.register(
            TypeMetadata::named::<English>("English")
                .default_constructor(|| Ok(English))
                .implements_as::<dyn Greeter>(ResolvableType::class("Greeter"), |e| e as Arc<dyn Greeter>)
                .build(),
        );
        types.register(TypeMetadata::named::<Connection>("Connection").build());
        types.register(
            TypeMetadata::named::<ConnectionFactory>("ConnectionFactory")
                .default_constructor(|| Ok(ConnectionFactory))
                .factory_bean()
                .build(),
        );
        factory
    }

    #[test]
    fn test_names_for_interface_type() {
        let factory = factory();
        factory
            .register_bean_definition("english", BeanDefinition::class("English"))
            .unwrap();
        let names = factory.get_bean_names_for_type(&ResolvableType::class("Greeter"), true, false);
        assert_eq!(names, vec!["english"]);

        let beans = factory.get_beans_of_type(&ResolvableType::class("Greeter")).unwrap();
        let greeter = beans[0].1.clone().downcast::<Arc<dyn Greeter>>().unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_factory_bean_product_and_factory_names() {
        let factory = factory();
        factory
            .register_bean_definition("connection", BeanDefinition::class("ConnectionFactory"))
            .unwrap();

        let products = factory.get_bean_names_for_type(&ResolvableType::class("Connection"), true, true);
        assert_eq!(products, vec!["connection"]);
        let factories = factory.get_bean_names_for_type(&ResolvableType::class("ConnectionFactory"), true, true);
        assert_eq!(factories, vec!["&connection"]);

        assert!(factory.get_bean("connection").unwrap().is::<Connection>());
        assert!(factory.get_bean("&connection").unwrap().is::<ConnectionFactory>());
        assert_eq!(
            factory.get_type("connection").unwrap(),
            Some(ResolvableType::class("Connection"))
        );
    }
}
