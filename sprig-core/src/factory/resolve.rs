use std::sync::Arc;

use crate::annotation::{standard, MergedAnnotation, SearchStrategy};
use crate::bean::{BeanDefinition, BeanMetadataValue};
use crate::constants::{GENERATED_BEAN_NAME_SEPARATOR, INNER_BEAN_PREFIX};
use crate::convert::TypeConverter;
use crate::error::{ContainerError, ContainerResult};
use crate::types::{ResolvableType, TypeIntrospector};
use crate::value::{BeanObject, Value};

use super::default::DefaultListableBeanFactory;
use super::{
    BeanFactory, ConfigurableBeanFactory, DependencyDescriptor, HierarchicalBeanFactory, ListableBeanFactory,
    ObjectProvider, OrderComparator,
};

/// 注入候选：容器中的 bean，或注册为可解析依赖的对象
struct Candidate {
    name: Option<String>,
    instance: Option<BeanObject>,
}

impl Candidate {
    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| "(resolvable dependency)".to_string())
    }
}

fn ambiguous(ty: &ResolvableType, candidates: Vec<String>, reason: String) -> ContainerError {
    ContainerError::NoUniqueBeanDefinition {
        required_type: ty.to_string(),
        message: format!("{}: {}", reason, candidates.join(",")),
        candidates,
    }
}

/// 依赖解析与定义中值的解析
impl DefaultListableBeanFactory {
    /// 解析注入点；`autowired` 收集实际注入的 bean 名称
    pub(crate) fn do_resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting: Option<&str>,
        autowired: &mut Vec<String>,
    ) -> ContainerResult<Value> {
        let ty = descriptor.dependency_type();

        if ty.is_optional() {
            let inner = descriptor.nested(ty.generic(0).clone(), false);
            return self.do_resolve_dependency(&inner, requesting, autowired);
        }
        if ty.is_provider() {
            let inner = descriptor.nested(ty.generic(0).clone(), descriptor.is_required());
            return Ok(Value::Provider(ObjectProvider::new(self.self_ref.clone(), inner, requesting)));
        }

        if let Some(expression) = self.suggested_value(descriptor)? {
            let resolved = self.resolve_embedded_value(&expression)?;
            return self.convert_value(Value::Text(resolved), ty, descriptor.dependency_name());
        }

        if let Some(multiple) = self.resolve_multiple_beans(descriptor, requesting, autowired)? {
            return Ok(multiple);
        }

        let mut candidates = self.find_autowire_candidates(requesting, ty, descriptor, false)?;
        if candidates.is_empty() {
            if descriptor.is_required() {
                return Err(ContainerError::NoSuchBeanOfType {
                    required_type: ty.to_string(),
                    message: format!(
                        "expected at least 1 bean which qualifies as autowire candidate. Dependency: {}",
                        descriptor
                    ),
                });
            }
            return Ok(Value::Null);
        }

        let chosen = if candidates.len() > 1 {
            match self.determine_autowire_candidate(&candidates, descriptor)? {
                Some(index) => candidates.swap_remove(index),
                None => {
                    return Err(ContainerError::no_unique(
                        ty.to_string(),
                        candidates.iter().map(Candidate::label).collect(),
                    ))
                }
            }
        } else {
            candidates.swap_remove(0)
        };

        let instance = match (chosen.instance, chosen.name) {
            (Some(instance), _) => instance,
            (None, Some(name)) => {
                let bean = self.get_bean(&name)?;
                autowired.push(name);
                bean
            }
            (None, None) => return Ok(Value::Null),
        };
        let actual = self
            .types
            .describe_instance(&instance)
            .map_or_else(|| "unknown".to_string(), |m| m.name().to_string());
        self.adapt_bean(instance, ty)
            .map(Value::Object)
            .ok_or_else(|| ContainerError::BeanNotOfRequiredType {
                bean_name: autowired.last().cloned().unwrap_or_default(),
                required_type: ty.to_string(),
                actual_type: actual,
            })
    }

    /// 注入点上 `@Value` 的表达式
    fn suggested_value(&self, descriptor: &DependencyDescriptor) -> ContainerResult<Option<String>> {
        if descriptor.annotations().is_empty() {
            return Ok(None);
        }
        let merged = self
            .introspector
            .for_annotations(descriptor.annotations(), descriptor.injection_point())?;
        Ok(merged
            .get(standard::VALUE)
            .and_then(|value| value.string("value"))
            .map(str::to_string))
    }

    /// 集合、数组与映射注入点：收集全部匹配的 bean
    fn resolve_multiple_beans(
        &self,
        descriptor: &DependencyDescriptor,
        requesting: Option<&str>,
        autowired: &mut Vec<String>,
    ) -> ContainerResult<Option<Value>> {
        let ty = descriptor.dependency_type();
        let (element, as_map) = match ty.element_type() {
            Some(element) => (element.clone(), false),
            None if ty.is_map() => (ty.generic(1).clone(), true),
            None => return Ok(None),
        };
        if matches!(element, ResolvableType::Unresolved) {
            return Ok(None);
        }

        let nested = descriptor.nested(element.clone(), true);
        let candidates = self.find_autowire_candidates(requesting, &element, &nested, true)?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut matched: Vec<(String, BeanObject)> = Vec::new();
        for candidate in candidates {
            let label = candidate.label();
            let instance = match (candidate.instance, candidate.name) {
                (Some(instance), _) => instance,
                (None, Some(name)) => match self.get_bean(&name) {
                    Ok(bean) => {
                        autowired.push(name);
                        bean
                    }
                    Err(e) if e.is_currently_in_creation() => {
                        tracing::trace!("Skipping currently created bean '{}' for collection injection", name);
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                (None, None) => continue,
            };
            matched.push((label, instance));
        }

        if !as_map {
            let comparator = OrderComparator::new(&self.types, &self.introspector);
            comparator.sort(&mut matched, |(_, bean)| bean);
        }

        let adapted = matched
            .into_iter()
            .filter_map(|(name, bean)| self.adapt_bean(bean, &element).map(|b| (name, Value::Object(b))));
        Ok(Some(if as_map {
            Value::Map(adapted.collect())
        } else {
            Value::List(adapted.map(|(_, v)| v).collect())
        }))
    }

    /// 按类型、限定符找出全部候选；没有其他候选时才考虑自引用
    fn find_autowire_candidates(
        &self,
        requesting: Option<&str>,
        required: &ResolvableType,
        descriptor: &DependencyDescriptor,
        multiple: bool,
    ) -> ContainerResult<Vec<Candidate>> {
        let mut result = Vec::new();

        let resolvable = self.resolvable_dependencies.read().clone();
        for (ty, supplier) in resolvable {
            let exact = &ty == required;
            if !exact && !required.is_assignable_from(&ty, self.types.as_ref()) {
                continue;
            }
            let Some(instance) = supplier() else {
                continue;
            };
            let instance = if exact { Some(instance) } else { self.adapt_bean(instance, required) };
            if let Some(instance) = instance {
                result.push(Candidate {
                    name: None,
                    instance: Some(instance),
                });
            }
        }

        let names = self.bean_names_including_ancestors(required, descriptor.is_eager());
        for name in &names {
            if !self.is_self_reference(requesting, name) && self.is_autowire_candidate_inner(name, descriptor)? {
                result.push(Candidate {
                    name: Some(name.clone()),
                    instance: None,
                });
            }
        }

        if result.is_empty() {
            for name in &names {
                let same_bean = requesting == Some(name.as_str());
                if self.is_self_reference(requesting, name)
                    && (!multiple || !same_bean)
                    && self.is_autowire_candidate_inner(name, descriptor)?
                {
                    result.push(Candidate {
                        name: Some(name.clone()),
                        instance: None,
                    });
                }
            }
        }
        Ok(result)
    }

    fn bean_names_including_ancestors(&self, ty: &ResolvableType, allow_eager_init: bool) -> Vec<String> {
        let mut names = self.get_bean_names_for_type(ty, true, allow_eager_init);
        if let Some(parent) = self.parent_bean_factory() {
            for name in parent.bean_names_including_ancestors(ty, allow_eager_init) {
                if !names.contains(&name) && !self.contains_local_bean(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn is_self_reference(&self, requesting: Option<&str>, candidate: &str) -> bool {
        let Some(requesting) = requesting else {
            return false;
        };
        if requesting == candidate {
            return true;
        }
        self.local_definition(candidate)
            .is_some_and(|mbd| mbd.factory_bean_name.as_deref() == Some(requesting))
    }

    /// 名称匹配、唯一的 primary、最高 `@Priority`、可解析依赖，依次决出
    fn determine_autowire_candidate(
        &self,
        candidates: &[Candidate],
        descriptor: &DependencyDescriptor,
    ) -> ContainerResult<Option<usize>> {
        if let Some(dependency_name) = descriptor.dependency_name() {
            let by_name = candidates.iter().position(|c| {
                c.name
                    .as_deref()
                    .is_some_and(|name| self.matches_bean_name(name, dependency_name))
            });
            if by_name.is_some() {
                return Ok(by_name);
            }
        }

        let primaries: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name.as_deref().is_some_and(|name| self.is_primary(name)))
            .map(|(i, _)| i)
            .collect();
        match primaries.len() {
            1 => return Ok(Some(primaries[0])),
            0 => {}
            _ => {
                return Err(ambiguous(
                    descriptor.dependency_type(),
                    primaries.iter().map(|&i| candidates[i].label()).collect(),
                    "more than one 'primary' bean found among candidates".to_string(),
                ))
            }
        }

        let comparator = OrderComparator::new(&self.types, &self.introspector);
        let mut highest: Option<(usize, i32)> = None;
        let mut tied = false;
        for (i, candidate) in candidates.iter().enumerate() {
            let Some(priority) = self
                .candidate_type_name(candidate)
                .and_then(|ty| comparator.priority_of_type(&ty))
            else {
                continue;
            };
            match highest {
                Some((_, best)) if priority == best => tied = true,
                Some((_, best)) if priority > best => {}
                _ => {
                    highest = Some((i, priority));
                    tied = false;
                }
            }
        }
        if let Some((index, priority)) = highest {
            if tied {
                return Err(ambiguous(
                    descriptor.dependency_type(),
                    candidates.iter().map(Candidate::label).collect(),
                    format!("multiple beans found with the same priority ('{}') among candidates", priority),
                ));
            }
            return Ok(Some(index));
        }

        Ok(candidates.iter().position(|c| c.name.is_none()))
    }

    fn candidate_type_name(&self, candidate: &Candidate) -> Option<String> {
        if let Some(instance) = &candidate.instance {
            return self.types.describe_instance(instance).map(|m| m.name().to_string());
        }
        let name = candidate.name.as_deref()?;
        self.get_type_inner(name, false)
            .ok()
            .flatten()
            .and_then(|ty| ty.raw_name().map(str::to_string))
    }

    fn matches_bean_name(&self, bean_name: &str, candidate: &str) -> bool {
        let canonical = self.transformed_bean_name(bean_name);
        canonical == candidate || self.get_aliases(&canonical).iter().any(|alias| alias == candidate)
    }

    /// 定义没有显式设置 lazy-init 时，由类型上的 `@Lazy` 决定
    pub(crate) fn is_lazy_init(&self, name: &str, mbd: &BeanDefinition) -> bool {
        if let Some(lazy) = mbd.lazy_init {
            return lazy;
        }
        self.get_type_inner(name, false)
            .ok()
            .flatten()
            .and_then(|ty| ty.raw_name().map(str::to_string))
            .filter(|raw| self.types.contains(raw))
            .and_then(|raw| self.introspector.for_type(&raw, SearchStrategy::TypeHierarchy).ok())
            .and_then(|merged| merged.get(standard::LAZY).map(|lazy| lazy.bool("value").unwrap_or(true)))
            .unwrap_or(false)
    }

    /// 定义标记为 primary，或类型上声明了 `@Primary`
    pub(crate) fn is_primary(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        if let Some(mbd) = self.local_definition(&bean_name) {
            if mbd.primary {
                return true;
            }
        } else if let Some(parent) = self.parent_bean_factory() {
            if !self.singletons.contains_singleton(&bean_name) {
                return parent.is_primary(&bean_name);
            }
        }
        self.get_type_inner(&bean_name, false)
            .ok()
            .flatten()
            .and_then(|ty| ty.raw_name().map(str::to_string))
            .filter(|raw| self.types.contains(raw))
            .and_then(|raw| self.introspector.for_type(&raw, SearchStrategy::TypeHierarchy).ok())
            .is_some_and(|merged| merged.is_present(standard::PRIMARY))
    }

    pub(super) fn is_autowire_candidate_inner(
        &self,
        name: &str,
        descriptor: &DependencyDescriptor,
    ) -> ContainerResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        if self.has_local_definition(&bean_name) {
            let mbd = self.merged_definition(&bean_name)?;
            if !mbd.autowire_candidate {
                return Ok(false);
            }
            return self.qualifiers_match(&bean_name, Some(&mbd), descriptor);
        }
        if self.singletons.contains_singleton(&bean_name) {
            return self.qualifiers_match(&bean_name, None, descriptor);
        }
        match self.parent_bean_factory() {
            Some(parent) => parent.is_autowire_candidate_inner(name, descriptor),
            None => Ok(true),
        }
    }

    /// 注入点上的每个限定符注解都必须与候选匹配
    fn qualifiers_match(
        &self,
        bean_name: &str,
        mbd: Option<&BeanDefinition>,
        descriptor: &DependencyDescriptor,
    ) -> ContainerResult<bool> {
        if descriptor.annotations().is_empty() {
            return Ok(true);
        }
        let merged = self
            .introspector
            .for_annotations(descriptor.annotations(), descriptor.injection_point())?;
        for expected in merged.iter().filter(|a| a.is_directly_present()) {
            if !self.is_qualifier(expected.type_name())? {
                continue;
            }
            if !self.check_qualifier(bean_name, mbd, expected)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn is_qualifier(&self, annotation_type: &str) -> ContainerResult<bool> {
        if annotation_type == standard::QUALIFIER {
            return Ok(true);
        }
        if !self.types.contains(annotation_type) {
            return Ok(false);
        }
        Ok(self
            .introspector
            .for_type(annotation_type, SearchStrategy::Direct)?
            .is_present(standard::QUALIFIER))
    }

    fn check_qualifier(
        &self,
        bean_name: &str,
        mbd: Option<&BeanDefinition>,
        expected: &MergedAnnotation,
    ) -> ContainerResult<bool> {
        let type_name = expected.type_name();
        let definition_qualifier = mbd.and_then(|m| m.qualifiers.iter().find(|q| q.type_name() == type_name));

        if definition_qualifier.is_none() {
            if let Some(target) = self.find_annotation_on_bean(bean_name, type_name)? {
                if target.attributes() == expected.attributes() {
                    return Ok(true);
                }
            }
        }

        if expected.attributes().is_empty() && definition_qualifier.is_none() {
            return Ok(false);
        }
        for (attribute, value) in expected.attributes() {
            let mut actual = definition_qualifier.and_then(|q| q.attribute(attribute)).cloned();
            if actual.is_none()
                && attribute == "value"
                && value.as_str().is_some_and(|name| self.matches_bean_name(bean_name, name))
            {
                continue;
            }
            if actual.is_none() && definition_qualifier.is_some() {
                actual = self
                    .types
                    .describe(type_name)
                    .and_then(|m| m.attribute(attribute).and_then(|a| a.default_value.clone()));
            }
            if actual.as_ref() != Some(value) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 按类型查找唯一的 bean，没有候选时询问父工厂
    pub(crate) fn resolve_named_bean_inner(
        &self,
        required: &ResolvableType,
    ) -> ContainerResult<Option<(String, BeanObject)>> {
        let mut names = self.get_bean_names_for_type(required, true, true);
        if names.len() > 1 {
            let descriptor = DependencyDescriptor::new(required.clone(), true);
            let mut filtered = Vec::new();
            for name in &names {
                let explicit_candidate = self
                    .local_definition(name)
                    .map_or(true, |mbd| mbd.autowire_candidate);
                if explicit_candidate && self.is_autowire_candidate_inner(name, &descriptor)? {
                    filtered.push(name.clone());
                }
            }
            if !filtered.is_empty() {
                names = filtered;
            }
        }

        match names.len() {
            0 => match self.parent_bean_factory() {
                Some(parent) => parent.resolve_named_bean_inner(required),
                None => Ok(None),
            },
            1 => {
                let bean = self.do_get_bean(&names[0], Some(required), None)?;
                Ok(Some((names.swap_remove(0), bean)))
            }
            _ => {
                let candidates: Vec<Candidate> = names
                    .iter()
                    .map(|name| Candidate {
                        name: Some(name.clone()),
                        instance: None,
                    })
                    .collect();
                let descriptor = DependencyDescriptor::new(required.clone(), true);
                let chosen = {
                    let primaries: Vec<&String> = names.iter().filter(|n| self.is_primary(n)).collect();
                    match primaries.len() {
                        1 => Some(primaries[0].clone()),
                        0 => self
                            .determine_autowire_candidate(&candidates, &descriptor)?
                            .map(|i| names[i].clone()),
                        _ => None,
                    }
                };
                match chosen {
                    Some(name) => {
                        let bean = self.do_get_bean(&name, Some(required), None)?;
                        Ok(Some((name, bean)))
                    }
                    None => Err(ContainerError::no_unique(required.to_string(), names)),
                }
            }
        }
    }

    /// 把定义中的值解析为注入用的值：引用、内部 bean、集合逐项处理
    pub(crate) fn resolve_metadata_value(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        value: &BeanMetadataValue,
    ) -> ContainerResult<Value> {
        match value {
            BeanMetadataValue::Null => Ok(Value::Null),
            BeanMetadataValue::Literal(text) => Ok(Value::Text(self.resolve_embedded_value(text)?)),
            BeanMetadataValue::Typed(value) => Ok(value.clone()),
            BeanMetadataValue::Reference(reference) => {
                let ref_name = self.resolve_embedded_value(&reference.name)?;
                if reference.to_parent {
                    let parent = self.parent_bean_factory().ok_or_else(|| {
                        ContainerError::bean_creation(
                            bean_name,
                            format!(
                                "Cannot resolve reference to bean '{}' in parent factory: no parent factory available",
                                ref_name
                            ),
                        )
                    })?;
                    return parent.get_bean(&ref_name).map(Value::Object);
                }
                let bean = self.get_bean(&ref_name).map_err(|e| {
                    ContainerError::wrap_creation(
                        bean_name,
                        format!("Cannot resolve reference to bean '{}'", ref_name),
                        e,
                    )
                })?;
                self.register_dependent_bean(&ref_name, bean_name);
                Ok(Value::Object(bean))
            }
            BeanMetadataValue::Inner(definition) => self.resolve_inner_bean(bean_name, mbd, definition),
            BeanMetadataValue::List(items) => items
                .iter()
                .map(|item| self.resolve_metadata_value(bean_name, mbd, item))
                .collect::<ContainerResult<Vec<_>>>()
                .map(Value::List),
            BeanMetadataValue::Map(entries) => entries
                .iter()
                .map(|(key, item)| {
                    Ok((
                        self.resolve_embedded_value(key)?,
                        self.resolve_metadata_value(bean_name, mbd, item)?,
                    ))
                })
                .collect::<ContainerResult<Vec<_>>>()
                .map(Value::Map),
        }
    }

    fn resolve_inner_bean(
        &self,
        outer_name: &str,
        outer: &BeanDefinition,
        definition: &BeanDefinition,
    ) -> ContainerResult<Value> {
        let inner_name = format!(
            "{}{}{}",
            INNER_BEAN_PREFIX,
            GENERATED_BEAN_NAME_SEPARATOR,
            self.next_inner_bean_id()
        );
        let mut merged = self.merge(&inner_name, definition, 0)?;
        if !outer.is_singleton() {
            merged.scope = outer.scope.clone();
        }
        for dependency in &merged.depends_on {
            self.register_dependent_bean(dependency, &inner_name);
            self.get_bean(dependency)?;
        }
        self.singletons.register_contained_bean(&inner_name, outer_name);

        let merged = Arc::new(merged);
        let bean = self
            .create_from_definition(&inner_name, &merged, None)
            .map_err(|e| ContainerError::wrap_creation(outer_name, "Cannot create inner bean", e))?;
        let bean = self.object_for_bean_instance(bean, &inner_name, &inner_name, Some(&merged))?;
        Ok(Value::Object(bean))
    }

    /// 按注入点类型转换；对象可直接赋值时不经过转换器
    pub(crate) fn convert_value(
        &self,
        value: Value,
        ty: &ResolvableType,
        property: Option<&str>,
    ) -> ContainerResult<Value> {
        match value {
            Value::Null | Value::Provider(_) => Ok(value),
            Value::Object(object) => match self.adapt_bean(object.clone(), ty) {
                Some(adapted) => Ok(Value::Object(adapted)),
                None => self.type_converter().convert_if_necessary(Value::Object(object), ty, property),
            },
            Value::List(items) if ty.element_type().is_some() => {
                let element = ty.element_type().cloned().unwrap_or(ResolvableType::Unresolved);
                items
                    .into_iter()
                    .map(|item| self.convert_value(item, &element, property))
                    .collect::<ContainerResult<Vec<_>>>()
                    .map(Value::List)
            }
            Value::Map(entries) if ty.is_map() => {
                let element = ty.generic(1).clone();
                entries
                    .into_iter()
                    .map(|(key, item)| Ok((key, self.convert_value(item, &element, property)?)))
                    .collect::<ContainerResult<Vec<_>>>()
                    .map(Value::Map)
            }
            other => self.type_converter().convert_if_necessary(other, ty, property),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::annotation::{standard, Annotation};
    use crate::bean::{BeanDefinition, BeanDefinitionRegistry};
    use crate::error::ContainerError;
    use crate::factory::{
        AutowireCapableBeanFactory, BeanFactoryExt, ConfigurableBeanFactory, DefaultListableBeanFactory,
        DependencyDescriptor,
    };
    use crate::types::{ResolvableType, TypeMetadata};
    use crate::value::Value;

    trait Store: Send + Sync {
        fn id(&self) -> &'static str;
    }

    struct Disk;
    struct Memory;

    impl Store for Disk {
        fn id(&self) -> &'static str {
            "disk"
        }
    }

    impl Store for Memory {
        fn id(&self) -> &'static str {
            "memory"
        }
    }

    fn factory() -> Arc<DefaultListableBeanFactory> {
        let factory = DefaultListableBeanFactory::new();
        let types = factory.types();
        types.register(TypeMetadata::interface("Store").build());
        types.register(
            TypeMetadata::named::<Disk>("Disk")
                .default_constructor(|| Ok(Disk))
                .implements_as::<dyn Store>(ResolvableType::class("Store"), |d| d as Arc<dyn Store>)
                .build(),
        );
        types.register(
            TypeMetadata::named::<Memory>("Memory")
                .default_constructor(|| Ok(Memory))
                .implements_as::<dyn Store>(ResolvableType::class("Store"), |m| m as Arc<dyn Store>)
                .build(),
        );
        factory.register_bean_definition("disk", BeanDefinition::class("Disk")).unwrap();
        factory.register_bean_definition("memory", BeanDefinition::class("Memory")).unwrap();
        factory
    }

    fn store_of(value: Value) -> &'static str {
        value.downcast_dyn::<dyn Store>().unwrap().id()
    }

    #[test]
    fn test_ambiguous_without_primary() {
        let factory = factory();
        let descriptor = DependencyDescriptor::new(ResolvableType::class("Store"), true);
        let err = factory.resolve_dependency(&descriptor, None).unwrap_err();
        assert!(matches!(err, ContainerError::NoUniqueBeanDefinition { .. }));
    }

    #[test]
    fn test_primary_wins() {
        let factory = factory();
        factory
            .register_bean_definition("memory", BeanDefinition::class("Memory").with_primary(true))
            .unwrap();
        let descriptor = DependencyDescriptor::new(ResolvableType::class("Store"), true);
        let value = factory.resolve_dependency(&descriptor, None).unwrap();
        assert_eq!(store_of(value), "memory");
        let store = factory.get_interface::<dyn Store>("Store").unwrap();
        assert_eq!(store.id(), "memory");
    }

    #[test]
    fn test_two_primaries_are_ambiguous() {
        let factory = factory();
        factory
            .register_bean_definition("memory", BeanDefinition::class("Memory").with_primary(true))
            .unwrap();
        factory
            .register_bean_definition("disk", BeanDefinition::class("Disk").with_primary(true))
            .unwrap();
        let descriptor = DependencyDescriptor::new(ResolvableType::class("Store"), true);
        assert!(factory
            .resolve_dependency(&descriptor, None)
            .unwrap_err()
            .is_no_unique_bean());
    }

    #[test]
    fn test_qualifier_and_dependency_name_select_candidate() {
        let factory = factory();
        let qualified = DependencyDescriptor::new(ResolvableType::class("Store"), true)
            .with_annotation(Annotation::value(standard::QUALIFIER, "disk"));
        assert_eq!(store_of(factory.resolve_dependency(&qualified, None).unwrap()), "disk");

        let named = DependencyDescriptor::new(ResolvableType::class("Store"), true).with_name("memory");
        assert_eq!(store_of(factory.resolve_dependency(&named, None).unwrap()), "memory");
    }

    #[test]
    fn test_collection_optional_and_missing() {
        let factory = factory();
        let all = DependencyDescriptor::new(ResolvableType::vec_of(ResolvableType::class("Store")), true);
        let stores = factory.resolve_dependency(&all, None).unwrap().dyn_list::<dyn Store>().unwrap();
        assert_eq!(stores.len(), 2);

        let optional = DependencyDescriptor::new(ResolvableType::option_of(ResolvableType::class("Cache")), true);
        assert!(factory.resolve_dependency(&optional, None).unwrap().is_null());

        let required = DependencyDescriptor::new(ResolvableType::class("Cache"), true);
        assert!(factory.resolve_dependency(&required, None).unwrap_err().is_no_such_bean());
    }

    #[test]
    fn test_value_annotation_uses_embedded_resolver() {
        let factory = factory();
        factory.add_embedded_value_resolver(Arc::new(|text: &str| {
            Ok::<_, ContainerError>(text.replace("${port}", "8080"))
        }));
        let descriptor = DependencyDescriptor::new(ResolvableType::of::<u16>(), true)
            .with_annotation(Annotation::value(standard::VALUE, "${port}"));
        let value = factory.resolve_dependency(&descriptor, None).unwrap();
        assert_eq!(value.get::<u16>().unwrap(), 8080);
    }

    #[test]
    fn test_resolve_named_bean_reports_name() {
        let factory = factory();
        factory
            .register_bean_definition("disk", BeanDefinition::class("Disk").with_primary(true))
            .unwrap();
        let (name, _) = factory.resolve_named_bean(&ResolvableType::class("Store")).unwrap();
        assert_eq!(name, "disk");
    }
}
