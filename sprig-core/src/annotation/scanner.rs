use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ContainerResult;
use crate::types::{MethodMetadata, ResolvableType, TypeIntrospector, TypeMetadata};

use super::merged::{Aggregate, MergedAnnotations};
use super::standard::{is_plain_type, INHERITED};
use super::Annotation;

/// 注解搜索范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchStrategy {
    /// 只看元素自身
    Direct,
    /// 元素自身，加上父类链上标注了 `@Inherited` 的注解
    InheritedAnnotations,
    /// 元素自身与整条父类链
    Superclass,
    /// 父类与接口组成的完整层级，广度优先
    TypeHierarchy,
}

/// 可携带注解的元素
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotatedElement {
    Type(String),
    Method {
        owner: String,
        name: String,
        params: Vec<ResolvableType>,
    },
}

impl AnnotatedElement {
    pub fn method(owner: &str, method: &MethodMetadata) -> Self {
        AnnotatedElement::Method {
            owner: owner.to_string(),
            name: method.name.clone(),
            params: method.param_types(),
        }
    }
}

struct AnnotationsScanner<'a> {
    types: &'a dyn TypeIntrospector,
    include_enclosing: bool,
}

impl AnnotationsScanner<'_> {
    fn scan(&self, element: &AnnotatedElement, strategy: SearchStrategy) -> Vec<Aggregate> {
        match element {
            AnnotatedElement::Type(name) => self.scan_type(name, strategy),
            AnnotatedElement::Method { owner, name, params } => {
                self.scan_method(owner, name, params, strategy)
            }
        }
    }

    fn scan_type(&self, name: &str, strategy: SearchStrategy) -> Vec<Aggregate> {
        let mut aggregates = Vec::new();
        match strategy {
            SearchStrategy::Direct => {
                if let Some(metadata) = self.describe(name) {
                    aggregates.push(aggregate(0, name, metadata.annotations().to_vec()));
                }
            }
            SearchStrategy::InheritedAnnotations | SearchStrategy::Superclass => {
                let inherited_only = strategy == SearchStrategy::InheritedAnnotations;
                for (index, metadata) in self.superclass_chain(name).into_iter().enumerate() {
                    let annotations: Vec<Annotation> = metadata
                        .annotations()
                        .iter()
                        .filter(|a| index == 0 || !inherited_only || self.is_inherited(a))
                        .cloned()
                        .collect();
                    aggregates.push(aggregate(index, metadata.name(), annotations));
                }
            }
            SearchStrategy::TypeHierarchy => {
                for (index, metadata) in self.hierarchy(name).into_iter().enumerate() {
                    aggregates.push(aggregate(index, metadata.name(), metadata.annotations().to_vec()));
                }
            }
        }
        aggregates
    }

    fn scan_method(
        &self,
        owner: &str,
        name: &str,
        params: &[ResolvableType],
        strategy: SearchStrategy,
    ) -> Vec<Aggregate> {
        let types = match strategy {
            SearchStrategy::Direct | SearchStrategy::InheritedAnnotations => {
                self.describe(owner).into_iter().collect()
            }
            SearchStrategy::Superclass => self.superclass_chain(owner),
            SearchStrategy::TypeHierarchy => self.hierarchy(owner),
        };
        let mut aggregates = Vec::new();
        for metadata in types {
            let declared = metadata
                .methods()
                .iter()
                .find(|m| overrides(m, name, params));
            if let Some(method) = declared {
                let source = format!("{}#{}", metadata.name(), method.signature());
                aggregates.push(aggregate(aggregates.len(), &source, method.annotations.clone()));
            }
        }
        aggregates
    }

    fn describe(&self, name: &str) -> Option<Arc<TypeMetadata>> {
        if is_plain_type(name) {
            return None;
        }
        self.types.describe(name)
    }

    fn superclass_chain(&self, name: &str) -> Vec<Arc<TypeMetadata>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(name.to_string());
        while let Some(type_name) = current.take() {
            if !seen.insert(type_name.clone()) {
                break;
            }
            let Some(metadata) = self.describe(&type_name) else {
                break;
            };
            current = metadata
                .super_type()
                .and_then(|s| s.raw_name())
                .map(str::to_string);
            chain.push(metadata);
        }
        chain
    }

    /// 广度优先：自身、接口、父类，按需包含外部类
    fn hierarchy(&self, name: &str) -> Vec<Arc<TypeMetadata>> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([name.to_string()]);
        while let Some(type_name) = queue.pop_front() {
            if !seen.insert(type_name.clone()) {
                continue;
            }
            let Some(metadata) = self.describe(&type_name) else {
                continue;
            };
            for interface in metadata.interfaces() {
                if let Some(raw) = interface.raw_name() {
                    queue.push_back(raw.to_string());
                }
            }
            if let Some(raw) = metadata.super_type().and_then(|s| s.raw_name()) {
                queue.push_back(raw.to_string());
            }
            if self.include_enclosing {
                if let Some(enclosing) = metadata.enclosing() {
                    queue.push_back(enclosing.to_string());
                }
            }
            result.push(metadata);
        }
        result
    }

    fn is_inherited(&self, annotation: &Annotation) -> bool {
        self.types
            .describe(annotation.type_name())
            .is_some_and(|m| m.annotations().iter().any(|a| a.type_name() == INHERITED))
    }
}

fn aggregate(index: usize, source: &str, annotations: Vec<Annotation>) -> Aggregate {
    Aggregate {
        index,
        source: source.to_string(),
        annotations,
    }
}

/// 父类型上的泛型参数（类型变量）可以匹配子类型上的任意具体参数
fn overrides(candidate: &MethodMetadata, name: &str, params: &[ResolvableType]) -> bool {
    candidate.name == name
        && !candidate.is_static
        && candidate.params.len() == params.len()
        && candidate
            .params
            .iter()
            .zip(params)
            .all(|(declared, actual)| {
                &declared.ty == actual || matches!(declared.ty, ResolvableType::Variable(_))
            })
}

/// 带缓存的合并注解查询
///
/// 缓存归属于所在的 bean 工厂，类型元数据变化后调用 [`clear_cache`](Self::clear_cache)。
pub struct AnnotationIntrospector {
    types: Arc<dyn TypeIntrospector>,
    include_enclosing: bool,
    cache: RwLock<HashMap<(AnnotatedElement, SearchStrategy), Arc<MergedAnnotations>>>,
}

impl AnnotationIntrospector {
    pub fn new(types: Arc<dyn TypeIntrospector>) -> Self {
        Self {
            types,
            include_enclosing: false,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 层级搜索时是否把外部类也算进来
    pub fn with_enclosing_classes(mut self, include: bool) -> Self {
        self.include_enclosing = include;
        self
    }

    pub fn get(
        &self,
        element: &AnnotatedElement,
        strategy: SearchStrategy,
    ) -> ContainerResult<Arc<MergedAnnotations>> {
        let key = (element.clone(), strategy);
        if let Some(cached) = self.cache.read().get(&key) {
            return Ok(cached.clone());
        }
        let scanner = AnnotationsScanner {
            types: self.types.as_ref(),
            include_enclosing: self.include_enclosing,
        };
        let aggregates = scanner.scan(element, strategy);
        let merged = Arc::new(MergedAnnotations::from_aggregates(aggregates, self.types.as_ref())?);
        self.cache.write().insert(key, merged.clone());
        Ok(merged)
    }

    pub fn for_type(&self, type_name: &str, strategy: SearchStrategy) -> ContainerResult<Arc<MergedAnnotations>> {
        self.get(&AnnotatedElement::Type(type_name.to_string()), strategy)
    }

    pub fn for_method(
        &self,
        owner: &str,
        method: &MethodMetadata,
        strategy: SearchStrategy,
    ) -> ContainerResult<Arc<MergedAnnotations>> {
        self.get(&AnnotatedElement::method(owner, method), strategy)
    }

    /// 参数、属性等只有直接注解的元素，不缓存
    pub fn for_annotations(&self, annotations: &[Annotation], source: &str) -> ContainerResult<MergedAnnotations> {
        MergedAnnotations::from_annotations(annotations, source, self.types.as_ref())
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::standard::{EVENT_LISTENER, ORDER, QUALIFIER};
    use crate::types::{ParameterMetadata, TypeRegistry};

    struct Base;
    struct Sub;

    fn introspector() -> AnnotationIntrospector {
        let registry = TypeRegistry::new();
        registry.register(
            TypeMetadata::interface("Listener")
                .annotated(Annotation::value(ORDER, 5))
                .method(
                    MethodMetadata::new("on_event")
                        .param(ParameterMetadata::new("event", ResolvableType::class("Event")))
                        .annotated(Annotation::new(EVENT_LISTENER)),
                )
                .build(),
        );
        registry.register(
            TypeMetadata::named::<Base>("Base")
                .annotated(Annotation::value(QUALIFIER, "base"))
                .annotated(Annotation::new("Transactional"))
                .implements(ResolvableType::class("Listener"))
                .build(),
        );
        registry.register(
            TypeMetadata::named::<Sub>("Sub")
                .extends(ResolvableType::class("Base"))
                .method(
                    MethodMetadata::new("on_event")
                        .param(ParameterMetadata::new("event", ResolvableType::class("Event"))),
                )
                .build(),
        );
        AnnotationIntrospector::new(Arc::new(registry))
    }

    #[test]
    fn test_inherited_annotations_strategy() {
        let introspector = introspector();
        let direct = introspector.for_type("Sub", SearchStrategy::Direct).unwrap();
        assert!(direct.is_empty());

        let inherited = introspector
            .for_type("Sub", SearchStrategy::InheritedAnnotations)
            .unwrap();
        assert!(inherited.is_present(QUALIFIER));
        assert!(!inherited.is_present("Transactional"));

        let superclass = introspector.for_type("Sub", SearchStrategy::Superclass).unwrap();
        assert!(superclass.is_present("Transactional"));
        assert!(!superclass.is_present(ORDER));
    }

    #[test]
    fn test_type_hierarchy_includes_interfaces() {
        let introspector = introspector();
        let merged = introspector.for_type("Sub", SearchStrategy::TypeHierarchy).unwrap();
        let order = merged.get(ORDER).unwrap();
        assert_eq!(order.int("value"), Some(5));
        assert_eq!(order.aggregate_index(), 2);
    }

    #[test]
    fn test_overridden_method_inherits_annotation() {
        let introspector = introspector();
        let registry_method = MethodMetadata::new("on_event")
            .param(ParameterMetadata::new("event", ResolvableType::class("Event")));
        let direct = introspector
            .for_method("Sub", &registry_method, SearchStrategy::Direct)
            .unwrap();
        assert!(!direct.is_present(EVENT_LISTENER));

        let hierarchy = introspector
            .for_method("Sub", &registry_method, SearchStrategy::TypeHierarchy)
            .unwrap();
        assert!(hierarchy.is_present(EVENT_LISTENER));
        assert!(!hierarchy.get(EVENT_LISTENER).unwrap().is_directly_present());
    }

    #[test]
    fn test_cache_can_be_cleared() {
        let introspector = introspector();
        introspector.for_type("Sub", SearchStrategy::Direct).unwrap();
        introspector.for_type("Sub", SearchStrategy::Direct).unwrap();
        assert_eq!(introspector.cache_size(), 1);
        introspector.clear_cache();
        assert_eq!(introspector.cache_size(), 0);
    }
}
