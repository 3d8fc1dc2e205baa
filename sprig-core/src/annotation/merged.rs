use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::error::{ContainerError, ContainerResult};
use crate::types::{ResolvableType, TypeIntrospector};

use super::standard::is_plain_annotation;
use super::{Annotation, AttributeValue};

/// 一次扫描得到的一组直接声明的注解（某个类型或方法上的全部注解）
#[derive(Debug, Clone)]
pub(crate) struct Aggregate {
    pub index: usize,
    pub source: String,
    pub annotations: Vec<Annotation>,
}

/// 合并后的注解视图
///
/// 属性值已应用默认值、同注解内的镜像属性，以及来自组合注解的覆盖。
#[derive(Debug, Clone)]
pub struct MergedAnnotation {
    type_name: String,
    attributes: BTreeMap<String, AttributeValue>,
    distance: usize,
    aggregate_index: usize,
    meta_types: Vec<String>,
    source: String,
}

impl MergedAnnotation {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.attributes.get(attribute)
    }

    pub fn string(&self, attribute: &str) -> Option<&str> {
        self.get(attribute).and_then(AttributeValue::as_str)
    }

    pub fn bool(&self, attribute: &str) -> Option<bool> {
        self.get(attribute).and_then(AttributeValue::as_bool)
    }

    pub fn int(&self, attribute: &str) -> Option<i64> {
        self.get(attribute).and_then(AttributeValue::as_int)
    }

    /// 类型数组属性
    pub fn classes(&self, attribute: &str) -> Vec<ResolvableType> {
        self.get(attribute)
            .map(|value| {
                value
                    .as_array()
                    .into_iter()
                    .filter_map(AttributeValue::as_class)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// 与直接声明处之间隔了几层元注解
    pub fn distance(&self) -> usize {
        self.distance
    }

    /// 所在的层级位置，0 表示元素自身
    pub fn aggregate_index(&self) -> usize {
        self.aggregate_index
    }

    pub fn is_directly_present(&self) -> bool {
        self.distance == 0 && self.aggregate_index == 0
    }

    pub fn is_meta_present(&self) -> bool {
        self.distance > 0
    }

    /// 直接声明的那个注解的类型
    pub fn root_type(&self) -> &str {
        self.meta_types.first().map(String::as_str).unwrap_or(&self.type_name)
    }

    /// 从直接声明的注解到当前注解的类型路径
    pub fn meta_types(&self) -> &[String] {
        &self.meta_types
    }

    /// 注解声明所在的元素
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// 多个合并注解的选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// 元注解层数最少者，平局时取先扫描到的
    Nearest,
    /// 第一个直接声明的，没有则取第一个
    FirstDirectlyDeclared,
}

/// 一个元素上全部合并注解，按（层级位置, 元注解层数）排序
#[derive(Debug, Clone, Default)]
pub struct MergedAnnotations {
    annotations: Vec<MergedAnnotation>,
}

struct Node {
    type_name: String,
    attributes: BTreeMap<String, AttributeValue>,
    explicit: BTreeSet<String>,
    path: Vec<usize>,
}

impl MergedAnnotations {
    pub(crate) fn from_aggregates(
        aggregates: Vec<Aggregate>,
        types: &dyn TypeIntrospector,
    ) -> ContainerResult<Self> {
        let mut annotations = Vec::new();
        for aggregate in &aggregates {
            for root in &aggregate.annotations {
                if is_plain_annotation(root.type_name()) {
                    continue;
                }
                merge_root(root, aggregate, types, &mut annotations)?;
            }
        }
        annotations.sort_by_key(|a| (a.aggregate_index, a.distance));
        Ok(Self { annotations })
    }

    /// 只处理直接给出的注解（参数、属性、构造器上的注解）
    pub fn from_annotations(
        annotations: &[Annotation],
        source: &str,
        types: &dyn TypeIntrospector,
    ) -> ContainerResult<Self> {
        Self::from_aggregates(
            vec![Aggregate {
                index: 0,
                source: source.to_string(),
                annotations: annotations.to_vec(),
            }],
            types,
        )
    }

    pub fn get(&self, type_name: &str) -> Option<&MergedAnnotation> {
        self.get_with(type_name, Selector::Nearest)
    }

    pub fn get_with(&self, type_name: &str, selector: Selector) -> Option<&MergedAnnotation> {
        let mut selected: Option<&MergedAnnotation> = None;
        for candidate in self.annotations.iter().filter(|a| a.type_name == type_name) {
            selected = match (selected, selector) {
                (None, _) => Some(candidate),
                (Some(existing), Selector::Nearest) if candidate.distance < existing.distance => {
                    Some(candidate)
                }
                (Some(existing), Selector::FirstDirectlyDeclared)
                    if existing.distance > 0 && candidate.distance == 0 =>
                {
                    Some(candidate)
                }
                (existing, _) => existing,
            };
        }
        selected
    }

    pub fn is_present(&self, type_name: &str) -> bool {
        self.stream(type_name).next().is_some()
    }

    pub fn is_directly_present(&self, type_name: &str) -> bool {
        self.stream(type_name).any(MergedAnnotation::is_directly_present)
    }

    pub fn stream<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a MergedAnnotation> + 'a {
        self.annotations.iter().filter(move |a| a.type_name == type_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedAnnotation> {
        self.annotations.iter()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

fn merge_root(
    root: &Annotation,
    aggregate: &Aggregate,
    types: &dyn TypeIntrospector,
    out: &mut Vec<MergedAnnotation>,
) -> ContainerResult<()> {
    let (attributes, explicit) = resolve_attributes(root, types)?;
    let mut nodes = vec![Node {
        type_name: root.type_name().to_string(),
        attributes,
        explicit,
        path: vec![0],
    }];
    let mut visited: HashSet<String> = HashSet::from([root.type_name().to_string()]);
    let mut queue = VecDeque::from([0usize]);

    while let Some(index) = queue.pop_front() {
        let Some(metadata) = types.describe(&nodes[index].type_name) else {
            continue;
        };
        for meta in metadata.annotations() {
            if is_plain_annotation(meta.type_name()) || !visited.insert(meta.type_name().to_string()) {
                continue;
            }
            let (mut attributes, mut explicit) = resolve_attributes(meta, types)?;
            // 先应用父级，再应用更靠近根的层级，根上的覆盖最终生效
            for &ancestor in nodes[index].path.iter().rev() {
                apply_overrides(&nodes[ancestor], meta, types, &mut attributes, &mut explicit);
            }
            let mut path = nodes[index].path.clone();
            path.push(nodes.len());
            nodes.push(Node {
                type_name: meta.type_name().to_string(),
                attributes,
                explicit,
                path,
            });
            queue.push_back(nodes.len() - 1);
        }
    }

    for node in &nodes {
        out.push(MergedAnnotation {
            type_name: node.type_name.clone(),
            attributes: node.attributes.clone(),
            distance: node.path.len() - 1,
            aggregate_index: aggregate.index,
            meta_types: node.path.iter().map(|&i| nodes[i].type_name.clone()).collect(),
            source: aggregate.source.clone(),
        });
    }
    Ok(())
}

/// 显式属性、镜像属性与默认值
fn resolve_attributes(
    annotation: &Annotation,
    types: &dyn TypeIntrospector,
) -> ContainerResult<(BTreeMap<String, AttributeValue>, BTreeSet<String>)> {
    let mut attributes = annotation.attributes().clone();
    let mut explicit: BTreeSet<String> = attributes.keys().cloned().collect();
    let Some(metadata) = types.describe(annotation.type_name()) else {
        return Ok((attributes, explicit));
    };

    for decl in metadata.attributes() {
        let Some(alias) = &decl.alias_for else {
            continue;
        };
        let is_mirror = alias
            .annotation
            .as_deref()
            .map_or(true, |target| target == annotation.type_name());
        if !is_mirror {
            continue;
        }
        let own = attributes.get(&decl.name).cloned();
        let other = attributes.get(&alias.attribute).cloned();
        match (own, other) {
            (Some(a), Some(b)) if a != b => {
                return Err(ContainerError::AnnotationConfiguration(format!(
                    "In annotation [{}] attribute '{}' and its alias '{}' are declared with values of [{}] and [{}]",
                    annotation.type_name(),
                    decl.name,
                    alias.attribute,
                    a,
                    b
                )));
            }
            (Some(a), None) => {
                attributes.insert(alias.attribute.clone(), a);
                explicit.insert(alias.attribute.clone());
            }
            (None, Some(b)) => {
                attributes.insert(decl.name.clone(), b);
                explicit.insert(decl.name.clone());
            }
            _ => {}
        }
    }

    for decl in metadata.attributes() {
        if let Some(default) = &decl.default_value {
            attributes
                .entry(decl.name.clone())
                .or_insert_with(|| default.clone());
        }
    }
    Ok((attributes, explicit))
}

/// 把 `source` 上声明为 `@AliasFor(annotation = target)` 的显式属性写入 `target`
fn apply_overrides(
    source: &Node,
    target: &Annotation,
    types: &dyn TypeIntrospector,
    attributes: &mut BTreeMap<String, AttributeValue>,
    explicit: &mut BTreeSet<String>,
) {
    let Some(source_type) = types.describe(&source.type_name) else {
        return;
    };
    let target_type = types.describe(target.type_name());
    for decl in source_type.attributes() {
        let Some(alias) = &decl.alias_for else {
            continue;
        };
        if alias.annotation.as_deref() != Some(target.type_name()) || !source.explicit.contains(&decl.name) {
            continue;
        }
        let Some(value) = source.attributes.get(&decl.name) else {
            continue;
        };
        attributes.insert(alias.attribute.clone(), value.clone());
        explicit.insert(alias.attribute.clone());
        // 被覆盖属性的镜像同步更新
        if let Some(target_type) = &target_type {
            for mirror in target_type.attributes() {
                let mirrors_overridden = mirror.alias_for.as_ref().is_some_and(|a| {
                    a.attribute == alias.attribute
                        && a.annotation.as_deref().map_or(true, |t| t == target.type_name())
                });
                if mirrors_overridden {
                    attributes.insert(mirror.name.clone(), value.clone());
                    explicit.insert(mirror.name.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{standard, AttributeMethod};
    use crate::types::{TypeMetadata, TypeRegistry};

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(
            TypeMetadata::annotation_type("RequestMapping")
                .attribute(AttributeMethod::new("path").default_value("").mirror_of("value"))
                .attribute(AttributeMethod::new("value").default_value("").mirror_of("path"))
                .attribute(AttributeMethod::new("method").default_value("ANY"))
                .build(),
        );
        registry.register(
            TypeMetadata::annotation_type("GetMapping")
                .annotated(Annotation::new("RequestMapping").with("method", "GET"))
                .annotated(Annotation::new(standard::DOCUMENTED))
                .attribute(
                    AttributeMethod::new("value")
                        .default_value("")
                        .alias_for("RequestMapping", "path"),
                )
                .build(),
        );
        registry.register(
            TypeMetadata::annotation_type("Customer")
                .annotated(Annotation::value(standard::QUALIFIER, "customer"))
                .build(),
        );
        registry
    }

    #[test]
    fn test_meta_annotation_with_override() {
        let types = registry();
        let merged = MergedAnnotations::from_annotations(
            &[Annotation::value("GetMapping", "/users")],
            "UserController#list",
            &types,
        )
        .unwrap();

        let mapping = merged.get("RequestMapping").unwrap();
        assert_eq!(mapping.distance(), 1);
        assert_eq!(mapping.string("path"), Some("/users"));
        assert_eq!(mapping.string("value"), Some("/users"));
        assert_eq!(mapping.string("method"), Some("GET"));
        assert_eq!(mapping.root_type(), "GetMapping");
        assert!(!merged.is_present(standard::DOCUMENTED));
    }

    #[test]
    fn test_mirror_conflict_is_error() {
        let types = registry();
        let result = MergedAnnotations::from_annotations(
            &[Annotation::new("RequestMapping").with("path", "/a").with("value", "/b")],
            "X",
            &types,
        );
        assert!(matches!(result, Err(ContainerError::AnnotationConfiguration(_))));
    }

    #[test]
    fn test_defaults_and_meta_qualifier() {
        let types = registry();
        let merged = MergedAnnotations::from_annotations(
            &[Annotation::new("Customer"), Annotation::new(standard::AUTOWIRED)],
            "X",
            &types,
        )
        .unwrap();
        assert_eq!(merged.get(standard::AUTOWIRED).unwrap().bool("required"), Some(true));
        assert_eq!(merged.get(standard::QUALIFIER).unwrap().string("value"), Some("customer"));
    }

    #[test]
    fn test_selectors() {
        let types = registry();
        let merged = MergedAnnotations::from_aggregates(
            vec![
                Aggregate {
                    index: 0,
                    source: "Sub".into(),
                    annotations: vec![Annotation::value("GetMapping", "/meta")],
                },
                Aggregate {
                    index: 1,
                    source: "Base".into(),
                    annotations: vec![Annotation::value("RequestMapping", "/direct")],
                },
            ],
            &types,
        )
        .unwrap();

        let nearest = merged.get_with("RequestMapping", Selector::Nearest).unwrap();
        assert_eq!(nearest.source(), "Base");
        let first = merged.get_with("RequestMapping", Selector::FirstDirectlyDeclared).unwrap();
        assert_eq!(first.string("path"), Some("/direct"));
        assert_eq!(merged.stream("RequestMapping").count(), 2);
    }
}
