use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::TypeIntrospector;

/// 集合注入点使用的原始类型名
pub const VEC_TYPE: &str = "Vec";
/// 以 bean 名为键的映射注入点
pub const MAP_TYPE: &str = "Map";
/// 可选注入点
pub const OPTION_TYPE: &str = "Option";
/// 延迟解析的提供者注入点
pub const PROVIDER_TYPE: &str = "ObjectProvider";

const MAX_HIERARCHY_DEPTH: usize = 32;

static UNRESOLVED: ResolvableType = ResolvableType::Unresolved;

/// 带泛型信息的类型描述
///
/// 类型按名称区分；通过 [`ResolvableType::of`] 构造时额外记录 `TypeId`，
/// 用于对实例做快速的精确匹配。
#[derive(Clone, Debug)]
pub enum ResolvableType {
    /// 具体类型，可带实参
    Class {
        name: String,
        generics: Vec<ResolvableType>,
        type_id: Option<TypeId>,
    },
    /// 未绑定的类型变量，例如 `T`
    Variable(String),
    /// 数组类型
    Array(Box<ResolvableType>),
    /// 无法解析的类型（通配）
    Unresolved,
}

impl ResolvableType {
    /// Rust 类型对应的描述
    pub fn of<T: Any>() -> Self {
        ResolvableType::Class {
            name: type_name::<T>().to_string(),
            generics: Vec::new(),
            type_id: Some(TypeId::of::<T>()),
        }
    }

    /// 按名称引用的类型（接口、抽象类型等）
    pub fn class(name: impl Into<String>) -> Self {
        ResolvableType::Class {
            name: name.into(),
            generics: Vec::new(),
            type_id: None,
        }
    }

    pub fn with_generics(name: impl Into<String>, generics: Vec<ResolvableType>) -> Self {
        ResolvableType::Class {
            name: name.into(),
            generics,
            type_id: None,
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        ResolvableType::Variable(name.into())
    }

    pub fn array(component: ResolvableType) -> Self {
        ResolvableType::Array(Box::new(component))
    }

    pub fn vec_of(element: ResolvableType) -> Self {
        Self::with_generics(VEC_TYPE, vec![element])
    }

    pub fn map_of(value: ResolvableType) -> Self {
        Self::with_generics(MAP_TYPE, vec![Self::of::<String>(), value])
    }

    pub fn option_of(inner: ResolvableType) -> Self {
        Self::with_generics(OPTION_TYPE, vec![inner])
    }

    pub fn provider_of(inner: ResolvableType) -> Self {
        Self::with_generics(PROVIDER_TYPE, vec![inner])
    }

    pub fn none() -> Self {
        ResolvableType::Unresolved
    }

    /// 原始类型名（不含实参）
    pub fn raw_name(&self) -> Option<&str> {
        match self {
            ResolvableType::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn generics(&self) -> &[ResolvableType] {
        match self {
            ResolvableType::Class { generics, .. } => generics,
            _ => &[],
        }
    }

    /// 第 `index` 个实参，缺失时为 [`ResolvableType::Unresolved`]
    pub fn generic(&self, index: usize) -> &ResolvableType {
        self.generics().get(index).unwrap_or(&UNRESOLVED)
    }

    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            ResolvableType::Class { type_id, .. } => *type_id,
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            ResolvableType::Class { generics, .. } => generics.iter().all(Self::is_resolved),
            ResolvableType::Array(component) => component.is_resolved(),
            _ => false,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ResolvableType::Array(_))
    }

    pub fn is_collection(&self) -> bool {
        self.raw_name() == Some(VEC_TYPE)
    }

    pub fn is_map(&self) -> bool {
        self.raw_name() == Some(MAP_TYPE)
    }

    pub fn is_optional(&self) -> bool {
        self.raw_name() == Some(OPTION_TYPE)
    }

    pub fn is_provider(&self) -> bool {
        self.raw_name() == Some(PROVIDER_TYPE)
    }

    /// 数组或集合的元素类型
    pub fn element_type(&self) -> Option<&ResolvableType> {
        match self {
            ResolvableType::Array(component) => Some(component.as_ref()),
            _ if self.is_collection() => Some(self.generic(0)),
            _ => None,
        }
    }

    /// 去掉模块路径和实参后的类型名，`app::service::UserService<T>` 得到 `UserService`
    pub fn short_name(&self) -> String {
        match self {
            ResolvableType::Class { name, .. } => short_type_name(name).to_string(),
            other => other.to_string(),
        }
    }

    /// 把类型变量替换为绑定的实参
    pub fn substitute(&self, bindings: &[(String, ResolvableType)]) -> ResolvableType {
        match self {
            ResolvableType::Variable(var) => bindings
                .iter()
                .find(|(name, _)| name == var)
                .map(|(_, bound)| bound.clone())
                .unwrap_or_else(|| self.clone()),
            ResolvableType::Class {
                name,
                generics,
                type_id,
            } => ResolvableType::Class {
                name: name.clone(),
                generics: generics.iter().map(|g| g.substitute(bindings)).collect(),
                type_id: *type_id,
            },
            ResolvableType::Array(component) => {
                ResolvableType::Array(Box::new(component.substitute(bindings)))
            }
            ResolvableType::Unresolved => ResolvableType::Unresolved,
        }
    }

    /// 沿继承层级向上查找原始类型为 `raw` 的视图，实参按层级逐级代入
    pub fn as_type(&self, raw: &str, types: &dyn TypeIntrospector) -> Option<ResolvableType> {
        self.as_type_at(raw, types, 0)
    }

    fn as_type_at(
        &self,
        raw: &str,
        types: &dyn TypeIntrospector,
        depth: usize,
    ) -> Option<ResolvableType> {
        let ResolvableType::Class { name, generics, type_id } = self else {
            return None;
        };
        if name == raw {
            return Some(self.clone());
        }
        // `of::<T>()` 带的是 Rust 全路径名，按 TypeId 换成注册名
        if let Some(registered) = type_id.and_then(|id| types.registered_name(id)) {
            if registered != *name {
                let canonical = ResolvableType::Class {
                    name: registered,
                    generics: generics.clone(),
                    type_id: *type_id,
                };
                return canonical.as_type_at(raw, types, depth);
            }
        }
        if depth >= MAX_HIERARCHY_DEPTH {
            return None;
        }
        let metadata = types.describe(name)?;
        let bindings: Vec<(String, ResolvableType)> = metadata
            .type_params()
            .iter()
            .enumerate()
            .map(|(i, param)| {
                let bound = generics.get(i).cloned().unwrap_or(ResolvableType::Unresolved);
                (param.clone(), bound)
            })
            .collect();
        let found = metadata
            .super_types()
            .find_map(|parent| parent.substitute(&bindings).as_type_at(raw, types, depth + 1));
        found
    }

    /// `other` 的值能否赋给当前类型
    ///
    /// 未解析的实参按宽松规则视为匹配。
    pub fn is_assignable_from(&self, other: &ResolvableType, types: &dyn TypeIntrospector) -> bool {
        match (self, other) {
            (ResolvableType::Unresolved | ResolvableType::Variable(_), _) => true,
            (_, ResolvableType::Unresolved | ResolvableType::Variable(_)) => false,
            (ResolvableType::Array(a), ResolvableType::Array(b)) => a.is_assignable_from(b, types),
            (ResolvableType::Array(_), _) | (_, ResolvableType::Array(_)) => false,
            (ResolvableType::Class { name, generics, type_id }, ResolvableType::Class { .. }) => {
                if generics.is_empty() && type_id.is_some() && *type_id == other.type_id() {
                    return true;
                }
                let Some(found) = other.as_type(name, types) else {
                    return false;
                };
                generics
                    .iter()
                    .enumerate()
                    .all(|(i, g)| generic_matches(g, found.generic(i)))
            }
        }
    }
}

fn generic_matches(target: &ResolvableType, candidate: &ResolvableType) -> bool {
    match (target, candidate) {
        (ResolvableType::Unresolved | ResolvableType::Variable(_), _)
        | (_, ResolvableType::Unresolved | ResolvableType::Variable(_)) => true,
        (ResolvableType::Array(a), ResolvableType::Array(b)) => generic_matches(a, b),
        (
            ResolvableType::Class { name: a, generics: ga, .. },
            ResolvableType::Class { name: b, .. },
        ) => {
            a == b
                && ga
                    .iter()
                    .enumerate()
                    .all(|(i, g)| generic_matches(g, candidate.generic(i)))
        }
        _ => false,
    }
}

/// 类型全名的最后一段
pub fn short_type_name(name: &str) -> &str {
    let raw = name.split('<').next().unwrap_or(name);
    raw.rsplit("::").next().unwrap_or(raw).trim()
}

impl PartialEq for ResolvableType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ResolvableType::Class { name: a, generics: ga, .. },
                ResolvableType::Class { name: b, generics: gb, .. },
            ) => a == b && ga == gb,
            (ResolvableType::Variable(a), ResolvableType::Variable(b)) => a == b,
            (ResolvableType::Array(a), ResolvableType::Array(b)) => a == b,
            (ResolvableType::Unresolved, ResolvableType::Unresolved) => true,
            _ => false,
        }
    }
}

impl Eq for ResolvableType {}

impl Hash for ResolvableType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ResolvableType::Class { name, generics, .. } => {
                name.hash(state);
                generics.hash(state);
            }
            ResolvableType::Variable(name) => name.hash(state),
            ResolvableType::Array(component) => component.hash(state),
            ResolvableType::Unresolved => {}
        }
    }
}

impl fmt::Display for ResolvableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvableType::Class { name, generics, .. } => {
                write!(f, "{}", name)?;
                if !generics.is_empty() {
                    let args: Vec<String> = generics.iter().map(ToString::to_string).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                Ok(())
            }
            ResolvableType::Variable(name) => write!(f, "{}", name),
            ResolvableType::Array(component) => write!(f, "{}[]", component),
            ResolvableType::Unresolved => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeMetadata, TypeRegistry};

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::empty();
        registry.register(
            TypeMetadata::interface("Repository")
                .type_params(&["T"])
                .build(),
        );
        registry.register(
            TypeMetadata::abstract_type("BaseRepository")
                .type_params(&["E"])
                .implements(ResolvableType::with_generics(
                    "Repository",
                    vec![ResolvableType::variable("E")],
                ))
                .build(),
        );
        registry.register(
            TypeMetadata::interface("UserRepository")
                .extends(ResolvableType::with_generics(
                    "BaseRepository",
                    vec![ResolvableType::class("User")],
                ))
                .build(),
        );
        registry
    }

    #[test]
    fn test_generic_resolution_through_hierarchy() {
        let types = registry();
        let user_repo = ResolvableType::class("UserRepository");
        let view = user_repo.as_type("Repository", &types).unwrap();
        assert_eq!(view.generic(0), &ResolvableType::class("User"));
    }

    #[test]
    fn test_assignability_with_generics() {
        let types = registry();
        let candidate = ResolvableType::class("UserRepository");
        let users = ResolvableType::with_generics("Repository", vec![ResolvableType::class("User")]);
        let orders = ResolvableType::with_generics("Repository", vec![ResolvableType::class("Order")]);
        let raw = ResolvableType::class("Repository");

        assert!(users.is_assignable_from(&candidate, &types));
        assert!(!orders.is_assignable_from(&candidate, &types));
        assert!(raw.is_assignable_from(&candidate, &types));
        assert!(!candidate.is_assignable_from(&raw, &types));
    }

    #[test]
    fn test_rust_types_match_by_registered_name() {
        struct Engine;
        let types = registry();
        types.register(
            TypeMetadata::named::<Engine>("Engine")
                .implements(ResolvableType::with_generics("Repository", vec![ResolvableType::class("User")]))
                .build(),
        );

        let concrete = ResolvableType::of::<Engine>();
        assert!(ResolvableType::class("Engine").is_assignable_from(&concrete, &types));
        assert!(ResolvableType::class("Repository").is_assignable_from(&concrete, &types));
        assert_eq!(types.canonicalize(concrete).raw_name(), Some("Engine"));
        assert!(!ResolvableType::class("Engine").is_assignable_from(&ResolvableType::of::<String>(), &types));
    }

    #[test]
    fn test_unresolved_generics_are_lenient() {
        let types = registry();
        let base = ResolvableType::class("BaseRepository");
        let target = ResolvableType::with_generics("Repository", vec![ResolvableType::class("User")]);
        assert!(target.is_assignable_from(&base, &types));
    }

    #[test]
    fn test_display_and_short_name() {
        let ty = ResolvableType::vec_of(ResolvableType::class("app::service::Greeter"));
        assert_eq!(ty.to_string(), "Vec<app::service::Greeter>");
        assert_eq!(ResolvableType::class("app::service::Greeter").short_name(), "Greeter");
        assert_eq!(ty.element_type(), Some(&ResolvableType::class("app::service::Greeter")));
    }

    #[test]
    fn test_rust_types_match_by_type_id() {
        let types = TypeRegistry::empty();
        assert!(ResolvableType::of::<String>().is_assignable_from(&ResolvableType::of::<String>(), &types));
        assert!(!ResolvableType::of::<String>().is_assignable_from(&ResolvableType::of::<u32>(), &types));
    }
}
