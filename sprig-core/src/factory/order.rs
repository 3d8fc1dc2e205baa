use crate::annotation::{standard, AnnotationIntrospector, SearchStrategy};
use crate::constants::LOWEST_PRECEDENCE;
use crate::types::TypeRegistry;
use crate::value::BeanObject;

/// 实例排序规则
///
/// PriorityOrdered 的实例排在最前；其余按顺序值升序，顺序值依次取自
/// `Ordered` 接口、类型上的 `@Order`、类型上的 `@Priority`，都没有时视为最低优先级。
/// 排序是稳定的，顺序值相同的实例保持原有顺序。
pub struct OrderComparator<'a> {
    types: &'a TypeRegistry,
    annotations: &'a AnnotationIntrospector,
}

impl<'a> OrderComparator<'a> {
    pub fn new(types: &'a TypeRegistry, annotations: &'a AnnotationIntrospector) -> Self {
        Self { types, annotations }
    }

    pub fn order_of(&self, bean: &BeanObject) -> Option<i32> {
        let metadata = self.types.describe_instance(bean)?;
        if let Some(cast) = &metadata.capabilities().ordered {
            if let Some(ordered) = cast(bean) {
                return Some(ordered.order());
            }
        }
        self.order_of_type(metadata.name())
    }

    /// 类型上声明的 `@Order`，没有时取 `@Priority`
    pub fn order_of_type(&self, type_name: &str) -> Option<i32> {
        let merged = self
            .annotations
            .for_type(type_name, SearchStrategy::TypeHierarchy)
            .ok()?;
        merged
            .get(standard::ORDER)
            .or_else(|| merged.get(standard::PRIORITY))
            .and_then(|a| a.int("value"))
            .map(clamp)
    }

    /// 类型上声明的 `@Priority`
    pub fn priority_of_type(&self, type_name: &str) -> Option<i32> {
        let merged = self
            .annotations
            .for_type(type_name, SearchStrategy::TypeHierarchy)
            .ok()?;
        merged.get(standard::PRIORITY).and_then(|a| a.int("value")).map(clamp)
    }

    pub fn is_priority_ordered(&self, bean: &BeanObject) -> bool {
        self.types
            .describe_instance(bean)
            .is_some_and(|m| m.capabilities().priority_ordered)
    }

    pub fn sort_key(&self, bean: &BeanObject) -> (bool, i32) {
        (
            !self.is_priority_ordered(bean),
            self.order_of(bean).unwrap_or(LOWEST_PRECEDENCE),
        )
    }

    pub fn sort<T>(&self, items: &mut [T], bean: impl Fn(&T) -> &BeanObject) {
        items.sort_by_cached_key(|item| self.sort_key(bean(item)));
    }
}

fn clamp(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
