use std::collections::BTreeMap;

use super::BeanMetadataValue;

/// 单个属性值
#[derive(Debug, Clone)]
pub struct PropertyValue {
    pub name: String,
    pub value: BeanMetadataValue,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, value: impl Into<BeanMetadataValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// 按声明顺序保存的属性值集合，同名属性后者覆盖前者
#[derive(Debug, Clone, Default)]
pub struct MutablePropertyValues {
    values: Vec<PropertyValue>,
}

impl MutablePropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<BeanMetadataValue>) -> &mut Self {
        self.add_property_value(PropertyValue::new(name, value));
        self
    }

    pub fn add_property_value(&mut self, pv: PropertyValue) {
        match self.values.iter_mut().find(|existing| existing.name == pv.name) {
            Some(existing) => *existing = pv,
            None => self.values.push(pv),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.iter().find(|pv| pv.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PropertyValue> {
        self.values.iter_mut().find(|pv| pv.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let index = self.values.iter().position(|pv| pv.name == name)?;
        Some(self.values.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PropertyValue> {
        self.values.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 以 `other` 中的值覆盖当前集合
    pub fn merge(&mut self, other: &MutablePropertyValues) {
        for pv in &other.values {
            self.add_property_value(pv.clone());
        }
    }
}

impl IntoIterator for MutablePropertyValues {
    type Item = PropertyValue;
    type IntoIter = std::vec::IntoIter<PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// 构造参数值，可带类型或参数名提示
#[derive(Debug, Clone)]
pub struct ValueHolder {
    pub value: BeanMetadataValue,
    pub ty: Option<crate::types::ResolvableType>,
    pub name: Option<String>,
}

impl ValueHolder {
    pub fn new(value: impl Into<BeanMetadataValue>) -> Self {
        Self {
            value: value.into(),
            ty: None,
            name: None,
        }
    }

    pub fn typed(mut self, ty: crate::types::ResolvableType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// 构造参数：按下标指定的参数与按类型/名称匹配的通用参数
#[derive(Debug, Clone, Default)]
pub struct ConstructorArgumentValues {
    indexed: BTreeMap<usize, ValueHolder>,
    generic: Vec<ValueHolder>,
}

impl ConstructorArgumentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_indexed(&mut self, index: usize, holder: ValueHolder) {
        self.indexed.insert(index, holder);
    }

    pub fn add_generic(&mut self, holder: ValueHolder) {
        self.generic.push(holder);
    }

    pub fn indexed(&self) -> &BTreeMap<usize, ValueHolder> {
        &self.indexed
    }

    pub fn generic(&self) -> &[ValueHolder] {
        &self.generic
    }

    pub fn indexed_mut(&mut self) -> impl Iterator<Item = &mut ValueHolder> {
        self.indexed.values_mut()
    }

    pub fn generic_mut(&mut self) -> impl Iterator<Item = &mut ValueHolder> {
        self.generic.iter_mut()
    }

    /// 构造器至少需要的参数个数
    pub fn argument_count(&self) -> usize {
        let highest_index = self.indexed.keys().next_back().map(|i| i + 1).unwrap_or(0);
        highest_index.max(self.indexed.len() + self.generic.len())
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    /// 子定义的参数覆盖父定义同下标的参数，通用参数追加
    pub fn merge(&mut self, other: &ConstructorArgumentValues) {
        for (index, holder) in &other.indexed {
            self.indexed.insert(*index, holder.clone());
        }
        self.generic.extend(other.generic.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_values_override_by_name() {
        let mut pvs = MutablePropertyValues::new();
        pvs.add("name", "a").add("port", "80");
        pvs.add("name", "b");
        assert_eq!(pvs.len(), 2);
        assert!(matches!(&pvs.get("name").unwrap().value, BeanMetadataValue::Literal(s) if s == "b"));
        assert!(pvs.remove("port").is_some());
        assert!(!pvs.contains("port"));
    }

    #[test]
    fn test_argument_count() {
        let mut args = ConstructorArgumentValues::new();
        args.add_indexed(2, ValueHolder::new("x"));
        assert_eq!(args.argument_count(), 3);
        args.add_generic(ValueHolder::new("y"));
        args.add_generic(ValueHolder::new("z"));
        args.add_generic(ValueHolder::new("w"));
        assert_eq!(args.argument_count(), 4);
    }
}
