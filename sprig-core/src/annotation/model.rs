use std::collections::BTreeMap;
use std::fmt;

use crate::types::ResolvableType;

/// 注解属性值
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Class(ResolvableType),
    Array(Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ResolvableType> {
        match self {
            AttributeValue::Class(ty) => Some(ty),
            _ => None,
        }
    }

    /// 数组属性的元素；单值按一个元素的数组处理
    pub fn as_array(&self) -> Vec<&AttributeValue> {
        match self {
            AttributeValue::Array(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// 空字符串与空数组视为“未指定”
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Str(s) => s.is_empty(),
            AttributeValue::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value as i64)
    }
}

impl From<ResolvableType> for AttributeValue {
    fn from(value: ResolvableType) -> Self {
        AttributeValue::Class(value)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(value: Vec<AttributeValue>) -> Self {
        AttributeValue::Array(value)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Str(s) => write!(f, "\"{}\"", s),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Class(ty) => write!(f, "{}", ty),
            AttributeValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// 声明在类型、方法、参数或属性上的注解实例，只包含显式写出的属性
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    type_name: String,
    attributes: BTreeMap<String, AttributeValue>,
}

impl Annotation {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// 设置 `value` 属性
    pub fn value(type_name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::new(type_name).with("value", value)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.type_name)?;
        if !self.attributes.is_empty() {
            let parts: Vec<String> = self
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, "({})", parts.join(", "))?;
        }
        Ok(())
    }
}

/// 注解类型上声明的别名：`annotation` 为空表示同一注解内的互为镜像
#[derive(Debug, Clone, PartialEq)]
pub struct AliasFor {
    pub annotation: Option<String>,
    pub attribute: String,
}

/// 注解类型的属性声明
#[derive(Debug, Clone)]
pub struct AttributeMethod {
    pub name: String,
    pub default_value: Option<AttributeValue>,
    pub alias_for: Option<AliasFor>,
}

impl AttributeMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
            alias_for: None,
        }
    }

    pub fn default_value(mut self, value: impl Into<AttributeValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// 同一注解内的镜像属性
    pub fn mirror_of(mut self, attribute: impl Into<String>) -> Self {
        self.alias_for = Some(AliasFor {
            annotation: None,
            attribute: attribute.into(),
        });
        self
    }

    /// 覆盖元注解上的属性
    pub fn alias_for(mut self, annotation: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.alias_for = Some(AliasFor {
            annotation: Some(annotation.into()),
            attribute: attribute.into(),
        });
        self
    }
}
