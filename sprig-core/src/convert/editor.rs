use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::ResolvableType;
use crate::value::Value;

/// 文本与值之间的转换器，按目标类型（可限定到某个属性）注册
pub trait PropertyEditor: Send + Sync {
    fn set_as_text(&self, text: &str) -> anyhow::Result<Value>;

    fn as_text(&self, _value: &Value) -> Option<String> {
        None
    }
}

impl<F> PropertyEditor for F
where
    F: Fn(&str) -> anyhow::Result<Value> + Send + Sync,
{
    fn set_as_text(&self, text: &str) -> anyhow::Result<Value> {
        self(text)
    }
}

/// 由闭包构造编辑器
pub fn text_editor<F>(f: F) -> Arc<dyn PropertyEditor>
where
    F: Fn(&str) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 批量注册编辑器，每次创建类型转换器时调用
pub trait PropertyEditorRegistrar: Send + Sync {
    fn register_custom_editors(&self, registry: &PropertyEditorRegistry);
}

/// 自定义编辑器表
#[derive(Default)]
pub struct PropertyEditorRegistry {
    by_type: RwLock<HashMap<String, Arc<dyn PropertyEditor>>>,
    by_path: RwLock<HashMap<(String, String), Arc<dyn PropertyEditor>>>,
}

impl PropertyEditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_custom_editor(&self, target: &ResolvableType, editor: Arc<dyn PropertyEditor>) {
        self.by_type.write().insert(target.to_string(), editor);
    }

    /// 只对名为 `property_path` 的属性生效
    pub fn register_custom_editor_for_path(
        &self,
        target: &ResolvableType,
        property_path: &str,
        editor: Arc<dyn PropertyEditor>,
    ) {
        self.by_path
            .write()
            .insert((target.to_string(), property_path.to_string()), editor);
    }

    /// 先按属性路径，再按类型查找
    pub fn find_custom_editor(
        &self,
        target: &ResolvableType,
        property_path: Option<&str>,
    ) -> Option<Arc<dyn PropertyEditor>> {
        let key = target.to_string();
        if let Some(path) = property_path {
            if let Some(editor) = self.by_path.read().get(&(key.clone(), path.to_string())) {
                return Some(editor.clone());
            }
        }
        self.by_type.read().get(&key).cloned()
    }

    /// 复制到另一个注册表
    pub fn copy_to(&self, other: &PropertyEditorRegistry) {
        for (ty, editor) in self.by_type.read().iter() {
            other.by_type.write().insert(ty.clone(), editor.clone());
        }
        for (key, editor) in self.by_path.read().iter() {
            other.by_path.write().insert(key.clone(), editor.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.read().is_empty() && self.by_path.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_specific_editor_wins() {
        let registry = PropertyEditorRegistry::new();
        let ty = ResolvableType::of::<String>();
        registry.register_custom_editor(&ty, text_editor(|s| Ok(Value::text(s.to_uppercase()))));
        registry.register_custom_editor_for_path(&ty, "name", text_editor(|s| Ok(Value::text(s.to_lowercase()))));

        let by_path = registry.find_custom_editor(&ty, Some("name")).unwrap();
        assert_eq!(by_path.set_as_text("MiXed").unwrap().as_text(), Some("mixed"));

        let by_type = registry.find_custom_editor(&ty, Some("other")).unwrap();
        assert_eq!(by_type.set_as_text("MiXed").unwrap().as_text(), Some("MIXED"));
    }
}
