use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};

use super::{ConfigValue, PropertySource};

/// 按查找优先级排列的配置源链，名称唯一，靠前的源遮蔽靠后的同名键
#[derive(Default)]
pub struct MutablePropertySources {
    sources: RwLock<Vec<Arc<dyn PropertySource>>>,
}

impl MutablePropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最高优先级
    pub fn add_first(&self, source: Arc<dyn PropertySource>) {
        let mut sources = self.sources.write();
        remove_named(&mut sources, source.name());
        tracing::debug!("Adding PropertySource '{}' with highest search precedence", source.name());
        sources.insert(0, source);
    }

    /// 最低优先级
    pub fn add_last(&self, source: Arc<dyn PropertySource>) {
        let mut sources = self.sources.write();
        remove_named(&mut sources, source.name());
        tracing::debug!("Adding PropertySource '{}' with lowest search precedence", source.name());
        sources.push(source);
    }

    pub fn add_before(&self, relative: &str, source: Arc<dyn PropertySource>) -> ContainerResult<()> {
        self.insert_relative(relative, source, 0)
    }

    pub fn add_after(&self, relative: &str, source: Arc<dyn PropertySource>) -> ContainerResult<()> {
        self.insert_relative(relative, source, 1)
    }

    fn insert_relative(&self, relative: &str, source: Arc<dyn PropertySource>, offset: usize) -> ContainerResult<()> {
        if relative == source.name() {
            return Err(ContainerError::IllegalArgument(format!(
                "PropertySource named '{}' cannot be added relative to itself",
                relative
            )));
        }
        let mut sources = self.sources.write();
        remove_named(&mut sources, source.name());
        let index = index_of(&sources, relative)?;
        sources.insert(index + offset, source);
        Ok(())
    }

    /// 替换同名的配置源，位置不变
    pub fn replace(&self, name: &str, source: Arc<dyn PropertySource>) -> ContainerResult<()> {
        let mut sources = self.sources.write();
        let index = index_of(&sources, name)?;
        sources[index] = source;
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn PropertySource>> {
        let mut sources = self.sources.write();
        let index = sources.iter().position(|s| s.name() == name)?;
        Some(sources.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PropertySource>> {
        self.sources.read().iter().find(|s| s.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.read().iter().any(|s| s.name() == name)
    }

    pub fn precedence_of(&self, name: &str) -> Option<usize> {
        self.sources.read().iter().position(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.read().iter().map(|s| s.name().to_string()).collect()
    }

    /// 当前配置源的快照
    pub fn snapshot(&self) -> Vec<Arc<dyn PropertySource>> {
        self.sources.read().clone()
    }

    /// 按优先级查找第一个命中的值，返回值与所在源的名称
    pub fn find(&self, key: &str) -> Option<(ConfigValue, String)> {
        self.sources.read().iter().find_map(|source| {
            source
                .get(key)
                .map(|value| (value, source.name().to_string()))
        })
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}

fn remove_named(sources: &mut Vec<Arc<dyn PropertySource>>, name: &str) {
    sources.retain(|s| s.name() != name);
}

fn index_of(sources: &[Arc<dyn PropertySource>], name: &str) -> ContainerResult<usize> {
    sources
        .iter()
        .position(|s| s.name() == name)
        .ok_or_else(|| ContainerError::IllegalArgument(format!("PropertySource named '{}' does not exist", name)))
}

impl std::fmt::Debug for MutablePropertySources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapPropertySource;

    fn source(name: &str, value: &str) -> Arc<dyn PropertySource> {
        Arc::new(MapPropertySource::new(name).with_property("key", value))
    }

    #[test]
    fn test_ordering_and_shadowing() {
        let sources = MutablePropertySources::new();
        sources.add_last(source("b", "from-b"));
        sources.add_first(source("a", "from-a"));
        sources.add_after("a", source("c", "from-c")).unwrap();
        assert_eq!(sources.names(), vec!["a", "c", "b"]);
        assert_eq!(sources.find("key").unwrap().1, "a");

        sources.remove("a");
        assert_eq!(sources.find("key").unwrap().0.to_text().unwrap(), "from-c");
    }

    #[test]
    fn test_names_stay_unique() {
        let sources = MutablePropertySources::new();
        sources.add_last(source("a", "1"));
        sources.add_last(source("b", "2"));
        sources.add_first(source("b", "3"));
        assert_eq!(sources.names(), vec!["b", "a"]);
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_relative_insert_errors() {
        let sources = MutablePropertySources::new();
        sources.add_last(source("a", "1"));
        assert!(sources.add_before("missing", source("x", "1")).is_err());
        assert!(sources.add_before("a", source("a", "1")).is_err());
        sources.replace("a", source("a", "2")).unwrap();
        assert_eq!(sources.find("key").unwrap().0.to_text().unwrap(), "2");
    }
}
