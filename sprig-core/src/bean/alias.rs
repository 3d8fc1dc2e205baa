use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};

/// 别名注册
pub trait AliasRegistry: Send + Sync {
    fn register_alias(&self, name: &str, alias: &str) -> ContainerResult<()>;

    fn remove_alias(&self, alias: &str) -> ContainerResult<()>;

    fn is_alias(&self, name: &str) -> bool;

    /// 直接与间接指向 `name` 的全部别名
    fn aliases(&self, name: &str) -> Vec<String>;
}

/// 以 `alias -> name` 映射保存别名，支持别名链
#[derive(Debug)]
pub struct SimpleAliasRegistry {
    alias_map: RwLock<HashMap<String, String>>,
    allow_alias_overriding: AtomicBool,
}

impl SimpleAliasRegistry {
    pub fn new() -> Self {
        Self {
            alias_map: RwLock::new(HashMap::new()),
            allow_alias_overriding: AtomicBool::new(true),
        }
    }

    pub fn set_allow_alias_overriding(&self, allow: bool) {
        self.allow_alias_overriding.store(allow, Ordering::SeqCst);
    }

    pub fn allow_alias_overriding(&self) -> bool {
        self.allow_alias_overriding.load(Ordering::SeqCst)
    }

    /// 沿别名链找到最终的名称
    pub fn canonical_name(&self, name: &str) -> String {
        let map = self.alias_map.read();
        let mut canonical = name;
        while let Some(resolved) = map.get(canonical) {
            canonical = resolved.as_str();
        }
        canonical.to_string()
    }

    /// `alias` 是否（直接或间接）指向 `name`
    pub fn has_alias(&self, name: &str, alias: &str) -> bool {
        has_alias_in(&self.alias_map.read(), name, alias)
    }

    /// 用 `resolve` 替换所有别名与目标名称中的文本，结果为空的别名被移除
    pub fn resolve_aliases(&self, resolve: &mut dyn FnMut(&str) -> ContainerResult<String>) -> ContainerResult<()> {
        let mut map = self.alias_map.write();
        let snapshot: Vec<(String, String)> = map.iter().map(|(a, n)| (a.clone(), n.clone())).collect();
        for (alias, registered_name) in snapshot {
            let resolved_alias = resolve(&alias)?;
            let resolved_name = resolve(&registered_name)?;
            if resolved_alias.is_empty() || resolved_name.is_empty() || resolved_alias == resolved_name {
                map.remove(&alias);
                continue;
            }
            if resolved_alias != alias {
                if let Some(existing) = map.get(&resolved_alias).cloned() {
                    if existing == resolved_name {
                        map.remove(&alias);
                        continue;
                    }
                    return Err(ContainerError::IllegalState(format!(
                        "Cannot register resolved alias '{}' (original: '{}') for name '{}': It is already registered for name '{}'.",
                        resolved_alias, alias, resolved_name, existing
                    )));
                }
                if has_alias_in(&map, &resolved_alias, &resolved_name) {
                    return Err(ContainerError::CircularAlias {
                        alias: resolved_alias,
                        name: resolved_name,
                    });
                }
                map.remove(&alias);
                map.insert(resolved_alias, resolved_name);
            } else if registered_name != resolved_name {
                map.insert(alias, resolved_name);
            }
        }
        Ok(())
    }

    pub fn alias_count(&self) -> usize {
        self.alias_map.read().len()
    }
}

impl Default for SimpleAliasRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn has_alias_in(map: &HashMap<String, String>, name: &str, alias: &str) -> bool {
    map.iter().any(|(registered_alias, registered_name)| {
        registered_name == name
            && (registered_alias == alias || has_alias_in(map, registered_alias, alias))
    })
}

impl AliasRegistry for SimpleAliasRegistry {
    fn register_alias(&self, name: &str, alias: &str) -> ContainerResult<()> {
        if name.is_empty() || alias.is_empty() {
            return Err(ContainerError::IllegalArgument(
                "'name' and 'alias' must not be empty".to_string(),
            ));
        }
        let mut map = self.alias_map.write();
        if alias == name {
            map.remove(alias);
            tracing::debug!("Alias definition '{}' ignored since it points to same name", alias);
            return Ok(());
        }
        if let Some(registered_name) = map.get(alias) {
            if registered_name == name {
                return Ok(());
            }
            if !self.allow_alias_overriding() {
                return Err(ContainerError::IllegalState(format!(
                    "Cannot define alias '{}' for name '{}': It is already registered for name '{}'.",
                    alias, name, registered_name
                )));
            }
            tracing::debug!(
                "Overriding alias '{}' definition for registered name '{}' with new target name '{}'",
                alias,
                registered_name,
                name
            );
        }
        if has_alias_in(&map, alias, name) {
            return Err(ContainerError::CircularAlias {
                alias: alias.to_string(),
                name: name.to_string(),
            });
        }
        map.insert(alias.to_string(), name.to_string());
        tracing::trace!("Alias definition '{}' registered for name '{}'", alias, name);
        Ok(())
    }

    fn remove_alias(&self, alias: &str) -> ContainerResult<()> {
        self.alias_map
            .write()
            .remove(alias)
            .map(|_| ())
            .ok_or_else(|| ContainerError::IllegalState(format!("No alias '{}' registered", alias)))
    }

    fn is_alias(&self, name: &str) -> bool {
        self.alias_map.read().contains_key(name)
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        let map = self.alias_map.read();
        let mut result = Vec::new();
        collect_aliases(&map, name, &mut result);
        result.sort();
        result
    }
}

fn collect_aliases(map: &HashMap<String, String>, name: &str, result: &mut Vec<String>) {
    for (alias, registered_name) in map {
        if registered_name == name && !result.contains(alias) {
            result.push(alias.clone());
            collect_aliases(map, alias, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_chain_resolves_to_canonical_name() {
        let registry = SimpleAliasRegistry::new();
        registry.register_alias("dataSource", "ds").unwrap();
        registry.register_alias("ds", "primaryDs").unwrap();
        assert_eq!(registry.canonical_name("primaryDs"), "dataSource");
        assert_eq!(registry.aliases("dataSource"), vec!["ds".to_string(), "primaryDs".to_string()]);
    }

    #[test]
    fn test_circular_alias_rejected() {
        let registry = SimpleAliasRegistry::new();
        registry.register_alias("a", "b").unwrap();
        let err = registry.register_alias("b", "a").unwrap_err();
        assert!(matches!(err, ContainerError::CircularAlias { .. }));
    }

    #[test]
    fn test_alias_equal_to_name_removes_alias() {
        let registry = SimpleAliasRegistry::new();
        registry.register_alias("x", "y").unwrap();
        registry.register_alias("y", "y").unwrap();
        assert!(!registry.is_alias("y"));
    }

    #[test]
    fn test_overriding_disallowed() {
        let registry = SimpleAliasRegistry::new();
        registry.set_allow_alias_overriding(false);
        registry.register_alias("x", "alias").unwrap();
        registry.register_alias("x", "alias").unwrap();
        assert!(registry.register_alias("z", "alias").is_err());
    }

    #[test]
    fn test_resolve_aliases() {
        let registry = SimpleAliasRegistry::new();
        registry.register_alias("${name}", "${alias}").unwrap();
        registry
            .resolve_aliases(&mut |s| Ok(s.replace("${name}", "service").replace("${alias}", "svc")))
            .unwrap();
        assert_eq!(registry.canonical_name("svc"), "service");
        assert_eq!(registry.alias_count(), 1);
    }
}
