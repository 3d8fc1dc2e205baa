use crate::constants::{ESCAPE_CHARACTER, PLACEHOLDER_PREFIX, PLACEHOLDER_SUFFIX, VALUE_SEPARATOR};
use crate::error::{ContainerError, ContainerResult};

/// `${name:default}` 占位符解析
///
/// 占位符可以嵌套（`${${env}.url}`），解析出的值会继续解析；
/// 转义字符后的前缀按字面保留。出现循环引用时报错。
#[derive(Debug, Clone)]
pub struct PlaceholderHelper {
    prefix: String,
    suffix: String,
    simple_prefix: String,
    value_separator: Option<String>,
    escape_character: Option<char>,
    ignore_unresolvable: bool,
}

impl PlaceholderHelper {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let suffix = suffix.into();
        let simple_prefix = match suffix.as_str() {
            "}" if prefix.ends_with('{') => "{".to_string(),
            "]" if prefix.ends_with('[') => "[".to_string(),
            ")" if prefix.ends_with('(') => "(".to_string(),
            _ => prefix.clone(),
        };
        Self {
            prefix,
            suffix,
            simple_prefix,
            value_separator: Some(VALUE_SEPARATOR.to_string()),
            escape_character: Some(ESCAPE_CHARACTER),
            ignore_unresolvable: false,
        }
    }

    /// 默认语法；`ignore_unresolvable` 为真时无法解析的占位符原样保留
    pub fn standard(ignore_unresolvable: bool) -> Self {
        Self::new(PLACEHOLDER_PREFIX, PLACEHOLDER_SUFFIX).ignore_unresolvable(ignore_unresolvable)
    }

    pub fn value_separator(mut self, separator: Option<&str>) -> Self {
        self.value_separator = separator.map(str::to_string);
        self
    }

    pub fn escape_character(mut self, escape: Option<char>) -> Self {
        self.escape_character = escape;
        self
    }

    pub fn ignore_unresolvable(mut self, ignore: bool) -> Self {
        self.ignore_unresolvable = ignore;
        self
    }

    pub fn replace_placeholders(
        &self,
        value: &str,
        resolve: &dyn Fn(&str) -> Option<String>,
    ) -> ContainerResult<String> {
        let mut visited = Vec::new();
        self.parse(value, value, resolve, &mut visited)
    }

    fn parse(
        &self,
        value: &str,
        original: &str,
        resolve: &dyn Fn(&str) -> Option<String>,
        visited: &mut Vec<String>,
    ) -> ContainerResult<String> {
        let mut result = String::with_capacity(value.len());
        let mut cursor = 0;
        while let Some(found) = value[cursor..].find(&self.prefix) {
            let start = cursor + found;
            if let Some(escape) = self.escape_character {
                if value[..start].ends_with(escape) {
                    result.push_str(&value[cursor..start - escape.len_utf8()]);
                    result.push_str(&self.prefix);
                    cursor = start + self.prefix.len();
                    continue;
                }
            }
            let Some(end) = self.find_placeholder_end(value, start) else {
                break;
            };
            result.push_str(&value[cursor..start]);

            let placeholder = &value[start + self.prefix.len()..end];
            if visited.iter().any(|v| v == placeholder) {
                return Err(ContainerError::CircularPlaceholder {
                    placeholder: placeholder.to_string(),
                });
            }
            visited.push(placeholder.to_string());

            let key = self.parse(placeholder, original, resolve, visited)?;
            let mut resolved = resolve(&key);
            if resolved.is_none() {
                if let Some(separator) = &self.value_separator {
                    if let Some((actual_key, default_value)) = key.split_once(separator.as_str()) {
                        resolved = resolve(actual_key).or_else(|| Some(default_value.to_string()));
                    }
                }
            }
            match resolved {
                Some(text) => {
                    let nested = self.parse(&text, original, resolve, visited)?;
                    tracing::trace!("Resolved placeholder '{}'", key);
                    result.push_str(&nested);
                }
                None if self.ignore_unresolvable => {
                    result.push_str(&value[start..end + self.suffix.len()]);
                }
                None => {
                    return Err(ContainerError::UnresolvablePlaceholder {
                        placeholder: key,
                        value: original.to_string(),
                    });
                }
            }
            visited.pop();
            cursor = end + self.suffix.len();
        }
        result.push_str(&value[cursor..]);
        Ok(result)
    }

    fn find_placeholder_end(&self, value: &str, start: usize) -> Option<usize> {
        let mut index = start + self.prefix.len();
        let mut nested = 0usize;
        while index < value.len() {
            let rest = &value[index..];
            if rest.starts_with(&self.suffix) {
                if nested == 0 {
                    return Some(index);
                }
                nested -= 1;
                index += self.suffix.len();
            } else if rest.starts_with(&self.simple_prefix) {
                nested += 1;
                index += self.simple_prefix.len();
            } else {
                index += rest.chars().next().map(char::len_utf8).unwrap_or(1);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolver(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_value_used_when_missing() {
        let helper = PlaceholderHelper::standard(false);
        let resolve = resolver(&[]);
        assert_eq!(helper.replace_placeholders("${missing.key:fallback}", &resolve).unwrap(), "fallback");
        assert_eq!(helper.replace_placeholders("${empty:}", &resolve).unwrap(), "");
    }

    #[test]
    fn test_nested_and_recursive_resolution() {
        let helper = PlaceholderHelper::standard(false);
        let resolve = resolver(&[("env", "prod"), ("prod.url", "db://${host}"), ("host", "h1")]);
        assert_eq!(
            helper.replace_placeholders("url=${${env}.url}!", &resolve).unwrap(),
            "url=db://h1!"
        );
    }

    #[test]
    fn test_self_reference_is_circular() {
        let helper = PlaceholderHelper::standard(false);
        let resolve = resolver(&[("a", "${a}")]);
        let err = helper.replace_placeholders("${a}", &resolve).unwrap_err();
        assert!(matches!(err, ContainerError::CircularPlaceholder { ref placeholder } if placeholder == "a"));
    }

    #[test]
    fn test_unresolvable_strict_and_lenient() {
        let resolve = resolver(&[("x", "1")]);
        let strict = PlaceholderHelper::standard(false);
        assert!(matches!(
            strict.replace_placeholders("${x}-${y}", &resolve),
            Err(ContainerError::UnresolvablePlaceholder { ref placeholder, .. }) if placeholder == "y"
        ));
        let lenient = PlaceholderHelper::standard(true);
        assert_eq!(lenient.replace_placeholders("${x}-${y}", &resolve).unwrap(), "1-${y}");
    }

    #[test]
    fn test_escaped_placeholder_kept_literally() {
        let helper = PlaceholderHelper::standard(false);
        let resolve = resolver(&[("x", "1")]);
        assert_eq!(helper.replace_placeholders("\\${x} ${x}", &resolve).unwrap(), "${x} 1");
    }

    #[test]
    fn test_same_placeholder_twice_is_not_a_cycle() {
        let helper = PlaceholderHelper::standard(false);
        let resolve = resolver(&[("x", "1")]);
        assert_eq!(helper.replace_placeholders("${x}${x}", &resolve).unwrap(), "11");
    }
}
