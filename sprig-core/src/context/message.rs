use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};
use crate::types::TypeMetadata;

/// 消息解析
///
/// `locale` 形如 `zh_CN`、`en`；空字符串表示不区分语言的默认消息。
/// 参数按 `{0}`、`{1}` 的位置替换。
pub trait MessageSource: Send + Sync {
    /// 解析消息，找不到且没有默认消息时返回 `None`
    fn get_message_or(&self, code: &str, args: &[&str], default_message: Option<&str>, locale: &str) -> Option<String>;

    /// 解析消息，找不到时返回 [`ContainerError::NoSuchMessage`]
    fn get_message(&self, code: &str, args: &[&str], locale: &str) -> ContainerResult<String> {
        self.get_message_or(code, args, None, locale)
            .ok_or_else(|| ContainerError::NoSuchMessage {
                code: code.to_string(),
                locale: locale.to_string(),
            })
    }

    /// 本地找不到的消息交给父消息源解析
    fn set_parent_message_source(&self, _parent: Option<Arc<dyn MessageSource>>) {}

    fn parent_message_source(&self) -> Option<Arc<dyn MessageSource>> {
        None
    }
}

/// `zh_CN` 依次尝试 `zh_CN`、`zh` 与默认消息
fn locale_candidates(locale: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut current = locale;
    while !current.is_empty() {
        candidates.push(current.to_string());
        current = match current.rfind('_') {
            Some(index) => &current[..index],
            None => "",
        };
    }
    candidates.push(String::new());
    candidates
}

/// 替换 `{n}` 占位；有参数时 `''` 表示一个单引号
pub(crate) fn format_message(message: &str, args: &[&str]) -> String {
    if args.is_empty() {
        return message.to_string();
    }
    let mut result = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(position) = rest.find(['{', '\'']) {
        result.push_str(&rest[..position]);
        let tail = &rest[position..];
        if let Some(after) = tail.strip_prefix("''") {
            result.push('\'');
            rest = after;
            continue;
        }
        if tail.starts_with('\'') {
            result.push('\'');
            rest = &tail[1..];
            continue;
        }
        let replaced = tail[1..].find('}').and_then(|end| {
            let index: usize = tail[1..=end].trim().parse().ok()?;
            let value = args.get(index)?;
            Some((value, end + 2))
        });
        match replaced {
            Some((value, consumed)) => {
                result.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                result.push('{');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// 以代码注册消息的消息源，主要用于测试与内置默认值
pub struct StaticMessageSource {
    /// code -> locale -> message
    messages: RwLock<HashMap<String, HashMap<String, String>>>,
    parent: RwLock<Option<Arc<dyn MessageSource>>>,
    use_code_as_default_message: AtomicBool,
}

impl StaticMessageSource {
    pub const TYPE_NAME: &'static str = "StaticMessageSource";

    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            parent: RwLock::new(None),
            use_code_as_default_message: AtomicBool::new(false),
        }
    }

    pub fn type_metadata() -> TypeMetadata {
        TypeMetadata::named::<Self>(Self::TYPE_NAME)
            .default_constructor(|| Ok(Self::new()))
            .message_source()
            .build()
    }

    pub fn add_message(&self, code: impl Into<String>, locale: impl Into<String>, message: impl Into<String>) {
        self.messages
            .write()
            .entry(code.into())
            .or_default()
            .insert(locale.into(), message.into());
    }

    pub fn add_messages<K, V>(&self, messages: impl IntoIterator<Item = (K, V)>, locale: &str)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (code, message) in messages {
            self.add_message(code, locale, message);
        }
    }

    /// 找不到消息时以代码本身作为消息，而不是报错
    pub fn set_use_code_as_default_message(&self, use_code: bool) {
        self.use_code_as_default_message.store(use_code, Ordering::SeqCst);
    }

    pub fn is_use_code_as_default_message(&self) -> bool {
        self.use_code_as_default_message.load(Ordering::SeqCst)
    }

    fn resolve_local(&self, code: &str, locale: &str) -> Option<String> {
        let messages = self.messages.read();
        let by_locale = messages.get(code)?;
        locale_candidates(locale)
            .iter()
            .find_map(|candidate| by_locale.get(candidate).cloned())
    }
}

impl Default for StaticMessageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSource for StaticMessageSource {
    fn get_message_or(&self, code: &str, args: &[&str], default_message: Option<&str>, locale: &str) -> Option<String> {
        if let Some(message) = self.resolve_local(code, locale) {
            return Some(format_message(&message, args));
        }
        let parent = self.parent.read().clone();
        if let Some(message) = parent.and_then(|p| p.get_message_or(code, args, None, locale)) {
            return Some(message);
        }
        if let Some(default_message) = default_message {
            return Some(format_message(default_message, args));
        }
        self.is_use_code_as_default_message().then(|| code.to_string())
    }

    fn set_parent_message_source(&self, parent: Option<Arc<dyn MessageSource>>) {
        *self.parent.write() = parent;
    }

    fn parent_message_source(&self) -> Option<Arc<dyn MessageSource>> {
        self.parent.read().clone()
    }
}

impl std::fmt::Debug for StaticMessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticMessageSource")
            .field("codes", &self.messages.read().len())
            .field("has_parent", &self.parent.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_and_quotes() {
        assert_eq!(format_message("Hello {0}, you are {1}", &["Ann", "late"]), "Hello Ann, you are late");
        assert_eq!(format_message("It''s {0}", &["here"]), "It's here");
        assert_eq!(format_message("It''s {0}", &[]), "It''s {0}");
        assert_eq!(format_message("{2} stays", &["a"]), "{2} stays");
    }

    #[test]
    fn test_locale_fallback_and_parent() {
        let parent = Arc::new(StaticMessageSource::new());
        parent.add_message("farewell", "", "Bye {0}");

        let source = StaticMessageSource::new();
        source.add_message("greeting", "en", "Hello {0}");
        source.add_message("greeting", "de_AT", "Servus {0}");
        source.set_parent_message_source(Some(parent));

        assert_eq!(source.get_message("greeting", &["Ann"], "en_US").unwrap(), "Hello Ann");
        assert_eq!(source.get_message("greeting", &["Ann"], "de_AT").unwrap(), "Servus Ann");
        assert_eq!(source.get_message("farewell", &["Ann"], "fr").unwrap(), "Bye Ann");
        assert!(source.get_message("greeting", &[], "fr").is_err());
    }

    #[test]
    fn test_default_message_and_code_fallback() {
        let source = StaticMessageSource::new();
        assert_eq!(
            source.get_message_or("missing", &["x"], Some("Default {0}"), "en").as_deref(),
            Some("Default x")
        );
        let err = source.get_message("missing", &[], "en").unwrap_err();
        assert!(matches!(err, ContainerError::NoSuchMessage { ref code, .. } if code == "missing"));

        source.set_use_code_as_default_message(true);
        assert_eq!(source.get_message("missing", &[], "en").unwrap(), "missing");
    }
}
