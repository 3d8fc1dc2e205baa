use crate::constants::{GENERATED_BEAN_NAME_SEPARATOR, INNER_BEAN_PREFIX};
use crate::error::{ContainerError, ContainerResult};
use crate::types::short_type_name;
use crate::utils::naming::to_camel_case;

use super::{AliasRegistry, BeanDefinition};

/// Bean 定义注册表
///
/// 定义读取器（配置文件、注解扫描或代码）通过它注册定义，
/// 注册阶段的后处理器也可以借它追加定义。
pub trait BeanDefinitionRegistry: AliasRegistry {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> ContainerResult<()>;

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()>;

    /// 注册时的原始定义（未与父定义合并）
    fn get_bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition>;

    fn contains_bean_definition(&self, name: &str) -> bool;

    /// 按注册顺序
    fn bean_definition_names(&self) -> Vec<String>;

    fn bean_definition_count(&self) -> usize;

    /// 名称是否已被定义或别名占用
    fn is_bean_name_in_use(&self, name: &str) -> bool {
        self.contains_bean_definition(name) || self.is_alias(name)
    }

    /// 原地修改已注册的定义
    fn modify_bean_definition(
        &self,
        name: &str,
        modifier: &mut dyn FnMut(&mut BeanDefinition),
    ) -> ContainerResult<()>;
}

/// 为匿名定义生成名称：短类型名转为 camelCase，重名时追加 `#n`
///
/// 内部 bean 使用 `(inner bean)#n` 形式。
pub fn generate_bean_name(
    definition: &BeanDefinition,
    registry: &dyn BeanDefinitionRegistry,
    is_inner_bean: bool,
) -> ContainerResult<String> {
    let base = match (&definition.bean_class_name, &definition.parent_name, &definition.factory_bean_name) {
        (Some(class_name), _, _) => to_camel_case(short_type_name(class_name)),
        (None, Some(parent), _) => format!("{}$child", parent),
        (None, None, Some(factory_bean)) => format!("{}$created", factory_bean),
        (None, None, None) => {
            return Err(ContainerError::BeanDefinitionStore {
                bean_name: String::new(),
                message: "Unnamed bean definition specifies neither 'class' nor 'parent' nor 'factory-bean' - can't generate bean name".to_string(),
            })
        }
    };
    if is_inner_bean {
        return Ok(format!("{}{}{}", INNER_BEAN_PREFIX, GENERATED_BEAN_NAME_SEPARATOR, base));
    }
    if !registry.is_bean_name_in_use(&base) {
        return Ok(base);
    }
    let mut counter = 0usize;
    loop {
        let candidate = format!("{}{}{}", base, GENERATED_BEAN_NAME_SEPARATOR, counter);
        if !registry.is_bean_name_in_use(&candidate) {
            return Ok(candidate);
        }
        counter += 1;
    }
}

/// 注册定义并同时注册别名
pub fn register_with_aliases(
    registry: &dyn BeanDefinitionRegistry,
    name: &str,
    aliases: &[&str],
    definition: BeanDefinition,
) -> ContainerResult<()> {
    registry.register_bean_definition(name, definition)?;
    for alias in aliases {
        registry.register_alias(name, alias)?;
    }
    Ok(())
}
