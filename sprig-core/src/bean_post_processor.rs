//! BeanPostProcessor - Bean 工厂扩展机制
//!
//! 提供在 Bean 实例化、属性注入、初始化与销毁前后进行自定义处理的钩子。
//! 子接口通过 `as_*` 方法暴露，工厂在每个阶段只调用实现了对应子接口的处理器。

use crate::bean::MutablePropertyValues;
use crate::constants::LOWEST_PRECEDENCE;
use crate::error::ContainerResult;
use crate::types::{ResolvableType, TypeMetadata};
use crate::value::BeanObject;

/// BeanPostProcessor trait
///
/// 在 Bean 初始化的不同阶段提供钩子，允许替换或包装 Bean 实例。
/// 返回 `None` 表示停止执行后续处理器，沿用当前的 Bean。
///
/// # 示例
///
/// ```ignore
/// struct LoggingPostProcessor;
///
/// impl BeanPostProcessor for LoggingPostProcessor {
///     fn post_process_after_initialization(
///         &self,
///         bean: BeanObject,
///         bean_name: &str,
///     ) -> ContainerResult<Option<BeanObject>> {
///         tracing::info!("After initialization: {}", bean_name);
///         Ok(Some(bean))
///     }
/// }
/// ```
pub trait BeanPostProcessor: Send + Sync {
    /// 在初始化回调（InitializingBean、init 方法）之前调用
    fn post_process_before_initialization(
        &self,
        bean: BeanObject,
        _bean_name: &str,
    ) -> ContainerResult<Option<BeanObject>> {
        Ok(Some(bean))
    }

    /// 在初始化回调之后调用
    ///
    /// # 典型用途
    /// - 创建代理
    /// - 包装 Bean
    /// - 登记监听器
    fn post_process_after_initialization(
        &self,
        bean: BeanObject,
        _bean_name: &str,
    ) -> ContainerResult<Option<BeanObject>> {
        Ok(Some(bean))
    }

    /// 获取处理器的名称（用于日志和调试）
    fn name(&self) -> &str {
        "BeanPostProcessor"
    }

    /// 同一批处理器内的顺序，数字越小越先执行
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    fn as_instantiation_aware(&self) -> Option<&dyn InstantiationAwareBeanPostProcessor> {
        None
    }

    fn as_smart_instantiation_aware(&self) -> Option<&dyn SmartInstantiationAwareBeanPostProcessor> {
        None
    }

    fn as_destruction_aware(&self) -> Option<&dyn DestructionAwareBeanPostProcessor> {
        None
    }
}

/// 实例化前后与属性注入阶段的钩子
pub trait InstantiationAwareBeanPostProcessor: BeanPostProcessor {
    /// 返回实例时跳过默认的实例化流程，只再执行初始化后的处理
    fn post_process_before_instantiation(
        &self,
        _metadata: &TypeMetadata,
        _bean_name: &str,
    ) -> ContainerResult<Option<BeanObject>> {
        Ok(None)
    }

    /// 返回 `false` 时跳过属性注入
    fn post_process_after_instantiation(&self, _bean: &BeanObject, _bean_name: &str) -> ContainerResult<bool> {
        Ok(true)
    }

    /// 在属性值写入之前处理；返回 `None` 时跳过属性写入
    fn post_process_properties(
        &self,
        pvs: MutablePropertyValues,
        _bean: &BeanObject,
        _metadata: &TypeMetadata,
        _bean_name: &str,
    ) -> ContainerResult<Option<MutablePropertyValues>> {
        Ok(Some(pvs))
    }
}

/// 参与类型预测、构造器选择与早期引用暴露
pub trait SmartInstantiationAwareBeanPostProcessor: InstantiationAwareBeanPostProcessor {
    fn predict_bean_type(&self, _metadata: &TypeMetadata, _bean_name: &str) -> Option<ResolvableType> {
        None
    }

    /// 候选构造器在元数据中的下标
    fn determine_candidate_constructors(
        &self,
        _metadata: &TypeMetadata,
        _bean_name: &str,
    ) -> ContainerResult<Option<Vec<usize>>> {
        Ok(None)
    }

    /// 循环引用时提前暴露给其他 bean 的引用
    fn get_early_bean_reference(&self, bean: BeanObject, _bean_name: &str) -> ContainerResult<BeanObject> {
        Ok(bean)
    }
}

/// 销毁前回调
pub trait DestructionAwareBeanPostProcessor: BeanPostProcessor {
    fn post_process_before_destruction(&self, bean: &BeanObject, bean_name: &str) -> ContainerResult<()>;

    fn requires_destruction(&self, _bean: &BeanObject, _bean_name: &str) -> bool {
        true
    }
}
