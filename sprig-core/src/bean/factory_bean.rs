use crate::types::ResolvableType;
use crate::value::BeanObject;

/// FactoryBean trait
///
/// 注册为 bean 的工厂本身。按名称获取时得到的是 [`get_object`](FactoryBean::get_object)
/// 的产物，名称加 `&` 前缀时得到工厂本身。
///
/// # 示例
///
/// ```ignore
/// struct ConnectionFactory { url: String }
///
/// impl FactoryBean for ConnectionFactory {
///     fn get_object(&self) -> anyhow::Result<BeanObject> {
///         Ok(Arc::new(Connection::open(&self.url)?))
///     }
///
///     fn object_type(&self) -> Option<ResolvableType> {
///         Some(ResolvableType::of::<Connection>())
///     }
/// }
/// ```
pub trait FactoryBean: Send + Sync {
    fn get_object(&self) -> anyhow::Result<BeanObject>;

    /// 产物类型，事先无法确定时返回 `None`
    fn object_type(&self) -> Option<ResolvableType>;

    /// 单例产物只创建一次并由容器缓存
    fn is_singleton(&self) -> bool {
        true
    }

    /// 预实例化单例时是否立即创建产物
    fn is_eager_init(&self) -> bool {
        false
    }
}
