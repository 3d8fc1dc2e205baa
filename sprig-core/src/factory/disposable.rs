use std::sync::Arc;

use crate::bean::BeanDefinition;
use crate::bean_post_processor::BeanPostProcessor;
use crate::constants::INFER_METHOD;
use crate::lifecycle::DisposableBean;
use crate::types::{MethodMetadata, TypeMetadata};
use crate::value::{Args, BeanObject};

const INFERRED_DESTROY_METHODS: [&str; 2] = ["close", "shutdown"];

/// 单例销毁时执行的回调集合
///
/// 依次执行：DestructionAware 后处理器、`DisposableBean::destroy`、自定义 destroy 方法。
/// 每一步失败只记录警告，不影响后续步骤。
pub(crate) struct DisposableBeanAdapter {
    bean: BeanObject,
    bean_name: String,
    disposable: Option<Arc<dyn DisposableBean>>,
    destroy_methods: Vec<MethodMetadata>,
    processors: Vec<Arc<dyn BeanPostProcessor>>,
}

impl DisposableBeanAdapter {
    /// 没有任何销毁回调时返回 `None`
    pub fn new(
        bean_name: &str,
        bean: BeanObject,
        metadata: Option<&TypeMetadata>,
        definition: &BeanDefinition,
        processors: &[Arc<dyn BeanPostProcessor>],
    ) -> Option<Self> {
        let disposable = metadata
            .and_then(|m| m.capabilities().disposable_bean.as_ref())
            .and_then(|cast| cast(&bean));

        let mut destroy_methods = Vec::new();
        if let Some(metadata) = metadata {
            for name in &definition.destroy_method_names {
                if name == INFER_METHOD {
                    if disposable.is_none() {
                        if let Some(method) = INFERRED_DESTROY_METHODS
                            .iter()
                            .find_map(|candidate| metadata.no_arg_method(candidate))
                        {
                            destroy_methods.push(method.clone());
                        }
                    }
                    continue;
                }
                if disposable.is_some() && name == "destroy" {
                    continue;
                }
                match metadata.no_arg_method(name) {
                    Some(method) => destroy_methods.push(method.clone()),
                    None => tracing::warn!(
                        "Could not find a destroy method named '{}' on bean with name '{}'",
                        name,
                        bean_name
                    ),
                }
            }
        }

        let processors: Vec<Arc<dyn BeanPostProcessor>> = processors
            .iter()
            .filter(|p| {
                p.as_destruction_aware()
                    .is_some_and(|d| d.requires_destruction(&bean, bean_name))
            })
            .cloned()
            .collect();

        if disposable.is_none() && destroy_methods.is_empty() && processors.is_empty() {
            return None;
        }
        Some(Self {
            bean,
            bean_name: bean_name.to_string(),
            disposable,
            destroy_methods,
            processors,
        })
    }

    pub fn destroy(&self) {
        for processor in &self.processors {
            if let Some(aware) = processor.as_destruction_aware() {
                if let Err(e) = aware.post_process_before_destruction(&self.bean, &self.bean_name) {
                    tracing::warn!(
                        "Destruction callback of {} failed on bean with name '{}': {}",
                        processor.name(),
                        self.bean_name,
                        e
                    );
                }
            }
        }

        if let Some(disposable) = &self.disposable {
            tracing::trace!("Invoking destroy() on bean with name '{}'", self.bean_name);
            if let Err(e) = disposable.destroy() {
                tracing::warn!(
                    "Invocation of destroy method failed on bean with name '{}': {}",
                    self.bean_name,
                    e
                );
            }
        }

        for method in &self.destroy_methods {
            tracing::trace!(
                "Invoking custom destroy method '{}' on bean with name '{}'",
                method.name,
                self.bean_name
            );
            if let Err(e) = method.call(Some(&self.bean), &Args::empty()) {
                tracing::warn!(
                    "Custom destroy method '{}' on bean with name '{}' threw an exception: {}",
                    method.name,
                    self.bean_name,
                    e
                );
            }
        }
    }
}
