use std::sync::Arc;

use crate::bean::{AutowireMode, BeanDefinition, ValueHolder};
use crate::error::{ContainerError, ContainerResult};
use crate::types::{ParameterMetadata, TypeMetadata};
use crate::value::{Args, BeanObject, Value};

use super::default::DefaultListableBeanFactory;
use super::{BeanFactory, ConfigurableBeanFactory, DependencyDescriptor};

/// 已解析的实参，以及其中自动装配的 bean 名称
struct ArgumentsHolder {
    args: Args,
    autowired: Vec<String>,
}

/// 构造器与工厂方法的参数解析
impl DefaultListableBeanFactory {
    /// 从候选构造器中选出参数最多且能够满足的一个
    pub(super) fn autowire_constructor(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        metadata: &TypeMetadata,
        candidates: Option<Vec<usize>>,
        explicit_args: Option<&Args>,
    ) -> ContainerResult<BeanObject> {
        let constructors = metadata.constructors();
        let mut indices = candidates.unwrap_or_else(|| (0..constructors.len()).collect());
        indices.retain(|&i| i < constructors.len());
        indices.sort_by_key(|&i| std::cmp::Reverse(constructors[i].params.len()));

        if indices.is_empty() {
            return Err(ContainerError::BeanInstantiation {
                class_name: metadata.name().to_string(),
                message: "No constructor declared".to_string(),
                source: None,
            });
        }

        let instantiate = |index: usize, args: &Args| {
            constructors[index]
                .instantiate(args)
                .map_err(|e| ContainerError::BeanInstantiation {
                    class_name: metadata.name().to_string(),
                    message: format!("Constructor {} threw exception", constructors[index].signature(metadata.name())),
                    source: Some(e.into()),
                })
        };

        if let Some(explicit) = explicit_args.filter(|a| !a.is_empty()) {
            let index = indices
                .iter()
                .copied()
                .find(|&i| constructors[i].params.len() == explicit.len())
                .ok_or_else(|| {
                    ContainerError::bean_creation(
                        bean_name,
                        format!(
                            "Could not resolve matching constructor on bean class [{}] for {} explicit argument(s)",
                            metadata.name(),
                            explicit.len()
                        ),
                    )
                })?;
            return instantiate(index, explicit);
        }

        let autowiring = mbd.autowire_mode == AutowireMode::Constructor || !mbd.has_constructor_args();
        let min_args = minimum_argument_count(mbd);
        let mut chosen: Option<(usize, ArgumentsHolder)> = None;
        let mut last_error = None;

        for &index in &indices {
            let params = &constructors[index].params;
            if let Some((chosen_index, _)) = &chosen {
                if params.len() < constructors[*chosen_index].params.len() {
                    break;
                }
            }
            if params.len() < min_args {
                continue;
            }
            let owner = constructors[index].signature(metadata.name());
            match self.create_argument_array(bean_name, mbd, &owner, params, autowiring) {
                Ok(holder) => {
                    if chosen.is_some() {
                        if mbd.lenient_constructor_resolution {
                            continue;
                        }
                        return Err(ContainerError::bean_creation(
                            bean_name,
                            format!(
                                "Ambiguous constructor matches found on bean class [{}]: {} and {}",
                                metadata.name(),
                                chosen
                                    .as_ref()
                                    .map(|(i, _)| constructors[*i].signature(metadata.name()))
                                    .unwrap_or_default(),
                                owner
                            ),
                        ));
                    }
                    chosen = Some((index, holder));
                }
                Err(e) => {
                    tracing::trace!("Ignoring constructor {} of bean '{}': {}", owner, bean_name, e);
                    last_error = Some(e);
                }
            }
        }

        let Some((index, holder)) = chosen else {
            return Err(last_error.unwrap_or_else(|| {
                ContainerError::bean_creation(
                    bean_name,
                    format!(
                        "Could not resolve matching constructor on bean class [{}] (hint: specify index/type/name arguments for simple parameters to avoid type ambiguities)",
                        metadata.name()
                    ),
                )
            }));
        };
        for autowired in &holder.autowired {
            self.register_dependent_bean(autowired, bean_name);
            tracing::trace!(
                "Autowiring by type from bean name '{}' via constructor to bean named '{}'",
                bean_name,
                autowired
            );
        }
        instantiate(index, &holder.args)
    }

    /// 静态工厂方法或工厂 bean 上的实例工厂方法
    pub(super) fn instantiate_using_factory_method(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        explicit_args: Option<&Args>,
    ) -> ContainerResult<BeanObject> {
        let method_name = mbd.factory_method_name.as_deref().unwrap_or_default();

        let (owner, target) = match &mbd.factory_bean_name {
            Some(factory_bean_name) => {
                if self.transformed_bean_name(factory_bean_name) == bean_name {
                    return Err(ContainerError::BeanDefinitionStore {
                        bean_name: bean_name.to_string(),
                        message: "factory-bean reference points back to the same bean definition".to_string(),
                    });
                }
                let factory_bean = self.get_bean(factory_bean_name)?;
                if mbd.is_singleton() && self.singletons.contains_singleton(bean_name) {
                    return Err(ContainerError::IllegalState(format!(
                        "Singleton '{}' appeared implicitly while its factory bean was being created",
                        bean_name
                    )));
                }
                self.register_dependent_bean(factory_bean_name, bean_name);
                let owner = self.types.describe_instance(&factory_bean).ok_or_else(|| {
                    ContainerError::bean_creation(
                        bean_name,
                        format!("Type of factory bean '{}' is not registered", factory_bean_name),
                    )
                })?;
                (owner, Some(factory_bean))
            }
            None => {
                let class_name = mbd.describe_class();
                let owner = self
                    .metadata_for_class(class_name)
                    .ok_or_else(|| ContainerError::CannotLoadBeanClass {
                        bean_name: bean_name.to_string(),
                        class_name: class_name.to_string(),
                    })?;
                (owner, None)
            }
        };

        let is_static = target.is_none();
        let mut methods: Vec<_> = owner
            .methods()
            .iter()
            .filter(|m| m.name == method_name && m.is_static == is_static && m.is_invocable())
            .collect();
        methods.sort_by_key(|m| std::cmp::Reverse(m.params.len()));

        let no_match = || {
            ContainerError::bean_creation(
                bean_name,
                format!(
                    "No matching factory method found on class [{}]: {}factory method '{}'. Check that a method with the specified name exists and that it is {}.",
                    owner.name(),
                    mbd.factory_bean_name
                        .as_ref()
                        .map(|f| format!("factory bean '{}'; ", f))
                        .unwrap_or_default(),
                    method_name,
                    if is_static { "static" } else { "non-static" }
                ),
            )
        };

        let (method, args) = match explicit_args.filter(|a| !a.is_empty()) {
            Some(explicit) => {
                let method = methods
                    .into_iter()
                    .find(|m| m.params.len() == explicit.len())
                    .ok_or_else(no_match)?;
                (method, explicit.clone())
            }
            None => {
                let min_args = minimum_argument_count(mbd);
                let mut resolved = None;
                let mut last_error = None;
                for method in methods {
                    if method.params.len() < min_args {
                        continue;
                    }
                    let owner_label = format!("{}.{}", owner.name(), method.signature());
                    match self.create_argument_array(bean_name, mbd, &owner_label, &method.params, true) {
                        Ok(holder) => {
                            resolved = Some((method, holder));
                            break;
                        }
                        Err(e) => last_error = Some(e),
                    }
                }
                let (method, holder) = match resolved {
                    Some(found) => found,
                    None => return Err(last_error.unwrap_or_else(no_match)),
                };
                for autowired in &holder.autowired {
                    self.register_dependent_bean(autowired, bean_name);
                }
                (method, holder.args)
            }
        };

        let result = method.call(target.as_ref(), &args).map_err(|e| ContainerError::BeanInstantiation {
            class_name: owner.name().to_string(),
            message: format!("Factory method '{}' threw exception", method.name),
            source: Some(e.into()),
        })?;
        match result {
            Value::Object(object) => Ok(object),
            Value::Text(text) => Ok(Arc::new(text)),
            Value::Null => Err(ContainerError::bean_creation(
                bean_name,
                format!("Factory method '{}' returned null", method.name),
            )),
            other => Err(ContainerError::BeanInstantiation {
                class_name: owner.name().to_string(),
                message: format!(
                    "Factory method '{}' returned {} which cannot be exposed as a bean",
                    method.name,
                    other.describe()
                ),
                source: None,
            }),
        }
    }

    /// 按位置匹配定义中的参数，其余参数自动装配
    fn create_argument_array(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        owner: &str,
        params: &[ParameterMetadata],
        autowiring: bool,
    ) -> ContainerResult<ArgumentsHolder> {
        let arguments = &mbd.constructor_args;
        let mut used_generic = vec![false; arguments.generic().len()];
        let mut values = Vec::with_capacity(params.len());
        let mut autowired = Vec::new();

        for (index, param) in params.iter().enumerate() {
            let holder = arguments
                .indexed()
                .get(&index)
                .filter(|h| holder_matches(h, param))
                .or_else(|| take_generic(arguments.generic(), &mut used_generic, param));

            if let Some(holder) = holder {
                let resolved = self
                    .resolve_metadata_value(bean_name, mbd, &holder.value)
                    .map_err(|e| unsatisfied(bean_name, index, param, owner, e))?;
                let converted = self
                    .convert_value(resolved, &param.ty, param.name.as_deref())
                    .map_err(|e| unsatisfied(bean_name, index, param, owner, e))?;
                values.push(converted);
                continue;
            }

            if !autowiring {
                return Err(unsatisfied(
                    bean_name,
                    index,
                    param,
                    owner,
                    ContainerError::IllegalArgument(
                        "Ambiguous argument values for parameter: did you specify the correct bean references as arguments?"
                            .to_string(),
                    ),
                ));
            }

            let descriptor = DependencyDescriptor::for_parameter(owner, index, param, true);
            let value = self
                .do_resolve_dependency(&descriptor, Some(bean_name), &mut autowired)
                .map_err(|e| unsatisfied(bean_name, index, param, owner, e))?;
            values.push(value);
        }

        Ok(ArgumentsHolder {
            args: Args::new(values),
            autowired,
        })
    }
}

fn minimum_argument_count(mbd: &BeanDefinition) -> usize {
    let arguments = &mbd.constructor_args;
    let highest_index = arguments.indexed().keys().next_back().map_or(0, |i| i + 1);
    highest_index.max(arguments.argument_count())
}

fn holder_matches(holder: &ValueHolder, param: &ParameterMetadata) -> bool {
    holder.ty.as_ref().map_or(true, |ty| ty == &param.ty)
        && holder
            .name
            .as_ref()
            .map_or(true, |name| param.name.as_ref().map_or(true, |p| p == name))
}

/// 优先按名称、类型匹配未使用的通用参数，最后取第一个未声明类型与名称的参数
fn take_generic<'a>(
    generic: &'a [ValueHolder],
    used: &mut [bool],
    param: &ParameterMetadata,
) -> Option<&'a ValueHolder> {
    let position = generic
        .iter()
        .enumerate()
        .position(|(i, h)| {
            !used[i]
                && (h.name.is_some() || h.ty.is_some())
                && holder_matches(h, param)
        })
        .or_else(|| {
            generic
                .iter()
                .enumerate()
                .position(|(i, h)| !used[i] && h.name.is_none() && h.ty.is_none())
        })?;
    used[position] = true;
    Some(&generic[position])
}

fn unsatisfied(
    bean_name: &str,
    index: usize,
    param: &ParameterMetadata,
    owner: &str,
    source: ContainerError,
) -> ContainerError {
    ContainerError::UnsatisfiedDependency {
        bean_name: bean_name.to_string(),
        injection_point: DependencyDescriptor::for_parameter(owner, index, param, true).to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::bean::{AutowireMode, BeanDefinition, BeanDefinitionRegistry, BeanMetadataValue};
    use crate::factory::{
        AutowireCapableBeanFactory, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, DefaultListableBeanFactory,
        ListableBeanFactory,
    };
    use crate::types::{MethodMetadata, ParameterMetadata, ResolvableType, TypeMetadata};

    struct Engine {
        cylinders: u32,
    }

    struct Car {
        engine: Arc<Engine>,
        model: String,
    }

    struct Garage;

    fn factory() -> Arc<DefaultListableBeanFactory> {
        let factory = DefaultListableBeanFactory::new();
        let types = factory.types();
        types.register(
            TypeMetadata::named::<Engine>("Engine")
                .constructor(
                    vec![ParameterMetadata::new("cylinders", ResolvableType::of::<u32>())],
                    |args| Ok(Engine { cylinders: args.value::<u32>(0)? }),
                )
                .method(
                    MethodMetadata::new("v8")
                        .factory(|_| Ok(Engine { cylinders: 8 })),
                )
                .build(),
        );
        types.register(
            TypeMetadata::named::<Car>("Car")
                .constructor(
                    vec![
                        ParameterMetadata::new("engine", ResolvableType::class("Engine")),
                        ParameterMetadata::new("model", ResolvableType::of::<String>()),
                    ],
                    |args| {
                        Ok(Car {
                            engine: args.bean::<Engine>(0)?,
                            model: args.text(1)?,
                        })
                    },
                )
                .build(),
        );
        types.register(
            TypeMetadata::named::<Garage>("Garage")
                .default_constructor(|| Ok(Garage))
                .method(
                    MethodMetadata::new("build")
                        .param(ParameterMetadata::new("engine", ResolvableType::class("Engine")))
                        .instance_factory::<Garage, Car, _>(|_, args| {
                            Ok(Car {
                                engine: args.bean::<Engine>(0)?,
                                model: "custom".to_string(),
                            })
                        }),
                )
                .build(),
        );
        factory
    }

    #[test]
    fn test_constructor_arguments_are_converted() {
        let factory = factory();
        factory
            .register_bean_definition("engine", BeanDefinition::class("Engine").with_constructor_arg("6"))
            .unwrap();
        factory
            .register_bean_definition(
                "car",
                BeanDefinition::class("Car")
                    .with_indexed_arg(0, BeanMetadataValue::reference("engine"))
                    .with_indexed_arg(1, "roadster"),
            )
            .unwrap();

        let car = factory.get_bean_as::<Car>("car").unwrap();
        assert_eq!(car.engine.cylinders, 6);
        assert_eq!(car.model, "roadster");
        assert_eq!(factory.dependent_beans("engine"), vec!["car".to_string()]);
    }

    #[test]
    fn test_constructor_autowiring_with_partial_arguments() {
        let factory = factory();
        factory
            .register_bean_definition("engine", BeanDefinition::class("Engine").with_constructor_arg("4"))
            .unwrap();
        factory
            .register_bean_definition(
                "car",
                BeanDefinition::class("Car")
                    .with_autowire(AutowireMode::Constructor)
                    .with_indexed_arg(1, "coupe"),
            )
            .unwrap();

        let car = factory.get_bean_as::<Car>("car").unwrap();
        assert_eq!(car.engine.cylinders, 4);
        assert_eq!(car.model, "coupe");
    }

    #[test]
    fn test_static_and_instance_factory_methods() {
        let factory = factory();
        factory
            .register_bean_definition("engine", BeanDefinition::class("Engine").with_factory_method("v8"))
            .unwrap();
        factory.register_bean_definition("garage", BeanDefinition::class("Garage")).unwrap();
        factory
            .register_bean_definition("car", BeanDefinition::new().with_factory_bean("garage", "build"))
            .unwrap();

        let car = factory.get_bean_as::<Car>("car").unwrap();
        assert_eq!(car.engine.cylinders, 8);
        assert_eq!(car.model, "custom");
        assert!(factory.dependent_beans("garage").contains(&"car".to_string()));
    }

    #[test]
    fn test_factory_method_products_match_by_registered_name() {
        let factory = factory();
        factory
            .register_bean_definition("engine", BeanDefinition::class("Engine").with_factory_method("v8"))
            .unwrap();
        factory.register_bean_definition("garage", BeanDefinition::class("Garage")).unwrap();
        factory
            .register_bean_definition("car", BeanDefinition::new().with_factory_bean("garage", "build"))
            .unwrap();

        let engine_type = ResolvableType::class("Engine");
        assert_eq!(factory.get_bean_names_for_type(&engine_type, true, false), vec!["engine".to_string()]);
        assert_eq!(
            factory.get_bean_names_for_type(&ResolvableType::class("Car"), true, true),
            vec!["car".to_string()]
        );
        let (name, _) = factory.resolve_named_bean(&engine_type).unwrap();
        assert_eq!(name, "engine");
    }

    #[test]
    fn test_missing_constructor_argument_is_unsatisfied() {
        let factory = factory();
        factory.register_bean_definition("engine", BeanDefinition::class("Engine")).unwrap();
        let err = factory.get_bean("engine").unwrap_err();
        assert!(err.is_no_such_bean(), "unexpected error: {}", err);
    }
}
