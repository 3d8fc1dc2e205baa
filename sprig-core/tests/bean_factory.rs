use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use sprig_core::bean::AutowireMode;
use sprig_core::factory::DependencyDescriptor;
use sprig_core::prelude::*;

struct Left {
    right: OnceLock<Weak<Right>>,
}

struct Right {
    left: OnceLock<Weak<Left>>,
}

struct Chicken {
    _egg: Arc<Egg>,
}

struct Egg {
    _chicken: Arc<Chicken>,
}

trait Store: Send + Sync {
    fn id(&self) -> &'static str;
}

struct Disk;
struct Memory;

impl Store for Disk {
    fn id(&self) -> &'static str {
        "disk"
    }
}

impl Store for Memory {
    fn id(&self) -> &'static str {
        "memory"
    }
}

struct Shop {
    store: Arc<dyn Store>,
}

fn factory() -> Arc<DefaultListableBeanFactory> {
    let factory = DefaultListableBeanFactory::new();
    let types = factory.types();
    types.register(
        TypeMetadata::named::<Left>("Left")
            .default_constructor(|| Ok(Left { right: OnceLock::new() }))
            .property(
                PropertyMetadata::new("right", ResolvableType::class("Right")).setter(|left: &Left, value: Value| {
                    let _ = left.right.set(Arc::downgrade(&value.downcast::<Right>()?));
                    Ok(())
                }),
            )
            .build(),
    );
    types.register(
        TypeMetadata::named::<Right>("Right")
            .default_constructor(|| Ok(Right { left: OnceLock::new() }))
            .property(
                PropertyMetadata::new("left", ResolvableType::class("Left")).setter(|right: &Right, value: Value| {
                    let _ = right.left.set(Arc::downgrade(&value.downcast::<Left>()?));
                    Ok(())
                }),
            )
            .build(),
    );
    types.register(
        TypeMetadata::named::<Chicken>("Chicken")
            .constructor(vec![ParameterMetadata::new("egg", ResolvableType::class("Egg"))], |args| {
                Ok(Chicken { _egg: args.bean::<Egg>(0)? })
            })
            .build(),
    );
    types.register(
        TypeMetadata::named::<Egg>("Egg")
            .constructor(vec![ParameterMetadata::new("chicken", ResolvableType::class("Chicken"))], |args| {
                Ok(Egg { _chicken: args.bean::<Chicken>(0)? })
            })
            .build(),
    );
    types.register(TypeMetadata::interface("Store").build());
    types.register(
        TypeMetadata::named::<Disk>("Disk")
            .default_constructor(|| Ok(Disk))
            .implements_as::<dyn Store>(ResolvableType::class("Store"), |d| d as Arc<dyn Store>)
            .build(),
    );
    types.register(
        TypeMetadata::named::<Memory>("Memory")
            .default_constructor(|| Ok(Memory))
            .implements_as::<dyn Store>(ResolvableType::class("Store"), |m| m as Arc<dyn Store>)
            .build(),
    );
    types.register(
        TypeMetadata::named::<Shop>("Shop")
            .constructor(vec![ParameterMetadata::new("store", ResolvableType::class("Store"))], |args| {
                Ok(Shop { store: args.dyn_bean::<dyn Store>(0)? })
            })
            .build(),
    );
    factory
}

#[test]
fn singleton_is_shared_and_prototype_is_fresh() {
    let factory = factory();
    factory.register_bean_definition("disk", BeanDefinition::class("Disk")).unwrap();
    factory
        .register_bean_definition("scratch", BeanDefinition::class("Memory").prototype())
        .unwrap();

    let first = factory.get_bean("disk").unwrap();
    let second = factory.get_bean("disk").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let a = factory.get_bean("scratch").unwrap();
    let b = factory.get_bean("scratch").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(factory.is_singleton("disk").unwrap());
    assert!(factory.is_prototype("scratch").unwrap());
}

#[test]
fn circular_setter_injection_resolves_through_early_references() {
    let factory = factory();
    factory
        .register_bean_definition(
            "left",
            BeanDefinition::class("Left").with_property("right", BeanMetadataValue::reference("right")),
        )
        .unwrap();
    factory
        .register_bean_definition(
            "right",
            BeanDefinition::class("Right").with_property("left", BeanMetadataValue::reference("left")),
        )
        .unwrap();

    let left = factory.get_bean_as::<Left>("left").unwrap();
    let right = factory.get_bean_as::<Right>("right").unwrap();
    let seen_right = left.right.get().and_then(Weak::upgrade).unwrap();
    let seen_left = right.left.get().and_then(Weak::upgrade).unwrap();
    assert!(Arc::ptr_eq(&seen_right, &right));
    assert!(Arc::ptr_eq(&seen_left, &left));
}

#[test]
fn circular_setter_injection_fails_when_disallowed() {
    let factory = factory();
    factory.set_allow_circular_references(false);
    factory
        .register_bean_definition(
            "left",
            BeanDefinition::class("Left").with_property("right", BeanMetadataValue::reference("right")),
        )
        .unwrap();
    factory
        .register_bean_definition(
            "right",
            BeanDefinition::class("Right").with_property("left", BeanMetadataValue::reference("left")),
        )
        .unwrap();

    let err = factory.get_bean("left").unwrap_err();
    assert!(err.is_currently_in_creation(), "unexpected error: {}", err);
}

#[test]
fn circular_constructor_injection_is_reported() {
    let factory = factory();
    factory
        .register_bean_definition("chicken", BeanDefinition::class("Chicken").with_autowire(AutowireMode::Constructor))
        .unwrap();
    factory
        .register_bean_definition("egg", BeanDefinition::class("Egg").with_autowire(AutowireMode::Constructor))
        .unwrap();

    let err = factory.get_bean("chicken").unwrap_err();
    assert!(err.is_currently_in_creation(), "unexpected error: {}", err);
    assert!(!factory.contains_singleton("chicken"));
    assert!(!factory.contains_singleton("egg"));
}

#[test]
fn primary_candidate_breaks_the_tie() {
    let factory = factory();
    factory.register_bean_definition("disk", BeanDefinition::class("Disk")).unwrap();
    factory
        .register_bean_definition("memory", BeanDefinition::class("Memory").with_primary(true))
        .unwrap();
    factory
        .register_bean_definition("shop", BeanDefinition::class("Shop").with_autowire(AutowireMode::Constructor))
        .unwrap();

    let shop = factory.get_bean_as::<Shop>("shop").unwrap();
    assert_eq!(shop.store.id(), "memory");
}

#[test]
fn candidates_without_a_single_primary_are_ambiguous() {
    let factory = factory();
    factory.register_bean_definition("disk", BeanDefinition::class("Disk")).unwrap();
    factory.register_bean_definition("memory", BeanDefinition::class("Memory")).unwrap();
    let descriptor = DependencyDescriptor::new(ResolvableType::class("Store"), true);
    match factory.resolve_dependency(&descriptor, None) {
        Err(ContainerError::NoUniqueBeanDefinition { candidates, .. }) => {
            assert!(candidates.contains(&"disk".to_string()));
            assert!(candidates.contains(&"memory".to_string()));
        }
        other => panic!("unexpected result: {:?}", other.map(|v| v.describe())),
    }

    factory
        .register_bean_definition("disk", BeanDefinition::class("Disk").with_primary(true))
        .unwrap();
    factory
        .register_bean_definition("memory", BeanDefinition::class("Memory").with_primary(true))
        .unwrap();
    assert!(factory
        .resolve_dependency(&descriptor, None)
        .unwrap_err()
        .is_no_unique_bean());
}

#[test]
fn concurrent_lookups_create_the_singleton_once() {
    let factory = DefaultListableBeanFactory::new();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    factory
        .register_bean_definition(
            "slow",
            BeanDefinition::with_supplier(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                Ok(Memory)
            }),
        )
        .unwrap();

    let beans: Vec<BeanObject> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| factory.get_bean("slow").unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(beans.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn distinct_singletons_are_created_in_parallel() {
    let factory = DefaultListableBeanFactory::new();
    let arrived = Arc::new(AtomicUsize::new(0));
    for name in ["first", "second"] {
        let arrived = arrived.clone();
        factory
            .register_bean_definition(
                name,
                BeanDefinition::with_supplier(move || {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    // 另一个 bean 的创建必须在本次创建结束前开始
                    let deadline = Instant::now() + Duration::from_secs(5);
                    while arrived.load(Ordering::SeqCst) < 2 {
                        if Instant::now() > deadline {
                            return Err(anyhow!("creation of the other singleton never started"));
                        }
                        thread::sleep(Duration::from_millis(5));
                    }
                    Ok(Memory)
                }),
            )
            .unwrap();
    }

    thread::scope(|scope| {
        let first = scope.spawn(|| factory.get_bean("first"));
        let second = scope.spawn(|| factory.get_bean("second"));
        assert!(first.join().unwrap().is_ok());
        assert!(second.join().unwrap().is_ok());
    });
    assert_eq!(factory.singleton_count(), 2);
}

fn ordered_stores() -> Arc<DefaultListableBeanFactory> {
    let factory = factory();
    let types = factory.types();
    types.register(
        TypeMetadata::named::<Disk>("Disk")
            .default_constructor(|| Ok(Disk))
            .implements_as::<dyn Store>(ResolvableType::class("Store"), |d| d as Arc<dyn Store>)
            .annotated(Annotation::value(standard::ORDER, 5i32))
            .build(),
    );
    types.register(
        TypeMetadata::named::<Memory>("Memory")
            .default_constructor(|| Ok(Memory))
            .implements_as::<dyn Store>(ResolvableType::class("Store"), |m| m as Arc<dyn Store>)
            .annotated(Annotation::value(standard::ORDER, 1i32))
            .build(),
    );
    factory.register_bean_definition("disk", BeanDefinition::class("Disk")).unwrap();
    factory.register_bean_definition("memory", BeanDefinition::class("Memory")).unwrap();
    factory
}

#[test]
fn collection_injection_follows_order_annotations() {
    let factory = ordered_stores();
    let descriptor = DependencyDescriptor::new(ResolvableType::vec_of(ResolvableType::class("Store")), true);
    let Value::List(items) = factory.resolve_dependency(&descriptor, None).unwrap() else {
        panic!("expected a list");
    };
    let ids: Vec<&str> = items
        .iter()
        .map(|item| item.downcast_dyn::<dyn Store>().unwrap().id())
        .collect();
    // 注册顺序是 disk、memory
    assert_eq!(ids, vec!["memory", "disk"]);
}

#[test]
fn map_injection_is_keyed_by_bean_name() {
    let factory = ordered_stores();
    let descriptor = DependencyDescriptor::new(ResolvableType::map_of(ResolvableType::class("Store")), true);
    let Value::Map(entries) = factory.resolve_dependency(&descriptor, None).unwrap() else {
        panic!("expected a map");
    };
    let mut keyed: Vec<(String, &str)> = entries
        .iter()
        .map(|(name, item)| (name.clone(), item.downcast_dyn::<dyn Store>().unwrap().id()))
        .collect();
    keyed.sort();
    assert_eq!(
        keyed,
        vec![("disk".to_string(), "disk"), ("memory".to_string(), "memory")]
    );
}

#[test]
fn destroying_singletons_empties_the_cache() {
    let factory = factory();
    factory.register_bean_definition("disk", BeanDefinition::class("Disk")).unwrap();
    factory.preinstantiate_singletons().unwrap();
    assert!(factory.contains_singleton("disk"));

    factory.destroy_singletons();
    assert_eq!(factory.singleton_count(), 0);
    // 定义仍在，可以重新创建
    assert!(factory.get_bean("disk").is_ok());
}
