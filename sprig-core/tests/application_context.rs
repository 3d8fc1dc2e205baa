use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use sprig_core::event::ContextRefreshedEvent;
use sprig_core::prelude::*;

fn builder() -> ApplicationContextBuilder {
    GenericApplicationContext::builder()
        .environment(Arc::new(Environment::empty()))
        .types(Arc::new(TypeRegistry::new()))
}

struct Settings {
    name: OnceLock<String>,
    region: OnceLock<String>,
}

fn settings_type() -> TypeMetadata {
    TypeMetadata::named::<Settings>("Settings")
        .default_constructor(|| {
            Ok(Settings {
                name: OnceLock::new(),
                region: OnceLock::new(),
            })
        })
        .property(
            PropertyMetadata::new("name", ResolvableType::of::<String>())
                .annotated(Annotation::value(standard::VALUE, "${app.name:fallback}"))
                .setter(|s: &Settings, v: Value| {
                    let _ = s.name.set(v.get::<String>()?);
                    Ok(())
                }),
        )
        .property(
            PropertyMetadata::new("region", ResolvableType::of::<String>())
                .annotated(Annotation::value(standard::VALUE, "${app.region}"))
                .setter(|s: &Settings, v: Value| {
                    let _ = s.region.set(v.get::<String>()?);
                    Ok(())
                }),
        )
        .build()
}

#[test]
fn value_placeholders_use_defaults_and_toml_sources() {
    let toml = TomlPropertySource::parse("[app]\nregion = \"eu-west\"\n", "application.toml").unwrap();
    let context = builder()
        .add_property_source(Arc::new(toml))
        .register_type(settings_type())
        .register("settings", BeanDefinition::class("Settings"))
        .run()
        .unwrap();

    let settings = context.get_bean_as::<Settings>("settings").unwrap();
    assert_eq!(settings.name.get().map(String::as_str), Some("fallback"));
    assert_eq!(settings.region.get().map(String::as_str), Some("eu-west"));
    context.close();
}

#[test]
fn unresolvable_value_placeholder_fails_refresh() {
    let context = builder()
        .register_type(settings_type())
        .register("settings", BeanDefinition::class("Settings"))
        .build()
        .unwrap();
    let err = context.refresh().unwrap_err();
    assert!(
        err.causes()
            .any(|e| matches!(e, ContainerError::UnresolvablePlaceholder { placeholder, .. } if placeholder == "app.region")),
        "unexpected error: {}",
        err
    );
}

#[test]
fn placeholder_defaults_and_cycles_in_environment() {
    let environment = Environment::empty();
    environment.add_property_source(Arc::new(
        MapPropertySource::new("test")
            .with_property("loop", "${loop}")
            .with_property("host", "localhost"),
    ));

    assert_eq!(
        environment.resolve_required_placeholders("${missing.key:fallback}").unwrap(),
        "fallback"
    );
    assert_eq!(
        environment.resolve_required_placeholders("http://${host}:${port:8080}").unwrap(),
        "http://localhost:8080"
    );
    assert!(matches!(
        environment.resolve_required_placeholders("${loop}"),
        Err(ContainerError::CircularPlaceholder { .. })
    ));
}

#[test]
fn refresh_with_missing_class_leaves_no_singletons() {
    let context = builder()
        .register_singleton("first", || Ok(String::from("created")))
        .register("broken", BeanDefinition::class("DoesNotExist"))
        .build()
        .unwrap();

    let err = context.refresh().unwrap_err();
    assert!(
        err.causes().any(|e| matches!(e, ContainerError::CannotLoadBeanClass { .. })),
        "unexpected error: {}",
        err
    );
    assert!(!context.is_active());
    assert_eq!(context.bean_factory().singleton_count(), 0);
    assert!(context.refresh().is_err());

    // 同样的定义去掉坏的 bean 后可以在新上下文中刷新
    let fresh = builder()
        .register_singleton("first", || Ok(String::from("created")))
        .run()
        .unwrap();
    assert_eq!(*fresh.get_bean_as::<String>("first").unwrap(), "created");
    fresh.close();
}

struct Mailbox {
    received: Mutex<Vec<String>>,
}

fn mailbox_types() -> Vec<TypeMetadata> {
    vec![
        TypeMetadata::interface("GreetingListener")
            .method(
                MethodMetadata::new("on_greeting")
                    .param(ParameterMetadata::new("greeting", ResolvableType::of::<String>()))
                    .annotated(Annotation::new(standard::EVENT_LISTENER)),
            )
            .build(),
        TypeMetadata::named::<Mailbox>("Mailbox")
            .implements(ResolvableType::class("GreetingListener"))
            .method(
                MethodMetadata::new("on_greeting")
                    .param(ParameterMetadata::new("greeting", ResolvableType::of::<String>()))
                    .invoke::<Mailbox, _>(|mailbox, args| {
                        let text = args.bean::<String>(0)?;
                        mailbox.received.lock().push((*text).clone());
                        Ok(Value::Null)
                    }),
            )
            .build(),
    ]
}

#[test]
fn overriding_method_inherits_event_listener_annotation() {
    let mut builder = builder();
    for metadata in mailbox_types() {
        builder = builder.register_type(metadata);
    }
    let mut definition = BeanDefinition::with_supplier(|| {
        Ok(Mailbox {
            received: Mutex::new(Vec::new()),
        })
    });
    definition.target_type = Some(ResolvableType::class("Mailbox"));
    let context = builder.register("mailbox", definition).run().unwrap();

    context.publish(String::from("hello")).unwrap();
    context.publish(42u32).unwrap();
    let mailbox = context.get_bean_as::<Mailbox>("mailbox").unwrap();
    assert_eq!(*mailbox.received.lock(), vec!["hello".to_string()]);
    context.close();
}

#[test]
fn started_and_stopped_lifecycle_follows_context() {
    struct Worker {
        running: std::sync::atomic::AtomicBool,
        starts: AtomicUsize,
    }

    impl Lifecycle for Worker {
        fn start(&self) -> anyhow::Result<()> {
            self.running.store(true, Ordering::SeqCst);
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> anyhow::Result<()> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    let context = builder()
        .register_type(TypeMetadata::of::<Worker>().lifecycle().build())
        .register_singleton("worker", || {
            Ok(Worker {
                running: std::sync::atomic::AtomicBool::new(false),
                starts: AtomicUsize::new(0),
            })
        })
        .run()
        .unwrap();

    let worker = context.get_bean_as::<Worker>("worker").unwrap();
    assert!(worker.is_running());
    assert!(context.is_running());

    context.stop().unwrap();
    assert!(!worker.is_running());
    context.start().unwrap();
    assert_eq!(worker.starts.load(Ordering::SeqCst), 2);

    context.close();
    assert!(!worker.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_multicaster_delivers_on_the_runtime() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let refreshed = Arc::new(AtomicUsize::new(0));
    let counter = refreshed.clone();
    let context = builder()
        .async_events(true)
        .add_listener(Arc::new(TypedApplicationListener::new(move |text: &String| {
            tx.send(text.clone())?;
            Ok(())
        })))
        .add_listener(Arc::new(TypedApplicationListener::new(move |_: &ContextRefreshedEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })))
        .run()
        .unwrap();

    context.publish(String::from("queued")).unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("listener was not invoked")
        .expect("channel closed");
    assert_eq!(received, "queued");

    tokio::time::timeout(Duration::from_secs(5), async {
        while refreshed.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("refresh event was not delivered");
    context.close();
}
