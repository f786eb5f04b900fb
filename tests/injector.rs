use std::sync::Arc;

use ductile::{
    annotate, Callable, InitErrorKind, Injector, Instance, InstantiateErrorKind, KeyedArguments, Locals, Module,
    ResolveErrorKind, ScopeErrorKind,
};
use parking_lot::Mutex;
use tracing_test::traced_test;

#[test]
#[traced_test]
fn test_end_to_end() {
    let module = Module::builder()
        .value("a", 1_u32)
        .factory("b", annotate(["a"], |a: Arc<u32>| Ok(*a + 1)))
        .factory("c", annotate(["b"], |b: Arc<u32>| Ok(*b * 2)))
        .build();
    let injector = Injector::new([module]);

    assert_eq!(*injector.get_as::<u32>("c").unwrap(), 4);
}

#[test]
#[traced_test]
fn test_singleton_idempotence() {
    let calls = Arc::new(Mutex::new(0_u8));
    let module = Module::builder()
        .factory(
            "a",
            Callable::new({
                let calls = calls.clone();
                move || {
                    *calls.lock() += 1;
                    Ok(1_u8)
                }
            }),
        )
        .build();
    let injector = Injector::new([module]);

    assert!(injector.get("a").unwrap().ptr_eq(&injector.get("a").unwrap()));
    assert_eq!(*calls.lock(), 1);
}

#[test]
#[traced_test]
fn test_last_registration_wins() {
    let first = Module::builder().value("a", "first").build();
    let second = Module::builder().value("a", "second").build();
    let injector = Injector::new([first, second]);

    assert_eq!(*injector.get_as::<&str>("a").unwrap(), "second");
}

#[test]
#[traced_test]
fn test_cycle_path() {
    let module = Module::builder()
        .factory("a", annotate(["b"], |_: Arc<u8>| Ok(1_u8)))
        .factory("b", annotate(["a"], |_: Arc<u8>| Ok(2_u8)))
        .build();
    let injector = Injector::new([module]);

    let err = injector.get("a").unwrap_err();
    match &err {
        ResolveErrorKind::CircularDependency { path } => assert_eq!(path.names(), ["a", "b", "a"]),
        err => panic!("unexpected error: {err}"),
    }
    assert_eq!(err.to_string(), "Cannot resolve circular dependency! (Resolving: a -> b -> a)");

    // Failed resolution leaves nothing behind
    assert!(matches!(injector.get("b"), Err(ResolveErrorKind::CircularDependency { .. })));
}

#[test]
#[traced_test]
fn test_miss_path() {
    let module = Module::builder()
        .factory("a", annotate(["b"], |_: Arc<u8>| Ok(1_u8)))
        .factory("b", annotate(["c"], |_: Arc<u8>| Ok(2_u8)))
        .build();
    let injector = Injector::new([module]);

    let err = injector.get("a").unwrap_err();
    assert!(matches!(err, ResolveErrorKind::NoProvider { ref name, .. } if name == "c"));
    assert_eq!(err.to_string(), "No provider for \"c\"! (Resolving: a -> b -> c)");
}

#[test]
#[traced_test]
fn test_non_strict_miss() {
    let injector = Injector::new([]);

    assert!(injector.get_optional("missing").unwrap().is_none());
    assert_eq!(
        injector.get("missing").unwrap_err().to_string(),
        "No provider for \"missing\"! (Resolving: missing)"
    );
}

#[test]
#[traced_test]
fn test_no_leakage_upward() {
    let parent = Injector::new([Module::builder().factory("b", annotate(["c"], |c: Arc<u8>| Ok(*c))).build()]);
    let child = parent
        .create_child([Module::builder().value("c", 1_u8).build()], &[])
        .unwrap();

    let err = child.get("b").unwrap_err();
    assert!(matches!(err, ResolveErrorKind::NoProvider { ref name, .. } if name == "c"));
    assert_eq!(*child.get_as::<u8>("c").unwrap(), 1);
}

#[test]
#[traced_test]
fn test_forced_scope_isolation() {
    let parent = Injector::new([Module::builder().factory("x", Callable::new(|| Ok(1_u8))).build()]);
    let cached = parent.get("x").unwrap();

    let first = parent.create_child([], &["x"]).unwrap();
    let second = parent.create_child([], &["x"]).unwrap();
    let (first_x, second_x) = (first.get("x").unwrap(), second.get("x").unwrap());

    assert!(!first_x.ptr_eq(&cached));
    assert!(!second_x.ptr_eq(&cached));
    assert!(!first_x.ptr_eq(&second_x));
    assert!(first.get("x").unwrap().ptr_eq(&first_x));
    assert!(parent.get("x").unwrap().ptr_eq(&cached));
}

#[test]
#[traced_test]
fn test_forced_from_grandparent() {
    let root = Injector::new([Module::builder().factory("x", Callable::new(|| Ok(1_u8))).build()]);
    let middle = root.create_child([], &[]).unwrap();
    let leaf = middle.create_child([], &["x"]).unwrap();

    assert!(middle.get("x").unwrap().ptr_eq(&root.get("x").unwrap()));
    assert!(!leaf.get("x").unwrap().ptr_eq(&root.get("x").unwrap()));
}

#[test]
#[traced_test]
fn test_forced_missing_fails() {
    let parent = Injector::new([Module::builder().value("a", 1_u8).build()]);

    assert!(matches!(
        parent.create_child([], &["request"]),
        Err(ScopeErrorKind::NoProviderForForcedScope { ref name }) if name == "request"
    ));
}

#[test]
#[traced_test]
fn test_private_boundary() {
    let private = Module::builder()
        .value("secret", 41_u32)
        .factory("answer", annotate(["secret"], |secret: Arc<u32>| Ok(*secret + 1)))
        .exports(["answer"])
        .build();
    let injector = Injector::new([private]);

    assert_eq!(*injector.get_as::<u32>("answer").unwrap(), 42);
    assert!(matches!(
        injector.get("secret"),
        Err(ResolveErrorKind::NoProvider { ref name, .. }) if name == "secret"
    ));
    assert!(injector.get_optional("secret").unwrap().is_none());
    assert_eq!(injector.providers().collect::<Vec<_>>(), ["answer"]);
}

#[test]
#[traced_test]
fn test_private_sees_enclosing() {
    let private = Module::builder()
        .factory("greeting", annotate(["name"], |name: Arc<&str>| Ok(format!("hello {name}"))))
        .exports(["greeting"])
        .build();
    let public = Module::builder().value("name", "world").build();
    let injector = Injector::new([public, private]);

    assert_eq!(*injector.get_as::<String>("greeting").unwrap(), "hello world");
}

#[test]
#[traced_test]
fn test_private_internals_do_not_collide() {
    let left = Module::builder()
        .value("internal", 1_u8)
        .factory("left", annotate(["internal"], |internal: Arc<u8>| Ok(*internal)))
        .exports(["left"])
        .build();
    let right = Module::builder()
        .value("internal", 2_u8)
        .factory("right", annotate(["internal"], |internal: Arc<u8>| Ok(*internal)))
        .exports(["right"])
        .build();
    let injector = Injector::new([left, right]);

    assert_eq!(*injector.get_as::<u8>("left").unwrap(), 1);
    assert_eq!(*injector.get_as::<u8>("right").unwrap(), 2);
}

#[test]
#[traced_test]
fn test_private_nested_modules() {
    let nested = Module::builder().value("base", 10_u32).build();
    let private = Module::builder()
        .factory("total", annotate(["base"], |base: Arc<u32>| Ok(*base * 3)))
        .nested(&nested)
        .exports(["total"])
        .build();
    let injector = Injector::new([private]);

    assert_eq!(*injector.get_as::<u32>("total").unwrap(), 30);
    assert!(injector.get_optional("base").unwrap().is_none());
}

#[test]
#[traced_test]
fn test_forced_private_aliases_share_fresh_private() {
    let owner = |injector: Arc<Injector>| Ok((*injector).clone());
    let private = Module::builder()
        .factory("x", annotate(["injector"], owner))
        .factory("y", annotate(["injector"], owner))
        .exports(["x", "y"])
        .build();
    let parent = Injector::new([private]);
    let original = parent.get_as::<Injector>("x").unwrap();

    let child = parent.create_child([], &["x", "y"]).unwrap();
    let (x, y) = (child.get_as::<Injector>("x").unwrap(), child.get_as::<Injector>("y").unwrap());

    assert!(x.ptr_eq(&y));
    assert!(!x.ptr_eq(&original));
    assert!(x.parent().unwrap().ptr_eq(&original));
}

#[test]
#[traced_test]
fn test_forced_name_and_its_tag() {
    let module = Module::builder()
        .factory("user", Callable::new(|| Ok(String::from("anonymous"))).scope(["request"]))
        .factory("clock", Callable::new(|| Ok(0_u64)))
        .build();
    let parent = Injector::new([module]);
    let (user, clock) = (parent.get("user").unwrap(), parent.get("clock").unwrap());

    let child = parent.create_child([], &["user", "request"]).unwrap();

    assert!(!child.get("user").unwrap().ptr_eq(&user));
    assert!(child.get("clock").unwrap().ptr_eq(&clock));
}

#[test]
#[traced_test]
fn test_forced_tag_through_private_alias() {
    let private = Module::builder()
        .factory("connection", Callable::new(|| Ok(7_u32)).scope(["transaction"]))
        .factory("repository", annotate(["connection"], |connection: Instance| Ok(connection)))
        .exports(["repository"])
        .build();
    let parent = Injector::new([private]);
    let repository = parent.get("repository").unwrap();

    let child = parent.create_child([], &["repository", "transaction"]).unwrap();
    let fresh = child.get("repository").unwrap();

    assert_eq!(*fresh.downcast::<u32>().unwrap(), 7);
    assert!(!fresh.ptr_eq(&repository));
    assert!(parent.get("repository").unwrap().ptr_eq(&repository));
}

#[test]
#[traced_test]
fn test_module_init_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let record = |label: &'static str| {
        let order = order.clone();
        Callable::new(move || {
            order.lock().push(label);
            Ok(())
        })
    };

    let m3 = Module::builder().init(record("m3")).build();
    let m2 = Module::builder().init(record("m2")).depends(&m3).build();
    let m4 = Module::builder().init(record("m4")).depends(&m3).build();
    let m1 = Module::builder().init(record("m1")).depends(&m2).depends(&m4).build();
    let injector = Injector::new([m1]);

    assert!(order.lock().is_empty());
    injector.init().unwrap();
    injector.init().unwrap();

    assert_eq!(*order.lock(), ["m3", "m2", "m4", "m1"]);
}

#[test]
#[traced_test]
fn test_init_failure() {
    let module = Module::builder()
        .factory(
            "db",
            Callable::new(|| -> Result<u8, InstantiateErrorKind> { Err(anyhow::anyhow!("connection refused").into()) }),
        )
        .init_service("db")
        .build();
    let injector = Injector::new([module]);

    let err = injector.init().unwrap_err();
    assert!(matches!(err, InitErrorKind::Failed { .. }));
    assert_eq!(
        err.to_string(),
        "Failed to initialize! service \"db\" failed: Failed to instantiate! (Resolving: db): connection refused"
    );
}

#[test]
#[traced_test]
fn test_invoke_with_locals_and_keyed_arguments() {
    let injector = Injector::new([Module::builder().value("a", 1_u8).value("b", 2_u8).build()]);

    let sum = annotate(["a", "b"], |a: Arc<u8>, b: Arc<u8>| Ok(*a + *b));
    assert_eq!(*injector.invoke(&sum).unwrap().downcast::<u8>().unwrap(), 3);

    let locals = Locals::new().with("b", 10_u8);
    assert_eq!(
        *injector.invoke_with(&sum, None, &locals).unwrap().downcast::<u8>().unwrap(),
        11
    );

    let keyed = annotate(["{}", "a", "missing"], |arguments: KeyedArguments| {
        Ok((arguments.len(), arguments.contains("missing")))
    });
    assert_eq!(
        *injector.invoke(&keyed).unwrap().downcast::<(usize, bool)>().unwrap(),
        (1, false)
    );
}

#[test]
#[traced_test]
fn test_instantiate_returns_built_instance() {
    let injector = Injector::new([Module::builder().value("a", 1_u8).build()]);
    let existing = injector.get("a").unwrap();

    let constructor = annotate(["a"], |a: Instance| Ok(a));
    assert!(injector.instantiate(&constructor).unwrap().ptr_eq(&existing));
}
