//! 注入器测试
//!
//! 验证注册、递归解析、单例缓存和循环检测

#![allow(clippy::uninlined_format_args, clippy::print_stdout)]

use bambo::config::{InjectorConfig, DEFAULT_MAX_DEPTH};
use bambo::infrastructure::container::{Element, Factory, INJECTOR_MODULE};
use bambo::{
    Declaration, ExternalDependencies, Injector, InjectorError, InjectorHandle, ModuleObject,
    ModuleReturn,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 测试用的简单服务
#[derive(Debug, PartialEq)]
struct Greeter {
    greeting: String,
}

/// 记录构造顺序的空模块
fn logged(log: &Arc<Mutex<Vec<String>>>, name: &str, deps: &[&str]) -> Declaration<ModuleReturn> {
    let log = Arc::clone(log);
    let name = name.to_string();
    Declaration::positional(deps.to_vec(), move |_| {
        log.lock().push(name.clone());
        Ok(ModuleObject::empty())
    })
}

/// 注册 m0 -> m1 -> ... -> m{length-1} 的无环依赖链
fn register_chain(injector: &Injector, length: usize) {
    for i in 0..length {
        let name = format!("m{}", i);
        let declaration = if i + 1 == length {
            Declaration::plain(|_| Ok(ModuleObject::new(0usize)))
        } else {
            Declaration::positional([format!("m{}", i + 1)], |deps| {
                let below = deps.get::<usize>(0)?;
                Ok(ModuleObject::new(*below + 1))
            })
        };
        injector.register(&name, declaration, false).unwrap();
    }
}

#[test]
fn test_duplicate_registration_fails_in_either_order() {
    for (first, second) in [(true, false), (false, true)] {
        let injector = Injector::new();
        injector
            .register("svc", Declaration::plain(|_| Ok(ModuleObject::empty())), first)
            .unwrap();
        let err = injector
            .register("svc", Declaration::plain(|_| Ok(ModuleObject::empty())), second)
            .unwrap_err();
        assert!(matches!(err, InjectorError::DuplicateModule(name) if name == "svc"));
        assert_eq!(injector.len(), 2);
    }
}

#[test]
fn test_get_instance_is_idempotent() {
    let injector = Injector::new();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);

    injector
        .register(
            "greeter",
            Declaration::plain(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ModuleObject::new(Greeter {
                    greeting: "hello".to_string(),
                }))
            }),
            false,
        )
        .unwrap();

    let instances: Vec<Arc<Greeter>> = (0..5)
        .map(|_| injector.get::<Greeter>("greeter").unwrap())
        .collect();

    // 验证所有服务实例相同（Arc 指针相同）
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(instances[0].greeting, "hello");
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
}

#[test]
fn test_chain_instantiates_leaves_first() {
    let injector = Injector::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    injector.register("a", logged(&log, "a", &["b"]), false).unwrap();
    injector.register("b", logged(&log, "b", &["c"]), false).unwrap();
    injector.register("c", logged(&log, "c", &[]), false).unwrap();

    injector.module("a").unwrap();
    injector.module("a").unwrap();
    injector.module("b").unwrap();

    assert_eq!(*log.lock(), vec!["c", "b", "a"]);
}

#[test]
fn test_dependencies_passed_in_declared_order() {
    let injector = Injector::new();
    injector
        .register("x", Declaration::plain(|_| Ok(ModuleObject::new(1u32))), false)
        .unwrap();
    injector
        .register("y", Declaration::plain(|_| Ok(ModuleObject::new(2u32))), false)
        .unwrap();
    injector
        .register(
            "sum",
            Declaration::annotated(serde_json::json!(["y", "x"]), |deps| {
                let y = deps.get::<u32>(0)?;
                let x = deps.get::<u32>(1)?;
                Ok(ModuleObject::new(*y * 10 + *x))
            }),
            false,
        )
        .unwrap();

    assert_eq!(*injector.get::<u32>("sum").unwrap(), 21);
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let injector = Injector::new();
    injector
        .register("a", Declaration::positional(["a"], |_| Ok(ModuleObject::empty())), true)
        .unwrap();

    let err = injector.module("a").unwrap_err();
    assert!(err.is_cycle());
    assert!(matches!(err, InjectorError::DependencyCycle { ref chain } if chain == &["a", "a"]));
    assert!(!injector.module_at(1).unwrap().is_instantiated());
}

#[test]
fn test_two_module_cycle_reports_chain() {
    let injector = Injector::new();
    injector
        .register("a", Declaration::positional(["b"], |_| Ok(ModuleObject::empty())), true)
        .unwrap();
    injector
        .register("b", Declaration::positional(["a"], |_| Ok(ModuleObject::empty())), true)
        .unwrap();

    let err = injector.module("a").unwrap_err();
    assert!(matches!(err, InjectorError::DependencyCycle { ref chain } if chain == &["a", "b", "a"]));
    assert_eq!(
        err.to_string(),
        "Loop in module dependencies detected: a -> b -> a"
    );

    // 失败后状态回到未构造，再次解析得到同样的错误而不是缓存
    assert!(injector.module("b").unwrap_err().is_cycle());
}

#[test]
fn test_deep_acyclic_chain_hits_depth_ceiling() {
    let build = |max_depth: usize, length: usize| {
        let injector = Injector::with_config(&InjectorConfig { max_depth });
        register_chain(&injector, length);
        injector
    };

    assert!(build(8, 8).module("m0").is_ok());

    let err = build(8, 9).module("m0").unwrap_err();
    assert!(matches!(err, InjectorError::DepthLimitExceeded { limit: 8, .. }));
    assert!(err.is_cycle());
}

#[test]
fn test_default_ceiling_resolves_full_length_chain() {
    let injector = Injector::new();
    register_chain(&injector, DEFAULT_MAX_DEPTH);

    assert_eq!(*injector.get::<usize>("m0").unwrap(), DEFAULT_MAX_DEPTH - 1);
    assert_eq!(injector.stats().instantiations, DEFAULT_MAX_DEPTH);
}

#[test]
fn test_full_length_chain_on_small_thread_stack() {
    let injector = Injector::new();
    register_chain(&injector, DEFAULT_MAX_DEPTH);

    // 解析不随链长增加调用栈深度
    let worker = std::thread::Builder::new()
        .stack_size(256 * 1024)
        .spawn(move || *injector.get::<usize>("m0").unwrap())
        .unwrap();
    assert_eq!(worker.join().unwrap(), DEFAULT_MAX_DEPTH - 1);
}

#[test]
fn test_chain_past_default_ceiling_fails_and_rolls_back() {
    let injector = Injector::new();
    register_chain(&injector, DEFAULT_MAX_DEPTH + 1);

    let err = injector.module("m0").unwrap_err();
    assert!(matches!(
        err,
        InjectorError::DepthLimitExceeded { ref module, limit } if limit == DEFAULT_MAX_DEPTH && module == "m1000"
    ));

    // 失败后没有模块停留在构造中，较短的子链仍可解析
    let mut instantiated = 0;
    injector.for_each_module(|module| {
        if module.is_instantiated() {
            instantiated += 1;
        }
    });
    assert_eq!(instantiated, 1);
    assert_eq!(*injector.get::<usize>("m1").unwrap(), DEFAULT_MAX_DEPTH - 1);
}

#[test]
fn test_cycle_through_injector_handle_reports_full_chain() {
    let injector = Injector::new();
    injector
        .register(
            "a",
            Declaration::positional([INJECTOR_MODULE], |deps| {
                deps.get::<InjectorHandle>(0)?.get::<()>("b")?;
                Ok(ModuleObject::empty())
            }),
            false,
        )
        .unwrap();
    injector
        .register("b", Declaration::positional(["a"], |_| Ok(ModuleObject::empty())), false)
        .unwrap();

    let err = injector.module("a").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Loop in module dependencies detected: a -> b -> a"
    );
    assert!(!injector.module_at(1).unwrap().is_instantiated());
    assert!(!injector.module_at(2).unwrap().is_instantiated());
}

#[test]
fn test_depth_counts_through_injector_handle() {
    let injector = Injector::with_config(&InjectorConfig { max_depth: 2 });
    injector
        .register(
            "outer",
            Declaration::positional([INJECTOR_MODULE], |deps| {
                deps.get::<InjectorHandle>(0)?.get::<()>("middle")?;
                Ok(ModuleObject::empty())
            }),
            false,
        )
        .unwrap();
    injector
        .register("middle", Declaration::positional(["inner"], |_| Ok(ModuleObject::empty())), false)
        .unwrap();
    injector
        .register("inner", Declaration::plain(|_| Ok(ModuleObject::empty())), false)
        .unwrap();

    assert!(matches!(
        injector.module("outer"),
        Err(InjectorError::DepthLimitExceeded { ref module, limit: 2 }) if module == "inner"
    ));
    // 单独解析 middle 只有两层
    assert!(injector.module("middle").is_ok());
}

#[test]
fn test_missing_dependency_keeps_resolved_siblings() {
    let injector = Injector::new();
    injector
        .register("present", Declaration::plain(|_| Ok(ModuleObject::empty())), false)
        .unwrap();
    injector
        .register(
            "needy",
            Declaration::positional(["present", "absent"], |_| Ok(ModuleObject::empty())),
            true,
        )
        .unwrap();

    let err = injector.module("needy").unwrap_err();
    assert!(matches!(
        err,
        InjectorError::DependencyNotFound { ref name, ref required_by } if name == "absent" && required_by == "needy"
    ));

    let mut instantiated = Vec::new();
    injector.for_each_module(|module| {
        if module.is_instantiated() {
            instantiated.push(module.name().to_string());
        }
    });
    assert_eq!(instantiated, vec![INJECTOR_MODULE, "present"]);
}

#[test]
fn test_non_object_return_fails_on_first_resolution() {
    let injector = Injector::new();
    // 注册阶段不会调用构造函数
    injector
        .register("number", Declaration::plain(|_| Ok(42i32)), true)
        .unwrap();
    injector
        .register("nothing", Declaration::plain(|_| Ok(())), true)
        .unwrap();

    assert!(matches!(
        injector.module("number"),
        Err(InjectorError::InvalidModuleReturn { ref module, found: "number" }) if module == "number"
    ));
    assert!(matches!(
        injector.module("nothing"),
        Err(InjectorError::InvalidModuleReturn { found: "nothing", .. })
    ));
}

#[test]
fn test_shape_errors_at_registration() {
    let injector = Injector::new();

    let names_only = Declaration::from_elements(vec![Element::from("a")]);
    assert!(matches!(
        injector.register("m1", names_only, true),
        Err(InjectorError::NotAFunction { .. })
    ));

    let factory: Factory<ModuleReturn> = Factory::new(|_| Ok(ModuleObject::empty()));
    let factory_in_the_middle = Declaration::from_elements(vec![
        Element::Factory(factory.clone()),
        Element::Factory(factory),
    ]);
    assert!(matches!(
        injector.register("m2", factory_in_the_middle, true),
        Err(InjectorError::InvalidDependency { position: 0, .. })
    ));

    let bad_annotation = Declaration::annotated(serde_json::json!({"dep": "a"}), |_| {
        Ok(ModuleObject::empty())
    });
    assert!(matches!(
        injector.register("m3", bad_annotation, true),
        Err(InjectorError::InvalidInjectAnnotation { .. })
    ));

    assert!(matches!(
        injector.register("", Declaration::plain(|_| Ok(ModuleObject::empty())), true),
        Err(InjectorError::InvalidName { .. })
    ));

    // 失败的注册不会留下条目
    assert_eq!(injector.module_names(), vec![INJECTOR_MODULE]);
}

#[test]
fn test_resolve_with_explicit_and_external_dependencies() {
    let injector = Injector::new();
    injector
        .register("internal", Declaration::plain(|_| Ok(ModuleObject::new(5i64))), false)
        .unwrap();

    let external = ExternalDependencies::new()
        .with("external", 7i64)
        .with("internal", 1000i64);

    // 内部模块表优先于外部依赖
    let sum: i64 = injector
        .resolve(
            &Declaration::plain(|deps| Ok(*deps.get::<i64>(0)? + *deps.get::<i64>(1)?)),
            &["internal", "external"],
            &external,
        )
        .unwrap();
    assert_eq!(sum, 12);

    // 位置式声明忽略显式依赖列表
    let value: i64 = injector
        .resolve(
            &Declaration::positional(["external"], |deps| Ok(*deps.get::<i64>(0)?)),
            &["internal"],
            &external,
        )
        .unwrap();
    assert_eq!(value, 7);

    let missing: Result<(), _> = injector.resolve(
        &Declaration::plain(|_| Ok(())),
        &["nowhere"],
        &ExternalDependencies::new(),
    );
    assert!(matches!(missing, Err(InjectorError::DependencyNotFound { .. })));
}

#[test]
fn test_injector_is_injectable() {
    let injector = Injector::new();
    injector
        .register(
            "registrar",
            Declaration::positional([INJECTOR_MODULE], |deps| {
                let handle = deps.get::<InjectorHandle>(0)?;
                handle.register(
                    "late",
                    Declaration::plain(|_| Ok(ModuleObject::new(String::from("late")))),
                    false,
                )?;
                let late = handle.get::<String>("late")?;
                Ok(ModuleObject::new(format!("saw {}", late)))
            }),
            true,
        )
        .unwrap();

    assert_eq!(injector.get::<String>("registrar").unwrap().as_str(), "saw late");
    assert!(injector.contains("late"));
}

#[test]
fn test_nested_errors_propagate_unwrapped() {
    let injector = Injector::new();
    injector
        .register(
            "outer",
            Declaration::positional([INJECTOR_MODULE], |deps| {
                let handle = deps.get::<InjectorHandle>(0)?;
                handle.get::<String>("ghost")?;
                Ok(ModuleObject::empty())
            }),
            true,
        )
        .unwrap();

    assert!(matches!(
        injector.module("outer"),
        Err(InjectorError::DependencyNotFound { ref name, .. }) if name == "ghost"
    ));
}

#[test]
fn test_type_mismatch_is_reported() {
    let injector = Injector::new();
    injector
        .register("text", Declaration::plain(|_| Ok(ModuleObject::new(String::from("x")))), false)
        .unwrap();

    assert!(matches!(
        injector.get::<u64>("text"),
        Err(InjectorError::DependencyTypeMismatch { .. })
    ));
}

#[test]
fn test_concurrent_resolution_constructs_once() {
    let injector = Injector::new();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    injector
        .register(
            "shared",
            Declaration::plain(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(5));
                Ok(ModuleObject::new(0u8))
            }),
            false,
        )
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let injector = injector.clone();
            std::thread::spawn(move || injector.get::<u8>("shared").unwrap())
        })
        .collect();
    let results: Vec<Arc<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}
