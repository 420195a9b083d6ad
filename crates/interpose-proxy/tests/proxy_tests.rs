//! Tests for interpose-proxy: construction, dispatch, caching and context

use interpose_advice::*;
use interpose_core::*;
use interpose_pointcut::{ArgsPointcut, NameMatchPointcut, Pointcut};
use interpose_proxy::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===========================================================================
// Fixtures
// ===========================================================================

fn io_failure() -> TypeRef {
    TypeBuilder::fault("IOFailure").build()
}

fn network_failure() -> TypeRef {
    TypeBuilder::fault("NetworkFailure").build()
}

struct Bank {
    iface: TypeRef,
    class: TypeRef,
    target: ObjectRef,
    log: Arc<Mutex<Vec<String>>>,
    target_calls: Arc<AtomicUsize>,
}

fn bank() -> Bank {
    let iface = TypeBuilder::interface("Account")
        .operation(Operation::new("deposit").param(&builtin::int()).returns(&builtin::int()))
        .operation(Operation::new("balance").returns(&builtin::int()))
        .operation(Operation::new("itself").returns(&builtin::any()))
        .operation(Operation::new("broken").returns(&builtin::int()))
        .operation(Operation::new("transfer"))
        .operation(Operation::new("whoami").returns(&builtin::any()))
        .build();
    let class = TypeBuilder::class("Savings")
        .implements(&iface)
        .operation(Operation::new("audit_id").returns(&builtin::string()).final_op())
        .build();

    let log = Arc::new(Mutex::new(Vec::new()));
    let target_calls = Arc::new(AtomicUsize::new(0));
    let balance = Arc::new(Mutex::new(0i64));

    let (deposit_log, deposit_calls, deposit_balance) = (log.clone(), target_calls.clone(), balance.clone());
    let target = ClosureObject::builder(&class)
        .on("deposit", move |_, args| {
            deposit_calls.fetch_add(1, Ordering::SeqCst);
            deposit_log.lock().push("target".to_string());
            let mut total = deposit_balance.lock();
            *total += args[0].as_int().unwrap_or(0);
            Ok(Value::Int(*total))
        })
        .on("balance", move |_, _| Ok(Value::Int(*balance.lock())))
        .on("itself", |this, _| Ok(Value::Object(this.clone())))
        .on("broken", |_, _| Ok(Value::Null))
        .on("transfer", |_, _| Err(Error::raised(&network_failure(), "link down")))
        .on("whoami", |_, _| AopContext::current_proxy().map(Value::Object))
        .on("audit_id", |_, _| Ok(Value::str("A-1")))
        .build();

    Bank {
        iface,
        class,
        target,
        log,
        target_calls,
    }
}

fn call(proxy: &ObjectRef, iface: &TypeRef, op: &str, args: Vec<Value>) -> Result<Value> {
    let op = iface.find_operation(op).unwrap();
    proxy.clone().invoke(&op, args)
}

fn logging(log: &Arc<Mutex<Vec<String>>>, entry: &'static str) -> Advice {
    let log = log.clone();
    Advice::before(move |_, _, _| {
        log.lock().push(entry.to_string());
        Ok(())
    })
}

fn named(names: &[&str]) -> Arc<dyn Pointcut> {
    Arc::new(NameMatchPointcut::new(names.iter().copied()))
}

// ===========================================================================
// Ordering
// ===========================================================================

#[test]
fn before_then_around_nest_in_order() {
    let b = bank();
    let mut registry = AdvisorRegistry::new();

    let log = b.log.clone();
    let around = Advice::around(move |inv| {
        log.lock().push("around:pre".to_string());
        let result = inv.proceed();
        log.lock().push("around:post".to_string());
        result
    });
    registry.register(Advisor::new(named(&["deposit"]), around).with_order(2));
    registry.register(Advisor::new(named(&["deposit"]), logging(&b.log, "before")).with_order(1));

    let factory = ProxyFactory::for_target(b.target.clone());
    assert_eq!(factory.add_applicable_advisors(&registry).unwrap(), 2);
    let proxy = factory.get_proxy().unwrap();

    assert_eq!(call(&proxy, &b.iface, "deposit", vec![Value::Int(5)]).unwrap(), Value::Int(5));
    assert_eq!(*b.log.lock(), vec!["before", "around:pre", "target", "around:post"]);
}

#[test]
fn applicable_advisors_keep_registration_order() {
    let b = bank();
    let candidates: Vec<Arc<Advisor>> = vec![
        Arc::new(Advisor::new(named(&["balance"]), logging(&b.log, "a"))),
        Arc::new(Advisor::new(named(&["nothing"]), logging(&b.log, "b"))),
        Arc::new(Advisor::new(named(&["deposit"]), logging(&b.log, "c"))),
        Arc::new(Advisor::new(named(&["bal*"]), logging(&b.log, "d"))),
    ];
    let applicable = find_applicable_advisors(&candidates, &b.class);
    let picked: Vec<usize> = applicable
        .iter()
        .map(|a| candidates.iter().position(|c| Arc::ptr_eq(c, a)).unwrap())
        .collect();
    assert_eq!(picked, vec![0, 2, 3]);
}

// ===========================================================================
// Fast path
// ===========================================================================

#[test]
fn unadvised_operation_takes_the_fast_path() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory
        .add_advisor(Advisor::new(named(&["balance"]), logging(&b.log, "before")))
        .unwrap();
    let proxy = factory.get_proxy().unwrap();

    let deposit = b.iface.find_operation("deposit").unwrap();
    assert!(factory.config().chain_for(&deposit, &b.class).is_empty());

    let direct = b.target.clone().invoke(&deposit, vec![Value::Int(3)]).unwrap();
    let via_proxy = call(&proxy, &b.iface, "deposit", vec![Value::Int(3)]).unwrap();
    assert_eq!(direct, Value::Int(3));
    assert_eq!(via_proxy, Value::Int(6));
    assert_eq!(*b.log.lock(), vec!["target", "target"]);
}

// ===========================================================================
// Faults
// ===========================================================================

#[test]
fn after_throwing_for_other_fault_type_does_not_run() {
    let b = bank();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let method = AdviceMethod::new("Recovery.onIo", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Unit)
    })
    .param(AdviceParam::value("ex", &io_failure()));
    let advice = DeclaredAdvice::builder(AdviceKind::AfterThrowing, method, named(&["transfer"]))
        .throwing("ex")
        .build();

    let factory = ProxyFactory::for_target(b.target.clone());
    factory.add_advisor(Advisor::declared(advice).unwrap()).unwrap();
    let proxy = factory.get_proxy().unwrap();

    let err = call(&proxy, &b.iface, "transfer", vec![]).unwrap_err();
    assert_eq!(err.fault_type().name(), "NetworkFailure");
    assert_eq!(err.as_fault().unwrap().message(), "link down");
    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[test]
fn absent_primitive_result_is_a_dispatch_fault() {
    let b = bank();
    let proxy = ProxyFactory::for_target(b.target.clone()).get_proxy().unwrap();
    let err = call(&proxy, &b.iface, "broken", vec![]).unwrap_err();
    assert!(matches!(err, Error::NullReturn { ref operation } if operation == "Account.broken"));
}

// ===========================================================================
// Exposure
// ===========================================================================

#[test]
fn exposed_proxy_is_visible_to_the_target_and_restored() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.set_expose_proxy(true).unwrap();
    let proxy = factory.get_proxy().unwrap();

    let returned = call(&proxy, &b.iface, "whoami", vec![]).unwrap();
    assert!(same_object(returned.as_object().unwrap(), &proxy));
    assert!(AopContext::try_current_proxy().is_none());

    factory
        .add_advice(Advice::around(|inv| {
            assert!(AopContext::try_current_proxy().is_some());
            inv.proceed()?;
            Err(Error::raised(&io_failure(), "after the fact"))
        }))
        .unwrap();
    assert!(call(&proxy, &b.iface, "whoami", vec![]).is_err());
    assert!(AopContext::try_current_proxy().is_none());
}

#[test]
fn exposed_slot_is_restored_when_the_target_faults() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.set_expose_proxy(true).unwrap();
    let proxy = factory.get_proxy().unwrap();

    let err = call(&proxy, &b.iface, "transfer", vec![]).unwrap_err();
    assert_eq!(err.fault_type().name(), "NetworkFailure");
    assert!(AopContext::try_current_proxy().is_none());

    factory.add_advice(logging(&b.log, "before")).unwrap();
    let err = call(&proxy, &b.iface, "transfer", vec![]).unwrap_err();
    assert_eq!(err.fault_type().name(), "NetworkFailure");
    assert!(AopContext::try_current_proxy().is_none());
    assert_eq!(*b.log.lock(), vec!["before"]);
}

#[test]
fn unexposed_proxy_is_not_published() {
    let b = bank();
    let proxy = ProxyFactory::for_target(b.target.clone()).get_proxy().unwrap();
    let err = call(&proxy, &b.iface, "whoami", vec![]).unwrap_err();
    assert!(matches!(err, Error::IllegalState(_)));
}

#[test]
fn exposed_join_point_describes_the_call() {
    let b = bank();
    let seen = Arc::new(Mutex::new(None));
    let record = seen.clone();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.add_advisor(ExposeInvocationInterceptor::advisor()).unwrap();
    factory
        .add_advice(Advice::before(move |_, _, _| {
            let jp = current_join_point()?;
            *record.lock() = Some((jp.static_part.signature(), jp.args.clone()));
            Ok(())
        }))
        .unwrap();
    let proxy = factory.get_proxy().unwrap();

    call(&proxy, &b.iface, "deposit", vec![Value::Int(2)]).unwrap();
    let (signature, args) = seen.lock().clone().unwrap();
    assert_eq!(signature, "Savings.deposit(int)");
    assert_eq!(args, vec![Value::Int(2)]);
    assert!(current_join_point().is_err());
}

// ===========================================================================
// Configuration and cache
// ===========================================================================

#[test]
fn frozen_configuration_rejects_advisors_and_keeps_cache() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.add_advice(logging(&b.log, "before")).unwrap();
    let deposit = b.iface.find_operation("deposit").unwrap();
    let chain = factory.config().chain_for(&deposit, &b.class);
    factory.set_frozen(true).unwrap();

    let err = factory.add_advice(logging(&b.log, "late")).unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, Error::Frozen));
    assert_eq!(factory.config().cached_chain_count(), 1);
    assert!(Arc::ptr_eq(&chain, &factory.config().chain_for(&deposit, &b.class)));
}

#[test]
fn chain_cache_is_stable_until_advisors_change() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.add_advice(logging(&b.log, "first")).unwrap();
    let config = factory.config();
    let deposit = b.iface.find_operation("deposit").unwrap();

    let first = config.chain_for(&deposit, &b.class);
    let again = config.chain_for(&deposit, &b.class);
    assert!(Arc::ptr_eq(&first, &again));

    config.add_advice(logging(&b.log, "second")).unwrap();
    let after = config.chain_for(&deposit, &b.class);
    assert_eq!(first.len(), 1);
    assert_eq!(after.len(), 2);

    let advisor = config.advisors()[0].clone();
    assert!(config.remove_advisor(&advisor).unwrap());
    assert_eq!(config.chain_for(&deposit, &b.class).len(), 1);
}

#[test]
fn live_proxies_see_advisor_changes() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    let proxy = factory.get_proxy().unwrap();
    call(&proxy, &b.iface, "deposit", vec![Value::Int(1)]).unwrap();

    factory.add_advice(logging(&b.log, "before")).unwrap();
    call(&proxy, &b.iface, "deposit", vec![Value::Int(1)]).unwrap();
    assert_eq!(*b.log.lock(), vec!["target", "before", "target"]);
}

#[test]
fn listeners_hear_activation_and_changes() {
    #[derive(Default)]
    struct Recorder(Mutex<Vec<&'static str>>);

    impl ConfigListener for Recorder {
        fn activated(&self, _config: &ProxyConfig) {
            self.0.lock().push("activated");
        }

        fn advice_changed(&self, _config: &ProxyConfig) {
            self.0.lock().push("changed");
        }
    }

    let b = bank();
    let recorder = Arc::new(Recorder::default());
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.add_listener(recorder.clone());
    factory.get_proxy().unwrap();
    factory.get_proxy().unwrap();
    factory.add_advice(logging(&b.log, "before")).unwrap();
    assert_eq!(*recorder.0.lock(), vec!["activated", "changed"]);
}

#[test]
fn concurrent_calls_share_one_configuration() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    let counted = Arc::new(AtomicUsize::new(0));
    let counter = counted.clone();
    factory
        .add_advice(Advice::before(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
    let proxy = factory.get_proxy().unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            let proxy = proxy.clone();
            let iface = b.iface.clone();
            s.spawn(move || {
                for _ in 0..50 {
                    call(&proxy, &iface, "deposit", vec![Value::Int(1)]).unwrap();
                }
            });
        }
    });

    assert_eq!(call(&proxy, &b.iface, "balance", vec![]).unwrap(), Value::Int(200));
    assert_eq!(counted.load(Ordering::SeqCst), 201);
    assert_eq!(b.target_calls.load(Ordering::SeqCst), 200);
}

thread_local! {
    static STEPS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

#[test]
fn calls_stay_consistent_while_advisors_change() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    let lengths = Arc::new(Mutex::new(Vec::new()));
    let record = lengths.clone();
    factory
        .add_advice(Advice::around(move |inv| {
            STEPS.with(|c| c.set(1));
            let result = inv.proceed();
            record.lock().push(STEPS.with(|c| c.get()));
            result
        }))
        .unwrap();
    let proxy = factory.get_proxy().unwrap();

    let counting = || {
        Arc::new(Advisor::for_advice(Advice::before(|_, _, _| {
            STEPS.with(|c| c.set(c.get() + 1));
            Ok(())
        })))
    };

    std::thread::scope(|s| {
        let config = factory.config();
        s.spawn(move || {
            for _ in 0..200 {
                let extra = counting();
                config.add_advisor(extra.clone()).unwrap();
                assert!(config.remove_advisor(&extra).unwrap());
            }
        });
        for _ in 0..4 {
            let proxy = proxy.clone();
            let iface = b.iface.clone();
            s.spawn(move || {
                for _ in 0..100 {
                    call(&proxy, &iface, "deposit", vec![Value::Int(1)]).unwrap();
                }
            });
        }
    });

    assert_eq!(lengths.lock().len(), 400);
    assert!(lengths.lock().iter().all(|&n| n == 1 || n == 2));
    assert_eq!(factory.config().advisor_count(), 1);

    lengths.lock().clear();
    call(&proxy, &b.iface, "deposit", vec![Value::Int(1)]).unwrap();
    factory.add_advisor(counting()).unwrap();
    call(&proxy, &b.iface, "deposit", vec![Value::Int(1)]).unwrap();
    assert_eq!(*lengths.lock(), vec![1, 2]);
    assert_eq!(b.target_calls.load(Ordering::SeqCst), 402);
}

// ===========================================================================
// Proceed and binding
// ===========================================================================

#[test]
fn around_proceeding_twice_reaches_target_twice() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory
        .add_advice(Advice::around(|inv| {
            inv.proceed()?;
            inv.proceed()
        }))
        .unwrap();
    let proxy = factory.get_proxy().unwrap();

    assert_eq!(call(&proxy, &b.iface, "deposit", vec![Value::Int(4)]).unwrap(), Value::Int(8));
    assert_eq!(b.target_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn declared_advice_receives_captured_argument_and_return_value() {
    let b = bank();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let method = AdviceMethod::new("Audit.deposited", move |args| {
        let op = args[0].as_join_point().map(|jp| jp.operation().name().to_string());
        let x = args[1].as_value().cloned();
        let ret = args[2].as_value().cloned();
        record.lock().push((op, x, ret));
        Ok(Value::Unit)
    })
    .param(AdviceParam::join_point())
    .param(AdviceParam::value("x", &builtin::int()))
    .param(AdviceParam::value("ret", &builtin::int()));
    let pointcut: Arc<dyn Pointcut> = Arc::new(ArgsPointcut::new("deposit").arg("x", 0));
    let advice = DeclaredAdvice::builder(AdviceKind::AfterReturning, method, pointcut)
        .returning("ret")
        .build();

    let bindings = advice.argument_bindings().unwrap();
    assert_eq!(bindings.pointcut_bound_names(), vec!["x"]);
    assert!(std::ptr::eq(bindings, advice.argument_bindings().unwrap()));

    let factory = ProxyFactory::for_target(b.target.clone());
    factory.add_advisor(Advisor::declared(advice).unwrap()).unwrap();
    let proxy = factory.get_proxy().unwrap();

    call(&proxy, &b.iface, "deposit", vec![Value::Int(7)]).unwrap();
    call(&proxy, &b.iface, "balance", vec![]).unwrap();
    assert_eq!(
        *seen.lock(),
        vec![(Some("deposit".to_string()), Some(Value::Int(7)), Some(Value::Int(7)))]
    );
}

#[test]
fn runtime_pointcut_skips_advice_for_other_arguments() {
    let b = bank();
    let pointcut: Arc<dyn Pointcut> =
        Arc::new(ArgsPointcut::new("deposit").arg("n", 0).guard(|args| args[0].as_int().is_some_and(|n| n > 100)));
    let factory = ProxyFactory::for_target(b.target.clone());
    factory
        .add_advisor(Advisor::new(
            pointcut,
            Advice::before(|_, _, _| Err(Error::raised(&io_failure(), "limit exceeded"))),
        ))
        .unwrap();
    let proxy = factory.get_proxy().unwrap();

    assert_eq!(call(&proxy, &b.iface, "deposit", vec![Value::Int(10)]).unwrap(), Value::Int(10));
    let err = call(&proxy, &b.iface, "deposit", vec![Value::Int(500)]).unwrap_err();
    assert_eq!(err.fault_type().name(), "IOFailure");
    assert_eq!(b.target_calls.load(Ordering::SeqCst), 1);
}

// ===========================================================================
// Results
// ===========================================================================

#[test]
fn target_returning_itself_yields_the_proxy() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.add_advice(logging(&b.log, "before")).unwrap();
    let proxy = factory.get_proxy().unwrap();

    let returned = call(&proxy, &b.iface, "itself", vec![]).unwrap();
    assert!(same_object(returned.as_object().unwrap(), &proxy));

    // Same on the fast path
    let bare = ProxyFactory::for_target(b.target.clone()).get_proxy().unwrap();
    let returned = call(&bare, &b.iface, "itself", vec![]).unwrap();
    assert!(same_object(returned.as_object().unwrap(), &bare));
}

#[test]
fn raw_access_operations_return_the_target() {
    let raw = TypeBuilder::interface("RawHandle")
        .implements(&builtin::raw_target_access())
        .operation(Operation::new("unwrap").returns(&builtin::any()))
        .build();
    let class = TypeBuilder::class("Handle").implements(&raw).build();
    let target = ClosureObject::builder(&class)
        .on("unwrap", |this, _| Ok(Value::Object(this.clone())))
        .build();
    let proxy = ProxyFactory::for_target(target.clone()).get_proxy().unwrap();

    let returned = call(&proxy, &raw, "unwrap", vec![]).unwrap();
    assert!(same_object(returned.as_object().unwrap(), &target));
}

// ===========================================================================
// Construction
// ===========================================================================

#[test]
fn interfaces_give_a_capability_set_proxy() {
    let b = bank();
    let proxy = ProxyFactory::for_target(b.target.clone()).get_proxy().unwrap();
    assert!(AopUtils::is_aop_proxy(&proxy));
    assert!(AopUtils::is_capability_set_proxy(&proxy));
    assert!(b.iface.is_assignable_from(&proxy.type_ref()));
    assert!(!b.class.is_assignable_from(&proxy.type_ref()));

    let audit = b.class.find_operation("audit_id").unwrap();
    let err = proxy.clone().invoke(&audit, vec![]).unwrap_err();
    assert!(matches!(err, Error::NoSuchOperation { .. }));
}

#[test]
fn proxy_target_class_gives_a_subclass_proxy() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.set_proxy_target_class(true).unwrap();
    factory.add_advice(logging(&b.log, "before")).unwrap();
    let proxy = factory.get_proxy().unwrap();

    assert!(AopUtils::is_subclass_proxy(&proxy));
    assert!(b.class.is_assignable_from(&proxy.type_ref()));

    // Final operations cannot be advised
    assert_eq!(call(&proxy, &b.class, "audit_id", vec![]).unwrap(), Value::str("A-1"));
    assert!(b.log.lock().is_empty());

    call(&proxy, &b.class, "deposit", vec![Value::Int(1)]).unwrap();
    assert_eq!(*b.log.lock(), vec!["before", "target"]);
}

#[test]
fn marker_only_interfaces_choose_subclass_substitution() {
    let marker = TypeBuilder::interface("Serializable").build();
    let class = TypeBuilder::class("Plain")
        .implements(&marker)
        .operation(Operation::new("ping").returns(&builtin::string()))
        .build();
    let target = ClosureObject::builder(&class)
        .on("ping", |_, _| Ok(Value::str("pong")))
        .build();
    let proxy = ProxyFactory::for_target(target).get_proxy().unwrap();
    assert!(AopUtils::is_subclass_proxy(&proxy));
    assert_eq!(call(&proxy, &class, "ping", vec![]).unwrap(), Value::str("pong"));
}

#[test]
fn subclass_of_final_type_is_rejected() {
    let class = TypeBuilder::class("Sealed")
        .final_type()
        .operation(Operation::new("ping"))
        .build();
    let target = ClosureObject::builder(&class).build();
    let factory = ProxyFactory::for_target(target);
    factory.set_proxy_target_class(true).unwrap();
    let err = factory.get_proxy().unwrap_err();
    assert!(matches!(err, Error::FinalClass { ref type_name } if type_name == "Sealed"));
}

#[test]
fn subclass_without_target_type_is_rejected() {
    let factory = ProxyFactory::new();
    factory.set_optimize(true).unwrap();
    factory.add_advice(Advice::around(|_| Ok(Value::Unit))).unwrap();
    let err = factory.get_proxy().unwrap_err();
    assert!(matches!(err, Error::MissingTargetClass { .. }));
    assert!(err.is_configuration());
}

#[test]
fn no_target_and_no_advisors_is_rejected() {
    let err = ProxyFactory::new().get_proxy().unwrap_err();
    assert!(matches!(err, Error::NoTargetOrAdvisors));
}

#[test]
fn interface_proxy_without_target_is_answered_by_advice() {
    let greeter = TypeBuilder::interface("Greeter")
        .operation(Operation::new("greet").param(&builtin::string()).returns(&builtin::string()))
        .build();
    let factory = ProxyFactory::for_interface(
        &greeter,
        Advice::around(|inv| {
            let name = inv.arguments()[0].as_str().unwrap_or("nobody").to_string();
            Ok(Value::str(format!("hello {}", name)))
        }),
    )
    .unwrap();
    let proxy = factory.get_proxy().unwrap();
    assert_eq!(
        call(&proxy, &greeter, "greet", vec![Value::str("ada")]).unwrap(),
        Value::str("hello ada")
    );
}

// ===========================================================================
// Markers and introspection
// ===========================================================================

#[test]
fn dispatch_objects_answer_marker_operations() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.add_advice(logging(&b.log, "before")).unwrap();
    let proxy = factory.get_proxy().unwrap();

    let advised = builtin::advised();
    assert_eq!(call(&proxy, &advised, "advisor_count", vec![]).unwrap(), Value::Int(1));
    assert_eq!(call(&proxy, &advised, "is_frozen", vec![]).unwrap(), Value::Bool(false));
    assert_eq!(call(&proxy, &advised, "target_type_name", vec![]).unwrap(), Value::str("Savings"));
    assert_eq!(
        call(&proxy, &advised, "proxied_interfaces", vec![]).unwrap(),
        Value::List(vec![Value::str("Account")])
    );
    assert_eq!(
        call(&proxy, &builtin::decorating_proxy(), "decorated_type", vec![]).unwrap(),
        Value::str("Savings")
    );
    assert_eq!(AopUtils::ultimate_target_type(&proxy).name(), "Savings");
    assert!(AopUtils::advised(&proxy).is_some());
    assert!(b.log.lock().is_empty());
}

#[test]
fn opaque_proxies_hide_their_configuration() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.set_opaque(true).unwrap();
    let proxy = factory.get_proxy().unwrap();

    assert!(AopUtils::advised(&proxy).is_none());
    assert!(!builtin::advised().is_assignable_from(&proxy.type_ref()));
    let err = call(&proxy, &builtin::advised(), "advisor_count", vec![]).unwrap_err();
    assert!(matches!(err, Error::NoSuchOperation { ref target, .. } if target == "Savings"));
    assert_eq!(AopUtils::ultimate_target_type(&proxy).name(), "Savings");
}

#[test]
fn proxies_over_one_configuration_are_equal() {
    let b = bank();
    let factory = ProxyFactory::for_target(b.target.clone());
    let first = factory.get_proxy().unwrap();
    let second = factory.get_proxy().unwrap();
    let equals = builtin::equals_op();
    let hash = builtin::hash_code_op();

    assert_eq!(first.clone().invoke(&equals, vec![Value::Object(second.clone())]).unwrap(), Value::Bool(true));
    assert_eq!(first.clone().invoke(&equals, vec![Value::Object(b.target.clone())]).unwrap(), Value::Bool(false));
    assert_eq!(first.clone().invoke(&hash, vec![]).unwrap(), second.clone().invoke(&hash, vec![]).unwrap());

    let other = ProxyFactory::for_target(b.target.clone()).get_proxy().unwrap();
    assert_eq!(first.clone().invoke(&equals, vec![Value::Object(other)]).unwrap(), Value::Bool(true));
}

#[test]
fn introductions_add_capabilities() {
    let b = bank();
    let lockable = TypeBuilder::interface("Lockable")
        .operation(Operation::new("lock"))
        .operation(Operation::new("locked").returns(&builtin::bool_type()))
        .build();
    let mixin = TypeBuilder::class("LockMixin").implements(&lockable).build();
    let state = Arc::new(Mutex::new(false));
    let (lock_state, read_state) = (state.clone(), state.clone());
    let delegate = ClosureObject::builder(&mixin)
        .on("lock", move |_, _| {
            *lock_state.lock() = true;
            Ok(Value::Unit)
        })
        .on("locked", move |_, _| Ok(Value::Bool(*read_state.lock())))
        .build();

    let factory = ProxyFactory::for_target(b.target.clone());
    factory
        .add_advisor(Advisor::introduction(DelegatingIntroduction::new(delegate)).unwrap())
        .unwrap();
    let proxy = factory.get_proxy().unwrap();

    assert!(lockable.is_assignable_from(&proxy.type_ref()));
    call(&proxy, &lockable, "lock", vec![]).unwrap();
    assert_eq!(call(&proxy, &lockable, "locked", vec![]).unwrap(), Value::Bool(true));
    assert_eq!(call(&proxy, &b.iface, "deposit", vec![Value::Int(2)]).unwrap(), Value::Int(2));
}

// ===========================================================================
// Target sources
// ===========================================================================

#[test]
fn prototype_source_builds_a_target_per_call() {
    let b = bank();
    let made = Arc::new(AtomicUsize::new(0));
    let counter = made.clone();
    let class = b.class.clone();
    let source = PrototypeTargetSource::new(&b.class, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(ClosureObject::builder(&class)
            .on("balance", |_, _| Ok(Value::Int(0)))
            .build())
    });
    let factory = ProxyFactory::for_target_source(Arc::new(source));
    let proxy = factory.get_proxy().unwrap();

    call(&proxy, &b.iface, "balance", vec![]).unwrap();
    call(&proxy, &b.iface, "balance", vec![]).unwrap();
    assert_eq!(made.load(Ordering::SeqCst), 2);
}

#[test]
fn pooled_target_is_returned_after_each_call() {
    let b = bank();
    let class = b.class.clone();
    let pool = Arc::new(PooledTargetSource::new(&b.class, 1, move || {
        Ok(ClosureObject::builder(&class)
            .on("transfer", |_, _| Err(Error::raised(&network_failure(), "down")))
            .on("balance", |_, _| Ok(Value::Int(9)))
            .build())
    }));
    let proxy = ProxyFactory::for_target_source(pool.clone()).get_proxy().unwrap();

    assert_eq!(call(&proxy, &b.iface, "balance", vec![]).unwrap(), Value::Int(9));
    assert!(call(&proxy, &b.iface, "transfer", vec![]).is_err());
    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn hot_swapped_target_receives_later_calls() {
    let b = bank();
    let source = Arc::new(HotSwappableTargetSource::new(b.target.clone()));
    let proxy = ProxyFactory::for_target_source(source.clone()).get_proxy().unwrap();
    call(&proxy, &b.iface, "deposit", vec![Value::Int(5)]).unwrap();

    let replacement = ClosureObject::builder(&b.class)
        .on("balance", |_, _| Ok(Value::Int(-1)))
        .build();
    let old = source.swap(replacement);
    assert!(same_object(&old, &b.target));
    assert_eq!(call(&proxy, &b.iface, "balance", vec![]).unwrap(), Value::Int(-1));
}

#[test]
fn trace_and_monitor_interceptors_run_inside_proxies() {
    let b = bank();
    let monitor = Arc::new(PerformanceMonitorInterceptor::new(std::time::Duration::from_secs(60)));
    let factory = ProxyFactory::for_target(b.target.clone());
    factory.add_advice(Advice::interceptor(Arc::new(TraceInterceptor::new()))).unwrap();
    factory.add_advice(Advice::interceptor(monitor.clone())).unwrap();
    let proxy = factory.get_proxy().unwrap();

    call(&proxy, &b.iface, "deposit", vec![Value::Int(1)]).unwrap();
    call(&proxy, &b.iface, "transfer", vec![]).unwrap_err();

    assert_eq!(monitor.stats_for("Savings.deposit(int)").unwrap().calls, 1);
    assert_eq!(monitor.stats_for("Savings.transfer()").unwrap().failures, 1);
}
