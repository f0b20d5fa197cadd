mod common;

use common::{config, module, started, DROP_REF};
use hostlink_runtime::{
    BoundaryError, InitState, InstantiationError, ModuleSource, Session, SessionError,
};

/// `hl_start` counts its runs at address 8 and asks the embedder for a
/// value it stores at address 12.
const WITH_SNIPPET: &str = r#"
  (import "hostlink" "object_drop_ref" (func $drop_ref (param i32)))
  (import "snippets" "answer" (func $answer (result i32)))
"#;

const START_BODY: &str = r#"
  (func $on_invoke (param $a i32) (param $arg i32))
  (func (export "hl_start")
    (call $bump (i32.const 8))
    (i32.store (i32.const 12) (call $answer)))
  (func (export "answer_seen") (result i32) (i32.load (i32.const 12)))
  (func (export "boom") unreachable)
"#;

#[test]
fn test_missing_import_then_retry() {
    let wat = module(WITH_SNIPPET, START_BODY);
    let mut session = Session::new(config()).unwrap();

    let err = session
        .instantiate_sync(ModuleSource::from(wat.as_str()))
        .unwrap_err();
    assert!(matches!(err, InstantiationError::Link(_)), "{err}");
    assert_eq!(session.state(), InitState::Uninitialized);
    assert!(session.instance().is_none());
    assert!(session.host().is_none());
    assert!(matches!(
        session.call::<i32, i32>("calls", 2),
        Err(SessionError::NotStarted(InitState::Uninitialized))
    ));

    session
        .imports_mut()
        .func_wrap("snippets", "answer", || 42i32)
        .unwrap();
    session
        .instantiate_sync(ModuleSource::from(wat.as_str()))
        .unwrap();
    assert_eq!(session.state(), InitState::Started);
    assert_eq!(session.call::<(), i32>("answer_seen", ()).unwrap(), 42);
    assert_eq!(session.call::<i32, i32>("calls", 2).unwrap(), 1);
}

#[test]
fn test_instantiate_twice_starts_once() {
    let mut session = Session::new(config()).unwrap();
    session
        .imports_mut()
        .func_wrap("snippets", "answer", || 1i32)
        .unwrap();
    let wat = module(WITH_SNIPPET, START_BODY);
    session
        .instantiate_sync(ModuleSource::from(wat.as_str()))
        .unwrap();
    session
        .instantiate_sync(ModuleSource::from(wat.as_str()))
        .unwrap();
    assert_eq!(session.call::<i32, i32>("calls", 2).unwrap(), 1);
}

#[test]
fn test_missing_allocator_export() {
    let wat = r#"
        (module
          (memory (export "memory") 1)
          (func (export "hl_alloc") (param i32 i32) (result i32) (i32.const 0))
          (func (export "hl_start")))
    "#;
    let mut session = Session::new(config()).unwrap();
    let err = session.instantiate_sync(ModuleSource::from(wat)).unwrap_err();
    assert!(matches!(err, InstantiationError::MissingExport("hl_realloc")));
    assert_eq!(session.state(), InitState::Uninitialized);
}

#[test]
fn test_start_failure_resets() {
    let body = r#"
      (func $on_invoke (param $a i32) (param $arg i32))
      (func (export "hl_start") unreachable)
    "#;
    let mut session = Session::new(config()).unwrap();
    let err = session
        .instantiate_sync(ModuleSource::from(module(DROP_REF, body).as_str()))
        .unwrap_err();
    assert!(matches!(err, InstantiationError::Start(_)), "{err}");
    assert_eq!(session.state(), InitState::Uninitialized);
}

#[test]
fn test_compile_failure() {
    let mut session = Session::new(config()).unwrap();
    let err = session
        .instantiate_sync(ModuleSource::from(&b"\0asm\x01\0\0\0\xff"[..]))
        .unwrap_err();
    assert!(matches!(err, InstantiationError::Compile(_)));
}

#[test]
fn test_trap_terminates_session() {
    let mut session = Session::new(config()).unwrap();
    session
        .imports_mut()
        .func_wrap("snippets", "answer", || 0i32)
        .unwrap();
    let wat = module(WITH_SNIPPET, START_BODY);
    session
        .instantiate_sync(ModuleSource::from(wat.as_str()))
        .unwrap();

    let err = session.call::<(), ()>("boom", ()).unwrap_err();
    assert!(matches!(err, SessionError::Trap(_)), "{err}");
    assert_eq!(session.state(), InitState::Terminated);
    assert!(session.host().is_none());
    assert!(matches!(
        session.instantiate_sync(ModuleSource::from(wat.as_str())),
        Err(InstantiationError::Terminated)
    ));

    session.shutdown();
    assert_eq!(session.state(), InitState::Uninitialized);
    session
        .instantiate_sync(ModuleSource::from(wat.as_str()))
        .unwrap();
    assert_eq!(session.state(), InitState::Started);
}

#[test]
fn test_boundary_violation_traps_with_its_cause() {
    let imports = r#"
      (import "hostlink" "object_drop_ref" (func $drop_ref (param i32)))
      (import "hostlink" "window_document" (func $document (param i32) (result i32)))
    "#;
    let body = r#"
      (func $on_invoke (param $a i32) (param $arg i32))
      (func (export "hl_start"))
      (func (export "bad_handle") (drop (call $document (i32.const 9999))))
    "#;
    let mut session = started(&module(imports, body));
    let err = session.call::<(), ()>("bad_handle", ()).unwrap_err();
    assert!(
        matches!(err, SessionError::Boundary(BoundaryError::InvalidHandle(9999))),
        "{err}"
    );
    assert_eq!(session.state(), InitState::Terminated);
}

#[test]
fn test_thrown_exception_fails_only_the_call() {
    let imports = r#"
      (import "hostlink" "object_drop_ref" (func $drop_ref (param i32)))
      (import "hostlink" "throw" (func $throw (param i32 i32)))
    "#;
    let body = r#"
      (data (i32.const 512) "bad input")
      (func $on_invoke (param $a i32) (param $arg i32))
      (func (export "hl_start"))
      (func (export "fail") (call $throw (i32.const 512) (i32.const 9)))
    "#;
    let mut session = started(&module(imports, body));
    let err = session.call::<(), ()>("fail", ()).unwrap_err();
    match err {
        SessionError::Uncaught(message) => assert!(message.contains("bad input")),
        other => panic!("unexpected {other}"),
    }
    assert_eq!(session.state(), InitState::Started);
    assert_eq!(session.call::<i32, i32>("calls", 1).unwrap(), 0);
}

#[test]
fn test_unknown_export() {
    let mut session = started(&module(
        DROP_REF,
        r#"(func $on_invoke (param $a i32) (param $arg i32)) (func (export "hl_start"))"#,
    ));
    assert!(matches!(
        session.call::<(), ()>("nope", ()),
        Err(SessionError::Export { .. })
    ));
    assert!(matches!(
        session.call::<(), ()>("grows", ()),
        Err(SessionError::Export { .. })
    ));
    assert_eq!(session.state(), InitState::Started);
}

#[tokio::test]
async fn test_instantiate_from_locator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.wat");
    std::fs::write(
        &path,
        module(
            DROP_REF,
            r#"(func $on_invoke (param $a i32) (param $arg i32)) (func (export "hl_start"))"#,
        ),
    )
    .unwrap();

    let mut session = Session::new(config()).unwrap();
    let err = session
        .instantiate(ModuleSource::locator(dir.path().join("missing.wasm").display().to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, InstantiationError::Fetch { .. }));
    assert_eq!(session.state(), InitState::Uninitialized);

    session
        .instantiate(ModuleSource::locator(path.display().to_string()))
        .await
        .unwrap();
    assert_eq!(session.state(), InitState::Started);
}
