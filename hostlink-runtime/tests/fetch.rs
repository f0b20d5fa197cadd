mod common;

use std::sync::Arc;

use common::{calls, config, module, started};
use hostlink_runtime::host::fetch::{DirFetcher, Fetch, MapFetcher};
use hostlink_runtime::memory::{bytes_in, LinearMemory};
use hostlink_runtime::{ModuleSource, Session, SessionError};

const IMPORTS: &str = r#"
  (import "hostlink" "object_drop_ref" (func $drop_ref (param i32)))
  (import "hostlink" "global_this" (func $global (result i32)))
  (import "hostlink" "closure_new" (func $closure_new (param i32 i32 i32) (result i32)))
  (import "hostlink" "window_fetch" (func $fetch (param i32 i32 i32) (result i32)))
  (import "hostlink" "promise_then" (func $then (param i32 i32) (result i32)))
  (import "hostlink" "promise_then2" (func $then2 (param i32 i32 i32) (result i32)))
  (import "hostlink" "response_status" (func $status (param i32) (result i32)))
  (import "hostlink" "response_array_buffer" (func $array_buffer (param i32 i32)))
  (import "hostlink" "bytes_length" (func $bytes_length (param i32) (result i32)))
  (import "hostlink" "bytes_copy_to" (func $bytes_copy_to (param i32 i32 i32)))
"#;

/// `load(url)` fetches a resource. Closure 4 takes the response and asks
/// for its body, closure 5 copies the body to 2048, closure 6 records a
/// rejection.
const BODY: &str = r#"
  (func $on_invoke (param $a i32) (param $arg i32)
    (if (i32.eq (local.get $a) (i32.const 4))
      (then
        (i32.store (i32.const 700) (call $status (local.get $arg)))
        (call $array_buffer (i32.const 800) (local.get $arg))
        (call $drop_ref
          (call $then (i32.load (i32.const 804))
            (call $closure_new (i32.const 5) (i32.const 0) (i32.const 0))))))
    (if (i32.eq (local.get $a) (i32.const 5))
      (then
        (i32.store (i32.const 704) (call $bytes_length (local.get $arg)))
        (call $bytes_copy_to (local.get $arg) (i32.const 2048) (i32.load (i32.const 704)))))
    (if (i32.eq (local.get $a) (i32.const 6))
      (then (i32.store (i32.const 708) (i32.const 1)))))

  (func (export "hl_start"))

  (func (export "load") (param $ptr i32) (param $len i32)
    (call $drop_ref
      (call $then2
        (call $fetch (call $global) (local.get $ptr) (local.get $len))
        (call $closure_new (i32.const 4) (i32.const 0) (i32.const 0))
        (call $closure_new (i32.const 6) (i32.const 0) (i32.const 0)))))

  (func (export "status") (result i32) (i32.load (i32.const 700)))
  (func (export "body_len") (result i32) (i32.load (i32.const 704)))
  (func (export "rejected") (result i32) (i32.load (i32.const 708)))
"#;

fn session(fetcher: impl Fetch + 'static) -> Session {
    let mut session = Session::new(config())
        .unwrap()
        .with_fetcher(Arc::new(fetcher));
    session
        .instantiate_sync(ModuleSource::from(module(IMPORTS, BODY).as_str()))
        .unwrap();
    session
}

fn load(session: &mut Session, url: &str) {
    let slice = session.pass_string(url).unwrap();
    session
        .call::<(i32, i32), ()>("load", (slice.ptr as i32, slice.len as i32))
        .unwrap();
}

fn status(session: &mut Session) -> (i32, i32, i32) {
    (
        session.call::<(), i32>("status", ()).unwrap(),
        session.call::<(), i32>("body_len", ()).unwrap(),
        session.call::<(), i32>("rejected", ()).unwrap(),
    )
}

#[test]
fn test_fetch_resolves_on_the_next_task() {
    let mut fetcher = MapFetcher::new();
    fetcher.insert("assets/mesh.bin", vec![1u8, 2, 3, 4, 5]);
    let mut session = session(fetcher);

    load(&mut session, "assets/mesh.bin");
    assert_eq!(status(&mut session), (0, 0, 0));

    assert_eq!(session.run_until_idle().unwrap(), 1);
    assert_eq!(status(&mut session), (200, 5, 0));
    let guest = session.guest().unwrap();
    assert_eq!(bytes_in(guest.data(), 2048, 5).unwrap(), &[1, 2, 3, 4, 5]);
}

#[test]
fn test_missing_resource_is_a_404() {
    let mut session = session(MapFetcher::new());
    load(&mut session, "assets/missing.bin");
    session.run_until_idle().unwrap();
    assert_eq!(status(&mut session), (404, 0, 0));
}

#[test]
fn test_network_error_rejects() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("level.json"), b"{}").unwrap();
    let mut session = session(DirFetcher::new(dir.path()));

    load(&mut session, "../outside.json");
    session.run_until_idle().unwrap();
    assert_eq!(status(&mut session), (0, 0, 1));

    load(&mut session, "level.json");
    session.run_until_idle().unwrap();
    assert_eq!(status(&mut session), (200, 2, 1));
}

const CHAIN_IMPORTS: &str = r#"
  (import "hostlink" "object_drop_ref" (func $drop_ref (param i32)))
  (import "hostlink" "closure_new" (func $closure_new (param i32 i32 i32) (result i32)))
  (import "hostlink" "promise_resolve" (func $resolve (param i32) (result i32)))
  (import "hostlink" "promise_then" (func $then (param i32 i32) (result i32)))
  (import "hostlink" "promise_then2" (func $then2 (param i32 i32 i32) (result i32)))
  (import "hostlink" "throw" (func $throw (param i32 i32)))
"#;

/// Closure 7 throws; closures 8 and 9 are the fulfilment and rejection
/// handlers chained after it. `round_trip` resolves a promise, reacts to it
/// once and drops every handle it made.
const CHAIN_BODY: &str = r#"
  (data (i32.const 512) "bad frame")

  (func $on_invoke (param $a i32) (param $arg i32)
    (if (i32.eq (local.get $a) (i32.const 7))
      (then (call $throw (i32.const 512) (i32.const 9)))))

  (func (export "hl_start"))

  (func (export "chain")
    (local $derived i32)
    (local.set $derived
      (call $then (call $resolve (i32.const 2))
        (call $closure_new (i32.const 7) (i32.const 0) (i32.const 0))))
    (call $drop_ref
      (call $then2 (local.get $derived)
        (call $closure_new (i32.const 8) (i32.const 0) (i32.const 0))
        (call $closure_new (i32.const 9) (i32.const 0) (i32.const 0))))
    (call $drop_ref (local.get $derived)))

  (func (export "round_trip")
    (local $f i32)
    (local $p i32)
    (local.set $f (call $closure_new (i32.const 8) (i32.const 0) (i32.const 0)))
    (local.set $p (call $resolve (i32.const 2)))
    (call $drop_ref (call $then (local.get $p) (local.get $f)))
    (call $drop_ref (local.get $p))
    (call $drop_ref (local.get $f)))
"#;

#[test]
fn test_throwing_reaction_rejects_the_derived_promise() {
    let mut session = started(&module(CHAIN_IMPORTS, CHAIN_BODY));
    match session.call::<(), ()>("chain", ()) {
        Err(SessionError::Uncaught(message)) => assert!(message.contains("bad frame")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(calls(&mut session, 7), 1);
    assert_eq!(calls(&mut session, 8), 0);
    assert_eq!(calls(&mut session, 9), 1);
}

#[test]
fn test_settled_promises_do_not_accumulate() {
    let mut session = started(&module(CHAIN_IMPORTS, CHAIN_BODY));
    let live = session.host().unwrap().heap.live_count();

    for _ in 0..500 {
        session.call::<(), ()>("round_trip", ()).unwrap();
        session.run_until_idle().unwrap();
        assert!(session.host().unwrap().env.promises.len() < 128);
    }
    assert_eq!(calls(&mut session, 8), 500);
    assert_eq!(session.host().unwrap().heap.live_count(), live);

    session.collect_garbage().unwrap();
    assert!(session.host().unwrap().env.promises.is_empty());
}
