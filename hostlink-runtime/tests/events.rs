mod common;

use common::{calls, module, started};
use hostlink_abi::event::EventKind;
use hostlink_runtime::host::event::EventRecord;
use hostlink_runtime::{InitState, Session, SessionError};

const IMPORTS: &str = r#"
  (import "hostlink" "object_drop_ref" (func $drop_ref (param i32)))
  (import "hostlink" "global_this" (func $global (result i32)))
  (import "hostlink" "window_document" (func $document (param i32) (result i32)))
  (import "hostlink" "document_get_element_by_id" (func $by_id (param i32 i32 i32) (result i32)))
  (import "hostlink" "closure_new" (func $closure_new (param i32 i32 i32) (result i32)))
  (import "hostlink" "closure_drop" (func $closure_drop (param i32) (result i32)))
  (import "hostlink" "element_set_handler" (func $set_handler (param i32 i32 i32)))
  (import "hostlink" "event_prevent_default" (func $prevent (param i32)))
  (import "hostlink" "request_animation_frame" (func $raf (param i32 i32 i32)))
  (import "hostlink" "queue_microtask" (func $microtask (param i32)))
"#;

/// Closure 1 is the canvas keydown handler and prevents the default
/// action; closure 2 is an animation-frame callback; closure 3 a
/// microtask.
const BODY: &str = r#"
  (data (i32.const 512) "canvas")
  (global $window (mut i32) (i32.const 0))
  (global $key_handler (mut i32) (i32.const 0))

  (func $on_invoke (param $a i32) (param $arg i32)
    (if (i32.eq (local.get $a) (i32.const 1))
      (then (call $prevent (local.get $arg)))))

  (func (export "hl_start")
    (local $canvas i32)
    (global.set $window (call $global))
    (local.set $canvas
      (call $by_id (call $document (global.get $window)) (i32.const 512) (i32.const 6)))
    (global.set $key_handler (call $closure_new (i32.const 1) (i32.const 0) (i32.const 0)))
    (call $set_handler (local.get $canvas) (i32.const 0) (global.get $key_handler)))

  (func (export "release_key_handler") (result i32)
    (call $closure_drop (global.get $key_handler)))

  (func (export "request_frame") (result i32)
    (call $raf (i32.const 600) (global.get $window)
      (call $closure_new (i32.const 2) (i32.const 0) (i32.const 0)))
    (i32.load (i32.const 604)))

  (func (export "request_frame_and_forget")
    (local $f i32)
    (local.set $f (call $closure_new (i32.const 2) (i32.const 0) (i32.const 0)))
    (call $raf (i32.const 600) (global.get $window) (local.get $f))
    (call $drop_ref (local.get $f)))

  (func (export "schedule_microtask")
    (call $microtask (call $closure_new (i32.const 3) (i32.const 0) (i32.const 0))))
"#;

fn session() -> Session {
    started(&module(IMPORTS, BODY))
}

fn key() -> EventRecord {
    EventRecord::key(EventKind::KeyDown, "KeyW", false)
}

#[test]
fn test_key_handler_runs_until_released() {
    let mut session = session();
    let canvas = session.element_by_id("canvas").unwrap();
    let live = session.host().unwrap().heap.live_count();

    for _ in 0..3 {
        let outcome = session.dispatch(canvas, key()).unwrap();
        assert!(outcome.invoked);
        assert!(outcome.default_prevented);
    }
    assert_eq!(calls(&mut session, 1), 3);
    assert_eq!(session.host().unwrap().heap.live_count(), live);

    let keyup = EventRecord::key(EventKind::KeyUp, "KeyW", false);
    assert!(!session.dispatch(canvas, keyup).unwrap().invoked);

    assert_eq!(session.call::<(), i32>("release_key_handler", ()).unwrap(), 1);
    let outcome = session.dispatch(canvas, key()).unwrap();
    assert!(!outcome.invoked);
    assert!(!outcome.default_prevented);
    assert_eq!(calls(&mut session, 1), 3);
    // The module frees the environment itself on the explicit path.
    assert_eq!(session.call::<(), i32>("destroyed", ()).unwrap(), 0);
}

#[test]
fn test_dispatch_to_unknown_element() {
    let mut session = session();
    assert!(matches!(
        session.dispatch_to("nope", key()),
        Err(SessionError::NoSuchElement(_))
    ));
    assert!(session.dispatch_to("canvas", key()).unwrap().invoked);
}

#[test]
fn test_animation_frame_runs_once() {
    let mut session = session();
    let id = session.call::<(), i32>("request_frame", ()).unwrap();
    assert!(id > 0);

    assert_eq!(session.frame(16.0).unwrap(), 1);
    assert_eq!(calls(&mut session, 2), 1);
    assert_eq!(session.frame(32.0).unwrap(), 0);
    assert_eq!(calls(&mut session, 2), 1);
    assert_eq!(session.host().unwrap().env.clock.now(), 32.0);
}

#[test]
fn test_sweep_destroys_forgotten_closure() {
    let mut session = session();
    session.call::<(), ()>("request_frame_and_forget", ()).unwrap();
    // Still reachable from the frame queue.
    assert_eq!(session.collect_garbage().unwrap(), 0);

    assert_eq!(session.frame(16.0).unwrap(), 1);
    assert_eq!(session.collect_garbage().unwrap(), 1);
    assert_eq!(session.call::<(), i32>("destroyed", ()).unwrap(), 1);
    assert_eq!(session.collect_garbage().unwrap(), 0);
}

#[test]
fn test_microtask_runs_before_call_returns() {
    let mut session = session();
    session.call::<(), ()>("schedule_microtask", ()).unwrap();
    assert_eq!(calls(&mut session, 3), 1);
    assert_eq!(session.run_until_idle().unwrap(), 0);
    assert_eq!(calls(&mut session, 3), 1);
}

#[test]
fn test_queued_event_waits_for_the_loop() {
    let mut session = session();
    let canvas = session.element_by_id("canvas").unwrap();
    assert!(session.queue_event(canvas, key()).unwrap());
    assert_eq!(calls(&mut session, 1), 0);

    assert_eq!(session.run_until_idle().unwrap(), 1);
    assert_eq!(calls(&mut session, 1), 1);

    let wheel = EventRecord::wheel(0.0, 1.0, 0.0);
    assert!(!session.queue_event(canvas, wheel).unwrap());
}

const THROWING_IMPORTS: &str = r#"
  (import "hostlink" "object_drop_ref" (func $drop_ref (param i32)))
  (import "hostlink" "global_this" (func $global (result i32)))
  (import "hostlink" "closure_new" (func $closure_new (param i32 i32 i32) (result i32)))
  (import "hostlink" "request_animation_frame" (func $raf (param i32 i32 i32)))
  (import "hostlink" "throw" (func $throw (param i32 i32)))
"#;

/// Frame callback 4 throws, frame callback 5 only counts.
const THROWING_BODY: &str = r#"
  (data (i32.const 512) "oops")

  (func $on_invoke (param $a i32) (param $arg i32)
    (if (i32.eq (local.get $a) (i32.const 4))
      (then (call $throw (i32.const 512) (i32.const 4)))))

  (func (export "hl_start"))

  (func (export "request_two")
    (call $raf (i32.const 600) (call $global)
      (call $closure_new (i32.const 4) (i32.const 0) (i32.const 0)))
    (call $raf (i32.const 600) (call $global)
      (call $closure_new (i32.const 5) (i32.const 0) (i32.const 0))))
"#;

#[test]
fn test_throwing_frame_callback_does_not_skip_the_rest() {
    let mut session = started(&module(THROWING_IMPORTS, THROWING_BODY));
    session.call::<(), ()>("request_two", ()).unwrap();

    match session.frame(16.0) {
        Err(SessionError::Uncaught(message)) => assert!(message.contains("oops")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(calls(&mut session, 4), 1);
    assert_eq!(calls(&mut session, 5), 1);
    assert_eq!(session.host().unwrap().env.scheduler.pending_frames(), 0);
    assert_eq!(session.state(), InitState::Started);

    session.call::<(), ()>("request_two", ()).unwrap();
    assert!(session.frame(32.0).is_err());
    assert_eq!(calls(&mut session, 4), 2);
    assert_eq!(calls(&mut session, 5), 2);
}
