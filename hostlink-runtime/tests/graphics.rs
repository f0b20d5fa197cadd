mod common;

use common::{module, started};
use hostlink_abi::gl::INVALID_VALUE;
use hostlink_abi::handles::NULL;

const IMPORTS: &str = r#"
  (import "hostlink" "object_drop_ref" (func $drop_ref (param i32)))
  (import "hostlink" "global_this" (func $global (result i32)))
  (import "hostlink" "window_document" (func $document (param i32) (result i32)))
  (import "hostlink" "document_get_element_by_id" (func $by_id (param i32 i32 i32) (result i32)))
  (import "hostlink" "canvas_get_context" (func $get_context (param i32 i32 i32 i32)))
  (import "hostlink" "canvas_set_width" (func $set_width (param i32 i32)))
  (import "hostlink" "gl_viewport" (func $viewport (param i32 i32 i32 i32 i32)))
  (import "hostlink" "gl_clear_color" (func $clear_color (param i32 f32 f32 f32 f32)))
  (import "hostlink" "gl_clear" (func $clear (param i32 i32)))
  (import "hostlink" "gl_get_error" (func $get_error (param i32) (result i32)))
"#;

const BODY: &str = r#"
  (data (i32.const 512) "canvas")
  (data (i32.const 520) "webgl2")
  (data (i32.const 528) "2d")
  (global $canvas (mut i32) (i32.const 0))
  (global $gl (mut i32) (i32.const 0))

  (func $on_invoke (param $a i32) (param $arg i32))

  (func (export "hl_start")
    (global.set $canvas
      (call $by_id (call $document (call $global)) (i32.const 512) (i32.const 6)))
    (call $set_width (global.get $canvas) (i32.const 640))
    (call $get_context (i32.const 600) (global.get $canvas) (i32.const 520) (i32.const 6))
    (global.set $gl (i32.load (i32.const 604))))

  (func (export "context_2d") (result i32)
    (call $get_context (i32.const 608) (global.get $canvas) (i32.const 528) (i32.const 2))
    (i32.load (i32.const 612)))

  (func (export "draw")
    (call $viewport (global.get $gl) (i32.const 0) (i32.const 0) (i32.const 640) (i32.const 480))
    (call $clear_color (global.get $gl) (f32.const 0.25) (f32.const 0.5) (f32.const 0.75) (f32.const 1))
    (call $clear (global.get $gl) (i32.const 0x4100)))

  (func (export "bad_clear") (result i32)
    (call $clear (global.get $gl) (i32.const 0x1))
    (call $get_error (global.get $gl)))
"#;

#[test]
fn test_draw_calls_reach_the_context() {
    let mut session = started(&module(IMPORTS, BODY));
    session.call::<(), ()>("draw", ()).unwrap();

    let host = session.host().unwrap();
    let gl = host.env.contexts().next().unwrap();
    assert_eq!(
        gl.trace().collect::<Vec<_>>(),
        vec!["viewport", "clearColor", "clear"]
    );
    assert_eq!(gl.current_viewport(), [0, 0, 640, 480]);
    assert_eq!(gl.current_clear_color(), [0.25, 0.5, 0.75, 1.0]);
    assert_eq!(gl.stats().clears, 1);

    let canvas = host.env.document.element(gl.canvas()).unwrap();
    assert_eq!(canvas.canvas().unwrap().width, 640);
}

#[test]
fn test_invalid_clear_sets_error() {
    let mut session = started(&module(IMPORTS, BODY));
    let error = session.call::<(), i32>("bad_clear", ()).unwrap();
    assert_eq!(error as u32, INVALID_VALUE);
    let gl = session.host().unwrap().env.contexts().next().unwrap();
    assert_eq!(gl.stats().clears, 0);
}

#[test]
fn test_unsupported_context_is_null() {
    let mut session = started(&module(IMPORTS, BODY));
    assert_eq!(session.call::<(), i32>("context_2d", ()).unwrap() as u32, NULL);
    assert_eq!(session.host().unwrap().env.contexts().count(), 1);
}
