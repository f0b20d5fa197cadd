#![allow(dead_code)]

use hostlink_runtime::config::{ClockMode, RuntimeConfig};
use hostlink_runtime::{ModuleSource, Session};

/// Bump allocator plus closure trampolines shared by the test modules.
///
/// Counters live in memory: `calls(a)` at `a * 4`, closure destructor runs
/// at 256. `hl_realloc` counts growing calls in `$grows`.
const RUNTIME: &str = r#"
  (memory (export "memory") 1)
  (global $next (mut i32) (i32.const 4096))
  (global $grows (mut i32) (i32.const 0))
  (global $reallocs (mut i32) (i32.const 0))

  (func $alloc (export "hl_alloc") (param $size i32) (param $align i32) (result i32)
    (local $p i32)
    (local.set $p (global.get $next))
    (global.set $next (i32.add (local.get $p) (i32.add (local.get $size) (i32.const 8))))
    (local.get $p))

  (func (export "hl_realloc") (param $ptr i32) (param $old i32) (param $new i32) (param $align i32) (result i32)
    (local $p i32)
    (global.set $reallocs (i32.add (global.get $reallocs) (i32.const 1)))
    (if (i32.gt_u (local.get $new) (local.get $old))
      (then (global.set $grows (i32.add (global.get $grows) (i32.const 1)))))
    (local.set $p (call $alloc (local.get $new) (local.get $align)))
    (memory.copy (local.get $p) (local.get $ptr)
      (select (local.get $old) (local.get $new) (i32.lt_u (local.get $old) (local.get $new))))
    (local.get $p))

  (func (export "hl_free") (param i32 i32 i32))

  (func $bump (param $addr i32)
    (i32.store (local.get $addr) (i32.add (i32.load (local.get $addr)) (i32.const 1))))

  (func (export "hl_closure_invoke") (param $a i32) (param $b i32) (param $arg i32)
    (call $bump (i32.mul (local.get $a) (i32.const 4)))
    (call $on_invoke (local.get $a) (local.get $arg))
    (call $drop_ref (local.get $arg)))

  (func (export "hl_closure_drop") (param $dtor i32) (param $a i32) (param $b i32)
    (call $bump (i32.const 256)))

  (func (export "calls") (param $a i32) (result i32)
    (i32.load (i32.mul (local.get $a) (i32.const 4))))
  (func (export "destroyed") (result i32) (i32.load (i32.const 256)))
  (func (export "grows") (result i32) (global.get $grows))
  (func (export "reallocs") (result i32) (global.get $reallocs))
  (func (export "grow") (param i32) (result i32) (memory.grow (local.get 0)))
"#;

/// A module made of `imports`, the shared runtime and `body`. `body` must
/// define `$on_invoke (param $a i32) (param $arg i32)` and `hl_start`, and
/// `imports` must bring in `object_drop_ref` as `$drop_ref`.
pub fn module(imports: &str, body: &str) -> String {
    format!("(module\n{imports}\n{RUNTIME}\n{body}\n)")
}

pub const DROP_REF: &str =
    r#"(import "hostlink" "object_drop_ref" (func $drop_ref (param i32)))"#;

pub fn config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.clock.mode = ClockMode::Manual;
    config.clock.random_seed = Some(7);
    config
}

pub fn started(wat: &str) -> Session {
    let mut session = Session::new(config()).unwrap();
    session
        .instantiate_sync(ModuleSource::from(wat))
        .unwrap();
    session
}

pub fn calls(session: &mut Session, a: i32) -> i32 {
    session.call::<i32, i32>("calls", a).unwrap()
}
