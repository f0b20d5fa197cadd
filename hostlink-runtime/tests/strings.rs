mod common;

use common::{module, started, DROP_REF};
use hostlink_runtime::{BoundaryError, SessionError};

const BODY: &str = r#"
  (func $on_invoke (param $a i32) (param $arg i32))
  (func (export "hl_start"))
"#;

fn session() -> hostlink_runtime::Session {
    started(&module(DROP_REF, BODY))
}

#[test]
fn test_ascii_string_needs_no_realloc() {
    let mut session = session();
    let value = "KeyW ArrowUp 0123456789";

    let slice = session.pass_string(value).unwrap();
    assert_eq!(slice.len as usize, value.len());
    assert_eq!(session.read_string(slice.ptr, slice.len).unwrap(), value);
    assert_eq!(session.call::<(), i32>("reallocs", ()).unwrap(), 0);
    session.free(slice).unwrap();
}

#[test]
fn test_non_ascii_string_grows_exactly_once() {
    for value in ["é", "abc€def", "mesh — ✓ 日本語", "emoji 🦀 tail"] {
        let mut session = session();
        let slice = session.pass_string(value).unwrap();
        assert_eq!(slice.len as usize, value.len());
        assert_eq!(session.read_string(slice.ptr, slice.len).unwrap(), value);
        assert_eq!(session.call::<(), i32>("grows", ()).unwrap(), 1, "{value:?}");
    }
}

#[test]
fn test_empty_string() {
    let mut session = session();
    let slice = session.pass_string("").unwrap();
    assert_eq!(slice.len, 0);
    assert_eq!(session.read_string(slice.ptr, 0).unwrap(), "");
}

#[test]
fn test_invalid_utf8_is_a_boundary_error() {
    let mut session = session();
    let slice = session.pass_string("ab").unwrap();
    {
        use hostlink_runtime::memory::{write_bytes, LinearMemory};
        let mut guest = session.guest().unwrap();
        write_bytes(&mut guest, slice.ptr, &[0xff, 0xfe]).unwrap();
        assert_eq!(guest.data()[slice.ptr as usize], 0xff);
    }
    let err = session.read_string(slice.ptr, slice.len).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Boundary(BoundaryError::Decode { .. })
    ));
}

#[test]
fn test_out_of_bounds_read() {
    let mut session = session();
    let err = session.read_string(65_530, 16).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Boundary(BoundaryError::OutOfBounds { .. })
    ));
}
