//! Signature table of every function the host registers under
//! [`IMPORT_MODULE`](crate::IMPORT_MODULE).
//!
//! Conventions: handles, pointers, lengths and enums are `i32`; GL floats
//! are `f32`; DOM numbers are `f64`. Functions whose first parameter is
//! `ret` write a record from [`crate::records`] at that offset instead of
//! returning it.

/// WebAssembly value types used by the import table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValType {
    I32,
    F32,
    F64,
}

/// One import: name plus parameter and result types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSig {
    pub name: &'static str,
    pub params: &'static [ValType],
    pub results: &'static [ValType],
}

macro_rules! sig {
    ($name:literal ( $($p:ident),* ) $(-> $r:ident)?) => {
        ImportSig {
            name: $name,
            params: &[$(ValType::$p),*],
            results: &[$(ValType::$r)?],
        }
    };
}

pub const IMPORTS: &[ImportSig] = &[
    // Values and heap
    sig!("object_drop_ref"(I32)),
    sig!("object_clone_ref"(I32) -> I32),
    sig!("string_new"(I32, I32) -> I32),
    sig!("string_get"(I32, I32)),
    sig!("number_new"(F64) -> I32),
    sig!("number_get"(I32, I32)),
    sig!("boolean_get"(I32) -> I32),
    sig!("is_undefined"(I32) -> I32),
    sig!("is_null"(I32) -> I32),
    sig!("is_function"(I32) -> I32),
    sig!("instance_of"(I32, I32) -> I32),
    sig!("debug_string"(I32, I32)),
    sig!("error_new"(I32, I32) -> I32),
    sig!("error_stack"(I32, I32)),
    sig!("throw"(I32, I32)),
    sig!("rethrow"(I32)),
    sig!("console_log"(I32, I32)),
    sig!("console_warn"(I32, I32)),
    sig!("console_error"(I32, I32)),
    sig!("closure_new"(I32, I32, I32) -> I32),
    sig!("closure_drop"(I32) -> I32),
    sig!("global_this"() -> I32),
    sig!("math_random"() -> F64),
    // Window and DOM
    sig!("window_document"(I32) -> I32),
    sig!("window_device_pixel_ratio"(I32) -> F64),
    sig!("window_performance"(I32) -> I32),
    sig!("document_get_element_by_id"(I32, I32, I32) -> I32),
    sig!("element_set_attribute"(I32, I32, I32, I32, I32, I32)),
    sig!("element_get_attribute"(I32, I32, I32, I32)),
    sig!("element_focus"(I32, I32)),
    sig!("element_client_width"(I32) -> I32),
    sig!("element_client_height"(I32) -> I32),
    sig!("element_set_handler"(I32, I32, I32)),
    sig!("canvas_width"(I32) -> I32),
    sig!("canvas_height"(I32) -> I32),
    sig!("canvas_set_width"(I32, I32)),
    sig!("canvas_set_height"(I32, I32)),
    sig!("canvas_get_context"(I32, I32, I32, I32)),
    // Events
    sig!("event_prevent_default"(I32)),
    sig!("keyboard_event_code"(I32, I32)),
    sig!("keyboard_event_repeat"(I32) -> I32),
    sig!("mouse_event_button"(I32) -> I32),
    sig!("mouse_event_screen_x"(I32) -> I32),
    sig!("mouse_event_screen_y"(I32) -> I32),
    sig!("wheel_event_delta_x"(I32) -> F64),
    sig!("wheel_event_delta_y"(I32) -> F64),
    sig!("wheel_event_delta_z"(I32) -> F64),
    sig!("touch_event_changed_touches"(I32) -> I32),
    sig!("touch_list_length"(I32) -> I32),
    sig!("touch_list_get"(I32, I32) -> I32),
    sig!("touch_identifier"(I32) -> I32),
    sig!("touch_screen_x"(I32) -> I32),
    sig!("touch_screen_y"(I32) -> I32),
    // Scheduling and timing
    sig!("request_animation_frame"(I32, I32, I32)),
    sig!("cancel_animation_frame"(I32, I32)),
    sig!("queue_microtask"(I32)),
    sig!("performance_now"(I32) -> F64),
    // Promises, fetch and byte arrays
    sig!("promise_resolve"(I32) -> I32),
    sig!("promise_then"(I32, I32) -> I32),
    sig!("promise_then2"(I32, I32, I32) -> I32),
    sig!("window_fetch"(I32, I32, I32) -> I32),
    sig!("response_ok"(I32) -> I32),
    sig!("response_status"(I32) -> I32),
    sig!("response_array_buffer"(I32, I32)),
    sig!("bytes_length"(I32) -> I32),
    sig!("bytes_copy_to"(I32, I32, I32)),
    sig!("bytes_from_region"(I32, I32) -> I32),
    // WebGL2 state
    sig!("gl_enable"(I32, I32)),
    sig!("gl_disable"(I32, I32)),
    sig!("gl_depth_func"(I32, I32)),
    sig!("gl_viewport"(I32, I32, I32, I32, I32)),
    sig!("gl_clear_color"(I32, F32, F32, F32, F32)),
    sig!("gl_clear"(I32, I32)),
    sig!("gl_get_error"(I32) -> I32),
    sig!("gl_get_parameter"(I32, I32, I32)),
    // WebGL2 buffers and vertex arrays
    sig!("gl_create_buffer"(I32) -> I32),
    sig!("gl_delete_buffer"(I32, I32)),
    sig!("gl_bind_buffer"(I32, I32, I32)),
    sig!("gl_buffer_data"(I32, I32, I32, I32, I32)),
    sig!("gl_create_vertex_array"(I32) -> I32),
    sig!("gl_bind_vertex_array"(I32, I32)),
    sig!("gl_enable_vertex_attrib_array"(I32, I32)),
    sig!("gl_vertex_attrib_pointer"(I32, I32, I32, I32, I32, I32, I32)),
    // WebGL2 textures
    sig!("gl_create_texture"(I32) -> I32),
    sig!("gl_delete_texture"(I32, I32)),
    sig!("gl_active_texture"(I32, I32)),
    sig!("gl_bind_texture"(I32, I32, I32)),
    sig!("gl_tex_parameteri"(I32, I32, I32, I32)),
    sig!("gl_tex_image_2d"(I32, I32, I32, I32, I32, I32, I32, I32, I32, I32, I32, I32)),
    // WebGL2 shaders and programs
    sig!("gl_create_shader"(I32, I32) -> I32),
    sig!("gl_shader_source"(I32, I32, I32, I32)),
    sig!("gl_compile_shader"(I32, I32)),
    sig!("gl_get_shader_parameter"(I32, I32, I32) -> I32),
    sig!("gl_get_shader_info_log"(I32, I32, I32)),
    sig!("gl_delete_shader"(I32, I32)),
    sig!("gl_create_program"(I32) -> I32),
    sig!("gl_attach_shader"(I32, I32, I32)),
    sig!("gl_link_program"(I32, I32)),
    sig!("gl_get_program_parameter"(I32, I32, I32) -> I32),
    sig!("gl_get_program_info_log"(I32, I32, I32)),
    sig!("gl_use_program"(I32, I32)),
    sig!("gl_delete_program"(I32, I32)),
    sig!("gl_get_attrib_location"(I32, I32, I32, I32) -> I32),
    sig!("gl_get_uniform_location"(I32, I32, I32, I32) -> I32),
    // WebGL2 uniforms and draws
    sig!("gl_uniform1f"(I32, I32, F32)),
    sig!("gl_uniform1i"(I32, I32, I32)),
    sig!("gl_uniform3f"(I32, I32, F32, F32, F32)),
    sig!("gl_uniform_matrix3x4fv"(I32, I32, I32, I32, I32)),
    sig!("gl_uniform_matrix4fv"(I32, I32, I32, I32, I32)),
    sig!("gl_draw_elements"(I32, I32, I32, I32, I32)),
    sig!("gl_draw_arrays"(I32, I32, I32, I32)),
];

/// Looks up an import signature by name.
pub fn lookup(name: &str) -> Option<&'static ImportSig> {
    IMPORTS.iter().find(|sig| sig.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use ValType::{F32, I32};

    #[test]
    fn test_names_unique() {
        let mut seen = HashSet::new();
        for sig in IMPORTS {
            assert!(seen.insert(sig.name), "duplicate import {}", sig.name);
        }
    }

    #[test]
    fn test_ret_area_imports_return_nothing() {
        for name in [
            "string_get",
            "number_get",
            "debug_string",
            "element_set_attribute",
            "canvas_get_context",
            "request_animation_frame",
            "response_array_buffer",
            "gl_get_parameter",
            "gl_tex_image_2d",
            "gl_get_program_info_log",
        ] {
            let sig = lookup(name).unwrap();
            assert!(sig.results.is_empty(), "{name}");
            assert_eq!(sig.params.first(), Some(&ValType::I32), "{name}");
        }
    }

    #[test]
    fn test_lookup() {
        let sig = lookup("gl_clear_color").unwrap();
        assert_eq!(sig.params, &[I32, F32, F32, F32, F32]);
        assert!(lookup("no_such_import").is_none());
    }
}
