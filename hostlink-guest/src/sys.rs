//! Raw `hostlink` imports. Handles and offsets are `u32`; `ret` parameters
//! are offsets of a [`RetArea`](crate::ret::RetArea).

#[link(wasm_import_module = "hostlink")]
extern "C" {
    // Values and heap
    pub fn object_drop_ref(h: u32);
    pub fn object_clone_ref(h: u32) -> u32;
    pub fn string_new(ptr: *const u8, len: usize) -> u32;
    pub fn string_get(ret: u32, h: u32);
    pub fn number_new(n: f64) -> u32;
    pub fn number_get(ret: u32, h: u32);
    pub fn boolean_get(h: u32) -> u32;
    pub fn is_undefined(h: u32) -> u32;
    pub fn is_null(h: u32) -> u32;
    pub fn is_function(h: u32) -> u32;
    pub fn instance_of(h: u32, kind: u32) -> u32;
    pub fn debug_string(ret: u32, h: u32);
    pub fn error_new(ptr: *const u8, len: usize) -> u32;
    pub fn error_stack(ret: u32, h: u32);
    pub fn throw(ptr: *const u8, len: usize);
    pub fn rethrow(h: u32);
    pub fn console_log(ptr: *const u8, len: usize);
    pub fn console_warn(ptr: *const u8, len: usize);
    pub fn console_error(ptr: *const u8, len: usize);
    pub fn closure_new(a: u32, b: u32, dtor: u32) -> u32;
    pub fn closure_drop(h: u32) -> u32;
    pub fn global_this() -> u32;
    pub fn math_random() -> f64;

    // Window and DOM
    pub fn window_document(win: u32) -> u32;
    pub fn window_device_pixel_ratio(win: u32) -> f64;
    pub fn window_performance(win: u32) -> u32;
    pub fn document_get_element_by_id(doc: u32, ptr: *const u8, len: usize) -> u32;
    pub fn element_set_attribute(
        ret: u32,
        el: u32,
        name_ptr: *const u8,
        name_len: usize,
        value_ptr: *const u8,
        value_len: usize,
    );
    pub fn element_get_attribute(ret: u32, el: u32, ptr: *const u8, len: usize);
    pub fn element_focus(ret: u32, el: u32);
    pub fn element_client_width(el: u32) -> i32;
    pub fn element_client_height(el: u32) -> i32;
    pub fn element_set_handler(el: u32, kind: u32, func: u32);
    pub fn canvas_width(el: u32) -> i32;
    pub fn canvas_height(el: u32) -> i32;
    pub fn canvas_set_width(el: u32, width: i32);
    pub fn canvas_set_height(el: u32, height: i32);
    pub fn canvas_get_context(ret: u32, el: u32, ptr: *const u8, len: usize);

    // Events
    pub fn event_prevent_default(ev: u32);
    pub fn keyboard_event_code(ret: u32, ev: u32);
    pub fn keyboard_event_repeat(ev: u32) -> u32;
    pub fn mouse_event_button(ev: u32) -> i32;
    pub fn mouse_event_screen_x(ev: u32) -> i32;
    pub fn mouse_event_screen_y(ev: u32) -> i32;
    pub fn wheel_event_delta_x(ev: u32) -> f64;
    pub fn wheel_event_delta_y(ev: u32) -> f64;
    pub fn wheel_event_delta_z(ev: u32) -> f64;
    pub fn touch_event_changed_touches(ev: u32) -> u32;
    pub fn touch_list_length(list: u32) -> u32;
    pub fn touch_list_get(list: u32, index: u32) -> u32;
    pub fn touch_identifier(touch: u32) -> i32;
    pub fn touch_screen_x(touch: u32) -> i32;
    pub fn touch_screen_y(touch: u32) -> i32;

    // Scheduling and timing
    pub fn request_animation_frame(ret: u32, win: u32, func: u32);
    pub fn cancel_animation_frame(win: u32, id: u32);
    pub fn queue_microtask(func: u32);
    pub fn performance_now(perf: u32) -> f64;

    // Promises, fetch and byte arrays
    pub fn promise_resolve(h: u32) -> u32;
    pub fn promise_then(p: u32, on_ok: u32) -> u32;
    pub fn promise_then2(p: u32, on_ok: u32, on_err: u32) -> u32;
    pub fn window_fetch(win: u32, ptr: *const u8, len: usize) -> u32;
    pub fn response_ok(r: u32) -> u32;
    pub fn response_status(r: u32) -> u32;
    pub fn response_array_buffer(ret: u32, r: u32);
    pub fn bytes_length(h: u32) -> u32;
    pub fn bytes_copy_to(h: u32, ptr: *mut u8, len: usize);
    pub fn bytes_from_region(ptr: *const u8, len: usize) -> u32;

    // WebGL2 state
    pub fn gl_enable(ctx: u32, cap: u32);
    pub fn gl_disable(ctx: u32, cap: u32);
    pub fn gl_depth_func(ctx: u32, func: u32);
    pub fn gl_viewport(ctx: u32, x: i32, y: i32, width: i32, height: i32);
    pub fn gl_clear_color(ctx: u32, r: f32, g: f32, b: f32, a: f32);
    pub fn gl_clear(ctx: u32, mask: u32);
    pub fn gl_get_error(ctx: u32) -> u32;
    pub fn gl_get_parameter(ret: u32, ctx: u32, pname: u32);

    // WebGL2 buffers and vertex arrays
    pub fn gl_create_buffer(ctx: u32) -> u32;
    pub fn gl_delete_buffer(ctx: u32, buffer: u32);
    pub fn gl_bind_buffer(ctx: u32, target: u32, buffer: u32);
    pub fn gl_buffer_data(ctx: u32, target: u32, ptr: *const u8, len: usize, usage: u32);
    pub fn gl_create_vertex_array(ctx: u32) -> u32;
    pub fn gl_bind_vertex_array(ctx: u32, vao: u32);
    pub fn gl_enable_vertex_attrib_array(ctx: u32, index: u32);
    pub fn gl_vertex_attrib_pointer(
        ctx: u32,
        index: u32,
        size: i32,
        ty: u32,
        normalized: u32,
        stride: i32,
        offset: i32,
    );

    // WebGL2 textures
    pub fn gl_create_texture(ctx: u32) -> u32;
    pub fn gl_delete_texture(ctx: u32, texture: u32);
    pub fn gl_active_texture(ctx: u32, unit: u32);
    pub fn gl_bind_texture(ctx: u32, target: u32, texture: u32);
    pub fn gl_tex_parameteri(ctx: u32, target: u32, pname: u32, param: i32);
    pub fn gl_tex_image_2d(
        ret: u32,
        ctx: u32,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        ptr: *const u8,
        len: usize,
    );

    // WebGL2 shaders and programs
    pub fn gl_create_shader(ctx: u32, ty: u32) -> u32;
    pub fn gl_shader_source(ctx: u32, shader: u32, ptr: *const u8, len: usize);
    pub fn gl_compile_shader(ctx: u32, shader: u32);
    pub fn gl_get_shader_parameter(ctx: u32, shader: u32, pname: u32) -> i32;
    pub fn gl_get_shader_info_log(ret: u32, ctx: u32, shader: u32);
    pub fn gl_delete_shader(ctx: u32, shader: u32);
    pub fn gl_create_program(ctx: u32) -> u32;
    pub fn gl_attach_shader(ctx: u32, program: u32, shader: u32);
    pub fn gl_link_program(ctx: u32, program: u32);
    pub fn gl_get_program_parameter(ctx: u32, program: u32, pname: u32) -> i32;
    pub fn gl_get_program_info_log(ret: u32, ctx: u32, program: u32);
    pub fn gl_use_program(ctx: u32, program: u32);
    pub fn gl_delete_program(ctx: u32, program: u32);
    pub fn gl_get_attrib_location(ctx: u32, program: u32, ptr: *const u8, len: usize) -> i32;
    pub fn gl_get_uniform_location(ctx: u32, program: u32, ptr: *const u8, len: usize) -> u32;

    // WebGL2 uniforms and draws
    pub fn gl_uniform1f(ctx: u32, loc: u32, x: f32);
    pub fn gl_uniform1i(ctx: u32, loc: u32, x: i32);
    pub fn gl_uniform3f(ctx: u32, loc: u32, x: f32, y: f32, z: f32);
    pub fn gl_uniform_matrix3x4fv(ctx: u32, loc: u32, transpose: u32, ptr: *const f32, len: usize);
    pub fn gl_uniform_matrix4fv(ctx: u32, loc: u32, transpose: u32, ptr: *const f32, len: usize);
    pub fn gl_draw_elements(ctx: u32, mode: u32, count: i32, ty: u32, offset: i32);
    pub fn gl_draw_arrays(ctx: u32, mode: u32, first: i32, count: i32);
}
