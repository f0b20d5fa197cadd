//! `WebGL2RenderingContext` and its object types.

use bytemuck::Pod;
use glam::{Mat4, Vec3};

use super::{fallible, host_type, take_string, HostResult, Value};
use crate::sys;

pub struct Gl(Value);
host_type!(Gl, WebGl2RenderingContext);

macro_rules! gl_object {
    ($($name:ident),*) => {$(
        pub struct $name(Value);

        impl $name {
            pub fn raw(&self) -> u32 {
                self.0.raw()
            }
        }
    )*};
}

gl_object!(GlBuffer, GlVertexArray, GlTexture, GlShader, GlProgram);

/// A uniform location; `undefined` when the name is not an active uniform,
/// which the uniform setters accept and ignore.
pub struct GlUniformLocation(Value);

impl GlUniformLocation {
    pub fn is_valid(&self) -> bool {
        !self.0.is_nullish()
    }
}

impl Gl {
    fn ctx(&self) -> u32 {
        self.0.raw()
    }

    pub fn enable(&self, cap: u32) {
        unsafe { sys::gl_enable(self.ctx(), cap) }
    }

    pub fn disable(&self, cap: u32) {
        unsafe { sys::gl_disable(self.ctx(), cap) }
    }

    pub fn depth_func(&self, func: u32) {
        unsafe { sys::gl_depth_func(self.ctx(), func) }
    }

    pub fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { sys::gl_viewport(self.ctx(), x, y, width, height) }
    }

    pub fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { sys::gl_clear_color(self.ctx(), r, g, b, a) }
    }

    pub fn clear(&self, mask: u32) {
        unsafe { sys::gl_clear(self.ctx(), mask) }
    }

    pub fn get_error(&self) -> u32 {
        unsafe { sys::gl_get_error(self.ctx()) }
    }

    /// `getParameter(pname)`: a number, a string or a program, or `null`.
    pub fn get_parameter(&self, pname: u32) -> HostResult<Value> {
        let raw = fallible(|ret| unsafe { sys::gl_get_parameter(ret, self.ctx(), pname) })?;
        Ok(Value::from_raw(raw))
    }

    pub fn create_buffer(&self) -> GlBuffer {
        GlBuffer(Value::from_raw(unsafe { sys::gl_create_buffer(self.ctx()) }))
    }

    pub fn delete_buffer(&self, buffer: &GlBuffer) {
        unsafe { sys::gl_delete_buffer(self.ctx(), buffer.raw()) }
    }

    pub fn bind_buffer(&self, target: u32, buffer: Option<&GlBuffer>) {
        let b = buffer.map_or(hostlink_abi::handles::NULL, GlBuffer::raw);
        unsafe { sys::gl_bind_buffer(self.ctx(), target, b) }
    }

    pub fn buffer_data<T: Pod>(&self, target: u32, data: &[T], usage: u32) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        unsafe { sys::gl_buffer_data(self.ctx(), target, bytes.as_ptr(), bytes.len(), usage) }
    }

    pub fn create_vertex_array(&self) -> GlVertexArray {
        GlVertexArray(Value::from_raw(unsafe { sys::gl_create_vertex_array(self.ctx()) }))
    }

    pub fn bind_vertex_array(&self, vao: Option<&GlVertexArray>) {
        let v = vao.map_or(hostlink_abi::handles::NULL, GlVertexArray::raw);
        unsafe { sys::gl_bind_vertex_array(self.ctx(), v) }
    }

    pub fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { sys::gl_enable_vertex_attrib_array(self.ctx(), index) }
    }

    pub fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            sys::gl_vertex_attrib_pointer(
                self.ctx(),
                index,
                size,
                ty,
                normalized as u32,
                stride,
                offset,
            )
        }
    }

    pub fn create_texture(&self) -> GlTexture {
        GlTexture(Value::from_raw(unsafe { sys::gl_create_texture(self.ctx()) }))
    }

    pub fn delete_texture(&self, texture: &GlTexture) {
        unsafe { sys::gl_delete_texture(self.ctx(), texture.raw()) }
    }

    pub fn active_texture(&self, unit: u32) {
        unsafe { sys::gl_active_texture(self.ctx(), unit) }
    }

    pub fn bind_texture(&self, target: u32, texture: Option<&GlTexture>) {
        let t = texture.map_or(hostlink_abi::handles::NULL, GlTexture::raw);
        unsafe { sys::gl_bind_texture(self.ctx(), target, t) }
    }

    pub fn tex_parameteri(&self, target: u32, pname: u32, param: i32) {
        unsafe { sys::gl_tex_parameteri(self.ctx(), target, pname, param) }
    }

    /// Uploads a texture level. `pixels` must hold exactly
    /// `width * height * components * type size` bytes, or the call fails
    /// with a `TypeError`.
    #[allow(clippy::too_many_arguments)]
    pub fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) -> HostResult<()> {
        let (ptr, len) = pixels.map_or((std::ptr::null(), 0), |p| (p.as_ptr(), p.len()));
        fallible(|ret| unsafe {
            sys::gl_tex_image_2d(
                ret,
                self.ctx(),
                target,
                level,
                internal_format as i32,
                width,
                height,
                border,
                format,
                ty,
                ptr,
                len,
            )
        })
        .map(drop)
    }

    pub fn create_shader(&self, ty: u32) -> GlShader {
        GlShader(Value::from_raw(unsafe { sys::gl_create_shader(self.ctx(), ty) }))
    }

    pub fn shader_source(&self, shader: &GlShader, source: &str) {
        unsafe { sys::gl_shader_source(self.ctx(), shader.raw(), source.as_ptr(), source.len()) }
    }

    pub fn compile_shader(&self, shader: &GlShader) {
        unsafe { sys::gl_compile_shader(self.ctx(), shader.raw()) }
    }

    pub fn get_shader_parameter(&self, shader: &GlShader, pname: u32) -> i32 {
        unsafe { sys::gl_get_shader_parameter(self.ctx(), shader.raw(), pname) }
    }

    pub fn get_shader_info_log(&self, shader: &GlShader) -> Option<String> {
        take_string(|ret| unsafe { sys::gl_get_shader_info_log(ret, self.ctx(), shader.raw()) })
    }

    pub fn delete_shader(&self, shader: &GlShader) {
        unsafe { sys::gl_delete_shader(self.ctx(), shader.raw()) }
    }

    pub fn create_program(&self) -> GlProgram {
        GlProgram(Value::from_raw(unsafe { sys::gl_create_program(self.ctx()) }))
    }

    pub fn attach_shader(&self, program: &GlProgram, shader: &GlShader) {
        unsafe { sys::gl_attach_shader(self.ctx(), program.raw(), shader.raw()) }
    }

    pub fn link_program(&self, program: &GlProgram) {
        unsafe { sys::gl_link_program(self.ctx(), program.raw()) }
    }

    pub fn get_program_parameter(&self, program: &GlProgram, pname: u32) -> i32 {
        unsafe { sys::gl_get_program_parameter(self.ctx(), program.raw(), pname) }
    }

    pub fn get_program_info_log(&self, program: &GlProgram) -> Option<String> {
        take_string(|ret| unsafe { sys::gl_get_program_info_log(ret, self.ctx(), program.raw()) })
    }

    pub fn use_program(&self, program: Option<&GlProgram>) {
        let p = program.map_or(hostlink_abi::handles::NULL, GlProgram::raw);
        unsafe { sys::gl_use_program(self.ctx(), p) }
    }

    pub fn delete_program(&self, program: &GlProgram) {
        unsafe { sys::gl_delete_program(self.ctx(), program.raw()) }
    }

    pub fn get_attrib_location(&self, program: &GlProgram, name: &str) -> i32 {
        unsafe { sys::gl_get_attrib_location(self.ctx(), program.raw(), name.as_ptr(), name.len()) }
    }

    pub fn get_uniform_location(&self, program: &GlProgram, name: &str) -> GlUniformLocation {
        GlUniformLocation(Value::from_raw(unsafe {
            sys::gl_get_uniform_location(self.ctx(), program.raw(), name.as_ptr(), name.len())
        }))
    }

    pub fn uniform1f(&self, loc: &GlUniformLocation, x: f32) {
        unsafe { sys::gl_uniform1f(self.ctx(), loc.0.raw(), x) }
    }

    pub fn uniform1i(&self, loc: &GlUniformLocation, x: i32) {
        unsafe { sys::gl_uniform1i(self.ctx(), loc.0.raw(), x) }
    }

    pub fn uniform3f(&self, loc: &GlUniformLocation, x: f32, y: f32, z: f32) {
        unsafe { sys::gl_uniform3f(self.ctx(), loc.0.raw(), x, y, z) }
    }

    pub fn uniform_vec3(&self, loc: &GlUniformLocation, v: Vec3) {
        self.uniform3f(loc, v.x, v.y, v.z)
    }

    /// `data` holds whole 3x4 matrices, column-major.
    pub fn uniform_matrix3x4fv(&self, loc: &GlUniformLocation, transpose: bool, data: &[f32]) {
        unsafe {
            sys::gl_uniform_matrix3x4fv(
                self.ctx(),
                loc.0.raw(),
                transpose as u32,
                data.as_ptr(),
                data.len(),
            )
        }
    }

    /// `data` holds whole 4x4 matrices, column-major.
    pub fn uniform_matrix4fv(&self, loc: &GlUniformLocation, transpose: bool, data: &[f32]) {
        unsafe {
            sys::gl_uniform_matrix4fv(
                self.ctx(),
                loc.0.raw(),
                transpose as u32,
                data.as_ptr(),
                data.len(),
            )
        }
    }

    pub fn uniform_mat4(&self, loc: &GlUniformLocation, m: &Mat4) {
        self.uniform_matrix4fv(loc, false, &m.to_cols_array())
    }

    pub fn draw_elements(&self, mode: u32, count: i32, ty: u32, offset: i32) {
        unsafe { sys::gl_draw_elements(self.ctx(), mode, count, ty, offset) }
    }

    pub fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe { sys::gl_draw_arrays(self.ctx(), mode, first, count) }
    }
}
