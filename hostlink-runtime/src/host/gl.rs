//! Headless WebGL2 context.
//!
//! Calls are validated and their effect on context state recorded; nothing
//! is rasterized. Invalid calls set the sticky GL error the way a browser
//! does, and only the few cases where a browser throws produce a
//! [`HostException`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use glam::{Mat4, Vec3};
use hostlink_abi::gl::*;

use crate::host::dom::ElementId;
use crate::value::HostException;

pub const MAX_TEXTURE_SIZE_LIMIT: i32 = 4096;
pub const MAX_VERTEX_ATTRIBS_LIMIT: u32 = 16;
pub const TEXTURE_UNITS: u32 = 16;
const UNPACK_ALIGNMENT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u32);

macro_rules! object_id {
    ($($name:ident),*) => {$(
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);
    )*};
}

object_id!(BufferId, TextureId, ShaderId, ProgramId, VertexArrayId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    program: ProgramId,
    index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    /// Three columns of four rows, column-major.
    Mat3x4([f32; 12]),
    Mat4(Mat4),
}

/// `getParameter` results.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Int(i32),
    Text(&'static str),
    Program(Option<ProgramId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribPointer {
    pub buffer: BufferId,
    pub size: u32,
    pub ty: u32,
    pub normalized: bool,
    pub stride: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_calls: u64,
    pub vertices: u64,
    pub clears: u64,
}

#[derive(Debug, Default)]
struct Buffer {
    data: Vec<u8>,
    usage: u32,
    /// A buffer's first binding fixes what it may hold.
    target: Option<u32>,
    deleted: bool,
}

#[derive(Debug, Default)]
struct Texture {
    width: i32,
    height: i32,
    internal_format: u32,
    params: BTreeMap<u32, i32>,
    deleted: bool,
}

#[derive(Debug)]
struct Shader {
    kind: u32,
    source: String,
    compiled: bool,
    info_log: String,
    deleted: bool,
}

#[derive(Debug, Default)]
struct Program {
    shaders: Vec<ShaderId>,
    linked: bool,
    info_log: String,
    attributes: Vec<(String, u32)>,
    uniforms: Vec<String>,
    values: BTreeMap<u32, UniformValue>,
    deleted: bool,
}

#[derive(Debug, Default)]
struct VertexArray {
    enabled: BTreeSet<u32>,
    pointers: BTreeMap<u32, AttribPointer>,
    element_buffer: Option<BufferId>,
}

#[derive(Debug)]
pub struct GlContext {
    canvas: ElementId,
    buffers: Vec<Buffer>,
    textures: Vec<Texture>,
    shaders: Vec<Shader>,
    programs: Vec<Program>,
    /// Index 0 is the default vertex array.
    vertex_arrays: Vec<VertexArray>,
    caps: BTreeSet<u32>,
    depth_func: u32,
    clear_color: [f32; 4],
    viewport: [i32; 4],
    array_buffer: Option<BufferId>,
    vertex_array: VertexArrayId,
    active_unit: u32,
    texture_units: [Option<TextureId>; TEXTURE_UNITS as usize],
    current_program: Option<ProgramId>,
    error: u32,
    stats: DrawStats,
    trace: VecDeque<&'static str>,
    trace_capacity: usize,
    call_counts: BTreeMap<&'static str, u64>,
}

impl GlContext {
    pub fn new(canvas: ElementId, width: u32, height: u32, trace_capacity: usize) -> Self {
        Self {
            canvas,
            buffers: Vec::new(),
            textures: Vec::new(),
            shaders: Vec::new(),
            programs: Vec::new(),
            vertex_arrays: vec![VertexArray::default()],
            caps: BTreeSet::new(),
            depth_func: LESS,
            clear_color: [0.0; 4],
            viewport: [0, 0, width as i32, height as i32],
            array_buffer: None,
            vertex_array: VertexArrayId(0),
            active_unit: 0,
            texture_units: [None; TEXTURE_UNITS as usize],
            current_program: None,
            error: NO_ERROR,
            stats: DrawStats::default(),
            trace: VecDeque::with_capacity(trace_capacity),
            trace_capacity,
            call_counts: BTreeMap::new(),
        }
    }

    pub fn canvas(&self) -> ElementId {
        self.canvas
    }

    // ─── Diagnostics ───────────────────────────────────────────────────

    /// Notes a call in the bounded trace.
    pub fn record(&mut self, call: &'static str) {
        *self.call_counts.entry(call).or_default() += 1;
        if self.trace_capacity == 0 {
            return;
        }
        if self.trace.len() == self.trace_capacity {
            self.trace.pop_front();
        }
        self.trace.push_back(call);
    }

    /// Most recent calls, oldest first.
    pub fn trace(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.trace.iter().copied()
    }

    pub fn call_counts(&self) -> &BTreeMap<&'static str, u64> {
        &self.call_counts
    }

    pub fn stats(&self) -> DrawStats {
        self.stats
    }

    fn set_error(&mut self, code: u32, op: &str) {
        log::debug!("GL error {code:#06x} from {op}");
        if self.error == NO_ERROR {
            self.error = code;
        }
    }

    /// Returns and clears the first error recorded since the last call.
    pub fn get_error(&mut self) -> u32 {
        std::mem::replace(&mut self.error, NO_ERROR)
    }

    // ─── State ─────────────────────────────────────────────────────────

    fn is_known_cap(cap: u32) -> bool {
        matches!(
            cap,
            CULL_FACE | DEPTH_TEST | STENCIL_TEST | BLEND | SCISSOR_TEST
        )
    }

    pub fn enable(&mut self, cap: u32) {
        if Self::is_known_cap(cap) {
            self.caps.insert(cap);
        } else {
            self.set_error(INVALID_ENUM, "enable");
        }
    }

    pub fn disable(&mut self, cap: u32) {
        if Self::is_known_cap(cap) {
            self.caps.remove(&cap);
        } else {
            self.set_error(INVALID_ENUM, "disable");
        }
    }

    pub fn is_enabled(&self, cap: u32) -> bool {
        self.caps.contains(&cap)
    }

    pub fn depth_func(&mut self, func: u32) {
        if is_depth_func(func) {
            self.depth_func = func;
        } else {
            self.set_error(INVALID_ENUM, "depthFunc");
        }
    }

    pub fn current_depth_func(&self) -> u32 {
        self.depth_func
    }

    pub fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if width < 0 || height < 0 {
            self.set_error(INVALID_VALUE, "viewport");
            return;
        }
        self.viewport = [x, y, width, height];
    }

    pub fn current_viewport(&self) -> [i32; 4] {
        self.viewport
    }

    pub fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color = [r, g, b, a].map(|c| c.clamp(0.0, 1.0));
    }

    pub fn current_clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn clear(&mut self, mask: u32) {
        if mask & !(COLOR_BUFFER_BIT | DEPTH_BUFFER_BIT | STENCIL_BUFFER_BIT) != 0 {
            self.set_error(INVALID_VALUE, "clear");
            return;
        }
        self.stats.clears += 1;
    }

    pub fn get_parameter(&mut self, pname: u32) -> Result<Parameter, HostException> {
        let value = match pname {
            VENDOR => Parameter::Text("hostlink"),
            RENDERER => Parameter::Text("hostlink headless WebGL2"),
            VERSION => Parameter::Text("WebGL 2.0 (hostlink)"),
            SHADING_LANGUAGE_VERSION => Parameter::Text("WebGL GLSL ES 3.00 (hostlink)"),
            MAX_TEXTURE_SIZE => Parameter::Int(MAX_TEXTURE_SIZE_LIMIT),
            MAX_VERTEX_ATTRIBS => Parameter::Int(MAX_VERTEX_ATTRIBS_LIMIT as i32),
            MAX_TEXTURE_IMAGE_UNITS => Parameter::Int(TEXTURE_UNITS as i32),
            MAX_COMBINED_TEXTURE_IMAGE_UNITS => Parameter::Int(TEXTURE_UNITS as i32 * 2),
            DEPTH_FUNC => Parameter::Int(self.depth_func as i32),
            ACTIVE_TEXTURE => Parameter::Int((TEXTURE0 + self.active_unit) as i32),
            CURRENT_PROGRAM => Parameter::Program(self.current_program),
            _ => {
                self.set_error(INVALID_ENUM, "getParameter");
                return Err(HostException::error(format!(
                    "getParameter: invalid parameter name {pname:#06x} (INVALID_ENUM)"
                )));
            }
        };
        Ok(value)
    }

    // ─── Buffers and vertex arrays ─────────────────────────────────────

    pub fn create_buffer(&mut self) -> BufferId {
        self.buffers.push(Buffer::default());
        BufferId(self.buffers.len() as u32 - 1)
    }

    pub fn delete_buffer(&mut self, id: BufferId) {
        let Some(buffer) = self.buffers.get_mut(id.0 as usize) else {
            return;
        };
        buffer.deleted = true;
        if self.array_buffer == Some(id) {
            self.array_buffer = None;
        }
        for vao in &mut self.vertex_arrays {
            if vao.element_buffer == Some(id) {
                vao.element_buffer = None;
            }
        }
    }

    fn live_buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(id.0 as usize).filter(|b| !b.deleted)
    }

    fn current_vao(&mut self) -> &mut VertexArray {
        &mut self.vertex_arrays[self.vertex_array.0 as usize]
    }

    pub fn bind_buffer(&mut self, target: u32, id: Option<BufferId>) {
        if target != ARRAY_BUFFER && target != ELEMENT_ARRAY_BUFFER {
            self.set_error(INVALID_ENUM, "bindBuffer");
            return;
        }
        if let Some(id) = id {
            let Some(buffer) = self.buffers.get_mut(id.0 as usize).filter(|b| !b.deleted) else {
                self.set_error(INVALID_OPERATION, "bindBuffer");
                return;
            };
            match buffer.target {
                Some(existing) if existing != target => {
                    self.set_error(INVALID_OPERATION, "bindBuffer");
                    return;
                }
                _ => buffer.target = Some(target),
            }
        }
        if target == ARRAY_BUFFER {
            self.array_buffer = id;
        } else {
            self.current_vao().element_buffer = id;
        }
    }

    fn bound_buffer(&mut self, target: u32) -> Option<BufferId> {
        match target {
            ARRAY_BUFFER => self.array_buffer,
            ELEMENT_ARRAY_BUFFER => self.current_vao().element_buffer,
            _ => None,
        }
    }

    pub fn buffer_data(&mut self, target: u32, data: &[u8], usage: u32) {
        if target != ARRAY_BUFFER && target != ELEMENT_ARRAY_BUFFER {
            self.set_error(INVALID_ENUM, "bufferData");
            return;
        }
        if !matches!(usage, STREAM_DRAW | STATIC_DRAW | DYNAMIC_DRAW) {
            self.set_error(INVALID_ENUM, "bufferData");
            return;
        }
        let Some(id) = self.bound_buffer(target) else {
            self.set_error(INVALID_OPERATION, "bufferData");
            return;
        };
        let buffer = &mut self.buffers[id.0 as usize];
        buffer.data = data.to_vec();
        buffer.usage = usage;
    }

    /// Size and usage hint of the data last uploaded to `id`.
    pub fn buffer_info(&self, id: BufferId) -> Option<(usize, u32)> {
        self.live_buffer(id).map(|b| (b.data.len(), b.usage))
    }

    pub fn create_vertex_array(&mut self) -> VertexArrayId {
        self.vertex_arrays.push(VertexArray::default());
        VertexArrayId(self.vertex_arrays.len() as u32 - 1)
    }

    pub fn bind_vertex_array(&mut self, id: Option<VertexArrayId>) {
        let id = id.unwrap_or(VertexArrayId(0));
        if (id.0 as usize) < self.vertex_arrays.len() {
            self.vertex_array = id;
        } else {
            self.set_error(INVALID_OPERATION, "bindVertexArray");
        }
    }

    pub fn enable_vertex_attrib_array(&mut self, index: u32) {
        if index >= MAX_VERTEX_ATTRIBS_LIMIT {
            self.set_error(INVALID_VALUE, "enableVertexAttribArray");
            return;
        }
        self.current_vao().enabled.insert(index);
    }

    pub fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        if index >= MAX_VERTEX_ATTRIBS_LIMIT || !(1..=4).contains(&size) || stride < 0 || offset < 0
        {
            self.set_error(INVALID_VALUE, "vertexAttribPointer");
            return;
        }
        let Some(elem) = type_size(ty) else {
            self.set_error(INVALID_ENUM, "vertexAttribPointer");
            return;
        };
        if offset as u32 % elem != 0 || stride as u32 % elem != 0 {
            self.set_error(INVALID_OPERATION, "vertexAttribPointer");
            return;
        }
        let Some(buffer) = self.array_buffer else {
            self.set_error(INVALID_OPERATION, "vertexAttribPointer");
            return;
        };
        self.current_vao().pointers.insert(
            index,
            AttribPointer {
                buffer,
                size: size as u32,
                ty,
                normalized,
                stride: stride as u32,
                offset: offset as u32,
            },
        );
    }

    pub fn attrib_pointer(&self, index: u32) -> Option<AttribPointer> {
        self.vertex_arrays[self.vertex_array.0 as usize]
            .pointers
            .get(&index)
            .copied()
    }

    // ─── Textures ──────────────────────────────────────────────────────

    pub fn create_texture(&mut self) -> TextureId {
        self.textures.push(Texture::default());
        TextureId(self.textures.len() as u32 - 1)
    }

    pub fn delete_texture(&mut self, id: TextureId) {
        let Some(texture) = self.textures.get_mut(id.0 as usize) else {
            return;
        };
        texture.deleted = true;
        for unit in &mut self.texture_units {
            if *unit == Some(id) {
                *unit = None;
            }
        }
    }

    pub fn active_texture(&mut self, texture: u32) {
        match texture.checked_sub(TEXTURE0) {
            Some(unit) if unit < TEXTURE_UNITS => self.active_unit = unit,
            _ => self.set_error(INVALID_ENUM, "activeTexture"),
        }
    }

    pub fn bind_texture(&mut self, target: u32, id: Option<TextureId>) {
        if target != TEXTURE_2D {
            self.set_error(INVALID_ENUM, "bindTexture");
            return;
        }
        if let Some(id) = id {
            if self.textures.get(id.0 as usize).is_none_or(|t| t.deleted) {
                self.set_error(INVALID_OPERATION, "bindTexture");
                return;
            }
        }
        self.texture_units[self.active_unit as usize] = id;
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.texture_units.get(unit as usize).copied().flatten()
    }

    fn bound_texture_mut(&mut self, target: u32, op: &str) -> Option<&mut Texture> {
        if target != TEXTURE_2D {
            self.set_error(INVALID_ENUM, op);
            return None;
        }
        let Some(id) = self.texture_units[self.active_unit as usize] else {
            self.set_error(INVALID_OPERATION, op);
            return None;
        };
        self.textures.get_mut(id.0 as usize)
    }

    pub fn tex_parameteri(&mut self, target: u32, pname: u32, param: i32) {
        if !matches!(
            pname,
            TEXTURE_MAG_FILTER | TEXTURE_MIN_FILTER | TEXTURE_WRAP_S | TEXTURE_WRAP_T
        ) {
            self.set_error(INVALID_ENUM, "texParameteri");
            return;
        }
        if let Some(texture) = self.bound_texture_mut(target, "texParameteri") {
            texture.params.insert(pname, param);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) -> Result<(), HostException> {
        let (Some(components), Some(elem)) = (format_components(format), type_size(ty)) else {
            self.set_error(INVALID_ENUM, "texImage2D");
            return Ok(());
        };
        if let Some(pixels) = pixels {
            if pixels.len() as u32 % elem != 0 {
                return Err(HostException::type_error(format!(
                    "texImage2D: {} bytes of pixel data do not match type {ty:#06x}",
                    pixels.len()
                )));
            }
        }
        let max = MAX_TEXTURE_SIZE_LIMIT >> level.clamp(0, 31);
        if level < 0 || width < 0 || height < 0 || border != 0 || width > max || height > max {
            self.set_error(INVALID_VALUE, "texImage2D");
            return Ok(());
        }
        let sized_match = match internal_format {
            RGBA8 => format == RGBA,
            RGB8 => format == RGB,
            R8 => format == RED,
            other => other == format,
        };
        if !sized_match {
            self.set_error(INVALID_OPERATION, "texImage2D");
            return Ok(());
        }
        let required = image_size(width as u32, height as u32, components * elem);
        if pixels.is_some_and(|p| p.len() < required) {
            self.set_error(INVALID_OPERATION, "texImage2D");
            return Ok(());
        }
        if let Some(texture) = self.bound_texture_mut(target, "texImage2D") {
            texture.width = width;
            texture.height = height;
            texture.internal_format = internal_format;
        }
        Ok(())
    }

    /// Width, height and internal format of a texture's base level.
    pub fn texture_image(&self, id: TextureId) -> Option<(i32, i32, u32)> {
        let t = self.textures.get(id.0 as usize).filter(|t| !t.deleted)?;
        Some((t.width, t.height, t.internal_format))
    }

    pub fn texture_param(&self, id: TextureId, pname: u32) -> Option<i32> {
        self.textures.get(id.0 as usize)?.params.get(&pname).copied()
    }

    // ─── Shaders and programs ──────────────────────────────────────────

    pub fn create_shader(&mut self, kind: u32) -> Option<ShaderId> {
        if kind != VERTEX_SHADER && kind != FRAGMENT_SHADER {
            self.set_error(INVALID_ENUM, "createShader");
            return None;
        }
        self.shaders.push(Shader {
            kind,
            source: String::new(),
            compiled: false,
            info_log: String::new(),
            deleted: false,
        });
        Some(ShaderId(self.shaders.len() as u32 - 1))
    }

    fn live_shader_mut(&mut self, id: ShaderId, op: &str) -> Option<&mut Shader> {
        match self.shaders.get(id.0 as usize) {
            Some(shader) if !shader.deleted => self.shaders.get_mut(id.0 as usize),
            _ => {
                self.set_error(INVALID_OPERATION, op);
                None
            }
        }
    }

    pub fn shader_source(&mut self, id: ShaderId, source: String) {
        if let Some(shader) = self.live_shader_mut(id, "shaderSource") {
            shader.source = source;
        }
    }

    pub fn compile_shader(&mut self, id: ShaderId) {
        if let Some(shader) = self.live_shader_mut(id, "compileShader") {
            match glsl::check(&shader.source) {
                Ok(()) => {
                    shader.compiled = true;
                    shader.info_log.clear();
                }
                Err(log) => {
                    log::debug!("shader {} failed to compile: {log}", id.0);
                    shader.compiled = false;
                    shader.info_log = log;
                }
            }
        }
    }

    /// `getShaderParameter`, with booleans as 0/1.
    pub fn shader_parameter(&mut self, id: ShaderId, pname: u32) -> i32 {
        let Some(shader) = self.shaders.get(id.0 as usize) else {
            self.set_error(INVALID_OPERATION, "getShaderParameter");
            return 0;
        };
        match pname {
            COMPILE_STATUS => shader.compiled as i32,
            DELETE_STATUS => shader.deleted as i32,
            SHADER_TYPE => shader.kind as i32,
            _ => {
                self.set_error(INVALID_ENUM, "getShaderParameter");
                0
            }
        }
    }

    pub fn shader_info_log(&self, id: ShaderId) -> Option<String> {
        self.shaders.get(id.0 as usize).map(|s| s.info_log.clone())
    }

    pub fn delete_shader(&mut self, id: ShaderId) {
        if let Some(shader) = self.shaders.get_mut(id.0 as usize) {
            shader.deleted = true;
        }
    }

    pub fn create_program(&mut self) -> ProgramId {
        self.programs.push(Program::default());
        ProgramId(self.programs.len() as u32 - 1)
    }

    fn live_program_mut(&mut self, id: ProgramId, op: &str) -> Option<&mut Program> {
        match self.programs.get(id.0 as usize) {
            Some(program) if !program.deleted => self.programs.get_mut(id.0 as usize),
            _ => {
                self.set_error(INVALID_OPERATION, op);
                None
            }
        }
    }

    pub fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if self.shaders.get(shader.0 as usize).is_none_or(|s| s.deleted) {
            self.set_error(INVALID_OPERATION, "attachShader");
            return;
        }
        let Some(p) = self.live_program_mut(program, "attachShader") else {
            return;
        };
        if p.shaders.contains(&shader) {
            self.set_error(INVALID_OPERATION, "attachShader");
            return;
        }
        p.shaders.push(shader);
    }

    pub fn link_program(&mut self, id: ProgramId) {
        let Some(program) = self.programs.get(id.0 as usize).filter(|p| !p.deleted) else {
            self.set_error(INVALID_OPERATION, "linkProgram");
            return;
        };

        let stage = |kind: u32| {
            program
                .shaders
                .iter()
                .filter_map(|s| self.shaders.get(s.0 as usize))
                .find(|s| s.kind == kind)
        };
        let outcome = match (stage(VERTEX_SHADER), stage(FRAGMENT_SHADER)) {
            (None, _) => Err("Missing vertex shader.".to_string()),
            (_, None) => Err("Missing fragment shader.".to_string()),
            (Some(vs), _) if !vs.compiled => Err("Attached vertex shader is not compiled.".into()),
            (_, Some(fs)) if !fs.compiled => {
                Err("Attached fragment shader is not compiled.".into())
            }
            (Some(vs), Some(fs)) => {
                let attributes = glsl::attribute_locations(&vs.source);
                let mut uniforms = glsl::uniform_names(&vs.source);
                for name in glsl::uniform_names(&fs.source) {
                    if !uniforms.contains(&name) {
                        uniforms.push(name);
                    }
                }
                Ok((attributes, uniforms))
            }
        };

        let program = &mut self.programs[id.0 as usize];
        match outcome {
            Ok((attributes, uniforms)) => {
                program.linked = true;
                program.info_log.clear();
                program.attributes = attributes;
                program.uniforms = uniforms;
                program.values.clear();
            }
            Err(log) => {
                log::debug!("program {} failed to link: {log}", id.0);
                program.linked = false;
                program.info_log = log;
            }
        }
    }

    pub fn program_parameter(&mut self, id: ProgramId, pname: u32) -> i32 {
        let Some(program) = self.programs.get(id.0 as usize) else {
            self.set_error(INVALID_OPERATION, "getProgramParameter");
            return 0;
        };
        match pname {
            LINK_STATUS => program.linked as i32,
            DELETE_STATUS => program.deleted as i32,
            ATTACHED_SHADERS => program.shaders.len() as i32,
            _ => {
                self.set_error(INVALID_ENUM, "getProgramParameter");
                0
            }
        }
    }

    pub fn program_info_log(&self, id: ProgramId) -> Option<String> {
        self.programs.get(id.0 as usize).map(|p| p.info_log.clone())
    }

    pub fn use_program(&mut self, id: Option<ProgramId>) {
        if let Some(id) = id {
            match self.programs.get(id.0 as usize) {
                Some(p) if p.linked && !p.deleted => {}
                _ => {
                    self.set_error(INVALID_OPERATION, "useProgram");
                    return;
                }
            }
        }
        self.current_program = id;
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    pub fn delete_program(&mut self, id: ProgramId) {
        if let Some(program) = self.programs.get_mut(id.0 as usize) {
            program.deleted = true;
        }
    }

    /// -1 when the program is unlinked or has no such active attribute.
    pub fn attrib_location(&mut self, id: ProgramId, name: &str) -> i32 {
        let Some(program) = self.programs.get(id.0 as usize) else {
            self.set_error(INVALID_OPERATION, "getAttribLocation");
            return -1;
        };
        program
            .attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map_or(-1, |(_, location)| *location as i32)
    }

    pub fn uniform_location(&mut self, id: ProgramId, name: &str) -> Option<UniformLocation> {
        let Some(program) = self.programs.get(id.0 as usize) else {
            self.set_error(INVALID_OPERATION, "getUniformLocation");
            return None;
        };
        if !program.linked {
            self.set_error(INVALID_OPERATION, "getUniformLocation");
            return None;
        }
        let base = name.strip_suffix("[0]").unwrap_or(name);
        let index = program.uniforms.iter().position(|u| u == base)?;
        Some(UniformLocation {
            program: id,
            index: index as u32,
        })
    }

    // ─── Uniforms and draws ────────────────────────────────────────────

    /// Sets a uniform on the current program. A `None` location is a
    /// silent no-op.
    pub fn uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) {
        let Some(location) = location else {
            return;
        };
        if self.current_program != Some(location.program) {
            self.set_error(INVALID_OPERATION, "uniform");
            return;
        }
        self.programs[location.program.0 as usize]
            .values
            .insert(location.index, value);
    }

    pub fn uniform_matrix4fv(
        &mut self,
        location: Option<UniformLocation>,
        transpose: bool,
        data: &[f32],
    ) {
        if data.is_empty() || data.len() % 16 != 0 {
            self.set_error(INVALID_VALUE, "uniformMatrix4fv");
            return;
        }
        let m = Mat4::from_cols_slice(&data[..16]);
        let m = if transpose { m.transpose() } else { m };
        self.uniform(location, UniformValue::Mat4(m));
    }

    pub fn uniform_matrix3x4fv(
        &mut self,
        location: Option<UniformLocation>,
        transpose: bool,
        data: &[f32],
    ) {
        if data.is_empty() || data.len() % 12 != 0 {
            self.set_error(INVALID_VALUE, "uniformMatrix3x4fv");
            return;
        }
        let mut m = [0.0f32; 12];
        for col in 0..3 {
            for row in 0..4 {
                m[col * 4 + row] = if transpose {
                    data[row * 3 + col]
                } else {
                    data[col * 4 + row]
                };
            }
        }
        self.uniform(location, UniformValue::Mat3x4(m));
    }

    pub fn uniform_value(&self, location: UniformLocation) -> Option<&UniformValue> {
        self.programs
            .get(location.program.0 as usize)?
            .values
            .get(&location.index)
    }

    fn check_draw(&mut self, mode: u32, count: i32, op: &str) -> bool {
        if mode > TRIANGLE_FAN {
            self.set_error(INVALID_ENUM, op);
            return false;
        }
        if count < 0 {
            self.set_error(INVALID_VALUE, op);
            return false;
        }
        let program_ready = self
            .current_program
            .and_then(|id| self.programs.get(id.0 as usize))
            .is_some_and(|p| p.linked);
        let vao = &self.vertex_arrays[self.vertex_array.0 as usize];
        let attribs_ready = vao.enabled.iter().all(|i| vao.pointers.contains_key(i));
        if !program_ready || !attribs_ready {
            self.set_error(INVALID_OPERATION, op);
            return false;
        }
        true
    }

    pub fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: i32) {
        if !self.check_draw(mode, count, "drawElements") {
            return;
        }
        let elem = match ty {
            UNSIGNED_BYTE | UNSIGNED_SHORT | UNSIGNED_INT => type_size(ty).unwrap_or(1),
            _ => {
                self.set_error(INVALID_ENUM, "drawElements");
                return;
            }
        };
        if offset < 0 {
            self.set_error(INVALID_VALUE, "drawElements");
            return;
        }
        let len = self.vertex_arrays[self.vertex_array.0 as usize]
            .element_buffer
            .and_then(|id| self.live_buffer(id))
            .map(|b| b.data.len());
        let end = offset as u64 + count as u64 * elem as u64;
        match len {
            Some(len) if offset as u32 % elem == 0 && end <= len as u64 => {
                self.stats.draw_calls += 1;
                self.stats.vertices += count as u64;
            }
            _ => self.set_error(INVALID_OPERATION, "drawElements"),
        }
    }

    pub fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        if first < 0 {
            self.set_error(INVALID_VALUE, "drawArrays");
            return;
        }
        if self.check_draw(mode, count, "drawArrays") {
            self.stats.draw_calls += 1;
            self.stats.vertices += count as u64;
        }
    }
}

/// Bytes needed for a `width`×`height` upload at the default unpack
/// alignment.
fn image_size(width: u32, height: u32, pixel_bytes: u32) -> usize {
    if width == 0 || height == 0 {
        return 0;
    }
    let row = width as usize * pixel_bytes as usize;
    let align = UNPACK_ALIGNMENT as usize;
    let padded = row.div_ceil(align) * align;
    (height as usize - 1) * padded + row
}

/// Just enough GLSL ES to validate shaders and discover interface names.
mod glsl {
    const PRECISION: &[&str] = &["lowp", "mediump", "highp", "flat", "smooth", "centroid"];

    fn strip_comments(source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix("//") {
                rest = after.find('\n').map_or("", |i| &after[i..]);
            } else if let Some(after) = rest.strip_prefix("/*") {
                rest = after.find("*/").map_or("", |i| &after[i + 2..]);
                out.push(' ');
            } else {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    out.push(c);
                }
                rest = chars.as_str();
            }
        }
        out
    }

    fn tokens(text: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut start = None;
        for (i, c) in text.char_indices() {
            let ident = c.is_alphanumeric() || c == '_' || c == '.';
            match (ident, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    out.push(&text[s..i]);
                    start = None;
                }
                _ => {}
            }
            if !ident && !c.is_whitespace() {
                out.push(&text[i..i + c.len_utf8()]);
            }
        }
        if let Some(s) = start {
            out.push(&text[s..]);
        }
        out
    }

    fn is_ident(token: &str) -> bool {
        token
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
    }

    /// Global declarations, one per statement, with preprocessor lines
    /// removed.
    fn statements(source: &str) -> Vec<String> {
        let code: String = strip_comments(source)
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");
        code.split(';')
            .map(|s| s.rsplit('}').next().unwrap_or(s).trim().to_string())
            .collect()
    }

    struct Decl {
        qualifier: String,
        location: Option<u32>,
        names: Vec<String>,
    }

    fn declaration(statement: &str) -> Option<Decl> {
        let tokens = tokens(statement);
        let mut i = 0;
        let mut location = None;
        if tokens.first() == Some(&"layout") {
            let close = tokens.iter().position(|t| *t == ")")?;
            let inner = &tokens[1..close];
            if let Some(at) = inner.iter().position(|t| *t == "location") {
                location = inner.get(at + 2).and_then(|n| n.parse().ok());
            }
            i = close + 1;
        }
        while tokens.get(i).is_some_and(|t| PRECISION.contains(t)) {
            i += 1;
        }
        let qualifier = *tokens.get(i)?;
        if !matches!(qualifier, "in" | "attribute" | "uniform") {
            return None;
        }
        i += 1;
        while tokens.get(i).is_some_and(|t| PRECISION.contains(t)) {
            i += 1;
        }
        i += 1; // type
        let mut names = Vec::new();
        let mut expect_name = true;
        let mut depth = 0;
        for token in &tokens[i.min(tokens.len())..] {
            match *token {
                "[" => depth += 1,
                "]" => depth -= 1,
                "," if depth == 0 => expect_name = true,
                t if expect_name && depth == 0 && is_ident(t) => {
                    names.push(t.to_string());
                    expect_name = false;
                }
                "{" => return None,
                _ => {}
            }
        }
        (!names.is_empty()).then(|| Decl {
            qualifier: qualifier.to_string(),
            location,
            names,
        })
    }

    /// Accepts a shader that declares a supported version (if any), has
    /// balanced braces and defines `main`. The error is an info log.
    pub fn check(source: &str) -> Result<(), String> {
        if source.trim().is_empty() {
            return Err("ERROR: 0:1: '' : syntax error: empty shader".into());
        }
        let stripped = strip_comments(source);
        if let Some(line) = stripped.lines().map(str::trim).find(|l| !l.is_empty()) {
            if let Some(version) = line.strip_prefix("#version") {
                if !matches!(version.trim(), "300 es" | "100") {
                    return Err(format!(
                        "ERROR: 0:1: '{}' : unsupported version",
                        version.trim()
                    ));
                }
            }
        }
        let opens = stripped.matches('{').count();
        let closes = stripped.matches('}').count();
        if opens != closes {
            return Err("ERROR: 0:1: '}' : syntax error: unbalanced braces".into());
        }
        let tokens = tokens(&stripped);
        let has_main = tokens
            .windows(3)
            .any(|w| w[0] == "void" && w[1] == "main" && w[2] == "(");
        if !has_main {
            return Err("ERROR: 0:1: 'main' : function not found".into());
        }
        Ok(())
    }

    /// Vertex inputs with their locations: explicit `layout(location = n)`
    /// first, the rest in declaration order on the lowest free slots.
    pub fn attribute_locations(vertex_source: &str) -> Vec<(String, u32)> {
        let decls: Vec<Decl> = statements(vertex_source)
            .iter()
            .filter_map(|s| declaration(s))
            .filter(|d| d.qualifier != "uniform")
            .collect();
        let mut taken: Vec<u32> = decls.iter().filter_map(|d| d.location).collect();
        let mut out = Vec::new();
        for decl in &decls {
            for name in &decl.names {
                let location = match decl.location {
                    Some(location) => location,
                    None => {
                        let free = (0..).find(|n| !taken.contains(n)).unwrap_or(0);
                        taken.push(free);
                        free
                    }
                };
                out.push((name.clone(), location));
            }
        }
        out
    }

    pub fn uniform_names(source: &str) -> Vec<String> {
        statements(source)
            .iter()
            .filter_map(|s| declaration(s))
            .filter(|d| d.qualifier == "uniform")
            .flat_map(|d| d.names)
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        const VS: &str = "#version 300 es
            // position and colour
            layout(location = 1) in vec3 a_position;
            in vec3 a_color;
            uniform mat4 u_mvp;
            uniform highp float u_time, u_scale;
            out vec3 v_color;
            void main() { v_color = a_color; gl_Position = u_mvp * vec4(a_position, 1.0); }";

        #[test]
        fn test_check() {
            assert!(check(VS).is_ok());
            assert!(check("").is_err());
            assert!(check("#version 300 es\nvoid notmain() {}").unwrap_err().contains("main"));
            assert!(check("#version 310 es\nvoid main() {}").is_err());
            assert!(check("void main() {").is_err());
            assert!(check("/* void main() {} */ void other() {}").is_err());
        }

        #[test]
        fn test_attribute_locations() {
            assert_eq!(
                attribute_locations(VS),
                vec![("a_position".to_string(), 1), ("a_color".to_string(), 0)]
            );
        }

        #[test]
        fn test_uniform_names() {
            assert_eq!(uniform_names(VS), vec!["u_mvp", "u_time", "u_scale"]);
            assert_eq!(uniform_names("uniform sampler2D u_tex[4];"), vec!["u_tex"]);
        }
    }
}
