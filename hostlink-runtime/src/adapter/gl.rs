//! WebGL2 adapters. Every call resolves its context handle, is noted in
//! the context's trace under its WebGL method name, and then forwards to
//! the headless context.

use hostlink_abi::handles::{NULL, UNDEFINED};
use hostlink_abi::IMPORT_MODULE;
use wasmtime::Linker;

use super::{allocate, guard, handle, memory, write_result, write_string, Cx};
use crate::error::BoundaryError;
use crate::heap::HandleTable;
use crate::host::gl::{ContextId, GlContext, Parameter, UniformLocation, UniformValue};
use crate::memory::{bytes_in, f32_from_region, string_from_region};
use crate::state::HostState;
use crate::value::HostValue;

fn context<'s>(
    state: &'s mut HostState,
    ctx: i32,
    call: &'static str,
) -> Result<(&'s mut HandleTable, &'s mut GlContext), BoundaryError> {
    let id = state.heap.cast::<ContextId>(handle(ctx))?;
    let gl = state
        .env
        .gl_mut(id)
        .ok_or(BoundaryError::InvalidHandle(ctx as u32))?;
    gl.record(call);
    Ok((&mut state.heap, gl))
}

fn gl_call<R>(
    c: &mut Cx<'_>,
    ctx: i32,
    call: &'static str,
    f: impl FnOnce(&mut HandleTable, &mut GlContext) -> Result<R, BoundaryError>,
) -> Result<R, BoundaryError> {
    let (heap, gl) = context(c.data_mut(), ctx, call)?;
    f(heap, gl)
}

/// Like [`gl_call`], with module memory readable alongside.
fn gl_call_mem<R>(
    c: &mut Cx<'_>,
    ctx: i32,
    call: &'static str,
    f: impl FnOnce(&mut HandleTable, &mut GlContext, &[u8]) -> Result<R, BoundaryError>,
) -> Result<R, BoundaryError> {
    let mem = memory(c)?;
    let (data, state) = mem.data_and_store_mut(&mut *c);
    let (heap, gl) = context(state, ctx, call)?;
    f(heap, gl, data)
}

fn parameter_value(parameter: Parameter) -> HostValue {
    match parameter {
        Parameter::Int(n) => HostValue::Number(f64::from(n)),
        Parameter::Text(s) => HostValue::String(s.to_string()),
        Parameter::Program(Some(program)) => HostValue::GlProgram(program),
        Parameter::Program(None) => HostValue::Null,
    }
}

fn get_parameter(c: &mut Cx<'_>, ret: i32, ctx: i32, pname: i32) -> Result<(), BoundaryError> {
    let parameter = gl_call(c, ctx, "getParameter", |_, gl| Ok(gl.get_parameter(pname as u32)))?;
    let outcome = parameter.map(|p| match parameter_value(p) {
        HostValue::Null => NULL,
        value => c.data_mut().heap.allocate(value).raw(),
    });
    write_result(c, ret, outcome)
}

#[allow(clippy::too_many_arguments)]
fn tex_image_2d(
    c: &mut Cx<'_>,
    ret: i32,
    ctx: i32,
    target: i32,
    level: i32,
    internal_format: i32,
    width: i32,
    height: i32,
    border: i32,
    format: i32,
    ty: i32,
    ptr: i32,
    len: i32,
) -> Result<(), BoundaryError> {
    let outcome = gl_call_mem(c, ctx, "texImage2D", |_, gl, data| {
        let pixels = match ptr {
            0 => None,
            _ => Some(bytes_in(data, ptr as u32, len as u32)?),
        };
        Ok(gl.tex_image_2d(
            target as u32,
            level,
            internal_format as u32,
            width,
            height,
            border,
            format as u32,
            ty as u32,
            pixels,
        ))
    })?;
    write_result(c, ret, outcome.map(|()| 0))
}

fn link_state(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "gl_enable", |mut c: Cx<'_>, ctx: i32, cap: i32| {
        guard(&mut c, |c| gl_call(c, ctx, "enable", |_, gl| Ok(gl.enable(cap as u32))))
    })?;
    linker.func_wrap(IMPORT_MODULE, "gl_disable", |mut c: Cx<'_>, ctx: i32, cap: i32| {
        guard(&mut c, |c| gl_call(c, ctx, "disable", |_, gl| Ok(gl.disable(cap as u32))))
    })?;
    linker.func_wrap(IMPORT_MODULE, "gl_depth_func", |mut c: Cx<'_>, ctx: i32, func: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "depthFunc", |_, gl| Ok(gl.depth_func(func as u32)))
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_viewport",
        |mut c: Cx<'_>, ctx: i32, x: i32, y: i32, w: i32, h: i32| {
            guard(&mut c, |c| gl_call(c, ctx, "viewport", |_, gl| Ok(gl.viewport(x, y, w, h))))
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_clear_color",
        |mut c: Cx<'_>, ctx: i32, r: f32, g: f32, b: f32, a: f32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "clearColor", |_, gl| Ok(gl.clear_color(r, g, b, a)))
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "gl_clear", |mut c: Cx<'_>, ctx: i32, mask: i32| {
        guard(&mut c, |c| gl_call(c, ctx, "clear", |_, gl| Ok(gl.clear(mask as u32))))
    })?;
    linker.func_wrap(IMPORT_MODULE, "gl_get_error", |mut c: Cx<'_>, ctx: i32| {
        guard(&mut c, |c| gl_call(c, ctx, "getError", |_, gl| Ok(gl.get_error() as i32)))
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_parameter",
        |mut c: Cx<'_>, ret: i32, ctx: i32, pname: i32| {
            guard(&mut c, |c| get_parameter(c, ret, ctx, pname))
        },
    )?;
    Ok(())
}

fn link_buffers(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "gl_create_buffer", |mut c: Cx<'_>, ctx: i32| {
        guard(&mut c, |c| {
            let buffer = gl_call(c, ctx, "createBuffer", |_, gl| Ok(gl.create_buffer()))?;
            Ok(allocate(c, HostValue::GlBuffer(buffer)))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "gl_delete_buffer", |mut c: Cx<'_>, ctx: i32, b: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "deleteBuffer", |heap, gl| {
                if let Some(buffer) = heap.cast_optional(handle(b))? {
                    gl.delete_buffer(buffer);
                }
                Ok(())
            })
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_bind_buffer",
        |mut c: Cx<'_>, ctx: i32, target: i32, b: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "bindBuffer", |heap, gl| {
                    gl.bind_buffer(target as u32, heap.cast_optional(handle(b))?);
                    Ok(())
                })
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_buffer_data",
        |mut c: Cx<'_>, ctx: i32, target: i32, ptr: i32, len: i32, usage: i32| {
            guard(&mut c, |c| {
                gl_call_mem(c, ctx, "bufferData", |_, gl, data| {
                    let bytes = bytes_in(data, ptr as u32, len as u32)?;
                    gl.buffer_data(target as u32, bytes, usage as u32);
                    Ok(())
                })
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "gl_create_vertex_array", |mut c: Cx<'_>, ctx: i32| {
        guard(&mut c, |c| {
            let vao = gl_call(c, ctx, "createVertexArray", |_, gl| Ok(gl.create_vertex_array()))?;
            Ok(allocate(c, HostValue::GlVertexArray(vao)))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "gl_bind_vertex_array", |mut c: Cx<'_>, ctx: i32, v: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "bindVertexArray", |heap, gl| {
                gl.bind_vertex_array(heap.cast_optional(handle(v))?);
                Ok(())
            })
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_enable_vertex_attrib_array",
        |mut c: Cx<'_>, ctx: i32, index: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "enableVertexAttribArray", |_, gl| {
                    Ok(gl.enable_vertex_attrib_array(index as u32))
                })
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_vertex_attrib_pointer",
        |mut c: Cx<'_>,
         ctx: i32,
         index: i32,
         size: i32,
         ty: i32,
         normalized: i32,
         stride: i32,
         offset: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "vertexAttribPointer", |_, gl| {
                    gl.vertex_attrib_pointer(
                        index as u32,
                        size,
                        ty as u32,
                        normalized != 0,
                        stride,
                        offset,
                    );
                    Ok(())
                })
            })
        },
    )?;
    Ok(())
}

fn link_textures(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "gl_create_texture", |mut c: Cx<'_>, ctx: i32| {
        guard(&mut c, |c| {
            let texture = gl_call(c, ctx, "createTexture", |_, gl| Ok(gl.create_texture()))?;
            Ok(allocate(c, HostValue::GlTexture(texture)))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "gl_delete_texture", |mut c: Cx<'_>, ctx: i32, t: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "deleteTexture", |heap, gl| {
                if let Some(texture) = heap.cast_optional(handle(t))? {
                    gl.delete_texture(texture);
                }
                Ok(())
            })
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "gl_active_texture", |mut c: Cx<'_>, ctx: i32, unit: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "activeTexture", |_, gl| Ok(gl.active_texture(unit as u32)))
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_bind_texture",
        |mut c: Cx<'_>, ctx: i32, target: i32, t: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "bindTexture", |heap, gl| {
                    gl.bind_texture(target as u32, heap.cast_optional(handle(t))?);
                    Ok(())
                })
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_tex_parameteri",
        |mut c: Cx<'_>, ctx: i32, target: i32, pname: i32, param: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "texParameteri", |_, gl| {
                    Ok(gl.tex_parameteri(target as u32, pname as u32, param))
                })
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_tex_image_2d",
        |mut c: Cx<'_>,
         ret: i32,
         ctx: i32,
         target: i32,
         level: i32,
         internal_format: i32,
         width: i32,
         height: i32,
         border: i32,
         format: i32,
         ty: i32,
         ptr: i32,
         len: i32| {
            guard(&mut c, |c| {
                tex_image_2d(
                    c,
                    ret,
                    ctx,
                    target,
                    level,
                    internal_format,
                    width,
                    height,
                    border,
                    format,
                    ty,
                    ptr,
                    len,
                )
            })
        },
    )?;
    Ok(())
}

fn link_programs(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "gl_create_shader", |mut c: Cx<'_>, ctx: i32, ty: i32| {
        guard(&mut c, |c| {
            let shader = gl_call(c, ctx, "createShader", |_, gl| Ok(gl.create_shader(ty as u32)))?;
            Ok(match shader {
                Some(shader) => allocate(c, HostValue::GlShader(shader)),
                None => UNDEFINED as i32,
            })
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_shader_source",
        |mut c: Cx<'_>, ctx: i32, sh: i32, ptr: i32, len: i32| {
            guard(&mut c, |c| {
                gl_call_mem(c, ctx, "shaderSource", |heap, gl, data| {
                    let source = string_from_region(data, ptr as u32, len as u32)?;
                    gl.shader_source(heap.cast(handle(sh))?, source);
                    Ok(())
                })
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "gl_compile_shader", |mut c: Cx<'_>, ctx: i32, sh: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "compileShader", |heap, gl| {
                gl.compile_shader(heap.cast(handle(sh))?);
                Ok(())
            })
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_shader_parameter",
        |mut c: Cx<'_>, ctx: i32, sh: i32, pname: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "getShaderParameter", |heap, gl| {
                    Ok(gl.shader_parameter(heap.cast(handle(sh))?, pname as u32))
                })
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_shader_info_log",
        |mut c: Cx<'_>, ret: i32, ctx: i32, sh: i32| {
            guard(&mut c, |c| {
                let log = gl_call(c, ctx, "getShaderInfoLog", |heap, gl| {
                    Ok(gl.shader_info_log(heap.cast(handle(sh))?))
                })?;
                write_string(c, ret, log)
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "gl_delete_shader", |mut c: Cx<'_>, ctx: i32, sh: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "deleteShader", |heap, gl| {
                if let Some(shader) = heap.cast_optional(handle(sh))? {
                    gl.delete_shader(shader);
                }
                Ok(())
            })
        })
    })?;

    linker.func_wrap(IMPORT_MODULE, "gl_create_program", |mut c: Cx<'_>, ctx: i32| {
        guard(&mut c, |c| {
            let program = gl_call(c, ctx, "createProgram", |_, gl| Ok(gl.create_program()))?;
            Ok(allocate(c, HostValue::GlProgram(program)))
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_attach_shader",
        |mut c: Cx<'_>, ctx: i32, prog: i32, sh: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "attachShader", |heap, gl| {
                    gl.attach_shader(heap.cast(handle(prog))?, heap.cast(handle(sh))?);
                    Ok(())
                })
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "gl_link_program", |mut c: Cx<'_>, ctx: i32, prog: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "linkProgram", |heap, gl| {
                gl.link_program(heap.cast(handle(prog))?);
                Ok(())
            })
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_program_parameter",
        |mut c: Cx<'_>, ctx: i32, prog: i32, pname: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "getProgramParameter", |heap, gl| {
                    Ok(gl.program_parameter(heap.cast(handle(prog))?, pname as u32))
                })
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_program_info_log",
        |mut c: Cx<'_>, ret: i32, ctx: i32, prog: i32| {
            guard(&mut c, |c| {
                let log = gl_call(c, ctx, "getProgramInfoLog", |heap, gl| {
                    Ok(gl.program_info_log(heap.cast(handle(prog))?))
                })?;
                write_string(c, ret, log)
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "gl_use_program", |mut c: Cx<'_>, ctx: i32, prog: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "useProgram", |heap, gl| {
                gl.use_program(heap.cast_optional(handle(prog))?);
                Ok(())
            })
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "gl_delete_program", |mut c: Cx<'_>, ctx: i32, prog: i32| {
        guard(&mut c, |c| {
            gl_call(c, ctx, "deleteProgram", |heap, gl| {
                if let Some(program) = heap.cast_optional(handle(prog))? {
                    gl.delete_program(program);
                }
                Ok(())
            })
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_attrib_location",
        |mut c: Cx<'_>, ctx: i32, prog: i32, ptr: i32, len: i32| {
            guard(&mut c, |c| {
                gl_call_mem(c, ctx, "getAttribLocation", |heap, gl, data| {
                    let name = string_from_region(data, ptr as u32, len as u32)?;
                    Ok(gl.attrib_location(heap.cast(handle(prog))?, &name))
                })
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_uniform_location",
        |mut c: Cx<'_>, ctx: i32, prog: i32, ptr: i32, len: i32| {
            guard(&mut c, |c| {
                gl_call_mem(c, ctx, "getUniformLocation", |heap, gl, data| {
                    let name = string_from_region(data, ptr as u32, len as u32)?;
                    Ok(match gl.uniform_location(heap.cast(handle(prog))?, &name) {
                        Some(location) => {
                            heap.allocate(HostValue::GlUniformLocation(location)).raw() as i32
                        }
                        None => UNDEFINED as i32,
                    })
                })
            })
        },
    )?;
    Ok(())
}

fn uniform(
    c: &mut Cx<'_>,
    ctx: i32,
    call: &'static str,
    loc: i32,
    value: UniformValue,
) -> Result<(), BoundaryError> {
    gl_call(c, ctx, call, |heap, gl| {
        gl.uniform(heap.cast_optional(handle(loc))?, value);
        Ok(())
    })
}

fn uniform_matrix(
    c: &mut Cx<'_>,
    ctx: i32,
    loc: i32,
    transpose: i32,
    ptr: i32,
    len: i32,
    columns: usize,
) -> Result<(), BoundaryError> {
    let call = if columns == 4 { "uniformMatrix4fv" } else { "uniformMatrix3x4fv" };
    gl_call_mem(c, ctx, call, |heap, gl, data| {
        let location: Option<UniformLocation> = heap.cast_optional(handle(loc))?;
        let transpose = transpose != 0;
        f32_from_region(data, ptr as u32, len as u32)?.with_slice(data, |m| {
            if columns == 4 {
                gl.uniform_matrix4fv(location, transpose, m);
            } else {
                gl.uniform_matrix3x4fv(location, transpose, m);
            }
        })
    })
}

fn link_draws(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform1f",
        |mut c: Cx<'_>, ctx: i32, loc: i32, x: f32| {
            guard(&mut c, |c| uniform(c, ctx, "uniform1f", loc, UniformValue::Float(x)))
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform1i",
        |mut c: Cx<'_>, ctx: i32, loc: i32, x: i32| {
            guard(&mut c, |c| uniform(c, ctx, "uniform1i", loc, UniformValue::Int(x)))
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform3f",
        |mut c: Cx<'_>, ctx: i32, loc: i32, x: f32, y: f32, z: f32| {
            guard(&mut c, |c| {
                let value = UniformValue::Vec3(glam::Vec3::new(x, y, z));
                uniform(c, ctx, "uniform3f", loc, value)
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform_matrix3x4fv",
        |mut c: Cx<'_>, ctx: i32, loc: i32, transpose: i32, ptr: i32, len: i32| {
            guard(&mut c, |c| uniform_matrix(c, ctx, loc, transpose, ptr, len, 3))
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform_matrix4fv",
        |mut c: Cx<'_>, ctx: i32, loc: i32, transpose: i32, ptr: i32, len: i32| {
            guard(&mut c, |c| uniform_matrix(c, ctx, loc, transpose, ptr, len, 4))
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_draw_elements",
        |mut c: Cx<'_>, ctx: i32, mode: i32, count: i32, ty: i32, offset: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "drawElements", |_, gl| {
                    Ok(gl.draw_elements(mode as u32, count, ty as u32, offset))
                })
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_draw_arrays",
        |mut c: Cx<'_>, ctx: i32, mode: i32, first: i32, count: i32| {
            guard(&mut c, |c| {
                gl_call(c, ctx, "drawArrays", |_, gl| {
                    Ok(gl.draw_arrays(mode as u32, first, count))
                })
            })
        },
    )?;
    Ok(())
}

pub(super) fn link(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    link_state(linker)?;
    link_buffers(linker)?;
    link_textures(linker)?;
    link_programs(linker)?;
    link_draws(linker)?;
    Ok(())
}
