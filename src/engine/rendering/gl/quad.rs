//! ### English
//! Full-screen textured quad used by the presenting context.
//!
//! ### 中文
//! 呈现上下文使用的全屏纹理四边形。

use std::sync::Arc;

use glow::HasContext as _;

use crate::engine::error::{HarnessError, HarnessResult};

const DESKTOP_HEADER: &str = "#version 330 core\n";
const GLES_HEADER: &str = "#version 300 es\nprecision mediump float;\n";

const VERTEX_SHADER: &str = r#"layout(location = 0) in vec2 position;
out vec2 uv;
void main() {
    uv = position * 0.5 + 0.5;
    gl_Position = vec4(position, 0.0, 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"uniform sampler2D tex;
in vec2 uv;
out vec4 color;
void main() {
    color = texture(tex, uv);
}
"#;

/// Triangle-strip corners.
const QUAD: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

pub(super) struct QuadRenderer {
    program: glow::NativeProgram,
    vertex_array: glow::NativeVertexArray,
    vertex_buffer: glow::NativeBuffer,
}

impl QuadRenderer {
    pub(super) fn new(glow: &Arc<glow::Context>) -> HarnessResult<Self> {
        unsafe {
            let program = link_program(glow)?;
            glow.use_program(Some(program));
            let sampler = glow.get_uniform_location(program, "tex");
            glow.uniform_1_i32(sampler.as_ref(), 0);
            glow.use_program(None);

            let vertex_array = glow.create_vertex_array().map_err(setup)?;
            let vertex_buffer = glow.create_buffer().map_err(setup)?;
            glow.bind_vertex_array(Some(vertex_array));
            glow.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));
            let bytes: Vec<u8> = QUAD.iter().flat_map(|v| v.to_ne_bytes()).collect();
            glow.buffer_data_u8_slice(glow::ARRAY_BUFFER, &bytes, glow::STATIC_DRAW);
            glow.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 0, 0);
            glow.enable_vertex_attrib_array(0);
            glow.bind_vertex_array(None);
            glow.bind_buffer(glow::ARRAY_BUFFER, None);

            Ok(Self {
                program,
                vertex_array,
                vertex_buffer,
            })
        }
    }

    /// ### English
    /// Draws `texture` over the current viewport.
    ///
    /// ### 中文
    /// 在当前 viewport 上绘制 `texture`。
    pub(super) fn draw(&self, glow: &Arc<glow::Context>, texture: u32) -> HarnessResult<()> {
        let texture = std::num::NonZeroU32::new(texture)
            .map(glow::NativeTexture)
            .ok_or_else(|| HarnessError::Backend("cannot draw texture 0".to_string()))?;
        unsafe {
            glow.use_program(Some(self.program));
            glow.active_texture(glow::TEXTURE0);
            glow.bind_texture(glow::TEXTURE_2D, Some(texture));
            glow.bind_vertex_array(Some(self.vertex_array));
            glow.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
            glow.bind_vertex_array(None);
            glow.bind_texture(glow::TEXTURE_2D, None);
            glow.use_program(None);
        }
        Ok(())
    }

    pub(super) fn delete(&self, glow: &Arc<glow::Context>) {
        unsafe {
            glow.delete_buffer(self.vertex_buffer);
            glow.delete_vertex_array(self.vertex_array);
            glow.delete_program(self.program);
        }
    }
}

/// ### English
/// Prefixes `body` with the `#version` line the context compiles (GLSL 330 core or GLSL ES 300).
///
/// ### 中文
/// 为 `body` 加上当前上下文可编译的 `#version` 行（GLSL 330 core 或 GLSL ES 300）。
fn shader_source(is_gles: bool, body: &str) -> String {
    let header = if is_gles { GLES_HEADER } else { DESKTOP_HEADER };
    format!("{header}{body}")
}

fn setup(err: String) -> HarnessError {
    HarnessError::Setup(err)
}

unsafe fn compile(
    glow: &glow::Context,
    kind: u32,
    source: &str,
) -> HarnessResult<glow::NativeShader> {
    unsafe {
        let shader = glow.create_shader(kind).map_err(setup)?;
        glow.shader_source(shader, source);
        glow.compile_shader(shader);
        if !glow.get_shader_compile_status(shader) {
            let log = glow.get_shader_info_log(shader);
            glow.delete_shader(shader);
            return Err(HarnessError::Setup(format!("shader compile failed: {log}")));
        }
        Ok(shader)
    }
}

unsafe fn link_program(glow: &glow::Context) -> HarnessResult<glow::NativeProgram> {
    unsafe {
        let is_gles = glow.version().is_embedded;
        let vertex = compile(
            glow,
            glow::VERTEX_SHADER,
            &shader_source(is_gles, VERTEX_SHADER),
        )?;
        let fragment = match compile(
            glow,
            glow::FRAGMENT_SHADER,
            &shader_source(is_gles, FRAGMENT_SHADER),
        ) {
            Ok(shader) => shader,
            Err(err) => {
                glow.delete_shader(vertex);
                return Err(err);
            }
        };

        let program = glow.create_program().map_err(setup)?;
        glow.attach_shader(program, vertex);
        glow.attach_shader(program, fragment);
        glow.link_program(program);
        glow.detach_shader(program, vertex);
        glow.detach_shader(program, fragment);
        glow.delete_shader(vertex);
        glow.delete_shader(fragment);

        if !glow.get_program_link_status(program) {
            let log = glow.get_program_info_log(program);
            glow.delete_program(program);
            return Err(HarnessError::Setup(format!("program link failed: {log}")));
        }
        Ok(program)
    }
}
