//! Fullscreen-triangle plumbing shared by every pass.

/// WGSL prepended to every pass fragment source.
///
/// The vertex stage emits one oversized triangle covering the viewport; no
/// vertex buffers are bound.
pub(crate) const PASS_PRELUDE: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

struct Globals {
    resolution: vec2<f32>,
    time: f32,
    frame: u32,
};

@group(0) @binding(0) var input_texture: texture_2d<f32>;
@group(0) @binding(1) var input_sampler: sampler;
@group(0) @binding(2) var<uniform> globals: Globals;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var out: VertexOutput;
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    out.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(x, 1.0 - y);
    return out;
}
"#;

/// Fragment source of the built-in pass that presents a buffer unchanged.
pub(crate) const COPY_FRAGMENT: &str = include_str!("shaders/copy.wgsl");

/// Bind group slots fixed by the prelude.
pub(crate) const BINDING_INPUT_TEXTURE: u32 = 0;
pub(crate) const BINDING_INPUT_SAMPLER: u32 = 1;
pub(crate) const BINDING_GLOBALS: u32 = 2;
pub(crate) const BINDING_PARAMS: u32 = 3;

/// Begins a render pass with a single color attachment and no depth.
pub(crate) fn begin_color_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &'e wgpu::TextureView,
    label: &str,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}
