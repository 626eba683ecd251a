use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use super::fullscreen::{
    BINDING_GLOBALS, BINDING_INPUT_SAMPLER, BINDING_INPUT_TEXTURE, BINDING_PARAMS, PASS_PRELUDE,
};
use super::targets::PingPongTargets;
use super::uniforms::{UniformSet, UniformValue};
use super::{begin_color_pass, PassError, RenderCtx, RenderTarget};

const ENTRY_POINT: &str = "fs_main";
const PARAMS_STRUCT: &str = "Params";

/// One fullscreen shader stage.
///
/// `fragment` is WGSL defining `fn fs_main(in: VertexOutput) -> @location(0) vec4<f32>`.
/// It is compiled together with a generated prelude that declares:
/// - `input_texture` / `input_sampler`: the previous stage's image
/// - `globals`: `resolution` (output size in pixels), `time` (seconds), `frame`
/// - `params`: a struct with this pass's uniforms, when it declares any
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPass {
    label: String,
    fragment: String,
    uniforms: UniformSet,
    enabled: bool,
}

impl ShaderPass {
    /// Creates an enabled pass with no uniforms.
    pub fn new(label: impl Into<String>, fragment: impl Into<String>) -> Result<Self, PassError> {
        let label = label.into();
        let fragment = fragment.into();
        if !defines_fn(&fragment, ENTRY_POINT) {
            return Err(PassError::MissingEntryPoint { pass: label });
        }
        Ok(Self::builtin(label, fragment))
    }

    /// Constructor for sources known to be well formed.
    pub(crate) fn builtin(label: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            fragment: fragment.into(),
            uniforms: UniformSet::new(),
            enabled: true,
        }
    }

    /// Declares a uniform, readable in WGSL as `params.<name>`.
    pub fn with_uniform(
        mut self,
        name: impl Into<String>,
        value: impl Into<UniformValue>,
    ) -> Result<Self, PassError> {
        self.uniforms.insert(name, value)?;
        Ok(self)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn uniforms(&self) -> &UniformSet {
        &self.uniforms
    }

    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name)
    }

    /// Updates a declared uniform; the new value is uploaded on the next render.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<(), PassError> {
        self.uniforms.set(name, value)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabled passes are skipped; the chain stays connected around them.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Full WGSL module: prelude, optional params block, then the fragment source.
    pub fn wgsl_source(&self) -> String {
        let mut src = String::from(PASS_PRELUDE);
        if !self.uniforms.is_empty() {
            src.push('\n');
            src.push_str(&self.uniforms.wgsl_struct(PARAMS_STRUCT));
            src.push_str(&format!(
                "@group(0) @binding({BINDING_PARAMS}) var<uniform> params: {PARAMS_STRUCT};\n"
            ));
        }
        src.push('\n');
        src.push_str(&self.fragment);
        src
    }
}

/// Returns `true` if `source` contains `fn <name>` as two consecutive tokens
/// outside of comments.
fn defines_fn(source: &str, name: &str) -> bool {
    let code = strip_comments(source);
    let mut tokens = code
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty());

    let mut prev_fn = false;
    tokens.any(|t| {
        let hit = prev_fn && t == name;
        prev_fn = t == "fn";
        hit
    })
}

/// Replaces `//` line comments and nested `/* */` block comments with whitespace.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut depth = 0usize;

    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('/', Some('*')) => {
                chars.next();
                depth += 1;
                out.push(' ');
            }
            ('*', Some('/')) if depth > 0 => {
                chars.next();
                depth -= 1;
            }
            ('/', Some('/')) if depth == 0 => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ if depth > 0 => {}
            _ => out.push(c),
        }
    }
    out
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct GlobalsUniform {
    resolution: [f32; 2],
    time: f32,
    frame: u32,
}

/// Input of a pass draw: which ping-pong buffer to sample, and with what.
pub(crate) struct PassInput<'a> {
    pub targets: &'a PingPongTargets,
    pub buffer: usize,
    pub sampler: &'a wgpu::Sampler,
}

/// GPU state of a pass, built lazily on first draw.
#[derive(Default)]
pub(crate) struct PassResources {
    shader: Option<wgpu::ShaderModule>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    pipeline_layout: Option<wgpu::PipelineLayout>,

    /// The final pass targets the surface format, others the offscreen format.
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,

    globals_ubo: Option<wgpu::Buffer>,
    params_ubo: Option<wgpu::Buffer>,

    /// One bind group per input buffer, valid for `bind_generation`.
    bind_groups: [Option<wgpu::BindGroup>; 2],
    bind_generation: Option<u64>,
}

impl PassResources {
    #[cfg(test)]
    pub(crate) fn is_unbuilt(&self) -> bool {
        self.shader.is_none() && self.params_ubo.is_none() && self.pipelines.is_empty()
    }

    /// Draws `pass` as a fullscreen triangle into `target`.
    pub(crate) fn draw(
        &mut self,
        ctx: &RenderCtx<'_>,
        pass: &ShaderPass,
        input: PassInput<'_>,
        target: &mut RenderTarget<'_>,
    ) {
        self.ensure_layouts(ctx, pass);
        self.ensure_pipeline(ctx, pass, target.format);
        self.ensure_buffers(ctx, pass);
        self.ensure_bind_group(ctx, pass, &input);
        self.write_uniforms(ctx, pass, target.size());

        let Some(pipeline) = self.pipelines.get(&target.format) else { return };
        let Some(bind_group) = self.bind_groups[input.buffer & 1].as_ref() else { return };

        let mut rpass = begin_color_pass(
            &mut *target.encoder,
            target.color_view,
            pass.label(),
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        );
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }

    fn ensure_layouts(&mut self, ctx: &RenderCtx<'_>, pass: &ShaderPass) {
        if self.shader.is_some() && self.pipeline_layout.is_some() {
            return;
        }

        log::debug!("compiling pass '{}'", pass.label());
        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(pass.label()),
            source: wgpu::ShaderSource::Wgsl(pass.wgsl_source().into()),
        });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: BINDING_INPUT_TEXTURE,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: BINDING_INPUT_SAMPLER,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: BINDING_GLOBALS,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<GlobalsUniform>() as u64,
                    ),
                },
                count: None,
            },
        ];
        if !pass.uniforms().is_empty() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: BINDING_PARAMS,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        let bind_group_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("mirage pass bgl"),
                entries: &entries,
            });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("mirage pass pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        self.shader = Some(shader);
        self.bind_group_layout = Some(bind_group_layout);
        self.pipeline_layout = Some(pipeline_layout);
        self.pipelines.clear();
        self.bind_groups = [None, None];
        self.bind_generation = None;
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>, pass: &ShaderPass, format: wgpu::TextureFormat) {
        if self.pipelines.contains_key(&format) {
            return;
        }
        let (Some(shader), Some(layout)) = (self.shader.as_ref(), self.pipeline_layout.as_ref()) else {
            return;
        };

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(pass.label()),
            layout: Some(layout),

            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },

            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some(ENTRY_POINT),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("pass '{}': pipeline for {format:?}", pass.label());
        self.pipelines.insert(format, pipeline);
    }

    fn ensure_buffers(&mut self, ctx: &RenderCtx<'_>, pass: &ShaderPass) {
        if self.globals_ubo.is_none() {
            self.globals_ubo = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mirage pass globals ubo"),
                size: std::mem::size_of::<GlobalsUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        let params_size = pass.uniforms().layout().size as u64;
        if self.params_ubo.is_none() && params_size > 0 {
            self.params_ubo = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mirage pass params ubo"),
                size: params_size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
    }

    fn ensure_bind_group(&mut self, ctx: &RenderCtx<'_>, pass: &ShaderPass, input: &PassInput<'_>) {
        if self.bind_generation != Some(input.targets.generation()) {
            self.bind_groups = [None, None];
            self.bind_generation = Some(input.targets.generation());
        }

        let slot = input.buffer & 1;
        if self.bind_groups[slot].is_some() {
            return;
        }
        let (Some(bgl), Some(globals)) = (self.bind_group_layout.as_ref(), self.globals_ubo.as_ref())
        else {
            return;
        };

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: BINDING_INPUT_TEXTURE,
                resource: wgpu::BindingResource::TextureView(input.targets.get(slot).view()),
            },
            wgpu::BindGroupEntry {
                binding: BINDING_INPUT_SAMPLER,
                resource: wgpu::BindingResource::Sampler(input.sampler),
            },
            wgpu::BindGroupEntry {
                binding: BINDING_GLOBALS,
                resource: globals.as_entire_binding(),
            },
        ];
        if let Some(params) = self.params_ubo.as_ref() {
            entries.push(wgpu::BindGroupEntry {
                binding: BINDING_PARAMS,
                resource: params.as_entire_binding(),
            });
        }

        self.bind_groups[slot] = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(pass.label()),
            layout: bgl,
            entries: &entries,
        }));
    }

    fn write_uniforms(&self, ctx: &RenderCtx<'_>, pass: &ShaderPass, (width, height): (u32, u32)) {
        if let Some(ubo) = self.globals_ubo.as_ref() {
            let g = GlobalsUniform {
                resolution: [width as f32, height as f32],
                time: ctx.time.elapsed,
                frame: ctx.time.frame_index as u32,
            };
            ctx.queue.write_buffer(ubo, 0, bytemuck::bytes_of(&g));
        }

        if let Some(ubo) = self.params_ubo.as_ref() {
            ctx.queue.write_buffer(ubo, 0, &pass.uniforms().write_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVERT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = textureSample(input_texture, input_sampler, in.uv);
    return vec4<f32>(1.0 - c.rgb, c.a);
}
"#;

    #[test]
    fn detects_entry_point() {
        assert!(defines_fn(INVERT, "fs_main"));
        assert!(defines_fn("fn  fs_main(){}", "fs_main"));
        assert!(!defines_fn("fn fs_main_alt() {}", "fs_main"));
        assert!(!defines_fn("let fs_main = 1;", "fs_main"));
    }

    #[test]
    fn commented_entry_point_does_not_count() {
        assert!(!defines_fn("// fn fs_main() {}", "fs_main"));
        assert!(!defines_fn("/* fn fs_main() {} */", "fs_main"));
        assert!(!defines_fn("/* outer /* fn fs_main */ still comment fn fs_main */", "fs_main"));
        assert!(defines_fn("// helper\nfn/* gap */fs_main() {}", "fs_main"));

        let err = ShaderPass::new("commented", "// fn fs_main() {}").unwrap_err();
        assert_eq!(err, PassError::MissingEntryPoint { pass: "commented".into() });
    }

    #[test]
    fn new_requires_fs_main() {
        let err = ShaderPass::new("broken", "fn main() {}").unwrap_err();
        assert_eq!(err, PassError::MissingEntryPoint { pass: "broken".into() });
    }

    #[test]
    fn new_pass_is_enabled_without_uniforms() {
        let pass = ShaderPass::new("invert", INVERT).unwrap();
        assert!(pass.is_enabled());
        assert!(pass.uniforms().is_empty());
        assert_eq!(pass.label(), "invert");
    }

    #[test]
    fn source_without_uniforms_has_no_params_binding() {
        let src = ShaderPass::new("invert", INVERT).unwrap().wgsl_source();
        assert!(src.starts_with(PASS_PRELUDE));
        assert!(!src.contains("var<uniform> params"));
        assert!(src.ends_with(INVERT));
    }

    #[test]
    fn source_with_uniforms_declares_params() {
        let src = ShaderPass::new("invert", INVERT)
            .unwrap()
            .with_uniform("amount", 0.5f32)
            .unwrap()
            .wgsl_source();
        assert!(src.contains("struct Params {\n    amount: f32,\n};"));
        assert!(src.contains("@group(0) @binding(3) var<uniform> params: Params;"));
    }

    #[test]
    fn label_stays_out_of_the_source() {
        let src = ShaderPass::new("a\nb c", INVERT).unwrap().wgsl_source();
        assert!(!src.contains("b c"));
        assert!(src.ends_with(INVERT));
    }

    #[test]
    fn set_uniform_goes_through_type_checks() {
        let mut pass = ShaderPass::new("invert", INVERT)
            .unwrap()
            .with_uniform("amount", 0.5f32)
            .unwrap();
        pass.set_uniform("amount", 1.0f32).unwrap();
        assert_eq!(pass.uniform("amount"), Some(UniformValue::Float(1.0)));
        assert!(pass.set_uniform("amount", 1u32).is_err());
    }

    #[test]
    fn globals_uniform_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<GlobalsUniform>(), 16);
    }
}
