use crate::paint::Color;
use crate::scene::Scene;

use super::chain::{self, Output, Step};
use super::fullscreen::COPY_FRAGMENT;
use super::pass::{PassInput, PassResources};
use super::targets::PingPongTargets;
use super::uniforms::UniformValue;
use super::{begin_color_pass, PassError, RenderCtx, RenderTarget, ShaderPass};

const MIN_RESOLUTION_SCALE: f32 = 0.05;
const MAX_RESOLUTION_SCALE: f32 = 4.0;

/// Composer configuration.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Format of the two ping-pong buffers. Must be renderable and filterable.
    pub offscreen_format: wgpu::TextureFormat,

    /// Filter used when a pass samples its input.
    pub filter: wgpu::FilterMode,

    /// Offscreen resolution relative to the surface, clamped to `[0.05, 4.0]`.
    ///
    /// The final pass always covers the whole surface.
    pub resolution_scale: f32,

    /// Color the scene buffer is cleared to before the scene renders.
    pub clear: Color,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            offscreen_format: wgpu::TextureFormat::Rgba16Float,
            filter: wgpu::FilterMode::Linear,
            resolution_scale: 1.0,
            clear: Color::transparent(),
        }
    }
}

struct PassSlot {
    pass: ShaderPass,
    gpu: PassResources,
}

impl PassSlot {
    fn new(pass: ShaderPass) -> Self {
        Self {
            pass,
            gpu: PassResources::default(),
        }
    }
}

/// Renders a scene offscreen and chains fullscreen shader passes over it.
///
/// Frame flow:
/// 1. the scene renders into ping-pong buffer 0
/// 2. each enabled pass samples the previous buffer and writes the other one
/// 3. the last enabled pass writes the surface target
///
/// With no enabled pass, the scene buffer is copied to the surface.
///
/// GPU resources are created lazily on the first [`render`](Self::render), so
/// a composer can be built and configured before a device exists.
pub struct Composer {
    config: ComposerConfig,
    passes: Vec<PassSlot>,
    present: PassSlot,

    /// Size requested through `resize`, in physical pixels.
    size: Option<(u32, u32)>,

    targets: Option<PingPongTargets>,
    generation: u64,
    sampler: Option<wgpu::Sampler>,
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            passes: Vec::new(),
            present: PassSlot::new(ShaderPass::builtin("mirage present", COPY_FRAGMENT)),
            size: None,
            targets: None,
            generation: 0,
            sampler: None,
        }
    }

    /// Creates a composer running `passes` in order.
    pub fn with_passes(config: ComposerConfig, passes: impl IntoIterator<Item = ShaderPass>) -> Self {
        let mut composer = Self::new(config);
        for pass in passes {
            composer.add_pass(pass);
        }
        composer
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Appends a pass to the end of the chain and returns its index.
    pub fn add_pass(&mut self, pass: ShaderPass) -> usize {
        log::debug!("adding pass '{}' at {}", pass.label(), self.passes.len());
        self.passes.push(PassSlot::new(pass));
        self.passes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn pass(&self, index: usize) -> Option<&ShaderPass> {
        self.passes.get(index).map(|s| &s.pass)
    }

    /// Swaps the pass at `index` for `pass` and returns the old one.
    ///
    /// The slot's compiled pipeline and buffers are dropped and rebuilt for the
    /// new pass on the next render.
    pub fn replace_pass(&mut self, index: usize, pass: ShaderPass) -> Result<ShaderPass, PassError> {
        let slot = self.passes.get_mut(index).ok_or(PassError::NoSuchPass(index))?;
        log::debug!("replacing pass '{}' at {index} with '{}'", slot.pass.label(), pass.label());
        let old = std::mem::replace(slot, PassSlot::new(pass));
        Ok(old.pass)
    }

    pub fn passes(&self) -> impl Iterator<Item = &ShaderPass> {
        self.passes.iter().map(|s| &s.pass)
    }

    /// Finds the first pass with the given label.
    pub fn find(&self, label: &str) -> Option<usize> {
        self.passes.iter().position(|s| s.pass.label() == label)
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), PassError> {
        self.passes
            .get_mut(index)
            .ok_or(PassError::NoSuchPass(index))?
            .pass
            .set_enabled(enabled);
        Ok(())
    }

    pub fn set_uniform(
        &mut self,
        index: usize,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<(), PassError> {
        self.passes
            .get_mut(index)
            .ok_or(PassError::NoSuchPass(index))?
            .pass
            .set_uniform(name, value)
    }

    /// Records a new surface size (physical pixels).
    ///
    /// The ping-pong buffers are reallocated at the new resolution on the next
    /// render. A zero dimension (minimized window) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("composer: ignoring resize to {width}x{height}");
            return;
        }
        self.size = Some((width, height));
    }

    /// Size requested through [`resize`](Self::resize), if any.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    /// Renders `scene` through the pass chain into `target`.
    ///
    /// `target` is normally the frame's surface; its format is the format of
    /// the final pass. Without a prior [`resize`](Self::resize) the buffers
    /// are sized from `target`.
    pub fn render<S>(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, scene: &mut S)
    where
        S: Scene + ?Sized,
    {
        let max_dim = ctx.device.limits().max_texture_dimension_2d;
        let buffer_size = self.buffer_size(target.size(), max_dim);
        self.ensure_sampler(ctx);
        self.ensure_targets(ctx, buffer_size);

        let (Some(targets), Some(sampler)) = (self.targets.as_ref(), self.sampler.as_ref()) else {
            return;
        };

        let enabled: Vec<usize> = self
            .passes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.pass.is_enabled())
            .map(|(i, _)| i)
            .collect();

        for step in chain::plan(&enabled) {
            match step {
                Step::Scene { output } => {
                    let buf = targets.get(output);
                    {
                        let _clear = begin_color_pass(
                            &mut *target.encoder,
                            buf.view(),
                            "mirage scene clear",
                            wgpu::LoadOp::Clear(self.config.clear.to_wgpu()),
                        );
                    }
                    let mut scene_target =
                        RenderTarget::new(&mut *target.encoder, buf.view(), buf.format(), buf.size());
                    scene.render(ctx, &mut scene_target);
                }

                Step::Pass { index, input, output } => {
                    let slot = &mut self.passes[index];
                    let input = PassInput { targets, buffer: input, sampler };
                    match output {
                        Output::Offscreen(o) => {
                            let buf = targets.get(o);
                            let mut pass_target = RenderTarget::new(
                                &mut *target.encoder,
                                buf.view(),
                                buf.format(),
                                buf.size(),
                            );
                            slot.gpu.draw(ctx, &slot.pass, input, &mut pass_target);
                        }
                        Output::Screen => slot.gpu.draw(ctx, &slot.pass, input, target),
                    }
                }

                Step::Present { input } => {
                    let input = PassInput { targets, buffer: input, sampler };
                    self.present.gpu.draw(ctx, &self.present.pass, input, target);
                }
            }
        }
    }

    /// Ping-pong buffer size for a surface of `surface` pixels.
    fn buffer_size(&self, surface: (u32, u32), max_dim: u32) -> (u32, u32) {
        scaled_size(self.size.unwrap_or(surface), self.config.resolution_scale, max_dim)
    }

    fn ensure_sampler(&mut self, ctx: &RenderCtx<'_>) {
        if self.sampler.is_some() {
            return;
        }
        self.sampler = Some(ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("mirage pass sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: self.config.filter,
            min_filter: self.config.filter,
            ..Default::default()
        }));
    }

    fn ensure_targets(&mut self, ctx: &RenderCtx<'_>, size: (u32, u32)) {
        let format = self.config.offscreen_format;
        if self
            .targets
            .as_ref()
            .is_some_and(|t| !t.is_stale(size, format))
        {
            return;
        }

        self.generation += 1;
        self.targets = Some(PingPongTargets::new(ctx.device, format, size, self.generation));
    }
}

/// Scales `size`, rounding to whole pixels within `[1, max_dim]` per axis.
fn scaled_size((width, height): (u32, u32), scale: f32, max_dim: u32) -> (u32, u32) {
    let scale = if scale.is_finite() {
        scale.clamp(MIN_RESOLUTION_SCALE, MAX_RESOLUTION_SCALE)
    } else {
        1.0
    };
    let axis = |v: u32| ((v as f32 * scale).round() as u32).clamp(1, max_dim.max(1));
    (axis(width), axis(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSTHROUGH: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(input_texture, input_sampler, in.uv);
}
"#;

    fn pass(label: &str) -> ShaderPass {
        ShaderPass::new(label, PASSTHROUGH).unwrap()
    }

    fn composer() -> Composer {
        Composer::with_passes(
            ComposerConfig::default(),
            [
                pass("blur").with_uniform("radius", 2.0f32).unwrap(),
                pass("grade"),
                pass("vignette"),
            ],
        )
    }

    // ── pass list ─────────────────────────────────────────────────────────

    #[test]
    fn passes_keep_insertion_order() {
        let c = composer();
        let labels: Vec<&str> = c.passes().map(|p| p.label()).collect();
        assert_eq!(labels, ["blur", "grade", "vignette"]);
        assert_eq!(c.len(), 3);
        assert_eq!(c.find("grade"), Some(1));
        assert_eq!(c.find("missing"), None);
    }

    #[test]
    fn replace_pass_swaps_in_place() {
        let mut c = composer();
        let old = c
            .replace_pass(1, pass("sharpen").with_uniform("amount", 1.5f32).unwrap())
            .unwrap();
        assert_eq!(old.label(), "grade");

        let labels: Vec<&str> = c.passes().map(|p| p.label()).collect();
        assert_eq!(labels, ["blur", "sharpen", "vignette"]);
        assert_eq!(c.pass(1).and_then(|p| p.uniform("amount")), Some(UniformValue::Float(1.5)));
        assert!(c.passes[1].gpu.is_unbuilt());
    }

    #[test]
    fn replace_pass_out_of_range() {
        let mut c = composer();
        assert_eq!(c.replace_pass(3, pass("extra")).map(|_| ()), Err(PassError::NoSuchPass(3)));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn add_pass_returns_index() {
        let mut c = Composer::new(ComposerConfig::default());
        assert!(c.is_empty());
        assert_eq!(c.add_pass(pass("a")), 0);
        assert_eq!(c.add_pass(pass("b")), 1);
    }

    #[test]
    fn set_enabled_toggles_pass() {
        let mut c = composer();
        c.set_enabled(1, false).unwrap();
        assert!(!c.pass(1).unwrap().is_enabled());
        assert_eq!(c.set_enabled(7, true), Err(PassError::NoSuchPass(7)));
    }

    #[test]
    fn set_uniform_reaches_pass() {
        let mut c = composer();
        c.set_uniform(0, "radius", 4.0f32).unwrap();
        assert_eq!(c.pass(0).unwrap().uniform("radius"), Some(UniformValue::Float(4.0)));
        assert_eq!(
            c.set_uniform(1, "radius", 4.0f32),
            Err(PassError::UnknownUniform("radius".into()))
        );
        assert_eq!(c.set_uniform(9, "radius", 4.0f32), Err(PassError::NoSuchPass(9)));
    }

    // ── sizing ────────────────────────────────────────────────────────────

    #[test]
    fn resize_records_size() {
        let mut c = composer();
        assert_eq!(c.size(), None);
        c.resize(800, 600);
        assert_eq!(c.size(), Some((800, 600)));
    }

    #[test]
    fn resize_ignores_zero_dimensions() {
        let mut c = composer();
        c.resize(800, 600);
        c.resize(0, 600);
        c.resize(800, 0);
        assert_eq!(c.size(), Some((800, 600)));
    }

    #[test]
    fn buffer_size_falls_back_to_surface() {
        let mut c = composer();
        assert_eq!(c.buffer_size((1024, 768), 8192), (1024, 768));
        c.resize(640, 480);
        assert_eq!(c.buffer_size((1024, 768), 8192), (640, 480));
    }

    #[test]
    fn buffer_size_applies_resolution_scale() {
        let c = Composer::new(ComposerConfig {
            resolution_scale: 0.5,
            ..Default::default()
        });
        assert_eq!(c.buffer_size((1001, 600), 8192), (501, 300));
    }

    #[test]
    fn scaled_size_clamps() {
        assert_eq!(scaled_size((10, 10), 0.0, 8192), (1, 1));
        assert_eq!(scaled_size((4000, 100), 4.0, 8192), (8192, 400));
        assert_eq!(scaled_size((300, 200), f32::NAN, 8192), (300, 200));
        assert_eq!(scaled_size((300, 200), 100.0, 8192), (1200, 800));
    }
}
