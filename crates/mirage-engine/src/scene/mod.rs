//! Scene seam.
//!
//! The composer does not know what a scene is made of: meshes, cameras and
//! their pipelines belong to whoever implements [`Scene`]. It only provides
//! the offscreen buffer to draw into, already cleared to
//! [`ComposerConfig::clear`](crate::render::ComposerConfig::clear).

use crate::paint::Color;
use crate::render::{begin_color_pass, RenderCtx, RenderTarget};

/// Something that can draw itself into a render target.
pub trait Scene {
    /// Records draw commands into `target`.
    ///
    /// Render passes begun here should load (not clear) the color attachment
    /// unless the scene wants to replace the composer's clear color.
    fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>);
}

impl<F> Scene for F
where
    F: FnMut(&RenderCtx<'_>, &mut RenderTarget<'_>),
{
    fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        self(ctx, target)
    }
}

/// A scene that fills the target with a single color.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearScene(pub Color);

impl Scene for ClearScene {
    fn render(&mut self, _ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        let _rpass = begin_color_pass(
            &mut *target.encoder,
            target.color_view,
            "mirage clear scene",
            wgpu::LoadOp::Clear(self.0.to_wgpu()),
        );
    }
}
