use winit::window::{Window, WindowId};

use crate::device::{Gpu, SurfaceErrorAction};
use crate::paint::Color;
use crate::render::{begin_color_pass, Composer, RenderCtx, RenderTarget};
use crate::scene::Scene;
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    /// Returns the drawable size as `(width, height)` in physical pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Clears the surface with `clear`, calls `draw` with a ready [`RenderCtx`] and
    /// [`RenderTarget`], then presents the frame.
    ///
    /// Surface errors are handled here: the frame is skipped, and
    /// [`AppControl::Exit`] is returned only for fatal errors.
    pub fn render<F>(&mut self, clear: Color, draw: F) -> AppControl
    where
        F: FnOnce(&RenderCtx<'_>, &mut RenderTarget<'_>),
    {
        self.render_frame(Some(clear), draw)
    }

    /// Renders `scene` through `composer` and presents the result.
    ///
    /// The composer's final pass covers the whole surface, so no separate
    /// surface clear is recorded.
    pub fn compose<S>(&mut self, composer: &mut Composer, scene: &mut S) -> AppControl
    where
        S: Scene + ?Sized,
    {
        self.render_frame(None, |rctx, target| composer.render(rctx, target, scene))
    }

    fn render_frame<F>(&mut self, clear: Option<Color>, draw: F) -> AppControl
    where
        F: FnOnce(&RenderCtx<'_>, &mut RenderTarget<'_>),
    {
        let size = self.gpu.size();
        if size.width == 0 || size.height == 0 {
            // Minimized; nothing to present.
            return AppControl::Continue;
        }

        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => AppControl::Exit,
                    _ => AppControl::Continue,
                };
            }
        };

        if let Some(load) = surface_load_op(clear) {
            let _clear = begin_color_pass(&mut frame.encoder, &frame.view, "mirage surface clear", load);
        }

        let rctx = RenderCtx::new(
            self.gpu.device(),
            self.gpu.queue(),
            self.gpu.surface_format(),
            self.time,
        );

        // RenderTarget borrows frame.encoder; dropped before submit() takes frame.
        {
            let mut target = RenderTarget::new(
                &mut frame.encoder,
                &frame.view,
                self.gpu.surface_format(),
                (size.width, size.height),
            );
            draw(&rctx, &mut target);
        }

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);

        AppControl::Continue
    }
}

/// Load op of the up-front surface clear, if one is needed.
fn surface_load_op(clear: Option<Color>) -> Option<wgpu::LoadOp<wgpu::Color>> {
    clear.map(|c| wgpu::LoadOp::Clear(c.to_wgpu()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_clear_records_a_clear() {
        let load = surface_load_op(Some(Color::black()));
        assert!(matches!(load, Some(wgpu::LoadOp::Clear(c)) if c == Color::black().to_wgpu()));
    }

    #[test]
    fn composed_frames_skip_the_surface_clear() {
        assert!(surface_load_op(None).is_none());
    }
}
