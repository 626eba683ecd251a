use crate::time::FrameTime;

/// Renderer-facing context (device/queue + surface format + frame timing).
///
/// This is intentionally small and stable.
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub surface_format: wgpu::TextureFormat,
    pub time: FrameTime,
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        time: FrameTime,
    ) -> Self {
        Self {
            device,
            queue,
            surface_format,
            time,
        }
    }
}

/// Target for drawing: encoder + color view, with the view's format and size.
///
/// The same type describes the surface and the composer's offscreen buffers,
/// so scenes and passes never need to know which one they are writing.
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(
        encoder: &'a mut wgpu::CommandEncoder,
        color_view: &'a wgpu::TextureView,
        format: wgpu::TextureFormat,
        (width, height): (u32, u32),
    ) -> Self {
        Self {
            encoder,
            color_view,
            format,
            width,
            height,
        }
    }

    /// Returns the target size in physical pixels.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Aspect ratio (width / height); 1.0 for a degenerate target.
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
