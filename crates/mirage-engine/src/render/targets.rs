//! Offscreen color buffers used in ping-pong fashion between passes.

/// Index tracking for a double-buffered pair.
///
/// The buffer at [`write`](Self::write) is the one being rendered to; after
/// [`swap`](Self::swap) it becomes the [`read`](Self::read) buffer for the
/// next stage.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PingPong {
    write: usize,
}

impl PingPong {
    /// Starts with buffer 0 as the write target.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn write(&self) -> usize {
        self.write
    }

    #[inline]
    pub fn read(&self) -> usize {
        1 - self.write
    }

    #[inline]
    pub fn swap(&mut self) {
        self.write = 1 - self.write;
    }

    pub fn reset(&mut self) {
        self.write = 0;
    }
}

/// A sampled + renderable color texture.
pub struct OffscreenTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: (u32, u32),
}

impl OffscreenTarget {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        format: wgpu::TextureFormat,
        (width, height): (u32, u32),
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            _texture: texture,
            view,
            format,
            size: (width.max(1), height.max(1)),
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

/// The two ping-pong buffers plus an allocation generation.
///
/// `generation` changes every time the pair is (re)allocated, so anything
/// holding bind groups over the old views knows to rebuild them.
pub struct PingPongTargets {
    buffers: [OffscreenTarget; 2],
    generation: u64,
}

impl PingPongTargets {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: (u32, u32),
        generation: u64,
    ) -> Self {
        log::debug!(
            "allocating ping-pong buffers {}x{} {format:?} (generation {generation})",
            size.0,
            size.1
        );
        Self {
            buffers: [
                OffscreenTarget::new(device, "mirage ping-pong buffer 0", format, size),
                OffscreenTarget::new(device, "mirage ping-pong buffer 1", format, size),
            ],
            generation,
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> &OffscreenTarget {
        &self.buffers[index & 1]
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn size(&self) -> (u32, u32) {
        self.buffers[0].size()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.buffers[0].format()
    }

    /// Returns `true` when the pair must be reallocated for `size`/`format`.
    pub fn is_stale(&self, size: (u32, u32), format: wgpu::TextureFormat) -> bool {
        self.size() != size || self.format() != format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_writing_buffer_zero() {
        let pp = PingPong::new();
        assert_eq!((pp.write(), pp.read()), (0, 1));
    }

    #[test]
    fn swap_alternates() {
        let mut pp = PingPong::new();
        pp.swap();
        assert_eq!((pp.write(), pp.read()), (1, 0));
        pp.swap();
        assert_eq!((pp.write(), pp.read()), (0, 1));
    }

    #[test]
    fn reset_returns_to_start() {
        let mut pp = PingPong::new();
        pp.swap();
        pp.reset();
        assert_eq!(pp, PingPong::new());
    }
}
