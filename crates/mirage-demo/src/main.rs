//! Mirage demo: a spinning triangle rendered offscreen, then chromatic
//! aberration, scanlines and a vignette applied as chained shader passes.
//!
//! Keys: `1`-`3` toggle a pass, `Escape` quits.

mod passes;
mod scene;

use anyhow::Result;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use mirage_engine::core::{App, AppControl, FrameCtx};
use mirage_engine::device::GpuInit;
use mirage_engine::logging::{init_logging, LoggingConfig};
use mirage_engine::paint::Color;
use mirage_engine::render::{Composer, ComposerConfig};
use mirage_engine::window::{Runtime, RuntimeConfig};

use crate::scene::SpinningTriangle;

struct DemoApp {
    composer: Composer,
    scene: SpinningTriangle,
}

impl DemoApp {
    fn new() -> Result<Self> {
        let config = ComposerConfig {
            clear: Color::from_srgb_u8(18, 18, 24, 255),
            ..Default::default()
        };

        Ok(Self {
            composer: Composer::with_passes(config, passes::build()?),
            scene: SpinningTriangle::new(),
        })
    }

    fn toggle(&mut self, index: usize) {
        let Some(enabled) = self.composer.pass(index).map(|p| p.is_enabled()) else {
            return;
        };
        match self.composer.set_enabled(index, !enabled) {
            Ok(()) => {
                let label = self.composer.pass(index).map_or("?", |p| p.label());
                log::info!("pass '{label}' {}", if enabled { "disabled" } else { "enabled" });
            }
            Err(e) => log::warn!("{e}"),
        }
    }
}

impl App for DemoApp {
    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return AppControl::Continue;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }

        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => return AppControl::Exit,
            PhysicalKey::Code(KeyCode::Digit1) => self.toggle(0),
            PhysicalKey::Code(KeyCode::Digit2) => self.toggle(1),
            PhysicalKey::Code(KeyCode::Digit3) => self.toggle(2),
            _ => {}
        }
        AppControl::Continue
    }

    fn on_resize(&mut self, _window_id: WindowId, width: u32, height: u32) {
        self.composer.resize(width, height);
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.time.frame_index == 0
            && !ctx.gpu.supports_offscreen_format(self.composer.config().offscreen_format)
        {
            log::error!(
                "offscreen format {:?} is not renderable + sampleable on this adapter",
                self.composer.config().offscreen_format
            );
            return AppControl::Exit;
        }

        ctx.compose(&mut self.composer, &mut self.scene)
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let app = DemoApp::new()?;
    let config = RuntimeConfig {
        title: "mirage demo".to_string(),
        initial_size: LogicalSize::new(1024.0, 640.0),
    };

    Runtime::run(config, GpuInit::default(), app)
}
