//! The demo's pass chain.

use mirage_engine::render::{PassError, ShaderPass};

pub const CHROMATIC: &str = "chromatic";
pub const SCANLINES: &str = "scanlines";
pub const VIGNETTE: &str = "vignette";

pub fn build() -> Result<Vec<ShaderPass>, PassError> {
    Ok(vec![
        ShaderPass::new(CHROMATIC, include_str!("../shaders/chromatic.wgsl"))?
            .with_uniform("amount", 0.012f32)?,
        ShaderPass::new(SCANLINES, include_str!("../shaders/scanlines.wgsl"))?
            .with_uniform("spacing", 3.0f32)?
            .with_uniform("speed", 0.5f32)?
            .with_uniform("strength", 0.18f32)?,
        ShaderPass::new(VIGNETTE, include_str!("../shaders/vignette.wgsl"))?
            .with_uniform("radius", 0.75f32)?
            .with_uniform("softness", 0.45f32)?
            .with_uniform("tint", [0.02f32, 0.0, 0.05])?,
    ])
}
