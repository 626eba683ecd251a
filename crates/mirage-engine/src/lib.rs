//! Mirage engine crate.
//!
//! Renders a scene into an offscreen buffer and chains fullscreen WGSL shader
//! passes over it, presenting the last pass to a window. Owns the platform +
//! GPU runtime pieces the composer needs (window loop, device, frame timing).

pub mod core;
pub mod device;
pub mod logging;
pub mod paint;
pub mod render;
pub mod scene;
pub mod time;
pub mod window;
