//! Color model shared by scenes, clears and pass uniforms.

pub mod color;

pub use color::Color;
