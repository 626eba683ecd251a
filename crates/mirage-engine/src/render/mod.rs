//! GPU rendering subsystem.
//!
//! The [`Composer`] renders a [`Scene`](crate::scene::Scene) into an offscreen
//! buffer, then runs an ordered list of fullscreen [`ShaderPass`]es that
//! ping-pong between two offscreen buffers. The last enabled pass writes the
//! frame's surface target.
//!
//! Convention:
//! - every pass is a fullscreen triangle; `uv` has a top-left origin, +Y down
//! - pass fragment sources are WGSL and define `fs_main`

pub mod chain;
mod composer;
mod ctx;
mod error;
mod fullscreen;
mod pass;
pub mod targets;
pub mod uniforms;

pub use composer::{Composer, ComposerConfig};
pub use ctx::{RenderCtx, RenderTarget};
pub use error::PassError;
pub use pass::ShaderPass;
pub use uniforms::{UniformKind, UniformSet, UniformValue};

pub(crate) use fullscreen::begin_color_pass;
