use std::fmt;

use super::uniforms::UniformKind;

/// Error raised while configuring shader passes.
///
/// These are caller mistakes detected before anything reaches the GPU. WGSL
/// compile errors are reported by wgpu itself.
#[derive(Debug, Clone, PartialEq)]
pub enum PassError {
    /// Uniform name is not a usable WGSL identifier.
    InvalidUniformName(String),
    /// A uniform with this name was already declared on the pass.
    DuplicateUniform(String),
    /// `set` was called for a uniform the pass never declared.
    UnknownUniform(String),
    /// A uniform's type is fixed once declared.
    UniformTypeMismatch {
        name: String,
        expected: UniformKind,
        found: UniformKind,
    },
    /// Fragment source does not define `fs_main`.
    MissingEntryPoint { pass: String },
    /// Pass index out of range.
    NoSuchPass(usize),
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUniformName(name) => {
                write!(f, "invalid uniform name '{name}': expected a WGSL identifier")
            }
            Self::DuplicateUniform(name) => write!(f, "uniform '{name}' declared twice"),
            Self::UnknownUniform(name) => write!(f, "unknown uniform '{name}'"),
            Self::UniformTypeMismatch { name, expected, found } => write!(
                f,
                "uniform '{name}' is {}, cannot assign {}",
                expected.wgsl_type(),
                found.wgsl_type()
            ),
            Self::MissingEntryPoint { pass } => {
                write!(f, "pass '{pass}' does not define `fn fs_main`")
            }
            Self::NoSuchPass(index) => write!(f, "no pass at index {index}"),
        }
    }
}

impl std::error::Error for PassError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_names_both_types() {
        let err = PassError::UniformTypeMismatch {
            name: "strength".into(),
            expected: UniformKind::Float,
            found: UniformKind::Vec3,
        };
        assert_eq!(err.to_string(), "uniform 'strength' is f32, cannot assign vec3<f32>");
    }

    #[test]
    fn converts_into_anyhow() {
        let err: anyhow::Error = PassError::NoSuchPass(3).into();
        assert_eq!(err.to_string(), "no pass at index 3");
    }
}
