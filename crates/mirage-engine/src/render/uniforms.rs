//! Per-pass uniform values and their WGSL uniform-buffer layout.
//!
//! A pass declares its uniforms once as an ordered name/value list. The list
//! becomes a generated `struct Params` in the pass shader, and the values are
//! packed into a byte buffer following the WGSL uniform address-space rules.

use std::fmt::Write as _;

use crate::paint::Color;

use super::PassError;

/// Uniform buffer sizes are rounded to this many bytes.
const BLOCK_ALIGN: u32 = 16;

const WGSL_KEYWORDS: &[&str] = &[
    "alias", "break", "case", "const", "const_assert", "continue", "continuing", "default",
    "diagnostic", "discard", "else", "enable", "false", "fn", "for", "if", "let", "loop",
    "override", "requires", "return", "struct", "switch", "true", "var", "while",
];

/// Words WGSL reserves for future use; they are not valid identifiers either.
const WGSL_RESERVED: &[&str] = &[
    "NULL", "Self", "abstract", "active", "alignas", "alignof", "as", "asm", "asm_fragment",
    "async", "attribute", "auto", "await", "become", "binding_array", "cast", "catch", "class",
    "co_await", "co_return", "co_yield", "coherent", "column_major", "common", "compile",
    "compile_fragment", "concept", "const_cast", "consteval", "constexpr", "constinit", "crate",
    "debugger", "decltype", "delete", "demote", "demote_to_helper", "do", "dynamic_cast", "enum",
    "explicit", "export", "extends", "extern", "external", "fallthrough", "filter", "final",
    "finally", "friend", "from", "fxgroup", "get", "goto", "groupshared", "highp", "impl",
    "implements", "import", "inline", "instanceof", "interface", "layout", "lowp", "macro",
    "macro_rules", "match", "mediump", "meta", "mod", "module", "move", "mut", "mutable",
    "namespace", "new", "nil", "noexcept", "noinline", "nointerpolation", "non_coherent",
    "noncoherent", "noperspective", "null", "nullptr", "of", "operator", "package", "packoffset",
    "partition", "pass", "patch", "pixelfragment", "precise", "precision", "premerge", "priv",
    "protected", "pub", "public", "readonly", "ref", "regardless", "register",
    "reinterpret_cast", "require", "resource", "restrict", "self", "set", "shared", "sizeof",
    "smooth", "snorm", "static", "static_assert", "static_cast", "std", "subroutine", "super",
    "target", "template", "this", "thread_local", "throw", "trait", "try", "type", "typedef",
    "typeid", "typename", "typeof", "union", "unless", "unorm", "unsafe", "unsized", "use",
    "using", "varying", "virtual", "volatile", "wgsl", "where", "with", "writeonly", "yield",
];

/// Type of a uniform value, mapped 1:1 to a WGSL type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    UInt,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    pub fn wgsl_type(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Int => "i32",
            Self::UInt => "u32",
            Self::Vec2 => "vec2<f32>",
            Self::Vec3 => "vec3<f32>",
            Self::Vec4 => "vec4<f32>",
            Self::Mat4 => "mat4x4<f32>",
        }
    }

    /// Alignment in the uniform address space, in bytes.
    pub fn align(self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::UInt => 4,
            Self::Vec2 => 8,
            Self::Vec3 | Self::Vec4 | Self::Mat4 => 16,
        }
    }

    /// Size in bytes. `vec3` occupies 12; the following member may use its tail.
    pub fn size(self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::UInt => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat4 => 64,
        }
    }
}

/// A single uniform value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major, as WGSL expects.
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Float(_) => UniformKind::Float,
            Self::Int(_) => UniformKind::Int,
            Self::UInt(_) => UniformKind::UInt,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::Vec4(_) => UniformKind::Vec4,
            Self::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Self::Float(v) => bytemuck::bytes_of(v),
            Self::Int(v) => bytemuck::bytes_of(v),
            Self::UInt(v) => bytemuck::bytes_of(v),
            Self::Vec2(v) => bytemuck::bytes_of(v),
            Self::Vec3(v) => bytemuck::bytes_of(v),
            Self::Vec4(v) => bytemuck::bytes_of(v),
            Self::Mat4(v) => bytemuck::bytes_of(v),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        Self::UInt(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        Self::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        Self::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Vec4(v)
    }
}

impl From<[[f32; 4]; 4]> for UniformValue {
    fn from(v: [[f32; 4]; 4]) -> Self {
        Self::Mat4(v)
    }
}

impl From<Color> for UniformValue {
    fn from(c: Color) -> Self {
        Self::Vec4(c.to_array())
    }
}

/// Byte offsets of each uniform plus the padded block size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    pub offsets: Vec<u32>,
    pub size: u32,
}

/// Insertion-ordered uniform map.
///
/// The set of names and their types is the pass's uniform layout; once a
/// name is inserted only its value may change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformSet {
    entries: Vec<(String, UniformValue)>,
}

impl UniformSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new uniform.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Result<(), PassError> {
        let name = name.into();
        if !is_valid_identifier(&name) {
            return Err(PassError::InvalidUniformName(name));
        }
        if self.position(&name).is_some() {
            return Err(PassError::DuplicateUniform(name));
        }
        self.entries.push((name, value.into()));
        Ok(())
    }

    /// Updates the value of an already declared uniform.
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<(), PassError> {
        let value = value.into();
        let Some(i) = self.position(name) else {
            return Err(PassError::UnknownUniform(name.to_string()));
        };

        let slot = &mut self.entries[i].1;
        if slot.kind() != value.kind() {
            return Err(PassError::UniformTypeMismatch {
                name: name.to_string(),
                expected: slot.kind(),
                found: value.kind(),
            });
        }
        *slot = value;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.position(name).map(|i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Computes member offsets and the block size (0 for an empty set).
    pub fn layout(&self) -> UniformLayout {
        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut end = 0u32;
        for (_, value) in &self.entries {
            let kind = value.kind();
            let offset = round_up(end, kind.align());
            offsets.push(offset);
            end = offset + kind.size();
        }

        UniformLayout {
            offsets,
            size: round_up(end, BLOCK_ALIGN),
        }
    }

    /// Packs the current values into a buffer matching [`layout`](Self::layout).
    pub fn write_bytes(&self) -> Vec<u8> {
        let layout = self.layout();
        let mut out = vec![0u8; layout.size as usize];
        for ((_, value), offset) in self.entries.iter().zip(&layout.offsets) {
            let bytes = value.bytes();
            let start = *offset as usize;
            out[start..start + bytes.len()].copy_from_slice(bytes);
        }
        out
    }

    /// Emits the WGSL struct declaration for this set.
    pub fn wgsl_struct(&self, struct_name: &str) -> String {
        let mut src = format!("struct {struct_name} {{\n");
        for (name, value) in &self.entries {
            // Writing to a String cannot fail.
            let _ = writeln!(src, "    {name}: {},", value.kind().wgsl_type());
        }
        src.push_str("};\n");
        src
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// WGSL identifier check: ASCII only, no leading digit, not `_` alone, no
/// `__` prefix, not a keyword.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else { return false };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    name != "_"
        && !name.starts_with("__")
        && !WGSL_KEYWORDS.contains(&name)
        && !WGSL_RESERVED.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(entries: &[(&str, UniformValue)]) -> UniformSet {
        let mut s = UniformSet::new();
        for (n, v) in entries {
            s.insert(*n, *v).unwrap();
        }
        s
    }

    // ── names ─────────────────────────────────────────────────────────────

    #[test]
    fn accepts_plain_identifiers() {
        assert!(is_valid_identifier("strength"));
        assert!(is_valid_identifier("_offset2"));
        assert!(is_valid_identifier("tint_color"));
    }

    #[test]
    fn rejects_bad_identifiers() {
        for bad in ["", "2fast", "with space", "_", "__hidden", "fn", "let", "dash-ed", "ünï"] {
            assert!(!is_valid_identifier(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn rejects_reserved_words() {
        for reserved in ["self", "static", "class", "mut", "null", "enum", "target", "Self"] {
            assert!(!is_valid_identifier(reserved), "{reserved:?} should be rejected");
        }
        let mut s = UniformSet::new();
        assert_eq!(
            s.insert("static", 1.0f32),
            Err(PassError::InvalidUniformName("static".into()))
        );
        assert!(is_valid_identifier("selfish"));
    }

    #[test]
    fn insert_rejects_invalid_and_duplicate_names() {
        let mut s = UniformSet::new();
        assert_eq!(
            s.insert("var", 1.0f32),
            Err(PassError::InvalidUniformName("var".into()))
        );
        s.insert("amount", 1.0f32).unwrap();
        assert_eq!(
            s.insert("amount", 2.0f32),
            Err(PassError::DuplicateUniform("amount".into()))
        );
    }

    // ── set ───────────────────────────────────────────────────────────────

    #[test]
    fn set_updates_value() {
        let mut s = set(&[("amount", UniformValue::Float(1.0))]);
        s.set("amount", 0.25f32).unwrap();
        assert_eq!(s.get("amount"), Some(UniformValue::Float(0.25)));
    }

    #[test]
    fn set_unknown_is_error() {
        let mut s = UniformSet::new();
        assert_eq!(s.set("nope", 1.0f32), Err(PassError::UnknownUniform("nope".into())));
    }

    #[test]
    fn set_cannot_change_type() {
        let mut s = set(&[("amount", UniformValue::Float(1.0))]);
        let err = s.set("amount", [1.0f32, 2.0]).unwrap_err();
        assert_eq!(
            err,
            PassError::UniformTypeMismatch {
                name: "amount".into(),
                expected: UniformKind::Float,
                found: UniformKind::Vec2,
            }
        );
        assert_eq!(s.get("amount"), Some(UniformValue::Float(1.0)));
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn empty_set_has_no_block() {
        assert_eq!(UniformSet::new().layout(), UniformLayout { offsets: vec![], size: 0 });
        assert!(UniformSet::new().write_bytes().is_empty());
    }

    #[test]
    fn single_scalar_pads_to_sixteen() {
        let s = set(&[("a", UniformValue::Float(1.0))]);
        assert_eq!(s.layout(), UniformLayout { offsets: vec![0], size: 16 });
    }

    #[test]
    fn vec2_aligns_after_scalar() {
        let s = set(&[("a", UniformValue::Float(1.0)), ("b", UniformValue::Vec2([0.0; 2]))]);
        assert_eq!(s.layout().offsets, vec![0, 8]);
        assert_eq!(s.layout().size, 16);
    }

    #[test]
    fn scalar_packs_into_vec3_tail() {
        let s = set(&[
            ("tint", UniformValue::Vec3([0.0; 3])),
            ("amount", UniformValue::Float(0.0)),
        ]);
        assert_eq!(s.layout().offsets, vec![0, 12]);
        assert_eq!(s.layout().size, 16);
    }

    #[test]
    fn vec4_and_mat4_align_to_sixteen() {
        let s = set(&[
            ("a", UniformValue::UInt(1)),
            ("color", UniformValue::Vec4([0.0; 4])),
            ("b", UniformValue::Int(-1)),
            ("m", UniformValue::Mat4([[0.0; 4]; 4])),
        ]);
        assert_eq!(s.layout().offsets, vec![0, 16, 32, 48]);
        assert_eq!(s.layout().size, 112);
    }

    #[test]
    fn write_bytes_places_values_at_offsets() {
        let s = set(&[
            ("a", UniformValue::Float(1.5)),
            ("b", UniformValue::Vec2([2.0, 3.0])),
            ("c", UniformValue::Int(-7)),
        ]);
        let bytes = s.write_bytes();
        assert_eq!(bytes.len(), 32);

        let f = |o: usize| f32::from_le_bytes(bytes[o..o + 4].try_into().unwrap());
        assert_eq!(f(0), 1.5);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(f(8), 2.0);
        assert_eq!(f(12), 3.0);
        assert_eq!(i32::from_le_bytes(bytes[16..20].try_into().unwrap()), -7);
    }

    // ── wgsl ──────────────────────────────────────────────────────────────

    #[test]
    fn wgsl_struct_lists_members_in_order() {
        let s = set(&[
            ("amount", UniformValue::Float(0.0)),
            ("tint", UniformValue::Vec3([0.0; 3])),
        ]);
        assert_eq!(
            s.wgsl_struct("Params"),
            "struct Params {\n    amount: f32,\n    tint: vec3<f32>,\n};\n"
        );
    }

    #[test]
    fn color_converts_to_vec4() {
        let v: UniformValue = Color::from_premul(0.1, 0.2, 0.3, 1.0).into();
        assert_eq!(v, UniformValue::Vec4([0.1, 0.2, 0.3, 1.0]));
    }
}
