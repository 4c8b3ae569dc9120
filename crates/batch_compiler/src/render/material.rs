//! Material definitions for the batch compiler
//!
//! A material is bound to one [`ProgramKind`]. The kind fixes, at construction,
//! the ordered list of named parameters (and their types) plus the ordered list
//! of boolean feature flags. After that a parameter can change value but never
//! type, and no parameter can be added or removed.
//!
//! Texture parameters feed material map slots (and therefore the feature
//! signature); every other parameter ends up in the packed per-object material
//! struct, in declaration order.

use crate::foundation::collections::TextureKey;

/// Errors raised when editing a material
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MaterialError {
    /// Parameter is not declared by the material's program kind
    #[error("Unknown material parameter '{0}'")]
    UnknownParameter(String),

    /// Value type differs from the declared parameter type
    #[error("Parameter '{name}' is declared as {expected:?}, got {found:?}")]
    TypeMismatch {
        /// Parameter name
        name: String,
        /// Declared kind
        expected: ParameterKind,
        /// Kind of the rejected value
        found: ParameterKind,
    },

    /// Flag is not declared by the material's program kind
    #[error("Unknown feature flag '{0}'")]
    UnknownFlag(String),

    /// Material key does not resolve in the scene
    #[error("Material not found in scene")]
    MissingMaterial,
}

/// Texture map slot a material parameter can feed
///
/// Each active slot becomes one texture array per render group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapSlot {
    /// Base color map
    Diffuse,
    /// Tangent-space normal map
    Normal,
    /// Specular intensity map
    Specular,
    /// Emission map
    Emissive,
}

impl MapSlot {
    /// Every slot, in texture unit order
    pub const ALL: [Self; 4] = [Self::Diffuse, Self::Normal, Self::Specular, Self::Emissive];

    /// Short slot name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Diffuse => "diffuse",
            Self::Normal => "normal",
            Self::Specular => "specular",
            Self::Emissive => "emissive",
        }
    }

    /// Uniform purpose of the per-object layer index buffer for this slot
    pub const fn indices_purpose(self) -> &'static str {
        match self {
            Self::Diffuse => "diffuseMapIndices",
            Self::Normal => "normalMapIndices",
            Self::Specular => "specularMapIndices",
            Self::Emissive => "emissiveMapIndices",
        }
    }
}

/// Declared type of a material parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// Texture reference feeding a map slot
    Texture(MapSlot),
    /// 32-bit float
    Float,
    /// Boolean, packed as a 32-bit integer
    Bool,
    /// Four 32-bit floats
    Vec4,
}

/// Value of a material parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialParameter {
    /// Texture reference; `None` leaves the map slot inactive
    Texture(Option<TextureKey>),
    /// 32-bit float
    Float(f32),
    /// Boolean
    Bool(bool),
    /// Four 32-bit floats
    Vec4([f32; 4]),
}

impl MaterialParameter {
    /// Whether this value can be stored in a parameter of `kind`
    pub const fn fits(&self, kind: ParameterKind) -> bool {
        matches!(
            (self, kind),
            (Self::Texture(_), ParameterKind::Texture(_))
                | (Self::Float(_), ParameterKind::Float)
                | (Self::Bool(_), ParameterKind::Bool)
                | (Self::Vec4(_), ParameterKind::Vec4)
        )
    }

    fn describe(&self, slot_hint: ParameterKind) -> ParameterKind {
        match self {
            Self::Texture(_) => match slot_hint {
                ParameterKind::Texture(slot) => ParameterKind::Texture(slot),
                _ => ParameterKind::Texture(MapSlot::Diffuse),
            },
            Self::Float(_) => ParameterKind::Float,
            Self::Bool(_) => ParameterKind::Bool,
            Self::Vec4(_) => ParameterKind::Vec4,
        }
    }
}

/// One parameter declared by a program kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDecl {
    /// Parameter name, also the material struct field name
    pub name: &'static str,
    /// Declared type
    pub kind: ParameterKind,
    /// Value a fresh material starts with
    pub default: MaterialParameter,
}

const fn decl(name: &'static str, kind: ParameterKind, default: MaterialParameter) -> ParameterDecl {
    ParameterDecl { name, kind, default }
}

const STANDARD_PARAMETERS: &[ParameterDecl] = &[
    decl("diffuseMap", ParameterKind::Texture(MapSlot::Diffuse), MaterialParameter::Texture(None)),
    decl("normalMap", ParameterKind::Texture(MapSlot::Normal), MaterialParameter::Texture(None)),
    decl("specularMap", ParameterKind::Texture(MapSlot::Specular), MaterialParameter::Texture(None)),
    decl("emissiveMap", ParameterKind::Texture(MapSlot::Emissive), MaterialParameter::Texture(None)),
    decl("diffuseColor", ParameterKind::Vec4, MaterialParameter::Vec4([1.0, 1.0, 1.0, 1.0])),
    decl("shininess", ParameterKind::Float, MaterialParameter::Float(32.0)),
    decl("specularColor", ParameterKind::Vec4, MaterialParameter::Vec4([1.0, 1.0, 1.0, 1.0])),
    decl("emissiveColor", ParameterKind::Vec4, MaterialParameter::Vec4([0.0, 0.0, 0.0, 1.0])),
    decl("opacity", ParameterKind::Float, MaterialParameter::Float(1.0)),
    decl("twoSidedLighting", ParameterKind::Bool, MaterialParameter::Bool(false)),
];

const STANDARD_FLAGS: &[&str] = &["alphaTest", "vertexColors", "flatShading"];

const UNLIT_PARAMETERS: &[ParameterDecl] = &[
    decl("diffuseMap", ParameterKind::Texture(MapSlot::Diffuse), MaterialParameter::Texture(None)),
    decl("diffuseColor", ParameterKind::Vec4, MaterialParameter::Vec4([1.0, 1.0, 1.0, 1.0])),
    decl("opacity", ParameterKind::Float, MaterialParameter::Float(1.0)),
];

const UNLIT_FLAGS: &[&str] = &["alphaTest", "vertexColors"];

/// Program family a material renders with
///
/// This is a closed set: the compiler checks [`ProgramKind::is_batchable`]
/// while classifying instead of inspecting program types at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Lit material with diffuse/normal/specular/emissive maps
    Standard,
    /// Color-only material with an optional diffuse map
    Unlit,
    /// Program owned by another renderer; never batched here
    External(String),
}

impl ProgramKind {
    /// Parameters declared by this program family, in struct order
    pub const fn declared_parameters(&self) -> &'static [ParameterDecl] {
        match self {
            Self::Standard => STANDARD_PARAMETERS,
            Self::Unlit => UNLIT_PARAMETERS,
            Self::External(_) => &[],
        }
    }

    /// Feature flags declared by this program family
    pub const fn declared_flags(&self) -> &'static [&'static str] {
        match self {
            Self::Standard => STANDARD_FLAGS,
            Self::Unlit => UNLIT_FLAGS,
            Self::External(_) => &[],
        }
    }

    /// Whether the batch compiler knows how to build programs for this kind
    pub const fn is_batchable(&self) -> bool {
        matches!(self, Self::Standard | Self::Unlit)
    }
}

/// Material resource: program kind, typed parameters and feature flags
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    kind: ProgramKind,
    parameters: Vec<(String, MaterialParameter)>,
    flags: Vec<(String, bool)>,
    name: Option<String>,
}

impl Material {
    /// Create a material with every declared parameter at its default
    pub fn new(kind: ProgramKind) -> Self {
        let parameters = kind
            .declared_parameters()
            .iter()
            .map(|decl| (decl.name.to_string(), decl.default))
            .collect();
        let flags = kind
            .declared_flags()
            .iter()
            .map(|flag| ((*flag).to_string(), false))
            .collect();

        Self {
            kind,
            parameters,
            flags,
            name: None,
        }
    }

    /// Create a standard lit material
    pub fn standard() -> Self {
        Self::new(ProgramKind::Standard)
    }

    /// Create an unlit material
    pub fn unlit() -> Self {
        Self::new(ProgramKind::Unlit)
    }

    /// Set the material name for debugging
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Debug name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Program family
    pub fn kind(&self) -> &ProgramKind {
        &self.kind
    }

    /// Parameters in declaration order
    pub fn parameters(&self) -> &[(String, MaterialParameter)] {
        &self.parameters
    }

    /// Look up a parameter value
    pub fn parameter(&self, name: &str) -> Option<&MaterialParameter> {
        self.parameters.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Replace a parameter value, keeping its declared type
    pub fn set_parameter(&mut self, name: &str, value: MaterialParameter) -> Result<(), MaterialError> {
        let decl = self
            .kind
            .declared_parameters()
            .iter()
            .find(|decl| decl.name == name)
            .ok_or_else(|| MaterialError::UnknownParameter(name.to_string()))?;

        if !value.fits(decl.kind) {
            return Err(MaterialError::TypeMismatch {
                name: name.to_string(),
                expected: decl.kind,
                found: value.describe(decl.kind),
            });
        }

        if let Some((_, slot)) = self.parameters.iter_mut().find(|(n, _)| n == name) {
            *slot = value;
        }
        Ok(())
    }

    /// Assign (or clear) the texture of a map slot
    pub fn set_texture(&mut self, slot: MapSlot, texture: Option<TextureKey>) -> Result<(), MaterialError> {
        let name = self
            .kind
            .declared_parameters()
            .iter()
            .find(|decl| decl.kind == ParameterKind::Texture(slot))
            .map(|decl| decl.name)
            .ok_or_else(|| MaterialError::UnknownParameter(format!("{}Map", slot.name())))?;
        self.set_parameter(name, MaterialParameter::Texture(texture))
    }

    /// Texture currently bound to a map slot
    pub fn texture(&self, slot: MapSlot) -> Option<TextureKey> {
        self.active_maps().find(|(s, _)| *s == slot).map(|(_, key)| key)
    }

    /// Map slots holding a texture, in declaration order
    ///
    /// Texture parameters without an image are skipped: the slot is inactive.
    pub fn active_maps(&self) -> impl Iterator<Item = (MapSlot, TextureKey)> + '_ {
        self.kind
            .declared_parameters()
            .iter()
            .zip(&self.parameters)
            .filter_map(|(decl, (_, value))| match (decl.kind, value) {
                (ParameterKind::Texture(slot), MaterialParameter::Texture(Some(key))) => Some((slot, *key)),
                _ => None,
            })
    }

    /// Non-texture parameters with their declared kinds, in declaration order
    pub fn uniform_parameters(&self) -> impl Iterator<Item = (&str, ParameterKind, &MaterialParameter)> + '_ {
        self.kind
            .declared_parameters()
            .iter()
            .zip(&self.parameters)
            .filter(|(decl, _)| !matches!(decl.kind, ParameterKind::Texture(_)))
            .map(|(decl, (name, value))| (name.as_str(), decl.kind, value))
    }

    /// Feature flags in declaration order
    pub fn flags(&self) -> &[(String, bool)] {
        &self.flags
    }

    /// Set a declared feature flag
    pub fn set_flag(&mut self, name: &str, enabled: bool) -> Result<(), MaterialError> {
        let flag = self
            .flags
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| MaterialError::UnknownFlag(name.to_string()))?;
        flag.1 = enabled;
        Ok(())
    }

    /// Builder form of [`set_flag`](Self::set_flag)
    pub fn with_flag(mut self, name: &str, enabled: bool) -> Result<Self, MaterialError> {
        self.set_flag(name, enabled)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_defaults_follow_declarations() {
        let material = Material::standard();
        assert_eq!(material.parameters().len(), STANDARD_PARAMETERS.len());
        assert_eq!(material.parameter("shininess"), Some(&MaterialParameter::Float(32.0)));
        assert_eq!(material.active_maps().count(), 0);
        assert!(material.flags().iter().all(|(_, enabled)| !enabled));
    }

    #[test]
    fn test_parameter_type_is_fixed() {
        let mut material = Material::unlit();
        assert!(material.set_parameter("opacity", MaterialParameter::Float(0.5)).is_ok());
        assert_eq!(
            material.set_parameter("opacity", MaterialParameter::Bool(true)),
            Err(MaterialError::TypeMismatch {
                name: "opacity".to_string(),
                expected: ParameterKind::Float,
                found: ParameterKind::Bool,
            })
        );
        assert_eq!(
            material.set_parameter("shininess", MaterialParameter::Float(1.0)),
            Err(MaterialError::UnknownParameter("shininess".to_string()))
        );
    }

    #[test]
    fn test_active_maps_skip_empty_textures() {
        let mut textures: SlotMap<TextureKey, ()> = SlotMap::with_key();
        let diffuse = textures.insert(());
        let mut material = Material::standard();
        material.set_texture(MapSlot::Diffuse, Some(diffuse)).unwrap();
        material.set_texture(MapSlot::Normal, None).unwrap();

        let active: Vec<_> = material.active_maps().collect();
        assert_eq!(active, vec![(MapSlot::Diffuse, diffuse)]);
        assert_eq!(material.texture(MapSlot::Normal), None);
    }

    #[test]
    fn test_unlit_has_no_normal_slot() {
        let mut textures: SlotMap<TextureKey, ()> = SlotMap::with_key();
        let key = textures.insert(());
        assert!(matches!(
            Material::unlit().set_texture(MapSlot::Normal, Some(key)),
            Err(MaterialError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_uniform_parameters_exclude_textures() {
        let material = Material::unlit();
        let names: Vec<_> = material.uniform_parameters().map(|(name, _, _)| name).collect();
        assert_eq!(names, vec!["diffuseColor", "opacity"]);
    }

    #[test]
    fn test_flags() {
        let material = Material::standard().with_flag("alphaTest", true).unwrap();
        assert!(material.flags().contains(&("alphaTest".to_string(), true)));
        assert_eq!(
            Material::unlit().with_flag("flatShading", true).unwrap_err(),
            MaterialError::UnknownFlag("flatShading".to_string())
        );
    }

    #[test]
    fn test_external_kind_is_not_batchable() {
        assert!(ProgramKind::Standard.is_batchable());
        assert!(!ProgramKind::External("terrain".into()).is_batchable());
        assert!(Material::new(ProgramKind::External("terrain".into())).parameters().is_empty());
    }
}
