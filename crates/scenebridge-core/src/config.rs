//! Import property configuration.
//!
//! Properties are ordered key/value pairs handed to the native importer
//! through a property store for the duration of one import call. The
//! native side interprets them; well-known keys live in [`keys`].

use serde::{Deserialize, Serialize};

/// A property value the native importer understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Integer property.
    Int(i32),
    /// Floating-point property.
    Float(f32),
    /// Boolean property, marshaled as an integer.
    Bool(bool),
    /// String property.
    Str(String),
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

/// Ordered set of import properties attached to an [`crate::Importer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImporterConfig {
    properties: Vec<(String, PropertyValue)>,
}

impl ImporterConfig {
    /// Empty configuration.
    pub fn new() -> Self {
        ImporterConfig::default()
    }

    /// Set a property, replacing an earlier value for the same key in
    /// place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((name, value)),
        }
        self
    }

    /// Current value for `name`.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Remove and return the value for `name`.
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let index = self.properties.iter().position(|(key, _)| key == name)?;
        Some(self.properties.remove(index).1)
    }

    /// Drop all properties.
    pub fn clear(&mut self) {
        self.properties.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Iterate properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }
}

/// Well-known native property keys.
pub mod keys {
    /// Report per-importer timing to the log streams.
    pub const GLOB_MEASURE_TIME: &str = "GLOB_MEASURE_TIME";

    /// Skip generation of dummy skeleton meshes.
    pub const IMPORT_NO_SKELETON_MESHES: &str = "IMPORT_NO_SKELETON_MESHES";

    /// Bone limit per mesh for the split-by-bone-count step.
    pub const PP_SBBC_MAX_BONES: &str = "PP_SBBC_MAX_BONES";

    /// Maximum tangent smoothing angle, degrees.
    pub const PP_CT_MAX_SMOOTHING_ANGLE: &str = "PP_CT_MAX_SMOOTHING_ANGLE";

    /// Maximum normal smoothing angle, degrees.
    pub const PP_GSN_MAX_SMOOTHING_ANGLE: &str = "PP_GSN_MAX_SMOOTHING_ANGLE";

    /// Component mask for the remove-component step.
    pub const PP_RVC_FLAGS: &str = "PP_RVC_FLAGS";

    /// Vertex limit for the split-large-meshes step.
    pub const PP_SLM_VERTEX_LIMIT: &str = "PP_SLM_VERTEX_LIMIT";

    /// Triangle limit for the split-large-meshes step.
    pub const PP_SLM_TRIANGLE_LIMIT: &str = "PP_SLM_TRIANGLE_LIMIT";

    /// Bone weight limit for the limit-bone-weights step.
    pub const PP_LBW_MAX_WEIGHTS: &str = "PP_LBW_MAX_WEIGHTS";

    /// Remove degenerate primitives instead of degrading them.
    pub const PP_FD_REMOVE: &str = "PP_FD_REMOVE";

    /// Node names excluded from the optimize-graph step.
    pub const PP_OG_EXCLUDE_LIST: &str = "PP_OG_EXCLUDE_LIST";

    /// Import only the keyframe at this global time.
    pub const IMPORT_GLOBAL_KEYFRAME: &str = "IMPORT_GLOBAL_KEYFRAME";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_preserves_insertion_order() {
        let mut config = ImporterConfig::new();
        config
            .set(keys::PP_SLM_VERTEX_LIMIT, 100_000)
            .set(keys::GLOB_MEASURE_TIME, true)
            .set(keys::PP_GSN_MAX_SMOOTHING_ANGLE, 66.0_f32);

        let order: Vec<&str> = config.iter().map(|(key, _)| key).collect();
        assert_eq!(
            order,
            vec![
                keys::PP_SLM_VERTEX_LIMIT,
                keys::GLOB_MEASURE_TIME,
                keys::PP_GSN_MAX_SMOOTHING_ANGLE,
            ]
        );
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut config = ImporterConfig::new();
        config.set("A", 1).set("B", 2).set("A", 3);

        assert_eq!(config.len(), 2);
        assert_eq!(config.get("A"), Some(&PropertyValue::Int(3)));
        let order: Vec<&str> = config.iter().map(|(key, _)| key).collect();
        assert_eq!(order, vec!["A", "B"]);
    }

    #[test]
    fn test_remove() {
        let mut config = ImporterConfig::new();
        config.set("A", 1);
        assert_eq!(config.remove("A"), Some(PropertyValue::Int(1)));
        assert_eq!(config.remove("A"), None);
        assert!(config.is_empty());
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut config = ImporterConfig::new();
        config
            .set(keys::PP_FD_REMOVE, true)
            .set(keys::PP_CT_MAX_SMOOTHING_ANGLE, 45.0_f32)
            .set(keys::PP_OG_EXCLUDE_LIST, "root hips");

        let json = serde_json::to_string(&config).unwrap();
        let restored: ImporterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
