//! Addon manifest parsing and capability checks.
//!
//! A manifest is the JSON document an addon serves at `manifest.json`. It
//! declares which resources the addon serves, for which media types and id
//! prefixes, and which catalogs it publishes.
//!
//! Optional restrictions are kept as `Option` so that "nothing declared"
//! (unrestricted) stays distinct from "declared empty" (restricted to
//! nothing).

use serde::{Deserialize, Deserializer, Serialize};

use super::{AddonError, AddonResult, ExtraValue};

/// Addon manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Stable identity key.
    pub id: String,
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    /// Media types the addon claims broadly.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
    #[serde(default)]
    pub catalogs: Vec<CatalogDecl>,
    #[serde(default)]
    pub addon_catalogs: Vec<CatalogDecl>,
    /// Manifest-level id prefix restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_prefixes: Option<Vec<String>>,
    #[serde(default)]
    pub behavior_hints: ManifestBehaviorHints,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManifestBehaviorHints {
    pub adult: bool,
    pub p2p: bool,
    pub configurable: bool,
    pub configuration_required: bool,
}

/// A resource the addon serves, optionally narrowing types and id prefixes.
///
/// Manifests may list a resource either as a bare name (`"stream"`) or as an
/// object; both forms deserialize into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDecl {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_prefixes: Option<Vec<String>>,
}

impl ResourceDecl {
    /// Resource declared without any narrowing.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), types: None, id_prefixes: None }
    }
}

impl<'de> Deserialize<'de> for ResourceDecl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Full {
            name: String,
            #[serde(default)]
            types: Option<Vec<String>>,
            #[serde(default)]
            id_prefixes: Option<Vec<String>>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Short(String),
            Full(Full),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Short(name) => Self::named(name),
            Repr::Full(full) => {
                Self { name: full.name, types: full.types, id_prefixes: full.id_prefixes }
            }
        })
    }
}

/// A catalog published by the addon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDecl {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub extra: Vec<ExtraDecl>,
    /// Legacy list of supported extra names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_supported: Vec<String>,
    /// Legacy list of required extra names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_required: Vec<String>,
}

/// An extra parameter accepted by a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraDecl {
    pub name: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default = "default_options_limit")]
    pub options_limit: u32,
}

fn default_options_limit() -> u32 {
    1
}

impl ExtraDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_required: false, options: Vec::new(), options_limit: 1 }
    }
}

impl CatalogDecl {
    /// Whether the catalog accepts an extra of this name.
    pub fn supports_extra(&self, name: &str) -> bool {
        self.extra.iter().any(|e| e.name == name) || self.extra_supported.iter().any(|e| e == name)
    }

    /// Names of extras the catalog marks as required.
    pub fn required_extras(&self) -> Vec<&str> {
        let mut names: Vec<&str> =
            self.extra.iter().filter(|e| e.is_required).map(|e| e.name.as_str()).collect();
        for name in &self.extra_required {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    /// Required extras that declare options, each set to its first option.
    pub fn default_extra(&self) -> Vec<ExtraValue> {
        self.extra
            .iter()
            .filter(|e| e.is_required)
            .filter_map(|e| e.options.first().map(|first| ExtraValue::new(&e.name, first)))
            .collect()
    }

    /// Required extras not present in `supplied`.
    pub fn missing_required(&self, supplied: &[ExtraValue]) -> Vec<String> {
        self.required_extras()
            .into_iter()
            .filter(|name| !supplied.iter().any(|v| v.name == *name))
            .map(str::to_string)
            .collect()
    }

    /// Whether the catalog can be searched.
    pub fn is_searchable(&self) -> bool {
        self.supports_extra(super::EXTRA_SEARCH)
    }
}

impl Manifest {
    /// Parse a manifest from a JSON body.
    pub fn from_json(body: &[u8]) -> AddonResult<Self> {
        let manifest: Self = serde_json::from_slice(body)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest.
    pub fn validate(&self) -> AddonResult<()> {
        if self.id.trim().is_empty() {
            return Err(AddonError::InvalidManifest("Addon id is required".to_string()));
        }

        if self.name.trim().is_empty() {
            return Err(AddonError::InvalidManifest(format!(
                "Addon '{}' has no name",
                self.id
            )));
        }

        Ok(())
    }

    /// Find the declaration of a resource by name.
    pub fn resource(&self, name: &str) -> Option<&ResourceDecl> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Whether this addon serves `resource` for the given media type and id.
    ///
    /// Resource-level `types` and `idPrefixes` narrow the manifest-level
    /// values; when neither level declares prefixes, any id passes.
    pub fn supports(&self, resource: &str, media_type: &str, id: &str) -> bool {
        let Some(decl) = self.resource(resource) else {
            return false;
        };

        let types = decl.types.as_ref().unwrap_or(&self.types);
        if !types.iter().any(|t| t == media_type) {
            return false;
        }

        match decl.id_prefixes.as_ref().or(self.id_prefixes.as_ref()) {
            Some(prefixes) => prefixes.iter().any(|p| id.starts_with(p.as_str())),
            None => true,
        }
    }

    /// Find a catalog by type and id.
    pub fn catalog(&self, media_type: &str, id: &str) -> Option<&CatalogDecl> {
        self.catalogs.iter().find(|c| c.media_type == media_type && c.id == id)
    }

    /// Whether any catalog of this type is declared.
    pub fn has_catalog_of_type(&self, media_type: &str) -> bool {
        self.catalogs.iter().any(|c| c.media_type == media_type)
    }
}
