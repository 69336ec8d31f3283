//! The wx.spec v1 domain model and its validation pass.
//!
//! A [`Spec`] is built fully in memory, validated as a whole, and either
//! serializes completely or not at all. Canonical JSON key order is the
//! struct field order below: identity fields first, then components,
//! layers, fx, metadata.

use std::collections::HashSet;

use crate::error::{WxError, WxResult};
use crate::fx::FxKey;
use crate::hash::fnv1a32;
use crate::ident::normalize;

/// The single supported schema version.
pub const SPEC_VERSION: u32 = 1;

/// Canonical document describing one animated icon's layers, effects,
/// and identity.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Spec {
    /// Content hash of `name`; validation enforces the equality.
    pub spec_id: u32,
    pub name: String,
    pub components: Components,
    pub layers: Vec<Layer>,
    pub fx: crate::fx::FxTable,
    pub metadata: Metadata,
}

/// Downstream-renderer classification tags. Free-form uppercase tokens,
/// not interpreted here.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Components {
    pub decor: String,
    pub cover: String,
    pub particles: String,
    pub atmos: String,
    pub event: String,
}

impl Default for Components {
    fn default() -> Self {
        let none = || "NONE".to_string();
        Self {
            decor: none(),
            cover: none(),
            particles: none(),
            atmos: none(),
            event: none(),
        }
    }
}

/// One positioned, asset-bound drawable unit. A layer's z-value is its
/// 0-based position in `Spec::layers`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layer {
    pub id: String,
    pub asset: String,
    #[serde(default)]
    pub fx: Vec<FxKey>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            version: SPEC_VERSION,
            created_by: None,
            confidence: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Mask,
    Alpha,
}

impl AssetType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Image => "image",
            AssetType::Mask => "mask",
            AssetType::Alpha => "alpha",
        }
    }
}

/// A physical payload descriptor accompanying a spec at pack time.
/// Payload bytes live with the caller; the spec only references keys.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Asset {
    pub asset_key: String,
    pub asset_hash: u32,
    #[serde(rename = "type")]
    pub kind: AssetType,
    pub size_px: u32,
    pub path: String,
}

impl Asset {
    /// Normalizes the key and derives `asset_hash` from it.
    pub fn new(
        asset_key: &str,
        kind: AssetType,
        size_px: u32,
        path: impl Into<String>,
    ) -> WxResult<Self> {
        let asset_key = normalize(asset_key)?;
        let asset_hash = fnv1a32(&asset_key);
        Ok(Self {
            asset_key,
            asset_hash,
            kind,
            size_px,
            path: path.into(),
        })
    }

    /// Like [`Asset::new`] but cross-checks a caller-supplied hash.
    pub fn with_hash(
        asset_key: &str,
        asset_hash: u32,
        kind: AssetType,
        size_px: u32,
        path: impl Into<String>,
    ) -> WxResult<Self> {
        let asset = Self::new(asset_key, kind, size_px, path)?;
        if asset.asset_hash != asset_hash {
            return Err(WxError::validation(format!(
                "asset '{}': asset_hash {:#010x} does not match key hash {:#010x}",
                asset.asset_key, asset_hash, asset.asset_hash
            )));
        }
        Ok(asset)
    }
}

impl Spec {
    /// Check every domain invariant. Never mutates; the first violation
    /// rejects the spec with the offending field path in the message.
    pub fn validate(&self) -> WxResult<()> {
        let canonical_name = normalize(&self.name)
            .map_err(|_| WxError::validation(format!("name {:?} is not a valid identifier", self.name)))?;
        if canonical_name != self.name {
            return Err(WxError::validation(format!(
                "name {:?} is not in normalized form",
                self.name
            )));
        }
        let expected_id = fnv1a32(&self.name);
        if self.spec_id != expected_id {
            return Err(WxError::validation(format!(
                "spec_id {:#010x} does not match hash of name '{}' ({expected_id:#010x})",
                self.spec_id, self.name
            )));
        }

        self.components.validate()?;

        if self.layers.is_empty() {
            return Err(WxError::validation("layers must be non-empty"));
        }
        let mut seen_ids = HashSet::new();
        for layer in &self.layers {
            if normalize(&layer.id).map(|n| n != layer.id).unwrap_or(true) {
                return Err(WxError::validation(format!(
                    "layer id {:?} is not a normalized identifier",
                    layer.id
                )));
            }
            if !seen_ids.insert(layer.id.as_str()) {
                return Err(WxError::validation(format!(
                    "duplicate layer id '{}'",
                    layer.id
                )));
            }
            if normalize(&layer.asset).map(|n| n != layer.asset).unwrap_or(true) {
                return Err(WxError::validation(format!(
                    "layer '{}' asset {:?} is not a normalized identifier",
                    layer.id, layer.asset
                )));
            }
            for key in &layer.fx {
                if !self.fx.contains_key(*key) {
                    return Err(WxError::validation(format!(
                        "layer '{}' references fx key {key} with no fx entry",
                        layer.id
                    )));
                }
            }
        }

        if self.metadata.version != SPEC_VERSION {
            return Err(WxError::validation(format!(
                "metadata.version must be {SPEC_VERSION}, got {}",
                self.metadata.version
            )));
        }
        if let Some(confidence) = self.metadata.confidence
            && !(0.0..=1.0).contains(&confidence)
        {
            return Err(WxError::validation(format!(
                "metadata.confidence must be in [0,1], got {confidence}"
            )));
        }

        let layer_count = self.layers.len() as i32;
        for (key, entry) in self.fx.iter() {
            entry.validate()?;
            if entry.enabled() {
                let target = entry.target_z();
                if target < 0 || target >= layer_count {
                    return Err(WxError::validation(format!(
                        "fx.{key}.target_z {target} does not reference any layer z"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Serialize to the canonical JSON document (validating first).
    pub fn to_canonical_json(&self) -> WxResult<String> {
        self.validate()?;
        serde_json::to_string_pretty(self)
            .map_err(|err| WxError::format(format!("serialize spec: {err}")))
    }

    /// Strict inverse of [`Spec::to_canonical_json`]: unknown keys are
    /// rejected and the full validation pass re-runs before returning.
    pub fn from_canonical_json(text: &str) -> WxResult<Spec> {
        let spec: Spec = serde_json::from_str(text)
            .map_err(|err| WxError::validation(format!("spec document: {err}")))?;
        spec.validate()?;
        Ok(spec)
    }
}

impl Components {
    fn validate(&self) -> WxResult<()> {
        for (field, value) in [
            ("decor", &self.decor),
            ("cover", &self.cover),
            ("particles", &self.particles),
            ("atmos", &self.atmos),
            ("event", &self.event),
        ] {
            let ok = !value.is_empty()
                && value
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
            if !ok {
                return Err(WxError::validation(format!(
                    "components.{field} {value:?} must match [A-Z0-9_]+"
                )));
            }
        }
        Ok(())
    }
}

/// Validate pack-time asset companions against the spec's resolved
/// raster size.
pub fn validate_assets(assets: &[Asset], expected_size_px: u32) -> WxResult<()> {
    for asset in assets {
        let computed = fnv1a32(&asset.asset_key);
        if asset.asset_hash != computed {
            return Err(WxError::validation(format!(
                "asset '{}': asset_hash {:#010x} does not match key hash {computed:#010x}",
                asset.asset_key, asset.asset_hash
            )));
        }
        if asset.size_px != expected_size_px {
            return Err(WxError::validation(format!(
                "asset '{}': size_px {} must match spec size {expected_size_px}",
                asset.asset_key, asset.size_px
            )));
        }
    }
    Ok(())
}
