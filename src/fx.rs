//! Effect parameter records.
//!
//! The effect-key set is closed: each key has exactly one payload shape,
//! and validation is an exhaustive match over the variants. A fresh
//! fully-populated (all keys disabled) table comes from [`default_fx`].
//!
//! Every entry carries an `enabled` gate and a `target_z` layer reference.
//! Disabled entries keep whatever target the author wrote without it
//! having to resolve; enabled entries are checked against the layer list
//! during spec validation.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;

use crate::error::{WxError, WxResult};

/// The fixed effect-key set, in canonical serialization order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum FxKey {
    #[serde(rename = "ROTATE")]
    Rotate,
    #[serde(rename = "FALL")]
    Fall,
    #[serde(rename = "FLOW_X")]
    FlowX,
    #[serde(rename = "JITTER")]
    Jitter,
    #[serde(rename = "DRIFT")]
    Drift,
    #[serde(rename = "TWINKLE")]
    Twinkle,
    #[serde(rename = "FLASH")]
    Flash,
    #[serde(rename = "CROSSFADE")]
    Crossfade,
    #[serde(rename = "NEEDLE")]
    Needle,
}

impl FxKey {
    pub const ALL: [FxKey; 9] = [
        FxKey::Rotate,
        FxKey::Fall,
        FxKey::FlowX,
        FxKey::Jitter,
        FxKey::Drift,
        FxKey::Twinkle,
        FxKey::Flash,
        FxKey::Crossfade,
        FxKey::Needle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FxKey::Rotate => "ROTATE",
            FxKey::Fall => "FALL",
            FxKey::FlowX => "FLOW_X",
            FxKey::Jitter => "JITTER",
            FxKey::Drift => "DRIFT",
            FxKey::Twinkle => "TWINKLE",
            FxKey::Flash => "FLASH",
            FxKey::Crossfade => "CROSSFADE",
            FxKey::Needle => "NEEDLE",
        }
    }

    pub fn parse(s: &str) -> Option<FxKey> {
        FxKey::ALL.into_iter().find(|key| key.as_str() == s)
    }
}

impl fmt::Display for FxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FxRotate {
    pub enabled: bool,
    pub target_z: i32,
    pub speed_dps: u32,
    pub period_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot_x: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot_y: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FxFall {
    pub enabled: bool,
    pub target_z: i32,
    pub speed_pps: u32,
    pub period_ms: u32,
    pub fall_dx: u32,
    pub fall_dy: u32,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FxFlowX {
    pub enabled: bool,
    pub target_z: i32,
    pub speed_pps: u32,
    pub period_ms: u32,
    pub amp_x: u32,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FxJitter {
    pub enabled: bool,
    pub target_z: i32,
    pub amp_px: u32,
    pub period_ms: u32,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FxDrift {
    pub enabled: bool,
    pub target_z: i32,
    pub amp_px: u32,
    pub speed_pps: u32,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FxTwinkle {
    pub enabled: bool,
    pub target_z: i32,
    pub period_ms: u32,
    pub opa_min: u32,
    pub opa_max: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phase_ms: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FxFlash {
    pub enabled: bool,
    pub target_z: i32,
    pub period_ms: u32,
    pub smooth_ms: u32,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FxCrossfade {
    pub enabled: bool,
    pub target_z: i32,
    pub period_ms: u32,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FxNeedle {
    pub enabled: bool,
    pub target_z: i32,
    pub angle_from: u32,
    pub angle_to: u32,
    pub angle_now: u32,
    pub smooth_ms: u32,
}

/// One effect parameter record; the variant is fixed by its table key.
#[derive(Clone, Debug, PartialEq)]
pub enum FxEntry {
    Rotate(FxRotate),
    Fall(FxFall),
    FlowX(FxFlowX),
    Jitter(FxJitter),
    Drift(FxDrift),
    Twinkle(FxTwinkle),
    Flash(FxFlash),
    Crossfade(FxCrossfade),
    Needle(FxNeedle),
}

impl FxEntry {
    /// The default (disabled, all-zero) entry for a key.
    pub fn disabled(key: FxKey) -> FxEntry {
        match key {
            FxKey::Rotate => FxEntry::Rotate(FxRotate::default()),
            FxKey::Fall => FxEntry::Fall(FxFall::default()),
            FxKey::FlowX => FxEntry::FlowX(FxFlowX::default()),
            FxKey::Jitter => FxEntry::Jitter(FxJitter::default()),
            FxKey::Drift => FxEntry::Drift(FxDrift::default()),
            FxKey::Twinkle => FxEntry::Twinkle(FxTwinkle::default()),
            FxKey::Flash => FxEntry::Flash(FxFlash::default()),
            FxKey::Crossfade => FxEntry::Crossfade(FxCrossfade::default()),
            FxKey::Needle => FxEntry::Needle(FxNeedle::default()),
        }
    }

    /// Parse a raw JSON parameter object as the payload for `key`.
    ///
    /// Unknown fields and ill-typed values (negative counts, non-integers)
    /// are rejected with the key in the message.
    pub fn from_value(key: FxKey, value: &serde_json::Value) -> WxResult<FxEntry> {
        fn de<T: serde::de::DeserializeOwned>(key: FxKey, value: &serde_json::Value) -> WxResult<T> {
            serde_json::from_value(value.clone())
                .map_err(|err| WxError::validation(format!("fx.{key}: {err}")))
        }
        Ok(match key {
            FxKey::Rotate => FxEntry::Rotate(de(key, value)?),
            FxKey::Fall => FxEntry::Fall(de(key, value)?),
            FxKey::FlowX => FxEntry::FlowX(de(key, value)?),
            FxKey::Jitter => FxEntry::Jitter(de(key, value)?),
            FxKey::Drift => FxEntry::Drift(de(key, value)?),
            FxKey::Twinkle => FxEntry::Twinkle(de(key, value)?),
            FxKey::Flash => FxEntry::Flash(de(key, value)?),
            FxKey::Crossfade => FxEntry::Crossfade(de(key, value)?),
            FxKey::Needle => FxEntry::Needle(de(key, value)?),
        })
    }

    pub fn key(&self) -> FxKey {
        match self {
            FxEntry::Rotate(_) => FxKey::Rotate,
            FxEntry::Fall(_) => FxKey::Fall,
            FxEntry::FlowX(_) => FxKey::FlowX,
            FxEntry::Jitter(_) => FxKey::Jitter,
            FxEntry::Drift(_) => FxKey::Drift,
            FxEntry::Twinkle(_) => FxKey::Twinkle,
            FxEntry::Flash(_) => FxKey::Flash,
            FxEntry::Crossfade(_) => FxKey::Crossfade,
            FxEntry::Needle(_) => FxKey::Needle,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            FxEntry::Rotate(v) => v.enabled,
            FxEntry::Fall(v) => v.enabled,
            FxEntry::FlowX(v) => v.enabled,
            FxEntry::Jitter(v) => v.enabled,
            FxEntry::Drift(v) => v.enabled,
            FxEntry::Twinkle(v) => v.enabled,
            FxEntry::Flash(v) => v.enabled,
            FxEntry::Crossfade(v) => v.enabled,
            FxEntry::Needle(v) => v.enabled,
        }
    }

    pub fn target_z(&self) -> i32 {
        match self {
            FxEntry::Rotate(v) => v.target_z,
            FxEntry::Fall(v) => v.target_z,
            FxEntry::FlowX(v) => v.target_z,
            FxEntry::Jitter(v) => v.target_z,
            FxEntry::Drift(v) => v.target_z,
            FxEntry::Twinkle(v) => v.target_z,
            FxEntry::Flash(v) => v.target_z,
            FxEntry::Crossfade(v) => v.target_z,
            FxEntry::Needle(v) => v.target_z,
        }
    }

    /// Per-kind range and shape checks. Cross-layer checks (enabled
    /// target_z resolution) live in spec validation.
    pub fn validate(&self) -> WxResult<()> {
        match self {
            FxEntry::Rotate(v) => {
                if v.enabled && v.speed_dps == 0 && v.period_ms == 0 {
                    return Err(WxError::validation(
                        "fx.ROTATE requires speed_dps or period_ms when enabled",
                    ));
                }
                Ok(())
            }
            FxEntry::Twinkle(v) => {
                check_opacity(v.opa_min, "fx.TWINKLE.opa_min")?;
                check_opacity(v.opa_max, "fx.TWINKLE.opa_max")?;
                if v.phase_ms.len() > 6 {
                    return Err(WxError::validation(
                        "fx.TWINKLE.phase_ms length must be <= 6",
                    ));
                }
                Ok(())
            }
            FxEntry::Needle(v) => {
                check_angle(v.angle_from, "fx.NEEDLE.angle_from")?;
                check_angle(v.angle_to, "fx.NEEDLE.angle_to")?;
                check_angle(v.angle_now, "fx.NEEDLE.angle_now")?;
                if v.angle_from > v.angle_to {
                    return Err(WxError::validation(
                        "fx.NEEDLE.angle_from must be <= angle_to",
                    ));
                }
                Ok(())
            }
            FxEntry::Fall(_)
            | FxEntry::FlowX(_)
            | FxEntry::Jitter(_)
            | FxEntry::Drift(_)
            | FxEntry::Flash(_)
            | FxEntry::Crossfade(_) => Ok(()),
        }
    }
}

fn check_opacity(value: u32, path: &str) -> WxResult<()> {
    if value > 255 {
        return Err(WxError::validation(format!("{path} must be 0..=255")));
    }
    Ok(())
}

fn check_angle(value: u32, path: &str) -> WxResult<()> {
    // Tenths of a degree; 3600 is one full turn.
    if value > 3600 {
        return Err(WxError::validation(format!("{path} must be 0..=3600")));
    }
    Ok(())
}

/// The per-spec effect table: at most one entry per key.
///
/// Serializes as a JSON object in canonical key order; reading rejects
/// unknown keys outright.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FxTable {
    entries: BTreeMap<FxKey, FxEntry>,
}

impl FxTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: FxEntry) -> Option<FxEntry> {
        self.entries.insert(entry.key(), entry)
    }

    pub fn get(&self, key: FxKey) -> Option<&FxEntry> {
        self.entries.get(&key)
    }

    pub fn contains_key(&self, key: FxKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn remove(&mut self, key: FxKey) -> Option<FxEntry> {
        self.entries.remove(&key)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(FxKey) -> bool) {
        self.entries.retain(|key, _| keep(*key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FxKey, &FxEntry)> {
        self.entries.iter().map(|(key, entry)| (*key, entry))
    }
}

/// Fresh fully-populated table: every key present, every entry disabled.
pub fn default_fx() -> FxTable {
    let mut table = FxTable::new();
    for key in FxKey::ALL {
        table.insert(FxEntry::disabled(key));
    }
    table
}

impl serde::Serialize for FxTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            match entry {
                FxEntry::Rotate(v) => map.serialize_entry(key.as_str(), v)?,
                FxEntry::Fall(v) => map.serialize_entry(key.as_str(), v)?,
                FxEntry::FlowX(v) => map.serialize_entry(key.as_str(), v)?,
                FxEntry::Jitter(v) => map.serialize_entry(key.as_str(), v)?,
                FxEntry::Drift(v) => map.serialize_entry(key.as_str(), v)?,
                FxEntry::Twinkle(v) => map.serialize_entry(key.as_str(), v)?,
                FxEntry::Flash(v) => map.serialize_entry(key.as_str(), v)?,
                FxEntry::Crossfade(v) => map.serialize_entry(key.as_str(), v)?,
                FxEntry::Needle(v) => map.serialize_entry(key.as_str(), v)?,
            }
        }
        map.end()
    }
}

impl<'de> serde::Deserialize<'de> for FxTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> serde::de::Visitor<'de> for TableVisitor {
            type Value = FxTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an fx table object")
            }

            fn visit_map<A>(self, mut access: A) -> Result<FxTable, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut table = FxTable::new();
                while let Some(raw_key) = access.next_key::<String>()? {
                    let key = FxKey::parse(&raw_key).ok_or_else(|| {
                        serde::de::Error::custom(format!("unknown fx key: {raw_key}"))
                    })?;
                    let value = access.next_value::<serde_json::Value>()?;
                    let entry = FxEntry::from_value(key, &value)
                        .map_err(|err| serde::de::Error::custom(err.to_string()))?;
                    table.insert(entry);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fx_covers_every_key_disabled() {
        let table = default_fx();
        assert_eq!(table.len(), FxKey::ALL.len());
        for key in FxKey::ALL {
            let entry = table.get(key).unwrap();
            assert!(!entry.enabled());
            entry.validate().unwrap();
        }
    }

    #[test]
    fn default_fx_returns_fresh_tables() {
        let mut a = default_fx();
        a.remove(FxKey::Rotate);
        let b = default_fx();
        assert!(b.contains_key(FxKey::Rotate));
    }

    #[test]
    fn serializes_in_canonical_key_order() {
        let json = serde_json::to_string(&default_fx()).unwrap();
        let positions: Vec<usize> = FxKey::ALL
            .iter()
            .map(|key| json.find(&format!("\"{key}\"")).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn table_roundtrip_preserves_entries() {
        let mut table = FxTable::new();
        table.insert(FxEntry::Rotate(FxRotate {
            enabled: true,
            target_z: 2,
            speed_dps: 12,
            period_ms: 0,
            pivot_x: Some(48),
            pivot_y: Some(48),
        }));
        let json = serde_json::to_string(&table).unwrap();
        let back: FxTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = serde_json::from_str::<FxTable>(r#"{"SPIN": {}}"#).unwrap_err();
        assert!(err.to_string().contains("unknown fx key"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let value = serde_json::json!({ "bogus": 1 });
        assert!(FxEntry::from_value(FxKey::Rotate, &value).is_err());
    }

    #[test]
    fn negative_numeric_field_is_rejected() {
        let value = serde_json::json!({ "period_ms": -1, "amp_x": -5 });
        assert!(FxEntry::from_value(FxKey::FlowX, &value).is_err());
    }

    #[test]
    fn sparse_hint_parses_with_defaults() {
        let value = serde_json::json!({ "speed_dps": 12 });
        let FxEntry::Rotate(rotate) = FxEntry::from_value(FxKey::Rotate, &value).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(rotate.speed_dps, 12);
        assert!(!rotate.enabled);
        assert_eq!(rotate.target_z, 0);
    }

    #[test]
    fn needle_angle_order_is_enforced() {
        let entry = FxEntry::Needle(FxNeedle {
            enabled: false,
            target_z: 0,
            angle_from: 900,
            angle_to: 100,
            angle_now: 0,
            smooth_ms: 0,
        });
        assert!(entry.validate().is_err());
    }

    #[test]
    fn twinkle_ranges_are_enforced() {
        let entry = FxEntry::Twinkle(FxTwinkle {
            opa_max: 300,
            ..FxTwinkle::default()
        });
        assert!(entry.validate().is_err());

        let entry = FxEntry::Twinkle(FxTwinkle {
            phase_ms: vec![0; 7],
            ..FxTwinkle::default()
        });
        assert!(entry.validate().is_err());
    }

    #[test]
    fn enabled_rotate_needs_a_rate_or_period() {
        let entry = FxEntry::Rotate(FxRotate {
            enabled: true,
            ..FxRotate::default()
        });
        assert!(entry.validate().is_err());
    }
}
