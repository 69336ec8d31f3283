//! SVG to spec mapping.
//!
//! Consumes the analyzer's [`SvgDocument`] and produces a validated
//! [`Spec`] plus the resolved raster size. Mapping is total over the
//! analyzer output: every candidate layer becomes a spec layer (sorted by
//! z, re-based to list position) and every effect hint becomes a table
//! entry or is dropped because no layer claims it.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{WxError, WxResult};
use crate::fx::{FxEntry, FxTable};
use crate::hash::fnv1a32;
use crate::ident::normalize;
use crate::model::{Components, Layer, Metadata, Spec};
use crate::svg::parse_svg;

/// Caller-supplied overrides for one mapping run.
#[derive(Clone, Copy, Debug, Default)]
pub struct SvgMapOptions<'a> {
    /// Overrides the document's own name hint.
    pub name: Option<&'a str>,
    /// Overrides the document's declared dimensions.
    pub size_px: Option<u32>,
    /// Last-resort name source, typically the input file stem.
    pub source_stem: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MappedSpec {
    pub spec: Spec,
    pub size_px: u32,
}

/// Map an SVG document to a validated spec.
pub fn map_svg_to_spec(svg_text: &str, opts: &SvgMapOptions<'_>) -> WxResult<MappedSpec> {
    let doc = parse_svg(svg_text)?;

    let raw_name = opts
        .name
        .or(doc.name_hint.as_deref())
        .or(opts.source_stem)
        .ok_or_else(|| WxError::mapping("no name: pass one or set data-wx-id on the root"))?;
    let name = normalize(raw_name)?;

    let size_px = opts
        .size_px
        .or(doc.width)
        .or(doc.height)
        .ok_or(WxError::MissingSize)?;

    let mut candidates = doc.layers;
    candidates.sort_by_key(|layer| layer.z);

    // Original z annotation -> final list position, for hint targeting.
    let mut z_to_index: HashMap<i32, usize> = HashMap::new();
    for (index, candidate) in candidates.iter().enumerate() {
        z_to_index.entry(candidate.z).or_insert(index);
    }

    let mut layers = Vec::with_capacity(candidates.len());
    let mut used_ids: HashMap<String, u32> = HashMap::new();
    for candidate in &candidates {
        let base = normalize(&candidate.asset_key)?;
        let id = match used_ids.get_mut(&base) {
            Some(count) => {
                *count += 1;
                format!("{base}_{count}")
            }
            None => {
                used_ids.insert(base.clone(), 0);
                base.clone()
            }
        };
        let asset = match &candidate.asset_ref {
            Some(referenced) => normalize(referenced)?,
            None => base,
        };
        layers.push(Layer {
            id,
            asset,
            fx: Vec::new(),
        });
    }
    if layers.is_empty() {
        debug!(name = %name, "no candidate layers, synthesizing whole-icon layer");
        layers.push(Layer {
            id: name.clone(),
            asset: name.clone(),
            fx: Vec::new(),
        });
    }

    let mut fx = FxTable::new();
    for (key, hint) in &doc.fx_hints {
        // Parse eagerly so ill-typed hints fail even when later dropped.
        let entry = FxEntry::from_value(*key, hint)
            .map_err(|err| WxError::mapping(format!("fx hint {key}: {err}")))?;

        let target_index = match hint.get("target_z").and_then(serde_json::Value::as_i64) {
            Some(z) => z_to_index.get(&(z as i32)).copied(),
            None if layers.len() == 1 => Some(0),
            None => None,
        };
        let Some(index) = target_index else {
            debug!(key = %key, "dropping fx hint with no matching layer");
            continue;
        };

        // A hint without its own target inherits the layer's authored z.
        let entry = if hint.get("target_z").is_none() {
            let authored_z = candidates.first().map(|c| c.z).unwrap_or(0);
            let mut patched = hint.clone();
            if let Some(obj) = patched.as_object_mut() {
                obj.insert("target_z".to_string(), serde_json::json!(authored_z));
            }
            FxEntry::from_value(*key, &patched)
                .map_err(|err| WxError::mapping(format!("fx hint {key}: {err}")))?
        } else {
            entry
        };
        fx.insert(entry);
        layers[index].fx.push(*key);
    }

    let spec = Spec {
        spec_id: fnv1a32(&name),
        name,
        components: Components::default(),
        layers,
        fx,
        metadata: Metadata::default(),
    };
    spec.validate()?;
    info!(
        name = %spec.name,
        spec_id = format_args!("{:#010x}", spec.spec_id),
        layers = spec.layers.len(),
        fx = spec.fx.len(),
        size_px,
        "mapped svg to spec"
    );
    Ok(MappedSpec { spec, size_px })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::FxKey;

    const EXPLICIT_SVG: &str = r#"<svg width="96" height="96" data-wx-id="clear-day"
    data-wx-fx-ROTATE='{"speed_dps": 12, "target_z": 10}'>
  <g data-wx-asset="halo" data-wx-z="5"/>
  <g data-wx-asset="sun" data-wx-z="10"/>
</svg>"#;

    #[test]
    fn explicit_document_maps_end_to_end() {
        let mapped = map_svg_to_spec(EXPLICIT_SVG, &SvgMapOptions::default()).unwrap();
        let spec = &mapped.spec;
        assert_eq!(spec.name, "clear_day");
        assert_eq!(spec.spec_id, fnv1a32("clear_day"));
        assert_eq!(mapped.size_px, 96);

        // z-sorted, re-based to list position.
        assert_eq!(spec.layers[0].id, "halo");
        assert_eq!(spec.layers[1].id, "sun");
        assert_eq!(spec.layers[1].fx, vec![FxKey::Rotate]);

        // The authored target_z survives as written.
        let FxEntry::Rotate(rotate) = spec.fx.get(FxKey::Rotate).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(rotate.target_z, 10);
        assert_eq!(rotate.speed_dps, 12);
    }

    #[test]
    fn name_override_beats_document_hint() {
        let opts = SvgMapOptions {
            name: Some("Partly-Cloudy"),
            ..SvgMapOptions::default()
        };
        let mapped = map_svg_to_spec(EXPLICIT_SVG, &opts).unwrap();
        assert_eq!(mapped.spec.name, "partly_cloudy");
    }

    #[test]
    fn source_stem_is_the_fallback_name() {
        let opts = SvgMapOptions {
            source_stem: Some("rain_heavy"),
            ..SvgMapOptions::default()
        };
        let mapped = map_svg_to_spec(
            r#"<svg width="64" height="64"><circle r="4"/></svg>"#,
            &opts,
        )
        .unwrap();
        assert_eq!(mapped.spec.name, "rain_heavy");
    }

    #[test]
    fn missing_name_is_an_error() {
        let err = map_svg_to_spec(
            r#"<svg width="64" height="64"><circle r="4"/></svg>"#,
            &SvgMapOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn missing_size_is_an_error() {
        let opts = SvgMapOptions {
            name: Some("fog"),
            ..SvgMapOptions::default()
        };
        let err = map_svg_to_spec(r#"<svg><circle r="4"/></svg>"#, &opts).unwrap_err();
        assert!(matches!(err, WxError::MissingSize));
    }

    #[test]
    fn size_override_beats_document_dimensions() {
        let opts = SvgMapOptions {
            size_px: Some(128),
            ..SvgMapOptions::default()
        };
        let mapped = map_svg_to_spec(EXPLICIT_SVG, &opts).unwrap();
        assert_eq!(mapped.size_px, 128);
    }

    #[test]
    fn empty_document_synthesizes_one_layer() {
        let opts = SvgMapOptions {
            name: Some("overcast"),
            size_px: Some(96),
            ..SvgMapOptions::default()
        };
        let mapped = map_svg_to_spec(r#"<svg></svg>"#, &opts).unwrap();
        assert_eq!(mapped.spec.layers.len(), 1);
        assert_eq!(mapped.spec.layers[0].id, "overcast");
        assert_eq!(mapped.spec.layers[0].asset, "overcast");
    }

    #[test]
    fn nothing_drawable_falls_back_to_the_document_id() {
        let mapped = map_svg_to_spec(
            r#"<svg width="64" height="64" id="empty"><defs><circle r="3"/></defs></svg>"#,
            &SvgMapOptions::default(),
        )
        .unwrap();
        assert_eq!(mapped.spec.name, "empty");
        assert_eq!(mapped.spec.layers.len(), 1);
        assert_eq!(mapped.spec.layers[0].id, "empty");
    }

    #[test]
    fn colliding_layer_ids_are_uniquified() {
        let mapped = map_svg_to_spec(
            r#"<svg width="64" height="64" data-wx-id="rain">
  <g data-wx-asset="drop" data-wx-z="0"/>
  <g data-wx-asset="drop" data-wx-z="1"/>
  <g data-wx-asset="drop" data-wx-z="2"/>
</svg>"#,
            &SvgMapOptions::default(),
        )
        .unwrap();
        let ids: Vec<&str> = mapped.spec.layers.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["drop", "drop_1", "drop_2"]);
        // Duplicates keep pointing at the one asset.
        assert!(mapped.spec.layers.iter().all(|l| l.asset == "drop"));
    }

    #[test]
    fn deduplicated_lines_share_the_first_asset() {
        let mapped = map_svg_to_spec(
            r##"<svg width="64" height="64" data-wx-id="rain">
  <line id="d1" x1="0" y1="0" x2="0" y2="9" stroke="#8cf" stroke-width="2"/>
  <line id="d2" x1="8" y1="0" x2="8" y2="9" stroke="#8cf" stroke-width="2"/>
</svg>"##,
            &SvgMapOptions::default(),
        )
        .unwrap();
        assert_eq!(mapped.spec.layers[0].asset, "d1");
        assert_eq!(mapped.spec.layers[1].id, "d2");
        assert_eq!(mapped.spec.layers[1].asset, "d1");
    }

    #[test]
    fn untargeted_hint_attaches_to_a_single_layer() {
        let mapped = map_svg_to_spec(
            r#"<svg width="64" height="64" data-wx-id="mist"
    data-wx-fx-FLOW_X='{"amp_x": 6}'>
  <g data-wx-asset="bank" data-wx-z="0"/>
</svg>"#,
            &SvgMapOptions::default(),
        )
        .unwrap();
        assert_eq!(mapped.spec.layers[0].fx, vec![FxKey::FlowX]);
    }

    #[test]
    fn untargeted_hint_inherits_the_layers_authored_z() {
        let mapped = map_svg_to_spec(
            r#"<svg width="96" height="96" data-wx-id="clear-day"
    data-wx-fx-ROTATE='{"speed_dps": 12}'>
  <g data-wx-asset="sun" data-wx-z="10"/>
</svg>"#,
            &SvgMapOptions::default(),
        )
        .unwrap();
        assert_eq!(mapped.spec.layers.len(), 1);
        assert_eq!(mapped.spec.layers[0].asset, "sun");
        let FxEntry::Rotate(rotate) = mapped.spec.fx.get(FxKey::Rotate).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(rotate.target_z, 10);
    }

    #[test]
    fn untargeted_hint_is_dropped_with_multiple_layers() {
        let mapped = map_svg_to_spec(
            r#"<svg width="64" height="64" data-wx-id="mist"
    data-wx-fx-FLOW_X='{"amp_x": 6}'>
  <g data-wx-asset="bank" data-wx-z="0"/>
  <g data-wx-asset="veil" data-wx-z="1"/>
</svg>"#,
            &SvgMapOptions::default(),
        )
        .unwrap();
        assert!(!mapped.spec.fx.contains_key(FxKey::FlowX));
        assert!(mapped.spec.layers.iter().all(|l| l.fx.is_empty()));
    }

    #[test]
    fn hint_targeting_a_missing_z_is_dropped() {
        let mapped = map_svg_to_spec(
            r#"<svg width="64" height="64" data-wx-id="mist"
    data-wx-fx-JITTER='{"amp_px": 2, "target_z": 99}'>
  <g data-wx-asset="bank" data-wx-z="0"/>
  <g data-wx-asset="veil" data-wx-z="1"/>
</svg>"#,
            &SvgMapOptions::default(),
        )
        .unwrap();
        assert!(!mapped.spec.fx.contains_key(FxKey::Jitter));
    }

    #[test]
    fn ill_typed_hint_is_a_mapping_error() {
        let err = map_svg_to_spec(
            r#"<svg width="64" height="64" data-wx-id="mist"
    data-wx-fx-FLASH='{"period_ms": "soon"}'>
  <g data-wx-asset="bank" data-wx-z="0"/>
</svg>"#,
            &SvgMapOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("FLASH"));
    }

    #[test]
    fn inferred_animation_reaches_the_spec() {
        let mapped = map_svg_to_spec(
            r#"<svg width="96" height="96" data-wx-id="clear-day">
  <g data-wx-asset="sun" data-wx-z="0">
    <animateTransform attributeName="transform" type="rotate"
        values="0 48 48; 360 48 48" dur="10s"/>
  </g>
</svg>"#,
            &SvgMapOptions::default(),
        )
        .unwrap();
        let FxEntry::Rotate(rotate) = mapped.spec.fx.get(FxKey::Rotate).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(rotate.period_ms, 10_000);
        assert_eq!(rotate.pivot_x, Some(48));
        assert_eq!(mapped.spec.layers[0].fx, vec![FxKey::Rotate]);
    }

    #[test]
    fn mapped_spec_round_trips_through_canonical_json() {
        let mapped = map_svg_to_spec(EXPLICIT_SVG, &SvgMapOptions::default()).unwrap();
        let json = mapped.spec.to_canonical_json().unwrap();
        assert_eq!(Spec::from_canonical_json(&json).unwrap(), mapped.spec);
    }
}
