//! SVG structural analysis.
//!
//! Turns a loosely-structured SVG document into an ordered set of
//! candidate layers plus effect-parameter hints, without rendering
//! anything. Two mutually exclusive discovery modes:
//!
//! - explicit: the author annotated elements with `data-wx-asset` and
//!   `data-wx-z` (plus optional geometry/opacity annotations);
//! - heuristic: no annotations anywhere, so every drawable element
//!   outside `<defs>` becomes a candidate in document order.
//!
//! Effect hints come from `data-wx-fx-<KEY>` attributes on the root
//! (embedded JSON) and from declarative animation children; the explicit
//! source always wins and is never overwritten.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::error::{WxError, WxResult};
use crate::fx::FxKey;
use crate::ident::sanitize_key;
use crate::xml::XmlTree;

/// One candidate layer as discovered in the SVG, before mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct SvgLayer {
    pub z: i32,
    pub asset_key: String,
    /// Set when this candidate renders identically to an earlier one and
    /// should reference that candidate's asset instead of minting its own.
    pub asset_ref: Option<String>,
    pub x: i32,
    pub y: i32,
    pub w: Option<i32>,
    pub h: Option<i32>,
    pub pivot_x: Option<i32>,
    pub pivot_y: Option<i32>,
    pub opacity: i32,
}

/// Analyzer output; lives only for the duration of one mapping pass.
#[derive(Debug, Default)]
pub struct SvgDocument {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub layers: Vec<SvgLayer>,
    /// Raw effect hints keyed by effect kind; values are the embedded or
    /// inferred JSON parameter objects.
    pub fx_hints: BTreeMap<FxKey, serde_json::Value>,
    /// `data-wx-id` (or `id`) from the root element.
    pub name_hint: Option<String>,
}

const DRAWABLE_TAGS: [&str; 9] = [
    "path", "circle", "rect", "ellipse", "line", "polyline", "polygon", "g", "use",
];

/// Parse an SVG document into its intermediate structural form.
pub fn parse_svg(input: &str) -> WxResult<SvgDocument> {
    let tree = XmlTree::parse(input)?;
    let root = tree.root();

    let name_hint = tree
        .attr(root, "data-wx-id")
        .or_else(|| tree.attr(root, "id"))
        .map(str::to_string);

    let mut width = parse_dimension(tree.attr(root, "width"), "width")?;
    let mut height = parse_dimension(tree.attr(root, "height"), "height")?;
    if width.is_none() || height.is_none() {
        let (vb_w, vb_h) = parse_viewbox(tree.attr(root, "viewBox"));
        width = width.or(vb_w);
        height = height.or(vb_h);
    }

    let mut layers = Vec::new();
    let mut element_z: HashMap<usize, i32> = HashMap::new();

    // Explicit mode: any element carrying both annotations.
    for idx in tree.indices() {
        if tree.has_ancestor_tag(idx, "defs") {
            continue;
        }
        let (Some(asset_key), Some(z_raw)) =
            (tree.attr(idx, "data-wx-asset"), tree.attr(idx, "data-wx-z"))
        else {
            continue;
        };
        let z = parse_z(z_raw)?;
        layers.push(SvgLayer {
            z,
            asset_key: asset_key.to_string(),
            asset_ref: None,
            x: parse_coord(tree.attr(idx, "data-wx-x"), "data-wx-x")?.unwrap_or(0),
            y: parse_coord(tree.attr(idx, "data-wx-y"), "data-wx-y")?.unwrap_or(0),
            w: parse_coord(tree.attr(idx, "data-wx-w"), "data-wx-w")?,
            h: parse_coord(tree.attr(idx, "data-wx-h"), "data-wx-h")?,
            pivot_x: parse_coord(tree.attr(idx, "data-wx-pivot-x"), "data-wx-pivot-x")?,
            pivot_y: parse_coord(tree.attr(idx, "data-wx-pivot-y"), "data-wx-pivot-y")?,
            opacity: parse_coord(tree.attr(idx, "data-wx-opacity"), "data-wx-opacity")?
                .unwrap_or(255),
        });
        element_z.insert(idx, z);
    }

    let explicit = !layers.is_empty();
    if !explicit {
        discover_heuristic_layers(&tree, &mut layers, &mut element_z);
    }
    debug!(layer_count = layers.len(), explicit, "discovered candidate layers");

    let mut fx_hints = parse_explicit_fx(&tree, root)?;
    infer_fx_from_animations(&tree, &element_z, &mut fx_hints)?;

    Ok(SvgDocument {
        width,
        height,
        layers,
        fx_hints,
        name_hint,
    })
}

fn discover_heuristic_layers(
    tree: &XmlTree,
    layers: &mut Vec<SvgLayer>,
    element_z: &mut HashMap<usize, i32>,
) {
    let id_map = tree.id_map();
    let mut signature_map: HashMap<LineSignature, String> = HashMap::new();
    let mut index = 0i32;

    for idx in tree.indices() {
        if tree.has_ancestor_tag(idx, "defs") {
            continue;
        }
        let mut visited = HashSet::new();
        if !is_drawable(tree, idx, &id_map, &mut visited) {
            continue;
        }

        let asset_key = if tree.tag(idx) == "use" {
            match use_href(tree, idx) {
                Some(ref_id) if id_map.contains_key(ref_id) => {
                    sanitize_key(Some(ref_id), index as usize)
                }
                _ => sanitize_key(tree.attr(idx, "id"), index as usize),
            }
        } else {
            sanitize_key(tree.attr(idx, "id"), index as usize)
        };

        let asset_ref = line_signature(tree, idx, &id_map).and_then(|signature| {
            match signature_map.get(&signature) {
                Some(existing) => Some(existing.clone()),
                None => {
                    signature_map.insert(signature, asset_key.clone());
                    None
                }
            }
        });

        layers.push(SvgLayer {
            z: index,
            asset_key,
            asset_ref,
            x: 0,
            y: 0,
            w: None,
            h: None,
            pivot_x: None,
            pivot_y: None,
            opacity: 255,
        });
        element_z.insert(idx, index);
        index += 1;
    }
}

/// Recursive drawable test: group wrappers and `<use>` indirection are
/// resolved down to a leaf shape with the minimum attributes required to
/// render. The visited set turns indirection cycles into "not drawable".
fn is_drawable(
    tree: &XmlTree,
    idx: usize,
    id_map: &HashMap<&str, usize>,
    visited: &mut HashSet<usize>,
) -> bool {
    if !visited.insert(idx) {
        return false;
    }
    let tag = tree.tag(idx);
    if !DRAWABLE_TAGS.contains(&tag) {
        return false;
    }
    match tag {
        "use" => match use_href(tree, idx).and_then(|href| id_map.get(href)) {
            Some(&target) => is_drawable(tree, target, id_map, visited),
            None => false,
        },
        "g" => {
            for &child in tree.children(idx) {
                if is_drawable(tree, child, id_map, visited) {
                    return true;
                }
            }
            false
        }
        "path" => tree.attr(idx, "d").is_some_and(|d| !d.is_empty()),
        "circle" => tree.attr(idx, "r").is_some(),
        "ellipse" => tree.attr(idx, "rx").is_some() && tree.attr(idx, "ry").is_some(),
        "rect" => tree.attr(idx, "width").is_some() && tree.attr(idx, "height").is_some(),
        "line" => ["x1", "y1", "x2", "y2"]
            .into_iter()
            .all(|a| tree.attr(idx, a).is_some()),
        "polyline" | "polygon" => tree.attr(idx, "points").is_some(),
        _ => true,
    }
}

fn use_href<'a>(tree: &'a XmlTree, idx: usize) -> Option<&'a str> {
    tree.attr(idx, "href")
        .or_else(|| tree.attr(idx, "xlink:href"))
        .map(|href| href.trim_start_matches('#'))
}

/// Rendering signature for deduplication. Only line segments are
/// supported: repeated stroke primitives sharing one gradient are the
/// dominant redundancy in hand-authored icons.
#[derive(PartialEq, Eq, Hash)]
struct LineSignature {
    dx_milli: i64,
    dy_milli: i64,
    stroke_width: Option<String>,
    stroke_linecap: Option<String>,
    stroke_miterlimit: Option<String>,
    paint_id: Option<String>,
}

fn line_signature(
    tree: &XmlTree,
    idx: usize,
    id_map: &HashMap<&str, usize>,
) -> Option<LineSignature> {
    if tree.tag(idx) != "line" {
        return None;
    }
    let coord = |name: &str| -> Option<f64> {
        tree.attr(idx, name).unwrap_or("0").trim().parse().ok()
    };
    let (x1, y1, x2, y2) = (coord("x1")?, coord("y1")?, coord("x2")?, coord("y2")?);
    let to_milli = |d: f64| (d * 1000.0).round() as i64;

    Some(LineSignature {
        dx_milli: to_milli(x2 - x1),
        dy_milli: to_milli(y2 - y1),
        stroke_width: tree.attr(idx, "stroke-width").map(str::to_string),
        stroke_linecap: tree.attr(idx, "stroke-linecap").map(str::to_string),
        stroke_miterlimit: tree.attr(idx, "stroke-miterlimit").map(str::to_string),
        paint_id: resolve_paint_id(tree, tree.attr(idx, "stroke"), id_map),
    })
}

/// Extract the fragment reference from a `url(#...)` paint value.
fn paint_href(value: &str) -> Option<&str> {
    let raw = value.trim();
    if !raw.starts_with("url(") {
        return None;
    }
    let (_, after_hash) = raw.split_once('#')?;
    Some(after_hash.trim_end_matches(')').trim())
}

/// Canonicalize a paint reference by chasing `href` indirection chains
/// down to the defining element's id. Cycles fall back to the original
/// reference.
fn resolve_paint_id(
    tree: &XmlTree,
    paint: Option<&str>,
    id_map: &HashMap<&str, usize>,
) -> Option<String> {
    let first_ref = paint_href(paint?)?;
    let mut current = id_map.get(first_ref).copied();
    let mut visited: HashSet<&str> = HashSet::new();
    while let Some(idx) = current {
        let Some(current_id) = tree.attr(idx, "id") else {
            break;
        };
        if !visited.insert(current_id) {
            break;
        }
        match use_href(tree, idx) {
            Some(href) => current = id_map.get(href).copied(),
            None => return Some(current_id.to_string()),
        }
    }
    Some(first_ref.to_string())
}

fn parse_explicit_fx(tree: &XmlTree, root: usize) -> WxResult<BTreeMap<FxKey, serde_json::Value>> {
    let mut hints = BTreeMap::new();
    for key in FxKey::ALL {
        let Some(raw) = tree.attr(root, &format!("data-wx-fx-{key}")) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| WxError::mapping(format!("invalid fx json for {key}: {err}")))?;
        hints.insert(key, value);
    }
    Ok(hints)
}

/// Infer effect hints from declarative animation children. Existing
/// (explicit) hints are never overwritten; within the inferred source the
/// first matching animation wins.
fn infer_fx_from_animations(
    tree: &XmlTree,
    element_z: &HashMap<usize, i32>,
    hints: &mut BTreeMap<FxKey, serde_json::Value>,
) -> WxResult<()> {
    for idx in tree.indices() {
        match tree.tag(idx) {
            "animateTransform" => {
                let duration_ms = parse_duration_ms(tree.attr(idx, "dur"))?;
                let Some(duration_ms) = duration_ms.filter(|d| *d > 0.0) else {
                    continue;
                };
                let target_z = find_target_z(tree, idx, element_z)?.unwrap_or(0);
                match tree.attr(idx, "type") {
                    Some("rotate") if !hints.contains_key(&FxKey::Rotate) => {
                        let (delta, pivot) = parse_rotate_delta(
                            tree.attr(idx, "values"),
                            tree.attr(idx, "from"),
                            tree.attr(idx, "to"),
                        )?;
                        if delta.is_none() {
                            continue;
                        }
                        let mut hint = serde_json::json!({
                            "period_ms": duration_ms.round() as i64,
                            "target_z": target_z,
                        });
                        if let Some((px, py)) = pivot {
                            hint["pivot_x"] = serde_json::json!(px);
                            hint["pivot_y"] = serde_json::json!(py);
                        }
                        debug!(target_z, "inferred ROTATE from animateTransform");
                        hints.insert(FxKey::Rotate, hint);
                    }
                    Some("translate") => {
                        let Some((dx, dy)) = parse_translate_delta(
                            tree.attr(idx, "values"),
                            tree.attr(idx, "from"),
                            tree.attr(idx, "to"),
                        )?
                        else {
                            continue;
                        };
                        // Ties favor FALL.
                        if dy.abs() >= dx.abs() {
                            if !hints.contains_key(&FxKey::Fall) {
                                debug!(target_z, "inferred FALL from animateTransform");
                                hints.insert(
                                    FxKey::Fall,
                                    serde_json::json!({
                                        "period_ms": duration_ms.round() as i64,
                                        "target_z": target_z,
                                        "fall_dy": dy.abs().round() as i64,
                                    }),
                                );
                            }
                        } else if !hints.contains_key(&FxKey::FlowX) {
                            debug!(target_z, "inferred FLOW_X from animateTransform");
                            hints.insert(
                                FxKey::FlowX,
                                serde_json::json!({
                                    "period_ms": duration_ms.round() as i64,
                                    "target_z": target_z,
                                    "amp_x": dx.abs().round() as i64,
                                }),
                            );
                        }
                    }
                    _ => {}
                }
            }
            "animate" => {
                if tree.attr(idx, "attributeName") != Some("opacity")
                    || hints.contains_key(&FxKey::Twinkle)
                {
                    continue;
                }
                let Some(duration_ms) =
                    parse_duration_ms(tree.attr(idx, "dur"))?.filter(|d| *d > 0.0)
                else {
                    continue;
                };
                let target_z = find_target_z(tree, idx, element_z)?.unwrap_or(0);
                debug!(target_z, "inferred TWINKLE from animate opacity");
                hints.insert(
                    FxKey::Twinkle,
                    serde_json::json!({
                        "period_ms": duration_ms.round() as i64,
                        "target_z": target_z,
                    }),
                );
            }
            _ => {}
        }
    }
    Ok(())
}

/// Resolve an animation element's target layer: the nearest ancestor (or
/// self) with an assigned z, either from layer discovery or from a bare
/// `data-wx-z` annotation.
fn find_target_z(
    tree: &XmlTree,
    idx: usize,
    element_z: &HashMap<usize, i32>,
) -> WxResult<Option<i32>> {
    let mut current = Some(idx);
    while let Some(i) = current {
        if let Some(z) = element_z.get(&i) {
            return Ok(Some(*z));
        }
        if let Some(raw) = tree.attr(i, "data-wx-z") {
            return Ok(Some(parse_z(raw)?));
        }
        current = tree.parent(i);
    }
    Ok(None)
}

fn parse_number(value: &str, what: &str) -> WxResult<f64> {
    let cleaned = value.trim().trim_end_matches("px").trim();
    cleaned
        .parse::<f64>()
        .map_err(|_| WxError::mapping(format!("invalid numeric value for {what}: {value:?}")))
}

fn parse_z(raw: &str) -> WxResult<i32> {
    let parsed = parse_number(raw, "data-wx-z")
        .map_err(|_| WxError::mapping(format!("data-wx-z must be an integer, got {raw:?}")))?;
    Ok(parsed as i32)
}

fn parse_coord(value: Option<&str>, what: &str) -> WxResult<Option<i32>> {
    match value {
        Some(raw) => Ok(Some(parse_number(raw, what)? as i32)),
        None => Ok(None),
    }
}

fn parse_dimension(value: Option<&str>, what: &str) -> WxResult<Option<u32>> {
    match value {
        Some(raw) => {
            let parsed = parse_number(raw, what)?;
            if parsed < 0.0 {
                return Err(WxError::mapping(format!(
                    "invalid numeric value for {what}: {raw:?}"
                )));
            }
            Ok(Some(parsed as u32))
        }
        None => Ok(None),
    }
}

/// Third/fourth viewBox numbers as a width/height fallback. A malformed
/// viewBox yields no fallback rather than an error.
fn parse_viewbox(value: Option<&str>) -> (Option<u32>, Option<u32>) {
    let Some(value) = value else {
        return (None, None);
    };
    let replaced = value.replace(',', " ");
    let parts: Vec<&str> = replaced.split_whitespace().collect();
    if parts.len() != 4 {
        return (None, None);
    }
    let dim = |s: &str| -> Option<u32> {
        let v: f64 = s.parse().ok()?;
        (v >= 0.0).then_some(v as u32)
    };
    match (dim(parts[2]), dim(parts[3])) {
        (Some(w), Some(h)) => (Some(w), Some(h)),
        _ => (None, None),
    }
}

/// Animation duration in milliseconds: `ms` suffix, `s` suffix, or a bare
/// number of seconds.
fn parse_duration_ms(value: Option<&str>) -> WxResult<Option<f64>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let raw = value.trim();
    let parsed = if let Some(ms) = raw.strip_suffix("ms") {
        ms.trim().parse::<f64>().ok()
    } else if let Some(s) = raw.strip_suffix('s') {
        s.trim().parse::<f64>().ok().map(|v| v * 1000.0)
    } else {
        raw.parse::<f64>().ok().map(|v| v * 1000.0)
    };
    match parsed {
        Some(ms) => Ok(Some(ms)),
        None => Err(WxError::mapping(format!("invalid duration: {value:?}"))),
    }
}

/// First two entries of a `values` keyframe list.
fn parse_values_pair(values: &str) -> Option<(&str, &str)> {
    let mut parts = values.split(';').map(str::trim).filter(|p| !p.is_empty());
    let first = parts.next()?;
    let second = parts.next()?;
    Some((first, second))
}

/// A rotate keyframe: leading angle plus an optional pivot 3-tuple.
fn parse_rotate_value(value: &str) -> WxResult<(f64, Option<(i32, i32)>)> {
    let replaced = value.replace(',', " ");
    let parts: Vec<&str> = replaced.split_whitespace().collect();
    let err = || WxError::mapping(format!("invalid rotate value: {value:?}"));
    let angle: f64 = parts.first().ok_or_else(err)?.parse().map_err(|_| err())?;
    let pivot = if parts.len() >= 3 {
        let px: f64 = parts[1].parse().map_err(|_| err())?;
        let py: f64 = parts[2].parse().map_err(|_| err())?;
        Some((px as i32, py as i32))
    } else {
        None
    };
    Ok((angle, pivot))
}

type RotateDelta = (Option<f64>, Option<(i32, i32)>);

fn parse_rotate_delta(
    values: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> WxResult<RotateDelta> {
    if let Some(values) = values {
        let Some((first, second)) = parse_values_pair(values) else {
            return Ok((None, None));
        };
        let (start, pivot_a) = parse_rotate_value(first)?;
        let (end, pivot_b) = parse_rotate_value(second)?;
        return Ok((Some((end - start).abs()), pivot_a.or(pivot_b)));
    }
    if let (Some(from), Some(to)) = (from, to) {
        let (start, pivot_a) = parse_rotate_value(from)?;
        let (end, pivot_b) = parse_rotate_value(to)?;
        return Ok((Some((end - start).abs()), pivot_a.or(pivot_b)));
    }
    Ok((None, None))
}

fn parse_translate_pair(value: &str) -> WxResult<(f64, f64)> {
    let replaced = value.replace(',', " ");
    let parts: Vec<&str> = replaced.split_whitespace().collect();
    let err = || WxError::mapping(format!("invalid translate pair: {value:?}"));
    if parts.len() < 2 {
        return Err(err());
    }
    let x: f64 = parts[0].parse().map_err(|_| err())?;
    let y: f64 = parts[1].parse().map_err(|_| err())?;
    Ok((x, y))
}

fn parse_translate_delta(
    values: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> WxResult<Option<(f64, f64)>> {
    if let Some(values) = values {
        let Some((first, second)) = parse_values_pair(values) else {
            return Ok(None);
        };
        let (x0, y0) = parse_translate_pair(first)?;
        let (x1, y1) = parse_translate_pair(second)?;
        return Ok(Some((x1 - x0, y1 - y0)));
    }
    if let (Some(from), Some(to)) = (from, to) {
        let (x0, y0) = parse_translate_pair(from)?;
        let (x1, y1) = parse_translate_pair(to)?;
        return Ok(Some((x1 - x0, y1 - y0)));
    }
    Ok(None)
}
