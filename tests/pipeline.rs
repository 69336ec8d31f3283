//! End-to-end: SVG fixture through mapping, packing, and extraction.

use std::collections::BTreeMap;

use wxpack::pack::{TYPE_IMG, find_entry, parse_header, parse_toc};
use wxpack::{Asset, AssetType, FxEntry, FxKey, Spec, SvgMapOptions};

const SVG: &str = include_str!("data/clear_day.svg");

fn mapped() -> wxpack::MappedSpec {
    wxpack::map_svg_to_spec(SVG, &SvgMapOptions::default()).unwrap()
}

#[test]
fn svg_fixture_maps_to_the_expected_spec() {
    let mapped = mapped();
    let spec = &mapped.spec;

    assert_eq!(spec.name, "clear_day");
    assert_eq!(mapped.size_px, 96);

    let ids: Vec<&str> = spec.layers.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, ["halo", "sun"]);
    assert_eq!(spec.layers[1].fx, vec![FxKey::Rotate]);

    let FxEntry::Rotate(rotate) = spec.fx.get(FxKey::Rotate).unwrap() else {
        panic!("wrong variant");
    };
    assert_eq!(rotate.speed_dps, 12);
    assert_eq!(rotate.target_z, 10);
}

#[test]
fn mapped_spec_packs_and_extracts_losslessly() {
    let mapped = mapped();
    let spec = mapped.spec;

    let assets: Vec<Asset> = spec
        .layers
        .iter()
        .map(|layer| {
            Asset::new(
                &layer.asset,
                AssetType::Image,
                mapped.size_px,
                format!("{}_{}.bin", layer.asset, mapped.size_px),
            )
            .unwrap()
        })
        .collect();
    let payloads: BTreeMap<String, Vec<u8>> = spec
        .layers
        .iter()
        .enumerate()
        .map(|(i, layer)| (layer.asset.clone(), vec![i as u8 + 1; 9 + i]))
        .collect();

    let data = wxpack::build_pack(std::slice::from_ref(&spec), &assets, &payloads).unwrap();
    wxpack::verify_pack_crc(&data).unwrap();

    let header = parse_header(&data).unwrap();
    assert_eq!(header.toc_count as usize, assets.len() + 1);
    let entries = parse_toc(&data, &header).unwrap();
    for asset in &assets {
        let entry = find_entry(&entries, asset.asset_hash, TYPE_IMG, Some(96)).unwrap();
        assert_eq!(entry.length as usize, payloads[&asset.asset_key].len());
    }

    let value = wxpack::extract_spec_json(&data, spec.spec_id).unwrap();
    let roundtripped = Spec::from_canonical_json(&value.to_string()).unwrap();
    assert_eq!(roundtripped, spec);
}
