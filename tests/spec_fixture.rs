use wxpack::{FxEntry, FxKey, Spec};

#[test]
fn json_fixture_validates() {
    let s = include_str!("data/clear_day.spec.json");
    let spec = Spec::from_canonical_json(s).unwrap();
    assert_eq!(spec.name, "clear_day");
    assert_eq!(spec.spec_id, wxpack::hash::fnv1a32("clear_day"));
    assert_eq!(spec.layers.len(), 2);

    let FxEntry::Rotate(rotate) = spec.fx.get(FxKey::Rotate).unwrap() else {
        panic!("wrong variant");
    };
    assert!(rotate.enabled);
    assert_eq!(rotate.target_z, 1);
}

#[test]
fn fixture_survives_a_canonical_rewrite() {
    let spec = Spec::from_canonical_json(include_str!("data/clear_day.spec.json")).unwrap();
    let rewritten = spec.to_canonical_json().unwrap();
    assert_eq!(Spec::from_canonical_json(&rewritten).unwrap(), spec);
}
