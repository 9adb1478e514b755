//! Property tests for parameter validation and call identity.

use dcintel_core::*;
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        any::<bool>().prop_map(Scalar::Bool),
        any::<i64>().prop_map(Scalar::Int),
        any::<f64>().prop_map(Scalar::Float),
        "[ a-zA-Z0-9_-]{0,12}".prop_map(Scalar::Str),
    ]
}

fn tool() -> impl Strategy<Value = ToolId> {
    proptest::sample::select(ToolId::ALL.to_vec())
}

fn param_map() -> impl Strategy<Value = Parameters> {
    let names = proptest::sample::select(vec![
        "country", "region", "market", "limit", "lat", "lon", "window", "since", "facility_id",
        "radius_miles", "offset", "bogus",
    ]);
    proptest::collection::btree_map(names.prop_map(str::to_string), scalar(), 0..6)
}

proptest! {
    #[test]
    fn validate_never_panics(tool in tool(), p in param_map()) {
        let _ = tool.validate(&p);
    }

    #[test]
    fn validated_parameters_are_within_schema(tool in tool(), p in param_map()) {
        if let Ok(valid) = tool.validate(&p) {
            for (name, value) in &valid {
                let spec = tool.params().iter().find(|s| s.name == name);
                prop_assert!(spec.is_some(), "{} accepted unknown {}", tool, name);
                let spec = spec.unwrap();
                if let (Some((min, max)), Scalar::Int(i)) = (spec.clamp, value) {
                    prop_assert!(*i >= min && *i <= max);
                }
                if let Some(s) = value.as_str() {
                    prop_assert_eq!(s, s.trim());
                    prop_assert!(!s.is_empty());
                }
            }
            for spec in tool.params().iter().filter(|s| s.required) {
                prop_assert!(valid.contains_key(spec.name));
            }
        }
    }

    #[test]
    fn validation_is_idempotent(tool in tool(), p in param_map()) {
        if let Ok(once) = tool.validate(&p) {
            let twice = tool.validate(&once).unwrap();
            prop_assert_eq!(CallKey::of(tool, &once), CallKey::of(tool, &twice));
        }
    }

    #[test]
    fn news_limit_is_clamped(limit in -1000i64..1000) {
        let valid = ToolId::GetNews
            .validate(&params([("market", Scalar::from("SG")), ("limit", Scalar::Int(limit))]))
            .unwrap();
        prop_assert_eq!(valid.get("limit"), Some(&Scalar::Int(limit.clamp(1, 50))));
    }
}

#[test]
fn whitespace_does_not_change_call_identity() {
    let a = ToolId::GetWaterStress
        .validate(&params([("country", " SG ")]))
        .unwrap();
    let b = ToolId::GetWaterStress
        .validate(&params([("country", "SG")]))
        .unwrap();
    assert_eq!(CallKey::of(ToolId::GetWaterStress, &a), CallKey::of(ToolId::GetWaterStress, &b));
}
