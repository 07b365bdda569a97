use serde_json::json;
use tickrules::{
    Activation, Decode, DecodeError, DistanceUnit, Effect, Encode, Operand, Path, PathKind, Rule,
    RuleSet, Segment, Trigger, View, ViewOperation,
};

#[test]
fn empty_rule_set() {
    let ruleset = RuleSet::from_document(&json!({})).unwrap();
    assert!(ruleset.rules.is_empty());
    assert!(ruleset.dependency_index().is_empty());
    assert!(ruleset.cascade_graph().execution_order().is_empty());
}

#[test]
fn document_must_be_an_object() {
    for doc in [json!([]), json!("rules"), json!(3), json!(null)] {
        let err = RuleSet::from_document(&doc).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }), "{doc}");
    }
}

#[test]
fn duplicate_rule_names_are_kept() {
    let rule = json!({"name": "dup", "trigger": {"type": "OnStart"},
                      "effects": [{"type": "Log", "message": "x"}]});
    let ruleset = RuleSet::from_document(&json!({"rules": [rule.clone(), rule]})).unwrap();
    assert_eq!(ruleset.rules.len(), 2);
    assert_eq!(ruleset.cascade_graph().execution_order(), vec!["dup", "dup"]);
}

#[test]
fn path_prefixes() {
    let cases = [
        ("$.World.tick", PathKind::State),
        ("state:$.World.tick", PathKind::State),
        ("param:radius", PathKind::Param),
        ("view:ranked", PathKind::View),
        ("const:3", PathKind::Const),
        ("self.position", PathKind::SelfRelative),
        ("$", PathKind::Current),
        ("health", PathKind::Field),
    ];
    for (raw, kind) in cases {
        assert_eq!(Path::new(raw).kind(), kind, "{raw}");
    }
}

#[test]
fn path_segments() {
    assert_eq!(
        Path::new("state:$.Players[12].inventory").segments().unwrap(),
        vec![
            Segment::Field("Players".into()),
            Segment::Index(12),
            Segment::Field("inventory".into()),
        ]
    );
    assert!(Path::new("$.Players[x]").segments().is_err());
    assert!(Path::new("self.hp").segments().is_err());
}

#[test]
fn deprecated_current_marker_still_decodes() {
    let operand = Operand::decode(&json!("$")).unwrap();
    assert_eq!(operand.as_path().map(Path::kind), Some(PathKind::Current));
}

#[test]
fn const_paths_are_not_reads() {
    let rule = Rule::decode(&json!({
        "name": "r",
        "trigger": {"type": "OnCondition",
                    "condition": {"left": "const:3", "op": ">", "right": "param:x"}},
        "effects": [{"path": "$.a", "value": "const:1"}]
    }))
    .unwrap();
    assert!(rule.analyze().depends_on.is_empty());
}

#[test]
fn literal_null_is_a_value() {
    let effect = Effect::decode(&json!({"path": "$.World.winner", "value": null})).unwrap();
    assert_eq!(effect, Effect::set("$.World.winner", Operand::Literal(serde_json::Value::Null)));
}

#[test]
fn watch_must_name_state_paths() {
    let err = Trigger::decode(&json!({"type": "OnChange", "watch": ["param:x"]})).unwrap_err();
    assert!(matches!(err.root_cause(), DecodeError::InvalidValue { field: "watch", .. }));

    let err = Trigger::decode(&json!({"type": "OnChange", "watch": []})).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        DecodeError::InvalidValue { .. } | DecodeError::MissingField { .. }
    ));
}

#[test]
fn watch_paths_are_canonical() {
    let trigger =
        Trigger::decode(&json!({"type": "OnChange", "watch": ["state:$.World.season"]})).unwrap();
    assert_eq!(
        trigger.activation,
        Activation::OnChange {
            watch: vec![Path::new("$.World.season")]
        }
    );
}

#[test]
fn zero_tick_interval_is_invalid() {
    let err = Trigger::decode(&json!({"type": "OnTick", "interval": 0})).unwrap_err();
    assert!(matches!(err.root_cause(), DecodeError::InvalidValue { field: "interval", .. }));
}

#[test]
fn bad_duration_is_invalid() {
    let err = Trigger::decode(&json!({"type": "OnTimer", "duration": "soon"})).unwrap_err();
    assert!(matches!(err.root_cause(), DecodeError::InvalidValue { field: "duration", .. }));
}

#[test]
fn overflowing_duration_is_invalid() {
    for key in ["duration", "startDelay"] {
        let mut doc = json!({"type": "OnTimer", "duration": "1s"});
        doc[key] = json!("10000000000000000000s10000000000000000000s");
        let err = Trigger::decode(&doc).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DecodeError::InvalidValue { field, .. } if *field == key
        ));
    }
    let err = RuleSet::from_json_str(
        r#"{"rules": [{"name": "r", "trigger": {"type": "OnSchedule",
            "interval": "10000000000000000000s10000000000000000000s"},
            "effects": [{"type": "Log", "message": "x"}]}]}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("interval"), "{err}");
}

#[test]
fn distance_needs_a_target() {
    let err = ViewOperation::decode(&json!({"type": "Distance", "from": "position"})).unwrap_err();
    assert!(matches!(err.root_cause(), DecodeError::MissingField { .. }));
}

#[test]
fn distance_units() {
    assert_eq!("nmi".parse::<DistanceUnit>().unwrap().meters(), 1852.0);
    assert_eq!(DistanceUnit::default(), DistanceUnit::Meters);
    assert!("parsec".parse::<DistanceUnit>().is_err());
}

#[test]
fn view_flags() {
    let view = View::decode(&json!({
        "source": "Units",
        "params": {"radius": {"type": "number", "default": 50}},
        "pipeline": [
            {"type": "Nearest", "origin": "param:center", "count": 5},
            {"type": "Count"}
        ]
    }))
    .unwrap();
    assert!(view.is_spatial());
    assert!(view.is_aggregation());
    assert!(view.is_parameterized());
    assert!(!View::new("Units").is_aggregation());
}

#[test]
fn toggles_are_tri_state() {
    let mut rule = Rule::decode(&json!({
        "name": "r",
        "trigger": {"type": "OnStart", "enabled": false},
        "effects": [{"type": "Log", "message": "x"}]
    }))
    .unwrap();
    assert!(rule.is_enabled());
    assert!(!rule.trigger.is_enabled());
    assert_eq!(rule.enabled, None);

    rule.set_enabled(false);
    rule.trigger.set_enabled(true);
    let encoded = rule.encode();
    assert_eq!(encoded["enabled"], json!(false));
    assert_eq!(encoded["trigger"]["enabled"], json!(true));
}

#[test]
fn deep_sequences_decode() {
    let mut effect = json!({"path": "$.leaf", "value": 0});
    for _ in 0..64 {
        effect = json!({"type": "Sequence", "effects": [effect]});
    }
    let rule = Rule::decode(&json!({
        "name": "deep",
        "trigger": {"type": "OnStart"},
        "effects": [effect]
    }))
    .unwrap();
    assert!(rule.analyze().modifies.contains(&Path::new("$.leaf")));
}
