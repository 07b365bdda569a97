use std::sync::Arc;
use std::thread;

use tickrules::{Mutations, Path, RuleSet};

fn arena() -> RuleSet {
    RuleSet::from_json_str(
        r#"{
        "package": "arena",
        "rules": [
            {"name": "rank", "trigger": {"type": "OnChange", "watch": ["$.Players[0].Score"]},
             "selector": {"type": "All", "entity": "Players"},
             "effects": [{"path": "$.Players[0].Rank", "value": 1}]},
            {"name": "drones", "trigger": {"type": "OnTick"},
             "selector": {"type": "Nearest", "entity": "Drones", "position": "$.self.position",
                          "origin": "$.Base.position", "limit": 3, "maxDistance": 500},
             "effects": [{"path": "$.Base.alert", "value": true}]},
            {"name": "siren", "trigger": {"type": "OnChange", "watch": ["$.Base.alert"]},
             "effects": [{"type": "Emit", "event": "siren"}]}
        ]
    }"#,
    )
    .unwrap()
}

#[test]
fn analyze_across_threads() {
    let ruleset = Arc::new(arena());
    let expected = ruleset
        .analyze()
        .into_iter()
        .map(|(n, a)| (n.to_owned(), a))
        .collect::<Vec<_>>();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let rs = Arc::clone(&ruleset);
            thread::spawn(move || {
                rs.analyze()
                    .into_iter()
                    .map(|(n, a)| (n.to_owned(), a))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn index_lookups_across_threads() {
    let ruleset = Arc::new(arena());
    let index = Arc::new(ruleset.dependency_index());

    let writes: Vec<Path> = ruleset
        .rules
        .iter()
        .flat_map(|r| r.modifies())
        .collect();

    let handles: Vec<_> = writes
        .into_iter()
        .map(|path| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                let hits: Vec<String> = index
                    .rules_affected_by(&path)
                    .into_iter()
                    .map(str::to_owned)
                    .collect();
                (path, hits)
            })
        })
        .collect();

    for handle in handles {
        let (path, hits) = handle.join().unwrap();
        match path.as_str() {
            "$.Players[0].Rank" => assert_eq!(hits, vec!["rank"]),
            "$.Base.alert" => assert_eq!(hits, vec!["siren"]),
            other => panic!("unexpected write {other}"),
        }
    }
}

#[test]
fn decode_concurrently() {
    let doc = arena().to_document();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let doc = doc.clone();
            thread::spawn(move || RuleSet::from_document(&doc).unwrap())
        })
        .collect();
    let first = arena();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), first);
    }
}

#[test]
fn ruleset_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RuleSet>();
    assert_send_sync::<tickrules::DependencyIndex>();
    assert_send_sync::<tickrules::CascadeGraph>();
}
