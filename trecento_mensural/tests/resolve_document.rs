// End-to-end test: JSON document in, per-position durations out.
//
// Builds two voices in the JSON tree form, one in senaria perfecta and one
// in quaternaria with semiminimae and a ligature, resolves the whole
// document through the locator, and checks every position's length. Also
// covers the failure paths a caller sees: a document with no mode, and a
// config file that forbids the budget-doubling fallback.

use trecento_mensural::config::EngineConfig;
use trecento_mensural::document::{Document, Node, NodeId};
use trecento_mensural::error::MensuralError;
use trecento_mensural::locator::{Locator, Measure, Position};

const TWO_VOICES: &str = r#"[
    { "container": [
        { "mode": ".p." },
        { "symbol": { "type": "SB", "pitch": "D5" } },
        { "symbol": { "type": "SB", "pitch": "C5" } },
        { "symbol": { "type": "SB", "pitch": "B-4" } },
        "punctus",
        { "symbol": { "type": "SB", "pitch": "A4" } },
        { "symbol": { "type": "SB", "pitch": "G4" } },
        "punctus",
        { "symbol": { "type": "B", "pitch": "A4" } }
    ] },
    { "container": [
        { "mode": "quaternaria" },
        { "symbol": { "type": "M", "pitch": "D4" } },
        { "symbol": { "type": "SM", "pitch": "E4" } },
        { "symbol": { "type": "SM", "pitch": "F4" } },
        { "symbol": { "type": "SM", "pitch": "G4" } },
        { "symbol": { "type": "SM", "rest": true } },
        { "symbol": { "type": "SM", "pitch": "F4" } },
        "punctus",
        { "ligature": {
            "pitches": ["G4", "A4", "F4"],
            "stems": [ { "index": 0, "direction": "up", "orientation": "left" } ]
        } }
    ] }
]"#;

fn voices(doc: &Document) -> Vec<NodeId> {
    doc.containers().into_iter().skip(1).collect()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_two_voice_document() {
    let doc: Document = serde_json::from_str(TWO_VOICES).unwrap();
    let locator = Locator::default();
    let lengths = locator.resolve_document(&doc).unwrap();

    let voices = voices(&doc);
    assert_eq!(voices.len(), 2);

    let upper = doc.children(voices[0]);
    let expected_upper = [
        (1, 2.0),
        (2, 2.0),
        (3, 2.0),
        (5, 2.0),
        (6, 4.0),
        (8, 6.0),
    ];
    for (index, length) in expected_upper {
        let got = lengths[&Position::symbol(upper[index])];
        assert!(approx(got, length), "upper[{index}] = {got}, want {length}");
    }

    let lower = doc.children(voices[1]);
    let third = 2.0 / 3.0;
    let expected_lower = [
        (1, 1.0),
        (2, 0.5),
        (3, 0.5),
        (4, third),
        (5, third),
        (6, third),
    ];
    for (index, length) in expected_lower {
        let got = lengths[&Position::symbol(lower[index])];
        assert!(approx(got, length), "lower[{index}] = {got}, want {length}");
    }

    let ligature = lower[8];
    assert!(matches!(doc.get(ligature), Ok(Node::Ligature(_))));
    for (member, length) in [2.0, 2.0, 8.0].into_iter().enumerate() {
        let got = lengths[&Position { node: ligature, member }];
        assert!(approx(got, length), "ligature[{member}] = {got}, want {length}");
    }

    // 6 + 6 symbols, 3 ligature notes.
    assert_eq!(lengths.len(), 15);
}

#[test]
fn test_single_position_matches_document_pass() {
    let doc: Document = serde_json::from_str(TWO_VOICES).unwrap();
    let all = Locator::default().resolve_document(&doc).unwrap();

    let fresh = Locator::default();
    for (&position, &length) in &all {
        let got = fresh.duration_of(&doc, position).unwrap();
        assert!(approx(got, length), "{position:?}: {got} vs {length}");
    }
}

#[test]
fn test_measures_sum_to_their_budget() {
    let doc: Document = serde_json::from_str(TWO_VOICES).unwrap();
    let locator = Locator::default();
    for measure in locator.measures(&doc).unwrap() {
        let res = locator.resolve_measure(&doc, &measure).unwrap();
        assert!(res.exact, "{measure:?}");
        assert_eq!(res.doublings, 0);
        // Ligatures may span several breves; runs fill exactly one.
        if let Measure::Run(_) = measure {
            assert!(approx(res.total(), res.minima_per_brevis), "{res:?}");
        }
    }
}

#[test]
fn test_document_without_mode() {
    let json = r#"[ { "container": [ { "symbol": { "type": "SB", "pitch": "A4" } } ] } ]"#;
    let doc: Document = serde_json::from_str(json).unwrap();
    let err = Locator::default().resolve_document(&doc).unwrap_err();
    assert!(matches!(err, MensuralError::UnresolvableContext(_)));
}

#[test]
fn test_config_file_disables_fallback() {
    let dir = std::env::temp_dir().join(format!("trecento_mensural_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("engine.json");
    std::fs::write(&path, r#"{ "max_fallback_doublings": 0 }"#).unwrap();
    let config = EngineConfig::load(&path).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    let json = r#"[
        { "mode": ".q." },
        { "symbol": { "type": "SB", "pitch": "A4" } },
        { "symbol": { "type": "SB", "pitch": "B4" } },
        { "symbol": { "type": "SB", "pitch": "C5" } }
    ]"#;
    let doc: Document = serde_json::from_str(json).unwrap();

    let strict = Locator::new(config);
    let err = strict.resolve_document(&doc).unwrap_err();
    assert!(matches!(err, MensuralError::UnreconcilableMeasure { .. }));

    // The default config doubles once and reads the measure as 2 + 2 + 4.
    let lengths = Locator::default().resolve_document(&doc).unwrap();
    let total: f64 = lengths.values().sum();
    assert!(approx(total, 8.0));
}
