/*!
 * Sub-Document Builder Tests
 */

use permission_tree::document::{at_path, is_safe_fragment, is_safe_key, DocumentBuilder};
use permission_tree::{DocumentError, EngineConfig};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};

#[test]
fn test_injection_attempt_is_rejected() {
    // Would close the wrapper early and smuggle in a sibling key
    let payload = r#"{"a":1}},"admin":{"b":2"#;
    assert!(!is_safe_fragment(payload));
    assert_eq!(at_path(&["user"], payload), Err(DocumentError::UnsafeFragment));
}

#[test]
fn test_key_injection_is_rejected() {
    assert!(!is_safe_key(r#"x":{"admin"#));
    assert_eq!(
        at_path(&[r#"x":{"admin"#], "{}"),
        Err(DocumentError::UnsafeKey {
            segment: r#"x":{"admin"#.to_string()
        })
    );
}

#[test]
fn test_fragment_checked_before_keys() {
    assert_eq!(at_path(&["bad\\"], "nope"), Err(DocumentError::UnsafeFragment));
}

#[test]
fn test_embedded_document_parses() {
    let document = at_path(&["profile", "settings"], r#"{"theme":"dark","tabs":[1,2]}"#).unwrap();
    let value: Value = serde_json::from_str(&document).unwrap();
    assert_eq!(
        value,
        json!({"profile": {"settings": {"theme": "dark", "tabs": [1, 2]}}})
    );
}

#[test]
fn test_builder_uses_configured_limit() {
    let builder = DocumentBuilder::new(&EngineConfig::default().with_max_fragment_bytes(4));
    assert_eq!(builder.max_fragment_bytes(), 4);
    assert_eq!(builder.at_path(&["a"], "{}"), Ok(r#"{"a":{}}"#.to_string()));
    assert_eq!(
        builder.at_path(&["a"], r#"{"b":1}"#),
        Err(DocumentError::FragmentTooLarge { size: 7, max: 4 })
    );
}

fn pointer(path: &[String]) -> String {
    path.iter()
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}

proptest! {
    #[test]
    fn prop_embedded_fragment_is_reachable_at_path(
        path in prop::collection::vec("[a-z0-9 ]{0,8}", 0..5),
        fields in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9 ]{0,10}", 0..4),
    ) {
        let fragment_value = json!(fields);
        let fragment = serde_json::to_string(&fragment_value).unwrap();
        prop_assert!(is_safe_fragment(&fragment));

        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        let document = at_path(&segments, &fragment).unwrap();
        let value: Value = serde_json::from_str(&document).unwrap();

        prop_assert_eq!(value.pointer(&pointer(&path)), Some(&fragment_value));
    }

    #[test]
    fn prop_keys_with_quote_or_backslash_are_unsafe(
        prefix in "[a-z]{0,4}",
        bad in prop::sample::select(vec!['"', '\\']),
        suffix in "[a-z]{0,4}",
    ) {
        let segment = format!("{}{}{}", prefix, bad, suffix);
        prop_assert!(!is_safe_key(&segment));
    }
}
