/*!
 * Safe Sub-Document Builder
 *
 * Wraps an untrusted fragment as `{"s1":{"s2":...<fragment>...}}` so that it
 * lands exactly at the given key path. The fragment is screened with a
 * single left-to-right pass over brace depth and string-literal state. The
 * screen over-rejects: it accepts only fragments that are one balanced object
 * or that would leave the surrounding document unparseable, so a fragment
 * can never close the wrapper early and inject sibling keys.
 */

use crate::core::config::EngineConfig;
use crate::core::errors::{DocumentError, DocumentResult};
use tracing::debug;

/// Whether `fragment` can be embedded without escaping its position
///
/// Must start with `{`. Depth starts at 1; `{` outside a string literal
/// increments it and every `}` decrements it. Depth must stay above 0 until
/// the final byte and be exactly 0 there, outside any string. Inside a
/// string, `\` consumes the byte after it, so `\"` does not close the string.
pub fn is_safe_fragment(fragment: &str) -> bool {
    let bytes = fragment.as_bytes();
    if bytes.first() != Some(&b'{') {
        return false;
    }

    let last = bytes.len() - 1;
    let mut depth: usize = 1;
    let mut in_string = false;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i == last && !in_string;
                }
            }
            _ => {}
        }
        i += 1;
    }

    false
}

/// Whether `segment` can be written between literal quotes as an object key
#[inline]
pub fn is_safe_key(segment: &str) -> bool {
    !segment.contains(|c: char| c == '"' || c == '\\')
}

/// Wrap `fragment` so it sits at `path`
///
/// `at_path(&["a", "b"], "{}")` yields `{"a":{"b":{}}}`. An empty path returns
/// the fragment itself.
pub fn at_path(path: &[&str], fragment: &str) -> DocumentResult<String> {
    if !is_safe_fragment(fragment) {
        return Err(DocumentError::UnsafeFragment);
    }
    if let Some(segment) = path.iter().rev().find(|segment| !is_safe_key(segment)) {
        return Err(DocumentError::UnsafeKey {
            segment: (*segment).to_string(),
        });
    }

    let wrapper_len: usize = path.iter().map(|segment| segment.len() + 5).sum();
    let mut document = String::with_capacity(fragment.len() + wrapper_len);
    for segment in path {
        document.push_str("{\"");
        document.push_str(segment);
        document.push_str("\":");
    }
    document.push_str(fragment);
    for _ in path {
        document.push('}');
    }

    Ok(document)
}

/// Embedding with a size limit and an optional strict syntax check
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    max_fragment_bytes: usize,
}

impl DocumentBuilder {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_fragment_bytes: config.max_fragment_bytes,
        }
    }

    pub fn max_fragment_bytes(&self) -> usize {
        self.max_fragment_bytes
    }

    /// `at_path` behind the fragment size limit
    pub fn at_path(&self, path: &[&str], fragment: &str) -> DocumentResult<String> {
        self.check_size(fragment)?;
        at_path(path, fragment).map_err(|e| {
            debug!(error = %e, depth = path.len(), "Rejected document fragment");
            e
        })
    }

    /// Like `at_path`, but the fragment must also parse as a JSON object
    pub fn at_path_strict(&self, path: &[&str], fragment: &str) -> DocumentResult<String> {
        self.check_size(fragment)?;
        match serde_json::from_str::<serde_json::Value>(fragment) {
            Ok(serde_json::Value::Object(_)) => {}
            Ok(other) => {
                return Err(DocumentError::MalformedFragment {
                    reason: format!("expected an object, found {}", json_kind(&other)),
                })
            }
            Err(e) => {
                return Err(DocumentError::MalformedFragment {
                    reason: e.to_string(),
                })
            }
        }
        self.at_path(path, fragment)
    }

    fn check_size(&self, fragment: &str) -> DocumentResult<()> {
        if fragment.len() > self.max_fragment_bytes {
            return Err(DocumentError::FragmentTooLarge {
                size: fragment.len(),
                max: self.max_fragment_bytes,
            });
        }
        Ok(())
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
