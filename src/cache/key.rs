//! Cache key construction.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Component owning core (non-plugin) entries.
pub const CORE_COMPONENT: &str = "core";

/// A cache key of the form `{component}-{resource}-{discriminator}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn new(component: &str, resource: &str, discriminator: &str) -> Self {
    Self(format!("{}-{}-{}", component, resource, discriminator))
  }

  /// Key for a remote call result.
  ///
  /// A call with one plain scalar parameter keeps the readable form, so
  /// `get_courses {userid: 5}` maps to `core-get_courses-5`. Calls without
  /// parameters are keyed by site. Anything that could read the same as
  /// another parameter set (several parameters, values containing `-`, strings
  /// that look like numbers) is keyed by a hash of the canonical JSON instead.
  ///
  /// Single-parameter calls differing only in the parameter name share a key;
  /// store entries with [`params_fingerprint`] to tell them apart.
  pub fn for_call(component: &str, method: &str, params: &Value, site_id: &str) -> Self {
    Self::new(component, method, &call_discriminator(params, site_id))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for CacheKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for CacheKey {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

/// Full SHA256 of the canonical params JSON.
///
/// Stored next to call results so a hit is only served to the exact
/// parameter set that produced it.
pub fn params_fingerprint(params: &Value) -> String {
  // serde_json maps are sorted, so equal params serialize identically
  let mut hasher = Sha256::new();
  hasher.update(params.to_string().as_bytes());
  hex::encode(hasher.finalize())
}

const HASH_LEN: usize = 16;

fn call_discriminator(params: &Value, site_id: &str) -> String {
  match params {
    Value::Null => site_id.to_string(),
    Value::Object(map) if map.is_empty() => site_id.to_string(),
    Value::Object(map) if map.len() == 1 => map
      .values()
      .next()
      .and_then(plain_text)
      .filter(|text| text != site_id && !looks_like_hash(text))
      .unwrap_or_else(|| params_hash(params)),
    other => params_hash(other),
  }
}

/// Text of a scalar that cannot be mistaken for another value or a joined key.
fn plain_text(value: &Value) -> Option<String> {
  let text = match value {
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    Value::String(s) => {
      if s.parse::<f64>().is_ok() || s.parse::<bool>().is_ok() {
        return None;
      }
      s.clone()
    }
    _ => return None,
  };
  if text.is_empty() || text.contains('-') {
    return None;
  }
  Some(text)
}

fn looks_like_hash(text: &str) -> bool {
  text.len() == HASH_LEN && text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Fingerprint truncated for readable keys.
fn params_hash(params: &Value) -> String {
  let mut digest = params_fingerprint(params);
  digest.truncate(HASH_LEN);
  digest
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn key(params: Value) -> CacheKey {
    CacheKey::for_call(CORE_COMPONENT, "get_courses", &params, "site1")
  }

  #[test]
  fn single_scalar_param_stays_readable() {
    assert_eq!(key(json!({"userid": 5})).as_str(), "core-get_courses-5");
    assert_eq!(key(json!({"shortname": "algebra"})).as_str(), "core-get_courses-algebra");
  }

  #[test]
  fn several_params_are_hashed_in_name_order() {
    let a = key(json!({"sectionid": 3, "courseid": 12}));
    let b = key(json!({"courseid": 12, "sectionid": 3}));

    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), "core-get_courses-".len() + HASH_LEN);
    assert_ne!(a.as_str(), "core-get_courses-12-3");
  }

  #[test]
  fn colliding_readable_forms_are_told_apart() {
    // Same readable key; the fingerprint separates them.
    let user = json!({"userid": 5});
    let course = json!({"courseid": 5});
    assert_eq!(key(user.clone()), key(course.clone()));
    assert_ne!(params_fingerprint(&user), params_fingerprint(&course));

    assert_ne!(key(json!({"a": "1-2"})), key(json!({"a": 1, "b": 2})));
    assert_ne!(key(json!({"a": "5"})), key(json!({"a": 5})));
    assert_ne!(key(json!({"a": "true"})), key(json!({"a": true})));
  }

  #[test]
  fn values_that_look_like_other_keys_are_hashed() {
    assert_ne!(key(json!({"id": "site1"})), key(json!({})));
    let hashed = key(json!({"a": 1, "b": 2}));
    let suffix = &hashed.as_str()["core-get_courses-".len()..];
    assert_ne!(key(json!({"id": suffix})), hashed);
    assert_ne!(key(json!({"name": ""})).as_str(), "core-get_courses-");
  }

  #[test]
  fn empty_params_use_site() {
    let key = CacheKey::for_call("forum", "site_info", &json!({}), "site1");
    assert_eq!(key.as_str(), "forum-site_info-site1");

    let key = CacheKey::for_call("forum", "site_info", &Value::Null, "site2");
    assert_eq!(key.as_str(), "forum-site_info-site2");
  }

  #[test]
  fn nested_params_are_hashed_stably() {
    let a = key(json!({"criteria": [{"key": "name", "value": "x"}]}));
    let b = key(json!({"criteria": [{"value": "x", "key": "name"}]}));
    let c = key(json!({"criteria": [{"key": "name", "value": "y"}]}));

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.as_str().len(), "core-get_courses-".len() + HASH_LEN);
  }

  #[test]
  fn explicit_keys_follow_convention() {
    assert_eq!(CacheKey::new("lang", "core", "en").to_string(), "lang-core-en");
  }
}
