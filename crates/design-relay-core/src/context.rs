//! Session context for design conversations.
//!
//! The context is owned by the downstream agent: the relay keeps the exact
//! object the agent returned and hands it back unchanged. The typed accessors
//! are a read-only view used to check invariants, and they accept both the
//! snake_case and camelCase spellings of each known key.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::SchemaViolation;

const LAST_PROMPT: &[&str] = &["last_prompt", "lastPrompt"];
const DESIGN: &[&str] = &["design"];
const BLUEPRINT_ID: &[&str] = &["blueprint_id", "blueprintId"];
const PRINT_PROVIDER_ID: &[&str] = &["print_provider_id", "printProviderId"];
const SELECTED_VARIANT_IDS: &[&str] = &["selected_variant_ids", "selectedVariantIds", "variant_ids"];

const IMAGE_URL: &[&str] = &["image_url", "imageUrl", "design_image_url"];
const STATUS: &[&str] = &["status"];
const ORIGINAL_PROMPT: &[&str] = &["original_prompt", "originalPrompt"];
const CURRENT_PROMPT: &[&str] = &["current_prompt", "currentPrompt"];

/// Lifecycle state of a generated design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesignStatus {
    /// The user is still iterating on the design.
    Refining,
    /// The user accepted the design.
    Approved,
}

/// The design currently attached to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignState {
    /// Preview image location.
    pub image_url: String,
    /// Current status.
    pub status: DesignStatus,
    /// Prompt the design was first generated from.
    pub original_prompt: String,
    /// Prompt after the latest refinement.
    pub current_prompt: String,
}

impl DesignState {
    /// A freshly generated design, still being refined.
    #[must_use]
    pub fn refining(image_url: impl Into<String>, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            image_url: image_url.into(),
            status: DesignStatus::Refining,
            original_prompt: prompt.clone(),
            current_prompt: prompt,
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Result<Self, SchemaViolation> {
        Ok(Self {
            image_url: required(obj, IMAGE_URL)?,
            status: required(obj, STATUS)?,
            original_prompt: required(obj, ORIGINAL_PROMPT)?,
            current_prompt: required(obj, CURRENT_PROMPT)?,
        })
    }
}

/// Typed view of the keys the relay understands.
#[derive(Debug, Clone, Default, PartialEq)]
struct ContextView {
    last_prompt: Option<String>,
    design: Option<DesignState>,
    blueprint_id: Option<i64>,
    print_provider_id: Option<i64>,
    selected_variant_ids: Option<Vec<i64>>,
}

impl ContextView {
    fn decode(raw: &Map<String, Value>) -> Result<Self, SchemaViolation> {
        let design = match lookup(raw, DESIGN) {
            None => None,
            Some((key, Value::Object(obj))) => {
                Some(DesignState::from_object(obj).map_err(|v| v.within(key))?)
            }
            Some((key, _)) => return Err(SchemaViolation::at(key, "must be an object")),
        };

        Ok(Self {
            last_prompt: optional(raw, LAST_PROMPT)?,
            design,
            blueprint_id: optional(raw, BLUEPRINT_ID)?,
            print_provider_id: optional(raw, PRINT_PROVIDER_ID)?,
            selected_variant_ids: optional(raw, SELECTED_VARIANT_IDS)?,
        })
    }
}

/// Accumulated state of one conversation.
///
/// Serializes to exactly the object it was built from, so keys the relay
/// does not model and the agent's own key spellings survive every hop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    raw: Map<String, Value>,
    view: ContextView,
}

impl SessionContext {
    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Most recent raw user utterance.
    #[must_use]
    pub fn last_prompt(&self) -> Option<&str> {
        self.view.last_prompt.as_deref()
    }

    /// Current design, if one has been generated.
    #[must_use]
    pub const fn design(&self) -> Option<&DesignState> {
        self.view.design.as_ref()
    }

    /// Selected catalog template.
    #[must_use]
    pub const fn blueprint_id(&self) -> Option<i64> {
        self.view.blueprint_id
    }

    /// Selected print provider for the blueprint.
    #[must_use]
    pub const fn print_provider_id(&self) -> Option<i64> {
        self.view.print_provider_id
    }

    /// Chosen product variants, in selection order.
    #[must_use]
    pub fn selected_variant_ids(&self) -> Option<&[i64]> {
        self.view.selected_variant_ids.as_deref()
    }

    /// Raw value stored under `key`, exactly as the agent sent it.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// The underlying object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Check the cross-field invariants.
    ///
    /// - an approved design carries non-empty `image_url`, `original_prompt`
    ///   and `current_prompt`;
    /// - variants and a print provider can only be chosen once a blueprint is;
    /// - a variant is selected at most once.
    ///
    /// # Errors
    /// Returns the first violated invariant. The path uses the key spelling
    /// found in the context.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if let (Some(design), Some((design_key, Value::Object(obj)))) =
            (&self.view.design, lookup(&self.raw, DESIGN))
        {
            if design.status == DesignStatus::Approved {
                for (keys, value) in [
                    (IMAGE_URL, &design.image_url),
                    (ORIGINAL_PROMPT, &design.original_prompt),
                    (CURRENT_PROMPT, &design.current_prompt),
                ] {
                    if value.trim().is_empty() {
                        return Err(SchemaViolation::at(
                            format!("{design_key}.{}", key_for(obj, keys)),
                            "must not be empty for an approved design",
                        ));
                    }
                }
            }
        }

        if self.view.blueprint_id.is_none() {
            if self.view.print_provider_id.is_some() {
                return Err(SchemaViolation::at(
                    key_for(&self.raw, PRINT_PROVIDER_ID),
                    "a print provider requires a selected blueprint_id",
                ));
            }
            if self.view.selected_variant_ids.is_some() {
                return Err(SchemaViolation::at(
                    key_for(&self.raw, SELECTED_VARIANT_IDS),
                    "variants require a selected blueprint_id",
                ));
            }
        }

        if let Some(ids) = &self.view.selected_variant_ids {
            let mut seen = HashSet::with_capacity(ids.len());
            for (idx, id) in ids.iter().enumerate() {
                if !seen.insert(id) {
                    return Err(SchemaViolation::at(
                        format!("{}[{idx}]", key_for(&self.raw, SELECTED_VARIANT_IDS)),
                        format!("variant {id} selected more than once"),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Decode and validate a context from an untyped JSON value.
    ///
    /// # Errors
    /// Returns a violation if the value is not a context object or breaks an
    /// invariant.
    pub fn from_value(value: Value) -> Result<Self, SchemaViolation> {
        let Value::Object(raw) = value else {
            return Err(SchemaViolation::at("$", "context must be an object"));
        };
        let context = Self::try_from(raw)?;
        context.validate()?;
        Ok(context)
    }
}

/// Type-checks the known keys without enforcing the cross-field invariants.
impl TryFrom<Map<String, Value>> for SessionContext {
    type Error = SchemaViolation;

    fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
        let view = ContextView::decode(&raw)?;
        Ok(Self { raw, view })
    }
}

impl Serialize for SessionContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SessionContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// First spelling of a key that is present with a non-null value.
fn lookup<'a>(
    obj: &'a Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    keys.iter()
        .find_map(|&key| obj.get(key).filter(|v| !v.is_null()).map(|v| (key, v)))
}

fn key_for(obj: &Map<String, Value>, keys: &[&'static str]) -> &'static str {
    lookup(obj, keys).map_or(keys[0], |(key, _)| key)
}

fn optional<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    keys: &[&'static str],
) -> Result<Option<T>, SchemaViolation> {
    lookup(obj, keys)
        .map(|(key, value)| {
            T::deserialize(value).map_err(|e| SchemaViolation::from_serde(key, &e))
        })
        .transpose()
}

fn required<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    keys: &[&'static str],
) -> Result<T, SchemaViolation> {
    optional(obj, keys)?.ok_or_else(|| SchemaViolation::at(keys[0], "missing field"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn approved() -> Value {
        json!({
            "image_url": "https://img.example/1.png",
            "status": "approved",
            "original_prompt": "smiling robot",
            "current_prompt": "smiling robot, blue"
        })
    }

    fn decode(value: Value) -> SessionContext {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_default_is_empty() {
        let ctx = SessionContext::default();
        assert!(ctx.is_empty());
        assert_eq!(serde_json::to_value(&ctx).unwrap(), json!({}));
    }

    #[test]
    fn test_reads_camel_and_snake_keys() {
        let snake = SessionContext::from_value(json!({
            "last_prompt": "I want a coffee mug",
            "blueprint_id": 741,
            "selected_variant_ids": [1, 2]
        }))
        .unwrap();
        let camel = SessionContext::from_value(json!({
            "lastPrompt": "I want a coffee mug",
            "blueprintId": 741,
            "selectedVariantIds": [1, 2]
        }))
        .unwrap();

        for ctx in [&snake, &camel] {
            assert_eq!(ctx.last_prompt(), Some("I want a coffee mug"));
            assert_eq!(ctx.blueprint_id(), Some(741));
            assert_eq!(ctx.selected_variant_ids(), Some(&[1, 2][..]));
        }
        assert_ne!(snake, camel, "each keeps its own spelling");
    }

    #[test]
    fn test_serializes_keys_as_received() {
        let original = json!({
            "lastPrompt": "I want a coffee mug",
            "design": {
                "design_image_url": "https://img.example/2.png",
                "status": "refining",
                "original_prompt": "cat",
                "current_prompt": "cat"
            },
            "blueprint_matches": [{"id": 6, "title": "Unisex Tee"}]
        });
        let ctx = SessionContext::from_value(original.clone()).unwrap();

        assert_eq!(ctx.design(), Some(&DesignState::refining("https://img.example/2.png", "cat")));
        assert_eq!(ctx.get("blueprint_matches").unwrap()[0]["title"], "Unisex Tee");
        assert_eq!(serde_json::to_value(&ctx).unwrap(), original);
    }

    #[test]
    fn test_both_spellings_present_is_not_an_error() {
        let ctx = SessionContext::from_value(json!({
            "last_prompt": "tee",
            "lastPrompt": "tee",
            "blueprint_id": 6,
            "selected_variant_ids": [12],
            "variant_ids": [12]
        }))
        .unwrap();
        assert_eq!(ctx.last_prompt(), Some("tee"));
        assert_eq!(ctx.selected_variant_ids(), Some(&[12][..]));
        assert_eq!(ctx.as_map().len(), 5);
    }

    #[test]
    fn test_null_counts_as_absent() {
        let ctx = SessionContext::from_value(json!({"design": null, "blueprint_id": null})).unwrap();
        assert_eq!(ctx.design(), None);
        assert_eq!(ctx.blueprint_id(), None);
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_approved_design_requires_fields() {
        assert!(SessionContext::from_value(json!({ "design": approved() })).is_ok());

        let mut design = approved();
        design["current_prompt"] = json!("  ");
        let err = SessionContext::from_value(json!({ "design": design })).unwrap_err();
        assert_eq!(err.path, "design.current_prompt");

        let err = SessionContext::from_value(json!({"design": {
            "imageUrl": "",
            "status": "approved",
            "originalPrompt": "p",
            "currentPrompt": "p"
        }}))
        .unwrap_err();
        assert_eq!(err.path, "design.imageUrl");
    }

    #[test]
    fn test_refining_design_may_have_empty_fields() {
        let ctx = decode(json!({"design": {
            "image_url": "", "status": "refining", "original_prompt": "", "current_prompt": ""
        }}));
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn test_variants_require_blueprint() {
        let ctx = decode(json!({ "selected_variant_ids": [17] }));
        assert_eq!(ctx.validate().unwrap_err().path, "selected_variant_ids");

        let ctx = decode(json!({ "printProviderId": 3 }));
        assert_eq!(ctx.validate().unwrap_err().path, "printProviderId");
    }

    #[test]
    fn test_duplicate_variant_rejected() {
        let ctx = decode(json!({ "blueprint_id": 6, "selected_variant_ids": [4, 9, 4] }));
        assert_eq!(ctx.validate().unwrap_err().path, "selected_variant_ids[2]");
    }

    #[test]
    fn test_from_value_rejects_mistyped_fields() {
        let err = SessionContext::from_value(json!({ "blueprint_id": "741" })).unwrap_err();
        assert_eq!(err.path, "blueprint_id");
        assert!(err.reason.contains("invalid type"), "{err}");

        let err = SessionContext::from_value(json!({ "design": { "status": "approved" } })).unwrap_err();
        assert_eq!(err.path, "design.image_url");

        let err = SessionContext::from_value(json!(["not", "an", "object"])).unwrap_err();
        assert_eq!(err.path, "$");
    }
}
