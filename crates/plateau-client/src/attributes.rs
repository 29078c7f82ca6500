//! Feature attribute retrieval with code-list resolution.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/citygml/attributes?url=&id=` | Attributes of one feature |
//! | GET    | `/citygml/features?url=&sid=` | Feature ids inside a spatial id |
//! | GET    | `/citygml/spatialid_attributes?sid=&type=` | Attributes by spatial id |
//! | GET    | `/citygml/codelists?type=&attribute=` | Code list `{"codes": {code: label}}` |
//!
//! ## Coded fields
//!
//! Any JSON object carrying a `"code"` string or number is a coded field. The
//! key it sits under names the attribute: `"bldg:usage"` splits into feature
//! type `bldg` and attribute `usage`. An unprefixed key takes its feature type
//! from the nearest enclosing object's `"type"` member.
//!
//! ## Code-list cache
//!
//! [`CodeListCache`] lives as long as the [`PlateauClient`](crate::PlateauClient)
//! that owns it and is never invalidated. Inserts are first-writer-wins: when
//! two resolutions race on the same miss, both fetch, one list is kept, and
//! both callers see that one.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlateauApiError;
use crate::gateway::HttpGateway;

/// Identifies one code list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeListKey {
    pub feature_type: String,
    pub attribute: String,
}

impl CodeListKey {
    pub fn new(feature_type: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            feature_type: feature_type.into(),
            attribute: attribute.into(),
        }
    }
}

/// A decoded code list: raw code to label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeList {
    pub key: CodeListKey,
    pub entries: BTreeMap<String, String>,
}

impl CodeList {
    pub fn label(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }
}

/// Process-lifetime store of code lists, shared across concurrent resolutions.
#[derive(Debug, Default)]
pub struct CodeListCache {
    lists: DashMap<CodeListKey, Arc<CodeList>>,
}

impl CodeListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached list for `key`, if any.
    pub fn get(&self, key: &CodeListKey) -> Option<Arc<CodeList>> {
        self.lists.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Insert `list` unless its key is already present. Returns the list now
    /// stored under the key, which is the earlier one on a race.
    pub fn insert(&self, list: CodeList) -> Arc<CodeList> {
        let entry = self
            .lists
            .entry(list.key.clone())
            .or_insert_with(|| Arc::new(list));
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

/// One coded field found in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeValue {
    /// JSON pointer to the coded object within the payload.
    pub pointer: String,
    pub feature_type: String,
    pub attribute: String,
    pub code: String,
    /// Label from the code list; absent when skipped or not listed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// An attribute payload with its coded fields resolved.
///
/// `payload` is the service response with a `"label"` member added to every
/// coded object whose label is known.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedAttributes {
    pub payload: Value,
    pub coded: Vec<AttributeValue>,
}

#[derive(Debug, Deserialize)]
struct CodeListResponse {
    #[serde(default)]
    codes: BTreeMap<String, Value>,
}

/// Fetches attribute payloads and resolves their coded values.
#[derive(Debug, Clone)]
pub struct AttributeResolver {
    gateway: HttpGateway,
    cache: Arc<CodeListCache>,
}

impl AttributeResolver {
    pub(crate) fn new(gateway: HttpGateway, cache: Arc<CodeListCache>) -> Self {
        Self { gateway, cache }
    }

    /// The cache this resolver reads and fills.
    pub fn cache(&self) -> &Arc<CodeListCache> {
        &self.cache
    }

    /// Attributes of feature `attribute_id` in the CityGML file at `feature_url`.
    ///
    /// With `skip_code_list_fetch` set, coded values are returned raw and no
    /// code-list request is made.
    ///
    /// Calls `GET {base_url}/citygml/attributes`.
    pub async fn resolve(
        &self,
        feature_url: &str,
        attribute_id: &str,
        skip_code_list_fetch: bool,
    ) -> Result<ResolvedAttributes, PlateauApiError> {
        let endpoint = "GET /citygml/attributes";
        let url = self.gateway.url(&["citygml", "attributes"])?;
        let mut query = vec![("url", feature_url), ("id", attribute_id)];
        if skip_code_list_fetch {
            query.push(("skip_code_list_fetch", "true"));
        }
        let payload: Value = self.gateway.get_json(endpoint, url, &query).await?;
        self.annotate(payload, None, skip_code_list_fetch).await
    }

    /// Feature ids contained in spatial id `sid` of the file at `feature_url`.
    ///
    /// Calls `GET {base_url}/citygml/features`.
    pub async fn features(&self, feature_url: &str, sid: &str) -> Result<Value, PlateauApiError> {
        let endpoint = "GET /citygml/features";
        let url = self.gateway.url(&["citygml", "features"])?;
        self.gateway
            .get_json(endpoint, url, &[("url", feature_url), ("sid", sid)])
            .await
    }

    /// Attributes of every `feature_type` feature in spatial id `sid`.
    ///
    /// Same skip contract as [`resolve`](Self::resolve). `feature_type` is the
    /// fallback feature type for unprefixed coded keys.
    ///
    /// Calls `GET {base_url}/citygml/spatialid_attributes`.
    pub async fn resolve_spatial(
        &self,
        sid: &str,
        feature_type: &str,
        skip_code_list_fetch: bool,
    ) -> Result<ResolvedAttributes, PlateauApiError> {
        let endpoint = "GET /citygml/spatialid_attributes";
        let url = self.gateway.url(&["citygml", "spatialid_attributes"])?;
        let mut query = vec![("sid", sid), ("type", feature_type)];
        if skip_code_list_fetch {
            query.push(("skip_code_list_fetch", "true"));
        }
        let payload: Value = self.gateway.get_json(endpoint, url, &query).await?;
        self.annotate(payload, Some(feature_type), skip_code_list_fetch)
            .await
    }

    async fn annotate(
        &self,
        mut payload: Value,
        default_type: Option<&str>,
        skip_code_list_fetch: bool,
    ) -> Result<ResolvedAttributes, PlateauApiError> {
        let mut coded = Vec::new();
        collect_coded(&payload, String::new(), None, default_type, &mut coded);

        if !skip_code_list_fetch {
            let keys: BTreeSet<CodeListKey> = coded
                .iter()
                .map(|c| CodeListKey::new(&c.feature_type, &c.attribute))
                .collect();
            let mut lists = BTreeMap::new();
            for key in keys {
                let list = self.code_list(&key).await?;
                lists.insert(key, list);
            }

            for field in &mut coded {
                let key = CodeListKey::new(&field.feature_type, &field.attribute);
                field.label = lists
                    .get(&key)
                    .and_then(|l| l.label(&field.code))
                    .map(str::to_string);
                if let (Some(label), Some(Value::Object(obj))) =
                    (&field.label, payload.pointer_mut(&field.pointer))
                {
                    obj.insert("label".into(), Value::String(label.clone()));
                }
            }
        }

        Ok(ResolvedAttributes { payload, coded })
    }

    /// Cached code list for `key`, fetching it on a miss.
    ///
    /// A 404 is cached as an empty list so unlisted attributes are asked for once.
    ///
    /// Calls `GET {base_url}/citygml/codelists`.
    pub async fn code_list(&self, key: &CodeListKey) -> Result<Arc<CodeList>, PlateauApiError> {
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit);
        }

        let endpoint = "GET /citygml/codelists";
        let url = self.gateway.url(&["citygml", "codelists"])?;
        let resp = self
            .gateway
            .get(
                endpoint,
                url,
                &[
                    ("type", key.feature_type.as_str()),
                    ("attribute", key.attribute.as_str()),
                ],
            )
            .await?;

        let entries = if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(feature_type = %key.feature_type, attribute = %key.attribute, "no code list published");
            BTreeMap::new()
        } else {
            let body: CodeListResponse = self.gateway.read_json(endpoint, resp).await?;
            body.codes
                .into_iter()
                .map(|(code, label)| (code, value_text(&label)))
                .collect()
        };

        tracing::debug!(
            feature_type = %key.feature_type,
            attribute = %key.attribute,
            entries = entries.len(),
            "code list fetched"
        );
        Ok(self.cache.insert(CodeList {
            key: key.clone(),
            entries,
        }))
    }
}

/// Walk `value`, recording every coded object.
fn collect_coded(
    value: &Value,
    pointer: String,
    parent_key: Option<&str>,
    enclosing_type: Option<&str>,
    out: &mut Vec<AttributeValue>,
) {
    match value {
        Value::Object(obj) => {
            if let (Some(key), Some(code)) = (parent_key, obj.get("code").and_then(code_text)) {
                let (feature_type, attribute) = split_attribute_key(key, enclosing_type);
                out.push(AttributeValue {
                    pointer,
                    feature_type,
                    attribute,
                    code,
                    label: None,
                });
                return;
            }
            let here = obj.get("type").and_then(Value::as_str).or(enclosing_type);
            for (k, v) in obj {
                let child = format!("{pointer}/{}", escape_pointer(k));
                collect_coded(v, child, Some(k.as_str()), here, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                collect_coded(v, format!("{pointer}/{i}"), parent_key, enclosing_type, out);
            }
        }
        _ => {}
    }
}

fn split_attribute_key(key: &str, enclosing_type: Option<&str>) -> (String, String) {
    match key.split_once(':') {
        Some((prefix, name)) if !prefix.is_empty() && !name.is_empty() => {
            (prefix.to_string(), name.to_string())
        }
        _ => (enclosing_type.unwrap_or_default().to_string(), key.to_string()),
    }
}

fn code_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
