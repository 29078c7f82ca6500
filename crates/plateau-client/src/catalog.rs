//! Typed client for the PLATEAU CityGML data catalog.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/datacatalog/citygml/{conditions}` | CityGML files for a mesh or municipality |

use std::collections::BTreeMap;
use std::fmt;

use plateau_core::{FeatureType, MeshCode, ValidationError};
use serde::Deserialize;

use crate::error::PlateauApiError;
use crate::gateway::HttpGateway;

/// Catalog query condition: a mesh code (`m:53394611`) or a municipality code (`13101`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditions(String);

impl Conditions {
    /// Query by mesh code.
    pub fn mesh(code: &MeshCode) -> Self {
        Self(format!("m:{code}"))
    }

    /// Query by municipality code.
    pub fn municipality(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Parse a raw condition string as typed by a user.
    ///
    /// `m:`-prefixed input must carry a valid mesh code; anything else must be
    /// a non-empty run of digits.
    pub fn parse(raw: &str) -> Result<Self, PlateauApiError> {
        let raw = raw.trim();
        if let Some(mesh) = raw.strip_prefix("m:") {
            return Ok(Self::mesh(&MeshCode::parse(mesh)?));
        }
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidCondition(raw.to_string()).into());
        }
        Ok(Self(raw.to_string()))
    }

    /// The condition as sent in the request path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog response. Fields the client does not use are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub cities: Vec<CatalogCity>,
}

/// One municipality's entry in the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCity {
    #[serde(default)]
    pub city_code: Option<String>,
    #[serde(default)]
    pub city_name: Option<String>,
    /// Files keyed by feature type code (`bldg`, `tran`, ...).
    #[serde(default)]
    pub files: BTreeMap<String, Vec<CatalogFile>>,
}

/// One CityGML file in the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    pub url: String,
    /// Mesh code the file covers, when the catalog provides one.
    #[serde(default)]
    pub code: Option<String>,
}

/// Client for the data catalog.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    gateway: HttpGateway,
}

impl CatalogClient {
    pub(crate) fn new(gateway: HttpGateway) -> Self {
        Self { gateway }
    }

    /// Fetch the raw catalog for a condition.
    ///
    /// Calls `GET {base_url}/datacatalog/citygml/{conditions}`.
    pub async fn catalog(&self, conditions: &Conditions) -> Result<CatalogResponse, PlateauApiError> {
        let endpoint = format!("GET /datacatalog/citygml/{conditions}");
        let url = self
            .gateway
            .url(&["datacatalog", "citygml", conditions.as_str()])?;
        self.gateway.get_json(&endpoint, url, &[]).await
    }

    /// URLs of every CityGML file of `feature_type` matching `conditions`,
    /// in catalog order. An empty list is not an error.
    pub async fn list_citygml(
        &self,
        conditions: &Conditions,
        feature_type: FeatureType,
    ) -> Result<Vec<String>, PlateauApiError> {
        let catalog = self.catalog(conditions).await?;
        let urls = urls_for(&catalog, feature_type);
        if urls.is_empty() {
            tracing::warn!(%conditions, %feature_type, "catalog has no files for feature type");
        }
        Ok(urls)
    }
}

fn urls_for(catalog: &CatalogResponse, feature_type: FeatureType) -> Vec<String> {
    catalog
        .cities
        .iter()
        .filter_map(|city| city.files.get(feature_type.code()))
        .flatten()
        .map(|f| f.url.clone())
        .collect()
}
