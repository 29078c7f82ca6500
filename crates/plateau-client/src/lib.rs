//! # plateau-client -- Typed async client for the PLATEAU API
//!
//! Provides typed access to the parts of the PLATEAU API used to locate,
//! package and retrieve CityGML data:
//! - **Catalog** via `/datacatalog/citygml/{conditions}`
//! - **Packaging jobs** via `/citygml/pack`
//! - **Attributes** via `/citygml/attributes`, `/citygml/features`,
//!   `/citygml/spatialid_attributes`, with code lists from `/citygml/codelists`
//! - **Retrieval** of packaged archives to local disk
//!
//! ## Architecture
//!
//! All API sub-clients share one [`HttpGateway`] (one `reqwest::Client`, one
//! base URL). Archive downloads use a second client with no total deadline.
//! The gateway never retries; the only place a failed request is
//! tolerated is the bounded transient-failure budget inside
//! [`PackJobOrchestrator::await_completion`].
//!
//! The code-list cache is owned by [`PlateauClient`] and lives exactly as long
//! as it does.

pub mod attributes;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pack;
pub(crate) mod retry;
pub mod retrieval;

pub use attributes::{AttributeResolver, CodeListCache, ResolvedAttributes};
pub use catalog::{CatalogClient, Conditions};
pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use config::PlateauApiConfig;
pub use error::{ErrorKind, PlateauApiError};
pub use gateway::HttpGateway;
pub use pack::PackJobOrchestrator;
pub use retrieval::{RetrievalPipeline, RetrievedArchive};

use std::path::Path;
use std::sync::Arc;

use plateau_core::{FeatureType, MeshCode, PackJob};
use serde::Serialize;

const USER_AGENT: &str = concat!("plateau-client/", env!("CARGO_PKG_VERSION"));

/// Top-level PLATEAU client. Holds sub-clients for each API area.
#[derive(Debug, Clone)]
pub struct PlateauClient {
    config: PlateauApiConfig,
    catalog: CatalogClient,
    pack: PackJobOrchestrator,
    attributes: AttributeResolver,
    retrieval: RetrievalPipeline,
}

/// Outcome of [`PlateauClient::fetch_mesh`].
#[derive(Debug, Clone, Serialize)]
pub struct MeshFetch {
    pub mesh_code: MeshCode,
    pub feature_types: Vec<FeatureType>,
    pub source_urls: Vec<String>,
    pub job: PackJob,
    pub archive: RetrievedArchive,
}

impl PlateauClient {
    /// Create a client from configuration using the system clock.
    pub fn new(config: PlateauApiConfig) -> Result<Self, PlateauApiError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a client whose packaging poll loop uses `clock`.
    pub fn with_clock(
        config: PlateauApiConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PlateauApiError> {
        let auth = match &config.api_token {
            Some(token) => {
                let mut value =
                    reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                        .map_err(|_| PlateauApiError::Config(config::ConfigError::InvalidToken))?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PlateauApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        // Connect-bounded only; the retrieval pipeline times out stalled reads.
        let transfer_http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PlateauApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let gateway = HttpGateway::new(http, config.base_url.clone(), auth);
        Ok(Self {
            catalog: CatalogClient::new(gateway.clone()),
            pack: PackJobOrchestrator::new(
                gateway.clone(),
                clock,
                config.max_transient_poll_failures,
            ),
            attributes: AttributeResolver::new(gateway.clone(), Arc::new(CodeListCache::new())),
            retrieval: RetrievalPipeline::new(gateway, transfer_http, config.request_timeout()),
            config,
        })
    }

    /// Configuration this client was built from.
    pub fn config(&self) -> &PlateauApiConfig {
        &self.config
    }

    /// Access the data catalog client.
    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// Access the packaging-job orchestrator.
    pub fn pack(&self) -> &PackJobOrchestrator {
        &self.pack
    }

    /// Access the attribute resolver and its code-list cache.
    pub fn attributes(&self) -> &AttributeResolver {
        &self.attributes
    }

    /// Access the archive retrieval pipeline.
    pub fn retrieval(&self) -> &RetrievalPipeline {
        &self.retrieval
    }

    /// Catalog lookup, packaging, wait and download for one mesh.
    ///
    /// Source URLs of every requested feature type are packed into a single
    /// job. Waits with the configured poll interval and pack timeout, then
    /// downloads and extracts into `target_dir`.
    pub async fn fetch_mesh(
        &self,
        mesh_code: &MeshCode,
        feature_types: &[FeatureType],
        target_dir: &Path,
    ) -> Result<MeshFetch, PlateauApiError> {
        let conditions = Conditions::mesh(mesh_code);
        let mut source_urls = Vec::new();
        for &feature_type in feature_types {
            source_urls.extend(self.catalog.list_citygml(&conditions, feature_type).await?);
        }

        let job = self.pack.submit(source_urls.iter().cloned()).await?;
        let job = self
            .pack
            .await_job(job, self.config.poll_interval(), self.config.pack_timeout())
            .await?;
        let descriptor = self.pack.resolve_download(&job)?;

        let archive = self
            .retrieval
            .download(
                &descriptor.url,
                target_dir,
                Some(mesh_code),
                feature_types,
                true,
            )
            .await?;

        Ok(MeshFetch {
            mesh_code: mesh_code.clone(),
            feature_types: feature_types.to_vec(),
            source_urls,
            job,
            archive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::Zeroizing;

    #[test]
    fn builds_from_mock_config() {
        let cfg = PlateauApiConfig::local_mock("http://127.0.0.1:9").unwrap();
        let client = PlateauClient::new(cfg).unwrap();
        assert_eq!(client.config().timeout_secs, 5);
        assert!(client.attributes().cache().is_empty());
    }

    #[test]
    fn rejects_token_with_header_breaking_characters() {
        let mut cfg = PlateauApiConfig::local_mock("http://127.0.0.1:9").unwrap();
        cfg.api_token = Some(Zeroizing::new("bad\ntoken".into()));
        let err = PlateauClient::new(cfg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
