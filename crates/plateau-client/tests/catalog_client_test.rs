//! Contract tests for CatalogClient and the end-to-end mesh fetch.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET    | `/datacatalog/citygml/{conditions}` | `list_citygml_*`, `fetch_mesh_*` |

use std::io::{Cursor, Write};
use std::sync::Arc;

use plateau_client::{Conditions, ErrorKind, ManualClock, PlateauApiConfig, PlateauClient};
use plateau_core::{FeatureType, MeshCode, PackStatus};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(mock_server: &MockServer) -> PlateauClient {
    let config = PlateauApiConfig::local_mock(&mock_server.uri()).unwrap();
    PlateauClient::with_clock(config, Arc::new(ManualClock::new())).unwrap()
}

fn catalog_body(base: &str) -> serde_json::Value {
    serde_json::json!({
        "cities": [{
            "cityCode": "13101",
            "cityName": "千代田区",
            "files": {
                "bldg": [{"code": "53394611", "url": format!("{base}/files/53394611_bldg_6697_op.gml")}],
                "tran": [{"code": "53394611", "url": format!("{base}/files/53394611_tran_6697_op.gml")}]
            }
        }]
    })
}

// ── GET /datacatalog/citygml/{conditions} ────────────────────────────

#[tokio::test]
async fn list_citygml_filters_by_feature_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datacatalog/citygml/m:53394611"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body("https://assets.example.com")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let mesh = MeshCode::parse("53394611").unwrap();
    let urls = client
        .catalog()
        .list_citygml(&Conditions::mesh(&mesh), FeatureType::Bldg)
        .await
        .unwrap();
    assert_eq!(urls, ["https://assets.example.com/files/53394611_bldg_6697_op.gml"]);
}

#[tokio::test]
async fn list_citygml_empty_result_is_not_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datacatalog/citygml/13101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"cities": []})))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let urls = client
        .catalog()
        .list_citygml(&Conditions::municipality("13101"), FeatureType::Veg)
        .await
        .unwrap();
    assert!(urls.is_empty());
}

#[tokio::test]
async fn list_citygml_handles_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datacatalog/citygml/m:5339"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client
        .catalog()
        .list_citygml(&Conditions::parse("m:5339").unwrap(), FeatureType::Bldg)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamError);
    assert!(err.to_string().contains("maintenance"));
}

// ── fetch_mesh ───────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_mesh_runs_catalog_pack_wait_and_download() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/datacatalog/citygml/m:53394611"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body(&base)))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/citygml/pack"))
        .and(body_json(serde_json::json!({
            "urls": [
                format!("{base}/files/53394611_bldg_6697_op.gml"),
                format!("{base}/files/53394611_tran_6697_op.gml")
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "mesh-job"})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/citygml/pack/mesh-job/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "processing"})))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/citygml/pack/mesh-job/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "succeeded"})))
        .mount(&mock_server)
        .await;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for name in ["53394611_bldg_6697_op.gml", "53394611_tran_6697_op.gml"] {
        writer
            .start_file(format!("udx/{name}"), zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<CityModel/>").unwrap();
    }
    let archive = writer.finish().unwrap().into_inner();
    Mock::given(method("GET"))
        .and(path("/citygml/pack/mesh-job.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(&mock_server)
        .await;

    let target = tempfile::tempdir().unwrap();
    let client = test_client(&mock_server);
    let mesh = MeshCode::parse("53394611").unwrap();
    let fetched = client
        .fetch_mesh(&mesh, &[FeatureType::Bldg, FeatureType::Tran], target.path())
        .await
        .unwrap();

    assert_eq!(fetched.job.status(), PackStatus::Completed);
    assert_eq!(fetched.source_urls.len(), 2);
    assert_eq!(fetched.job.requested_urls().len(), 2);
    assert_eq!(
        fetched.archive.extract_dir.as_deref(),
        Some(target.path().join("extract_53394611_bldg-tran").as_path())
    );
    assert_eq!(fetched.archive.extracted.len(), 2);
}

#[tokio::test]
async fn fetch_mesh_with_no_catalog_files_is_empty_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datacatalog/citygml/m:5339"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"cities": []})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/citygml/pack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let target = tempfile::tempdir().unwrap();
    let client = test_client(&mock_server);
    let err = client
        .fetch_mesh(&MeshCode::parse("5339").unwrap(), &[FeatureType::Bldg], target.path())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyRequest);
}
