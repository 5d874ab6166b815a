use clap::Parser;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tft_catalog::core::etl::PipelineStage;
use tft_catalog::{CatalogPipeline, CliConfig, EtlEngine, EtlError, LocalStorage};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-body";

fn trait_export() -> Value {
    json!({
        "data": {
            "298-2": {"checkId": "298", "type": "0", "name": "枪手", "prefix": "枪手造成額外傷害", "level": "2", "num": "4", "realDesc": "(4) 更多傷害"},
            "298-1": {"checkId": "298", "type": "0", "name": "枪手", "prefix": "枪手造成額外傷害", "level": "1", "num": "2", "realDesc": "(2) 額外傷害"},
            "10-1": {"checkId": 10, "type": 0, "name": "約德爾人", "prefix": "約德爾人", "level": 1, "num": "3", "realDesc": "(3) 閃避"},
            "20-1": {"checkId": "20", "type": "1", "name": "法師", "prefix": "法師", "level": "1", "num": "2", "realDesc": "(2) 法術強度"}
        }
    })
}

fn unit_export() -> Value {
    json!({
        "data": {
            "23332": {"id": "23332", "name": "崔絲塔娜", "price": "2", "hero_EN": "tristana", "species": "10|298", "class": "-1", "skillName": "爆破", "skillDesc": "造成傷害"},
            "101": {"id": "101", "name": "露璐", "price": "3", "hero_EN": "lulu", "species": "10", "class": "20|10|999"},
            "7": {"id": "7", "name": "木桩假人", "price": "0", "hero_EN": "dummy", "species": "-1", "class": "-1"},
            "55": {"id": "55", "name": "維迦", "price": "4", "hero_EN": "veigar", "species": "10", "class": "20"}
        }
    })
}

struct Fixture {
    root: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("data")).unwrap();
        std::fs::write(
            root.path().join("data/trait.json"),
            serde_json::to_vec(&trait_export()).unwrap(),
        )
        .unwrap();
        std::fs::write(
            root.path().join("data/chess.json"),
            serde_json::to_vec(&unit_export()).unwrap(),
        )
        .unwrap();
        Self { root }
    }

    fn path(&self, relative: &str) -> String {
        self.root.path().join(relative).to_string_lossy().into_owned()
    }

    fn config(&self, server: &MockServer) -> CliConfig {
        let template = format!("{}/champions/{{hero}}.png", server.base_url());
        CliConfig::parse_from([
            "tft-catalog".to_string(),
            "--traits-input".to_string(),
            self.path("data/trait.json"),
            "--units-input".to_string(),
            self.path("data/chess.json"),
            "--output-dir".to_string(),
            self.path("out"),
            "--image-dir".to_string(),
            self.path("public/images/units"),
            "--asset-url-template".to_string(),
            template,
            "--request-interval-ms".to_string(),
            "0".to_string(),
            "--concurrent-downloads".to_string(),
            "2".to_string(),
        ])
    }

    fn engine(&self, server: &MockServer) -> EtlEngine<CatalogPipeline<LocalStorage, CliConfig>> {
        let pipeline =
            CatalogPipeline::new(LocalStorage::new(self.root.path()), self.config(server)).unwrap();
        EtlEngine::new(pipeline).with_timeout(Duration::from_secs(30))
    }

    fn catalog(&self) -> Value {
        let bytes = std::fs::read(self.root.path().join("out/units.json")).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

async fn mock_image<'a>(server: &'a MockServer, hero: &str) -> httpmock::Mock<'a> {
    let path = format!("/champions/{}.png", hero);
    server
        .mock_async(|when, then| {
            when.method(GET).path(path);
            then.status(200)
                .header("Content-Type", "image/png")
                .body(PNG_BYTES);
        })
        .await
}

#[tokio::test]
async fn test_end_to_end_catalog_build() {
    let fixture = Fixture::new();
    let server = MockServer::start_async().await;
    let tristana = mock_image(&server, "tristana").await;
    let lulu = mock_image(&server, "lulu").await;
    let veigar = mock_image(&server, "veigar").await;

    let summary = fixture.engine(&server).run().await.unwrap();

    tristana.assert_async().await;
    lulu.assert_async().await;
    veigar.assert_async().await;
    assert_eq!(summary.traits, 3);
    assert_eq!(summary.origins, 2);
    assert_eq!(summary.classes, 1);
    assert_eq!(summary.units_skipped_placeholder, 1);
    assert_eq!(summary.downloads_fetched, 3);
    assert_eq!(summary.units_published, 3);

    let traits: Value = serde_json::from_slice(
        &std::fs::read(fixture.root.path().join("out/trait-new.json")).unwrap(),
    )
    .unwrap();
    let trait_ids: Vec<u64> = traits
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_u64().unwrap())
        .collect();
    assert_eq!(trait_ids, vec![10, 20, 298]);
    let gunner = &traits[2];
    assert_eq!(gunner["type"], "ORIGIN");
    assert_eq!(gunner["cnName"], "枪手");
    assert_eq!(gunner["levels"][0]["needNumber"], 2);
    assert_eq!(gunner["levels"][1]["level"], 2);

    let catalog = fixture.catalog();
    let units = catalog.as_array().unwrap();
    let unit_ids: Vec<u64> = units.iter().map(|u| u["id"].as_u64().unwrap()).collect();
    assert_eq!(unit_ids, vec![55, 101, 23332]);

    // species 10 + class 20|10|999：去重後依序解析，999 不存在直接略過
    let lulu_traits: Vec<u64> = units[1]["traits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_u64().unwrap())
        .collect();
    assert_eq!(lulu_traits, vec![10, 20]);
    assert_eq!(units[1]["skill"]["name"], "");

    assert_eq!(units[2]["image"], "/images/units/23332.png");
    assert_eq!(units[2]["skill"]["name"], "爆破");
    assert_eq!(
        std::fs::read(fixture.root.path().join("public/images/units/23332.png")).unwrap(),
        PNG_BYTES
    );
    assert!(!fixture
        .root
        .path()
        .join("public/images/units/7.png")
        .exists());
}

#[tokio::test]
async fn test_second_run_uses_cache_and_is_byte_identical() {
    let fixture = Fixture::new();
    let server = MockServer::start_async().await;
    let tristana = mock_image(&server, "tristana").await;
    let lulu = mock_image(&server, "lulu").await;
    let veigar = mock_image(&server, "veigar").await;

    fixture.engine(&server).run().await.unwrap();
    let first = std::fs::read(fixture.root.path().join("out/units.json")).unwrap();

    let summary = fixture.engine(&server).run().await.unwrap();
    let second = std::fs::read(fixture.root.path().join("out/units.json")).unwrap();

    assert_eq!(first, second);
    assert_eq!(summary.downloads_fetched, 0);
    assert_eq!(summary.downloads_cached, 3);
    assert_eq!(tristana.hits_async().await, 1);
    assert_eq!(lulu.hits_async().await, 1);
    assert_eq!(veigar.hits_async().await, 1);
}

#[tokio::test]
async fn test_failed_download_excludes_unit_without_partial_file() {
    let fixture = Fixture::new();
    let server = MockServer::start_async().await;
    mock_image(&server, "tristana").await;
    mock_image(&server, "veigar").await;
    let lulu = server
        .mock_async(|when, then| {
            when.method(GET).path("/champions/lulu.png");
            then.status(404).body("not found");
        })
        .await;

    let summary = fixture.engine(&server).run().await.unwrap();

    lulu.assert_async().await;
    assert_eq!(summary.downloads_failed, 1);
    let unit_ids: Vec<u64> = fixture
        .catalog()
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_u64().unwrap())
        .collect();
    assert_eq!(unit_ids, vec![55, 23332]);

    let leftovers: Vec<String> = std::fs::read_dir(fixture.root.path().join("public/images/units"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(!leftovers.iter().any(|name| name.starts_with("101")));
    assert!(!leftovers.iter().any(|name| name.ends_with(".part")));
}

#[tokio::test]
async fn test_zero_byte_cache_file_is_refetched() {
    let fixture = Fixture::new();
    let server = MockServer::start_async().await;
    let tristana = mock_image(&server, "tristana").await;
    mock_image(&server, "lulu").await;
    mock_image(&server, "veigar").await;

    let image_dir = fixture.root.path().join("public/images/units");
    std::fs::create_dir_all(&image_dir).unwrap();
    std::fs::write(image_dir.join("23332.png"), b"").unwrap();

    fixture.engine(&server).run().await.unwrap();

    tristana.assert_async().await;
    assert_eq!(std::fs::read(image_dir.join("23332.png")).unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_missing_input_is_fatal_and_writes_nothing() {
    let fixture = Fixture::new();
    std::fs::remove_file(fixture.root.path().join("data/chess.json")).unwrap();
    let server = MockServer::start_async().await;

    let engine = fixture.engine(&server);
    let result = engine.run().await;

    match result {
        Err(EtlError::InputMissing { path }) => assert!(path.ends_with("chess.json")),
        other => panic!("expected InputMissing, got {:?}", other.map(|s| s.units_published)),
    }
    assert_eq!(engine.stage(), PipelineStage::Failed);
    assert!(!fixture.root.path().join("out/units.json").exists());
    assert!(!fixture.root.path().join("out/trait-new.json").exists());
}

#[tokio::test]
async fn test_run_deadline_aborts_downloads_and_writes_nothing() {
    let fixture = Fixture::new();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200)
                .header("Content-Type", "image/png")
                .delay(Duration::from_secs(5))
                .body(PNG_BYTES);
        })
        .await;

    let pipeline =
        CatalogPipeline::new(LocalStorage::new(fixture.root.path()), fixture.config(&server))
            .unwrap();
    let engine = EtlEngine::new(pipeline).with_timeout(Duration::from_millis(300));

    let result = engine.run().await;

    match result {
        Err(EtlError::Timeout { stage, .. }) => assert_eq!(stage, PipelineStage::DownloadAssets),
        other => panic!("expected Timeout, got {:?}", other.map(|s| s.units_published)),
    }
    assert!(!fixture.root.path().join("out/units.json").exists());
    assert!(!fixture
        .root
        .path()
        .join("public/images/units/23332.png")
        .exists());
}

#[tokio::test]
async fn test_dry_run_plan_fetches_and_writes_nothing() {
    let fixture = Fixture::new();
    let server = MockServer::start_async().await;
    let any_image = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).header("Content-Type", "image/png").body(PNG_BYTES);
        })
        .await;

    let plan = fixture.engine(&server).plan().await.unwrap();

    assert_eq!(plan.traits.len(), 3);
    assert_eq!(plan.pending.len(), 3);
    assert_eq!(any_image.hits_async().await, 0);
    assert!(!Path::new(&fixture.path("out")).exists());
}
