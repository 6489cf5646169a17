mod common;

use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;
use studio_server::db::ImageView;
use studio_server::handlers;
use studio_server::storage::MemoryStore;
use studio_server::AppState;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::FakeRecords;

const ORIGIN: &str = "http://127.0.0.1:9000";
const SUBMIT_PATH: &str = "/v1/models/black-forest-labs/flux-schnell/predictions";

fn state_for(server: &MockServer, store: Arc<MemoryStore>, records: Arc<FakeRecords>) -> AppState {
    let mut config = common::test_settings();
    config.providers.replicate_base_url = server.uri();
    common::test_state_with_store(config, store).with_media_records(records)
}

async fn mount_image_run(server: &MockServer, id: &str) {
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .and(body_partial_json(json!({ "input": { "aspect_ratio": "1:1" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": id, "status": "starting" })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/predictions/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "status": "succeeded",
            "output": [format!("{}/out-0.png", server.uri())],
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/out-0.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(b"png-bytes".to_vec()),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[actix_web::test]
async fn test_generated_image_is_stored_and_signed() {
    let server = MockServer::start().await;
    mount_image_run(&server, "img-1").await;

    let store = Arc::new(MemoryStore::new(ORIGIN));
    let records = Arc::new(FakeRecords::new());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_for(&server, store.clone(), records.clone())))
            .configure(handlers::configure),
    )
    .await;

    let resp = test::TestRequest::post()
        .uri("/generate-image")
        .insert_header(common::bearer(3))
        .set_json(json!({ "prompt": "  a red fox  " }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 201);

    let view: ImageView = test::read_body_json(resp).await;
    assert_eq!(view.prompt, "a red fox");
    assert_eq!(view.aspect_ratio.as_deref(), Some("1:1"));
    assert!(view.image_url.starts_with(&format!("{}/images/", ORIGIN)));
    assert!(view.video_url.is_none());

    let rows = records.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].prediction_id.as_deref(), Some("img-1"));
    let key = rows[0].s3_key.clone().expect("stored key");
    assert_eq!(store.get(&key).await.map(|o| o.content_type), Some("image/png".to_string()));
}

#[actix_web::test]
async fn test_failed_insert_removes_the_upload() {
    let server = MockServer::start().await;
    mount_image_run(&server, "img-2").await;

    let store = Arc::new(MemoryStore::new(ORIGIN));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_for(&server, store.clone(), Arc::new(FakeRecords::failing()))))
            .configure(handlers::configure),
    )
    .await;

    let resp = test::TestRequest::post()
        .uri("/generate-image")
        .insert_header(common::bearer(3))
        .set_json(json!({ "prompt": "a red fox" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 500);
    assert!(store.is_empty().await);
}

#[actix_web::test]
async fn test_prediction_failing_at_submit_is_not_polled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "img-3",
            "status": "failed",
            "error": "Prompt flagged by safety checker",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new(ORIGIN));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_for(&server, store.clone(), Arc::new(FakeRecords::new()))))
            .configure(handlers::configure),
    )
    .await;

    let resp = test::TestRequest::post()
        .uri("/generate-image")
        .insert_header(common::bearer(3))
        .set_json(json!({ "prompt": "a red fox" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 502);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Prompt flagged by safety checker");
    assert!(store.is_empty().await);
}

#[actix_web::test]
async fn test_unknown_aspect_ratio_is_rejected_before_submitting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new(ORIGIN));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_for(&server, store, Arc::new(FakeRecords::new()))))
            .configure(handlers::configure),
    )
    .await;

    let resp = test::TestRequest::post()
        .uri("/generate-image")
        .insert_header(common::bearer(3))
        .set_json(json!({ "prompt": "a red fox", "aspect_ratio": "5:1" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);
}
