//! HTTP surface tests. Conversations are created without a bot endpoint so
//! nothing leaves the process; everything runs against the in-memory state.

use std::sync::Arc;

use actix_web::{test, web, App};
use serde_json::{json, Value};

use crate::config::Config;
use crate::controllers;
use crate::facilities::Facilities;
use crate::gateway::EventBroadcaster;
use crate::AppState;

fn state() -> web::Data<AppState> {
    let config = Config {
        port: 9001,
        gateway_port: 9002,
        service_url: None,
        user_id: "default-user".to_string(),
        user_name: "User".to_string(),
    };
    let events = Arc::new(EventBroadcaster::new());
    let facilities = Arc::new(Facilities::new(&config, events));
    web::Data::new(AppState { facilities, config })
}

fn routes(cfg: &mut web::ServiceConfig) {
    controllers::health::config(cfg);
    controllers::conversations::config(cfg);
    controllers::directline::config(cfg);
    controllers::attachments::config(cfg);
    controllers::botstate::config(cfg);
    controllers::usertoken::config(cfg);
    controllers::emulator::config(cfg);
}

macro_rules! service {
    ($state:expr) => {
        test::init_service(App::new().app_data($state.clone()).configure(routes)).await
    };
}

macro_rules! start_conversation {
    ($app:expr) => {{
        let req = test::TestRequest::post()
            .uri("/v3/directline/conversations")
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), 201);
        let body: Value = test::read_body_json(resp).await;
        body["conversationId"]
            .as_str()
            .expect("conversationId in response")
            .to_string()
    }};
}

#[actix_web::test]
async fn health_reports_version() {
    let state = state();
    let app = service!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request())
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[actix_web::test]
async fn starting_twice_reconnects_instead_of_creating() {
    let state = state();
    let app = service!(state);

    let conversation_id = start_conversation!(&app);
    assert_eq!(state.facilities.conversations.len(), 1);

    // A token naming the conversation resumes it with a 200
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    let token = STANDARD.encode(format!(r#"{{"conversationId":"{}"}}"#, conversation_id));

    let req = test::TestRequest::post()
        .uri("/v3/directline/conversations")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(state.facilities.conversations.len(), 1);
}

#[actix_web::test]
async fn bot_pushed_activities_are_polled_with_watermarks() {
    let state = state();
    let app = service!(state);
    let conversation_id = start_conversation!(&app);

    // The bot pushes through the connector surface
    let req = test::TestRequest::post()
        .uri(&format!("/v3/conversations/{}/activities", conversation_id))
        .set_json(json!({"type": "message", "text": "hello"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let posted: Value = test::read_body_json(resp).await;
    assert!(posted["id"].as_str().is_some());

    // The client polls it back
    let req = test::TestRequest::get()
        .uri(&format!(
            "/v3/directline/conversations/{}/activities",
            conversation_id
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let set: Value = test::read_body_json(resp).await;
    assert_eq!(set["activities"].as_array().map(Vec::len), Some(1));
    assert_eq!(set["activities"][0]["text"], "hello");
    assert_eq!(set["activities"][0]["channelId"], "emulator");
    let watermark = set["watermark"].as_u64().expect("numeric watermark");
    assert_eq!(watermark, 1);

    // Polling at the returned watermark drains the queue
    let req = test::TestRequest::get()
        .uri(&format!(
            "/v3/directline/conversations/{}/activities?watermark={}",
            conversation_id, watermark
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let set: Value = test::read_body_json(resp).await;
    assert_eq!(set["activities"].as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn activities_can_be_updated_and_deleted_in_place() {
    let state = state();
    let app = service!(state);
    let conversation_id = start_conversation!(&app);

    let req = test::TestRequest::post()
        .uri(&format!("/v3/conversations/{}/activities", conversation_id))
        .set_json(json!({"type": "message", "text": "first draft"}))
        .to_request();
    let posted: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let activity_id = posted["id"].as_str().expect("activity id").to_string();

    let req = test::TestRequest::put()
        .uri(&format!(
            "/v3/conversations/{}/activities/{}",
            conversation_id, activity_id
        ))
        .set_json(json!({"type": "message", "text": "edited"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let conversation = state
        .facilities
        .conversations
        .conversation_by_id(&conversation_id)
        .expect("conversation exists");
    let (activities, _) = conversation.get_activities_since(0);
    assert_eq!(activities[0].text.as_deref(), Some("edited"));

    let req = test::TestRequest::delete()
        .uri(&format!(
            "/v3/conversations/{}/activities/{}",
            conversation_id, activity_id
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let (activities, _) = conversation.get_activities_since(0);
    assert!(activities.is_empty());

    // Deleting again is a 404 with the protocol error shape
    let req = test::TestRequest::delete()
        .uri(&format!(
            "/v3/conversations/{}/activities/{}",
            conversation_id, activity_id
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "BadArgument");
}

#[actix_web::test]
async fn bot_state_etags_reject_stale_writes() {
    let state = state();
    let app = service!(state);

    let req = test::TestRequest::post()
        .uri("/v3/botstate/emulator/users/user-1")
        .set_json(json!({"data": {"count": 1}, "eTag": "*"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let saved: Value = test::read_body_json(resp).await;
    let tag = saved["eTag"].as_str().expect("rotated eTag").to_string();
    assert_ne!(tag, "*");

    let req = test::TestRequest::post()
        .uri("/v3/botstate/emulator/users/user-1")
        .set_json(json!({"data": {"count": 2}, "eTag": "stale"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 412);

    let req = test::TestRequest::get()
        .uri("/v3/botstate/emulator/users/user-1")
        .to_request();
    let read: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(read["data"]["count"], 1);
    assert_eq!(read["eTag"], tag);
}

#[actix_web::test]
async fn attachments_round_trip_through_views() {
    let state = state();
    let app = service!(state);
    let conversation_id = start_conversation!(&app);

    // "hello" in base64
    let req = test::TestRequest::post()
        .uri(&format!("/v3/conversations/{}/attachments", conversation_id))
        .set_json(json!({
            "type": "text/plain",
            "name": "hello.txt",
            "originalBase64": "aGVsbG8="
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let uploaded: Value = test::read_body_json(resp).await;
    let attachment_id = uploaded["id"].as_str().expect("attachment id").to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/v3/attachments/{}", attachment_id))
        .to_request();
    let info: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(info["name"], "hello.txt");
    assert_eq!(info["views"][0]["viewId"], "original");
    assert_eq!(info["views"][0]["size"], 5);

    let req = test::TestRequest::get()
        .uri(&format!("/v3/attachments/{}/views/original", attachment_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let bytes = test::read_body(resp).await;
    assert_eq!(&bytes[..], b"hello");

    let req = test::TestRequest::get()
        .uri(&format!("/v3/attachments/{}/views/thumbnail", attachment_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn user_token_lookup_needs_an_endpoint_and_a_cached_token() {
    let state = state();
    let app = service!(state);

    let uri = "/api/usertoken/GetToken?userId=user-1&connectionName=github";
    let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/emulator/endpoints")
        .set_json(json!({"botUrl": "http://localhost:3978/api/messages", "botId": "bot-1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    // Registered endpoint, empty cache
    let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    assert_eq!(resp.status(), 404);

    state
        .facilities
        .token_cache
        .add_token("bot-1", "user-1", "github", "tok-abc");
    let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["token"], "tok-abc");

    let req = test::TestRequest::delete()
        .uri("/api/usertoken/SignOut?userId=user-1&connectionName=github")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn feeding_a_transcript_creates_the_conversation() {
    let state = state();
    let app = service!(state);

    let activities = json!([
        {"type": "message", "text": "one", "conversation": {"id": "old-conv"}},
        {"type": "message", "text": "two", "conversation": {"id": "old-conv"}}
    ]);
    let req = test::TestRequest::post()
        .uri("/emulator/transcript-1/transcript")
        .set_json(activities)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri("/v3/directline/conversations/transcript-1/activities")
        .to_request();
    let set: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let fed = set["activities"].as_array().expect("activity array");
    assert_eq!(fed.len(), 2);
    // conversation references are rewritten to the hosting conversation
    assert_eq!(fed[0]["conversation"]["id"], "transcript-1");
}

const UPLOAD_BOUNDARY: &str = "----emulator-upload-test";

fn upload_body(include_activity: bool, include_file: bool) -> String {
    let mut body = String::new();
    if include_activity {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"activity\"\r\n\
             Content-Type: application/json\r\n\r\n\
             {{\"type\":\"message\",\"text\":\"see attached\"}}\r\n",
            UPLOAD_BOUNDARY
        ));
    }
    if include_file {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cat.png\"\r\n\
             Content-Type: image/png\r\n\r\nnot-really-a-png\r\n",
            UPLOAD_BOUNDARY
        ));
    }
    body.push_str(&format!("--{}--\r\n", UPLOAD_BOUNDARY));
    body
}

fn upload_request(conversation_id: &str, body: String) -> actix_web::test::TestRequest {
    test::TestRequest::post()
        .uri(&format!(
            "/v3/directline/conversations/{}/upload",
            conversation_id
        ))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", UPLOAD_BOUNDARY),
        ))
        .set_payload(body)
}

#[actix_web::test]
async fn uploads_store_files_and_stamp_view_urls() {
    let state = state();
    let app = service!(state);

    // An endpoint nothing listens on: the relay fails, but the activity is
    // queued with its attachments before the bot is called
    let req = test::TestRequest::post()
        .uri("/emulator/endpoints")
        .set_json(json!({"botUrl": "http://localhost:1/api/messages", "botId": "bot-1"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let conversation_id = start_conversation!(&app);

    let req = upload_request(&conversation_id, upload_body(true, true)).to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_server_error());

    let req = test::TestRequest::get()
        .uri(&format!(
            "/v3/directline/conversations/{}/activities",
            conversation_id
        ))
        .to_request();
    let set: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let activities = set["activities"].as_array().expect("activity array");
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0]["text"], "see attached");

    let content_url = activities[0]["attachments"][0]["contentUrl"]
        .as_str()
        .expect("attachment content url");
    assert!(content_url.ends_with("/views/original"));

    // The stamped URL resolves to the stored bytes
    let view_path = content_url
        .strip_prefix("http://localhost:9001")
        .expect("service-url prefixed");
    let resp =
        test::call_service(&app, test::TestRequest::get().uri(view_path).to_request()).await;
    assert_eq!(resp.status(), 200);
    let bytes = test::read_body(resp).await;
    assert_eq!(&bytes[..], b"not-really-a-png");
}

#[actix_web::test]
async fn uploads_require_an_activity_and_a_file() {
    let state = state();
    let app = service!(state);
    let conversation_id = start_conversation!(&app);

    let req = upload_request(&conversation_id, upload_body(false, true)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "MissingProperty");

    let req = upload_request(&conversation_id, upload_body(true, false)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "MissingProperty");
}

#[actix_web::test]
async fn transcript_conversations_refuse_uploads() {
    let state = state();
    let app = service!(state);

    let req = upload_request("transcript-7", upload_body(true, true)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    // no conversation springs into existence for the replay id
    assert!(state.facilities.conversations.is_empty());
}

#[actix_web::test]
async fn conversation_scoped_state_writes_warn_once() {
    let state = state();
    let app = service!(state);
    let conversation_id = start_conversation!(&app);
    let (_client_id, mut rx) = state.facilities.events.subscribe();

    let req = test::TestRequest::post()
        .uri(&format!(
            "/v3/botstate/emulator/conversations/{}",
            conversation_id
        ))
        .set_json(json!({"data": {"seen": true}, "eTag": "*"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let mut warnings = 0;
    while let Ok(event) = rx.try_recv() {
        let text = event.data["payload"]["text"].as_str().unwrap_or_default();
        if event.event == "log.item" && text.contains("deprecated") {
            warnings += 1;
        }
    }
    assert_eq!(warnings, 1);

    // the flag is consumed, so later writes stay quiet
    let conversation = state
        .facilities
        .conversations
        .conversation_by_id(&conversation_id)
        .expect("conversation exists");
    assert!(!conversation.state_api_warning_needed());
}

#[actix_web::test]
async fn ending_a_conversation_removes_it() {
    let state = state();
    let app = service!(state);
    let conversation_id = start_conversation!(&app);

    let req = test::TestRequest::delete()
        .uri(&format!("/emulator/{}", conversation_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert!(state.facilities.conversations.is_empty());

    let req = test::TestRequest::delete()
        .uri(&format!("/emulator/{}", conversation_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}
