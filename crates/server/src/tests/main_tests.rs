use super::*;
use axum::{body, body::Body, http::Request, response::Response};
use chrono::Duration;
use shared::protocol::{NewOpportunity, ReorderResponse, ServerEvent};
use tower::ServiceExt;

async fn test_state() -> Arc<AppState> {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    Arc::new(AppState::new(ApiContext { storage }, 32))
}

fn test_app(state: &Arc<AppState>) -> Router {
    build_router(Arc::clone(state), 1024 * 1024)
}

fn listing(title: &str, deadline_days: Option<i64>) -> NewOpportunity {
    NewOpportunity {
        title: title.to_string(),
        description: format!("{title} description"),
        provider: "Acme".to_string(),
        apply_url: "https://acme.example/apply".to_string(),
        logo_url: "https://acme.example/logo.png".to_string(),
        deadline: deadline_days.map(|days| Utc::now() + Duration::days(days)),
        ..NewOpportunity::default()
    }
}

fn json_request(method: &str, uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .expect("request")
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let state = test_state().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = test_app(&state).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn tags_route_lists_predefined_categories() {
    let state = test_state().await;
    let request = Request::get("/tags").body(Body::empty()).expect("request");
    let response = test_app(&state).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let tags: Vec<String> = read_json(response).await;
    assert_eq!(tags.len(), PREDEFINED_TAGS.len());
    assert!(tags.iter().any(|tag| tag == "Grant"));
}

#[tokio::test]
async fn admin_create_then_public_get_round_trips() {
    let state = test_state().await;
    let app = test_app(&state);

    let create = json_request(
        "POST",
        "/admin/opportunities",
        serde_json::json!({
            "title": "Seed Grant",
            "description": "Money for builders",
            "provider": "Acme",
            "apply_url": "https://acme.example/apply",
            "category_tags": ["Grant"],
        }),
    );
    let response = app.clone().oneshot(create).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let created: Opportunity = read_json(response).await;
    assert!(created.logo_url.contains("acme.example"));

    let get = Request::get(format!("/opportunities/{}", created.id))
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(get).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Opportunity = read_json(response).await;
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn unknown_opportunity_is_not_found() {
    let state = test_state().await;
    let request = Request::get("/opportunities/999")
        .body(Body::empty())
        .expect("request");
    let response = test_app(&state).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn blank_submission_is_rejected() {
    let state = test_state().await;
    let request = json_request(
        "POST",
        "/submissions",
        serde_json::json!({
            "opportunity_name": "  ",
            "opportunity_type": "grant",
            "description": "d",
            "link": "https://example.org",
        }),
    );
    let response = test_app(&state).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reorder_with_missing_record_is_not_found_and_changes_nothing() {
    let state = test_state().await;
    let first = state
        .api
        .storage
        .insert_opportunity(&listing("First", Some(5)))
        .await
        .expect("insert");

    let request = json_request(
        "POST",
        "/admin/opportunities/reorder",
        serde_json::json!({
            "items": [
                { "id": first.id, "sort_order": 1 },
                { "id": 4242, "sort_order": 0 },
            ],
        }),
    );
    let response = test_app(&state).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let stored = state
        .api
        .storage
        .get_opportunity(first.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(stored.sort_order, None);
}

#[tokio::test]
async fn reorder_then_view_follows_manual_order() {
    let state = test_state().await;
    let storage = &state.api.storage;
    let a = storage.insert_opportunity(&listing("A", Some(1))).await.expect("a");
    let b = storage.insert_opportunity(&listing("B", Some(2))).await.expect("b");
    let c = storage.insert_opportunity(&listing("C", None)).await.expect("c");
    let app = test_app(&state);

    let view = Request::get("/opportunities/view")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(view).await.expect("response");
    let before: Vec<Opportunity> = read_json(response).await;
    let ids: Vec<_> = before.iter().map(|record| record.id).collect();
    assert_eq!(ids, vec![a.id, b.id, c.id]);

    let request = json_request(
        "POST",
        "/admin/opportunities/reorder",
        serde_json::json!({
            "items": [
                { "id": c.id, "sort_order": 0 },
                { "id": a.id, "sort_order": 1 },
                { "id": b.id, "sort_order": 2 },
            ],
        }),
    );
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let reordered: ReorderResponse = read_json(response).await;
    assert_eq!(reordered.updated, 3);

    let view = Request::get("/opportunities/view")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(view).await.expect("response");
    let after: Vec<Opportunity> = read_json(response).await;
    let ids: Vec<_> = after.iter().map(|record| record.id).collect();
    assert_eq!(ids, vec![c.id, a.id, b.id]);
}

#[tokio::test]
async fn view_query_accepts_sort_and_status_lists() {
    let state = test_state().await;
    let storage = &state.api.storage;
    let late = storage.insert_opportunity(&listing("Late", Some(9))).await.expect("late");
    let soon = storage.insert_opportunity(&listing("Soon", Some(1))).await.expect("soon");
    let mut paused = listing("Paused", Some(3));
    paused.status = shared::domain::OpportunityStatus::Inactive;
    let paused = storage.insert_opportunity(&paused).await.expect("paused");

    let request = Request::get("/opportunities/view?statuses=active,inactive&sort=deadline")
        .body(Body::empty())
        .expect("request");
    let response = test_app(&state).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let records: Vec<Opportunity> = read_json(response).await;
    let ids: Vec<_> = records.iter().map(|record| record.id).collect();
    assert_eq!(ids, vec![soon.id, paused.id, late.id]);

    let bad = Request::get("/opportunities/view?statuses=active,bogus")
        .body(Body::empty())
        .expect("request");
    let response = test_app(&state).oneshot(bad).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn archive_without_body_uses_default_admin() {
    let state = test_state().await;
    let record = state
        .api
        .storage
        .insert_opportunity(&listing("Old", Some(2)))
        .await
        .expect("insert");

    let request = Request::post(format!("/admin/opportunities/{}/archive", record.id))
        .body(Body::empty())
        .expect("request");
    let response = test_app(&state).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let archived: Opportunity = read_json(response).await;
    assert!(archived.is_archived());
    assert_eq!(archived.archived_by.as_deref(), Some("admin"));
}

#[tokio::test]
async fn mutations_notify_snapshot_subscribers() {
    let state = test_state().await;
    let mut events = state.events.subscribe();
    let app = test_app(&state);

    let create = json_request(
        "POST",
        "/admin/opportunities",
        serde_json::to_value(listing("Notify", None)).expect("value"),
    );
    let response = app.clone().oneshot(create).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(matches!(
        events.recv().await.expect("event"),
        ServerEvent::OpportunitiesChanged
    ));

    let submit = json_request(
        "POST",
        "/submissions",
        serde_json::json!({
            "opportunity_name": "Builders Fund",
            "opportunity_type": "grant",
            "description": "Funding",
            "link": "https://fund.example",
        }),
    );
    let response = app.oneshot(submit).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    match events.recv().await.expect("event") {
        ServerEvent::SubmissionsChanged { pending } => assert_eq!(pending, 1),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let state = test_state().await;
    let app = build_router(Arc::clone(&state), 64);
    let request = json_request(
        "POST",
        "/submissions",
        serde_json::json!({
            "opportunity_name": "x".repeat(200),
            "opportunity_type": "grant",
            "description": "d",
            "link": "https://example.org",
        }),
    );
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
