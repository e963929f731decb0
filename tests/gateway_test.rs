//! End-to-end tests for the routing surface

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use api_pool_balancer::{
    api,
    audit::{AuditLog, TracingAuditSink},
    backend::pool::ApiGroup,
    backend::registry::BackendRegistry,
    config::{PoolConfig, RoutingAlgorithm, ServerEntry, Settings},
    dispatch::Admission,
    gateway::{health::LivenessSet, HealthMonitor, ServerSelector},
    proxy::Forwarder,
    AppState,
};

fn pool_of(group: ApiGroup, servers: &[&MockServer]) -> PoolConfig {
    PoolConfig {
        group,
        servers: servers
            .iter()
            .map(|s| ServerEntry {
                address: s.address().to_string(),
                weight: 1,
            })
            .collect(),
    }
}

async fn test_app(pools: Vec<PoolConfig>, algorithm: RoutingAlgorithm) -> Router {
    let mut settings = Settings::default();
    settings.pools = pools;
    settings.routing.algorithm = algorithm;
    let settings = Arc::new(settings);

    let registry = Arc::new(BackendRegistry::from_settings(&settings.pools).unwrap());
    let liveness = Arc::new(LivenessSet::seeded(&registry.all_addresses()));
    let health_monitor = Arc::new(
        HealthMonitor::new(
            registry.all_addresses(),
            liveness.clone(),
            &settings.health_check,
        )
        .unwrap(),
    );
    let selector = Arc::new(ServerSelector::new(
        registry.clone(),
        liveness.clone(),
        settings.routing.algorithm,
    ));
    let forwarder = Arc::new(Forwarder::new(&settings.forward).unwrap());
    let admission = Admission::from_settings(&settings, forwarder);
    let audit = AuditLog::new(Arc::new(TracingAuditSink));

    let state = Arc::new(AppState {
        settings,
        registry,
        liveness,
        selector,
        health_monitor,
        admission,
        audit,
    });

    api::create_router(state)
        .await
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 41000))))
}

async fn backend_returning(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::path_regex(".*"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body.to_string()))
        .mount(&server)
        .await;
    server
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_rest_request_routed_end_to_end() {
    let server = backend_returning(200, "{\"data\":[]}").await;
    let app = test_app(
        vec![pool_of(ApiGroup::Rest, &[&server])],
        RoutingAlgorithm::WeightedRotation,
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api?page=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "{\"data\":[]}");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.path(), "/api");
    assert_eq!(received[0].url.query(), Some("page=1"));
}

#[tokio::test]
async fn test_unsupported_preference_token_is_a_400_naming_the_token() {
    let server = backend_returning(200, "ok").await;
    let app = test_app(
        vec![pool_of(ApiGroup::Rest, &[&server])],
        RoutingAlgorithm::WeightedRotation,
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api")
                .header("X-Server-Preference", "server4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("Unsupported server preference: server4"));
}

#[tokio::test]
async fn test_preference_override_targets_positional_backend() {
    let first = backend_returning(200, "first").await;
    let second = backend_returning(200, "second").await;
    let app = test_app(
        vec![pool_of(ApiGroup::Rest, &[&first, &second])],
        RoutingAlgorithm::WeightedRotation,
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api")
                .header("X-Server-Preference", "server2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "second");
    assert!(first.received_requests().await.unwrap().is_empty());
    assert_eq!(second.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_to_graphql_path_is_405_with_no_outbound_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = test_app(
        vec![pool_of(ApiGroup::Graphql, &[&server])],
        RoutingAlgorithm::WeightedRotation,
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/graphql/records")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_graphql_post_is_forwarded() {
    let server = backend_returning(200, "{\"data\":{\"records\":[]}}").await;
    let app = test_app(
        vec![pool_of(ApiGroup::Graphql, &[&server])],
        RoutingAlgorithm::WeightedRotation,
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/graphql")
                .header("content-type", "application/json")
                .body(Body::from("{\"query\":\"{records{id}}\"}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "{\"data\":{\"records\":[]}}");
}

#[tokio::test]
async fn test_group_without_a_pool_is_a_503() {
    let server = backend_returning(200, "ok").await;
    // Only a REST pool is configured; GraphQL-classified paths have nowhere
    // to go
    let app = test_app(
        vec![pool_of(ApiGroup::Rest, &[&server])],
        RoutingAlgorithm::WeightedRotation,
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/graphql")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_queue_discipline_serves_requests_end_to_end() {
    let server = backend_returning(200, "queued ok").await;
    let app = test_app(
        vec![pool_of(ApiGroup::Rest, &[&server])],
        RoutingAlgorithm::QueueDiscipline,
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "queued ok");
}

#[tokio::test]
async fn test_reserved_paths_are_not_forwarded() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::path_regex(".*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = test_app(
        vec![pool_of(ApiGroup::Rest, &[&server])],
        RoutingAlgorithm::WeightedRotation,
    )
    .await;

    let welcome = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(welcome.status(), StatusCode::OK);

    let status = app
        .oneshot(
            Request::builder()
                .uri("/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::OK);
    let body = body_string(status).await;
    assert!(body.contains("\"algorithm\":\"WEIGHTED_ROTATION\""));

    assert!(server.received_requests().await.unwrap().is_empty());
}
