use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use bisiparis::api::create_router;
use bisiparis::services::documents::DocumentKind;
use bisiparis::*;
use chrono::Utc;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower::ServiceExt;

const ADMIN: &str = "Bearer change-me-admin";

async fn test_app() -> (AppState, Router) {
    test_app_with(Config::default()).await
}

async fn test_app_with(config: Config) -> (AppState, Router) {
    let state = AppState::new(config).await.unwrap();

    for id in 1..=30u64 {
        let category = if id % 3 == 0 { "audio" } else { "phones" };
        let product = Product::new(id, format!("Product {}", id), 50.0 + id as f64 * 5.0)
            .with_categories(vec![category.to_string()])
            .with_brand(if id % 2 == 0 { "acme" } else { "globex" })
            .with_sales(100 - id);
        state.store.insert_product(product).await;
    }

    state
        .store
        .insert_order(Order {
            id: 501,
            order_number: "1007".to_string(),
            created_at: Utc::now(),
            billing: BillingDetails {
                first_name: "Zeynep".to_string(),
                last_name: "Arslan".to_string(),
                email: "zeynep@example.com".to_string(),
                phone: "+90 555 000 00 00".to_string(),
            },
            items: vec![OrderItem {
                name: "Wireless Headphones".to_string(),
                quantity: 2,
                total: 2400.0,
            }],
            shipping_total: 49.9,
            total_tax: 432.0,
            total: 2881.9,
        })
        .await;

    let router = create_router(state.clone());
    (state, router)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn from_peer(uri: &str, peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let addr: SocketAddr = format!("{}:40000", peer).parse().unwrap();
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = forwarded_for {
        builder = builder.header("x-forwarded-for", value);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (_, router) = test_app().await;
    let (status, _, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_tracking_builds_session_profile() {
    let (state, router) = test_app().await;

    for (product_id, price) in [(4u64, 70.0), (8, 90.0), (10, 100.0)] {
        let (status, _, body) = send(
            &router,
            post_json(
                "/track",
                json!({
                    "session_id": "bs_integration_1",
                    "fingerprint": "fp_2p",
                    "interaction_type": "product_view",
                    "product_id": product_id,
                    "category": "phones",
                    "brand": "acme",
                    "price": price
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }
    assert_eq!(state.history.len(), 3);

    let (status, _, body) = send(&router, get("/profiles/bs_integration_1")).await;
    assert_eq!(status, StatusCode::OK);
    let profile: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(profile["data"]["categories"]["phones"], 3);
    assert_eq!(profile["data"]["products_viewed"][0]["id"], 10);
    assert_eq!(profile["data"]["interaction_count"], 3);

    let (status, headers, body) = send(&router, get("/recommendations/bs_integration_1?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-bs-user-segment").unwrap(), "new_visitor");

    let value: Value = serde_json::from_str(&body).unwrap();
    let products = value["data"]["products"].as_array().unwrap();
    assert!(products.len() <= 5);
    let mut ids: Vec<u64> = products.iter().map(|p| p["id"].as_u64().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), products.len());
}

#[tokio::test]
async fn test_track_rejects_click_without_product() {
    let (_, router) = test_app().await;
    let (status, _, body) = send(
        &router,
        post_json("/track", json!({ "interaction_type": "product_click" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["success"], false);
}

#[tokio::test]
async fn test_track_without_data_is_noop() {
    let (state, router) = test_app().await;
    let (status, _, body) = send(
        &router,
        post_json("/track", json!({ "interaction_type": "product_view" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"]["recorded"], false);
    assert!(value["data"]["session_id"].as_str().unwrap().starts_with("bs_"));
    assert!(state.history.is_empty());
}

#[tokio::test]
async fn test_unknown_visitor_gets_best_sellers() {
    let (_, router) = test_app().await;
    let profile = UserProfile::new("fp_new");
    let (status, _, body) = send(
        &router,
        post_json(
            "/recommendations",
            json!({ "limit": 3, "profile": serde_json::to_value(&profile).unwrap() }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let value: Value = serde_json::from_str(&body).unwrap();
    let ids: Vec<u64> = value["data"]["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_oversized_client_profile_rejected() {
    let (_, router) = test_app().await;
    let mut profile = serde_json::to_value(UserProfile::new("fp_big")).unwrap();
    let categories: serde_json::Map<String, Value> = (0..=MAX_INTERESTS)
        .map(|i| (format!("category{}", i), json!(1)))
        .collect();
    profile["categories"] = Value::Object(categories);

    let (status, _, _) = send(
        &router,
        post_json("/recommendations", json!({ "limit": 3, "profile": profile })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_recommendation_limit_validation() {
    let (_, router) = test_app().await;
    let (status, _, _) = send(&router, post_json("/recommendations", json!({ "limit": 1000 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fingerprint_endpoint() {
    let (_, router) = test_app().await;
    let (status, _, body) = send(&router, post_json("/fingerprint", json!({ "signals": ["a"] }))).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"]["fingerprint"], "fp_2p");
    assert_eq!(value["data"]["heuristic"], true);

    let (status, _, _) = send(&router, post_json("/fingerprint", json!({ "signals": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_showcase_fallback_and_unknown_mode() {
    let (_, router) = test_app().await;
    let (status, _, body) = send(&router, get("/showcase/category")).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"]["served_mode"], "trending");

    let (status, _, _) = send(&router, get("/showcase/everything")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_document_requires_token_or_admin() {
    let (_, router) = test_app().await;

    let (status, _, body) = send(&router, get("/documents/invoice")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("<html>"));

    let (status, _, _) = send(&router, get("/documents/invoice?order_id=501")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(&router, get("/documents/invoice?token=not.a.token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!body.contains("INV-"));
}

#[tokio::test]
async fn test_minted_token_opens_only_its_kind() {
    let (_, router) = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/documents/invoice/tokens")
        .header("content-type", "application/json")
        .header("authorization", ADMIN)
        .body(Body::from(json!({ "order_id": 501 }).to_string()))
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let value: Value = serde_json::from_str(&body).unwrap();
    let token = value["data"]["token"].as_str().unwrap().to_string();

    let (status, _, html) = send(&router, get(&format!("/documents/invoice?token={}", token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("INV-1007-"));
    assert!(html.contains("₺2,400.00"));
    assert!(html.contains("KDV (%18)"));

    let (status, _, _) = send(&router, get(&format!("/documents/warranty?token={}", token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_renders_and_clears_warranty() {
    let (state, router) = test_app().await;

    let request = Request::builder()
        .uri("/documents/warranty?order_id=501")
        .header("authorization", ADMIN)
        .body(Body::empty())
        .unwrap();
    let (status, _, html) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("WR-1007-"));
    assert!(html.contains("api.qrserver.com"));

    let cache_key = DocumentKind::Warranty.cache_key(501);
    assert!(state.transients.get(&cache_key).await.unwrap().is_some());

    let request = Request::builder()
        .method("DELETE")
        .uri("/documents/warranty/501/cache")
        .header("authorization", ADMIN)
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.transients.get(&cache_key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_warranty_verification() {
    let (_, router) = test_app().await;

    let (status, _, body) = send(&router, get("/warranty/verify?code=WR-1007-AB12CD&order=501")).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"]["order_number"], "1007");
    assert_eq!(value["data"]["is_active"], true);

    let (status, _, _) = send(&router, get("/warranty/verify?code=WR-1008-AB12CD&order=501")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&router, get("/warranty/verify?code=WR-1007-AB12CD&order=9")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, html) = send(&router, get("/warranty/verify/page?code=WR-1008-AB12CD&order=501")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Invalid warranty certificate"));
}

#[tokio::test]
async fn test_verification_page_rate_limited_per_client() {
    let (_, router) = test_app().await;
    let uri = "/warranty/verify/page?code=WR-1007-AB12CD&order=501";

    for _ in 0..5 {
        let (status, _, _) = send(&router, from_peer(uri, "203.0.113.7", None)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _, _) = send(&router, from_peer(uri, "203.0.113.7", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _, _) = send(&router, from_peer(uri, "203.0.113.8", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rotating_forwarded_header_does_not_reset_limit() {
    let (_, router) = test_app().await;
    let uri = "/warranty/verify?code=WR-1007-AB12CD&order=501";

    let mut limited = 0;
    for i in 0..30 {
        let forwarded = format!("10.0.0.{}", i);
        let (status, _, _) = send(&router, from_peer(uri, "198.51.100.4", Some(&forwarded))).await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        } else {
            assert_eq!(status, StatusCode::OK);
        }
    }
    assert_eq!(limited, 10);
}

#[tokio::test]
async fn test_trusted_proxy_forwards_client_address() {
    let mut config = Config::default();
    config.server.trusted_proxies = vec!["127.0.0.1".parse().unwrap()];
    let (_, router) = test_app_with(config).await;
    let uri = "/warranty/verify/page?code=WR-1007-AB12CD&order=501";

    for _ in 0..5 {
        let (status, _, _) = send(&router, from_peer(uri, "127.0.0.1", Some("203.0.113.7"))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _, _) = send(&router, from_peer(uri, "127.0.0.1", Some("203.0.113.7"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _, _) = send(&router, from_peer(uri, "127.0.0.1", Some("203.0.113.8"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_activity_log_is_admin_only() {
    let (_, router) = test_app().await;
    send(&router, get("/warranty/verify?code=WR-1007-AB12CD&order=501")).await;

    let (status, _, _) = send(&router, get("/admin/activity")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri("/admin/activity?order_id=501")
        .header("authorization", ADMIN)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"][0]["action"], "api_verify_success");
}

#[tokio::test]
async fn test_session_history_is_admin_only() {
    let (_, router) = test_app().await;
    for product_id in [4, 6] {
        let track = post_json(
            "/track",
            json!({
                "session_id": "bs_history_1",
                "interaction_type": "product_click",
                "product_id": product_id
            }),
        );
        let (status, _, _) = send(&router, track).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _, _) = send(&router, get("/admin/sessions/bs_history_1/history")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri("/admin/sessions/bs_history_1/history")
        .header("authorization", ADMIN)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    let products: Vec<u64> = value["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["event"]["product_id"].as_u64().unwrap())
        .collect();
    assert_eq!(products, vec![4, 6]);

    let (_, _, body) = send(&router, get("/health")).await;
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"]["interactions_by_type"]["product_click"], 2);
}

#[test]
fn test_band_sub_counts_cover_limit() {
    use bisiparis::algorithms::plan_bands;

    for limit in 1..=500usize {
        let total: usize = plan_bands(100.0, limit).iter().map(|b| b.count).sum();
        assert!(total >= limit);
    }
}

#[test]
fn test_session_end_folds_behavior() {
    tokio_test::block_on(async {
        let (state, router) = test_app().await;
        let track = post_json(
            "/track",
            json!({
                "session_id": "bs_ending",
                "interaction_type": "add_to_cart",
                "product_id": 3
            }),
        );
        let (status, _, _) = send(&router, track).await;
        assert_eq!(status, StatusCode::OK);

        let end = post_json(
            "/sessions/end",
            json!({ "session_id": "bs_ending", "duration_ms": 42000.0, "scroll_depth": 80.0 }),
        );
        let (status, _, body) = send(&router, end).await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let profile = state
            .recommendation_service
            .get_profile("bs_ending")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.behavior.conversion_events, 1);
        assert_eq!(profile.behavior.avg_session_duration_ms, 42000.0);
        assert_eq!(profile.behavior.last_scroll_depth, Some(80.0));
    });
}
