//! HTTP surface: tracking, recommendations, showcase feeds and documents.

use crate::algorithms::fingerprint;
use crate::algorithms::segment::SEGMENT_HEADER;
use crate::error::{ApiResponse, ErrorPage, ServiceError, ServiceResult};
use crate::models::*;
use crate::services::activity::ActivityEntry;
use crate::services::documents::{ClientContext, DocumentAccess, DocumentKind, VerifySurface};
use crate::services::recommendation::RecommendationService;
use crate::services::showcase::{ShowcaseMode, ShowcaseQuery, ShowcaseResponse};
use crate::services::documents::warranty::render_verification_page;
use crate::utils::validation::{validate_session_id, validate_signals};
use crate::AppState;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderMap},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const DEFAULT_ACTIVITY_LIMIT: usize = 50;
const MAX_ACTIVITY_LIMIT: usize = 500;

/// Caller address and user agent. The socket peer is the address unless it is
/// a configured trusted proxy, in which case the first `X-Forwarded-For` entry is used.
pub struct Client(pub ClientContext);

#[async_trait]
impl FromRequestParts<AppState> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let address = client_address(&parts.headers, peer, &state.config.server.trusted_proxies);

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Client(ClientContext { address, user_agent }))
    }
}

fn client_address(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: &[IpAddr]) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };
    if !trusted_proxies.contains(&peer) {
        return peer.to_string();
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> ServiceResult<()> {
    state.document_service.authorize_admin(bearer_token(headers))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub tracked_interactions: usize,
    pub interactions_by_type: HashMap<String, u64>,
    pub showcase: HashMap<String, u64>,
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "healthy".to_string(),
        service: "bisiparis".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracked_interactions: state.history.len(),
        interactions_by_type: state
            .history
            .counts_by_type()
            .into_iter()
            .map(|(kind, count)| (kind.as_str().to_string(), count))
            .collect(),
        showcase: state.showcase_service.get_serving_stats(),
    }))
}

async fn track_interaction(
    State(state): State<AppState>,
    Json(request): Json<TrackRequest>,
) -> ServiceResult<Json<ApiResponse<TrackResponse>>> {
    let response = state.recommendation_service.track_interaction(&request).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn end_session(
    State(state): State<AppState>,
    Json(request): Json<SessionEndRequest>,
) -> ServiceResult<Json<ApiResponse<UserProfile>>> {
    let profile = state.recommendation_service.end_session(&request).await?;
    Ok(Json(ApiResponse::success(profile)))
}

async fn compute_fingerprint(
    Json(request): Json<FingerprintRequest>,
) -> ServiceResult<Json<ApiResponse<FingerprintResponse>>> {
    validate_signals(&request.signals)?;
    Ok(Json(ApiResponse::success(FingerprintResponse {
        fingerprint: fingerprint(&request.signals),
        heuristic: true,
    })))
}

async fn respond_with_segment(
    service: &RecommendationService,
    body: &RecommendationBody,
) -> ServiceResult<Response> {
    let response = service.get_recommendations(body).await?;
    let segment = response.segment.clone();
    Ok(([(SEGMENT_HEADER, segment)], Json(ApiResponse::success(response))).into_response())
}

async fn post_recommendations(
    State(state): State<AppState>,
    Json(body): Json<RecommendationBody>,
) -> ServiceResult<Response> {
    respond_with_segment(&state.recommendation_service, &body).await
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn get_session_recommendations(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<LimitQuery>,
) -> ServiceResult<Response> {
    let body = RecommendationBody {
        limit: params.limit,
        session_id: Some(session_id),
        profile: None,
    };
    respond_with_segment(&state.recommendation_service, &body).await
}

async fn get_profile(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ServiceResult<Json<ApiResponse<UserProfile>>> {
    validate_session_id(&session_id)?;
    match state.recommendation_service.get_profile(&session_id).await? {
        Some(profile) => Ok(Json(ApiResponse::success(profile))),
        None => Err(ServiceError::NotFound("Profile".into())),
    }
}

async fn get_showcase(
    State(state): State<AppState>,
    Path(mode): Path<String>,
    Query(query): Query<ShowcaseQuery>,
) -> ServiceResult<Json<ApiResponse<ShowcaseResponse>>> {
    let mode: ShowcaseMode = mode.parse()?;
    let response = state.showcase_service.serve(mode, &query).await?;
    Ok(Json(ApiResponse::success(response)))
}

#[derive(Debug, Deserialize)]
struct DocumentQuery {
    token: Option<String>,
    order_id: Option<OrderId>,
}

/// Token holders get their own order; admins may name any order.
async fn get_document(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
    Client(client): Client,
) -> Result<Html<String>, ErrorPage> {
    let kind: DocumentKind = kind.parse()?;
    let access = match (query.token, query.order_id) {
        (Some(token), _) => DocumentAccess::Token(token),
        (None, Some(order_id)) => {
            require_admin(&state, &headers)?;
            DocumentAccess::Admin(order_id)
        }
        (None, None) => return Err(ServiceError::Unauthorized.into()),
    };

    let html = state.document_service.render(kind, access, &client).await?;
    Ok(Html(html))
}

async fn mint_token(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(request): Json<TokenRequest>,
) -> ServiceResult<Json<ApiResponse<TokenResponse>>> {
    require_admin(&state, &headers)?;
    let kind: DocumentKind = kind.parse()?;
    let token = state.document_service.issue_token(kind, request.order_id).await?;
    Ok(Json(ApiResponse::success(token)))
}

async fn clear_document_cache(
    State(state): State<AppState>,
    Path((kind, order_id)): Path<(String, OrderId)>,
    headers: HeaderMap,
) -> ServiceResult<Json<ApiResponse<String>>> {
    require_admin(&state, &headers)?;
    let kind: DocumentKind = kind.parse()?;
    state.document_service.clear_cache(kind, order_id).await?;
    Ok(Json(ApiResponse::success("Cache cleared".to_string())))
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    code: String,
    order: OrderId,
}

async fn verify_warranty_api(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
    Client(client): Client,
) -> ServiceResult<Json<ApiResponse<crate::services::documents::WarrantyStatus>>> {
    match state
        .document_service
        .verify_warranty(&query.code, query.order, VerifySurface::Api, &client)
        .await?
    {
        Some(status) => Ok(Json(ApiResponse::success(status))),
        None => Err(ServiceError::BadRequest("Invalid warranty code".into())),
    }
}

async fn verify_warranty_page(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
    Client(client): Client,
) -> Result<Html<String>, ErrorPage> {
    let documents = &state.config.documents;
    let status = match state
        .document_service
        .verify_warranty(&query.code, query.order, VerifySurface::Page, &client)
        .await
    {
        Ok(status) => status,
        Err(ServiceError::NotFound(_)) | Err(ServiceError::BadRequest(_)) => None,
        Err(e) => return Err(e.into()),
    };
    Ok(Html(render_verification_page(status.as_ref(), documents)))
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    order_id: Option<OrderId>,
    limit: Option<usize>,
}

async fn get_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
    headers: HeaderMap,
) -> ServiceResult<Json<ApiResponse<Vec<ActivityEntry>>>> {
    require_admin(&state, &headers)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .min(MAX_ACTIVITY_LIMIT);
    let entries = state.document_service.activity().recent(query.order_id, limit);
    Ok(Json(ApiResponse::success(entries)))
}

async fn get_session_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> ServiceResult<Json<ApiResponse<Vec<InteractionRecord>>>> {
    require_admin(&state, &headers)?;
    validate_session_id(&session_id)?;
    Ok(Json(ApiResponse::success(state.history.for_session(&session_id))))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/track", post(track_interaction))
        .route("/sessions/end", post(end_session))
        .route("/fingerprint", post(compute_fingerprint))
        .route("/recommendations", post(post_recommendations))
        .route("/recommendations/:session_id", get(get_session_recommendations))
        .route("/profiles/:session_id", get(get_profile))
        .route("/showcase/:mode", get(get_showcase))
        .route("/documents/:kind", get(get_document))
        .route("/documents/:kind/tokens", post(mint_token))
        .route("/documents/:kind/:order_id/cache", delete(clear_document_cache))
        .route("/warranty/verify", get(verify_warranty_api))
        .route("/warranty/verify/page", get(verify_warranty_page))
        .route("/admin/activity", get(get_activity))
        .route("/admin/sessions/:session_id/history", get(get_session_history))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarded_header() {
        let peer: IpAddr = "198.51.100.4".parse().unwrap();
        assert_eq!(client_address(&forwarded("10.0.0.1"), Some(peer), &[]), "198.51.100.4");
    }

    #[test]
    fn test_trusted_proxy_reports_first_forwarded_entry() {
        let proxy: IpAddr = "127.0.0.1".parse().unwrap();
        let headers = forwarded("203.0.113.9, 10.0.0.2");
        assert_eq!(client_address(&headers, Some(proxy), &[proxy]), "203.0.113.9");
        assert_eq!(client_address(&HeaderMap::new(), Some(proxy), &[proxy]), "127.0.0.1");
    }

    #[test]
    fn test_missing_peer_is_unknown() {
        assert_eq!(client_address(&forwarded("10.0.0.1"), None, &[]), "unknown");
    }
}
