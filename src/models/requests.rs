use serde::{Deserialize, Serialize};

use super::{InteractionType, OrderId, ProductId, UserProfile};
use crate::utils::extraction::ProductHints;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    /// Raw JSON-LD block from the product page.
    #[serde(default)]
    pub structured_data: Option<String>,
    #[serde(default)]
    pub hints: Option<ProductHints>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResponse {
    pub session_id: String,
    pub recorded: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEndRequest {
    pub session_id: String,
    pub duration_ms: f64,
    #[serde(default)]
    pub scroll_depth: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationBody {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRequest {
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintResponse {
    pub fingerprint: String,
    /// Always true: the value is a correlation heuristic, never a credential.
    pub heuristic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub url: String,
    pub expires_at: i64,
}
