use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::models::*;
use crate::services::recommendation::RecommendationService;
use crate::services::store::{ProductCatalog, ProductOrder, ProductQuery};
use crate::utils::validation::{validate_limit, validate_session_id};
use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

const BUDGET_SPREAD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowcaseMode {
    Similar,
    Budget,
    Category,
    Trending,
    Viewed,
}

impl ShowcaseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShowcaseMode::Similar => "similar",
            ShowcaseMode::Budget => "budget",
            ShowcaseMode::Category => "category",
            ShowcaseMode::Trending => "trending",
            ShowcaseMode::Viewed => "viewed",
        }
    }
}

impl FromStr for ShowcaseMode {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "similar" => Ok(ShowcaseMode::Similar),
            "budget" => Ok(ShowcaseMode::Budget),
            "category" => Ok(ShowcaseMode::Category),
            "trending" => Ok(ShowcaseMode::Trending),
            "viewed" => Ok(ShowcaseMode::Viewed),
            other => Err(ServiceError::BadRequest(format!("Unknown showcase mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShowcaseQuery {
    pub product_id: Option<ProductId>,
    pub session_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowcaseResponse {
    pub mode: ShowcaseMode,
    /// Mode that actually produced the products; `trending` after a fallback.
    pub served_mode: ShowcaseMode,
    pub products: Vec<ProductSummary>,
}

/// Widget feeds built on the catalog and the session profiles.
pub struct ShowcaseService {
    catalog: Arc<dyn ProductCatalog>,
    recommendation_service: Arc<RecommendationService>,
    config: Arc<Config>,
    serving_stats: Arc<DashMap<String, u64>>,
}

impl ShowcaseService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        recommendation_service: Arc<RecommendationService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            catalog,
            recommendation_service,
            config,
            serving_stats: Arc::new(DashMap::new()),
        }
    }

    pub async fn serve(&self, mode: ShowcaseMode, query: &ShowcaseQuery) -> ServiceResult<ShowcaseResponse> {
        self.increment_stat("total_requests");
        let start_time = std::time::Instant::now();

        let personalization = &self.config.personalization;
        let limit = validate_limit(query.limit, personalization.default_limit, personalization.max_limit)?;

        let profile = match query.session_id.as_deref() {
            Some(session_id) => {
                validate_session_id(session_id)?;
                self.recommendation_service.get_profile(session_id).await?
            }
            None => None,
        };

        let selected = match mode {
            ShowcaseMode::Similar => match query.product_id {
                Some(id) => self.similar(id, limit).await?,
                None => None,
            },
            ShowcaseMode::Budget => match profile.as_ref() {
                Some(p) => self.budget(p, limit).await?,
                None => None,
            },
            ShowcaseMode::Category => match profile.as_ref() {
                Some(p) => self.by_category(p, limit).await?,
                None => None,
            },
            ShowcaseMode::Viewed => match profile.as_ref() {
                Some(p) => self.recently_viewed(p, limit).await?,
                None => None,
            },
            ShowcaseMode::Trending => None,
        };

        let (served_mode, products) = match selected {
            Some(products) if !products.is_empty() => (mode, products),
            _ => {
                if mode != ShowcaseMode::Trending {
                    debug!(mode = mode.as_str(), "showcase falling back to trending");
                    self.increment_stat("fallbacks");
                }
                let products = self.recommendation_service.popular_products(limit).await?;
                (ShowcaseMode::Trending, products)
            }
        };

        self.increment_stat(&format!("mode_{}", served_mode.as_str()));
        let latency = start_time.elapsed().as_millis() as u64;
        self.update_latency_stat(latency);

        info!(
            "Served {} showcase ({} products) in {}ms",
            served_mode.as_str(),
            products.len(),
            latency
        );
        Ok(ShowcaseResponse {
            mode,
            served_mode,
            products: self.recommendation_service.summarize(products),
        })
    }

    /// Products sharing a category with `product_id`, excluding it.
    async fn similar(&self, product_id: ProductId, limit: usize) -> Result<Option<Vec<Product>>> {
        let Some(product) = self.catalog.get_product(product_id).await? else {
            return Ok(None);
        };
        if product.categories.is_empty() {
            return Ok(None);
        }

        let mut query = ProductQuery::new(limit).in_categories(product.categories);
        query.exclude_ids.push(product_id);
        Ok(Some(self.catalog.query_products(&query).await?))
    }

    async fn budget(&self, profile: &UserProfile, limit: usize) -> Result<Option<Vec<Product>>> {
        let average = profile.average_price();
        if !(average.is_finite() && average > 0.0) {
            return Ok(None);
        }

        let query = ProductQuery::new(limit)
            .price_between(average * (1.0 - BUDGET_SPREAD), average * (1.0 + BUDGET_SPREAD));
        Ok(Some(self.catalog.query_products(&query).await?))
    }

    async fn by_category(&self, profile: &UserProfile, limit: usize) -> Result<Option<Vec<Product>>> {
        let categories = profile.categories.top(self.config.personalization.top_interests);
        if categories.is_empty() {
            return Ok(None);
        }

        let query = ProductQuery::new(limit).in_categories(categories);
        Ok(Some(self.catalog.query_products(&query).await?))
    }

    /// Most recent view first; repeated views of a product keep their latest position.
    async fn recently_viewed(&self, profile: &UserProfile, limit: usize) -> Result<Option<Vec<Product>>> {
        let mut seen = HashSet::new();
        let ids: Vec<ProductId> = profile
            .products_viewed
            .iter()
            .map(|v| v.id)
            .filter(|id| seen.insert(*id))
            .collect();
        if ids.is_empty() {
            return Ok(None);
        }

        let mut query = ProductQuery::new(limit).ordered_by(ProductOrder::Included);
        query.include_ids = Some(ids);
        Ok(Some(self.catalog.query_products(&query).await?))
    }

    pub fn get_serving_stats(&self) -> HashMap<String, u64> {
        self.serving_stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    fn increment_stat(&self, key: &str) {
        let mut counter = self.serving_stats.entry(key.to_string()).or_insert(0);
        *counter += 1;
    }

    fn update_latency_stat(&self, latency_ms: u64) {
        let current_avg = self.serving_stats.get("avg_latency_ms").map(|v| *v).unwrap_or(0);
        let request_count = self.serving_stats.get("total_requests").map(|v| *v).unwrap_or(1);

        let new_avg = if request_count <= 1 {
            latency_ms
        } else {
            (current_avg * (request_count - 1) + latency_ms) / request_count
        };
        self.serving_stats.insert("avg_latency_ms".to_string(), new_avg);

        let current_max = self.serving_stats.get("max_latency_ms").map(|v| *v).unwrap_or(0);
        if latency_ms > current_max {
            self.serving_stats.insert("max_latency_ms".to_string(), latency_ms);
        }
    }
}
