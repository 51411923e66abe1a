use crate::algorithms::{merge_bands, plan_bands, AllocationInput, InterestAggregator, Segment};
use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::models::*;
use crate::services::history::InteractionHistory;
use crate::services::store::{ProductCatalog, ProductOrder, ProductQuery};
use crate::services::transient::TransientStore;
use crate::utils::format_price;
use crate::utils::validation::{
    build_interaction_event, validate_fingerprint, validate_limit, validate_session_id,
    validate_user_profile,
};
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Inactivity after which the next interaction counts as a new visit.
const SESSION_GAP_MINUTES: i64 = 30;

pub fn new_session_id() -> String {
    format!("bs_{}_{}", &uuid::Uuid::new_v4().simple().to_string()[..16], Utc::now().timestamp())
}

/// Tracks interactions into per-session profiles and serves price-banded
/// recommendations from the catalog.
///
/// Profile updates are read-modify-write per session with last-writer-wins:
/// parallel tabs of one browser may overwrite each other's increments.
pub struct RecommendationService {
    catalog: Arc<dyn ProductCatalog>,
    transients: Arc<dyn TransientStore>,
    history: Arc<InteractionHistory>,
    aggregator: InterestAggregator,
    config: Arc<Config>,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        transients: Arc<dyn TransientStore>,
        history: Arc<InteractionHistory>,
        config: Arc<Config>,
    ) -> Self {
        let aggregator = InterestAggregator::new(
            config.personalization.price_window,
            config.personalization.recently_viewed_cap,
        );

        Self {
            catalog,
            transients,
            history,
            aggregator,
            config,
        }
    }

    pub async fn track_interaction(&self, request: &TrackRequest) -> ServiceResult<TrackResponse> {
        let session_id = match request.session_id.as_deref() {
            Some(id) => {
                validate_session_id(id)?;
                id.to_string()
            }
            None => new_session_id(),
        };
        let fingerprint = validate_fingerprint(request.fingerprint.as_deref())?;

        let Some(event) = build_interaction_event(request)? else {
            debug!(session_id = %session_id, "tracking call carried no usable product data");
            return Ok(TrackResponse {
                session_id,
                recorded: false,
                message: "Nothing to track".to_string(),
            });
        };

        self.history.append(InteractionRecord {
            session_id: session_id.clone(),
            fingerprint: fingerprint.clone(),
            event: event.clone(),
        });

        let mut profile = self
            .get_or_create_profile(&session_id, fingerprint.as_deref())
            .await?;
        if event.timestamp - profile.last_visit > Duration::minutes(SESSION_GAP_MINUTES) {
            profile.start_session(event.timestamp);
        }
        self.aggregator.fold(&mut profile, &event);
        self.save_profile(&session_id, profile).await?;

        info!(
            session_id = %session_id,
            interaction = event.interaction_type.as_str(),
            "Interaction tracked"
        );
        Ok(TrackResponse {
            session_id,
            recorded: true,
            message: "Interaction tracked".to_string(),
        })
    }

    pub async fn end_session(&self, request: &SessionEndRequest) -> ServiceResult<UserProfile> {
        validate_session_id(&request.session_id)?;
        if !request.duration_ms.is_finite() {
            return Err(ServiceError::BadRequest("Duration must be finite".into()));
        }

        let mut profile = self
            .get_profile(&request.session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Profile".into()))?;
        self.aggregator.fold_session_end(
            &mut profile,
            request.duration_ms,
            request.scroll_depth.filter(|d| d.is_finite()),
            Utc::now(),
        );
        self.save_profile(&request.session_id, profile.clone()).await?;
        Ok(profile)
    }

    /// Reads the session profile from the transient store; entries past
    /// `profile_ttl_seconds` are gone.
    pub async fn get_profile(&self, session_id: &str) -> Result<Option<UserProfile>> {
        if let Some(cached) = self.transients.get(&profile_key(session_id)).await? {
            match serde_json::from_str::<UserProfile>(&cached) {
                Ok(profile) => return Ok(Some(profile)),
                Err(e) => tracing::warn!(session_id = %session_id, "discarding unreadable profile: {}", e),
            }
        }

        Ok(None)
    }

    async fn get_or_create_profile(&self, session_id: &str, fingerprint: Option<&str>) -> Result<UserProfile> {
        if let Some(profile) = self.get_profile(session_id).await? {
            return Ok(profile);
        }

        let id = fingerprint.unwrap_or(session_id);
        info!("Created new profile for session {}", session_id);
        Ok(UserProfile::new(id).with_session(session_id))
    }

    async fn save_profile(&self, session_id: &str, profile: UserProfile) -> Result<()> {
        let json = serde_json::to_string(&profile)?;
        let ttl = std::time::Duration::from_secs(self.config.transients.profile_ttl_seconds);
        self.transients.set(&profile_key(session_id), &json, ttl).await?;
        Ok(())
    }

    /// Resolves the profile for a recommendation call: the client copy wins,
    /// then the server-side session profile, then nothing.
    pub async fn get_recommendations(&self, body: &RecommendationBody) -> ServiceResult<RecommendationResponse> {
        let personalization = &self.config.personalization;
        let limit = validate_limit(body.limit, personalization.default_limit, personalization.max_limit)?;

        let stored = match body.session_id.as_deref() {
            Some(session_id) if body.profile.is_none() => {
                validate_session_id(session_id)?;
                self.get_profile(session_id).await?
            }
            _ => None,
        };
        let profile = match body.profile.as_ref() {
            Some(profile) => {
                validate_user_profile(profile)?;
                Some(profile)
            }
            None => stored.as_ref(),
        };

        let products = self.recommend(limit, profile).await?;

        Ok(RecommendationResponse {
            products: self.summarize(products),
            session_id: body.session_id.clone(),
            segment: Segment::classify(profile).as_str().to_string(),
            generated_at: Utc::now(),
        })
    }

    pub fn allocation_input(&self, profile: &UserProfile, limit: usize) -> AllocationInput {
        let top = self.config.personalization.top_interests;
        AllocationInput {
            average_price: profile.average_price(),
            top_categories: profile.categories.top(top),
            top_brands: profile.brands.top(top),
            limit,
        }
    }

    pub async fn recommend(&self, limit: usize, profile: Option<&UserProfile>) -> Result<Vec<Product>> {
        match profile {
            Some(profile) => self.allocate(&self.allocation_input(profile, limit)).await,
            None => self.popular_products(limit).await,
        }
    }

    /// Splits the request into budget, upsell and value price bands and merges
    /// the per-band catalog results.
    pub async fn allocate(&self, input: &AllocationInput) -> Result<Vec<Product>> {
        if input.is_unknown_visitor() {
            return self.popular_products(input.limit).await;
        }

        let mut bands = Vec::with_capacity(3);
        for plan in plan_bands(input.average_price, input.limit) {
            let query = ProductQuery::new(plan.count)
                .price_between(plan.min_price, plan.max_price)
                .in_categories(input.top_categories.clone())
                .with_brands(input.top_brands.clone())
                .ordered_by(ProductOrder::Random);
            let found = self.catalog.query_products(&query).await?;
            debug!(band = ?plan.band, requested = plan.count, found = found.len(), "band query");
            bands.push(found);
        }

        let preserve = self.config.personalization.preserve_band_order;
        let mut rng = rand::thread_rng();
        Ok(merge_bands(bands, input.limit, preserve, &mut rng))
    }

    /// Best sellers, most sold first.
    pub async fn popular_products(&self, limit: usize) -> Result<Vec<Product>> {
        let query = ProductQuery::new(limit).ordered_by(ProductOrder::BestSelling);
        self.catalog.query_products(&query).await
    }

    pub fn summarize(&self, products: Vec<Product>) -> Vec<ProductSummary> {
        let symbol = &self.config.personalization.currency_symbol;
        products
            .into_iter()
            .map(|p| ProductSummary {
                id: p.id,
                price: format_price(p.price, symbol),
                title: p.title,
                image: p.image_url,
                link: p.permalink,
            })
            .collect()
    }

    pub fn history(&self) -> &InteractionHistory {
        &self.history
    }
}

fn profile_key(session_id: &str) -> String {
    format!("bs_profile:{}", session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemoryStore;
    use crate::services::transient::MemoryTransients;
    use std::collections::HashSet;

    async fn service(preserve_band_order: bool) -> RecommendationService {
        let mut config = Config::default();
        config.personalization.preserve_band_order = preserve_band_order;
        service_with(config).await
    }

    async fn service_with(config: Config) -> RecommendationService {
        let store = InMemoryStore::new();
        let mut products = Vec::new();
        for id in 1..=60u64 {
            let price = 40.0 + id as f64 * 2.0;
            let category = if id % 2 == 0 { "phones" } else { "audio" };
            products.push(
                Product::new(id, format!("Item {}", id), price)
                    .with_categories(vec![category.to_string()])
                    .with_sales(id * 3),
            );
        }
        store.batch_insert_products(products).await;

        RecommendationService::new(
            Arc::new(store),
            Arc::new(MemoryTransients::new()),
            Arc::new(InteractionHistory::new(1000)),
            Arc::new(config),
        )
    }

    fn input(average_price: f64, limit: usize) -> AllocationInput {
        AllocationInput {
            average_price,
            top_categories: vec!["phones".to_string()],
            top_brands: Vec::new(),
            limit,
        }
    }

    #[tokio::test]
    async fn test_allocation_bounded_and_unique() {
        let service = service(false).await;
        for limit in 1..=12 {
            let products = service.allocate(&input(100.0, limit)).await.unwrap();
            assert!(products.len() <= limit);
            let ids: HashSet<_> = products.iter().map(|p| p.id).collect();
            assert_eq!(ids.len(), products.len());
            assert!(products.iter().all(|p| p.categories.contains(&"phones".to_string())));
            assert!(products.iter().all(|p| p.price >= 50.0 && p.price <= 150.0));
        }
    }

    #[tokio::test]
    async fn test_zero_average_uses_popular_fallback() {
        let service = service(false).await;
        let products = service.allocate(&input(0.0, 5)).await.unwrap();
        let ids: Vec<_> = products.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![60, 59, 58, 57, 56]);
    }

    #[tokio::test]
    async fn test_preserved_band_order() {
        let service = service(true).await;
        let products = service.allocate(&input(100.0, 10)).await.unwrap();
        let budget_len = products
            .iter()
            .take_while(|p| p.price >= 80.0 && p.price <= 120.0)
            .count();
        assert!(budget_len >= 1);
        assert!(products[budget_len..]
            .iter()
            .all(|p| !(p.price > 80.0 && p.price < 120.0)));
    }

    #[tokio::test]
    async fn test_track_then_recommend() {
        let service = service(false).await;
        let request = TrackRequest {
            session_id: Some("bs_test_1".to_string()),
            fingerprint: Some("fp_abc".to_string()),
            interaction_type: InteractionType::ProductView,
            product_id: Some(30),
            category: Some("phones".to_string()),
            brand: None,
            price: Some(100.0),
            structured_data: None,
            hints: None,
        };
        let response = service.track_interaction(&request).await.unwrap();
        assert!(response.recorded);
        assert_eq!(service.history().len(), 1);

        let profile = service.get_profile("bs_test_1").await.unwrap().unwrap();
        assert_eq!(profile.id, "fp_abc");
        assert_eq!(profile.categories.get("phones"), Some(1));
        assert_eq!(profile.products_viewed[0].id, 30);

        let body = RecommendationBody {
            limit: Some(4),
            session_id: Some("bs_test_1".to_string()),
            profile: None,
        };
        let recs = service.get_recommendations(&body).await.unwrap();
        assert!(recs.products.len() <= 4);
        assert_eq!(recs.segment, "new_visitor");
        assert!(recs.products.iter().all(|p| p.price.starts_with('₺')));
    }

    fn view(session_id: &str, product_id: ProductId) -> TrackRequest {
        TrackRequest {
            session_id: Some(session_id.to_string()),
            fingerprint: None,
            interaction_type: InteractionType::ProductView,
            product_id: Some(product_id),
            category: Some("phones".to_string()),
            brand: None,
            price: Some(100.0),
            structured_data: None,
            hints: None,
        }
    }

    #[tokio::test]
    async fn test_profile_expires_with_transient_ttl() {
        let mut config = Config::default();
        config.transients.profile_ttl_seconds = 0;
        let service = service_with(config).await;

        service.track_interaction(&view("bs_short_1", 30)).await.unwrap();
        assert!(service.get_profile("bs_short_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_read_back_from_transients() {
        let service = service(false).await;
        service.track_interaction(&view("bs_keep_1", 30)).await.unwrap();
        service.track_interaction(&view("bs_keep_1", 32)).await.unwrap();

        let profile = service.get_profile("bs_keep_1").await.unwrap().unwrap();
        assert_eq!(profile.categories.get("phones"), Some(2));
        assert_eq!(profile.interaction_count, 2);
    }

    #[test]
    fn test_new_session_id_shape() {
        let id = new_session_id();
        assert!(id.starts_with("bs_"));
        assert!(validate_session_id(&id).is_ok());
    }
}
