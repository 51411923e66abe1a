pub mod algorithms;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::config::Config;
pub use error::{ApiResponse, ServiceError, ServiceResult};
pub use models::*;

use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<services::store::InMemoryStore>,
    pub transients: Arc<dyn services::transient::TransientStore>,
    pub history: Arc<services::history::InteractionHistory>,
    pub recommendation_service: Arc<services::recommendation::RecommendationService>,
    pub showcase_service: Arc<services::showcase::ShowcaseService>,
    pub document_service: Arc<services::documents::DocumentService>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let store = Arc::new(match config.store.seed_path.as_deref() {
            Some(path) => services::store::InMemoryStore::load(path).await?,
            None => services::store::InMemoryStore::new(),
        });

        let transients = services::transient::connect(&config.transients).await?;

        let history = Arc::new(services::history::InteractionHistory::new(
            config.personalization.history_cap,
        ));

        let recommendation_service = Arc::new(
            services::recommendation::RecommendationService::new(
                store.clone(),
                transients.clone(),
                history.clone(),
                config.clone(),
            ),
        );

        let showcase_service = Arc::new(services::showcase::ShowcaseService::new(
            store.clone(),
            recommendation_service.clone(),
            config.clone(),
        ));

        let rate_limiter = Arc::new(services::rate_limit::RateLimiter::new(transients.clone()));
        let activity = Arc::new(services::activity::ActivityLog::new(
            config.documents.activity_log_cap,
        ));

        let document_service = Arc::new(services::documents::DocumentService::new(
            store.clone(),
            transients.clone(),
            rate_limiter,
            activity,
            config.clone(),
        ));

        Ok(Self {
            config,
            store,
            transients,
            history,
            recommendation_service,
            showcase_service,
            document_service,
        })
    }
}

pub async fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
