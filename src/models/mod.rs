use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod interests;
pub mod requests;

pub use interests::{Interests, MAX_INTERESTS};
pub use requests::*;

pub type ProductId = u64;
pub type OrderId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    ProductView,
    ProductClick,
    CategoryBrowse,
    AddToCart,
    WhatsappOrder,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::ProductView => "product_view",
            InteractionType::ProductClick => "product_click",
            InteractionType::CategoryBrowse => "category_browse",
            InteractionType::AddToCart => "add_to_cart",
            InteractionType::WhatsappOrder => "whatsapp_order",
        }
    }
}

/// A single observed interaction. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub interaction_type: InteractionType,
    pub product_id: Option<ProductId>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl InteractionEvent {
    pub fn new(interaction_type: InteractionType) -> Self {
        Self {
            interaction_type,
            product_id: None,
            category: None,
            brand: None,
            price: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Server-side history row for an accepted interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub session_id: String,
    pub fingerprint: Option<String>,
    pub event: InteractionEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewedProduct {
    pub id: ProductId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricePreferences {
    pub views: Vec<f64>,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    pub avg_session_duration_ms: f64,
    pub last_scroll_depth: Option<f64>,
    pub preferred_visit_hour: Option<u32>,
    pub conversion_events: u64,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            avg_session_duration_ms: 0.0,
            last_scroll_depth: None,
            preferred_visit_hour: None,
            conversion_events: 0,
        }
    }
}

/// Accumulated interest record for one visitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub created: DateTime<Utc>,
    pub last_visit: DateTime<Utc>,
    #[serde(default = "one")]
    pub sessions: u64,
    #[serde(default)]
    pub interaction_count: u64,
    #[serde(default)]
    pub categories: Interests,
    #[serde(default)]
    pub brands: Interests,
    #[serde(default)]
    pub products_viewed: Vec<ViewedProduct>,
    #[serde(default)]
    pub price_preferences: PricePreferences,
    #[serde(default)]
    pub behavior: Behavior,
}

fn one() -> u64 {
    1
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            session_id: None,
            created: now,
            last_visit: now,
            sessions: 1,
            interaction_count: 0,
            categories: Interests::default(),
            brands: Interests::default(),
            products_viewed: Vec::new(),
            price_preferences: PricePreferences::default(),
            behavior: Behavior::default(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn average_price(&self) -> f64 {
        self.price_preferences.average
    }

    /// Marks the start of a new visit.
    pub fn start_session(&mut self, now: DateTime<Utc>) {
        self.sessions += 1;
        self.last_visit = now;
    }
}

/// A catalog entry as seen by the recommendation queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub permalink: String,
    #[serde(default)]
    pub total_sales: u64,
    #[serde(default = "published")]
    pub published: bool,
}

fn published() -> bool {
    true
}

impl Product {
    pub fn new(id: ProductId, title: impl Into<String>, price: f64) -> Self {
        Self {
            id,
            title: title.into(),
            price,
            categories: Vec::new(),
            brand: None,
            image_url: None,
            permalink: format!("/product/{}", id),
            total_sales: 0,
            published: true,
        }
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_sales(mut self, total_sales: u64) -> Self {
        self.total_sales = total_sales;
        self
    }
}

/// Presentation shape returned to widgets and API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub price: String,
    pub image: Option<String>,
    pub link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub limit: usize,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub products: Vec<ProductSummary>,
    pub session_id: Option<String>,
    pub segment: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl BillingDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    /// Line total after discounts, before tax.
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub billing: BillingDetails,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_total: f64,
    #[serde(default)]
    pub total_tax: f64,
    pub total: f64,
}
