use crate::models::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProductOrder {
    #[default]
    Random,
    BestSelling,
    /// Keep the order of `include_ids`.
    Included,
}

/// Catalog filter. Empty category/brand lists mean "no filter"; both filters
/// must match when both are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub categories: Vec<String>,
    pub brands: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub include_ids: Option<Vec<ProductId>>,
    pub exclude_ids: Vec<ProductId>,
    pub order: ProductOrder,
    pub limit: usize,
}

impl ProductQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn price_between(mut self, min: f64, max: f64) -> Self {
        self.min_price = Some(min);
        self.max_price = Some(max);
        self
    }

    pub fn in_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_brands(mut self, brands: Vec<String>) -> Self {
        self.brands = brands;
        self
    }

    pub fn ordered_by(mut self, order: ProductOrder) -> Self {
        self.order = order;
        self
    }

    pub fn matches(&self, product: &Product) -> bool {
        if !product.published {
            return false;
        }
        if self.exclude_ids.contains(&product.id) {
            return false;
        }
        if let Some(ref include) = self.include_ids {
            if !include.contains(&product.id) {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if product.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if product.price > max {
                return false;
            }
        }
        if !self.categories.is_empty()
            && !product.categories.iter().any(|c| self.categories.contains(c))
        {
            return false;
        }
        if !self.brands.is_empty() {
            match product.brand {
                Some(ref brand) if self.brands.contains(brand) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Read-only product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn query_products(&self, query: &ProductQuery) -> Result<Vec<Product>>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;
}

#[async_trait]
pub trait OrderBook: Send + Sync {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

/// In-process catalog and order storage, seeded from JSON.
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            products: Arc::new(RwLock::new(HashMap::new())),
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn from_seed(seed: StoreSeed) -> Self {
        let store = Self::new();
        store.batch_insert_products(seed.products).await;
        store.batch_insert_orders(seed.orders).await;
        store
    }

    pub async fn load(path: &str) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading store seed {}", path))?;
        let seed: StoreSeed =
            serde_json::from_str(&raw).with_context(|| format!("parsing store seed {}", path))?;
        info!(
            "Loaded store seed {} ({} products, {} orders)",
            path,
            seed.products.len(),
            seed.orders.len()
        );
        Ok(Self::from_seed(seed).await)
    }

    pub async fn insert_product(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    pub async fn insert_order(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    pub async fn batch_insert_products(&self, products: Vec<Product>) {
        let mut map = self.products.write().await;
        for product in products {
            map.insert(product.id, product);
        }
    }

    pub async fn batch_insert_orders(&self, orders: Vec<Order>) {
        let mut map = self.orders.write().await;
        for order in orders {
            map.insert(order.id, order);
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn query_products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let products = self.products.read().await;
        let mut matched: Vec<Product> = products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        drop(products);

        match query.order {
            ProductOrder::Random => matched.shuffle(&mut rand::thread_rng()),
            ProductOrder::BestSelling => {
                matched.sort_by(|a, b| b.total_sales.cmp(&a.total_sales).then(a.id.cmp(&b.id)))
            }
            ProductOrder::Included => {
                let include = query.include_ids.as_deref().unwrap_or(&[]);
                matched.sort_by_key(|p| include.iter().position(|id| *id == p.id));
            }
        }

        matched.truncate(query.limit);
        Ok(matched)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl OrderBook for InMemoryStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }
}
