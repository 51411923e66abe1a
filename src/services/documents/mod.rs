//! Printable invoice and warranty documents for orders, plus public warranty verification.

pub mod invoice;
pub mod token;
pub mod warranty;

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Order, OrderId, TokenResponse};
use crate::services::activity::{ActivityEntry, ActivityLog};
use crate::services::rate_limit::RateLimiter;
use crate::services::store::OrderBook;
use crate::services::transient::TransientStore;
use crate::utils::sha256_hex;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub use invoice::{invoice_number, render_invoice, Invoice};
pub use token::{TokenClaims, TokenError, TokenSigner};
pub use warranty::{code_matches, warranty_code, WarrantyCertificate, WarrantyStatus};

type HmacSha256 = Hmac<Sha256>;

const MAX_CODE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Invoice,
    Warranty,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Warranty => "warranty",
        }
    }

    pub fn cache_key(&self, order_id: OrderId) -> String {
        match self {
            DocumentKind::Invoice => format!("invoice_cache_v2_{}", order_id),
            DocumentKind::Warranty => format!("warranty_cache_v5_{}", order_id),
        }
    }
}

impl FromStr for DocumentKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice" => Ok(DocumentKind::Invoice),
            "warranty" => Ok(DocumentKind::Warranty),
            other => Err(ServiceError::NotFound(format!("Document kind '{}'", other))),
        }
    }
}

/// First 8 uppercase hex characters of SHA-256(code + email + secret).
pub fn security_hash(code: &str, email: &str, secret: &str) -> String {
    sha256_hex(&format!("{}{}{}", code, email, secret))[..8].to_uppercase()
}

pub fn document_url(site_url: &str, kind: DocumentKind, token: &str) -> String {
    format!("{}/documents/{}?token={}", site_url.trim_end_matches('/'), kind.as_str(), token)
}

/// How the caller proved access to an order's document.
#[derive(Debug, Clone)]
pub enum DocumentAccess {
    Token(String),
    Admin(OrderId),
}

#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub address: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifySurface {
    Api,
    Page,
}

impl VerifySurface {
    fn scope(&self) -> &'static str {
        match self {
            VerifySurface::Api => "warranty_verify_api",
            VerifySurface::Page => "warranty_verify_page",
        }
    }

    fn action(&self, success: bool) -> &'static str {
        match (self, success) {
            (VerifySurface::Api, true) => "api_verify_success",
            (VerifySurface::Api, false) => "api_verify_failed",
            (VerifySurface::Page, true) => "qr_verify_success",
            (VerifySurface::Page, false) => "qr_verify_failed",
        }
    }

    fn date_format(&self) -> &'static str {
        match self {
            VerifySurface::Api => "%Y-%m-%d",
            VerifySurface::Page => "%d %B %Y",
        }
    }
}

pub struct DocumentService {
    orders: Arc<dyn OrderBook>,
    transients: Arc<dyn TransientStore>,
    rate_limiter: Arc<RateLimiter>,
    activity: Arc<ActivityLog>,
    config: Arc<Config>,
    invoice_signer: TokenSigner,
    warranty_signer: TokenSigner,
}

impl DocumentService {
    pub fn new(
        orders: Arc<dyn OrderBook>,
        transients: Arc<dyn TransientStore>,
        rate_limiter: Arc<RateLimiter>,
        activity: Arc<ActivityLog>,
        config: Arc<Config>,
    ) -> Self {
        let documents = &config.documents;
        let invoice_signer =
            TokenSigner::new(DocumentKind::Invoice, &documents.secure_auth_key, documents.token_ttl_hours);
        let warranty_signer =
            TokenSigner::new(DocumentKind::Warranty, &documents.secure_auth_key, documents.token_ttl_hours);

        Self {
            orders,
            transients,
            rate_limiter,
            activity,
            config,
            invoice_signer,
            warranty_signer,
        }
    }

    pub fn signer(&self, kind: DocumentKind) -> &TokenSigner {
        match kind {
            DocumentKind::Invoice => &self.invoice_signer,
            DocumentKind::Warranty => &self.warranty_signer,
        }
    }

    /// Compares the presented bearer key with the configured admin key by digest.
    pub fn authorize_admin(&self, presented: Option<&str>) -> ServiceResult<()> {
        let expected = &self.config.documents.admin_api_key;
        match presented {
            Some(key) if !expected.is_empty() && self.admin_key_matches(key, expected) => Ok(()),
            _ => Err(ServiceError::Unauthorized),
        }
    }

    /// Constant-time comparison of HMAC tags keyed with the site secret.
    fn admin_key_matches(&self, presented: &str, expected: &str) -> bool {
        let keyed = |value: &str| {
            HmacSha256::new_from_slice(self.config.documents.secure_auth_key.as_bytes()).map(|mut mac| {
                mac.update(value.as_bytes());
                mac
            })
        };
        match (keyed(presented), keyed(expected)) {
            (Ok(presented), Ok(expected)) => presented
                .verify_slice(&expected.finalize().into_bytes())
                .is_ok(),
            _ => false,
        }
    }

    async fn load_order(&self, order_id: OrderId) -> ServiceResult<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order".into()))
    }

    fn log(&self, order_id: OrderId, kind: DocumentKind, action: &str, client: &ClientContext, details: Option<String>) {
        self.activity.record(ActivityEntry {
            order_id,
            kind: kind.as_str().to_string(),
            action: action.to_string(),
            client: client.address.clone(),
            user_agent: client.user_agent.clone(),
            details,
            created_at: Utc::now(),
        });
    }

    /// Renders the document, serving the cached copy when one exists.
    pub async fn render(
        &self,
        kind: DocumentKind,
        access: DocumentAccess,
        client: &ClientContext,
    ) -> ServiceResult<String> {
        self.rate_limiter
            .check(kind.as_str(), &client.address, &self.config.rate_limits.documents)
            .await?;

        let order_id = match access {
            DocumentAccess::Token(token) => {
                self.signer(kind)
                    .verify(&token, Utc::now())
                    .map_err(|e| {
                        debug!(kind = kind.as_str(), "rejected document token: {}", e);
                        ServiceError::InvalidToken
                    })?
                    .order_id
            }
            DocumentAccess::Admin(order_id) => order_id,
        };

        let order = self.load_order(order_id).await?;

        let cache_key = kind.cache_key(order_id);
        if let Some(html) = self.transients.get(&cache_key).await? {
            self.log(order_id, kind, "generate_cached", client, None);
            return Ok(html);
        }

        self.log(order_id, kind, "generate_new", client, None);
        let html = self.generate(kind, &order);
        let ttl = Duration::from_secs(self.config.documents.cache_ttl_seconds);
        self.transients.set(&cache_key, &html, ttl).await?;

        info!(order_id, kind = kind.as_str(), "Generated document");
        Ok(html)
    }

    pub fn generate(&self, kind: DocumentKind, order: &Order) -> String {
        let documents = &self.config.documents;
        match kind {
            DocumentKind::Invoice => {
                let invoice = Invoice::from_order(order, invoice_number(&order.order_number));
                render_invoice(order, &invoice, documents, &self.config.personalization.currency_symbol)
            }
            DocumentKind::Warranty => {
                let certificate =
                    WarrantyCertificate::from_order(order, warranty_code(&order.order_number), documents, true);
                warranty::render_certificate(order, &certificate, documents)
            }
        }
    }

    /// Mints a token for the order's billing email.
    pub async fn issue_token(&self, kind: DocumentKind, order_id: OrderId) -> ServiceResult<TokenResponse> {
        let order = self.load_order(order_id).await?;
        self.token_for(kind, &order, Utc::now())
    }

    pub fn token_for(&self, kind: DocumentKind, order: &Order, now: DateTime<Utc>) -> ServiceResult<TokenResponse> {
        let signer = self.signer(kind);
        let token = signer
            .issue(order.id, &order.billing.email, now)
            .map_err(|e| ServiceError::Internal(e.into()))?;
        let claims = signer
            .verify(&token, now)
            .map_err(|e| ServiceError::Internal(e.into()))?;

        Ok(TokenResponse {
            url: document_url(&self.config.documents.site_url, kind, &token),
            token,
            expires_at: claims.expire,
        })
    }

    pub async fn clear_cache(&self, kind: DocumentKind, order_id: OrderId) -> ServiceResult<()> {
        self.transients.delete(&kind.cache_key(order_id)).await?;
        info!(order_id, kind = kind.as_str(), "Cleared cached document");
        Ok(())
    }

    /// Checks a warranty code against an order. `Ok(None)` means the order exists
    /// but the code does not belong to it.
    pub async fn verify_warranty(
        &self,
        code: &str,
        order_id: OrderId,
        surface: VerifySurface,
        client: &ClientContext,
    ) -> ServiceResult<Option<WarrantyStatus>> {
        let policy = match surface {
            VerifySurface::Api => &self.config.rate_limits.verify_api,
            VerifySurface::Page => &self.config.rate_limits.verify_page,
        };
        self.rate_limiter.check(surface.scope(), &client.address, policy).await?;

        let code = code.trim();
        if code.is_empty() || code.len() > MAX_CODE_LEN {
            return Err(ServiceError::BadRequest("Invalid warranty code".into()));
        }

        let kind = DocumentKind::Warranty;
        let order = match self.orders.get_order(order_id).await? {
            Some(order) => order,
            None => {
                self.log(order_id, kind, surface.action(false), client, Some("Order not found".into()));
                return Err(ServiceError::NotFound("Order".into()));
            }
        };

        if !code_matches(code, &order.order_number) {
            self.log(
                order_id,
                kind,
                surface.action(false),
                client,
                Some(format!("Invalid code: {}", code)),
            );
            return Ok(None);
        }

        self.log(order_id, kind, surface.action(true), client, None);
        Ok(Some(WarrantyStatus::for_order(
            &order,
            self.config.documents.warranty_months,
            Utc::now(),
            surface.date_format(),
        )))
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }
}
