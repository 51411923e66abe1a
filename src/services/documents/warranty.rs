use crate::config::DocumentConfig;
use crate::models::{Order, OrderId};
use crate::utils::{escape_html, percent_encode, random_code, truncate_name};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use super::security_hash;

const MAX_PRODUCT_NAME: usize = 40;

pub fn warranty_code(order_number: &str) -> String {
    format!("WR-{}-{}", order_number, random_code(6))
}

/// A code is accepted when it carries the order's `WR-<order_number>-` prefix.
pub fn code_matches(code: &str, order_number: &str) -> bool {
    code.starts_with(&format!("WR-{}-", order_number))
}

pub fn warranty_end(start: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    start.checked_add_months(Months::new(months)).unwrap_or(start)
}

pub fn verification_url(site_url: &str, code: &str, order_id: OrderId) -> String {
    format!(
        "{}/warranty/verify/page?code={}&order={}",
        site_url.trim_end_matches('/'),
        percent_encode(code),
        order_id
    )
}

pub fn qr_url(qr_service_url: &str, verification_url: &str) -> String {
    format!("{}{}", qr_service_url, percent_encode(verification_url))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarrantyLine {
    pub position: usize,
    pub name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarrantyCertificate {
    pub code: String,
    pub lines: Vec<WarrantyLine>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub qr_url: Option<String>,
}

impl WarrantyCertificate {
    pub fn from_order(order: &Order, code: String, config: &DocumentConfig, include_qr: bool) -> Self {
        let lines = order
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| WarrantyLine {
                position: i + 1,
                name: truncate_name(&item.name, MAX_PRODUCT_NAME),
                quantity: item.quantity,
            })
            .collect();

        let qr_url = include_qr.then(|| {
            qr_url(
                &config.qr_service_url,
                &verification_url(&config.site_url, &code, order.id),
            )
        });

        Self {
            lines,
            starts_at: order.created_at,
            ends_at: warranty_end(order.created_at, config.warranty_months),
            qr_url,
            code,
        }
    }
}

/// Result of checking a warranty code against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarrantyStatus {
    pub order_number: String,
    pub customer_name: String,
    pub order_date: String,
    pub warranty_end: String,
    pub is_active: bool,
}

impl WarrantyStatus {
    pub fn for_order(order: &Order, months: u32, now: DateTime<Utc>, date_format: &str) -> Self {
        let end = warranty_end(order.created_at, months);
        Self {
            order_number: order.order_number.clone(),
            customer_name: order.billing.full_name(),
            order_date: order.created_at.format(date_format).to_string(),
            warranty_end: end.format(date_format).to_string(),
            is_active: end > now,
        }
    }
}

pub fn render_certificate(order: &Order, certificate: &WarrantyCertificate, config: &DocumentConfig) -> String {
    let hash = security_hash(&certificate.code, &order.billing.email, &config.secure_auth_key);

    let rows: String = certificate
        .lines
        .iter()
        .map(|line| {
            format!(
                "<tr><td class=\"text-center\">{}</td><td class=\"product-name\">{}</td>\
                 <td class=\"text-center\">{}</td></tr>",
                line.position,
                escape_html(&line.name),
                line.quantity
            )
        })
        .collect();

    let qr = match &certificate.qr_url {
        Some(url) => format!(
            "<div class=\"qr\"><img src=\"{}\" alt=\"QR\" width=\"150\" height=\"150\"></div>",
            escape_html(url)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="tr">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Warranty Certificate - {code}</title>
<style>
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{ font-family: Arial, sans-serif; background: #f5f5f5; color: #1a1a1a; line-height: 1.4; padding: 15px; font-size: 14px; }}
.certificate {{ max-width: 800px; margin: 0 auto; background: #fff; padding: 30px; border-top: 4px solid #FF6000; }}
table {{ width: 100%; border-collapse: collapse; }}
td, th {{ padding: 6px; border-bottom: 1px solid #eee; }}
.text-center {{ text-align: center; }}
.qr {{ float: right; }}
@media print {{ body {{ background: #fff; padding: 0; }} .no-print {{ display: none; }} }}
</style>
</head>
<body>
<div class="certificate">
{qr}
<header>
<h1>{site}</h1>
<h2>Warranty Certificate</h2>
<p><strong>Code:</strong> {code}</p>
</header>
<section class="customer">
<p><strong>Customer:</strong> {customer}</p>
<p><strong>Email:</strong> {email}</p>
<p><strong>Phone:</strong> {phone}</p>
<p><strong>Order No:</strong> #{order_number}</p>
</section>
<section class="period">
<p><strong>Warranty Start:</strong> {start}</p>
<p><strong>Warranty End:</strong> {end}</p>
</section>
<table class="items">
<thead><tr><th>#</th><th>Product</th><th>Qty</th></tr></thead>
<tbody>{rows}</tbody>
</table>
<footer>
<p>{address}</p>
<p>Security code: {hash}</p>
</footer>
<button class="no-print" onclick="window.print()">Print</button>
</div>
</body>
</html>"#,
        qr = qr,
        site = escape_html(&config.site_name),
        code = escape_html(&certificate.code),
        customer = escape_html(&order.billing.full_name()),
        email = escape_html(&order.billing.email),
        phone = escape_html(&order.billing.phone),
        order_number = escape_html(&order.order_number),
        start = certificate.starts_at.format("%d %b %Y"),
        end = certificate.ends_at.format("%d %b %Y"),
        rows = rows,
        address = escape_html(&config.store_address),
        hash = hash,
    )
}

pub fn render_verification_page(status: Option<&WarrantyStatus>, config: &DocumentConfig) -> String {
    let body = match status {
        Some(status) => {
            let state = if status.is_active {
                "<span class=\"active\">Active</span>"
            } else {
                "<span class=\"expired\">Expired</span>"
            };
            format!(
                "<div class=\"success\"><h3>Warranty certificate is valid</h3><div class=\"info-box\">\
                 <p><strong>Order No:</strong> #{}</p><p><strong>Customer:</strong> {}</p>\
                 <p><strong>Order Date:</strong> {}</p><p><strong>Warranty End:</strong> {}</p>\
                 <p><strong>Status:</strong> {}</p></div></div>",
                escape_html(&status.order_number),
                escape_html(&status.customer_name),
                escape_html(&status.order_date),
                escape_html(&status.warranty_end),
                state
            )
        }
        None => "<div class=\"error\"><h3>Invalid warranty certificate</h3>\
                 <p>This warranty code could not be verified. Please scan the QR code on your certificate again.</p></div>"
            .to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="tr">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Warranty Verification - {site}</title>
<style>
body {{ font-family: Arial, sans-serif; background: #f5f5f5; padding: 20px; }}
.container {{ max-width: 600px; margin: 0 auto; background: white; padding: 30px; border-radius: 10px; }}
.success {{ color: #27ae60; border-left: 4px solid #27ae60; padding: 15px; background: #f8fff8; }}
.error {{ color: #e74c3c; border-left: 4px solid #e74c3c; padding: 15px; background: #fff8f8; }}
.active {{ color: #27ae60; }}
.expired {{ color: #e74c3c; }}
.back-btn {{ display: inline-block; background: #FF6000; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; margin-top: 20px; }}
</style>
</head>
<body>
<div class="container">
<h2>Warranty Certificate Verification</h2>
{body}
<a href="{home}" class="back-btn">Back to store</a>
</div>
</body>
</html>"#,
        site = escape_html(&config.site_name),
        body = body,
        home = escape_html(&config.site_url),
    )
}
