use crate::config::DocumentConfig;
use crate::models::Order;
use crate::utils::{escape_html, format_price, random_code};
use serde::{Deserialize, Serialize};

use super::security_hash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub position: usize,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
}

/// Amounts shown on an invoice. Shipping and tax rows exist only when positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub number: String,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: f64,
    pub shipping: Option<f64>,
    pub tax: Option<f64>,
    pub total: f64,
}

pub fn invoice_number(order_number: &str) -> String {
    format!("INV-{}-{}", order_number, random_code(6))
}

impl Invoice {
    pub fn from_order(order: &Order, number: String) -> Self {
        let lines: Vec<InvoiceLine> = order
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| InvoiceLine {
                position: i + 1,
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.total / f64::from(item.quantity.max(1)),
                total: item.total,
            })
            .collect();

        Self {
            number,
            subtotal: lines.iter().map(|l| l.total).sum(),
            lines,
            shipping: Some(order.shipping_total).filter(|s| *s > 0.0),
            tax: Some(order.total_tax).filter(|t| *t > 0.0),
            total: order.total,
        }
    }
}

pub fn render_invoice(order: &Order, invoice: &Invoice, config: &DocumentConfig, symbol: &str) -> String {
    let price = |amount: f64| format_price(amount, symbol);
    let hash = security_hash(&invoice.number, &order.billing.email, &config.secure_auth_key);

    let rows: String = invoice
        .lines
        .iter()
        .map(|line| {
            format!(
                "<tr><td class=\"text-center\">{}</td><td class=\"product-name\">{}</td>\
                 <td class=\"text-center\">{}</td><td class=\"text-right\">{}</td>\
                 <td class=\"text-right strong\">{}</td></tr>",
                line.position,
                escape_html(&line.name),
                line.quantity,
                price(line.unit_price),
                price(line.total)
            )
        })
        .collect();

    let mut totals = format!(
        "<tr><td class=\"label\">Subtotal:</td><td class=\"value\">{}</td></tr>",
        price(invoice.subtotal)
    );
    if let Some(shipping) = invoice.shipping {
        totals.push_str(&format!(
            "<tr><td class=\"label\">Shipping:</td><td class=\"value\">{}</td></tr>",
            price(shipping)
        ));
    }
    if let Some(tax) = invoice.tax {
        totals.push_str(&format!(
            "<tr><td class=\"label\">{}:</td><td class=\"value\">{}</td></tr>",
            escape_html(&config.tax_label),
            price(tax)
        ));
    }
    totals.push_str(&format!(
        "<tr class=\"grand-total\"><td class=\"label\">Total:</td><td class=\"value\">{}</td></tr>",
        price(invoice.total)
    ));

    format!(
        r#"<!DOCTYPE html>
<html lang="tr">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Invoice - {number}</title>
<style>
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{ font-family: Arial, sans-serif; background: #f5f5f5; color: #1a1a1a; padding: 15px; font-size: 14px; }}
.invoice {{ max-width: 800px; margin: 0 auto; background: #fff; padding: 30px; }}
table {{ width: 100%; border-collapse: collapse; }}
td, th {{ padding: 8px; border-bottom: 1px solid #eee; }}
.text-center {{ text-align: center; }}
.text-right, .value {{ text-align: right; }}
.strong, .grand-total {{ font-weight: 600; }}
@media print {{ body {{ background: #fff; padding: 0; }} .no-print {{ display: none; }} }}
</style>
</head>
<body>
<div class="invoice">
<header>
<h1>{site}</h1>
<p>{address}</p>
<p>{admin_email}</p>
</header>
<section class="meta">
<p><strong>Invoice No:</strong> {number}</p>
<p><strong>Order No:</strong> #{order_number}</p>
<p><strong>Date:</strong> {date}</p>
</section>
<section class="customer">
<p><strong>{customer}</strong></p>
<p>{email}</p>
<p>{phone}</p>
</section>
<table class="items">
<thead><tr><th>#</th><th>Product</th><th>Qty</th><th>Unit Price</th><th>Total</th></tr></thead>
<tbody>{rows}</tbody>
</table>
<table class="totals">{totals}</table>
<footer><p>Security code: {hash}</p></footer>
<button class="no-print" onclick="window.print()">Print</button>
</div>
</body>
</html>"#,
        number = escape_html(&invoice.number),
        site = escape_html(&config.site_name),
        address = escape_html(&config.store_address),
        admin_email = escape_html(&config.admin_email),
        order_number = escape_html(&order.order_number),
        date = order.created_at.format("%d.%m.%Y"),
        customer = escape_html(&order.billing.full_name()),
        email = escape_html(&order.billing.email),
        phone = escape_html(&order.billing.phone),
        rows = rows,
        totals = totals,
        hash = hash,
    )
}
