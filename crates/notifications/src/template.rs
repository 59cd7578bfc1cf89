//! Email templates.

use serde_json::Value;

use messaging::{ORDER_CONFIRMATION, SHIPPING_UPDATE};

/// Subject line and HTML body ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Renders `template` with `data`.
///
/// Unknown templates fall back to a generic platform notice. Missing or
/// non-string fields render as empty text.
pub fn render(template: &str, data: &Value) -> RenderedEmail {
    match template {
        ORDER_CONFIRMATION => RenderedEmail {
            subject: "Order Confirmation".to_string(),
            html: format!(
                "<h1>Order Confirmation</h1>\n\
                 <p>Thank you for your order!</p>\n\
                 <p>Order ID: {}</p>\n\
                 <p>Total Amount: ${}</p>",
                field(data, "order_id"),
                field(data, "total_amount"),
            ),
        },
        SHIPPING_UPDATE => RenderedEmail {
            subject: "Shipping Update".to_string(),
            html: format!(
                "<h1>Shipping Update</h1>\n\
                 <p>Your order {} has been shipped!</p>\n\
                 <p>Tracking number: {}</p>",
                field(data, "order_id"),
                field(data, "tracking_number"),
            ),
        },
        _ => RenderedEmail {
            subject: "Notification".to_string(),
            html: "<p>Notification from our e-commerce platform</p>".to_string(),
        },
    }
}

fn field(data: &Value, key: &str) -> String {
    match data.get(key) {
        Some(Value::String(s)) => escape_html(s),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
