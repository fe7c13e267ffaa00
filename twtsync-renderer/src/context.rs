//! Template contexts: serializable rendering payloads built from raw upstream
//! values.
//!
//! Builders never fail: a missing or oddly-typed optional sub-field becomes an
//! empty string segment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use twtsync_core::ports::ProductCatalog;
use twtsync_core::types::{PerformanceId, UpstreamRecord};

use crate::error::RenderError;

/// Label of the active purchase link.
pub const BUY_LABEL: &str = "Buy tickets";
pub const SOLD_OUT_LABEL: &str = "Sold out";
pub const CANCELLED_LABEL: &str = "Cancelled";
pub const ON_HOLD_LABEL: &str = "Temporarily unavailable";
pub const NO_SALE_LABEL: &str = "No tickets available";

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// One price entry inside a rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCtx {
    pub label: String,
    pub amount: String,
    pub currency: String,
    pub is_default: bool,
}

/// One rank (price tier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankCtx {
    pub label: String,
    /// Default-flagged prices first, upstream order kept within each group.
    pub prices: Vec<PriceCtx>,
}

/// Payload for `html/prices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTableCtx {
    /// A single rank renders as a bare price list without a heading.
    pub single: bool,
    pub ranks: Vec<RankCtx>,
}

impl PriceTableCtx {
    /// Build from the upstream `ranks` array.
    pub fn from_ranks(ranks: &[Value]) -> Self {
        PriceTableCtx {
            single: ranks.len() == 1,
            ranks: ranks.iter().map(RankCtx::from_value).collect(),
        }
    }
}

impl RankCtx {
    pub fn from_value(rank: &Value) -> Self {
        let prices: Vec<PriceCtx> = rank
            .get("prices")
            .and_then(Value::as_array)
            .map(|prices| prices.iter().map(PriceCtx::from_value).collect())
            .unwrap_or_default();
        RankCtx {
            label: text_field(rank, &["description", "name"]),
            prices: defaults_first(prices),
        }
    }
}

impl PriceCtx {
    pub fn from_value(price: &Value) -> Self {
        PriceCtx {
            label: text_field(price, &["priceTypeDescription", "description"]),
            amount: price.get("price").map(format_amount).unwrap_or_default(),
            currency: price
                .get("currency")
                .and_then(Value::as_str)
                .map(currency_symbol)
                .unwrap_or_default(),
            is_default: price
                .get("isDefault")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

/// Stable partition: default prices first, relative order kept in each group.
pub fn defaults_first(prices: Vec<PriceCtx>) -> Vec<PriceCtx> {
    let (mut defaults, others): (Vec<_>, Vec<_>) =
        prices.into_iter().partition(|p| p.is_default);
    defaults.extend(others);
    defaults
}

/// `EUR` renders as the euro glyph; any other code passes through.
pub fn currency_symbol(code: &str) -> String {
    if code == "EUR" {
        "€".to_string()
    } else {
        code.to_string()
    }
}

/// Numbers render with two decimals and a decimal comma; strings verbatim.
pub fn format_amount(amount: &Value) -> String {
    match amount {
        Value::Number(n) => n
            .as_f64()
            .map(|f| format!("{f:.2}").replace('.', ","))
            .unwrap_or_default(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// Upstream `performanceStatus` codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerformanceStatus {
    OnSale,
    SoldOut,
    Cancelled,
    OnHold,
    NoSale,
    Other(String),
}

impl PerformanceStatus {
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "ONSALE" => Self::OnSale,
            "SOLDOUT" => Self::SoldOut,
            "CANCELLED" => Self::Cancelled,
            "ONHOLD" => Self::OnHold,
            "NOSALE" => Self::NoSale,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::OnSale => "ONSALE",
            Self::SoldOut => "SOLDOUT",
            Self::Cancelled => "CANCELLED",
            Self::OnHold => "ONHOLD",
            Self::NoSale => "NOSALE",
            Self::Other(code) => code,
        }
    }
}

/// How the availability block is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityKind {
    /// Active purchase link.
    Link,
    /// Disabled control.
    Button,
    /// Plain text, no control.
    Text,
}

/// Payload for `html/availability`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityCtx {
    pub kind: AvailabilityKind,
    pub status: String,
    pub label: String,
    pub url: Option<String>,
}

impl AvailabilityCtx {
    /// Apply the fixed status → label table.
    pub fn new(
        status: &PerformanceStatus,
        onsale: bool,
        id: &PerformanceId,
        purchase_url_template: &str,
    ) -> Self {
        let (kind, label) = match status {
            PerformanceStatus::OnSale if onsale => (AvailabilityKind::Link, BUY_LABEL),
            PerformanceStatus::OnSale => (AvailabilityKind::Button, ""),
            PerformanceStatus::SoldOut => (AvailabilityKind::Button, SOLD_OUT_LABEL),
            PerformanceStatus::Cancelled => (AvailabilityKind::Button, CANCELLED_LABEL),
            PerformanceStatus::OnHold => (AvailabilityKind::Button, ON_HOLD_LABEL),
            PerformanceStatus::NoSale => (AvailabilityKind::Text, NO_SALE_LABEL),
            PerformanceStatus::Other(_) => (AvailabilityKind::Button, ""),
        };
        let url = (kind == AvailabilityKind::Link)
            .then(|| purchase_url_template.replace("{id}", id.as_str()));
        AvailabilityCtx {
            kind,
            status: status.code().to_string(),
            label: label.to_string(),
            url,
        }
    }
}

// ---------------------------------------------------------------------------
// Arrangements
// ---------------------------------------------------------------------------

/// One arrangement card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrangementCtx {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: String,
    pub currency: String,
}

/// Payload for `html/arrangements`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrangementsCtx {
    pub arrangements: Vec<ArrangementCtx>,
}

impl ArrangementsCtx {
    pub fn from_records(records: &[UpstreamRecord], products: &dyn ProductCatalog) -> Self {
        ArrangementsCtx {
            arrangements: records
                .iter()
                .map(|r| ArrangementCtx::from_record(r, products))
                .collect(),
        }
    }
}

impl ArrangementCtx {
    pub fn from_record(record: &UpstreamRecord, products: &dyn ProductCatalog) -> Self {
        let product = record
            .get("productId")
            .and_then(scalar_text)
            .and_then(|product_id| products.product(&product_id));

        let mut description = record
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if description.is_empty() {
            if let Some(text) = product.as_ref().and_then(|p| p.description.clone()) {
                description = text;
            }
        }

        ArrangementCtx {
            id: record.get("id").and_then(scalar_text).unwrap_or_default(),
            title: record
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            description,
            image_url: product.and_then(|p| p.image_url),
            price: record.get("price").map(format_amount).unwrap_or_default(),
            currency: record
                .get("currency")
                .and_then(Value::as_str)
                .map(currency_symbol)
                .unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convert a context to a [`tera::Context`].
pub fn to_tera_context<T: Serialize>(ctx: &T) -> Result<tera::Context, RenderError> {
    tera::Context::from_serialize(ctx).map_err(RenderError::from)
}

/// First string value found under `keys`, else empty.
fn text_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Strings and integers as text; anything else is absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}
