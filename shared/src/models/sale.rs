//! Sale Model

use serde::{Deserialize, Serialize};

/// A line of a sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: i64,
    pub product_name: String,
    pub product_barcode: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_price: f64,
}

/// Locally persisted sale
///
/// `synced == false` marks the sale as part of the must-push set of every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: i64,
    pub sale_number: String,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub payment_method: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Vec<SaleItem>,
    pub synced: bool,
    pub created_at: i64,
}

/// Create sale payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleCreate {
    pub sale_number: String,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub payment_method: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Vec<SaleItem>,
}
