use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub location: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sale {
    pub id: i64,
    pub customer_id: i64,
    pub item: String,
    pub category: String,
    pub sub_category: String,
    pub total_price: f64,
    pub sale_date: String,
    pub paid: f64,
    pub remaining: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub sale_id: i64,
    pub amount: f64,
    pub payment_date: String,
    pub note: String,
}

/// Sale row joined with its owning customer, as returned by the listing
/// and reporting queries.
#[derive(Debug, Clone, Serialize)]
pub struct SaleWithCustomer {
    pub id: i64,
    pub customer_id: i64,
    pub item: String,
    pub category: String,
    pub sub_category: String,
    pub total_price: f64,
    pub sale_date: String,
    pub paid: f64,
    pub remaining: f64,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerForm {
    pub name: String,
    pub phone: String,
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SalePayload {
    pub customer_id: i64,
    pub item: String,
    pub category: String,
    pub sub_category: String,
    pub total_price: f64,
    pub sale_date: NaiveDate,
    #[serde(default)]
    pub paid: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentPayload {
    pub sale_id: i64,
    pub amount: f64,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SaleReceipt {
    pub sale_id: i64,
    pub remaining: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PaymentReceipt {
    pub remaining: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CustomerSummary {
    pub total_purchased: f64,
    pub total_paid: f64,
    pub total_remaining: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetail {
    pub customer: Customer,
    pub sales: Vec<Sale>,
    pub summary: CustomerSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    pub sale: SaleWithCustomer,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    pub month: String,
    pub payments_received: f64,
    pub new_sales_total: f64,
    pub outstanding_balance: f64,
    pub payments_count: i64,
    pub new_sales_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutstandingReport {
    pub outstanding_sales: Vec<SaleWithCustomer>,
    pub total_outstanding: f64,
}
