//! Bookkeeping backend for a retail credit-sales business.
//!
//! Records customers, sales and partial payments in SQLite and produces
//! outstanding-balance and monthly summary reports. The ledger keeps
//! `remaining == total_price - paid` for every sale across all mutations;
//! payments are an append-only trail whose sum always equals a sale's
//! `paid` column. Transport is left to the embedding application: every
//! read model serializes and every operation payload deserializes, so a
//! handler layer can bind to [`Ledger`] directly.

pub mod catalog;
pub mod error;
pub mod models;
mod ops;
pub mod store;

pub use catalog::CategoryCatalog;
pub use error::{LedgerError, Result};
pub use models::{
    Customer, CustomerDetail, CustomerForm, CustomerSummary, MonthlySummary, OutstandingReport,
    Payment, PaymentPayload, PaymentReceipt, Sale, SaleDetail, SalePayload, SaleReceipt,
    SaleWithCustomer,
};
pub use store::Ledger;
