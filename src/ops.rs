use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use crate::error::{LedgerError, Result};
use crate::models::{
    Customer, CustomerDetail, CustomerForm, CustomerSummary, MonthlySummary, OutstandingReport,
    Payment, PaymentPayload, PaymentReceipt, Sale, SaleDetail, SalePayload, SaleReceipt,
    SaleWithCustomer,
};
use crate::store::Ledger;

const SALE_WITH_CUSTOMER_SQL: &str = "
    SELECT s.id, s.customer_id, s.item, s.category, s.sub_category,
           s.total_price, s.sale_date, s.paid, s.remaining,
           c.name, c.phone, c.location
    FROM sales s
    JOIN customers c ON s.customer_id = c.id
";

impl Ledger {
    pub fn create_customer(&self, form: CustomerForm) -> Result<i64> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation(
                "customer name must not be empty".into(),
            ));
        }
        let phone = form.phone.trim();
        if phone.is_empty() {
            return Err(LedgerError::Validation(
                "customer phone must not be empty".into(),
            ));
        }

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO customers (name, phone, location) VALUES (?, ?, ?)",
            params![name, phone, form.location],
        )
        .map_err(|err| match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                LedgerError::DuplicatePhone {
                    phone: phone.to_string(),
                }
            }
            other => other.into(),
        })?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_customers(&self) -> Result<Vec<Customer>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, phone, location, created_at
             FROM customers
             ORDER BY name COLLATE NOCASE",
        )?;
        let rows = stmt.query_map([], customer_from_row)?;

        let mut customers = Vec::new();
        for row in rows {
            customers.push(row?);
        }
        Ok(customers)
    }

    /// Customer plus all of their sales and the purchased/paid/remaining
    /// totals across them.
    pub fn get_customer(&self, customer_id: i64) -> Result<CustomerDetail> {
        let conn = self.connect()?;
        let customer = conn
            .query_row(
                "SELECT id, name, phone, location, created_at FROM customers WHERE id = ?",
                params![customer_id],
                customer_from_row,
            )
            .optional()?
            .ok_or(LedgerError::NotFound {
                entity: "customer",
                id: customer_id,
            })?;

        let mut stmt = conn.prepare(
            "SELECT id, customer_id, item, category, sub_category,
                    total_price, sale_date, paid, remaining
             FROM sales
             WHERE customer_id = ?
             ORDER BY sale_date DESC",
        )?;
        let rows = stmt.query_map(params![customer_id], sale_from_row)?;

        let mut sales = Vec::new();
        for row in rows {
            sales.push(row?);
        }

        let summary = CustomerSummary {
            total_purchased: sales.iter().map(|s| s.total_price).sum(),
            total_paid: sales.iter().map(|s| s.paid).sum(),
            total_remaining: sales.iter().map(|s| s.remaining).sum(),
        };

        Ok(CustomerDetail {
            customer,
            sales,
            summary,
        })
    }

    /// Records a sale. A non-zero initial payment is written as the first
    /// entry of the sale's payment trail in the same transaction.
    pub fn create_sale(&self, payload: SalePayload) -> Result<SaleReceipt> {
        self.catalog().check(&payload.category, &payload.sub_category)?;
        let item = payload.item.trim();
        if item.is_empty() {
            return Err(LedgerError::Validation("item must not be empty".into()));
        }
        if payload.total_price < 0.0 {
            return Err(LedgerError::Validation(
                "total price must not be negative".into(),
            ));
        }
        if payload.paid < 0.0 {
            return Err(LedgerError::Validation(
                "initial payment must not be negative".into(),
            ));
        }
        if payload.paid > payload.total_price {
            return Err(LedgerError::OverPayment {
                amount: payload.paid,
                remaining: payload.total_price,
            });
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let customer = tx
            .query_row(
                "SELECT id FROM customers WHERE id = ?",
                params![payload.customer_id],
                |_| Ok(()),
            )
            .optional()?;
        if customer.is_none() {
            return Err(LedgerError::NotFound {
                entity: "customer",
                id: payload.customer_id,
            });
        }

        let remaining = payload.total_price - payload.paid;
        tx.execute(
            "INSERT INTO sales (customer_id, item, category, sub_category, total_price, sale_date, paid, remaining)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                payload.customer_id,
                item,
                payload.category,
                payload.sub_category,
                payload.total_price,
                payload.sale_date,
                payload.paid,
                remaining
            ],
        )?;
        let sale_id = tx.last_insert_rowid();

        if payload.paid > 0.0 {
            tx.execute(
                "INSERT INTO payments (sale_id, amount, payment_date, note) VALUES (?, ?, ?, ?)",
                params![sale_id, payload.paid, payload.sale_date, "Initial payment"],
            )?;
        }

        tx.commit()?;
        Ok(SaleReceipt { sale_id, remaining })
    }

    /// Applies a payment against a sale's remaining balance. The balance
    /// update and the payment row commit together; an overpayment leaves
    /// the sale untouched.
    pub fn add_payment(&self, payload: PaymentPayload) -> Result<PaymentReceipt> {
        if payload.amount <= 0.0 {
            return Err(LedgerError::Validation(
                "payment amount must be positive".into(),
            ));
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sale = tx
            .query_row(
                "SELECT paid, remaining FROM sales WHERE id = ?",
                params![payload.sale_id],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, f64>(1)?)),
            )
            .optional()?;
        let (paid, remaining) = sale.ok_or(LedgerError::NotFound {
            entity: "sale",
            id: payload.sale_id,
        })?;

        if payload.amount > remaining {
            return Err(LedgerError::OverPayment {
                amount: payload.amount,
                remaining,
            });
        }

        let new_paid = paid + payload.amount;
        let new_remaining = remaining - payload.amount;
        tx.execute(
            "UPDATE sales SET paid = ?, remaining = ? WHERE id = ?",
            params![new_paid, new_remaining, payload.sale_id],
        )?;
        tx.execute(
            "INSERT INTO payments (sale_id, amount, payment_date, note) VALUES (?, ?, ?, ?)",
            params![
                payload.sale_id,
                payload.amount,
                payload.payment_date,
                payload.note
            ],
        )?;

        tx.commit()?;
        Ok(PaymentReceipt {
            remaining: new_remaining,
        })
    }

    pub fn list_sales(&self) -> Result<Vec<SaleWithCustomer>> {
        let conn = self.connect()?;
        let sql = format!("{SALE_WITH_CUSTOMER_SQL} ORDER BY s.sale_date DESC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], sale_with_customer_from_row)?;

        let mut sales = Vec::new();
        for row in rows {
            sales.push(row?);
        }
        Ok(sales)
    }

    pub fn get_sale(&self, sale_id: i64) -> Result<SaleDetail> {
        let conn = self.connect()?;
        let sql = format!("{SALE_WITH_CUSTOMER_SQL} WHERE s.id = ?");
        let sale = conn
            .query_row(&sql, params![sale_id], sale_with_customer_from_row)
            .optional()?
            .ok_or(LedgerError::NotFound {
                entity: "sale",
                id: sale_id,
            })?;

        let mut stmt = conn.prepare(
            "SELECT id, sale_id, amount, payment_date, note
             FROM payments
             WHERE sale_id = ?
             ORDER BY payment_date",
        )?;
        let rows = stmt.query_map(params![sale_id], payment_from_row)?;

        let mut payments = Vec::new();
        for row in rows {
            payments.push(row?);
        }

        Ok(SaleDetail { sale, payments })
    }

    /// Aggregates over the literal date range `[Y-M-01, Y-M-31]`. Dates are
    /// ISO text, so the fixed day-31 bound compares correctly for every
    /// month length. The outstanding balance is store-wide, not filtered
    /// by month.
    pub fn monthly_summary(&self, year: i32, month: u32) -> Result<MonthlySummary> {
        let start = format!("{year:04}-{month:02}-01");
        let end = format!("{year:04}-{month:02}-31");

        let conn = self.connect()?;
        let (payments_received, payments_count): (f64, i64) = conn.query_row(
            "SELECT IFNULL(SUM(amount), 0), COUNT(*) FROM payments WHERE payment_date BETWEEN ?1 AND ?2",
            params![start, end],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let (new_sales_total, new_sales_count): (f64, i64) = conn.query_row(
            "SELECT IFNULL(SUM(total_price), 0), COUNT(*) FROM sales WHERE sale_date BETWEEN ?1 AND ?2",
            params![start, end],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let outstanding_balance: f64 = conn.query_row(
            "SELECT IFNULL(SUM(remaining), 0) FROM sales WHERE remaining > 0",
            [],
            |row| row.get(0),
        )?;

        Ok(MonthlySummary {
            month: format!("{year:04}-{month:02}"),
            payments_received,
            new_sales_total,
            outstanding_balance,
            payments_count,
            new_sales_count,
        })
    }

    pub fn outstanding_sales(&self) -> Result<OutstandingReport> {
        let conn = self.connect()?;
        let sql = format!("{SALE_WITH_CUSTOMER_SQL} WHERE s.remaining > 0 ORDER BY s.sale_date");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], sale_with_customer_from_row)?;

        let mut outstanding = Vec::new();
        for row in rows {
            outstanding.push(row?);
        }

        let total_outstanding: f64 = conn.query_row(
            "SELECT IFNULL(SUM(remaining), 0) FROM sales WHERE remaining > 0",
            [],
            |row| row.get(0),
        )?;

        Ok(OutstandingReport {
            outstanding_sales: outstanding,
            total_outstanding,
        })
    }
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        location: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn sale_from_row(row: &Row<'_>) -> rusqlite::Result<Sale> {
    Ok(Sale {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        item: row.get(2)?,
        category: row.get(3)?,
        sub_category: row.get(4)?,
        total_price: row.get(5)?,
        sale_date: row.get(6)?,
        paid: row.get(7)?,
        remaining: row.get(8)?,
    })
}

fn sale_with_customer_from_row(row: &Row<'_>) -> rusqlite::Result<SaleWithCustomer> {
    Ok(SaleWithCustomer {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        item: row.get(2)?,
        category: row.get(3)?,
        sub_category: row.get(4)?,
        total_price: row.get(5)?,
        sale_date: row.get(6)?,
        paid: row.get(7)?,
        remaining: row.get(8)?,
        customer_name: row.get(9)?,
        customer_phone: row.get(10)?,
        customer_location: row.get(11)?,
    })
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        sale_id: row.get(1)?,
        amount: row.get(2)?,
        payment_date: row.get(3)?,
        note: row.get(4)?,
    })
}
