use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::info;

use crate::catalog::{CategoryCatalog, FALLBACK_CATEGORY, FALLBACK_SUB_CATEGORY};
use crate::error::Result;

/// Persisted in `PRAGMA user_version`. Version 0 is either a fresh
/// database or the pre-customer single-table layout; table metadata is
/// only inspected while upgrading from 0.
const SCHEMA_VERSION: i64 = 1;

const CREATE_TABLES_SQL: &str = "
    CREATE TABLE IF NOT EXISTS customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        phone TEXT NOT NULL UNIQUE,
        location TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS sales (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL,
        item TEXT NOT NULL,
        category TEXT NOT NULL,
        sub_category TEXT NOT NULL,
        total_price REAL NOT NULL,
        sale_date TEXT NOT NULL,
        paid REAL NOT NULL DEFAULT 0,
        remaining REAL NOT NULL DEFAULT 0,
        FOREIGN KEY (customer_id) REFERENCES customers(id)
    );

    CREATE TABLE IF NOT EXISTS payments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sale_id INTEGER NOT NULL,
        amount REAL NOT NULL,
        payment_date TEXT NOT NULL,
        note TEXT NOT NULL DEFAULT '',
        FOREIGN KEY (sale_id) REFERENCES sales(id)
    );

    CREATE INDEX IF NOT EXISTS idx_sales_customer ON sales(customer_id);
    CREATE INDEX IF NOT EXISTS idx_sales_date ON sales(sale_date);
    CREATE INDEX IF NOT EXISTS idx_payments_sale ON payments(sale_id);
";

/// Handle to the ledger database. Operations open a fresh connection for
/// their own duration; the file is the only state shared between them.
pub struct Ledger {
    path: PathBuf,
    catalog: CategoryCatalog,
}

impl Ledger {
    /// Opens the database at `path`, creating it and bringing its schema
    /// forward if needed. Safe to call on every startup; a migration
    /// failure leaves the previous schema intact.
    pub fn open(path: impl Into<PathBuf>, catalog: CategoryCatalog) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let mut conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        migrate(&mut conn)?;

        Ok(Self { path, catalog })
    }

    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}

fn migrate(conn: &mut Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    // One logical transaction: a crash before the commit leaves the old
    // tables (renamed or not) holding all data.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;

    if legacy_sales_table(&tx)? {
        info!("old database schema detected, migrating");
        tx.execute("ALTER TABLE sales RENAME TO sales_old", [])?;
        if table_exists(&tx, "payments")? {
            tx.execute("ALTER TABLE payments RENAME TO payments_old", [])?;
        }
    }

    tx.execute_batch(CREATE_TABLES_SQL)?;

    if table_exists(&tx, "sales_old")? {
        copy_legacy_rows(&tx)?;
        tx.execute("DROP TABLE sales_old", [])?;
        if table_exists(&tx, "payments_old")? {
            tx.execute("DROP TABLE payments_old", [])?;
        }
        info!("legacy data migration complete");
    }

    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}

/// True when a `sales` table from the pre-customer layout is present,
/// recognized by the missing `customer_id` column.
fn legacy_sales_table(conn: &Connection) -> Result<bool> {
    if !table_exists(conn, "sales")? {
        return Ok(false);
    }
    let mut stmt = conn.prepare("PRAGMA table_info(sales)")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == "customer_id" {
            return Ok(false);
        }
    }
    Ok(true)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Attaches all legacy sales to one synthetic customer. Row ids are
/// carried over verbatim so legacy payments keep referencing the same
/// sale ids without relying on AUTOINCREMENT allocation order.
fn copy_legacy_rows(tx: &Transaction<'_>) -> Result<()> {
    tx.execute(
        "INSERT INTO customers (name, phone, location) VALUES (?, ?, ?)",
        params!["Legacy Customer", "0000000000", "Unknown"],
    )?;
    let legacy_customer_id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO sales (id, customer_id, item, category, sub_category, total_price, sale_date, paid, remaining)
         SELECT id, ?1, item, ?2, ?3, total_price, sale_date, paid, remaining FROM sales_old",
        params![legacy_customer_id, FALLBACK_CATEGORY, FALLBACK_SUB_CATEGORY],
    )?;

    if table_exists(tx, "payments_old")? {
        tx.execute(
            "INSERT INTO payments (id, sale_id, amount, payment_date, note)
             SELECT id, sale_id, amount, payment_date, note FROM payments_old",
            [],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn raw_conn(path: &Path) -> Connection {
        Connection::open(path).unwrap()
    }

    fn user_version(path: &Path) -> i64 {
        raw_conn(path)
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap()
    }

    fn seed_legacy_db(path: &Path) {
        let conn = raw_conn(path);
        conn.execute_batch(
            "CREATE TABLE sales (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item TEXT NOT NULL,
                total_price REAL NOT NULL,
                sale_date TEXT NOT NULL,
                paid REAL NOT NULL DEFAULT 0,
                remaining REAL NOT NULL DEFAULT 0
            );
            CREATE TABLE payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sale_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                payment_date TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT ''
            );",
        )
        .unwrap();
    }

    #[test]
    fn fresh_database_gets_schema_and_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        let _ledger = Ledger::open(&path, CategoryCatalog::default()).unwrap();

        let conn = raw_conn(&path);
        for table in ["customers", "sales", "payments"] {
            assert!(table_exists_raw(&conn, table), "missing table {table}");
        }
        assert_eq!(user_version(&path), SCHEMA_VERSION);
    }

    #[test]
    fn reopening_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        let ledger = Ledger::open(&path, CategoryCatalog::default()).unwrap();
        ledger
            .create_customer(crate::models::CustomerForm {
                name: "Alice".into(),
                phone: "555-1111".into(),
                location: "Springfield".into(),
            })
            .unwrap();
        drop(ledger);

        let ledger = Ledger::open(&path, CategoryCatalog::default()).unwrap();
        assert_eq!(ledger.list_customers().unwrap().len(), 1);
        assert_eq!(user_version(&path), SCHEMA_VERSION);
    }

    #[test]
    fn migrates_legacy_single_table_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        seed_legacy_db(&path);
        {
            let conn = raw_conn(&path);
            conn.execute(
                "INSERT INTO sales (item, total_price, sale_date, paid, remaining)
                 VALUES ('Widget', 100, '2023-01-01', 40, 60)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO payments (sale_id, amount, payment_date, note)
                 VALUES (1, 40, '2023-01-01', 'deposit')",
                [],
            )
            .unwrap();
        }

        let ledger = Ledger::open(&path, CategoryCatalog::default()).unwrap();

        let customers = ledger.list_customers().unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].name, "Legacy Customer");

        let detail = ledger.get_sale(1).unwrap();
        assert_eq!(detail.sale.customer_id, customers[0].id);
        assert_eq!(detail.sale.item, "Widget");
        assert_eq!(detail.sale.category, "misc");
        assert_eq!(detail.sale.sub_category, "other");
        assert_eq!(detail.sale.total_price, 100.0);
        assert_eq!(detail.sale.paid, 40.0);
        assert_eq!(detail.sale.remaining, 60.0);
        assert_eq!(detail.sale.sale_date, "2023-01-01");

        assert_eq!(detail.payments.len(), 1);
        assert_eq!(detail.payments[0].sale_id, 1);
        assert_eq!(detail.payments[0].amount, 40.0);
        assert_eq!(detail.payments[0].payment_date, "2023-01-01");
        assert_eq!(detail.payments[0].note, "deposit");

        let conn = raw_conn(&path);
        assert!(!table_exists_raw(&conn, "sales_old"));
        assert!(!table_exists_raw(&conn, "payments_old"));
        assert_eq!(user_version(&path), SCHEMA_VERSION);
    }

    #[test]
    fn migration_preserves_non_contiguous_sale_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        seed_legacy_db(&path);
        {
            let conn = raw_conn(&path);
            conn.execute(
                "INSERT INTO sales (id, item, total_price, sale_date, paid, remaining)
                 VALUES (7, 'Gadget', 50, '2022-06-15', 0, 50)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO payments (id, sale_id, amount, payment_date, note)
                 VALUES (3, 7, 10, '2022-07-01', '')",
                [],
            )
            .unwrap();
        }

        let ledger = Ledger::open(&path, CategoryCatalog::default()).unwrap();

        let detail = ledger.get_sale(7).unwrap();
        assert_eq!(detail.sale.item, "Gadget");
        assert_eq!(detail.payments.len(), 1);
        assert_eq!(detail.payments[0].id, 3);
        assert_eq!(detail.payments[0].sale_id, 7);
    }

    #[test]
    fn migrates_legacy_db_without_payments_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let conn = raw_conn(&path);
            conn.execute_batch(
                "CREATE TABLE sales (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    item TEXT NOT NULL,
                    total_price REAL NOT NULL,
                    sale_date TEXT NOT NULL,
                    paid REAL NOT NULL DEFAULT 0,
                    remaining REAL NOT NULL DEFAULT 0
                );
                INSERT INTO sales (item, total_price, sale_date, paid, remaining)
                VALUES ('Widget', 25, '2023-03-03', 0, 25);",
            )
            .unwrap();
        }

        let ledger = Ledger::open(&path, CategoryCatalog::default()).unwrap();
        let detail = ledger.get_sale(1).unwrap();
        assert_eq!(detail.sale.item, "Widget");
        assert!(detail.payments.is_empty());
    }

    fn table_exists_raw(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![table],
            |_| Ok(()),
        )
        .optional()
        .unwrap()
        .is_some()
    }
}
