//! SQLite-backed entity store.
//!
//! ## Error Mapping
//!
//! | SQLx error | EntityStore error | Scenario |
//! |------------|-------------------|----------|
//! | Database (unique violation) | `Validation` | duplicate customer email |
//! | Database (foreign key violation) | `Validation` | parent row vanished mid-write |
//! | Database (other) | `Storage` | constraint or engine failure |
//! | PoolClosed / Io / other | `Storage` | connection failures |
//!
//! ## Transactions
//!
//! Every multi-statement operation (cascading deletes, invoice + initial
//! items, read-modify-write updates, the invoice snapshot) runs inside one
//! transaction. Writes open with `BEGIN IMMEDIATE` so the write lock is taken
//! up front and concurrent writers queue on the busy timeout instead of
//! failing with `SQLITE_BUSY` when a read lock cannot be upgraded. Deletes
//! cascade explicitly; the schema's `ON DELETE CASCADE`
//! clauses are a second line for rows written by other tools.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::error::ErrorKind;
use sqlx::sqlite::{
    Sqlite, SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool,
    SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Transaction};
use tracing::{debug, instrument};

use invoicer_core::{CustomerId, DomainError, DomainResult, EntityKind, InvoiceId, ItemId};
use invoicer_invoicing::{
    Customer, CustomerPatch, Invoice, InvoicePatch, InvoiceRecords, Item, ItemPatch, NewCustomer,
    NewInvoice, NewItem,
};

use super::{EntityStore, check_invoice_total};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS customers (
        id    INTEGER PRIMARY KEY AUTOINCREMENT,
        name  TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invoices (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
        date        TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        invoice_id  INTEGER NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
        description TEXT NOT NULL,
        quantity    INTEGER NOT NULL DEFAULT 1,
        price       TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_invoices_customer_id ON invoices(customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_items_invoice_id ON items(invoice_id)",
];

/// SQLite-backed store.
///
/// `SqlitePool` is `Send + Sync` and cheap to clone; the store can be shared
/// across request handlers as-is.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and apply the schema.
    pub async fn connect(url: &str, max_connections: u32) -> DomainResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| map_sqlx_error("parse_database_url", e))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database on a single pooled connection.
    ///
    /// The connection is never recycled: closing it would drop the database.
    #[cfg(test)]
    pub(crate) async fn in_memory() -> DomainResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| map_sqlx_error("parse_database_url", e))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> DomainResult<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> DomainResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        debug!("sqlite schema applied");
        Ok(())
    }

    /// Transaction holding the database write lock from its first statement.
    async fn begin_write(&self) -> DomainResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    #[instrument(skip_all, err)]
    async fn create_customer(&self, input: NewCustomer) -> DomainResult<Customer> {
        let input = input.validated()?;
        let result = sqlx::query("INSERT INTO customers (name, email) VALUES (?1, ?2)")
            .bind(&input.name)
            .bind(&input.email)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_customer", e))?;

        let id = CustomerId::new(result.last_insert_rowid());
        debug!(customer_id = %id, "customer created");
        Ok(input.into_customer(id))
    }

    #[instrument(skip(self), err)]
    async fn get_customer(&self, id: CustomerId) -> DomainResult<Customer> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        select_customer(&mut conn, id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Customer, id))
    }

    #[instrument(skip(self), err)]
    async fn list_customers(&self) -> DomainResult<Vec<Customer>> {
        let rows = sqlx::query("SELECT id, name, email FROM customers ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_customers", e))?;
        rows.iter().map(customer_from_row).collect()
    }

    #[instrument(skip(self, patch), err)]
    async fn update_customer(
        &self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> DomainResult<Customer> {
        let patch = patch.validated()?;
        let mut tx = self.begin_write().await?;

        let mut customer = select_customer(&mut tx, id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Customer, id))?;
        patch.apply_to(&mut customer);

        sqlx::query("UPDATE customers SET name = ?1, email = ?2 WHERE id = ?3")
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_customer", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(customer)
    }

    #[instrument(skip(self), err)]
    async fn delete_customer(&self, id: CustomerId, cascade: bool) -> DomainResult<()> {
        let mut tx = self.begin_write().await?;

        if select_customer(&mut tx, id).await?.is_none() {
            return Err(DomainError::not_found(EntityKind::Customer, id));
        }

        let invoice_count = count(
            &mut tx,
            "SELECT COUNT(*) AS n FROM invoices WHERE customer_id = ?1",
            id.get(),
        )
        .await?;
        if !cascade && invoice_count > 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::validation(format!(
                "customer {id} still has {invoice_count} invoice(s)"
            )));
        }

        sqlx::query(
            r#"
            DELETE FROM items
            WHERE invoice_id IN (SELECT id FROM invoices WHERE customer_id = ?1)
            "#,
        )
        .bind(id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_customer_items", e))?;

        sqlx::query("DELETE FROM invoices WHERE customer_id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_customer_invoices", e))?;

        sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_customer", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        debug!(customer_id = %id, invoices = invoice_count, "customer deleted");
        Ok(())
    }

    #[instrument(skip_all, err)]
    async fn create_invoice(&self, input: NewInvoice) -> DomainResult<Invoice> {
        let input = input.validated()?;
        let date = input.date_or_today();

        let mut tx = self.begin_write().await?;

        if select_customer(&mut tx, input.customer_id).await?.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::validation(format!(
                "customer {} does not exist",
                input.customer_id
            )));
        }

        let result = sqlx::query("INSERT INTO invoices (customer_id, date) VALUES (?1, ?2)")
            .bind(input.customer_id.get())
            .bind(date)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        let id = InvoiceId::new(result.last_insert_rowid());

        for line in &input.items {
            sqlx::query(
                r#"
                INSERT INTO items (invoice_id, description, quantity, price)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(id.get())
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.price.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        debug!(invoice_id = %id, items = input.items.len(), "invoice created");

        Ok(Invoice {
            id,
            customer_id: input.customer_id,
            date,
        })
    }

    #[instrument(skip(self), err)]
    async fn get_invoice(&self, id: InvoiceId) -> DomainResult<Invoice> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        select_invoice(&mut conn, id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Invoice, id))
    }

    #[instrument(skip(self), err)]
    async fn list_invoices(&self) -> DomainResult<Vec<Invoice>> {
        let rows = sqlx::query("SELECT id, customer_id, date FROM invoices ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_invoices", e))?;
        rows.iter().map(invoice_from_row).collect()
    }

    #[instrument(skip(self, patch), err)]
    async fn update_invoice(&self, id: InvoiceId, patch: InvoicePatch) -> DomainResult<Invoice> {
        let mut tx = self.begin_write().await?;

        let mut invoice = select_invoice(&mut tx, id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Invoice, id))?;

        if let Some(customer_id) = patch.customer_id {
            if select_customer(&mut tx, customer_id).await?.is_none() {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(DomainError::validation(format!(
                    "customer {customer_id} does not exist"
                )));
            }
        }
        patch.apply_to(&mut invoice);

        sqlx::query("UPDATE invoices SET customer_id = ?1, date = ?2 WHERE id = ?3")
            .bind(invoice.customer_id.get())
            .bind(invoice.date)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_invoice", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(invoice)
    }

    #[instrument(skip(self), err)]
    async fn delete_invoice(&self, id: InvoiceId, cascade: bool) -> DomainResult<()> {
        let mut tx = self.begin_write().await?;

        if select_invoice(&mut tx, id).await?.is_none() {
            return Err(DomainError::not_found(EntityKind::Invoice, id));
        }

        let item_count = count(
            &mut tx,
            "SELECT COUNT(*) AS n FROM items WHERE invoice_id = ?1",
            id.get(),
        )
        .await?;
        if !cascade && item_count > 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::validation(format!(
                "invoice {id} still has {item_count} item(s)"
            )));
        }

        sqlx::query("DELETE FROM items WHERE invoice_id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_invoice_items", e))?;

        sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_invoice", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        debug!(invoice_id = %id, items = item_count, "invoice deleted");
        Ok(())
    }

    #[instrument(skip_all, err)]
    async fn create_item(&self, input: NewItem) -> DomainResult<Item> {
        let input = input.validated()?;
        let mut tx = self.begin_write().await?;

        if select_invoice(&mut tx, input.invoice_id).await?.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::validation(format!(
                "invoice {} does not exist",
                input.invoice_id
            )));
        }
        let siblings = select_items_of(&mut tx, input.invoice_id).await?;
        check_invoice_total(&siblings, input.line.amount())?;

        let result = sqlx::query(
            r#"
            INSERT INTO items (invoice_id, description, quantity, price)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(input.invoice_id.get())
        .bind(&input.line.description)
        .bind(input.line.quantity)
        .bind(input.line.price.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let id = ItemId::new(result.last_insert_rowid());
        Ok(input.line.into_item(id, input.invoice_id))
    }

    #[instrument(skip(self), err)]
    async fn get_item(&self, id: ItemId) -> DomainResult<Item> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        select_item(&mut conn, id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Item, id))
    }

    #[instrument(skip(self), err)]
    async fn list_items(&self) -> DomainResult<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT id, invoice_id, description, quantity, price FROM items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self, patch), err)]
    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> DomainResult<Item> {
        let patch = patch.validated()?;
        let mut tx = self.begin_write().await?;

        let mut item = select_item(&mut tx, id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Item, id))?;
        patch.apply_to(&mut item);
        let siblings = select_items_of(&mut tx, item.invoice_id).await?;
        check_invoice_total(siblings.iter().filter(|i| i.id != id), item.amount())?;

        sqlx::query("UPDATE items SET description = ?1, quantity = ?2, price = ?3 WHERE id = ?4")
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.price.to_string())
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(item)
    }

    #[instrument(skip(self), err)]
    async fn delete_item(&self, id: ItemId) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(EntityKind::Item, id));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_items_for_invoice(&self, invoice_id: InvoiceId) -> DomainResult<Vec<Item>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if select_invoice(&mut tx, invoice_id).await?.is_none() {
            return Err(DomainError::not_found(EntityKind::Invoice, invoice_id));
        }
        let items = select_items_of(&mut tx, invoice_id).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(items)
    }

    #[instrument(skip(self), err)]
    async fn load_invoice_records(&self, id: InvoiceId) -> DomainResult<Option<InvoiceRecords>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let Some(invoice) = select_invoice(&mut tx, id).await? else {
            return Ok(None);
        };
        let customer = select_customer(&mut tx, invoice.customer_id).await?;
        let items = select_items_of(&mut tx, id).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Some(InvoiceRecords {
            invoice,
            customer,
            items,
        }))
    }
}

// Single-row helpers, usable on a pooled connection or inside a transaction.

async fn select_customer(
    conn: &mut SqliteConnection,
    id: CustomerId,
) -> DomainResult<Option<Customer>> {
    sqlx::query("SELECT id, name, email FROM customers WHERE id = ?1")
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("select_customer", e))?
        .as_ref()
        .map(customer_from_row)
        .transpose()
}

async fn select_invoice(
    conn: &mut SqliteConnection,
    id: InvoiceId,
) -> DomainResult<Option<Invoice>> {
    sqlx::query("SELECT id, customer_id, date FROM invoices WHERE id = ?1")
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("select_invoice", e))?
        .as_ref()
        .map(invoice_from_row)
        .transpose()
}

async fn select_item(conn: &mut SqliteConnection, id: ItemId) -> DomainResult<Option<Item>> {
    sqlx::query("SELECT id, invoice_id, description, quantity, price FROM items WHERE id = ?1")
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("select_item", e))?
        .as_ref()
        .map(item_from_row)
        .transpose()
}

async fn select_items_of(
    conn: &mut SqliteConnection,
    invoice_id: InvoiceId,
) -> DomainResult<Vec<Item>> {
    let rows = sqlx::query(
        r#"
        SELECT id, invoice_id, description, quantity, price
        FROM items
        WHERE invoice_id = ?1
        ORDER BY id ASC
        "#,
    )
    .bind(invoice_id.get())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("select_items_of", e))?;
    rows.iter().map(item_from_row).collect()
}

async fn count(conn: &mut SqliteConnection, sql: &str, id: i64) -> DomainResult<i64> {
    let row = sqlx::query(sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("count", e))?;
    row.try_get::<i64, _>("n").map_err(decode_error)
}

// Row mapping

fn customer_from_row(row: &SqliteRow) -> DomainResult<Customer> {
    Ok(Customer {
        id: CustomerId::new(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        email: row.try_get("email").map_err(decode_error)?,
    })
}

fn invoice_from_row(row: &SqliteRow) -> DomainResult<Invoice> {
    Ok(Invoice {
        id: InvoiceId::new(row.try_get("id").map_err(decode_error)?),
        customer_id: CustomerId::new(row.try_get("customer_id").map_err(decode_error)?),
        date: row.try_get::<NaiveDate, _>("date").map_err(decode_error)?,
    })
}

fn item_from_row(row: &SqliteRow) -> DomainResult<Item> {
    let price: String = row.try_get("price").map_err(decode_error)?;
    let price = Decimal::from_str(&price)
        .map_err(|e| DomainError::storage(format!("invalid stored price '{price}': {e}")))?;

    Ok(Item {
        id: ItemId::new(row.try_get("id").map_err(decode_error)?),
        invoice_id: InvoiceId::new(row.try_get("invoice_id").map_err(decode_error)?),
        description: row.try_get("description").map_err(decode_error)?,
        quantity: row.try_get("quantity").map_err(decode_error)?,
        price,
    })
}

fn decode_error(err: sqlx::Error) -> DomainError {
    DomainError::storage(format!("failed to decode row: {err}"))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    if db_err.message().contains("customers.email") {
                        DomainError::validation("email is already in use")
                    } else {
                        DomainError::validation(msg)
                    }
                }
                ErrorKind::ForeignKeyViolation => DomainError::validation(msg),
                _ => DomainError::storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            DomainError::storage(format!("connection pool closed in {}", operation))
        }
        other => DomainError::storage(format!("{}: {}", operation, other)),
    }
}
