use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::AnyPool;
use sqlx::Row;

use crate::modules::payments::error::PaymentError;
use crate::modules::payments::models::PaymentTransaction;

/// Table backing the payments API. Portable across SQLite and MySQL.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS payment_transactions (
    id VARCHAR(36) PRIMARY KEY,
    amount BIGINT NOT NULL,
    currency VARCHAR(3) NOT NULL,
    charge_id VARCHAR(64) NOT NULL,
    status VARCHAR(16) NOT NULL,
    created_at VARCHAR(40) NOT NULL
)
"#;

/// Repository for payment transaction persistence
pub struct TransactionRepository {
    pool: AnyPool,
}

impl TransactionRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Create the table if it does not exist yet
    pub async fn migrate(&self) -> Result<(), PaymentError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn create(&self, transaction: &PaymentTransaction) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions (id, amount, currency, charge_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.clone())
        .bind(transaction.amount)
        .bind(transaction.currency.to_string())
        .bind(transaction.charge_id.clone())
        .bind(transaction.status.to_string())
        .bind(transaction.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<PaymentTransaction>, PaymentError> {
        let row = sqlx::query(
            r#"
            SELECT id, amount, currency, charge_id, status, created_at
            FROM payment_transactions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose()
    }

    pub async fn count(&self) -> Result<i64, PaymentError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn map_row(row: &AnyRow) -> Result<PaymentTransaction, PaymentError> {
    let currency: String = row.try_get("currency")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(PaymentTransaction {
        id: row.try_get("id")?,
        amount: row.try_get("amount")?,
        currency: currency.parse().map_err(corrupt_column("currency"))?,
        charge_id: row.try_get("charge_id")?,
        status: status.parse().map_err(corrupt_column("status"))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| corrupt_column("created_at")(e.to_string()))?,
    })
}

fn corrupt_column(column: &'static str) -> impl Fn(String) -> PaymentError {
    move |message| {
        PaymentError::Database(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: message.into(),
        })
    }
}
