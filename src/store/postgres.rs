use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use crate::models::{LedgerEntry, NewLedgerEntry, Transaction};
use crate::store::PaymentStore;
use crate::utils::error::AppError;

/// Advisory lock key serializing ledger appends ("SCAN").
const LEDGER_LOCK_KEY: i64 = 0x5343_414e;

/// sqlx adapter. Settlements run in one database transaction under an
/// advisory lock, which is the serialization point for the running balance.
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction, AppError> {
    let payment_method: String = row.try_get("payment_method")?;
    let status: String = row.try_get("status")?;
    Ok(Transaction {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        merchant_id: row.try_get("merchant_id")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        payment_method: payment_method
            .parse()
            .map_err(AppError::InternalServerError)?,
        status: status.parse().map_err(AppError::InternalServerError)?,
        reference_number: row.try_get("reference_number")?,
        gateway_ref: row.try_get("gateway_ref")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn upsert_transaction(
    executor: &mut sqlx::Transaction<'_, Postgres>,
    transaction: &Transaction,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO transactions
            (id, client_id, merchant_id, amount, currency, payment_method,
             status, reference_number, gateway_ref, description, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status, gateway_ref = EXCLUDED.gateway_ref
        "#,
    )
    .bind(transaction.id)
    .bind(transaction.client_id)
    .bind(transaction.merchant_id)
    .bind(transaction.amount)
    .bind(&transaction.currency)
    .bind(transaction.payment_method.as_str())
    .bind(transaction.status.as_str())
    .bind(&transaction.reference_number)
    .bind(transaction.gateway_ref)
    .bind(&transaction.description)
    .bind(transaction.created_at)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

/// Re-derives the running balance of every entry at or after `from_seq`.
/// Callers must hold the ledger advisory lock.
async fn recompute_balances_from(
    executor: &mut sqlx::Transaction<'_, Postgres>,
    from_seq: i64,
) -> Result<(), AppError> {
    let base: Option<Decimal> = sqlx::query_scalar(
        "SELECT balance FROM ledger_entries WHERE seq < $1 ORDER BY seq DESC LIMIT 1",
    )
    .bind(from_seq)
    .fetch_optional(&mut **executor)
    .await?;
    let mut balance = base.unwrap_or(Decimal::ZERO);

    let rows = sqlx::query(
        "SELECT seq, debit, credit FROM ledger_entries WHERE seq >= $1 ORDER BY seq",
    )
    .bind(from_seq)
    .fetch_all(&mut **executor)
    .await?;

    for row in rows {
        let seq: i64 = row.try_get("seq")?;
        let debit: Decimal = row.try_get("debit")?;
        let credit: Decimal = row.try_get("credit")?;
        balance += debit - credit;
        sqlx::query("UPDATE ledger_entries SET balance = $1 WHERE seq = $2")
            .bind(balance)
            .bind(seq)
            .execute(&mut **executor)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn record_pending(&self, transaction: &Transaction) -> Result<(), AppError> {
        let mut db_tx = self.pool.begin().await?;
        upsert_transaction(&mut db_tx, transaction).await?;
        db_tx.commit().await?;
        Ok(())
    }

    async fn record_settlement(
        &self,
        transaction: &Transaction,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, AppError> {
        let mut db_tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LEDGER_LOCK_KEY)
            .execute(&mut *db_tx)
            .await?;

        upsert_transaction(&mut db_tx, transaction).await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT seq FROM ledger_entries WHERE transaction_id = $1")
                .bind(transaction.id)
                .fetch_optional(&mut *db_tx)
                .await?;

        let seq = match existing {
            Some(seq) => {
                sqlx::query(
                    "UPDATE ledger_entries SET debit = $1, credit = $2, description = $3 WHERE seq = $4",
                )
                .bind(entry.debit)
                .bind(entry.credit)
                .bind(&entry.description)
                .bind(seq)
                .execute(&mut *db_tx)
                .await?;
                recompute_balances_from(&mut db_tx, seq).await?;
                seq
            }
            None => {
                let last_balance: Option<Decimal> = sqlx::query_scalar(
                    "SELECT balance FROM ledger_entries ORDER BY seq DESC LIMIT 1",
                )
                .fetch_optional(&mut *db_tx)
                .await?;
                let balance = last_balance.unwrap_or(Decimal::ZERO) + entry.delta();

                sqlx::query_scalar(
                    r#"
                    INSERT INTO ledger_entries
                        (id, transaction_id, invoice_id, description, debit, credit, balance)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING seq
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(entry.transaction_id)
                .bind(entry.invoice_id)
                .bind(&entry.description)
                .bind(entry.debit)
                .bind(entry.credit)
                .bind(balance)
                .fetch_one(&mut *db_tx)
                .await?
            }
        };

        let row = sqlx::query(
            r#"
            SELECT id, seq, transaction_id, invoice_id, entry_date,
                   description, debit, credit, balance
            FROM ledger_entries WHERE seq = $1
            "#,
        )
        .bind(seq)
        .fetch_one(&mut *db_tx)
        .await?;
        let entry = LedgerEntry {
            id: row.try_get("id")?,
            seq: row.try_get("seq")?,
            transaction_id: row.try_get("transaction_id")?,
            invoice_id: row.try_get("invoice_id")?,
            entry_date: row.try_get("entry_date")?,
            description: row.try_get("description")?,
            debit: row.try_get("debit")?,
            credit: row.try_get("credit")?,
            balance: row.try_get("balance")?,
        };

        db_tx.commit().await?;
        Ok(entry)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        let row = sqlx::query("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        let rows = sqlx::query("SELECT * FROM transactions ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn delete_transaction(&self, id: Uuid) -> Result<bool, AppError> {
        let mut db_tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LEDGER_LOCK_KEY)
            .execute(&mut *db_tx)
            .await?;

        let entry_seq: Option<i64> =
            sqlx::query_scalar("SELECT seq FROM ledger_entries WHERE transaction_id = $1")
                .bind(id)
                .fetch_optional(&mut *db_tx)
                .await?;

        let deleted = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&mut *db_tx)
            .await?
            .rows_affected()
            > 0;

        // The FK cascade removed the entry; later balances are now stale.
        if let Some(seq) = entry_seq {
            recompute_balances_from(&mut db_tx, seq).await?;
        }

        db_tx.commit().await?;
        Ok(deleted)
    }

    async fn list_ledger_entries(&self) -> Result<Vec<LedgerEntry>, AppError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, seq, transaction_id, invoice_id, entry_date,
                   description, debit, credit, balance
            FROM ledger_entries ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
