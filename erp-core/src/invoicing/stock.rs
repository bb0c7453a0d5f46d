use std::time::Duration;

use sqlx::{FromRow, Postgres, Transaction};
use tokio::time::sleep;
use tracing::warn;

use crate::error::InvoiceError;

/// Stock controller: applies signed deltas to `products.stock` inside an
/// open transaction, under a row-level exclusive lock.
///
/// The coordinator bounds lock waits with `SET LOCAL lock_timeout`, so a
/// contended `SELECT ... FOR UPDATE` surfaces Postgres error `55P03` instead
/// of blocking indefinitely. Each lock attempt runs inside a savepoint: on a
/// lock-wait timeout the savepoint is rolled back and the acquisition is
/// retried, leaving the rest of the transaction intact.

const MAX_LOCK_ATTEMPTS: u32 = 3;
const LOCK_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Postgres `lock_not_available`, raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Debug, FromRow)]
struct LockedStock {
    name: String,
    stock: i32,
}

/// Reserve `quantity` units of a product: decrement its stock.
///
/// Fails with `InsufficientStock` when fewer than `quantity` units are
/// available at the time the row lock is held, and with `StockContention`
/// when the lock cannot be acquired within the retry budget.
pub async fn reserve(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
    quantity: i32,
) -> Result<(), InvoiceError> {
    let locked = lock_product(tx, product_id)
        .await?
        .ok_or(InvoiceError::ProductNotFound(product_id))?;

    if locked.stock < quantity {
        return Err(InvoiceError::InsufficientStock {
            product: locked.name,
            available: locked.stock,
            requested: quantity,
        });
    }

    apply_delta(tx, product_id, -quantity).await
}

/// Release `quantity` units of a product: increment its stock.
///
/// Never fails on value grounds. A product that no longer exists is skipped
/// with a warning: there is no stock left to restore.
pub async fn release(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
    quantity: i32,
) -> Result<(), InvoiceError> {
    match lock_product(tx, product_id).await? {
        Some(_) => apply_delta(tx, product_id, quantity).await,
        None => {
            warn!(
                "skipping stock release of {} units: product {} no longer exists",
                quantity, product_id
            );
            Ok(())
        }
    }
}

/// Acquire the row-level exclusive lock on a product, retrying on lock-wait
/// timeout. Returns `None` when the product row does not exist.
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
) -> Result<Option<LockedStock>, InvoiceError> {
    for attempt in 1..=MAX_LOCK_ATTEMPTS {
        sqlx::query("SAVEPOINT stock_lock")
            .execute(&mut **tx)
            .await?;

        let locked = sqlx::query_as::<_, LockedStock>(
            "SELECT name, stock FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await;

        match locked {
            Ok(row) => return Ok(row),
            Err(err) if is_lock_timeout(&err) => {
                sqlx::query("ROLLBACK TO SAVEPOINT stock_lock")
                    .execute(&mut **tx)
                    .await?;
                warn!(
                    "lock wait timeout on product {} (attempt {}/{})",
                    product_id, attempt, MAX_LOCK_ATTEMPTS
                );
                sleep(LOCK_RETRY_BACKOFF).await;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(InvoiceError::StockContention)
}

async fn apply_delta(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
    delta: i32,
) -> Result<(), InvoiceError> {
    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
        .bind(product_id)
        .bind(delta)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn is_lock_timeout(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE)
    )
}
