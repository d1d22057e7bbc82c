//! B2C (retail) repository
//!
//! Retail customers, retail transactions with their gas, security and
//! accessory lines, and the deposit holdings those transactions create.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use super::ledger::{CylinderType, TransactionType};
use crate::error::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Credit,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RetailCustomerRow {
    pub retail_customer_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub currency: String,
    pub total_profit: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RetailTransactionRow {
    pub retail_transaction_id: Uuid,
    pub bill_sno: String,
    pub transaction_type: TransactionType,
    pub retail_customer_id: Uuid,
    pub transaction_at: DateTime<Utc>,
    pub bill_date: NaiveDate,
    pub currency: String,
    pub total_amount: Decimal,
    pub delivery_charges: Decimal,
    pub final_amount: Decimal,
    pub actual_profit: Decimal,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub voided_by: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RetailGasItemRow {
    pub item_id: Uuid,
    pub retail_transaction_id: Uuid,
    pub line_no: i32,
    pub cylinder_type: CylinderType,
    pub quantity: i32,
    pub price_per_item: Decimal,
    pub cost_per_item: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RetailSecurityItemRow {
    pub item_id: Uuid,
    pub retail_transaction_id: Uuid,
    pub line_no: i32,
    pub cylinder_type: CylinderType,
    pub quantity: i32,
    pub price_per_item: Decimal,
    pub is_return: bool,
    pub deduction_per_item: Option<Decimal>,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RetailAccessoryItemRow {
    pub item_id: Uuid,
    pub retail_transaction_id: Uuid,
    pub line_no: i32,
    pub name: String,
    pub item_type: String,
    pub quantity: i32,
    pub price_per_item: Decimal,
    pub cost_per_item: Decimal,
    pub total_price: Decimal,
    /// One of `custom_item`, `product`, `untracked`
    pub stock_table: String,
    pub stock_id: Option<Uuid>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HoldingRow {
    pub holding_id: Uuid,
    pub retail_customer_id: Uuid,
    pub cylinder_type: CylinderType,
    pub quantity: i32,
    pub security_amount: Decimal,
    pub issue_date: NaiveDate,
    pub is_returned: bool,
    pub return_date: Option<NaiveDate>,
    pub return_deduction: Option<Decimal>,
    pub issued_by_transaction: Uuid,
    pub returned_by_transaction: Option<Uuid>,
}

/// A retail transaction header with all of its lines
#[derive(Debug, Clone)]
pub struct RetailTransactionRecord {
    pub header: RetailTransactionRow,
    pub gas_items: Vec<RetailGasItemRow>,
    pub security_items: Vec<RetailSecurityItemRow>,
    pub accessory_items: Vec<RetailAccessoryItemRow>,
}

const RETAIL_TRANSACTION_COLUMNS: &str = "retail_transaction_id, bill_sno, transaction_type, \
    retail_customer_id, transaction_at, bill_date, currency, total_amount, delivery_charges, \
    final_amount, actual_profit, payment_method, notes, created_by, created_at, voided_by, \
    voided_at, void_reason";

const HOLDING_COLUMNS: &str = "holding_id, retail_customer_id, cylinder_type, quantity, \
    security_amount, issue_date, is_returned, return_date, return_deduction, \
    issued_by_transaction, returned_by_transaction";

/// Repository for the retail tables
#[derive(Debug, Clone, Copy, Default)]
pub struct RetailRepository;

impl RetailRepository {
    pub async fn insert_customer(
        conn: &mut PgConnection,
        row: &RetailCustomerRow,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO retail_customers (
                retail_customer_id, name, phone, address, currency, total_profit, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(row.retail_customer_id)
        .bind(&row.name)
        .bind(&row.phone)
        .bind(&row.address)
        .bind(&row.currency)
        .bind(row.total_profit)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn lock_customer(
        conn: &mut PgConnection,
        retail_customer_id: Uuid,
    ) -> Result<Option<RetailCustomerRow>, DatabaseError> {
        let row = sqlx::query_as::<_, RetailCustomerRow>(
            r#"
            SELECT retail_customer_id, name, phone, address, currency, total_profit, created_at, updated_at
            FROM retail_customers
            WHERE retail_customer_id = $1
            FOR UPDATE
            "#,
        )
        .bind(retail_customer_id)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    pub async fn update_profit(
        conn: &mut PgConnection,
        retail_customer_id: Uuid,
        total_profit: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE retail_customers SET total_profit = $2, updated_at = $3 WHERE retail_customer_id = $1",
        )
        .bind(retail_customer_id)
        .bind(total_profit)
        .bind(updated_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_transaction(
        conn: &mut PgConnection,
        record: &RetailTransactionRecord,
    ) -> Result<(), DatabaseError> {
        let header = &record.header;
        sqlx::query(
            r#"
            INSERT INTO retail_transactions (
                retail_transaction_id, bill_sno, transaction_type, retail_customer_id,
                transaction_at, bill_date, currency, total_amount, delivery_charges,
                final_amount, actual_profit, payment_method, notes, created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(header.retail_transaction_id)
        .bind(&header.bill_sno)
        .bind(header.transaction_type)
        .bind(header.retail_customer_id)
        .bind(header.transaction_at)
        .bind(header.bill_date)
        .bind(&header.currency)
        .bind(header.total_amount)
        .bind(header.delivery_charges)
        .bind(header.final_amount)
        .bind(header.actual_profit)
        .bind(header.payment_method)
        .bind(&header.notes)
        .bind(&header.created_by)
        .bind(header.created_at)
        .execute(&mut *conn)
        .await?;

        for item in &record.gas_items {
            sqlx::query(
                r#"
                INSERT INTO retail_gas_items (
                    item_id, retail_transaction_id, line_no, cylinder_type, quantity,
                    price_per_item, cost_per_item, total_price
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.item_id)
            .bind(item.retail_transaction_id)
            .bind(item.line_no)
            .bind(item.cylinder_type)
            .bind(item.quantity)
            .bind(item.price_per_item)
            .bind(item.cost_per_item)
            .bind(item.total_price)
            .execute(&mut *conn)
            .await?;
        }

        for item in &record.security_items {
            sqlx::query(
                r#"
                INSERT INTO retail_security_items (
                    item_id, retail_transaction_id, line_no, cylinder_type, quantity,
                    price_per_item, is_return, deduction_per_item, total_price
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(item.item_id)
            .bind(item.retail_transaction_id)
            .bind(item.line_no)
            .bind(item.cylinder_type)
            .bind(item.quantity)
            .bind(item.price_per_item)
            .bind(item.is_return)
            .bind(item.deduction_per_item)
            .bind(item.total_price)
            .execute(&mut *conn)
            .await?;
        }

        for item in &record.accessory_items {
            sqlx::query(
                r#"
                INSERT INTO retail_accessory_items (
                    item_id, retail_transaction_id, line_no, name, item_type, quantity,
                    price_per_item, cost_per_item, total_price, stock_table, stock_id
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.item_id)
            .bind(item.retail_transaction_id)
            .bind(item.line_no)
            .bind(&item.name)
            .bind(&item.item_type)
            .bind(item.quantity)
            .bind(item.price_per_item)
            .bind(item.cost_per_item)
            .bind(item.total_price)
            .bind(&item.stock_table)
            .bind(item.stock_id)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Loads and locks a retail transaction together with its lines
    pub async fn lock_transaction(
        conn: &mut PgConnection,
        retail_transaction_id: Uuid,
    ) -> Result<Option<RetailTransactionRecord>, DatabaseError> {
        let header = sqlx::query_as::<_, RetailTransactionRow>(&format!(
            "SELECT {} FROM retail_transactions WHERE retail_transaction_id = $1 FOR UPDATE",
            RETAIL_TRANSACTION_COLUMNS
        ))
        .bind(retail_transaction_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let gas_items = sqlx::query_as::<_, RetailGasItemRow>(
            r#"
            SELECT item_id, retail_transaction_id, line_no, cylinder_type, quantity,
                   price_per_item, cost_per_item, total_price
            FROM retail_gas_items WHERE retail_transaction_id = $1 ORDER BY line_no
            "#,
        )
        .bind(retail_transaction_id)
        .fetch_all(&mut *conn)
        .await?;

        let security_items = sqlx::query_as::<_, RetailSecurityItemRow>(
            r#"
            SELECT item_id, retail_transaction_id, line_no, cylinder_type, quantity,
                   price_per_item, is_return, deduction_per_item, total_price
            FROM retail_security_items WHERE retail_transaction_id = $1 ORDER BY line_no
            "#,
        )
        .bind(retail_transaction_id)
        .fetch_all(&mut *conn)
        .await?;

        let accessory_items = sqlx::query_as::<_, RetailAccessoryItemRow>(
            r#"
            SELECT item_id, retail_transaction_id, line_no, name, item_type, quantity,
                   price_per_item, cost_per_item, total_price, stock_table, stock_id
            FROM retail_accessory_items WHERE retail_transaction_id = $1 ORDER BY line_no
            "#,
        )
        .bind(retail_transaction_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(RetailTransactionRecord {
            header,
            gas_items,
            security_items,
            accessory_items,
        }))
    }

    pub async fn mark_voided(
        conn: &mut PgConnection,
        retail_transaction_id: Uuid,
        voided_by: &str,
        voided_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE retail_transactions
            SET voided_by = $2, voided_at = $3, void_reason = $4
            WHERE retail_transaction_id = $1 AND voided_at IS NULL
            "#,
        )
        .bind(retail_transaction_id)
        .bind(voided_by)
        .bind(voided_at)
        .bind(reason)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_holding(conn: &mut PgConnection, row: &HoldingRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO cylinder_holdings (
                holding_id, retail_customer_id, cylinder_type, quantity, security_amount,
                issue_date, is_returned, return_date, return_deduction,
                issued_by_transaction, returned_by_transaction
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.holding_id)
        .bind(row.retail_customer_id)
        .bind(row.cylinder_type)
        .bind(row.quantity)
        .bind(row.security_amount)
        .bind(row.issue_date)
        .bind(row.is_returned)
        .bind(row.return_date)
        .bind(row.return_deduction)
        .bind(row.issued_by_transaction)
        .bind(row.returned_by_transaction)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Writes back the quantity and return fields of a holding
    pub async fn update_holding(conn: &mut PgConnection, row: &HoldingRow) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE cylinder_holdings
            SET quantity = $2,
                security_amount = $3,
                is_returned = $4,
                return_date = $5,
                return_deduction = $6,
                returned_by_transaction = $7
            WHERE holding_id = $1
            "#,
        )
        .bind(row.holding_id)
        .bind(row.quantity)
        .bind(row.security_amount)
        .bind(row.is_returned)
        .bind(row.return_date)
        .bind(row.return_deduction)
        .bind(row.returned_by_transaction)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Unreturned holdings of one type, oldest first, locked
    pub async fn open_holdings(
        conn: &mut PgConnection,
        retail_customer_id: Uuid,
        cylinder_type: CylinderType,
    ) -> Result<Vec<HoldingRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, HoldingRow>(&format!(
            r#"
            SELECT {} FROM cylinder_holdings
            WHERE retail_customer_id = $1 AND cylinder_type = $2 AND NOT is_returned
            ORDER BY issue_date, created_at, holding_id
            FOR UPDATE
            "#,
            HOLDING_COLUMNS
        ))
        .bind(retail_customer_id)
        .bind(cylinder_type)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn holdings_issued_by(
        conn: &mut PgConnection,
        retail_transaction_id: Uuid,
    ) -> Result<Vec<HoldingRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, HoldingRow>(&format!(
            r#"
            SELECT {} FROM cylinder_holdings
            WHERE issued_by_transaction = $1
            ORDER BY issue_date, created_at, holding_id
            FOR UPDATE
            "#,
            HOLDING_COLUMNS
        ))
        .bind(retail_transaction_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn holdings_returned_by(
        conn: &mut PgConnection,
        retail_customer_id: Uuid,
        cylinder_type: CylinderType,
        return_date: NaiveDate,
        retail_transaction_id: Uuid,
    ) -> Result<Vec<HoldingRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, HoldingRow>(&format!(
            r#"
            SELECT {} FROM cylinder_holdings
            WHERE retail_customer_id = $1
              AND cylinder_type = $2
              AND is_returned
              AND return_date = $3
              AND returned_by_transaction = $4
            ORDER BY issue_date, created_at, holding_id
            FOR UPDATE
            "#,
            HOLDING_COLUMNS
        ))
        .bind(retail_customer_id)
        .bind(cylinder_type)
        .bind(return_date)
        .bind(retail_transaction_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn delete_holdings(conn: &mut PgConnection, holding_ids: &[Uuid]) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM cylinder_holdings WHERE holding_id = ANY($1)")
            .bind(holding_ids)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}
