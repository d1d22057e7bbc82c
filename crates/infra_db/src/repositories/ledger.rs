//! B2B ledger repository
//!
//! Queries over customers, bill sequences, transactions, cylinders and
//! accessory stock. Every function takes the connection of the caller's
//! database transaction so that a whole recording or reversal commits or
//! rolls back as one unit.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::DatabaseError;

/// Cylinder size class as stored in PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "cylinder_type")]
pub enum CylinderType {
    #[sqlx(rename = "DOMESTIC_11_8KG")]
    Domestic11_8Kg,
    #[sqlx(rename = "STANDARD_15KG")]
    Standard15Kg,
    #[sqlx(rename = "COMMERCIAL_45_4KG")]
    Commercial45_4Kg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "cylinder_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CylinderStatus {
    Full,
    Empty,
    WithCustomer,
    Maintenance,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Sale,
    Payment,
    Buyback,
    ReturnEmpty,
    Adjustment,
    CreditNote,
}

/// Database row for a B2B customer
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub customer_id: Uuid,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub currency: String,
    pub credit_limit: Decimal,
    pub payment_terms_days: i32,
    pub ledger_balance: Decimal,
    pub due_domestic_11_8kg: i32,
    pub due_standard_15kg: i32,
    pub due_commercial_45_4kg: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for a B2B transaction header
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub transaction_id: Uuid,
    pub bill_sno: String,
    pub transaction_type: TransactionType,
    pub customer_id: Uuid,
    pub transaction_at: DateTime<Utc>,
    pub bill_date: NaiveDate,
    pub currency: String,
    pub total_amount: Decimal,
    pub unpaid_amount: Option<Decimal>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub balance_effect: Decimal,
    pub due_effect_domestic_11_8kg: i64,
    pub due_effect_standard_15kg: i64,
    pub due_effect_commercial_45_4kg: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub voided_by: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

/// Database row for a transaction line
///
/// `kind` holds the serialized item payload; `item_category`,
/// `cylinder_type` and `product_id` are denormalized for querying.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionItemRow {
    pub item_id: Uuid,
    pub transaction_id: Uuid,
    pub line_no: i32,
    pub item_category: String,
    pub cylinder_type: Option<CylinderType>,
    pub product_id: Option<Uuid>,
    pub kind: Json<serde_json::Value>,
    pub quantity: i32,
    pub price_per_item: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CylinderRow {
    pub cylinder_id: Uuid,
    pub code: String,
    pub cylinder_type: CylinderType,
    pub capacity_kg: Decimal,
    pub status: CylinderStatus,
    pub location: String,
    pub holder_customer_id: Option<Uuid>,
    pub holder_retail_customer_id: Option<Uuid>,
    pub source_transaction_id: Option<Uuid>,
    pub source_retail_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for cylinder lookups; `None` fields match anything
#[derive(Debug, Clone, Default)]
pub struct CylinderFilter {
    pub cylinder_type: Option<CylinderType>,
    pub status: Option<CylinderStatus>,
    pub holder_customer_id: Option<Uuid>,
    pub holder_retail_customer_id: Option<Uuid>,
    pub locations: Vec<String>,
    pub source_transaction_id: Option<Uuid>,
    pub source_retail_transaction_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// New placement written to a set of cylinders
#[derive(Debug, Clone)]
pub struct CylinderPlacement {
    pub status: CylinderStatus,
    pub location: String,
    pub holder_customer_id: Option<Uuid>,
    pub holder_retail_customer_id: Option<Uuid>,
    pub source_transaction_id: Option<Uuid>,
    pub source_retail_transaction_id: Option<Uuid>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub product_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub currency: String,
    pub stock_quantity: i64,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomItemRow {
    pub custom_item_id: Uuid,
    pub name: String,
    pub item_type: String,
    pub currency: String,
    pub quantity: i64,
    pub cost_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

const CUSTOMER_COLUMNS: &str = "customer_id, name, contact_person, phone, email, address, currency, \
    credit_limit, payment_terms_days, ledger_balance, due_domestic_11_8kg, due_standard_15kg, \
    due_commercial_45_4kg, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, bill_sno, transaction_type, customer_id, \
    transaction_at, bill_date, currency, total_amount, unpaid_amount, payment_reference, notes, \
    balance_effect, due_effect_domestic_11_8kg, due_effect_standard_15kg, \
    due_effect_commercial_45_4kg, created_by, created_at, voided_by, voided_at, void_reason";

const CYLINDER_COLUMNS: &str = "cylinder_id, code, cylinder_type, capacity_kg, status, location, \
    holder_customer_id, holder_retail_customer_id, source_transaction_id, \
    source_retail_transaction_id, created_at, updated_at";

const PRODUCT_COLUMNS: &str =
    "product_id, name, category, currency, stock_quantity, unit_price, cost_price, updated_at";

const CUSTOM_ITEM_COLUMNS: &str =
    "custom_item_id, name, item_type, currency, quantity, cost_price, updated_at";

/// Repository for the B2B ledger tables
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerRepository;

impl LedgerRepository {
    /// Increments the per-day bill counter, creating it at 1
    ///
    /// The upsert takes a row lock on the day's counter, so concurrent
    /// callers receive distinct, gap-free sequences in commit order.
    pub async fn next_bill_sequence(
        conn: &mut PgConnection,
        bill_date: NaiveDate,
    ) -> Result<i32, DatabaseError> {
        let sequence = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO bill_sequences (bill_date, sequence)
            VALUES ($1, 1)
            ON CONFLICT (bill_date) DO UPDATE SET sequence = bill_sequences.sequence + 1
            RETURNING sequence
            "#,
        )
        .bind(bill_date)
        .fetch_one(conn)
        .await?;
        Ok(sequence)
    }

    pub async fn insert_customer(conn: &mut PgConnection, row: &CustomerRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                customer_id, name, contact_person, phone, email, address, currency,
                credit_limit, payment_terms_days, ledger_balance, due_domestic_11_8kg,
                due_standard_15kg, due_commercial_45_4kg, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(row.customer_id)
        .bind(&row.name)
        .bind(&row.contact_person)
        .bind(&row.phone)
        .bind(&row.email)
        .bind(&row.address)
        .bind(&row.currency)
        .bind(row.credit_limit)
        .bind(row.payment_terms_days)
        .bind(row.ledger_balance)
        .bind(row.due_domestic_11_8kg)
        .bind(row.due_standard_15kg)
        .bind(row.due_commercial_45_4kg)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Loads a customer and locks the row until the transaction ends
    pub async fn lock_customer(
        conn: &mut PgConnection,
        customer_id: Uuid,
    ) -> Result<Option<CustomerRow>, DatabaseError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE customer_id = $1 FOR UPDATE",
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    pub async fn update_customer_ledger(
        conn: &mut PgConnection,
        customer_id: Uuid,
        ledger_balance: Decimal,
        dues: [i32; 3],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET ledger_balance = $2,
                due_domestic_11_8kg = $3,
                due_standard_15kg = $4,
                due_commercial_45_4kg = $5,
                updated_at = $6
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .bind(ledger_balance)
        .bind(dues[0])
        .bind(dues[1])
        .bind(dues[2])
        .bind(updated_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Inserts a transaction header with its lines
    pub async fn insert_transaction(
        conn: &mut PgConnection,
        header: &TransactionRow,
        items: &[TransactionItemRow],
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                transaction_id, bill_sno, transaction_type, customer_id, transaction_at,
                bill_date, currency, total_amount, unpaid_amount, payment_reference, notes,
                balance_effect, due_effect_domestic_11_8kg, due_effect_standard_15kg,
                due_effect_commercial_45_4kg, created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(header.transaction_id)
        .bind(&header.bill_sno)
        .bind(header.transaction_type)
        .bind(header.customer_id)
        .bind(header.transaction_at)
        .bind(header.bill_date)
        .bind(&header.currency)
        .bind(header.total_amount)
        .bind(header.unpaid_amount)
        .bind(&header.payment_reference)
        .bind(&header.notes)
        .bind(header.balance_effect)
        .bind(header.due_effect_domestic_11_8kg)
        .bind(header.due_effect_standard_15kg)
        .bind(header.due_effect_commercial_45_4kg)
        .bind(&header.created_by)
        .bind(header.created_at)
        .execute(&mut *conn)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO transaction_items (
                    item_id, transaction_id, line_no, item_category, cylinder_type,
                    product_id, kind, quantity, price_per_item, total_price
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(item.item_id)
            .bind(item.transaction_id)
            .bind(item.line_no)
            .bind(&item.item_category)
            .bind(item.cylinder_type)
            .bind(item.product_id)
            .bind(&item.kind)
            .bind(item.quantity)
            .bind(item.price_per_item)
            .bind(item.total_price)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Loads a transaction header and locks it until the transaction ends
    pub async fn lock_transaction(
        conn: &mut PgConnection,
        transaction_id: Uuid,
    ) -> Result<Option<TransactionRow>, DatabaseError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE transaction_id = $1 FOR UPDATE",
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    /// Lines of the given transactions, ordered by transaction and line number
    pub async fn items_for(
        conn: &mut PgConnection,
        transaction_ids: &[Uuid],
    ) -> Result<Vec<TransactionItemRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, TransactionItemRow>(
            r#"
            SELECT item_id, transaction_id, line_no, item_category, cylinder_type,
                   product_id, kind, quantity, price_per_item, total_price
            FROM transaction_items
            WHERE transaction_id = ANY($1)
            ORDER BY transaction_id, line_no
            "#,
        )
        .bind(transaction_ids)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn mark_voided(
        conn: &mut PgConnection,
        transaction_id: Uuid,
        voided_by: &str,
        voided_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET voided_by = $2, voided_at = $3, void_reason = $4
            WHERE transaction_id = $1 AND voided_at IS NULL
            "#,
        )
        .bind(transaction_id)
        .bind(voided_by)
        .bind(voided_at)
        .bind(reason)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// All transactions of a customer in chronological order
    pub async fn customer_transactions(
        conn: &mut PgConnection,
        customer_id: Uuid,
    ) -> Result<Vec<TransactionRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE customer_id = $1 ORDER BY transaction_at, bill_sno",
            TRANSACTION_COLUMNS
        ))
        .bind(customer_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn insert_cylinder(conn: &mut PgConnection, row: &CylinderRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO cylinders (
                cylinder_id, code, cylinder_type, capacity_kg, status, location,
                holder_customer_id, holder_retail_customer_id, source_transaction_id,
                source_retail_transaction_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(row.cylinder_id)
        .bind(&row.code)
        .bind(row.cylinder_type)
        .bind(row.capacity_kg)
        .bind(row.status)
        .bind(&row.location)
        .bind(row.holder_customer_id)
        .bind(row.holder_retail_customer_id)
        .bind(row.source_transaction_id)
        .bind(row.source_retail_transaction_id)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Finds and locks matching cylinders in creation order
    pub async fn find_cylinders(
        conn: &mut PgConnection,
        filter: &CylinderFilter,
    ) -> Result<Vec<CylinderRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, CylinderRow>(&format!(
            r#"
            SELECT {} FROM cylinders
            WHERE ($1::cylinder_type IS NULL OR cylinder_type = $1)
              AND ($2::cylinder_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR holder_customer_id = $3)
              AND ($4::uuid IS NULL OR holder_retail_customer_id = $4)
              AND (cardinality($5::text[]) = 0 OR location = ANY($5))
              AND ($6::uuid IS NULL OR source_transaction_id = $6)
              AND ($7::uuid IS NULL OR source_retail_transaction_id = $7)
            ORDER BY created_at, code
            LIMIT $8
            FOR UPDATE
            "#,
            CYLINDER_COLUMNS
        ))
        .bind(filter.cylinder_type)
        .bind(filter.status)
        .bind(filter.holder_customer_id)
        .bind(filter.holder_retail_customer_id)
        .bind(&filter.locations)
        .bind(filter.source_transaction_id)
        .bind(filter.source_retail_transaction_id)
        .bind(filter.limit)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn place_cylinders(
        conn: &mut PgConnection,
        cylinder_ids: &[Uuid],
        placement: &CylinderPlacement,
        at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE cylinders
            SET status = $2,
                location = $3,
                holder_customer_id = $4,
                holder_retail_customer_id = $5,
                source_transaction_id = $6,
                source_retail_transaction_id = $7,
                updated_at = $8
            WHERE cylinder_id = ANY($1)
            "#,
        )
        .bind(cylinder_ids)
        .bind(placement.status)
        .bind(&placement.location)
        .bind(placement.holder_customer_id)
        .bind(placement.holder_retail_customer_id)
        .bind(placement.source_transaction_id)
        .bind(placement.source_retail_transaction_id)
        .bind(at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_product(conn: &mut PgConnection, row: &ProductRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                product_id, name, category, currency, stock_quantity, unit_price, cost_price, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(row.product_id)
        .bind(&row.name)
        .bind(&row.category)
        .bind(&row.currency)
        .bind(row.stock_quantity)
        .bind(row.unit_price)
        .bind(row.cost_price)
        .bind(row.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get_product(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> Result<Option<ProductRow>, DatabaseError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE product_id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    /// Case-insensitive exact name match
    pub async fn find_product_by_name(
        conn: &mut PgConnection,
        name: &str,
    ) -> Result<Option<ProductRow>, DatabaseError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE LOWER(name) = LOWER(TRIM($1)) ORDER BY name LIMIT 1",
            PRODUCT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    /// Case-insensitive containment match
    pub async fn search_products(
        conn: &mut PgConnection,
        fragment: &str,
    ) -> Result<Vec<ProductRow>, DatabaseError> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE STRPOS(LOWER(name), LOWER($1)) > 0 ORDER BY name",
            PRODUCT_COLUMNS
        ))
        .bind(fragment)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Adds `delta` to the stock unless that would drive it below zero
    ///
    /// Returns the new quantity, or `None` when the product does not exist
    /// or holds too little stock.
    pub async fn adjust_product_stock(
        conn: &mut PgConnection,
        product_id: Uuid,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<i64>, DatabaseError> {
        let quantity = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2, updated_at = $3
            WHERE product_id = $1 AND stock_quantity + $2 >= 0
            RETURNING stock_quantity
            "#,
        )
        .bind(product_id)
        .bind(delta)
        .bind(at)
        .fetch_optional(conn)
        .await?;
        Ok(quantity)
    }

    pub async fn insert_custom_item(conn: &mut PgConnection, row: &CustomItemRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO custom_items (
                custom_item_id, name, item_type, currency, quantity, cost_price, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(row.custom_item_id)
        .bind(&row.name)
        .bind(&row.item_type)
        .bind(&row.currency)
        .bind(row.quantity)
        .bind(row.cost_price)
        .bind(row.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get_custom_item(
        conn: &mut PgConnection,
        custom_item_id: Uuid,
    ) -> Result<Option<CustomItemRow>, DatabaseError> {
        let row = sqlx::query_as::<_, CustomItemRow>(&format!(
            "SELECT {} FROM custom_items WHERE custom_item_id = $1",
            CUSTOM_ITEM_COLUMNS
        ))
        .bind(custom_item_id)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    pub async fn find_custom_item(
        conn: &mut PgConnection,
        name: &str,
        item_type: &str,
    ) -> Result<Option<CustomItemRow>, DatabaseError> {
        let row = sqlx::query_as::<_, CustomItemRow>(&format!(
            r#"
            SELECT {} FROM custom_items
            WHERE LOWER(name) = LOWER(TRIM($1)) AND LOWER(item_type) = LOWER(TRIM($2))
            ORDER BY name
            LIMIT 1
            "#,
            CUSTOM_ITEM_COLUMNS
        ))
        .bind(name)
        .bind(item_type)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    /// Same contract as `adjust_product_stock`
    pub async fn adjust_custom_item_quantity(
        conn: &mut PgConnection,
        custom_item_id: Uuid,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<i64>, DatabaseError> {
        let quantity = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE custom_items
            SET quantity = quantity + $2, updated_at = $3
            WHERE custom_item_id = $1 AND quantity + $2 >= 0
            RETURNING quantity
            "#,
        )
        .bind(custom_item_id)
        .bind(delta)
        .bind(at)
        .fetch_optional(conn)
        .await?;
        Ok(quantity)
    }
}
