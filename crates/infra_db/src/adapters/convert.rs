//! Conversions between database rows and ledger domain types

use std::str::FromStr;

use sqlx::types::Json;
use uuid::Uuid;

use core_kernel::{
    ActorId, Currency, CustomItemId, CustomerId, CylinderId, HoldingId, Money, ProductId,
    RetailCustomerId, RetailItemId, RetailTransactionId, TransactionId, TransactionItemId,
};
use domain_ledger::retail::{
    AccessoryItem, CylinderHolding, GasItem, PaymentMethod, RetailCustomer, RetailTransaction,
    SecurityDirection, SecurityItem,
};
use domain_ledger::{
    CustomItem, Customer, Cylinder, CylinderHolder, CylinderLocation, CylinderMove, CylinderQuery,
    CylinderStatus, CylinderType, DueCounters, DueDelta, ItemKind, LedgerTransaction, Product,
    StockSource, TransactionItem, TransactionRef, TransactionType, VoidRecord,
};

use crate::error::DatabaseError;
use crate::repositories::ledger::{
    CustomItemRow, CustomerRow, CylinderFilter, CylinderPlacement, CylinderRow, ProductRow,
    TransactionItemRow, TransactionRow, CylinderStatus as DbCylinderStatus,
    CylinderType as DbCylinderType, TransactionType as DbTransactionType,
};
use crate::repositories::retail::{
    HoldingRow, PaymentMethod as DbPaymentMethod, RetailAccessoryItemRow, RetailCustomerRow,
    RetailGasItemRow, RetailSecurityItemRow, RetailTransactionRecord, RetailTransactionRow,
};

// ---- enums ----

pub(crate) fn cylinder_type_to_db(t: CylinderType) -> DbCylinderType {
    match t {
        CylinderType::Domestic11_8Kg => DbCylinderType::Domestic11_8Kg,
        CylinderType::Standard15Kg => DbCylinderType::Standard15Kg,
        CylinderType::Commercial45_4Kg => DbCylinderType::Commercial45_4Kg,
    }
}

pub(crate) fn db_to_cylinder_type(t: DbCylinderType) -> CylinderType {
    match t {
        DbCylinderType::Domestic11_8Kg => CylinderType::Domestic11_8Kg,
        DbCylinderType::Standard15Kg => CylinderType::Standard15Kg,
        DbCylinderType::Commercial45_4Kg => CylinderType::Commercial45_4Kg,
    }
}

pub(crate) fn cylinder_status_to_db(s: CylinderStatus) -> DbCylinderStatus {
    match s {
        CylinderStatus::Full => DbCylinderStatus::Full,
        CylinderStatus::Empty => DbCylinderStatus::Empty,
        CylinderStatus::WithCustomer => DbCylinderStatus::WithCustomer,
        CylinderStatus::Maintenance => DbCylinderStatus::Maintenance,
        CylinderStatus::Retired => DbCylinderStatus::Retired,
    }
}

pub(crate) fn db_to_cylinder_status(s: DbCylinderStatus) -> CylinderStatus {
    match s {
        DbCylinderStatus::Full => CylinderStatus::Full,
        DbCylinderStatus::Empty => CylinderStatus::Empty,
        DbCylinderStatus::WithCustomer => CylinderStatus::WithCustomer,
        DbCylinderStatus::Maintenance => CylinderStatus::Maintenance,
        DbCylinderStatus::Retired => CylinderStatus::Retired,
    }
}

pub(crate) fn transaction_type_to_db(t: TransactionType) -> DbTransactionType {
    match t {
        TransactionType::Sale => DbTransactionType::Sale,
        TransactionType::Payment => DbTransactionType::Payment,
        TransactionType::Buyback => DbTransactionType::Buyback,
        TransactionType::ReturnEmpty => DbTransactionType::ReturnEmpty,
        TransactionType::Adjustment => DbTransactionType::Adjustment,
        TransactionType::CreditNote => DbTransactionType::CreditNote,
    }
}

pub(crate) fn db_to_transaction_type(t: DbTransactionType) -> TransactionType {
    match t {
        DbTransactionType::Sale => TransactionType::Sale,
        DbTransactionType::Payment => TransactionType::Payment,
        DbTransactionType::Buyback => TransactionType::Buyback,
        DbTransactionType::ReturnEmpty => TransactionType::ReturnEmpty,
        DbTransactionType::Adjustment => TransactionType::Adjustment,
        DbTransactionType::CreditNote => TransactionType::CreditNote,
    }
}

fn payment_method_to_db(m: PaymentMethod) -> DbPaymentMethod {
    match m {
        PaymentMethod::Cash => DbPaymentMethod::Cash,
        PaymentMethod::Card => DbPaymentMethod::Card,
        PaymentMethod::BankTransfer => DbPaymentMethod::BankTransfer,
        PaymentMethod::Credit => DbPaymentMethod::Credit,
    }
}

fn db_to_payment_method(m: DbPaymentMethod) -> PaymentMethod {
    match m {
        DbPaymentMethod::Cash => PaymentMethod::Cash,
        DbPaymentMethod::Card => PaymentMethod::Card,
        DbPaymentMethod::BankTransfer => PaymentMethod::BankTransfer,
        DbPaymentMethod::Credit => PaymentMethod::Credit,
    }
}

// ---- scalars ----

fn currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_str(code).map_err(|e| DatabaseError::corrupt(e.to_string()))
}

fn to_u32(value: i32, column: &str) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|_| DatabaseError::corrupt(format!("{} = {} is negative", column, value)))
}

fn to_i32(value: u32, column: &str) -> Result<i32, DatabaseError> {
    i32::try_from(value)
        .map_err(|_| DatabaseError::ConstraintViolation(format!("{} = {} is out of range", column, value)))
}

fn void_record(
    voided_by: Option<String>,
    voided_at: Option<chrono::DateTime<chrono::Utc>>,
    reason: Option<String>,
) -> Option<VoidRecord> {
    match (voided_by, voided_at) {
        (Some(by), Some(at)) => Some(VoidRecord {
            voided_by: ActorId::new(by),
            voided_at: at,
            reason: reason.unwrap_or_default(),
        }),
        _ => None,
    }
}

// ---- customers ----

pub(crate) fn customer_to_row(customer: &Customer) -> Result<CustomerRow, DatabaseError> {
    Ok(CustomerRow {
        customer_id: customer.id.into(),
        name: customer.name.clone(),
        contact_person: customer.contact_person.clone(),
        phone: customer.phone.clone(),
        email: customer.email.clone(),
        address: customer.address.clone(),
        currency: customer.ledger_balance.currency().code().to_string(),
        credit_limit: customer.credit_limit.amount(),
        payment_terms_days: i32::try_from(customer.payment_terms_days)
            .map_err(|_| DatabaseError::ConstraintViolation("payment_terms_days out of range".into()))?,
        ledger_balance: customer.ledger_balance.amount(),
        due_domestic_11_8kg: to_i32(customer.dues.domestic_11_8kg, "due_domestic_11_8kg")?,
        due_standard_15kg: to_i32(customer.dues.standard_15kg, "due_standard_15kg")?,
        due_commercial_45_4kg: to_i32(customer.dues.commercial_45_4kg, "due_commercial_45_4kg")?,
        created_at: customer.created_at,
        updated_at: customer.updated_at,
    })
}

pub(crate) fn row_to_customer(row: CustomerRow) -> Result<Customer, DatabaseError> {
    let currency = currency(&row.currency)?;
    Ok(Customer {
        id: CustomerId::from_uuid(row.customer_id),
        name: row.name,
        contact_person: row.contact_person,
        phone: row.phone,
        email: row.email,
        address: row.address,
        credit_limit: Money::new(row.credit_limit, currency),
        payment_terms_days: to_u32(row.payment_terms_days, "payment_terms_days")?,
        ledger_balance: Money::new(row.ledger_balance, currency),
        dues: DueCounters {
            domestic_11_8kg: to_u32(row.due_domestic_11_8kg, "due_domestic_11_8kg")?,
            standard_15kg: to_u32(row.due_standard_15kg, "due_standard_15kg")?,
            commercial_45_4kg: to_u32(row.due_commercial_45_4kg, "due_commercial_45_4kg")?,
        },
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Due counters in column order
pub(crate) fn dues_to_columns(dues: &DueCounters) -> Result<[i32; 3], DatabaseError> {
    Ok([
        to_i32(dues.domestic_11_8kg, "due_domestic_11_8kg")?,
        to_i32(dues.standard_15kg, "due_standard_15kg")?,
        to_i32(dues.commercial_45_4kg, "due_commercial_45_4kg")?,
    ])
}

// ---- B2B transactions ----

pub(crate) fn transaction_to_rows(
    transaction: &LedgerTransaction,
) -> Result<(TransactionRow, Vec<TransactionItemRow>), DatabaseError> {
    let transaction_id: Uuid = transaction.id.into();
    let header = TransactionRow {
        transaction_id,
        bill_sno: transaction.bill_sno.clone(),
        transaction_type: transaction_type_to_db(transaction.transaction_type),
        customer_id: transaction.customer_id.into(),
        transaction_at: transaction.transaction_at,
        bill_date: transaction.bill_date,
        currency: transaction.total_amount.currency().code().to_string(),
        total_amount: transaction.total_amount.amount(),
        unpaid_amount: transaction.unpaid_amount.map(|m| m.amount()),
        payment_reference: transaction.payment_reference.clone(),
        notes: transaction.notes.clone(),
        balance_effect: transaction.balance_effect.amount(),
        due_effect_domestic_11_8kg: transaction.due_effect.domestic_11_8kg,
        due_effect_standard_15kg: transaction.due_effect.standard_15kg,
        due_effect_commercial_45_4kg: transaction.due_effect.commercial_45_4kg,
        created_by: transaction.created_by.as_str().to_string(),
        created_at: transaction.created_at,
        voided_by: transaction.void.as_ref().map(|v| v.voided_by.as_str().to_string()),
        voided_at: transaction.void.as_ref().map(|v| v.voided_at),
        void_reason: transaction.void.as_ref().map(|v| v.reason.clone()),
    };

    let items = transaction
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| item_to_row(transaction_id, index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((header, items))
}

fn item_to_row(
    transaction_id: Uuid,
    index: usize,
    item: &TransactionItem,
) -> Result<TransactionItemRow, DatabaseError> {
    let product_id = match &item.kind {
        ItemKind::Accessory { product_id, .. } => product_id.map(Uuid::from),
        _ => None,
    };
    let kind = serde_json::to_value(&item.kind).map_err(|e| DatabaseError::corrupt(e.to_string()))?;
    Ok(TransactionItemRow {
        item_id: item.id.into(),
        transaction_id,
        line_no: i32::try_from(index + 1).map_err(|_| DatabaseError::corrupt("too many lines"))?,
        item_category: item.kind.category().as_str().to_string(),
        cylinder_type: item.kind.cylinder_type().map(cylinder_type_to_db),
        product_id,
        kind: Json(kind),
        quantity: i32::try_from(item.quantity)
            .map_err(|_| DatabaseError::ConstraintViolation("quantity out of range".into()))?,
        price_per_item: item.price_per_item.amount(),
        total_price: item.total_price.amount(),
    })
}

pub(crate) fn rows_to_transaction(
    row: TransactionRow,
    items: Vec<TransactionItemRow>,
) -> Result<LedgerTransaction, DatabaseError> {
    let currency = currency(&row.currency)?;
    let items = items
        .into_iter()
        .map(|item| {
            let kind: ItemKind = serde_json::from_value(item.kind.0)
                .map_err(|e| DatabaseError::corrupt(format!("item {}: {}", item.item_id, e)))?;
            Ok(TransactionItem {
                id: TransactionItemId::from_uuid(item.item_id),
                kind,
                quantity: to_u32(item.quantity, "quantity")?,
                price_per_item: Money::new(item.price_per_item, currency),
                total_price: Money::new(item.total_price, currency),
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    Ok(LedgerTransaction {
        id: TransactionId::from_uuid(row.transaction_id),
        bill_sno: row.bill_sno,
        transaction_type: db_to_transaction_type(row.transaction_type),
        customer_id: CustomerId::from_uuid(row.customer_id),
        transaction_at: row.transaction_at,
        bill_date: row.bill_date,
        total_amount: Money::new(row.total_amount, currency),
        unpaid_amount: row.unpaid_amount.map(|a| Money::new(a, currency)),
        payment_reference: row.payment_reference,
        notes: row.notes,
        balance_effect: Money::new(row.balance_effect, currency),
        due_effect: DueDelta {
            domestic_11_8kg: row.due_effect_domestic_11_8kg,
            standard_15kg: row.due_effect_standard_15kg,
            commercial_45_4kg: row.due_effect_commercial_45_4kg,
        },
        created_by: ActorId::new(row.created_by),
        created_at: row.created_at,
        void: void_record(row.voided_by, row.voided_at, row.void_reason),
        items,
    })
}

// ---- cylinders ----

fn holder_columns(holder: Option<CylinderHolder>) -> (Option<Uuid>, Option<Uuid>) {
    match holder {
        Some(CylinderHolder::B2b(id)) => (Some(id.into()), None),
        Some(CylinderHolder::B2c(id)) => (None, Some(id.into())),
        None => (None, None),
    }
}

fn source_columns(source: Option<TransactionRef>) -> (Option<Uuid>, Option<Uuid>) {
    match source {
        Some(TransactionRef::B2b(id)) => (Some(id.into()), None),
        Some(TransactionRef::B2c(id)) => (None, Some(id.into())),
        None => (None, None),
    }
}

pub(crate) fn cylinder_to_row(cylinder: &Cylinder) -> CylinderRow {
    let (holder_customer_id, holder_retail_customer_id) = holder_columns(cylinder.holder);
    let (source_transaction_id, source_retail_transaction_id) =
        source_columns(cylinder.source_transaction);
    CylinderRow {
        cylinder_id: cylinder.id.into(),
        code: cylinder.code.clone(),
        cylinder_type: cylinder_type_to_db(cylinder.cylinder_type),
        capacity_kg: cylinder.capacity_kg,
        status: cylinder_status_to_db(cylinder.status),
        location: cylinder.location.to_string(),
        holder_customer_id,
        holder_retail_customer_id,
        source_transaction_id,
        source_retail_transaction_id,
        created_at: cylinder.created_at,
        updated_at: cylinder.updated_at,
    }
}

pub(crate) fn row_to_cylinder(row: CylinderRow) -> Result<Cylinder, DatabaseError> {
    let holder = match (row.holder_customer_id, row.holder_retail_customer_id) {
        (Some(id), None) => Some(CylinderHolder::B2b(CustomerId::from_uuid(id))),
        (None, Some(id)) => Some(CylinderHolder::B2c(RetailCustomerId::from_uuid(id))),
        (None, None) => None,
        (Some(_), Some(_)) => {
            return Err(DatabaseError::corrupt(format!("cylinder {} has two holders", row.code)))
        }
    };
    let source_transaction = match (row.source_transaction_id, row.source_retail_transaction_id) {
        (Some(id), None) => Some(TransactionRef::B2b(TransactionId::from_uuid(id))),
        (None, Some(id)) => Some(TransactionRef::B2c(RetailTransactionId::from_uuid(id))),
        (None, None) => None,
        (Some(_), Some(_)) => {
            return Err(DatabaseError::corrupt(format!("cylinder {} has two sources", row.code)))
        }
    };
    Ok(Cylinder {
        id: CylinderId::from_uuid(row.cylinder_id),
        code: row.code,
        cylinder_type: db_to_cylinder_type(row.cylinder_type),
        capacity_kg: row.capacity_kg,
        status: db_to_cylinder_status(row.status),
        location: CylinderLocation::parse(&row.location),
        holder,
        source_transaction,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub(crate) fn query_to_filter(query: &CylinderQuery) -> CylinderFilter {
    let (holder_customer_id, holder_retail_customer_id) = holder_columns(query.holder);
    let (source_transaction_id, source_retail_transaction_id) =
        source_columns(query.source_transaction);
    CylinderFilter {
        cylinder_type: query.cylinder_type.map(cylinder_type_to_db),
        status: query.status.map(cylinder_status_to_db),
        holder_customer_id,
        holder_retail_customer_id,
        locations: query.locations.iter().map(ToString::to_string).collect(),
        source_transaction_id,
        source_retail_transaction_id,
        limit: query.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)),
    }
}

pub(crate) fn move_to_placement(movement: &CylinderMove) -> CylinderPlacement {
    let (holder_customer_id, holder_retail_customer_id) = holder_columns(movement.holder);
    let (source_transaction_id, source_retail_transaction_id) =
        source_columns(movement.source_transaction);
    CylinderPlacement {
        status: cylinder_status_to_db(movement.status),
        location: movement.location.to_string(),
        holder_customer_id,
        holder_retail_customer_id,
        source_transaction_id,
        source_retail_transaction_id,
    }
}

// ---- stock ----

pub(crate) fn product_to_row(product: &Product) -> ProductRow {
    ProductRow {
        product_id: product.id.into(),
        name: product.name.clone(),
        category: product.category.clone(),
        currency: product.unit_price.currency().code().to_string(),
        stock_quantity: product.stock_quantity,
        unit_price: product.unit_price.amount(),
        cost_price: product.cost_price.amount(),
        updated_at: product.updated_at,
    }
}

pub(crate) fn row_to_product(row: ProductRow) -> Result<Product, DatabaseError> {
    let currency = currency(&row.currency)?;
    Ok(Product {
        id: ProductId::from_uuid(row.product_id),
        name: row.name,
        category: row.category,
        stock_quantity: row.stock_quantity,
        unit_price: Money::new(row.unit_price, currency),
        cost_price: Money::new(row.cost_price, currency),
        updated_at: row.updated_at,
    })
}

pub(crate) fn custom_item_to_row(item: &CustomItem) -> CustomItemRow {
    CustomItemRow {
        custom_item_id: item.id.into(),
        name: item.name.clone(),
        item_type: item.item_type.clone(),
        currency: item.cost_price.currency().code().to_string(),
        quantity: item.quantity,
        cost_price: item.cost_price.amount(),
        updated_at: item.updated_at,
    }
}

pub(crate) fn row_to_custom_item(row: CustomItemRow) -> Result<CustomItem, DatabaseError> {
    let currency = currency(&row.currency)?;
    Ok(CustomItem {
        id: CustomItemId::from_uuid(row.custom_item_id),
        name: row.name,
        item_type: row.item_type,
        quantity: row.quantity,
        cost_price: Money::new(row.cost_price, currency),
        updated_at: row.updated_at,
    })
}

fn stock_source_columns(source: StockSource) -> (String, Option<Uuid>) {
    match source {
        StockSource::CustomItem(id) => ("custom_item".to_string(), Some(id.into())),
        StockSource::Product(id) => ("product".to_string(), Some(id.into())),
        StockSource::Untracked => ("untracked".to_string(), None),
    }
}

fn stock_source_from_columns(table: &str, id: Option<Uuid>) -> Result<StockSource, DatabaseError> {
    match (table, id) {
        ("custom_item", Some(id)) => Ok(StockSource::CustomItem(CustomItemId::from_uuid(id))),
        ("product", Some(id)) => Ok(StockSource::Product(ProductId::from_uuid(id))),
        ("untracked", _) => Ok(StockSource::Untracked),
        (other, _) => Err(DatabaseError::corrupt(format!("unknown stock source '{}'", other))),
    }
}

// ---- B2C ----

pub(crate) fn retail_customer_to_row(customer: &RetailCustomer) -> RetailCustomerRow {
    RetailCustomerRow {
        retail_customer_id: customer.id.into(),
        name: customer.name.clone(),
        phone: customer.phone.clone(),
        address: customer.address.clone(),
        currency: customer.total_profit.currency().code().to_string(),
        total_profit: customer.total_profit.amount(),
        created_at: customer.created_at,
        updated_at: customer.updated_at,
    }
}

pub(crate) fn row_to_retail_customer(row: RetailCustomerRow) -> Result<RetailCustomer, DatabaseError> {
    let currency = currency(&row.currency)?;
    Ok(RetailCustomer {
        id: RetailCustomerId::from_uuid(row.retail_customer_id),
        name: row.name,
        phone: row.phone,
        address: row.address,
        total_profit: Money::new(row.total_profit, currency),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn line_no(index: usize) -> Result<i32, DatabaseError> {
    i32::try_from(index + 1).map_err(|_| DatabaseError::corrupt("too many lines"))
}

fn quantity(value: u32) -> Result<i32, DatabaseError> {
    i32::try_from(value).map_err(|_| DatabaseError::ConstraintViolation("quantity out of range".into()))
}

pub(crate) fn retail_transaction_to_record(
    transaction: &RetailTransaction,
) -> Result<RetailTransactionRecord, DatabaseError> {
    let id: Uuid = transaction.id.into();
    let header = RetailTransactionRow {
        retail_transaction_id: id,
        bill_sno: transaction.bill_sno.clone(),
        transaction_type: transaction_type_to_db(transaction.transaction_type),
        retail_customer_id: transaction.customer_id.into(),
        transaction_at: transaction.transaction_at,
        bill_date: transaction.bill_date,
        currency: transaction.final_amount.currency().code().to_string(),
        total_amount: transaction.total_amount.amount(),
        delivery_charges: transaction.delivery_charges.amount(),
        final_amount: transaction.final_amount.amount(),
        actual_profit: transaction.actual_profit.amount(),
        payment_method: payment_method_to_db(transaction.payment_method),
        notes: transaction.notes.clone(),
        created_by: transaction.created_by.as_str().to_string(),
        created_at: transaction.created_at,
        voided_by: transaction.void.as_ref().map(|v| v.voided_by.as_str().to_string()),
        voided_at: transaction.void.as_ref().map(|v| v.voided_at),
        void_reason: transaction.void.as_ref().map(|v| v.reason.clone()),
    };

    let gas_items = transaction
        .gas_items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            Ok(RetailGasItemRow {
                item_id: item.id.into(),
                retail_transaction_id: id,
                line_no: line_no(index)?,
                cylinder_type: cylinder_type_to_db(item.cylinder_type),
                quantity: quantity(item.quantity)?,
                price_per_item: item.price_per_item.amount(),
                cost_per_item: item.cost_per_item.amount(),
                total_price: item.total_price.amount(),
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    let security_items = transaction
        .security_items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let deduction_per_item = match item.direction {
                SecurityDirection::Deposit => None,
                SecurityDirection::Return { deduction_per_item } => Some(deduction_per_item.amount()),
            };
            Ok(RetailSecurityItemRow {
                item_id: item.id.into(),
                retail_transaction_id: id,
                line_no: line_no(index)?,
                cylinder_type: cylinder_type_to_db(item.cylinder_type),
                quantity: quantity(item.quantity)?,
                price_per_item: item.price_per_item.amount(),
                is_return: item.is_return(),
                deduction_per_item,
                total_price: item.total_price.amount(),
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    let accessory_items = transaction
        .accessory_items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let (stock_table, stock_id) = stock_source_columns(item.stock_source);
            Ok(RetailAccessoryItemRow {
                item_id: item.id.into(),
                retail_transaction_id: id,
                line_no: line_no(index)?,
                name: item.name.clone(),
                item_type: item.item_type.clone(),
                quantity: quantity(item.quantity)?,
                price_per_item: item.price_per_item.amount(),
                cost_per_item: item.cost_per_item.amount(),
                total_price: item.total_price.amount(),
                stock_table,
                stock_id,
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    Ok(RetailTransactionRecord {
        header,
        gas_items,
        security_items,
        accessory_items,
    })
}

pub(crate) fn record_to_retail_transaction(
    record: RetailTransactionRecord,
) -> Result<RetailTransaction, DatabaseError> {
    let RetailTransactionRecord {
        header,
        gas_items,
        security_items,
        accessory_items,
    } = record;
    let currency = currency(&header.currency)?;
    let money = |amount| Money::new(amount, currency);

    let gas_items = gas_items
        .into_iter()
        .map(|row| {
            Ok(GasItem {
                id: RetailItemId::from_uuid(row.item_id),
                cylinder_type: db_to_cylinder_type(row.cylinder_type),
                quantity: to_u32(row.quantity, "quantity")?,
                price_per_item: money(row.price_per_item),
                cost_per_item: money(row.cost_per_item),
                total_price: money(row.total_price),
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    let security_items = security_items
        .into_iter()
        .map(|row| {
            let direction = match (row.is_return, row.deduction_per_item) {
                (false, _) => SecurityDirection::Deposit,
                (true, deduction) => SecurityDirection::Return {
                    deduction_per_item: money(deduction.unwrap_or_default()),
                },
            };
            Ok(SecurityItem {
                id: RetailItemId::from_uuid(row.item_id),
                cylinder_type: db_to_cylinder_type(row.cylinder_type),
                quantity: to_u32(row.quantity, "quantity")?,
                price_per_item: money(row.price_per_item),
                direction,
                total_price: money(row.total_price),
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    let accessory_items = accessory_items
        .into_iter()
        .map(|row| {
            Ok(AccessoryItem {
                id: RetailItemId::from_uuid(row.item_id),
                stock_source: stock_source_from_columns(&row.stock_table, row.stock_id)?,
                name: row.name,
                item_type: row.item_type,
                quantity: to_u32(row.quantity, "quantity")?,
                price_per_item: money(row.price_per_item),
                cost_per_item: money(row.cost_per_item),
                total_price: money(row.total_price),
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    Ok(RetailTransaction {
        id: RetailTransactionId::from_uuid(header.retail_transaction_id),
        bill_sno: header.bill_sno,
        transaction_type: db_to_transaction_type(header.transaction_type),
        customer_id: RetailCustomerId::from_uuid(header.retail_customer_id),
        transaction_at: header.transaction_at,
        bill_date: header.bill_date,
        gas_items,
        security_items,
        accessory_items,
        total_amount: money(header.total_amount),
        delivery_charges: money(header.delivery_charges),
        final_amount: money(header.final_amount),
        actual_profit: money(header.actual_profit),
        payment_method: db_to_payment_method(header.payment_method),
        notes: header.notes,
        created_by: ActorId::new(header.created_by),
        created_at: header.created_at,
        void: void_record(header.voided_by, header.voided_at, header.void_reason),
    })
}

pub(crate) fn holding_to_row(holding: &CylinderHolding) -> Result<HoldingRow, DatabaseError> {
    Ok(HoldingRow {
        holding_id: holding.id.into(),
        retail_customer_id: holding.customer_id.into(),
        cylinder_type: cylinder_type_to_db(holding.cylinder_type),
        quantity: quantity(holding.quantity)?,
        security_amount: holding.security_amount.amount(),
        issue_date: holding.issue_date,
        is_returned: holding.is_returned,
        return_date: holding.return_date,
        return_deduction: holding.return_deduction.map(|m| m.amount()),
        issued_by_transaction: holding.issued_by_transaction.into(),
        returned_by_transaction: holding.returned_by_transaction.map(Uuid::from),
    })
}

/// Holdings carry no currency column; they use the ledger currency
pub(crate) fn row_to_holding(row: HoldingRow, currency: Currency) -> Result<CylinderHolding, DatabaseError> {
    Ok(CylinderHolding {
        id: HoldingId::from_uuid(row.holding_id),
        customer_id: RetailCustomerId::from_uuid(row.retail_customer_id),
        cylinder_type: db_to_cylinder_type(row.cylinder_type),
        quantity: to_u32(row.quantity, "quantity")?,
        security_amount: Money::new(row.security_amount, currency),
        issue_date: row.issue_date,
        is_returned: row.is_returned,
        return_date: row.return_date,
        return_deduction: row.return_deduction.map(|a| Money::new(a, currency)),
        issued_by_transaction: RetailTransactionId::from_uuid(row.issued_by_transaction),
        returned_by_transaction: row.returned_by_transaction.map(RetailTransactionId::from_uuid),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn pkr(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::PKR)
    }

    #[test]
    fn test_cylinder_type_conversion_roundtrip() {
        for cylinder_type in CylinderType::ALL {
            assert_eq!(db_to_cylinder_type(cylinder_type_to_db(cylinder_type)), cylinder_type);
        }
    }

    #[test]
    fn test_transaction_type_conversion_roundtrip() {
        let types = [
            TransactionType::Sale,
            TransactionType::Payment,
            TransactionType::Buyback,
            TransactionType::ReturnEmpty,
            TransactionType::Adjustment,
            TransactionType::CreditNote,
        ];
        for t in types {
            assert_eq!(db_to_transaction_type(transaction_type_to_db(t)), t);
        }
    }

    #[test]
    fn test_customer_row_rejects_negative_dues() {
        let now = Utc::now();
        let row = CustomerRow {
            customer_id: Uuid::new_v4(),
            name: "Al-Noor Restaurant".to_string(),
            contact_person: None,
            phone: None,
            email: None,
            address: None,
            currency: "PKR".to_string(),
            credit_limit: dec!(0),
            payment_terms_days: 30,
            ledger_balance: dec!(0),
            due_domestic_11_8kg: -1,
            due_standard_15kg: 0,
            due_commercial_45_4kg: 0,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(row_to_customer(row), Err(DatabaseError::CorruptRow(_))));
    }

    #[test]
    fn test_transaction_rows_keep_item_payload() {
        let now = Utc::now();
        let transaction = LedgerTransaction {
            id: TransactionId::new_v7(),
            bill_sno: "BILL-202403010001".to_string(),
            transaction_type: TransactionType::Sale,
            customer_id: CustomerId::new(),
            transaction_at: now,
            bill_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            total_amount: pkr(dec!(11500)),
            unpaid_amount: None,
            payment_reference: None,
            notes: None,
            balance_effect: pkr(dec!(11500)),
            due_effect: DueDelta { domestic_11_8kg: 2, ..DueDelta::default() },
            created_by: ActorId::system(),
            created_at: now,
            void: None,
            items: vec![
                TransactionItem {
                    id: TransactionItemId::new(),
                    kind: ItemKind::Cylinder { cylinder_type: CylinderType::Domestic11_8Kg },
                    quantity: 2,
                    price_per_item: pkr(dec!(5000)),
                    total_price: pkr(dec!(10000)),
                },
                TransactionItem {
                    id: TransactionItemId::new(),
                    kind: ItemKind::Accessory {
                        product_id: Some(ProductId::new()),
                        name: "Regulator".to_string(),
                    },
                    quantity: 1,
                    price_per_item: pkr(dec!(1500)),
                    total_price: pkr(dec!(1500)),
                },
            ],
        };

        let (header, items) = transaction_to_rows(&transaction).unwrap();
        assert_eq!(items[0].line_no, 1);
        assert_eq!(items[0].item_category, "cylinder");
        assert_eq!(items[1].cylinder_type, None);
        assert!(items[1].product_id.is_some());

        let restored = rows_to_transaction(header, items).unwrap();
        assert_eq!(restored, transaction);
    }

    #[test]
    fn test_cylinder_with_two_holders_is_corrupt() {
        let now = Utc::now();
        let row = CylinderRow {
            cylinder_id: Uuid::new_v4(),
            code: "CYL-0001".to_string(),
            cylinder_type: DbCylinderType::Standard15Kg,
            capacity_kg: dec!(15),
            status: DbCylinderStatus::WithCustomer,
            location: "Customer: Ahmed".to_string(),
            holder_customer_id: Some(Uuid::new_v4()),
            holder_retail_customer_id: Some(Uuid::new_v4()),
            source_transaction_id: None,
            source_retail_transaction_id: None,
            created_at: now,
            updated_at: now,
        };
        assert!(row_to_cylinder(row).is_err());
    }

    #[test]
    fn test_stock_source_columns() {
        let id = CustomItemId::new();
        let (table, stored) = stock_source_columns(StockSource::CustomItem(id));
        assert_eq!(table, "custom_item");
        assert_eq!(stock_source_from_columns(&table, stored).unwrap(), StockSource::CustomItem(id));
        assert_eq!(stock_source_from_columns("untracked", None).unwrap(), StockSource::Untracked);
        assert!(stock_source_from_columns("warehouse", None).is_err());
    }
}
