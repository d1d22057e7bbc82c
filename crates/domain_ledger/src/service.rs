//! Ledger service
//!
//! Facade over the recorder, reverser and projection used by the API layer.

use std::sync::Arc;

use tracing::{instrument, warn};

use core_kernel::{ActorId, CustomerId, HealthCheckResult, RetailTransactionId, TransactionId};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ports::LedgerStore;
use crate::projection::{project, Reconciliation};
use crate::recorder::TransactionRecorder;
use crate::retail::model::{RecordRetailTransaction, RetailTransaction};
use crate::retail::{RetailRecorder, RetailReverser};
use crate::reverser::{ReversalOutcome, TransactionReverser};
use crate::transaction::{LedgerTransaction, RecordTransaction};

pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    config: Arc<LedgerConfig>,
    recorder: TransactionRecorder,
    reverser: TransactionReverser,
    retail_recorder: RetailRecorder,
    retail_reverser: RetailReverser,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        let config = Arc::new(config);
        Self {
            recorder: TransactionRecorder::new(store.clone(), config.clone()),
            reverser: TransactionReverser::new(store.clone(), config.clone()),
            retail_recorder: RetailRecorder::new(store.clone(), config.clone()),
            retail_reverser: RetailReverser::new(store.clone(), config.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Records a B2B transaction
    pub async fn record(
        &self,
        request: RecordTransaction,
        actor: &ActorId,
    ) -> Result<LedgerTransaction, LedgerError> {
        self.recorder.record(request, actor).await
    }

    /// Voids a B2B transaction
    pub async fn reverse(
        &self,
        transaction_id: TransactionId,
        reason: Option<String>,
        actor: &ActorId,
    ) -> Result<ReversalOutcome<LedgerTransaction>, LedgerError> {
        self.reverser.reverse(transaction_id, reason, actor).await
    }

    pub async fn record_retail(
        &self,
        request: RecordRetailTransaction,
        actor: &ActorId,
    ) -> Result<RetailTransaction, LedgerError> {
        self.retail_recorder.record(request, actor).await
    }

    pub async fn reverse_retail(
        &self,
        transaction_id: RetailTransactionId,
        reason: Option<String>,
        actor: &ActorId,
    ) -> Result<ReversalOutcome<RetailTransaction>, LedgerError> {
        self.retail_reverser.reverse(transaction_id, reason, actor).await
    }

    /// A customer's full transaction history, voided entries included
    #[instrument(skip(self))]
    pub async fn customer_ledger(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let mut uow = self.store.begin().await?;
        uow.lock_customer(customer_id).await?;
        Ok(uow.customer_transactions(customer_id).await?)
    }

    /// Compares the cached balance and dues with a replay of the history
    #[instrument(skip(self))]
    pub async fn reconcile_customer(&self, customer_id: CustomerId) -> Result<Reconciliation, LedgerError> {
        let mut uow = self.store.begin().await?;
        let customer = uow.lock_customer(customer_id).await?;
        let transactions = uow.customer_transactions(customer_id).await?;
        let projected = project(customer_id, self.config.currency, &transactions)?;
        let reconciliation = Reconciliation::compare(&customer, projected);
        if !reconciliation.is_consistent {
            warn!(
                customer = %customer.name,
                cached_balance = %reconciliation.cached_balance,
                projected_balance = %reconciliation.projected.balance,
                "Cached ledger differs from replayed history"
            );
        }
        Ok(reconciliation)
    }

    pub async fn health_check(&self) -> HealthCheckResult {
        self.store.health_check().await
    }
}
