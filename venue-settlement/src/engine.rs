//! Main settlement engine
//!
//! Front door for deposits and withdrawals. Validates requests, maps
//! asset classes onto their debit and dedup flows, and drives the vault
//! state machine through the ledger's actor pool so every move is atomic
//! with the balances it touches.

use crate::{
    config::SettlementConfig,
    flows::{dedup_asset, withdrawal_debits},
    gateway::BlockchainGateway,
    Error, Result,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use venue_ledger::{
    to_standard, AccountId, Asset, AssetClass, AssetRegistry, LedgerHandle, Market, VaultStatus,
    VaultTransaction,
};

/// Settlement engine
pub struct SettlementEngine {
    market: Arc<Market>,
    handle: LedgerHandle,
    registry: Arc<dyn AssetRegistry>,
    gateway: Arc<dyn BlockchainGateway>,
    config: SettlementConfig,
}

impl SettlementEngine {
    /// Create an engine over an open market
    pub fn new(
        market: Arc<Market>,
        gateway: Arc<dyn BlockchainGateway>,
        config: SettlementConfig,
    ) -> Self {
        let handle = market.handle();
        let registry = Arc::clone(market.registry());
        Self {
            market,
            handle,
            registry,
            gateway,
            config,
        }
    }

    fn classify(&self, symbol: &str) -> Result<(Asset, AssetClass)> {
        let asset = Asset::new(symbol);
        let class = self
            .registry
            .class_of(&asset)
            .ok_or_else(|| venue_ledger::Error::InvalidAsset(symbol.to_string()))?;
        Ok((asset, class))
    }

    fn parse_txid(txid: &str) -> Result<String> {
        let txid = txid.trim();
        if txid.is_empty() {
            return Err(Error::InvalidTxId("empty".to_string()));
        }
        Ok(txid.to_string())
    }

    fn positive(amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(venue_ledger::Error::InvalidNumber("amount".to_string()).into());
        }
        Ok(to_standard(amount))
    }

    /// Record a deposit intent for an external chain transaction
    ///
    /// The txid is checked against prior rows in the class's dedup scope;
    /// a repeat fails with a message naming the prior row's status. The
    /// row stays Pending until a confirmation collaborator resolves it.
    pub async fn deposit_asset(&self, account: &str, asset: &str, txid: &str) -> Result<String> {
        let account = AccountId::parse(account).map_err(Error::Ledger)?;
        let txid = Self::parse_txid(txid)?;
        let (asset, class) = self.classify(asset)?;

        let vault = self
            .handle
            .deposit_intent(account, class, dedup_asset(class, &asset), txid)
            .await?;
        self.market.metrics().deposits_recorded.inc();

        tracing::info!(vault_id = %vault.id, class = class.tag(), "Deposit intent accepted");
        Ok("Deposit request in process".to_string())
    }

    /// Debit the account and record a withdrawal intent
    ///
    /// The debit plan depends on the asset class; all debits settle
    /// atomically with the vault row. The gateway hand-off happens after
    /// the commit and is never awaited for confirmation.
    pub async fn withdraw_asset(&self, account: &str, asset: &str, amount: Decimal) -> Result<String> {
        let account = AccountId::parse(account).map_err(Error::Ledger)?;
        let amount = Self::positive(amount)?;
        let (asset, class) = self.classify(asset)?;

        let debits = withdrawal_debits(class, &asset, amount, self.registry.as_ref(), &self.config);
        let vault = self
            .handle
            .withdraw(account, debits, class, asset.clone(), amount)
            .await?;
        self.market.metrics().withdrawals_recorded.inc();

        self.gateway
            .initiate_withdrawal(&vault.account, &asset, amount)
            .await;

        tracing::info!(vault_id = %vault.id, asset = %asset, amount = %amount, "Withdrawal accepted");
        Ok("Withdrawal request is in process".to_string())
    }

    /// Confirm a pending deposit: credit the ledger and close the row
    ///
    /// The credited asset and amount come from on-chain verification, not
    /// from the original request; token deposit rows learn their symbol
    /// here.
    pub async fn confirm_deposit(
        &self,
        account: &str,
        vault_id: Uuid,
        asset: &str,
        amount: Decimal,
    ) -> Result<VaultTransaction> {
        let account = AccountId::parse(account).map_err(Error::Ledger)?;
        let amount = Self::positive(amount)?;
        let (asset, _) = self.classify(asset)?;

        let vault = self
            .handle
            .resolve_vault(&account, vault_id, VaultStatus::Success, Some((asset, amount)))
            .await?;
        self.market.metrics().vault_resolutions.inc();
        Ok(vault)
    }

    /// Mark a pending withdrawal as sent on chain
    pub async fn complete_withdrawal(&self, account: &str, vault_id: Uuid) -> Result<VaultTransaction> {
        let account = AccountId::parse(account).map_err(Error::Ledger)?;
        let vault = self
            .handle
            .resolve_vault(&account, vault_id, VaultStatus::Success, None)
            .await?;
        self.market.metrics().vault_resolutions.inc();
        Ok(vault)
    }

    /// Reject a pending vault row
    ///
    /// Rejected deposits credit nothing and their txid stays burned. A
    /// rejected withdrawal's debits are reconciled externally.
    pub async fn reject_vault(&self, account: &str, vault_id: Uuid) -> Result<VaultTransaction> {
        let account = AccountId::parse(account).map_err(Error::Ledger)?;
        let vault = self
            .handle
            .resolve_vault(&account, vault_id, VaultStatus::Rejected, None)
            .await?;
        self.market.metrics().vault_resolutions.inc();
        Ok(vault)
    }

    /// All deposit/withdrawal rows for an account
    pub async fn user_vault_transactions(&self, account: &str) -> Result<Vec<VaultTransaction>> {
        Ok(self.market.user_vault_transactions(account).await?)
    }
}
