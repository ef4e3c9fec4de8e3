//! Single-writer ledger actors
//!
//! All balance-affecting operations run on a pool of actor tasks. An
//! account hashes onto exactly one partition, so every check-then-write on
//! its balances is serialized with no locks around storage. Withdrawals
//! that debit two assets of one account stay on one partition and remain
//! atomic.
//!
//! Validation of request shape (address format, asset existence, numeric
//! ranges) happens before a command is sent; actors only enforce state
//! rules against the ledger they own.

use crate::{
    config::ActorConfig,
    error::{Error, Result},
    storage::{DedupScope, Storage},
    types::{
        AccountId, Asset, AssetClass, Balance, Order, OrderSide, VaultMode, VaultStatus,
        VaultTransaction,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Commands processed by a ledger actor
pub enum LedgerCommand {
    /// Reserve funds and open an order
    PlaceOrder {
        /// Order side
        side: OrderSide,
        /// Order to open (already validated)
        order: Order,
        /// Response channel
        respond_to: oneshot::Sender<Result<Order>>,
    },
    /// Close an order and release its reservation
    CancelOrder {
        /// Order side
        side: OrderSide,
        /// Order id
        order_id: Uuid,
        /// Requesting account (must own the order)
        account: AccountId,
        /// Response channel
        respond_to: oneshot::Sender<Result<Order>>,
    },
    /// Balance view for one (account, asset) pair
    BalanceOf {
        /// Account
        account: AccountId,
        /// Asset
        asset: Asset,
        /// Response channel
        respond_to: oneshot::Sender<Result<Balance>>,
    },
    /// Add to a ledger entry outside the settlement flow
    Credit {
        /// Account
        account: AccountId,
        /// Asset
        asset: Asset,
        /// Amount to add
        amount: Decimal,
        /// Response channel, carries the new total
        respond_to: oneshot::Sender<Result<Decimal>>,
    },
    /// Record a deposit intent if its external txid is unseen
    DepositIntent {
        /// Account
        account: AccountId,
        /// Asset class of the deposit
        asset_class: AssetClass,
        /// Asset symbol; `None` for token deposits (resolved at
        /// confirmation time)
        asset: Option<Asset>,
        /// External chain transaction id
        txid: String,
        /// Response channel
        respond_to: oneshot::Sender<Result<VaultTransaction>>,
    },
    /// Debit balances and record a withdrawal intent
    Withdraw {
        /// Account
        account: AccountId,
        /// Debits to apply, each checked against the net balance
        debits: Vec<(Asset, Decimal)>,
        /// Asset class recorded on the vault row
        asset_class: AssetClass,
        /// Asset the user asked to withdraw
        asset: Asset,
        /// Amount the user asked to withdraw
        amount: Decimal,
        /// Response channel
        respond_to: oneshot::Sender<Result<VaultTransaction>>,
    },
    /// Move a pending vault row to a terminal status
    ResolveVault {
        /// Vault row id
        vault_id: Uuid,
        /// Terminal status to apply
        outcome: VaultStatus,
        /// Ledger credit for confirmed deposits: (asset, amount)
        credit: Option<(Asset, Decimal)>,
        /// Response channel
        respond_to: oneshot::Sender<Result<VaultTransaction>>,
    },
    /// Stop the actor
    Shutdown,
}

struct LedgerActor {
    partition: usize,
    storage: Arc<Storage>,
    currency: Asset,
    receiver: mpsc::Receiver<LedgerCommand>,
}

impl LedgerActor {
    async fn run(mut self) {
        tracing::info!(partition = self.partition, "Ledger actor started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                LedgerCommand::PlaceOrder { side, order, respond_to } => {
                    let _ = respond_to.send(self.place_order(side, order));
                }
                LedgerCommand::CancelOrder { side, order_id, account, respond_to } => {
                    let _ = respond_to.send(self.cancel_order(side, order_id, &account));
                }
                LedgerCommand::BalanceOf { account, asset, respond_to } => {
                    let _ = respond_to.send(self.balance_of(&account, &asset));
                }
                LedgerCommand::Credit { account, asset, amount, respond_to } => {
                    let _ = respond_to.send(self.storage.credit(&account, &asset, amount));
                }
                LedgerCommand::DepositIntent { account, asset_class, asset, txid, respond_to } => {
                    let _ = respond_to.send(self.deposit_intent(account, asset_class, asset, txid));
                }
                LedgerCommand::Withdraw { account, debits, asset_class, asset, amount, respond_to } => {
                    let _ =
                        respond_to.send(self.withdraw(account, debits, asset_class, asset, amount));
                }
                LedgerCommand::ResolveVault { vault_id, outcome, credit, respond_to } => {
                    let _ = respond_to.send(self.resolve_vault(vault_id, outcome, credit));
                }
                LedgerCommand::Shutdown => {
                    tracing::info!(partition = self.partition, "Ledger actor shutting down");
                    break;
                }
            }
        }
    }

    /// Balance view: total from the ledger row, locked summed from the
    /// reservations of all open orders on both sides
    fn balance_of(&self, account: &AccountId, asset: &Asset) -> Result<Balance> {
        let total = self.storage.get_quantity(account, asset)?;

        let mut locked = Decimal::ZERO;
        for side in [OrderSide::Sell, OrderSide::Buy] {
            for order in self.storage.list_orders(side, account)? {
                let (reserved_asset, reserved_amount) = order.reservation(side, &self.currency)?;
                if &reserved_asset == asset {
                    locked += reserved_amount;
                }
            }
        }

        Ok(Balance::new(total, locked))
    }

    /// Reject unless the net balance covers `amount`, distinguishing
    /// "not enough at all" from "enough, but locked in orders"
    fn ensure_available(&self, account: &AccountId, asset: &Asset, amount: Decimal) -> Result<Balance> {
        let balance = self.balance_of(account, asset)?;
        if balance.total < amount {
            return Err(Error::InsufficientBalance { asset: asset.clone() });
        }
        if balance.net < amount {
            return Err(Error::BalanceLocked { asset: asset.clone() });
        }
        Ok(balance)
    }

    fn place_order(&self, side: OrderSide, order: Order) -> Result<Order> {
        let (reserved_asset, reserved_amount) = order.reservation(side, &self.currency)?;
        self.ensure_available(&order.account, &reserved_asset, reserved_amount)?;
        self.storage.insert_order(side, &order)?;

        tracing::info!(
            order_id = %order.id,
            side = %side,
            account = %order.account,
            asset = %order.asset,
            reserved = %reserved_amount,
            "Order placed"
        );
        Ok(order)
    }

    fn cancel_order(&self, side: OrderSide, order_id: Uuid, account: &AccountId) -> Result<Order> {
        let order = self
            .storage
            .get_order(side, order_id)?
            .ok_or(Error::OrderNotFound(order_id))?;
        if &order.account != account {
            return Err(Error::NotOwner);
        }
        self.storage.delete_order(side, &order)?;

        tracing::info!(order_id = %order.id, side = %side, account = %account, "Order cancelled");
        Ok(order)
    }

    fn deposit_intent(
        &self,
        account: AccountId,
        asset_class: AssetClass,
        asset: Option<Asset>,
        txid: String,
    ) -> Result<VaultTransaction> {
        let dedup_key = match asset_class {
            AssetClass::Token => Storage::dedup_key(&txid, &account, DedupScope::Class(asset_class)),
            _ => {
                let asset = asset
                    .as_ref()
                    .ok_or_else(|| Error::InvalidAsset("missing symbol for coin deposit".to_string()))?;
                Storage::dedup_key(&txid, &account, DedupScope::Asset(asset))
            }
        };

        if let Some(existing) = self.storage.find_vault_by_dedup(&dedup_key)? {
            return Err(Error::DuplicateEntry(existing.status));
        }

        let vault = VaultTransaction {
            id: Uuid::now_v7(),
            account,
            mode: VaultMode::Deposit,
            asset_class,
            asset,
            external_txid: Some(txid),
            amount: None,
            status: VaultStatus::Pending,
            lock_time: Utc::now(),
        };
        self.storage.insert_vault(&vault, Some(&dedup_key))?;

        tracing::info!(
            vault_id = %vault.id,
            account = %vault.account,
            class = asset_class.tag(),
            "Deposit intent recorded"
        );
        Ok(vault)
    }

    fn withdraw(
        &self,
        account: AccountId,
        debits: Vec<(Asset, Decimal)>,
        asset_class: AssetClass,
        asset: Asset,
        amount: Decimal,
    ) -> Result<VaultTransaction> {
        // Check all debits before touching anything, then apply them in one
        // batch. Duplicate assets in the debit list are merged first so the
        // net check covers their sum.
        let mut merged: Vec<(Asset, Decimal)> = Vec::with_capacity(debits.len());
        for (debit_asset, debit_amount) in debits {
            if let Some(pos) = merged.iter().position(|(a, _)| *a == debit_asset) {
                merged[pos].1 += debit_amount;
            } else {
                merged.push((debit_asset, debit_amount));
            }
        }

        let mut updates = Vec::with_capacity(merged.len());
        for (debit_asset, debit_amount) in &merged {
            let balance = self.ensure_available(&account, debit_asset, *debit_amount)?;
            updates.push((debit_asset.clone(), balance.total - *debit_amount));
        }

        let vault = VaultTransaction {
            id: Uuid::now_v7(),
            account: account.clone(),
            mode: VaultMode::Withdraw,
            asset_class,
            asset: Some(asset),
            external_txid: None,
            amount: Some(amount),
            status: VaultStatus::Pending,
            lock_time: Utc::now(),
        };
        self.storage.withdraw(&account, &updates, &vault)?;

        tracing::info!(
            vault_id = %vault.id,
            account = %account,
            amount = %amount,
            "Withdrawal debited"
        );
        Ok(vault)
    }

    fn resolve_vault(
        &self,
        vault_id: Uuid,
        outcome: VaultStatus,
        credit: Option<(Asset, Decimal)>,
    ) -> Result<VaultTransaction> {
        if !outcome.is_terminal() {
            return Err(Error::Concurrency("Resolve outcome must be terminal".to_string()));
        }

        let mut vault = self
            .storage
            .get_vault(vault_id)?
            .ok_or(Error::VaultNotFound(vault_id))?;
        if vault.status.is_terminal() {
            return Err(Error::VaultFinalized(vault_id));
        }

        vault.status = outcome;
        let storage_credit = match (&vault.mode, outcome, credit) {
            (VaultMode::Deposit, VaultStatus::Success, Some((asset, amount))) => {
                let new_quantity = self.storage.get_quantity(&vault.account, &asset)? + amount;
                vault.asset = Some(asset.clone());
                vault.amount = Some(amount);
                Some((asset, new_quantity))
            }
            (VaultMode::Deposit, VaultStatus::Success, None) => {
                return Err(Error::InvalidNumber(
                    "confirmed deposit requires a credited amount".to_string(),
                ));
            }
            _ => None,
        };

        match &storage_credit {
            Some((asset, new_quantity)) => self.storage.resolve_vault(&vault, Some((asset, *new_quantity)))?,
            None => self.storage.resolve_vault(&vault, None)?,
        }

        tracing::info!(vault_id = %vault.id, status = ?vault.status, "Vault row resolved");
        Ok(vault)
    }
}

/// Handle for sending commands to the actor pool
///
/// Cheap to clone; all clones feed the same partitions.
#[derive(Clone)]
pub struct LedgerHandle {
    senders: Arc<Vec<mpsc::Sender<LedgerCommand>>>,
}

impl LedgerHandle {
    fn partition_for(&self, account: &AccountId) -> usize {
        let hash = blake3::hash(account.as_str().as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(bytes) % self.senders.len() as u64) as usize
    }

    async fn send_to(&self, partition: usize, command: LedgerCommand) -> Result<()> {
        self.senders[partition]
            .send(command)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))
    }

    async fn await_response<T>(receiver: oneshot::Receiver<Result<T>>) -> Result<T> {
        receiver
            .await
            .map_err(|_| Error::Concurrency("Actor dropped response channel".to_string()))?
    }

    /// Reserve funds and open an order
    pub async fn place_order(&self, side: OrderSide, order: Order) -> Result<Order> {
        let partition = self.partition_for(&order.account);
        let (respond_to, receiver) = oneshot::channel();
        self.send_to(partition, LedgerCommand::PlaceOrder { side, order, respond_to })
            .await?;
        Self::await_response(receiver).await
    }

    /// Close an order and release its reservation
    pub async fn cancel_order(
        &self,
        side: OrderSide,
        order_id: Uuid,
        account: AccountId,
    ) -> Result<Order> {
        let partition = self.partition_for(&account);
        let (respond_to, receiver) = oneshot::channel();
        self.send_to(partition, LedgerCommand::CancelOrder { side, order_id, account, respond_to })
            .await?;
        Self::await_response(receiver).await
    }

    /// Balance view for one (account, asset) pair
    pub async fn balance_of(&self, account: AccountId, asset: Asset) -> Result<Balance> {
        let partition = self.partition_for(&account);
        let (respond_to, receiver) = oneshot::channel();
        self.send_to(partition, LedgerCommand::BalanceOf { account, asset, respond_to })
            .await?;
        Self::await_response(receiver).await
    }

    /// Add to a ledger entry, serialized with the account's other
    /// operations; returns the new total
    pub async fn credit(&self, account: AccountId, asset: Asset, amount: Decimal) -> Result<Decimal> {
        let partition = self.partition_for(&account);
        let (respond_to, receiver) = oneshot::channel();
        self.send_to(partition, LedgerCommand::Credit { account, asset, amount, respond_to })
            .await?;
        Self::await_response(receiver).await
    }

    /// Record a deposit intent if its external txid is unseen
    pub async fn deposit_intent(
        &self,
        account: AccountId,
        asset_class: AssetClass,
        asset: Option<Asset>,
        txid: String,
    ) -> Result<VaultTransaction> {
        let partition = self.partition_for(&account);
        let (respond_to, receiver) = oneshot::channel();
        self.send_to(
            partition,
            LedgerCommand::DepositIntent { account, asset_class, asset, txid, respond_to },
        )
        .await?;
        Self::await_response(receiver).await
    }

    /// Debit balances and record a withdrawal intent
    pub async fn withdraw(
        &self,
        account: AccountId,
        debits: Vec<(Asset, Decimal)>,
        asset_class: AssetClass,
        asset: Asset,
        amount: Decimal,
    ) -> Result<VaultTransaction> {
        let partition = self.partition_for(&account);
        let (respond_to, receiver) = oneshot::channel();
        self.send_to(
            partition,
            LedgerCommand::Withdraw { account, debits, asset_class, asset, amount, respond_to },
        )
        .await?;
        Self::await_response(receiver).await
    }

    /// Move a pending vault row to a terminal status
    ///
    /// Routed through the row's own account so it serializes with that
    /// account's other operations.
    pub async fn resolve_vault(
        &self,
        account: &AccountId,
        vault_id: Uuid,
        outcome: VaultStatus,
        credit: Option<(Asset, Decimal)>,
    ) -> Result<VaultTransaction> {
        let partition = self.partition_for(account);
        let (respond_to, receiver) = oneshot::channel();
        self.send_to(partition, LedgerCommand::ResolveVault { vault_id, outcome, credit, respond_to })
            .await?;
        Self::await_response(receiver).await
    }

    /// Ask every partition to stop after draining its mailbox
    pub async fn shutdown(&self) {
        for sender in self.senders.iter() {
            let _ = sender.send(LedgerCommand::Shutdown).await;
        }
    }
}

/// Spawn the actor pool and return its handle
pub fn spawn_ledger_actors(
    storage: Arc<Storage>,
    currency: Asset,
    config: &ActorConfig,
) -> LedgerHandle {
    let partitions = config.partitions.max(1);
    let mut senders = Vec::with_capacity(partitions);

    for partition in 0..partitions {
        let (sender, receiver) = mpsc::channel(config.mailbox_capacity);
        let actor = LedgerActor {
            partition,
            storage: Arc::clone(&storage),
            currency: currency.clone(),
            receiver,
        };
        tokio::spawn(actor.run());
        senders.push(sender);
    }

    tracing::info!(partitions, "Ledger actor pool started");
    LedgerHandle { senders: Arc::new(senders) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn setup() -> (LedgerHandle, Arc<Storage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Arc::new(Storage::open(&config).unwrap());
        let handle = spawn_ledger_actors(
            Arc::clone(&storage),
            Asset::new(config.currency.clone()),
            &config.actors,
        );
        (handle, storage, temp_dir)
    }

    fn account(tag: char) -> AccountId {
        AccountId::parse(format!("F{}qv4QYmtxJc6nZbWeyKFAfKBsPVco", tag)).unwrap()
    }

    fn order(account: &AccountId, asset: &str, quantity: i64, price: i64) -> Order {
        Order {
            id: Uuid::now_v7(),
            account: account.clone(),
            asset: Asset::new(asset),
            quantity: Decimal::from(quantity),
            price: Decimal::from(price),
            placed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_sell_order_locks_the_traded_asset() {
        let (handle, storage, _temp) = setup();
        let acc = account('a');
        storage.credit(&acc, &Asset::new("VGLD"), Decimal::from(100)).unwrap();

        handle
            .place_order(OrderSide::Sell, order(&acc, "VGLD", 30, 5))
            .await
            .unwrap();

        let balance = handle.balance_of(acc.clone(), Asset::new("VGLD")).await.unwrap();
        assert_eq!(balance.total, Decimal::from(100));
        assert_eq!(balance.locked, Decimal::from(30));
        assert_eq!(balance.net, Decimal::from(70));
    }

    #[tokio::test]
    async fn test_buy_order_locks_currency_not_the_asset() {
        let (handle, storage, _temp) = setup();
        let acc = account('a');
        storage.credit(&acc, &Asset::new("VUSD"), Decimal::from(100)).unwrap();

        handle
            .place_order(OrderSide::Buy, order(&acc, "VGLD", 40, 2))
            .await
            .unwrap();

        let currency = handle.balance_of(acc.clone(), Asset::new("VUSD")).await.unwrap();
        assert_eq!(currency.locked, Decimal::from(80));
        assert_eq!(currency.net, Decimal::from(20));

        // The traded asset itself is untouched by a buy order
        let asset = handle.balance_of(acc.clone(), Asset::new("VGLD")).await.unwrap();
        assert_eq!(asset.locked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_placement_rejected_when_net_insufficient() {
        let (handle, storage, _temp) = setup();
        let acc = account('a');
        storage.credit(&acc, &Asset::new("VGLD"), Decimal::from(50)).unwrap();

        handle
            .place_order(OrderSide::Sell, order(&acc, "VGLD", 40, 1))
            .await
            .unwrap();

        // 10 net left; another 40 must fail with the locked variant
        let err = handle
            .place_order(OrderSide::Sell, order(&acc, "VGLD", 40, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE_LOCKED");

        // More than total fails with the plain variant
        let err = handle
            .place_order(OrderSide::Sell, order(&acc, "VGLD", 60, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");

        // Failed placements leave no rows behind
        assert_eq!(storage.list_orders(OrderSide::Sell, &acc).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_restores_net_balance() {
        let (handle, storage, _temp) = setup();
        let acc = account('a');
        storage.credit(&acc, &Asset::new("VGLD"), Decimal::from(50)).unwrap();

        let placed = handle
            .place_order(OrderSide::Sell, order(&acc, "VGLD", 30, 1))
            .await
            .unwrap();
        handle
            .cancel_order(OrderSide::Sell, placed.id, acc.clone())
            .await
            .unwrap();

        let balance = handle.balance_of(acc.clone(), Asset::new("VGLD")).await.unwrap();
        assert_eq!(balance.locked, Decimal::ZERO);
        assert_eq!(balance.net, Decimal::from(50));
    }

    #[tokio::test]
    async fn test_cancel_enforces_ownership() {
        let (handle, storage, _temp) = setup();
        let owner = account('a');
        let intruder = account('b');
        storage.credit(&owner, &Asset::new("VGLD"), Decimal::from(50)).unwrap();

        let placed = handle
            .place_order(OrderSide::Sell, order(&owner, "VGLD", 10, 1))
            .await
            .unwrap();

        let err = handle
            .cancel_order(OrderSide::Sell, placed.id, intruder)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_OWNER");

        // The order survives
        assert!(storage.get_order(OrderSide::Sell, placed.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deposit_dedup_reports_prior_status() {
        let (handle, _storage, _temp) = setup();
        let acc = account('a');

        let vault = handle
            .deposit_intent(
                acc.clone(),
                AssetClass::ForeignCoin,
                Some(Asset::new("BTC")),
                "tx1".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(vault.status, VaultStatus::Pending);

        let err = handle
            .deposit_intent(
                acc.clone(),
                AssetClass::ForeignCoin,
                Some(Asset::new("BTC")),
                "tx1".to_string(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Transaction already in process");

        // Same txid for a different asset is a distinct entry
        handle
            .deposit_intent(
                acc.clone(),
                AssetClass::NativeCoin,
                Some(Asset::new("XNC")),
                "tx1".to_string(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_confirmed_deposit_credits_exactly_once() {
        let (handle, _storage, _temp) = setup();
        let acc = account('a');

        let vault = handle
            .deposit_intent(
                acc.clone(),
                AssetClass::ForeignCoin,
                Some(Asset::new("BTC")),
                "tx1".to_string(),
            )
            .await
            .unwrap();

        handle
            .resolve_vault(
                &acc,
                vault.id,
                VaultStatus::Success,
                Some((Asset::new("BTC"), Decimal::from(3))),
            )
            .await
            .unwrap();

        let balance = handle.balance_of(acc.clone(), Asset::new("BTC")).await.unwrap();
        assert_eq!(balance.total, Decimal::from(3));

        // Second resolution is rejected, balance unchanged
        let err = handle
            .resolve_vault(
                &acc,
                vault.id,
                VaultStatus::Success,
                Some((Asset::new("BTC"), Decimal::from(3))),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VAULT_FINALIZED");

        let balance = handle.balance_of(acc.clone(), Asset::new("BTC")).await.unwrap();
        assert_eq!(balance.total, Decimal::from(3));

        // And the txid can never be reused
        let err = handle
            .deposit_intent(
                acc.clone(),
                AssetClass::ForeignCoin,
                Some(Asset::new("BTC")),
                "tx1".to_string(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Transaction already used to credit funds");
    }

    #[tokio::test]
    async fn test_rejected_deposit_credits_nothing_and_blocks_reuse() {
        let (handle, _storage, _temp) = setup();
        let acc = account('a');

        let vault = handle
            .deposit_intent(
                acc.clone(),
                AssetClass::ForeignCoin,
                Some(Asset::new("BTC")),
                "tx1".to_string(),
            )
            .await
            .unwrap();
        handle
            .resolve_vault(&acc, vault.id, VaultStatus::Rejected, None)
            .await
            .unwrap();

        let balance = handle.balance_of(acc.clone(), Asset::new("BTC")).await.unwrap();
        assert_eq!(balance.total, Decimal::ZERO);

        let err = handle
            .deposit_intent(
                acc.clone(),
                AssetClass::ForeignCoin,
                Some(Asset::new("BTC")),
                "tx1".to_string(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Transaction already rejected");
    }

    #[tokio::test]
    async fn test_withdraw_debits_multiple_assets_atomically() {
        let (handle, storage, _temp) = setup();
        let acc = account('a');
        storage.credit(&acc, &Asset::new("XNC"), Decimal::from(10)).unwrap();
        storage.credit(&acc, &Asset::new("VGLD"), Decimal::from(50)).unwrap();

        let fee_total = Decimal::new(15, 4); // 0.0015
        handle
            .withdraw(
                acc.clone(),
                vec![
                    (Asset::new("XNC"), fee_total),
                    (Asset::new("VGLD"), Decimal::from(20)),
                ],
                AssetClass::Token,
                Asset::new("VGLD"),
                Decimal::from(20),
            )
            .await
            .unwrap();

        let native = handle.balance_of(acc.clone(), Asset::new("XNC")).await.unwrap();
        assert_eq!(native.total, Decimal::from(10) - fee_total);
        let token = handle.balance_of(acc.clone(), Asset::new("VGLD")).await.unwrap();
        assert_eq!(token.total, Decimal::from(30));
    }

    #[tokio::test]
    async fn test_withdraw_rejects_without_touching_balances() {
        let (handle, storage, _temp) = setup();
        let acc = account('a');
        storage.credit(&acc, &Asset::new("VGLD"), Decimal::from(50)).unwrap();
        // No native coin at all, so the fee debit must fail the whole thing

        let err = handle
            .withdraw(
                acc.clone(),
                vec![
                    (Asset::new("XNC"), Decimal::new(15, 4)),
                    (Asset::new("VGLD"), Decimal::from(20)),
                ],
                AssetClass::Token,
                Asset::new("VGLD"),
                Decimal::from(20),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");

        let token = handle.balance_of(acc.clone(), Asset::new("VGLD")).await.unwrap();
        assert_eq!(token.total, Decimal::from(50));
        assert!(storage.list_vault(&acc).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_locked_funds_cannot_be_withdrawn() {
        let (handle, storage, _temp) = setup();
        let acc = account('a');
        storage.credit(&acc, &Asset::new("VGLD"), Decimal::from(50)).unwrap();

        handle
            .place_order(OrderSide::Sell, order(&acc, "VGLD", 40, 1))
            .await
            .unwrap();

        let err = handle
            .withdraw(
                acc.clone(),
                vec![(Asset::new("VGLD"), Decimal::from(20))],
                AssetClass::Token,
                Asset::new("VGLD"),
                Decimal::from(20),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE_LOCKED");
    }

    #[tokio::test]
    async fn test_shutdown_closes_the_handle() {
        let (handle, _storage, _temp) = setup();
        handle.shutdown().await;
        // Give the actors a moment to drain
        tokio::task::yield_now().await;
    }
}
