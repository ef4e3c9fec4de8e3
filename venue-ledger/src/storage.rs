//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `balances` - Ledger entries (key: account || asset)
//! - `sell_orders` - Open sell orders (key: order id)
//! - `buy_orders` - Open buy orders (key: order id)
//! - `vault` - Deposit/withdrawal records (key: vault id)
//! - `trades` - Trade history (key: trade id)
//! - `indices` - Secondary indices for per-account lookups and deposit
//!   deduplication
//!
//! Every mutating operation commits one `WriteBatch` carrying all of its
//! side effects, so a crash never leaves an order without its index or a
//! debit without its vault row.

use crate::{
    config::Config,
    error::{Error, Result},
    types::{AccountId, Asset, AssetBalance, AssetClass, Order, OrderSide, TradeRecord, VaultTransaction},
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_BALANCES: &str = "balances";
const CF_SELL_ORDERS: &str = "sell_orders";
const CF_BUY_ORDERS: &str = "buy_orders";
const CF_VAULT: &str = "vault";
const CF_TRADES: &str = "trades";
const CF_INDICES: &str = "indices";

/// Index key namespaces
const IDX_ORDER: u8 = b'o';
const IDX_VAULT: u8 = b'v';
const IDX_TRADE: u8 = b't';
const IDX_DEDUP: u8 = b'd';

/// Deduplication scope for vault transactions
///
/// Coin deposits dedup per asset symbol; token deposits share one bucket
/// per class because token vault rows are not always keyed by a symbol.
#[derive(Debug, Clone, Copy)]
pub enum DedupScope<'a> {
    /// Keyed by a specific asset
    Asset(&'a Asset),
    /// Keyed by the asset class alone
    Class(AssetClass),
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_BALANCES, Options::default()),
            ColumnFamilyDescriptor::new(CF_SELL_ORDERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_BUY_ORDERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_VAULT, Options::default()),
            ColumnFamilyDescriptor::new(CF_TRADES, Options::default()),
            ColumnFamilyDescriptor::new(CF_INDICES, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn orders_cf(&self, side: OrderSide) -> Result<&ColumnFamily> {
        match side {
            OrderSide::Buy => self.cf_handle(CF_BUY_ORDERS),
            OrderSide::Sell => self.cf_handle(CF_SELL_ORDERS),
        }
    }

    // Key helpers

    fn balance_key(account: &AccountId, asset: &Asset) -> Vec<u8> {
        let mut key = account.as_str().as_bytes().to_vec();
        key.push(b'|');
        key.extend_from_slice(asset.as_str().as_bytes());
        key
    }

    fn order_index_key(side: OrderSide, account: &AccountId, order_id: Option<Uuid>) -> Vec<u8> {
        let mut key = vec![IDX_ORDER, match side {
            OrderSide::Buy => b'b',
            OrderSide::Sell => b's',
        }];
        key.extend_from_slice(account.as_str().as_bytes());
        key.push(b'|');
        if let Some(id) = order_id {
            key.extend_from_slice(id.as_bytes());
        }
        key
    }

    fn account_index_key(ns: u8, account: &AccountId, id: Option<Uuid>) -> Vec<u8> {
        let mut key = vec![ns];
        key.extend_from_slice(account.as_str().as_bytes());
        key.push(b'|');
        if let Some(id) = id {
            key.extend_from_slice(id.as_bytes());
        }
        key
    }

    /// Deduplication key for a vault transaction
    pub fn dedup_key(txid: &str, account: &AccountId, scope: DedupScope<'_>) -> Vec<u8> {
        let mut key = vec![IDX_DEDUP];
        key.extend_from_slice(txid.as_bytes());
        key.push(b'|');
        key.extend_from_slice(account.as_str().as_bytes());
        key.push(b'|');
        match scope {
            DedupScope::Asset(asset) => key.extend_from_slice(asset.as_str().as_bytes()),
            DedupScope::Class(class) => {
                key.push(b'*');
                key.extend_from_slice(class.tag().as_bytes());
            }
        }
        key
    }

    /// Iterate keys under a prefix in a column family
    fn scan_prefix(&self, cf: &ColumnFamily, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value));
        }
        Ok(rows)
    }

    // Balance operations

    /// Raw ledger quantity for an (account, asset) pair, zero when absent
    pub fn get_quantity(&self, account: &AccountId, asset: &Asset) -> Result<Decimal> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let key = Self::balance_key(account, asset);

        match self.db.get_cf(cf, &key)? {
            Some(value) => Ok(bincode::deserialize(&value)?),
            None => Ok(Decimal::ZERO),
        }
    }

    /// All ledger rows for an account
    pub fn list_balances(&self, account: &AccountId) -> Result<Vec<AssetBalance>> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let mut prefix = account.as_str().as_bytes().to_vec();
        prefix.push(b'|');

        let mut balances = Vec::new();
        for (key, value) in self.scan_prefix(cf, &prefix)? {
            let symbol = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            let quantity: Decimal = bincode::deserialize(&value)?;
            balances.push(AssetBalance {
                asset: Asset::new(symbol),
                quantity,
            });
        }
        Ok(balances)
    }

    /// Add to a ledger entry outside any larger operation
    ///
    /// Read-modify-write; like every balance mutation it must run on the
    /// account's actor partition (tests call it directly on stores with
    /// no actors attached). Operations that carry other side effects go
    /// through the atomic methods below.
    pub fn credit(&self, account: &AccountId, asset: &Asset, amount: Decimal) -> Result<Decimal> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let key = Self::balance_key(account, asset);
        let new_quantity = self.get_quantity(account, asset)? + amount;
        self.db.put_cf(cf, &key, bincode::serialize(&new_quantity)?)?;
        Ok(new_quantity)
    }

    // Order operations

    /// Get order by id from one side's table
    pub fn get_order(&self, side: OrderSide, order_id: Uuid) -> Result<Option<Order>> {
        let cf = self.orders_cf(side)?;
        match self.db.get_cf(cf, order_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All open orders of an account on one side
    pub fn list_orders(&self, side: OrderSide, account: &AccountId) -> Result<Vec<Order>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::order_index_key(side, account, None);

        let mut orders = Vec::new();
        for (key, _) in self.scan_prefix(cf_indices, &prefix)? {
            let id_bytes: [u8; 16] = key[key.len() - 16..]
                .try_into()
                .map_err(|_| Error::Storage("Malformed order index key".to_string()))?;
            let order_id = Uuid::from_bytes(id_bytes);
            let order = self
                .get_order(side, order_id)?
                .ok_or_else(|| Error::Storage(format!("Index points to missing order {}", order_id)))?;
            orders.push(order);
        }
        Ok(orders)
    }

    /// Insert an order row and its account index (atomic)
    pub fn insert_order(&self, side: OrderSide, order: &Order) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_orders = self.orders_cf(side)?;
        batch.put_cf(cf_orders, order.id.as_bytes(), bincode::serialize(order)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::order_index_key(side, &order.account, Some(order.id));
        batch.put_cf(cf_indices, &idx, []);

        self.db.write(batch)?;

        tracing::debug!(order_id = %order.id, side = %side, asset = %order.asset, "Order stored");
        Ok(())
    }

    /// Delete an order row and its account index (atomic)
    pub fn delete_order(&self, side: OrderSide, order: &Order) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_orders = self.orders_cf(side)?;
        batch.delete_cf(cf_orders, order.id.as_bytes());

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::order_index_key(side, &order.account, Some(order.id));
        batch.delete_cf(cf_indices, &idx);

        self.db.write(batch)?;

        tracing::debug!(order_id = %order.id, side = %side, "Order deleted");
        Ok(())
    }

    // Vault operations

    /// Get vault transaction by id
    pub fn get_vault(&self, vault_id: Uuid) -> Result<Option<VaultTransaction>> {
        let cf = self.cf_handle(CF_VAULT)?;
        match self.db.get_cf(cf, vault_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Look up a vault transaction through its deduplication key
    pub fn find_vault_by_dedup(&self, dedup_key: &[u8]) -> Result<Option<VaultTransaction>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let Some(value) = self.db.get_cf(cf_indices, dedup_key)? else {
            return Ok(None);
        };
        let id_bytes: [u8; 16] = value[..]
            .try_into()
            .map_err(|_| Error::Storage("Malformed dedup index value".to_string()))?;
        let vault_id = Uuid::from_bytes(id_bytes);
        self.get_vault(vault_id)?
            .ok_or_else(|| Error::Storage(format!("Dedup index points to missing vault row {}", vault_id)))
            .map(Some)
    }

    /// Insert a vault row with its account index and, for deposits, the
    /// deduplication index (atomic)
    pub fn insert_vault(&self, vault: &VaultTransaction, dedup_key: Option<&[u8]>) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_vault(&mut batch, vault, dedup_key)?;
        self.db.write(batch)?;

        tracing::debug!(vault_id = %vault.id, account = %vault.account, "Vault row stored");
        Ok(())
    }

    /// Debit one or more ledger entries and record the withdrawal intent in
    /// one batch
    ///
    /// `updates` carries the post-debit quantities computed by the caller
    /// under its serialization domain.
    pub fn withdraw(
        &self,
        account: &AccountId,
        updates: &[(Asset, Decimal)],
        vault: &VaultTransaction,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_balances = self.cf_handle(CF_BALANCES)?;
        for (asset, new_quantity) in updates {
            let key = Self::balance_key(account, asset);
            batch.put_cf(cf_balances, &key, bincode::serialize(new_quantity)?);
        }

        self.stage_vault(&mut batch, vault, None)?;
        self.db.write(batch)?;

        tracing::debug!(vault_id = %vault.id, account = %account, "Withdrawal debited");
        Ok(())
    }

    /// Overwrite a vault row and optionally credit a ledger entry in the
    /// same batch (deposit confirmation)
    pub fn resolve_vault(
        &self,
        vault: &VaultTransaction,
        credit: Option<(&Asset, Decimal)>,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_vault = self.cf_handle(CF_VAULT)?;
        batch.put_cf(cf_vault, vault.id.as_bytes(), bincode::serialize(vault)?);

        if let Some((asset, new_quantity)) = credit {
            let cf_balances = self.cf_handle(CF_BALANCES)?;
            let key = Self::balance_key(&vault.account, asset);
            batch.put_cf(cf_balances, &key, bincode::serialize(&new_quantity)?);
        }

        self.db.write(batch)?;

        tracing::debug!(vault_id = %vault.id, status = ?vault.status, "Vault row resolved");
        Ok(())
    }

    /// All vault rows for an account
    pub fn list_vault(&self, account: &AccountId) -> Result<Vec<VaultTransaction>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::account_index_key(IDX_VAULT, account, None);

        let mut rows = Vec::new();
        for (key, _) in self.scan_prefix(cf_indices, &prefix)? {
            let id_bytes: [u8; 16] = key[key.len() - 16..]
                .try_into()
                .map_err(|_| Error::Storage("Malformed vault index key".to_string()))?;
            let vault_id = Uuid::from_bytes(id_bytes);
            let row = self
                .get_vault(vault_id)?
                .ok_or_else(|| Error::Storage(format!("Index points to missing vault row {}", vault_id)))?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn stage_vault(
        &self,
        batch: &mut WriteBatch,
        vault: &VaultTransaction,
        dedup_key: Option<&[u8]>,
    ) -> Result<()> {
        let cf_vault = self.cf_handle(CF_VAULT)?;
        batch.put_cf(cf_vault, vault.id.as_bytes(), bincode::serialize(vault)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::account_index_key(IDX_VAULT, &vault.account, Some(vault.id));
        batch.put_cf(cf_indices, &idx, []);

        if let Some(dedup) = dedup_key {
            batch.put_cf(cf_indices, dedup, vault.id.as_bytes());
        }
        Ok(())
    }

    // Trade operations

    /// Store a trade row with indices for both counterparties (atomic)
    pub fn record_trade(&self, trade: &TradeRecord) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_trades = self.cf_handle(CF_TRADES)?;
        batch.put_cf(cf_trades, trade.id.as_bytes(), bincode::serialize(trade)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx_seller = Self::account_index_key(IDX_TRADE, &trade.seller, Some(trade.id));
        batch.put_cf(cf_indices, &idx_seller, []);
        let idx_buyer = Self::account_index_key(IDX_TRADE, &trade.buyer, Some(trade.id));
        batch.put_cf(cf_indices, &idx_buyer, []);

        self.db.write(batch)?;
        Ok(())
    }

    /// All trades where the account is either counterparty
    pub fn list_trades(&self, account: &AccountId) -> Result<Vec<TradeRecord>> {
        let cf_trades = self.cf_handle(CF_TRADES)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::account_index_key(IDX_TRADE, account, None);

        let mut trades = Vec::new();
        for (key, _) in self.scan_prefix(cf_indices, &prefix)? {
            let id_bytes: [u8; 16] = key[key.len() - 16..]
                .try_into()
                .map_err(|_| Error::Storage("Malformed trade index key".to_string()))?;
            let trade_id = Uuid::from_bytes(id_bytes);
            let value = self
                .db
                .get_cf(cf_trades, trade_id.as_bytes())?
                .ok_or_else(|| Error::Storage(format!("Index points to missing trade {}", trade_id)))?;
            trades.push(bincode::deserialize(&value)?);
        }
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{VaultMode, VaultStatus};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn account(tag: char) -> AccountId {
        AccountId::parse(format!("F{}qv4QYmtxJc6nZbWeyKFAfKBsPVco", tag)).unwrap()
    }

    fn test_order(account: &AccountId, asset: &str, quantity: i64, price: i64) -> Order {
        Order {
            id: Uuid::now_v7(),
            account: account.clone(),
            asset: Asset::new(asset),
            quantity: Decimal::from(quantity),
            price: Decimal::from(price),
            placed_at: Utc::now(),
        }
    }

    #[test]
    fn test_quantity_defaults_to_zero() {
        let (storage, _temp) = test_storage();
        let acc = account('a');
        assert_eq!(
            storage.get_quantity(&acc, &Asset::new("BTC")).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_credit_and_list_balances() {
        let (storage, _temp) = test_storage();
        let acc = account('a');

        storage.credit(&acc, &Asset::new("BTC"), Decimal::from(3)).unwrap();
        storage.credit(&acc, &Asset::new("VUSD"), Decimal::from(100)).unwrap();
        storage.credit(&acc, &Asset::new("BTC"), Decimal::from(2)).unwrap();

        assert_eq!(
            storage.get_quantity(&acc, &Asset::new("BTC")).unwrap(),
            Decimal::from(5)
        );

        let balances = storage.list_balances(&acc).unwrap();
        assert_eq!(balances.len(), 2);

        // Another account's rows are invisible
        assert!(storage.list_balances(&account('b')).unwrap().is_empty());
    }

    #[test]
    fn test_order_roundtrip() {
        let (storage, _temp) = test_storage();
        let acc = account('a');
        let order = test_order(&acc, "BTC", 10, 2);

        storage.insert_order(OrderSide::Sell, &order).unwrap();

        let found = storage.get_order(OrderSide::Sell, order.id).unwrap().unwrap();
        assert_eq!(found.account, acc);
        // Wrong side table misses
        assert!(storage.get_order(OrderSide::Buy, order.id).unwrap().is_none());

        let listed = storage.list_orders(OrderSide::Sell, &acc).unwrap();
        assert_eq!(listed.len(), 1);

        storage.delete_order(OrderSide::Sell, &order).unwrap();
        assert!(storage.get_order(OrderSide::Sell, order.id).unwrap().is_none());
        assert!(storage.list_orders(OrderSide::Sell, &acc).unwrap().is_empty());
    }

    #[test]
    fn test_vault_dedup_index() {
        let (storage, _temp) = test_storage();
        let acc = account('a');

        let vault = VaultTransaction {
            id: Uuid::now_v7(),
            account: acc.clone(),
            mode: VaultMode::Deposit,
            asset_class: AssetClass::ForeignCoin,
            asset: Some(Asset::new("BTC")),
            external_txid: Some("abc".to_string()),
            amount: None,
            status: VaultStatus::Pending,
            lock_time: Utc::now(),
        };

        let key = Storage::dedup_key("abc", &acc, DedupScope::Asset(&Asset::new("BTC")));
        assert!(storage.find_vault_by_dedup(&key).unwrap().is_none());

        storage.insert_vault(&vault, Some(&key)).unwrap();

        let found = storage.find_vault_by_dedup(&key).unwrap().unwrap();
        assert_eq!(found.id, vault.id);

        // Different asset scope is a different key
        let other = Storage::dedup_key("abc", &acc, DedupScope::Asset(&Asset::new("XNC")));
        assert!(storage.find_vault_by_dedup(&other).unwrap().is_none());

        // Class scope is distinct from asset scope
        let class = Storage::dedup_key("abc", &acc, DedupScope::Class(AssetClass::Token));
        assert!(storage.find_vault_by_dedup(&class).unwrap().is_none());

        let listed = storage.list_vault(&acc).unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_withdraw_batch_updates_balances_and_vault() {
        let (storage, _temp) = test_storage();
        let acc = account('a');
        storage.credit(&acc, &Asset::new("XNC"), Decimal::from(10)).unwrap();
        storage.credit(&acc, &Asset::new("VGLD"), Decimal::from(50)).unwrap();

        let vault = VaultTransaction {
            id: Uuid::now_v7(),
            account: acc.clone(),
            mode: VaultMode::Withdraw,
            asset_class: AssetClass::Token,
            asset: Some(Asset::new("VGLD")),
            external_txid: None,
            amount: Some(Decimal::from(20)),
            status: VaultStatus::Pending,
            lock_time: Utc::now(),
        };

        storage
            .withdraw(
                &acc,
                &[
                    (Asset::new("XNC"), Decimal::from(9)),
                    (Asset::new("VGLD"), Decimal::from(30)),
                ],
                &vault,
            )
            .unwrap();

        assert_eq!(storage.get_quantity(&acc, &Asset::new("XNC")).unwrap(), Decimal::from(9));
        assert_eq!(storage.get_quantity(&acc, &Asset::new("VGLD")).unwrap(), Decimal::from(30));
        assert_eq!(storage.list_vault(&acc).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_vault_credits_once() {
        let (storage, _temp) = test_storage();
        let acc = account('a');

        let mut vault = VaultTransaction {
            id: Uuid::now_v7(),
            account: acc.clone(),
            mode: VaultMode::Deposit,
            asset_class: AssetClass::ForeignCoin,
            asset: Some(Asset::new("BTC")),
            external_txid: Some("abc".to_string()),
            amount: None,
            status: VaultStatus::Pending,
            lock_time: Utc::now(),
        };
        storage.insert_vault(&vault, None).unwrap();

        vault.status = VaultStatus::Success;
        vault.amount = Some(Decimal::from(2));
        storage
            .resolve_vault(&vault, Some((&Asset::new("BTC"), Decimal::from(2))))
            .unwrap();

        assert_eq!(storage.get_quantity(&acc, &Asset::new("BTC")).unwrap(), Decimal::from(2));
        let row = storage.get_vault(vault.id).unwrap().unwrap();
        assert_eq!(row.status, VaultStatus::Success);
        // Still exactly one row for the account
        assert_eq!(storage.list_vault(&acc).unwrap().len(), 1);
    }

    #[test]
    fn test_trades_visible_to_both_counterparties() {
        let (storage, _temp) = test_storage();
        let seller = account('a');
        let buyer = account('b');

        let trade = TradeRecord::new(
            Asset::new("BTC"),
            seller.clone(),
            buyer.clone(),
            Decimal::from(1),
            Decimal::from(40000),
        );
        storage.record_trade(&trade).unwrap();

        assert_eq!(storage.list_trades(&seller).unwrap().len(), 1);
        assert_eq!(storage.list_trades(&buyer).unwrap().len(), 1);
        assert!(storage.list_trades(&account('c')).unwrap().is_empty());
    }
}
