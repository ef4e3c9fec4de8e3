//! Market facade
//!
//! Front door for order, balance, and account operations. The facade
//! validates request shape, routes mutations to the actor pool, publishes
//! match signals after commits, and keeps the operation counters.
//! Settlement builds on the same handle through [`Market::handle`].

use crate::{
    actor::{spawn_ledger_actors, LedgerHandle},
    config::Config,
    error::{Error, Result},
    metrics::Metrics,
    registry::{AssetRegistry, StaticRegistry},
    storage::Storage,
    types::{
        to_standard, AccountDetails, AccountId, Asset, Balance, Order, OrderSide, TradeRecord,
        VaultTransaction,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use venue_bus::{EventBus, Publisher, Subscriber};

/// Market facade over the ledger
pub struct Market {
    storage: Arc<Storage>,
    handle: LedgerHandle,
    registry: Arc<dyn AssetRegistry>,
    currency: Asset,
    bus: EventBus,
    publisher: Publisher,
    metrics: Arc<Metrics>,
}

impl Market {
    /// Open storage, start the actor pool, and wire the event bus
    pub fn open(config: Config) -> Result<Self> {
        let registry: Arc<dyn AssetRegistry> = Arc::new(StaticRegistry::from_config(
            &config.assets,
            &config.currency,
            &config.native_coin,
        )?);
        let currency = registry.currency().clone();

        let storage = Arc::new(Storage::open(&config)?);
        let handle = spawn_ledger_actors(Arc::clone(&storage), currency.clone(), &config.actors);

        let bus = EventBus::new();
        let publisher = bus.publisher();
        let metrics = Arc::new(Metrics::new()?);

        tracing::info!(service = %config.service_name, currency = %currency, "Market opened");

        Ok(Self {
            storage,
            handle,
            registry,
            currency,
            bus,
            publisher,
            metrics,
        })
    }

    /// Actor pool handle for collaborators that mutate the same ledger
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Asset reference data
    pub fn registry(&self) -> &Arc<dyn AssetRegistry> {
        &self.registry
    }

    /// Operation counters
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// New subscription to match signals
    pub fn match_events(&self) -> Subscriber {
        self.bus.subscribe()
    }

    /// Stop the actor pool
    pub async fn shutdown(&self) {
        self.handle.shutdown().await;
    }

    // Validation

    fn parse_account(&self, account: &str) -> Result<AccountId> {
        AccountId::parse(account)
    }

    fn tradeable_asset(&self, symbol: &str) -> Result<Asset> {
        let asset = Asset::new(symbol);
        if !self.registry.is_known(&asset) {
            return Err(Error::InvalidAsset(symbol.to_string()));
        }
        if !self.registry.is_tradeable(&asset) {
            return Err(Error::AssetNotTradeable(symbol.to_string()));
        }
        Ok(asset)
    }

    fn known_asset(&self, symbol: &str) -> Result<Asset> {
        let asset = Asset::new(symbol);
        if !self.registry.is_known(&asset) {
            return Err(Error::InvalidAsset(symbol.to_string()));
        }
        Ok(asset)
    }

    fn positive(value: Decimal, field: &str) -> Result<Decimal> {
        if value <= Decimal::ZERO {
            return Err(Error::InvalidNumber(field.to_string()));
        }
        Ok(to_standard(value))
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.metrics.operations_rejected.inc();
        }
        result
    }

    // Orders

    /// Place an order to sell `quantity` of `asset` at `min_price` or
    /// better; reserves the asset itself
    pub async fn place_sell_order(
        &self,
        account: &str,
        asset: &str,
        quantity: Decimal,
        min_price: Decimal,
    ) -> Result<String> {
        let result = self.place_order(OrderSide::Sell, account, asset, quantity, min_price).await;
        self.track(result)
    }

    /// Place an order to buy `quantity` of `asset` at `max_price` or
    /// better; reserves `quantity * max_price` of the venue currency
    pub async fn place_buy_order(
        &self,
        account: &str,
        asset: &str,
        quantity: Decimal,
        max_price: Decimal,
    ) -> Result<String> {
        let result = self.place_order(OrderSide::Buy, account, asset, quantity, max_price).await;
        self.track(result)
    }

    async fn place_order(
        &self,
        side: OrderSide,
        account: &str,
        asset: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<String> {
        let timer = self.metrics.operation_duration.start_timer();

        let account = self.parse_account(account)?;
        let quantity = Self::positive(quantity, "quantity")?;
        let price = Self::positive(price, "price")?;
        let asset = self.tradeable_asset(asset)?;

        let order = Order {
            id: Uuid::now_v7(),
            account,
            asset: asset.clone(),
            quantity,
            price,
            placed_at: Utc::now(),
        };
        let order = self.handle.place_order(side, order).await?;

        self.metrics.orders_placed.inc();
        self.publisher.match_requested(asset.as_str());
        timer.observe_duration();

        Ok(format!("{} order {} placed successfully", side_word(side), order.id))
    }

    /// Cancel an open order owned by `account`; `side` is the string
    /// "buy" or "sell"
    pub async fn cancel_order(&self, side: &str, order_id: Uuid, account: &str) -> Result<String> {
        let result = self.cancel_order_inner(side, order_id, account).await;
        self.track(result)
    }

    async fn cancel_order_inner(&self, side: &str, order_id: Uuid, account: &str) -> Result<String> {
        let timer = self.metrics.operation_duration.start_timer();

        let account = self.parse_account(account)?;
        let side = OrderSide::parse(side)?;
        let order = self.handle.cancel_order(side, order_id, account).await?;

        self.metrics.orders_cancelled.inc();
        self.publisher.match_requested(order.asset.as_str());
        timer.observe_duration();

        Ok(format!("{} order {} cancelled successfully", side_word(side), order.id))
    }

    // Balances and views

    /// Consistent total/locked/net view for one (account, asset) pair
    pub async fn balance_of(&self, account: &str, asset: &str) -> Result<Balance> {
        let account = self.parse_account(account)?;
        let asset = self.known_asset(asset)?;
        self.handle.balance_of(account, asset).await
    }

    /// Best-effort aggregate view of an account
    ///
    /// Sub-queries are independent; one failing leaves its field `None`
    /// instead of failing the view.
    pub async fn account_details(&self, account: &str) -> Result<AccountDetails> {
        let account = self.parse_account(account)?;

        let balances = self.sub_query("balances", || self.storage.list_balances(&account));
        let sell_orders =
            self.sub_query("sell_orders", || self.storage.list_orders(OrderSide::Sell, &account));
        let buy_orders =
            self.sub_query("buy_orders", || self.storage.list_orders(OrderSide::Buy, &account));
        let trades = self.sub_query("trades", || self.storage.list_trades(&account));

        Ok(AccountDetails {
            account,
            time: Utc::now(),
            balances,
            sell_orders,
            buy_orders,
            trades,
        })
    }

    fn sub_query<T>(&self, name: &str, query: impl FnOnce() -> Result<Vec<T>>) -> Option<Vec<T>> {
        match query() {
            Ok(rows) => Some(rows),
            Err(e) => {
                tracing::error!(sub_query = name, error = %e, "Account detail sub-query failed");
                None
            }
        }
    }

    /// All deposit/withdrawal rows for an account
    pub async fn user_vault_transactions(&self, account: &str) -> Result<Vec<VaultTransaction>> {
        let account = self.parse_account(account)?;
        self.storage.list_vault(&account)
    }

    // Trades and funding

    /// Record an executed trade for both counterparties' histories
    pub fn record_trade(&self, trade: &TradeRecord) -> Result<()> {
        self.storage.record_trade(trade)
    }

    /// Credit an (account, asset) ledger entry directly, bypassing the
    /// settlement flow
    ///
    /// Administrative funding path; settlement deposits go through the
    /// vault state machine instead. Routed through the account's actor
    /// partition so it serializes with every other balance mutation.
    pub async fn fund(&self, account: &str, asset: &str, amount: Decimal) -> Result<Decimal> {
        let account = self.parse_account(account)?;
        let asset = self.known_asset(asset)?;
        let amount = Self::positive(amount, "amount")?;
        self.handle.credit(account, asset, amount).await
    }

    /// The venue currency
    pub fn currency(&self) -> &Asset {
        &self.currency
    }
}

fn side_word(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "Buy",
        OrderSide::Sell => "Sell",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use venue_bus::MarketEventKind;

    const ALICE: &str = "FTqv4QYmtxJc6nZbWeyKFAfKBsPVcoco2B";

    async fn open_market() -> (Market, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Market::open(config).unwrap(), temp_dir)
    }

    #[tokio::test]
    async fn test_validation_order_before_storage() {
        let (market, _temp) = open_market().await;

        let err = market
            .place_sell_order("bogus", "VGLD", Decimal::from(1), Decimal::from(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ACCOUNT");

        let err = market
            .place_sell_order(ALICE, "VGLD", Decimal::ZERO, Decimal::from(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_NUMBER");

        let err = market
            .place_sell_order(ALICE, "DOGE", Decimal::from(1), Decimal::from(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ASSET");

        // The venue currency is known but closed for trading
        let err = market
            .place_sell_order(ALICE, "VUSD", Decimal::from(1), Decimal::from(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ASSET_NOT_TRADEABLE");

        assert_eq!(market.metrics().operations_rejected.get(), 4);
    }

    #[tokio::test]
    async fn test_placement_publishes_match_signal() {
        let (market, _temp) = open_market().await;
        market.fund(ALICE, "VGLD", Decimal::from(100)).await.unwrap();
        let mut events = market.match_events();

        let message = market
            .place_sell_order(ALICE, "VGLD", Decimal::from(10), Decimal::from(5))
            .await
            .unwrap();
        assert!(message.starts_with("Sell order "));

        let event = events.recv().await.unwrap();
        let MarketEventKind::MatchRequested { asset } = event.kind;
        assert_eq!(asset, "VGLD");
    }

    #[tokio::test]
    async fn test_cancel_unknown_side_and_order() {
        let (market, _temp) = open_market().await;

        let err = market.cancel_order("hold", Uuid::now_v7(), ALICE).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_ORDER_TYPE");

        let err = market.cancel_order("sell", Uuid::now_v7(), ALICE).await.unwrap_err();
        assert_eq!(err.code(), "ORDER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_account_details_reports_all_sections() {
        let (market, _temp) = open_market().await;
        market.fund(ALICE, "VGLD", Decimal::from(100)).await.unwrap();
        market.fund(ALICE, "VUSD", Decimal::from(500)).await.unwrap();
        market
            .place_sell_order(ALICE, "VGLD", Decimal::from(10), Decimal::from(5))
            .await
            .unwrap();
        market
            .place_buy_order(ALICE, "BTC", Decimal::from(1), Decimal::from(100))
            .await
            .unwrap();

        let details = market.account_details(ALICE).await.unwrap();
        assert_eq!(details.balances.as_ref().unwrap().len(), 2);
        assert_eq!(details.sell_orders.as_ref().unwrap().len(), 1);
        assert_eq!(details.buy_orders.as_ref().unwrap().len(), 1);
        assert!(details.trades.as_ref().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_account_details_serializes_for_the_api_layer() {
        let (market, _temp) = open_market().await;
        market.fund(ALICE, "VGLD", Decimal::from(100)).await.unwrap();

        let details = market.account_details(ALICE).await.unwrap();
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["account"], ALICE);
        assert!(json["balances"].is_array());
        assert!(json["time"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_buy_order_is_rejected_not_fatal() {
        let (market, _temp) = open_market().await;
        let quantity: Decimal = "100000000000000000000000000".parse().unwrap();

        let err = market
            .place_buy_order(ALICE, "VGLD", quantity, Decimal::from(1000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_NUMBER");

        // The account's partition must keep serving requests afterwards.
        let balance = market.balance_of(ALICE, "VUSD").await.unwrap();
        assert_eq!(balance.total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_concurrent_funding_loses_no_credits() {
        let (market, _temp) = open_market().await;
        let market = std::sync::Arc::new(market);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let market = market.clone();
                tokio::spawn(async move { market.fund(ALICE, "VGLD", Decimal::ONE).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let balance = market.balance_of(ALICE, "VGLD").await.unwrap();
        assert_eq!(balance.total, Decimal::from(50));
    }

    #[tokio::test]
    async fn test_balance_of_requires_known_asset() {
        let (market, _temp) = open_market().await;
        let err = market.balance_of(ALICE, "DOGE").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_ASSET");

        let balance = market.balance_of(ALICE, "BTC").await.unwrap();
        assert_eq!(balance.total, Decimal::ZERO);
        assert_eq!(balance.net, Decimal::ZERO);
    }
}
