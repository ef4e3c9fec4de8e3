//! Core types for the venue ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for quantities and prices)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Decimal places every stored quantity and price is normalized to
pub const STANDARD_SCALE: u32 = 8;

/// Normalize a quantity or price to the venue's standard precision
pub fn to_standard(value: Decimal) -> Decimal {
    value.round_dp(STANDARD_SCALE)
}

/// Base58 alphabet used by account addresses (no 0, O, I, l)
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Account identifier (validated blockchain address)
///
/// Construction goes through [`AccountId::parse`]; a value of this type is
/// always a well-formed address. The core never creates accounts, it only
/// references them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Parse and validate an address
    pub fn parse(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if !(26..=35).contains(&id.len()) {
            return Err(crate::Error::InvalidAccount(id));
        }
        if !id.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return Err(crate::Error::InvalidAccount(id));
        }
        Ok(Self(id))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset symbol (native coin, foreign coin, or token)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset(String);

impl Asset {
    /// Create asset symbol
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset class, the dispatch key for settlement workflows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    /// The venue's own chain coin
    NativeCoin,
    /// A coin on a foreign chain
    ForeignCoin,
    /// A token carried on the native chain
    Token,
}

impl AssetClass {
    /// Short tag used in storage keys
    pub fn tag(&self) -> &'static str {
        match self {
            AssetClass::NativeCoin => "native",
            AssetClass::ForeignCoin => "foreign",
            AssetClass::Token => "token",
        }
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buy order, reserves the venue currency
    Buy,
    /// Sell order, reserves the traded asset
    Sell,
}

impl OrderSide {
    /// Parse from the wire form ("buy" / "sell")
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(crate::Error::InvalidOrderType(other.to_string())),
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// An open order
///
/// For a sell order `price` is the minimum acceptable price; for a buy
/// order it is the maximum. The side is carried by which table the order
/// lives in, not by the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID (UUIDv7, store-assigned)
    pub id: Uuid,

    /// Owning account
    pub account: AccountId,

    /// Traded asset
    pub asset: Asset,

    /// Quantity of the traded asset
    pub quantity: Decimal,

    /// Limit price in the venue currency
    pub price: Decimal,

    /// Placement time
    pub placed_at: DateTime<Utc>,
}

impl Order {
    /// Amount this order reserves, and of which asset
    ///
    /// Sell orders reserve the traded asset itself; buy orders reserve
    /// `quantity * price` of the venue currency. Fails with
    /// `InvalidNumber` when the product exceeds the decimal range, so an
    /// oversized order is refused instead of poisoning the caller.
    pub fn reservation(&self, side: OrderSide, currency: &Asset) -> crate::Result<(Asset, Decimal)> {
        match side {
            OrderSide::Sell => Ok((self.asset.clone(), self.quantity)),
            OrderSide::Buy => {
                let reserved = self
                    .quantity
                    .checked_mul(self.price)
                    .ok_or_else(|| crate::Error::InvalidNumber("quantity * price".to_string()))?;
                Ok((currency.clone(), to_standard(reserved)))
            }
        }
    }
}

/// Balance view for one (account, asset) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Raw ledger quantity
    pub total: Decimal,

    /// Portion reserved by open orders
    pub locked: Decimal,

    /// total - locked; the only amount available for new commitments
    pub net: Decimal,
}

impl Balance {
    /// Build from total and locked
    pub fn new(total: Decimal, locked: Decimal) -> Self {
        Self {
            total,
            locked,
            net: total - locked,
        }
    }
}

/// Per-asset quantity row for an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    /// Asset symbol
    pub asset: Asset,
    /// Raw ledger quantity
    pub quantity: Decimal,
}

/// Vault transaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultMode {
    /// Funds entering the venue from the chain
    Deposit,
    /// Funds leaving the venue to the chain
    Withdraw,
}

/// Vault transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultStatus {
    /// Awaiting on-chain confirmation
    Pending,
    /// Confirmed failed or refused (terminal)
    Rejected,
    /// Confirmed and booked (terminal)
    Success,
}

impl VaultStatus {
    /// Whether the status can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, VaultStatus::Rejected | VaultStatus::Success)
    }
}

/// One deposit or withdrawal attempt bridging the internal ledger and the
/// external chain
///
/// Token-class deposit rows carry no asset symbol; they are keyed by the
/// class alone, which is also the deduplication scope for token deposits.
/// Withdrawal rows have no external txid until the chain send is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultTransaction {
    /// Unique row ID (UUIDv7)
    pub id: Uuid,

    /// Account the funds belong to
    pub account: AccountId,

    /// Deposit or withdraw
    pub mode: VaultMode,

    /// Asset class driving the settlement workflow
    pub asset_class: AssetClass,

    /// Asset symbol, absent for token-class deposit rows
    pub asset: Option<Asset>,

    /// External (on-chain) transaction id; absent for withdrawals until
    /// the send is submitted
    pub external_txid: Option<String>,

    /// Amount; absent for deposits until confirmed
    pub amount: Option<Decimal>,

    /// Current status
    pub status: VaultStatus,

    /// Time the row was locked in
    pub lock_time: DateTime<Utc>,
}

/// A completed trade between two accounts
///
/// Written by the external matching component; this core only stores and
/// serves the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Unique trade ID (UUIDv7)
    pub id: Uuid,

    /// Traded asset
    pub asset: Asset,

    /// Selling account
    pub seller: AccountId,

    /// Buying account
    pub buyer: AccountId,

    /// Quantity of the traded asset
    pub quantity: Decimal,

    /// Executed price in the venue currency
    pub price: Decimal,

    /// Execution time
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    /// Create a trade record with a fresh id
    pub fn new(
        asset: Asset,
        seller: AccountId,
        buyer: AccountId,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            asset,
            seller,
            buyer,
            quantity,
            price,
            executed_at: Utc::now(),
        }
    }
}

/// Best-effort account view
///
/// Assembled from independent sub-queries; a failed sub-query leaves its
/// field `None` rather than failing the whole view. `time` marks when the
/// view was assembled; it is not a transactional snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDetails {
    /// Account the view describes
    pub account: AccountId,

    /// Assembly timestamp
    pub time: DateTime<Utc>,

    /// Ledger rows, `None` when the sub-query failed
    pub balances: Option<Vec<AssetBalance>>,

    /// Open sell orders, `None` when the sub-query failed
    pub sell_orders: Option<Vec<Order>>,

    /// Open buy orders, `None` when the sub-query failed
    pub buy_orders: Option<Vec<Order>>,

    /// Trades with this account on either side, `None` when the sub-query
    /// failed
    pub trades: Option<Vec<TradeRecord>>,
}
