//! # Domain Types
//!
//! Core inventory types shared by the sync client and its subscribers.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockItem     │   │     ItemId      │   │     Money       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (ItemId)    │   │  i64 newtype    │   │  i64 cents      │       │
//! │  │  name, variant  │   │  number or      │   │  number or      │       │
//! │  │  brand, sku     │   │  numeric string │   │  decimal string │       │
//! │  │  price, stock   │   │  on the wire    │   │  on the wire    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! `id` is stable and unique for the item's lifetime. Items are immutable
//! values: an update replaces the whole item in the replica.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Item Identifier
// =============================================================================

/// Stable identity of a stock item.
///
/// The feed is not consistent about whether ids arrive as numbers or
/// strings, so deserialization accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[ts(export)]
pub struct ItemId(i64);

impl ItemId {
    #[inline]
    pub const fn new(id: i64) -> Self {
        ItemId(id)
    }

    #[inline]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        ItemId(id)
    }
}

impl From<i32> for ItemId {
    fn from(id: i32) -> Self {
        ItemId(i64::from(id))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(ItemId)
            .map_err(|_| CoreError::InvalidItemId(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ItemIdVisitor)
    }
}

struct ItemIdVisitor;

impl<'de> Visitor<'de> for ItemIdVisitor {
    type Value = ItemId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer item id")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ItemId, E> {
        Ok(ItemId(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ItemId, E> {
        i64::try_from(v)
            .map(ItemId)
            .map_err(|_| E::custom(CoreError::InvalidItemId(v.to_string())))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ItemId, E> {
        v.parse().map_err(E::custom)
    }
}

// =============================================================================
// Stock Item
// =============================================================================

/// A sellable stock item as mirrored from the server.
///
/// Only `id` is required on the wire; every descriptive attribute falls back
/// to its default so that sparse payloads still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockItem {
    /// Stable identity.
    pub id: ItemId,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Variant label (size, colour, ...).
    #[serde(default)]
    pub variant: Option<String>,

    /// Brand label.
    #[serde(default)]
    pub brand: Option<String>,

    /// Unit price.
    #[serde(default)]
    #[ts(type = "string")]
    pub price: Money,

    /// Units currently in stock.
    #[serde(default)]
    pub stock: i64,

    /// Stock Keeping Unit.
    #[serde(default)]
    pub sku: String,

    /// Whether the item can currently be sold.
    #[serde(default = "default_available")]
    pub is_available: bool,

    /// Parent listing this item is a variant of.
    #[serde(default)]
    pub product_id: Option<ItemId>,
}

fn default_available() -> bool {
    true
}

impl StockItem {
    /// Creates an item with the given id and name; other fields default.
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        StockItem {
            id: id.into(),
            name: name.into(),
            variant: None,
            brand: None,
            price: Money::zero(),
            stock: 0,
            sku: String::new(),
            is_available: default_available(),
            product_id: None,
        }
    }

    /// Returns a copy with a different stock count.
    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }

    /// Returns a copy with a different unit price.
    pub fn with_price(mut self, price: Money) -> Self {
        self.price = price;
        self
    }

    /// Returns true if the item is available and has units on hand.
    pub fn is_in_stock(&self) -> bool {
        self.is_available && self.stock > 0
    }
}
