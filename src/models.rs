// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            other => Err(CoreError::InvalidInput(format!(
                "unknown role '{}' (use admin|teacher)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Buy,
    Sell,
    /// Teacher-granted cash, exempt from the cash floor.
    Reward,
    /// Plain cash adjustment, subject to the cash floor.
    Cash,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Buy => "buy",
            TxKind::Sell => "sell",
            TxKind::Reward => "reward",
            TxKind::Cash => "cash",
        }
    }
}

impl std::str::FromStr for TxKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "buy" => Ok(TxKind::Buy),
            "sell" => Ok(TxKind::Sell),
            "reward" => Ok(TxKind::Reward),
            "cash" => Ok(TxKind::Cash),
            other => Err(CoreError::InvalidInput(format!(
                "unknown transaction kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Per-month equivalent of a recurring amount at this frequency.
    /// Weekly ×4.345, biweekly ×2.17, monthly ×1, quarterly ÷3, yearly ÷12.
    pub fn monthly_equivalent(&self, worth: Decimal) -> Decimal {
        match self {
            Frequency::Weekly => worth * Decimal::new(4345, 3),
            Frequency::Biweekly => worth * Decimal::new(217, 2),
            Frequency::Monthly => worth,
            Frequency::Quarterly => worth / Decimal::from(3),
            Frequency::Yearly => worth / Decimal::from(12),
        }
    }

    /// The occurrence date one period after `from`.
    pub fn advance(&self, from: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Weekly => from + Duration::weeks(1),
            Frequency::Biweekly => from + Duration::weeks(2),
            Frequency::Monthly => from + Months::new(1),
            Frequency::Quarterly => from + Months::new(3),
            Frequency::Yearly => from + Months::new(12),
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" => Ok(Frequency::Biweekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(CoreError::InvalidInput(format!(
                "unknown frequency '{}' (use weekly|biweekly|monthly|quarterly|yearly)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    pub id: i64,
    pub name: String,
    pub cash_start: Decimal,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub ticker: String,
    pub name: String,
    pub currency: String,
}

/// One immutable ledger entry. `asset_id` is None for pure cash events;
/// `plan_id`/`period_start` identify the savings-plan occurrence that
/// materialized the entry, when there is one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub depot_id: i64,
    pub asset_id: Option<i64>,
    pub kind: TxKind,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub cash_delta: Decimal,
    pub tstamp: DateTime<Utc>,
    pub plan_id: Option<i64>,
    pub period_start: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub asset_id: i64,
    pub ticker: String,
    pub quantity: Decimal,
    /// Remaining average-cost basis of the open quantity.
    pub cost_basis: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    pub cash: Decimal,
    pub positions: Vec<Position>,
}

impl Projection {
    pub fn quantity_of(&self, asset_id: i64) -> Decimal {
        self.positions
            .iter()
            .find(|p| p.asset_id == asset_id)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsPlan {
    pub id: i64,
    pub depot_id: i64,
    pub asset_id: i64,
    pub worth: Decimal,
    pub frequency: Frequency,
    pub created_at: String,
    pub next_due: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotValuePoint {
    pub depot_id: i64,
    pub as_of: NaiveDate,
    pub cash: Decimal,
    pub market_value: Decimal,
}

impl DepotValuePoint {
    pub fn total(&self) -> Decimal {
        self.cash + self.market_value
    }
}

/// Current value plus deltas against the snapshots nearest each horizon.
/// A delta is None when no snapshot exists at or before its horizon —
/// unavailable, not zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueDeltas {
    pub total: Decimal,
    pub cash: Decimal,
    pub diff_1d: Option<Decimal>,
    pub diff_1m: Option<Decimal>,
    pub diff_1y: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
    pub granted_at: String,
}
