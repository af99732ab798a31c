//! Platform commission arithmetic.
//!
//! All amounts are minor currency units (cents). A single [`CommissionRate`]
//! drives both the live seller transfer and the admin revenue reports.

use serde::Serialize;
use utoipa::ToSchema;

/// 4.99%, expressed in basis points.
pub const DEFAULT_COMMISSION_BPS: u32 = 499;

const BPS_SCALE: i128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionRate {
    bps: u32,
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self {
            bps: DEFAULT_COMMISSION_BPS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CommissionSplit {
    pub total: i64,
    pub admin_share: i64,
    pub seller_share: i64,
}

impl CommissionRate {
    pub fn from_bps(bps: u32) -> anyhow::Result<Self> {
        if bps as i128 > BPS_SCALE {
            anyhow::bail!("commission rate {bps} bps exceeds 100%");
        }
        Ok(Self { bps })
    }

    pub fn bps(&self) -> u32 {
        self.bps
    }

    /// Admin share of `amount`, rounded half away from zero.
    pub fn admin_share(&self, amount: i64) -> i64 {
        let scaled = amount as i128 * self.bps as i128;
        let half = BPS_SCALE / 2;
        let rounded = if scaled >= 0 {
            (scaled + half) / BPS_SCALE
        } else {
            (scaled - half) / BPS_SCALE
        };
        rounded as i64
    }

    pub fn split(&self, amount: i64) -> CommissionSplit {
        let admin_share = self.admin_share(amount);
        CommissionSplit {
            total: amount,
            admin_share,
            seller_share: amount - admin_share,
        }
    }
}

/// Converts a decimal major-unit price (e.g. `12.34`) into minor units.
/// Returns `None` for non-finite or out-of-range values.
pub fn to_minor_units(price: f64) -> Option<i64> {
    if !price.is_finite() {
        return None;
    }
    let cents = (price * 100.0).round();
    if cents.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_dollars_splits_at_default_rate() {
        let split = CommissionRate::default().split(10_000);
        assert_eq!(split.admin_share, 499);
        assert_eq!(split.seller_share, 9_501);
        assert_eq!(split.total, 10_000);
    }

    #[test]
    fn shares_always_sum_to_total() {
        let rate = CommissionRate::default();
        for amount in [0, 1, 11, 99, 1_001, 123_457, 9_999_999] {
            let split = rate.split(amount);
            assert_eq!(split.admin_share + split.seller_share, amount);
        }
    }

    #[test]
    fn admin_share_rounds_half_up() {
        // 50 * 0.0499 = 2.495
        assert_eq!(CommissionRate::default().admin_share(50), 2);
        // 150 * 0.0499 = 7.485
        assert_eq!(CommissionRate::default().admin_share(150), 7);
        let rate = CommissionRate::from_bps(500).unwrap();
        // 10 * 0.05 = 0.5
        assert_eq!(rate.admin_share(10), 1);
    }

    #[test]
    fn rejects_rate_above_hundred_percent() {
        assert!(CommissionRate::from_bps(10_001).is_err());
        assert!(CommissionRate::from_bps(10_000).is_ok());
    }

    #[test]
    fn minor_units_round_to_nearest_cent() {
        assert_eq!(to_minor_units(30.0), Some(3_000));
        assert_eq!(to_minor_units(19.999), Some(2_000));
        assert_eq!(to_minor_units(0.1 + 0.2), Some(30));
        assert_eq!(to_minor_units(f64::NAN), None);
        assert_eq!(to_minor_units(f64::INFINITY), None);
    }
}
