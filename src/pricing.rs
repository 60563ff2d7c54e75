//! Rule-of-thumb buy/sell targets for a vehicle.

use serde::Serialize;
use ts_rs::TS;

use crate::data::models::Vehicle;

const DEFAULT_PRICE: f64 = 20_000.0;
/// Assumed model year when the listing has none.
const DEFAULT_YEAR: i32 = 2020;
const SEASON_FACTOR: f64 = 1.05;
const RARE_MAKES: &[&str] = &["porsche", "ferrari", "aston martin", "lotus", "alfa romeo"];
const HIGH_MILEAGE: i32 = 60_000;

/// What the estimate is computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingInput {
    pub year: Option<i32>,
    pub make: Option<String>,
    pub miles: Option<i32>,
    pub price: Option<i32>,
}

impl From<&Vehicle> for PricingInput {
    fn from(v: &Vehicle) -> Self {
        Self {
            year: v.year,
            make: v.make.clone(),
            miles: v.miles,
            price: v.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricingEstimate {
    pub target_sale_low: f64,
    pub target_sale_high: f64,
    pub target_buy_low: f64,
    pub target_buy_high: f64,
    pub est_recon_cost: f64,
    /// `(min, max)` expected profit.
    pub est_profit_range: (f64, f64),
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Estimate targets, aging the vehicle against `current_year`.
pub fn estimate(input: &PricingInput, current_year: i32) -> PricingEstimate {
    let miles = input.miles.unwrap_or(0).max(0);
    let age = (current_year - input.year.unwrap_or(DEFAULT_YEAR)).max(0);

    let condition = 1.0 - (miles as f64 / 200_000.0 * 0.4).min(0.4);
    let base = input.price.map(f64::from).unwrap_or(DEFAULT_PRICE) * condition;

    let rare = input
        .make
        .as_deref()
        .map(|m| RARE_MAKES.contains(&m.trim().to_lowercase().as_str()))
        .unwrap_or(false);
    let rarity = if rare { 1.15 } else { 1.0 };

    let sale_low = cents(base * rarity * SEASON_FACTOR * 0.95);
    let sale_high = cents(base * rarity * SEASON_FACTOR * 1.10);

    let recon = 1500.0 + f64::from(age) * 150.0 + if miles < HIGH_MILEAGE { 0.0 } else { 1000.0 };

    let buy_high = cents(sale_low * 0.78 - recon);
    let buy_low = cents(sale_low * 0.62 - recon);

    let min_profit = cents(sale_low - (buy_high + recon));
    let max_profit = cents(sale_high - (buy_low + recon));

    PricingEstimate {
        target_sale_low: sale_low,
        target_sale_high: sale_high,
        target_buy_low: buy_low.max(0.0),
        target_buy_high: buy_high.max(0.0),
        est_recon_cost: cents(recon),
        est_profit_range: (min_profit, max_profit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.005
    }

    #[test]
    fn test_rare_make_low_miles() {
        let est = estimate(
            &PricingInput {
                year: Some(2019),
                make: Some("Porsche".into()),
                miles: Some(0),
                price: Some(100_000),
            },
            2025,
        );
        // 100000 * 1.15 * 1.05 = 120750
        assert!(close(est.target_sale_low, 114_712.5));
        assert!(close(est.target_sale_high, 132_825.0));
        assert!(close(est.est_recon_cost, 2_400.0));
        assert!(close(est.target_buy_high, 87_075.75));
        assert!(close(est.target_buy_low, 68_721.75));
    }

    #[test]
    fn test_defaults_and_mileage_penalty() {
        let est = estimate(
            &PricingInput {
                miles: Some(300_000),
                ..Default::default()
            },
            2025,
        );
        // condition bottoms out at 0.6; 20000 * 0.6 * 1.05 = 12600
        assert!(close(est.target_sale_low, 11_970.0));
        // 1500 + 5 * 150 + 1000
        assert!(close(est.est_recon_cost, 3_250.0));
    }

    #[test]
    fn test_buy_targets_floor_at_zero() {
        let est = estimate(
            &PricingInput {
                year: Some(1960),
                price: Some(1_000),
                ..Default::default()
            },
            2025,
        );
        assert_eq!(est.target_buy_low, 0.0);
        assert_eq!(est.target_buy_high, 0.0);
        assert!(est.est_profit_range.0 > 0.0);
    }

    #[test]
    fn test_future_year_has_no_age() {
        let est = estimate(
            &PricingInput {
                year: Some(2030),
                ..Default::default()
            },
            2025,
        );
        assert!(close(est.est_recon_cost, 1_500.0));
    }
}
