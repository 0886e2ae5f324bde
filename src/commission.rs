// Commission Engine - pure fee-split calculation
//
// Referentially transparent: the same (gross, fee) input always yields
// the same split, which is what makes reconciliation repair safe to
// re-run against already-seen gateway records.

use serde::{Deserialize, Serialize};

use crate::error::CommissionError;

/// Per-seller commission configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Platform commission rate in [0, 1)
    pub rate: f64,
}

impl FeeConfig {
    pub fn new(rate: f64) -> Result<Self, CommissionError> {
        if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
            return Err(CommissionError::InvalidFeeConfig { rate });
        }
        Ok(Self { rate })
    }
}

/// Result of splitting a gross payment between platform and seller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub platform_fee_cents: i64,
    pub net_credit_cents: i64,
}

/// Rate scale for integer fee arithmetic: parts per million
const RATE_SCALE: i64 = 1_000_000;

/// Split a gross amount into platform fee and seller net credit.
///
/// The fee is `gross * rate` rounded half-up on integer cents; the net
/// credit is the exact remainder, so fee + net always equals gross.
pub fn compute_split(gross_amount_cents: i64, fee: FeeConfig) -> Result<Split, CommissionError> {
    if gross_amount_cents <= 0 {
        return Err(CommissionError::InvalidAmount {
            amount_cents: gross_amount_cents,
        });
    }
    if !fee.rate.is_finite() || !(0.0..1.0).contains(&fee.rate) {
        return Err(CommissionError::InvalidFeeConfig { rate: fee.rate });
    }

    // Snap the rate to parts per million once, then round half-up in
    // pure integer arithmetic. Multiplying cents by the raw f64 rate
    // can land an exact half-cent product just below .5 and round the
    // wrong way.
    let rate_ppm = (fee.rate * RATE_SCALE as f64).round() as i64;
    let platform_fee_cents = ((gross_amount_cents as i128 * rate_ppm as i128
        + (RATE_SCALE as i128) / 2)
        / RATE_SCALE as i128) as i64;
    let net_credit_cents = gross_amount_cents - platform_fee_cents;

    Ok(Split {
        platform_fee_cents,
        net_credit_cents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sums_to_gross() {
        let rates = [0.0, 0.05, 0.10, 0.125, 0.333, 0.9999];
        let amounts = [1, 2, 99, 100, 1999, 2000, 123_456_789];

        for &rate in &rates {
            let fee = FeeConfig::new(rate).unwrap();
            for &gross in &amounts {
                let split = compute_split(gross, fee).unwrap();
                assert_eq!(
                    split.platform_fee_cents + split.net_credit_cents,
                    gross,
                    "rate={} gross={}",
                    rate,
                    gross
                );
                assert!(split.platform_fee_cents >= 0);
                assert!(split.net_credit_cents >= 0);
            }
        }
    }

    #[test]
    fn test_rounding_half_up() {
        // 10 * 0.05 = 0.5 -> rounds up to 1
        let split = compute_split(10, FeeConfig::new(0.05).unwrap()).unwrap();
        assert_eq!(split.platform_fee_cents, 1);
        assert_eq!(split.net_credit_cents, 9);

        // 10 * 0.12 = 1.2 -> rounds down to 1
        let split = compute_split(10, FeeConfig::new(0.12).unwrap()).unwrap();
        assert_eq!(split.platform_fee_cents, 1);

        // 2000 * 0.10 = 200 exactly
        let split = compute_split(2000, FeeConfig::new(0.10).unwrap()).unwrap();
        assert_eq!(split.platform_fee_cents, 200);
        assert_eq!(split.net_credit_cents, 1800);
    }

    #[test]
    fn test_exact_half_cent_products_round_up() {
        // These products are exact halves in decimal but sit just
        // below .5 in f64, so float rounding would go the wrong way.

        // 50 * 0.29 = 14.5 -> 15
        let split = compute_split(50, FeeConfig::new(0.29).unwrap()).unwrap();
        assert_eq!(split.platform_fee_cents, 15);
        assert_eq!(split.net_credit_cents, 35);

        // 90 * 0.35 = 31.5 -> 32
        let split = compute_split(90, FeeConfig::new(0.35).unwrap()).unwrap();
        assert_eq!(split.platform_fee_cents, 32);
        assert_eq!(split.net_credit_cents, 58);

        // 30 * 0.15 = 4.5 -> 5
        let split = compute_split(30, FeeConfig::new(0.15).unwrap()).unwrap();
        assert_eq!(split.platform_fee_cents, 5);
        assert_eq!(split.net_credit_cents, 25);
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let fee = FeeConfig::new(0.0725).unwrap();
        let first = compute_split(13_337, fee).unwrap();
        for _ in 0..100 {
            assert_eq!(compute_split(13_337, fee).unwrap(), first);
        }
    }

    #[test]
    fn test_rejects_non_positive_gross() {
        let fee = FeeConfig::new(0.10).unwrap();
        assert_eq!(
            compute_split(0, fee),
            Err(CommissionError::InvalidAmount { amount_cents: 0 })
        );
        assert_eq!(
            compute_split(-500, fee),
            Err(CommissionError::InvalidAmount { amount_cents: -500 })
        );
    }

    #[test]
    fn test_rejects_invalid_rate() {
        assert!(FeeConfig::new(1.0).is_err());
        assert!(FeeConfig::new(-0.01).is_err());
        assert!(FeeConfig::new(f64::NAN).is_err());
        assert!(FeeConfig::new(0.0).is_ok());
        assert!(FeeConfig::new(0.9999).is_ok());
    }
}
