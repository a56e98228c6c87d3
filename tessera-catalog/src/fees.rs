use serde::{Deserialize, Serialize};
use tessera_core::event::{AdditionalFee, PaymentMethod};
use tessera_core::order::FeeBreakdown;

/// A single fee amount, either a percentage of some base or a flat value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeeRule {
    pub is_percentage: bool,
    pub value: f64,
}

impl FeeRule {
    /// Amount in minor units. Percentages are applied as `base * value / 100`
    /// and truncated toward zero, flat values are truncated as well.
    pub fn amount_on(&self, base: i64) -> i64 {
        if self.is_percentage {
            (base as f64 * self.value / 100.0) as i64
        } else {
            self.value as i64
        }
    }
}

impl From<&AdditionalFee> for FeeRule {
    fn from(fee: &AdditionalFee) -> Self {
        Self { is_percentage: fee.is_percentage, value: fee.value }
    }
}

impl From<&PaymentMethod> for FeeRule {
    fn from(method: &PaymentMethod) -> Self {
        Self { is_percentage: method.is_percentage, value: method.additional_fee }
    }
}

/// Pure price computation for an order.
pub struct FeeCalculator;

impl FeeCalculator {
    pub fn base_price(unit_price: i64, item_count: u32) -> i64 {
        unit_price * i64::from(item_count)
    }

    /// Tax and admin fee buckets over `base_price`, before any payment surcharge.
    pub fn apply_rules(base_price: i64, rules: &[AdditionalFee]) -> FeeBreakdown {
        let mut breakdown = FeeBreakdown {
            total_price: base_price,
            ..FeeBreakdown::default()
        };

        for rule in rules {
            let amount = FeeRule::from(rule).amount_on(base_price);
            match (rule.is_tax, rule.is_percentage) {
                (true, pct) => {
                    breakdown.total_tax += amount;
                    if pct {
                        breakdown.tax_percentage += rule.value;
                    }
                }
                (false, pct) => {
                    breakdown.total_admin_fee += amount;
                    if pct {
                        breakdown.admin_fee_percentage += rule.value;
                    }
                }
            }
        }

        breakdown.grand_total = breakdown.total_price + breakdown.total_tax + breakdown.total_admin_fee;
        breakdown
    }

    /// Full breakdown including the payment method surcharge, which is taken
    /// on the subtotal after tax and admin fee.
    pub fn calculate(
        unit_price: i64,
        item_count: u32,
        rules: &[AdditionalFee],
        payment_method: &PaymentMethod,
    ) -> FeeBreakdown {
        let mut breakdown = Self::apply_rules(Self::base_price(unit_price, item_count), rules);
        breakdown.pg_additional_fee = FeeRule::from(payment_method).amount_on(breakdown.grand_total);
        breakdown.grand_total += breakdown.pg_additional_fee;

        tracing::debug!(
            total_price = breakdown.total_price,
            total_tax = breakdown.total_tax,
            total_admin_fee = breakdown.total_admin_fee,
            pg_additional_fee = breakdown.pg_additional_fee,
            grand_total = breakdown.grand_total,
            "Computed order fees"
        );
        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee(name: &str, is_tax: bool, is_percentage: bool, value: f64) -> AdditionalFee {
        AdditionalFee { name: name.to_string(), is_tax, is_percentage, value }
    }

    fn method(is_percentage: bool, value: f64) -> PaymentMethod {
        PaymentMethod {
            code: "VA_BCA".to_string(),
            name: "BCA Virtual Account".to_string(),
            is_active: true,
            is_paused: false,
            additional_fee: value,
            is_percentage,
        }
    }

    #[test]
    fn test_tax_and_admin_fee_before_surcharge() {
        let rules = vec![fee("PPN", true, true, 11.0), fee("Admin", false, false, 5000.0)];
        let breakdown = FeeCalculator::apply_rules(100_000, &rules);

        assert_eq!(breakdown.total_tax, 11_000);
        assert_eq!(breakdown.total_admin_fee, 5_000);
        assert_eq!(breakdown.grand_total, 116_000);
        assert_eq!(breakdown.tax_percentage, 11.0);
        assert_eq!(breakdown.admin_fee_percentage, 0.0);
    }

    #[test]
    fn test_percentage_surcharge_on_subtotal() {
        let rules = vec![fee("PPN", true, true, 11.0), fee("Admin", false, false, 5000.0)];
        let breakdown = FeeCalculator::calculate(50_000, 2, &rules, &method(true, 1.5));

        assert_eq!(breakdown.total_price, 100_000);
        assert_eq!(breakdown.pg_additional_fee, 1_740);
        assert_eq!(breakdown.grand_total, 117_740);
    }

    #[test]
    fn test_flat_surcharge() {
        let breakdown = FeeCalculator::calculate(75_000, 1, &[], &method(false, 4000.0));
        assert_eq!(breakdown.pg_additional_fee, 4_000);
        assert_eq!(breakdown.grand_total, 79_000);
    }

    #[test]
    fn test_amounts_are_truncated_not_rounded() {
        // 33333 * 11% = 3666.63, flat 2500.9
        let rules = vec![fee("PPN", true, true, 11.0), fee("Service", false, false, 2500.9)];
        let breakdown = FeeCalculator::apply_rules(33_333, &rules);

        assert_eq!(breakdown.total_tax, 3_666);
        assert_eq!(breakdown.total_admin_fee, 2_500);
        assert_eq!(breakdown.grand_total, 33_333 + 3_666 + 2_500);
    }

    #[test]
    fn test_rules_compose_additively() {
        let rules = vec![
            fee("PPN", true, true, 11.0),
            fee("Entertainment tax", true, true, 10.0),
            fee("Platform", false, true, 2.5),
            fee("Handling", false, false, 1000.0),
        ];
        let breakdown = FeeCalculator::apply_rules(200_000, &rules);

        assert_eq!(breakdown.total_tax, 22_000 + 20_000);
        assert_eq!(breakdown.total_admin_fee, 5_000 + 1_000);
        assert_eq!(breakdown.tax_percentage, 21.0);
        assert_eq!(breakdown.admin_fee_percentage, 2.5);
    }
}
