use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{DiscountUnit, Product};

/// Converts a stored discount into a whole percentage clamped to `[0, 100]`.
pub fn discount_percent(discount: Decimal, unit: DiscountUnit) -> Decimal {
    let percent = match unit {
        DiscountUnit::Percent => discount,
        DiscountUnit::Fraction => discount * Decimal::ONE_HUNDRED,
    };
    percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// Applies a discount to a price.
pub fn discounted_price(price: Decimal, discount: Decimal, unit: DiscountUnit) -> Decimal {
    let percent = discount_percent(discount, unit);
    price * (Decimal::ONE_HUNDRED - percent) / Decimal::ONE_HUNDRED
}

/// Display pricing derived from a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTag {
    pub original: Decimal,
    pub discount_percent: Decimal,
    pub final_price: Decimal,
}

impl PriceTag {
    pub fn for_product(product: &Product) -> Self {
        Self {
            original: product.price,
            discount_percent: discount_percent(product.discount, product.discount_unit),
            final_price: discounted_price(product.price, product.discount, product.discount_unit),
        }
    }

    pub fn has_discount(&self) -> bool {
        self.discount_percent > Decimal::ZERO
    }
}

/// Formats an amount as Indonesian Rupiah without fraction digits, e.g. `Rp 1.500.000`.
///
/// The currency symbol is separated by a non-breaking space.
pub fn format_idr(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}Rp\u{a0}{grouped}")
}
