//! Item pricing using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// List and sale price of an inventory item.
///
/// Amounts are in the store currency's standard unit (dollars, not cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrices {
    pub full_price: Decimal,
    pub sale_price: Decimal,
}

impl ItemPrices {
    /// Create a new price pair.
    #[must_use]
    pub const fn new(full_price: Decimal, sale_price: Decimal) -> Self {
        Self {
            full_price,
            sale_price,
        }
    }

    /// The price a customer pays today.
    #[must_use]
    pub fn effective(&self) -> Decimal {
        self.full_price.min(self.sale_price)
    }

    /// Whether the sale price undercuts the list price.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.sale_price < self.full_price
    }

    /// Amount saved against the list price (zero when not on sale).
    #[must_use]
    pub fn discount(&self) -> Decimal {
        (self.full_price - self.effective()).max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(full: i64, sale: i64) -> ItemPrices {
        ItemPrices::new(Decimal::new(full, 2), Decimal::new(sale, 2))
    }

    #[test]
    fn test_effective_price_prefers_sale() {
        let p = prices(129_999, 99_999);
        assert_eq!(p.effective(), Decimal::new(99_999, 2));
        assert!(p.is_on_sale());
        assert_eq!(p.discount(), Decimal::new(30_000, 2));
    }

    #[test]
    fn test_sale_price_above_list_is_ignored() {
        let p = prices(50_000, 60_000);
        assert_eq!(p.effective(), Decimal::new(50_000, 2));
        assert!(!p.is_on_sale());
        assert_eq!(p.discount(), Decimal::ZERO);
    }

    #[test]
    fn test_prices_serialize_as_strings() {
        let json = serde_json::to_value(prices(1_999, 1_499)).expect("serialize");
        assert_eq!(json["full_price"], "19.99");
        assert_eq!(json["sale_price"], "14.99");
    }
}
