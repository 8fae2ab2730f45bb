//! Monetary types for price and quantity representation.

use rust_decimal::Decimal;

/// Price represented as a Decimal for precision.
pub type Price = Decimal;

/// Share quantity represented as a Decimal for precision.
pub type Volume = Decimal;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_and_volume_are_decimal() {
        let price: Price = dec!(10010);
        let volume: Volume = dec!(3);

        assert_eq!(price * volume, dec!(30030));
    }
}
