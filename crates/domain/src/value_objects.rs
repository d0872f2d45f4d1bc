//! Value objects shared by carts and orders.

use std::iter::Sum;
use std::ops::{Add, Sub};

use common::AggregateId;
use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new Money amount from whole euros.
    pub fn from_euros(euros: i64) -> Self {
        Self(euros * 100)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the amount multiplied by a quantity.
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * i64::from(quantity))
    }

    /// Returns `percent`% of the amount, rounded half-up to the cent.
    pub fn percent(&self, percent: u32) -> Self {
        let scaled = self.0 * i64::from(percent);
        if scaled >= 0 {
            Self((scaled + 50) / 100)
        } else {
            Self((scaled - 50) / 100)
        }
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}€{}.{:02}", abs / 100, abs % 100)
    }
}

/// A product line in a cart or order.
///
/// Name, image, unit and price are snapshots taken when the line was last
/// priced, so later product edits never alter the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The product this line refers to.
    pub product: AggregateId,

    /// Product name.
    pub name: String,

    /// Product image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Unit label (e.g. "kg", "piece").
    pub unit: String,

    /// Price per unit.
    pub price: Money,

    /// Number of units, always at least 1.
    pub quantity: u32,

    /// `price × quantity`.
    pub total: Money,
}

impl LineItem {
    /// Creates a new line, computing its total.
    pub fn new(
        product: AggregateId,
        name: impl Into<String>,
        image: Option<String>,
        unit: impl Into<String>,
        price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product,
            name: name.into(),
            image,
            unit: unit.into(),
            price,
            quantity,
            total: price.times(quantity),
        }
    }

    /// Returns the same line with a new quantity and recomputed total.
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            total: self.price.times(quantity),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(550).to_string(), "€5.50");
        assert_eq!(Money::from_cents(5).to_string(), "€0.05");
        assert_eq!(Money::from_cents(-1299).to_string(), "-€12.99");
    }

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(Money::from_cents(550).percent(10), Money::from_cents(55));
        assert_eq!(Money::from_cents(125).percent(10), Money::from_cents(13));
        assert_eq!(Money::from_cents(124).percent(10), Money::from_cents(12));
        assert_eq!(Money::from_cents(999).percent(100), Money::from_cents(999));
    }

    #[test]
    fn test_money_arithmetic() {
        let total: Money = [Money::from_cents(400), Money::from_cents(150)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(550));
        assert_eq!(total - Money::from_cents(55), Money::from_cents(495));
        assert_eq!(Money::from_cents(200).times(3), Money::from_euros(6));
    }

    #[test]
    fn test_line_item_total_follows_quantity() {
        let line = LineItem::new(
            AggregateId::new(),
            "Apple",
            None,
            "piece",
            Money::from_cents(200),
            2,
        );
        assert_eq!(line.total, Money::from_cents(400));

        let line = line.with_quantity(5);
        assert_eq!(line.total, Money::from_cents(1000));
    }
}
