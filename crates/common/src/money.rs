//! Money represented in integer cents.

use serde::{Deserialize, Serialize};

/// ISO-4217 style currency code.
///
/// The engine stores and compares currencies but never converts between
/// them; a payment in a different currency than its order is recorded as
/// given (a reconciliation concern, not an engine concern).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Creates a currency code, uppercased.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    /// US dollars.
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::usd()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money amount in cents to avoid floating point issues.
///
/// Amounts may be negative: refund payments are recorded as negative
/// mirrors of the payments they reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    ///
    /// Panics on `i64` overflow, as do [`Add`](std::ops::Add) and
    /// [`Sub`](std::ops::Sub): a wrapped money amount must never be
    /// persisted.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self
                .cents
                .checked_mul(i64::from(quantity))
                .expect("money multiplication overflowed"),
        }
    }

    /// Returns the negated amount (used for refund records).
    pub fn negate(&self) -> Money {
        Money {
            cents: self
                .cents
                .checked_neg()
                .expect("money negation overflowed"),
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dollars = (self.cents / 100).abs();
        let rem = (self.cents % 100).abs();
        if self.cents < 0 {
            write!(f, "-${}.{:02}", dollars, rem)
        } else {
            write!(f, "${}.{:02}", dollars, rem)
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self
                .cents
                .checked_add(rhs.cents)
                .expect("money addition overflowed"),
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self
                .cents
                .checked_sub(rhs.cents)
                .expect("money subtraction overflowed"),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
