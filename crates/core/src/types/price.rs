//! Type-safe unit price using decimal arithmetic.
//!
//! Prices never pass through floating point. Line totals and order totals are
//! computed exactly with [`Decimal`]; rounding happens only when a value is
//! projected for display.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::Quantity;

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price is not a valid decimal number")]
    Invalid,
    /// The amount is zero or negative.
    #[error("price must be greater than zero")]
    NotPositive,
    /// The amount has more fractional digits than the currency allows.
    #[error("price must have at most {max} decimal places")]
    TooPrecise {
        /// Maximum number of fractional digits.
        max: u32,
    },
    /// The amount does not fit the price column.
    #[error("price must not exceed {}", Price::MAX)]
    TooLarge,
}

/// A strictly positive unit price in the shop currency.
///
/// ```
/// use emporium_core::{Price, Quantity};
/// use rust_decimal::Decimal;
///
/// let price = Price::new(Decimal::new(1999, 2)).unwrap();
/// let qty = Quantity::new(3).unwrap();
/// assert_eq!(price.line_total(qty), Some(Decimal::new(5997, 2)));
///
/// assert!(Price::new(Decimal::ZERO).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Number of fractional digits in the minor currency unit.
    pub const SCALE: u32 = 2;

    /// Largest accepted amount, the range of a `NUMERIC(12, 2)` column.
    /// 999_999_999_999 is `0xE8_D4A5_0FFF`, split into its low and middle words.
    pub const MAX: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::NotPositive` for zero or negative amounts and
    /// `PriceError::TooPrecise` when the amount has more than two significant
    /// fractional digits. Amounts above [`Price::MAX`] are `PriceError::TooLarge`.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive);
        }
        if amount > Self::MAX {
            return Err(PriceError::TooLarge);
        }
        let normalized = amount.normalize();
        if normalized.scale() > Self::SCALE {
            return Err(PriceError::TooPrecise { max: Self::SCALE });
        }
        Ok(Self(amount))
    }

    /// Parse a price from its decimal string form, e.g. `"19.99"`.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Invalid` if the string is not a decimal, otherwise
    /// the same errors as [`Price::new`].
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let amount: Decimal = s.trim().parse().map_err(|_| PriceError::Invalid)?;
        Self::new(amount)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Exact total for `quantity` units at this price, or `None` if it
    /// overflows [`Decimal`].
    #[must_use]
    pub fn line_total(&self, quantity: Quantity) -> Option<Decimal> {
        self.0.checked_mul(Decimal::from(quantity.get()))
    }
}

/// Round a monetary amount to the minor currency unit for display.
///
/// Midpoints round away from zero, so `0.125` becomes `0.13`.
#[must_use]
pub fn round_for_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(Price::SCALE, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
