//! Fractional position sizing.
//!
//! The asset is divisible, so a buy may take any positive quantity up to
//! `leverage * cash / price`. With the default leverage of 1 a full-cash buy
//! leaves zero free cash. There is no commission and no lot rounding.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("cannot size a position with cash {cash} at price {price}")]
    InvalidSizing { cash: f64, price: f64 },
    #[error("leverage must be positive and finite, got {leverage}")]
    InvalidLeverage { leverage: f64 },
    #[error("requested size {size} is not positive")]
    InvalidRequest { size: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractionalSizer {
    leverage: f64,
}

impl Default for FractionalSizer {
    fn default() -> Self {
        Self { leverage: 1.0 }
    }
}

impl FractionalSizer {
    pub fn with_leverage(leverage: f64) -> Result<Self, SizingError> {
        if !(leverage.is_finite() && leverage > 0.0) {
            return Err(SizingError::InvalidLeverage { leverage });
        }
        Ok(Self { leverage })
    }

    /// Largest fractional size obtainable with `cash` at `price`.
    pub fn max_size(&self, cash: f64, price: f64) -> Result<f64, SizingError> {
        let valid = cash.is_finite() && price.is_finite() && cash > 0.0 && price > 0.0;
        if !valid {
            return Err(SizingError::InvalidSizing { cash, price });
        }
        Ok(self.leverage * (cash / price))
    }

    /// Size for an entry: the full-cash size, or the requested size capped at it.
    pub fn resolve(
        &self,
        requested: Option<f64>,
        cash: f64,
        price: f64,
    ) -> Result<f64, SizingError> {
        let max = self.max_size(cash, price)?;
        match requested {
            None => Ok(max),
            Some(size) if size > 0.0 && size.is_finite() => Ok(size.min(max)),
            Some(size) => Err(SizingError::InvalidRequest { size }),
        }
    }
}
