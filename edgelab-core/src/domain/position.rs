use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Open position in one instrument. Positive quantity is long, negative is short.
///
/// A position only exists while `quantity != 0`; the engine removes it on full exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_timestamp: NaiveDate,
    /// Most favourable close since entry: highest for longs, lowest for shorts.
    pub best_price: f64,
    /// Entry commissions not yet charged to a closing trade.
    #[serde(default)]
    pub fees: f64,
}

impl Position {
    pub fn new(instrument: impl Into<String>, quantity: f64, entry_price: f64, entry_timestamp: NaiveDate) -> Self {
        Self {
            instrument: instrument.into(),
            quantity,
            entry_price,
            entry_timestamp,
            best_price: entry_price,
            fees: 0.0,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Gross notional exposure at `price`.
    pub fn exposure(&self, price: f64) -> f64 {
        (self.quantity * price).abs()
    }

    /// Open pnl at `price`, net of the entry fees still carried.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price) - self.fees
    }

    /// Return since entry in the position's favour (positive = gain for longs and shorts alike).
    pub fn return_pct(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        let raw = (price - self.entry_price) / self.entry_price;
        if self.is_short() {
            -raw
        } else {
            raw
        }
    }

    /// Fold `price` into the best price seen since entry.
    pub fn track(&mut self, price: f64) {
        if (self.is_long() && price > self.best_price) || (self.is_short() && price < self.best_price) {
            self.best_price = price;
        }
    }

    /// Give-back from the best price as a fraction of it (0 at the best price).
    pub fn retracement(&self, price: f64) -> f64 {
        if self.best_price <= 0.0 {
            return 0.0;
        }
        let raw = (self.best_price - price) / self.best_price;
        if self.is_short() {
            -raw
        } else {
            raw
        }
    }

    /// Add `quantity` in the same direction at `price`; entry becomes the weighted average.
    pub fn scale_in(&mut self, quantity: f64, price: f64) {
        let total = self.quantity + quantity;
        if total != 0.0 {
            self.entry_price =
                (self.quantity * self.entry_price + quantity * price) / total;
        }
        self.quantity = total;
        self.track(price);
    }
}
