//! Raw daily price data.
//!
//! Vendor files carry one row per trading day with a fixed 13-column layout:
//!
//! ```text
//! Date, Open, High, Low, Close, Volume, Ex-Dividend, Split Ratio,
//! Adj_Open, Adj_High, Adj_Low, Adj_Close, Adj_Volume
//! ```
//!
//! The header line of the file is skipped and columns are assigned by
//! position, so vendor-specific header spellings do not matter.

mod reader;
mod record;

pub use reader::{read_price_csv, read_prices};
pub use record::{PriceField, PriceRecord, PriceSeries};
