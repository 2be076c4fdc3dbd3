use crate::enums::SymbolKind;
use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Number of fields in a trading ticker row (`t` symbols).
const TRADING_ROW_LEN: usize = 11;
/// Minimum number of fields in a funding ticker row (`f` symbols).
const FUNDING_ROW_LEN: usize = 14;

/// A top-of-book and daily statistics snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub kind: SymbolKind,
    /// Flash return rate. Only present for funding tickers.
    pub frr: Option<Decimal>,
    pub bid: Decimal,
    /// Funding tickers only.
    pub bid_period: Option<i64>,
    pub bid_size: Decimal,
    pub ask: Decimal,
    /// Funding tickers only.
    pub ask_period: Option<i64>,
    pub ask_size: Decimal,
    pub daily_change: Decimal,
    pub daily_change_relative: Decimal,
    pub last_price: Decimal,
    pub volume: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

impl Ticker {
    /// Builds a ticker from one row of the `/tickers` REST response.
    ///
    /// The row layout depends on the symbol prefix, so the symbol (field 0)
    /// is read first and decides which offsets apply.
    pub fn from_raw(row: &[Value]) -> Result<Self, CoreError> {
        let symbol = row
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidInput("ticker".into(), "missing symbol".into()))?
            .to_string();

        match SymbolKind::of(&symbol) {
            Some(SymbolKind::Trading) => {
                ensure_len(&symbol, row, TRADING_ROW_LEN)?;
                Ok(Ticker {
                    kind: SymbolKind::Trading,
                    frr: None,
                    bid: decimal_at(&symbol, row, 1)?,
                    bid_period: None,
                    bid_size: decimal_at(&symbol, row, 2)?,
                    ask: decimal_at(&symbol, row, 3)?,
                    ask_period: None,
                    ask_size: decimal_at(&symbol, row, 4)?,
                    daily_change: decimal_at(&symbol, row, 5)?,
                    daily_change_relative: decimal_at(&symbol, row, 6)?,
                    last_price: decimal_at(&symbol, row, 7)?,
                    volume: decimal_at(&symbol, row, 8)?,
                    high: decimal_at(&symbol, row, 9)?,
                    low: decimal_at(&symbol, row, 10)?,
                    symbol,
                })
            }
            Some(SymbolKind::Funding) => {
                ensure_len(&symbol, row, FUNDING_ROW_LEN)?;
                Ok(Ticker {
                    kind: SymbolKind::Funding,
                    frr: Some(decimal_at(&symbol, row, 1)?),
                    bid: decimal_at(&symbol, row, 2)?,
                    bid_period: row[3].as_i64(),
                    bid_size: decimal_at(&symbol, row, 4)?,
                    ask: decimal_at(&symbol, row, 5)?,
                    ask_period: row[6].as_i64(),
                    ask_size: decimal_at(&symbol, row, 7)?,
                    daily_change: decimal_at(&symbol, row, 8)?,
                    daily_change_relative: decimal_at(&symbol, row, 9)?,
                    last_price: decimal_at(&symbol, row, 10)?,
                    volume: decimal_at(&symbol, row, 11)?,
                    high: decimal_at(&symbol, row, 12)?,
                    low: decimal_at(&symbol, row, 13)?,
                    symbol,
                })
            }
            None => Err(CoreError::UnsupportedSymbol(symbol)),
        }
    }

    /// Midpoint between best bid and best ask.
    pub fn mid_price(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::from(2)
    }
}

/// All tickers returned by a single `/tickers` request, in response order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub tickers: Vec<Ticker>,
}

impl TickerSnapshot {
    /// Decodes every row of a raw REST response. Rows that are not arrays are skipped.
    pub fn from_raw_rows(rows: &[Value]) -> Result<Self, CoreError> {
        let tickers = rows
            .iter()
            .filter_map(Value::as_array)
            .map(|row| Ticker::from_raw(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tickers })
    }

    pub fn get(&self, symbol: &str) -> Option<&Ticker> {
        self.tickers.iter().find(|t| t.symbol == symbol)
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

fn ensure_len(symbol: &str, row: &[Value], expected: usize) -> Result<(), CoreError> {
    if row.len() < expected {
        return Err(CoreError::InvalidInput(
            symbol.to_string(),
            format!("expected at least {} fields, got {}", expected, row.len()),
        ));
    }
    Ok(())
}

// JSON numbers go through their textual form so values like 0.1 stay exact.
fn decimal_at(symbol: &str, row: &[Value], index: usize) -> Result<Decimal, CoreError> {
    let invalid = |reason: String| CoreError::InvalidInput(format!("{}[{}]", symbol, index), reason);
    let number = row
        .get(index)
        .and_then(Value::as_number)
        .ok_or_else(|| invalid(format!("expected a number, got {:?}", row.get(index))))?;
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn trading_row() -> Value {
        json!(["tBTCUSD", 10645, 73.9, 10646, 17.3, -91, -0.0085, 10646, 11653.4, 10911, 10446])
    }

    fn funding_row() -> Value {
        json!([
            "fUSD", 0.00027, 0.00024, 30, 1525390.5, 0.00021, 2, 41096.2, 0.00003, 0.1,
            0.00022, 142066880.25, 0.0003, 0.00011, null, null, 12436985.5
        ])
    }

    #[test]
    fn decodes_trading_ticker() {
        let row = trading_row();
        let ticker = Ticker::from_raw(row.as_array().unwrap()).unwrap();
        assert_eq!(ticker.symbol, "tBTCUSD");
        assert_eq!(ticker.kind, SymbolKind::Trading);
        assert_eq!(ticker.frr, None);
        assert_eq!(ticker.bid, dec!(10645));
        assert_eq!(ticker.bid_size, dec!(73.9));
        assert_eq!(ticker.daily_change_relative, dec!(-0.0085));
        assert_eq!(ticker.low, dec!(10446));
        assert_eq!(ticker.mid_price(), dec!(10645.5));
    }

    #[test]
    fn decodes_funding_ticker() {
        let row = funding_row();
        let ticker = Ticker::from_raw(row.as_array().unwrap()).unwrap();
        assert_eq!(ticker.kind, SymbolKind::Funding);
        assert_eq!(ticker.frr, Some(dec!(0.00027)));
        assert_eq!(ticker.bid_period, Some(30));
        assert_eq!(ticker.ask_period, Some(2));
        assert_eq!(ticker.daily_change_relative, dec!(0.1));
        assert_eq!(ticker.low, dec!(0.00011));
    }

    #[test]
    fn short_row_is_rejected() {
        let row = json!(["tBTCUSD", 1, 2, 3]);
        let err = Ticker::from_raw(row.as_array().unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(ref s, _) if s == "tBTCUSD"));
    }

    #[test]
    fn non_numeric_field_is_rejected() {
        let mut row = trading_row();
        row[3] = json!("oops");
        let err = Ticker::from_raw(row.as_array().unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(ref s, _) if s == "tBTCUSD[3]"));
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        let row = json!(["BTCUSD", 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let err = Ticker::from_raw(row.as_array().unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedSymbol(s) if s == "BTCUSD"));
    }

    #[test]
    fn snapshot_skips_non_array_rows() {
        let rows = vec![trading_row(), json!({"not": "a row"}), funding_row()];
        let snapshot = TickerSnapshot::from_raw_rows(&rows).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("fUSD").is_some());
        assert!(snapshot.get("tETHUSD").is_none());
    }
}
