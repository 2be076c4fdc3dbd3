use serde::{Deserialize, Serialize};

/// The two symbol families the exchange publishes, told apart by their prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Trading pairs, e.g. `tBTCUSD`.
    Trading,
    /// Funding currencies, e.g. `fUSD`.
    Funding,
}

impl SymbolKind {
    /// Classifies a symbol by its first character.
    pub fn of(symbol: &str) -> Option<Self> {
        match symbol.as_bytes().first() {
            Some(b't') => Some(SymbolKind::Trading),
            Some(b'f') => Some(SymbolKind::Funding),
            _ => None,
        }
    }
}
