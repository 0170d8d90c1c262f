//! Symbol metadata, populated once from the exchange-info response.

/// Trading-enabled and sizing rules for the configured symbol.
///
/// Invariant: once constructed (i.e. once `symbols_ready` flips), these fields
/// never change for the lifetime of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolMetadata {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub trading: bool,
    pub min_qty: Option<f64>,
    pub min_notional: Option<f64>,
}
