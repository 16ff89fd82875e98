//! Billing core: the fee calculator and the ledger read-model.

pub mod fees;
pub mod ledger;

pub use fees::{
    calculate_fees, fallback_quote, quote_or_fallback, FeeError, FeeQuote,
    FALLBACK_UNIT_NETWORK_FEE,
};
pub use ledger::{BillingLedger, LedgerSnapshot};
