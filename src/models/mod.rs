pub mod ledger;
pub mod transaction;

pub use ledger::{LedgerEntry, NewLedgerEntry};
pub use transaction::{PaymentMethod, Transaction, TransactionStatus};
