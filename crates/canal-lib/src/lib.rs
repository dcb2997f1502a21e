//! Ledger core for bidirectional payment channels: on-chain open, settle and
//! arbitrate, off-chain reconciliation bills and multi-hop transfer proofs,
//! compound interest on locked funds, and atomic channel/on-chain exchange.
//!
//! Every state transition is an `apply`/`recover` pair over the [`store::ChainState`]
//! contract; a block rolls back by recovering its actions in reverse order.

pub mod channel;
pub mod errors;
pub mod store;

pub use canal_types as types;
pub use errors::{ChannelError, Result};
