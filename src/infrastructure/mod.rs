//! Concrete adapters for the domain ports: an in-memory ledger and a
//! scripted payout gateway, both used by the CLI and by tests.

pub mod in_memory;
pub mod simulated;
