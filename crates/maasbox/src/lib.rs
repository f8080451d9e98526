//! maasbox
//!
//! Reconciles the NetBox inventory of a site against what MaaS and the
//! machines' BMCs report. Validators compare one field at a time and
//! produce a report of discrepancies, updaters push the expected values
//! back to NetBox, and creators bootstrap interface, address and cable
//! records for freshly deployed machines.
//!
//! NetBox stays the source of truth for everything this tool does not
//! observe; nothing is ever deleted.

pub mod clients;
pub mod config;
pub mod context;
pub mod creators;
pub mod observability;
pub mod updaters;
pub mod validators;
pub mod version;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use context::Context;
pub use validators::Field;
