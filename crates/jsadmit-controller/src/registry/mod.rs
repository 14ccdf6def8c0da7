//! Policy registry.
//!
//! - `unit`: `Policy` and `PolicyUnit` (compiled runtime + active flag).
//! - `store`: `AdmissionRegistry`, per-namespace buckets and lookup order.

pub mod store;
pub mod unit;

pub use store::{AdmissionRegistry, RegistrySettings};
pub use unit::{Policy, PolicyUnit};
