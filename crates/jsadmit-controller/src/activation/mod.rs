//! Policy activation.
//!
//! - `policy_source`: decoding policy custom resources.
//! - `workflow`: `PolicyActivation`, which turns policy resource events into
//!   registered, backfilled and active policy units.

pub mod policy_source;
pub mod workflow;

pub use policy_source::PolicyDefinition;
pub use workflow::PolicyActivation;
