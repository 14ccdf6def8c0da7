//! Admission decisions over ordered policy units.
//!
//! - `verdict`: reading a hook's raw result (`Allowed`, `Message`, `Result`).
//! - `decision`: mutate/validate chains producing an `AdmissionDecision`.
//!
//! Both chains are blocking and run hooks in the order given.

pub mod decision;
pub mod verdict;

pub use decision::{mutate, validate};
pub use verdict::HookVerdict;
