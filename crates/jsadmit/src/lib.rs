//! Top-level facade crate for jsadmit.
//!
//! Re-exports the core types and the controller library so embedders and
//! tests can depend on a single crate.

pub mod core {
    pub use jsadmit_core::*;
}

pub mod controller {
    pub use jsadmit_controller::*;
}
