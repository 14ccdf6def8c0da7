//! Live event dispatch.
//!
//! Routes watched-object changes to the lifecycle hooks of every active
//! policy interested in them.

pub mod live;

pub use live::LiveDispatcher;
