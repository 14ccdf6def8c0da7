//! jsadmit controller library entry.
//!
//! Wires dynamic resource watching, the sandboxed script runtime, the policy
//! registry and activation workflow, and the webhook transport into one
//! service. Consumed by the binary (`main.rs`) and by integration tests.

pub mod activation;
pub mod admission;
pub mod app_state;
pub mod cache;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod obs;
pub mod ops;
pub mod registry;
pub mod router;
pub mod script;
pub mod transport;
pub mod watch;
