//! Webhook transport.
//!
//! Decodes `AdmissionReview` bodies, runs the policy chains off the async
//! runtime and encodes the response review. Undecodable requests are
//! allowed; script failures are denied.

pub mod webhook;
