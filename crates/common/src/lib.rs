//! Error type and wire protocol shared by the `pgcrypto-svc` service and its
//! clients.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
