//! Strata Core — domain models, error taxonomy and the data-access
//! contracts shared by the resolver and the storage back-ends.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{StrataError, StrataResult};
