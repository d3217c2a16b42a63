//! Core data model definitions shared across slamon crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod board;
pub mod error;
pub mod node;
pub mod product;
pub mod publication;

pub use board::{Impact, Incident, IncidentStatus, StatusValue};
pub use error::{ModelError, Result as ModelResult};
pub use node::Node;
pub use product::{Cadence, Product, ProductBuilder};
pub use publication::Publication;
