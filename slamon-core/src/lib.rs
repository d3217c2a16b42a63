//! # slamon core
//!
//! Decides whether weather model products are published on time and keeps
//! a status board in line with that verdict.
//!
//! ## Overview
//!
//! An evaluation pass goes through three stages:
//!
//! - **Schedule**: [`schedule::Schedule`] works out which run must be
//!   visible by now, given a product's cadence, expected latency and grace
//!   periods.
//! - **Consensus**: every node's catalog is read and
//!   [`consensus::resolve`] keeps the newest run that *all* nodes expose.
//! - **Reconciliation**: [`reconcile::plan`] compares the two, looks at the
//!   board's current component status and open incidents, and derives the
//!   writes that bring the board in line. No state is kept between passes.
//!
//! [`evaluation::Evaluator`] wires the stages together over the
//! [`ports::CatalogSource`] and [`ports::Board`] traits. The [`providers`]
//! module implements them for THREDDS catalogs and statuspage.io.
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use slamon_core::evaluation::Evaluator;
//! use slamon_core::providers::{StatusPageClient, StatusPageConfig, ThreddsCatalog};
//! use slamon_model::{Node, Product};
//!
//! async fn run_once(products: Vec<Product>) -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(ThreddsCatalog::new()?);
//!     let board = Arc::new(StatusPageClient::connect(StatusPageConfig::default()).await?);
//!     let nodes = vec![Node::new("thredds.met.no")];
//!
//!     let report = Evaluator::new(catalog, board, products, nodes)
//!         .evaluate(chrono::Utc::now())
//!         .await;
//!     println!("{} board writes", report.writes());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod consensus;
pub mod evaluation;
pub mod gate;
pub mod ports;
pub mod providers;
pub mod reconcile;
pub mod schedule;

#[cfg(test)]
mod testing;

pub use consensus::ObservationTable;
pub use evaluation::{EvaluationReport, Evaluator, ProductOutcome};
pub use gate::RequestGate;
pub use ports::{Board, BoardError, CatalogError, CatalogSource, DryRunBoard, NodeFetch};
pub use reconcile::{Assessment, BoardAction, Plan, ReconcileError, Reconciler, Severity};
pub use schedule::{Schedule, parse_instant};

pub use slamon_model;
