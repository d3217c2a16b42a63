//! One evaluation pass over every configured product.
//!
//! Node catalogs are fetched concurrently, one task per node, and joined
//! before any consensus is computed. Products are then reconciled
//! independently of each other; a failure for one product or node is logged
//! and never aborts the pass.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use slamon_model::{Node, Product, Publication};
use tracing::{debug, error, info, warn};

use crate::consensus::ObservationTable;
use crate::ports::{Board, CatalogSource};
use crate::reconcile::{Plan, ReconcileError, Reconciler};
use crate::schedule::Schedule;

/// Result of reconciling one product in a pass.
#[derive(Debug)]
pub struct ProductOutcome {
    pub product: String,
    pub required: Publication,
    pub consensus: Option<Publication>,
    pub result: Result<Plan, ReconcileError>,
}

/// Everything one pass decided and did.
#[derive(Debug)]
pub struct EvaluationReport {
    pub evaluated_at: DateTime<Utc>,
    pub observations: ObservationTable,
    pub outcomes: Vec<ProductOutcome>,
}

impl EvaluationReport {
    pub fn outcome(&self, product: &str) -> Option<&ProductOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.product == product)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ReconcileError)> {
        self.outcomes.iter().filter_map(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .map(|err| (outcome.product.as_str(), err))
        })
    }

    /// Number of board writes applied across all products.
    pub fn writes(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .map(|plan| plan.actions.len())
            .sum()
    }
}

/// Drives evaluation passes for a fixed set of products and nodes.
pub struct Evaluator<C: ?Sized, B: ?Sized> {
    catalog: Arc<C>,
    reconciler: Reconciler<B>,
    products: Arc<[Product]>,
    nodes: Vec<Node>,
}

impl<C: ?Sized, B: ?Sized> fmt::Debug for Evaluator<C, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("catalog", &std::any::type_name::<C>())
            .field("reconciler", &self.reconciler)
            .field(
                "products",
                &self.products.iter().map(Product::name).collect::<Vec<_>>(),
            )
            .field("nodes", &self.nodes)
            .finish()
    }
}

impl<C, B> Evaluator<C, B>
where
    C: CatalogSource + ?Sized + 'static,
    B: Board + ?Sized,
{
    pub fn new(
        catalog: Arc<C>,
        board: Arc<B>,
        products: Vec<Product>,
        nodes: Vec<Node>,
    ) -> Self {
        Self {
            catalog,
            reconciler: Reconciler::new(board),
            products: products.into(),
            nodes,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Fetches every node concurrently and tabulates what each one exposes.
    pub async fn gather(&self) -> ObservationTable {
        let mut table =
            ObservationTable::new(self.nodes.iter().map(|node| node.name.clone()));

        let tasks = self.nodes.iter().cloned().map(|node| {
            let catalog = Arc::clone(&self.catalog);
            let products = Arc::clone(&self.products);
            tokio::spawn(async move { catalog.fetch(&node, &products).await })
        });
        let results = join_all(tasks).await;

        for (node, result) in self.nodes.iter().zip(results) {
            let mut fetch = match result {
                Ok(fetch) => fetch,
                Err(err) => {
                    error!("Fetching from {} failed: {}", node.name, err);
                    continue;
                }
            };

            for product in self.products.iter() {
                let observation = match fetch.remove(product.name()) {
                    Some(Ok(Some(publication))) => {
                        debug!(
                            "Most recent bulletin for {} on {} is {}",
                            product.name(),
                            node.name,
                            publication
                        );
                        Some(publication)
                    }
                    Some(Ok(None)) | None => {
                        warn!(
                            "No bulletin for {} found on {}",
                            product.name(),
                            node.name
                        );
                        None
                    }
                    Some(Err(err)) => {
                        warn!(
                            "Fetching {} from {} failed: {}",
                            product.name(),
                            node.name,
                            err
                        );
                        None
                    }
                };
                table.record(product.name(), &node.name, observation);
            }
        }

        table
    }

    /// Runs one full pass at `now`.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> EvaluationReport {
        info!(
            "Evaluating {} products on {} nodes at {}",
            self.products.len(),
            self.nodes.len(),
            now
        );
        let observations = self.gather().await;

        debug!("Deciding on most recent bulletin that all nodes can agree on for each model");
        let outcomes = join_all(self.products.iter().map(|product| {
            let consensus = observations.consensus(product.name());
            async move {
                match consensus {
                    Some(publication) => debug!(
                        "Most recent bulletin for {} is {}",
                        product.name(),
                        publication
                    ),
                    None => warn!(
                        "Nodes do not agree on any bulletin for {}",
                        product.name()
                    ),
                }

                let result = self.reconciler.reconcile(product, consensus, now).await;
                if let Err(err) = &result {
                    error!("Reconciling {} failed: {}", product.name(), error_chain(err));
                }
                ProductOutcome {
                    product: product.name().to_string(),
                    required: Schedule::of(product).required(&now),
                    consensus,
                    result,
                }
            }
        }))
        .await;

        EvaluationReport {
            evaluated_at: now,
            observations,
            outcomes,
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
