//! Boundaries between the evaluation core and the outside world.
//!
//! The core reads publication facts from a [`CatalogSource`] and reconciles
//! a [`Board`]. Both are async traits so the HTTP adapters and the in-memory
//! fakes used in tests are interchangeable.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use slamon_model::{Impact, Incident, IncidentStatus, Node, Product, Publication, StatusValue};
use thiserror::Error;
use tracing::info;

/// Failure reaching a node or making sense of what it served.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed catalog from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("invalid filename pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
}

/// Failure talking to the status board.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("board request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("board answered {url} with HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("board returned an unreadable response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("board reported an error for {url}: {message}")]
    Rejected { url: String, message: String },
}

/// Per product outcome of fetching one node, keyed by product name.
///
/// Products sharing a catalog share the failure too, hence the `Arc`.
pub type NodeFetch =
    BTreeMap<String, Result<Option<Publication>, Arc<CatalogError>>>;

/// Source of "latest publication per product" facts for a node.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Latest publication of every product as exposed by `node`.
    ///
    /// Products missing from the returned map are treated as absent.
    async fn fetch(&self, node: &Node, products: &[Product]) -> NodeFetch;
}

/// The external status and incident board.
#[async_trait]
pub trait Board: Send + Sync {
    /// Current status of a component, `None` if the board does not know it.
    async fn current_status(
        &self,
        component_id: &str,
    ) -> Result<Option<StatusValue>, BoardError>;

    /// Unresolved incidents affecting a component, in board order.
    async fn open_incidents(
        &self,
        component_id: &str,
    ) -> Result<Vec<Incident>, BoardError>;

    async fn set_status(
        &self,
        component_id: &str,
        status: StatusValue,
    ) -> Result<(), BoardError>;

    /// Opens an incident in the `investigating` state.
    async fn create_incident(
        &self,
        component_id: &str,
        title: &str,
        message: &str,
        impact: Impact,
    ) -> Result<Incident, BoardError>;

    async fn update_incident(
        &self,
        incident_id: &str,
        message: &str,
        impact: Impact,
    ) -> Result<(), BoardError>;

    /// Resolving an incident that is already resolved is not an error.
    async fn resolve_incident(&self, incident_id: &str) -> Result<(), BoardError>;
}

#[async_trait]
impl<B: Board + ?Sized> Board for Arc<B> {
    async fn current_status(
        &self,
        component_id: &str,
    ) -> Result<Option<StatusValue>, BoardError> {
        (**self).current_status(component_id).await
    }

    async fn open_incidents(
        &self,
        component_id: &str,
    ) -> Result<Vec<Incident>, BoardError> {
        (**self).open_incidents(component_id).await
    }

    async fn set_status(
        &self,
        component_id: &str,
        status: StatusValue,
    ) -> Result<(), BoardError> {
        (**self).set_status(component_id, status).await
    }

    async fn create_incident(
        &self,
        component_id: &str,
        title: &str,
        message: &str,
        impact: Impact,
    ) -> Result<Incident, BoardError> {
        (**self)
            .create_incident(component_id, title, message, impact)
            .await
    }

    async fn update_incident(
        &self,
        incident_id: &str,
        message: &str,
        impact: Impact,
    ) -> Result<(), BoardError> {
        (**self).update_incident(incident_id, message, impact).await
    }

    async fn resolve_incident(&self, incident_id: &str) -> Result<(), BoardError> {
        (**self).resolve_incident(incident_id).await
    }
}

/// Board wrapper that reads through to `inner` but only logs writes.
pub struct DryRunBoard<B> {
    inner: B,
}

impl<B> DryRunBoard<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B> fmt::Debug for DryRunBoard<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DryRunBoard")
            .field("inner", &std::any::type_name::<B>())
            .finish()
    }
}

#[async_trait]
impl<B: Board> Board for DryRunBoard<B> {
    async fn current_status(
        &self,
        component_id: &str,
    ) -> Result<Option<StatusValue>, BoardError> {
        self.inner.current_status(component_id).await
    }

    async fn open_incidents(
        &self,
        component_id: &str,
    ) -> Result<Vec<Incident>, BoardError> {
        self.inner.open_incidents(component_id).await
    }

    async fn set_status(
        &self,
        component_id: &str,
        status: StatusValue,
    ) -> Result<(), BoardError> {
        info!("DRYRUN: would set component {component_id} to {status}");
        Ok(())
    }

    async fn create_incident(
        &self,
        component_id: &str,
        title: &str,
        message: &str,
        impact: Impact,
    ) -> Result<Incident, BoardError> {
        info!(
            "DRYRUN: would create incident '{title}' on {component_id} with impact {impact}: {message}"
        );
        Ok(Incident {
            id: "dry-run".to_string(),
            title: title.to_string(),
            status: IncidentStatus::Investigating,
            affected_component_ids: vec![component_id.to_string()],
        })
    }

    async fn update_incident(
        &self,
        incident_id: &str,
        message: &str,
        impact: Impact,
    ) -> Result<(), BoardError> {
        info!(
            "DRYRUN: would update incident {incident_id} with impact {impact}: {message}"
        );
        Ok(())
    }

    async fn resolve_incident(&self, incident_id: &str) -> Result<(), BoardError> {
        info!("DRYRUN: would resolve incident {incident_id}");
        Ok(())
    }
}
