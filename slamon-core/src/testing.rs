//! In-memory fakes for the ports, shared by unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use slamon_model::{
    Cadence, Impact, Incident, IncidentStatus, Node, Product, Publication,
    StatusValue,
};
use tokio::sync::Mutex;
use url::Url;

use crate::ports::{Board, BoardError, CatalogError, CatalogSource, NodeFetch};

pub(crate) fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub(crate) fn publication(h: u32) -> Publication {
    Publication::new(utc(2024, 3, 1, h, 0))
}

/// Hourly runs, 45 minutes latency, default grace periods.
pub(crate) fn hourly_product(name: &str, component_id: &str) -> Product {
    Product::builder(name, component_id)
        .cadence(Cadence::every(1).unwrap())
        .expected_latency(TimeDelta::minutes(45))
        .catalog_url(Url::parse("https://thredds.example/catalog.xml").unwrap())
        .filename_pattern("test_%Y%m%dT%HZ.nc")
        .build()
        .unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Write {
    SetStatus(String, StatusValue),
    Create {
        component_id: String,
        title: String,
        message: String,
        impact: Impact,
    },
    Update {
        incident_id: String,
        message: String,
        impact: Impact,
    },
    Resolve(String),
}

#[derive(Debug, Default)]
struct BoardState {
    statuses: HashMap<String, StatusValue>,
    incidents: Vec<Incident>,
    writes: Vec<Write>,
    next_id: u32,
    failing_components: HashSet<String>,
    fail_creates: bool,
}

/// Board kept in memory that records every write.
#[derive(Debug, Default)]
pub(crate) struct MemoryBoard {
    state: Mutex<BoardState>,
}

impl MemoryBoard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn with_status(
        self,
        component_id: &str,
        status: StatusValue,
    ) -> Self {
        self.state
            .lock()
            .await
            .statuses
            .insert(component_id.to_string(), status);
        self
    }

    pub(crate) async fn with_incident(self, id: &str, title: &str, component_id: &str) -> Self {
        self.state.lock().await.incidents.push(Incident {
            id: id.to_string(),
            title: title.to_string(),
            status: IncidentStatus::Investigating,
            affected_component_ids: vec![component_id.to_string()],
        });
        self
    }

    /// Every call touching `component_id` fails with a transport-like error.
    pub(crate) async fn failing_for(self, component_id: &str) -> Self {
        self.state
            .lock()
            .await
            .failing_components
            .insert(component_id.to_string());
        self
    }

    pub(crate) async fn failing_creates(self) -> Self {
        self.state.lock().await.fail_creates = true;
        self
    }

    pub(crate) async fn writes(&self) -> Vec<Write> {
        self.state.lock().await.writes.clone()
    }

    pub(crate) async fn clear_writes(&self) {
        self.state.lock().await.writes.clear();
    }

    pub(crate) async fn status(&self, component_id: &str) -> Option<StatusValue> {
        self.state.lock().await.statuses.get(component_id).copied()
    }

    pub(crate) async fn incident(&self, id: &str) -> Option<Incident> {
        self.state
            .lock()
            .await
            .incidents
            .iter()
            .find(|incident| incident.id == id)
            .cloned()
    }

    fn check(state: &BoardState, component_id: &str) -> Result<(), BoardError> {
        if state.failing_components.contains(component_id) {
            return Err(BoardError::Status {
                url: format!("memory://components/{component_id}"),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Board for MemoryBoard {
    async fn current_status(
        &self,
        component_id: &str,
    ) -> Result<Option<StatusValue>, BoardError> {
        let state = self.state.lock().await;
        Self::check(&state, component_id)?;
        Ok(state.statuses.get(component_id).copied())
    }

    async fn open_incidents(
        &self,
        component_id: &str,
    ) -> Result<Vec<Incident>, BoardError> {
        let state = self.state.lock().await;
        Self::check(&state, component_id)?;
        Ok(state
            .incidents
            .iter()
            .filter(|incident| incident.status.is_open())
            .filter(|incident| incident.affects(component_id))
            .cloned()
            .collect())
    }

    async fn set_status(
        &self,
        component_id: &str,
        status: StatusValue,
    ) -> Result<(), BoardError> {
        let mut state = self.state.lock().await;
        Self::check(&state, component_id)?;
        state.statuses.insert(component_id.to_string(), status);
        state
            .writes
            .push(Write::SetStatus(component_id.to_string(), status));
        Ok(())
    }

    async fn create_incident(
        &self,
        component_id: &str,
        title: &str,
        message: &str,
        impact: Impact,
    ) -> Result<Incident, BoardError> {
        let mut state = self.state.lock().await;
        Self::check(&state, component_id)?;
        if state.fail_creates {
            return Err(BoardError::Rejected {
                url: "memory://incidents".to_string(),
                message: "incident creation refused".to_string(),
            });
        }
        state.next_id += 1;
        let incident = Incident {
            id: format!("inc-{}", state.next_id),
            title: title.to_string(),
            status: IncidentStatus::Investigating,
            affected_component_ids: vec![component_id.to_string()],
        };
        state.incidents.push(incident.clone());
        state.writes.push(Write::Create {
            component_id: component_id.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            impact,
        });
        Ok(incident)
    }

    async fn update_incident(
        &self,
        incident_id: &str,
        message: &str,
        impact: Impact,
    ) -> Result<(), BoardError> {
        self.state.lock().await.writes.push(Write::Update {
            incident_id: incident_id.to_string(),
            message: message.to_string(),
            impact,
        });
        Ok(())
    }

    async fn resolve_incident(&self, incident_id: &str) -> Result<(), BoardError> {
        let mut state = self.state.lock().await;
        if let Some(incident) = state
            .incidents
            .iter_mut()
            .find(|incident| incident.id == incident_id)
        {
            incident.status = IncidentStatus::Resolved;
        }
        state.writes.push(Write::Resolve(incident_id.to_string()));
        Ok(())
    }
}

/// What a fake node serves for a product.
#[derive(Debug, Clone)]
pub(crate) enum Served {
    Latest(Publication),
    Nothing,
    Unreachable,
    Panic,
}

/// Catalog answering from a fixed node → product → [`Served`] table.
#[derive(Debug, Default)]
pub(crate) struct StaticCatalog {
    served: Mutex<BTreeMap<String, BTreeMap<String, Served>>>,
}

impl StaticCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn serve(&self, node: &str, product: &str, served: Served) {
        self.served
            .lock()
            .await
            .entry(node.to_string())
            .or_default()
            .insert(product.to_string(), served);
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch(&self, node: &Node, products: &[Product]) -> NodeFetch {
        let served = self.served.lock().await;
        let per_node = served.get(&node.name).cloned().unwrap_or_default();
        drop(served);

        let mut fetch = NodeFetch::new();
        for product in products {
            let outcome = match per_node.get(product.name()) {
                Some(Served::Latest(publication)) => Ok(Some(*publication)),
                Some(Served::Nothing) | None => Ok(None),
                Some(Served::Unreachable) => Err(Arc::new(CatalogError::Status {
                    url: format!("memory://{}/catalog.xml", node.name),
                    status: 502,
                })),
                Some(Served::Panic) => panic!("node {} exploded", node.name),
            };
            fetch.insert(product.name().to_string(), outcome);
        }
        fetch
    }
}
