//! Incident reconciliation for one product.
//!
//! Each pass compares the consensus publication with what the schedule
//! requires and derives, from the board's current state alone, the writes
//! needed to bring the component status and its incident in line. Nothing is
//! remembered between passes; a half-applied pass is finished by the next.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use slamon_model::{Impact, Incident, Product, Publication, StatusValue};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ports::{Board, BoardError};
use crate::schedule::Schedule;

/// Message posted when an incident is closed.
pub const RESOLVED_MESSAGE: &str =
    "Our monitoring system has detected that this incident has been resolved.";

/// How far behind schedule a product is. Both levels degrade the
/// component; they differ only in the incident message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Behind the required run.
    Delayed,
    /// Past the error grace, or a whole cycle behind.
    SignificantlyDelayed,
}

impl Severity {
    pub fn target_status(self) -> StatusValue {
        StatusValue::DegradedPerformance
    }

    pub fn impact(self) -> Impact {
        Impact::Minor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    OnTime,
    Behind(Severity),
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assessment::OnTime => f.write_str("on time"),
            Assessment::Behind(Severity::Delayed) => f.write_str("delayed"),
            Assessment::Behind(Severity::SignificantlyDelayed) => {
                f.write_str("significantly delayed")
            }
        }
    }
}

/// Compares the consensus publication with the schedule requirement.
///
/// An unknown consensus is never on time. It escalates only once the
/// requirement is critically late, since it cannot be compared with the
/// previous run.
pub fn assess(
    product: &Product,
    consensus: Option<Publication>,
    required: Publication,
    now: DateTime<Utc>,
) -> Assessment {
    let schedule = Schedule::of(product);
    let critically_late = schedule.is_critically_late(required, &now);
    match consensus {
        Some(consensus) if consensus >= required => Assessment::OnTime,
        Some(consensus) => {
            if critically_late || consensus < schedule.previous(required) {
                Assessment::Behind(Severity::SignificantlyDelayed)
            } else {
                Assessment::Behind(Severity::Delayed)
            }
        }
        None if critically_late => {
            Assessment::Behind(Severity::SignificantlyDelayed)
        }
        None => Assessment::Behind(Severity::Delayed),
    }
}

/// Incident text for a product that is behind schedule.
pub fn delay_message(
    product: &Product,
    required: Publication,
    severity: Severity,
) -> String {
    let detail = match severity {
        Severity::Delayed => "Normally we would expect it by now.",
        Severity::SignificantlyDelayed => {
            "This is a significant delay and we are sorry about any inconvenience."
        }
    };
    format!(
        "{} results from model run based on analysis of {} is not yet published. {} Please use earlier forecast.",
        product.name(),
        required.bulletin_label(),
        detail
    )
}

/// A single write against the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardAction {
    SetStatus {
        component_id: String,
        status: StatusValue,
    },
    CreateIncident {
        component_id: String,
        title: String,
        message: String,
        impact: Impact,
    },
    UpdateIncident {
        incident_id: String,
        message: String,
        impact: Impact,
    },
    ResolveIncident {
        incident_id: String,
    },
}

impl fmt::Display for BoardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardAction::SetStatus {
                component_id,
                status,
            } => write!(f, "set {component_id} to {status}"),
            BoardAction::CreateIncident { title, impact, .. } => {
                write!(f, "create incident '{title}' ({impact})")
            }
            BoardAction::UpdateIncident {
                incident_id,
                impact,
                ..
            } => write!(f, "update incident {incident_id} ({impact})"),
            BoardAction::ResolveIncident { incident_id } => {
                write!(f, "resolve incident {incident_id}")
            }
        }
    }
}

/// What the board currently says about a product's component.
#[derive(Debug, Clone, Default)]
pub struct BoardView {
    pub status: Option<StatusValue>,
    pub open_incidents: Vec<Incident>,
}

/// Decision for one product in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub product: String,
    pub required: Publication,
    pub consensus: Option<Publication>,
    pub assessment: Assessment,
    pub actions: Vec<BoardAction>,
}

/// Derives the board writes for `product` without touching the board.
///
/// The first open incident carrying the product's title is the managed one.
/// Any further incidents with that title are duplicates and get resolved.
pub fn plan(
    product: &Product,
    consensus: Option<Publication>,
    now: DateTime<Utc>,
    view: &BoardView,
) -> Plan {
    let required = Schedule::of(product).required(&now);
    let assessment = assess(product, consensus, required, now);
    let component_id = product.component_id().to_string();
    let title = product.incident_title();

    let mut managed = view
        .open_incidents
        .iter()
        .filter(|incident| incident.status.is_open() && incident.title == title);
    let open_incident = managed.next();
    let duplicates: Vec<&Incident> = managed.collect();

    if let Some(incident) = open_incident {
        debug!("Found open incident {} for {}", incident.id, product.name());
    }

    let mut actions = Vec::new();
    match assessment {
        Assessment::OnTime => {
            if view.status != Some(StatusValue::Operational) {
                actions.push(BoardAction::SetStatus {
                    component_id: component_id.clone(),
                    status: StatusValue::Operational,
                });
            }
            if let Some(incident) = open_incident {
                actions.push(BoardAction::ResolveIncident {
                    incident_id: incident.id.clone(),
                });
            }
        }
        Assessment::Behind(severity) => {
            let status = severity.target_status();
            let message = delay_message(product, required, severity);
            let impact = severity.impact();
            match open_incident {
                // Severity changes that keep the status leave the incident
                // untouched.
                Some(incident) => {
                    if view.status != Some(status) {
                        actions.push(BoardAction::SetStatus {
                            component_id: component_id.clone(),
                            status,
                        });
                        actions.push(BoardAction::UpdateIncident {
                            incident_id: incident.id.clone(),
                            message,
                            impact,
                        });
                    }
                }
                None => {
                    actions.push(BoardAction::SetStatus {
                        component_id: component_id.clone(),
                        status,
                    });
                    actions.push(BoardAction::CreateIncident {
                        component_id: component_id.clone(),
                        title: title.clone(),
                        message,
                        impact,
                    });
                }
            }
        }
    }

    for duplicate in duplicates {
        warn!(
            "Incident {} duplicates '{}' on {}; resolving it",
            duplicate.id, title, component_id
        );
        actions.push(BoardAction::ResolveIncident {
            incident_id: duplicate.id.clone(),
        });
    }

    Plan {
        product: product.name().to_string(),
        required,
        consensus,
        assessment,
        actions,
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("reading board state for '{product}' failed")]
    Read {
        product: String,
        #[source]
        source: BoardError,
    },

    #[error("board write {step} of {total} for '{product}' failed ({action})")]
    Write {
        product: String,
        action: BoardAction,
        step: usize,
        total: usize,
        #[source]
        source: BoardError,
    },
}

/// Executes `plan` in order, stopping at the first failed write.
pub async fn apply<B>(board: &B, plan: &Plan) -> Result<(), ReconcileError>
where
    B: Board + ?Sized,
{
    let total = plan.actions.len();
    for (index, action) in plan.actions.iter().enumerate() {
        let result = match action {
            BoardAction::SetStatus {
                component_id,
                status,
            } => board.set_status(component_id, *status).await,
            BoardAction::CreateIncident {
                component_id,
                title,
                message,
                impact,
            } => board
                .create_incident(component_id, title, message, *impact)
                .await
                .map(|incident| {
                    debug!("Opened incident {} for {}", incident.id, plan.product);
                }),
            BoardAction::UpdateIncident {
                incident_id,
                message,
                impact,
            } => board.update_incident(incident_id, message, *impact).await,
            BoardAction::ResolveIncident { incident_id } => {
                board.resolve_incident(incident_id).await
            }
        };

        match result {
            Ok(()) => info!("{}: {}", plan.product, action),
            Err(source) => {
                return Err(ReconcileError::Write {
                    product: plan.product.clone(),
                    action: action.clone(),
                    step: index + 1,
                    total,
                    source,
                });
            }
        }
    }
    Ok(())
}

/// Reads the board, plans and applies for one product at a time.
pub struct Reconciler<B: ?Sized> {
    board: Arc<B>,
}

impl<B: ?Sized> Clone for Reconciler<B> {
    fn clone(&self) -> Self {
        Self {
            board: Arc::clone(&self.board),
        }
    }
}

impl<B: ?Sized> fmt::Debug for Reconciler<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("board", &std::any::type_name::<B>())
            .finish()
    }
}

impl<B> Reconciler<B>
where
    B: Board + ?Sized,
{
    pub fn new(board: Arc<B>) -> Self {
        Self { board }
    }

    pub async fn view(&self, product: &Product) -> Result<BoardView, ReconcileError> {
        let read_error = |source| ReconcileError::Read {
            product: product.name().to_string(),
            source,
        };
        let status = self
            .board
            .current_status(product.component_id())
            .await
            .map_err(read_error)?;
        let open_incidents = self
            .board
            .open_incidents(product.component_id())
            .await
            .map_err(read_error)?;
        Ok(BoardView {
            status,
            open_incidents,
        })
    }

    /// One reconciliation step for `product`. A failed write leaves the
    /// remaining actions to the next pass.
    pub async fn reconcile(
        &self,
        product: &Product,
        consensus: Option<Publication>,
        now: DateTime<Utc>,
    ) -> Result<Plan, ReconcileError> {
        let view = self.view(product).await?;
        let plan = plan(product, consensus, now, &view);
        debug!(
            "{} requires {}, consensus {}, {}",
            product.name(),
            plan.required,
            plan.consensus
                .map(|publication| publication.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            plan.assessment
        );
        apply(self.board.as_ref(), &plan).await?;
        Ok(plan)
    }
}
