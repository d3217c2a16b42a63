//! statuspage.io as the status board.
//!
//! Public page data (components, unresolved incidents) is read once at
//! [`StatusPageClient::connect`] and kept as a snapshot; the authenticated
//! management API is used for writes. The service accepts one request per
//! second, so every call queues on a shared [`RequestGate`].

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{Value, json};
use slamon_model::{Impact, Incident, IncidentStatus, StatusValue};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::gate::{DEFAULT_REQUEST_SPACING, RequestGate};
use crate::ports::{Board, BoardError};
use crate::reconcile::RESOLVED_MESSAGE;

pub const DEFAULT_PAGE_ID: &str = "4b9b31tffb5x";
pub const DEFAULT_API_BASE: &str = "https://api.statuspage.io/v1/";
pub const BOARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach a statuspage.io page.
#[derive(Clone)]
pub struct StatusPageConfig {
    pub page_id: String,
    pub api_key: Option<String>,
    /// Management API root, `https://api.statuspage.io/v1/` unless overridden.
    pub api_base: Option<Url>,
    /// Public page API root, `https://<page>.statuspage.io/api/v2/` unless
    /// overridden.
    pub status_base: Option<Url>,
    pub request_spacing: Duration,
}

impl Default for StatusPageConfig {
    fn default() -> Self {
        Self {
            page_id: DEFAULT_PAGE_ID.to_string(),
            api_key: None,
            api_base: None,
            status_base: None,
            request_spacing: DEFAULT_REQUEST_SPACING,
        }
    }
}

impl fmt::Debug for StatusPageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusPageConfig")
            .field("page_id", &self.page_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base.as_ref().map(Url::as_str))
            .field("status_base", &self.status_base.as_ref().map(Url::as_str))
            .field("request_spacing", &self.request_spacing)
            .finish()
    }
}

impl StatusPageConfig {
    pub fn api_base(&self) -> Result<Url, BoardError> {
        match &self.api_base {
            Some(base) => Ok(base.clone()),
            None => parse_base(DEFAULT_API_BASE),
        }
    }

    pub fn status_base(&self) -> Result<Url, BoardError> {
        match &self.status_base {
            Some(base) => Ok(base.clone()),
            None => parse_base(&format!(
                "https://{}.statuspage.io/api/v2/",
                self.page_id
            )),
        }
    }
}

fn parse_base(base: &str) -> Result<Url, BoardError> {
    Url::parse(base).map_err(|err| BoardError::Malformed {
        url: base.to_string(),
        reason: err.to_string(),
    })
}

fn endpoint(base: &Url, path: &str) -> Result<Url, BoardError> {
    base.join(path).map_err(|err| BoardError::Malformed {
        url: format!("{base}{path}"),
        reason: err.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct ComponentRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ComponentsDocument {
    #[serde(default)]
    components: Option<Vec<ComponentRecord>>,
}

#[derive(Debug, Deserialize)]
struct AffectedComponent {
    code: String,
}

#[derive(Debug, Deserialize)]
struct IncidentUpdateRecord {
    #[serde(default)]
    affected_components: Option<Vec<AffectedComponent>>,
}

#[derive(Debug, Deserialize)]
struct IncidentRecord {
    id: String,
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    incident_updates: Option<Vec<IncidentUpdateRecord>>,
    #[serde(default)]
    components: Option<Vec<ComponentRecord>>,
}

#[derive(Debug, Deserialize)]
struct IncidentsDocument {
    #[serde(default)]
    incidents: Option<Vec<IncidentRecord>>,
}

fn incident_status(status: Option<&str>) -> IncidentStatus {
    match status {
        Some("identified") => IncidentStatus::Identified,
        Some("monitoring") => IncidentStatus::Monitoring,
        Some("resolved") | Some("postmortem") => IncidentStatus::Resolved,
        _ => IncidentStatus::Investigating,
    }
}

impl From<IncidentRecord> for Incident {
    fn from(record: IncidentRecord) -> Self {
        let mut affected: Vec<String> = Vec::new();
        let codes = record
            .incident_updates
            .into_iter()
            .flatten()
            .flat_map(|update| update.affected_components.into_iter().flatten())
            .map(|component| component.code)
            .chain(
                record
                    .components
                    .into_iter()
                    .flatten()
                    .map(|component| component.id),
            );
        for code in codes {
            if !affected.contains(&code) {
                affected.push(code);
            }
        }

        Incident {
            id: record.id,
            title: record.name,
            status: incident_status(record.status.as_deref()),
            affected_component_ids: affected,
        }
    }
}

/// Component statuses from a `components.json` document. Statuses outside
/// the monitored vocabulary (e.g. `under_maintenance`) map to `None`.
pub fn parse_components(
    url: &Url,
    value: Value,
) -> Result<HashMap<String, Option<StatusValue>>, BoardError> {
    let document: ComponentsDocument =
        serde_json::from_value(value).map_err(|err| malformed(url, err))?;

    let mut components = HashMap::new();
    for component in document.components.into_iter().flatten() {
        debug!(
            "{} ({}) has status {}",
            component.name, component.id, component.status
        );
        let status = match component.status.parse::<StatusValue>() {
            Ok(status) => Some(status),
            Err(err) => {
                debug!("Ignoring status of component {}: {}", component.id, err);
                None
            }
        };
        components.insert(component.id, status);
    }
    Ok(components)
}

/// Incidents from an `incidents/unresolved.json` document.
pub fn parse_incidents(url: &Url, value: Value) -> Result<Vec<Incident>, BoardError> {
    let document: IncidentsDocument =
        serde_json::from_value(value).map_err(|err| malformed(url, err))?;
    Ok(document
        .incidents
        .into_iter()
        .flatten()
        .map(Incident::from)
        .collect())
}

/// Decodes a response body; a top level `error` key is a rejection.
pub fn parse_response(url: &Url, body: &str) -> Result<Value, BoardError> {
    let value: Value = serde_json::from_str(body).map_err(|err| malformed(url, err))?;
    if let Some(error) = value.get("error") {
        let message = match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        return Err(BoardError::Rejected {
            url: url.to_string(),
            message,
        });
    }
    Ok(value)
}

fn malformed(url: &Url, err: serde_json::Error) -> BoardError {
    BoardError::Malformed {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

pub fn status_payload(status: StatusValue) -> Value {
    json!({ "component": { "status": status.as_str() } })
}

pub fn create_payload(
    component_id: &str,
    title: &str,
    message: &str,
    impact: Impact,
) -> Value {
    json!({
        "incident": {
            "name": title,
            "status": IncidentStatus::Investigating.as_str(),
            "message": message,
            "component_ids": [component_id],
            "impact_override": impact.as_str(),
        }
    })
}

pub fn update_payload(message: &str, impact: Impact) -> Value {
    json!({
        "incident": {
            "message": message,
            "impact_override": impact.as_str(),
        }
    })
}

pub fn resolve_payload() -> Value {
    json!({
        "incident": {
            "status": IncidentStatus::Resolved.as_str(),
            "message": RESOLVED_MESSAGE,
        }
    })
}

#[derive(Debug, Default)]
struct Snapshot {
    components: HashMap<String, Option<StatusValue>>,
    incidents: Vec<Incident>,
}

/// [`Board`] backed by a statuspage.io page.
pub struct StatusPageClient {
    http: reqwest::Client,
    page_id: String,
    api_key: Option<String>,
    api_base: Url,
    status_base: Url,
    gate: RequestGate,
    snapshot: RwLock<Snapshot>,
}

impl fmt::Debug for StatusPageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusPageClient")
            .field("page_id", &self.page_id)
            .field("api_base", &self.api_base.as_str())
            .field("status_base", &self.status_base.as_str())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl StatusPageClient {
    /// Builds the client and loads the component and incident snapshot.
    pub async fn connect(config: StatusPageConfig) -> Result<Self, BoardError> {
        let http = reqwest::Client::builder()
            .timeout(BOARD_TIMEOUT)
            .build()
            .map_err(BoardError::Client)?;

        let client = Self {
            http,
            api_base: config.api_base()?,
            status_base: config.status_base()?,
            page_id: config.page_id,
            api_key: config.api_key,
            gate: RequestGate::new(config.request_spacing),
            snapshot: RwLock::new(Snapshot::default()),
        };
        client.refresh_components().await?;
        client.refresh_incidents().await?;
        Ok(client)
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    async fn call(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Value, BoardError> {
        self.gate
            .run(async {
                let mut request = self.http.request(method, url.clone());
                if let Some(key) = &self.api_key {
                    request = request.header(AUTHORIZATION, format!("OAuth {key}"));
                }
                if let Some(body) = &body {
                    request = request.json(body);
                }

                let transport = |source| BoardError::Transport {
                    url: url.to_string(),
                    source,
                };
                let response = request.send().await.map_err(transport)?;
                let status = response.status();
                let text = response.text().await.map_err(transport)?;
                if !status.is_success() {
                    return Err(BoardError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                        body: text,
                    });
                }
                parse_response(&url, &text)
            })
            .await
    }

    async fn refresh_components(&self) -> Result<(), BoardError> {
        let url = endpoint(&self.status_base, "components.json")?;
        let value = self.call(Method::GET, url.clone(), None).await?;
        let components = parse_components(&url, value)?;
        self.snapshot.write().await.components = components;
        Ok(())
    }

    async fn refresh_incidents(&self) -> Result<(), BoardError> {
        let url = endpoint(&self.status_base, "incidents/unresolved.json")?;
        let value = self.call(Method::GET, url.clone(), None).await?;
        let incidents = parse_incidents(&url, value)?;
        self.snapshot.write().await.incidents = incidents;
        Ok(())
    }

    fn page_endpoint(&self, path: &str) -> Result<Url, BoardError> {
        endpoint(&self.api_base, &format!("pages/{}/{}", self.page_id, path))
    }
}

#[async_trait]
impl Board for StatusPageClient {
    async fn current_status(
        &self,
        component_id: &str,
    ) -> Result<Option<StatusValue>, BoardError> {
        Ok(self
            .snapshot
            .read()
            .await
            .components
            .get(component_id)
            .copied()
            .flatten())
    }

    async fn open_incidents(
        &self,
        component_id: &str,
    ) -> Result<Vec<Incident>, BoardError> {
        Ok(self
            .snapshot
            .read()
            .await
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
        let url = self.page_endpoint(&format!("components/{component_id}.json"))?;
        self.call(Method::PATCH, url, Some(status_payload(status)))
            .await?;
        self.refresh_components().await
    }

    async fn create_incident(
        &self,
        component_id: &str,
        title: &str,
        message: &str,
        impact: Impact,
    ) -> Result<Incident, BoardError> {
        let url = self.page_endpoint("incidents.json")?;
        let payload = create_payload(component_id, title, message, impact);
        debug!("Creating incident: {}", payload);
        let value = self.call(Method::POST, url.clone(), Some(payload)).await?;

        let record: IncidentRecord =
            serde_json::from_value(value).map_err(|err| malformed(&url, err))?;
        let mut incident = Incident::from(record);
        if !incident.affects(component_id) {
            incident.affected_component_ids.push(component_id.to_string());
        }

        self.refresh_incidents().await?;
        Ok(incident)
    }

    async fn update_incident(
        &self,
        incident_id: &str,
        message: &str,
        impact: Impact,
    ) -> Result<(), BoardError> {
        let url = self.page_endpoint(&format!("incidents/{incident_id}.json"))?;
        debug!("Updating incident {}", incident_id);
        self.call(Method::PATCH, url, Some(update_payload(message, impact)))
            .await?;
        Ok(())
    }

    async fn resolve_incident(&self, incident_id: &str) -> Result<(), BoardError> {
        let url = self.page_endpoint(&format!("incidents/{incident_id}.json"))?;
        self.call(Method::PATCH, url, Some(resolve_payload())).await?;
        self.snapshot
            .write()
            .await
            .incidents
            .retain(|incident| incident.id != incident_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://4b9b31tffb5x.statuspage.io/api/v2/components.json").unwrap()
    }

    #[test]
    fn default_bases_follow_the_page_id() {
        let config = StatusPageConfig::default();
        assert_eq!(
            config.status_base().unwrap().as_str(),
            "https://4b9b31tffb5x.statuspage.io/api/v2/"
        );
        assert_eq!(
            config.api_base().unwrap().as_str(),
            "https://api.statuspage.io/v1/"
        );
        let joined = endpoint(
            &config.api_base().unwrap(),
            "pages/4b9b31tffb5x/incidents/abc.json",
        )
        .unwrap();
        assert_eq!(
            joined.as_str(),
            "https://api.statuspage.io/v1/pages/4b9b31tffb5x/incidents/abc.json"
        );
    }

    #[test]
    fn config_debug_hides_the_key() {
        let config = StatusPageConfig {
            api_key: Some("hunter2".to_string()),
            ..StatusPageConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn components_keep_known_statuses() {
        let value = json!({
            "page": { "id": "4b9b31tffb5x" },
            "components": [
                { "id": "bcsflmrp5rgk", "name": "MEPS deterministic", "status": "operational" },
                { "id": "hdt6qj6f7zv5", "name": "MEPS pp", "status": "degraded_performance" },
                { "id": "6bb2dq9t7vx9", "name": "MEPS ensemble", "status": "under_maintenance" }
            ]
        });
        let components = parse_components(&url(), value).unwrap();
        assert_eq!(
            components["bcsflmrp5rgk"],
            Some(StatusValue::Operational)
        );
        assert_eq!(
            components["hdt6qj6f7zv5"],
            Some(StatusValue::DegradedPerformance)
        );
        assert_eq!(components["6bb2dq9t7vx9"], None);
        assert!(!components.contains_key("n1wsnn6gr8p9"));
    }

    #[test]
    fn incidents_collect_affected_components_from_updates() {
        let value = json!({
            "incidents": [
                {
                    "id": "p31zjtct2jer",
                    "name": "MEPS deterministic production",
                    "status": "investigating",
                    "incident_updates": [
                        { "affected_components": [
                            { "code": "bcsflmrp5rgk", "name": "MEPS deterministic" }
                        ] },
                        { "affected_components": null },
                        { "affected_components": [
                            { "code": "bcsflmrp5rgk" },
                            { "code": "hdt6qj6f7zv5" }
                        ] }
                    ]
                },
                { "id": "x", "name": "Scheduled work", "status": "monitoring" }
            ]
        });
        let incidents = parse_incidents(&url(), value).unwrap();
        assert_eq!(incidents.len(), 2);
        assert_eq!(
            incidents[0].affected_component_ids,
            vec!["bcsflmrp5rgk".to_string(), "hdt6qj6f7zv5".to_string()]
        );
        assert_eq!(incidents[0].status, IncidentStatus::Investigating);
        assert!(incidents[1].affected_component_ids.is_empty());
        assert_eq!(incidents[1].status, IncidentStatus::Monitoring);
    }

    #[test]
    fn error_bodies_are_rejections() {
        assert!(matches!(
            parse_response(&url(), r#"{"error": "Unauthorized"}"#),
            Err(BoardError::Rejected { message, .. }) if message == "Unauthorized"
        ));
        assert!(matches!(
            parse_response(&url(), "<html>"),
            Err(BoardError::Malformed { .. })
        ));
        assert!(parse_response(&url(), r#"{"components": []}"#).is_ok());
    }

    #[test]
    fn payloads_match_the_management_api() {
        assert_eq!(
            status_payload(StatusValue::DegradedPerformance),
            json!({ "component": { "status": "degraded_performance" } })
        );
        assert_eq!(
            create_payload("hdt6qj6f7zv5", "MEPS production", "late", Impact::Minor),
            json!({ "incident": {
                "name": "MEPS production",
                "status": "investigating",
                "message": "late",
                "component_ids": ["hdt6qj6f7zv5"],
                "impact_override": "minor",
            } })
        );
        assert_eq!(
            update_payload("later", Impact::None),
            json!({ "incident": { "message": "later", "impact_override": "none" } })
        );
        assert_eq!(
            resolve_payload()["incident"]["status"],
            json!("resolved")
        );
    }
}
