//! statuspage-watch: terminal client for the status page.
//!
//! Mounts live incident/service views against the backend and re-renders them
//! on every change until interrupted. Also wraps the admin write calls.
//!
//! ## Subcommands
//!
//! - `incidents` / `services`: live list views
//! - `incident <ID>` / `service <ID>`: live detail views; exit once deleted
//! - `endpoint`: print the live endpoint derived from the base address
//! - `create-*`, `edit-*`, `delete-*`: admin-only writes

mod logging;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use statuspage_core::{
    resolve_client_config, ClientConfig, EntityKind, IncidentForm, IncidentStatus, LinkedService,
    LiveCollection, LiveError, LiveRecord, LiveView, RecordId, Result, Role, ServiceForm,
    ServiceStatus, StaticCredentials, StatusApi, ViewConfig, ViewHandle, ViewState, ViewStore,
    ViewerContext, WsConnector,
};
use statuspage_protocol::live_endpoint;
use tokio::sync::watch;

const UNMOUNT_GRACE: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "statuspage-watch")]
#[command(about = "Live incident and service views for the status page")]
#[command(version)]
struct Cli {
    /// API base address (overrides the config file and STATUSPAGE_API_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Alternate config file (default: ~/.statuspage/client.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Organization to scope live events to, instead of the one from /user/
    #[arg(long, global = true, value_name = "ORG_ID")]
    org: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the incident list
    Incidents,

    /// Watch the service list
    Services,

    /// Watch one incident
    Incident {
        #[arg(value_name = "ID")]
        id: RecordId,
    },

    /// Watch one service
    Service {
        #[arg(value_name = "ID")]
        id: RecordId,
    },

    /// Print the live endpoint derived from the base address
    Endpoint,

    /// Create an incident (admin)
    CreateIncident(IncidentArgs),

    /// Replace an incident's fields (admin)
    EditIncident {
        #[arg(value_name = "ID")]
        id: RecordId,
        #[command(flatten)]
        form: IncidentArgs,
    },

    /// Delete an incident (admin)
    DeleteIncident {
        #[arg(value_name = "ID")]
        id: RecordId,
    },

    /// Create a service (admin)
    CreateService(ServiceArgs),

    /// Replace a service's fields (admin)
    EditService {
        #[arg(value_name = "ID")]
        id: RecordId,
        #[command(flatten)]
        form: ServiceArgs,
    },

    /// Delete a service (admin)
    DeleteService {
        #[arg(value_name = "ID")]
        id: RecordId,
    },
}

#[derive(Args)]
struct IncidentArgs {
    #[arg(long)]
    title: String,

    #[arg(long, default_value = "")]
    description: String,

    #[arg(long, default_value = "investigating", value_parser = parse_incident_status)]
    status: IncidentStatus,

    /// RFC 3339 start time (default: now, set by the backend)
    #[arg(long, value_name = "TIME")]
    started_at: Option<DateTime<Utc>>,

    /// Affected service as `ID:NAME` or `NAME`; repeatable
    #[arg(long = "service", value_name = "SERVICE", value_parser = parse_linked_service)]
    services: Vec<LinkedService>,
}

impl IncidentArgs {
    fn into_form(self) -> IncidentForm {
        IncidentForm {
            title: self.title,
            description: self.description,
            status: self.status,
            started_at: self.started_at,
            linked_services: self.services,
        }
    }
}

#[derive(Args)]
struct ServiceArgs {
    #[arg(long)]
    name: String,

    #[arg(long, default_value = "operational", value_parser = parse_service_status)]
    status: ServiceStatus,
}

impl ServiceArgs {
    fn into_form(self) -> ServiceForm {
        ServiceForm {
            name: self.name,
            status: self.status,
        }
    }
}

fn parse_incident_status(value: &str) -> std::result::Result<IncidentStatus, String> {
    IncidentStatus::from_str(value.trim()).ok_or_else(|| {
        let known: Vec<&str> = IncidentStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown incident status {:?} (expected one of {})", value, known.join(", "))
    })
}

fn parse_service_status(value: &str) -> std::result::Result<ServiceStatus, String> {
    ServiceStatus::from_str(value.trim()).ok_or_else(|| {
        let known: Vec<&str> = ServiceStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown service status {:?} (expected one of {})", value, known.join(", "))
    })
}

fn parse_linked_service(value: &str) -> std::result::Result<LinkedService, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("service must not be empty".to_string());
    }
    if let Some((id, name)) = value.split_once(':') {
        if let Ok(id) = id.trim().parse::<i64>() {
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("service {:?} has no name", value));
            }
            return Ok(LinkedService {
                service_id: Some(id),
                name: name.to_string(),
            });
        }
    }
    Ok(LinkedService {
        service_id: None,
        name: value.to_string(),
    })
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "Failed to start async runtime");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(cli)) {
        tracing::error!(error = %err, "statuspage-watch failed");
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = resolve_client_config(cli.config)?;
    if let Some(base_url) = cli.base_url {
        config.api_base_url = Some(base_url);
    }
    let base_url = config.base_url()?;

    if let Commands::Endpoint = cli.command {
        println!("{}", live_endpoint(&base_url)?);
        return Ok(());
    }

    let api = Arc::new(connect_api(&config)?);
    let viewer = resolve_viewer(&api, cli.org).await?;
    tracing::info!(
        org_id = viewer.org_id.as_deref().unwrap_or(""),
        role = viewer.role.as_str(),
        "Resolved viewer"
    );

    match cli.command {
        Commands::Endpoint => Ok(()),
        Commands::Incidents => {
            watch_collection(view_config(&config, &api, viewer)?, EntityKind::Incident).await
        }
        Commands::Services => {
            watch_collection(view_config(&config, &api, viewer)?, EntityKind::Service).await
        }
        Commands::Incident { id } => {
            watch_record(view_config(&config, &api, viewer)?, EntityKind::Incident, id).await
        }
        Commands::Service { id } => {
            watch_record(view_config(&config, &api, viewer)?, EntityKind::Service, id).await
        }
        Commands::CreateIncident(form) => {
            viewer.require_manage("create incidents")?;
            print_json(&api.create_incident(&form.into_form()).await?)
        }
        Commands::EditIncident { id, form } => {
            viewer.require_manage("edit incidents")?;
            print_json(&api.edit_incident(id, &form.into_form()).await?)
        }
        Commands::DeleteIncident { id } => {
            viewer.require_manage("delete incidents")?;
            print_json(&api.delete(EntityKind::Incident, id).await?)
        }
        Commands::CreateService(form) => {
            viewer.require_manage("create services")?;
            print_json(&api.create_service(&form.into_form()).await?)
        }
        Commands::EditService { id, form } => {
            viewer.require_manage("edit services")?;
            print_json(&api.edit_service(id, &form.into_form()).await?)
        }
        Commands::DeleteService { id } => {
            viewer.require_manage("delete services")?;
            print_json(&api.delete(EntityKind::Service, id).await?)
        }
    }
}

fn connect_api(config: &ClientConfig) -> Result<StatusApi> {
    let token = config.token.clone().ok_or_else(|| {
        LiveError::Credentials("STATUSPAGE_TOKEN is not set".to_string())
    })?;
    Ok(StatusApi::new(
        config.base_url()?,
        Arc::new(StaticCredentials::new(token)),
    ))
}

/// `--org` wins over the organization from `/user/`, and lets read-only
/// commands proceed when that lookup fails.
async fn resolve_viewer(api: &StatusApi, org: Option<String>) -> Result<ViewerContext> {
    match (api.viewer().await, org) {
        (Ok(viewer), None) => Ok(viewer),
        (Ok(viewer), Some(org)) => {
            let mut scoped = ViewerContext::new(Some(org), viewer.role);
            scoped.user_id = viewer.user_id;
            Ok(scoped)
        }
        (Err(err), Some(org)) => {
            tracing::warn!(error = %err, "Viewer lookup failed; continuing as member of --org");
            Ok(ViewerContext::new(Some(org), Role::Member(String::new())))
        }
        (Err(err), None) => Err(err),
    }
}

fn view_config(
    config: &ClientConfig,
    api: &Arc<StatusApi>,
    viewer: ViewerContext,
) -> Result<ViewConfig> {
    Ok(ViewConfig {
        base_url: config.base_url()?,
        viewer,
        connector: Arc::new(WsConnector),
        source: api.clone(),
        reconnect: config.reconnect_policy(),
    })
}

async fn watch_collection(config: ViewConfig, entity: EntityKind) -> Result<()> {
    let handle = LiveView::spawn(config, LiveCollection::new(entity))?;
    watch_until_interrupted(handle, render::collection, |_| false).await
}

async fn watch_record(config: ViewConfig, entity: EntityKind, id: RecordId) -> Result<()> {
    let handle = LiveView::spawn(config, LiveRecord::new(entity, id))?;
    watch_until_interrupted(handle, render::record, |state| state.store.is_gone()).await
}

/// Renders on every change until Ctrl-C or until `done` holds, then unmounts.
async fn watch_until_interrupted<S, R, D>(handle: ViewHandle<S>, render: R, done: D) -> Result<()>
where
    S: ViewStore,
    R: Fn(&ViewState<S>) -> String,
    D: Fn(&ViewState<S>) -> bool,
{
    let mut rx = handle.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let finished = {
            let guard = rx.borrow_and_update();
            let state: &ViewState<S> = &guard;
            println!("{}", render(state));
            done(state) || !state.mounted
        };
        if finished {
            break;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tracing::debug!("Interrupted");
                break;
            }
        }
    }

    handle.unmount();
    wait_unmounted(&mut rx).await;
    Ok(())
}

async fn wait_unmounted<S>(rx: &mut watch::Receiver<ViewState<S>>) {
    let unmounted = tokio::time::timeout(UNMOUNT_GRACE, rx.wait_for(|state| !state.mounted)).await;
    if unmounted.is_err() {
        tracing::warn!("Live view did not shut down in time");
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|source| LiveError::Json {
        context: "response".to_string(),
        source,
    })?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn linked_service_accepts_id_and_name() {
        assert_eq!(
            parse_linked_service("3:API").expect("parse"),
            LinkedService {
                service_id: Some(3),
                name: "API".to_string()
            }
        );
        assert_eq!(
            parse_linked_service("Billing: EU").expect("parse"),
            LinkedService {
                service_id: None,
                name: "Billing: EU".to_string()
            }
        );
        assert!(parse_linked_service("4:").is_err());
    }

    #[test]
    fn statuses_parse_with_legacy_spelling() {
        assert_eq!(
            parse_incident_status("maintainence").expect("parse"),
            IncidentStatus::Maintenance
        );
        assert!(parse_service_status("down").is_err());
    }

    #[test]
    fn edit_incident_parses_form() {
        let cli = Cli::try_parse_from([
            "statuspage-watch",
            "--org",
            "org_1",
            "edit-incident",
            "12",
            "--title",
            "DB down",
            "--status",
            "monitoring",
            "--service",
            "1:API",
        ])
        .expect("parse");

        assert_eq!(cli.org.as_deref(), Some("org_1"));
        match cli.command {
            Commands::EditIncident { id, form } => {
                assert_eq!(id, RecordId(12));
                let form = form.into_form();
                assert_eq!(form.status, IncidentStatus::Monitoring);
                assert_eq!(form.linked_services.len(), 1);
            }
            _ => panic!("expected edit-incident"),
        }
    }
}
