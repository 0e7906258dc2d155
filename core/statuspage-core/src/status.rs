//! Typed status values for incidents and services.
//!
//! The live stores never interpret `Record::status`; these enums exist for
//! rendering and for the admin create/edit forms.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Investigating,
    Identified,
    Monitoring,
    Resolved,
    // Older incident rows were written with this spelling.
    #[serde(alias = "maintainence")]
    Maintenance,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 5] = [
        IncidentStatus::Investigating,
        IncidentStatus::Identified,
        IncidentStatus::Monitoring,
        IncidentStatus::Resolved,
        IncidentStatus::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Identified => "identified",
            IncidentStatus::Monitoring => "monitoring",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Maintenance => "maintenance",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "investigating" => Some(IncidentStatus::Investigating),
            "identified" => Some(IncidentStatus::Identified),
            "monitoring" => Some(IncidentStatus::Monitoring),
            "resolved" => Some(IncidentStatus::Resolved),
            "maintenance" | "maintainence" => Some(IncidentStatus::Maintenance),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, IncidentStatus::Resolved)
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Operational,
    DegradedPerformance,
    PartialOutage,
    MajorOutage,
    UnderMaintenance,
}

impl ServiceStatus {
    pub const ALL: [ServiceStatus; 5] = [
        ServiceStatus::Operational,
        ServiceStatus::DegradedPerformance,
        ServiceStatus::PartialOutage,
        ServiceStatus::MajorOutage,
        ServiceStatus::UnderMaintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Operational => "operational",
            ServiceStatus::DegradedPerformance => "degraded_performance",
            ServiceStatus::PartialOutage => "partial_outage",
            ServiceStatus::MajorOutage => "major_outage",
            ServiceStatus::UnderMaintenance => "under_maintenance",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "operational" => Some(ServiceStatus::Operational),
            "degraded_performance" => Some(ServiceStatus::DegradedPerformance),
            "partial_outage" => Some(ServiceStatus::PartialOutage),
            "major_outage" => Some(ServiceStatus::MajorOutage),
            "under_maintenance" => Some(ServiceStatus::UnderMaintenance),
            _ => None,
        }
    }

    /// Severity rank for sorting a dashboard (0 = healthy).
    pub fn severity(&self) -> u8 {
        match self {
            ServiceStatus::Operational => 0,
            ServiceStatus::UnderMaintenance => 1,
            ServiceStatus::DegradedPerformance => 2,
            ServiceStatus::PartialOutage => 3,
            ServiceStatus::MajorOutage => 4,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
