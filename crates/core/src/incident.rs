//! Incident (work order) lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::fault::FaultCode;

/// Status of a persisted incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    #[default]
    Pending,
    Processing,
    Resolved,
    Fixed,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 4] = [
        IncidentStatus::Pending,
        IncidentStatus::Processing,
        IncidentStatus::Resolved,
        IncidentStatus::Fixed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Pending => "pending",
            IncidentStatus::Processing => "processing",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Fixed => "fixed",
        }
    }

    /// Closing an incident queues a reset for its device.
    pub fn closes_incident(self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Fixed)
    }

    /// Status shown in the fault feed, which knows no `fixed`.
    pub fn feed_status(self) -> Self {
        match self {
            IncidentStatus::Fixed => IncidentStatus::Resolved,
            other => other,
        }
    }
}

/// How urgently an incident needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Severe,
    Major,
    General,
}

impl Severity {
    /// Rank by fault code, falling back to keywords of the fault type when
    /// the code is unknown.
    pub fn assess(code: FaultCode, fault_type: Option<&str>) -> Self {
        match code {
            FaultCode::F4 | FaultCode::F5 => Severity::Severe,
            FaultCode::F1 | FaultCode::F2 => Severity::Major,
            FaultCode::F3 => Severity::General,
            FaultCode::Normal => {
                let name = fault_type.unwrap_or_default();
                if ["IGBT", "开路", "接地"].iter().any(|k| name.contains(k)) {
                    Severity::Severe
                } else if ["交流窜入", "绝缘故障"].iter().any(|k| name.contains(k)) {
                    Severity::Major
                } else {
                    Severity::General
                }
            }
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        IncidentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid status '{s}', expected one of pending, processing, resolved, fixed"
                ))
            })
    }
}
