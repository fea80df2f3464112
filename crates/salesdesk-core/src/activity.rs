//! Upcoming activity records grouped per lead

use crate::utils::{activity_kind_label, format_date, format_time};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shown when no project is bound to the activities view
pub const NO_ACTIVE_PROJECT: &str = "No active project selected. Please select a project first.";

/// Shown when the activities request fails
pub const LOAD_FAILED: &str = "Failed to load upcoming activities.";

/// One scheduled activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    /// Backend id
    #[serde(default)]
    pub id: Option<Value>,

    /// Normalised kind (`site_visit`, `call`, ...)
    #[serde(default)]
    pub kind: Option<String>,

    /// Kind as stored by the backend
    #[serde(default)]
    pub raw_type: Option<String>,

    /// Status label
    #[serde(default)]
    pub status: Option<String>,

    /// Headline
    #[serde(default)]
    pub title: Option<String>,

    /// Free text
    #[serde(default)]
    pub description: Option<String>,

    /// `YYYY-MM-DD` or ISO timestamp
    #[serde(default)]
    pub event_date: Option<String>,

    /// `HH:MM[:SS]`
    #[serde(default)]
    pub event_time: Option<String>,

    /// Where it takes place
    #[serde(default)]
    pub location_name: Option<String>,
}

impl ActivityItem {
    /// Display label for the kind
    #[must_use]
    pub fn kind_label(&self) -> String {
        activity_kind_label(self.kind.as_deref().unwrap_or_default())
    }

    /// Display date
    #[must_use]
    pub fn date_label(&self) -> String {
        format_date(self.event_date.as_deref().unwrap_or_default())
    }

    /// Display time
    #[must_use]
    pub fn time_label(&self) -> String {
        format_time(self.event_time.as_deref().unwrap_or_default())
    }

    /// Badge family for the kind
    #[must_use]
    pub fn category(&self) -> ActivityCategory {
        ActivityCategory::from_kind(self.kind.as_deref().unwrap_or_default())
    }
}

/// Badge family an activity kind falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    /// Phone calls
    Call,
    /// Site visits
    Visit,
    /// Meetings
    Meeting,
    /// Anything else
    Other,
}

impl ActivityCategory {
    /// Classify by substring, calls first
    #[must_use]
    pub fn from_kind(kind: &str) -> Self {
        let kind = kind.to_lowercase();
        if kind.contains("call") {
            Self::Call
        } else if kind.contains("visit") {
            Self::Visit
        } else if kind.contains("meeting") {
            Self::Meeting
        } else {
            Self::Other
        }
    }
}

/// A lead with its scheduled activities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadActivities {
    /// Lead id
    #[serde(default)]
    pub lead_id: Option<Value>,

    /// Lead display name
    #[serde(default)]
    pub lead_name: Option<String>,

    /// Project display name
    #[serde(default)]
    pub project_name: Option<String>,

    /// Scheduled activities; `null` reads as empty
    #[serde(default, deserialize_with = "items")]
    pub items: Vec<ActivityItem>,
}

fn items<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Vec<ActivityItem>, D::Error> {
    Ok(Option::<Vec<ActivityItem>>::deserialize(deserializer)?.unwrap_or_default())
}

impl LeadActivities {
    /// Lead name, or `Unknown Lead`
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.lead_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Unknown Lead")
    }

    /// Project name, or `N/A`
    #[must_use]
    pub fn project_label(&self) -> &str {
        self.project_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(crate::utils::NOT_AVAILABLE)
    }
}

/// Activities response split for display
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityBoard {
    /// Leads with at least one activity
    pub scheduled: Vec<LeadActivities>,
    /// Leads with nothing scheduled
    pub idle: Vec<LeadActivities>,
}

impl ActivityBoard {
    /// Split leads by whether they have activities, keeping response order
    #[must_use]
    pub fn split(leads: Vec<LeadActivities>) -> Self {
        let (scheduled, idle) = leads.into_iter().partition(|l| !l.items.is_empty());
        Self { scheduled, idle }
    }

    /// Activities across all scheduled leads
    #[must_use]
    pub fn activity_count(&self) -> usize {
        self.scheduled.iter().map(|l| l.items.len()).sum()
    }

    /// Header line, e.g. `3 activity(s) across 2 lead(s)`
    #[must_use]
    pub fn summary(&self) -> String {
        if self.scheduled.is_empty() {
            "No activities scheduled".to_string()
        } else {
            format!(
                "{} activity(s) across {} lead(s)",
                self.activity_count(),
                self.scheduled.len()
            )
        }
    }
}
