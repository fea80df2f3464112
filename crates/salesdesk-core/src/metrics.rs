//! Dashboard metrics payloads and the display values derived from them
//!
//! The backend answers with one of two incompatible shapes. Sales-style
//! payloads carry a `summary` object with per-user counters; admin-style
//! payloads carry a `leads` breakdown for the selected period. Every value
//! shown on the dashboard is a pure function of the latest payload, the
//! user's role and the client-side lead scans.

use crate::lead::{CHANNEL_PARTNER_SOURCE, LeadStatus, StatusTally};
use crate::types::Role;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Label of the synthetic first pipeline stage
pub const NEW_LEADS_STAGE: &str = "New Leads";

/// Palette cycled through by the lead source chart
pub const SOURCE_PALETTE: [&str; 6] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD",
];

const SOURCE_LABEL_MAX: usize = 12;
const SOURCE_LABEL_KEEP: usize = 10;

/// Category -> count map in backend order
pub type Counts = IndexMap<String, u64>;

fn counts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Counts, D::Error> {
    let raw = Option::<IndexMap<String, Option<u64>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or(0)))
        .collect())
}

fn zero_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn sum(counts: &Counts) -> u64 {
    counts.values().fold(0, |acc, &n| acc.saturating_add(n))
}

/// Round `numerator / denominator` half up, as the dashboard displays it
///
/// Computed in `u128` so backend-sized counts cannot overflow; the result
/// saturates at `u64::MAX`.
fn round_ratio(numerator: u128, denominator: u128) -> u64 {
    let rounded = (numerator * 2 + denominator) / (denominator * 2);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// Per-user counters in sales-style payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    /// Leads currently assigned to the user
    #[serde(default)]
    pub my_active_leads: Option<u64>,

    /// Leads added today
    #[serde(default)]
    pub my_new_leads: Option<u64>,

    /// Remaining counters
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Lead breakdowns for the selected period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadBreakdown {
    /// Explicit total, when the backend computes one
    #[serde(default)]
    pub total_leads: Option<u64>,

    /// Leads created in the period
    #[serde(default)]
    pub new_leads: Option<u64>,

    /// Count per lead source
    #[serde(default, deserialize_with = "counts")]
    pub by_source: Counts,

    /// Count per pipeline stage
    #[serde(default, deserialize_with = "counts")]
    pub by_stage: Counts,

    /// Count per classification (`Hot`, `Warm`, `Cold`)
    #[serde(default, deserialize_with = "counts")]
    pub by_classification: Counts,
}

impl LeadBreakdown {
    /// Total leads: the explicit total when present, else the source
    /// breakdown when it has entries, else the stage breakdown
    #[must_use]
    pub fn total(&self) -> u64 {
        if let Some(total) = self.total_leads {
            return total;
        }
        if !self.by_source.is_empty() {
            return sum(&self.by_source);
        }
        sum(&self.by_stage)
    }

    /// Hot/Warm/Cold counts reported by the backend
    #[must_use]
    pub fn classification(&self) -> StatusTally {
        let get = |status: LeadStatus| {
            self.by_classification
                .get(status.to_string().as_str())
                .copied()
                .unwrap_or(0)
        };
        StatusTally {
            hot: get(LeadStatus::Hot),
            warm: get(LeadStatus::Warm),
            cold: get(LeadStatus::Cold),
        }
    }
}

/// Site visit counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteVisits {
    /// Scheduled visits ahead
    #[serde(default, deserialize_with = "zero_if_null")]
    pub upcoming: u64,

    /// Visit count per status over the last period
    #[serde(default, deserialize_with = "counts")]
    pub last_period: Counts,
}

/// Follow-up counters, sent for sales-style payloads only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Followups {
    /// Due today
    #[serde(default, deserialize_with = "zero_if_null")]
    pub today: u64,

    /// Past due
    #[serde(default, deserialize_with = "zero_if_null")]
    pub overdue: u64,
}

/// Booking counters; field names differ between payload shapes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookings {
    /// Sales-style booking count
    #[serde(default)]
    pub my_bookings_count: Option<u64>,

    /// Admin-style booking count
    #[serde(default)]
    pub count: Option<u64>,

    /// Sales-style agreement value
    #[serde(default, deserialize_with = "amount")]
    pub my_bookings_value: Option<f64>,

    /// Admin-style agreement value
    #[serde(default, deserialize_with = "amount")]
    pub total_agreement_value: Option<f64>,
}

/// Cost sheet counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSheets {
    /// Count per cost sheet status
    #[serde(default, deserialize_with = "counts")]
    pub count_by_status: Counts,
}

/// KYC counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kyc {
    /// Count per KYC request status
    #[serde(default, deserialize_with = "counts")]
    pub requests_by_status: Counts,
}

/// Sections shared by both payload shapes; absent sections read as empty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSections {
    /// Lead breakdowns
    #[serde(default, deserialize_with = "section")]
    pub leads: LeadBreakdown,

    /// Site visits
    #[serde(default, deserialize_with = "section")]
    pub site_visits: SiteVisits,

    /// Follow-ups
    #[serde(default, deserialize_with = "section")]
    pub followups: Followups,

    /// Bookings
    #[serde(default, deserialize_with = "section")]
    pub bookings: Bookings,

    /// Cost sheets
    #[serde(default, deserialize_with = "section")]
    pub cost_sheets: CostSheets,

    /// KYC requests
    #[serde(default, deserialize_with = "section")]
    pub kyc: Kyc,
}

/// Sales-style payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesMetrics {
    /// Per-user counters
    pub summary: SalesSummary,

    /// Shared sections
    #[serde(flatten)]
    pub sections: MetricSections,
}

/// Admin-style payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminMetrics {
    /// Shared sections
    #[serde(flatten)]
    pub sections: MetricSections,
}

/// Dashboard payload, discriminated by the presence of `summary`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DashboardMetrics {
    /// Sales-style payload
    Sales(SalesMetrics),
    /// Admin-style payload
    Admin(AdminMetrics),
}

impl<'de> Deserialize<'de> for DashboardMetrics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let is_sales = value.get("summary").is_some_and(|s| !s.is_null());

        if is_sales {
            SalesMetrics::deserialize(value)
                .map(Self::Sales)
                .map_err(serde::de::Error::custom)
        } else {
            AdminMetrics::deserialize(value)
                .map(Self::Admin)
                .map_err(serde::de::Error::custom)
        }
    }
}

impl DashboardMetrics {
    /// Decode a raw response body, unwrapping a `{data: ...}` envelope
    ///
    /// Returns `Ok(None)` for an empty (`null`) body.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is not a metrics object.
    pub fn from_response(body: Value) -> serde_json::Result<Option<Self>> {
        let inner = match body {
            Value::Object(mut map) => match map.remove("data") {
                Some(data) if !data.is_null() => data,
                Some(_) | None => Value::Object(map),
            },
            other => other,
        };

        if inner.is_null() {
            return Ok(None);
        }
        serde_json::from_value(inner).map(Some)
    }

    /// Whether this is a sales-style payload
    #[must_use]
    pub const fn is_sales(&self) -> bool {
        matches!(self, Self::Sales(_))
    }

    /// Sections common to both shapes
    #[must_use]
    pub const fn sections(&self) -> &MetricSections {
        match self {
            Self::Sales(m) => &m.sections,
            Self::Admin(m) => &m.sections,
        }
    }

    /// Total leads shown in the headline card
    #[must_use]
    pub fn total_leads(&self) -> u64 {
        match self {
            Self::Sales(m) => m.summary.my_active_leads.unwrap_or(0),
            Self::Admin(m) => m.sections.leads.total(),
        }
    }

    /// New leads: added today for sales-style, in the period for admin-style
    #[must_use]
    pub fn new_leads(&self) -> u64 {
        match self {
            Self::Sales(m) => m.summary.my_new_leads.unwrap_or(0),
            Self::Admin(m) => m.sections.leads.new_leads.unwrap_or(0),
        }
    }

    /// Caption under the new leads figure
    #[must_use]
    pub const fn new_leads_caption(&self) -> &'static str {
        match self {
            Self::Sales(_) => "added today",
            Self::Admin(_) => "in selected period",
        }
    }

    /// Weighted lead quality percentage from the classification breakdown
    #[must_use]
    pub fn lead_quality_score(&self) -> u64 {
        lead_quality_score(&self.sections().leads.classification())
    }

    /// Active channel partners
    ///
    /// Admins read the `Channel Partner` source bucket; every other role
    /// shows the distinct partner count from the client-side lead scan.
    #[must_use]
    pub fn channel_partner_count(&self, role: &Role, scanned_partners: u64) -> u64 {
        if role.reads_partner_count_from_metrics() {
            self.sections()
                .leads
                .by_source
                .get(CHANNEL_PARTNER_SOURCE)
                .copied()
                .unwrap_or(0)
        } else {
            scanned_partners
        }
    }

    /// Task counters for the tasks card
    #[must_use]
    pub fn tasks(&self) -> TaskCounts {
        let sections = self.sections();
        TaskCounts {
            completed: sections
                .site_visits
                .last_period
                .get("COMPLETED")
                .copied()
                .unwrap_or(0),
            upcoming: sections.site_visits.upcoming,
            due_today: sections.followups.today,
            overdue: sections.followups.overdue,
        }
    }

    /// Pipeline rows, led by the synthetic new leads stage
    #[must_use]
    pub fn pipeline(&self) -> Vec<PipelineStage> {
        pipeline_stages(self.new_leads(), &self.sections().leads.by_stage)
    }

    /// Lead source bars, scaled against the largest source
    #[must_use]
    pub fn lead_sources(&self) -> Vec<SourceBar> {
        let by_source = &self.sections().leads.by_source;
        let max = by_source.values().copied().max().unwrap_or(0).max(1);

        by_source
            .iter()
            .map(|(name, &count)| SourceBar {
                name: name.clone(),
                count,
                width_percent: count as f64 / max as f64 * 100.0,
            })
            .collect()
    }

    /// Lead source pie chart series
    #[must_use]
    pub fn lead_source_series(&self) -> Vec<SourceSlice> {
        self.sections()
            .leads
            .by_source
            .iter()
            .zip(SOURCE_PALETTE.iter().cycle())
            .map(|((name, &value), color)| SourceSlice {
                label: chart_label(name),
                full_name: name.clone(),
                value,
                color: (*color).to_string(),
            })
            .collect()
    }

    /// Bookings and revenue snapshot
    #[must_use]
    pub fn bookings(&self) -> BookingsSnapshot {
        let sections = self.sections();
        let bookings = &sections.bookings;
        BookingsSnapshot {
            bookings: bookings.my_bookings_count.or(bookings.count).unwrap_or(0),
            agreement_value: bookings
                .my_bookings_value
                .or(bookings.total_agreement_value)
                .unwrap_or(0.0),
            cost_sheets: sum(&sections.cost_sheets.count_by_status),
            kyc_pending: sections
                .kyc
                .requests_by_status
                .get("PENDING")
                .copied()
                .unwrap_or(0),
        }
    }
}

/// Weighted blend of Hot (1.0), Warm (0.7) and Cold (0.3), as a rounded
/// percentage; 0 when all three buckets are empty
#[must_use]
pub fn lead_quality_score(tally: &StatusTally) -> u64 {
    let total: u128 = LeadStatus::ALL.iter().map(|&s| u128::from(tally.get(s))).sum();
    if total == 0 {
        return 0;
    }
    let weighted: u128 = LeadStatus::ALL
        .iter()
        .map(|&s| u128::from(tally.get(s)) * u128::from(s.quality_weight()))
        .sum();
    round_ratio(weighted, total)
}

/// Share of `count` in `total`, rounded; 0 when `total` is 0
#[must_use]
pub fn percent_of(count: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        round_ratio(u128::from(count) * 100, u128::from(total))
    }
}

/// Pipeline bar width: `count / max(new_leads, 1) * 100`, not clamped
#[must_use]
pub fn stage_width(count: u64, new_leads: u64) -> f64 {
    count as f64 / new_leads.max(1) as f64 * 100.0
}

/// Build pipeline rows from the new leads count and the stage breakdown
#[must_use]
pub fn pipeline_stages(new_leads: u64, by_stage: &Counts) -> Vec<PipelineStage> {
    std::iter::once(PipelineStage {
        name: NEW_LEADS_STAGE.to_string(),
        count: new_leads,
        width_percent: 100.0,
    })
    .chain(by_stage.iter().map(|(name, &count)| PipelineStage {
        name: name.clone(),
        count,
        width_percent: stage_width(count, new_leads),
    }))
    .collect()
}

/// Shorten long source names for chart labels
#[must_use]
pub fn chart_label(name: &str) -> String {
    if name.chars().count() > SOURCE_LABEL_MAX {
        let kept: String = name.chars().take(SOURCE_LABEL_KEEP).collect();
        format!("{kept}...")
    } else {
        name.to_string()
    }
}

/// Completed, upcoming, due today and overdue tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    /// Completed site visits in the last period
    pub completed: u64,
    /// Upcoming site visits
    pub upcoming: u64,
    /// Follow-ups due today
    pub due_today: u64,
    /// Overdue follow-ups
    pub overdue: u64,
}

impl TaskCounts {
    /// Sum of all four counters
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.completed
            .saturating_add(self.upcoming)
            .saturating_add(self.due_today)
            .saturating_add(self.overdue)
    }
}

/// One row of the pipeline card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStage {
    /// Stage name
    pub name: String,
    /// Leads in the stage
    pub count: u64,
    /// Bar width in percent; may exceed 100
    pub width_percent: f64,
}

/// One bar of the lead source breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceBar {
    /// Source name
    pub name: String,
    /// Leads from the source
    pub count: u64,
    /// Bar width relative to the largest source
    pub width_percent: f64,
}

/// One slice of the lead source chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSlice {
    /// Possibly shortened label
    pub label: String,
    /// Full source name
    pub full_name: String,
    /// Leads from the source
    pub value: u64,
    /// Slice colour
    pub color: String,
}

/// Hot/Warm/Cold count with its share of total leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusShare {
    /// Bucket
    pub status: LeadStatus,
    /// Scanned count
    pub count: u64,
    /// Rounded share of total leads
    pub percent: u64,
}

/// Bookings card values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BookingsSnapshot {
    /// Number of bookings
    pub bookings: u64,
    /// Total agreement value
    pub agreement_value: f64,
    /// Cost sheets across all statuses
    pub cost_sheets: u64,
    /// KYC requests pending
    pub kyc_pending: u64,
}

/// Results of the client-side lead list scans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeadScans {
    /// Hot/Warm/Cold counts over the full lead list
    pub status: StatusTally,
    /// Distinct channel partners with leads
    pub partners: u64,
}

/// Every display value of the dashboard, derived in one pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// Sales-style payload
    pub is_sales: bool,
    /// Headline total
    pub total_leads: u64,
    /// New leads figure
    pub new_leads: u64,
    /// Caption for the new leads figure
    pub new_leads_caption: &'static str,
    /// Active channel partners
    pub channel_partners: u64,
    /// Lead quality percentage
    pub lead_quality: u64,
    /// Scanned status counts with shares of total leads
    pub status_breakdown: Vec<StatusShare>,
    /// Lead source bars
    pub lead_sources: Vec<SourceBar>,
    /// Lead source chart series
    pub lead_source_series: Vec<SourceSlice>,
    /// Task counters
    pub tasks: TaskCounts,
    /// Sum of task counters
    pub total_tasks: u64,
    /// Pipeline rows
    pub pipeline: Vec<PipelineStage>,
    /// Bookings snapshot
    pub bookings: BookingsSnapshot,
}

impl DashboardSummary {
    /// Derive the full summary from the latest payload
    #[must_use]
    pub fn assemble(metrics: &DashboardMetrics, role: &Role, scans: &LeadScans) -> Self {
        let total_leads = metrics.total_leads();
        let tasks = metrics.tasks();

        Self {
            is_sales: metrics.is_sales(),
            total_leads,
            new_leads: metrics.new_leads(),
            new_leads_caption: metrics.new_leads_caption(),
            channel_partners: metrics.channel_partner_count(role, scans.partners),
            lead_quality: metrics.lead_quality_score(),
            status_breakdown: LeadStatus::ALL
                .iter()
                .map(|&status| {
                    let count = scans.status.get(status);
                    StatusShare {
                        status,
                        count,
                        percent: percent_of(count, total_leads),
                    }
                })
                .collect(),
            lead_sources: metrics.lead_sources(),
            lead_source_series: metrics.lead_source_series(),
            tasks,
            total_tasks: tasks.total(),
            pipeline: metrics.pipeline(),
            bookings: metrics.bookings(),
        }
    }
}
