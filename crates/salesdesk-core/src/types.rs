//! Core data types for salesdesk

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Project identifier type
pub type ProjectId = i64;

/// Fixed keys under which state is persisted in the session store
pub mod keys {
    /// Authenticated session (user + token)
    pub const SESSION: &str = "SESSION";
    /// Permitted projects fetched after login
    pub const SCOPE: &str = "MY_SCOPE";
    /// Brand/theme settings consumed by presentation
    pub const BRAND_THEME: &str = "BRAND_THEME";
    /// Project the activities view is bound to
    pub const ACTIVE_PROJECT_ID: &str = "ACTIVE_PROJECT_ID";
}

/// Role of the authenticated user
///
/// Unknown role strings are kept verbatim in [`Role::Other`]. A missing or
/// empty role deserializes as [`Role::Sales`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Tenant administrator
    Admin,
    /// Platform administrator
    SuperAdmin,
    /// Sales manager
    Manager,
    /// Sales executive
    #[default]
    Sales,
    /// Front desk
    Reception,
    /// Outbound calling team
    CallingTeam,
    /// External channel partner
    ChannelPartner,
    /// Short form of channel partner used by some tenants
    Cp,
    /// Any role this client does not know about
    Other(String),
}

/// Dashboard response family a role receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardKind {
    /// `/dashboard/admin/`
    Admin,
    /// `/dashboard/sales/`
    Sales,
    /// `/dashboard/channel-partner/`
    ChannelPartner,
}

impl DashboardKind {
    /// Endpoint path for this dashboard
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Admin => "/dashboard/admin/",
            Self::Sales => "/dashboard/sales/",
            Self::ChannelPartner => "/dashboard/channel-partner/",
        }
    }
}

impl Role {
    /// Wire representation of the role
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Manager => "MANAGER",
            Self::Sales => "SALES",
            Self::Reception => "RECEPTION",
            Self::CallingTeam => "CALLING_TEAM",
            Self::ChannelPartner => "CHANNEL_PARTNER",
            Self::Cp => "CP",
            Self::Other(raw) => raw,
        }
    }

    /// Parse a role string; empty input maps to [`Role::Sales`]
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "SALES" => Self::Sales,
            "ADMIN" => Self::Admin,
            "SUPER_ADMIN" => Self::SuperAdmin,
            "MANAGER" => Self::Manager,
            "RECEPTION" => Self::Reception,
            "CALLING_TEAM" => Self::CallingTeam,
            "CHANNEL_PARTNER" | "CHANNEL PATNER" => Self::ChannelPartner,
            "CP" => Self::Cp,
            other => Self::Other(other.to_string()),
        }
    }

    /// Which dashboard endpoint serves this role
    #[must_use]
    pub const fn dashboard(&self) -> DashboardKind {
        match self {
            Self::Admin | Self::SuperAdmin | Self::Manager => DashboardKind::Admin,
            Self::ChannelPartner | Self::Cp => DashboardKind::ChannelPartner,
            Self::Sales | Self::Reception | Self::CallingTeam | Self::Other(_) => {
                DashboardKind::Sales
            }
        }
    }

    /// Roles whose partner count comes straight from the metrics payload
    #[must_use]
    pub const fn reads_partner_count_from_metrics(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }

    /// Roles for which the client scans the lead list to count partners
    #[must_use]
    pub const fn scans_partner_leads(&self) -> bool {
        matches!(self, Self::Sales | Self::Manager)
    }

    /// Sales users always land on the default destination after login
    #[must_use]
    pub const fn ignores_requested_path(&self) -> bool {
        matches!(self, Self::Sales)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map_or(Self::Sales, |r| Self::parse(&r)))
    }
}

/// Authenticated user as returned by the login endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Backend user id
    #[serde(default)]
    pub id: Option<i64>,

    /// Login name
    #[serde(default)]
    pub username: Option<String>,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,

    /// Role, `SALES` when the backend omits it
    #[serde(default)]
    pub role: Role,

    /// Remaining backend fields, kept opaque
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Authenticated identity plus bearer token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Logged-in user
    pub user: User,

    /// Bearer token attached to authenticated requests
    #[serde(alias = "access", alias = "key")]
    pub token: String,

    /// Refresh token, when the backend issues one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,

    /// Tenant branding sent alongside the login response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<BrandTheme>,
}

impl Session {
    /// Role of the session's user
    #[must_use]
    pub const fn role(&self) -> &Role {
        &self.user.role
    }
}

/// A project the user may see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project id
    pub id: ProjectId,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Remaining backend fields (units, towers, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Set of projects/resources the logged-in identity may see
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    /// Permitted projects
    #[serde(default)]
    pub projects: Vec<Project>,

    /// Remaining backend fields (admin info, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Scope {
    /// Ids of every permitted project, in scope order
    #[must_use]
    pub fn project_ids(&self) -> Vec<ProjectId> {
        self.projects.iter().map(|p| p.id).collect()
    }
}

const DEFAULT_COMPANY_NAME: &str = "Your Company";
const FONT_FALLBACKS: &str = "system-ui, -apple-system, 'Segoe UI', 'Roboto', 'Open Sans', sans-serif";

/// Brand/theme settings persisted for presentation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandTheme {
    /// Logo URL
    #[serde(default)]
    pub logo: Option<String>,

    /// Company name shown in headers
    #[serde(default)]
    pub company_name: Option<String>,

    /// Primary font family
    #[serde(default)]
    pub font_family: Option<String>,

    /// Accent colour
    #[serde(default)]
    pub accent_color: Option<String>,
}

impl BrandTheme {
    /// Company name, falling back to a generic label
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.company_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_COMPANY_NAME)
    }

    /// Full CSS font stack with system fallbacks appended
    #[must_use]
    pub fn font_stack(&self) -> String {
        match self.font_family.as_deref().filter(|f| !f.is_empty()) {
            Some(family) => format!("{family}, {FONT_FALLBACKS}"),
            None => format!("'Inter', {FONT_FALLBACKS}"),
        }
    }
}

/// Optional inclusive date window applied to dashboard and activity queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Start date
    pub from: Option<NaiveDate>,
    /// End date
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Create a date range
    #[must_use]
    pub const fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    /// Button label for the date filter; the backend defaults to the last 30 days
    #[must_use]
    pub fn label(&self) -> String {
        match (self.from, self.to) {
            (Some(from), Some(to)) => format!("{from} - {to}"),
            (Some(from), None) => format!("From {from}"),
            (None, Some(to)) => format!("Until {to}"),
            (None, None) => "Last 30 days".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("ADMIN", DashboardKind::Admin)]
    #[case("SUPER_ADMIN", DashboardKind::Admin)]
    #[case("MANAGER", DashboardKind::Admin)]
    #[case("SALES", DashboardKind::Sales)]
    #[case("RECEPTION", DashboardKind::Sales)]
    #[case("CALLING_TEAM", DashboardKind::Sales)]
    #[case("CHANNEL_PARTNER", DashboardKind::ChannelPartner)]
    #[case("CP", DashboardKind::ChannelPartner)]
    #[case("CHANNEL PATNER", DashboardKind::ChannelPartner)]
    #[case("AUDITOR", DashboardKind::Sales)]
    fn test_role_dashboard_routing(#[case] raw: &str, #[case] expected: DashboardKind) {
        assert_eq!(Role::parse(raw).dashboard(), expected);
    }

    #[test]
    fn test_role_roundtrip_and_fallbacks() {
        let user: User = serde_json::from_str(r#"{"id": 7, "role": "MANAGER"}"#).unwrap();
        assert_eq!(user.role, Role::Manager);

        let missing: User = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(missing.role, Role::Sales);

        let null_role: User = serde_json::from_str(r#"{"id": 7, "role": null}"#).unwrap();
        assert_eq!(null_role.role, Role::Sales);

        let other = Role::parse("AUDITOR");
        assert_eq!(serde_json::to_string(&other).unwrap(), r#""AUDITOR""#);
    }

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Admin.reads_partner_count_from_metrics());
        assert!(!Role::Manager.reads_partner_count_from_metrics());
        assert!(Role::Manager.scans_partner_leads());
        assert!(Role::Sales.scans_partner_leads());
        assert!(!Role::Reception.scans_partner_leads());
        assert!(Role::Sales.ignores_requested_path());
        assert!(!Role::Admin.ignores_requested_path());
    }

    #[test]
    fn test_session_accepts_access_alias() {
        let session: Session = serde_json::from_str(
            r#"{"access": "tok-1", "refresh": "ref-1", "user": {"id": 1, "role": "ADMIN", "first_name": "A"}}"#,
        )
        .unwrap();

        assert_eq!(session.token, "tok-1");
        assert_eq!(session.refresh.as_deref(), Some("ref-1"));
        assert_eq!(session.role(), &Role::Admin);
        assert!(session.user.extra.contains_key("first_name"));
        assert_eq!(session.brand, None);
    }

    #[test]
    fn test_scope_keeps_unknown_fields() {
        let scope: Scope = serde_json::from_str(
            r#"{"projects": [{"id": 3, "name": "Skyline", "units": []}, {"id": 9, "name": "Harbor"}], "admin": {"id": 1}}"#,
        )
        .unwrap();

        assert_eq!(scope.project_ids(), vec![3, 9]);
        assert!(scope.extra.contains_key("admin"));
        assert!(scope.projects[0].extra.contains_key("units"));

        let empty: Scope = serde_json::from_str("{}").unwrap();
        assert!(empty.projects.is_empty());
    }

    #[test]
    fn test_brand_theme_fallbacks() {
        let theme = BrandTheme::default();
        assert_eq!(theme.display_name(), "Your Company");
        assert!(theme.font_stack().starts_with("'Inter', system-ui"));

        let branded = BrandTheme {
            company_name: Some("Acme Homes".to_string()),
            font_family: Some("Poppins".to_string()),
            ..BrandTheme::default()
        };
        assert_eq!(branded.display_name(), "Acme Homes");
        assert!(branded.font_stack().starts_with("Poppins, system-ui"));
    }

    #[test]
    fn test_date_range_label() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1);
        let to = NaiveDate::from_ymd_opt(2024, 1, 31);

        assert_eq!(DateRange::new(from, to).label(), "2024-01-01 - 2024-01-31");
        assert_eq!(DateRange::new(from, None).label(), "From 2024-01-01");
        assert_eq!(DateRange::new(None, to).label(), "Until 2024-01-31");
        assert_eq!(DateRange::default().label(), "Last 30 days");
    }
}
