//! Display formatting helpers

use crate::types::{Project, ProjectId};
use chrono::{NaiveDate, NaiveDateTime};

/// Placeholder for missing dates and times
pub const NOT_AVAILABLE: &str = "N/A";

/// Format an amount with Indian digit grouping (`12,34,567.5`)
///
/// At most two fraction digits are kept, trailing zeros dropped.
#[must_use]
pub fn format_inr(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }

    let rounded = format!("{:.2}", value.abs());
    let (whole, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut out = String::new();
    if value < 0.0 && rounded != "0.00" {
        out.push('-');
    }
    out.push_str(&group_indian(whole));
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, right) = rest.split_at(rest.len() - 2);
        groups.push(right);
        rest = left;
    }
    groups.push(rest);
    groups.reverse();

    format!("{},{tail}", groups.join(","))
}

/// Format a date as `05 Mar 2024`
///
/// Accepts plain dates and ISO timestamps. Empty input yields `N/A`;
/// anything unparseable is returned unchanged.
#[must_use]
pub fn format_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return NOT_AVAILABLE.to_string();
    }

    parse_date(raw).map_or_else(|| raw.to_string(), |d| d.format("%d %b %Y").to_string())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Format a `HH:MM[:SS]` time as `h:MM AM/PM`
///
/// Empty input yields `N/A`; anything unparseable is returned unchanged.
#[must_use]
pub fn format_time(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return NOT_AVAILABLE.to_string();
    }

    let mut parts = raw.split(':');
    let (Some(hours), Some(minutes)) = (parts.next(), parts.next()) else {
        return raw.to_string();
    };
    let Ok(hours) = hours.trim().parse::<u32>() else {
        return raw.to_string();
    };

    let hour12 = match hours % 12 {
        0 => 12,
        h => h,
    };
    let meridiem = if hours >= 12 { "PM" } else { "AM" };
    format!("{hour12}:{minutes} {meridiem}")
}

/// Human label for an activity kind: `site_visit` becomes `Site Visit`
#[must_use]
pub fn activity_kind_label(kind: &str) -> String {
    if kind.is_empty() {
        return "Activity".to_string();
    }

    let mut label = String::with_capacity(kind.len());
    let mut at_word_start = true;
    for c in kind.chars() {
        let c = if c == '_' { ' ' } else { c };
        if at_word_start && c.is_alphanumeric() {
            label.extend(c.to_uppercase());
        } else {
            label.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    label
}

/// Project filter label
///
/// An empty selection and a full selection both read `All Projects`.
#[must_use]
pub fn projects_label(projects: &[Project], selected: &[ProjectId]) -> String {
    if projects.is_empty() {
        return "No projects".to_string();
    }
    if selected.is_empty() || selected.len() == projects.len() {
        return "All Projects".to_string();
    }

    let names: Vec<&str> = projects
        .iter()
        .filter(|p| selected.contains(&p.id))
        .map(|p| p.name.as_str())
        .collect();

    match names.as_slice() {
        [first, second, rest @ ..] if !rest.is_empty() => {
            format!("{first}, {second} + {} more", rest.len())
        }
        _ => names.join(", "),
    }
}

/// Number of projects the dashboard is showing
#[must_use]
pub const fn selected_projects_count(total_projects: usize, selected: usize) -> usize {
    if selected == 0 { total_projects } else { selected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn project(id: ProjectId, name: &str) -> Project {
        Project {
            id,
            name: name.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    #[rstest]
    #[case(0.0, "0")]
    #[case(999.0, "999")]
    #[case(1000.0, "1,000")]
    #[case(123_456.0, "1,23,456")]
    #[case(1_234_567.0, "12,34,567")]
    #[case(123_456_789.0, "12,34,56,789")]
    #[case(2_500_000.5, "25,00,000.5")]
    #[case(1234.567, "1,234.57")]
    #[case(-45_000.0, "-45,000")]
    #[case(f64::NAN, "0")]
    fn test_format_inr(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_inr(value), expected);
    }

    #[rstest]
    #[case("2024-03-05", "05 Mar 2024")]
    #[case("2024-12-31T18:30:00Z", "31 Dec 2024")]
    #[case("2024-01-09T10:00:00", "09 Jan 2024")]
    #[case("", "N/A")]
    #[case("tomorrow", "tomorrow")]
    fn test_format_date(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(format_date(raw), expected);
    }

    #[rstest]
    #[case("00:15", "12:15 AM")]
    #[case("09:05:00", "9:05 AM")]
    #[case("12:00", "12:00 PM")]
    #[case("18:45:30", "6:45 PM")]
    #[case("", "N/A")]
    #[case("noon", "noon")]
    fn test_format_time(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(format_time(raw), expected);
    }

    #[rstest]
    #[case("site_visit", "Site Visit")]
    #[case("follow_up_call", "Follow Up Call")]
    #[case("meeting", "Meeting")]
    #[case("", "Activity")]
    fn test_activity_kind_label(#[case] kind: &str, #[case] expected: &str) {
        assert_eq!(activity_kind_label(kind), expected);
    }

    #[test]
    fn test_projects_label() {
        let projects = vec![
            project(1, "Skyline"),
            project(2, "Harbor"),
            project(3, "Meadows"),
            project(4, "Crest"),
            project(5, "Vista"),
        ];

        assert_eq!(projects_label(&[], &[]), "No projects");
        assert_eq!(projects_label(&projects, &[]), "All Projects");
        assert_eq!(projects_label(&projects, &[1, 2, 3, 4, 5]), "All Projects");
        assert_eq!(projects_label(&projects, &[2]), "Harbor");
        assert_eq!(projects_label(&projects, &[1, 3]), "Skyline, Meadows");
        assert_eq!(projects_label(&projects, &[1, 2, 4, 5]), "Skyline, Harbor + 2 more");
    }

    #[test]
    fn test_selected_projects_count() {
        assert_eq!(selected_projects_count(5, 0), 5);
        assert_eq!(selected_projects_count(5, 2), 2);
        assert_eq!(selected_projects_count(0, 0), 0);
    }
}
