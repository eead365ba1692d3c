//! Incident models

use serde::{Deserialize, Serialize};

crate::text_enum! {
    /// How serious an incident is
    #[derive(Default)]
    pub enum Severity: "severity" {
        Low => "low" / "منخفضة",
        #[default]
        Medium => "medium" / "متوسطة",
        High => "high" / "عالية",
        Critical => "critical" / "حرجة",
    }
}

crate::text_enum! {
    /// Triage state of an incident
    #[derive(Default)]
    pub enum IncidentStatus: "incident status" {
        #[default]
        New => "new" / "جديد",
        InProgress => "in_progress" / "قيد المعالجة",
        Resolved => "resolved" / "تم الحل",
        Closed => "closed" / "مغلق",
    }
}

impl IncidentStatus {
    /// Whether the incident still needs attention
    pub fn is_open(&self) -> bool {
        matches!(self, IncidentStatus::New | IncidentStatus::InProgress)
    }
}

/// A piece of evidence attached to an incident
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Evidence {
    /// Evidence kind, e.g. "image", "video", "document"
    pub kind: String,
    pub url: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(Severity::default(), Severity::Medium);
        assert_eq!(IncidentStatus::default(), IncidentStatus::New);
    }

    #[test]
    fn test_open_statuses() {
        assert!(IncidentStatus::New.is_open());
        assert!(IncidentStatus::InProgress.is_open());
        assert!(!IncidentStatus::Resolved.is_open());
        assert!(!IncidentStatus::Closed.is_open());
    }

    #[test]
    fn test_status_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&IncidentStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(IncidentStatus::Resolved.label_ar(), "تم الحل");
    }
}
