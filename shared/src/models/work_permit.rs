//! Work permit models

use chrono::NaiveDate;

crate::text_enum! {
    /// Approval state of a work permit
    #[derive(Default)]
    pub enum PermitStatus: "permit status" {
        #[default]
        Pending => "pending" / "قيد المراجعة",
        Approved => "approved" / "معتمد",
        Rejected => "rejected" / "مرفوض",
        Expired => "expired" / "منتهي",
    }
}

impl PermitStatus {
    /// Allowed status changes: pending permits are decided once, approved
    /// permits can only lapse.
    pub fn can_transition_to(&self, next: PermitStatus) -> bool {
        matches!(
            (self, next),
            (PermitStatus::Pending, PermitStatus::Approved)
                | (PermitStatus::Pending, PermitStatus::Rejected)
                | (PermitStatus::Approved, PermitStatus::Expired)
        )
    }
}

/// Validate a permit's validity window
pub fn validate_permit_window(start: NaiveDate, end: NaiveDate) -> Result<(), &'static str> {
    if end < start {
        return Err("End date must not be before start date");
    }
    Ok(())
}
