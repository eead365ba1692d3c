//! Generated report models

crate::text_enum! {
    /// Data set a report is built from
    pub enum ReportType: "report type" {
        Incidents => "incidents" / "البلاغات",
        Cases => "cases" / "القضايا",
        PortEvents => "port_events" / "أحداث الميناء",
        WorkPermits => "work_permits" / "تصاريح العمل",
        CallReports => "call_reports" / "بلاغات مركز الاتصال",
    }
}

crate::text_enum! {
    /// Output document format
    pub enum ReportFormat: "report format" {
        Pdf => "pdf" / "PDF",
        Excel => "excel" / "Excel",
        Csv => "csv" / "CSV",
    }
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "xlsx",
            ReportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ReportFormat::Csv => "text/csv",
        }
    }
}

crate::text_enum! {
    /// Generation lifecycle: pending -> generating -> completed | failed
    #[derive(Default)]
    pub enum ReportStatus: "report status" {
        #[default]
        Pending => "pending" / "قيد الانتظار",
        Generating => "generating" / "جاري الإنشاء",
        Completed => "completed" / "مكتمل",
        Failed => "failed" / "فشل",
    }
}

impl ReportStatus {
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (ReportStatus::Pending, ReportStatus::Generating)
                | (ReportStatus::Pending, ReportStatus::Failed)
                | (ReportStatus::Generating, ReportStatus::Completed)
                | (ReportStatus::Generating, ReportStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Failed)
    }
}
