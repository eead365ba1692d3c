//! Case models

crate::text_enum! {
    #[derive(Default)]
    pub enum CasePriority: "case priority" {
        Low => "low" / "منخفضة",
        #[default]
        Medium => "medium" / "متوسطة",
        High => "high" / "عالية",
    }
}

crate::text_enum! {
    #[derive(Default)]
    pub enum CaseStatus: "case status" {
        #[default]
        Open => "open" / "مفتوحة",
        InProgress => "in_progress" / "قيد المتابعة",
        Closed => "closed" / "مغلقة",
    }
}
