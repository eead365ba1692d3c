//! Call-center report models

crate::text_enum! {
    /// Category of an incoming call
    #[derive(Default)]
    pub enum CallCategory: "call category" {
        Emergency => "emergency" / "طوارئ",
        Complaint => "complaint" / "شكوى",
        #[default]
        Inquiry => "inquiry" / "استفسار",
        Report => "report" / "بلاغ",
        Other => "other" / "أخرى",
    }
}
