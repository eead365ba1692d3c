//! Daily port event models

crate::text_enum! {
    #[derive(Default)]
    pub enum PortEventStatus: "port event status" {
        #[default]
        Open => "open" / "مفتوح",
        Closed => "closed" / "مغلق",
    }
}
