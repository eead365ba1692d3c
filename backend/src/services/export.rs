//! Tabular document export
//!
//! Records are flattened into a [`Table`] whose columns carry Arabic and
//! English labels, then rendered as CSV, XLSX or PDF.

use std::path::Path;

use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use rust_xlsxwriter::{Format, Workbook};

use crate::error::{AppError, AppResult};
use crate::services::call_report::CallReport;
use crate::services::case::Case;
use crate::services::incident::Incident;
use crate::services::port_event::PortEvent;
use crate::services::work_permit::WorkPermit;
use shared::models::ReportFormat;

/// A table column and its header labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub label_ar: &'static str,
    pub label_en: &'static str,
}

const fn col(key: &'static str, label_ar: &'static str, label_en: &'static str) -> Column {
    Column {
        key,
        label_ar,
        label_en,
    }
}

pub const INCIDENT_COLUMNS: &[Column] = &[
    col("incident_number", "رقم البلاغ", "Incident No."),
    col("incident_type", "نوع البلاغ", "Type"),
    col("title", "العنوان", "Title"),
    col("location", "الموقع", "Location"),
    col("severity", "الخطورة", "Severity"),
    col("status", "الحالة", "Status"),
    col("reported_by", "المبلِّغ", "Reported by"),
    col("created_at", "تاريخ البلاغ", "Reported at"),
];

pub const CASE_COLUMNS: &[Column] = &[
    col("title", "عنوان القضية", "Title"),
    col("case_type", "نوع القضية", "Type"),
    col("priority", "الأولوية", "Priority"),
    col("status", "الحالة", "Status"),
    col("created_by", "أنشئت بواسطة", "Opened by"),
    col("created_at", "تاريخ الإنشاء", "Opened at"),
];

pub const PORT_EVENT_COLUMNS: &[Column] = &[
    col("event_date", "التاريخ", "Date"),
    col("port_name", "الميناء", "Port"),
    col("vessel_name", "السفينة", "Vessel"),
    col("event_type", "نوع الحدث", "Event type"),
    col("description", "الوصف", "Description"),
    col("status", "الحالة", "Status"),
];

pub const WORK_PERMIT_COLUMNS: &[Column] = &[
    col("permit_number", "رقم التصريح", "Permit No."),
    col("applicant_name", "مقدم الطلب", "Applicant"),
    col("company", "الشركة", "Company"),
    col("work_type", "نوع العمل", "Work type"),
    col("location", "الموقع", "Location"),
    col("start_date", "تاريخ البداية", "Start"),
    col("end_date", "تاريخ الانتهاء", "End"),
    col("status", "الحالة", "Status"),
];

pub const CALL_REPORT_COLUMNS: &[Column] = &[
    col("call_time", "وقت الاتصال", "Call time"),
    col("caller_name", "اسم المتصل", "Caller"),
    col("caller_phone", "رقم الهاتف", "Phone"),
    col("category", "التصنيف", "Category"),
    col("summary", "الملخص", "Summary"),
    col("incident_id", "البلاغ المرتبط", "Linked incident"),
];

/// A single table value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    /// Enumerated value with a fixed label per language
    Label { ar: &'static str, en: &'static str },
}

impl Cell {
    pub fn ar(&self) -> &str {
        match self {
            Cell::Text(text) => text,
            Cell::Label { ar, .. } => ar,
        }
    }

    pub fn en(&self) -> &str {
        match self {
            Cell::Text(text) => text,
            Cell::Label { en, .. } => en,
        }
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Cell::Text(text)
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::Text(text.to_string())
    }
}

fn label(ar: &'static str, en: &'static str) -> Cell {
    Cell::Label { ar, en }
}

/// Rows ready for rendering
#[derive(Debug, Clone)]
pub struct Table {
    pub title: String,
    pub sheet_name: &'static str,
    pub columns: &'static [Column],
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn headers_ar(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.label_ar).collect()
    }

    pub fn headers_en(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.label_en).collect()
    }
}

/// Rendering settings that come from configuration
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// TrueType font for PDF output; Helvetica (Latin only) otherwise
    pub pdf_font_path: Option<std::path::PathBuf>,
}

fn timestamp(at: &DateTime<Utc>) -> Cell {
    Cell::Text(at.format("%Y-%m-%d %H:%M").to_string())
}

pub fn incident_table(title: &str, incidents: &[Incident]) -> Table {
    Table {
        title: title.to_string(),
        sheet_name: "البلاغات",
        columns: INCIDENT_COLUMNS,
        rows: incidents
            .iter()
            .map(|i| {
                vec![
                    i.incident_number.to_string().into(),
                    i.incident_type.clone().into(),
                    i.title.clone().into(),
                    i.location.clone().into(),
                    label(i.severity.label_ar(), i.severity.as_str()),
                    label(i.status.label_ar(), i.status.as_str()),
                    i.reported_by_name.clone().unwrap_or_default().into(),
                    timestamp(&i.created_at),
                ]
            })
            .collect(),
    }
}

pub fn case_table(title: &str, cases: &[Case]) -> Table {
    Table {
        title: title.to_string(),
        sheet_name: "القضايا",
        columns: CASE_COLUMNS,
        rows: cases
            .iter()
            .map(|c| {
                vec![
                    c.title.clone().into(),
                    c.case_type.clone().into(),
                    label(c.priority.label_ar(), c.priority.as_str()),
                    label(c.status.label_ar(), c.status.as_str()),
                    c.created_by_name.clone().unwrap_or_default().into(),
                    timestamp(&c.created_at),
                ]
            })
            .collect(),
    }
}

pub fn port_event_table(title: &str, events: &[PortEvent]) -> Table {
    Table {
        title: title.to_string(),
        sheet_name: "أحداث الميناء",
        columns: PORT_EVENT_COLUMNS,
        rows: events
            .iter()
            .map(|e| {
                vec![
                    e.event_date.to_string().into(),
                    e.port_name.clone().into(),
                    e.vessel_name.clone().unwrap_or_default().into(),
                    e.event_type.clone().into(),
                    e.description.clone().into(),
                    label(e.status.label_ar(), e.status.as_str()),
                ]
            })
            .collect(),
    }
}

pub fn work_permit_table(title: &str, permits: &[WorkPermit]) -> Table {
    Table {
        title: title.to_string(),
        sheet_name: "تصاريح العمل",
        columns: WORK_PERMIT_COLUMNS,
        rows: permits
            .iter()
            .map(|p| {
                vec![
                    p.permit_number.clone().into(),
                    p.applicant_name.clone().into(),
                    p.company.clone().into(),
                    p.work_type.clone().into(),
                    p.location.clone().into(),
                    p.start_date.to_string().into(),
                    p.end_date.to_string().into(),
                    label(p.status.label_ar(), p.status.as_str()),
                ]
            })
            .collect(),
    }
}

pub fn call_report_table(title: &str, calls: &[CallReport]) -> Table {
    Table {
        title: title.to_string(),
        sheet_name: "مركز الاتصال",
        columns: CALL_REPORT_COLUMNS,
        rows: calls
            .iter()
            .map(|c| {
                vec![
                    timestamp(&c.call_time),
                    c.caller_name.clone().into(),
                    c.caller_phone.clone().into(),
                    label(c.category.label_ar(), c.category.as_str()),
                    c.summary.clone().into(),
                    c.incident_id.map(|id| id.to_string()).unwrap_or_default().into(),
                ]
            })
            .collect(),
    }
}

/// Render a table in the requested format
pub fn render(format: ReportFormat, table: &Table, options: &RenderOptions) -> AppResult<Vec<u8>> {
    match format {
        ReportFormat::Csv => to_csv(table),
        ReportFormat::Excel => to_xlsx(table),
        ReportFormat::Pdf => to_pdf(table, options.pdf_font_path.as_deref()),
    }
}

/// UTF-8 CSV with a byte order mark so spreadsheet tools detect Arabic text
pub fn to_csv(table: &Table) -> AppResult<Vec<u8>> {
    let mut buffer = "\u{FEFF}".as_bytes().to_vec();
    {
        let mut wtr = csv::Writer::from_writer(&mut buffer);
        wtr.write_record(table.headers_ar())
            .map_err(|e| AppError::ReportGeneration(format!("CSV serialization error: {}", e)))?;
        for row in &table.rows {
            wtr.write_record(row.iter().map(Cell::ar)).map_err(|e| {
                AppError::ReportGeneration(format!("CSV serialization error: {}", e))
            })?;
        }
        wtr.flush()
            .map_err(|e| AppError::ReportGeneration(format!("CSV writer error: {}", e)))?;
    }
    Ok(buffer)
}

/// Right-to-left workbook with a bold, frozen header row
pub fn to_xlsx(table: &Table) -> AppResult<Vec<u8>> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| AppError::ReportGeneration(e.to_string());

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(table.sheet_name).map_err(xlsx_err)?;
    worksheet.set_right_to_left(true);

    for (col, label) in table.headers_ar().into_iter().enumerate() {
        let col = col as u16;
        worksheet
            .write_string_with_format(0, col, label, &header)
            .map_err(xlsx_err)?;
        worksheet.set_column_width(col, 22).map_err(xlsx_err)?;
    }
    worksheet.set_freeze_panes(1, 0).map_err(xlsx_err)?;

    for (row, values) in table.rows.iter().enumerate() {
        let row = row as u32 + 1;
        for (col, value) in values.iter().enumerate() {
            worksheet
                .write_string(row, col as u16, value.ar())
                .map_err(xlsx_err)?;
        }
    }

    workbook.save_to_buffer().map_err(xlsx_err)
}

// A4 landscape, in millimetres
const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 12.0;
const ROW_HEIGHT: f32 = 7.0;
const FONT_SIZE: f32 = 9.0;
const TITLE_SIZE: f32 = 14.0;

fn pdf_err(e: impl std::fmt::Display) -> AppError {
    AppError::ReportGeneration(e.to_string())
}

fn load_font(doc: &PdfDocumentReference, font_path: Option<&Path>) -> AppResult<IndirectFontRef> {
    match font_path {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|e| {
                AppError::Configuration(format!("PDF font {}: {}", path.display(), e))
            })?;
            doc.add_external_font(file).map_err(pdf_err)
        }
        None => doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err),
    }
}

/// Clip a cell to roughly what fits in its column
fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}

/// Characters Helvetica can draw through WinAnsi encoding
fn builtin_font_covers(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii() || ('\u{A0}'..='\u{FF}').contains(&c))
}

/// Builtin fonts silently drop anything outside WinAnsi, so refuse such text
fn check_builtin_font_coverage(table: &Table) -> AppResult<()> {
    let uncovered = std::iter::once(table.title.as_str())
        .chain(table.rows.iter().flatten().map(Cell::en))
        .find(|text| !builtin_font_covers(text));

    match uncovered {
        Some(text) => Err(AppError::ReportGeneration(format!(
            "PDF output needs reports.pdf_font_path to render non-Latin text ({})",
            clip(text, 24)
        ))),
        None => Ok(()),
    }
}

/// Paginated PDF table; the header row repeats on every page.
///
/// Builtin fonts only cover Latin text, so without a configured font the
/// header and enumerated values use their English labels and any other
/// non-Latin value fails the render.
pub fn to_pdf(table: &Table, font_path: Option<&Path>) -> AppResult<Vec<u8>> {
    let arabic = font_path.is_some();
    if !arabic {
        check_builtin_font_coverage(table)?;
    }

    let (doc, first_page, first_layer) =
        PdfDocument::new(table.title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = load_font(&doc, font_path)?;

    let headers = if arabic {
        table.headers_ar()
    } else {
        table.headers_en()
    };

    let column_count = table.columns.len().max(1);
    let column_width = (PAGE_WIDTH - 2.0 * MARGIN) / column_count as f32;
    let max_chars = (column_width / 1.9) as usize;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    layer.use_text(&table.title, TITLE_SIZE, Mm(MARGIN), Mm(PAGE_HEIGHT - MARGIN), &font);
    let mut y = PAGE_HEIGHT - MARGIN - 2.0 * ROW_HEIGHT;

    let write_row = |layer: &printpdf::PdfLayerReference, cells: &[&str], y: f32| {
        for (i, cell) in cells.iter().enumerate() {
            let x = MARGIN + i as f32 * column_width;
            layer.use_text(clip(cell, max_chars), FONT_SIZE, Mm(x), Mm(y), &font);
        }
    };

    write_row(&layer, &headers, y);
    y -= ROW_HEIGHT;

    for (index, row) in table.rows.iter().enumerate() {
        if y < MARGIN {
            let (page, page_layer) = doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Layer {}", index + 2),
            );
            layer = doc.get_page(page).get_layer(page_layer);
            y = PAGE_HEIGHT - MARGIN;
            write_row(&layer, &headers, y);
            y -= ROW_HEIGHT;
        }

        let cells: Vec<&str> = row
            .iter()
            .map(|cell| if arabic { cell.ar() } else { cell.en() })
            .collect();
        write_row(&layer, &cells, y);
        y -= ROW_HEIGHT;
    }

    doc.save_to_bytes().map_err(pdf_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Reader, Xlsx};
    use shared::models::{IncidentStatus, Severity};
    use sqlx::types::Json;
    use std::io::Cursor;
    use uuid::Uuid;

    fn incident(number: i64, title: &str) -> Incident {
        Incident {
            id: Uuid::new_v4(),
            incident_number: number,
            title: title.to_string(),
            incident_type: "تسلل".to_string(),
            description: "شخص مجهول عند البوابة".to_string(),
            location: "البوابة 3".to_string(),
            camera_id: Some("CAM-12".to_string()),
            severity: Severity::High,
            status: IncidentStatus::New,
            reported_by: Uuid::new_v4(),
            reported_by_name: Some("أحمد".to_string()),
            assigned_to: None,
            evidence: Json(Vec::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample() -> Table {
        incident_table(
            "تقرير البلاغات",
            &[incident(1, "حركة مريبة"), incident(2, "باب مفتوح, بدون حارس")],
        )
    }

    #[test]
    fn test_incident_headers_are_arabic() {
        let table = sample();
        let headers = table.headers_ar();
        assert_eq!(headers[0], "رقم البلاغ");
        assert_eq!(headers[1], "نوع البلاغ");
        assert_eq!(table.rows[0][4].ar(), "عالية");
        assert_eq!(table.rows[0][4].en(), "high");
        assert_eq!(table.rows[0][5].ar(), "جديد");
        assert_eq!(table.rows[0][5].en(), "new");
    }

    #[test]
    fn test_csv_has_bom_and_quotes_commas() {
        let bytes = to_csv(&sample()).unwrap();
        assert!(bytes.starts_with("\u{FEFF}".as_bytes()));

        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.trim_start_matches('\u{FEFF}').lines();
        assert!(lines.next().unwrap().starts_with("رقم البلاغ,نوع البلاغ"));
        assert!(text.contains("\"باب مفتوح, بدون حارس\""));
    }

    #[test]
    fn test_xlsx_round_trip_headers() {
        let bytes = to_xlsx(&sample()).unwrap();
        let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes)).unwrap();

        assert_eq!(workbook.sheet_names(), vec!["البلاغات".to_string()]);
        let range = workbook.worksheet_range("البلاغات").unwrap();

        let header: Vec<String> = range
            .rows()
            .next()
            .unwrap()
            .iter()
            .map(|cell| cell.to_string())
            .collect();
        assert_eq!(header, INCIDENT_COLUMNS.iter().map(|c| c.label_ar).collect::<Vec<_>>());
        assert_eq!(range.height(), 3);
    }

    fn latin_incident(number: i64) -> Incident {
        Incident {
            incident_type: "fire".to_string(),
            location: "Berth 3".to_string(),
            reported_by_name: Some("Salem".to_string()),
            ..incident(number, "Door left open")
        }
    }

    /// Text-showing operator as printpdf writes it for builtin fonts
    fn shown(text: &str) -> String {
        let hex: String = text.bytes().map(|b| format!("{:02X}", b)).collect();
        format!("<{}> Tj", hex)
    }

    #[test]
    fn test_pdf_with_builtin_font() {
        let incidents: Vec<Incident> = (1..=80).map(latin_incident).collect();
        let bytes = to_pdf(&incident_table("Incidents", &incidents), None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_builtin_font_pdf_keeps_row_values() {
        let bytes = to_pdf(&incident_table("Incidents", &[latin_incident(7)]), None).unwrap();
        let content = String::from_utf8_lossy(&bytes);

        for value in ["Severity", "7", "fire", "Berth 3", "high", "new", "Salem"] {
            assert!(content.contains(&shown(value)), "missing {}", value);
        }
        assert!(!content.contains("<> Tj"));
    }

    #[test]
    fn test_builtin_font_pdf_refuses_arabic_text() {
        let result = to_pdf(&sample(), None);
        match result {
            Err(AppError::ReportGeneration(message)) => {
                assert!(message.contains("pdf_font_path"))
            }
            other => panic!("expected a generation error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_missing_pdf_font_is_a_configuration_error() {
        let result = to_pdf(&sample(), Some(Path::new("/nonexistent/font.ttf")));
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdefghijkl", 5), "ab...");
    }
}
