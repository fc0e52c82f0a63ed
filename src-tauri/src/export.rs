use crate::errors::{AppError, AppResult};
use crate::models::{ExportResponse, Lead};
use crate::stats::date_label;
use chrono::{DateTime, FixedOffset, Utc};
use std::path::Path;

pub const CSV_HEADER: &str = "Fecha,Nombre,Email,Empresa,Teléfono,Servicio,Estado,Mensaje";

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

pub fn render_csv(leads: &[Lead], offset: FixedOffset) -> String {
    let mut lines = Vec::with_capacity(leads.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for lead in leads {
        let date = date_label(lead.created_at, offset);
        let cells = [
            date.as_str(),
            lead.name.as_str(),
            lead.email.as_str(),
            lead.company.as_str(),
            lead.phone.as_str(),
            lead.service.map(|service| service.as_str()).unwrap_or_default(),
            lead.status.as_str(),
            lead.message.as_str(),
        ];
        lines.push(cells.iter().map(|cell| quote(cell)).collect::<Vec<_>>().join(","));
    }
    lines.join("\n")
}

pub fn export_file_name(now: DateTime<Utc>, offset: FixedOffset) -> String {
    format!("leads_{}.csv", now.with_timezone(&offset).format("%Y-%m-%d"))
}

/// Writes the full lead set to `export_dir`. An empty set is refused rather
/// than producing a header-only file.
pub fn write_csv_export(
    export_dir: &Path,
    leads: &[Lead],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> AppResult<ExportResponse> {
    if leads.is_empty() {
        return Err(AppError::Validation("No hay leads para exportar".to_string()));
    }

    std::fs::create_dir_all(export_dir).map_err(|error| AppError::Io(error.to_string()))?;
    let file_name = export_file_name(now, offset);
    let output_path = export_dir.join(&file_name);
    std::fs::write(&output_path, render_csv(leads, offset)).map_err(|error| AppError::Io(error.to_string()))?;

    tracing::info!(rows = leads.len(), file = %file_name, "lead export written");
    Ok(ExportResponse {
        path: output_path.to_string_lossy().to_string(),
        file_name,
        row_count: leads.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::{render_csv, write_csv_export, CSV_HEADER};
    use crate::errors::AppError;
    use crate::models::{Lead, LeadSource, LeadStatus, Service};
    use chrono::{FixedOffset, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn ana() -> Lead {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 10, 18, 30, 0).single().expect("created");
        Lead {
            id: "lead-1".to_string(),
            name: "Ana".to_string(),
            email: "a@b.com".to_string(),
            company: String::new(),
            phone: String::new(),
            service: Some(Service::Custom),
            message: String::new(),
            status: LeadStatus::New,
            source: LeadSource::Website,
            created_at,
            updated_at: created_at,
        }
    }

    fn offset() -> FixedOffset {
        FixedOffset::west_opt(6 * 3600).expect("offset")
    }

    #[test]
    fn single_lead_renders_header_and_quoted_row() {
        let csv = render_csv(&[ana()], offset());
        assert_eq!(
            csv,
            format!("{}\n\"10/03/2026\",\"Ana\",\"a@b.com\",\"\",\"\",\"custom\",\"new\",\"\"", CSV_HEADER)
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let mut lead = ana();
        lead.message = "Quiero \"todo\", ya".to_string();
        let csv = render_csv(&[lead], offset());
        assert!(csv.ends_with("\"Quiero \"\"todo\"\", ya\""));
    }

    #[test]
    fn empty_export_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let now = Utc::now();
        let result = write_csv_export(dir.path(), &[], now, offset());
        assert!(matches!(result, Err(AppError::Validation(message)) if message == "No hay leads para exportar"));
        assert_eq!(std::fs::read_dir(dir.path()).expect("dir").count(), 0);
    }

    #[test]
    fn export_file_is_named_by_date() {
        let dir = tempfile::tempdir().expect("tempdir");
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 3, 0, 0).single().expect("now");
        let response = write_csv_export(dir.path(), &[ana()], now, offset()).expect("export");
        assert_eq!(response.file_name, "leads_2026-10-15.csv");
        assert_eq!(response.row_count, 1);
        let written = std::fs::read_to_string(&response.path).expect("read export");
        assert!(written.starts_with(CSV_HEADER));
    }
}
