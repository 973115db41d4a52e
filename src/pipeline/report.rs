//! Renders the non-mutual list as a styled spreadsheet artifact under
//! `UPLOAD_DIR/{job_id}.xlsx`. Grounded on `original_source`'s report
//! generation step, reimplemented with `rust_xlsxwriter` — the pack's
//! idiomatic choice for Rust-native `.xlsx` output.

use std::path::PathBuf;

use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use uuid::Uuid;

use crate::models::NonMutualRecordRow;

pub struct RenderedArtifact {
    pub path: String,
    pub size_bytes: u64,
}

pub fn render(
    upload_dir: &str,
    job_id: Uuid,
    target_handle: &str,
    records: &[NonMutualRecordRow],
) -> Result<RenderedArtifact, std::io::Error> {
    std::fs::create_dir_all(upload_dir)?;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name("non-mutual").map_err(to_io_error)?;

    let header_format = Format::new().set_bold().set_align(FormatAlign::Center);

    sheet.write_with_format(0, 0, "Username", &header_format).map_err(to_io_error)?;
    sheet.write_with_format(0, 1, "Full name", &header_format).map_err(to_io_error)?;
    sheet.write_with_format(0, 2, "Profile URL", &header_format).map_err(to_io_error)?;

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet
            .write(row, 0, record.target_handle.as_str())
            .map_err(to_io_error)?;
        sheet
            .write(row, 1, record.target_full_name.clone().unwrap_or_default())
            .map_err(to_io_error)?;
        sheet
            .write(
                row,
                2,
                format!("https://www.example-photo-network.com/{}/", record.target_handle),
            )
            .map_err(to_io_error)?;
    }

    sheet.autofit();

    let filename = format!("{job_id}.xlsx");
    let path = PathBuf::from(upload_dir).join(&filename);
    workbook.save(&path).map_err(to_io_error)?;

    let size_bytes = std::fs::metadata(&path)?.len();

    tracing::info!(
        "report: rendered {} non-mutual rows for job {} (target={}) to {:?}",
        records.len(),
        job_id,
        target_handle,
        path
    );

    Ok(RenderedArtifact {
        path: path.to_string_lossy().to_string(),
        size_bytes,
    })
}

fn to_io_error(e: rust_xlsxwriter::XlsxError) -> std::io::Error {
    std::io::Error::other(e.to_string())
}
