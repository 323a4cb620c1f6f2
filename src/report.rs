//! Plain-text scan report.

use std::fmt::{self, Write};

use time::macros::format_description;

use crate::core::db::{Scan, User};
use crate::models::ClassificationStatus;

pub fn render_text_report(scan: &Scan, user: &User) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_report(&mut out, scan, user)?;
    Ok(out)
}

fn write_report(out: &mut String, scan: &Scan, user: &User) -> fmt::Result {
    let date_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let scanned_at = scan.scanned_at.format(date_format).map_err(|_| fmt::Error)?;

    writeln!(out, "X-RAY ANALYSIS REPORT")?;
    writeln!(out, "=====================\n")?;

    writeln!(out, "Patient Information")?;
    writeln!(out, "  Patient Name:      {}", user.username)?;
    writeln!(out, "  Email:             {}", user.email)?;
    writeln!(out, "  Scan ID:           {}\n", scan.id)?;

    writeln!(out, "Scan Analysis Results")?;
    writeln!(out, "  Original Filename: {}", scan.original_filename)?;
    writeln!(out, "  Scan Date:         {}", scanned_at)?;
    writeln!(out, "  Analysis Result:   {}", scan.result.label())?;
    writeln!(out, "  Confidence Level:  {:.2}%", scan.confidence)?;
    writeln!(out, "  Defects Marked:    {}", scan.defect_count)?;
    if let Some(notes) = &scan.notes {
        writeln!(out, "  Notes:             {}", notes)?;
    }
    writeln!(out)?;

    writeln!(out, "Analysis Summary")?;
    match scan.result {
        ClassificationStatus::Defective => {
            writeln!(
                out,
                "  Potential abnormalities were flagged with {:.2}% confidence; \
                 {} location(s) were marked for review.",
                scan.confidence, scan.defect_count
            )?;
            writeln!(out, "  Consult a qualified radiologist for interpretation.")?;
        }
        ClassificationStatus::NonDefective => {
            writeln!(
                out,
                "  No significant abnormalities were flagged ({:.2}% confidence).",
                scan.confidence
            )?;
            writeln!(out, "  Keep this report for your medical records.")?;
        }
    }
    writeln!(out)?;

    writeln!(out, "Disclaimer")?;
    writeln!(
        out,
        "  Scores come from fixed image statistics and filename keywords. \
         They are not a diagnosis and may be wrong in either direction."
    )
}
