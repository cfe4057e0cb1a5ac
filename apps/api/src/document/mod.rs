pub mod reader;
pub mod writer;

use anyhow::{bail, Context, Result};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Lowercased extension of an uploaded file name, without the dot.
pub fn extension(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Plain text of an uploaded document, picked by extension: .docx, .pdf, or UTF-8 .txt/.md.
pub fn extract_upload_text(file_name: &str, bytes: &[u8]) -> Result<String> {
    let text = match extension(file_name).as_deref() {
        Some("docx") => reader::docx_text(bytes)?,
        Some("pdf") => pdf_extract::extract_text_from_mem(bytes)
            .with_context(|| format!("Failed to extract text from {file_name}"))?,
        Some("txt") | Some("md") => String::from_utf8(bytes.to_vec())
            .with_context(|| format!("{file_name} is not valid UTF-8"))?,
        _ => bail!("Unsupported file type for {file_name}; expected .docx, .pdf, .txt or .md"),
    };
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::models::StructuredResume;

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(extension("Resume.DOCX").as_deref(), Some("docx"));
        assert_eq!(extension("notes"), None);
    }

    #[test]
    fn test_plain_text_upload_is_trimmed() {
        let text = extract_upload_text("wins.md", b"\n- Shipped search\n").unwrap();
        assert_eq!(text, "- Shipped search");
    }

    #[test]
    fn test_docx_upload_goes_through_reader() {
        let resume = StructuredResume {
            professional_summary: "Data engineer.".to_string(),
            ..Default::default()
        };
        let bytes = writer::render_resume(&resume).unwrap();
        let text = extract_upload_text("cv.docx", &bytes).unwrap();
        assert!(text.contains("Data engineer."));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = extract_upload_text("photo.png", b"\x89PNG").unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
    }
}
