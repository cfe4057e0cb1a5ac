//! Resume assembler: renders a `StructuredResume` into a WordprocessingML package.
//!
//! Layout: 0.5" margins, Arial 9pt body, centred 18pt name, centred contact and
//! link lines, level-2 section headings, bold entry lines with an italic date, and
//! bulleted descriptions indented 1". Empty fields and sections are skipped.

use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::resume::models::{PersonalDetails, ResumeEntry, StructuredResume};

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

// Twips (1/1440") and half-points.
const HALF_INCH: u32 = 720;
const ONE_INCH: u32 = 1440;
const BODY_SIZE: u32 = 18;
const ENTRY_TITLE_SIZE: u32 = 20;
const HEADING_SIZE: u32 = 22;
const NAME_SIZE: u32 = 36;
const SPACE_AFTER_SECTION: u32 = 120;

#[derive(Debug, Default, Clone)]
struct Run {
    text: String,
    bold: bool,
    italic: bool,
    size: Option<u32>,
}

impl Run {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    fn to_xml(&self) -> String {
        let mut props = String::new();
        if self.bold {
            props.push_str("<w:b/>");
        }
        if self.italic {
            props.push_str("<w:i/>");
        }
        if let Some(size) = self.size {
            props.push_str(&format!("<w:sz w:val=\"{size}\"/><w:szCs w:val=\"{size}\"/>"));
        }
        let props = if props.is_empty() {
            String::new()
        } else {
            format!("<w:rPr>{props}</w:rPr>")
        };
        format!(
            "<w:r>{props}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
            escape(self.text.as_str())
        )
    }
}

#[derive(Debug, Default, Clone)]
struct Paragraph {
    style: Option<&'static str>,
    bullet: bool,
    centered: bool,
    indent: u32,
    space_after: u32,
    runs: Vec<Run>,
}

impl Paragraph {
    fn to_xml(&self) -> String {
        let mut props = String::new();
        if let Some(style) = self.style {
            props.push_str(&format!("<w:pStyle w:val=\"{style}\"/>"));
        }
        if self.bullet {
            props.push_str("<w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"1\"/></w:numPr>");
        }
        props.push_str(&format!(
            "<w:spacing w:after=\"{}\" w:line=\"240\" w:lineRule=\"auto\"/>",
            self.space_after
        ));
        if self.bullet {
            props.push_str(&format!(
                "<w:ind w:left=\"{ONE_INCH}\" w:hanging=\"360\"/>"
            ));
        } else if self.indent > 0 {
            props.push_str(&format!("<w:ind w:left=\"{}\"/>", self.indent));
        }
        if self.centered {
            props.push_str("<w:jc w:val=\"center\"/>");
        }
        let runs: String = self.runs.iter().map(Run::to_xml).collect();
        format!("<w:p><w:pPr>{props}</w:pPr>{runs}</w:p>")
    }
}

/// Accumulates body paragraphs in document order.
#[derive(Default)]
struct DocumentBuilder {
    paragraphs: Vec<Paragraph>,
}

impl DocumentBuilder {
    fn centered(&mut self, runs: Vec<Run>, space_after: u32) {
        self.paragraphs.push(Paragraph {
            centered: true,
            space_after,
            runs,
            ..Default::default()
        });
    }

    fn heading(&mut self, title: &str) {
        self.paragraphs.push(Paragraph {
            style: Some("Heading2"),
            runs: vec![Run::plain(title)],
            ..Default::default()
        });
    }

    fn body(&mut self, text: &str, space_after: u32) {
        self.paragraphs.push(Paragraph {
            indent: HALF_INCH,
            space_after,
            runs: vec![Run::plain(text)],
            ..Default::default()
        });
    }

    fn entry_line(&mut self, main: String, date: Option<&str>) {
        let mut runs = vec![Run {
            text: main,
            bold: true,
            size: Some(ENTRY_TITLE_SIZE),
            ..Default::default()
        }];
        if let Some(date) = date {
            runs.push(Run {
                text: format!(" | {date}"),
                italic: true,
                size: Some(BODY_SIZE),
                ..Default::default()
            });
        }
        self.paragraphs.push(Paragraph {
            indent: HALF_INCH,
            runs,
            ..Default::default()
        });
    }

    fn bullet(&mut self, text: &str) {
        self.paragraphs.push(Paragraph {
            style: Some("ListBullet"),
            bullet: true,
            runs: vec![Run::plain(text)],
            ..Default::default()
        });
    }

    fn document_xml(&self) -> String {
        let body: String = self.paragraphs.iter().map(Paragraph::to_xml).collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"{WORD_NS}\"><w:body>{body}\
             <w:sectPr><w:pgSz w:w=\"12240\" w:h=\"15840\"/>\
             <w:pgMar w:top=\"{HALF_INCH}\" w:right=\"{HALF_INCH}\" w:bottom=\"{HALF_INCH}\" \
             w:left=\"{HALF_INCH}\" w:header=\"{HALF_INCH}\" w:footer=\"{HALF_INCH}\" w:gutter=\"0\"/>\
             </w:sectPr></w:body></w:document>"
        )
    }
}

/// Which optional parts of an entry a section shows.
#[derive(Clone, Copy)]
struct EntryLayout {
    show_place: bool,
    show_date: bool,
}

fn add_header(doc: &mut DocumentBuilder, details: &PersonalDetails) {
    if !details.name.is_empty() {
        doc.centered(
            vec![Run {
                text: details.name.clone(),
                bold: true,
                size: Some(NAME_SIZE),
                ..Default::default()
            }],
            0,
        );
    }

    let contact: Vec<&str> = [
        details.phone_number.as_str(),
        details.email.as_str(),
        details.address.as_str(),
    ]
    .into_iter()
    .filter(|item| !item.is_empty())
    .collect();
    if !contact.is_empty() {
        doc.centered(vec![Run::plain(contact.join(" | "))], 0);
    }

    let mut links = Vec::new();
    if !details.linkedin.is_empty() {
        links.push(format!("LinkedIn: {}", details.linkedin));
    }
    if !details.github.is_empty() {
        links.push(format!("GitHub: {}", details.github));
    }
    links.extend(details.links.iter().filter(|l| !l.is_empty()).cloned());
    if !links.is_empty() {
        doc.centered(vec![Run::plain(links.join(" | "))], SPACE_AFTER_SECTION);
    }
}

fn add_entries(
    doc: &mut DocumentBuilder,
    heading: &str,
    entries: &[ResumeEntry],
    layout: EntryLayout,
) {
    let visible: Vec<&ResumeEntry> = entries
        .iter()
        .filter(|entry| {
            !entry.title.is_empty()
                || (layout.show_place && !entry.place.is_empty())
                || (layout.show_date && !entry.date.is_empty())
                || entry.description.iter().any(|d| !d.is_empty())
        })
        .collect();
    if visible.is_empty() {
        return;
    }

    doc.heading(heading);
    for entry in visible {
        let mut main = entry.title.clone();
        if layout.show_place && !entry.place.is_empty() {
            if main.is_empty() {
                main = entry.place.clone();
            } else {
                main.push_str(&format!(" - {}", entry.place));
            }
        }
        let date = (layout.show_date && !entry.date.is_empty()).then_some(entry.date.as_str());
        doc.entry_line(main, date);

        for bullet in entry.description.iter().filter(|d| !d.is_empty()) {
            doc.bullet(bullet);
        }
    }
}

/// Renders the resume into .docx bytes.
pub fn render_resume(resume: &StructuredResume) -> Result<Vec<u8>> {
    let mut doc = DocumentBuilder::default();

    add_header(&mut doc, &resume.personal_info);

    if !resume.professional_summary.is_empty() {
        doc.heading("Professional Summary");
        doc.body(&resume.professional_summary, SPACE_AFTER_SECTION);
    }

    let full = EntryLayout {
        show_place: true,
        show_date: true,
    };
    add_entries(&mut doc, "Work Experience", &resume.work_experience, full);
    add_entries(
        &mut doc,
        "Personal Projects",
        &resume.personal_projects,
        EntryLayout {
            show_place: false,
            show_date: false,
        },
    );
    add_entries(&mut doc, "Education", &resume.education, full);

    let combined: Vec<&str> = resume
        .skills
        .iter()
        .chain(&resume.languages)
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    if !combined.is_empty() {
        doc.heading("Skills & Languages");
        doc.body(&combined.join(" | "), SPACE_AFTER_SECTION);
    }

    package(&doc.document_xml())
}

fn package(document_xml: &str) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
        ("word/styles.xml", styles_xml()),
        ("word/numbering.xml", NUMBERING.to_string()),
        ("word/document.xml", document_xml.to_string()),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)
            .with_context(|| format!("Failed to start docx part {name}"))?;
        zip.write_all(content.as_bytes())?;
    }

    let cursor = zip.finish().context("Failed to finish docx archive")?;
    Ok(cursor.into_inner())
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/></Relationships>"#;

const NUMBERING: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="0"><w:multiLevelType w:val="singleLevel"/><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="&#8226;"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="1440" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#;

fn styles_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{WORD_NS}"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Arial" w:hAnsi="Arial" w:cs="Arial" w:eastAsia="Arial"/><w:sz w:val="{BODY_SIZE}"/><w:szCs w:val="{BODY_SIZE}"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="0" w:line="240" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="120" w:after="0"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:color w:val="1F3864"/><w:sz w:val="{HEADING_SIZE}"/><w:szCs w:val="{HEADING_SIZE}"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/><w:pPr><w:numPr><w:numId w:val="1"/></w:numPr></w:pPr></w:style></w:styles>"#
    )
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::document::reader::docx_text;

    fn sample() -> StructuredResume {
        StructuredResume {
            personal_info: PersonalDetails {
                name: "Jane Doe".to_string(),
                email: "jane@example.com".to_string(),
                phone_number: "555-0100".to_string(),
                linkedin: "linkedin.com/in/janedoe".to_string(),
                ..Default::default()
            },
            professional_summary: "Backend engineer focused on payments.".to_string(),
            work_experience: vec![ResumeEntry {
                title: "Senior Engineer".to_string(),
                place: "Acme & Sons".to_string(),
                date: "2021 - Present".to_string(),
                description: vec![
                    "Cut p99 latency by 40% with <5ms cache".to_string(),
                    "Led migration of 12 services to Rust".to_string(),
                ],
            }],
            personal_projects: vec![ResumeEntry {
                title: "ledgerd".to_string(),
                place: "GitHub".to_string(),
                date: "2022".to_string(),
                description: vec!["Double-entry ledger daemon".to_string()],
            }],
            education: vec![ResumeEntry {
                title: "BSc Computer Science".to_string(),
                place: "State University".to_string(),
                date: "2016".to_string(),
                description: vec![],
            }],
            skills: vec!["Rust".to_string(), "PostgreSQL".to_string()],
            languages: vec!["English".to_string()],
        }
    }

    #[test]
    fn test_every_bullet_survives_a_reparse() {
        let resume = sample();
        let text = docx_text(&render_resume(&resume).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        for bullet in resume.bullets() {
            assert!(lines.contains(&bullet), "missing bullet {bullet:?} in {text}");
        }
    }

    #[test]
    fn test_layout_lines() {
        let text = docx_text(&render_resume(&sample()).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Jane Doe");
        assert_eq!(lines[1], "555-0100 | jane@example.com");
        assert_eq!(lines[2], "LinkedIn: linkedin.com/in/janedoe");
        assert!(lines.contains(&"Senior Engineer - Acme & Sons | 2021 - Present"));
        // projects drop place and date
        assert!(lines.contains(&"ledgerd"));
        assert!(lines.contains(&"Skills & Languages"));
        assert!(lines.contains(&"Rust | PostgreSQL | English"));
    }

    #[test]
    fn test_empty_sections_have_no_heading() {
        let resume = StructuredResume {
            professional_summary: "Summary only.".to_string(),
            ..Default::default()
        };
        let text = docx_text(&render_resume(&resume).unwrap()).unwrap();
        assert_eq!(text, "Professional Summary\nSummary only.");
    }

    #[test]
    fn test_package_contains_required_parts() {
        let bytes = render_resume(&sample()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/_rels/document.xml.rels",
            "word/styles.xml",
            "word/numbering.xml",
        ] {
            assert!(archive.by_name(part).is_ok(), "missing part {part}");
        }
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.contains("w:pgMar w:top=\"720\""));
        assert!(xml.contains("Acme &amp; Sons"));
    }
}
