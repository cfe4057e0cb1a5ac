//! In-place mutations of a `StructuredResume`.
//!
//! Every operation touches exactly one value; index and field errors leave the
//! document unchanged.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::errors::AppError;
use crate::resume::models::{ResumeEntry, ResumeSection, SectionKind, StructuredResume};

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("section '{section}' does not support {operation}")]
    Unsupported {
        section: &'static str,
        operation: &'static str,
    },

    #[error("{what} index {index} is out of range (length {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("unknown field '{field}' for section '{section}'")]
    UnknownField {
        section: &'static str,
        field: String,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid item: {0}")]
    InvalidItem(String),
}

impl From<EditError> for AppError {
    fn from(err: EditError) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListAction {
    Add,
    Remove,
}

fn unsupported(section: ResumeSection, operation: &'static str) -> EditError {
    EditError::Unsupported {
        section: section.key(),
        operation,
    }
}

fn check_index(what: &'static str, index: usize, len: usize) -> Result<(), EditError> {
    if index < len {
        Ok(())
    } else {
        Err(EditError::OutOfRange { what, index, len })
    }
}

fn non_empty(what: &'static str, text: &str) -> Result<String, EditError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EditError::Empty(what));
    }
    Ok(text.to_string())
}

fn entry_mut<'a>(
    resume: &'a mut StructuredResume,
    section: ResumeSection,
    item_index: usize,
    operation: &'static str,
) -> Result<&'a mut ResumeEntry, EditError> {
    let entries = resume
        .entries_mut(section)
        .ok_or_else(|| unsupported(section, operation))?;
    check_index("item", item_index, entries.len())?;
    Ok(&mut entries[item_index])
}

/// Entries with every field blank are dropped when the document is loaded, so an
/// edit must never produce one.
fn ensure_meaningful(entry: &ResumeEntry) -> Result<(), EditError> {
    if entry.is_meaningful() {
        Ok(())
    } else {
        Err(EditError::InvalidItem(
            "an entry needs at least one non-empty field".to_string(),
        ))
    }
}

/// Splits a multi-value field on newlines and commas.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(['\n', ','])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sets one scalar field.
///
/// - entry sections: `title`, `place`, `date` of the entry at `item_index`
/// - `personal_info`: any personal-detail field, `item_index` ignored; `links`
///   takes a newline or comma separated list and replaces all links
/// - `professional_summary`: field `text`, `item_index` ignored
/// - `skills` / `languages`: field `value`, the string at `item_index`
pub fn set_item_field(
    resume: &mut StructuredResume,
    section: ResumeSection,
    item_index: usize,
    field: &str,
    value: &str,
) -> Result<(), EditError> {
    let value = value.trim().to_string();
    let unknown = || EditError::UnknownField {
        section: section.key(),
        field: field.to_string(),
    };

    match section.kind() {
        SectionKind::Details if field == "links" => {
            resume.personal_info.links = split_list(&value);
        }
        SectionKind::Details => {
            let slot = resume.personal_info.field_mut(field).ok_or_else(unknown)?;
            *slot = value;
        }
        SectionKind::Text => {
            if field != "text" {
                return Err(unknown());
            }
            resume.professional_summary = value;
        }
        SectionKind::Entries => {
            let entry = entry_mut(resume, section, item_index, "field edits")?;
            let mut edited = entry.clone();
            let slot = match field {
                "title" => &mut edited.title,
                "place" => &mut edited.place,
                "date" => &mut edited.date,
                _ => return Err(unknown()),
            };
            *slot = value;
            ensure_meaningful(&edited)?;
            *entry = edited;
        }
        SectionKind::Strings => {
            if field != "value" {
                return Err(unknown());
            }
            let value = non_empty("value", &value)?;
            let items = resume
                .strings_mut(section)
                .ok_or_else(|| unsupported(section, "field edits"))?;
            check_index("item", item_index, items.len())?;
            items[item_index] = value;
        }
    }
    Ok(())
}

/// Replaces the text of one bullet.
pub fn set_bullet(
    resume: &mut StructuredResume,
    section: ResumeSection,
    item_index: usize,
    bullet_index: usize,
    text: &str,
) -> Result<(), EditError> {
    let text = non_empty("bullet text", text)?;
    let entry = entry_mut(resume, section, item_index, "bullets")?;
    check_index("bullet", bullet_index, entry.description.len())?;
    entry.description[bullet_index] = text;
    Ok(())
}

/// Returns the current text of one bullet.
pub fn bullet_text(
    resume: &StructuredResume,
    section: ResumeSection,
    item_index: usize,
    bullet_index: usize,
) -> Result<String, EditError> {
    let entries = resume
        .entries(section)
        .ok_or_else(|| unsupported(section, "bullets"))?;
    check_index("item", item_index, entries.len())?;
    let bullets = &entries[item_index].description;
    check_index("bullet", bullet_index, bullets.len())?;
    Ok(bullets[bullet_index].clone())
}

/// Inserts a bullet at `index`, or appends when `index` is `None`.
pub fn add_bullet(
    resume: &mut StructuredResume,
    section: ResumeSection,
    item_index: usize,
    index: Option<usize>,
    text: &str,
) -> Result<usize, EditError> {
    let text = non_empty("bullet text", text)?;
    let entry = entry_mut(resume, section, item_index, "bullets")?;
    let len = entry.description.len();
    let at = index.unwrap_or(len);
    if at > len {
        return Err(EditError::OutOfRange {
            what: "bullet",
            index: at,
            len,
        });
    }
    entry.description.insert(at, text);
    Ok(at)
}

pub fn remove_bullet(
    resume: &mut StructuredResume,
    section: ResumeSection,
    item_index: usize,
    bullet_index: usize,
) -> Result<String, EditError> {
    let entry = entry_mut(resume, section, item_index, "bullets")?;
    check_index("bullet", bullet_index, entry.description.len())?;
    let mut edited = entry.clone();
    let removed = edited.description.remove(bullet_index);
    ensure_meaningful(&edited)?;
    *entry = edited;
    Ok(removed)
}

/// Inserts an item into a list section at `index`, or appends when `index` is `None`.
///
/// Entry sections take an object (missing fields default to empty, but at least
/// one must be set); string sections take a string.
pub fn add_item(
    resume: &mut StructuredResume,
    section: ResumeSection,
    index: Option<usize>,
    item: Option<Value>,
) -> Result<usize, EditError> {
    match section.kind() {
        SectionKind::Entries => {
            let entry = match item {
                None | Some(Value::Null) => ResumeEntry {
                    title: "New entry".to_string(),
                    ..Default::default()
                },
                Some(value @ Value::Object(_)) => {
                    let entry = serde_json::from_value::<ResumeEntry>(value)
                        .map_err(|e| EditError::InvalidItem(e.to_string()))?;
                    ensure_meaningful(&entry)?;
                    entry
                }
                Some(_) => {
                    return Err(EditError::InvalidItem(format!(
                        "'{}' items must be objects",
                        section.key()
                    )))
                }
            };
            let entries = resume
                .entries_mut(section)
                .ok_or_else(|| unsupported(section, "items"))?;
            insert_at(entries, index, entry, "item")
        }
        SectionKind::Strings => {
            let text = match item {
                Some(Value::String(text)) => non_empty("item", &text)?,
                _ => {
                    return Err(EditError::InvalidItem(format!(
                        "'{}' items must be non-empty strings",
                        section.key()
                    )))
                }
            };
            let items = resume
                .strings_mut(section)
                .ok_or_else(|| unsupported(section, "items"))?;
            insert_at(items, index, text, "item")
        }
        SectionKind::Details | SectionKind::Text => Err(unsupported(section, "items")),
    }
}

/// Removes the item at `index`, preserving the order of the rest.
pub fn remove_item(
    resume: &mut StructuredResume,
    section: ResumeSection,
    index: usize,
) -> Result<(), EditError> {
    match section.kind() {
        SectionKind::Entries => {
            let entries = resume
                .entries_mut(section)
                .ok_or_else(|| unsupported(section, "items"))?;
            check_index("item", index, entries.len())?;
            entries.remove(index);
        }
        SectionKind::Strings => {
            let items = resume
                .strings_mut(section)
                .ok_or_else(|| unsupported(section, "items"))?;
            check_index("item", index, items.len())?;
            items.remove(index);
        }
        SectionKind::Details | SectionKind::Text => return Err(unsupported(section, "items")),
    }
    Ok(())
}

fn insert_at<T>(
    list: &mut Vec<T>,
    index: Option<usize>,
    value: T,
    what: &'static str,
) -> Result<usize, EditError> {
    let len = list.len();
    let at = index.unwrap_or(len);
    if at > len {
        return Err(EditError::OutOfRange {
            what,
            index: at,
            len,
        });
    }
    list.insert(at, value);
    Ok(at)
}
