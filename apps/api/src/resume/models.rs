//! Structured resume: the canonical JSON document used for rendering and editing.
//!
//! LLM output is loose: keys arrive as "Work Experience", descriptions as one
//! newline-separated string, fields as null. Deserialization here is lenient and
//! normalizes all of that into one shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, alias = "phone", deserialize_with = "lenient_string")]
    pub phone_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub linkedin: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub github: String,
    /// Any other profile or portfolio URLs.
    #[serde(default, deserialize_with = "lenient_lines")]
    pub links: Vec<String>,
}

impl PersonalDetails {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.email.is_empty()
            && self.phone_number.is_empty()
            && self.address.is_empty()
            && self.linkedin.is_empty()
            && self.github.is_empty()
            && self.links.is_empty()
    }

    /// Mutable handle to a scalar field by its JSON name.
    pub fn field_mut(&mut self, field: &str) -> Option<&mut String> {
        match field {
            "name" => Some(&mut self.name),
            "email" => Some(&mut self.email),
            "phone_number" | "phone" => Some(&mut self.phone_number),
            "address" => Some(&mut self.address),
            "linkedin" => Some(&mut self.linkedin),
            "github" => Some(&mut self.github),
            _ => None,
        }
    }
}

/// One row of work experience, a project, or an education entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub place: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_lines")]
    pub description: Vec<String>,
}

impl ResumeEntry {
    pub fn is_meaningful(&self) -> bool {
        !(self.title.is_empty()
            && self.place.is_empty()
            && self.date.is_empty()
            && self.description.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredResume {
    #[serde(default, deserialize_with = "lenient_details")]
    pub personal_info: PersonalDetails,
    #[serde(default, deserialize_with = "lenient_string")]
    pub professional_summary: String,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub work_experience: Vec<ResumeEntry>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub personal_projects: Vec<ResumeEntry>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub education: Vec<ResumeEntry>,
    #[serde(default, deserialize_with = "lenient_lines")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient_lines")]
    pub languages: Vec<String>,
}

impl StructuredResume {
    /// Builds a resume from raw LLM JSON, normalizing keys first.
    /// Rejects documents with no resume content at all.
    pub fn from_llm_value(value: Value) -> Result<Self, String> {
        let Value::Object(map) = value else {
            return Err("expected a JSON object at the top level".to_string());
        };
        let resume: StructuredResume = serde_json::from_value(Value::Object(normalize_keys(map)))
            .map_err(|e| e.to_string())?;
        if !resume.has_content() {
            return Err(
                "resume has no professional_summary, work_experience, personal_projects, \
                 education, skills or languages"
                    .to_string(),
            );
        }
        Ok(resume)
    }

    pub fn has_content(&self) -> bool {
        !self.professional_summary.is_empty()
            || !self.work_experience.is_empty()
            || !self.personal_projects.is_empty()
            || !self.education.is_empty()
            || !self.skills.is_empty()
            || !self.languages.is_empty()
    }

    pub fn entries(&self, section: ResumeSection) -> Option<&Vec<ResumeEntry>> {
        match section {
            ResumeSection::WorkExperience => Some(&self.work_experience),
            ResumeSection::PersonalProjects => Some(&self.personal_projects),
            ResumeSection::Education => Some(&self.education),
            _ => None,
        }
    }

    pub fn entries_mut(&mut self, section: ResumeSection) -> Option<&mut Vec<ResumeEntry>> {
        match section {
            ResumeSection::WorkExperience => Some(&mut self.work_experience),
            ResumeSection::PersonalProjects => Some(&mut self.personal_projects),
            ResumeSection::Education => Some(&mut self.education),
            _ => None,
        }
    }

    pub fn strings_mut(&mut self, section: ResumeSection) -> Option<&mut Vec<String>> {
        match section {
            ResumeSection::Skills => Some(&mut self.skills),
            ResumeSection::Languages => Some(&mut self.languages),
            _ => None,
        }
    }

    /// Every bullet across the entry sections, in document order.
    pub fn bullets(&self) -> impl Iterator<Item = &str> {
        self.work_experience
            .iter()
            .chain(&self.personal_projects)
            .chain(&self.education)
            .flat_map(|entry| entry.description.iter().map(String::as_str))
    }

    /// The JSON value of one section, in the same shape `parse_section` accepts.
    pub fn section_value(&self, section: ResumeSection) -> Value {
        let value = match section {
            ResumeSection::PersonalInfo => serde_json::to_value(&self.personal_info),
            ResumeSection::ProfessionalSummary => {
                Ok(Value::String(self.professional_summary.clone()))
            }
            ResumeSection::WorkExperience => serde_json::to_value(&self.work_experience),
            ResumeSection::PersonalProjects => serde_json::to_value(&self.personal_projects),
            ResumeSection::Education => serde_json::to_value(&self.education),
            ResumeSection::Skills => serde_json::to_value(&self.skills),
            ResumeSection::Languages => serde_json::to_value(&self.languages),
        };
        value.unwrap_or(Value::Null)
    }

    /// Parses `value` as the given section's shape without touching `self`.
    /// Accepts either the bare value or an object wrapping it under the section key.
    pub fn parse_section(section: ResumeSection, value: Value) -> Result<Self, String> {
        let value = match value {
            Value::Object(mut map) if map.contains_key(section.key()) => {
                map.remove(section.key()).unwrap_or(Value::Null)
            }
            other => other,
        };

        let shape_ok = match section.kind() {
            SectionKind::Details => value.is_object(),
            SectionKind::Text => value.is_string(),
            SectionKind::Entries | SectionKind::Strings => value.is_array(),
        };
        if !shape_ok {
            return Err(format!(
                "section '{}' must be {}",
                section.key(),
                section.kind().describe()
            ));
        }

        let mut wrapper = Map::new();
        wrapper.insert(section.key().to_string(), value);
        serde_json::from_value(Value::Object(wrapper)).map_err(|e| e.to_string())
    }

    /// Copies one section from `other` into `self`, leaving every other section untouched.
    pub fn take_section_from(&mut self, section: ResumeSection, other: StructuredResume) {
        match section {
            ResumeSection::PersonalInfo => self.personal_info = other.personal_info,
            ResumeSection::ProfessionalSummary => {
                self.professional_summary = other.professional_summary
            }
            ResumeSection::WorkExperience => self.work_experience = other.work_experience,
            ResumeSection::PersonalProjects => self.personal_projects = other.personal_projects,
            ResumeSection::Education => self.education = other.education,
            ResumeSection::Skills => self.skills = other.skills,
            ResumeSection::Languages => self.languages = other.languages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeSection {
    PersonalInfo,
    ProfessionalSummary,
    WorkExperience,
    PersonalProjects,
    Education,
    Skills,
    Languages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Details,
    Text,
    Entries,
    Strings,
}

impl SectionKind {
    pub fn describe(self) -> &'static str {
        match self {
            SectionKind::Details => "an object of personal details",
            SectionKind::Text => "a string",
            SectionKind::Entries => "an array of {title, place, date, description[]} objects",
            SectionKind::Strings => "an array of strings",
        }
    }
}

impl ResumeSection {
    pub fn key(self) -> &'static str {
        match self {
            ResumeSection::PersonalInfo => "personal_info",
            ResumeSection::ProfessionalSummary => "professional_summary",
            ResumeSection::WorkExperience => "work_experience",
            ResumeSection::PersonalProjects => "personal_projects",
            ResumeSection::Education => "education",
            ResumeSection::Skills => "skills",
            ResumeSection::Languages => "languages",
        }
    }

    pub fn kind(self) -> SectionKind {
        match self {
            ResumeSection::PersonalInfo => SectionKind::Details,
            ResumeSection::ProfessionalSummary => SectionKind::Text,
            ResumeSection::WorkExperience
            | ResumeSection::PersonalProjects
            | ResumeSection::Education => SectionKind::Entries,
            ResumeSection::Skills | ResumeSection::Languages => SectionKind::Strings,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient deserialization helpers
// ────────────────────────────────────────────────────────────────────────────

/// "Professional Summary" → "professional_summary"; "Personal Info" etc. likewise.
fn normalize_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let key = key
                .trim()
                .to_lowercase()
                .split(|c: char| c.is_whitespace() || c == '-')
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join("_");
            (key, value)
        })
        .collect()
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Removes list glyphs LLMs like to prefix bullets with.
pub(crate) fn strip_bullet_marker(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['-', '*', '•', '–', '·'])
        .trim()
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(scalar_to_string).unwrap_or_default())
}

fn lenient_lines<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let lines = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => text
            .lines()
            .map(strip_bullet_marker)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(scalar_to_string)
            .filter(|item| !item.is_empty())
            .collect(),
        Some(other) => vec![scalar_to_string(other)],
    };
    Ok(lines)
}

fn lenient_entries<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<ResumeEntry>, D::Error> {
    let entries = Option::<Vec<ResumeEntry>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .filter(ResumeEntry::is_meaningful)
        .collect())
}

fn lenient_details<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<PersonalDetails, D::Error> {
    Ok(Option::<PersonalDetails>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_llm_keys_are_normalized() {
        let value = json!({
            "Professional Summary": "Backend engineer.",
            "Work Experience": [
                {"title": "Engineer", "place": "Acme", "date": "2020-2023",
                 "description": ["Cut p99 latency by 40%"]}
            ],
            "Skills": ["Rust", "SQL"],
            "Languages": ["English"]
        });
        let resume = StructuredResume::from_llm_value(value).unwrap();
        assert_eq!(resume.professional_summary, "Backend engineer.");
        assert_eq!(resume.work_experience[0].place, "Acme");
        assert_eq!(resume.skills, vec!["Rust", "SQL"]);
        assert_eq!(resume.languages, vec!["English"]);
    }

    #[test]
    fn test_string_description_is_split_into_bullets() {
        let value = json!({
            "work_experience": [
                {"title": "Engineer", "description": "- Built the API\n\n• Led on-call rotation\n"}
            ]
        });
        let resume = StructuredResume::from_llm_value(value).unwrap();
        assert_eq!(
            resume.work_experience[0].description,
            vec!["Built the API", "Led on-call rotation"]
        );
    }

    #[test]
    fn test_empty_entries_and_nulls_are_dropped() {
        let value = json!({
            "education": [
                {"title": "", "place": null, "date": "", "description": []},
                {"title": "BSc Computer Science", "place": "MIT", "date": null}
            ],
            "skills": ["Rust", "", null]
        });
        let resume = StructuredResume::from_llm_value(value).unwrap();
        assert_eq!(resume.education.len(), 1);
        assert_eq!(resume.education[0].date, "");
        assert_eq!(resume.skills, vec!["Rust"]);
    }

    #[test]
    fn test_resume_without_content_is_rejected() {
        let err = StructuredResume::from_llm_value(json!({"note": "sorry"})).unwrap_err();
        assert!(err.contains("no professional_summary"));
        assert!(StructuredResume::from_llm_value(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_personal_details_accept_phone_alias() {
        let details: PersonalDetails = serde_json::from_value(json!({
            "name": " Ada Lovelace ",
            "phone": "+44 20 7946 0000",
            "github": null
        }))
        .unwrap();
        assert_eq!(details.name, "Ada Lovelace");
        assert_eq!(details.phone_number, "+44 20 7946 0000");
        assert_eq!(details.github, "");
    }

    #[test]
    fn test_parse_section_accepts_wrapped_value() {
        let parsed = StructuredResume::parse_section(
            ResumeSection::Skills,
            json!({"skills": ["Go", "Kubernetes"]}),
        )
        .unwrap();
        assert_eq!(parsed.skills, vec!["Go", "Kubernetes"]);
    }

    #[test]
    fn test_parse_section_rejects_wrong_shape() {
        let err = StructuredResume::parse_section(
            ResumeSection::WorkExperience,
            json!("Just a paragraph"),
        )
        .unwrap_err();
        assert!(err.contains("work_experience"));
    }

    #[test]
    fn test_take_section_from_replaces_only_that_section() {
        let mut resume = StructuredResume {
            professional_summary: "Old".to_string(),
            skills: vec!["Rust".to_string()],
            ..Default::default()
        };
        let parsed =
            StructuredResume::parse_section(ResumeSection::ProfessionalSummary, json!("New"))
                .unwrap();
        resume.take_section_from(ResumeSection::ProfessionalSummary, parsed);
        assert_eq!(resume.professional_summary, "New");
        assert_eq!(resume.skills, vec!["Rust"]);
    }

    #[test]
    fn test_bullets_iterates_all_entry_sections_in_order() {
        let resume = StructuredResume {
            work_experience: vec![ResumeEntry {
                title: "Engineer".into(),
                description: vec!["w1".into(), "w2".into()],
                ..Default::default()
            }],
            education: vec![ResumeEntry {
                title: "BSc".into(),
                description: vec!["e1".into()],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(resume.bullets().collect::<Vec<_>>(), vec!["w1", "w2", "e1"]);
    }

    #[test]
    fn test_section_serde_uses_snake_case() {
        let section: ResumeSection = serde_json::from_str("\"personal_projects\"").unwrap();
        assert_eq!(section, ResumeSection::PersonalProjects);
        assert_eq!(section.kind(), SectionKind::Entries);
    }
}
