// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// System prompt for free-text resume work.
pub const RESUME_ASSISTANT_SYSTEM: &str = "You are a professional resume assistant. \
    Be factual and concise. Never invent employers, dates, degrees, or metrics \
    that are not present in the material you are given.";

/// Fills `{name}` placeholders in a single pass. Inserted values are never rescanned,
/// so text scraped or typed by a user cannot expand another placeholder. Braces that
/// do not name a supplied value (JSON examples in a prompt) are kept verbatim.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(
        template.len() + values.iter().map(|(_, value)| value.len()).sum::<usize>(),
    );
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substitution = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match substitution {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Follow-up sent when a structured reply failed to parse or validate.
pub fn json_repair_feedback(error: &str) -> String {
    format!(
        "Your previous reply could not be used: {error}\n\
         Reply again with ONLY the corrected JSON, matching the requested schema exactly. \
         No code fences, no commentary."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template_does_not_rescan_inserted_values() {
        let filled = fill_template(
            "JD: {job_description}\nWins: {accomplishments}",
            &[
                ("job_description", "Must list {accomplishments} here"),
                ("accomplishments", "Shipped v2"),
            ],
        );
        assert_eq!(filled, "JD: Must list {accomplishments} here\nWins: Shipped v2");
    }

    #[test]
    fn test_fill_template_keeps_unknown_braces() {
        let filled = fill_template(
            r#"Return {"industry": "..."} for {company}, not {unknown}"#,
            &[("company", "Acme")],
        );
        assert_eq!(filled, r#"Return {"industry": "..."} for Acme, not {unknown}"#);
    }

    #[test]
    fn test_repair_feedback_carries_the_error() {
        let feedback = json_repair_feedback("missing field `title` at line 1");
        assert!(feedback.contains("missing field `title`"));
        assert!(feedback.contains("ONLY the corrected JSON"));
    }
}
