// Prompt templates for LLM-assisted resume edits.

/// `{section}`, `{shape}`, `{current}`, `{instruction}`, plus the generation context.
pub const SECTION_EDIT_PROMPT: &str = r#"Rewrite the "{section}" section of a resume according to the instruction below.

### Instruction:
{instruction}

### Current section (JSON):
{current}

### Target role
Industry: {industry}

Job description:
{job_description}

Company summary:
{company_summary}

### Rules:
- Keep every fact (employers, titles, dates, degrees, metrics) that the instruction does not ask you to change
- Never invent employers, dates, degrees, or metrics
- Return ONLY the JSON value of the rewritten section, which must be {shape}"#;

/// `{bullet}`, `{instruction}`, `{entry}`, plus the generation context.
pub const BULLET_EDIT_PROMPT: &str = r#"Rewrite the following resume bullet point according to the instruction.

Bullet point:
{bullet}

Instruction:
{instruction}

It belongs to this entry:
{entry}

Target role ({industry}):
{job_description}

Keep it truthful to the original: do not invent metrics, tools, or outcomes.
Start with a strong action verb and keep it to one or two lines.
Return ONLY the rewritten bullet as a single line of plain text, without a leading bullet symbol or quotes."#;
