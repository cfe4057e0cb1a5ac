// All LLM prompt templates for the generation pipeline.
// Placeholders are `{name}` and are filled with `str::replace` before sending.

/// Step 1, with an accomplishments file: merge new accomplishments from the resume into it.
pub const MERGE_ACCOMPLISHMENTS_PROMPT: &str = r#"Given the following existing accomplishments:

{existing_accomplishments}

And the following resume text:

{resume_text}

Extract any accomplishments from the resume that are not already in the existing accomplishments.
Merge them into the existing accomplishments under the appropriate headings:
- "Professional Experience"
- "Personal Projects"
- "Education"

The result must be one consolidated list with no duplicate entries, in the same format as the existing accomplishments.
Do not include any explanations or other text. Return only the updated accomplishments."#;

/// Step 1, resume only.
pub const EXTRACT_ACCOMPLISHMENTS_PROMPT: &str = r#"Extract the accomplishments from the following resume text:

{resume_text}

Organize them under the appropriate headings:
- "Professional Experience"
- "Personal Projects"
- "Education"

Present them as one consolidated list in a clear, consistent format.
Do not include any explanations or other text. Return only the accomplishments."#;

pub const PERSONAL_DETAILS_PROMPT: &str = r#"Extract ONLY the personal details mentioned in the following resume text.

Return a JSON object with exactly these keys (use an empty string when a value is absent,
and an empty array when there are no other links):
{
  "name": "",
  "phone_number": "",
  "email": "",
  "address": "",
  "linkedin": "",
  "github": "",
  "links": []
}

Resume text:
{resume_text}"#;

pub const COMPANY_NAME_PROMPT: &str = r#"Extract and return ONLY the company name mentioned in the following text. No punctuation, no explanation.

{company_text}"#;

/// Step 2. `{company_name}` and `{company_text}`.
pub const COMPANY_SUMMARY_PROMPT: &str = r#"Please provide a comprehensive summary of the company {company_name} that includes:
1. Core business activities and main products/services
2. Company culture and values
3. Industry position and market differentiation
4. Recent developments and growth trajectory
5. Technology stack and innovation focus
6. Leadership style and organizational structure

Start of company details:
{company_text}
End of company details

Make the summary thorough and informative, highlighting the key themes that characterize this company.
It will be used as a company profile when writing a tailored resume for a job application to this company.
Return ONLY the summary text."#;

/// Step 3. The raw page text usually carries navigation, cookie banners and footer noise.
pub const JOB_DESCRIPTION_CLEANUP_PROMPT: &str = r#"The following text was scraped from a job posting web page. It may contain navigation menus,
cookie notices, footers, and links to other postings.

Return ONLY the job description itself: title, company, location, responsibilities,
requirements, qualifications, and benefits, as plain text. Keep the original wording.
Do not summarize, and do not add commentary.

Scraped text:
{raw_text}"#;

/// Step 4.
pub const INDUSTRY_PROMPT: &str = r#"Identify the primary industry for the following job posting, based on the job description and company summary.

### Job Description:
{job_description}

### Company Summary:
{company_summary}

### Instructions:
- Analyze the texts to determine the main industry
- Give only the industry name, without the word "industry"
- Return a JSON object of the form {"industry": "<industry name>"}"#;

/// Step 5. `{industry}`, `{job_description}`, `{company_summary}`, `{accomplishments}`, `{personal_details}`.
pub const RESUME_TEXT_PROMPT: &str = r#"You are an expert resume writer specializing in ATS-optimized resumes for the {industry} industry.
Create a compelling, tailored resume that aligns with the job requirements.

**Job Description:**
{job_description}

**Company Summary:**
{company_summary}

**My Accomplishments and Experience:**
{accomplishments}

**My Personal Details:**
{personal_details}

**Return ONLY valid JSON in this exact format:**
{
  "Professional Summary": "3-4 sentence compelling summary",
  "Work Experience": [
    {"title": "Job Title", "place": "Company Name", "date": "Date Range", "description": ["Achievement 1", "Achievement 2", "Achievement 3"]}
  ],
  "Personal Projects": [
    {"title": "Project Name", "date": "Date Range", "description": ["Project detail 1", "Project detail 2"]}
  ],
  "Education": [
    {"title": "Degree Name", "place": "Institution", "date": "Date Range", "description": ["Relevant coursework", "Honors or achievements"]}
  ],
  "Skills": ["Skill1", "Skill2", "Skill3"],
  "Languages": ["Language1", "Language2"]
}

Guidelines:
- Use exact keywords from the job description
- Quantify achievements with metrics when the accomplishments provide them
- Include only relevant experience, and never invent employers, dates, or degrees
- Start every description item with a strong action verb
- Return ONLY the JSON, with the keys exactly as shown above"#;
