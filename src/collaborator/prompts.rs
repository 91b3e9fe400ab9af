//! System prompts and prompt builders for each collaborator operation.

use vibeforge_common::Artifact;

pub const PLANNER_SYSTEM_PROMPT: &str = r#"You are a software architect. Break the user's goal into a small set of source files.

You MUST respond with valid JSON only (no markdown, no explanation) matching this schema:
{
  "files": [
    { "name": "relative/path.ext", "languageTag": "javascript" }
  ],
  "summary": "One paragraph describing the architecture"
}

Rules:
- Order files so that dependencies come before the files that use them.
- File names are unique.
- Prefer few files; do not add tests, lockfiles or build output.
"#;

pub const CODER_SYSTEM_PROMPT: &str = r#"You are a senior engineer writing one file of a larger project.
Respond with the complete file content only. No explanation, no markdown fences.
Stay consistent with the files that already exist: reuse their names, exports and styles."#;

pub const ANALYST_SYSTEM_PROMPT: &str = r#"You are a strict QA engineer and code reviewer. Evaluate the project as a whole.

You MUST respond with valid JSON only matching this schema:
{
  "results": [
    { "testName": "Short test name", "passed": true, "message": "What was checked or what failed, naming the file" }
  ],
  "qualityScore": 0,
  "vibe": { "degraded": false, "reason": "" }
}

Rules:
- qualityScore is an integer from 0 to 100.
- Set vibe.degraded when the code shows duplication, inconsistent patterns, dead code or hacks, and explain why in vibe.reason.
- Mention the affected file name in every failing message.
"#;

pub const REFACTOR_SYSTEM_PROMPT: &str = r#"You are a senior engineer fixing a file.
Respond with the complete corrected file content only. No explanation, no markdown fences.
Fix every listed issue that applies to this file and keep everything else working."#;

pub const REPORTER_SYSTEM_PROMPT: &str = r#"You are a technical writer. Summarize a finished build for the person who requested it.
Write a short markdown report: what was built, the files, the final quality, and any known issues."#;

pub const REFINER_SYSTEM_PROMPT: &str = r#"You are a senior engineer applying a change request to an existing project.

You MUST respond with valid JSON only matching this schema:
{
  "changedFiles": [
    { "name": "relative/path.ext", "content": "complete new file content", "languageTag": "javascript" }
  ],
  "explanation": "What you changed and why, addressed to the user"
}

Rules:
- Include only files you changed or created, always with their complete content.
- Reuse existing file names when modifying a file.
"#;

/// Render artifacts as fenced markdown sections. Artifacts without content
/// are listed by name only.
pub fn render_artifacts(files: &[Artifact]) -> String {
    if files.is_empty() {
        return "(no files yet)".to_string();
    }
    files
        .iter()
        .map(|f| {
            if f.has_content() {
                format!("### {} ({})\n```{}\n{}\n```", f.name, f.language, f.language, f.content)
            } else {
                format!("### {} ({}) - not written yet", f.name, f.language)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn plan_prompt(goal: &str) -> String {
    format!("## Goal\n{}\n\nRespond with JSON only.", goal)
}

pub fn generate_prompt(name: &str, goal: &str, siblings: &[Artifact]) -> String {
    let language = siblings
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.language.as_str())
        .unwrap_or("text");
    format!(
        "## Goal\n{}\n\n## Project files\n{}\n\n## Task\nWrite the complete content of `{}` ({}).",
        goal,
        render_artifacts(siblings),
        name,
        language
    )
}

pub fn analyze_prompt(files: &[Artifact]) -> String {
    format!(
        "## Project files\n{}\n\nAnalyze the project. Respond with JSON only.",
        render_artifacts(files)
    )
}

pub fn refactor_prompt(file: &Artifact, issues: &str) -> String {
    let issues = if issues.trim().is_empty() {
        "No specific failures were reported. Improve robustness and clarity."
    } else {
        issues
    };
    format!(
        "## Issues\n{}\n\n## File `{}` ({})\n```{}\n{}\n```\n\nReturn the corrected file.",
        issues, file.name, file.language, file.language, file.content
    )
}

pub fn report_prompt(summary: &str) -> String {
    format!("## Build summary\n{}\n\nWrite the report.", summary)
}

pub fn refine_prompt(request: &str, files: &[Artifact]) -> String {
    format!(
        "## Change request\n{}\n\n## Project files\n{}\n\nRespond with JSON only.",
        request,
        render_artifacts(files)
    )
}
