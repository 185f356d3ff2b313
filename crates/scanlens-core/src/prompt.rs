//! Prompt rendering for the security-analyst persona.
//!
//! [`build_prompt`] is a pure function: the same `(question, log)` pair always
//! renders the same string.
//!
//! Only the question is sanitized (backticks become single quotes so it cannot
//! close the log fence). The log body is embedded verbatim, so a log that
//! itself contains a ```` ``` ```` line ends the fence early. That is a known
//! limitation kept for output compatibility.

const ROLE: &str = "You are a senior security analyst providing a concise, expert summary of a vulnerability scan.";

const ANALYSIS_INSTRUCTIONS: &str = "Based on the provided log, analyze the vulnerabilities. \
If the user asks for the \"most critical risk\", identify that specific risk. \
Otherwise, answer their question based on the log's content.";

const RESPONSE_FORMAT: &str = "Explain your findings in simple, plain English. \
Describe the potential impact and suggest clear, actionable first steps for remediation. \
Structure your response in Markdown format.";

const FENCE: &str = "```";

/// Render the instruction prompt for a question about a scan log.
///
/// The question is trimmed and sanitized with [`sanitize_question`]. An absent
/// log renders as an empty fenced block.
pub fn build_prompt(question: &str, log: Option<&str>) -> String {
    let question = sanitize_question(question);
    let log = log.unwrap_or_default();

    format!(
        "{ROLE}\n\
         A junior engineer has uploaded the following scan log and asked the question: \"{question}\"\n\n\
         Scan Log Content:\n{FENCE}\n{log}\n{FENCE}\n\n\
         {ANALYSIS_INSTRUCTIONS}\n\n\
         {RESPONSE_FORMAT}"
    )
}

/// Trim the question and replace every backtick with a single quote.
pub fn sanitize_question(question: &str) -> String {
    question.trim().replace('`', "'")
}
