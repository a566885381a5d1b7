//! Prompt assembly for the coding assistant.
//!
//! The model gets a single text prompt: role, the scraped problem, the
//! learner's current code, their question, and the answer guidelines.

use shared::ProblemContext;

const ROLE: &str = "You are an expert coding assistant focused on helping with programming problems and code-related questions.";

const SOLUTION_GUIDELINES: &str = r#"Instructions for Code Solutions:
1. For complex problems, break down the solution into clear steps before writing code
2. Always consider:
   - Edge cases and input validation
   - Time and space complexity requirements
   - Memory efficiency and performance
   - Common pitfalls and corner cases
3. When providing code:
   - Include necessary imports and dependencies
   - Add detailed comments explaining key logic
   - Handle potential errors and exceptions
   - Follow language-specific best practices
4. For algorithmic problems:
   - Explain the chosen approach and why it's optimal
   - Mention time/space complexity in Big O notation
   - Consider multiple approaches if applicable
5. Test considerations:
   - Include example test cases
   - Cover edge cases in testing
   - Validate input/output requirements"#;

const FORMAT_GUIDELINES: &str = r#"Formatting Guidelines:
1. Use clear headings without asterisks or other markdown symbols
   Example: "Time Complexity:" instead of "**Time Complexity:**"
2. For emphasis, use clear language and structure rather than markdown formatting
3. Use proper indentation and spacing for readability and try to put in points
4. Format code blocks with triple backticks and language specification
5. Keep text formatting clean and professional without excessive symbols
6. Use bullet points and numbered lists for organization"#;

const RESPONSE_GUIDELINES: &str = r#"General Response Guidelines:
1. Answer questions directly while providing necessary context
2. Break down complex concepts into understandable parts
3. If a solution seems incorrect, double-check and validate
4. For unclear questions, ask for clarification
5. Format code with proper indentation and markdown
6. Explain any assumptions made in the solution

Remember: Accuracy and reliability are top priorities. Take time to verify the solution's correctness before providing it."#;

/// Everything scraped from the page that accompanies a question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskContext {
    pub problem: ProblemContext,
    /// Editor contents at the time of asking
    pub editor_code: Option<String>,
}

/// Build the full prompt for `message`.
pub fn build_prompt(message: &str, context: &AskContext) -> String {
    let problem = &context.problem;
    let title = if problem.title.trim().is_empty() {
        "Current Problem"
    } else {
        problem.title.as_str()
    };

    let code_section = match context.editor_code.as_deref() {
        Some(code) if !code.trim().is_empty() => format!("Current Code:\n```\n{}\n```\n", code),
        _ => String::new(),
    };
    let description_section = if problem.description.trim().is_empty() {
        String::new()
    } else {
        format!("Problem Description:\n{}\n", problem.description)
    };

    format!(
        r#"{role}

Current Context:
Title: {title}
URL: {url}

{code_section}
{description_section}

User Question: {message}

{solution}

{format}

{response}"#,
        role = ROLE,
        title = title,
        url = problem.url,
        code_section = code_section,
        description_section = description_section,
        message = message,
        solution = SOLUTION_GUIDELINES,
        format = FORMAT_GUIDELINES,
        response = RESPONSE_GUIDELINES,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_context() {
        let context = AskContext {
            problem: ProblemContext {
                title: "Two Sum".into(),
                description: "Return indices of two numbers adding to target.".into(),
                url: "https://x.test/two-sum".into(),
            },
            editor_code: Some("def two_sum(nums, target):\n    pass".into()),
        };
        let prompt = build_prompt("Why is this slow?", &context);

        assert!(prompt.starts_with(ROLE));
        assert!(prompt.contains("Title: Two Sum\nURL: https://x.test/two-sum"));
        assert!(prompt.contains("Current Code:\n```\ndef two_sum(nums, target):\n    pass\n```"));
        assert!(prompt.contains("Problem Description:\nReturn indices"));
        assert!(prompt.contains("User Question: Why is this slow?"));
        assert!(prompt.ends_with("before providing it."));
    }

    #[test]
    fn test_prompt_omits_missing_sections() {
        let prompt = build_prompt("help with this array", &AskContext::default());
        assert!(prompt.contains("Title: Current Problem"));
        assert!(!prompt.contains("Current Code:"));
        assert!(!prompt.contains("Problem Description:"));
    }
}
