//! Rubric prompt for one ordering of two diffs.

use crate::domain::judgement::Dimension;

/// Task context shown to the judge alongside the diffs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    pub repo: String,
    pub description: String,
    pub language: String,
}

impl PromptContext {
    pub fn new(repo: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            description: description.into(),
            language: String::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

fn rubric(dim: Dimension) -> &'static str {
    match dim {
        Dimension::Consistency => {
            "Does the change follow the codebase's existing conventions, naming and patterns?"
        }
        Dimension::Completeness => {
            "Does the change fully solve the task, including edge cases and needed tests?"
        }
        Dimension::Minimality => {
            "Does the change avoid unrelated edits, churn and unnecessary additions?"
        }
    }
}

/// Render the prompt with `first` shown as solution A and `second` as B.
pub fn render_prompt(ctx: &PromptContext, first: &str, second: &str) -> String {
    let language = if ctx.language.is_empty() {
        "unspecified"
    } else {
        ctx.language.as_str()
    };
    let criteria: String = Dimension::ALL
        .iter()
        .map(|d| format!("- **{}**: {}\n", d, rubric(*d)))
        .collect();
    let schema_dims: Vec<String> = Dimension::ALL
        .iter()
        .map(|d| format!("    \"{d}\": {{\"a\": <1-5>, \"b\": <1-5>, \"reasoning\": \"...\"}}"))
        .collect();

    format!(
        r#"You are reviewing two candidate changes that attempt the same task.

Repository: {repo}
Language: {language}

## Task

{description}

## Solution A

```diff
{first}
```

## Solution B

```diff
{second}
```

## Criteria

Score each solution from 1 (poor) to 5 (excellent) on:
{criteria}
Then pick the better solution overall, or "tie" if neither is clearly better.

Respond with exactly one JSON object and nothing else:

```json
{{
  "dimensions": {{
{schema}
  }},
  "overall_winner": "a" | "b" | "tie",
  "reasoning": "..."
}}
```
"#,
        repo = ctx.repo,
        description = ctx.description,
        schema = schema_dims.join(",\n"),
    )
}
