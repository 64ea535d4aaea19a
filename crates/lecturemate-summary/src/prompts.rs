//! Prompt templates.
//!
//! Plain functions from structured parameters to prompt text. The content
//! each prompt wraps sits between square brackets or tags so the model can
//! tell instructions and material apart.

/// Ask for a summary of one transcript chunk in at most `words` words.
pub fn summary_prompt(words: usize, transcript_part: &str) -> String {
    format!(
        r#"Your task is to summarize a transcription of a video.
The transcription of the video is in between the square brackets.
The summary should be maximum {words} words.

[{transcript_part}]

Summary:"#
    )
}

/// Ask for markdown formatting of a condensed chunk.
///
/// Only the first segment of a document may open with a level 1 heading.
pub fn markdown_prompt(text: &str, allow_title: bool) -> String {
    let title_rule = if allow_title {
        ""
    } else {
        "\nDo not create level 1 heading."
    };
    format!(
        r#"Your task is to format the text between the square brackets with markdown.
Make it well structured, use different types of titles, highlight important key words,
and create bullet points where it makes sense.{title_rule}

[{text}]

Markdown formatted text:"#
    )
}

/// Parameters for extending a running summary with new material.
#[derive(Debug, Clone, Copy)]
pub struct ExtendPrompt<'a> {
    /// Summary written so far (may be empty).
    pub running_summary: &'a str,
    /// New transcript material.
    pub new_content: &'a str,
    /// 1-based position of `new_content`.
    pub chunk: usize,
    /// Chunks in this pass.
    pub total: usize,
    /// Words the new part of the summary should add.
    pub words: usize,
}

/// Ask the model to continue the running summary with one more chunk.
///
/// The model writes only the continuation, never a rewrite of what exists.
pub fn extend_summary_prompt(p: ExtendPrompt<'_>) -> String {
    let remaining = p.total - p.chunk;
    let balance = if remaining == 0 {
        "This is the last part of the material, so wrap up the remaining points."
    } else if remaining * 2 >= p.total {
        "Most of the material is still ahead, so favour quoting key statements and terms directly."
    } else {
        "Most of the material is already condensed, so favour rephrasing and merging ideas."
    };
    let summary = if p.running_summary.is_empty() {
        "(nothing written yet)"
    } else {
        p.running_summary
    };

    format!(
        r#"You are writing a running summary of a video transcript, one part at a time.
Part {chunk} of {total} is between the <transcript> tags. The summary written so far is
between the <summary> tags.

Continue the summary with the content of this part in about {words} words.
Write only the continuation: do not repeat or rewrite the existing summary.
Mix extractive and abstractive summarization as needed. {balance}

<summary>
{summary}
</summary>

<transcript>
{content}
</transcript>

Continuation:"#,
        chunk = p.chunk,
        total = p.total,
        words = p.words,
        content = p.new_content,
    )
}

/// Ask for a final pass that smooths seams between concatenated summaries.
pub fn cleanup_prompt(text: &str, words: usize) -> String {
    format!(
        r#"The text between the <summary> tags was written in several parts, one per section
of a video transcript. Rewrite it as one coherent summary of about {words} words:
smooth the transitions between parts, remove repetition, and keep every key point.

<summary>
{text}
</summary>

Summary:"#
    )
}

/// Wrap a follow-up question asked after the context messages.
pub fn question_prompt(question: &str) -> String {
    format!("By considering above input from me, answer the question: {question}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prompt() {
        let prompt = summary_prompt(120, "we discussed lifetimes");
        assert!(prompt.contains("maximum 120 words"));
        assert!(prompt.contains("[we discussed lifetimes]"));
    }

    #[test]
    fn test_markdown_prompt_title_rule() {
        assert!(!markdown_prompt("text", true).contains("level 1 heading"));
        assert!(markdown_prompt("text", false).contains("Do not create level 1 heading."));
    }

    #[test]
    fn test_extend_prompt_balance() {
        let base = ExtendPrompt {
            running_summary: "",
            new_content: "raw words",
            chunk: 1,
            total: 4,
            words: 50,
        };
        let first = extend_summary_prompt(base);
        assert!(first.contains("Part 1 of 4"));
        assert!(first.contains("(nothing written yet)"));
        assert!(first.contains("favour quoting"));

        let later = extend_summary_prompt(ExtendPrompt {
            running_summary: "so far",
            chunk: 3,
            ..base
        });
        assert!(later.contains("favour rephrasing"));
        assert!(later.contains("<summary>\nso far\n</summary>"));

        let last = extend_summary_prompt(ExtendPrompt { chunk: 4, ..base });
        assert!(last.contains("last part"));
    }

    #[test]
    fn test_cleanup_and_question_prompts() {
        assert!(cleanup_prompt("a b", 300).contains("about 300 words"));
        assert_eq!(
            question_prompt("What is a trait?"),
            "By considering above input from me, answer the question: What is a trait?"
        );
    }
}
