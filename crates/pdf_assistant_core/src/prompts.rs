//! crates/pdf_assistant_core/src/prompts.rs
//!
//! Fixed prompt templates sent alongside the document.

use crate::domain::DetailLevel;

pub const SYNOPSIS_PROMPT: &str = r#"Create a brief summary of this PDF document.
Provide information about the title, topic, and main sections of the document.
Keep the answer short, summarize it in 3-4 sentences."#;

const WITH_IMAGE_SUFFIX: &str =
    "Examine the uploaded image and answer based on the PDF content. Use the information you see in the image.";

const WITHOUT_IMAGE_SUFFIX: &str = "Base your answer on the PDF content and images in the PDF.";

const QUIZ_TEMPLATE: &str = r#"Create a quiz with {count} questions based on the content of this PDF document.
Specify the correct answer for each question.
Number the questions and answers."#;

const SUMMARY_TEMPLATE: &str = r#"Create a {length} summary of this PDF document.
Highlight the main headings and important points."#;

pub const KEY_CONCEPTS_PROMPT: &str = r#"List the key concepts and terms in this PDF document.
Provide a brief explanation for each concept."#;

/// Wraps a user question; the wording changes when the user attached an image.
pub fn question_prompt(question: &str, has_image: bool) -> String {
    let suffix = if has_image {
        WITH_IMAGE_SUFFIX
    } else {
        WITHOUT_IMAGE_SUFFIX
    };
    format!("{}\n\n{}", question, suffix)
}

pub fn quiz_prompt(question_count: u32) -> String {
    QUIZ_TEMPLATE.replace("{count}", &question_count.to_string())
}

pub fn summary_prompt(detail: DetailLevel) -> String {
    SUMMARY_TEMPLATE.replace("{length}", detail.length_phrase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_wording_depends_on_image() {
        let with = question_prompt("What is shown?", true);
        assert!(with.starts_with("What is shown?\n\n"));
        assert!(with.contains("Examine the uploaded image"));

        let without = question_prompt("What is shown?", false);
        assert!(without.contains("images in the PDF"));
        assert!(!without.contains("uploaded image"));
    }

    #[test]
    fn quiz_prompt_carries_count() {
        assert!(quiz_prompt(7).starts_with("Create a quiz with 7 questions"));
    }

    #[test]
    fn summary_prompt_uses_detail_wording() {
        assert!(summary_prompt(DetailLevel::High).contains("detailed (5+ paragraphs)"));
        assert!(summary_prompt(DetailLevel::parse_lossy("nonsense"))
            .contains("medium length (3-4 paragraphs)"));
    }
}
