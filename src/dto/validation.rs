//! Validation helpers for DTOs.

use validator::ValidationError;

use super::quiz::QuestionInput;

/// Validates the shape of a single quiz question: at least two options and a
/// correct answer that matches one of them verbatim.
pub fn validate_question(question: &QuestionInput) -> Result<(), ValidationError> {
    if question.question.trim().is_empty() {
        let mut err = ValidationError::new("question_empty");
        err.message = Some("question prompt must not be empty".into());
        return Err(err);
    }

    if question.options.len() < 2 {
        let mut err = ValidationError::new("question_options");
        err.message = Some(
            format!(
                "question needs at least 2 options (got {})",
                question.options.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !question.options.iter().any(|o| o == &question.correct_answer) {
        let mut err = ValidationError::new("question_correct_answer");
        err.message = Some("correct answer must equal one of the listed options".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options: &[&str], correct: &str) -> QuestionInput {
        QuestionInput {
            question: "2+2?".into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: correct.into(),
            explanation: None,
        }
    }

    #[test]
    fn accepts_well_formed_question() {
        assert!(validate_question(&question(&["3", "4", "5"], "4")).is_ok());
    }

    #[test]
    fn rejects_single_option() {
        let err = validate_question(&question(&["4"], "4")).unwrap_err();
        assert_eq!(err.code, "question_options");
    }

    #[test]
    fn rejects_correct_answer_not_among_options() {
        let err = validate_question(&question(&["3", "5"], "4")).unwrap_err();
        assert_eq!(err.code, "question_correct_answer");
    }

    #[test]
    fn rejects_empty_prompt() {
        let mut q = question(&["3", "4"], "4");
        q.question = "  ".into();
        assert_eq!(validate_question(&q).unwrap_err().code, "question_empty");
    }
}
