//! Quiz payloads crossing the API boundary.
//!
//! The input carries answer keys; they are split off into solution rows at
//! match creation and never reappear in player-facing projections.

use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{Quiz, QuizQuestion, SolutionRow},
    dto::validation::validate_question,
};

/// Full quiz document supplied when creating a match. Field names follow the
/// generator's document format.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizInput {
    /// Display title of the quiz.
    pub quiz_name: String,
    /// Ordered question list, including answer keys.
    pub questions: Vec<QuestionInput>,
}

/// One question as authored, including its answer key.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    /// Prompt text.
    pub question: String,
    /// Ordered option list.
    pub options: Vec<String>,
    /// Correct option, matched verbatim against `options`.
    pub correct_answer: String,
    /// Optional explanation revealed after the round.
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Validate for QuizInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.quiz_name.trim().is_empty() {
            let mut err = validator::ValidationError::new("quiz_name_empty");
            err.message = Some("quiz name must not be empty".into());
            errors.add("quiz_name", err);
        }

        if self.questions.is_empty() {
            let mut err = validator::ValidationError::new("quiz_questions_empty");
            err.message = Some("quiz needs at least one question".into());
            errors.add("questions", err);
        }

        for question in &self.questions {
            if let Err(err) = validate_question(question) {
                errors.add("questions", err);
                // Report the first offending rule only.
                break;
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl QuizInput {
    /// Player-facing projection with every answer key stripped.
    pub fn view(&self) -> Quiz {
        Quiz {
            quiz_name: self.quiz_name.clone(),
            questions: self
                .questions
                .iter()
                .map(|q| QuizQuestion {
                    question: q.question.clone(),
                    options: q.options.clone(),
                })
                .collect(),
        }
    }

    /// Solution rows for the given match, one per question index.
    pub fn solutions(&self, match_id: Uuid) -> Vec<SolutionRow> {
        self.questions
            .iter()
            .enumerate()
            .map(|(question_index, q)| SolutionRow {
                match_id,
                question_index,
                correct_answer: q.correct_answer.clone(),
                explanation: q.explanation.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz() -> QuizInput {
        QuizInput {
            quiz_name: "Q".into(),
            questions: vec![QuestionInput {
                question: "2+2?".into(),
                options: vec!["3".into(), "4".into(), "5".into()],
                correct_answer: "4".into(),
                explanation: Some("arithmetic".into()),
            }],
        }
    }

    #[test]
    fn view_contains_no_answer_keys() {
        let view = quiz().view();
        let serialized = serde_json::to_string(&view).unwrap();
        assert!(!serialized.contains("correct"));
        assert!(!serialized.contains("explanation"));
        assert_eq!(view.questions[0].options.len(), 3);
    }

    #[test]
    fn solutions_are_keyed_by_question_index() {
        let match_id = Uuid::new_v4();
        let solutions = quiz().solutions(match_id);
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].question_index, 0);
        assert_eq!(solutions[0].correct_answer, "4");
        assert_eq!(solutions[0].match_id, match_id);
    }

    #[test]
    fn empty_quiz_is_rejected() {
        let mut input = quiz();
        input.questions.clear();
        assert!(input.validate().is_err());
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let raw = r#"{"quizName":"Q","questions":[{"question":"2+2?","options":["3","4"],"correctAnswer":"4"}]}"#;
        let parsed: QuizInput = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.quiz_name, "Q");
        assert_eq!(parsed.questions[0].correct_answer, "4");
        assert!(parsed.validate().is_ok());
    }
}
