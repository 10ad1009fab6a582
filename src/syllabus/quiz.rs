use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::chapter::QuizQuestion;
use crate::error::Error;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuizSubmission {
    /// chosen option index per question, `null` for a skipped question
    pub answers: Vec<Option<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
    pub passed: bool,
}

/// Grade `answers` against `quiz`. Missing answers count as wrong; more
/// answers than questions is rejected. An empty quiz always passes.
pub fn grade(quiz: &[QuizQuestion], answers: &[Option<usize>], pass_ratio: f64) -> Result<QuizScore, Error> {
    if answers.len() > quiz.len() {
        return Err(Error::validation(format!(
            "got {} answers for a quiz of {} questions",
            answers.len(),
            quiz.len()
        )));
    }
    let correct = quiz
        .iter()
        .zip(answers)
        .filter(|(q, a)| **a == Some(q.correct_answer))
        .count();
    let total = quiz.len();
    let passed = total == 0 || correct as f64 / total as f64 >= pass_ratio;
    Ok(QuizScore {
        correct,
        total,
        passed,
    })
}
