use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::Error, utils::natural_cmp};

pub const MAX_ID_LEN: usize = 64;

/// Check that `value` can be used as a document field name.
pub fn validate_id(kind: &str, value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::validation(format!("{kind} must not be empty")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(Error::validation(format!(
            "{kind} must be at most {MAX_ID_LEN} characters"
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::validation(format!(
            "{kind} may only contain ASCII letters, digits, '_' and '-': {value:?}"
        )));
    }
    Ok(())
}

/// Identifier of a chapter within a syllabus. Ordered naturally, so the
/// syllabus order of `chapter2` comes before `chapter10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct ChapterId(String);

impl ChapterId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for ChapterId {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

impl PartialOrd for ChapterId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for ChapterId {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_id("chapter id", s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ChapterId {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_id("chapter id", &value)?;
        Ok(Self(value))
    }
}

impl From<ChapterId> for String {
    fn from(value: ChapterId) -> Self {
        value.0
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// index into `options`
    pub correct_answer: usize,
}

/// A lesson unit, stored as one field of its syllabus document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
}

impl Chapter {
    /// Trim the free-text fields and check the quiz is answerable.
    pub fn validated(mut self) -> Result<Self, Error> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(Error::validation("chapter title must not be empty"));
        }
        self.description = self.description.trim().to_string();
        for (i, q) in self.quiz.iter_mut().enumerate() {
            let n = i + 1;
            q.question = q.question.trim().to_string();
            if q.question.is_empty() {
                return Err(Error::validation(format!("quiz question {n} has no prompt")));
            }
            if q.options.len() < 2 {
                return Err(Error::validation(format!(
                    "quiz question {n} needs at least two options"
                )));
            }
            for option in q.options.iter_mut() {
                *option = option.trim().to_string();
            }
            if q.options.iter().any(String::is_empty) {
                return Err(Error::validation(format!("quiz question {n} has an empty option")));
            }
            if q.correct_answer >= q.options.len() {
                return Err(Error::validation(format!(
                    "quiz question {n}: correct answer {} is out of range",
                    q.correct_answer
                )));
            }
        }
        Ok(self)
    }
}

/// A quiz question as shown to learners, without the answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicQuestion {
    pub question: String,
    pub options: Vec<String>,
}

/// Learner-facing chapter.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChapterView {
    pub id: ChapterId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub quiz: Vec<PublicQuestion>,
}

impl ChapterView {
    pub fn new(id: ChapterId, chapter: &Chapter) -> Self {
        Self {
            id,
            title: chapter.title.clone(),
            description: chapter.description.clone(),
            content: chapter.content.clone(),
            quiz: chapter
                .quiz
                .iter()
                .map(|q| PublicQuestion {
                    question: q.question.clone(),
                    options: q.options.clone(),
                })
                .collect(),
        }
    }
}

/// Admin-facing chapter, answers included.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChapterEntry {
    pub id: ChapterId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub quiz: Vec<QuizQuestion>,
}

impl ChapterEntry {
    pub fn new(id: ChapterId, chapter: Chapter) -> Self {
        Self {
            id,
            title: chapter.title,
            description: chapter.description,
            content: chapter.content,
            quiz: chapter.quiz,
        }
    }
}
