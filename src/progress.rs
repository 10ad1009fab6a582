//! Per-user progress: chapter statuses per learning path, points, level and
//! the daily login streak. One `userProgress` document per user.

pub mod streak;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use tracing::info;
use utoipa::ToSchema;

use crate::{
    config::Gamification,
    error::Error,
    store::{DocStore, Document, StoreError, document::to_document},
    syllabus::{
        self, Curriculum, PathName, Syllabus,
        chapter::ChapterId,
        quiz::{QuizScore, grade},
    },
};
use streak::next_streak;

pub const COLLECTION: &str = "userProgress";

pub const MAX_LEADERBOARD: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Locked,
    InProgress,
    Completed,
}

impl ChapterStatus {
    pub fn is_unlocked(self) -> bool {
        !matches!(self, ChapterStatus::Locked)
    }
}

type PathStatuses = BTreeMap<String, BTreeMap<ChapterId, ChapterStatus>>;

fn first_level() -> u64 {
    1
}

/// The stored progress document. Every key that is not one of the scalar
/// fields is a learning path mapping chapter ids to statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    #[serde(default)]
    pub points: u64,
    #[serde(default = "first_level")]
    pub level: u64,
    #[serde(default)]
    pub daily_streak: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_login: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub paths: PathStatuses,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            points: 0,
            level: first_level(),
            daily_streak: 0,
            last_login: None,
            paths: BTreeMap::new(),
        }
    }
}

impl UserProgress {
    pub fn status(&self, path: &PathName, chapter: &ChapterId) -> Option<ChapterStatus> {
        self.paths.get(path.as_str())?.get(chapter).copied()
    }
}

/// What completing a chapter did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub already_completed: bool,
    pub points_awarded: u64,
    pub points: u64,
    pub level: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_chapter: Option<ChapterId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionPatch {
    points: u64,
    level: u64,
    #[serde(flatten)]
    paths: PathStatuses,
}

/// Decide the effect of completing `chapter`, returning the merge patch to
/// write, or `None` when the chapter was already completed.
pub fn plan_completion(
    progress: &UserProgress,
    syllabus: &Syllabus,
    path: &PathName,
    chapter: &ChapterId,
    gamification: &Gamification,
) -> Result<(Completion, Option<Document>), StoreError> {
    if progress.status(path, chapter) == Some(ChapterStatus::Completed) {
        let completion = Completion {
            already_completed: true,
            points_awarded: 0,
            points: progress.points,
            level: progress.level,
            unlocked_chapter: None,
        };
        return Ok((completion, None));
    }

    let points = progress.points + gamification.points_per_chapter;
    let level = gamification.level_for(points);
    let mut statuses = BTreeMap::from([(chapter.clone(), ChapterStatus::Completed)]);
    let unlocked_chapter = syllabus
        .next_after(chapter)
        .filter(|next| {
            !progress
                .status(path, next)
                .is_some_and(ChapterStatus::is_unlocked)
        })
        .cloned();
    if let Some(next) = &unlocked_chapter {
        statuses.insert(next.clone(), ChapterStatus::InProgress);
    }

    let patch = to_document(&CompletionPatch {
        points,
        level,
        paths: BTreeMap::from([(path.to_string(), statuses)]),
    })?;
    let completion = Completion {
        already_completed: false,
        points_awarded: gamification.points_per_chapter,
        points,
        level,
        unlocked_chapter,
    };
    Ok((completion, Some(patch)))
}

/// Mark a chapter completed, award points and unlock the next chapter,
/// all in one transaction. Completing a completed chapter changes nothing.
pub async fn complete_chapter(
    store: &DocStore,
    gamification: &Gamification,
    uid: &str,
    path: &PathName,
    chapter: &ChapterId,
) -> Result<Completion, Error> {
    let completion = store
        .run_transaction::<_, Error, _>(|tx| {
            let (uid, path, chapter, gamification) =
                (uid.to_owned(), path.clone(), chapter.clone(), *gamification);
            Box::pin(async move {
                let syllabus = syllabus::load_in(tx, &path)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("learning path {path} not found")))?;
                if !syllabus.contains(&chapter) {
                    return Err(Error::not_found(format!(
                        "chapter {chapter} not found in {path}"
                    )));
                }
                let progress = tx
                    .get_as::<UserProgress>(COLLECTION, &uid)
                    .await?
                    .unwrap_or_default();
                let (completion, patch) =
                    plan_completion(&progress, &syllabus, &path, &chapter, &gamification)?;
                if let Some(patch) = patch {
                    tx.merge(COLLECTION, &uid, patch).await?;
                }
                Ok(completion)
            })
        })
        .await?;
    if !completion.already_completed {
        info!(
            "user {} completed {}/{}: {} points, level {}",
            uid, path, chapter, completion.points, completion.level
        );
    }
    Ok(completion)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreakUpdate {
    pub daily_streak: u32,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub last_login: OffsetDateTime,
    pub changed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginPatch {
    daily_streak: u32,
    #[serde(with = "time::serde::rfc3339")]
    last_login: OffsetDateTime,
}

/// Record a login at `now`, updating the daily streak and the login time.
pub async fn record_login(
    store: &DocStore,
    gamification: &Gamification,
    uid: &str,
    now: OffsetDateTime,
) -> Result<StreakUpdate, Error> {
    let now = now.to_offset(UtcOffset::UTC);
    let offset = gamification.streak_offset;
    let update = store
        .run_transaction::<_, Error, _>(|tx| {
            let (uid, now, offset) = (uid.to_owned(), now, offset);
            Box::pin(async move {
                let progress = tx
                    .get_as::<UserProgress>(COLLECTION, &uid)
                    .await?
                    .unwrap_or_default();
                let today = now.to_offset(offset).date();
                let last_day = progress.last_login.map(|t| t.to_offset(offset).date());
                let daily_streak = next_streak(progress.daily_streak, last_day, today);
                let patch = to_document(&LoginPatch {
                    daily_streak,
                    last_login: now,
                })
                .map_err(StoreError::from)?;
                tx.merge(COLLECTION, &uid, patch).await?;
                Ok(StreakUpdate {
                    daily_streak,
                    last_login: now,
                    changed: daily_streak != progress.daily_streak,
                })
            })
        })
        .await?;
    info!("user {} logged in, streak {}", uid, update.daily_streak);
    Ok(update)
}

/// A graded quiz, and the completion it triggered when it passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuizOutcome {
    pub score: QuizScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
}

/// Grade a quiz attempt; a passing attempt completes the chapter.
pub async fn submit_quiz(
    store: &DocStore,
    curriculum: &Curriculum,
    gamification: &Gamification,
    uid: &str,
    path: &PathName,
    chapter: &ChapterId,
    answers: &[Option<usize>],
) -> Result<QuizOutcome, Error> {
    let quiz = curriculum.chapter(path, chapter).await?.quiz;
    let score = grade(&quiz, answers, gamification.quiz_pass_ratio)?;
    info!(
        "user {} scored {}/{} on {}/{}",
        uid, score.correct, score.total, path, chapter
    );
    let completion = if score.passed {
        Some(complete_chapter(store, gamification, uid, path, chapter).await?)
    } else {
        None
    };
    Ok(QuizOutcome { score, completion })
}

/// Progress as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub user_id: String,
    pub points: u64,
    pub level: u64,
    pub daily_streak: u32,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    #[schema(value_type = Option<String>)]
    pub last_login: Option<OffsetDateTime>,
    /// path name -> chapter id -> status
    #[schema(value_type = Object)]
    pub paths: PathStatuses,
}

impl ProgressSummary {
    pub fn new(user_id: String, progress: UserProgress) -> Self {
        Self {
            user_id,
            points: progress.points,
            level: progress.level,
            daily_streak: progress.daily_streak,
            last_login: progress.last_login,
            paths: progress.paths,
        }
    }
}

pub async fn get_progress(store: &DocStore, uid: &str) -> Result<ProgressSummary, Error> {
    let progress = store
        .get_as::<UserProgress>(COLLECTION, uid)
        .await?
        .unwrap_or_default();
    Ok(ProgressSummary::new(uid.to_string(), progress))
}

/// Every user's progress, highest points first.
pub async fn list_progress(store: &DocStore) -> Result<Vec<ProgressSummary>, Error> {
    let mut all: Vec<ProgressSummary> = store
        .list_as::<UserProgress>(COLLECTION)
        .await?
        .into_iter()
        .map(|(uid, progress)| ProgressSummary::new(uid, progress))
        .collect();
    all.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.user_id.cmp(&b.user_id)));
    Ok(all)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub points: u64,
    pub level: u64,
}

pub async fn leaderboard(store: &DocStore, limit: usize) -> Result<Vec<LeaderboardEntry>, Error> {
    let limit = limit.clamp(1, MAX_LEADERBOARD);
    Ok(list_progress(store)
        .await?
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i + 1,
            user_id: p.user_id,
            points: p.points,
            level: p.level,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChapterProgressEntry {
    pub id: ChapterId,
    pub title: String,
    pub status: ChapterStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PathOverview {
    pub path: String,
    pub completed: usize,
    pub total: usize,
    pub chapters: Vec<ChapterProgressEntry>,
}

/// Chapters of a path in order with their effective status: the stored
/// status, else `in_progress` for the first chapter, else `locked`.
pub fn overview(path: &PathName, syllabus: &Syllabus, progress: &UserProgress) -> PathOverview {
    let first = syllabus.first();
    let chapters: Vec<ChapterProgressEntry> = syllabus
        .iter()
        .map(|(id, chapter)| {
            let status = match progress.status(path, id) {
                Some(status) => status,
                None if Some(id) == first => ChapterStatus::InProgress,
                None => ChapterStatus::Locked,
            };
            ChapterProgressEntry {
                id: id.clone(),
                title: chapter.title.clone(),
                status,
            }
        })
        .collect();
    PathOverview {
        path: path.to_string(),
        completed: chapters
            .iter()
            .filter(|c| c.status == ChapterStatus::Completed)
            .count(),
        total: chapters.len(),
        chapters,
    }
}

pub async fn path_overview(
    store: &DocStore,
    curriculum: &Curriculum,
    uid: &str,
    path: &PathName,
) -> Result<PathOverview, Error> {
    let syllabus = curriculum.syllabus(path).await?;
    let progress = store
        .get_as::<UserProgress>(COLLECTION, uid)
        .await?
        .unwrap_or_default();
    Ok(overview(path, &syllabus, &progress))
}
