pub mod chapter;
pub mod quiz;

use std::{
    collections::BTreeMap,
    fmt,
    ops::Bound::{Excluded, Unbounded},
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    error::Error,
    store::{DocStore, Document, StoreError, Transaction, document::to_document},
};
use chapter::{Chapter, ChapterId, validate_id};

pub const COLLECTION: &str = "syllabus";

/// Scalar fields of a progress document; a path may not shadow them.
pub const RESERVED_PATH_NAMES: [&str; 4] = ["points", "level", "dailyStreak", "lastLogin"];

/// Name of a learning path, which is also the id of its syllabus document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathName(String);

impl PathName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PathName {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_id("path name", &value)?;
        if RESERVED_PATH_NAMES.contains(&value.as_str()) {
            return Err(Error::validation(format!("path name {value:?} is reserved")));
        }
        Ok(Self(value))
    }
}

impl FromStr for PathName {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl From<PathName> for String {
    fn from(value: PathName) -> Self {
        value.0
    }
}

impl fmt::Display for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// A syllabus document: chapters keyed by id, iterated in syllabus order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Syllabus {
    pub chapters: BTreeMap<ChapterId, Chapter>,
}

impl Syllabus {
    pub fn first(&self) -> Option<&ChapterId> {
        self.chapters.keys().next()
    }

    pub fn next_after(&self, id: &ChapterId) -> Option<&ChapterId> {
        self.chapters
            .range::<ChapterId, _>((Excluded(id), Unbounded))
            .next()
            .map(|(id, _)| id)
    }

    pub fn get(&self, id: &ChapterId) -> Option<&Chapter> {
        self.chapters.get(id)
    }

    pub fn contains(&self, id: &ChapterId) -> bool {
        self.chapters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChapterId, &Chapter)> {
        self.chapters.iter()
    }
}

/// Read a syllabus inside a transaction, bypassing the cache.
pub async fn load_in(tx: &mut Transaction, path: &PathName) -> Result<Option<Syllabus>, StoreError> {
    tx.get_as(COLLECTION, path.as_str()).await
}

fn not_found(path: &PathName) -> Error {
    Error::not_found(format!("learning path {path} not found"))
}

fn chapter_patch(id: &ChapterId, chapter: &Chapter) -> Result<Document, StoreError> {
    let mut patch = Document::new();
    patch.insert(id.to_string(), Value::Object(to_document(chapter)?));
    Ok(patch)
}

/// A cached syllabus, tagged with the write generation seen before it was read.
#[derive(Clone)]
struct Cached {
    generation: u64,
    syllabus: Arc<Syllabus>,
}

/// All syllabi, with a read-through cache in front of the store.
///
/// Every write bumps `generation`; entries read before the latest write are
/// treated as misses, so a fill that races a write cannot stay cached.
#[derive(Clone)]
pub struct Curriculum {
    store: DocStore,
    cache: Cache<PathName, Cached>,
    generation: Arc<AtomicU64>,
}

impl Curriculum {
    pub fn new(store: DocStore, capacity: u64) -> Self {
        Self {
            store,
            cache: Cache::new(capacity),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    async fn load(&self, path: &PathName) -> Result<Cached, Error> {
        let generation = self.generation.load(Ordering::Acquire);
        let syllabus = self
            .store
            .get_as::<Syllabus>(COLLECTION, path.as_str())
            .await?
            .ok_or_else(|| not_found(path))?;
        Ok(Cached {
            generation,
            syllabus: Arc::new(syllabus),
        })
    }

    /// Call after a write has committed.
    async fn invalidate(&self, path: &PathName) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate(path).await;
    }

    pub async fn list_paths(&self) -> Result<Vec<String>, Error> {
        Ok(self.store.list_ids(COLLECTION).await?)
    }

    pub async fn syllabus(&self, path: &PathName) -> Result<Arc<Syllabus>, Error> {
        let current = self.generation.load(Ordering::Acquire);
        if let Some(cached) = self.cache.get(path).await {
            if cached.generation == current {
                return Ok(cached.syllabus);
            }
        }
        let cached = self.load(path).await?;
        let syllabus = cached.syllabus.clone();
        self.cache.insert(path.clone(), cached).await;
        Ok(syllabus)
    }

    pub async fn chapter(&self, path: &PathName, id: &ChapterId) -> Result<Chapter, Error> {
        let syllabus = self.syllabus(path).await?;
        syllabus
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("chapter {id} not found in {path}")))
    }

    /// Validate and merge a chapter into its syllabus, creating the path if needed.
    pub async fn upsert_chapter(
        &self,
        path: &PathName,
        id: &ChapterId,
        chapter: Chapter,
    ) -> Result<Chapter, Error> {
        let chapter = chapter.validated()?;
        self.store
            .merge(COLLECTION, path.as_str(), chapter_patch(id, &chapter)?)
            .await?;
        self.invalidate(path).await;
        info!("upserted chapter {}/{}", path, id);
        Ok(chapter)
    }

    pub async fn delete_chapter(&self, path: &PathName, id: &ChapterId) -> Result<(), Error> {
        let removed = self
            .store
            .delete_field(COLLECTION, path.as_str(), &[id.as_str()])
            .await?;
        self.invalidate(path).await;
        if !removed {
            return Err(Error::not_found(format!("chapter {id} not found in {path}")));
        }
        info!("deleted chapter {}/{}", path, id);
        Ok(())
    }

    pub async fn delete_path(&self, path: &PathName) -> Result<(), Error> {
        let removed = self.store.delete(COLLECTION, path.as_str()).await?;
        self.invalidate(path).await;
        if !removed {
            return Err(not_found(path));
        }
        info!("deleted learning path {}", path);
        Ok(())
    }

    /// Merge every chapter of `syllabus` into the path. Nothing is written
    /// unless all chapters validate.
    pub async fn import(&self, path: &PathName, syllabus: Syllabus) -> Result<usize, Error> {
        let mut patch = Document::new();
        for (id, chapter) in syllabus.chapters {
            let chapter = chapter
                .validated()
                .map_err(|e| Error::validation(format!("chapter {id}: {e}")))?;
            patch.extend(chapter_patch(&id, &chapter)?);
        }
        let count = patch.len();
        self.store.merge(COLLECTION, path.as_str(), patch).await?;
        self.invalidate(path).await;
        info!("imported {} chapters into {}", count, path);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(title: &str) -> Chapter {
        Chapter {
            title: title.into(),
            ..Default::default()
        }
    }

    fn id(s: &str) -> ChapterId {
        s.parse().unwrap()
    }

    #[test]
    fn reserved_path_names_are_rejected() {
        assert!("beginner".parse::<PathName>().is_ok());
        assert!("points".parse::<PathName>().is_err());
        assert!("lastLogin".parse::<PathName>().is_err());
    }

    #[test]
    fn next_chapter_follows_natural_order() {
        let mut syllabus = Syllabus::default();
        for ch in ["chapter10", "chapter2", "chapter1"] {
            syllabus.chapters.insert(id(ch), chapter(ch));
        }
        assert_eq!(syllabus.first(), Some(&id("chapter1")));
        assert_eq!(syllabus.next_after(&id("chapter1")), Some(&id("chapter2")));
        assert_eq!(syllabus.next_after(&id("chapter2")), Some(&id("chapter10")));
        assert_eq!(syllabus.next_after(&id("chapter10")), None);
    }

    #[test]
    fn syllabus_imports_from_toml() {
        let syllabus: Syllabus = toml::from_str(
            r#"
            [chapter1]
            title = "Greetings"
            content = "Hello!"

            [[chapter1.quiz]]
            question = "How do you greet?"
            options = ["Hello", "Goodbye"]
            correctAnswer = 0
            "#,
        )
        .unwrap();
        let ch = syllabus.get(&id("chapter1")).unwrap();
        assert_eq!(ch.quiz[0].correct_answer, 0);
    }

    #[tokio::test]
    async fn upsert_merges_in_place_and_invalidates_cache() {
        let store = DocStore::in_memory().await.unwrap();
        let curriculum = Curriculum::new(store, 8);
        let path: PathName = "beginner".parse().unwrap();

        curriculum
            .upsert_chapter(&path, &id("ch1"), chapter("One"))
            .await
            .unwrap();
        assert_eq!(curriculum.syllabus(&path).await.unwrap().len(), 1);

        curriculum
            .upsert_chapter(&path, &id("ch2"), chapter("Two"))
            .await
            .unwrap();
        curriculum
            .upsert_chapter(&path, &id("ch1"), chapter("One, revised"))
            .await
            .unwrap();
        let syllabus = curriculum.syllabus(&path).await.unwrap();
        assert_eq!(syllabus.len(), 2);
        assert_eq!(syllabus.get(&id("ch1")).unwrap().title, "One, revised");

        curriculum.delete_chapter(&path, &id("ch1")).await.unwrap();
        assert!(curriculum.chapter(&path, &id("ch1")).await.is_err());
        assert!(matches!(
            curriculum.delete_chapter(&path, &id("ch1")).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(curriculum.list_paths().await.unwrap(), ["beginner"]);
    }

    #[tokio::test]
    async fn invalid_chapter_is_not_written() {
        let store = DocStore::in_memory().await.unwrap();
        let curriculum = Curriculum::new(store, 8);
        let path: PathName = "beginner".parse().unwrap();
        let result = curriculum.upsert_chapter(&path, &id("ch1"), chapter(" ")).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(matches!(
            curriculum.syllabus(&path).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn late_cache_fill_does_not_outlive_a_write() {
        let store = DocStore::in_memory().await.unwrap();
        let curriculum = Curriculum::new(store, 8);
        let path: PathName = "beginner".parse().unwrap();
        curriculum
            .upsert_chapter(&path, &id("ch1"), chapter("One"))
            .await
            .unwrap();

        // a reader loads, an admin writes, then the reader fills the cache
        let stale = curriculum.load(&path).await.unwrap();
        curriculum
            .upsert_chapter(&path, &id("ch2"), chapter("Two"))
            .await
            .unwrap();
        curriculum.cache.insert(path.clone(), stale).await;

        let syllabus = curriculum.syllabus(&path).await.unwrap();
        assert!(syllabus.contains(&id("ch2")));
        assert_eq!(curriculum.chapter(&path, &id("ch2")).await.unwrap().title, "Two");
    }
}
