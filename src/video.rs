use std::sync::LazyLock;

use rand::{Rng, distr::Alphanumeric};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::{
    error::Error,
    store::{DocStore, StoreError, document::to_document},
};

pub const COLLECTION: &str = "videos";

const ID_LEN: usize = 20;

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

static URL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#/].*)?$",
    )
    .expect("valid regex")
});

/// Accept a bare 11-character video id or a YouTube watch/short/embed link.
pub fn parse_youtube_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }
    URL_ID
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 11-character id, or a YouTube link when submitted
    pub youtube_id: String,
    pub category: String,
}

impl Video {
    pub fn validated(mut self) -> Result<Self, Error> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(Error::validation("video title must not be empty"));
        }
        self.category = self.category.trim().to_string();
        if self.category.is_empty() {
            return Err(Error::validation("video category must not be empty"));
        }
        self.description = self.description.trim().to_string();
        self.youtube_id = parse_youtube_id(&self.youtube_id).ok_or_else(|| {
            Error::validation(format!("not a YouTube video id or link: {:?}", self.youtube_id))
        })?;
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    pub id: String,
    pub title: String,
    pub description: String,
    pub youtube_id: String,
    pub category: String,
}

impl VideoEntry {
    fn new(id: String, video: Video) -> Self {
        Self {
            id,
            title: video.title,
            description: video.description,
            youtube_id: video.youtube_id,
            category: video.category,
        }
    }
}

fn new_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

fn not_found(id: &str) -> Error {
    Error::not_found(format!("video {id} not found"))
}

/// Videos ordered by title, optionally restricted to one category.
pub async fn list_videos(store: &DocStore, category: Option<&str>) -> Result<Vec<VideoEntry>, Error> {
    let category = category.map(str::trim).filter(|c| !c.is_empty());
    let mut videos: Vec<VideoEntry> = store
        .list_as::<Video>(COLLECTION)
        .await?
        .into_iter()
        .filter(|(_, v)| category.is_none_or(|c| v.category.eq_ignore_ascii_case(c)))
        .map(|(id, v)| VideoEntry::new(id, v))
        .collect();
    videos.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(videos)
}

pub async fn get_video(store: &DocStore, id: &str) -> Result<VideoEntry, Error> {
    let video = store
        .get_as::<Video>(COLLECTION, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(VideoEntry::new(id.to_string(), video))
}

pub async fn create_video(store: &DocStore, video: Video) -> Result<VideoEntry, Error> {
    let video = video.validated()?;
    let id = new_id();
    store.set(COLLECTION, &id, to_document(&video).map_err(StoreError::from)?).await?;
    info!("created video {} ({})", id, video.title);
    Ok(VideoEntry::new(id, video))
}

/// Merge new fields into an existing video.
pub async fn update_video(store: &DocStore, id: &str, video: Video) -> Result<VideoEntry, Error> {
    let video = video.validated()?;
    store
        .run_transaction::<_, Error, _>(|tx| {
            let (id, video) = (id.to_owned(), video.clone());
            Box::pin(async move {
                if tx.get(COLLECTION, &id).await?.is_none() {
                    return Err(not_found(&id));
                }
                let patch = to_document(&video).map_err(StoreError::from)?;
                tx.merge(COLLECTION, &id, patch).await?;
                Ok(())
            })
        })
        .await?;
    info!("updated video {}", id);
    Ok(VideoEntry::new(id.to_string(), video))
}

pub async fn delete_video(store: &DocStore, id: &str) -> Result<(), Error> {
    if !store.delete(COLLECTION, id).await? {
        return Err(not_found(id));
    }
    info!("deleted video {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(title: &str, category: &str) -> Video {
        Video {
            title: title.into(),
            description: String::new(),
            youtube_id: "dQw4w9WgXcQ".into(),
            category: category.into(),
        }
    }

    #[test]
    fn youtube_ids_and_links() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(parse_youtube_id("dQw4w9WgXcQ"), id);
        assert_eq!(parse_youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(
            parse_youtube_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42"),
            id
        );
        assert_eq!(parse_youtube_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), id);
        assert_eq!(parse_youtube_id("youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(parse_youtube_id("https://youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(parse_youtube_id("dQw4w9"), None);
        assert_eq!(parse_youtube_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
    }

    #[test]
    fn generated_ids_are_alphanumeric() {
        let id = new_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn crud_and_category_filter() {
        let store = DocStore::in_memory().await.unwrap();
        let mut link = video("Phrasal verbs", "Grammar");
        link.youtube_id = "https://youtu.be/dQw4w9WgXcQ".into();
        let grammar = create_video(&store, link).await.unwrap();
        assert_eq!(grammar.youtube_id, "dQw4w9WgXcQ");
        create_video(&store, video("Airport talk", "Speaking")).await.unwrap();
        create_video(&store, video("articles", "grammar")).await.unwrap();

        let all = list_videos(&store, None).await.unwrap();
        let titles: Vec<_> = all.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, ["Airport talk", "articles", "Phrasal verbs"]);
        assert_eq!(list_videos(&store, Some("GRAMMAR")).await.unwrap().len(), 2);

        let mut changed = video("Phrasal verbs 2", "Grammar");
        changed.description = "part two".into();
        update_video(&store, &grammar.id, changed).await.unwrap();
        let got = get_video(&store, &grammar.id).await.unwrap();
        assert_eq!(got.title, "Phrasal verbs 2");
        assert_eq!(got.description, "part two");

        delete_video(&store, &grammar.id).await.unwrap();
        assert!(matches!(get_video(&store, &grammar.id).await, Err(Error::NotFound(_))));
        assert!(matches!(delete_video(&store, &grammar.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn update_of_missing_video_is_not_found() {
        let store = DocStore::in_memory().await.unwrap();
        let result = update_video(&store, "missing", video("t", "c")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(store.get(COLLECTION, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_video_is_rejected() {
        let store = DocStore::in_memory().await.unwrap();
        let mut bad = video("t", "c");
        bad.youtube_id = "not a video".into();
        assert!(matches!(create_video(&store, bad).await, Err(Error::Validation(_))));
        assert!(matches!(
            create_video(&store, video("  ", "c")).await,
            Err(Error::Validation(_))
        ));
    }
}
