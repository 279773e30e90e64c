//! Reshape raw Plex payloads into typed, slug-addressed tables.
//!
//! A library section arrives as a list of loosely structured records whose
//! multi-valued fields (`Genre`, `Director`, `Writer`, `Role`) are lists of
//! `{ "tag": ... }` objects. This module keeps a fixed whitelist of fields,
//! deduplicates the tag values into [`Genre`] and [`Person`] tables, and
//! rewrites each movie's tag lists into lists of slugs.
//!
//! # Slug collisions
//! Distinct names that normalize to the same slug are merged into one entity.
//! The lexicographically first name becomes the display name and the rest are
//! kept as aliases; every variant maps to the shared slug.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::contract::MediaServer;
use crate::error::Result;
use crate::slug::slugify;

/// `{ "MediaContainer": { "Metadata": [...] } }`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    pub media_container: Container<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Container<T> {
    /// Plex omits the key entirely for an empty section or history.
    #[serde(rename = "Metadata", default = "Vec::new")]
    pub metadata: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub tag: String,
}

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

/// One item of a library section, restricted to the fields the graph uses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "type")]
    pub media_type: String,
    pub title: String,
    #[serde(default)]
    pub content_rating: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub view_count: Option<u32>,
    #[serde(default)]
    pub last_viewed_at: Option<i64>,
    #[serde(default)]
    pub originally_available_at: Option<NaiveDate>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(rename = "Genre", default, deserialize_with = "tags")]
    pub genres: Vec<Tag>,
    #[serde(rename = "Director", default, deserialize_with = "tags")]
    pub directors: Vec<Tag>,
    #[serde(rename = "Writer", default, deserialize_with = "tags")]
    pub writers: Vec<Tag>,
    #[serde(rename = "Role", default, deserialize_with = "tags")]
    pub roles: Vec<Tag>,
}

fn tags<'de, D>(deserializer: D) -> std::result::Result<Vec<Tag>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Tag>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One playback-history entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub history_key: String,
    pub title: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub viewed_at: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
}

/// An entity built from deduplicated tag values.
pub trait TagEntity {
    fn from_tag(slug: String, name: String, aliases: Vec<String>) -> Self;
    fn slug(&self) -> &str;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genre {
    pub slug: String,
    pub name: String,
    /// Other spellings merged into this genre.
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub slug: String,
    pub name: String,
    pub aliases: Vec<String>,
}

impl Person {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            aliases: Vec::new(),
        }
    }
}

macro_rules! impl_tag_entity {
    ($($ty:ty),*) => {
        $(
            impl TagEntity for $ty {
                fn from_tag(slug: String, name: String, aliases: Vec<String>) -> Self {
                    Self { slug, name, aliases }
                }
                fn slug(&self) -> &str {
                    &self.slug
                }
                fn name(&self) -> &str {
                    &self.name
                }
            }
        )*
    };
}

impl_tag_entity!(Genre, Person);

/// Deduplicated entities plus the name → slug lookup used for substitution.
#[derive(Debug, Clone)]
pub struct DedupTable<E> {
    entries: Vec<E>,
    slugs_by_name: HashMap<String, String>,
}

impl<E> Default for DedupTable<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            slugs_by_name: HashMap::new(),
        }
    }
}

impl<E: TagEntity> DedupTable<E> {
    /// Collect the distinct names (exact, case-sensitive), sort them and
    /// assign slugs. Names with an empty slug are dropped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = names.into_iter().map(Into::into).collect();

        let mut groups: Vec<(String, String, Vec<String>)> = Vec::new();
        let mut group_by_slug: HashMap<String, usize> = HashMap::new();
        let mut slugs_by_name = HashMap::new();

        for name in unique {
            let slug = slugify(&name);
            if slug.is_empty() {
                warn!(name = %name, "Tag has no slug-able characters, dropping");
                continue;
            }
            match group_by_slug.get(&slug) {
                Some(&idx) => {
                    warn!(
                        slug = %slug,
                        name = %name,
                        kept = %groups[idx].1,
                        "Slug collision, merging into existing entity"
                    );
                    groups[idx].2.push(name.clone());
                }
                None => {
                    group_by_slug.insert(slug.clone(), groups.len());
                    groups.push((slug.clone(), name.clone(), Vec::new()));
                }
            }
            slugs_by_name.insert(name, slug);
        }

        Self {
            entries: groups
                .into_iter()
                .map(|(slug, name, aliases)| E::from_tag(slug, name, aliases))
                .collect(),
            slugs_by_name,
        }
    }

    /// Rewrite tag records into slugs. Unknown tags are skipped; repeated
    /// slugs are kept once, in first-seen order.
    pub fn map_tags(&self, tags: &[Tag]) -> Vec<String> {
        let mut seen = HashSet::new();
        tags.iter()
            .filter_map(|t| self.slug_for(&t.tag))
            .filter(|slug| seen.insert(*slug))
            .map(str::to_string)
            .collect()
    }

    pub fn slug_for(&self, name: &str) -> Option<&str> {
        self.slugs_by_name.get(name).map(String::as_str)
    }

    pub fn contains_slug(&self, slug: &str) -> bool {
        self.entries.iter().any(|e| e.slug() == slug)
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A library item with its tag lists rewritten to slugs.
#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    pub slug: String,
    pub media_type: String,
    pub title: String,
    pub content_rating: Option<String>,
    pub rating: Option<f64>,
    pub view_count: Option<u32>,
    pub last_viewed_at: Option<i64>,
    pub originally_available_at: Option<NaiveDate>,
    pub duration: Option<i64>,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub writers: Vec<String>,
    pub actors: Vec<String>,
}

impl Movie {
    /// A bare movie with no optional fields and no relationships.
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            media_type: "movie".to_string(),
            title: title.into(),
            content_rating: None,
            rating: None,
            view_count: None,
            last_viewed_at: None,
            originally_available_at: None,
            duration: None,
            genres: Vec::new(),
            directors: Vec::new(),
            writers: Vec::new(),
            actors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Plex's `historyKey`, e.g. `/status/sessions/history/42`.
    pub history_key: String,
    pub movie_slug: String,
    pub viewed_at: DateTime<Utc>,
}

/// The four tables the graph is built from.
#[derive(Debug, Clone, Default)]
pub struct StructuredDatasets {
    pub genres: DedupTable<Genre>,
    pub persons: DedupTable<Person>,
    pub movies: Vec<Movie>,
    pub history: Vec<WatchEvent>,
}

pub fn parse_section(payload: serde_json::Value) -> Result<Vec<MediaRecord>> {
    let envelope: Envelope<MediaRecord> = serde_json::from_value(payload)?;
    Ok(envelope.media_container.metadata)
}

pub fn parse_history(payload: serde_json::Value) -> Result<Vec<HistoryRecord>> {
    let envelope: Envelope<HistoryRecord> = serde_json::from_value(payload)?;
    Ok(envelope.media_container.metadata)
}

/// Build the dedup tables, substitute slugs into every record and join the
/// history to movies by title.
pub fn structure_records(
    records: Vec<MediaRecord>,
    history: Vec<HistoryRecord>,
) -> StructuredDatasets {
    let genres: DedupTable<Genre> = DedupTable::from_names(
        records
            .iter()
            .flat_map(|r| r.genres.iter().map(|t| t.tag.clone())),
    );
    let persons: DedupTable<Person> = DedupTable::from_names(records.iter().flat_map(|r| {
        r.directors
            .iter()
            .chain(&r.writers)
            .chain(&r.roles)
            .map(|t| t.tag.clone())
    }));
    info!(
        genres = genres.len(),
        persons = persons.len(),
        "Built dedup tables"
    );

    let mut used_slugs = HashSet::new();
    let mut movies = Vec::with_capacity(records.len());
    for record in records {
        let base = slugify(record.slug.as_deref().unwrap_or(&record.title));
        let slug = if !base.is_empty() {
            disambiguate(base, &mut used_slugs)
        } else if record.media_type == "movie" {
            warn!(title = %record.title, "Record has no usable slug, dropping");
            continue;
        } else {
            // Kept so graph assembly rejects the media type; it never gets an IRI.
            record.title.clone()
        };
        movies.push(Movie {
            genres: genres.map_tags(&record.genres),
            directors: persons.map_tags(&record.directors),
            writers: persons.map_tags(&record.writers),
            actors: persons.map_tags(&record.roles),
            slug,
            media_type: record.media_type,
            title: record.title,
            content_rating: record.content_rating,
            rating: record.rating,
            view_count: record.view_count,
            last_viewed_at: record.last_viewed_at,
            originally_available_at: record.originally_available_at,
            duration: record.duration,
        });
    }

    let history = join_history(&movies, history);
    info!(
        movies = movies.len(),
        watch_events = history.len(),
        "Structured section records"
    );

    StructuredDatasets {
        genres,
        persons,
        movies,
        history,
    }
}

/// Two different records must never share an IRI, so repeated movie slugs
/// get a numeric suffix.
fn disambiguate(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            warn!(slug = %base, assigned = %candidate, "Duplicate movie slug, appending discriminator");
            return candidate;
        }
        n += 1;
    }
}

fn join_history(movies: &[Movie], history: Vec<HistoryRecord>) -> Vec<WatchEvent> {
    let mut slug_by_title: HashMap<&str, &str> = HashMap::new();
    for movie in movies {
        slug_by_title
            .entry(movie.title.as_str())
            .or_insert(movie.slug.as_str());
    }

    history
        .into_iter()
        .filter_map(|record| match slug_by_title.get(record.title.as_str()) {
            Some(slug) => Some(WatchEvent {
                history_key: record.history_key,
                movie_slug: slug.to_string(),
                viewed_at: record.viewed_at,
            }),
            None => {
                warn!(
                    title = %record.title,
                    history_key = %record.history_key,
                    "History entry has no matching movie, dropping"
                );
                None
            }
        })
        .collect()
}

/// Parse both payloads and reshape them.
pub fn structure_datasets(
    section_payload: serde_json::Value,
    history_payload: serde_json::Value,
) -> Result<StructuredDatasets> {
    let records = parse_section(section_payload)?;
    let history = parse_history(history_payload)?;
    debug!(
        records = records.len(),
        history = history.len(),
        "Parsed Plex payloads"
    );
    Ok(structure_records(records, history))
}

/// Fetch one library section and one account's history for it, then reshape.
pub async fn create_structured_datasets<M>(
    server: &M,
    section_id: u32,
    account_id: u32,
) -> Result<StructuredDatasets>
where
    M: MediaServer + ?Sized,
{
    info!(section_id, account_id, "Fetching section items and playback history");
    let section = server.section_items(section_id).await?;
    let history = server.playback_history(section_id, account_id).await?;
    structure_datasets(section, history)
}
