//! Graph assembly: turn [`StructuredDatasets`] into schema.org triples.
//!
//! Entities are added in a fixed order (genres, the watcher, persons, movies,
//! watch events) so the serialized document reads top to bottom. Order has no
//! other meaning.

use chrono::SecondsFormat;
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{BlankNode, Literal, NamedNode};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, error, info, warn};

use crate::config::GraphConfig;
use crate::error::{Error, Result};
use crate::extract::{Genre, Movie, Person, StructuredDatasets, WatchEvent};
use crate::rdf::{iri, schema, standard_prefixes, OrderedGraph};

/// Mints the IRIs of every entity kind under one base.
#[derive(Debug, Clone)]
pub struct PlexNamespace {
    base: String,
}

impl PlexNamespace {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn genre(&self, slug: &str) -> Result<NamedNode> {
        iri(format!("{}genre/{slug}", self.base))
    }

    pub fn person(&self, slug: &str) -> Result<NamedNode> {
        iri(format!("{}person/{slug}", self.base))
    }

    pub fn movie(&self, slug: &str) -> Result<NamedNode> {
        iri(format!("{}movie/{slug}", self.base))
    }

    pub fn history(&self, history_key: &str) -> Result<NamedNode> {
        let sep = if history_key.starts_with('/') { "" } else { "/" };
        iri(format!("{}history{sep}{history_key}", self.base))
    }

    /// IRI of a named graph in the store.
    pub fn named_graph(&self, name: &str) -> Result<NamedNode> {
        iri(format!("{}{name}", self.base))
    }
}

/// Round to one fractional digit, half to even, and always print one digit.
pub fn rating_value(rating: f64) -> Option<Decimal> {
    let mut value = Decimal::from_f64_retain(rating)?
        .round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven);
    value.rescale(1);
    Some(value)
}

pub struct GraphBuilder {
    ns: PlexNamespace,
    watcher: Person,
    graph: OrderedGraph,
}

impl GraphBuilder {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            ns: PlexNamespace::new(config.base_iri.clone()),
            watcher: Person::new(config.watcher.slug.clone(), config.watcher.name.clone()),
            graph: OrderedGraph::new(),
        }
    }

    pub fn namespace(&self) -> &PlexNamespace {
        &self.ns
    }

    /// Add every table in build order. Fails on the first contract violation.
    pub fn add_datasets(&mut self, datasets: &StructuredDatasets) -> Result<()> {
        for genre in datasets.genres.iter() {
            self.add_genre(genre)?;
        }

        let watcher = self.watcher.clone();
        self.add_person(&watcher)?;

        for person in datasets.persons.iter() {
            self.add_person(person)?;
        }
        for movie in &datasets.movies {
            self.add_movie(movie)?;
        }
        for event in &datasets.history {
            self.add_watch_event(event)?;
        }
        Ok(())
    }

    pub fn add_genre(&mut self, genre: &Genre) -> Result<()> {
        let node = self.ns.genre(&genre.slug)?;
        self.graph.add(node.clone(), rdf::TYPE, schema::GENRE.into_owned());
        self.graph.add(node, schema::NAME, english(&genre.name));
        Ok(())
    }

    pub fn add_person(&mut self, person: &Person) -> Result<()> {
        let node = self.ns.person(&person.slug)?;
        self.graph.add(node.clone(), rdf::TYPE, schema::PERSON.into_owned());
        self.graph
            .add(node, schema::NAME, Literal::new_simple_literal(&person.name));
        Ok(())
    }

    /// Rejects anything that is not a movie before touching the graph.
    pub fn add_movie(&mut self, movie: &Movie) -> Result<()> {
        if movie.media_type != "movie" {
            error!(
                slug = %movie.slug,
                media_type = %movie.media_type,
                "Record is not a movie, aborting graph construction"
            );
            return Err(Error::WrongMediaType {
                slug: movie.slug.clone(),
                found: movie.media_type.clone(),
            });
        }

        let node = self.ns.movie(&movie.slug)?;
        self.graph.add(node.clone(), rdf::TYPE, schema::MOVIE.into_owned());
        self.graph.add(node.clone(), schema::NAME, english(&movie.title));

        if let Some(date) = movie.originally_available_at {
            self.graph.add(
                node.clone(),
                schema::DATE_PUBLISHED,
                Literal::new_typed_literal(date.format("%Y-%m-%d").to_string(), xsd::DATE),
            );
        }
        if let Some(duration) = movie.duration {
            self.graph.add(
                node.clone(),
                schema::DURATION,
                Literal::new_typed_literal(duration.to_string(), xsd::INTEGER),
            );
        }

        match movie.rating.map(|r| (r, rating_value(r))) {
            Some((_, Some(value))) => {
                let rating = BlankNode::default();
                self.graph.add(rating.clone(), rdf::TYPE, schema::RATING.into_owned());
                self.graph.add(
                    rating.clone(),
                    schema::RATING_VALUE,
                    Literal::new_typed_literal(value.to_string(), xsd::DECIMAL),
                );
                self.graph.add(node.clone(), schema::CONTENT_RATING, rating);
            }
            Some((raw, None)) => {
                warn!(slug = %movie.slug, rating = raw, "Rating is not a finite number, skipping");
            }
            None => {}
        }

        for slug in &movie.genres {
            self.graph
                .add(node.clone(), schema::GENRE, self.ns.genre(slug)?);
        }
        for slug in &movie.directors {
            self.graph
                .add(node.clone(), schema::DIRECTOR, self.ns.person(slug)?);
        }
        for slug in &movie.writers {
            self.graph
                .add(node.clone(), schema::AUTHOR, self.ns.person(slug)?);
        }
        for slug in &movie.actors {
            self.graph
                .add(node.clone(), schema::ACTOR, self.ns.person(slug)?);
        }
        debug!(slug = %movie.slug, "Added movie");
        Ok(())
    }

    pub fn add_watch_event(&mut self, event: &WatchEvent) -> Result<()> {
        let node = self.ns.history(&event.history_key)?;
        let started = event.viewed_at.to_rfc3339_opts(SecondsFormat::Secs, false);

        self.graph.add(node.clone(), rdf::TYPE, schema::WATCH_ACTION.into_owned());
        self.graph
            .add(node.clone(), schema::AGENT, self.ns.person(&self.watcher.slug)?);
        self.graph
            .add(node.clone(), schema::OBJECT, self.ns.movie(&event.movie_slug)?);
        self.graph.add(
            node,
            schema::START_TIME,
            Literal::new_typed_literal(started, xsd::DATE_TIME),
        );
        Ok(())
    }

    pub fn finish(self) -> OrderedGraph {
        self.graph
    }
}

fn english(text: &str) -> Literal {
    Literal::new_language_tagged_literal_unchecked(text, "en")
}

/// Assemble the whole graph for one run.
pub fn build_graph(config: &GraphConfig, datasets: &StructuredDatasets) -> Result<OrderedGraph> {
    let mut builder = GraphBuilder::new(config);
    builder.add_datasets(datasets)?;
    let graph = builder.finish();
    info!(triples = graph.len(), "[BUILD] Assembled graph");
    Ok(graph)
}

/// Serialize a graph with the prefixes of this namespace.
pub fn to_turtle(config: &GraphConfig, graph: &OrderedGraph) -> Result<String> {
    graph.to_turtle(&standard_prefixes(&config.base_iri))
}
