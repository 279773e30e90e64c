//! RDF plumbing: vocabularies, an insertion-ordered triple set and Turtle I/O.

use oxrdf::{Graph, NamedNode, Subject, SubjectRef, Term, Triple, TripleRef};
use oxttl::{TurtleParser, TurtleSerializer};

use crate::error::{Error, Result};

pub mod schema {
    use oxrdf::NamedNodeRef;

    pub const NAMESPACE: &str = "https://schema.org/";

    pub const ACTOR: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("https://schema.org/actor");
    pub const AGENT: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("https://schema.org/agent");
    pub const AUTHOR: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/author");
    pub const CONTENT_RATING: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/contentRating");
    pub const DATE_PUBLISHED: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/datePublished");
    pub const DIRECTOR: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/director");
    pub const DURATION: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/duration");
    /// Used both as the genre property and as the class of genre nodes.
    pub const GENRE: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("https://schema.org/genre");
    pub const MOVIE: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("https://schema.org/Movie");
    pub const NAME: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("https://schema.org/name");
    pub const OBJECT: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/object");
    pub const PERSON: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/Person");
    pub const RATING: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/Rating");
    pub const RATING_VALUE: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/ratingValue");
    pub const START_TIME: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/startTime");
    pub const WATCH_ACTION: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("https://schema.org/WatchAction");
}

pub mod sh {
    use oxrdf::NamedNodeRef;

    pub const NAMESPACE: &str = "http://www.w3.org/ns/shacl#";

    macro_rules! shacl_terms {
        ($($name:ident => $local:literal),* $(,)?) => {
            $(
                pub const $name: NamedNodeRef<'static> =
                    NamedNodeRef::new_unchecked(concat!("http://www.w3.org/ns/shacl#", $local));
            )*
        };
    }

    shacl_terms! {
        NODE_SHAPE => "NodeShape",
        PROPERTY_SHAPE => "PropertyShape",
        TARGET_CLASS => "targetClass",
        TARGET_NODE => "targetNode",
        TARGET_SUBJECTS_OF => "targetSubjectsOf",
        TARGET_OBJECTS_OF => "targetObjectsOf",
        PROPERTY => "property",
        PATH => "path",
        INVERSE_PATH => "inversePath",
        DEACTIVATED => "deactivated",
        SEVERITY => "severity",
        MESSAGE => "message",
        CLASS => "class",
        DATATYPE => "datatype",
        NODE_KIND => "nodeKind",
        MIN_COUNT => "minCount",
        MAX_COUNT => "maxCount",
        PATTERN => "pattern",
        FLAGS => "flags",
        MIN_LENGTH => "minLength",
        MAX_LENGTH => "maxLength",
        IN => "in",
        HAS_VALUE => "hasValue",
        MIN_INCLUSIVE => "minInclusive",
        MAX_INCLUSIVE => "maxInclusive",
        MIN_EXCLUSIVE => "minExclusive",
        MAX_EXCLUSIVE => "maxExclusive",
        NODE => "node",
        IRI => "IRI",
        BLANK_NODE => "BlankNode",
        LITERAL => "Literal",
        BLANK_NODE_OR_IRI => "BlankNodeOrIRI",
        BLANK_NODE_OR_LITERAL => "BlankNodeOrLiteral",
        IRI_OR_LITERAL => "IRIOrLiteral",
        VIOLATION => "Violation",
        WARNING => "Warning",
        INFO => "Info",
        VALIDATION_REPORT => "ValidationReport",
        VALIDATION_RESULT => "ValidationResult",
        CONFORMS => "conforms",
        RESULT => "result",
        FOCUS_NODE => "focusNode",
        RESULT_PATH => "resultPath",
        VALUE => "value",
        RESULT_SEVERITY => "resultSeverity",
        SOURCE_CONSTRAINT_COMPONENT => "sourceConstraintComponent",
        SOURCE_SHAPE => "sourceShape",
        RESULT_MESSAGE => "resultMessage",
        CLASS_CONSTRAINT_COMPONENT => "ClassConstraintComponent",
        DATATYPE_CONSTRAINT_COMPONENT => "DatatypeConstraintComponent",
        NODE_KIND_CONSTRAINT_COMPONENT => "NodeKindConstraintComponent",
        MIN_COUNT_CONSTRAINT_COMPONENT => "MinCountConstraintComponent",
        MAX_COUNT_CONSTRAINT_COMPONENT => "MaxCountConstraintComponent",
        PATTERN_CONSTRAINT_COMPONENT => "PatternConstraintComponent",
        MIN_LENGTH_CONSTRAINT_COMPONENT => "MinLengthConstraintComponent",
        MAX_LENGTH_CONSTRAINT_COMPONENT => "MaxLengthConstraintComponent",
        IN_CONSTRAINT_COMPONENT => "InConstraintComponent",
        HAS_VALUE_CONSTRAINT_COMPONENT => "HasValueConstraintComponent",
        MIN_INCLUSIVE_CONSTRAINT_COMPONENT => "MinInclusiveConstraintComponent",
        MAX_INCLUSIVE_CONSTRAINT_COMPONENT => "MaxInclusiveConstraintComponent",
        MIN_EXCLUSIVE_CONSTRAINT_COMPONENT => "MinExclusiveConstraintComponent",
        MAX_EXCLUSIVE_CONSTRAINT_COMPONENT => "MaxExclusiveConstraintComponent",
        NODE_CONSTRAINT_COMPONENT => "NodeConstraintComponent",
    }
}

/// Prefixes written at the top of every serialized document.
pub fn standard_prefixes(base_iri: &str) -> Vec<(String, String)> {
    let mut prefixes = vec![
        ("rdf".to_string(), "http://www.w3.org/1999/02/22-rdf-syntax-ns#".to_string()),
        ("rdfs".to_string(), "http://www.w3.org/2000/01/rdf-schema#".to_string()),
        ("xsd".to_string(), "http://www.w3.org/2001/XMLSchema#".to_string()),
        ("schema".to_string(), schema::NAMESPACE.to_string()),
        ("sh".to_string(), sh::NAMESPACE.to_string()),
        ("plex".to_string(), base_iri.to_string()),
    ];
    for entity in ["genre", "person", "movie"] {
        prefixes.push((entity.to_string(), format!("{base_iri}{entity}/")));
    }
    prefixes
}

/// Build a [`NamedNode`], reporting malformed IRIs as [`Error::Iri`].
pub fn iri(value: impl Into<String>) -> Result<NamedNode> {
    let value = value.into();
    NamedNode::new(value.clone()).map_err(|e| Error::Iri(format!("{value}: {e}")))
}

/// Subject view of a term; literals cannot be subjects.
pub fn as_subject(term: &Term) -> Option<SubjectRef<'_>> {
    match term {
        Term::NamedNode(n) => Some(n.as_ref().into()),
        Term::BlankNode(b) => Some(b.as_ref().into()),
        _ => None,
    }
}

pub fn subject_to_term(subject: SubjectRef<'_>) -> Term {
    match subject {
        SubjectRef::NamedNode(n) => n.into_owned().into(),
        SubjectRef::BlankNode(b) => b.into_owned().into(),
    }
}

pub fn term_to_subject(term: &Term) -> Option<Subject> {
    match term {
        Term::NamedNode(n) => Some(n.clone().into()),
        Term::BlankNode(b) => Some(b.clone().into()),
        _ => None,
    }
}

/// An append-only set of triples that remembers insertion order.
///
/// Membership and lookups go through an [`oxrdf::Graph`]; serialization walks
/// the insertion order so each entity's triples stay together in the output.
#[derive(Debug, Default, Clone)]
pub struct OrderedGraph {
    triples: Vec<Triple>,
    index: Graph,
}

impl OrderedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the triple was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if self.index.insert(&triple) {
            self.triples.push(triple);
            true
        } else {
            false
        }
    }

    pub fn add(
        &mut self,
        subject: impl Into<Subject>,
        predicate: impl Into<NamedNode>,
        object: impl Into<Term>,
    ) -> bool {
        self.insert(Triple::new(subject, predicate, object))
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn graph(&self) -> &Graph {
        &self.index
    }

    pub fn into_graph(self) -> Graph {
        self.index
    }

    pub fn to_turtle(&self, prefixes: &[(String, String)]) -> Result<String> {
        serialize_turtle(self.triples.iter().map(Triple::as_ref), prefixes)
    }
}

impl From<&Graph> for OrderedGraph {
    fn from(graph: &Graph) -> Self {
        let mut ordered = OrderedGraph::new();
        for triple in graph.iter() {
            ordered.insert(triple.into_owned());
        }
        ordered
    }
}

pub fn serialize_turtle<'a>(
    triples: impl IntoIterator<Item = TripleRef<'a>>,
    prefixes: &[(String, String)],
) -> Result<String> {
    let mut serializer = TurtleSerializer::new();
    for (name, namespace) in prefixes {
        serializer = serializer
            .with_prefix(name.as_str(), namespace.as_str())
            .map_err(|e| Error::Iri(format!("prefix {name}: {e}")))?;
    }
    let mut writer = serializer.for_writer(Vec::new());
    for triple in triples {
        writer
            .serialize_triple(triple)
            .map_err(|e| Error::Turtle(e.to_string()))?;
    }
    let bytes = writer.finish().map_err(|e| Error::Turtle(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::Turtle(e.to_string()))
}

/// Parse a Turtle document. Relative IRIs resolve against `base_iri` when given.
pub fn parse_turtle(data: &str, base_iri: Option<&str>) -> Result<Graph> {
    let mut parser = TurtleParser::new();
    if let Some(base) = base_iri {
        parser = parser
            .with_base_iri(base)
            .map_err(|e| Error::Iri(format!("{base}: {e}")))?;
    }
    let mut graph = Graph::new();
    for triple in parser.for_reader(data.as_bytes()) {
        let triple = triple.map_err(|e| Error::Turtle(e.to_string()))?;
        graph.insert(&triple);
    }
    Ok(graph)
}

/// Union of several graphs.
pub fn merge_graphs<'a>(graphs: impl IntoIterator<Item = &'a Graph>) -> Graph {
    let mut merged = Graph::new();
    for graph in graphs {
        for triple in graph.iter() {
            merged.insert(triple);
        }
    }
    merged
}
