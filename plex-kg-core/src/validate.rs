//! SHACL Core validation.
//!
//! Shapes are read from Turtle documents into a [`Validator`]. Validation runs
//! over the RDFS closure of the data graph (plus the ontology, when one is
//! attached) and collects every result; nothing short-circuits. A report with
//! no results conforms.
//!
//! Supported: `targetClass`, `targetNode`, `targetSubjectsOf`,
//! `targetObjectsOf`, implicit class targets, `sh:property`, predicate and
//! inverse paths, `sh:deactivated`, `sh:severity`, `sh:message`, and the
//! value type, cardinality, string, range, `in`, `hasValue` and `node`
//! constraint components.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use oxrdf::vocab::{rdf, rdfs, xsd};
use oxrdf::{BlankNode, Graph, Literal, NamedNode, NamedNodeRef, Subject, Term, TermRef, TripleRef};
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::config::RdfFiles;
use crate::error::{Error, Result};
use crate::inference::rdfs_closure;
use crate::rdf::{
    as_subject, merge_graphs, parse_turtle, sh, standard_prefixes, subject_to_term, term_to_subject,
    OrderedGraph,
};

pub const DATA_FILENAME: &str = "data.ttl";
pub const REPORT_FILENAME: &str = "error_report.ttl";

/// Nesting limit for `sh:node` chains. Deeper references are assumed to conform.
const MAX_NODE_DEPTH: usize = 32;

static INTEGER_LEXICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("integer pattern is valid"));
static DECIMAL_LEXICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$").expect("decimal pattern is valid")
});
static DOUBLE_LEXICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?|[+-]?INF|NaN)$")
        .expect("double pattern is valid")
});
static DATE_LEXICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?[0-9]{4,}-[0-9]{2}-[0-9]{2})(Z|[+-][0-9]{2}:[0-9]{2})?$")
        .expect("date pattern is valid")
});
static DATE_TIME_LEXICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-?[0-9]{4,}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?)(Z|[+-][0-9]{2}:[0-9]{2})?$",
    )
    .expect("dateTime pattern is valid")
});

const INTEGER_TYPES: [NamedNodeRef<'static>; 13] = [
    xsd::INTEGER,
    xsd::LONG,
    xsd::INT,
    xsd::SHORT,
    xsd::BYTE,
    xsd::NON_NEGATIVE_INTEGER,
    xsd::POSITIVE_INTEGER,
    xsd::NON_POSITIVE_INTEGER,
    xsd::NEGATIVE_INTEGER,
    xsd::UNSIGNED_LONG,
    xsd::UNSIGNED_INT,
    xsd::UNSIGNED_SHORT,
    xsd::UNSIGNED_BYTE,
];

fn is_integer(datatype: NamedNodeRef<'_>) -> bool {
    INTEGER_TYPES.iter().any(|t| *t == datatype)
}

fn is_numeric(datatype: NamedNodeRef<'_>) -> bool {
    is_integer(datatype)
        || datatype == xsd::DECIMAL
        || datatype == xsd::DOUBLE
        || datatype == xsd::FLOAT
}

/// Lexical well-formedness for the XSD types the graph uses. Other datatypes
/// are accepted as-is.
fn well_formed(literal: &Literal) -> bool {
    let datatype = literal.datatype();
    let value = literal.value();
    if is_integer(datatype) {
        INTEGER_LEXICAL.is_match(value)
    } else if datatype == xsd::DECIMAL {
        DECIMAL_LEXICAL.is_match(value)
    } else if datatype == xsd::DOUBLE || datatype == xsd::FLOAT {
        DOUBLE_LEXICAL.is_match(value)
    } else if datatype == xsd::BOOLEAN {
        matches!(value, "true" | "false" | "1" | "0")
    } else if datatype == xsd::DATE {
        DATE_LEXICAL
            .captures(value)
            .is_some_and(|caps| NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").is_ok())
    } else if datatype == xsd::DATE_TIME {
        DATE_TIME_LEXICAL.captures(value).is_some_and(|caps| {
            NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        })
    } else {
        true
    }
}

/// Order a value against a range bound; `None` when the two are incomparable.
fn compare(value: &Term, bound: &Literal) -> Option<Ordering> {
    let Term::Literal(value) = value else {
        return None;
    };
    let (left, right) = (value.datatype(), bound.datatype());
    if is_numeric(left) && is_numeric(right) {
        let a: f64 = value.value().trim().parse().ok()?;
        let b: f64 = bound.value().trim().parse().ok()?;
        a.partial_cmp(&b)
    } else if left == right && (left == xsd::DATE || left == xsd::DATE_TIME || left == xsd::STRING)
    {
        Some(value.value().cmp(bound.value()))
    } else {
        None
    }
}

fn lexical_form(term: &Term) -> Option<&str> {
    match term {
        Term::NamedNode(n) => Some(n.as_str()),
        Term::Literal(l) => Some(l.value()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Violation,
    Warning,
    Info,
}

impl Severity {
    pub fn iri(self) -> NamedNodeRef<'static> {
        match self {
            Severity::Violation => sh::VIOLATION,
            Severity::Warning => sh::WARNING,
            Severity::Info => sh::INFO,
        }
    }

    fn from_term(term: TermRef<'_>) -> Self {
        match term {
            TermRef::NamedNode(n) if n == sh::WARNING => Severity::Warning,
            TermRef::NamedNode(n) if n == sh::INFO => Severity::Info,
            TermRef::NamedNode(n) if n == sh::VIOLATION => Severity::Violation,
            other => {
                warn!(severity = %other, "Unknown severity, treating as sh:Violation");
                Severity::Violation
            }
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Violation => f.write_str("Violation"),
            Severity::Warning => f.write_str("Warning"),
            Severity::Info => f.write_str("Info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyPath {
    Predicate(NamedNode),
    Inverse(NamedNode),
}

impl PropertyPath {
    fn values(&self, data: &Graph, focus: &Term) -> Vec<Term> {
        match self {
            PropertyPath::Predicate(p) => match as_subject(focus) {
                Some(subject) => data
                    .objects_for_subject_predicate(subject, p)
                    .map(TermRef::into_owned)
                    .collect(),
                None => Vec::new(),
            },
            PropertyPath::Inverse(p) => data
                .subjects_for_predicate_object(p, focus)
                .map(subject_to_term)
                .collect(),
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyPath::Predicate(p) => write!(f, "{p}"),
            PropertyPath::Inverse(p) => write!(f, "^{p}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Target {
    Class(Term),
    Node(Term),
    SubjectsOf(NamedNode),
    ObjectsOf(NamedNode),
}

impl Target {
    fn focus_nodes(&self, data: &Graph) -> Vec<Term> {
        match self {
            Target::Class(class) => data
                .subjects_for_predicate_object(rdf::TYPE, class)
                .map(subject_to_term)
                .collect(),
            Target::Node(node) => vec![node.clone()],
            Target::SubjectsOf(p) => data
                .triples_for_predicate(p)
                .map(|t| subject_to_term(t.subject))
                .collect(),
            Target::ObjectsOf(p) => data
                .triples_for_predicate(p)
                .map(|t| t.object.into_owned())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Iri,
    BlankNode,
    Literal,
    BlankNodeOrIri,
    BlankNodeOrLiteral,
    IriOrLiteral,
}

impl NodeKind {
    const ALL: [NodeKind; 6] = [
        NodeKind::Iri,
        NodeKind::BlankNode,
        NodeKind::Literal,
        NodeKind::BlankNodeOrIri,
        NodeKind::BlankNodeOrLiteral,
        NodeKind::IriOrLiteral,
    ];

    fn iri(self) -> NamedNodeRef<'static> {
        match self {
            NodeKind::Iri => sh::IRI,
            NodeKind::BlankNode => sh::BLANK_NODE,
            NodeKind::Literal => sh::LITERAL,
            NodeKind::BlankNodeOrIri => sh::BLANK_NODE_OR_IRI,
            NodeKind::BlankNodeOrLiteral => sh::BLANK_NODE_OR_LITERAL,
            NodeKind::IriOrLiteral => sh::IRI_OR_LITERAL,
        }
    }

    fn from_iri(iri: NamedNodeRef<'_>) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.iri() == iri)
    }

    fn matches(self, term: &Term) -> bool {
        let iri = matches!(term, Term::NamedNode(_));
        let blank = matches!(term, Term::BlankNode(_));
        let literal = matches!(term, Term::Literal(_));
        match self {
            NodeKind::Iri => iri,
            NodeKind::BlankNode => blank,
            NodeKind::Literal => literal,
            NodeKind::BlankNodeOrIri => blank || iri,
            NodeKind::BlankNodeOrLiteral => blank || literal,
            NodeKind::IriOrLiteral => iri || literal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeKind {
    MinInclusive,
    MaxInclusive,
    MinExclusive,
    MaxExclusive,
}

impl RangeKind {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            RangeKind::MinInclusive => ordering != Ordering::Less,
            RangeKind::MaxInclusive => ordering != Ordering::Greater,
            RangeKind::MinExclusive => ordering == Ordering::Greater,
            RangeKind::MaxExclusive => ordering == Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            RangeKind::MinInclusive => ">=",
            RangeKind::MaxInclusive => "<=",
            RangeKind::MinExclusive => ">",
            RangeKind::MaxExclusive => "<",
        }
    }
}

#[derive(Debug, Clone)]
enum Constraint {
    Class(Term),
    Datatype(NamedNode),
    NodeKind(NodeKind),
    MinCount(usize),
    MaxCount(usize),
    Pattern { pattern: String, regex: Regex },
    MinLength(usize),
    MaxLength(usize),
    In(Vec<Term>),
    HasValue(Term),
    Range { kind: RangeKind, bound: Literal },
    Node(Subject),
}

impl Constraint {
    fn component(&self) -> NamedNodeRef<'static> {
        match self {
            Constraint::Class(_) => sh::CLASS_CONSTRAINT_COMPONENT,
            Constraint::Datatype(_) => sh::DATATYPE_CONSTRAINT_COMPONENT,
            Constraint::NodeKind(_) => sh::NODE_KIND_CONSTRAINT_COMPONENT,
            Constraint::MinCount(_) => sh::MIN_COUNT_CONSTRAINT_COMPONENT,
            Constraint::MaxCount(_) => sh::MAX_COUNT_CONSTRAINT_COMPONENT,
            Constraint::Pattern { .. } => sh::PATTERN_CONSTRAINT_COMPONENT,
            Constraint::MinLength(_) => sh::MIN_LENGTH_CONSTRAINT_COMPONENT,
            Constraint::MaxLength(_) => sh::MAX_LENGTH_CONSTRAINT_COMPONENT,
            Constraint::In(_) => sh::IN_CONSTRAINT_COMPONENT,
            Constraint::HasValue(_) => sh::HAS_VALUE_CONSTRAINT_COMPONENT,
            Constraint::Range { kind, .. } => match kind {
                RangeKind::MinInclusive => sh::MIN_INCLUSIVE_CONSTRAINT_COMPONENT,
                RangeKind::MaxInclusive => sh::MAX_INCLUSIVE_CONSTRAINT_COMPONENT,
                RangeKind::MinExclusive => sh::MIN_EXCLUSIVE_CONSTRAINT_COMPONENT,
                RangeKind::MaxExclusive => sh::MAX_EXCLUSIVE_CONSTRAINT_COMPONENT,
            },
            Constraint::Node(_) => sh::NODE_CONSTRAINT_COMPONENT,
        }
    }

    /// Message used when the shape carries no `sh:message`.
    fn describe(&self) -> String {
        match self {
            Constraint::Class(class) => format!("Value does not have class {class}"),
            Constraint::Datatype(datatype) => {
                format!("Value is not a well-formed literal of datatype {datatype}")
            }
            Constraint::NodeKind(kind) => format!("Value is not of node kind {}", kind.iri()),
            Constraint::MinCount(min) => format!("Less than {min} values"),
            Constraint::MaxCount(max) => format!("More than {max} values"),
            Constraint::Pattern { pattern, .. } => {
                format!("Value does not match pattern \"{pattern}\"")
            }
            Constraint::MinLength(min) => format!("Value is shorter than {min} characters"),
            Constraint::MaxLength(max) => format!("Value is longer than {max} characters"),
            Constraint::In(_) => "Value is not in the list of allowed values".to_string(),
            Constraint::HasValue(expected) => format!("Missing expected value {expected}"),
            Constraint::Range { kind, bound } => {
                format!("Value is not {} {bound}", kind.symbol())
            }
            Constraint::Node(shape) => format!("Value does not conform to shape {shape}"),
        }
    }
}

#[derive(Debug, Clone)]
struct Shape {
    id: Subject,
    targets: Vec<Target>,
    path: Option<PropertyPath>,
    constraints: Vec<Constraint>,
    properties: Vec<Subject>,
    severity: Severity,
    message: Option<String>,
    deactivated: bool,
}

impl Shape {
    fn focus_nodes(&self, data: &Graph) -> Vec<Term> {
        let mut seen = HashSet::new();
        self.targets
            .iter()
            .flat_map(|target| target.focus_nodes(data))
            .filter(|node| seen.insert(node.clone()))
            .collect()
    }
}

fn named(object: TermRef<'_>, shape: &Subject, predicate: NamedNodeRef<'_>) -> Result<NamedNode> {
    match object {
        TermRef::NamedNode(n) => Ok(n.into_owned()),
        other => Err(Error::Shape(format!(
            "{predicate} on {shape} expects an IRI, found {other}"
        ))),
    }
}

fn literal(object: TermRef<'_>, shape: &Subject, predicate: NamedNodeRef<'_>) -> Result<Literal> {
    match object {
        TermRef::Literal(l) => Ok(l.into_owned()),
        other => Err(Error::Shape(format!(
            "{predicate} on {shape} expects a literal, found {other}"
        ))),
    }
}

fn count(object: TermRef<'_>, shape: &Subject, predicate: NamedNodeRef<'_>) -> Result<usize> {
    let value = literal(object, shape, predicate)?;
    value.value().parse().map_err(|_| {
        Error::Shape(format!(
            "{predicate} on {shape} expects a non-negative integer, found {value}"
        ))
    })
}

fn build_regex(pattern: &str, flags: &str) -> Result<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            's' => builder.dot_matches_new_line(true),
            'm' => builder.multi_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(Error::Shape(format!("unsupported regex flag '{other}'"))),
        };
    }
    builder
        .build()
        .map_err(|e| Error::Shape(format!("invalid pattern \"{pattern}\": {e}")))
}

fn read_list(sg: &Graph, head: TermRef<'_>) -> Result<Vec<Term>> {
    let nil = Term::from(rdf::NIL.into_owned());
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut current = head.into_owned();
    while current != nil {
        if !seen.insert(current.clone()) {
            return Err(Error::Shape(format!("RDF list at {current} is cyclic")));
        }
        let node = as_subject(&current)
            .ok_or_else(|| Error::Shape(format!("RDF list node {current} is a literal")))?;
        let first = sg
            .object_for_subject_predicate(node, rdf::FIRST)
            .ok_or_else(|| Error::Shape(format!("RDF list node {current} has no rdf:first")))?
            .into_owned();
        let rest = sg
            .object_for_subject_predicate(node, rdf::REST)
            .ok_or_else(|| Error::Shape(format!("RDF list node {current} has no rdf:rest")))?
            .into_owned();
        items.push(first);
        current = rest;
    }
    Ok(items)
}

fn parse_path(sg: &Graph, object: TermRef<'_>, shape: &Subject) -> Result<PropertyPath> {
    match object {
        TermRef::NamedNode(p) => Ok(PropertyPath::Predicate(p.into_owned())),
        TermRef::BlankNode(b) => match sg.object_for_subject_predicate(b, sh::INVERSE_PATH) {
            Some(TermRef::NamedNode(p)) => Ok(PropertyPath::Inverse(p.into_owned())),
            _ => Err(Error::Shape(format!(
                "unsupported path on {shape}: only predicates and sh:inversePath are handled"
            ))),
        },
        other => Err(Error::Shape(format!("invalid path {other} on {shape}"))),
    }
}

fn parse_shape(sg: &Graph, id: &Subject) -> Result<Shape> {
    let mut shape = Shape {
        id: id.clone(),
        targets: Vec::new(),
        path: None,
        constraints: Vec::new(),
        properties: Vec::new(),
        severity: Severity::Violation,
        message: None,
        deactivated: false,
    };
    let class_term = TermRef::from(rdfs::CLASS);

    for triple in sg.triples_for_subject(id) {
        let (p, o) = (triple.predicate, triple.object);
        if p == rdf::TYPE && o == class_term {
            shape.targets.push(Target::Class(subject_to_term(id.as_ref())));
        } else if p == sh::TARGET_CLASS {
            shape.targets.push(Target::Class(o.into_owned()));
        } else if p == sh::TARGET_NODE {
            shape.targets.push(Target::Node(o.into_owned()));
        } else if p == sh::TARGET_SUBJECTS_OF {
            shape.targets.push(Target::SubjectsOf(named(o, id, p)?));
        } else if p == sh::TARGET_OBJECTS_OF {
            shape.targets.push(Target::ObjectsOf(named(o, id, p)?));
        } else if p == sh::PATH {
            shape.path = Some(parse_path(sg, o, id)?);
        } else if p == sh::PROPERTY {
            let property = term_to_subject(&o.into_owned())
                .ok_or_else(|| Error::Shape(format!("sh:property on {id} must be a node")))?;
            shape.properties.push(property);
        } else if p == sh::DEACTIVATED {
            shape.deactivated = matches!(o, TermRef::Literal(l) if matches!(l.value(), "true" | "1"));
        } else if p == sh::SEVERITY {
            shape.severity = Severity::from_term(o);
        } else if p == sh::MESSAGE {
            if shape.message.is_none() {
                shape.message = Some(match o {
                    TermRef::Literal(l) => l.value().to_string(),
                    other => other.to_string(),
                });
            }
        } else if p == sh::CLASS {
            shape.constraints.push(Constraint::Class(o.into_owned()));
        } else if p == sh::DATATYPE {
            shape.constraints.push(Constraint::Datatype(named(o, id, p)?));
        } else if p == sh::NODE_KIND {
            let iri = named(o, id, p)?;
            let kind = NodeKind::from_iri(iri.as_ref())
                .ok_or_else(|| Error::Shape(format!("unknown node kind {iri} on {id}")))?;
            shape.constraints.push(Constraint::NodeKind(kind));
        } else if p == sh::MIN_COUNT {
            shape.constraints.push(Constraint::MinCount(count(o, id, p)?));
        } else if p == sh::MAX_COUNT {
            shape.constraints.push(Constraint::MaxCount(count(o, id, p)?));
        } else if p == sh::PATTERN {
            let pattern = literal(o, id, p)?.value().to_string();
            let flags = match sg.object_for_subject_predicate(id, sh::FLAGS) {
                Some(TermRef::Literal(l)) => l.value().to_string(),
                _ => String::new(),
            };
            let regex = build_regex(&pattern, &flags)?;
            shape.constraints.push(Constraint::Pattern { pattern, regex });
        } else if p == sh::MIN_LENGTH {
            shape.constraints.push(Constraint::MinLength(count(o, id, p)?));
        } else if p == sh::MAX_LENGTH {
            shape.constraints.push(Constraint::MaxLength(count(o, id, p)?));
        } else if p == sh::IN {
            shape.constraints.push(Constraint::In(read_list(sg, o)?));
        } else if p == sh::HAS_VALUE {
            shape.constraints.push(Constraint::HasValue(o.into_owned()));
        } else if let Some(kind) = range_kind(p) {
            let bound = literal(o, id, p)?;
            shape.constraints.push(Constraint::Range { kind, bound });
        } else if p == sh::NODE {
            let target = term_to_subject(&o.into_owned())
                .ok_or_else(|| Error::Shape(format!("sh:node on {id} must be a node")))?;
            shape.constraints.push(Constraint::Node(target));
        }
    }
    Ok(shape)
}

fn range_kind(predicate: NamedNodeRef<'_>) -> Option<RangeKind> {
    if predicate == sh::MIN_INCLUSIVE {
        Some(RangeKind::MinInclusive)
    } else if predicate == sh::MAX_INCLUSIVE {
        Some(RangeKind::MaxInclusive)
    } else if predicate == sh::MIN_EXCLUSIVE {
        Some(RangeKind::MinExclusive)
    } else if predicate == sh::MAX_EXCLUSIVE {
        Some(RangeKind::MaxExclusive)
    } else {
        None
    }
}

/// Every node that plays the role of a shape in `sg`, in discovery order.
fn shape_ids(sg: &Graph) -> Vec<Subject> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut push = |subject: Subject| {
        if seen.insert(subject.clone()) {
            ids.push(subject);
        }
    };

    for class in [sh::NODE_SHAPE, sh::PROPERTY_SHAPE] {
        for subject in sg.subjects_for_predicate_object(rdf::TYPE, class) {
            push(subject.into_owned());
        }
    }
    for predicate in [
        sh::TARGET_CLASS,
        sh::TARGET_NODE,
        sh::TARGET_SUBJECTS_OF,
        sh::TARGET_OBJECTS_OF,
        sh::PATH,
    ] {
        for triple in sg.triples_for_predicate(predicate) {
            push(triple.subject.into_owned());
        }
    }
    for predicate in [sh::PROPERTY, sh::NODE] {
        for triple in sg.triples_for_predicate(predicate) {
            if let Some(subject) = term_to_subject(&triple.object.into_owned()) {
                push(subject);
            }
        }
    }
    ids
}

/// A compiled shapes graph.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    shapes: Vec<Shape>,
    index: HashMap<Subject, usize>,
    ontology: Option<Graph>,
}

impl Validator {
    pub fn from_graph(shapes_graph: &Graph) -> Result<Self> {
        let mut validator = Validator::default();
        for id in shape_ids(shapes_graph) {
            let shape = parse_shape(shapes_graph, &id)?;
            validator.index.insert(id, validator.shapes.len());
            validator.shapes.push(shape);
        }
        debug!(shapes = validator.shapes.len(), "Compiled shapes graph");
        Ok(validator)
    }

    /// Parse and union several Turtle shape documents.
    pub fn from_turtle<S: AsRef<str>>(documents: &[S]) -> Result<Self> {
        let graphs = documents
            .iter()
            .map(|doc| parse_turtle(doc.as_ref(), None))
            .collect::<Result<Vec<_>>>()?;
        Self::from_graph(&merge_graphs(&graphs))
    }

    /// Mix `ontology` into every data graph before inference.
    pub fn with_ontology(mut self, ontology: Graph) -> Self {
        self.ontology = Some(ontology);
        self
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    fn shape(&self, id: &Subject) -> Option<&Shape> {
        self.index.get(id).map(|&i| &self.shapes[i])
    }

    pub fn validate(&self, data: &Graph) -> ValidationReport {
        let closed = match &self.ontology {
            Some(ontology) => rdfs_closure(&merge_graphs([data, ontology])),
            None => rdfs_closure(data),
        };

        let mut run = Run::new(self, &closed);
        for shape in &self.shapes {
            if shape.deactivated {
                debug!(shape = %shape.id, "Skipping deactivated shape");
                continue;
            }
            for focus in shape.focus_nodes(&closed) {
                run.check_shape(shape, &focus, 0);
            }
        }

        let report = ValidationReport::new(run.results);
        info!(
            conforms = report.conforms,
            results = report.results.len(),
            triples = closed.len(),
            "[VALIDATE] Validation finished"
        );
        report
    }
}

/// One validation pass over a closed data graph.
struct Run<'a> {
    validator: &'a Validator,
    data: &'a Graph,
    results: Vec<ValidationResult>,
    /// `(shape, focus)` pairs already checked in this pass.
    visited: HashSet<(Subject, Term)>,
}

impl<'a> Run<'a> {
    fn new(validator: &'a Validator, data: &'a Graph) -> Self {
        Self {
            validator,
            data,
            results: Vec::new(),
            visited: HashSet::new(),
        }
    }

    fn check_shape(&mut self, shape: &Shape, focus: &Term, depth: usize) {
        if shape.deactivated {
            return;
        }
        // Recursive sh:property chains over cyclic data revisit the same pair.
        if !self.visited.insert((shape.id.clone(), focus.clone())) {
            debug!(shape = %shape.id, focus = %focus, "Shape already checked for focus node");
            return;
        }
        let values = match &shape.path {
            Some(path) => path.values(self.data, focus),
            None => vec![focus.clone()],
        };
        for constraint in &shape.constraints {
            self.check_constraint(shape, constraint, focus, &values, depth);
        }

        let validator = self.validator;
        for id in &shape.properties {
            let Some(property) = validator.shape(id) else {
                warn!(shape = %id, "sh:property references an unknown shape");
                continue;
            };
            for value in &values {
                self.check_shape(property, value, depth);
            }
        }
    }

    fn check_constraint(
        &mut self,
        shape: &Shape,
        constraint: &Constraint,
        focus: &Term,
        values: &[Term],
        depth: usize,
    ) {
        match constraint {
            Constraint::MinCount(min) => {
                if values.len() < *min {
                    self.push(shape, constraint, focus, None);
                }
            }
            Constraint::MaxCount(max) => {
                if values.len() > *max {
                    self.push(shape, constraint, focus, None);
                }
            }
            Constraint::HasValue(expected) => {
                if !values.contains(expected) {
                    self.push(shape, constraint, focus, None);
                }
            }
            _ => {
                for value in values {
                    if !self.value_conforms(constraint, value, depth) {
                        self.push(shape, constraint, focus, Some(value));
                    }
                }
            }
        }
    }

    fn value_conforms(&self, constraint: &Constraint, value: &Term, depth: usize) -> bool {
        match constraint {
            Constraint::Class(class) => as_subject(value).is_some_and(|subject| {
                self.data
                    .contains(TripleRef::new(subject, rdf::TYPE, class.as_ref()))
            }),
            Constraint::Datatype(datatype) => matches!(
                value,
                Term::Literal(l) if l.datatype() == datatype.as_ref() && well_formed(l)
            ),
            Constraint::NodeKind(kind) => kind.matches(value),
            Constraint::Pattern { regex, .. } => {
                lexical_form(value).is_some_and(|text| regex.is_match(text))
            }
            Constraint::MinLength(min) => {
                lexical_form(value).is_some_and(|text| text.chars().count() >= *min)
            }
            Constraint::MaxLength(max) => {
                lexical_form(value).is_some_and(|text| text.chars().count() <= *max)
            }
            Constraint::In(allowed) => allowed.contains(value),
            Constraint::Range { kind, bound } => {
                compare(value, bound).is_some_and(|ordering| kind.accepts(ordering))
            }
            Constraint::Node(id) => self.conforms_to(id, value, depth + 1),
            Constraint::MinCount(_) | Constraint::MaxCount(_) | Constraint::HasValue(_) => true,
        }
    }

    fn conforms_to(&self, id: &Subject, value: &Term, depth: usize) -> bool {
        if depth > MAX_NODE_DEPTH {
            warn!(shape = %id, depth, "sh:node nesting too deep, assuming conformance");
            return true;
        }
        let Some(shape) = self.validator.shape(id) else {
            warn!(shape = %id, "sh:node references an unknown shape");
            return true;
        };
        let mut nested = Run::new(self.validator, self.data);
        nested.check_shape(shape, value, depth);
        nested.results.is_empty()
    }

    fn push(&mut self, shape: &Shape, constraint: &Constraint, focus: &Term, value: Option<&Term>) {
        self.results.push(ValidationResult {
            focus_node: focus.clone(),
            result_path: shape.path.clone(),
            value: value.cloned(),
            source_shape: shape.id.clone(),
            component: constraint.component().into_owned(),
            severity: shape.severity,
            message: shape
                .message
                .clone()
                .unwrap_or_else(|| constraint.describe()),
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub focus_node: Term,
    pub result_path: Option<PropertyPath>,
    pub value: Option<Term>,
    pub source_shape: Subject,
    pub component: NamedNode,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.focus_node)?;
        if let Some(path) = &self.result_path {
            write!(f, " {path}")?;
        }
        if let Some(value) = &self.value {
            write!(f, " = {value}")?;
        }
        write!(f, ": {} ({})", self.message, self.component)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub conforms: bool,
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    pub fn new(results: Vec<ValidationResult>) -> Self {
        Self {
            conforms: results.is_empty(),
            results,
        }
    }

    /// The report as a `sh:ValidationReport` graph.
    pub fn to_graph(&self) -> OrderedGraph {
        let mut graph = OrderedGraph::new();
        let report = BlankNode::default();
        graph.add(report.clone(), rdf::TYPE, sh::VALIDATION_REPORT.into_owned());
        graph.add(report.clone(), sh::CONFORMS, Literal::from(self.conforms));

        for result in &self.results {
            let node = BlankNode::default();
            graph.add(report.clone(), sh::RESULT, node.clone());
            graph.add(node.clone(), rdf::TYPE, sh::VALIDATION_RESULT.into_owned());
            graph.add(node.clone(), sh::FOCUS_NODE, result.focus_node.clone());
            match &result.result_path {
                Some(PropertyPath::Predicate(p)) => {
                    graph.add(node.clone(), sh::RESULT_PATH, p.clone());
                }
                Some(PropertyPath::Inverse(p)) => {
                    let path = BlankNode::default();
                    graph.add(node.clone(), sh::RESULT_PATH, path.clone());
                    graph.add(path, sh::INVERSE_PATH, p.clone());
                }
                None => {}
            }
            if let Some(value) = &result.value {
                graph.add(node.clone(), sh::VALUE, value.clone());
            }
            graph.add(
                node.clone(),
                sh::RESULT_SEVERITY,
                result.severity.iri().into_owned(),
            );
            graph.add(
                node.clone(),
                sh::SOURCE_CONSTRAINT_COMPONENT,
                result.component.clone(),
            );
            graph.add(
                node.clone(),
                sh::SOURCE_SHAPE,
                subject_to_term(result.source_shape.as_ref()),
            );
            graph.add(
                node,
                sh::RESULT_MESSAGE,
                Literal::new_simple_literal(&result.message),
            );
        }
        graph
    }

    pub fn to_turtle(&self, base_iri: &str) -> Result<String> {
        self.to_graph().to_turtle(&standard_prefixes(base_iri))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Conforms: {}", self.conforms)?;
        for result in &self.results {
            writeln!(f, "{result}")?;
        }
        Ok(())
    }
}

/// A Turtle document plus the status it is delivered with: the data graph
/// (200, `data.ttl`) or a violation report (400, `error_report.ttl`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurtleArtifact {
    pub status: u16,
    pub filename: &'static str,
    pub content: String,
}

impl TurtleArtifact {
    pub fn data(content: String) -> Self {
        Self {
            status: 200,
            filename: DATA_FILENAME,
            content,
        }
    }

    pub fn report(content: String) -> Self {
        Self {
            status: 400,
            filename: REPORT_FILENAME,
            content,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Load and union `<rdf>/shapes/<id>.ttl` for each id.
pub fn load_shapes(files: &RdfFiles, ids: &[String]) -> Result<Validator> {
    let documents = ids
        .iter()
        .map(|id| files.shape(id))
        .collect::<Result<Vec<_>>>()?;
    let validator = Validator::from_turtle(&documents)?;
    info!(
        shape_ids = ?ids,
        shapes = validator.shape_count(),
        "[VALIDATE] Loaded shapes"
    );
    Ok(validator)
}
