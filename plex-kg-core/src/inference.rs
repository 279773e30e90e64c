//! RDFS entailment used before shape validation.
//!
//! Applies rdfs2, rdfs3, rdfs5, rdfs7, rdfs9 and rdfs11 until nothing new is
//! derived. Axiomatic triples and the rules about `rdfs:Resource`,
//! `rdfs:Literal` and containers are not materialized; they never change a
//! validation outcome.

use oxrdf::vocab::{rdf, rdfs};
use oxrdf::{Graph, NamedNode, NamedNodeRef, Subject, Term, Triple};
use tracing::debug;

use crate::rdf::{subject_to_term, term_to_subject};

/// Return a copy of `graph` closed under the RDFS rules listed above.
pub fn rdfs_closure(graph: &Graph) -> Graph {
    let mut closed = graph.clone();
    let mut rounds = 0;
    loop {
        rounds += 1;
        let derived: Vec<Triple> = derive(&closed)
            .into_iter()
            .filter(|t| !closed.contains(t))
            .collect();
        if derived.is_empty() {
            break;
        }
        for triple in &derived {
            closed.insert(triple);
        }
    }
    debug!(
        input = graph.len(),
        output = closed.len(),
        rounds,
        "RDFS closure computed"
    );
    closed
}

fn axioms(graph: &Graph, predicate: NamedNodeRef<'_>) -> Vec<(Subject, Term)> {
    graph
        .triples_for_predicate(predicate)
        .map(|t| (t.subject.into_owned(), t.object.into_owned()))
        .collect()
}

fn as_property(subject: &Subject) -> Option<NamedNode> {
    match subject {
        Subject::NamedNode(n) => Some(n.clone()),
        _ => None,
    }
}

fn derive(graph: &Graph) -> Vec<Triple> {
    let mut out = Vec::new();

    // rdfs2
    for (property, class) in axioms(graph, rdfs::DOMAIN) {
        let Some(property) = as_property(&property) else { continue };
        for t in graph.triples_for_predicate(&property) {
            out.push(Triple::new(t.subject.into_owned(), rdf::TYPE, class.clone()));
        }
    }

    // rdfs3
    for (property, class) in axioms(graph, rdfs::RANGE) {
        let Some(property) = as_property(&property) else { continue };
        for t in graph.triples_for_predicate(&property) {
            if let Some(object) = term_to_subject(&t.object.into_owned()) {
                out.push(Triple::new(object, rdf::TYPE, class.clone()));
            }
        }
    }

    let sub_properties = axioms(graph, rdfs::SUB_PROPERTY_OF);

    // rdfs5
    for (p, q) in &sub_properties {
        let Some(q) = term_to_subject(q) else { continue };
        for r in graph.objects_for_subject_predicate(&q, rdfs::SUB_PROPERTY_OF) {
            out.push(Triple::new(p.clone(), rdfs::SUB_PROPERTY_OF, r.into_owned()));
        }
    }

    // rdfs7
    for (p, q) in &sub_properties {
        let (Some(p), Term::NamedNode(q)) = (as_property(p), q) else { continue };
        for t in graph.triples_for_predicate(&p) {
            out.push(Triple::new(
                t.subject.into_owned(),
                q.clone(),
                t.object.into_owned(),
            ));
        }
    }

    let sub_classes = axioms(graph, rdfs::SUB_CLASS_OF);

    // rdfs9
    for (c, d) in &sub_classes {
        let c = subject_to_term(c.as_ref());
        for x in graph.subjects_for_predicate_object(rdf::TYPE, &c) {
            out.push(Triple::new(x.into_owned(), rdf::TYPE, d.clone()));
        }
    }

    // rdfs11
    for (c, d) in &sub_classes {
        let Some(d) = term_to_subject(d) else { continue };
        for e in graph.objects_for_subject_predicate(&d, rdfs::SUB_CLASS_OF) {
            out.push(Triple::new(c.clone(), rdfs::SUB_CLASS_OF, e.into_owned()));
        }
    }

    out
}
