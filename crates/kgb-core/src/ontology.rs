//! Ontology loading and rendering
//!
//! The ontology is parsed from Turtle into an owned, ordered triple set. It
//! can be rendered back to Turtle or described in prose for the prompt; which
//! one is used is an explicit [`OntologyFormat`] choice.

use oxiri::Iri;
use rio_api::formatter::TriplesFormatter;
use rio_api::model as rio;
use rio_api::parser::TriplesParser;
use rio_turtle::{TurtleError, TurtleFormatter, TurtleParser};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, instrument, warn};

use crate::models::OntologyFormat;
use crate::{KgbError, Result};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDF_PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";
const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
const RDFS_LITERAL: &str = "http://www.w3.org/2000/01/rdf-schema#Literal";
const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Subject position: IRI or blank node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Node {
    /// Named node
    Iri(String),
    /// Blank node label
    Blank(String),
}

/// RDF literal
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    /// Lexical value
    pub value: String,
    /// Datatype IRI, for typed literals
    pub datatype: Option<String>,
    /// Language tag, for language-tagged strings
    pub language: Option<String>,
}

/// Object position
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    /// Named node
    Iri(String),
    /// Blank node label
    Blank(String),
    /// Literal value
    Literal(Literal),
}

/// Owned subject-predicate-object statement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Subject
    pub subject: Node,
    /// Predicate IRI
    pub predicate: String,
    /// Object
    pub object: Term,
}

impl Triple {
    fn from_rio(triple: &rio::Triple<'_>) -> Option<Self> {
        let subject = match triple.subject {
            rio::Subject::NamedNode(n) => Node::Iri(n.iri.to_string()),
            rio::Subject::BlankNode(b) => Node::Blank(b.id.to_string()),
            rio::Subject::Triple(_) => return None,
        };

        let object = match triple.object {
            rio::Term::NamedNode(n) => Term::Iri(n.iri.to_string()),
            rio::Term::BlankNode(b) => Term::Blank(b.id.to_string()),
            rio::Term::Literal(l) => Term::Literal(match l {
                rio::Literal::Simple { value } => Literal {
                    value: value.to_string(),
                    datatype: None,
                    language: None,
                },
                rio::Literal::LanguageTaggedString { value, language } => Literal {
                    value: value.to_string(),
                    datatype: None,
                    language: Some(language.to_string()),
                },
                rio::Literal::Typed { value, datatype } => Literal {
                    value: value.to_string(),
                    datatype: Some(datatype.iri.to_string()),
                    language: None,
                },
            }),
            rio::Term::Triple(_) => return None,
        };

        Some(Self {
            subject,
            predicate: triple.predicate.iri.to_string(),
            object,
        })
    }

    fn rio_subject(&self) -> rio::Subject<'_> {
        match &self.subject {
            Node::Iri(iri) => rio::Subject::NamedNode(rio::NamedNode { iri }),
            Node::Blank(id) => rio::Subject::BlankNode(rio::BlankNode { id }),
        }
    }

    fn rio_object(&self) -> rio::Term<'_> {
        match &self.object {
            Term::Iri(iri) => rio::Term::NamedNode(rio::NamedNode { iri }),
            Term::Blank(id) => rio::Term::BlankNode(rio::BlankNode { id }),
            Term::Literal(lit) => rio::Term::Literal(match (&lit.datatype, &lit.language) {
                (_, Some(language)) => rio::Literal::LanguageTaggedString {
                    value: &lit.value,
                    language,
                },
                (Some(datatype), None) => rio::Literal::Typed {
                    value: &lit.value,
                    datatype: rio::NamedNode { iri: datatype },
                },
                (None, None) => rio::Literal::Simple { value: &lit.value },
            }),
        }
    }
}

/// In-memory ontology graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OntologyGraph {
    triples: BTreeSet<Triple>,
}

impl OntologyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a Turtle file
    #[instrument]
    pub async fn load(path: &Path, base_iri: Option<&str>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => KgbError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => KgbError::Io(e),
        })?;

        let graph = Self::parse_turtle(&text, base_iri)?;
        debug!("Loaded {} triples from {}", graph.len(), path.display());
        Ok(graph)
    }

    /// Parse Turtle text
    ///
    /// RDF-star quoted triples are skipped with a warning.
    pub fn parse_turtle(text: &str, base_iri: Option<&str>) -> Result<Self> {
        let base = base_iri
            .map(|b| Iri::parse(b.to_string()))
            .transpose()
            .map_err(|e| KgbError::OntologyParse(format!("invalid base IRI: {e}")))?;

        let mut parser = TurtleParser::new(text.as_bytes(), base);
        let mut triples = BTreeSet::new();
        let mut skipped = 0usize;

        parser
            .parse_all(&mut |t| {
                match Triple::from_rio(&t) {
                    Some(triple) => {
                        triples.insert(triple);
                    }
                    None => skipped += 1,
                }
                Ok(()) as std::result::Result<(), TurtleError>
            })
            .map_err(|e| KgbError::OntologyParse(e.to_string()))?;

        if skipped > 0 {
            warn!("Skipped {} quoted triples", skipped);
        }

        Ok(Self { triples })
    }

    /// Add a triple, returning false if it was already present
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    /// Number of triples
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Whether the graph holds no triples
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Iterate over the triples in a stable order
    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Render the graph with the chosen strategy
    pub fn render(&self, format: OntologyFormat) -> Result<String> {
        match format {
            OntologyFormat::Turtle => self.to_turtle(),
            OntologyFormat::NaturalLanguage => Ok(self.to_natural_language()),
        }
    }

    /// Serialize as Turtle
    pub fn to_turtle(&self) -> Result<String> {
        let mut formatter = TurtleFormatter::new(Vec::new());
        for triple in &self.triples {
            formatter.format(&rio::Triple {
                subject: triple.rio_subject(),
                predicate: rio::NamedNode {
                    iri: &triple.predicate,
                },
                object: triple.rio_object(),
            })?;
        }
        let buf = formatter.finish()?;
        String::from_utf8(buf).map_err(|e| KgbError::Serialization(e.to_string()))
    }

    /// Describe classes, attributes and relationships in prose
    pub fn to_natural_language(&self) -> String {
        let classes = self.named_subjects_of_type(&[OWL_CLASS, RDFS_CLASS]);
        let mut attributes = Vec::new();
        let mut relationships = Vec::new();

        for property in self.named_subjects_of_type(&[
            OWL_OBJECT_PROPERTY,
            OWL_DATATYPE_PROPERTY,
            RDF_PROPERTY,
        ]) {
            if self.has_type(property, OWL_DATATYPE_PROPERTY) {
                attributes.push(property);
            } else if self.has_type(property, OWL_OBJECT_PROPERTY) {
                relationships.push(property);
            } else if self
                .iri_objects(property, RDFS_RANGE)
                .into_iter()
                .any(is_literal_type)
            {
                attributes.push(property);
            } else {
                relationships.push(property);
            }
        }

        let mut out = String::new();

        if !classes.is_empty() {
            out.push_str("Node categories (labels):\n");
            for class in &classes {
                out.push_str(&format!("- {}", self.label(class)));
                if let Some(comment) = self.comment(class) {
                    out.push_str(&format!(": {}", comment));
                }
                out.push('\n');
            }
        }

        if !attributes.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Attributes:\n");
            for attribute in &attributes {
                out.push_str(&format!(
                    "- {}: applies to {}, value of type {}.",
                    self.label(attribute),
                    self.describe_targets(attribute, RDFS_DOMAIN, "any node"),
                    self.describe_targets(attribute, RDFS_RANGE, "text"),
                ));
                if let Some(comment) = self.comment(attribute) {
                    out.push_str(&format!(" {}", comment));
                }
                out.push('\n');
            }
        }

        if !relationships.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Relationships:\n");
            for relationship in &relationships {
                out.push_str(&format!(
                    "- {}: connects {} to {}.",
                    self.label(relationship),
                    self.describe_targets(relationship, RDFS_DOMAIN, "any node"),
                    self.describe_targets(relationship, RDFS_RANGE, "any node"),
                ));
                if let Some(comment) = self.comment(relationship) {
                    out.push_str(&format!(" {}", comment));
                }
                out.push('\n');
            }
        }

        out
    }

    fn objects<'a>(&'a self, subject: &str, predicate: &str) -> Vec<&'a Term> {
        self.triples
            .iter()
            .filter(|t| {
                t.predicate == predicate && matches!(&t.subject, Node::Iri(iri) if iri == subject)
            })
            .map(|t| &t.object)
            .collect()
    }

    fn iri_objects<'a>(&'a self, subject: &str, predicate: &str) -> Vec<&'a str> {
        self.objects(subject, predicate)
            .into_iter()
            .filter_map(|o| match o {
                Term::Iri(iri) => Some(iri.as_str()),
                _ => None,
            })
            .collect()
    }

    fn has_type(&self, subject: &str, type_iri: &str) -> bool {
        self.iri_objects(subject, RDF_TYPE).contains(&type_iri)
    }

    fn named_subjects_of_type(&self, types: &[&str]) -> Vec<&str> {
        let found: BTreeSet<&str> = self
            .triples
            .iter()
            .filter(|t| {
                t.predicate == RDF_TYPE
                    && matches!(&t.object, Term::Iri(iri) if types.contains(&iri.as_str()))
            })
            .filter_map(|t| match &t.subject {
                Node::Iri(iri) => Some(iri.as_str()),
                Node::Blank(_) => None,
            })
            .collect();
        found.into_iter().collect()
    }

    fn literal(&self, subject: &str, predicate: &str) -> Option<&str> {
        let literals: Vec<&Literal> = self
            .objects(subject, predicate)
            .into_iter()
            .filter_map(|o| match o {
                Term::Literal(l) => Some(l),
                _ => None,
            })
            .collect();

        literals
            .iter()
            .copied()
            .find(|l| l.language.as_deref().map_or(true, |lang| lang.starts_with("en")))
            .or_else(|| literals.first().copied())
            .map(|l| l.value.as_str())
    }

    fn label<'a>(&'a self, iri: &'a str) -> &'a str {
        self.literal(iri, RDFS_LABEL).unwrap_or_else(|| local_name(iri))
    }

    fn comment(&self, iri: &str) -> Option<&str> {
        self.literal(iri, RDFS_COMMENT)
    }

    fn describe_targets(&self, property: &str, predicate: &str, fallback: &str) -> String {
        let names: Vec<&str> = self
            .iri_objects(property, predicate)
            .into_iter()
            .map(|iri| {
                if is_literal_type(iri) {
                    local_name(iri)
                } else {
                    self.label(iri)
                }
            })
            .collect();

        if names.is_empty() {
            fallback.to_string()
        } else {
            names.join(" or ")
        }
    }
}

fn is_literal_type(iri: &str) -> bool {
    iri.starts_with(XSD_NS) || iri == RDFS_LITERAL
}

/// Fragment or last path segment of an IRI
fn local_name(iri: &str) -> &str {
    iri.rsplit(['#', '/'])
        .find(|s| !s.is_empty())
        .unwrap_or(iri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ART: &str = include_str!("../tests/fixtures/art.ttl");

    #[test]
    fn test_parse_fixture() {
        let graph = OntologyGraph::parse_turtle(ART, None).expect("parse");
        assert_eq!(graph.len(), 15);
    }

    #[test]
    fn test_turtle_round_trip_keeps_triples() {
        let graph = OntologyGraph::parse_turtle(ART, None).expect("parse");
        let serialized = graph.to_turtle().expect("serialize");
        let reparsed = OntologyGraph::parse_turtle(&serialized, None).expect("reparse");
        assert_eq!(graph, reparsed);
    }

    #[test]
    fn test_round_trip_keeps_literal_kinds() {
        let ttl = r#"
            <http://example.org/a> <http://example.org/p> "plain" .
            <http://example.org/a> <http://example.org/p> "hallo"@de .
            <http://example.org/a> <http://example.org/p> "42"^^<http://www.w3.org/2001/XMLSchema#integer> .
        "#;
        let graph = OntologyGraph::parse_turtle(ttl, None).expect("parse");
        let reparsed =
            OntologyGraph::parse_turtle(&graph.to_turtle().expect("serialize"), None).expect("reparse");
        assert_eq!(graph, reparsed);
        assert_eq!(reparsed.len(), 3);
    }

    #[test]
    fn test_natural_language_description() {
        let graph = OntologyGraph::parse_turtle(ART, None).expect("parse");
        let text = graph.to_natural_language();

        let expected = "\
Node categories (labels):
- Painting
- Person: A human being.

Attributes:
- name: applies to Person, value of type string.
- title: applies to Painting, value of type string.

Relationships:
- painted: connects Person to Painting.
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_rdf_property_classified_by_range() {
        let ttl = r#"
            @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
            @prefix ex: <http://example.org/> .
            ex:age a rdf:Property ; rdfs:range rdfs:Literal .
            ex:knows a rdf:Property ; rdfs:range ex:Person .
        "#;
        let graph = OntologyGraph::parse_turtle(ttl, None).expect("parse");
        let text = graph.to_natural_language();
        assert!(text.contains("Attributes:\n- age: applies to any node, value of type Literal."));
        assert!(text.contains("Relationships:\n- knows: connects any node to Person."));
    }

    #[test]
    fn test_render_selects_strategy() {
        let graph = OntologyGraph::parse_turtle(ART, None).expect("parse");
        let turtle = graph.render(OntologyFormat::Turtle).expect("turtle");
        let prose = graph.render(OntologyFormat::NaturalLanguage).expect("prose");
        assert!(turtle.contains("<http://example.org/art#painted>"));
        assert!(prose.starts_with("Node categories"));
    }

    #[test]
    fn test_invalid_turtle_is_reported() {
        let err = OntologyGraph::parse_turtle("<http://a> <http://b> ", None).unwrap_err();
        assert!(matches!(err, KgbError::OntologyParse(_)));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://example.org/art#Person"), "Person");
        assert_eq!(local_name("http://example.org/art/Painting"), "Painting");
        assert_eq!(local_name("http://example.org/art/"), "art");
    }
}
