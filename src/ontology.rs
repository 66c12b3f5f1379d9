//! Ontology bootstrap: the class/property vocabulary of the fact graph.
//!
//! The schema is a TOML document of `[[classes]]` and `[[properties]]`. One is
//! bundled into the binary; an external file can replace it. If the external
//! file is unreadable or invalid the engine falls back to a minimal built-in
//! schema covering the core classes, so it is always usable. Schema triples are
//! written to the base graph once and never mutated afterwards.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::OntologyError;
use crate::graph::{Iri, Literal, Triple};
use crate::vocab::{self, standard};

const BUNDLED_TOML: &str = include_str!("../data/ontology.toml");

/// Where the active schema came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OntologySource {
    /// Bundled into the binary via `include_str!`.
    Bundled,
    /// Loaded from an external file.
    External(PathBuf),
    /// Built-in fallback after a failed load.
    Minimal,
}

/// Datatype or object property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    #[default]
    Datatype,
    Object,
}

/// A class declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Superclass (`rdfs:subClassOf`).
    #[serde(default)]
    pub parent: Option<String>,
}

/// A property declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(default)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub domain: Option<String>,
    /// XSD local name for datatype properties, class name for object properties.
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OntologyToml {
    ontology: OntologyMeta,
    #[serde(default)]
    classes: Vec<ClassDecl>,
    #[serde(default)]
    properties: Vec<PropertyDecl>,
}

#[derive(Debug, Deserialize)]
struct OntologyMeta {
    name: String,
    version: String,
}

/// The loaded schema.
#[derive(Debug, Clone)]
pub struct Ontology {
    pub name: String,
    pub version: String,
    pub source: OntologySource,
    pub classes: Vec<ClassDecl>,
    pub properties: Vec<PropertyDecl>,
}

impl Ontology {
    /// Parse a TOML schema.
    pub fn parse(toml_str: &str, source: OntologySource) -> Result<Self, OntologyError> {
        let source_name = match &source {
            OntologySource::External(path) => path.display().to_string(),
            OntologySource::Bundled => "bundled".to_string(),
            OntologySource::Minimal => "minimal".to_string(),
        };
        let parsed: OntologyToml = toml::from_str(toml_str).map_err(|e| OntologyError::Parse {
            source_name: source_name.clone(),
            message: e.to_string(),
        })?;
        let ontology = Self {
            name: parsed.ontology.name,
            version: parsed.ontology.version,
            source,
            classes: parsed.classes,
            properties: parsed.properties,
        };
        for core in vocab::CORE_CLASSES {
            if !ontology.has_class(core) {
                return Err(OntologyError::MissingCoreClass {
                    source_name,
                    class: core.to_string(),
                });
            }
        }
        Ok(ontology)
    }

    /// The schema bundled into the binary.
    pub fn bundled() -> Result<Self, OntologyError> {
        Self::parse(BUNDLED_TOML, OntologySource::Bundled)
    }

    /// Load a schema from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, OntologyError> {
        let content = std::fs::read_to_string(path).map_err(|e| OntologyError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, OntologySource::External(path.to_path_buf()))
    }

    /// Minimal built-in schema: core classes and their link properties.
    pub fn minimal() -> Self {
        let classes = vocab::CORE_CLASSES
            .iter()
            .map(|name| ClassDecl {
                name: name.to_string(),
                label: None,
                comment: None,
                parent: None,
            })
            .collect();
        let link = |name: &str, domain: &str, range: &str| PropertyDecl {
            name: name.to_string(),
            kind: PropertyKind::Object,
            domain: Some(domain.to_string()),
            range: Some(range.to_string()),
            comment: None,
        };
        Self {
            name: "smartplay-minimal".into(),
            version: "0".into(),
            source: OntologySource::Minimal,
            classes,
            properties: vec![
                link(vocab::PLAYS_FOR, vocab::PLAYER, vocab::TEAM),
                link(vocab::HAS_SCORE, vocab::PLAYER, vocab::SMARTPLAY_SCORE),
                link(vocab::HAS_INJURY, vocab::PLAYER, vocab::INJURY_EVENT),
                link(vocab::HOME_TEAM, vocab::FIXTURE, vocab::TEAM),
                link(vocab::AWAY_TEAM, vocab::FIXTURE, vocab::TEAM),
            ],
        }
    }

    /// Resolve the schema to bootstrap with: the external file if configured,
    /// otherwise the bundled one; any failure falls back to [`Ontology::minimal`].
    pub fn load(path: Option<&Path>) -> Self {
        let loaded = match path {
            Some(path) => Self::from_path(path),
            None => Self::bundled(),
        };
        match loaded {
            Ok(ontology) => {
                tracing::info!(
                    name = %ontology.name,
                    version = %ontology.version,
                    classes = ontology.classes.len(),
                    properties = ontology.properties.len(),
                    "ontology loaded"
                );
                ontology
            }
            Err(e) => {
                tracing::warn!(error = %e, "ontology load failed, falling back to minimal schema");
                Self::minimal()
            }
        }
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c.name == name)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Schema declarations as base-graph triples.
    pub fn triples(&self) -> Vec<Triple> {
        let rdf_type = vocab::rdf_type();
        let label = Iri::new_unchecked(standard::RDFS_LABEL);
        let comment = Iri::new_unchecked(standard::RDFS_COMMENT);
        let mut triples = Vec::new();

        for class in &self.classes {
            let iri = vocab::sp(&class.name);
            triples.push(Triple::new(
                iri.clone(),
                rdf_type.clone(),
                Iri::new_unchecked(standard::OWL_CLASS),
            ));
            let text = class.label.clone().unwrap_or_else(|| class.name.clone());
            triples.push(Triple::new(iri.clone(), label.clone(), Literal::String(text)));
            if let Some(c) = &class.comment {
                triples.push(Triple::new(iri.clone(), comment.clone(), Literal::String(c.clone())));
            }
            if let Some(parent) = &class.parent {
                triples.push(Triple::new(
                    iri,
                    Iri::new_unchecked(standard::RDFS_SUBCLASS_OF),
                    vocab::sp(parent),
                ));
            }
        }

        for property in &self.properties {
            let iri = vocab::sp(&property.name);
            let kind = match property.kind {
                PropertyKind::Datatype => standard::OWL_DATATYPE_PROPERTY,
                PropertyKind::Object => standard::OWL_OBJECT_PROPERTY,
            };
            triples.push(Triple::new(iri.clone(), rdf_type.clone(), Iri::new_unchecked(kind)));
            triples.push(Triple::new(
                iri.clone(),
                label.clone(),
                Literal::String(property.name.clone()),
            ));
            if let Some(c) = &property.comment {
                triples.push(Triple::new(iri.clone(), comment.clone(), Literal::String(c.clone())));
            }
            if let Some(domain) = &property.domain {
                triples.push(Triple::new(
                    iri.clone(),
                    Iri::new_unchecked(standard::RDFS_DOMAIN),
                    vocab::sp(domain),
                ));
            }
            if let Some(range) = &property.range {
                let range_iri = match property.kind {
                    PropertyKind::Datatype => vocab::xsd(range),
                    PropertyKind::Object => vocab::sp(range),
                };
                triples.push(Triple::new(
                    iri,
                    Iri::new_unchecked(standard::RDFS_RANGE),
                    range_iri,
                ));
            }
        }
        triples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_schema_parses() {
        let ontology = Ontology::bundled().unwrap();
        assert_eq!(ontology.source, OntologySource::Bundled);
        assert!(ontology.has_class("CaptainCandidate"));
        assert_eq!(ontology.class_count(), 17);
        assert!(ontology.property_count() > 50);
    }

    #[test]
    fn missing_file_falls_back_to_minimal() {
        let ontology = Ontology::load(Some(Path::new("/nonexistent/smartplay.toml")));
        assert_eq!(ontology.source, OntologySource::Minimal);
        for core in vocab::CORE_CLASSES {
            assert!(ontology.has_class(core));
        }
    }

    #[test]
    fn schema_without_core_classes_is_rejected() {
        let toml = r#"
            [ontology]
            name = "broken"
            version = "1"

            [[classes]]
            name = "Player"
        "#;
        let err = Ontology::parse(toml, OntologySource::Bundled).unwrap_err();
        assert!(matches!(err, OntologyError::MissingCoreClass { .. }));
    }

    #[test]
    fn external_file_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.toml");
        let mut toml = String::from("[ontology]\nname = \"custom\"\nversion = \"2\"\n");
        for core in vocab::CORE_CLASSES {
            toml.push_str(&format!("\n[[classes]]\nname = \"{core}\"\n"));
        }
        std::fs::write(&path, toml).unwrap();

        let ontology = Ontology::load(Some(&path));
        assert_eq!(ontology.name, "custom");
        assert_eq!(ontology.source, OntologySource::External(path));
    }

    #[test]
    fn triples_declare_classes_and_ranges() {
        let triples = Ontology::minimal().triples();
        let owl_class = crate::graph::Term::Iri(Iri::new_unchecked(standard::OWL_CLASS));
        let class_decls = triples
            .iter()
            .filter(|t| t.predicate == vocab::rdf_type() && t.object == owl_class)
            .count();
        assert_eq!(class_decls, 5);
        assert!(triples.iter().any(|t| {
            t.subject == vocab::sp("playsFor")
                && t.predicate.as_str() == standard::RDFS_RANGE
                && t.object == crate::graph::Term::Iri(vocab::sp("Team"))
        }));
    }
}
