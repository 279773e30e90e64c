#![doc = "plex-kg-core: core logic library for plex-kg."]

//! This crate contains the data models and pipelines for plex-kg: reshaping a
//! Plex library section into typed tables, assembling an RDF graph from them,
//! validating it against SHACL shapes and publishing it to a triple store.
//!
//! Transport lives behind the traits in [`contract`]; the CLI crate provides
//! the concrete HTTP clients.

pub mod config;
pub mod contract;
pub mod error;
pub mod extract;
pub mod graph;
pub mod inference;
pub mod rdf;
pub mod slug;
pub mod synchronise;
pub mod validate;

pub use error::{Error, Result};
