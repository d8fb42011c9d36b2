//! Declarative schema documents.
//!
//! A schema is a YAML list of endpoints. Each endpoint names a path pattern,
//! the query keys it requires, and the JSON body to answer with:
//!
//! ```yaml
//! endpoints:
//!   - path: /users/*
//!     query: { page: "*" }
//!     response: { users: [], page: 1 }
//! ```
//!
//! `*` matches any single path segment or any query value. Endpoints are
//! tried in order and the first match answers.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Deserialize;

use super::{ResponseGenerator, SchemaHandle};
use crate::http::target::{ParsedQuery, path_segments};

const WILDCARD: &str = "*";

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    endpoints: Vec<RawEndpoint>,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    path: String,
    #[serde(default)]
    query: BTreeMap<String, String>,
    response: serde_json::Value,
}

/// One endpoint with its response already rendered to JSON bytes.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub segments: Vec<String>,
    pub query: BTreeMap<String, String>,
    pub body: Bytes,
}

impl Endpoint {
    /// True when this endpoint answers the given request.
    pub fn matches(&self, segments: &[String], query: &ParsedQuery) -> bool {
        self.segments.len() == segments.len()
            && self
                .segments
                .iter()
                .zip(segments)
                .all(|(pattern, segment)| pattern == WILDCARD || pattern == segment)
            && self.query.iter().all(|(key, expected)| {
                query
                    .get(key)
                    .is_some_and(|value| expected == WILDCARD || expected == value)
            })
    }
}

/// A parsed schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaDocument {
    pub endpoints: Vec<Endpoint>,
}

impl SchemaDocument {
    /// Parses a YAML schema and renders every endpoint's response.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let raw: RawDocument = serde_yaml::from_str(source).context("Invalid schema document")?;

        let endpoints = raw
            .endpoints
            .into_iter()
            .map(|endpoint| {
                let body = serde_json::to_vec(&endpoint.response)
                    .with_context(|| format!("Cannot render response for {}", endpoint.path))?;
                Ok(Endpoint {
                    segments: path_segments(&endpoint.path),
                    query: endpoint.query,
                    body: Bytes::from(body),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { endpoints })
    }

    /// The first endpoint matching the request, if any.
    pub fn find(&self, segments: &[String], query: &ParsedQuery) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.matches(segments, query))
    }
}

/// Answers requests from the schema document held by the handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarativeGenerator;

impl ResponseGenerator for DeclarativeGenerator {
    fn generate(
        &self,
        segments: &[String],
        query: &ParsedQuery,
        schema: &SchemaHandle,
    ) -> Option<Bytes> {
        schema
            .document()
            .find(segments, query)
            .map(|endpoint| endpoint.body.clone())
    }
}
