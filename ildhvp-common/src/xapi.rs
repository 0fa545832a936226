//! xAPI statements as emitted by the H5P runtime
//!
//! Only the fields the aggregator consumes are kept: verb, object type and
//! id, score, and the two H5P extensions (local content id, ending point).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{Error, Result};

/// Object definition extension carrying the H5P content id
pub const LOCAL_CONTENT_ID_EXTENSION: &str = "http://h5p.org/x-api/h5p-local-content-id";

/// Object definition extension carrying the slide reached by a `progressed` statement
pub const ENDING_POINT_EXTENSION: &str = "http://id.tincanapi.com/extension/ending-point";

const SUB_CONTENT_ID_MARKER: &str = "subContentId=";

/// Object type eligible for per-interaction scoring
pub const ACTIVITY: &str = "Activity";

pub mod verbs {
    pub const ANSWERED: &str = "answered";
    pub const COMPLETED: &str = "completed";
    pub const PROGRESSED: &str = "progressed";
}

/// A statement reduced to what scoring needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub content_id: i64,
    pub verb: String,
    pub object_type: String,
    pub object_id: String,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub ending_point: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawStatement {
    verb: RawVerb,
    object: RawObject,
    #[serde(default)]
    result: Option<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawVerb {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    #[serde(rename = "objectType", default)]
    object_type: Option<String>,
    #[serde(default)]
    id: String,
    #[serde(default)]
    definition: Option<RawDefinition>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDefinition {
    #[serde(default)]
    extensions: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    score: Option<RawScore>,
}

#[derive(Debug, Deserialize)]
struct RawScore {
    #[serde(default)]
    raw: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

/// Short verb name from a verb IRI (`http://adlnet.gov/expapi/verbs/answered` -> `answered`)
pub fn verb_name(verb_id: &str) -> &str {
    verb_id.rsplit('/').next().unwrap_or(verb_id)
}

/// Integer from a JSON number or numeric string
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Statement {
    /// Minimal statement for a content instance; mostly useful with the `with_*` builders
    pub fn new(content_id: i64, verb: impl Into<String>) -> Self {
        Self {
            content_id,
            verb: verb.into(),
            object_type: ACTIVITY.to_string(),
            object_id: format!("h5p/embed/{}", content_id),
            score: None,
            max_score: None,
            ending_point: None,
        }
    }

    pub fn with_score(mut self, score: f64, max_score: f64) -> Self {
        self.score = Some(score);
        self.max_score = Some(max_score);
        self
    }

    pub fn with_sub_content_id(mut self, sub_content_id: &str) -> Self {
        self.object_id = format!(
            "h5p/embed/{}?{}{}",
            self.content_id, SUB_CONTENT_ID_MARKER, sub_content_id
        );
        self
    }

    pub fn with_object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = object_type.into();
        self
    }

    pub fn with_ending_point(mut self, slide: i64) -> Self {
        self.ending_point = Some(slide);
        self
    }

    /// Parse a raw xAPI statement
    ///
    /// Fails when the verb or object is missing or when the statement does not
    /// name the H5P content it belongs to.
    pub fn from_xapi(value: &Value) -> Result<Self> {
        let raw: RawStatement = serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidInput(format!("Malformed xAPI statement: {}", e)))?;

        let extensions = raw.object.definition.unwrap_or_default().extensions;

        let content_id = extensions
            .get(LOCAL_CONTENT_ID_EXTENSION)
            .and_then(as_integer)
            .ok_or_else(|| {
                Error::InvalidInput("Statement does not carry an H5P content id".to_string())
            })?;

        let ending_point = extensions.get(ENDING_POINT_EXTENSION).and_then(as_integer);

        let (score, max_score) = match raw.result.and_then(|r| r.score) {
            Some(score) => (score.raw, score.max),
            None => (None, None),
        };

        Ok(Self {
            content_id,
            verb: verb_name(&raw.verb.id).to_string(),
            object_type: raw.object.object_type.unwrap_or_default(),
            object_id: raw.object.id,
            score,
            max_score,
            ending_point,
        })
    }

    /// Sub-content id from the object id's `subContentId=` marker
    pub fn sub_content_id(&self) -> Option<&str> {
        let (_, rest) = self.object_id.split_once(SUB_CONTENT_ID_MARKER)?;
        let id = rest.split('&').next().unwrap_or(rest);
        (!id.is_empty()).then_some(id)
    }

    pub fn is_activity(&self) -> bool {
        self.object_type == ACTIVITY
    }

    /// `score / max_score`, or `None` when either is missing or the ratio is not finite
    pub fn ratio(&self) -> Option<f64> {
        let (score, max_score) = (self.score?, self.max_score?);
        if max_score == 0.0 {
            return None;
        }
        let ratio = score / max_score;
        ratio.is_finite().then_some(ratio)
    }

    /// Score as a percentage of the maximum score
    pub fn percentage(&self) -> Option<f64> {
        self.ratio().map(|ratio| ratio * 100.0)
    }
}
