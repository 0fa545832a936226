//! H5P content model
//!
//! A content instance is described by a library identifier such as
//! `"H5P.CoursePresentation 1.25"` and an opaque JSON parameter tree.
//! Nested content (slide elements, video interactions) appears inside the
//! tree as `action` objects carrying their own library, subContentId and
//! params.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Machine name part of a library identifier (`"H5P.Foo 1.2"` -> `"H5P.Foo"`)
pub fn machine_name(library: &str) -> &str {
    library.split_once(' ').map_or(library, |(machine, _)| machine)
}

/// Handler name of a library identifier
///
/// Takes the machine name, its second dot-separated segment, and lower-cases
/// the first character: `"H5P.CoursePresentation 1.0"` -> `"coursePresentation"`.
/// Returns `None` when the machine name has no type segment.
pub fn handler_name(library: &str) -> Option<String> {
    let type_segment = machine_name(library).split('.').nth(1)?;
    let mut chars = type_segment.chars();
    let first = chars.next()?;
    Some(first.to_lowercase().chain(chars).collect())
}

/// Parsed library identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryName {
    pub machine_name: String,
    pub major_version: Option<u32>,
    pub minor_version: Option<u32>,
}

impl LibraryName {
    /// Parse `"H5P.Type major.minor"`; a missing or malformed version is kept as `None`
    pub fn parse(library: &str) -> Self {
        let library = library.trim();
        let (machine, version) = match library.split_once(' ') {
            Some((machine, version)) => (machine, version.trim()),
            None => (library, ""),
        };

        let mut parts = version.split('.');
        let major_version = parts.next().and_then(|v| v.parse().ok());
        let minor_version = parts.next().and_then(|v| v.parse().ok());

        Self {
            machine_name: machine.to_string(),
            major_version,
            minor_version,
        }
    }

    /// `"major.minor"` when both parts are known
    pub fn version(&self) -> Option<String> {
        match (self.major_version, self.minor_version) {
            (Some(major), Some(minor)) => Some(format!("{}.{}", major, minor)),
            _ => None,
        }
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::from_library(&self.machine_name)
    }
}

impl std::fmt::Display for LibraryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.version() {
            Some(version) => write!(f, "{} {}", self.machine_name, version),
            None => write!(f, "{}", self.machine_name),
        }
    }
}

/// Content types the scoring bridge knows about
///
/// Every library whose handler name is not listed maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentType {
    Blanks,
    BranchingScenario,
    CoursePresentation,
    DragQuestion,
    DragText,
    Essay,
    FlashCards,
    GuessTheAnswer,
    ImageHotspotQuestion,
    InteractiveVideo,
    MarkTheWords,
    MemoryGame,
    MultiChoice,
    Questionnaire,
    QuestionSet,
    SingleChoiceSet,
    Summary,
    TrueFalse,
    Unknown,
}

impl ContentType {
    pub fn from_handler_name(name: &str) -> Self {
        match name {
            "blanks" => ContentType::Blanks,
            "branchingScenario" => ContentType::BranchingScenario,
            "coursePresentation" => ContentType::CoursePresentation,
            "dragQuestion" => ContentType::DragQuestion,
            "dragText" => ContentType::DragText,
            "essay" => ContentType::Essay,
            "flashCards" => ContentType::FlashCards,
            "guessTheAnswer" => ContentType::GuessTheAnswer,
            "imageHotspotQuestion" => ContentType::ImageHotspotQuestion,
            "interactiveVideo" => ContentType::InteractiveVideo,
            "markTheWords" => ContentType::MarkTheWords,
            "memoryGame" => ContentType::MemoryGame,
            "multiChoice" => ContentType::MultiChoice,
            "questionnaire" => ContentType::Questionnaire,
            "questionSet" => ContentType::QuestionSet,
            "singleChoiceSet" => ContentType::SingleChoiceSet,
            "summary" => ContentType::Summary,
            "trueFalse" => ContentType::TrueFalse,
            _ => ContentType::Unknown,
        }
    }

    /// Classify a full library identifier or a bare machine name
    pub fn from_library(library: &str) -> Self {
        handler_name(library)
            .map(|name| Self::from_handler_name(&name))
            .unwrap_or(ContentType::Unknown)
    }
}

/// One node of a content parameter tree
///
/// Fields are optional because authored content is frequently incomplete;
/// the analyzer treats a node missing any of them as unscored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    #[serde(default)]
    pub library: Option<String>,
    #[serde(rename = "subContentId", default)]
    pub sub_content_id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl ContentNode {
    pub fn new(library: impl Into<String>, sub_content_id: impl Into<String>, params: Value) -> Self {
        Self {
            library: Some(library.into()),
            sub_content_id: Some(sub_content_id.into()),
            params: Some(params),
        }
    }

    /// Build a node from an `action` object embedded in a parent's params
    ///
    /// Empty strings and `null` params count as absent, matching how authoring
    /// tools leave half-configured elements behind.
    pub fn from_action(action: &Value) -> Self {
        let text = |key: &str| {
            action
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            library: text("library"),
            sub_content_id: text("subContentId"),
            params: action.get("params").filter(|p| !p.is_null()).cloned(),
        }
    }

    /// True when library, subContentId and params are all present
    pub fn is_well_formed(&self) -> bool {
        self.library.is_some() && self.sub_content_id.is_some() && self.params.is_some()
    }

    pub fn content_type(&self) -> ContentType {
        self.library
            .as_deref()
            .map(ContentType::from_library)
            .unwrap_or(ContentType::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handler_name_strips_version_and_namespace() {
        assert_eq!(
            handler_name("H5P.CoursePresentation 1.0").as_deref(),
            Some("coursePresentation")
        );
        assert_eq!(
            handler_name("H5P.SingleChoiceSet 1.11").as_deref(),
            Some("singleChoiceSet")
        );
        assert_eq!(handler_name("H5P.Blanks").as_deref(), Some("blanks"));
    }

    #[test]
    fn test_handler_name_without_type_segment() {
        assert_eq!(handler_name("Blanks 1.0"), None);
        assert_eq!(handler_name("H5P. 1.0"), None);
        assert_eq!(handler_name(""), None);
    }

    #[test]
    fn test_content_type_lookup() {
        assert_eq!(
            ContentType::from_library("H5P.InteractiveVideo 1.22"),
            ContentType::InteractiveVideo
        );
        assert_eq!(ContentType::from_library("H5P.Text 1.1"), ContentType::Unknown);
        assert_eq!(ContentType::from_library("garbage"), ContentType::Unknown);
    }

    #[test]
    fn test_library_name_parse() {
        let name = LibraryName::parse("H5P.QuestionSet 1.17");
        assert_eq!(name.machine_name, "H5P.QuestionSet");
        assert_eq!(name.version().as_deref(), Some("1.17"));
        assert_eq!(name.content_type(), ContentType::QuestionSet);
        assert_eq!(name.to_string(), "H5P.QuestionSet 1.17");

        let bare = LibraryName::parse("H5P.Essay");
        assert_eq!(bare.major_version, None);
        assert_eq!(bare.version(), None);
        assert_eq!(bare.to_string(), "H5P.Essay");
    }

    #[test]
    fn test_node_from_action() {
        let node = ContentNode::from_action(&json!({
            "library": "H5P.TrueFalse 1.8",
            "subContentId": "abc",
            "params": {}
        }));
        assert!(node.is_well_formed());
        assert_eq!(node.content_type(), ContentType::TrueFalse);

        let broken = ContentNode::from_action(&json!({
            "library": "H5P.TrueFalse 1.8",
            "subContentId": "",
            "params": null
        }));
        assert!(!broken.is_well_formed());
        assert_eq!(broken.sub_content_id, None);
        assert_eq!(broken.params, None);
    }
}
