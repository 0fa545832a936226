//! Database models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Profile language
    pub lang: String,
    /// Language chosen for the current session; overrides `lang`
    pub session_lang: Option<String>,
}

impl User {
    pub fn effective_lang(&self) -> &str {
        self.session_lang.as_deref().unwrap_or(&self.lang)
    }
}

/// H5P content instance
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Content {
    pub id: i64,
    pub title: String,
    /// Library identifier, e.g. `H5P.CoursePresentation 1.22`
    pub library: String,
    /// Content parameters as stored (JSON text)
    pub params: String,
}

impl Content {
    /// Parsed parameters; unparseable text reads as JSON null
    pub fn params_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.params).unwrap_or(serde_json::Value::Null)
    }
}

/// Placement of a content instance in a course section
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CourseModule {
    pub id: i64,
    pub course_id: i64,
    pub section_id: i64,
    pub content_id: i64,
    pub name: Option<String>,
    pub visible: bool,
    /// 0 = completion tracking disabled
    pub completion: i64,
    /// Availability restriction tree (JSON)
    pub availability: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Grade {
    pub content_id: i64,
    pub user_id: i64,
    pub raw_grade: f64,
    pub raw_grade_max: f64,
}

impl Grade {
    pub fn percentage(&self) -> f64 {
        if self.raw_grade_max > 0.0 {
            self.raw_grade / self.raw_grade_max * 100.0
        } else {
            0.0
        }
    }
}
