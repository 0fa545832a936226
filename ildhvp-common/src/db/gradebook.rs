//! Grade storage and section progress
//!
//! `set_grade` is the server side of the persist-result contract: it stores a
//! learner's result for a content instance when it improves on the stored one
//! and reports the progress of the section that holds the content.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::aggregator::PersistCommand;
use crate::content::LibraryName;
use crate::db::init::get_setting;
use crate::db::models::{Content, CourseModule, Grade, User};
use crate::db::tokens::has_capability;
use crate::progress::{section_percentage, ModuleGrade, SectionProgress};
use crate::sink::ResultSink;
use crate::{Error, Result};

/// Capability required to store results
pub const SAVE_RESULTS_CAPABILITY: &str = "mod/hvp:saveresults";

/// Capability required to store results on behalf of another user
pub const SAVE_RESULTS_FOR_OTHERS_CAPABILITY: &str = "mod/hvp:saveresultsforothers";

const FALLBACK_LANG: &str = "en";

/// Result of a `set_grade` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeOutcome {
    pub progress: SectionProgress,
    /// Whether the stored grade changed
    pub updated: bool,
}

pub async fn get_content(pool: &SqlitePool, content_id: i64) -> Result<Option<Content>> {
    let content = sqlx::query_as::<_, Content>(
        "SELECT id, title, library, params FROM contents WHERE id = ?",
    )
    .bind(content_id)
    .fetch_optional(pool)
    .await?;

    Ok(content)
}

/// Course module placing `content_id`; the earliest one when placed several times
pub async fn find_course_module(pool: &SqlitePool, content_id: i64) -> Result<Option<CourseModule>> {
    let module = sqlx::query_as::<_, CourseModule>(
        r#"
        SELECT id, course_id, section_id, content_id, name, visible, completion, availability
        FROM course_modules
        WHERE content_id = ?
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(content_id)
    .fetch_optional(pool)
    .await?;

    Ok(module)
}

pub async fn get_grade(pool: &SqlitePool, user_id: i64, content_id: i64) -> Result<Option<Grade>> {
    let grade = sqlx::query_as::<_, Grade>(
        r#"
        SELECT content_id, user_id, raw_grade, raw_grade_max
        FROM grades
        WHERE content_id = ? AND user_id = ?
        "#,
    )
    .bind(content_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(grade)
}

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, lang, session_lang FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Check that `caller_id` may store results for `learner_id`
///
/// Storing one's own results needs nothing extra here (`set_grade` checks
/// the save capability); storing another user's results needs
/// [`SAVE_RESULTS_FOR_OTHERS_CAPABILITY`] and an existing learner.
pub async fn authorize_grader(pool: &SqlitePool, caller_id: i64, learner_id: i64) -> Result<()> {
    if caller_id == learner_id {
        return Ok(());
    }

    if !has_capability(pool, caller_id, SAVE_RESULTS_FOR_OTHERS_CAPABILITY).await? {
        return Err(Error::PermissionDenied(format!(
            "User {} lacks {}",
            caller_id, SAVE_RESULTS_FOR_OTHERS_CAPABILITY
        )));
    }

    if get_user(pool, learner_id).await?.is_none() {
        return Err(Error::NotFound(format!("User {} not found", learner_id)));
    }

    Ok(())
}

/// Language used for availability checks: session language, then profile
/// language, then the `default_lang` setting
pub async fn user_language(pool: &SqlitePool, user_id: i64) -> Result<String> {
    let lang: Option<String> =
        sqlx::query_scalar("SELECT COALESCE(session_lang, lang) FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    if let Some(lang) = lang.filter(|l| !l.is_empty()) {
        return Ok(lang);
    }

    Ok(get_setting(pool, "default_lang")
        .await?
        .unwrap_or_else(|| FALLBACK_LANG.to_string()))
}

/// Progress of `user_id` through one course section
pub async fn get_progress(
    pool: &SqlitePool,
    user_id: i64,
    course_id: i64,
    section_id: i64,
) -> Result<SectionProgress> {
    let rows: Vec<(bool, i64, Option<String>, Option<f64>, Option<f64>)> = sqlx::query_as(
        r#"
        SELECT cm.visible, cm.completion, cm.availability, g.raw_grade, g.raw_grade_max
        FROM course_modules cm
        LEFT JOIN grades g ON g.content_id = cm.content_id AND g.user_id = ?
        WHERE cm.course_id = ? AND cm.section_id = ?
        ORDER BY cm.id
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(section_id)
    .fetch_all(pool)
    .await?;

    let modules: Vec<ModuleGrade> = rows
        .into_iter()
        .map(|(visible, completion, availability, raw, max)| ModuleGrade {
            visible,
            completion_enabled: completion != 0,
            availability,
            grade_percentage: match (raw, max) {
                (Some(raw), Some(max)) if max > 0.0 => Some(raw / max * 100.0),
                _ => None,
            },
        })
        .collect();

    let lang = user_language(pool, user_id).await?;
    let percentage = section_percentage(&modules, &lang);

    debug!(
        user_id,
        section_id,
        modules = modules.len(),
        percentage,
        "Computed section progress"
    );

    Ok(SectionProgress {
        section_id,
        percentage,
    })
}

fn validate_grade(score: f64, max_score: f64) -> Result<()> {
    if !score.is_finite() || score < 0.0 {
        return Err(Error::InvalidInput(format!("Invalid score: {}", score)));
    }
    if !max_score.is_finite() || max_score <= 0.0 {
        return Err(Error::InvalidInput(format!("Invalid maxscore: {}", max_score)));
    }
    Ok(())
}

/// Store a result for `user_id` if it beats the stored grade, then report
/// the progress of the content's section
///
/// Grades are compared as percentages of their maximum. The section
/// progress is returned whether or not the grade changed.
pub async fn set_grade(
    pool: &SqlitePool,
    user_id: i64,
    content_id: i64,
    score: f64,
    max_score: f64,
) -> Result<GradeOutcome> {
    validate_grade(score, max_score)?;

    let module = find_course_module(pool, content_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No course module for content {}", content_id)))?;

    if !has_capability(pool, user_id, SAVE_RESULTS_CAPABILITY).await? {
        return Err(Error::PermissionDenied(format!(
            "User {} lacks {}",
            user_id, SAVE_RESULTS_CAPABILITY
        )));
    }

    let content = get_content(pool, content_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Content {} not found", content_id)))?;

    let mut tx = pool.begin().await?;

    let stored: Option<(f64, f64)> = sqlx::query_as(
        "SELECT raw_grade, raw_grade_max FROM grades WHERE content_id = ? AND user_id = ?",
    )
    .bind(content_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let stored_percentage = match stored {
        Some((raw, max)) if max > 0.0 => raw / max * 100.0,
        _ => 0.0,
    };
    let new_percentage = score / max_score * 100.0;
    let updated = new_percentage > stored_percentage;

    if updated {
        sqlx::query(
            r#"
            INSERT INTO grades (content_id, user_id, raw_grade, raw_grade_max, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (content_id, user_id) DO UPDATE SET
                raw_grade = excluded.raw_grade,
                raw_grade_max = excluded.raw_grade_max,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(content_id)
        .bind(user_id)
        .bind(score)
        .bind(max_score)
        .execute(&mut *tx)
        .await?;

        let library = LibraryName::parse(&content.library);
        sqlx::query(
            r#"
            INSERT INTO grade_log
                (user_id, content_id, title, library_name, library_version, raw_grade, raw_grade_max)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(content_id)
        .bind(&content.title)
        .bind(&library.machine_name)
        .bind(library.version())
        .bind(score)
        .bind(max_score)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    if updated {
        info!(
            user_id,
            content_id,
            score,
            max_score,
            "Results set for '{}'",
            content.title
        );
    } else {
        debug!(
            user_id,
            content_id,
            new_percentage,
            stored_percentage,
            "Grade not improved, keeping stored grade"
        );
    }

    let progress = get_progress(pool, user_id, module.course_id, module.section_id).await?;

    Ok(GradeOutcome { progress, updated })
}

/// [`ResultSink`] writing straight into the local gradebook
#[derive(Clone)]
pub struct GradebookSink {
    pool: SqlitePool,
}

impl GradebookSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultSink for GradebookSink {
    async fn set_result(&self, user_id: i64, command: PersistCommand) -> Result<SectionProgress> {
        let outcome = set_grade(
            &self.pool,
            user_id,
            command.content_id,
            command.score,
            command.max_score,
        )
        .await?;

        Ok(outcome.progress)
    }
}
