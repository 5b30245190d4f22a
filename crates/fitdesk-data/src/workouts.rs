use crate::manager::{DataManager, ManagerContext};
use fitdesk_types::{DataError, DataResult, Workout, WorkoutSummary};
use fitdesk_validate::{FieldType, Rule, SanitizeKind, Schema};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

pub const CAP_LOG_WORKOUTS: &str = "log_workouts";

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex"));

/// Workout log CRUD on the shared manager foundation. This is the
/// template the other dashboard managers (nutrition, goals,
/// membership) follow: one schema, cached list reads keyed per user
/// and day, invalidation on every write.
pub struct WorkoutsManager {
    ctx: ManagerContext,
}

impl DataManager for WorkoutsManager {
    fn cache_group(&self) -> &'static str {
        "workouts"
    }

    fn context(&self) -> &ManagerContext {
        &self.ctx
    }
}

fn workout_schema() -> Schema {
    Schema::new()
        .field(
            "title",
            Rule::new()
                .required()
                .min_length(1)
                .max_length(120)
                .sanitize(SanitizeKind::Text),
        )
        .field(
            "duration_min",
            Rule::new()
                .required()
                .field_type(FieldType::Number)
                .min(1.0)
                .max(600.0)
                .sanitize(SanitizeKind::Int),
        )
        .field(
            "intensity",
            Rule::new()
                .required()
                .field_type(FieldType::Number)
                .min(1.0)
                .max(10.0)
                .sanitize(SanitizeKind::Int),
        )
        .field("notes", Rule::new().max_length(2000).sanitize(SanitizeKind::RichText))
        .field(
            "logged_on",
            Rule::new()
                .required()
                .pattern(DATE_RE.clone())
                .sanitize(SanitizeKind::Text),
        )
}

impl WorkoutsManager {
    pub fn new(ctx: ManagerContext) -> Self {
        Self { ctx }
    }

    /// Validate and persist one workout entry, then drop the list key
    /// it would appear under so the next read sees it.
    pub fn log_workout(&self, user_id: i64, input: &Map<String, Value>) -> DataResult<i64> {
        let clean = self.validate(input, &workout_schema())?;
        self.require(CAP_LOG_WORKOUTS, None)?;

        let title = clean["title"].as_str().unwrap_or_default();
        let duration = clean["duration_min"].as_i64().unwrap_or_default();
        let intensity = clean["intensity"].as_i64().unwrap_or_default();
        let notes = clean.get("notes").and_then(Value::as_str);
        let logged_on = clean["logged_on"].as_str().unwrap_or_default();

        let id = self
            .ctx
            .db
            .insert_workout(user_id, title, duration, intensity, notes, logged_on)
            .map_err(|e| {
                self.log_error(&format!("{e:#}"), "log_workout");
                DataError::Storage(format!("{e:#}"))
            })?;

        self.invalidate(&day_key(user_id, logged_on));
        Ok(id)
    }

    pub fn list_workouts(&self, user_id: i64, logged_on: &str) -> DataResult<Vec<WorkoutSummary>> {
        let ttl = self.ctx.config.cache_ttl;
        self.cached_read(&day_key(user_id, logged_on), ttl, || {
            let rows = self
                .ctx
                .db
                .list_workouts(user_id, logged_on)
                .map_err(|e| DataError::Storage(format!("{e:#}")))?;
            Ok(rows
                .into_iter()
                .map(|r| WorkoutSummary {
                    id: r.id,
                    title: r.title,
                    duration_min: r.duration_min,
                    intensity: r.intensity,
                    logged_on: r.logged_on,
                })
                .collect())
        })
    }

    /// Single-row reads skip the cache; the index keeps them cheap.
    pub fn get_workout(&self, workout_id: i64) -> DataResult<Workout> {
        let row = self
            .ctx
            .db
            .get_workout(workout_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?
            .ok_or_else(|| DataError::not_found("workout", workout_id))?;

        Ok(Workout {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            duration_min: row.duration_min,
            intensity: row.intensity,
            notes: row.notes,
            logged_on: row.logged_on,
            created_at: fitdesk_db::models::parse_timestamp(&row.created_at),
        })
    }
}

fn day_key(user_id: i64, logged_on: &str) -> String {
    format!("day:{user_id}:{logged_on}")
}
