// src/lib.rs
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

// --- Declare modules ---
pub mod asset_cache;
mod config;
pub mod db;
pub mod lookup;
pub mod plan;
pub mod state;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, Config, Error as ConfigError, StandardColor, Theme, Units,
};
pub use db::{get_db_path as get_db_path_util, Error as DbError};
pub use lookup::{FoodMatch, LookupError, LookupStatus, NutrientLookup};
pub use plan::PlannedExercise;
pub use state::{
    ApplicationState, Day, IngredientLine, MealEntry, MealSource, NutritionTotals, Per100g,
    ProgressSummary, RecipeDraft, Screen, SetEntry, ValidationError,
};

/// Durable key under which the whole application state is stored.
pub const STORAGE_KEY: &str = "ssculpt_v1";

#[derive(Error, Debug)]
pub enum IngredientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("No nutrient data found for '{0}'.")]
    NoMatch(String),
}

/// The single owner of application state. Every command mutates the
/// in-memory state and immediately writes it back to storage.
pub struct AppService {
    pub config: Config,
    pub conn: Connection,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub state: ApplicationState,
}

impl AppService {
    /// Initializes the application service.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let conn = db::open_db(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        Self::with_connection(config, conn, db_path, config_path)
    }

    /// Builds the service around an already opened connection and loads state from it.
    /// # Errors
    /// Returns `anyhow::Error` if the storage table cannot be created.
    pub fn with_connection(
        config: Config,
        conn: Connection,
        db_path: PathBuf,
        config_path: PathBuf,
    ) -> Result<Self> {
        db::init_kv(&conn).context("Failed to initialize storage schema")?;
        let state = Self::load_state(&conn);
        Ok(Self {
            config,
            conn,
            db_path,
            config_path,
            state,
        })
    }

    /// Reads the stored state. A missing or unreadable blob yields the
    /// defaults; the failure is logged and otherwise ignored.
    #[must_use]
    pub fn load_state(conn: &Connection) -> ApplicationState {
        let raw = match db::get_item(conn, STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No stored state under '{}', using defaults", STORAGE_KEY);
                return ApplicationState::default();
            }
            Err(e) => {
                error!("Error loading state: {}", e);
                return ApplicationState::default();
            }
        };
        match ApplicationState::from_json(&raw) {
            Ok(state) => {
                debug!(
                    "Loaded state: {} workouts, {} meals, {} draft ingredients",
                    state.workouts.len(),
                    state.meals.len(),
                    state.recipe_draft.ingredients.len()
                );
                state
            }
            Err(e) => {
                error!("Error loading state: stored blob is unreadable: {}", e);
                ApplicationState::default()
            }
        }
    }

    /// Writes the full state under the storage key. Failures are logged and
    /// the in-memory state stays authoritative; returns whether the write landed.
    pub fn save_state(&self) -> bool {
        let serialized = match self.state.to_json() {
            Ok(s) => s,
            Err(e) => {
                error!("Error saving state: could not serialize: {}", e);
                return false;
            }
        };
        match db::set_item(&self.conn, STORAGE_KEY, &serialized) {
            Ok(()) => true,
            Err(e) => {
                warn!("Error saving state: {}", e);
                false
            }
        }
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    // --- Navigation ---

    pub fn set_screen(&mut self, screen: Screen) {
        self.state.selected_screen = screen;
        self.save_state();
    }

    pub fn set_day(&mut self, day: Day) {
        self.state.selected_day = day;
        self.save_state();
    }

    #[must_use]
    pub fn plan_for_selected_day(&self) -> &'static [PlannedExercise] {
        plan::exercises_for(self.state.selected_day)
    }

    // --- Workouts ---

    /// Logs a set of a planned exercise on the selected day.
    /// # Errors
    /// `ValidationError` if the input is incomplete or the exercise is not planned for the day.
    pub fn log_set(
        &mut self,
        exercise: &str,
        weight: Option<f64>,
        reps: Option<u32>,
    ) -> Result<SetEntry, ValidationError> {
        let entry = self
            .state
            .log_set(exercise, weight, reps, Utc::now())?
            .clone();
        self.save_state();
        info!(
            "Logged set: {} {} x {}",
            entry.exercise_name, entry.weight, entry.reps
        );
        Ok(entry)
    }

    // --- Meals ---

    /// # Errors
    /// `ValidationError` if neither protein nor calories is given, or a value is negative.
    pub fn log_meal(
        &mut self,
        name: Option<&str>,
        protein: Option<f64>,
        calories: Option<f64>,
    ) -> Result<MealEntry, ValidationError> {
        let entry = self
            .state
            .log_meal(name, protein, calories, Utc::now())?
            .clone();
        self.save_state();
        Ok(entry)
    }

    /// Runs a food search. Holds no borrow of the service, so other
    /// commands can run while the request is in flight; hand the result to
    /// [`AppService::apply_lookup`] once it arrives.
    /// # Errors
    /// `ValidationError::MissingFoodQuery` for a blank query; no request is made then.
    pub async fn search_food(
        lookup: &dyn NutrientLookup,
        query: &str,
    ) -> Result<LookupStatus, ValidationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::MissingFoodQuery);
        }
        let status = LookupStatus::from(lookup.search(query).await);
        if let LookupStatus::Failed(reason) = &status {
            warn!("Lookup for '{}' failed: {}", query, reason);
        }
        Ok(status)
    }

    /// Records the outcome of a finished search. A match is logged as a meal
    /// straight away; the caller may still log an edited copy by hand.
    pub fn apply_lookup(&mut self, status: &LookupStatus) -> Option<MealEntry> {
        let LookupStatus::Found(food) = status else {
            return None;
        };
        let meal = self
            .state
            .log_lookup_meal(&food.name, food.protein, food.calories, Utc::now())
            .clone();
        self.save_state();
        Some(meal)
    }

    // --- Recipe draft ---

    /// Looks up the per-100 g nutrients of an ingredient before it is added
    /// with [`AppService::add_ingredient_with_nutrients`]. Like
    /// [`AppService::search_food`], this does not borrow the service.
    /// # Errors
    /// `IngredientError` on invalid input, lookup failure or no match.
    pub async fn lookup_ingredient(
        lookup: &dyn NutrientLookup,
        name: &str,
        grams: f64,
    ) -> Result<Per100g, IngredientError> {
        state::validate_ingredient(name, grams)?;
        let food = lookup
            .search(name.trim())
            .await?
            .ok_or_else(|| IngredientError::NoMatch(name.trim().to_string()))?;
        Ok(food.per_100g())
    }

    /// Appends an ingredient whose per-100 g nutrients are already known.
    /// # Errors
    /// `ValidationError::MissingIngredient` for a blank name or non-positive amount.
    pub fn add_ingredient_with_nutrients(
        &mut self,
        name: &str,
        grams: f64,
        per_100g: Per100g,
    ) -> Result<IngredientLine, ValidationError> {
        let line = self.state.add_ingredient(name, grams, per_100g)?.clone();
        self.save_state();
        Ok(line)
    }

    /// # Errors
    /// `ValidationError::IngredientIndexOutOfRange` if `index` is past the end of the draft.
    pub fn remove_ingredient(&mut self, index: usize) -> Result<IngredientLine, ValidationError> {
        let removed = self.state.remove_ingredient(index)?;
        self.save_state();
        Ok(removed)
    }

    /// # Errors
    /// `ValidationError::EmptyRecipe` if the draft has no ingredients.
    pub fn save_recipe(&mut self, name: Option<&str>) -> Result<MealEntry, ValidationError> {
        let meal = self.state.save_recipe(name, Utc::now())?.clone();
        self.save_state();
        info!(
            "Saved recipe '{}': {:.1} g protein, {:.0} kcal",
            meal.name, meal.protein, meal.calories
        );
        Ok(meal)
    }

    // --- Read-only views ---

    #[must_use]
    pub fn progress(&self) -> ProgressSummary {
        self.state.progress()
    }

    #[must_use]
    pub fn recipe_totals(&self) -> NutritionTotals {
        self.state.recipe_draft.totals()
    }
}
