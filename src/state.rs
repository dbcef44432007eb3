//src/state.rs
//! In-memory application state, its JSON shape, and the pure aggregates
//! computed over it. Nothing in here touches storage.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::warn;

use crate::plan;

/// Number of entries shown in the "recent" progress views.
pub const RECENT_LIMIT: usize = 10;

const DEFAULT_MEAL_NAME: &str = "Meal";
const DEFAULT_RECIPE_NAME: &str = "Recipe";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Enter a weight and reps greater than zero.")]
    MissingSetValues,
    #[error("'{exercise}' is not part of the {day} plan.")]
    ExerciseNotInPlan { exercise: String, day: Day },
    #[error("Enter at least protein or calories.")]
    MissingMealValues,
    #[error("{0} cannot be negative.")]
    Negative(&'static str),
    #[error("{0} must be a number.")]
    NotANumber(&'static str),
    #[error("Please enter a food to search.")]
    MissingFoodQuery,
    #[error("Enter an ingredient name and amount.")]
    MissingIngredient,
    #[error("No ingredient at position {index} (draft has {len}).")]
    IngredientIndexOutOfRange { index: usize, len: usize },
    #[error("The recipe has no ingredients to save.")]
    EmptyRecipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Screen {
    #[default]
    Exercises,
    Nutrition,
    Recipes,
    Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Day {
    #[default]
    #[serde(rename = "Day 1")]
    #[strum(to_string = "Day 1", serialize = "1", serialize = "day1")]
    Day1,
    #[serde(rename = "Day 2")]
    #[strum(to_string = "Day 2", serialize = "2", serialize = "day2")]
    Day2,
    #[serde(rename = "Day 3")]
    #[strum(to_string = "Day 3", serialize = "3", serialize = "day3")]
    Day3,
    #[serde(rename = "Day 4")]
    #[strum(to_string = "Day 4", serialize = "4", serialize = "day4")]
    Day4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
pub enum MealSource {
    #[default]
    #[serde(rename = "manual")]
    #[strum(to_string = "manual")]
    Manual,
    // Older blobs tagged lookups with the provider name
    #[serde(rename = "external-lookup", alias = "USDA")]
    #[strum(to_string = "external-lookup")]
    ExternalLookup,
    #[serde(rename = "recipe")]
    #[strum(to_string = "recipe")]
    Recipe,
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An unrecognised meal source is read as a manual entry.
fn source_or_default<'de, D>(deserializer: D) -> Result<MealSource, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(MealSource::deserialize(value).unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetEntry {
    #[serde(alias = "ts")]
    pub timestamp: DateTime<Utc>,
    pub day: String,
    #[serde(alias = "exercise")]
    pub exercise_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub weight: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub reps: u32,
}

impl SetEntry {
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MealEntry {
    #[serde(alias = "ts")]
    pub timestamp: DateTime<Utc>,
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub protein: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub calories: f64,
    #[serde(deserialize_with = "source_or_default")]
    pub source: MealSource,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngredientLine {
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub grams: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub protein: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub calories: f64,
}

/// Nutrients for 100 g of a food, as reported by the lookup provider.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Per100g {
    pub protein: f64,
    pub calories: f64,
}

impl IngredientLine {
    /// Freezes the scaled nutrient values for `grams` of a food.
    #[must_use]
    pub fn scaled(name: &str, grams: f64, per_100g: Per100g) -> Self {
        let factor = grams / 100.0;
        Self {
            name: name.to_string(),
            grams,
            protein: per_100g.protein * factor,
            calories: per_100g.calories * factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NutritionTotals {
    pub protein: f64,
    pub calories: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RecipeDraft {
    pub ingredients: Vec<IngredientLine>,
}

impl RecipeDraft {
    #[must_use]
    pub fn totals(&self) -> NutritionTotals {
        self.ingredients
            .iter()
            .fold(NutritionTotals::default(), |acc, line| NutritionTotals {
                protein: acc.protein + line.protein,
                calories: acc.calories + line.calories,
            })
    }
}

/// Everything the tracker remembers between runs.
///
/// Every field carries a default so that a blob written by an older
/// version (or a partial one) loads with the missing parts filled in.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationState {
    pub selected_screen: Screen,
    pub selected_day: Day,
    pub workouts: Vec<SetEntry>,
    pub meals: Vec<MealEntry>,
    pub recipe_draft: RecipeDraft,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub total_workouts: usize,
    pub total_meals: usize,
    pub total_volume: f64,
    pub nutrition: NutritionTotals,
}

impl ApplicationState {
    /// Parses a stored blob field by field. Absent fields keep their
    /// defaults; a field or list entry that no longer parses is dropped with
    /// a warning while the rest of the blob is kept.
    /// # Errors
    /// `serde_json::Error` if the blob is not a JSON object at all.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let Value::Object(mut fields) = serde_json::from_str::<Value>(raw)? else {
            return Err(serde_json::Error::custom("stored state is not a JSON object"));
        };

        let mut state = Self::default();
        if let Some(screen) = take_field(&mut fields, "selectedScreen") {
            state.selected_screen = screen;
        }
        if let Some(day) = take_field(&mut fields, "selectedDay") {
            state.selected_day = day;
        }
        state.workouts = take_entries(fields.remove("workouts"), "workout");
        state.meals = take_entries(fields.remove("meals"), "meal");

        // Older versions kept the draft under `recipe`
        let draft = fields
            .remove("recipeDraft")
            .filter(|v| !v.is_null())
            .or_else(|| fields.remove("recipe"));
        state.recipe_draft = take_recipe_draft(draft);
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    // --- Mutations (no persistence) ---

    /// Appends a set for `exercise` on the currently selected day.
    /// # Errors
    /// `ValidationError` if weight/reps are not positive or the exercise is not planned for the day.
    pub fn log_set(
        &mut self,
        exercise: &str,
        weight: Option<f64>,
        reps: Option<u32>,
        timestamp: DateTime<Utc>,
    ) -> Result<&SetEntry, ValidationError> {
        let (weight, reps) = match (weight, reps) {
            (Some(w), Some(r)) if w > 0.0 && w.is_finite() && r > 0 => (w, r),
            _ => return Err(ValidationError::MissingSetValues),
        };
        let planned = plan::find_exercise(self.selected_day, exercise).ok_or_else(|| {
            ValidationError::ExerciseNotInPlan {
                exercise: exercise.trim().to_string(),
                day: self.selected_day,
            }
        })?;

        let entry = SetEntry {
            timestamp,
            day: self.selected_day.to_string(),
            exercise_name: planned.name.to_string(),
            weight,
            reps,
        };
        Ok(push_last(&mut self.workouts, entry))
    }

    /// Appends a manually entered meal.
    /// # Errors
    /// `ValidationError` if both values are missing/zero or either is negative.
    pub fn log_meal(
        &mut self,
        name: Option<&str>,
        protein: Option<f64>,
        calories: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<&MealEntry, ValidationError> {
        let protein = protein.unwrap_or(0.0);
        let calories = calories.unwrap_or(0.0);
        if !protein.is_finite() {
            return Err(ValidationError::NotANumber("Protein"));
        }
        if !calories.is_finite() {
            return Err(ValidationError::NotANumber("Calories"));
        }
        if protein < 0.0 {
            return Err(ValidationError::Negative("Protein"));
        }
        if calories < 0.0 {
            return Err(ValidationError::Negative("Calories"));
        }
        if protein == 0.0 && calories == 0.0 {
            return Err(ValidationError::MissingMealValues);
        }
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_MEAL_NAME);

        Ok(self.push_meal(name, protein, calories, MealSource::Manual, timestamp))
    }

    /// Records a meal straight from a lookup match. Missing nutrients count as zero.
    pub fn log_lookup_meal(
        &mut self,
        name: &str,
        protein: Option<f64>,
        calories: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> &MealEntry {
        self.push_meal(
            name,
            non_negative(protein),
            non_negative(calories),
            MealSource::ExternalLookup,
            timestamp,
        )
    }

    fn push_meal(
        &mut self,
        name: &str,
        protein: f64,
        calories: f64,
        source: MealSource,
        timestamp: DateTime<Utc>,
    ) -> &MealEntry {
        let entry = MealEntry {
            timestamp,
            name: name.to_string(),
            protein,
            calories,
            source,
        };
        push_last(&mut self.meals, entry)
    }

    /// # Errors
    /// `ValidationError::MissingIngredient` for a blank name or non-positive grams.
    pub fn add_ingredient(
        &mut self,
        name: &str,
        grams: f64,
        per_100g: Per100g,
    ) -> Result<&IngredientLine, ValidationError> {
        validate_ingredient(name, grams)?;
        let line = IngredientLine::scaled(name.trim(), grams, per_100g);
        Ok(push_last(&mut self.recipe_draft.ingredients, line))
    }

    /// Removes the line at `index`; later lines shift down.
    /// # Errors
    /// `ValidationError::IngredientIndexOutOfRange` if there is no such line.
    pub fn remove_ingredient(&mut self, index: usize) -> Result<IngredientLine, ValidationError> {
        let len = self.recipe_draft.ingredients.len();
        if index >= len {
            return Err(ValidationError::IngredientIndexOutOfRange { index, len });
        }
        Ok(self.recipe_draft.ingredients.remove(index))
    }

    /// Moves the draft's totals into a new recipe meal and clears the draft.
    /// # Errors
    /// `ValidationError::EmptyRecipe` if the draft has no ingredients.
    pub fn save_recipe(
        &mut self,
        name: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<&MealEntry, ValidationError> {
        if self.recipe_draft.ingredients.is_empty() {
            return Err(ValidationError::EmptyRecipe);
        }
        let totals = self.recipe_draft.totals();
        self.recipe_draft.ingredients.clear();
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_RECIPE_NAME);
        Ok(self.push_meal(
            name,
            totals.protein,
            totals.calories,
            MealSource::Recipe,
            timestamp,
        ))
    }

    // --- Aggregates ---

    #[must_use]
    pub fn nutrition_totals(&self) -> NutritionTotals {
        nutrition_totals(&self.meals)
    }

    #[must_use]
    pub fn total_volume(&self) -> f64 {
        total_volume(&self.workouts)
    }

    #[must_use]
    pub fn recent_workouts(&self) -> Vec<&SetEntry> {
        recent(&self.workouts, RECENT_LIMIT)
    }

    #[must_use]
    pub fn recent_meals(&self) -> Vec<&MealEntry> {
        recent(&self.meals, RECENT_LIMIT)
    }

    #[must_use]
    pub fn progress(&self) -> ProgressSummary {
        ProgressSummary {
            total_workouts: self.workouts.len(),
            total_meals: self.meals.len(),
            total_volume: self.total_volume(),
            nutrition: self.nutrition_totals(),
        }
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0)
}

fn take_field<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = fields.remove(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring stored {}: {}", key, e);
            None
        }
    }
}

fn take_entries<T: DeserializeOwned>(value: Option<Value>, what: &str) -> Vec<T> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Dropping stored {} #{}: {}", what, index, e);
                    None
                }
            })
            .collect(),
        Some(_) => {
            warn!("Ignoring stored {} list: not an array", what);
            Vec::new()
        }
    }
}

fn take_recipe_draft(value: Option<Value>) -> RecipeDraft {
    let ingredients = match value {
        Some(Value::Object(mut draft)) => draft.remove("ingredients"),
        None | Some(Value::Null) => None,
        Some(_) => {
            warn!("Ignoring stored recipe draft: not an object");
            None
        }
    };
    let ingredients = take_entries::<Value>(ingredients, "ingredient")
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| ingredient_line(item, index))
        .collect();
    RecipeDraft { ingredients }
}

/// Reads one stored ingredient line. Lines from older versions carry a
/// free-text `amount` such as "100g" instead of `grams`.
fn ingredient_line(item: Value, index: usize) -> Option<IngredientLine> {
    let legacy_grams = item
        .get("amount")
        .and_then(Value::as_str)
        .and_then(grams_from_amount);
    let mut line: IngredientLine = match serde_json::from_value(item) {
        Ok(line) => line,
        Err(e) => {
            warn!("Dropping stored ingredient #{}: {}", index, e);
            return None;
        }
    };
    if line.grams <= 0.0 {
        if let Some(grams) = legacy_grams {
            line.grams = grams;
        }
    }
    if validate_ingredient(&line.name, line.grams).is_err() {
        warn!("Dropping stored ingredient '{}': no usable amount", line.name);
        return None;
    }
    Some(line)
}

/// Parses "100g", "100 g", "2.5 grams"; anything not in grams yields `None`.
fn grams_from_amount(amount: &str) -> Option<f64> {
    let amount = amount.trim();
    let end = amount
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(amount.len());
    let (number, unit) = amount.split_at(end);
    let unit = unit.trim().to_ascii_lowercase();
    if !(unit.is_empty() || unit == "g" || unit == "gram" || unit == "grams") {
        return None;
    }
    number.parse().ok().filter(|g: &f64| *g > 0.0)
}

fn push_last<T>(items: &mut Vec<T>, item: T) -> &T {
    items.push(item);
    &items[items.len() - 1]
}

/// Shared with the async ingredient path so a lookup is only made for valid input.
pub(crate) fn validate_ingredient(name: &str, grams: f64) -> Result<(), ValidationError> {
    if name.trim().is_empty() || !(grams > 0.0 && grams.is_finite()) {
        return Err(ValidationError::MissingIngredient);
    }
    Ok(())
}

#[must_use]
pub fn nutrition_totals(meals: &[MealEntry]) -> NutritionTotals {
    meals
        .iter()
        .fold(NutritionTotals::default(), |acc, meal| NutritionTotals {
            protein: acc.protein + meal.protein,
            calories: acc.calories + meal.calories,
        })
}

#[must_use]
pub fn total_volume(workouts: &[SetEntry]) -> f64 {
    workouts.iter().map(SetEntry::volume).sum()
}

/// Newest-first view of the last `n` items; the slice itself is untouched.
#[must_use]
pub fn recent<T>(items: &[T], n: usize) -> Vec<&T> {
    items.iter().rev().take(n).collect()
}
