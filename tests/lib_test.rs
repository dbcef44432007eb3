use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use ssculpt_lib::lookup::parse_search_response;
use ssculpt_lib::{
    db, load_config_util, parse_color, AppService, ApplicationState, Config, ConfigError, Day,
    FoodMatch, IngredientError, LookupError, LookupStatus, MealSource, NutrientLookup, Per100g,
    Screen, StandardColor, Units, ValidationError, STORAGE_KEY,
};

// Helper function to create a test service with in-memory database
fn create_test_service() -> Result<AppService> {
    let conn = rusqlite::Connection::open_in_memory()?;
    AppService::with_connection(
        Config::default(),
        conn,
        ":memory:".into(),
        "test_config.toml".into(),
    )
}

// Helper: a service whose storage already holds `raw` under the state key
fn service_with_stored_blob(raw: &str) -> Result<AppService> {
    let conn = rusqlite::Connection::open_in_memory()?;
    db::init_kv(&conn)?;
    db::set_item(&conn, STORAGE_KEY, raw)?;
    AppService::with_connection(
        Config::default(),
        conn,
        ":memory:".into(),
        "test_config.toml".into(),
    )
}

/// Lookup stub returning a fixed answer and counting calls.
struct StubLookup {
    answer: Option<FoodMatch>,
    offline: bool,
    calls: AtomicUsize,
}

impl StubLookup {
    fn found(name: &str, protein: Option<f64>, calories: Option<f64>) -> Self {
        Self {
            answer: Some(FoodMatch {
                name: name.to_string(),
                protein,
                calories,
                ..FoodMatch::default()
            }),
            offline: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn no_match() -> Self {
        Self {
            answer: None,
            offline: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn offline() -> Self {
        Self {
            answer: None,
            offline: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NutrientLookup for StubLookup {
    async fn search(&self, _query: &str) -> Result<Option<FoodMatch>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(LookupError::Status {
                status: 503,
                body: "network down".to_string(),
            });
        }
        Ok(self.answer.clone())
    }
}

// --- Loading and merging ---

#[test]
fn test_load_without_stored_state_gives_defaults() -> Result<()> {
    let service = create_test_service()?;
    assert_eq!(service.state, ApplicationState::default());
    assert_eq!(service.state.selected_screen, Screen::Exercises);
    assert_eq!(service.state.selected_day, Day::Day1);
    Ok(())
}

#[test]
fn test_load_merges_missing_fields_with_defaults() -> Result<()> {
    let service = service_with_stored_blob(r#"{"selectedDay":"Day 3"}"#)?;

    assert_eq!(service.state.selected_day, Day::Day3);
    assert!(service.state.workouts.is_empty());
    assert!(service.state.meals.is_empty());
    assert_eq!(service.state.selected_screen, Screen::Exercises);
    assert!(service.state.recipe_draft.ingredients.is_empty());
    Ok(())
}

#[test]
fn test_load_recipe_draft_merges_one_level_deep() -> Result<()> {
    let service = service_with_stored_blob(r#"{"selectedScreen":"recipes","recipeDraft":{}}"#)?;
    assert_eq!(service.state.selected_screen, Screen::Recipes);
    assert!(service.state.recipe_draft.ingredients.is_empty());

    let service = service_with_stored_blob(
        r#"{"recipeDraft":{"ingredients":[{"name":"Oats","grams":50,"protein":6.5,"calories":190}]}}"#,
    )?;
    let ingredients = &service.state.recipe_draft.ingredients;
    assert_eq!(ingredients.len(), 1);
    assert_eq!(ingredients[0].name, "Oats");
    assert_eq!(ingredients[0].grams, 50.0);
    Ok(())
}

#[test]
fn test_load_reads_blob_from_older_schema() -> Result<()> {
    let legacy = r#"{
        "selectedScreen": "progress",
        "selectedDay": "Day 2",
        "workouts": [
            {"ts": "2024-03-01T10:15:00.000Z", "day": "Day 2", "exercise": "Pull-ups", "weight": 10, "reps": 8}
        ],
        "meals": [
            {"ts": "2024-03-01T12:00:00.000Z", "name": "Lentils", "protein": 9, "calories": 116, "source": "USDA"}
        ],
        "recipe": {"ingredients": [{"name": "rice", "amount": "100g"}]}
    }"#;
    let service = service_with_stored_blob(legacy)?;
    let state = &service.state;

    assert_eq!(state.selected_screen, Screen::Progress);
    assert_eq!(state.selected_day, Day::Day2);
    assert_eq!(state.workouts.len(), 1);
    assert_eq!(state.workouts[0].exercise_name, "Pull-ups");
    assert_eq!(state.workouts[0].reps, 8);
    assert_eq!(state.meals[0].source, MealSource::ExternalLookup);
    // Old ingredient lines had a free-text amount and no nutrient data
    assert_eq!(state.recipe_draft.ingredients.len(), 1);
    assert_eq!(state.recipe_draft.ingredients[0].name, "rice");
    assert_eq!(state.recipe_draft.ingredients[0].grams, 100.0);
    assert_eq!(state.recipe_draft.ingredients[0].calories, 0.0);
    Ok(())
}

#[test]
fn test_load_treats_nulls_as_missing() -> Result<()> {
    let service = service_with_stored_blob(
        r#"{"selectedDay":"Day 4","meals":null,"recipeDraft":null,
            "workouts":[{"day":"Day 4","exerciseName":"Goblet Squat","weight":null,"reps":5}]}"#,
    )?;
    assert_eq!(service.state.selected_day, Day::Day4);
    assert!(service.state.meals.is_empty());
    assert_eq!(service.state.workouts[0].weight, 0.0);
    assert_eq!(service.state.total_volume(), 0.0);
    Ok(())
}

#[test]
fn test_load_unparsable_blob_falls_back_to_defaults() -> Result<()> {
    let service = service_with_stored_blob("{not json")?;
    assert_eq!(service.state, ApplicationState::default());

    let service = service_with_stored_blob("[1, 2, 3]")?;
    assert_eq!(service.state, ApplicationState::default());
    Ok(())
}

#[test]
fn test_load_keeps_history_when_one_field_is_unreadable() -> Result<()> {
    let mut service = service_with_stored_blob(
        r#"{
            "selectedScreen": "settings",
            "selectedDay": "Day 2",
            "workouts": [
                {"timestamp": "2024-03-01T10:15:00Z", "day": "Day 2", "exerciseName": "Pull-ups", "weight": 10, "reps": 8}
            ],
            "meals": [
                {"timestamp": "2024-03-01T12:00:00Z", "name": "Oats", "protein": 10, "calories": 300, "source": "barcode"}
            ]
        }"#,
    )?;
    assert_eq!(service.state.selected_screen, Screen::Exercises);
    assert_eq!(service.state.selected_day, Day::Day2);
    assert_eq!(service.state.workouts.len(), 1);
    assert_eq!(service.state.meals.len(), 1);
    // Unknown sources read as manual entries
    assert_eq!(service.state.meals[0].source, MealSource::Manual);

    // The next write must not wipe what was loaded
    service.set_day(Day::Day3);
    let stored = AppService::load_state(&service.conn);
    assert_eq!(stored.workouts.len(), 1);
    assert_eq!(stored.meals.len(), 1);
    assert_eq!(stored.selected_day, Day::Day3);
    Ok(())
}

#[test]
fn test_load_drops_only_the_unreadable_entries() -> Result<()> {
    let service = service_with_stored_blob(
        r#"{
            "workouts": [
                {"day": "Day 1", "exerciseName": "Push-ups", "weight": 20, "reps": 10},
                {"day": "Day 1", "exerciseName": "Push-ups", "weight": 20, "reps": -3},
                "garbage"
            ],
            "meals": {"not": "a list"},
            "recipe": {"ingredients": [{"name": "old", "amount": "50g"}]},
            "recipeDraft": {"ingredients": [
                {"name": "Oats", "grams": 40, "protein": 5.2, "calories": 150},
                {"name": "Salt", "amount": "a pinch"},
                {"name": "Milk", "amount": "1 cup"}
            ]}
        }"#,
    )?;
    let state = &service.state;
    assert_eq!(state.workouts.len(), 1);
    assert_eq!(state.workouts[0].reps, 10);
    assert!(state.meals.is_empty());
    // The current key wins over the old one; lines without a gram amount are dropped
    let names: Vec<&str> = state
        .recipe_draft
        .ingredients
        .iter()
        .map(|l| l.name.as_str())
        .collect();
    assert_eq!(names, vec!["Oats"]);
    Ok(())
}

// --- Saving ---

#[test]
fn test_save_then_load_round_trip() -> Result<()> {
    let mut service = create_test_service()?;
    service.set_day(Day::Day2);
    service.log_set("Pull-ups", Some(15.0), Some(6))?;
    service.log_meal(Some("Eggs"), Some(12.5), Some(155.0))?;
    service.add_ingredient_with_nutrients(
        "Chicken",
        200.0,
        Per100g {
            protein: 31.0,
            calories: 165.0,
        },
    )?;
    service.set_screen(Screen::Recipes);

    let reloaded = AppService::load_state(&service.conn);
    assert_eq!(reloaded, service.state);
    Ok(())
}

#[test]
fn test_every_command_persists_immediately() -> Result<()> {
    let mut service = create_test_service()?;

    service.set_screen(Screen::Nutrition);
    assert_eq!(
        AppService::load_state(&service.conn).selected_screen,
        Screen::Nutrition
    );

    service.set_day(Day::Day4);
    assert_eq!(AppService::load_state(&service.conn).selected_day, Day::Day4);

    service.log_set("Goblet Squat", Some(40.0), Some(12))?;
    assert_eq!(AppService::load_state(&service.conn).workouts.len(), 1);

    service.log_meal(None, Some(20.0), None)?;
    assert_eq!(AppService::load_state(&service.conn).meals.len(), 1);

    service.add_ingredient_with_nutrients("Rice", 100.0, Per100g::default())?;
    assert_eq!(
        AppService::load_state(&service.conn)
            .recipe_draft
            .ingredients
            .len(),
        1
    );

    service.remove_ingredient(0)?;
    assert!(AppService::load_state(&service.conn)
        .recipe_draft
        .ingredients
        .is_empty());
    Ok(())
}

#[test]
fn test_save_failure_is_swallowed_and_memory_stays_authoritative() -> Result<()> {
    let mut service = create_test_service()?;
    service.conn.execute("DROP TABLE kv_store", [])?;

    let meal = service.log_meal(Some("Shake"), Some(25.0), Some(120.0))?;
    assert_eq!(meal.name, "Shake");
    assert_eq!(service.state.meals.len(), 1);
    assert!(!service.save_state());

    // Reading also fails now, which degrades to defaults
    assert_eq!(
        AppService::load_state(&service.conn),
        ApplicationState::default()
    );
    Ok(())
}

// --- Workouts ---

#[test]
fn test_log_set_records_selected_day_and_canonical_name() -> Result<()> {
    let mut service = create_test_service()?;
    let entry = service.log_set("incline dumbbell press", Some(45.0), Some(10))?;

    assert_eq!(entry.day, "Day 1");
    assert_eq!(entry.exercise_name, "Incline Dumbbell Press");
    assert_eq!(entry.weight, 45.0);
    assert_eq!(entry.reps, 10);
    Ok(())
}

#[test]
fn test_log_set_validation() -> Result<()> {
    let mut service = create_test_service()?;

    assert_eq!(
        service.log_set("Push-ups", None, Some(10)),
        Err(ValidationError::MissingSetValues)
    );
    assert_eq!(
        service.log_set("Push-ups", Some(0.0), Some(10)),
        Err(ValidationError::MissingSetValues)
    );
    assert_eq!(
        service.log_set("Push-ups", Some(20.0), Some(0)),
        Err(ValidationError::MissingSetValues)
    );
    // Goblet Squat is on Day 4, not Day 1
    assert!(matches!(
        service.log_set("Goblet Squat", Some(40.0), Some(12)),
        Err(ValidationError::ExerciseNotInPlan { day: Day::Day1, .. })
    ));

    assert!(service.state.workouts.is_empty());
    assert!(AppService::load_state(&service.conn).workouts.is_empty());
    Ok(())
}

#[test]
fn test_total_volume() -> Result<()> {
    let mut service = create_test_service()?;
    service.log_set("Incline Dumbbell Press", Some(100.0), Some(10))?;
    service.log_set("Dumbbell Shoulder Press", Some(50.0), Some(5))?;

    assert_eq!(service.state.total_volume(), 1250.0);
    assert_eq!(service.progress().total_volume, 1250.0);
    Ok(())
}

// --- Meals ---

#[test]
fn test_meal_totals() -> Result<()> {
    let mut service = create_test_service()?;
    service.log_meal(Some("Chicken"), Some(20.0), Some(300.0))?;
    service.log_meal(Some("Yogurt"), Some(10.0), Some(150.0))?;

    let totals = service.state.nutrition_totals();
    assert_eq!(totals.protein, 30.0);
    assert_eq!(totals.calories, 450.0);
    Ok(())
}

#[test]
fn test_log_meal_defaults_and_validation() -> Result<()> {
    let mut service = create_test_service()?;

    let meal = service.log_meal(Some("   "), None, Some(200.0))?;
    assert_eq!(meal.name, "Meal");
    assert_eq!(meal.protein, 0.0);
    assert_eq!(meal.source, MealSource::Manual);

    assert_eq!(
        service.log_meal(Some("Water"), None, None),
        Err(ValidationError::MissingMealValues)
    );
    assert_eq!(
        service.log_meal(Some("Water"), Some(0.0), Some(0.0)),
        Err(ValidationError::MissingMealValues)
    );
    assert_eq!(
        service.log_meal(Some("Odd"), Some(-1.0), Some(100.0)),
        Err(ValidationError::Negative("Protein"))
    );
    assert_eq!(service.state.meals.len(), 1);
    Ok(())
}

#[test]
fn test_log_meal_rejects_non_finite_values() -> Result<()> {
    let mut service = create_test_service()?;

    assert_eq!(
        service.log_meal(Some("x"), Some(f64::NAN), Some(100.0)),
        Err(ValidationError::NotANumber("Protein"))
    );
    assert_eq!(
        service.log_meal(Some("y"), Some(10.0), Some(f64::INFINITY)),
        Err(ValidationError::NotANumber("Calories"))
    );
    assert_eq!(
        service.log_meal(Some("z"), Some(f64::NEG_INFINITY), None),
        Err(ValidationError::NotANumber("Protein"))
    );
    assert!(service.state.meals.is_empty());

    service.log_meal(Some("Eggs"), Some(12.0), Some(155.0))?;
    let totals = service.state.nutrition_totals();
    assert_eq!(totals.protein, 12.0);
    assert_eq!(totals.calories, 155.0);
    assert_eq!(AppService::load_state(&service.conn), service.state);
    Ok(())
}

#[test]
fn test_recent_views_are_newest_first_and_capped() -> Result<()> {
    let mut service = create_test_service()?;
    for i in 1..=12 {
        service.log_meal(Some(&format!("Meal {i}")), Some(f64::from(i)), None)?;
    }

    let recent = service.state.recent_meals();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0].name, "Meal 12");
    assert_eq!(recent[9].name, "Meal 3");

    // Stored order is untouched
    assert_eq!(service.state.meals[0].name, "Meal 1");
    assert_eq!(service.state.meals[11].name, "Meal 12");
    Ok(())
}

// --- Recipes ---

#[test]
fn test_save_recipe_moves_totals_into_meal_log() -> Result<()> {
    let mut service = create_test_service()?;
    let per_100g = Per100g {
        protein: 10.0,
        calories: 100.0,
    };
    service.add_ingredient_with_nutrients("Beans", 100.0, per_100g)?;
    service.add_ingredient_with_nutrients("Beans", 50.0, per_100g)?;

    let totals = service.recipe_totals();
    assert_eq!(totals.protein, 15.0);
    assert_eq!(totals.calories, 150.0);

    let meal = service.save_recipe(None)?;
    assert_eq!(meal.protein, 15.0);
    assert_eq!(meal.calories, 150.0);
    assert_eq!(meal.source, MealSource::Recipe);
    assert_eq!(meal.name, "Recipe");
    assert!(service.state.recipe_draft.ingredients.is_empty());

    let stored = AppService::load_state(&service.conn);
    assert!(stored.recipe_draft.ingredients.is_empty());
    assert_eq!(stored.meals.len(), 1);
    Ok(())
}

#[test]
fn test_save_empty_recipe_is_rejected() -> Result<()> {
    let mut service = create_test_service()?;
    assert_eq!(
        service.save_recipe(Some("Nothing")),
        Err(ValidationError::EmptyRecipe)
    );
    assert!(service.state.meals.is_empty());
    Ok(())
}

#[test]
fn test_remove_ingredient_compacts_draft() -> Result<()> {
    let mut service = create_test_service()?;
    for name in ["Oats", "Milk", "Banana"] {
        service.add_ingredient_with_nutrients(name, 100.0, Per100g::default())?;
    }

    let removed = service.remove_ingredient(0)?;
    assert_eq!(removed.name, "Oats");
    let names: Vec<&str> = service
        .state
        .recipe_draft
        .ingredients
        .iter()
        .map(|l| l.name.as_str())
        .collect();
    assert_eq!(names, vec!["Milk", "Banana"]);

    assert_eq!(
        service.remove_ingredient(2),
        Err(ValidationError::IngredientIndexOutOfRange { index: 2, len: 2 })
    );
    Ok(())
}

#[test]
fn test_ingredient_validation() -> Result<()> {
    let mut service = create_test_service()?;
    assert_eq!(
        service.add_ingredient_with_nutrients("", 100.0, Per100g::default()),
        Err(ValidationError::MissingIngredient)
    );
    assert_eq!(
        service.add_ingredient_with_nutrients("Rice", 0.0, Per100g::default()),
        Err(ValidationError::MissingIngredient)
    );
    assert!(service.state.recipe_draft.ingredients.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_add_ingredient_scales_lookup_by_grams() -> Result<()> {
    let mut service = create_test_service()?;
    let lookup = StubLookup::found("Chicken breast", Some(20.0), Some(200.0));

    let per_100g = AppService::lookup_ingredient(&lookup, "chicken", 150.0).await?;
    let line = service.add_ingredient_with_nutrients("chicken", 150.0, per_100g)?;
    assert_eq!(line.name, "chicken");
    assert_eq!(line.grams, 150.0);
    assert_eq!(line.protein, 30.0);
    assert_eq!(line.calories, 300.0);
    assert_eq!(service.state.recipe_draft.ingredients.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_ingredient_lookup_without_match_yields_no_nutrients() {
    let result = AppService::lookup_ingredient(&StubLookup::no_match(), "unobtainium", 10.0).await;
    assert!(matches!(result, Err(IngredientError::NoMatch(ref name)) if name == "unobtainium"));

    let result = AppService::lookup_ingredient(&StubLookup::offline(), "rice", 10.0).await;
    assert!(matches!(result, Err(IngredientError::Lookup(_))));
}

#[tokio::test]
async fn test_ingredient_lookup_validates_before_searching() {
    let lookup = StubLookup::found("Rice", Some(2.7), Some(130.0));

    let result = AppService::lookup_ingredient(&lookup, "rice", -5.0).await;
    assert!(matches!(
        result,
        Err(IngredientError::Validation(ValidationError::MissingIngredient))
    ));
    let result = AppService::lookup_ingredient(&lookup, "  ", 100.0).await;
    assert!(matches!(result, Err(IngredientError::Validation(_))));
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ingredient_lookup_ignores_non_finite_nutrients() -> Result<()> {
    let lookup = StubLookup::found("Odd", Some(f64::NAN), Some(f64::INFINITY));
    let per_100g = AppService::lookup_ingredient(&lookup, "odd", 100.0).await?;
    assert_eq!(per_100g, Per100g::default());
    Ok(())
}

// --- Lookup ---

#[tokio::test]
async fn test_lookup_match_is_logged_as_meal() -> Result<()> {
    let mut service = create_test_service()?;
    let lookup = StubLookup::found("LENTILS, BOILED", Some(9.0), None);

    let status = AppService::search_food(&lookup, "lentils").await?;
    assert!(matches!(status, LookupStatus::Found(ref f) if f.name == "LENTILS, BOILED"));

    let logged = service.apply_lookup(&status).expect("a logged meal");
    assert_eq!(logged.name, "LENTILS, BOILED");
    assert_eq!(service.state.meals.len(), 1);
    let meal = &service.state.meals[0];
    assert_eq!(meal.source, MealSource::ExternalLookup);
    assert_eq!(meal.protein, 9.0);
    assert_eq!(meal.calories, 0.0);
    assert_eq!(AppService::load_state(&service.conn).meals.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_lookup_miss_or_failure_logs_nothing() -> Result<()> {
    let mut service = create_test_service()?;

    let status = AppService::search_food(&StubLookup::no_match(), "zzz").await?;
    assert_eq!(status, LookupStatus::NotFound);
    assert_eq!(status.message(), "No results found.");
    assert!(service.apply_lookup(&status).is_none());

    let status = AppService::search_food(&StubLookup::offline(), "rice").await?;
    assert!(matches!(status, LookupStatus::Failed(_)));
    assert!(status.message().contains("network down"));
    assert!(service.apply_lookup(&status).is_none());

    assert!(service.state.meals.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_blank_lookup_query_is_a_validation_error() {
    let lookup = StubLookup::found("Anything", Some(1.0), Some(1.0));

    let result = AppService::search_food(&lookup, "   ").await;
    assert_eq!(result, Err(ValidationError::MissingFoodQuery));
    assert_eq!(
        ValidationError::MissingFoodQuery.to_string(),
        "Please enter a food to search."
    );
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_navigation_works_while_lookup_is_pending() -> Result<()> {
    let mut service = create_test_service()?;
    let lookup = StubLookup::found("Greek yogurt", Some(10.0), Some(59.0));

    let pending = AppService::search_food(&lookup, "yogurt");
    service.set_screen(Screen::Progress);
    service.set_day(Day::Day3);
    let status = pending.await?;
    service.apply_lookup(&status);

    let stored = AppService::load_state(&service.conn);
    assert_eq!(stored.selected_screen, Screen::Progress);
    assert_eq!(stored.selected_day, Day::Day3);
    assert_eq!(stored.meals.len(), 1);
    assert_eq!(stored.meals[0].name, "Greek yogurt");
    Ok(())
}

#[test]
fn test_parse_search_response_picks_first_food() -> Result<()> {
    let body = r#"{
        "totalHits": 2,
        "foods": [
            {
                "description": "Lentils, mature seeds, cooked",
                "foodNutrients": [
                    {"nutrientName": "Protein", "unitName": "G", "value": 9.02},
                    {"nutrientName": "Total lipid (fat)", "unitName": "G", "value": 0.38},
                    {"nutrientName": "Carbohydrate, by difference", "unitName": "G", "value": 20.1},
                    {"nutrientName": "Energy", "unitName": "KCAL", "value": 116.0},
                    {"nutrientName": "Energy", "unitName": "kJ", "value": 485.0},
                    {"nutrientName": "Fiber, total dietary", "unitName": "G", "value": 7.9}
                ]
            },
            {"description": "Lentil soup", "foodNutrients": []}
        ]
    }"#;

    let food = parse_search_response(body)?.expect("a match");
    assert_eq!(food.name, "Lentils, mature seeds, cooked");
    assert_eq!(food.protein, Some(9.02));
    assert_eq!(food.fat, Some(0.38));
    assert_eq!(food.carbs, Some(20.1));
    assert_eq!(food.calories, Some(116.0));
    Ok(())
}

#[test]
fn test_parse_search_response_no_match_and_malformed() {
    assert!(matches!(parse_search_response(r#"{"foods":[]}"#), Ok(None)));
    assert!(matches!(parse_search_response(r#"{"foods":null}"#), Ok(None)));
    assert!(matches!(parse_search_response(r#"{}"#), Ok(None)));
    assert!(matches!(
        parse_search_response("<html>502</html>"),
        Err(LookupError::Malformed(_))
    ));

    let food = parse_search_response(r#"{"foods":[{"description":"Water"}]}"#)
        .unwrap()
        .unwrap();
    assert_eq!(food.calories, None);
    assert_eq!(food.per_100g(), Per100g::default());
}

#[test]
fn test_day_and_screen_parsing() {
    assert_eq!("Day 2".parse::<Day>().unwrap(), Day::Day2);
    assert_eq!("3".parse::<Day>().unwrap(), Day::Day3);
    assert_eq!("day 4".parse::<Day>().unwrap(), Day::Day4);
    assert!("Day 5".parse::<Day>().is_err());
    assert_eq!(Day::Day1.to_string(), "Day 1");

    assert_eq!("Progress".parse::<Screen>().unwrap(), Screen::Progress);
    assert!("settings".parse::<Screen>().is_err());
}

// --- Config ---

#[test]
fn test_config_load_writes_defaults_and_merges_partial_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");

    let config = load_config_util(&path)?;
    assert_eq!(config, Config::default());
    assert!(path.exists());

    std::fs::write(&path, "units = \"metric\"\n\n[theme]\nheader_color = \"cyan\"\n")?;
    let config = load_config_util(&path)?;
    assert_eq!(config.units, Units::Metric);
    assert_eq!(config.units.weight_label(), "kg");
    assert_eq!(config.cache_name, "ssculpt-cache-v4");
    assert_eq!(config.lookup_timeout_secs, 15);
    assert_eq!(parse_color(&config.theme.header_color)?, StandardColor::Cyan);
    assert!(config.header_color().is_ok());
    Ok(())
}

#[test]
fn test_config_rejects_bad_urls_and_colors() {
    let config = Config {
        asset_base_url: "not a url".to_string(),
        ..Config::default()
    };
    assert!(matches!(
        config.asset_base(),
        Err(ConfigError::InvalidUrl { field: "asset_base_url", .. })
    ));
    assert!(matches!(
        parse_color("chartreuse"),
        Err(ConfigError::InvalidColor(_))
    ));
}
