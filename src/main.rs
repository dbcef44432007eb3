//src/main.rs
mod cli;

use anyhow::{bail, Context, Result};
use chrono::Local;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io::{self, stdout};
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

use ssculpt_lib::asset_cache::{AssetCache, HttpFetcher, Method, Request, RequestMode, ResponseSource};
use ssculpt_lib::lookup::UsdaClient;
use ssculpt_lib::{
    db, AppService, IngredientLine, LookupStatus, MealEntry, PlannedExercise,
    SetEntry, Units, ValidationError,
};

const LOG_ENV_VAR: &str = "SSCULPT_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli_args = cli::parse_args();
    let export_csv = cli_args.export_csv;

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();
        eprintln!("Generating completion script for {shell}...");
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    // Loads config, opens the database and restores state
    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;
    let header_color = service.config.header_color().unwrap_or(Color::Green);
    let units = service.config.units;

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::Plan { day } => {
            if let Some(day) = day {
                service.set_day(day);
            }
            println!("{}", service.state.selected_day);
            print_plan_table(service.plan_for_selected_day(), header_color);
        }
        cli::Commands::Screen { screen } => {
            service.set_screen(screen);
            println!("Selected screen: {screen}");
        }
        cli::Commands::LogSet {
            exercise,
            weight,
            reps,
        } => match service.log_set(&exercise, weight, reps) {
            Ok(entry) => println!(
                "Logged {} ({}): {} {} × {} reps",
                entry.exercise_name,
                entry.day,
                entry.weight,
                units.weight_label(),
                entry.reps
            ),
            Err(e) => bail!("{}", e),
        },
        cli::Commands::LogMeal {
            name,
            protein,
            calories,
        } => match service.log_meal(name.as_deref(), protein, calories) {
            Ok(meal) => println!(
                "Logged meal '{}': {:.1} g protein, {:.0} kcal",
                meal.name, meal.protein, meal.calories
            ),
            Err(e) => bail!("{}", e),
        },
        cli::Commands::Lookup { query } => {
            let query = query.join(" ");
            if query.trim().is_empty() {
                bail!("{}", ValidationError::MissingFoodQuery);
            }
            let client = UsdaClient::from_config(&service.config)?;
            eprintln!("{}", LookupStatus::Pending.message());
            let status = AppService::search_food(&client, &query).await?;
            service.apply_lookup(&status);
            match status {
                LookupStatus::Found(food) => {
                    println!("{}", food.name);
                    println!("Calories: {}", fmt_optional(food.calories, ""));
                    println!("Protein:  {}", fmt_optional(food.protein, " g"));
                    println!("Carbs:    {}", fmt_optional(food.carbs, " g"));
                    println!("Fat:      {}", fmt_optional(food.fat, " g"));
                    println!("Values are per 100g or standard serving (USDA data).");
                    println!("Logged as a meal.");
                }
                other => println!("{}", other.message()),
            }
        }
        cli::Commands::Ingredient { action } => match action {
            cli::IngredientAction::Add { name, grams } => {
                let client = UsdaClient::from_config(&service.config)?;
                eprintln!("{}", LookupStatus::Pending.message());
                let per_100g = match AppService::lookup_ingredient(&client, &name, grams).await {
                    Ok(per_100g) => per_100g,
                    Err(e) => bail!("{}", e),
                };
                match service.add_ingredient_with_nutrients(&name, grams, per_100g) {
                    Ok(line) => println!(
                        "Added {} g {}: {:.1} g protein, {:.0} kcal",
                        line.grams, line.name, line.protein, line.calories
                    ),
                    Err(e) => bail!("{}", e),
                }
            }
            cli::IngredientAction::Remove { index } => match service.remove_ingredient(index) {
                Ok(line) => println!("Removed {} ({} g)", line.name, line.grams),
                Err(e) => bail!("{}", e),
            },
            cli::IngredientAction::List => {
                let ingredients = &service.state.recipe_draft.ingredients;
                if ingredients.is_empty() {
                    println!("The recipe draft is empty.");
                } else {
                    print_ingredient_table(ingredients, header_color);
                    let totals = service.recipe_totals();
                    println!(
                        "Total: {:.1} g protein, {:.0} kcal",
                        totals.protein, totals.calories
                    );
                }
            }
        },
        cli::Commands::Recipe { action } => match action {
            cli::RecipeAction::Save { name } => match service.save_recipe(name.as_deref()) {
                Ok(meal) => println!(
                    "Saved '{}' as a meal: {:.1} g protein, {:.0} kcal",
                    meal.name, meal.protein, meal.calories
                ),
                Err(e) => bail!("{}", e),
            },
        },
        cli::Commands::Progress => {
            let summary = service.progress();
            println!("Total Workouts Logged: {}", summary.total_workouts);
            println!(
                "Total Volume ({} × reps): {}",
                units.weight_label(),
                summary.total_volume
            );
            println!("Total Meals Logged: {}", summary.total_meals);
            println!(
                "Total Protein Logged: {:.1} g",
                summary.nutrition.protein
            );
            println!(
                "Total Calories Logged: {:.0} kcal",
                summary.nutrition.calories
            );
            let workouts = service.state.recent_workouts();
            let meals = service.state.recent_meals();
            if export_csv {
                print_workout_csv(workouts)?;
                print_meal_csv(meals)?;
            } else {
                println!("\nRecent workouts");
                print_workout_table(&workouts, header_color, units);
                println!("\nRecent meals");
                print_meal_table(&meals, header_color);
            }
        }
        cli::Commands::Export { kind } => match kind {
            cli::ExportKind::Workouts => print_workout_csv(service.state.workouts.iter().collect())?,
            cli::ExportKind::Meals => print_meal_csv(service.state.meals.iter().collect())?,
        },
        cli::Commands::Assets { action } => {
            run_asset_command(&service, action, header_color).await?;
        }
        cli::Commands::DbPath => {
            println!("Database file is located at: {:?}", service.get_db_path());
        }
        cli::Commands::ConfigPath => {
            println!("Config file is located at: {:?}", service.get_config_path());
        }
    }

    Ok(())
}

async fn run_asset_command(
    service: &AppService,
    action: cli::AssetAction,
    header_color: Color,
) -> Result<()> {
    let base = service.config.asset_base()?;
    let cache_path = db::get_asset_cache_path().context("Failed to determine asset cache path")?;
    let conn = db::open_db(&cache_path)
        .with_context(|| format!("Failed to open asset cache at {cache_path:?}"))?;
    let fetcher = HttpFetcher::new(Duration::from_secs(service.config.lookup_timeout_secs))?;
    let mut cache = AssetCache::new(conn, &service.config.cache_name, &base, fetcher)?;

    match action {
        cli::AssetAction::Install => {
            let count = cache.install().await?;
            println!("Cached {} assets in '{}'", count, cache.cache_name());
        }
        cli::AssetAction::Activate => {
            let removed = cache.activate()?;
            if removed.is_empty() {
                println!("'{}' is active.", cache.cache_name());
            } else {
                println!(
                    "'{}' is active. Removed: {}",
                    cache.cache_name(),
                    removed.join(", ")
                );
            }
        }
        cli::AssetAction::Fetch {
            path,
            navigate,
            method,
        } => {
            let url = match Url::parse(&path) {
                Ok(url) => url,
                Err(_) => base.join(&path).with_context(|| format!("Invalid path '{path}'"))?,
            };
            let method = Method::from_str(&method)
                .map_err(|_| anyhow::anyhow!("Unsupported method '{method}'"))?;
            let mode = if navigate {
                RequestMode::Navigate
            } else {
                RequestMode::Subresource
            };
            let response = cache.handle_fetch(&Request::new(url, method, mode)).await?;
            let source = match response.source {
                ResponseSource::Network => "network",
                ResponseSource::Cache => "cache",
            };
            println!(
                "{} {} from {} ({} bytes, {})",
                response.status,
                response.url,
                source,
                response.body.len(),
                response.content_type.as_deref().unwrap_or("unknown type")
            );
        }
        cli::AssetAction::Status => {
            let status = cache.status()?;
            println!("State: {} (current cache '{}')", status.state, status.current_bucket);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    header_cell("Cache", header_color),
                    header_cell("Entries", header_color),
                ]);
            for (name, count) in status.buckets {
                table.add_row(vec![Cell::new(name), Cell::new(count)]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn fmt_optional(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v}{unit}"))
}

fn header_cell(text: &str, color: Color) -> Cell {
    Cell::new(text).fg(color).add_attribute(Attribute::Bold)
}

fn print_plan_table(exercises: &[PlannedExercise], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("Exercise", header_color),
            header_cell("Prescription", header_color),
            header_cell("Video", header_color),
        ]);
    for ex in exercises {
        table.add_row(vec![
            Cell::new(ex.name),
            Cell::new(ex.prescription),
            Cell::new(ex.video.unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn print_ingredient_table(ingredients: &[IngredientLine], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("#", header_color),
            header_cell("Ingredient", header_color),
            header_cell("Grams", header_color),
            header_cell("Protein (g)", header_color),
            header_cell("Calories", header_color),
        ]);
    for (idx, line) in ingredients.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx),
            Cell::new(&line.name),
            Cell::new(format!("{}", line.grams)),
            Cell::new(format!("{:.1}", line.protein)),
            Cell::new(format!("{:.0}", line.calories)),
        ]);
    }
    println!("{table}");
}

fn print_workout_table(workouts: &[&SetEntry], header_color: Color, units: Units) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("Date", header_color),
            header_cell("Day", header_color),
            header_cell("Exercise", header_color),
            header_cell(&format!("Weight ({})", units.weight_label()), header_color),
            header_cell("Reps", header_color),
        ]);
    for w in workouts {
        table.add_row(vec![
            Cell::new(w.timestamp.with_timezone(&Local).format("%Y-%m-%d")),
            Cell::new(&w.day),
            Cell::new(&w.exercise_name),
            Cell::new(w.weight),
            Cell::new(w.reps),
        ]);
    }
    println!("{table}");
}

fn print_meal_table(meals: &[&MealEntry], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("Date", header_color),
            header_cell("Meal", header_color),
            header_cell("Protein (g)", header_color),
            header_cell("Calories", header_color),
            header_cell("Source", header_color),
        ]);
    for m in meals {
        table.add_row(vec![
            Cell::new(m.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
            Cell::new(&m.name),
            Cell::new(format!("{:.1}", m.protein)),
            Cell::new(format!("{:.0}", m.calories)),
            Cell::new(m.source),
        ]);
    }
    println!("{table}");
}

fn print_workout_csv(workouts: Vec<&SetEntry>) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["timestamp", "day", "exercise", "weight", "reps"])?;
    for w in workouts {
        writer.write_record([
            w.timestamp.to_rfc3339(),
            w.day.clone(),
            w.exercise_name.clone(),
            w.weight.to_string(),
            w.reps.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_meal_csv(meals: Vec<&MealEntry>) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["timestamp", "name", "protein", "calories", "source"])?;
    for m in meals {
        writer.write_record([
            m.timestamp.to_rfc3339(),
            m.name.clone(),
            m.protein.to_string(),
            m.calories.to_string(),
            m.source.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
