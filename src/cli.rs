// src/cli.rs
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use ssculpt_lib::{Day, Screen};

#[derive(Parser, Debug)]
#[command(author, version, about = "Track sets, meals and recipes from the terminal", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print list output as CSV instead of a table
    #[arg(long, global = true)]
    pub export_csv: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Workouts,
    Meals,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the exercise plan for the selected day
    Plan {
        /// Switch to this day first (e.g. "Day 2" or 2)
        #[arg(short, long)]
        day: Option<Day>,
    },
    /// Change the selected screen
    Screen { screen: Screen },
    /// Log a set of an exercise from the selected day's plan
    LogSet {
        /// Exercise name as shown by `plan`
        #[arg(short, long)]
        exercise: String,
        /// Weight used (lbs)
        #[arg(short, long)]
        weight: Option<f64>,
        /// Repetitions performed
        #[arg(short, long)]
        reps: Option<u32>,
    },
    /// Log a meal by hand
    LogMeal {
        #[arg(short, long)]
        name: Option<String>,
        /// Protein in grams
        #[arg(short, long)]
        protein: Option<f64>,
        /// Energy in kcal
        #[arg(short, long)]
        calories: Option<f64>,
    },
    /// Search the food database; the best match is logged as a meal
    Lookup {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Edit the recipe draft
    Ingredient {
        #[command(subcommand)]
        action: IngredientAction,
    },
    /// Commit the recipe draft as a meal
    Recipe {
        #[command(subcommand)]
        action: RecipeAction,
    },
    /// Show totals and the most recent entries
    Progress,
    /// Write all workouts or meals as CSV to stdout
    Export {
        #[arg(value_enum)]
        kind: ExportKind,
    },
    /// Manage the offline asset cache
    Assets {
        #[command(subcommand)]
        action: AssetAction,
    },
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    /// Generate shell completion scripts
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum IngredientAction {
    /// Look up an ingredient and add it to the draft
    Add {
        name: String,
        /// Amount in grams
        #[arg(short, long)]
        grams: f64,
    },
    /// Remove the ingredient at a position (as shown by `ingredient list`)
    Remove { index: usize },
    /// List the draft with running totals
    List,
}

#[derive(Subcommand, Debug)]
pub enum RecipeAction {
    /// Save the draft's totals as a meal and clear the draft
    Save {
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AssetAction {
    /// Pre-cache the asset manifest
    Install,
    /// Remove caches from previous versions and start serving
    Activate,
    /// Request a resource through the cache
    Fetch {
        /// Path relative to the asset base URL, or an absolute URL
        path: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
        #[arg(long, default_value = "GET")]
        method: String,
    },
    /// Show lifecycle state and cached entries
    Status,
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
