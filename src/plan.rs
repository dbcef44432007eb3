//src/plan.rs
//! The fixed four-day training plan shown on the exercises screen.

use crate::state::Day;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedExercise {
    pub name: &'static str,
    /// Sets × reps or a duration, as displayed.
    pub prescription: &'static str,
    pub video: Option<&'static str>,
}

const fn ex(
    name: &'static str,
    prescription: &'static str,
    video: Option<&'static str>,
) -> PlannedExercise {
    PlannedExercise {
        name,
        prescription,
        video,
    }
}

const DAY_1: &[PlannedExercise] = &[
    ex(
        "Incline Dumbbell Press",
        "4 × 10",
        Some("https://www.youtube.com/embed/8iPEnn-ltC8"),
    ),
    ex(
        "Dumbbell Shoulder Press",
        "3 × 10",
        Some("https://www.youtube.com/embed/qEwKCR5JCog"),
    ),
    ex(
        "Push-ups",
        "3 × max",
        Some("https://www.youtube.com/embed/IODxDxX7oi4"),
    ),
];

const DAY_2: &[PlannedExercise] = &[
    ex(
        "1-Arm Dumbbell Row",
        "4 × 10",
        Some("https://www.youtube.com/embed/pYcpY20QaE8"),
    ),
    ex(
        "Pull-ups",
        "3 × max",
        Some("https://www.youtube.com/embed/eGo4IYlbE5g"),
    ),
    ex(
        "Dumbbell Deadlift",
        "4 × 10",
        Some("https://www.youtube.com/embed/3b6C3QvKpCU"),
    ),
];

// Conditioning day, no demo videos
const DAY_3: &[PlannedExercise] = &[
    ex("Brisk Walk / Light Jog", "20–30 min", None),
    ex("Mobility / Stretching", "10–15 min", None),
];

const DAY_4: &[PlannedExercise] = &[
    ex(
        "Goblet Squat",
        "4 × 12",
        Some("https://www.youtube.com/embed/6xw0L4x0YhQ"),
    ),
    ex(
        "Reverse Lunges",
        "3 × 10 / leg",
        Some("https://www.youtube.com/embed/2JbQlaX6eX8"),
    ),
    ex(
        "Dumbbell RDL",
        "4 × 10",
        Some("https://www.youtube.com/embed/5XnR9E2i7qU"),
    ),
];

#[must_use]
pub const fn exercises_for(day: Day) -> &'static [PlannedExercise] {
    match day {
        Day::Day1 => DAY_1,
        Day::Day2 => DAY_2,
        Day::Day3 => DAY_3,
        Day::Day4 => DAY_4,
    }
}

/// Case-insensitive lookup of an exercise within one day of the plan.
#[must_use]
pub fn find_exercise(day: Day, name: &str) -> Option<&'static PlannedExercise> {
    let wanted = name.trim();
    exercises_for(day)
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(wanted))
}
