//! State holders that sit between a repository's live feed and whatever
//! renders it.

pub mod feed;
pub mod list;
pub mod profile;
pub mod state;
pub mod workout;

use crate::repository::{ExerciseRepository, MealRepository, ProgressRepository};

pub use feed::LiveFeed;
pub use list::LiveListController;
pub use profile::{ProfileController, ProfileState};
pub use state::{ListEvent, ListState, StateCell};
pub use workout::WorkoutController;

pub type ExerciseController = LiveListController<ExerciseRepository>;
pub type MealController = LiveListController<MealRepository>;
pub type ProgressController = LiveListController<ProgressRepository>;
