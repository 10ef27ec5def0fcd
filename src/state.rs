use std::sync::Arc;

use crate::controller::{
    ExerciseController, MealController, ProfileController, ProgressController, WorkoutController,
};
use crate::repository::{
    ExerciseRepository, MealRepository, ProfileRepository, ProgressRepository, WorkoutRepository,
};
use crate::session::Session;
use crate::store::{DocumentStore, SqliteStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub session: Session,
    pub exercises: Arc<ExerciseController>,
    pub meals: Arc<MealController>,
    pub progress: Arc<ProgressController>,
    pub workouts: Arc<WorkoutController>,
    pub profile: Arc<ProfileController>,
}

impl AppState {
    /// One controller per feature, all sharing the store and session.
    pub fn new(store: Arc<SqliteStore>, session: Session) -> Self {
        let shared: Arc<dyn DocumentStore> = store.clone();
        Self {
            exercises: Arc::new(ExerciseController::new(ExerciseRepository::new(
                shared.clone(),
                session.clone(),
            ))),
            meals: Arc::new(MealController::new(MealRepository::new(
                shared.clone(),
                session.clone(),
            ))),
            progress: Arc::new(ProgressController::new(ProgressRepository::new(
                shared.clone(),
                session.clone(),
            ))),
            workouts: Arc::new(WorkoutController::new(WorkoutRepository::new(
                shared.clone(),
                session.clone(),
            ))),
            profile: Arc::new(ProfileController::new(ProfileRepository::new(
                shared,
                session.clone(),
            ))),
            store,
            session,
        }
    }

    pub fn start_listening(&self) {
        self.exercises.start_listening();
        self.meals.start_listening();
        self.progress.start_listening();
        self.workouts.start_listening();
        self.profile.start_listening();
    }

    pub fn stop_listening(&self) {
        self.exercises.stop_listening();
        self.meals.stop_listening();
        self.progress.stop_listening();
        self.workouts.stop_listening();
        self.profile.stop_listening();
    }
}
