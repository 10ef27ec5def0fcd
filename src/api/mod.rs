use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::controller::{ListState, LiveListController, ProfileState};
use crate::error::AppError;
use crate::models::*;
use crate::repository::Repository;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DoneRequest {
    pub done: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddExercisesRequest {
    pub exercise_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BmiResponse {
    pub bmi: Option<f64>,
    pub category: Option<&'static str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/exercises", get(list_exercises).post(create_exercise))
        .route("/exercises/message", delete(clear_exercise_message))
        .route("/exercises/{id}", delete(delete_exercise))
        .route("/exercises/{id}/done", patch(toggle_exercise))
        .route("/meals", get(list_meals).post(create_meal))
        .route("/meals/message", delete(clear_meal_message))
        .route("/meals/{id}", delete(delete_meal))
        .route("/meals/{id}/done", patch(toggle_meal))
        .route("/progress", get(list_progress).post(create_progress))
        .route("/progress/message", delete(clear_progress_message))
        .route("/progress/{id}", delete(delete_progress))
        .route("/workouts", get(list_workouts).post(create_workout))
        .route("/workouts/message", delete(clear_workout_message))
        .route("/workouts/{id}", delete(delete_workout))
        .route("/workouts/{id}/done", patch(toggle_workout))
        .route("/workouts/{id}/reset", post(reset_workout))
        .route("/workouts/{id}/exercises", post(add_workout_exercises))
        .route("/workouts/{id}/checklist", get(workout_checklist))
        .route("/workouts/{id}/items/{item_id}", delete(delete_workout_item))
        .route("/workouts/{id}/items/{item_id}/done", patch(toggle_workout_item))
        .route("/profile", get(get_profile).put(save_profile))
        .route("/profile/message", delete(clear_profile_message))
        .route("/profile/bmi", get(profile_bmi))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("select 1").execute(state.store.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(err) => {
            error!("health check failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Snapshot routes (re)start the feed; starting is a no-op while listening.
fn snapshot<R: Repository>(controller: &LiveListController<R>) -> Json<ListState<R::Item>> {
    controller.start_listening();
    Json(controller.state())
}

/// 202 once the write is under way, 400 with the rejection otherwise.
fn submitted<R: Repository>(
    controller: &LiveListController<R>,
    form: R::Form,
) -> Result<StatusCode, AppError> {
    match controller.add(form) {
        Some(_) => Ok(StatusCode::ACCEPTED),
        None => Err(AppError::validation(
            controller.state().message.unwrap_or_default(),
        )),
    }
}

async fn list_exercises(State(state): State<AppState>) -> Json<ListState<Exercise>> {
    snapshot(&state.exercises)
}

async fn create_exercise(
    State(state): State<AppState>,
    Json(form): Json<ExerciseForm>,
) -> Result<StatusCode, AppError> {
    submitted(&state.exercises, form)
}

async fn toggle_exercise(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DoneRequest>,
) -> StatusCode {
    state.exercises.toggle_done(&id, req.done);
    StatusCode::ACCEPTED
}

async fn delete_exercise(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.exercises.delete(&id);
    StatusCode::ACCEPTED
}

async fn clear_exercise_message(State(state): State<AppState>) -> StatusCode {
    state.exercises.clear_message();
    StatusCode::NO_CONTENT
}

async fn list_meals(State(state): State<AppState>) -> Json<ListState<Meal>> {
    snapshot(&state.meals)
}

async fn create_meal(
    State(state): State<AppState>,
    Json(form): Json<MealForm>,
) -> Result<StatusCode, AppError> {
    submitted(&state.meals, form)
}

async fn toggle_meal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DoneRequest>,
) -> StatusCode {
    state.meals.toggle_done(&id, req.done);
    StatusCode::ACCEPTED
}

async fn delete_meal(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.meals.delete(&id);
    StatusCode::ACCEPTED
}

async fn clear_meal_message(State(state): State<AppState>) -> StatusCode {
    state.meals.clear_message();
    StatusCode::NO_CONTENT
}

async fn list_progress(State(state): State<AppState>) -> Json<ListState<ProgressEntry>> {
    snapshot(&state.progress)
}

async fn create_progress(
    State(state): State<AppState>,
    Json(form): Json<ProgressForm>,
) -> Result<StatusCode, AppError> {
    submitted(&state.progress, form)
}

async fn delete_progress(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.progress.delete(&id);
    StatusCode::ACCEPTED
}

async fn clear_progress_message(State(state): State<AppState>) -> StatusCode {
    state.progress.clear_message();
    StatusCode::NO_CONTENT
}

async fn list_workouts(State(state): State<AppState>) -> Json<ListState<Workout>> {
    snapshot(&state.workouts)
}

async fn create_workout(
    State(state): State<AppState>,
    Json(form): Json<WorkoutForm>,
) -> Result<StatusCode, AppError> {
    submitted(&state.workouts, form)
}

async fn toggle_workout(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DoneRequest>,
) -> StatusCode {
    state.workouts.toggle_done(&id, req.done);
    StatusCode::ACCEPTED
}

async fn delete_workout(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.workouts.delete(&id);
    StatusCode::ACCEPTED
}

async fn clear_workout_message(State(state): State<AppState>) -> StatusCode {
    state.workouts.clear_message();
    StatusCode::NO_CONTENT
}

async fn toggle_workout_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, String)>,
    Json(req): Json<DoneRequest>,
) -> StatusCode {
    state.workouts.toggle_item_done(&id, &item_id, req.done);
    StatusCode::ACCEPTED
}

async fn delete_workout_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, String)>,
) -> StatusCode {
    state.workouts.delete_item(&id, &item_id);
    StatusCode::ACCEPTED
}

async fn reset_workout(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.workouts.reset_items(&id);
    StatusCode::ACCEPTED
}

async fn add_workout_exercises(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddExercisesRequest>,
) -> StatusCode {
    state.workouts.add_exercises(&id, req.exercise_ids);
    StatusCode::ACCEPTED
}

async fn workout_checklist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let workout = state
        .workouts
        .repository()
        .fetch_all()
        .await?
        .into_iter()
        .find(|w| w.id == id)
        .ok_or_else(|| AppError::NotFound(format!("workout {}", id)))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        checklist_text(&workout),
    ))
}

async fn get_profile(State(state): State<AppState>) -> Json<ProfileState> {
    state.profile.start_listening();
    Json(state.profile.state())
}

async fn save_profile(
    State(state): State<AppState>,
    Json(form): Json<ProfileForm>,
) -> Result<StatusCode, AppError> {
    match state.profile.save(form) {
        Some(_) => Ok(StatusCode::ACCEPTED),
        None => Err(AppError::validation(
            state.profile.state().message.unwrap_or_default(),
        )),
    }
}

async fn clear_profile_message(State(state): State<AppState>) -> StatusCode {
    state.profile.clear_message();
    StatusCode::NO_CONTENT
}

async fn profile_bmi(State(state): State<AppState>) -> Result<Json<BmiResponse>, AppError> {
    let bmi = state
        .profile
        .repository()
        .fetch()
        .await?
        .and_then(|profile| profile.bmi());
    Ok(Json(BmiResponse {
        bmi,
        category: bmi.map(|value| BmiCategory::from_bmi(value).label()),
    }))
}
