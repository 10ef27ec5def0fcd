use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use super::feed::LiveFeed;
use super::state::StateCell;
use crate::models::{ProfileForm, UserProfile};
use crate::repository::profile::OnProfile;
use crate::repository::{OnError, ProfileRepository};

pub const PROFILE_SAVED: &str = "Profile saved";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileState {
    pub profile: Option<UserProfile>,
    pub loading: bool,
    pub message: Option<String>,
}

impl Default for ProfileState {
    fn default() -> Self {
        Self {
            profile: None,
            loading: true,
            message: None,
        }
    }
}

pub struct ProfileController {
    repo: Arc<ProfileRepository>,
    feed: LiveFeed<ProfileState>,
}

impl ProfileController {
    pub fn new(repo: ProfileRepository) -> Self {
        Self {
            repo: Arc::new(repo),
            feed: LiveFeed::new(ProfileState::default()),
        }
    }

    pub fn repository(&self) -> &ProfileRepository {
        &self.repo
    }

    fn cell(&self) -> &StateCell<ProfileState> {
        self.feed.cell()
    }

    pub fn state(&self) -> ProfileState {
        self.cell().snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<ProfileState> {
        self.cell().subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.feed.is_listening()
    }

    pub fn start_listening(&self) {
        self.feed.start(
            |cell| {
                cell.update(|state| {
                    state.loading = true;
                    state.message = None;
                })
            },
            |updates| {
                let errors = updates.clone();
                let on_update: OnProfile = Arc::new(move |profile| {
                    updates.update(|state| {
                        state.profile = profile;
                        state.loading = false;
                    });
                });
                let on_error: OnError = Arc::new(move |message| {
                    errors.update(|state| {
                        state.loading = false;
                        state.message = Some(message);
                    });
                });
                self.repo.subscribe(on_update, on_error)
            },
        );
    }

    pub fn stop_listening(&self) {
        self.feed.stop();
    }

    /// The saved profile shows up through the subscription.
    pub fn save(&self, form: ProfileForm) -> Option<JoinHandle<()>> {
        let profile = match form.validate() {
            Ok(profile) => profile,
            Err(e) => {
                self.cell().update(|state| state.message = Some(e.to_string()));
                return None;
            }
        };

        let repo = self.repo.clone();
        let bound = self.cell().bind();
        Some(tokio::spawn(async move {
            let message = match repo.save(&profile).await {
                Ok(()) => PROFILE_SAVED.to_string(),
                Err(e) => {
                    warn!("profile save failed: {}", e);
                    e.to_string()
                }
            };
            bound.update(|state| state.message = Some(message));
        }))
    }

    pub fn clear_message(&self) {
        self.cell().update(|state| state.message = None);
    }
}
