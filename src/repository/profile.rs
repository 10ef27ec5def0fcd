use std::sync::Arc;

use tracing::info;

use super::{OnError, owner_path, resolve_owner};
use crate::error::AppError;
use crate::models::UserProfile;
use crate::session::Session;
use crate::store::{DocumentStore, ListenerRegistration, WriteBatch, listen, owner_collection};

pub const PROFILE_COLLECTION: &str = "profile";
pub const PROFILE_DOC: &str = "main";

pub type OnProfile = Arc<dyn Fn(Option<UserProfile>) + Send + Sync>;

/// The owner's single profile document.
#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
    session: Session,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session) -> Self {
        Self { store, session }
    }

    pub async fn fetch(&self) -> Result<Option<UserProfile>, AppError> {
        let path = owner_path(&self.session, PROFILE_COLLECTION)?;
        let doc = self.store.get(&path, PROFILE_DOC).await?;
        Ok(doc.as_ref().map(UserProfile::decode))
    }

    /// Delivers `None` until a profile has been saved. Signed out behaves
    /// like the list repositories: `None`, then the error, then nothing.
    pub fn subscribe(
        &self,
        on_update: OnProfile,
        on_error: OnError,
    ) -> Option<ListenerRegistration> {
        let Ok(path) = owner_path(&self.session, PROFILE_COLLECTION) else {
            on_update(None);
            on_error(AppError::NotLoggedIn.to_string());
            return None;
        };

        let store = self.store.clone();
        let fetch_path = path.clone();
        Some(listen(
            self.store.changes(),
            path,
            move || {
                let store = store.clone();
                let path = fetch_path.clone();
                async move {
                    let doc = store.get(&path, PROFILE_DOC).await?;
                    Ok::<_, AppError>(doc.as_ref().map(UserProfile::decode))
                }
            },
            move |profile| on_update(profile),
            move |msg| on_error(msg),
        ))
    }

    /// Replaces the whole document.
    pub async fn save(&self, profile: &UserProfile) -> Result<(), AppError> {
        let owner = resolve_owner(&self.session)?;
        let mut batch = WriteBatch::new();
        batch.set(
            owner_collection(&owner, PROFILE_COLLECTION),
            PROFILE_DOC,
            profile.to_fields(),
        );
        self.store.commit(batch).await?;
        info!("saved profile for {}", owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileForm;
    use crate::store::SqliteStore;

    #[tokio::test]
    async fn test_save_then_fetch() {
        let store = Arc::new(
            SqliteStore::in_memory()
                .await
                .expect("Failed to create test store"),
        );
        let repo = ProfileRepository::new(store, Session::signed_in("u1"));
        assert_eq!(repo.fetch().await.expect("fetch"), None);

        let profile = ProfileForm {
            full_name: "Sam Lee".into(),
            height_cm: "180".into(),
            weight_kg: "81".into(),
            ..Default::default()
        }
        .validate()
        .expect("valid");
        repo.save(&profile).await.expect("save");

        let stored = repo.fetch().await.expect("fetch").expect("profile");
        assert_eq!(stored.full_name, "Sam Lee");
        assert_eq!(stored.height_cm, 180);
        assert!((stored.weight_kg - 81.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_signed_out_save_fails() {
        let store = Arc::new(SqliteStore::in_memory().await.expect("store"));
        let repo = ProfileRepository::new(store, Session::signed_out());
        let profile = ProfileForm {
            full_name: "Sam".into(),
            ..Default::default()
        }
        .validate()
        .expect("valid");
        assert!(matches!(repo.save(&profile).await, Err(AppError::NotLoggedIn)));
    }
}
