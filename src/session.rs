use std::sync::{Arc, RwLock};

use tracing::info;

/// The signed-in owner, or none. Cloning shares the same slot, so a sign-out
/// is seen by every repository holding a clone on its next call.
#[derive(Clone, Debug, Default)]
pub struct Session {
    owner: Arc<RwLock<Option<String>>>,
}

impl Session {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(owner: impl Into<String>) -> Self {
        let session = Self::default();
        session.sign_in(owner);
        session
    }

    pub fn sign_in(&self, owner: impl Into<String>) {
        let owner = owner.into();
        info!("session signed in as {}", owner);
        if let Ok(mut slot) = self.owner.write() {
            *slot = Some(owner);
        }
    }

    pub fn sign_out(&self) {
        info!("session signed out");
        if let Ok(mut slot) = self.owner.write() {
            *slot = None;
        }
    }

    pub fn current_owner(&self) -> Option<String> {
        self.owner
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .filter(|owner| !owner.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_sign_out() {
        let session = Session::signed_in("alice");
        let other = session.clone();
        assert_eq!(other.current_owner().as_deref(), Some("alice"));

        session.sign_out();
        assert_eq!(other.current_owner(), None);
    }

    #[test]
    fn test_empty_owner_is_signed_out() {
        let session = Session::signed_in("");
        assert_eq!(session.current_owner(), None);
    }
}
