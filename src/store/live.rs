use std::future::Future;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::path_is_within;
use crate::error::AppError;

/// A running live query. Removing or dropping it stops delivery.
#[derive(Debug)]
pub struct ListenerRegistration {
    watched: String,
    handle: JoinHandle<()>,
}

impl ListenerRegistration {
    pub fn watched(&self) -> &str {
        &self.watched
    }

    pub fn remove(self) {}
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        info!("listener on {} removed", self.watched);
        self.handle.abort();
    }
}

/// Delivers `fetch()` once immediately and again after every change under
/// `watched`. Changes that queue up while a fetch is running collapse into
/// one re-fetch. Fetch failures go to `on_error`; the listener keeps going.
///
/// `changes` must be subscribed before calling so nothing committed between
/// the subscription and the first fetch is missed.
pub fn listen<T, Fetch, Fut, OnUpdate, OnError>(
    mut changes: broadcast::Receiver<String>,
    watched: String,
    fetch: Fetch,
    on_update: OnUpdate,
    on_error: OnError,
) -> ListenerRegistration
where
    T: Send + 'static,
    Fetch: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    OnUpdate: Fn(T) + Send + 'static,
    OnError: Fn(String) + Send + 'static,
{
    info!("listening on {}", watched);
    let path = watched.clone();

    let handle = tokio::spawn(async move {
        loop {
            match fetch().await {
                Ok(snapshot) => {
                    debug!("delivering snapshot of {}", path);
                    on_update(snapshot);
                }
                Err(e) => {
                    warn!("live query on {} failed: {}", path, e);
                    on_error(e.to_string());
                }
            }

            if !wait_for_change(&mut changes, &path).await {
                debug!("change feed closed, listener on {} exiting", path);
                return;
            }
        }
    });

    ListenerRegistration { watched, handle }
}

/// Returns false once the feed is closed.
async fn wait_for_change(changes: &mut broadcast::Receiver<String>, watched: &str) -> bool {
    loop {
        match changes.recv().await {
            Ok(changed) if path_is_within(&changed, watched) => break,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!("listener on {} lagged by {} changes, re-fetching", watched, skipped);
                break;
            }
            Err(RecvError::Closed) => return false,
        }
    }

    loop {
        match changes.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Closed) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_delivers_initial_and_matching_changes_only() {
        let (tx, _) = broadcast::channel::<String>(16);
        let counter = Arc::new(Mutex::new(0usize));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let fetch_counter = counter.clone();
        let sink = seen.clone();
        let registration = listen(
            tx.subscribe(),
            "users/u1/meals".to_string(),
            move || {
                let counter = fetch_counter.clone();
                async move {
                    let mut n = counter.lock().expect("lock");
                    *n += 1;
                    Ok::<_, AppError>(*n)
                }
            },
            move |n| sink.lock().expect("lock").push(n),
            |_| {},
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send("users/u2/meals".to_string()).expect("send");
        tx.send("users/u1/mealsx".to_string()).expect("send");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().expect("lock"), vec![1]);

        tx.send("users/u1/meals".to_string()).expect("send");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().expect("lock"), vec![1, 2]);

        registration.remove();
        tx.send("users/u1/meals".to_string()).ok();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().expect("lock"), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_fetch_errors_do_not_stop_the_listener() {
        let (tx, _) = broadcast::channel::<String>(16);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(Mutex::new(0usize));

        let sink = errors.clone();
        let fetch_calls = calls.clone();
        let _registration = listen(
            tx.subscribe(),
            "c".to_string(),
            move || {
                let calls = fetch_calls.clone();
                async move {
                    let mut n = calls.lock().expect("lock");
                    *n += 1;
                    if *n == 1 {
                        Err(AppError::validation("offline"))
                    } else {
                        Ok(())
                    }
                }
            },
            |_| {},
            move |msg| sink.lock().expect("lock").push(msg),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send("c".to_string()).expect("send");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*errors.lock().expect("lock"), vec!["offline".to_string()]);
        assert_eq!(*calls.lock().expect("lock"), 2);
    }
}
