use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-user exclusive sections for stores that update by read-modify-write.
///
/// An entry lives only while some task holds or waits on it.
#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

pub struct UserGuard<'a> {
    locks: &'a UserLocks,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserLocks {
    pub async fn lock(&self, user_id: &str) -> UserGuard<'_> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let lock = self.locks.entry(user_id.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;

        UserGuard {
            locks: self,
            user_id: user_id.to_string(),
            guard: Some(guard),
        }
    }

    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        self.locks
            .locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn test_entries_released() {
        let locks = UserLocks::default();

        {
            let _a = locks.lock("alice").await;
            let _b = locks.lock("bob").await;
            assert_eq!(locks.tracked(), 2);
        }

        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_same_user_is_exclusive() {
        let locks = Arc::new(UserLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();

                tokio::spawn(async move {
                    let _guard = locks.lock("alice").await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::default();
        let _alice = locks.lock("alice").await;

        let bob = tokio::time::timeout(Duration::from_millis(100), locks.lock("bob")).await;

        assert!(bob.is_ok());
    }
}
