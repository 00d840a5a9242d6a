//! `Send`/`Sync` for [`MasterKey`].
//!
//! `MemSafe` holds a raw pointer to its protected pages, which suppresses the
//! auto traits. Every access to those pages in `MasterKey` goes through an
//! `RwLock` write guard, and the mlock/mprotect calls are thread-safe at the OS
//! level, so sharing the key across threads cannot race.

use super::keys::MasterKey;

// SAFETY: the pointer inside MemSafe is only dereferenced while the owning
// RwLock is held, and the pointed-to pages stay valid for the key's lifetime
// regardless of which thread drops it.
unsafe impl Send for MasterKey {}

// SAFETY: shared references only reach key bytes through RwLock::write, so
// concurrent `&MasterKey` use is serialized per key half.
unsafe impl Sync for MasterKey {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn master_key_is_send_and_sync() {
        assert_send_sync::<MasterKey>();
        assert_send_sync::<Arc<MasterKey>>();
    }

    #[test]
    fn concurrent_key_access() {
        let key = Arc::new(MasterKey::random().expect("generate key"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let key = Arc::clone(&key);
                thread::spawn(move || {
                    for _ in 0..50 {
                        if i % 2 == 0 {
                            key.with_aes_key(|k| k[0]).expect("access key");
                        } else {
                            key.with_siv_key(|k| k[0]).expect("access key");
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread completed");
        }
    }
}
