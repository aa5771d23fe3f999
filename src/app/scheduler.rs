use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One mutex per device id, handed out on demand. Holding a device's lock serializes
/// multi-step workflows against that device; different devices never contend.
#[derive(Default)]
pub struct DeviceLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_lock(&self, device_id: &str) -> Arc<Mutex<()>> {
        let mut guard = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn device_lock_serializes_same_device() {
        let locks = Arc::new(DeviceLocks::new());
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let locks = Arc::clone(&locks);
            let running = Arc::clone(&running);
            let max_running = Arc::clone(&max_running);
            handles.push(thread::spawn(move || {
                let lock = locks.device_lock("emulator-5554");
                let _guard = lock.lock().expect("lock");
                let current = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(current, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.join().expect("join");
        }

        assert_eq!(max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_devices_get_different_locks() {
        let locks = DeviceLocks::new();
        let a = locks.device_lock("emulator-5554");
        let b = locks.device_lock("emulator-5556");
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &locks.device_lock("emulator-5554")));
    }
}
