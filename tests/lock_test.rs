/*!
 * Lock Integration Tests
 *
 * Mutual exclusion, liveness and starvation bounds under real contention
 */

use kernel_sync::core::sync::{Lock, LockConfig, Locker, Mutex, Semaphore};
use kernel_sync::monitoring::try_init_tracing;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

/// Run `threads` workers that each take `locker` `iterations` times and
/// check nobody else is inside
fn hammer<L: Locker + 'static>(locker: Arc<L>, threads: usize, iterations: usize) -> usize {
    let inside = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let locker = locker.clone();
            let inside = inside.clone();
            let total = total.clone();
            thread::spawn(move || {
                for _ in 0..iterations {
                    locker.acquire();
                    let before = inside.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(before, 0, "two threads inside the critical section");
                    total.fetch_add(1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::SeqCst);
                    locker.release();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    total.load(Ordering::SeqCst)
}

#[test]
fn test_mutual_exclusion_default_config() {
    let _ = try_init_tracing();
    let lock = Arc::new(Lock::new());
    assert_eq!(hammer(lock.clone(), 8, 10_000), 80_000);
    assert!(lock.state().is_idle());
}

#[test]
fn test_mutual_exclusion_without_spinning() {
    let lock = Arc::new(Lock::with_config(Semaphore::new(), LockConfig::no_spin()));
    assert_eq!(hammer(lock.clone(), 8, 5_000), 40_000);
    assert!(lock.state().is_idle());
}

#[test]
fn test_mutual_exclusion_with_tiny_starvation_threshold() {
    // Forces frequent switches into starvation mode and back.
    let config = LockConfig {
        starvation_threshold: Duration::from_micros(1),
        ..LockConfig::DEFAULT
    };
    let lock = Arc::new(Lock::with_config(Semaphore::new(), config));
    assert_eq!(hammer(lock.clone(), 8, 5_000), 40_000);
    assert!(lock.state().is_idle());
    assert_eq!(lock.parker().waiter_count(), 0);
}

#[test]
fn test_all_waiters_eventually_acquire() {
    let lock = Arc::new(Lock::new());
    let (tx, rx) = mpsc::channel();

    lock.acquire();
    for id in 0..16 {
        let lock = lock.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            lock.acquire();
            thread::sleep(Duration::from_micros(100));
            lock.release();
            tx.send(id).unwrap();
        });
    }
    drop(tx);

    // Let them pile up behind the held lock.
    thread::sleep(Duration::from_millis(50));
    assert!(lock.state().waiters() > 0);
    lock.release();

    let mut finished = Vec::new();
    for _ in 0..16 {
        finished.push(
            rx.recv_timeout(Duration::from_secs(10))
                .expect("waiter never acquired the lock"),
        );
    }
    finished.sort();
    assert_eq!(finished, (0..16).collect::<Vec<_>>());
    assert!(lock.state().is_idle());
}

#[test]
fn test_waiter_not_starved_by_hot_loop() {
    let lock = Arc::new(Lock::new());
    let stop = Arc::new(AtomicBool::new(false));

    let hogs: Vec<_> = (0..4)
        .map(|_| {
            let lock = lock.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    lock.acquire();
                    // Hold briefly and re-acquire at once, the pattern that
                    // starves waiters without hand-off.
                    let deadline = Instant::now() + Duration::from_micros(50);
                    while Instant::now() < deadline {
                        std::hint::spin_loop();
                    }
                    lock.release();
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));

    let (tx, rx) = mpsc::channel();
    let victim_lock = lock.clone();
    thread::spawn(move || {
        let start = Instant::now();
        for _ in 0..10 {
            victim_lock.acquire();
            victim_lock.release();
        }
        tx.send(start.elapsed()).unwrap();
    });

    let waited = rx.recv_timeout(Duration::from_secs(10));
    stop.store(true, Ordering::Relaxed);
    for hog in hogs {
        hog.join().unwrap();
    }

    let waited = waited.expect("victim starved behind hot loop");
    assert!(waited < Duration::from_secs(5), "victim waited {:?}", waited);
}

#[test]
fn test_release_from_other_thread() {
    let lock = Arc::new(Lock::new());
    lock.acquire();

    let releaser = lock.clone();
    thread::spawn(move || releaser.release()).join().unwrap();

    assert!(lock.try_acquire());
    lock.release();
}

#[test]
fn test_static_mutex_counter() {
    static COUNTER: Mutex<u64> = Mutex::new(0);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                for _ in 0..2_500 {
                    *COUNTER.lock() += 1;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*COUNTER.lock(), 10_000);
}
