use kernel_sync::{Parker, SpinLock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn unpark_before_park_is_not_lost() {
    let parker = Parker::for_current();
    parker.unpark();
    // Returns immediately by consuming the pending wake-up.
    parker.park();
}

#[test]
fn park_blocks_until_unparked() {
    let woke = Arc::new(AtomicBool::new(false));
    let slot: Arc<SpinLock<Option<Arc<Parker>>>> = Arc::new(SpinLock::new(None));

    let sleeper = {
        let woke = Arc::clone(&woke);
        let slot = Arc::clone(&slot);
        thread::spawn(move || {
            let me = Parker::for_current();
            slot.with_lock(|s| *s = Some(Arc::clone(&me)));
            me.park();
            woke.store(true, Ordering::SeqCst);
        })
    };

    let parker = loop {
        if let Some(p) = slot.with_lock(|s| s.clone()) {
            break p;
        }
        thread::yield_now();
    };
    assert_eq!(parker.thread_id(), sleeper.thread().id());

    thread::sleep(Duration::from_millis(20));
    assert!(!woke.load(Ordering::SeqCst));

    parker.unpark();
    sleeper.join().unwrap();
    assert!(woke.load(Ordering::SeqCst));
}

#[test]
fn queue_of_parkers_wakes_one_at_a_time() {
    let queue: Arc<SpinLock<VecDeque<Arc<Parker>>>> = Arc::new(SpinLock::new(VecDeque::new()));
    let done = Arc::new(SpinLock::new(Vec::new()));

    let handles: Vec<_> = (0..3_u32)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let me = Parker::for_current();
                queue.with_lock(|q| q.push_back(Arc::clone(&me)));
                me.park();
                done.with_lock(|d| d.push(id));
            })
        })
        .collect();

    while queue.with_lock(|q| q.len()) < 3 {
        thread::yield_now();
    }

    for woken in 1..=3 {
        let next = queue.with_lock(VecDeque::pop_front).unwrap();
        next.unpark();
        while done.with_lock(|d| d.len()) < woken {
            thread::yield_now();
        }
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(done.with_lock(|d| d.len()), 3);
}
