#![cfg(target_os = "linux")]

//! End-to-end condvar scenarios: signal and broadcast delivery, FIFO chain
//! ordering, timeout postconditions, the timeout-vs-signal race, and the
//! failing-mutex paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chainwake_core::errno;
use chainwake_core::{Condvar, Deadline, Mutex, MutexOps, WaitError};

fn wait_for_queued(cv: &Condvar, expected: usize) {
    while cv.waiters() != expected {
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn s1_signal_wakes_a_waiter_holding_the_mutex() {
    let cv = Arc::new(Condvar::new());
    let m = Arc::new(Mutex::new());

    let cv2 = cv.clone();
    let m2 = m.clone();
    let waiter = thread::spawn(move || {
        m2.lock();
        let result = cv2.timed_wait(&*m2, Deadline::INFINITE);
        // The mutex must be held again on the signalled path.
        assert!(!m2.try_lock());
        m2.unlock();
        result
    });

    wait_for_queued(&cv, 1);
    m.lock();
    cv.signal(1);
    m.unlock();

    assert_eq!(waiter.join().unwrap(), Ok(()));
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn s2_timeout_returns_late_with_mutex_held_and_empty_list() {
    let cv = Condvar::new();
    let m = Mutex::new();

    m.lock();
    let start = Instant::now();
    let result = cv.timed_wait(&m, Deadline::after(Duration::from_millis(10)));
    let elapsed = start.elapsed();

    assert_eq!(result, Err(WaitError::TimedOut));
    assert!(elapsed >= Duration::from_millis(10), "woke early: {elapsed:?}");
    assert!(!m.try_lock());
    m.unlock();
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn s3_broadcast_reacquires_in_enqueue_order() {
    let cv = Arc::new(Condvar::new());
    let m = Arc::new(Mutex::new());
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..3usize {
        let cv2 = cv.clone();
        let m2 = m.clone();
        let order2 = order.clone();
        handles.push(thread::spawn(move || {
            m2.lock();
            let result = cv2.timed_wait(&*m2, Deadline::INFINITE);
            // Recorded while holding the mutex: the log order is exactly the
            // order the mutex was re-acquired in.
            order2.lock().unwrap().push(id);
            m2.unlock();
            result
        }));
        wait_for_queued(&cv, id + 1);
    }

    cv.broadcast();
    for h in handles {
        assert_eq!(h.join().unwrap(), Ok(()));
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn s4_timeout_vs_signal_race_has_exactly_one_outcome() {
    for _ in 0..200 {
        let cv = Arc::new(Condvar::new());
        let m = Arc::new(Mutex::new());

        let cv2 = cv.clone();
        let m2 = m.clone();
        let waiter = thread::spawn(move || {
            m2.lock();
            let result = cv2.timed_wait(&*m2, Deadline::after(Duration::from_millis(1)));
            m2.unlock();
            result
        });

        // Aim the signal at the deadline; either side may win.
        thread::sleep(Duration::from_millis(1));
        cv.signal(1);

        let result = waiter.join().unwrap();
        assert!(
            matches!(result, Ok(()) | Err(WaitError::TimedOut)),
            "unexpected outcome: {result:?}"
        );
        assert_eq!(cv.waiters(), 0);
    }
}

#[test]
fn s5_leaving_handshake_under_signal_pressure() {
    for _ in 0..100 {
        let cv = Arc::new(Condvar::new());
        let m = Arc::new(Mutex::new());
        let a_done = Arc::new(AtomicBool::new(false));

        let cv2 = cv.clone();
        let m2 = m.clone();
        let a_done2 = a_done.clone();
        let a = thread::spawn(move || {
            m2.lock();
            let result = cv2.timed_wait(&*m2, Deadline::after(Duration::from_millis(15)));
            m2.unlock();
            a_done2.store(true, Ordering::SeqCst);
            result
        });

        let cv3 = cv.clone();
        let m3 = m.clone();
        let b = thread::spawn(move || {
            m3.lock();
            let result = cv3.timed_wait(&*m3, Deadline::INFINITE);
            m3.unlock();
            result
        });

        // Both queued, or A already gone and B queued alone.
        loop {
            let queued = cv.waiters();
            if queued >= 2 || (a_done.load(Ordering::SeqCst) && queued >= 1) {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        // Land the signal near A's deadline so some rounds catch A LEAVING.
        thread::sleep(Duration::from_millis(12));
        cv.signal(2);

        let result_b = b.join().unwrap();
        let result_a = a.join().unwrap();
        assert_eq!(result_b, Ok(()), "the infinite waiter must be claimed");
        assert!(
            matches!(result_a, Ok(()) | Err(WaitError::TimedOut)),
            "unexpected outcome: {result_a:?}"
        );
        assert_eq!(cv.waiters(), 0);
    }
}

#[test]
fn s6_partial_signal_leaves_the_newest_queued() {
    let cv = Arc::new(Condvar::new());
    let m = Arc::new(Mutex::new());
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..3usize {
        let cv2 = cv.clone();
        let m2 = m.clone();
        let order2 = order.clone();
        handles.push(thread::spawn(move || {
            m2.lock();
            let result = cv2.timed_wait(&*m2, Deadline::INFINITE);
            order2.lock().unwrap().push(id);
            m2.unlock();
            result
        }));
        wait_for_queued(&cv, id + 1);
    }

    cv.signal(2);

    // The two oldest return, in order; the newest stays queued.
    let mut handles = handles.into_iter();
    for expected in 0..2usize {
        let h = handles.next().unwrap();
        assert_eq!(h.join().unwrap(), Ok(()));
        assert!(order.lock().unwrap().contains(&expected));
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1]);
    assert_eq!(cv.waiters(), 1);

    cv.broadcast();
    let h = handles.next().unwrap();
    assert_eq!(h.join().unwrap(), Ok(()));
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(cv.waiters(), 0);
}

/// Mutex whose relock paths always fail, for the timeout-path error channel.
struct DoomedMutex {
    inner: Mutex,
}

impl MutexOps for DoomedMutex {
    fn futex_word(&self) -> &AtomicU32 {
        self.inner.futex_word()
    }
    fn lock(&self) -> Result<(), i32> {
        Err(errno::EDEADLK)
    }
    fn lock_with_waiters(&self, _waiters_delta: i32) -> Result<(), i32> {
        Err(errno::EDEADLK)
    }
    fn unlock(&self) {
        self.inner.unlock();
    }
}

#[test]
fn badstate_when_timeout_relock_fails() {
    let cv = Condvar::new();
    let m = DoomedMutex { inner: Mutex::new() };

    m.inner.lock();
    let result = cv.timed_wait(&m, Deadline::after(Duration::from_millis(5)));
    assert_eq!(result, Err(WaitError::BadState(errno::EDEADLK)));
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn badstate_when_signalled_relock_fails() {
    let cv = Arc::new(Condvar::new());
    let m = Arc::new(DoomedMutex { inner: Mutex::new() });

    let cv2 = cv.clone();
    let m2 = m.clone();
    let waiter = thread::spawn(move || {
        m2.inner.lock();
        cv2.timed_wait(&*m2, Deadline::INFINITE)
    });

    wait_for_queued(&cv, 1);
    cv.signal(1);

    assert_eq!(
        waiter.join().unwrap(),
        Err(WaitError::BadState(errno::EDEADLK))
    );
    assert_eq!(cv.waiters(), 0);
}

/// Mutex whose first `lock_with_waiters` fails, so one waiter in a chain
/// reports BadState while its successor must still be handed forward.
struct TrippingMutex {
    inner: Mutex,
    tripped: AtomicBool,
}

impl MutexOps for TrippingMutex {
    fn futex_word(&self) -> &AtomicU32 {
        self.inner.futex_word()
    }
    fn lock(&self) -> Result<(), i32> {
        MutexOps::lock(&self.inner)
    }
    fn lock_with_waiters(&self, waiters_delta: i32) -> Result<(), i32> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(errno::EDEADLK);
        }
        self.inner.lock_with_waiters(waiters_delta)
    }
    fn unlock(&self) {
        self.inner.unlock();
    }
}

#[test]
fn badstate_waiter_still_hands_the_chain_forward() {
    let cv = Arc::new(Condvar::new());
    let m = Arc::new(TrippingMutex {
        inner: Mutex::new(),
        tripped: AtomicBool::new(false),
    });

    let mut handles = Vec::new();
    for i in 0..2usize {
        let cv2 = cv.clone();
        let m2 = m.clone();
        handles.push(thread::spawn(move || {
            MutexOps::lock(&*m2).unwrap();
            let result = cv2.timed_wait(&*m2, Deadline::INFINITE);
            if result.is_ok() {
                m2.unlock();
            }
            result
        }));
        wait_for_queued(&cv, i + 1);
    }

    cv.broadcast();

    // The oldest waiter trips the failure and returns without the mutex,
    // but must already have released its successor toward the mutex word.
    let mut handles = handles.into_iter();
    let first = handles.next().unwrap().join().unwrap();
    assert_eq!(first, Err(WaitError::BadState(errno::EDEADLK)));

    // Stand in for recovery: cycle the mutex so a requeued successor parked
    // on its word gets a wake.
    m.lock_with_waiters(0).unwrap();
    m.unlock();

    let second = handles.next().unwrap().join().unwrap();
    assert_eq!(second, Ok(()));
    assert_eq!(cv.waiters(), 0);
}
