//! Serialize window/context work onto the thread that owns them.
//!
//! ## Rationale
//!
//! Native window handles and GL contexts are thread-affine: the platform only
//! permits touching them from the thread that created them. A program that
//! wants to resize its window from a worker thread, or toggle fullscreen from
//! wherever its logic happens to run, therefore needs some way to marshal
//! those calls onto the one privileged thread.
//!
//! ## Solution
//!
//! This library reifies that privileged thread as a [`MainThread`], a
//! single-threaded executor which owns a context value of the caller's
//! choosing and drains a queue of jobs against it. Any other thread holds a
//! cheap [`Handle`] and calls [`Handle::submit`], which blocks until the job
//! has run on the bound thread and hands back its result. Jobs execute
//! strictly in submission order and never concurrently, so the context needs
//! no locking of its own.
//!
//! The dispatch loop itself runs until a payload arrives on a termination
//! channel supplied to [`MainThread::run`]. Once the loop has exited, further
//! submissions are silently dropped ([`Handle::submit`] returns `None`), so a
//! fire-and-forget call racing against shutdown degrades to a no-op instead
//! of a crash.
//!
//! ## Caveat
//!
//! Submitting from the bound thread itself (from inside a job) would wait
//! for a loop that is waiting for the job, and deadlock. Code already on the
//! bound thread must call the underlying operation directly.

use crossbeam_channel::{
    Sender,
    Receiver,
    select,
    bounded,
    unbounded,
    never,
};
use tracing::*;


/// A unit of work executed on the bound thread against the context.
type Job<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Handle for submitting work to the bound thread from anywhere else.
pub struct Handle<C> {
    jobs: Sender<Job<C>>,
}

// derived Clone would demand C: Clone
impl<C> Clone for Handle<C> {
    fn clone(&self) -> Self {
        Handle { jobs: self.jobs.clone() }
    }
}

impl<C> Handle<C> {
    /// Run `f` on the bound thread, blocking until it has executed, and
    /// return its result.
    ///
    /// Returns `None` without running `f` if the dispatch loop has already
    /// shut down. Must not be called from the bound thread itself (see the
    /// crate docs on deadlock).
    pub fn submit<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut C) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (send_result, recv_result) = bounded(1);
        let job: Job<C> = Box::new(move |ctx| {
            let _ = send_result.send(f(ctx));
        });
        if self.jobs.send(job).is_err() {
            // loop already shut down
            return None;
        }
        // a job dropped unexecuted at shutdown drops its sender, releasing us
        recv_result.recv().ok()
    }
}

/// The bound-thread side: owns the context and drains the job queue.
pub struct MainThread<C> {
    ctx: C,
    jobs: Receiver<Job<C>>,
}

/// Create a dispatcher bound to the calling thread, owning `ctx`.
pub fn main_thread<C>(ctx: C) -> (MainThread<C>, Handle<C>) {
    let (send_job, recv_job) = unbounded();
    (
        MainThread { ctx, jobs: recv_job },
        Handle { jobs: send_job },
    )
}

impl<C> MainThread<C> {
    /// The dispatch loop. Repeatedly selects between the next submitted job,
    /// which is executed immediately and signaled complete before the next is
    /// taken, and the termination channel, whose payload ends the loop and is
    /// returned. A closed termination channel ends the loop with `None`.
    pub fn run<T>(mut self, term: Receiver<T>) -> Option<T> {
        trace!("entering dispatch loop");
        let mut jobs = self.jobs;
        loop {
            select! {
                recv(jobs) -> job => match job {
                    Ok(job) => job(&mut self.ctx),
                    // all handles dropped; wait on termination alone
                    Err(_) => jobs = never(),
                },
                recv(term) -> payload => {
                    trace!("dispatch loop terminated");
                    return payload.ok();
                }
            }
        }
    }

}


#[cfg(test)]
use std::thread;

#[test]
fn test_submission_order_across_threads() {
    let (mt, handle) = main_thread(0u64);
    let (send_term, recv_term) = bounded(1);

    let mut workers = Vec::new();
    for _ in 0..4 {
        let handle = handle.clone();
        workers.push(thread::spawn(move || {
            let mut last = 0;
            for _ in 0..100 {
                let got = handle
                    .submit(|count| {
                        *count += 1;
                        *count
                    })
                    .unwrap();
                // each submission completed before the next began
                assert!(got > last);
                last = got;
            }
        }));
    }
    thread::spawn(move || {
        for worker in workers {
            worker.join().unwrap();
        }
        let total = handle.submit(|count| *count).unwrap();
        send_term.send(total).unwrap();
    });

    assert_eq!(mt.run(recv_term), Some(400));
}

#[test]
fn test_submit_after_shutdown_is_silent_noop() {
    let (mt, handle) = main_thread(0u64);
    let (send_term, recv_term) = bounded(1);
    send_term.send(17).unwrap();
    assert_eq!(mt.run(recv_term), Some(17));
    assert_eq!(
        handle.submit(|count| {
            *count += 1;
            *count
        }),
        None,
    );
}

#[test]
fn test_closed_term_channel_ends_loop() {
    let (mt, handle) = main_thread(());
    let (send_term, recv_term) = bounded::<()>(1);
    drop(send_term);
    assert_eq!(mt.run(recv_term), None);
    assert_eq!(handle.submit(|_| ()), None);
}

#[test]
fn test_jobs_mutate_context_in_order() {
    let (mt, handle) = main_thread(Vec::new());
    let (send_term, recv_term) = bounded(1);
    thread::spawn(move || {
        for i in 0..10 {
            handle.submit(move |log: &mut Vec<u32>| log.push(i)).unwrap();
        }
        let log = handle.submit(|log: &mut Vec<u32>| log.clone()).unwrap();
        send_term.send(log).unwrap();
    });
    assert_eq!(mt.run(recv_term), Some((0..10).collect::<Vec<u32>>()));
}
