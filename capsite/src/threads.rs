use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::{Condvar, Mutex};

/// A native thread that can be joined from several places, with a timeout.
pub struct NativeThread {
    name: Option<String>,
    handle: Mutex<Option<JoinHandle<()>>>,
    done: (Mutex<bool>, Condvar),
}

/// Marks the thread done when dropped, so a panicking body still releases
/// its joiners.
struct DoneOnDrop(Arc<NativeThread>);

impl Drop for DoneOnDrop {
    fn drop(&mut self) {
        self.0.mark_done();
    }
}

impl NativeThread {
    pub fn spawn<F>(f: F) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let jt = Self::unstarted(None);
        let body = Self::body(Arc::clone(&jt), f);
        *jt.handle.lock() = Some(thread::spawn(body));
        jt
    }

    pub fn spawn_named<F>(name: impl Into<String>, f: F) -> io::Result<Arc<Self>>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let jt = Self::unstarted(Some(name.clone()));
        let body = Self::body(Arc::clone(&jt), f);
        let handle = thread::Builder::new().name(name).spawn(body)?;
        *jt.handle.lock() = Some(handle);
        Ok(jt)
    }

    fn unstarted(name: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            name,
            handle: Mutex::new(None),
            done: (Mutex::new(false), Condvar::new()),
        })
    }

    fn body<F>(jt: Arc<Self>, f: F) -> impl FnOnce() + Send + 'static
    where
        F: FnOnce() + Send + 'static,
    {
        let done = DoneOnDrop(jt);
        move || {
            let _done = done;
            f();
        }
    }

    fn mark_done(&self) {
        let (ref mx, ref cv) = self.done;
        *mx.lock() = true;
        cv.notify_all();
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        *self.done.0.lock()
    }

    /// Waits up to `dur` for the thread to finish. Returns whether it did.
    pub fn join_timeout(&self, dur: Duration) -> bool {
        let (ref mx, ref cv) = self.done;
        let mut done = mx.lock();
        if *done {
            return true;
        }
        let _ = cv.wait_while_for(&mut done, |done| !*done, dur);
        *done
    }

    /// Waits for the thread to finish. Returns `false` if it panicked.
    ///
    /// Only the first joiner learns about a panic; later joiners just wait.
    pub fn join(&self) -> bool {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            return handle.join().is_ok();
        }

        let (ref mx, ref cv) = self.done;
        let mut done = mx.lock();
        while !*done {
            cv.wait(&mut done);
        }
        true
    }
}
