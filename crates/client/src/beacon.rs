//! Teardown-safe logout beacon.
//!
//! A beacon is handed to a dedicated worker thread and the caller never waits
//! for it. The host drains the queue (bounded by a deadline) right before the
//! process exits, so a beacon queued while the session is being torn down is
//! still delivered. Ordinary requests give no such guarantee.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::client::{user_agent, MatrixClient};

/// Fire-and-forget send that survives session teardown.
pub trait Beacon {
    /// Queue a form POST. Returns false if the beacon could not be queued.
    fn send_beacon(&self, path: &str, form: &[(&'static str, String)]) -> bool;
}

struct BeaconRequest {
    url: String,
    form: Vec<(&'static str, String)>,
}

/// Beacon queue backed by a worker thread.
pub struct BeaconQueue {
    tx: Mutex<Option<mpsc::Sender<BeaconRequest>>>,
    done: Mutex<Option<mpsc::Receiver<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    base: MatrixClient,
    delivered: Arc<AtomicUsize>,
}

impl BeaconQueue {
    /// Start the worker. Beacons reuse the client's base URL and session cookie.
    pub fn start(client: &MatrixClient) -> Self {
        let (tx, rx) = mpsc::channel::<BeaconRequest>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let delivered = Arc::new(AtomicUsize::new(0));

        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent())
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");
        let cookie = client.cookie().map(String::from);
        let counter = Arc::clone(&delivered);

        let worker = thread::Builder::new()
            .name("secmatrix-beacon".into())
            .spawn(move || {
                for req in rx {
                    let mut builder = http.post(&req.url).form(&req.form);
                    if let Some(ref cookie) = cookie {
                        builder = builder.header(reqwest::header::COOKIE, cookie.as_str());
                    }
                    match builder.send() {
                        Ok(resp) => {
                            counter.fetch_add(1, Ordering::SeqCst);
                            log::info!("Beacon delivered to {} ({})", req.url, resp.status());
                        }
                        Err(e) => log::warn!("Beacon to {} failed: {}", req.url, e),
                    }
                }
                let _ = done_tx.send(());
            })
            .ok();

        if worker.is_none() {
            log::error!("Could not spawn beacon worker; beacons will be dropped");
        }

        Self {
            tx: Mutex::new(worker.as_ref().map(|_| tx)),
            done: Mutex::new(Some(done_rx)),
            worker: Mutex::new(worker),
            base: client.clone(),
            delivered,
        }
    }

    /// Number of beacons the server acknowledged with any HTTP status.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Stop accepting beacons and wait up to `deadline` for queued ones.
    /// Returns true if the queue was fully flushed.
    pub fn drain(&self, deadline: Duration) -> bool {
        // Closing the sender ends the worker loop once the queue is empty.
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }

        let flushed = match self.done.lock().ok().and_then(|mut d| d.take()) {
            Some(done) => done.recv_timeout(deadline).is_ok(),
            None => true,
        };

        if flushed {
            if let Some(worker) = self.worker.lock().ok().and_then(|mut w| w.take()) {
                let _ = worker.join();
            }
        } else {
            log::warn!("Beacon queue not flushed within {:?}", deadline);
        }
        flushed
    }
}

impl Beacon for BeaconQueue {
    fn send_beacon(&self, path: &str, form: &[(&'static str, String)]) -> bool {
        let Ok(guard) = self.tx.lock() else {
            return false;
        };
        let Some(tx) = guard.as_ref() else {
            log::warn!("Beacon queue closed, dropping beacon to {}", path);
            return false;
        };

        tx.send(BeaconRequest {
            url: self.base.url(path),
            form: form.to_vec(),
        })
        .is_ok()
    }
}
