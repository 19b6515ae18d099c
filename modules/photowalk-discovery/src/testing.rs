// Test mocks for the discovery pipeline.
//
// - MockSearcher: scripted responses, records every position it was asked about
// - StallingSearcher: never answers; reports when a search starts and when it is dropped
//
// Plus fixtures for the photos and positions used across tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Notify;

use photowalk_common::{GeoData, PhotoCandidate, Position};

use crate::traits::PhotoSearcher;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn photo(server: &str, id: &str, secret: &str, lat: f64, lon: f64) -> PhotoCandidate {
    PhotoCandidate {
        id: id.to_string(),
        server: server.to_string(),
        secret: secret.to_string(),
        geo: Some(GeoData { lat, lon }),
    }
}

pub fn untagged_photo(server: &str, id: &str, secret: &str) -> PhotoCandidate {
    PhotoCandidate {
        id: id.to_string(),
        server: server.to_string(),
        secret: secret.to_string(),
        geo: None,
    }
}

/// Geotagged at (50, 8).
pub fn photo1() -> PhotoCandidate {
    photo("12345", "976543", "abcdefg", 50.0, 8.0)
}

/// Geotagged at (50.1, 8.1).
pub fn photo2() -> PhotoCandidate {
    photo("67890", "324654", "zxcvbn", 50.1, 8.1)
}

pub const PHOTO1_URL: &str = "https://live.staticflickr.com/12345/976543_abcdefg.jpg";
pub const PHOTO2_URL: &str = "https://live.staticflickr.com/67890/324654_zxcvbn.jpg";

/// `base` moved roughly `metres` north.
pub fn north_of(base: Position, metres: f64) -> Position {
    Position::new(base.lat + metres / 111_195.0, base.lon)
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Scripted {
    Found(Vec<PhotoCandidate>),
    Fail(String),
}

/// Replays scripted responses in order; once the script runs out, the last
/// response repeats. With no script at all every search returns nothing.
pub struct MockSearcher {
    script: Mutex<VecDeque<Scripted>>,
    last: Mutex<Option<Scripted>>,
    calls: Mutex<Vec<Position>>,
    delay: Option<Duration>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Every search returns `candidates`.
    pub fn returning(candidates: Vec<PhotoCandidate>) -> Self {
        Self::new().then(candidates)
    }

    pub fn then(self, candidates: Vec<PhotoCandidate>) -> Self {
        self.script.lock().unwrap().push_back(Scripted::Found(candidates));
        self
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
        self
    }

    /// Every search takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Position> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_response(&self) -> Option<Scripted> {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.clone()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhotoSearcher for MockSearcher {
    async fn search(&self, position: Position) -> Result<Vec<PhotoCandidate>> {
        self.calls.lock().unwrap().push(position);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_response() {
            Some(Scripted::Found(candidates)) => Ok(candidates),
            Some(Scripted::Fail(message)) => bail!("MockSearcher: {message}"),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// StallingSearcher
// ---------------------------------------------------------------------------

/// A search that never completes. `started` fires when a search begins;
/// `was_cancelled` turns true once the pending search future is dropped.
pub struct StallingSearcher {
    pub started: Arc<Notify>,
    calls: AtomicUsize,
    cancelled: Arc<AtomicBool>,
}

impl StallingSearcher {
    pub fn new() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for StallingSearcher {
    fn default() -> Self {
        Self::new()
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PhotoSearcher for StallingSearcher {
    async fn search(&self, _position: Position) -> Result<Vec<PhotoCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _flag = DropFlag(self.cancelled.clone());
        self.started.notify_one();
        std::future::pending::<()>().await;
        Ok(Vec::new())
    }
}
