//! Rate-limited gateway
//!
//! The single mediator between the pipeline and a generation backend. It owns
//! the request budget, the per-call deadline, cancellation, and the mapping of
//! backend failures onto [`GatewayError`].

use crate::backend::{
    BackendFailure, GeneratedImage, GenerationBackend, ImageParams, MarkupParams,
};
use crate::config::LimitsConfig;
use glyphsmith_core::{CancellationToken, GatewayError};
use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);
/// How often a waiting caller re-checks the cancellation token
const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// How long an abandoning caller waits for the worker to observe its token
const WORKER_GRACE: Duration = Duration::from_millis(250);

/// Time source for the rate budget
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Sleep for `duration`; returns `false` if cancelled first
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool;
}

/// Wall clock with cancellable sleeps
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        !cancel.wait_timeout(duration)
    }
}

/// Manually advanced clock; `sleep` moves time forward instantly
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.advance(duration);
        true
    }
}

#[derive(Debug, Default)]
struct BudgetWindows {
    minute: VecDeque<Instant>,
    day: VecDeque<Instant>,
}

impl BudgetWindows {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.minute.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.minute.pop_front();
            } else {
                break;
            }
        }
        while let Some(&oldest) = self.day.front() {
            if now.saturating_duration_since(oldest) >= DAY {
                self.day.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding-window request budget.
///
/// All reads and writes happen under one mutex, so concurrent callers can
/// neither double-count nor lose a call. Entries expire by age; there is no
/// explicit reset.
pub struct RateBudget {
    per_window: usize,
    per_day: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<BudgetWindows>,
}

impl RateBudget {
    pub fn new(per_minute: usize, per_day: usize) -> Self {
        Self::with_clock(per_minute, per_day, MINUTE, Arc::new(SystemClock))
    }

    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self::new(limits.max_requests_per_minute, limits.max_requests_per_day)
    }

    pub fn with_clock(per_window: usize, per_day: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            per_window: per_window.max(1),
            per_day: per_day.max(1),
            window,
            clock,
            windows: Mutex::new(BudgetWindows::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BudgetWindows> {
        self.windows.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Wait until a slot is free, then record one call.
    ///
    /// The lock is released while sleeping and the check repeats after every
    /// wake-up, so a burst of callers never pushes the window past its ceiling.
    pub fn acquire(&self, cancel: &CancellationToken) -> Result<(), GatewayError> {
        loop {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            let wait = {
                let mut windows = self.lock();
                let now = self.clock.now();
                windows.prune(now, self.window);

                if windows.day.len() >= self.per_day {
                    return Err(GatewayError::BudgetExhausted(self.per_day));
                }

                if windows.minute.len() < self.per_window {
                    windows.minute.push_back(now);
                    windows.day.push_back(now);
                    return Ok(());
                }

                let oldest = windows.minute.front().copied().unwrap_or(now);
                self.window
                    .saturating_sub(now.saturating_duration_since(oldest))
                    .max(Duration::from_millis(1))
            };

            info!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            if !self.clock.sleep(wait, cancel) {
                return Err(GatewayError::Cancelled);
            }
        }
    }

    /// Calls counted in the trailing window
    pub fn in_window(&self) -> usize {
        let mut windows = self.lock();
        windows.prune(self.clock.now(), self.window);
        windows.minute.len()
    }

    /// Calls counted in the trailing 24 hours
    pub fn in_day(&self) -> usize {
        let mut windows = self.lock();
        windows.prune(self.clock.now(), self.window);
        windows.day.len()
    }

    pub fn remaining(&self) -> usize {
        self.per_window.saturating_sub(self.in_window())
    }
}

/// An outbound call
#[derive(Debug, Clone)]
pub enum Operation {
    GenerateImage { instruction: String, params: ImageParams },
    GenerateMarkup { instruction: String, params: MarkupParams },
    /// Download an already generated image; does not consume generation budget
    FetchImage { url: String },
}

impl Operation {
    fn label(&self) -> &'static str {
        match self {
            Operation::GenerateImage { .. } => "generate_image",
            Operation::GenerateMarkup { .. } => "generate_markup",
            Operation::FetchImage { .. } => "fetch_image",
        }
    }

    fn consumes_budget(&self) -> bool {
        !matches!(self, Operation::FetchImage { .. })
    }
}

/// Successful outcome of an [`Operation`]
#[derive(Debug, Clone)]
pub enum Response {
    Image(GeneratedImage),
    Markup(String),
    Bytes(Vec<u8>),
}

/// Map a backend failure onto the gateway taxonomy by status and structure
pub fn classify(failure: BackendFailure, timeout: Duration) -> GatewayError {
    match failure {
        BackendFailure::Status { code, message } => {
            let detail = message.unwrap_or_else(|| format!("HTTP {}", code));
            match code {
                401 | 403 => GatewayError::Auth(detail),
                429 => GatewayError::RateLimited(detail),
                400..=499 => GatewayError::InvalidResponse(detail),
                _ => GatewayError::NetworkError(detail),
            }
        }
        BackendFailure::Malformed(detail) => GatewayError::InvalidResponse(detail),
        BackendFailure::Timeout => GatewayError::Timeout(timeout.as_millis() as u64),
        BackendFailure::Transport(detail) => GatewayError::NetworkError(detail),
        BackendFailure::Cancelled => GatewayError::Cancelled,
    }
}

/// Rate-limited, deadline-bounded access to one backend
pub struct Gateway {
    backend: Arc<dyn GenerationBackend>,
    budget: Arc<RateBudget>,
    timeout: Duration,
}

impl Gateway {
    pub fn new(backend: Arc<dyn GenerationBackend>, budget: Arc<RateBudget>, timeout: Duration) -> Self {
        Self {
            backend,
            budget,
            timeout,
        }
    }

    pub fn from_limits(backend: Arc<dyn GenerationBackend>, limits: &LimitsConfig) -> Self {
        Self::new(
            backend,
            Arc::new(RateBudget::from_limits(limits)),
            limits.request_timeout(),
        )
    }

    pub fn budget(&self) -> &RateBudget {
        &self.budget
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run one operation under the rate budget, the deadline, and `cancel`.
    ///
    /// Generation calls are recorded in the budget before dispatch, so failed
    /// attempts count too. The backend runs on a worker thread whose transport
    /// is bounded by the same deadline and which holds its own call token.
    /// When the deadline passes or `cancel` fires, the caller trips that token
    /// and gives the worker a short grace period to stop before returning.
    pub fn invoke(&self, operation: Operation, cancel: &CancellationToken) -> Result<Response, GatewayError> {
        if operation.consumes_budget() {
            self.budget.acquire(cancel)?;
        } else if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let label = operation.label();
        let timeout = self.timeout;
        let deadline = Instant::now() + timeout;
        let backend = Arc::clone(&self.backend);
        let call = CancellationToken::new();
        let worker_call = call.clone();
        let (tx, rx) = mpsc::channel();

        debug!(operation = label, backend = backend.name(), "dispatching");
        std::thread::Builder::new()
            .name(format!("gateway-{}", label))
            .spawn(move || {
                let outcome = match operation {
                    Operation::GenerateImage { instruction, params } => backend
                        .generate_image(&instruction, &params, timeout, &worker_call)
                        .map(Response::Image),
                    Operation::GenerateMarkup { instruction, params } => backend
                        .generate_markup(&instruction, &params, timeout, &worker_call)
                        .map(Response::Markup),
                    Operation::FetchImage { url } => backend
                        .fetch_image(&url, timeout, &worker_call)
                        .map(Response::Bytes),
                };
                // The receiver is gone if the caller timed out or was cancelled
                let _ = tx.send(outcome);
            })
            .map_err(|e| GatewayError::NetworkError(format!("failed to start call: {}", e)))?;

        loop {
            if cancel.is_cancelled() {
                warn!(operation = label, "call cancelled in flight");
                abandon(&call, &rx, label);
                return Err(GatewayError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(operation = label, timeout_ms = timeout.as_millis() as u64, "call timed out");
                abandon(&call, &rx, label);
                return Err(GatewayError::Timeout(timeout.as_millis() as u64));
            }

            match rx.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(failure)) => {
                    let error = classify(failure, timeout);
                    warn!(operation = label, %error, "call failed");
                    return Err(error);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(GatewayError::NetworkError(
                        "backend call ended without a result".to_string(),
                    ))
                }
            }
        }
    }

    pub fn generate_image(
        &self,
        instruction: &str,
        params: &ImageParams,
        cancel: &CancellationToken,
    ) -> Result<GeneratedImage, GatewayError> {
        let op = Operation::GenerateImage {
            instruction: instruction.to_string(),
            params: params.clone(),
        };
        match self.invoke(op, cancel)? {
            Response::Image(image) => Ok(image),
            other => Err(unexpected("image", &other)),
        }
    }

    pub fn generate_markup(
        &self,
        instruction: &str,
        params: &MarkupParams,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let op = Operation::GenerateMarkup {
            instruction: instruction.to_string(),
            params: params.clone(),
        };
        match self.invoke(op, cancel)? {
            Response::Markup(markup) => Ok(markup),
            other => Err(unexpected("markup", &other)),
        }
    }

    pub fn fetch_image(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>, GatewayError> {
        match self.invoke(Operation::FetchImage { url: url.to_string() }, cancel)? {
            Response::Bytes(bytes) => Ok(bytes),
            other => Err(unexpected("bytes", &other)),
        }
    }
}

/// Trip the worker's call token and wait briefly for it to finish
fn abandon<T>(call: &CancellationToken, rx: &mpsc::Receiver<T>, label: &str) {
    call.cancel();
    match rx.recv_timeout(WORKER_GRACE) {
        Ok(_) | Err(RecvTimeoutError::Disconnected) => debug!(operation = label, "worker stopped"),
        Err(RecvTimeoutError::Timeout) => {
            warn!(operation = label, "worker still running after grace period")
        }
    }
}

fn unexpected(expected: &str, got: &Response) -> GatewayError {
    let got = match got {
        Response::Image(_) => "image",
        Response::Markup(_) => "markup",
        Response::Bytes(_) => "bytes",
    };
    GatewayError::InvalidResponse(format!("expected {} response, got {}", expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockBackend;

    fn manual_budget(per_window: usize, per_day: usize) -> (Arc<ManualClock>, RateBudget) {
        let clock = Arc::new(ManualClock::new());
        let budget = RateBudget::with_clock(per_window, per_day, MINUTE, clock.clone());
        (clock, budget)
    }

    #[test]
    fn test_budget_never_exceeds_window_under_bursts() {
        let (clock, budget) = manual_budget(5, 10_000);
        let cancel = CancellationToken::new();
        let mut stamps: Vec<Instant> = Vec::new();

        // Irregular bursts with small gaps in between
        for burst in [7usize, 1, 12, 3, 9, 5] {
            for _ in 0..burst {
                budget.acquire(&cancel).unwrap();
                stamps.push(clock.now());
                assert!(budget.in_window() <= 5);
            }
            clock.advance(Duration::from_secs(7));
        }

        for (i, &t) in stamps.iter().enumerate() {
            let in_trailing = stamps[..=i]
                .iter()
                .filter(|&&s| t.saturating_duration_since(s) < MINUTE)
                .count();
            assert!(in_trailing <= 5, "window overflow at call {}", i);
        }
    }

    #[test]
    fn test_budget_waits_until_oldest_expires() {
        let (clock, budget) = manual_budget(2, 100);
        let cancel = CancellationToken::new();
        let start = clock.now();

        budget.acquire(&cancel).unwrap();
        clock.advance(Duration::from_secs(10));
        budget.acquire(&cancel).unwrap();
        budget.acquire(&cancel).unwrap();

        // Third call had to wait for the first entry to age out
        assert_eq!(clock.now().duration_since(start), MINUTE);
        assert_eq!(budget.in_window(), 2);
    }

    #[test]
    fn test_daily_ceiling_is_reported() {
        let (clock, budget) = manual_budget(2, 3);
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            budget.acquire(&cancel).unwrap();
            clock.advance(Duration::from_secs(61));
        }
        assert_eq!(budget.acquire(&cancel), Err(GatewayError::BudgetExhausted(3)));
        assert_eq!(budget.in_day(), 3);
    }

    #[test]
    fn test_cancelled_wait_records_nothing() {
        let (_clock, budget) = manual_budget(1, 100);
        let cancel = CancellationToken::new();
        budget.acquire(&cancel).unwrap();
        cancel.cancel();
        assert_eq!(budget.acquire(&cancel), Err(GatewayError::Cancelled));
        assert_eq!(budget.in_window(), 1);
    }

    #[test]
    fn test_concurrent_acquire_counts_every_call() {
        let budget = Arc::new(RateBudget::new(1000, 10_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = Arc::clone(&budget);
                std::thread::spawn(move || {
                    let cancel = CancellationToken::new();
                    for _ in 0..25 {
                        budget.acquire(&cancel).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(budget.in_window(), 200);
    }

    #[test]
    fn test_classification_by_status() {
        let t = Duration::from_secs(60);
        let status = |code| BackendFailure::Status { code, message: None };
        assert!(matches!(classify(status(401), t), GatewayError::Auth(_)));
        assert!(matches!(classify(status(403), t), GatewayError::Auth(_)));
        assert!(matches!(classify(status(429), t), GatewayError::RateLimited(_)));
        assert!(matches!(classify(status(400), t), GatewayError::InvalidResponse(_)));
        assert!(matches!(classify(status(503), t), GatewayError::NetworkError(_)));
        assert_eq!(classify(BackendFailure::Timeout, t), GatewayError::Timeout(60_000));
        assert!(matches!(
            classify(BackendFailure::Malformed("x".into()), t),
            GatewayError::InvalidResponse(_)
        ));
        assert!(matches!(
            classify(BackendFailure::Transport("dns".into()), t),
            GatewayError::NetworkError(_)
        ));
        assert_eq!(classify(BackendFailure::Cancelled, t), GatewayError::Cancelled);
    }

    #[test]
    fn test_backend_message_is_carried() {
        let failure = BackendFailure::Status {
            code: 401,
            message: Some("Incorrect API key provided".to_string()),
        };
        assert_eq!(
            classify(failure, Duration::from_secs(1)),
            GatewayError::Auth("Incorrect API key provided".to_string())
        );
    }

    #[test]
    fn test_failed_calls_still_count() {
        let backend = Arc::new(MockBackend::new().failing_markup(BackendFailure::Status {
            code: 429,
            message: None,
        }));
        let gateway = Gateway::new(backend, Arc::new(RateBudget::new(10, 100)), Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let err = gateway
            .generate_markup("icon", &MarkupParams::default(), &cancel)
            .unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited(_)));
        assert_eq!(gateway.budget().in_window(), 1);
    }

    #[test]
    fn test_fetch_does_not_consume_budget() {
        let backend = Arc::new(MockBackend::new().with_image_edge(4));
        let gateway = Gateway::new(backend, Arc::new(RateBudget::new(10, 100)), Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let image = gateway
            .generate_image("cup", &ImageParams::default(), &cancel)
            .unwrap();
        let crate::backend::ImageSource::Url(url) = image.source else {
            panic!("mock hands out urls by default");
        };
        gateway.fetch_image(&url, &cancel).unwrap();
        assert_eq!(gateway.budget().in_window(), 1);
    }

    #[test]
    fn test_timeout_returns_promptly() {
        let backend = Arc::new(MockBackend::new().with_delay(Duration::from_secs(2)));
        let gateway = Gateway::new(backend, Arc::new(RateBudget::new(10, 100)), Duration::from_millis(50));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        let err = gateway
            .generate_markup("icon", &MarkupParams::default(), &cancel)
            .unwrap_err();
        assert_eq!(err, GatewayError::Timeout(50));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_cancel_stops_worker() {
        let backend = Arc::new(MockBackend::new().with_delay(Duration::from_secs(2)));
        let gateway = Gateway::new(backend.clone(), Arc::new(RateBudget::new(10, 100)), Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let remote = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        let err = gateway
            .generate_markup("icon", &MarkupParams::default(), &cancel)
            .unwrap_err();
        canceller.join().unwrap();

        assert_eq!(err, GatewayError::Cancelled);
        // The worker observed its token before invoke returned
        assert_eq!(backend.cancelled_calls(), 1);
    }

    #[test]
    fn test_cancel_aborts_in_flight_call() {
        let backend = Arc::new(MockBackend::new().with_delay(Duration::from_secs(2)));
        let gateway = Gateway::new(backend, Arc::new(RateBudget::new(10, 100)), Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let remote = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        let start = Instant::now();
        let err = gateway
            .generate_markup("icon", &MarkupParams::default(), &cancel)
            .unwrap_err();
        assert_eq!(err, GatewayError::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(1));
        canceller.join().unwrap();
    }
}
