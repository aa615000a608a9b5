//! Pending results for work that completes outside the frame loop.
//!
//! A [`Pending`] is the single task abstraction shared by EDF text fetches and
//! resource loads. It is either already resolved or waiting on a
//! `crossbeam-channel` receiver that a producer (possibly on another thread)
//! completes through a [`Completer`]. Consumers call [`Pending::poll`], which
//! never blocks, at a defined point of the frame. A waiting task that passes
//! its deadline resolves to [`LoadError::Timeout`].

use std::task::Poll;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Default deadline for text and resource fetches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(50);

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Why a fetch or resource load did not produce a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    /// The requested file or resource does not exist.
    #[error("'{0}' not found")]
    NotFound(String),

    /// The deadline passed before the producer completed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// No loader is registered for the URL's loader id.
    #[error("no resource loader registered for '{0}'")]
    UnknownLoader(String),

    /// The resource URL could not be parsed.
    #[error("malformed resource url '{0}'")]
    MalformedUrl(String),

    /// The producer dropped its completer without sending a result.
    #[error("load abandoned before completion")]
    Abandoned,

    /// The loader reported a failure.
    #[error("{0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// Completer
// ---------------------------------------------------------------------------

/// Producer half of a waiting [`Pending`].
#[derive(Debug)]
pub struct Completer<T> {
    tx: Sender<Result<T, LoadError>>,
}

impl<T> Completer<T> {
    /// Resolve the paired [`Pending`]. Completing after the consumer has gone
    /// away is not an error.
    pub fn complete(self, result: Result<T, LoadError>) {
        let _ = self.tx.send(result);
    }
}

// ---------------------------------------------------------------------------
// Pending
// ---------------------------------------------------------------------------

enum State<T> {
    Ready(Result<T, LoadError>),
    Waiting {
        rx: Receiver<Result<T, LoadError>>,
        started: Instant,
        timeout: Duration,
    },
    Consumed,
}

/// A result that may not be available yet.
pub struct Pending<T> {
    state: State<T>,
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Ready(Ok(_)) => "ready",
            State::Ready(Err(_)) => "failed",
            State::Waiting { .. } => "waiting",
            State::Consumed => "consumed",
        };
        f.debug_struct("Pending").field("state", &state).finish()
    }
}

impl<T> Pending<T> {
    /// An already-resolved success.
    pub fn ready(value: T) -> Self {
        Self {
            state: State::Ready(Ok(value)),
        }
    }

    /// An already-resolved failure.
    pub fn failed(error: LoadError) -> Self {
        Self {
            state: State::Ready(Err(error)),
        }
    }

    /// Wrap an existing result.
    pub fn from_result(result: Result<T, LoadError>) -> Self {
        Self {
            state: State::Ready(result),
        }
    }

    /// A waiting task and the completer that resolves it.
    pub fn channel() -> (Completer<T>, Self) {
        let (tx, rx) = bounded(1);
        (
            Completer { tx },
            Self {
                state: State::Waiting {
                    rx,
                    started: Instant::now(),
                    timeout: DEFAULT_TIMEOUT,
                },
            },
        )
    }

    /// Replace the deadline of a waiting task. No effect once resolved.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let State::Waiting { timeout: t, .. } = &mut self.state {
            *t = timeout;
        }
        self
    }

    /// Whether the next [`poll`](Self::poll) is guaranteed to return `Ready`.
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Check for completion without blocking.
    ///
    /// Returns `Poll::Ready` exactly once; polling again afterwards yields
    /// [`LoadError::Abandoned`].
    pub fn poll(&mut self) -> Poll<Result<T, LoadError>> {
        match std::mem::replace(&mut self.state, State::Consumed) {
            State::Ready(result) => Poll::Ready(result),
            State::Waiting {
                rx,
                started,
                timeout,
            } => match rx.try_recv() {
                Ok(result) => Poll::Ready(result),
                Err(TryRecvError::Disconnected) => Poll::Ready(Err(LoadError::Abandoned)),
                Err(TryRecvError::Empty) => {
                    if started.elapsed() >= timeout {
                        Poll::Ready(Err(LoadError::Timeout(timeout)))
                    } else {
                        self.state = State::Waiting {
                            rx,
                            started,
                            timeout,
                        };
                        Poll::Pending
                    }
                }
            },
            State::Consumed => Poll::Ready(Err(LoadError::Abandoned)),
        }
    }

    /// Block until the task resolves or its deadline passes.
    ///
    /// Intended for loader threads and tools, never for the frame loop.
    pub fn wait(self) -> Result<T, LoadError> {
        match self.state {
            State::Ready(result) => result,
            State::Waiting {
                rx,
                started,
                timeout,
            } => {
                let remaining = timeout.saturating_sub(started.elapsed());
                match rx.recv_timeout(remaining) {
                    Ok(result) => result,
                    Err(RecvTimeoutError::Timeout) => Err(LoadError::Timeout(timeout)),
                    Err(RecvTimeoutError::Disconnected) => Err(LoadError::Abandoned),
                }
            }
            State::Consumed => Err(LoadError::Abandoned),
        }
    }
}

impl<T: Send + 'static> Pending<T> {
    /// Run `work` on a background thread.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> Result<T, LoadError> + Send + 'static,
    {
        let (completer, pending) = Self::channel();
        thread::spawn(move || completer.complete(work()));
        pending
    }

    /// Transform the eventual value. Resolved tasks are mapped in place;
    /// waiting ones are mapped on a helper thread that inherits the deadline.
    pub fn map<U, F>(self, f: F) -> Pending<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, LoadError> + Send + 'static,
    {
        match self.state {
            State::Ready(result) => Pending::from_result(result.and_then(f)),
            State::Consumed => Pending::failed(LoadError::Abandoned),
            State::Waiting {
                rx,
                started,
                timeout,
            } => {
                let inner = Pending {
                    state: State::Waiting {
                        rx,
                        started,
                        timeout,
                    },
                };
                Pending::spawn(move || inner.wait().and_then(f)).with_timeout(timeout)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
