use std::time::{Duration, Instant};

/// What a workload step reports back for a single invocation.
///
/// Steps must classify their own work: any error from the protocol client is caught at the
/// step's boundary and turned into [`Response::Fail`]. A `Result<(), E>` converts directly.
///
/// # Example
/// ```
/// use bomber_core::Response;
///
/// let res: Result<(), std::io::Error> = Ok(());
/// assert_eq!(Response::from(res), Response::ok());
/// assert_eq!(Response::ok_with_size(512).payload_size(), Some(512));
/// ```
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ok { payload_size: Option<u64> },
    Fail,
}

impl Response {
    pub fn ok() -> Self {
        Self::Ok { payload_size: None }
    }

    /// Successful invocation which received `bytes` of payload.
    pub fn ok_with_size(bytes: u64) -> Self {
        Self::Ok {
            payload_size: Some(bytes),
        }
    }

    pub fn fail() -> Self {
        Self::Fail
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn payload_size(&self) -> Option<u64> {
        match self {
            Self::Ok { payload_size } => *payload_size,
            Self::Fail => None,
        }
    }
}

impl<E> From<Result<(), E>> for Response {
    fn from(res: Result<(), E>) -> Self {
        match res {
            Ok(()) => Self::ok(),
            Err(_) => Self::fail(),
        }
    }
}

/// Why an invocation was counted as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailKind {
    /// The step returned [`Response::Fail`].
    Step,
    /// The step panicked; the panic was contained by the executor.
    Panic,
    /// The step exceeded the invocation timeout and was abandoned.
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Fail(FailKind),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Immutable record of one workload step invocation.
///
/// Created exactly once per invocation by the executor and moved into the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    status: Status,
    latency: Duration,
    payload_size: Option<u64>,
    timestamp: Instant,
}

impl Outcome {
    /// Outcome of an invocation which ran to completion. `timestamp` is the invocation start.
    pub fn completed(response: Response, latency: Duration, timestamp: Instant) -> Self {
        let status = if response.is_ok() {
            Status::Ok
        } else {
            Status::Fail(FailKind::Step)
        };

        Self {
            status,
            latency,
            payload_size: response.payload_size(),
            timestamp,
        }
    }

    /// Outcome of an invocation which never produced a response.
    pub fn failed(kind: FailKind, latency: Duration, timestamp: Instant) -> Self {
        Self {
            status: Status::Fail(kind),
            latency,
            payload_size: None,
            timestamp,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn payload_size(&self) -> Option<u64> {
        self.payload_size
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}
