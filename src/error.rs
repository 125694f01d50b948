// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::{
    fmt,
    io,
};

use thiserror::Error;

/// The closed set of outcome kinds every fallible operation reports.
///
/// Numeric values are stable and may be used across a language boundary.
#[repr(i32)]
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum Code {
    Ok = 0,
    NotFound = 1,
    Corruption = 2,
    NotSupported = 3,
    InvalidArgument = 4,
    IoError = 5,
    MergeInProgress = 6,
    Incomplete = 7,
    ShutdownInProgress = 8,
    TimedOut = 9,
    Aborted = 10,
    Busy = 11,
    Expired = 12,
    TryAgain = 13,
    CompactionTooLarge = 14,
}

impl Code {
    pub fn from_i32(value: i32) -> Option<Code> {
        Some(match value {
            0 => Code::Ok,
            1 => Code::NotFound,
            2 => Code::Corruption,
            3 => Code::NotSupported,
            4 => Code::InvalidArgument,
            5 => Code::IoError,
            6 => Code::MergeInProgress,
            7 => Code::Incomplete,
            8 => Code::ShutdownInProgress,
            9 => Code::TimedOut,
            10 => Code::Aborted,
            11 => Code::Busy,
            12 => Code::Expired,
            13 => Code::TryAgain,
            14 => Code::CompactionTooLarge,
            _ => return None,
        })
    }

    /// The caller may retry the operation, or for a commit conflict, re-run
    /// the whole transaction.
    pub fn is_retryable(self) -> bool {
        matches!(self, Code::Busy | Code::TryAgain | Code::TimedOut | Code::MergeInProgress | Code::ShutdownInProgress)
    }

    /// Misuse that won't go away without changing the call.
    pub fn is_caller_fixable(self) -> bool {
        matches!(self, Code::InvalidArgument | Code::NotSupported)
    }

    /// Environment failures this layer doesn't try to recover from.
    pub fn is_fatal(self) -> bool {
        matches!(self, Code::IoError | Code::Corruption | Code::CompactionTooLarge)
    }

    fn as_str(self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::NotFound => "NotFound",
            Code::Corruption => "Corruption",
            Code::NotSupported => "Not implemented",
            Code::InvalidArgument => "Invalid argument",
            Code::IoError => "IO error",
            Code::MergeInProgress => "Merge in progress",
            Code::Incomplete => "Result incomplete",
            Code::ShutdownInProgress => "Shutdown in progress",
            Code::TimedOut => "Operation timed out",
            Code::Aborted => "Operation aborted",
            Code::Busy => "Resource busy",
            Code::Expired => "Operation expired",
            Code::TryAgain => "Operation failed. Try again.",
            Code::CompactionTooLarge => "Compaction too large",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// Outcome of a fallible operation: a `Code` plus a message that is present
/// exactly when the code is not `Ok`.
///
/// Operations return `Result<T, Status>`, so a `Status` found in an `Err` is
/// never `Ok`. `Status::ok()` exists for places that report a terminal
/// outcome as a value, such as `DbIterator::status`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.render())]
pub struct Status {
    code: Code,
    message: Option<String>,
}

impl Status {
    pub fn ok() -> Status {
        Status {
            code: Code::Ok,
            message: None,
        }
    }

    /// Build a status. An `Ok` code drops the message, any other code keeps
    /// one (empty if none was given).
    pub fn new<M>(code: Code, message: M) -> Status
    where
        M: Into<String>,
    {
        match code {
            Code::Ok => Status::ok(),
            code => Status {
                code,
                message: Some(message.into()),
            },
        }
    }

    pub fn not_found<M: Into<String>>(message: M) -> Status {
        Status::new(Code::NotFound, message)
    }

    pub fn corruption<M: Into<String>>(message: M) -> Status {
        Status::new(Code::Corruption, message)
    }

    pub fn not_supported<M: Into<String>>(message: M) -> Status {
        Status::new(Code::NotSupported, message)
    }

    pub fn invalid_argument<M: Into<String>>(message: M) -> Status {
        Status::new(Code::InvalidArgument, message)
    }

    pub fn io_error<M: Into<String>>(message: M) -> Status {
        Status::new(Code::IoError, message)
    }

    pub fn shutdown_in_progress<M: Into<String>>(message: M) -> Status {
        Status::new(Code::ShutdownInProgress, message)
    }

    pub fn busy<M: Into<String>>(message: M) -> Status {
        Status::new(Code::Busy, message)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Code::NotFound
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Hand the message over to the caller.
    pub fn into_message(self) -> Option<String> {
        self.message
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn render(&self) -> String {
        match self.message {
            None => self.code.to_string(),
            Some(ref message) => format!("{}: {}", self.code, message),
        }
    }
}

impl From<Result<()>> for Status {
    fn from(result: Result<()>) -> Status {
        match result {
            Ok(()) => Status::ok(),
            Err(status) => status,
        }
    }
}

impl From<io::Error> for Status {
    fn from(e: io::Error) -> Status {
        Status::io_error(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Status>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_has_no_message() {
        let ok = Status::new(Code::Ok, "ignored");
        assert!(ok.is_ok());
        assert_eq!(ok.message(), None);
        assert_eq!(ok.to_string(), "OK");
        assert_eq!(ok.into_result(), Ok(()));
    }

    #[test]
    fn test_non_ok_always_has_message() {
        let status = Status::new(Code::Busy, "");
        assert_eq!(status.message(), Some(""));

        let status = Status::invalid_argument("Transaction is null");
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.to_string(), "Invalid argument: Transaction is null");
        assert_eq!(status.clone().into_message(), Some("Transaction is null".to_string()));
        assert_eq!(status.clone().into_result(), Err(status));
    }

    #[test]
    fn test_status_from_result() {
        assert!(Status::from(Ok::<(), Status>(())).is_ok());
        let busy = Status::busy("Resource busy");
        assert_eq!(Status::from(Err::<(), Status>(busy.clone())), busy);
    }

    #[test]
    fn test_codes_round_trip_through_i32() {
        for value in 0..=14 {
            let code = Code::from_i32(value).expect("known code");
            assert_eq!(code as i32, value);
        }
        assert_eq!(Code::from_i32(15), None);
        assert_eq!(Code::from_i32(-1), None);
    }

    #[test]
    fn test_classification() {
        assert!(Code::Busy.is_retryable());
        assert!(Code::TryAgain.is_retryable());
        assert!(!Code::NotFound.is_retryable());
        assert!(Code::NotSupported.is_caller_fixable());
        assert!(Code::Corruption.is_fatal());
        assert!(!Code::Busy.is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let status: Status = io::Error::new(io::ErrorKind::Other, "disk on fire").into();
        assert_eq!(status.code(), Code::IoError);
        assert_eq!(status.to_string(), "IO error: disk on fire");
    }
}
