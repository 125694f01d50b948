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
    path::PathBuf,
};

use crate::{
    backend::traits::BackendError,
    error::{
        Code,
        Status,
    },
    options::CompressionType,
};

#[derive(Debug)]
pub enum ErrorImpl {
    DbDoesNotExist(PathBuf),
    DbAlreadyExists(PathBuf),
    WalExists(PathBuf),
    LockHeld(PathBuf),
    InvalidOption(String),
    CompressionNotLinked(CompressionType),
    UnknownCompression(u8),
    InvalidRange,
    RecordTooLarge(usize),
    ReadOnly,
    WriteConflict(Vec<u8>),
    Corrupted(String),
    ShuttingDown,
    Background(String),
    DbPoisonError,
    ManagerPoisonError,
    IoError(io::Error),
    EncodingError(bincode::Error),
}

impl ErrorImpl {
    /// The status code this condition maps to, or `None` if it has no
    /// classification of its own.
    pub(crate) fn code(&self) -> Option<Code> {
        match self {
            ErrorImpl::Corrupted(_) => Some(Code::Corruption),
            ErrorImpl::ReadOnly | ErrorImpl::UnknownCompression(_) => Some(Code::NotSupported),
            ErrorImpl::DbDoesNotExist(_)
            | ErrorImpl::DbAlreadyExists(_)
            | ErrorImpl::WalExists(_)
            | ErrorImpl::InvalidOption(_)
            | ErrorImpl::CompressionNotLinked(_)
            | ErrorImpl::InvalidRange
            | ErrorImpl::RecordTooLarge(_) => Some(Code::InvalidArgument),
            ErrorImpl::IoError(_) | ErrorImpl::LockHeld(_) | ErrorImpl::Background(_) => Some(Code::IoError),
            ErrorImpl::ShuttingDown => Some(Code::ShutdownInProgress),
            ErrorImpl::WriteConflict(_) => Some(Code::Busy),
            ErrorImpl::DbPoisonError | ErrorImpl::ManagerPoisonError | ErrorImpl::EncodingError(_) => None,
        }
    }
}

impl BackendError for ErrorImpl {}

impl fmt::Display for ErrorImpl {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorImpl::DbDoesNotExist(path) => write!(fmt, "{}: does not exist (create_if_missing is false)", path.display()),
            ErrorImpl::DbAlreadyExists(path) => write!(fmt, "{}: exists (error_if_exists is true)", path.display()),
            ErrorImpl::WalExists(path) => {
                write!(fmt, "{}: opened in read-only mode with error_if_wal_exists but a write-ahead log exists", path.display())
            },
            ErrorImpl::LockHeld(path) => write!(fmt, "lock hold by current process: {}", path.display()),
            ErrorImpl::InvalidOption(message) => fmt.write_str(message),
            ErrorImpl::CompressionNotLinked(kind) => write!(fmt, "Compression type {} is not linked with the binary.", kind),
            ErrorImpl::UnknownCompression(tag) => write!(fmt, "unknown compression tag {}", tag),
            ErrorImpl::InvalidRange => fmt.write_str("end key comes before start key"),
            ErrorImpl::RecordTooLarge(len) => write!(fmt, "batch of {} bytes is too large for a write-ahead log record", len),
            ErrorImpl::ReadOnly => fmt.write_str("Not supported operation in read only mode."),
            ErrorImpl::WriteConflict(key) => write!(fmt, "write conflict on key {:?}", String::from_utf8_lossy(key)),
            ErrorImpl::Corrupted(message) => fmt.write_str(message),
            ErrorImpl::ShuttingDown => fmt.write_str("background worker has stopped"),
            ErrorImpl::Background(message) => write!(fmt, "writes stopped after an earlier failure: {}", message),
            ErrorImpl::DbPoisonError => fmt.write_str("engine lock poisoned"),
            ErrorImpl::ManagerPoisonError => fmt.write_str("path registry poisoned"),
            ErrorImpl::IoError(e) => e.fmt(fmt),
            ErrorImpl::EncodingError(e) => e.fmt(fmt),
        }
    }
}

impl From<ErrorImpl> for Status {
    fn from(e: ErrorImpl) -> Status {
        Status::new(e.code().unwrap_or(Code::IoError), e.to_string())
    }
}

impl From<io::Error> for ErrorImpl {
    fn from(e: io::Error) -> ErrorImpl {
        ErrorImpl::IoError(e)
    }
}

impl From<bincode::Error> for ErrorImpl {
    fn from(e: bincode::Error) -> ErrorImpl {
        ErrorImpl::EncodingError(e)
    }
}
