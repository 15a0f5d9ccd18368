/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Library errors.

use std::error::Error;
use std::fmt;

/// Cause of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqgenErrorKind {
    /// General failure. See message for details.
    Unspecified,
    /// The sequence could not be found.
    NotFound,
    /// The input or stored data is not in the expected format.
    Malformed,
    /// The durable storage failed. See message for details.
    Storage,
    /// The durable update could not complete within the lock wait timeout.
    StorageBusy,
    /// The sequence has no more values and is not allowed to cycle.
    DomainExhausted,
    /// The configured batch size policy is missing or unusable.
    InvalidAllocationPolicy,
    /// The sequence existed, but has been dropped.
    ObjectGone,
}

impl SeqgenErrorKind {
    /// Create a new instance with an error message.
    pub fn error_with_msg<S: AsRef<str>>(self, msg: S) -> SeqgenError {
        SeqgenError {
            kind: self,
            msg: Some(msg.as_ref().to_string()),
        }
    }

    /// Create a new instance without an error message.
    pub fn error(self) -> SeqgenError {
        SeqgenError {
            kind: self,
            msg: None,
        }
    }

    /// Return `true` if the same request may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageBusy)
    }
}

impl fmt::Display for SeqgenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/** Library error.

Create a new instance via [SeqgenErrorKind].
*/
#[derive(Debug)]
pub struct SeqgenError {
    kind: SeqgenErrorKind,
    msg: Option<String>,
}

impl SeqgenError {
    /// Return the type of error.
    pub fn kind(&self) -> &SeqgenErrorKind {
        &self.kind
    }

    /// Return `true` if the same request may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for SeqgenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(msg) = &self.msg {
            write!(f, "{} {}", self.kind, msg)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl AsRef<SeqgenError> for SeqgenError {
    fn as_ref(&self) -> &SeqgenError {
        self
    }
}

impl Error for SeqgenError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_busy_storage_is_retryable() {
        assert!(SeqgenErrorKind::StorageBusy.error().is_retryable());
        for kind in [
            SeqgenErrorKind::DomainExhausted,
            SeqgenErrorKind::InvalidAllocationPolicy,
            SeqgenErrorKind::ObjectGone,
            SeqgenErrorKind::NotFound,
        ] {
            assert!(!kind.error().is_retryable(), "{kind} must be terminal");
        }
    }

    #[test]
    fn display_includes_message() {
        let e = SeqgenErrorKind::ObjectGone.error_with_msg("APP.SEQ_1 was dropped.");
        assert_eq!(e.to_string(), "ObjectGone APP.SEQ_1 was dropped.");
        assert_eq!(SeqgenErrorKind::NotFound.error().to_string(), "NotFound");
    }
}
