// Copyright 2018 The Exonum Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types shared by every component of the crate.
//!
//! Errors are classified into three [kinds](ErrorKind): malformed input, failed cryptographic
//! verification, and setup (configuration) failures. Components wrap errors with context as
//! they propagate; [`Error::kind()`] always reports the kind of the root cause, so that callers
//! can tell a fraudulent request apart from a misconfigured auditor.

use std::fmt;

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input is structurally invalid: length mismatch, missing field, unknown identity tag.
    Malformed,
    /// A proof, commitment opening, ownership match or signature did not verify.
    Verification,
    /// The component is misconfigured (missing signer, invalid public parameters).
    Setup,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ErrorKind::Malformed => "malformed input",
            ErrorKind::Verification => "verification failure",
            ErrorKind::Setup => "setup failure",
        };
        formatter.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("verification failed: {0}")]
    Verification(String),
    #[error("setup failure: {0}")]
    Setup(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Error::Malformed(message.into())
    }

    pub fn verification<S: Into<String>>(message: S) -> Self {
        Error::Verification(message.into())
    }

    pub fn setup<S: Into<String>>(message: S) -> Self {
        Error::Setup(message.into())
    }

    /// Wraps this error with additional context.
    pub fn context<S: Into<String>>(self, context: S) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the kind of the root cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Malformed(_) => ErrorKind::Malformed,
            Error::Verification(_) => ErrorKind::Verification,
            Error::Setup(_) => ErrorKind::Setup,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// Returns the innermost error.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_verification(&self) -> bool {
        self.kind() == ErrorKind::Verification
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Malformed(format!("cannot decode: {}", err))
    }
}

impl From<bulletproofs::ProofError> for Error {
    fn from(err: bulletproofs::ProofError) -> Self {
        use bulletproofs::ProofError;

        match err {
            ProofError::InvalidBitsize | ProofError::InvalidGeneratorsLength => {
                Error::Setup(format!("range proof parameters: {}", err))
            }
            ProofError::WrongNumBlindingFactors | ProofError::InvalidInputLength => {
                Error::Malformed(format!("range proof input: {}", err))
            }
            _ => Error::Verification(format!("range proof: {}", err)),
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension for attaching context to fallible results.
pub trait ResultExt<T> {
    fn context<S: Into<String>>(self, context: S) -> Result<T>;

    fn with_context<S, F>(self, f: F) -> Result<T>
    where
        S: Into<String>,
        F: FnOnce() -> S;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<S, F>(self, f: F) -> Result<T>
    where
        S: Into<String>,
        F: FnOnce() -> S,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_survives_context() {
        let err = Error::verification("proof does not verify")
            .context("invalid issue proof")
            .context("failed validating issue [0]");
        assert_eq!(err.kind(), ErrorKind::Verification);
        assert!(err.is_verification());
        assert_eq!(
            err.to_string(),
            "failed validating issue [0]: invalid issue proof: \
             verification failed: proof does not verify"
        );
        match err.root_cause() {
            Error::Verification(msg) => assert_eq!(msg, "proof does not verify"),
            other => panic!("unexpected root cause: {:?}", other),
        }
    }

    #[test]
    fn setup_errors_are_distinguishable() {
        let result: Result<()> = Err(Error::setup("signer is nil"));
        let err = result.with_context(|| format!("audit of tx [{}] failed", "tx1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Setup);
        assert!(!err.is_verification());
    }
}
