use std::fmt;
use std::io;

use hyper::StatusCode;

use crate::configuration;

/// Host-side failures. Authentication outcomes never surface here: a failed
/// verification becomes a challenge or a redirect, not an error. What remains
/// is module construction and listener plumbing.
#[derive(Debug, PartialEq)]
pub enum Error {
    Initialization(String),
    Execution(String),
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Initialization(err) | Error::Execution(err) => write!(f, "{err}"),
            Error::Internal(err) => write!(f, "Internal Server Error: {err}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Execution(error.to_string())
    }
}

impl From<configuration::Error> for Error {
    fn from(error: configuration::Error) -> Self {
        Error::Initialization(error.to_string())
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Initialization(_) | Error::Execution(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
