use std::fmt;
use std::io;

#[derive(Debug, PartialEq)]
pub enum Error {
    InvalidFormat(String),
    NotReadable(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidFormat(err) | Error::NotReadable(err) => write!(f, "{err}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let msg = format!("Configuration file error: {err}");
        Error::NotReadable(msg)
    }
}
