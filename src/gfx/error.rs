//! Error taxonomy.
//!
//! Only render-call-fatal conditions become errors: output sinks that
//! cannot be written, size limits, unusable inputs. Problems inside a
//! content stream (bad operands, missing resources, unknown operators)
//! are recovered locally by the interpreter and never surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("error: {0}")]
    Generic(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("limit exceeded: {0}")]
    Limit(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("syntax error: {0}")]
    Syntax(String),
}

impl Error {
    pub fn generic(msg: impl Into<String>) -> Self {
        Error::Generic(msg.into())
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }

    pub fn limit(msg: impl Into<String>) -> Self {
        Error::Limit(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Error::Syntax(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(Error::limit("too many pixels").to_string(), "limit exceeded: too many pixels");
        let io: Error = std::io::Error::other("sink closed").into();
        assert!(io.to_string().contains("sink closed"));
    }
}
