//! Result and exception handler chains
//!
//! Every command invocation ends in one of two chains: the result chain for
//! a value returned normally, or the exception chain for a raised
//! [`Failure`]. Handlers return an integer status; a chain stops at the
//! first non-negative return, which becomes the command's exit status.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::convert::ConvertError;
use crate::value::Value;

/// An execution failure raised by a command callable.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct Failure {
    message: String,
    status: i32,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_status(message, 1)
    }

    pub fn with_status(message: impl Into<String>, status: i32) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The failure's native status code, used when no exception handler
    /// claims the failure.
    pub fn status(&self) -> i32 {
        self.status
    }
}

impl From<ConvertError> for Failure {
    fn from(err: ConvertError) -> Self {
        Failure::new(err.to_string())
    }
}

/// Handles the value returned by a successfully executed command.
pub trait ResultHandler: Send + Sync {
    /// Returns the exit status, or a negative value to pass to the next
    /// handler in the chain.
    fn handle(&self, value: &Value) -> i32;
}

/// Handles a failure raised by a command callable.
pub trait ExceptionHandler: Send + Sync {
    /// Returns the exit status, or a negative value to pass to the next
    /// handler in the chain.
    fn handle(&self, error: &Failure) -> i32;
}

/// Prints the result to standard output and reports success.
#[derive(Debug, Default)]
pub struct ConsoleResultHandler;

impl ResultHandler for ConsoleResultHandler {
    fn handle(&self, value: &Value) -> i32 {
        println!("{value}");
        0
    }
}

/// Writes the rendered result to a file.
///
/// When constructed without a path a fresh file under the system temp
/// directory is used per invocation.
#[derive(Debug, Default)]
pub struct FileResultHandler {
    path: Option<PathBuf>,
}

impl FileResultHandler {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    fn target_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => {
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or(0);
                std::env::temp_dir().join(format!("cmdbind-{nanos}.out"))
            }
        }
    }
}

impl ResultHandler for FileResultHandler {
    fn handle(&self, value: &Value) -> i32 {
        let path = self.target_path();
        match fs::write(&path, format!("{value}\n")) {
            Ok(()) => 0,
            Err(err) => {
                tracing::error!("failed to write result to {}: {err}", path.display());
                -1
            }
        }
    }
}

/// Prints the failure to standard error and returns its native status.
#[derive(Debug, Default)]
pub struct ConsoleExceptionHandler;

impl ExceptionHandler for ConsoleExceptionHandler {
    fn handle(&self, error: &Failure) -> i32 {
        eprintln!("{error}");
        error.status()
    }
}

/// Ordered result handler chain with first-non-negative short-circuiting.
pub struct ResultChain {
    handlers: Vec<Arc<dyn ResultHandler>>,
}

impl ResultChain {
    pub fn new(handlers: Vec<Arc<dyn ResultHandler>>) -> Self {
        Self { handlers }
    }

    /// Runs the chain. An empty chain yields 0; if every handler returns a
    /// negative value, the last returned value stands.
    pub fn run(&self, value: &Value) -> i32 {
        let mut result = 0;
        for handler in &self.handlers {
            result = handler.handle(value);
            if result >= 0 {
                break;
            }
        }
        result
    }
}

/// Ordered exception handler chain with first-non-negative short-circuiting.
pub struct ExceptionChain {
    handlers: Vec<Arc<dyn ExceptionHandler>>,
}

impl ExceptionChain {
    pub fn new(handlers: Vec<Arc<dyn ExceptionHandler>>) -> Self {
        Self { handlers }
    }

    /// Runs the chain. An empty chain yields the failure's native status; if
    /// every handler returns a negative value, the last returned value
    /// stands.
    pub fn run(&self, error: &Failure) -> i32 {
        let mut result = error.status();
        for handler in &self.handlers {
            result = handler.handle(error);
            if result >= 0 {
                break;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResult(i32);

    impl ResultHandler for FixedResult {
        fn handle(&self, _value: &Value) -> i32 {
            self.0
        }
    }

    struct FixedException(i32);

    impl ExceptionHandler for FixedException {
        fn handle(&self, _error: &Failure) -> i32 {
            self.0
        }
    }

    fn result_chain(returns: &[i32]) -> ResultChain {
        ResultChain::new(
            returns
                .iter()
                .map(|&r| Arc::new(FixedResult(r)) as Arc<dyn ResultHandler>)
                .collect(),
        )
    }

    #[test]
    fn test_result_chain_stops_at_first_non_negative() {
        let chain = result_chain(&[-1, -1, 2, 5]);
        assert_eq!(chain.run(&Value::Null), 2);
    }

    #[test]
    fn test_result_chain_all_negative_keeps_last_value() {
        let chain = result_chain(&[-1, -1]);
        assert_eq!(chain.run(&Value::Null), -1);
    }

    #[test]
    fn test_empty_result_chain_is_success() {
        let chain = result_chain(&[]);
        assert_eq!(chain.run(&Value::Int(7)), 0);
    }

    #[test]
    fn test_empty_exception_chain_uses_native_status() {
        let chain = ExceptionChain::new(Vec::new());
        assert_eq!(chain.run(&Failure::with_status("boom", 42)), 42);
    }

    #[test]
    fn test_exception_chain_stops_at_first_non_negative() {
        let chain = ExceptionChain::new(vec![
            Arc::new(FixedException(-3)) as Arc<dyn ExceptionHandler>,
            Arc::new(FixedException(0)),
            Arc::new(FixedException(9)),
        ]);
        assert_eq!(chain.run(&Failure::new("boom")), 0);
    }

    #[test]
    fn test_console_exception_handler_returns_native_status() {
        let handler = ConsoleExceptionHandler;
        assert_eq!(handler.handle(&Failure::with_status("boom", 3)), 3);
    }

    #[test]
    fn test_file_result_handler_writes_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.out");
        let handler = FileResultHandler::new(Some(path.clone()));
        assert_eq!(handler.handle(&Value::Int(7)), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "7\n");
    }
}
