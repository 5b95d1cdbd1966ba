//! Serialized console output.
//!
//! Command results and live profiler displays can be produced from different
//! threads, so every write goes through one lock and lands as a whole. A
//! capturing console collects output in memory instead, for tests and for
//! the one-shot CLI commands.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::KestrelResult;

#[derive(Debug)]
enum Output
{
    Stdout,
    Capture(String),
}

/// Shared handle to the console. Clones write to the same place.
#[derive(Debug, Clone)]
pub struct Console
{
    output: Arc<Mutex<Output>>,
}

impl Console
{
    /// A console writing to standard output.
    #[must_use]
    pub fn stdout() -> Self
    {
        Self {
            output: Arc::new(Mutex::new(Output::Stdout)),
        }
    }

    /// A console collecting output for [`Console::take_captured`].
    #[must_use]
    pub fn capture() -> Self
    {
        Self {
            output: Arc::new(Mutex::new(Output::Capture(String::new()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Output>
    {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `text` as one unit.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::KestrelError::Io`] if standard output is closed.
    pub fn write(&self, text: &str) -> KestrelResult<()>
    {
        if text.is_empty() {
            return Ok(());
        }

        match &mut *self.lock() {
            Output::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            Output::Capture(buffer) => buffer.push_str(text),
        }
        Ok(())
    }

    /// Write `text` followed by a newline unless it already ends with one.
    ///
    /// ## Errors
    ///
    /// See [`Console::write`].
    pub fn write_line(&self, text: &str) -> KestrelResult<()>
    {
        if text.ends_with('\n') {
            self.write(text)
        } else {
            self.write(&format!("{text}\n"))
        }
    }

    /// Drain everything captured so far. Always empty for stdout consoles.
    #[must_use]
    pub fn take_captured(&self) -> String
    {
        match &mut *self.lock() {
            Output::Stdout => String::new(),
            Output::Capture(buffer) => std::mem::take(buffer),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_capture_collects_whole_writes()
    {
        let console = Console::capture();
        let other = console.clone();
        console.write("a").unwrap();
        other.write_line("b").unwrap();
        other.write_line("c\n").unwrap();
        assert_eq!(console.take_captured(), "ab\nc\n");
        assert!(console.take_captured().is_empty());
    }

    #[test]
    fn test_concurrent_writers_do_not_interleave()
    {
        let console = Console::capture();
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let console = console.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        console.write_line(&format!("line from {n}")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = console.take_captured();
        assert_eq!(text.lines().count(), 200);
        assert!(text.lines().all(|line| line.starts_with("line from ")));
    }
}
