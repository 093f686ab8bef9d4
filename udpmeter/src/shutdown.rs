//! Cooperative shutdown token.
//!
//! Run loops poll [`Shutdown::is_requested`] between bounded waits, so a stop
//! request is observed within one receive timeout and the final summary path
//! still runs.
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token set by SIGINT or SIGTERM.
    ///
    /// A second signal while the flag is already set terminates the process
    /// immediately, so a stuck run can still be killed from the terminal.
    pub fn install() -> io::Result<Self> {
        let shutdown = Self::new();
        for signal in [SIGINT, SIGTERM] {
            flag::register_conditional_shutdown(signal, 1, Arc::clone(&shutdown.flag))?;
            flag::register(signal, Arc::clone(&shutdown.flag))?;
        }
        Ok(shutdown)
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_visible_to_clones() {
        let shutdown = Shutdown::new();
        let handle = shutdown.clone();
        assert!(!shutdown.is_requested());
        handle.request();
        assert!(shutdown.is_requested());
    }

    #[test]
    fn test_installed_token_set_by_sigterm() {
        let shutdown = Shutdown::install().unwrap();
        assert!(!shutdown.is_requested());

        // The flag is still clear, so this first signal must not terminate.
        signal_hook::low_level::raise(SIGTERM).unwrap();
        assert!(shutdown.is_requested());
    }
}
