//! SIGSEGV disposition
//!
//! Faults are delegated to whichever handler was installed before ours,
//! unless the process asked to abort on segmentation faults.

use std::ffi::{c_int, c_void};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use shade_core::Result;

static PREVIOUS: OnceLock<SigAction> = OnceLock::new();
static ABORT: AtomicBool = AtomicBool::new(false);
static INSTALL: Mutex<()> = Mutex::new(());

/// What to do with a segmentation fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegvDisposition {
    /// Abort the process
    Abort,
    /// Call the previously installed handler
    Delegate,
    /// Restore the default action and let the fault recur
    Default,
}

impl SegvDisposition {
    /// Decide from the abort setting and the previously installed handler
    #[must_use]
    pub const fn decide(abort_on_segv: bool, previous: Option<SigHandler>) -> Self {
        if abort_on_segv {
            return Self::Abort;
        }
        match previous {
            Some(SigHandler::Handler(_) | SigHandler::SigAction(_)) => Self::Delegate,
            Some(SigHandler::SigDfl | SigHandler::SigIgn) | None => Self::Default,
        }
    }

    /// What the installed handler would do with a fault right now
    #[must_use]
    pub fn current() -> Self {
        Self::decide(
            ABORT.load(Ordering::Acquire),
            PREVIOUS.get().map(SigAction::handler),
        )
    }
}

extern "C" fn on_segv(signum: c_int, info: *mut libc::siginfo_t, context: *mut c_void) {
    let previous = PREVIOUS.get().map(SigAction::handler);
    match SegvDisposition::current() {
        // SAFETY: abort(3) is async-signal-safe.
        SegvDisposition::Abort => unsafe { libc::abort() },
        SegvDisposition::Delegate => match previous {
            Some(SigHandler::Handler(handler)) => handler(signum),
            Some(SigHandler::SigAction(handler)) => handler(signum, info, context),
            _ => {}
        },
        // SAFETY: signal(2) is async-signal-safe.
        SegvDisposition::Default => unsafe {
            libc::signal(libc::SIGSEGV, libc::SIG_DFL);
        },
    }
}

/// Install the SIGSEGV handler
///
/// Installing again only updates the abort setting; the handler chain is
/// recorded once.
///
/// # Errors
/// Returns error if sigaction(2) fails
pub fn install_segv_handler(abort_on_segv: bool) -> Result<()> {
    let _install = INSTALL.lock().unwrap_or_else(PoisonError::into_inner);
    ABORT.store(abort_on_segv, Ordering::Release);
    if PREVIOUS.get().is_some() {
        return Ok(());
    }

    let action = SigAction::new(
        SigHandler::SigAction(on_segv),
        SaFlags::SA_SIGINFO | SaFlags::SA_ONSTACK,
        SigSet::empty(),
    );
    // SAFETY: `on_segv` only calls async-signal-safe functions.
    let previous = unsafe { signal::sigaction(Signal::SIGSEGV, &action) }.map_err(|e| {
        tracing::error!(error = %e, "Failed to install SIGSEGV handler");
        e
    })?;
    let _ = PREVIOUS.set(previous);

    tracing::debug!(abort_on_segv, "Installed SIGSEGV handler");
    Ok(())
}

/// Install the SIGSEGV handler according to the process configuration
///
/// # Errors
/// Returns error if sigaction(2) fails
pub fn install() -> Result<()> {
    install_segv_handler(shade_core::abort_on_segv())
}
