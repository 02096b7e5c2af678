use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};

/// Signals the Rust runtime ignores at startup. Ignored dispositions survive
/// `exec`, so children reset them before running the target program.
const INHERITED_IGNORES: [Signal; 1] = [Signal::SIGPIPE];

/// Put signal handling back to the defaults a freshly exec'd program expects.
///
/// Only called in a forked child, before exec.
pub fn restore_default_dispositions() -> Result<(), Errno> {
    for sig in INHERITED_IGNORES {
        // SAFETY: SIG_DFL installs no handler code.
        unsafe { signal::signal(sig, SigHandler::SigDfl) }?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_sets_default_and_reports_success() {
        assert!(restore_default_dispositions().is_ok());

        // Put the runtime's disposition back for the rest of the test binary.
        let previous = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigIgn) }.unwrap();
        assert_eq!(previous, SigHandler::SigDfl);
    }
}
