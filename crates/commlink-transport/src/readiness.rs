use std::time::Duration;

#[cfg(unix)]
use std::io::ErrorKind;
#[cfg(unix)]
use std::os::fd::AsRawFd;

/// Wait until `socket` has data (or a pending error/hangup) for at most `timeout`.
///
/// Returns `Ok(false)` when the interval elapsed with nothing to read.
#[cfg(unix)]
pub(crate) fn wait_readable<S: AsRawFd>(socket: &S, timeout: Duration) -> std::io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd: socket.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    // SAFETY: `pfd` is a single valid, writable `pollfd` and its descriptor is
    // an open socket owned by the caller for the duration of the call.
    let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }

    Ok(rc > 0)
}

/// Fallback without `poll`: pace the caller, then let the non-blocking read decide.
#[cfg(not(unix))]
pub(crate) fn wait_readable<S>(_socket: &S, timeout: Duration) -> std::io::Result<bool> {
    const FALLBACK_SLICE: Duration = Duration::from_millis(1);
    std::thread::sleep(timeout.min(FALLBACK_SLICE));
    Ok(true)
}
