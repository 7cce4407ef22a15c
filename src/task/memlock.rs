// src/task/memlock.rs

//! Locked-memory limit handling for kernel probes.

use crate::errors::Result;

/// Lift `RLIMIT_MEMLOCK` so kernel maps can be created by this process.
#[cfg(target_os = "linux")]
pub fn remove_memlock_limit() -> Result<()> {
    use crate::errors::ProbeflowError;

    let limit = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };

    // SAFETY: `limit` is a valid, fully initialised rlimit living for the
    // duration of the call.
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &limit) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(ProbeflowError::ResourceAcquisition(format!(
            "removing memlock limit: {err}"
        )));
    }

    tracing::debug!("memlock limit removed");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn remove_memlock_limit() -> Result<()> {
    tracing::debug!("memlock limit is not managed on this platform");
    Ok(())
}
