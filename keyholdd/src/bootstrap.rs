/// Process hardening applied at daemon startup, before any key material is
/// touched.  Best-effort and non-fatal: a failed call is logged and the
/// daemon continues.
///
/// 1. `PR_SET_DUMPABLE 0` — no core dumps, no `/proc/<pid>/mem` reads from
///    unprivileged processes.
/// 2. `mlockall(MCL_CURRENT | MCL_FUTURE)` — decrypted key material never
///    reaches swap.  Needs `CAP_IPC_LOCK`; absence is only a warning.
#[cfg(unix)]
pub fn secure_bootstrap() {
    // SAFETY: prctl with PR_SET_DUMPABLE and plain integer arguments.
    let ret = unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0i64, 0i64, 0i64, 0i64) };
    if ret == 0 {
        tracing::info!("core dumps disabled (PR_SET_DUMPABLE=0)");
    } else {
        let err = std::io::Error::last_os_error();
        tracing::warn!("PR_SET_DUMPABLE=0 failed (non-fatal): {err}");
    }

    // SAFETY: mlockall takes only flags; failure is handled below.
    let ret = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if ret == 0 {
        tracing::info!("memory locked (mlockall)");
    } else {
        let err = std::io::Error::last_os_error();
        tracing::warn!("mlockall failed (non-fatal, likely missing CAP_IPC_LOCK): {err}");
    }
}

#[cfg(not(unix))]
pub fn secure_bootstrap() {}
