//! Keep-alive socket options.

#![allow(unsafe_code)]

use std::{
    ffi::CStr,
    io,
    os::unix::io::{AsRawFd, RawFd},
};

use elaphure_core::{KeepAlivePolicy, OsVersion};
use libc::c_int;

/// Release of the running kernel, if it can be read and parsed.
pub fn os_version() -> Option<OsVersion> {
    // SAFETY: `utsname` is plain old data; all-zero is a valid value.
    let mut name: libc::utsname = unsafe { std::mem::zeroed() };

    // SAFETY: `name` is a valid, writable `utsname`.
    if unsafe { libc::uname(&raw mut name) } != 0 {
        return None;
    }

    // SAFETY: `uname` NUL-terminates every field it fills in.
    let release = unsafe { CStr::from_ptr(name.release.as_ptr()) };
    OsVersion::parse(&release.to_string_lossy())
}

/// Apply `policy` to a connected socket.
///
/// Any option the kernel refuses is reported, naming the option.
pub fn apply<S: AsRawFd>(socket: &S, policy: &KeepAlivePolicy) -> io::Result<()> {
    let fd = socket.as_raw_fd();

    set_option(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1, "SO_KEEPALIVE")?;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    set_option(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, secs(policy.idle), "TCP_KEEPIDLE")?;

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    set_option(fd, libc::IPPROTO_TCP, libc::TCP_KEEPALIVE, secs(policy.idle), "TCP_KEEPALIVE")?;

    set_option(fd, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, secs(policy.interval), "TCP_KEEPINTVL")?;
    set_option(
        fd,
        libc::IPPROTO_TCP,
        libc::TCP_KEEPCNT,
        c_int::try_from(policy.retries).unwrap_or(c_int::MAX),
        "TCP_KEEPCNT",
    )?;

    Ok(())
}

fn secs(duration: std::time::Duration) -> c_int {
    c_int::try_from(duration.as_secs()).unwrap_or(c_int::MAX)
}

fn set_option(
    fd: RawFd,
    level: c_int,
    option: c_int,
    value: c_int,
    name: &str,
) -> io::Result<()> {
    // SAFETY: `value` outlives the call and its size is passed alongside it.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            option,
            (&raw const value).cast::<libc::c_void>(),
            std::mem::size_of::<c_int>() as libc::socklen_t,
        )
    };

    if ret == 0 {
        Ok(())
    } else {
        let err = io::Error::last_os_error();
        Err(io::Error::new(err.kind(), format!("failed to set {name}: {err}")))
    }
}
