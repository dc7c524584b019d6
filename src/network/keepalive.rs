//! TCP keepalive
//!
//! std exposes no keepalive tuning, so the options are set directly on the
//! socket descriptor.

use std::io;
use std::net::TcpStream;

use crate::config::KeepaliveConfig;

/// Apply `config` to a connected stream
#[cfg(unix)]
pub(crate) fn apply(stream: &TcpStream, config: &KeepaliveConfig) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let fd = stream.as_raw_fd();
    set_int_option(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, config.enabled as libc::c_int)?;
    if !config.enabled {
        return Ok(());
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        set_int_option(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, clamp(config.idle_secs))?;
        set_int_option(fd, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, clamp(config.interval_secs))?;
        set_int_option(fd, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, clamp(config.probes))?;
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        set_int_option(fd, libc::IPPROTO_TCP, libc::TCP_KEEPALIVE, clamp(config.idle_secs))?;
        set_int_option(fd, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, clamp(config.interval_secs))?;
        set_int_option(fd, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, clamp(config.probes))?;
    }

    Ok(())
}

/// Keepalive tuning is unavailable here; the OS defaults apply.
#[cfg(not(unix))]
pub(crate) fn apply(_stream: &TcpStream, config: &KeepaliveConfig) -> io::Result<()> {
    if config.enabled {
        tracing::debug!("TCP keepalive tuning not supported on this platform");
    }
    Ok(())
}

#[cfg(unix)]
fn clamp(value: u32) -> libc::c_int {
    value.clamp(1, libc::c_int::MAX as u32) as libc::c_int
}

#[cfg(unix)]
fn set_int_option(
    fd: std::os::fd::RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    // SAFETY: `value` lives for the duration of the call and its size is
    // passed alongside; `fd` is an open socket owned by the caller's stream.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
