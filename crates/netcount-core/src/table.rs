//! Interface-table acquisition.
//!
//! An [`InterfaceTable`] hands the sampler one raw record buffer per cycle
//! together with the instant it was captured. The live source is the Darwin
//! routing sysctl; [`ReplayTable`] serves a previously dumped buffer so the
//! pipeline can be exercised anywhere.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::Result;

/// One raw buffer plus the monotonic instant it was read.
#[derive(Debug, Clone, Copy)]
pub struct Capture<'a> {
    pub buffer: &'a [u8],
    pub captured_at: Instant,
}

/// Source of raw interface-table buffers.
pub trait InterfaceTable {
    /// Read the current table. The returned buffer is valid until the next call.
    fn capture(&mut self) -> Result<Capture<'_>>;

    /// Short description for logs and UI titles.
    fn describe(&self) -> String;
}

impl<T: InterfaceTable + ?Sized> InterfaceTable for Box<T> {
    fn capture(&mut self) -> Result<Capture<'_>> {
        (**self).capture()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Initial capacity of the sysctl buffer; grown when the table is larger.
pub const PREALLOC_TABLE_BYTES: usize = 20 * 1024;

/// Attempts made when the table grows between the sizing and the read call.
#[cfg(target_os = "macos")]
const GROW_RETRIES: usize = 4;

/// Live interface list from `sysctl({CTL_NET, PF_ROUTE, 0, 0, NET_RT_IFLIST, 0})`.
#[derive(Debug)]
pub struct SysctlTable {
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    buf: Vec<u8>,
}

impl SysctlTable {
    /// Create the live table source. Only available on macOS.
    #[cfg(target_os = "macos")]
    pub fn new() -> Result<Self> {
        Ok(Self {
            buf: vec![0u8; PREALLOC_TABLE_BYTES],
        })
    }

    #[cfg(not(target_os = "macos"))]
    pub fn new() -> Result<Self> {
        Err(crate::Error::Unsupported("sysctl(NET_RT_IFLIST)"))
    }
}

#[cfg(target_os = "macos")]
fn read_iflist(buf: &mut Vec<u8>) -> std::io::Result<usize> {
    use std::ptr;

    let mut mib = [libc::CTL_NET, libc::PF_ROUTE, 0, 0, libc::NET_RT_IFLIST, 0];
    for _ in 0..GROW_RETRIES {
        let mut needed: libc::size_t = 0;
        // SAFETY: sizing call; `oldp` is null so the kernel only writes `needed`.
        let rc = unsafe {
            libc::sysctl(
                mib.as_mut_ptr(),
                mib.len() as libc::c_uint,
                ptr::null_mut(),
                &mut needed,
                ptr::null_mut(),
                0,
            )
        };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        if buf.len() < needed {
            log::debug!("growing interface table buffer to {needed} bytes");
            buf.resize(needed, 0);
        }

        let mut len: libc::size_t = buf.len();
        // SAFETY: `buf` is valid for writes of `len` bytes and the kernel
        // writes at most `len` bytes, reporting the amount in `len`.
        let rc = unsafe {
            libc::sysctl(
                mib.as_mut_ptr(),
                mib.len() as libc::c_uint,
                buf.as_mut_ptr().cast(),
                &mut len,
                ptr::null_mut(),
                0,
            )
        };
        if rc == 0 {
            return Ok(len);
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ENOMEM) {
            return Err(err);
        }
        log::debug!("interface table grew between sysctl calls, retrying");
    }
    Err(std::io::Error::other(
        "interface table kept growing between sysctl calls",
    ))
}

impl InterfaceTable for SysctlTable {
    #[cfg(target_os = "macos")]
    fn capture(&mut self) -> Result<Capture<'_>> {
        let len = read_iflist(&mut self.buf)?;
        Ok(Capture {
            buffer: &self.buf[..len],
            captured_at: Instant::now(),
        })
    }

    #[cfg(not(target_os = "macos"))]
    fn capture(&mut self) -> Result<Capture<'_>> {
        Err(crate::Error::Unsupported("sysctl(NET_RT_IFLIST)"))
    }

    fn describe(&self) -> String {
        "sysctl NET_RT_IFLIST".to_string()
    }
}

/// Serves the same dumped buffer on every capture, stamped with the current instant.
#[derive(Debug, Clone)]
pub struct ReplayTable {
    buf: Vec<u8>,
    origin: Option<PathBuf>,
}

impl ReplayTable {
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf, origin: None }
    }

    /// Load a buffer written by `netcount dump`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read(path)?;
        log::debug!("loaded {} byte(s) of interface table from {}", buf.len(), path.display());
        Ok(Self {
            buf,
            origin: Some(path.to_path_buf()),
        })
    }
}

impl InterfaceTable for ReplayTable {
    fn capture(&mut self) -> Result<Capture<'_>> {
        Ok(Capture {
            buffer: &self.buf,
            captured_at: Instant::now(),
        })
    }

    fn describe(&self) -> String {
        match &self.origin {
            Some(path) => format!("replay {}", path.display()),
            None => "replay (in memory)".to_string(),
        }
    }
}

/// The live table, or a replay of `from` when given.
pub fn open_table(from: Option<&Path>) -> Result<Box<dyn InterfaceTable + Send>> {
    match from {
        Some(path) => Ok(Box::new(ReplayTable::open(path)?)),
        None => Ok(Box::new(SysctlTable::new()?)),
    }
}
