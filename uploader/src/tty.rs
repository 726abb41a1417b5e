// Licensed under the Apache-2.0 license

use std::ffi::CString;
use std::io::{self, ErrorKind, Read, Write};
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;

/// A tty serial device configured raw 8N1 at a fixed baud rate. The fd
/// is closed on drop, so the hardware handle cannot leak past the
/// upload session that opened it.
pub struct SerialPort {
    fd: OwnedFd,
}

impl SerialPort {
    pub fn open(path: &Path, baud_rate: u32, read_timeout: Duration) -> io::Result<Self> {
        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "NUL in device path"))?;
        let raw_fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDWR | libc::O_NOCTTY) };
        if raw_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };

        let speed = baud_to_speed(baud_rate)?;
        unsafe {
            let mut termios = MaybeUninit::<libc::termios>::uninit();
            if libc::tcgetattr(fd.as_raw_fd(), termios.as_mut_ptr()) != 0 {
                return Err(io::Error::last_os_error());
            }
            let mut termios = termios.assume_init();
            libc::cfmakeraw(&mut termios);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::CSTOPB | libc::CRTSCTS);
            termios.c_cflag |= libc::CS8 | libc::CREAD | libc::CLOCAL;
            // VMIN=0/VTIME>0: reads return what arrived within the
            // timeout instead of blocking forever on a hung target.
            termios.c_cc[libc::VMIN] = 0;
            termios.c_cc[libc::VTIME] = timeout_deciseconds(read_timeout);
            if libc::cfsetispeed(&mut termios, speed) != 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::cfsetospeed(&mut termios, speed) != 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::tcsetattr(fd.as_raw_fd(), libc::TCSANOW, &termios as *const _) != 0 {
                return Err(io::Error::last_os_error());
            }
            // Drop anything the target sent before we were listening.
            if libc::tcflush(fd.as_raw_fd(), libc::TCIOFLUSH) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(Self { fd })
    }
}

fn timeout_deciseconds(timeout: Duration) -> libc::cc_t {
    (timeout.as_millis() / 100).clamp(1, 255) as libc::cc_t
}

fn baud_to_speed(baud_rate: u32) -> io::Result<libc::speed_t> {
    Ok(match baud_rate {
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        _ => {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("unsupported baud rate {baud_rate}"),
            ))
        }
    })
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rv = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if rv < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(rv as usize)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let rv = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
            )
        };
        if rv < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(rv as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        if unsafe { libc::tcdrain(self.fd.as_raw_fd()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_deciseconds_clamped() {
        assert_eq!(timeout_deciseconds(Duration::from_millis(0)), 1);
        assert_eq!(timeout_deciseconds(Duration::from_secs(1)), 10);
        assert_eq!(timeout_deciseconds(Duration::from_secs(60)), 255);
    }

    #[test]
    fn test_unsupported_baud_rejected() {
        assert!(baud_to_speed(12345).is_err());
        assert!(baud_to_speed(115200).is_ok());
    }
}
