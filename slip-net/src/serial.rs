//! Serial port access through libc termios.
//!
//! The port is opened once, put into raw 8-bit mode, and then split into
//! independent read and write handles (dup'd descriptors) so the receive and
//! transmit threads can each own one.

use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};

/// Serial port parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl Parity {
    /// Parse a config value such as `none`, `E` or `odd`.
    pub fn parse(value: &str) -> Option<Parity> {
        match value.to_lowercase().as_str() {
            "n" | "none" => Some(Parity::None),
            "e" | "even" => Some(Parity::Even),
            "o" | "odd" => Some(Parity::Odd),
            _ => None,
        }
    }
}

/// Line settings for a serial port.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub path: String,
    pub baud: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    /// RTS/CTS hardware handshake. SLIP has no flow control of its own, so
    /// without it the UART may overrun under load.
    pub flow_control: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            path: String::new(),
            baud: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: false,
        }
    }
}

/// An open serial port. Closing happens on drop.
#[derive(Debug)]
pub struct SerialPort {
    fd: RawFd,
}

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// cfmakeraw equivalent, plus blocking single-byte reads.
fn make_raw(termios: &mut libc::termios) {
    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;
    termios.c_cc[libc::VMIN] = 1;
    termios.c_cc[libc::VTIME] = 0;
}

impl SerialPort {
    /// Open and configure a serial port.
    pub fn open(config: &SerialConfig) -> io::Result<Self> {
        let c_path = std::ffi::CString::new(config.path.as_str())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid path"))?;

        let fd = cvt(unsafe {
            libc::open(
                c_path.as_ptr(),
                libc::O_RDWR | libc::O_NOCTTY | libc::O_NONBLOCK,
            )
        })?;
        // From here on the descriptor is closed by Drop on every error path
        let port = SerialPort { fd };
        port.configure(config)?;
        Ok(port)
    }

    fn configure(&self, config: &SerialConfig) -> io::Result<()> {
        let fd = self.fd;
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        cvt(unsafe { libc::tcgetattr(fd, &mut termios) })?;

        make_raw(&mut termios);

        termios.c_cflag &= !libc::CSIZE;
        termios.c_cflag |= match config.data_bits {
            5 => libc::CS5,
            6 => libc::CS6,
            7 => libc::CS7,
            _ => libc::CS8,
        };

        match config.parity {
            Parity::None => {
                termios.c_cflag &= !libc::PARENB;
            }
            Parity::Even => {
                termios.c_cflag |= libc::PARENB;
                termios.c_cflag &= !libc::PARODD;
            }
            Parity::Odd => {
                termios.c_cflag |= libc::PARENB | libc::PARODD;
            }
        }

        if config.stop_bits == 2 {
            termios.c_cflag |= libc::CSTOPB;
        } else {
            termios.c_cflag &= !libc::CSTOPB;
        }

        termios.c_cflag |= libc::CLOCAL | libc::CREAD;
        if config.flow_control {
            termios.c_cflag |= libc::CRTSCTS;
        } else {
            termios.c_cflag &= !libc::CRTSCTS;
        }

        let speed = baud_to_speed(config.baud)?;
        unsafe {
            libc::cfsetispeed(&mut termios, speed);
            libc::cfsetospeed(&mut termios, speed);
        }

        cvt(unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) })?;

        // Opened non-blocking so a missing carrier can't hang open(); the
        // link threads want blocking I/O.
        let flags = cvt(unsafe { libc::fcntl(fd, libc::F_GETFL) })?;
        cvt(unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) })?;
        Ok(())
    }

    /// Get a Read handle (File wrapping a dup'd fd).
    pub fn reader(&self) -> io::Result<std::fs::File> {
        self.dup()
    }

    /// Get a Write handle (File wrapping a dup'd fd).
    pub fn writer(&self) -> io::Result<std::fs::File> {
        self.dup()
    }

    fn dup(&self) -> io::Result<std::fs::File> {
        let new_fd = cvt(unsafe { libc::dup(self.fd) })?;
        Ok(unsafe { std::fs::File::from_raw_fd(new_fd) })
    }
}

impl AsRawFd for SerialPort {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Map baud rate u32 to libc speed_t constant.
fn baud_to_speed(baud: u32) -> io::Result<libc::speed_t> {
    match baud {
        1200 => Ok(libc::B1200),
        2400 => Ok(libc::B2400),
        4800 => Ok(libc::B4800),
        9600 => Ok(libc::B9600),
        19200 => Ok(libc::B19200),
        38400 => Ok(libc::B38400),
        57600 => Ok(libc::B57600),
        115200 => Ok(libc::B115200),
        230400 => Ok(libc::B230400),
        460800 => Ok(libc::B460800),
        500000 => Ok(libc::B500000),
        576000 => Ok(libc::B576000),
        921600 => Ok(libc::B921600),
        1000000 => Ok(libc::B1000000),
        1152000 => Ok(libc::B1152000),
        1500000 => Ok(libc::B1500000),
        2000000 => Ok(libc::B2000000),
        3000000 => Ok(libc::B3000000),
        4000000 => Ok(libc::B4000000),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported baud rate: {}", baud),
        )),
    }
}

/// Create a raw-mode pseudo-terminal pair for testing. Returns (master, slave).
#[cfg(test)]
pub(crate) fn open_pty_pair() -> io::Result<(std::fs::File, std::fs::File)> {
    let mut master: RawFd = -1;
    let mut slave: RawFd = -1;
    cvt(unsafe {
        libc::openpty(
            &mut master,
            &mut slave,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    })?;
    let files = unsafe {
        (
            std::fs::File::from_raw_fd(master),
            std::fs::File::from_raw_fd(slave),
        )
    };

    for fd in [master, slave] {
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        cvt(unsafe { libc::tcgetattr(fd, &mut termios) })?;
        make_raw(&mut termios);
        cvt(unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) })?;
    }

    Ok(files)
}

/// Wait up to `timeout_ms` for `fd` to become readable.
#[cfg(test)]
pub(crate) fn poll_read(fd: RawFd, timeout_ms: i32) -> bool {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    unsafe { libc::poll(&mut pfd, 1, timeout_ms) > 0 }
}
