//! Window geometry capture and replication

use std::os::unix::io::RawFd;

/// Window size in characters and pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of rows (characters)
    pub rows: u16,
    /// Number of columns (characters)
    pub cols: u16,
    /// Width in pixels (optional, can be 0)
    pub pixel_width: u16,
    /// Height in pixels (optional, can be 0)
    pub pixel_height: u16,
}

impl WindowSize {
    /// Create a new window size
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }

    /// Create a window size with pixel dimensions
    pub fn with_pixels(cols: u16, rows: u16, pixel_width: u16, pixel_height: u16) -> Self {
        Self {
            rows,
            cols,
            pixel_width,
            pixel_height,
        }
    }

    /// Capture the current geometry of a terminal descriptor (TIOCGWINSZ)
    pub fn from_fd(fd: RawFd) -> nix::Result<Self> {
        let mut ws = libc::winsize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        // SAFETY: TIOCGWINSZ is a valid ioctl for getting window size
        let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ as libc::c_ulong, &mut ws) };

        if result < 0 {
            Err(nix::errno::Errno::last())
        } else {
            Ok(Self::from(ws))
        }
    }

    /// Apply this geometry to a terminal descriptor (TIOCSWINSZ)
    pub fn apply(&self, fd: RawFd) -> nix::Result<()> {
        let ws = self.to_winsize();

        // SAFETY: TIOCSWINSZ is a valid ioctl for setting window size
        let result = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ as libc::c_ulong, &ws) };

        if result < 0 {
            Err(nix::errno::Errno::last())
        } else {
            Ok(())
        }
    }

    /// Convert to the libc winsize structure
    pub fn to_winsize(&self) -> libc::winsize {
        libc::winsize {
            ws_row: self.rows,
            ws_col: self.cols,
            ws_xpixel: self.pixel_width,
            ws_ypixel: self.pixel_height,
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl From<libc::winsize> for WindowSize {
    fn from(ws: libc::winsize) -> Self {
        Self {
            rows: ws.ws_row,
            cols: ws.ws_col,
            pixel_width: ws.ws_xpixel,
            pixel_height: ws.ws_ypixel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_size_default() {
        let size = WindowSize::default();
        assert_eq!(size.cols, 80);
        assert_eq!(size.rows, 24);
    }

    #[test]
    fn test_window_size_new() {
        let size = WindowSize::new(120, 40);
        assert_eq!(size.cols, 120);
        assert_eq!(size.rows, 40);
        assert_eq!(size.pixel_width, 0);
        assert_eq!(size.pixel_height, 0);
    }

    #[test]
    fn test_to_winsize_round_trip() {
        let size = WindowSize::with_pixels(80, 24, 800, 600);
        let ws = size.to_winsize();
        assert_eq!(ws.ws_col, 80);
        assert_eq!(ws.ws_row, 24);
        assert_eq!(WindowSize::from(ws), size);
    }

    #[test]
    fn test_apply_and_read_back_on_pty() {
        let pty = crate::Pty::open(crate::DEFAULT_NAME_CAPACITY).unwrap();
        let size = WindowSize::new(132, 50);
        size.apply(pty.master_fd()).unwrap();
        let read_back = WindowSize::from_fd(pty.master_fd()).unwrap();
        assert_eq!(read_back.cols, 132);
        assert_eq!(read_back.rows, 50);
    }

    #[test]
    fn test_from_fd_non_terminal() {
        use std::os::unix::io::AsRawFd;

        // /dev/null is not a terminal, capture must fail with an errno
        let file = std::fs::File::open("/dev/null").unwrap();
        assert!(WindowSize::from_fd(file.as_raw_fd()).is_err());
    }
}
