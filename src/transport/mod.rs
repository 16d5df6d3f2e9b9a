//! Transport layer for serial I/O abstraction

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

mod mock;
mod serial;
pub use mock::MockTransport;
pub use serial::SerialTransport;

/// Transport trait for robot byte streams
pub trait Transport: Send {
    /// Read available data into buffer, returns number of bytes read (0 if none yet)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Change the host-side line rate
    ///
    /// Transports without a line rate ignore this.
    fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<()> {
        Ok(())
    }

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0)
    }

    /// Discard received bytes nobody has read yet, returns how many
    fn clear_input(&mut self) -> Result<usize> {
        let mut scratch = [0u8; 64];
        let mut cleared = 0;
        while self.available()? > 0 {
            match self.read(&mut scratch)? {
                0 => break,
                n => cleared += n,
            }
        }
        Ok(cleared)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        (**self).read(buffer)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        (**self).set_baud_rate(baud_rate)
    }

    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn clear_input(&mut self) -> Result<usize> {
        (**self).clear_input()
    }
}

/// Write the whole buffer, then flush
pub fn write_all(transport: &mut dyn Transport, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        match transport.write(data)? {
            0 => return Err(Error::Disconnected),
            n => data = &data[n..],
        }
    }
    transport.flush()
}

/// Fill `buffer` completely or fail with [`Error::Timeout`]
pub fn read_exact_timeout(
    transport: &mut dyn Transport,
    buffer: &mut [u8],
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut filled = 0;
    while filled < buffer.len() {
        let n = transport.read(&mut buffer[filled..])?;
        filled += n;
        if filled < buffer.len() {
            if Instant::now() >= deadline {
                log::debug!("Read timeout after {}/{} byte(s)", filled, buffer.len());
                return Err(Error::Timeout);
            }
            if n == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }
    Ok(())
}
