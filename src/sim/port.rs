//! Fake serial port backed by a simulated robot

use super::SimulatedRobot;
use crate::error::Result;
use crate::oi::{CommandDecoder, LinkCommand};
use crate::transport::Transport;
use std::collections::VecDeque;

/// Serial port whose far end is a simulated robot
///
/// Written bytes are decoded as an OI stream; responses become readable.
pub struct SimPort<S> {
    robot: S,
    decoder: CommandDecoder,
    outgoing: VecDeque<u8>,
    baud_rate: u32,
}

impl<S: SimulatedRobot> SimPort<S> {
    pub fn new(robot: S) -> Self {
        Self {
            robot,
            decoder: CommandDecoder::new(),
            outgoing: VecDeque::new(),
            baud_rate: 57600,
        }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Malformed commands skipped so far
    pub fn dropped(&self) -> u64 {
        self.decoder.dropped()
    }
}

impl<S: SimulatedRobot> Transport for SimPort<S> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let n = self.outgoing.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(self.outgoing.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        log::trace!("SimPort RX: {:02X?}", data);
        self.decoder.push(data);
        while let Some(cmd) = self.decoder.next_command() {
            if let Some(reply) = self.robot.execute(&LinkCommand::Oi(cmd)) {
                self.outgoing.extend(reply);
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.outgoing.len())
    }
}
