//! Simulated TMC5161 on an SPI bus.
//!
//! Registers are plain storage. Like the real chip, the payload of every
//! response carries the value requested by the *previous* read datagram, so a
//! driver that reads with a single transfer gets stale data.

#![allow(dead_code)]

use std::cell::RefCell;
use std::future::Future;
use std::pin::pin;
use std::task::{Context, Poll, Waker};

use embedded_hal::spi::{ErrorKind, ErrorType, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

impl embedded_hal::spi::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// One datagram as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(u8),
    Write(u8, i32),
}

pub struct SimDevice {
    regs: [i32; 128],
    /// Value shifted out with the next response.
    latched: i32,
    status: u8,
    log: Vec<Access>,
    fail_after: Option<usize>,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self {
            regs: [0; 128],
            latched: 0,
            status: 0,
            log: Vec::new(),
            fail_after: None,
        }
    }
}

impl SimDevice {
    pub fn with_reg(mut self, address: u8, value: i32) -> Self {
        self.regs[address as usize] = value;
        self
    }

    pub fn with_status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    pub fn reg(&self, address: u8) -> i32 {
        self.regs[address as usize]
    }

    pub fn set_reg(&mut self, address: u8, value: i32) {
        self.regs[address as usize] = value;
    }

    /// Every datagram since the last [`clear_log`](Self::clear_log).
    pub fn log(&self) -> &[Access] {
        &self.log
    }

    /// Only the write datagrams, in order.
    pub fn writes(&self) -> Vec<(u8, i32)> {
        self.log
            .iter()
            .filter_map(|access| match *access {
                Access::Write(address, value) => Some((address, value)),
                Access::Read(_) => None,
            })
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Fails every transfer once `count` more datagrams have gone through.
    pub fn fail_after(&mut self, count: usize) {
        self.fail_after = Some(self.log.len() + count);
    }

    fn exchange(&mut self, frame: &mut [u8]) -> Result<(), SimError> {
        assert_eq!(frame.len(), 5, "datagrams are 40 bits");
        if self.fail_after.is_some_and(|limit| self.log.len() >= limit) {
            return Err(SimError);
        }

        let request = [frame[0], frame[1], frame[2], frame[3], frame[4]];
        let address = request[0] & 0x7F;

        frame[0] = self.status;
        frame[1..].copy_from_slice(&self.latched.to_be_bytes());

        if request[0] & 0x80 != 0 {
            let value = i32::from_be_bytes([request[1], request[2], request[3], request[4]]);
            self.regs[address as usize] = value;
            self.log.push(Access::Write(address, value));
        } else {
            self.latched = self.regs[address as usize];
            self.log.push(Access::Read(address));
        }
        Ok(())
    }
}

/// One chip select on the simulated bus.
pub struct SimSpi<'a> {
    device: &'a RefCell<SimDevice>,
}

impl<'a> SimSpi<'a> {
    pub fn new(device: &'a RefCell<SimDevice>) -> Self {
        Self { device }
    }

    fn run(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        let mut device = self.device.borrow_mut();
        for op in operations {
            match op {
                Operation::TransferInPlace(buf) => device.exchange(buf)?,
                _ => panic!("datagrams are exchanged with transfer_in_place"),
            }
        }
        Ok(())
    }
}

impl ErrorType for SimSpi<'_> {
    type Error = SimError;
}

impl embedded_hal::spi::SpiDevice for SimSpi<'_> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        self.run(operations)
    }
}

impl embedded_hal_async::spi::SpiDevice for SimSpi<'_> {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        self.run(operations)
    }
}

/// Polls a future that never has to wait.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let mut cx = Context::from_waker(Waker::noop());
    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }
    }
}
