#![cfg_attr(not(any(test, feature = "std")), no_std)]
//! # TMC5161 Stepper Motor Controller Interface
//!
//! This crate provides a bisync-based driver for the TMC5161 stepper motor
//! controller and driver IC. It talks to the chip over SPI using 40-bit
//! datagrams and exposes the chip's internal ramp generator as motion
//! primitives (rotate, move to, move by, stop) plus percentage-scaled setters
//! for velocity, acceleration, position and direction.
//!
//! Blocking and asynchronous operation share one implementation through the
//! [`bisync`](https://docs.rs/bisync) crate, on top of `embedded-hal` and
//! `embedded-hal-async` `SpiDevice`s.
//!
//! ## Features
//!
//! *   **Pipelined reads handled for you:** the chip answers a read request on
//!     the *next* datagram, so every register read is two SPI transfers.
//! *   **Several motors per driver:** one `SpiDevice` (one chip select) per
//!     channel, stored in a fixed-size table owned by the driver.
//! *   **Typed registers:** GCONF, DRV_CONF, IHOLD_IRUN, CHOPCONF and
//!     RAMP_STAT as `bitfield-struct` layouts, read and written whole with
//!     `read_reg`/`write_reg`/`modify_reg`.
//! *   **Field access:** masked read-modify-write of any other bit-field
//!     through [`Field`].
//! *   **Register map:** addresses, access classes and reset values in
//!     [`register`].
//! *   **`defmt` and `log` Integration:** Optional support for logging and debugging.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! # use embedded_hal::spi::SpiDevice;
//! # use tmc5161_dd::{ChannelConfig, ScalingConfig, Tmc5161, TmcInterface};
//! # fn demo<S: SpiDevice>(spi_device: S) -> Result<(), tmc5161_dd::TmcError<S::Error>> {
//! let mut tmc: Tmc5161<TmcInterface<S>, S::Error> = Tmc5161::new(ScalingConfig::new());
//! let motor = tmc.init(spi_device, ChannelConfig::new())?;
//!
//! tmc.set_velocity(motor, 25)?;
//! tmc.move_to(motor, 51_200, tmc.vmax(motor)?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Every operation is a plain sequence of SPI datagrams. Field updates and
//! [`Tmc5161::move_by`] read a register and write back a value computed from
//! it; nothing makes that pair atomic with respect to other callers or to the
//! motion the chip is still executing. Callers sharing a channel must
//! serialize access themselves.
//!
//! ## Warning!
//!
//! ***Caution!*** This chip drives motor coils with high currents.
//! Incorrect configuration can damage the motor, the power stage, or the
//! mechanics it moves. Always consult the TMC5161 datasheet.

#[macro_use]
pub(crate) mod fmt;

pub mod bus;
pub mod config;
pub mod datagram;
pub mod field;
pub mod register;
pub mod scale;

use thiserror::Error;

pub use bus::{BusMode, ModeScoped};
pub use config::ChannelConfig;
pub use datagram::{Datagram, SpiStatus};
pub use field::Field;
pub use register::{AccessClass, ChopConf, DrvConf, GConf, IHoldIRun, RampMode, RampStat, Register};
pub use scale::{RangePolicy, ScalingConfig};

/// Default number of channels a driver can hold.
pub const MAX_CHANNELS: usize = 2;

#[derive(Debug, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TmcError<SpiErr> {
    #[error("SPI error")]
    Spi(SpiErr),
    #[error("All channels are in use")]
    ChannelsExhausted,
    #[error("Invalid channel configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("Channel handle was not issued by this driver")]
    InvalidChannel,
    #[error("Input {0} is outside 0..=100")]
    OutOfRange(u8),
    #[error("Feature or specific mode not supported/implemented: {0}")]
    NotSupported(&'static str),
}

/// Handle of an initialized channel.
///
/// Handles index the driver's channel table. Every operation checks the
/// handle against the channels actually initialized and fails with
/// [`TmcError::InvalidChannel`] otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(u8);

impl ChannelId {
    /// Handle for table slot `index`.
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Table slot of this handle.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// SPI datagram codec for one chip.
pub struct TmcInterface<SpiBus> {
    spi_bus: SpiBus,
    status: SpiStatus,
}

impl<SpiBus> TmcInterface<SpiBus> {
    pub fn new(spi_bus: SpiBus) -> Self {
        Self {
            spi_bus,
            status: SpiStatus::default(),
        }
    }

    /// Status byte returned with the most recent datagram.
    pub fn status(&self) -> SpiStatus {
        self.status
    }
}

#[path = "."]
mod asynchronous {
    use bisync::asynchronous::*;
    use device_driver::AsyncRegisterInterface as RegisterInterface;
    use embedded_hal_async::spi::SpiDevice;
    mod driver;
    pub use driver::*;
}
pub use asynchronous::Tmc5161 as Tmc5161Async;

#[path = "."]
mod blocking {
    use bisync::synchronous::*;
    use device_driver::RegisterInterface;
    use embedded_hal::spi::SpiDevice;
    #[allow(clippy::duplicate_mod)]
    mod driver;
    pub use driver::*;
}
pub use blocking::Tmc5161;
