//! Scoped peripheral reconfiguration around SPI transactions.
//!
//! A shared SPI peripheral may be running in a mode other than the one the
//! TMC5161 needs (SPI mode 3, MSB first). [`ModeScoped`] wraps a
//! [`SpiDevice`](embedded_hal::spi::SpiDevice) and applies a [`BusMode`]
//! before every transaction, restoring the previous settings afterwards,
//! including when the transaction fails.

use embedded_hal::spi::{ErrorType, Operation};

/// A peripheral setting that is swapped in for the duration of a transaction.
pub trait BusMode {
    /// Settings captured before [`apply`](BusMode::apply).
    type Saved;

    /// Saves the current peripheral settings and applies this mode.
    fn apply(&mut self) -> Self::Saved;

    /// Puts back settings returned by [`apply`](BusMode::apply).
    fn restore(&mut self, saved: Self::Saved);
}

/// Restores a [`BusMode`] when dropped.
struct Restore<'a, M: BusMode> {
    mode: &'a mut M,
    saved: Option<M::Saved>,
}

impl<'a, M: BusMode> Restore<'a, M> {
    fn apply(mode: &'a mut M) -> Self {
        let saved = mode.apply();
        Self {
            mode,
            saved: Some(saved),
        }
    }
}

impl<M: BusMode> Drop for Restore<'_, M> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.mode.restore(saved);
        }
    }
}

/// SPI device that runs every transaction under a [`BusMode`].
pub struct ModeScoped<SPI, M> {
    spi: SPI,
    mode: M,
}

impl<SPI, M> ModeScoped<SPI, M> {
    /// Wraps `spi`.
    pub const fn new(spi: SPI, mode: M) -> Self {
        Self { spi, mode }
    }

    /// Returns the wrapped device and mode.
    pub fn release(self) -> (SPI, M) {
        (self.spi, self.mode)
    }
}

impl<SPI: ErrorType, M> ErrorType for ModeScoped<SPI, M> {
    type Error = SPI::Error;
}

impl<SPI, M> embedded_hal::spi::SpiDevice for ModeScoped<SPI, M>
where
    SPI: embedded_hal::spi::SpiDevice,
    M: BusMode,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let _restore = Restore::apply(&mut self.mode);
        self.spi.transaction(operations)
    }
}

impl<SPI, M> embedded_hal_async::spi::SpiDevice for ModeScoped<SPI, M>
where
    SPI: embedded_hal_async::spi::SpiDevice,
    M: BusMode,
{
    async fn transaction(
        &mut self,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        let _restore = Restore::apply(&mut self.mode);
        self.spi.transaction(operations).await
    }
}
