//! 40-bit SPI datagram framing.
//!
//! Every transaction is five bytes, most significant first: one address byte
//! (bit 7 set for writes) followed by a big-endian 32-bit payload. The device
//! answers with its status byte and, in the payload, the value requested by
//! the *previous* read datagram.

use bitfield_struct::bitfield;

/// Write access flag in the address byte.
pub const WRITE_BIT: u8 = 0x80;

/// Mask of the 7-bit register address.
pub const ADDRESS_MASK: u8 = 0x7F;

/// Length of one datagram in bytes.
pub const DATAGRAM_LEN: usize = 5;

/// One 5-byte datagram, either as sent or as received.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Datagram([u8; DATAGRAM_LEN]);

impl Datagram {
    /// Builds a write datagram for `address`.
    pub const fn write(address: u8, value: i32) -> Self {
        let [b1, b2, b3, b4] = value.to_be_bytes();
        Self([(address & ADDRESS_MASK) | WRITE_BIT, b1, b2, b3, b4])
    }

    /// Builds a read request for `address`. Bit 7 is always cleared and the
    /// payload is zero.
    pub const fn read(address: u8) -> Self {
        Self([address & ADDRESS_MASK, 0, 0, 0, 0])
    }

    /// Wraps bytes clocked in from the device.
    pub const fn from_bytes(bytes: [u8; DATAGRAM_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes, ready to be clocked out.
    pub const fn into_bytes(self) -> [u8; DATAGRAM_LEN] {
        self.0
    }

    /// Register address without the access flag.
    pub const fn address(&self) -> u8 {
        self.0[0] & ADDRESS_MASK
    }

    /// Whether the write flag is set.
    pub const fn is_write(&self) -> bool {
        self.0[0] & WRITE_BIT != 0
    }

    /// The big-endian payload bytes.
    pub const fn payload_bytes(&self) -> [u8; 4] {
        [self.0[1], self.0[2], self.0[3], self.0[4]]
    }

    /// The payload as a signed register value.
    pub const fn payload(&self) -> i32 {
        i32::from_be_bytes(self.payload_bytes())
    }

    /// Byte 0 of a response datagram.
    pub const fn status(&self) -> SpiStatus {
        SpiStatus::from_bits(self.0[0])
    }
}

/// Status flags returned in the first byte of every response.
#[bitfield(u8)]
pub struct SpiStatus {
    /// GSTAT.reset: the chip has been reset since GSTAT was last cleared.
    pub reset_flag: bool,
    /// GSTAT.drv_err: driver shut down on overtemperature or short.
    pub driver_error: bool,
    /// DRV_STATUS.sg_result: stallGuard flag.
    pub stallguard: bool,
    /// DRV_STATUS.stst: motor at standstill.
    pub standstill: bool,
    /// RAMP_STAT.velocity_reached.
    pub velocity_reached: bool,
    /// RAMP_STAT.position_reached.
    pub position_reached: bool,
    /// RAMP_STAT.status_stop_l.
    pub stop_left: bool,
    /// RAMP_STAT.status_stop_r.
    pub stop_right: bool,
}
