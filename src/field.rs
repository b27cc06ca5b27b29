//! Bit-field access within 32-bit register values.
//!
//! A [`Field`] is an unshifted `mask` plus the `shift` of its lowest bit.
//! [`Field::get`] and [`Field::set`] are pure; the driver wraps them in a
//! register read-modify-write. The typed layouts in [`register`](crate::register)
//! cover the registers the driver configures; `Field` reaches any other bits.

/// A sub-range of bits within a 32-bit register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    /// Mask of the field value, before shifting.
    pub mask: u32,
    /// Position of the field's least significant bit.
    pub shift: u8,
}

impl Field {
    /// Creates a field from an unshifted mask and a shift.
    ///
    /// # Panics
    ///
    /// If `shift` is 32 or more.
    pub const fn new(mask: u32, shift: u8) -> Self {
        assert!(shift < 32, "field shift outside a 32-bit register");
        Self { mask, shift }
    }

    /// Single-bit field at `shift`.
    pub const fn bit(shift: u8) -> Self {
        Self::new(1, shift)
    }

    /// Mask of the field bits in register position.
    pub const fn register_mask(self) -> u32 {
        self.mask << self.shift
    }

    /// Extracts the field from a register value.
    pub const fn get(self, register: u32) -> u32 {
        (register >> self.shift) & self.mask
    }

    /// Returns `register` with the field replaced by `value & mask`.
    /// Bits outside the field are left untouched.
    pub const fn set(self, register: u32, value: u32) -> u32 {
        (register & !self.register_mask()) | ((value & self.mask) << self.shift)
    }
}
