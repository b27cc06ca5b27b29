//! TMC5161 register map.
//!
//! Addresses, the per-register access classes and the power-on reset values
//! for the 128-entry address space, plus typed layouts of the configuration
//! and status registers the driver touches.

use bitfield_struct::bitfield;

/// Number of addressable registers (7-bit address space).
pub const REGISTER_COUNT: usize = 128;

/// Register addresses.
pub mod addr {
    pub const GCONF: u8 = 0x00;
    pub const GSTAT: u8 = 0x01;
    pub const IFCNT: u8 = 0x02;
    pub const SLAVECONF: u8 = 0x03;
    pub const IOIN: u8 = 0x04;
    pub const X_COMPARE: u8 = 0x05;
    pub const OTP_PROG: u8 = 0x06;
    pub const OTP_READ: u8 = 0x07;
    pub const FACTORY_CONF: u8 = 0x08;
    pub const SHORT_CONF: u8 = 0x09;
    pub const DRV_CONF: u8 = 0x0A;
    pub const GLOBAL_SCALER: u8 = 0x0B;
    pub const OFFSET_READ: u8 = 0x0C;

    pub const IHOLD_IRUN: u8 = 0x10;
    pub const TPOWERDOWN: u8 = 0x11;
    pub const TSTEP: u8 = 0x12;
    pub const TPWMTHRS: u8 = 0x13;
    pub const TCOOLTHRS: u8 = 0x14;
    pub const THIGH: u8 = 0x15;

    pub const RAMPMODE: u8 = 0x20;
    pub const XACTUAL: u8 = 0x21;
    pub const VACTUAL: u8 = 0x22;
    pub const VSTART: u8 = 0x23;
    pub const A1: u8 = 0x24;
    pub const V1: u8 = 0x25;
    pub const AMAX: u8 = 0x26;
    pub const VMAX: u8 = 0x27;
    pub const DMAX: u8 = 0x28;
    pub const D1: u8 = 0x2A;
    pub const VSTOP: u8 = 0x2B;
    pub const TZEROWAIT: u8 = 0x2C;
    pub const XTARGET: u8 = 0x2D;

    pub const VDCMIN: u8 = 0x33;
    pub const SW_MODE: u8 = 0x34;
    pub const RAMP_STAT: u8 = 0x35;
    pub const XLATCH: u8 = 0x36;
    pub const ENCMODE: u8 = 0x38;
    pub const X_ENC: u8 = 0x39;
    pub const ENC_CONST: u8 = 0x3A;
    pub const ENC_STATUS: u8 = 0x3B;
    pub const ENC_LATCH: u8 = 0x3C;
    pub const ENC_DEVIATION: u8 = 0x3D;

    pub const MSLUT0: u8 = 0x60;
    pub const MSLUTSEL: u8 = 0x68;
    pub const MSLUTSTART: u8 = 0x69;
    pub const MSCNT: u8 = 0x6A;
    pub const MSCURACT: u8 = 0x6B;
    pub const CHOPCONF: u8 = 0x6C;
    pub const COOLCONF: u8 = 0x6D;
    pub const DCCTRL: u8 = 0x6E;
    pub const DRV_STATUS: u8 = 0x6F;
    pub const PWMCONF: u8 = 0x70;
    pub const PWM_SCALE: u8 = 0x71;
    pub const PWM_AUTO: u8 = 0x72;
    pub const LOST_STEPS: u8 = 0x73;
}

/// Access permission class of a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessClass {
    /// Reserved or unlisted address.
    None,
    /// Read only.
    ReadOnly,
    /// Write only.
    WriteOnly,
    /// Read and write.
    ReadWrite,
    /// Read and write with separate meanings for the read and written value.
    ReadWriteSplit,
    /// Read only flag register, cleared by reading.
    ReadOnlyClearOnRead,
    /// Write only, loaded with hardware presets on reset.
    WriteOnlyHardwarePreset,
}

impl AccessClass {
    /// Whether a read datagram may target a register of this class.
    pub const fn is_readable(self) -> bool {
        matches!(
            self,
            Self::ReadOnly | Self::ReadWrite | Self::ReadWriteSplit | Self::ReadOnlyClearOnRead
        )
    }

    /// Whether a write datagram may target a register of this class.
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            Self::WriteOnly | Self::ReadWrite | Self::ReadWriteSplit | Self::WriteOnlyHardwarePreset
        )
    }
}

use AccessClass::{
    None as NA, ReadOnly as RO, ReadWrite as RW, ReadWriteSplit as RWS, WriteOnly as WO,
    WriteOnlyHardwarePreset as WHP,
};

#[rustfmt::skip]
const ACCESS: [AccessClass; REGISTER_COUNT] = [
//  0    1    2    3    4    5    6    7    8    9    A    B    C    D    E    F
    RW,  RWS, RO,  WO,  RWS, WO,  WO,  RO,  RO,  WO,  WO,  WO,  RO,  NA,  NA,  NA,  // 0x00 - 0x0F
    WO,  WO,  RO,  WO,  WO,  WO,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  // 0x10 - 0x1F
    RW,  RW,  RO,  WO,  WO,  WO,  WO,  WO,  WO,  NA,  WO,  WO,  WO,  RW,  NA,  NA,  // 0x20 - 0x2F
    NA,  NA,  NA,  WO,  RW,  RWS, RO,  NA,  RW,  RW,  WO,  RWS, RO,  WO,  NA,  NA,  // 0x30 - 0x3F
    NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  // 0x40 - 0x4F
    NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  // 0x50 - 0x5F
    WHP, WHP, WHP, WHP, WHP, WHP, WHP, WHP, WHP, WHP, RO,  RO,  RW,  WO,  WO,  RO,  // 0x60 - 0x6F
    WHP, RO,  RO,  RO,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  NA,  // 0x70 - 0x7F
];

const fn reset_table() -> [Option<i32>; REGISTER_COUNT] {
    let mut table = [Some(0); REGISTER_COUNT];
    table[addr::GCONF as usize] = Some(0x0000_0008);
    table[addr::SHORT_CONF as usize] = Some(0x0001_0C0C);
    table[addr::DRV_CONF as usize] = Some(0x0008_0200);
    table[addr::IHOLD_IRUN as usize] = Some(0x0007_0A03);
    table[addr::TPOWERDOWN as usize] = Some(0x0000_000A);
    table[addr::VSTOP as usize] = Some(0x0000_0001);
    table[addr::ENC_CONST as usize] = Some(0x0001_0000);
    table[addr::CHOPCONF as usize] = Some(0x0041_0153);
    table[addr::PWMCONF as usize] = Some(0xC40C_001E_u32 as i32);

    // MSLUT0..MSLUTSTART are loaded from the chip's own presets.
    let mut a = addr::MSLUT0 as usize;
    while a <= addr::MSLUTSTART as usize {
        table[a] = None;
        a += 1;
    }
    table
}

const RESET: [Option<i32>; REGISTER_COUNT] = reset_table();

/// Returns the access class of `address`. Bit 7 is ignored.
pub const fn permission(address: u8) -> AccessClass {
    ACCESS[(address & 0x7F) as usize]
}

/// Returns the power-on reset value of `address`, or `None` when the
/// register is loaded from hardware presets. Bit 7 is ignored.
pub const fn reset_value(address: u8) -> Option<i32> {
    RESET[(address & 0x7F) as usize]
}

/// Operating mode of the ramp generator (RAMPMODE register).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RampMode {
    /// Track XTARGET using the A1/AMAX/D1/DMAX ramp.
    Position = 0,
    /// Accelerate towards +VMAX.
    VelocityPositive = 1,
    /// Accelerate towards -VMAX.
    VelocityNegative = 2,
    /// Keep the current velocity.
    Hold = 3,
}

impl RampMode {
    /// Raw RAMPMODE register value.
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Decodes the two RAMPMODE bits.
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => Self::Position,
            1 => Self::VelocityPositive,
            2 => Self::VelocityNegative,
            _ => Self::Hold,
        }
    }

    /// Velocity mode for a signed velocity. Zero counts as positive.
    pub const fn for_velocity(velocity: i32) -> Self {
        if velocity >= 0 {
            Self::VelocityPositive
        } else {
            Self::VelocityNegative
        }
    }
}

/// A register with a typed bit layout.
pub trait Register: From<u32> + Into<u32> + Copy {
    const ADDRESS: u8;
}

#[bitfield(u32)]
pub struct GConf {
    pub recalibrate: bool,
    pub faststandstill: bool,
    pub en_pwm_mode: bool,
    pub multistep_filt: bool,
    pub shaft: bool,
    pub diag0_error: bool,
    pub diag0_otpw: bool,
    pub diag0_stall: bool,
    pub diag1_stall: bool,
    pub diag1_index: bool,
    pub diag1_onstate: bool,
    pub diag1_steps_skipped: bool,
    pub diag0_int_pushpull: bool,
    pub diag1_poscomp_pushpull: bool,
    pub small_hysteresis: bool,
    pub stop_enable: bool,
    pub direct_mode: bool,
    pub test_mode: bool,

    #[bits(14)]
    __: u32,
}

impl Register for GConf {
    const ADDRESS: u8 = addr::GCONF;
}

#[bitfield(u32)]
pub struct DrvConf {
    #[bits(5)]
    pub bbmtime: u8,

    #[bits(3)]
    __: u32,

    #[bits(4)]
    pub bbmclks: u8,

    #[bits(4)]
    __: u32,

    #[bits(2)]
    pub otselect: u8,

    #[bits(2)]
    pub drvstrength: u8,

    #[bits(2)]
    pub filt_isense: u8,

    #[bits(10)]
    __: u32,
}

impl Register for DrvConf {
    const ADDRESS: u8 = addr::DRV_CONF;
}

/// Run and standstill currents, in 1/32 of the full-scale current.
#[bitfield(u32)]
pub struct IHoldIRun {
    #[bits(5)]
    pub ihold: u8,

    #[bits(3)]
    __: u32,

    #[bits(5)]
    pub irun: u8,

    #[bits(3)]
    __: u32,

    /// Power-down delay after standstill, in 2^18 clock steps.
    #[bits(4)]
    pub iholddelay: u8,

    #[bits(12)]
    __: u32,
}

impl Register for IHoldIRun {
    const ADDRESS: u8 = addr::IHOLD_IRUN;
}

/// RAMP_STAT. Reading clears the event flags.
#[bitfield(u32)]
pub struct RampStat {
    pub status_stop_l: bool,
    pub status_stop_r: bool,
    pub status_latch_l: bool,
    pub status_latch_r: bool,
    pub event_stop_l: bool,
    pub event_stop_r: bool,
    pub event_stop_sg: bool,
    pub event_pos_reached: bool,
    pub velocity_reached: bool,
    /// XACTUAL == XTARGET.
    pub position_reached: bool,
    pub vzero: bool,
    pub t_zerowait_active: bool,
    pub second_move: bool,
    pub status_sg: bool,

    #[bits(18)]
    __: u32,
}

impl Register for RampStat {
    const ADDRESS: u8 = addr::RAMP_STAT;
}

#[bitfield(u32)]
pub struct ChopConf {
    #[bits(4)]
    pub toff: u8,

    #[bits(3)]
    pub hstrt: u8,

    #[bits(4)]
    pub hend: u8,

    pub fd3: bool,
    pub disfdcc: bool,

    #[bits(1)]
    __: u32,

    pub chm: bool,

    #[bits(2)]
    pub tbl: u8,

    #[bits(1)]
    __: u32,

    pub vhighfs: bool,
    pub vhighchm: bool,

    #[bits(4)]
    pub tpfd: u8,

    /// Microstep resolution: 0 = 256 microsteps, 8 = full step.
    #[bits(4)]
    pub mres: u8,

    pub intpol: bool,
    pub dedge: bool,
    pub diss2g: bool,
    pub diss2vs: bool,
}

impl Register for ChopConf {
    const ADDRESS: u8 = addr::CHOPCONF;
}

/// Width of the VACTUAL register in bits (two's complement).
pub const VACTUAL_BITS: u32 = 24;
