//! Per-channel power-up configuration.

use crate::register::{IHoldIRun, addr};

/// Largest value accepted by V1 and VMAX (2^23 - 512).
pub const VELOCITY_LIMIT: u32 = 0x007F_FE00;
/// Largest value accepted by A1, AMAX, DMAX and D1.
pub const ACCELERATION_LIMIT: u32 = 0xFFFF;
/// Largest IHOLD and IRUN.
pub const CURRENT_LIMIT: u8 = 31;
/// Largest IHOLDDELAY.
pub const IHOLDDELAY_LIMIT: u8 = 15;

/// Caps a velocity at [`VELOCITY_LIMIT`].
pub const fn saturate_velocity(velocity: u32) -> u32 {
    if velocity > VELOCITY_LIMIT {
        VELOCITY_LIMIT
    } else {
        velocity
    }
}

/// Register values written by [`Tmc5161::init`](crate::Tmc5161::init).
///
/// The defaults enable stealthChop (GCONF.en_pwm_mode) below TPWMTHRS and a
/// moderate six-point ramp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub(crate) drv_conf: u32,
    pub(crate) chopconf: u32,
    pub(crate) ihold: u8,
    pub(crate) irun: u8,
    pub(crate) iholddelay: u8,
    pub(crate) tpowerdown: u8,
    pub(crate) gconf: u32,
    pub(crate) tpwmthrs: u32,
    pub(crate) global_scaler: u8,
    pub(crate) a1: u32,
    pub(crate) v1: u32,
    pub(crate) amax: u32,
    pub(crate) vmax: u32,
    pub(crate) dmax: u32,
    pub(crate) d1: u32,
    pub(crate) vstop: u32,
    pub(crate) forward: bool,
}

impl ChannelConfig {
    /// Creates the default configuration.
    pub const fn new() -> Self {
        Self {
            drv_conf: 0x0002_0002,
            chopconf: 0x0001_00C3,
            ihold: 1,
            irun: 31,
            iholddelay: 10,
            tpowerdown: 0x0A,
            gconf: 0x04,
            tpwmthrs: 0x1F4,
            global_scaler: 60,
            a1: 1000,
            v1: 50_000,
            amax: 500,
            vmax: 200_000,
            dmax: 700,
            d1: 1400,
            vstop: 10,
            forward: true,
        }
    }

    /// Sets the raw DRV_CONF value.
    #[must_use]
    pub const fn with_drv_conf(mut self, value: u32) -> Self {
        self.drv_conf = value;
        self
    }

    /// Sets the raw CHOPCONF value.
    #[must_use]
    pub const fn with_chopconf(mut self, value: u32) -> Self {
        self.chopconf = value;
        self
    }

    /// Sets the standstill current, run current (0..=31) and the hold delay (0..=15).
    #[must_use]
    pub const fn with_currents(mut self, ihold: u8, irun: u8, iholddelay: u8) -> Self {
        self.ihold = ihold;
        self.irun = irun;
        self.iholddelay = iholddelay;
        self
    }

    /// Sets the delay before standstill power-down.
    #[must_use]
    pub const fn with_tpowerdown(mut self, value: u8) -> Self {
        self.tpowerdown = value;
        self
    }

    /// Sets the raw GCONF value.
    #[must_use]
    pub const fn with_gconf(mut self, value: u32) -> Self {
        self.gconf = value;
        self
    }

    /// Sets the stealthChop upper velocity threshold.
    #[must_use]
    pub const fn with_tpwmthrs(mut self, value: u32) -> Self {
        self.tpwmthrs = value;
        self
    }

    /// Sets the global current scaler (0 = full scale, otherwise 32..=255).
    #[must_use]
    pub const fn with_global_scaler(mut self, value: u8) -> Self {
        self.global_scaler = value;
        self
    }

    /// Sets the acceleration ramp: A1, V1, AMAX.
    #[must_use]
    pub const fn with_acceleration_ramp(mut self, a1: u32, v1: u32, amax: u32) -> Self {
        self.a1 = a1;
        self.v1 = v1;
        self.amax = amax;
        self
    }

    /// Sets the deceleration ramp: DMAX, D1, VSTOP.
    #[must_use]
    pub const fn with_deceleration_ramp(mut self, dmax: u32, d1: u32, vstop: u32) -> Self {
        self.dmax = dmax;
        self.d1 = d1;
        self.vstop = vstop;
        self
    }

    /// Sets VMAX, also used as the velocity of scaled position moves.
    #[must_use]
    pub const fn with_vmax(mut self, vmax: u32) -> Self {
        self.vmax = vmax;
        self
    }

    /// Sets the initial direction sign for scaled position moves.
    #[must_use]
    pub const fn with_forward(mut self, forward: bool) -> Self {
        self.forward = forward;
        self
    }

    /// Configured VMAX.
    pub const fn vmax(&self) -> u32 {
        self.vmax
    }

    /// Initial direction sign, `1` or `-1`.
    pub const fn direction(&self) -> i8 {
        if self.forward { 1 } else { -1 }
    }

    /// IHOLD_IRUN register value. Only meaningful for a configuration that
    /// passes [`validate`](Self::validate).
    pub fn ihold_irun(&self) -> u32 {
        IHoldIRun::new()
            .with_ihold(self.ihold)
            .with_irun(self.irun)
            .with_iholddelay(self.iholddelay)
            .into_bits()
    }

    /// Checks every value against its register range.
    pub const fn validate(&self) -> Result<(), &'static str> {
        if self.ihold > CURRENT_LIMIT || self.irun > CURRENT_LIMIT {
            return Err("IHOLD/IRUN above 31");
        }
        if self.iholddelay > IHOLDDELAY_LIMIT {
            return Err("IHOLDDELAY above 15");
        }
        if self.global_scaler != 0 && self.global_scaler < 32 {
            return Err("GLOBAL_SCALER between 1 and 31");
        }
        if self.a1 > ACCELERATION_LIMIT
            || self.amax > ACCELERATION_LIMIT
            || self.dmax > ACCELERATION_LIMIT
            || self.d1 > ACCELERATION_LIMIT
        {
            return Err("acceleration above 0xFFFF");
        }
        if self.d1 == 0 {
            return Err("D1 must not be 0");
        }
        if self.v1 > VELOCITY_LIMIT || self.vmax > VELOCITY_LIMIT {
            return Err("velocity above 2^23 - 512");
        }
        if self.vstop == 0 {
            return Err("VSTOP must not be 0");
        }
        Ok(())
    }

    /// The power-up write sequence, in bus order. RAMPMODE is written last,
    /// by the driver.
    pub fn writes(&self) -> [(u8, u32); 14] {
        [
            (addr::DRV_CONF, self.drv_conf),
            (addr::CHOPCONF, self.chopconf),
            (addr::IHOLD_IRUN, self.ihold_irun()),
            (addr::TPOWERDOWN, self.tpowerdown as u32),
            (addr::GCONF, self.gconf),
            (addr::TPWMTHRS, self.tpwmthrs),
            (addr::GLOBAL_SCALER, self.global_scaler as u32),
            (addr::A1, self.a1),
            (addr::V1, self.v1),
            (addr::AMAX, self.amax),
            (addr::VMAX, self.vmax),
            (addr::DMAX, self.dmax),
            (addr::D1, self.d1),
            (addr::VSTOP, self.vstop),
        ]
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(ChannelConfig::new().validate(), Ok(()));
        assert_eq!(ChannelConfig::default(), ChannelConfig::new());
    }

    #[test]
    fn test_default_ihold_irun() {
        // IHOLDDELAY=10, IRUN=31, IHOLD=1
        assert_eq!(ChannelConfig::new().ihold_irun(), 0x000A_1F01);
    }

    #[test]
    fn test_write_sequence_order() {
        let writes = ChannelConfig::new().writes();
        assert_eq!(writes[0], (addr::DRV_CONF, 0x20002));
        assert_eq!(writes[1], (addr::CHOPCONF, 0x100C3));
        assert_eq!(writes[6], (addr::GLOBAL_SCALER, 60));
        assert_eq!(writes[10], (addr::VMAX, 200_000));
        assert_eq!(writes[13], (addr::VSTOP, 10));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let base = ChannelConfig::new();
        assert!(base.with_currents(32, 31, 0).validate().is_err());
        assert!(base.with_currents(0, 31, 16).validate().is_err());
        assert!(base.with_global_scaler(31).validate().is_err());
        assert!(base.with_global_scaler(0).validate().is_ok());
        assert!(base.with_global_scaler(32).validate().is_ok());
        assert!(base.with_acceleration_ramp(0x1_0000, 0, 0).validate().is_err());
        assert!(base.with_deceleration_ramp(700, 0, 10).validate().is_err());
        assert!(base.with_deceleration_ramp(700, 1400, 0).validate().is_err());
        assert!(base.with_vmax(VELOCITY_LIMIT + 1).validate().is_err());
        assert!(base.with_vmax(VELOCITY_LIMIT).validate().is_ok());
    }

    #[test]
    fn test_saturate_velocity() {
        assert_eq!(saturate_velocity(200_000), 200_000);
        assert_eq!(saturate_velocity(VELOCITY_LIMIT), VELOCITY_LIMIT);
        assert_eq!(saturate_velocity(u32::MAX), VELOCITY_LIMIT);
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(ChannelConfig::new().direction(), 1);
        assert_eq!(ChannelConfig::new().with_forward(false).direction(), -1);
    }
}
