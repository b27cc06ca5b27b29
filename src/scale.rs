//! Conversion of 0–100 % inputs into ramp generator units.

/// Velocity reached at 100 % (VMAX units).
pub const MAX_VELOCITY: u32 = 1_500_000;
/// Acceleration reached at 100 % (AMAX units).
pub const MAX_ACCELERATION: u32 = 2500;
/// Position reached at 100 %: one revolution at 256 microsteps, 200 full steps.
pub const MAX_POSITION: u32 = 51_200;

/// Upper bound of a normalized input.
pub const PERCENT_MAX: u8 = 100;

/// What the scaled setters do with inputs above 100.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangePolicy {
    /// Scale the input as given; 200 % writes twice the maximum.
    #[default]
    Unchecked,
    /// Saturate at 100 %.
    Clamp,
    /// Fail with [`TmcError::OutOfRange`](crate::TmcError::OutOfRange)
    /// before any bus traffic.
    Reject,
}

/// Per-quantity maxima and the range policy used by the scaled setters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScalingConfig {
    pub(crate) max_velocity: u32,
    pub(crate) max_acceleration: u32,
    pub(crate) max_position: u32,
    pub(crate) range: RangePolicy,
}

impl ScalingConfig {
    /// Default maxima, inputs unchecked.
    pub const fn new() -> Self {
        Self {
            max_velocity: MAX_VELOCITY,
            max_acceleration: MAX_ACCELERATION,
            max_position: MAX_POSITION,
            range: RangePolicy::Unchecked,
        }
    }

    /// Sets the VMAX value written for 100 %.
    #[must_use]
    pub const fn with_max_velocity(mut self, max: u32) -> Self {
        self.max_velocity = max;
        self
    }

    /// Sets the AMAX value written for 100 %.
    #[must_use]
    pub const fn with_max_acceleration(mut self, max: u32) -> Self {
        self.max_acceleration = max;
        self
    }

    /// Sets the position (in microsteps) reached at 100 %.
    #[must_use]
    pub const fn with_max_position(mut self, max: u32) -> Self {
        self.max_position = max;
        self
    }

    /// Sets the policy for inputs above 100.
    #[must_use]
    pub const fn with_range_policy(mut self, range: RangePolicy) -> Self {
        self.range = range;
        self
    }

    /// Configured range policy.
    pub const fn range_policy(&self) -> RangePolicy {
        self.range
    }

    /// Applies the range policy. `None` means the input is rejected.
    pub const fn admit(&self, percent: u8) -> Option<u8> {
        match self.range {
            RangePolicy::Unchecked => Some(percent),
            RangePolicy::Clamp if percent > PERCENT_MAX => Some(PERCENT_MAX),
            RangePolicy::Clamp => Some(percent),
            RangePolicy::Reject if percent > PERCENT_MAX => None,
            RangePolicy::Reject => Some(percent),
        }
    }

    /// VMAX for `percent`.
    pub const fn velocity(&self, percent: u8) -> u32 {
        scale_percent(percent, self.max_velocity)
    }

    /// AMAX for `percent`.
    pub const fn acceleration(&self, percent: u8) -> u32 {
        scale_percent(percent, self.max_acceleration)
    }

    /// Unsigned target position for `percent`.
    pub const fn position(&self, percent: u8) -> u32 {
        scale_percent(percent, self.max_position)
    }
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// `round(percent / 100 * max)`, half rounded up, saturating at `u32::MAX`.
pub const fn scale_percent(percent: u8, max: u32) -> u32 {
    let scaled = (percent as u64 * max as u64 + 50) / 100;
    if scaled > u32::MAX as u64 {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Transition velocity V1 derived from VMAX.
pub const fn v1_for(vmax: u32) -> u32 {
    vmax >> 2
}

/// Transition acceleration A1 derived from AMAX.
pub const fn a1_for(amax: u32) -> u32 {
    amax << 1
}
