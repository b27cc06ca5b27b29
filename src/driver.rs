use super::{RegisterInterface, SpiDevice, bisync};
use crate::config::{ChannelConfig, saturate_velocity};
use crate::datagram::{Datagram, SpiStatus};
use crate::field::Field;
use crate::register::{self, RampMode, RampStat, Register, VACTUAL_BITS, addr};
use crate::scale::{ScalingConfig, a1_for, v1_for};
use crate::{ChannelId, MAX_CHANNELS, TmcError, TmcInterface};

#[bisync]
impl<SpiBus, E> RegisterInterface for TmcInterface<SpiBus>
where
    SpiBus: SpiDevice<Error = E>,
    E: core::fmt::Debug,
{
    type AddressType = u8;
    type Error = TmcError<E>;

    async fn read_register(
        &mut self,
        address: u8,
        _size_bits: u32,
        data: &mut [u8],
    ) -> Result<(), Self::Error> {
        if data.len() != 4 {
            return Err(TmcError::NotSupported("register width other than 32 bits"));
        }
        debug_assert!(
            register::permission(address).is_readable(),
            "read of register {address:#x} which is not readable"
        );

        // Read datagram: bit 7 = 0, payload ignored by the chip
        let request = Datagram::read(address);

        // First transaction: latch the address. The payload clocked back
        // belongs to whatever was requested before.
        let mut frame = request.into_bytes();
        self.spi_bus
            .transfer_in_place(&mut frame)
            .await
            .map_err(TmcError::Spi)?;

        // Second transaction: same request again, the response now carries
        // the value latched above (N+1 timing)
        let mut frame = request.into_bytes();
        self.spi_bus
            .transfer_in_place(&mut frame)
            .await
            .map_err(TmcError::Spi)?;

        let response = Datagram::from_bytes(frame);
        self.status = response.status();
        data.copy_from_slice(&response.payload_bytes());
        trace!("read {:#x} -> {:#x}", request.address(), response.payload());

        Ok(())
    }

    async fn write_register(
        &mut self,
        address: u8,
        _size_bits: u32,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        let Ok(bytes) = <[u8; 4]>::try_from(data) else {
            return Err(TmcError::NotSupported("register width other than 32 bits"));
        };
        debug_assert!(
            register::permission(address).is_writable(),
            "write to register {address:#x} which is not writable"
        );

        let request = Datagram::write(address, i32::from_be_bytes(bytes));
        let mut frame = request.into_bytes();
        self.spi_bus
            .transfer_in_place(&mut frame)
            .await
            .map_err(TmcError::Spi)?;

        self.status = Datagram::from_bytes(frame).status();
        trace!("write {:#x} <- {:#x}", request.address(), request.payload());

        Ok(())
    }
}

pub trait CurrentTmcDriverInterface<E>:
    RegisterInterface<AddressType = u8, Error = TmcError<E>>
{
}

impl<T, E> CurrentTmcDriverInterface<E> for T
where
    T: RegisterInterface<AddressType = u8, Error = TmcError<E>>,
    E: core::fmt::Debug,
{
}

#[bisync]
async fn read_internal<I>(interface: &mut I, address: u8) -> Result<i32, I::Error>
where
    I: RegisterInterface<AddressType = u8>,
{
    let mut data = [0u8; 4];
    interface.read_register(address, 32, &mut data).await?;
    Ok(i32::from_be_bytes(data))
}

#[bisync]
async fn write_internal<I>(interface: &mut I, address: u8, value: i32) -> Result<(), I::Error>
where
    I: RegisterInterface<AddressType = u8>,
{
    interface.write_register(address, 32, &value.to_be_bytes()).await
}

/// VMAX register word for `velocity`, capped at the register's range.
fn vmax_word(velocity: u32) -> i32 {
    let capped = saturate_velocity(velocity);
    if capped != velocity {
        warn!("velocity {} capped at {}", velocity, capped);
    }
    capped as i32
}

/// State kept for one chip.
struct Channel<SpiImpl> {
    interface: SpiImpl,
    /// Last value written to RAMPMODE.
    ramp_mode: Option<RampMode>,
    /// Sign applied to scaled position targets.
    direction: i8,
    /// Velocity used for scaled position moves.
    vmax: u32,
}

#[bisync]
async fn write_ramp_mode<I>(channel: &mut Channel<I>, mode: RampMode) -> Result<(), I::Error>
where
    I: RegisterInterface<AddressType = u8>,
{
    write_internal(&mut channel.interface, addr::RAMPMODE, mode.bits() as i32).await?;
    if channel.ramp_mode != Some(mode) {
        debug!("ramp mode {:?} -> {:?}", channel.ramp_mode, mode);
    }
    channel.ramp_mode = Some(mode);
    Ok(())
}

/// Driver for up to `N` TMC5161 chips.
///
/// Each chip is a channel with its own `SpiDevice`, added with
/// [`init`](Self::init) and addressed through the returned [`ChannelId`].
pub struct Tmc5161<SpiImpl, SpiBusErr, const N: usize = MAX_CHANNELS> {
    channels: [Option<Channel<SpiImpl>>; N],
    allocated: usize,
    scaling: ScalingConfig,
    _marker: core::marker::PhantomData<SpiBusErr>,
}

impl<SpiImpl, SpiBusErr, const N: usize> Tmc5161<SpiImpl, SpiBusErr, N> {
    /// Creates a driver with an empty channel table.
    pub fn new(scaling: ScalingConfig) -> Self {
        Self {
            channels: core::array::from_fn(|_| None),
            allocated: 0,
            scaling,
            _marker: core::marker::PhantomData,
        }
    }

    /// Scaling used by the percentage setters.
    pub fn scaling(&self) -> &ScalingConfig {
        &self.scaling
    }

    /// Replaces the scaling used by the percentage setters.
    pub fn set_scaling(&mut self, scaling: ScalingConfig) {
        self.scaling = scaling;
    }

    /// Number of initialized channels.
    pub fn channel_count(&self) -> usize {
        self.allocated
    }

    /// Last ramp mode written on `id`, `None` before the first write.
    pub fn ramp_mode(&self, id: ChannelId) -> Result<Option<RampMode>, TmcError<SpiBusErr>> {
        Ok(self.channel(id)?.ramp_mode)
    }

    /// Direction sign (`1` or `-1`) applied to scaled position targets.
    pub fn direction(&self, id: ChannelId) -> Result<i8, TmcError<SpiBusErr>> {
        Ok(self.channel(id)?.direction)
    }

    /// Velocity used by [`set_position`](Self::set_position).
    pub fn vmax(&self, id: ChannelId) -> Result<u32, TmcError<SpiBusErr>> {
        Ok(self.channel(id)?.vmax)
    }

    fn channel(&self, id: ChannelId) -> Result<&Channel<SpiImpl>, TmcError<SpiBusErr>> {
        if id.index() >= self.allocated {
            return Err(TmcError::InvalidChannel);
        }
        self.channels
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(TmcError::InvalidChannel)
    }

    fn channel_mut(&mut self, id: ChannelId) -> Result<&mut Channel<SpiImpl>, TmcError<SpiBusErr>> {
        if id.index() >= self.allocated {
            return Err(TmcError::InvalidChannel);
        }
        self.channels
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(TmcError::InvalidChannel)
    }

    fn admit(&self, percent: u8) -> Result<u8, TmcError<SpiBusErr>> {
        match self.scaling.admit(percent) {
            Some(admitted) => {
                if admitted != percent {
                    warn!("input {} clamped to {}", percent, admitted);
                }
                Ok(admitted)
            }
            None => {
                warn!("input {} rejected", percent);
                Err(TmcError::OutOfRange(percent))
            }
        }
    }
}

impl<SpiBus, E, const N: usize> Tmc5161<TmcInterface<SpiBus>, E, N>
where
    SpiBus: SpiDevice<Error = E>,
    E: core::fmt::Debug,
{
    /// Adds the chip behind `spi` as a new channel and writes its power-up
    /// configuration.
    ///
    /// Fails with [`TmcError::InvalidConfig`] for an out-of-range
    /// configuration and [`TmcError::ChannelsExhausted`] when all `N` slots
    /// are taken. No channel is added on error.
    #[bisync]
    pub async fn init(
        &mut self,
        spi: SpiBus,
        config: ChannelConfig,
    ) -> Result<ChannelId, TmcError<E>> {
        self.init_interface(TmcInterface::new(spi), config).await
    }

    /// Status byte returned by the most recent datagram on `id`.
    pub fn spi_status(&self, id: ChannelId) -> Result<SpiStatus, TmcError<E>> {
        Ok(self.channel(id)?.interface.status())
    }
}

impl<SpiImpl, SpiBusErr, const N: usize> Tmc5161<SpiImpl, SpiBusErr, N>
where
    SpiImpl: CurrentTmcDriverInterface<SpiBusErr>,
    SpiBusErr: core::fmt::Debug,
{
    /// Like [`init`](Tmc5161::init), for any register interface.
    #[bisync]
    pub async fn init_interface(
        &mut self,
        interface: SpiImpl,
        config: ChannelConfig,
    ) -> Result<ChannelId, TmcError<SpiBusErr>> {
        if let Err(reason) = config.validate() {
            warn!("rejecting channel config: {}", reason);
            return Err(TmcError::InvalidConfig(reason));
        }
        if self.allocated >= N {
            warn!("all {} channels in use", N);
            return Err(TmcError::ChannelsExhausted);
        }

        let index = self.allocated;
        let mut channel = Channel {
            interface,
            ramp_mode: None,
            direction: config.direction(),
            vmax: config.vmax(),
        };
        for (address, value) in config.writes() {
            write_internal(&mut channel.interface, address, value as i32).await?;
        }
        write_ramp_mode(&mut channel, RampMode::Position).await?;

        self.channels[index] = Some(channel);
        self.allocated += 1;
        info!("channel {} initialized", index);

        Ok(ChannelId::new(index as u8))
    }

    /// Reads a raw 32-bit register.
    #[bisync]
    pub async fn read_register(
        &mut self,
        id: ChannelId,
        address: u8,
    ) -> Result<i32, TmcError<SpiBusErr>> {
        let channel = self.channel_mut(id)?;
        read_internal(&mut channel.interface, address).await
    }

    /// Writes a raw 32-bit register.
    #[bisync]
    pub async fn write_register(
        &mut self,
        id: ChannelId,
        address: u8,
        value: i32,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let channel = self.channel_mut(id)?;
        write_internal(&mut channel.interface, address, value).await
    }

    /// Reads a register with a typed layout.
    ///
    /// ```rust,ignore
    /// let chop: ChopConf = tmc.read_reg(motor)?;
    /// ```
    #[bisync]
    pub async fn read_reg<R: Register>(&mut self, id: ChannelId) -> Result<R, TmcError<SpiBusErr>> {
        let value = self.read_register(id, R::ADDRESS).await?;
        Ok(R::from(value as u32))
    }

    /// Writes a register with a typed layout.
    #[bisync]
    pub async fn write_reg<R: Register>(
        &mut self,
        id: ChannelId,
        value: R,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let bits: u32 = value.into();
        self.write_register(id, R::ADDRESS, bits as i32).await
    }

    /// Reads a typed register, applies `f` and writes the result back. Same
    /// caveat as [`write_field`](Self::write_field).
    #[bisync]
    pub async fn modify_reg<R: Register>(
        &mut self,
        id: ChannelId,
        f: impl FnOnce(R) -> R,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let current: R = self.read_reg(id).await?;
        self.write_reg(id, f(current)).await
    }

    /// Reads one bit-field of a register.
    #[bisync]
    pub async fn read_field(
        &mut self,
        id: ChannelId,
        address: u8,
        field: Field,
    ) -> Result<u32, TmcError<SpiBusErr>> {
        let value = self.read_register(id, address).await?;
        Ok(field.get(value as u32))
    }

    /// Replaces one bit-field of a register, keeping every other bit.
    ///
    /// This is a read followed by a write. Anything else writing the same
    /// register in between is overwritten.
    #[bisync]
    pub async fn write_field(
        &mut self,
        id: ChannelId,
        address: u8,
        field: Field,
        value: u32,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let channel = self.channel_mut(id)?;
        let current = read_internal(&mut channel.interface, address).await? as u32;
        let updated = field.set(current, value);
        write_internal(&mut channel.interface, address, updated as i32).await
    }

    /// Runs in velocity mode. The sign of `velocity` picks the direction;
    /// VMAX always receives the magnitude, capped at
    /// [`VELOCITY_LIMIT`](crate::config::VELOCITY_LIMIT).
    #[bisync]
    pub async fn rotate(&mut self, id: ChannelId, velocity: i32) -> Result<(), TmcError<SpiBusErr>> {
        self.rotate_with(id, velocity.unsigned_abs(), RampMode::for_velocity(velocity))
            .await
    }

    /// Rotates in the positive direction.
    #[bisync]
    pub async fn right(&mut self, id: ChannelId, velocity: u32) -> Result<(), TmcError<SpiBusErr>> {
        self.rotate_with(id, velocity, RampMode::VelocityPositive).await
    }

    /// Rotates in the negative direction. A velocity of 0 selects the
    /// positive velocity mode, same as [`stop`](Self::stop).
    #[bisync]
    pub async fn left(&mut self, id: ChannelId, velocity: u32) -> Result<(), TmcError<SpiBusErr>> {
        let mode = if velocity == 0 {
            RampMode::VelocityPositive
        } else {
            RampMode::VelocityNegative
        };
        self.rotate_with(id, velocity, mode).await
    }

    /// Ramps down to standstill: VMAX = 0 in positive velocity mode.
    #[bisync]
    pub async fn stop(&mut self, id: ChannelId) -> Result<(), TmcError<SpiBusErr>> {
        self.rotate(id, 0).await
    }

    #[bisync]
    async fn rotate_with(
        &mut self,
        id: ChannelId,
        velocity: u32,
        mode: RampMode,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let channel = self.channel_mut(id)?;
        write_internal(&mut channel.interface, addr::VMAX, vmax_word(velocity)).await?;
        write_ramp_mode(channel, mode).await
    }

    /// Moves to an absolute position at up to `velocity`, capped at
    /// [`VELOCITY_LIMIT`](crate::config::VELOCITY_LIMIT).
    #[bisync]
    pub async fn move_to(
        &mut self,
        id: ChannelId,
        position: i32,
        velocity: u32,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let channel = self.channel_mut(id)?;
        write_ramp_mode(channel, RampMode::Position).await?;
        // VMAX written in velocity mode is not applied to positioning; it has
        // to be written again once position mode is active.
        write_internal(&mut channel.interface, addr::VMAX, vmax_word(velocity)).await?;
        write_internal(&mut channel.interface, addr::XTARGET, position).await
    }

    /// Moves `ticks` microsteps away from the position read from XACTUAL and
    /// returns the target written.
    ///
    /// The chip may still be moving when XACTUAL is read, so the target is
    /// relative to that sample, not to where the motor eventually stops.
    #[bisync]
    pub async fn move_by(
        &mut self,
        id: ChannelId,
        ticks: i32,
        velocity: u32,
    ) -> Result<i32, TmcError<SpiBusErr>> {
        let actual = self.actual_position(id).await?;
        let target = actual.wrapping_add(ticks);
        self.move_to(id, target, velocity).await?;
        Ok(target)
    }

    /// Switches the velocity mode direction and the sign used by scaled
    /// position moves. VMAX is zeroed first.
    #[bisync]
    pub async fn set_direction(
        &mut self,
        id: ChannelId,
        forward: bool,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let (mode, sign) = if forward {
            (RampMode::VelocityPositive, 1)
        } else {
            (RampMode::VelocityNegative, -1)
        };
        let channel = self.channel_mut(id)?;
        // Must precede the mode change or the motor reverses at speed.
        write_internal(&mut channel.interface, addr::VMAX, 0).await?;
        write_ramp_mode(channel, mode).await?;
        channel.direction = sign;
        debug!("direction {}", sign);
        Ok(())
    }

    /// Sets VMAX from a 0–100 % input and V1 to a quarter of it.
    #[bisync]
    pub async fn set_velocity(
        &mut self,
        id: ChannelId,
        percent: u8,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let percent = self.admit(percent)?;
        let vmax = vmax_word(self.scaling.velocity(percent)) as u32;
        let channel = self.channel_mut(id)?;
        write_internal(&mut channel.interface, addr::VMAX, vmax as i32).await?;
        write_internal(&mut channel.interface, addr::V1, v1_for(vmax) as i32).await?;
        channel.vmax = vmax;
        Ok(())
    }

    /// Sets AMAX from a 0–100 % input and A1 to twice that.
    #[bisync]
    pub async fn set_acceleration(
        &mut self,
        id: ChannelId,
        percent: u8,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let percent = self.admit(percent)?;
        let amax = self.scaling.acceleration(percent);
        let channel = self.channel_mut(id)?;
        write_internal(&mut channel.interface, addr::AMAX, amax as i32).await?;
        write_internal(&mut channel.interface, addr::A1, a1_for(amax) as i32).await
    }

    /// Moves to a 0–100 % position, signed by the channel direction, at the
    /// channel's stored velocity.
    #[bisync]
    pub async fn set_position(
        &mut self,
        id: ChannelId,
        percent: u8,
    ) -> Result<(), TmcError<SpiBusErr>> {
        let percent = self.admit(percent)?;
        let scaled = i32::try_from(self.scaling.position(percent)).unwrap_or(i32::MAX);
        let channel = self.channel(id)?;
        let target = scaled * i32::from(channel.direction);
        let velocity = channel.vmax;
        self.move_to(id, target, velocity).await
    }

    /// Current position (XACTUAL).
    #[bisync]
    pub async fn actual_position(&mut self, id: ChannelId) -> Result<i32, TmcError<SpiBusErr>> {
        self.read_register(id, addr::XACTUAL).await
    }

    /// Overwrites the position counter (XACTUAL) without moving.
    #[bisync]
    pub async fn set_actual_position(
        &mut self,
        id: ChannelId,
        position: i32,
    ) -> Result<(), TmcError<SpiBusErr>> {
        self.write_register(id, addr::XACTUAL, position).await
    }

    /// Current velocity (VACTUAL), sign-extended from 24 bits.
    #[bisync]
    pub async fn actual_velocity(&mut self, id: ChannelId) -> Result<i32, TmcError<SpiBusErr>> {
        let raw = self.read_register(id, addr::VACTUAL).await?;
        let unused = 32 - VACTUAL_BITS;
        Ok((raw << unused) >> unused)
    }

    /// Whether XACTUAL equals XTARGET (RAMP_STAT.position_reached).
    #[bisync]
    pub async fn position_reached(&mut self, id: ChannelId) -> Result<bool, TmcError<SpiBusErr>> {
        let stat: RampStat = self.read_reg(id).await?;
        Ok(stat.position_reached())
    }
}
