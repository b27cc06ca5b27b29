//! Drives a simulated TMC5161 through `embedded-hal-bus`.
//!
//! The bus below stands in for a real SPI peripheral: it keeps a register
//! file and answers reads one datagram late, like the chip. Swap it for a HAL
//! `SpiBus` and a real chip-select pin to run the same code on hardware.
//!
//! The peripheral is shared with a mode-0 device, so every TMC5161
//! transaction runs under [`ModeScoped`], which switches to mode 3 and back.

use core::convert::Infallible;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, ErrorKind, SpiBus};
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use tmc5161_dd::register::addr;
use tmc5161_dd::{
    BusMode, ChannelConfig, ChannelId, ChopConf, Field, ModeScoped, ScalingConfig, Tmc5161,
    TmcError, TmcInterface,
};

#[derive(Debug)]
struct BusError;

impl spi::Error for BusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Register file behind one chip select.
struct SimulatedBus {
    regs: [i32; 128],
    latched: i32,
}

impl SimulatedBus {
    fn new() -> Self {
        Self {
            regs: [0; 128],
            latched: 0,
        }
    }

    fn exchange(&mut self, frame: &mut [u8]) {
        let request = [frame[0], frame[1], frame[2], frame[3], frame[4]];
        let address = (request[0] & 0x7F) as usize;

        frame[0] = 0;
        frame[1..5].copy_from_slice(&self.latched.to_be_bytes());

        if request[0] & 0x80 != 0 {
            let value = i32::from_be_bytes([request[1], request[2], request[3], request[4]]);
            self.regs[address] = value;
            // Position moves complete instantly.
            if address == addr::XTARGET as usize {
                self.regs[addr::XACTUAL as usize] = value;
                self.regs[addr::RAMP_STAT as usize] |= 1 << 9;
            }
        } else {
            self.latched = self.regs[address];
        }
    }
}

impl spi::ErrorType for SimulatedBus {
    type Error = BusError;
}

impl SpiBus for SimulatedBus {
    fn read(&mut self, words: &mut [u8]) -> Result<(), BusError> {
        words.fill(0);
        Ok(())
    }

    fn write(&mut self, _words: &[u8]) -> Result<(), BusError> {
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), BusError> {
        read.copy_from_slice(write);
        self.transfer_in_place(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), BusError> {
        if words.len() != 5 {
            return Err(BusError);
        }
        self.exchange(words);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

struct ChipSelect;

impl digital::ErrorType for ChipSelect {
    type Error = Infallible;
}

impl OutputPin for ChipSelect {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Selects SPI mode 3 for the duration of a transaction.
struct Mode3 {
    /// CPOL/CPHA bits of the simulated peripheral.
    current: u8,
}

impl BusMode for Mode3 {
    type Saved = u8;

    fn apply(&mut self) -> u8 {
        core::mem::replace(&mut self.current, 3)
    }

    fn restore(&mut self, saved: u8) {
        self.current = saved;
    }
}

type Device = ModeScoped<ExclusiveDevice<SimulatedBus, ChipSelect, NoDelay>, Mode3>;
type DeviceErr = <Device as spi::ErrorType>::Error;

fn main() {
    // Wrap SpiBus with ExclusiveDevice to get SpiDevice
    let Ok(exclusive) = ExclusiveDevice::new(SimulatedBus::new(), ChipSelect, NoDelay);
    let spi_device = ModeScoped::new(exclusive, Mode3 { current: 0 });

    let mut tmc: Tmc5161<TmcInterface<Device>, DeviceErr> = Tmc5161::new(ScalingConfig::new());
    let motor = match tmc.init(spi_device, ChannelConfig::new()) {
        Ok(motor) => motor,
        Err(e) => {
            println!("init failed: {e:?}");
            return;
        }
    };
    println!("channel {} initialized", motor.index());

    if let Err(e) = run(&mut tmc, motor) {
        println!("motion failed: {e:?}");
    }
}

fn run(
    tmc: &mut Tmc5161<TmcInterface<Device>, DeviceErr>,
    motor: ChannelId,
) -> Result<(), TmcError<DeviceErr>> {
    tmc.set_velocity(motor, 40)?;
    tmc.set_acceleration(motor, 60)?;
    println!("VMAX = {}", tmc.vmax(motor)?);

    tmc.set_position(motor, 25)?;
    println!(
        "XACTUAL = {}, reached = {}",
        tmc.actual_position(motor)?,
        tmc.position_reached(motor)?
    );

    let vmax = tmc.vmax(motor)?;
    let target = tmc.move_by(motor, -1000, vmax)?;
    println!("moved by -1000 to {target}");

    let reached = tmc.position_reached(motor)?;
    println!("position reached = {reached}");

    tmc.modify_reg(motor, |chop: ChopConf| chop.with_mres(4))?;
    let tbl = tmc.read_field(motor, addr::CHOPCONF, Field::new(0x03, 15))?;
    println!("CHOPCONF.mres = 4, tbl = {tbl}");

    tmc.right(motor, 20_000)?;
    tmc.stop(motor)?;
    println!("ramp mode after stop: {:?}", tmc.ramp_mode(motor)?);

    Ok(())
}
