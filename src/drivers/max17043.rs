//! MAX17043 single-cell fuel gauge over I²C.
//!
//! All registers are 16-bit big-endian.  The gauge needs roughly a second
//! after leaving sleep before VCELL/SOC are meaningful again, which is why
//! the battery task waits between [`wake`](BatteryGauge::wake) and the reads.
//!
//! | Reg  | Name    | Use                                            |
//! |------|---------|------------------------------------------------|
//! | 0x02 | VCELL   | cell voltage, 12 bits, 1.25 mV/LSB             |
//! | 0x04 | SOC     | state of charge, high byte %, low byte 1/256 % |
//! | 0x06 | MODE    | 0x4000 = quick-start                           |
//! | 0x08 | VERSION | silicon version (boot probe)                   |
//! | 0x0C | CONFIG  | RCOMP, SLEEP (b7), ALRT (b5), ATHD (b4:0)      |
//! | 0xFE | COMMAND | 0x0054 = power-on reset                        |

use embedded_hal::i2c::I2c;
use log::info;

use crate::app::ports::BatteryGauge;

const REG_VCELL: u8 = 0x02;
const REG_SOC: u8 = 0x04;
const REG_MODE: u8 = 0x06;
const REG_VERSION: u8 = 0x08;
const REG_CONFIG: u8 = 0x0C;
const REG_COMMAND: u8 = 0xFE;

const MODE_QUICK_START: u16 = 0x4000;
const COMMAND_POR: u16 = 0x0054;

const CONFIG_SLEEP: u16 = 1 << 7;
const CONFIG_ALERT: u16 = 1 << 5;
const CONFIG_ATHD_MASK: u16 = 0x1F;

pub struct Max17043<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Max17043<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Boot probe: read the version register.  Any bus error means the
    /// gauge is absent.
    pub fn probe(&mut self) -> Result<u16, I::Error> {
        let version = self.read_reg(REG_VERSION)?;
        info!("Gauge: MAX17043 version 0x{:04X}", version);
        Ok(version)
    }

    /// Restart the SOC estimate from the present cell voltage.
    pub fn quick_start(&mut self) -> Result<(), I::Error> {
        self.write_reg(REG_MODE, MODE_QUICK_START)
    }

    /// Full power-on reset.
    pub fn reset(&mut self) -> Result<(), I::Error> {
        self.write_reg(REG_COMMAND, COMMAND_POR)
    }

    /// Program the low-battery alert threshold (1–32 %) and clear a latched
    /// alert.
    pub fn set_alert_threshold(&mut self, percent: u8) -> Result<(), I::Error> {
        let percent = percent.clamp(1, 32) as u16;
        let athd = (32 - percent) & CONFIG_ATHD_MASK;
        let config = self.read_reg(REG_CONFIG)?;
        let config = (config & !(CONFIG_ATHD_MASK | CONFIG_ALERT)) | athd;
        self.write_reg(REG_CONFIG, config)
    }

    /// Cell voltage in volts.
    pub fn cell_voltage(&mut self) -> Result<f32, I::Error> {
        let raw = self.read_reg(REG_VCELL)? >> 4;
        Ok(raw as f32 * 0.001_25)
    }

    pub fn release(self) -> I {
        self.i2c
    }

    fn read_reg(&mut self, reg: u8) -> Result<u16, I::Error> {
        let mut buf = [0u8; 2];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_reg(&mut self, reg: u8, value: u16) -> Result<(), I::Error> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c.write(self.address, &[reg, hi, lo])
    }

    fn update_config(&mut self, f: impl FnOnce(u16) -> u16) -> Result<(), I::Error> {
        let config = self.read_reg(REG_CONFIG)?;
        self.write_reg(REG_CONFIG, f(config))
    }
}

impl<I: I2c> BatteryGauge for Max17043<I> {
    type Error = I::Error;

    fn wake(&mut self) -> Result<(), Self::Error> {
        self.update_config(|c| c & !CONFIG_SLEEP)
    }

    fn sleep(&mut self) -> Result<(), Self::Error> {
        self.update_config(|c| c | CONFIG_SLEEP)
    }

    fn state_of_charge(&mut self) -> Result<f32, Self::Error> {
        let raw = self.read_reg(REG_SOC)?;
        let whole = (raw >> 8) as f32;
        let frac = (raw & 0xFF) as f32 / 256.0;
        Ok(whole + frac)
    }

    fn alert(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_reg(REG_CONFIG)? & CONFIG_ALERT != 0)
    }
}
