//! One-shot board bring-up.
//!
//! Claims the peripherals, builds every driver and probes the three parts
//! the terminal cannot run without (fuel gauge, panel and, on biometric
//! boards, the fingerprint module).  Called once from `main()`; a probe
//! failure is returned to the caller, which halts.

use crate::config::DeviceConfig;

// ── Error type ────────────────────────────────────────────────

/// Errors during board bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    PeripheralsTaken,
    I2cInitFailed(i32),
    UartInitFailed(i32),
    GpioConfigFailed(i32),
    GaugeAbsent,
    DisplayAbsent,
    SensorAbsent,
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PeripheralsTaken    => write!(f, "peripherals already taken"),
            Self::I2cInitFailed(rc)   => write!(f, "I2C init failed (rc={})", rc),
            Self::UartInitFailed(rc)  => write!(f, "UART init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "button GPIO config failed (rc={})", rc),
            Self::GaugeAbsent         => write!(f, "MAX17043 not detected"),
            Self::DisplayAbsent       => write!(f, "SSD1306 allocation failed"),
            Self::SensorAbsent        => write!(f, "fingerprint sensor not found"),
        }
    }
}

impl std::error::Error for HwInitError {}

/// Which peripherals a configuration needs probed at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootPlan {
    pub gauge: bool,
    pub display: bool,
    pub sensor: bool,
}

impl BootPlan {
    pub fn for_config(config: &DeviceConfig) -> Self {
        Self {
            gauge: true,
            display: true,
            sensor: config.features.biometrics,
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::{Board, bring_up};

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_hal::gpio::AnyIOPin;
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::modem::Modem;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
    use esp_idf_hal::units::Hertz;
    use log::{error, info};

    use super::{BootPlan, HwInitError};
    use crate::config::DeviceConfig;
    use crate::drivers::button::ButtonPins;
    use crate::drivers::i2c_bus::SharedI2c;
    use crate::drivers::max17043::Max17043;
    use crate::drivers::r307::R307;
    use crate::drivers::ssd1306::Ssd1306;
    use crate::pins;

    pub type Bus = SharedI2c<I2cDriver<'static>>;

    /// Every driver the tasks need, probed and ready.
    pub struct Board {
        pub gauge: Max17043<Bus>,
        pub display: Ssd1306<Bus>,
        pub sensor: Option<R307<UartDriver<'static>>>,
        pub buttons: ButtonPins,
        pub modem: Modem,
    }

    pub fn bring_up(config: &DeviceConfig) -> Result<Board, HwInitError> {
        let plan = BootPlan::for_config(config);
        let p = Peripherals::take().map_err(|_| HwInitError::PeripheralsTaken)?;

        // SAFETY: each GPIO number below is used exactly once, and the
        // typed pins for the same numbers are never taken from `p.pins`.
        let (sda, scl, tx, rx, advance, select) = unsafe {
            (
                AnyIOPin::new(pins::I2C_SDA_GPIO),
                AnyIOPin::new(pins::I2C_SCL_GPIO),
                AnyIOPin::new(pins::FINGER_UART_TX_GPIO),
                AnyIOPin::new(pins::FINGER_UART_RX_GPIO),
                AnyIOPin::new(pins::BUTTON_ADVANCE_GPIO),
                AnyIOPin::new(pins::BUTTON_SELECT_GPIO),
            )
        };

        let i2c_config = I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ));
        let i2c = I2cDriver::new(p.i2c0, sda, scl, &i2c_config)
            .map_err(|e| HwInitError::I2cInitFailed(e.code()))?;
        let bus = SharedI2c::new(i2c);

        let mut gauge = Max17043::new(bus.clone(), pins::GAUGE_I2C_ADDR);
        if plan.gauge {
            gauge.probe().map_err(|e| {
                error!("hw_init: gauge probe: {:?}", e);
                HwInitError::GaugeAbsent
            })?;
            gauge
                .quick_start()
                .and_then(|()| gauge.set_alert_threshold(config.battery_alert_percent))
                .map_err(|_| HwInitError::GaugeAbsent)?;
        }

        let mut display = Ssd1306::new(bus, pins::DISPLAY_I2C_ADDR);
        if plan.display {
            display.init().map_err(|e| {
                error!("hw_init: display init: {:?}", e);
                HwInitError::DisplayAbsent
            })?;
        }

        let sensor = if plan.sensor {
            let uart_config = UartConfig::default().baudrate(Hertz(pins::FINGER_UART_BAUD));
            let uart = UartDriver::new(
                p.uart2,
                tx,
                rx,
                Option::<AnyIOPin>::None,
                Option::<AnyIOPin>::None,
                &uart_config,
            )
            .map_err(|e| HwInitError::UartInitFailed(e.code()))?;
            let mut sensor = R307::new(uart, config.sensor_capacity);
            sensor.handshake(0).map_err(|e| {
                error!("hw_init: sensor handshake: {}", e);
                HwInitError::SensorAbsent
            })?;
            Some(sensor)
        } else {
            None
        };

        let buttons = ButtonPins::new(advance, select).map_err(|e| HwInitError::GpioConfigFailed(e.code()))?;

        info!("hw_init: board ready (sensor={})", sensor.is_some());
        Ok(Board {
            gauge,
            display,
            sensor,
            buttons,
            modem: p.modem,
        })
    }
}
