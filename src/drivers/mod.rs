//! Chip drivers, board bring-up and platform helpers.

pub mod button;
pub mod hw_init;
pub mod i2c_bus;
pub mod max17043;
pub mod r307;
pub mod ssd1306;
pub mod task_pin;
pub mod watchdog;
