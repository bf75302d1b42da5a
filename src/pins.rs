//! GPIO / peripheral pin assignments for the Attendo terminal board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Menu buttons (active-low with internal pull-up, falling-edge interrupt)
// ---------------------------------------------------------------------------

/// Moves the menu cursor.
pub const BUTTON_ADVANCE_GPIO: i32 = 32;
/// Activates the highlighted menu item.
pub const BUTTON_SELECT_GPIO: i32 = 33;

// ---------------------------------------------------------------------------
// I²C bus (MAX17043 fuel gauge, SSD1306 OLED)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// Standard-mode clock; the gauge tops out at 400 kHz.
pub const I2C_FREQ_HZ: u32 = 100_000;

/// Seven-bit address of the MAX17043 fuel gauge.
pub const GAUGE_I2C_ADDR: u8 = 0x36;
/// Seven-bit address of the SSD1306 panel.
pub const DISPLAY_I2C_ADDR: u8 = 0x3C;

// ---------------------------------------------------------------------------
// Fingerprint sensor (R307 on UART2)
// ---------------------------------------------------------------------------

pub const FINGER_UART_TX_GPIO: i32 = 17;
pub const FINGER_UART_RX_GPIO: i32 = 16;
/// Factory baud rate of the R307 module.
pub const FINGER_UART_BAUD: u32 = 57_600;
