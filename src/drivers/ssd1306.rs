//! SSD1306 128×64 monochrome OLED over I²C, text only.
//!
//! The driver keeps a 1 KiB framebuffer (one bit per pixel, eight vertical
//! pixels per byte, page-major) that `embedded-graphics` draws into, and
//! pushes the whole buffer on every [`DisplayPort::show`].  Each I²C write
//! starts with a control byte: `0x00` for a command stream, `0x40` for
//! display RAM.

use core::convert::Infallible;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_5X8;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app::ports::DisplayPort;
use crate::tasks::display::Frame;

pub const WIDTH: usize = 128;
pub const HEIGHT: usize = 64;
const PAGES: usize = HEIGHT / 8;
const LINE_HEIGHT: i32 = 8;

const CONTROL_COMMAND: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;
/// Display RAM bytes per I²C write.
const DATA_CHUNK: usize = 16;

const INIT_SEQUENCE: &[u8] = &[
    0xAE, // display off
    0xD5, 0x80, // clock divide
    0xA8, 0x3F, // multiplex 64
    0xD3, 0x00, // no display offset
    0x40, // start line 0
    0x8D, 0x14, // charge pump on
    0x20, 0x00, // horizontal addressing
    0xA1, // segment remap
    0xC8, // COM scan descending
    0xDA, 0x12, // COM pins
    0x81, 0xCF, // contrast
    0xD9, 0xF1, // pre-charge
    0xDB, 0x40, // VCOMH deselect
    0xA4, // follow RAM
    0xA6, // not inverted
    0xAF, // display on
];

/// Page-major 1 bpp framebuffer.
pub struct Canvas {
    buffer: [u8; WIDTH * PAGES],
}

impl Canvas {
    const fn new() -> Self {
        Self {
            buffer: [0; WIDTH * PAGES],
        }
    }

    pub fn clear_all(&mut self) {
        self.buffer.fill(0);
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < WIDTH && y < HEIGHT && self.buffer[x + (y / 8) * WIDTH] & (1 << (y % 8)) != 0
    }

    pub fn lit_pixels(&self) -> u32 {
        self.buffer.iter().map(|b| b.count_ones()).sum()
    }

    fn set(&mut self, x: usize, y: usize, on: bool) {
        let byte = &mut self.buffer[x + (y / 8) * WIDTH];
        let bit = 1 << (y % 8);
        if on {
            *byte |= bit;
        } else {
            *byte &= !bit;
        }
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for Canvas {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<P>(&mut self, pixels: P) -> Result<(), Self::Error>
    where
        P: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let Ok((x, y)) = <(u32, u32)>::try_from(point) {
                let (x, y) = (x as usize, y as usize);
                if x < WIDTH && y < HEIGHT {
                    self.set(x, y, color.is_on());
                }
            }
        }
        Ok(())
    }
}

pub struct Ssd1306<I> {
    i2c: I,
    address: u8,
    canvas: Canvas,
}

impl<I: I2c> Ssd1306<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            canvas: Canvas::new(),
        }
    }

    /// Boot probe: send the init sequence and blank the panel.  A NACK
    /// means no panel.
    pub fn init(&mut self) -> Result<(), I::Error> {
        self.command(INIT_SEQUENCE)?;
        self.canvas.clear_all();
        self.flush()?;
        info!("Display: SSD1306 ready at 0x{:02X}", self.address);
        Ok(())
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    fn command(&mut self, bytes: &[u8]) -> Result<(), I::Error> {
        let mut buf = [0u8; 1 + 32];
        for chunk in bytes.chunks(32) {
            buf[0] = CONTROL_COMMAND;
            buf[1..=chunk.len()].copy_from_slice(chunk);
            self.i2c.write(self.address, &buf[..=chunk.len()])?;
        }
        Ok(())
    }

    /// Push the whole framebuffer.
    pub fn flush(&mut self) -> Result<(), I::Error> {
        self.command(&[0x21, 0, (WIDTH - 1) as u8, 0x22, 0, (PAGES - 1) as u8])?;
        let mut buf = [0u8; 1 + DATA_CHUNK];
        buf[0] = CONTROL_DATA;
        for chunk in self.canvas.buffer.chunks(DATA_CHUNK) {
            buf[1..=chunk.len()].copy_from_slice(chunk);
            self.i2c.write(self.address, &buf[..=chunk.len()])?;
        }
        Ok(())
    }

    /// Draw `frame` into the framebuffer, one text row per 8-pixel page.
    pub fn render(&mut self, frame: &Frame) {
        self.canvas.clear_all();
        let style = MonoTextStyle::new(&FONT_5X8, BinaryColor::On);
        for (row, line) in frame.iter().enumerate() {
            let origin = Point::new(0, row as i32 * LINE_HEIGHT);
            let _ = Text::with_baseline(line.as_str(), origin, style, Baseline::Top).draw(&mut self.canvas);
        }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> DisplayPort for Ssd1306<I> {
    fn show(&mut self, frame: &Frame) {
        self.render(frame);
        if let Err(e) = self.flush() {
            warn!("Display: flush failed: {:?}", e);
        }
    }
}
