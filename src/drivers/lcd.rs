//! HD44780 character LCD behind a PCF8574 I2C backpack.
//!
//! The backpack exposes the controller's 4-bit interface: every byte is
//! sent as two nibbles, each latched by pulsing EN high then low.
//!
//! ```text
//!   bit:  7  6  5  4 | 3   2   1   0
//!         D7 D6 D5 D4| BL  EN  RW  RS
//! ```
//!
//! Transmit failures after initialisation are logged and dropped; the
//! display is informational and never stops a cycle.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::drivers::factory::{BusDevice, DeviceHandle};
use crate::error::{DeviceError, Result};

/// Per-transfer timeout (ms).
pub const TRANSMIT_TIMEOUT_MS: u32 = 1_000;

/// Visible columns per row.
pub const COLUMNS: u8 = 16;

// Nibble flags: backlight on, EN high/low, RS selects command or data.
const CMD_EN_HIGH: u8 = 0x0C;
const CMD_EN_LOW: u8 = 0x08;
const DATA_EN_HIGH: u8 = 0x0D;
const DATA_EN_LOW: u8 = 0x09;

const CMD_CLEAR: u8 = 0x01;
const CMD_HOME: u8 = 0x02;
const CMD_ENTRY_MODE: u8 = 0x06;
const CMD_DISPLAY_OFF: u8 = 0x08;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const ROW0_ADDRESS: u8 = 0x80;
const ROW1_ADDRESS: u8 = 0xC0;

/// Split `byte` into the four backpack writes that latch it.
pub fn encode_byte(byte: u8, is_data: bool) -> [u8; 4] {
    let (en_high, en_low) = if is_data {
        (DATA_EN_HIGH, DATA_EN_LOW)
    } else {
        (CMD_EN_HIGH, CMD_EN_LOW)
    };
    let high = byte & 0xF0;
    let low = byte << 4;
    [high | en_high, high | en_low, low | en_high, low | en_low]
}

/// DDRAM address command for `row`/`col`.  Rows past the second wrap to 0.
pub fn cursor_command(row: u8, col: u8) -> u8 {
    let col = col.min(COLUMNS - 1);
    match row {
        1 => col | ROW1_ADDRESS,
        _ => col | ROW0_ADDRESS,
    }
}

pub struct Lcd<'f> {
    handle: DeviceHandle<'f>,
    failed_writes: u32,
}

impl<'f> BusDevice<'f> for Lcd<'f> {
    type Args = ();

    fn bind(handle: DeviceHandle<'f>, _args: ()) -> Result<Self> {
        Ok(Self {
            handle,
            failed_writes: 0,
        })
    }

    fn initialize(&mut self, delay: &mut impl DelayNs) -> Result<()> {
        delay.delay_ms(150);

        // Force 8-bit mode three times, then drop to 4-bit.
        self.init_command(0x30)?;
        delay.delay_ms(6);
        self.init_command(0x30)?;
        delay.delay_us(150);
        self.init_command(0x30)?;
        delay.delay_us(150);
        self.init_command(0x20)?;
        delay.delay_us(150);

        for cmd in [
            CMD_FUNCTION_4BIT_2LINE,
            CMD_DISPLAY_OFF,
            CMD_ENTRY_MODE,
            CMD_DISPLAY_ON,
        ] {
            self.init_command(cmd)?;
            delay.delay_us(60);
        }

        self.init_command(CMD_CLEAR)?;
        delay.delay_ms(4);
        self.init_command(CMD_HOME)?;
        delay.delay_ms(4);

        info!("LCD: ready at 0x{:02X}", self.handle.address());
        Ok(())
    }
}

impl Lcd<'_> {
    pub fn address(&self) -> u16 {
        self.handle.address()
    }

    /// Writes that failed since binding.
    pub fn failed_writes(&self) -> u32 {
        self.failed_writes
    }

    pub fn clear(&mut self, delay: &mut impl DelayNs) {
        self.send(CMD_CLEAR, false);
        delay.delay_ms(5);
    }

    pub fn put_cursor(&mut self, row: u8, col: u8, delay: &mut impl DelayNs) {
        self.send(cursor_command(row, col), false);
        delay.delay_us(150);
    }

    /// Write `text` starting at `row`/`col`.  Non-ASCII characters print as `?`.
    pub fn print(&mut self, row: u8, col: u8, text: &str, delay: &mut impl DelayNs) {
        self.put_cursor(row, col, delay);
        for ch in text.chars().take(usize::from(COLUMNS.saturating_sub(col))) {
            let byte = if ch.is_ascii() { ch as u8 } else { b'?' };
            self.send(byte, true);
        }
    }

    /// Clear and show one line on each row.
    pub fn show(&mut self, top: &str, bottom: Option<&str>, delay: &mut impl DelayNs) {
        self.clear(delay);
        self.print(0, 0, top, delay);
        if let Some(line) = bottom {
            self.print(1, 0, line, delay);
        }
    }

    fn init_command(&mut self, cmd: u8) -> Result<()> {
        let address = self.handle.address();
        self.handle
            .write(&encode_byte(cmd, false), TRANSMIT_TIMEOUT_MS)
            .map_err(|code| DeviceError::InitFailed { address, code }.into())
    }

    fn send(&mut self, byte: u8, is_data: bool) {
        if let Err(rc) = self.handle.write(&encode_byte(byte, is_data), TRANSMIT_TIMEOUT_MS) {
            self.failed_writes += 1;
            warn!("LCD: write 0x{:02X} failed (rc={})", byte, rc);
        }
    }
}

// ---------------------------------------------------------------------------
// Display lines
// ---------------------------------------------------------------------------

pub const MEASURING_LINE: &str = "Measuring...";
pub const LOW_WATER_LINE: &str = "Low water level!";

pub fn moisture_line(percentage: f32) -> String {
    format!("Moisture:{:.1}%", percentage)
}

pub fn water_line(percentage: f32) -> String {
    format!("Water:{:.1}%", percentage)
}
