//! ADS1115 16-bit ADC over I2C, used as the soil sensor input on a
//! Raspberry Pi.
//!
//! Single-ended reads at PGA ±4.096 V, 128 SPS, single-shot mode.

use std::{fmt, thread, time::Duration};

use rppal::i2c::I2c;

use crate::hal::AnalogInput;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

// Config word, MSB first: OS[15] MUX[14:12] PGA[11:9] MODE[8] DR[7:5]
// COMP[4:2] COMP_QUE[1:0].

/// OS=1, PGA=001 (±4.096 V), MODE=1, DR=100 (128 SPS), COMP_QUE=11.
const CONFIG_BASE: u16 = 0b1_000_001_1_100_0_0_0_11;

const MUX_SHIFT: u8 = 12;
/// AINx against GND, indexed by channel.
const MUX_AIN_GND: [u16; 4] = [0b100, 0b101, 0b110, 0b111];

pub const MAX_CHANNEL: u8 = 3;

/// One conversion at 128 SPS plus margin.
const SETTLE_AFTER_START: Duration = Duration::from_millis(9);

/// Bit 15 of the config register reads 1 once the conversion is done.
const OS_READY_BIT: u16 = 1 << 15;

fn config_for_channel(channel: u8) -> u16 {
    CONFIG_BASE | (MUX_AIN_GND[channel as usize] << MUX_SHIFT)
}

#[derive(Debug)]
pub enum AdcError {
    Bus(rppal::i2c::Error),
    NotReady,
}

impl From<rppal::i2c::Error> for AdcError {
    fn from(err: rppal::i2c::Error) -> Self {
        Self::Bus(err)
    }
}

impl fmt::Display for AdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "i2c error: {e}"),
            Self::NotReady => write!(f, "conversion did not complete"),
        }
    }
}

impl std::error::Error for AdcError {}

/// One ADS1115 input wired to the soil sensor.
pub struct Ads1115 {
    i2c: I2c,
    channel: u8,
}

impl Ads1115 {
    /// Open I2C bus 1 and address the ADS1115 at `addr`.
    pub fn new(addr: u16, channel: u8) -> anyhow::Result<Self> {
        anyhow::ensure!(
            channel <= MAX_CHANNEL,
            "ADS1115 channel {channel} out of range (0–{MAX_CHANNEL})"
        );

        let mut i2c = I2c::new()?;
        i2c.set_slave_address(addr)?;

        tracing::info!(
            addr = format_args!("0x{addr:02x}"),
            channel,
            "ads1115 initialised"
        );

        Ok(Self { i2c, channel })
    }
}

impl AnalogInput for Ads1115 {
    type Error = AdcError;

    fn read_raw(&mut self) -> Result<u16, AdcError> {
        let config = config_for_channel(self.channel);
        self.i2c.block_write(REG_CONFIG, &config.to_be_bytes())?;

        thread::sleep(SETTLE_AFTER_START);

        let mut ready = false;
        for _ in 0..3 {
            let mut buf = [0u8; 2];
            self.i2c.block_read(REG_CONFIG, &mut buf)?;
            if u16::from_be_bytes(buf) & OS_READY_BIT != 0 {
                ready = true;
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        if !ready {
            return Err(AdcError::NotReady);
        }

        let mut buf = [0u8; 2];
        self.i2c.block_read(REG_CONVERSION, &mut buf)?;
        // Single-ended results are non-negative; anything else is bus noise.
        Ok(i16::from_be_bytes(buf).max(0) as u16)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_register_per_channel() {
        assert_eq!(config_for_channel(0), 0xC383);
        assert_eq!(config_for_channel(1), 0xD383);
        assert_eq!(config_for_channel(2), 0xE383);
        assert_eq!(config_for_channel(3), 0xF383);
    }

    #[test]
    fn config_base_fields() {
        assert_eq!((CONFIG_BASE >> 15) & 1, 1, "OS starts conversion");
        assert_eq!((CONFIG_BASE >> 9) & 0b111, 0b001, "PGA ±4.096 V");
        assert_eq!((CONFIG_BASE >> 8) & 1, 1, "single-shot");
        assert_eq!((CONFIG_BASE >> 5) & 0b111, 0b100, "128 SPS");
    }
}
