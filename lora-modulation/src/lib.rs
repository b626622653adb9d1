#![no_std]
#![doc = include_str!("../README.md")]

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Channel width.
pub enum Bandwidth {
    _125KHz,
    _250KHz,
    _500KHz,
}

impl Bandwidth {
    /// Width of the channel in Hz.
    pub const fn hz(self) -> u32 {
        match self {
            Bandwidth::_125KHz => 125_000,
            Bandwidth::_250KHz => 250_000,
            Bandwidth::_500KHz => 500_000,
        }
    }

    /// Map the LoRaWAN-style bandwidth index (0 = 125 kHz, 1 = 250 kHz, 2 = 500 kHz).
    pub const fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Bandwidth::_125KHz),
            1 => Some(Bandwidth::_250KHz),
            2 => Some(Bandwidth::_500KHz),
            _ => None,
        }
    }

    pub const fn index(self) -> u8 {
        match self {
            Bandwidth::_125KHz => 0,
            Bandwidth::_250KHz => 1,
            Bandwidth::_500KHz => 2,
        }
    }
}

impl From<Bandwidth> for u32 {
    fn from(bw: Bandwidth) -> u32 {
        bw.hz()
    }
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
/// Controls the chirp rate. Lower values are slower bandwidth, but more robust.
pub enum SpreadingFactor {
    _5,
    _6,
    _7,
    _8,
    _9,
    _10,
    _11,
    _12,
}

impl SpreadingFactor {
    /// Numeric spreading factor, i.e. log2 of the chips per symbol.
    pub const fn factor(self) -> u8 {
        match self {
            SpreadingFactor::_5 => 5,
            SpreadingFactor::_6 => 6,
            SpreadingFactor::_7 => 7,
            SpreadingFactor::_8 => 8,
            SpreadingFactor::_9 => 9,
            SpreadingFactor::_10 => 10,
            SpreadingFactor::_11 => 11,
            SpreadingFactor::_12 => 12,
        }
    }
}

impl TryFrom<u32> for SpreadingFactor {
    type Error = u32;

    fn try_from(sf: u32) -> Result<Self, Self::Error> {
        match sf {
            5 => Ok(SpreadingFactor::_5),
            6 => Ok(SpreadingFactor::_6),
            7 => Ok(SpreadingFactor::_7),
            8 => Ok(SpreadingFactor::_8),
            9 => Ok(SpreadingFactor::_9),
            10 => Ok(SpreadingFactor::_10),
            11 => Ok(SpreadingFactor::_11),
            12 => Ok(SpreadingFactor::_12),
            other => Err(other),
        }
    }
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Controls the forward error correction. Higher values are more robust, but reduces the ratio
/// of actual data in transmissions.
pub enum CodingRate {
    _4_5,
    _4_6,
    _4_7,
    _4_8,
}

impl CodingRate {
    /// Value used by the radios' coding rate fields (1 for 4/5 up to 4 for 4/8).
    pub const fn value(self) -> u8 {
        match self {
            CodingRate::_4_5 => 1,
            CodingRate::_4_6 => 2,
            CodingRate::_4_7 => 3,
            CodingRate::_4_8 => 4,
        }
    }

    pub const fn denominator(self) -> u8 {
        self.value() + 4
    }
}

impl TryFrom<u8> for CodingRate {
    type Error = u8;

    fn try_from(cr: u8) -> Result<Self, Self::Error> {
        match cr {
            1 => Ok(CodingRate::_4_5),
            2 => Ok(CodingRate::_4_6),
            3 => Ok(CodingRate::_4_7),
            4 => Ok(CodingRate::_4_8),
            other => Err(other),
        }
    }
}

/// The modulation triple which fully determines symbol timing.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseBandModulationParams {
    pub sf: SpreadingFactor,
    pub bw: Bandwidth,
    pub cr: CodingRate,
    /// Low data rate optimization, derived from `sf` and `bw`.
    pub ldro: bool,
}

impl BaseBandModulationParams {
    pub const fn new(sf: SpreadingFactor, bw: Bandwidth, cr: CodingRate) -> Self {
        Self { sf, bw, cr, ldro: low_data_rate_optimize(bw, sf) }
    }

    /// Duration of one symbol in microseconds.
    pub const fn symbol_time_us(&self) -> u32 {
        ((1u64 << self.sf.factor()) * 1_000_000 / self.bw.hz() as u64) as u32
    }
}

/// Low data rate optimization is mandated when a symbol lasts 16 ms or more,
/// which for the supported bandwidths is SF11/SF12 at 125 kHz and SF12 at 250 kHz.
pub const fn low_data_rate_optimize(bw: Bandwidth, sf: SpreadingFactor) -> bool {
    matches!(
        (bw, sf),
        (Bandwidth::_125KHz, SpreadingFactor::_11)
            | (Bandwidth::_125KHz, SpreadingFactor::_12)
            | (Bandwidth::_250KHz, SpreadingFactor::_12)
    )
}
