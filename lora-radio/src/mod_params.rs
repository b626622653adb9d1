pub use lora_modulation::{Bandwidth, CodingRate, SpreadingFactor};

/// Errors types reported during radio driver processing
#[allow(clippy::upper_case_acronyms)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RadioError {
    SPI,
    Reset,
    RfSwitchRx,
    RfSwitchTx,
    Busy,
    /// Command status reported an error (SUBGHZ family)
    OpError(u8),
    PayloadSizeUnexpected(usize),
    /// A bounded busy-poll did not observe the expected register state in time
    PollingTimeout,
    /// The interrupt boundary could not enqueue a signal for the dispatch context
    SignalQueueFull,
    /// The caller asked for a parameter combination the chip cannot represent
    Configuration(ConfigError),
}

/// Parameter combinations rejected by `set_rx_config`/`set_tx_config`
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// FSK (or AFC) bandwidth in Hz outside of the chip's bandwidth table
    FskBandwidth(u32),
    /// LoRa bandwidth index other than 0 (125 kHz), 1 (250 kHz) or 2 (500 kHz)
    LoRaBandwidth(u32),
    /// LoRa coding rate other than 1 (4/5) ..= 4 (4/8)
    CodingRate(u8),
    /// LoRa spreading factor the chip does not support
    SpreadingFactor(u32),
    /// FSK bit rate of 0 bps
    Datarate(u32),
}

impl From<ConfigError> for RadioError {
    fn from(err: ConfigError) -> Self {
        RadioError::Configuration(err)
    }
}

/// Modem selected in the transceiver
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioModem {
    #[default]
    Fsk,
    LoRa,
}

/// Driver-level state, as reported by `get_status`
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioState {
    #[default]
    Idle,
    RxRunning,
    TxRunning,
    Cad,
}

/// Interrupt lines fed into the dispatch context.
///
/// `Dio0`..`Dio5` are the physical DIO edges, `Timeout` is the software
/// timer expiry. Chips with a single interrupt line report it as `Dio1`.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum IrqSignal {
    Dio0,
    Dio1,
    Dio2,
    Dio3,
    Dio4,
    Dio5,
    Timeout,
}

/// One entry of an FSK receiver bandwidth table
#[derive(Clone, Copy)]
pub struct FskBandwidth {
    /// Lower bound of the entry in Hz
    pub bandwidth: u32,
    /// Value programmed into the bandwidth register
    pub reg_value: u8,
}

impl FskBandwidth {
    pub(crate) const fn new(bandwidth: u32, reg_value: u8) -> Self {
        Self { bandwidth, reg_value }
    }
}

/// Look up the register value for `bandwidth` in an ascending table whose last
/// entry is an exclusive upper sentinel.
///
/// The entry whose lower bound is the greatest one not above `bandwidth` wins.
/// Bandwidths at or above the sentinel, or below the first entry, are a
/// configuration error.
pub fn fsk_bandwidth_reg_value(table: &[FskBandwidth], bandwidth: u32) -> Result<u8, RadioError> {
    table
        .windows(2)
        .find(|pair| bandwidth >= pair[0].bandwidth && bandwidth < pair[1].bandwidth)
        .map(|pair| pair[0].reg_value)
        .ok_or(ConfigError::FskBandwidth(bandwidth).into())
}
