use lora_modulation::low_data_rate_optimize;
use num_traits::float::FloatCore;

use crate::mod_params::*;

/// FSK modulation and packet configuration
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct FskParams {
    pub power: i8,
    pub fdev: u32,
    pub bandwidth: u32,
    pub bandwidth_afc: u32,
    pub datarate: u32,
    pub preamble_len: u16,
    pub fix_len: bool,
    pub payload_len: u8,
    pub crc_on: bool,
    pub iq_inverted: bool,
    pub rx_continuous: bool,
    pub tx_timeout: u32,
    /// Receiver timeout in units of the 2-byte preamble detector
    pub rx_single_timeout: u32,
}

/// LoRa modulation and packet configuration
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(missing_docs)]
pub struct LoraParams {
    pub power: i8,
    pub bandwidth: Bandwidth,
    pub datarate: SpreadingFactor,
    pub low_datarate_optimize: bool,
    pub coderate: CodingRate,
    pub preamble_len: u16,
    pub fix_len: bool,
    pub payload_len: u8,
    pub crc_on: bool,
    pub freq_hop_on: bool,
    pub hop_period: u8,
    pub iq_inverted: bool,
    pub rx_continuous: bool,
    pub tx_timeout: u32,
    pub public_network: bool,
}

impl LoraParams {
    /// Validate and store a LoRa configuration given in the `set_rx_config`/`set_tx_config`
    /// encoding. Nothing is stored when a parameter is rejected.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn configure(
        &mut self,
        bandwidth: u32,
        datarate: u32,
        coderate: u8,
        preamble_len: u16,
        fix_len: bool,
        crc_on: bool,
        freq_hop_on: bool,
        hop_period: u8,
        iq_inverted: bool,
    ) -> Result<(), RadioError> {
        let bw = Bandwidth::from_index(bandwidth).ok_or(ConfigError::LoRaBandwidth(bandwidth))?;
        let sf = SpreadingFactor::try_from(datarate).map_err(ConfigError::SpreadingFactor)?;
        let cr = CodingRate::try_from(coderate).map_err(ConfigError::CodingRate)?;

        self.bandwidth = bw;
        self.datarate = sf;
        self.coderate = cr;
        self.low_datarate_optimize = low_data_rate_optimize(bw, sf);
        self.preamble_len = preamble_len;
        self.fix_len = fix_len;
        self.crc_on = crc_on;
        self.freq_hop_on = freq_hop_on;
        self.hop_period = hop_period;
        self.iq_inverted = iq_inverted;
        debug!("lora: bw = {}, sf = {}, cr = {}", bw, sf, cr);
        Ok(())
    }
}

impl Default for LoraParams {
    fn default() -> Self {
        Self {
            power: 0,
            bandwidth: Bandwidth::_125KHz,
            datarate: SpreadingFactor::_7,
            low_datarate_optimize: false,
            coderate: CodingRate::_4_5,
            preamble_len: 8,
            fix_len: false,
            payload_len: 0,
            crc_on: true,
            freq_hop_on: false,
            hop_period: 0,
            iq_inverted: false,
            rx_continuous: false,
            tx_timeout: 0,
            public_network: false,
        }
    }
}

/// Per-reception FSK bookkeeping, zeroed at the start of every reception
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct FskRxState {
    pub preamble_detected: bool,
    pub sync_word_detected: bool,
    pub rssi_value: i16,
    /// Frequency error in Hz measured by the AFC
    pub afc_value: i32,
    pub rx_gain: u8,
    /// Expected packet length
    pub size: u8,
    /// Bytes moved through the FIFO so far (received, or queued for transmission)
    pub nb_bytes: u8,
    pub fifo_thresh: u8,
    pub chunk_size: u8,
}

impl FskRxState {
    pub(crate) fn reset(&mut self) {
        self.preamble_detected = false;
        self.sync_word_detected = false;
        self.nb_bytes = 0;
        self.size = 0;
    }
}

/// Per-reception LoRa bookkeeping, zeroed at the start of every reception
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct LoraRxState {
    pub snr_value: i8,
    pub rssi_value: i16,
    pub size: u8,
}

impl LoraRxState {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything the driver knows about the radio configuration.
///
/// Owned by the driver instance; `modem` mirrors the modem last committed to the chip.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct RadioSettings {
    pub state: RadioState,
    pub modem: RadioModem,
    pub channel: u32,
    pub fsk: FskParams,
    pub lora: LoraParams,
    pub fsk_packet_handler: FskRxState,
    pub lora_packet_handler: LoraRxState,
}

/// Air time in ms of an FSK packet.
///
/// `syncword_len` is in bytes, `address_filtering` adds the node address byte.
pub fn fsk_time_on_air(params: &FskParams, syncword_len: u8, address_filtering: bool, payload_len: u8) -> u32 {
    let length_byte = u32::from(!params.fix_len);
    let address_byte = u32::from(address_filtering);
    let crc_bytes = if params.crc_on { 2 } else { 0 };
    let bytes = params.preamble_len as u32 + syncword_len as u32 + length_byte + address_byte + payload_len as u32 + crc_bytes;
    let seconds = (8 * bytes) as f64 / params.datarate as f64;
    (seconds * 1000.0).ceil() as u32
}

/// Air time in ms of a LoRa packet
pub fn lora_time_on_air(params: &LoraParams, payload_len: u8) -> u32 {
    let sf = params.datarate.factor() as i32;
    let bw = params.bandwidth.hz() as f64;
    // Symbol period in seconds
    let ts = (1u32 << sf) as f64 / bw;
    let t_preamble = (params.preamble_len as f64 + 4.25) * ts;

    let crc_bits = if params.crc_on { 16 } else { 0 };
    let header_bits = if params.fix_len { 20 } else { 0 };
    let ldro = if params.low_datarate_optimize { 2 } else { 0 };
    let numerator = 8 * payload_len as i32 - 4 * sf + 28 + crc_bits - header_bits;
    let denominator = 4 * (sf - ldro);
    let symbols = (numerator as f64 / denominator as f64).ceil() * params.coderate.denominator() as f64;
    let n_payload = 8.0 + symbols.max(0.0);
    let t_payload = n_payload * ts;

    ((t_preamble + t_payload) * 1000.0 + 0.999).ceil() as u32
}
