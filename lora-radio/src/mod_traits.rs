use embedded_hal_async::delay::DelayNs;

use crate::mod_params::*;

/// Functions implemented for an embedded framework for an MCU/radio combination
/// to allow this crate to control the board's pins.
pub trait InterfaceVariant {
    /// Reset the radio chip
    async fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), RadioError>;
    /// Wait for the radio chip to become available for an operation
    async fn wait_on_busy(&mut self) -> Result<(), RadioError>;
    /// Drive every antenna switch and PA control line to its low power state
    async fn disable_rf_switch(&mut self) -> Result<(), RadioError>;
    /// Select the receive RF path
    async fn enable_rf_switch_rx(&mut self) -> Result<(), RadioError>;
    /// Select the transmit RF path, the high power (PA_BOOST / RFO_HP) one if `high_power`
    async fn enable_rf_switch_tx(&mut self, high_power: bool) -> Result<(), RadioError>;
}

/// One-shot timer and monotonic clock used for the TX timeout and the bounded polling loops.
///
/// When an armed timer expires its owner must deliver [`IrqSignal::Timeout`] to the
/// radio, normally through [`crate::dispatch::SharedRadio::signal`].
pub trait Timer {
    /// Start (or restart) the one-shot timeout
    fn arm(&mut self, timeout_ms: u32);
    /// Cancel a pending timeout, if any
    fn disarm(&mut self);
    /// Milliseconds elapsed since an arbitrary fixed point
    fn now_ms(&mut self) -> u64;
}

/// Radio event notifications.
///
/// Every callback is optional: the default implementations do nothing. Callbacks run
/// inside the dispatch context with the driver locked and must not block.
#[allow(unused_variables)]
pub trait RadioEvents {
    /// Transmission completed
    fn tx_done(&mut self) {}
    /// Transmission did not complete in time; the radio has been re-initialized
    fn tx_timeout(&mut self) {}
    /// A packet was received. `snr` is the raw value of the chip's SNR register (0 for FSK).
    fn rx_done(&mut self, payload: &[u8], rssi: i16, snr: i8) {}
    /// No packet was received in time
    fn rx_timeout(&mut self) {}
    /// A packet was received with a CRC error
    fn rx_error(&mut self) {}
    /// The frequency hopping spread spectrum engine moved to `channel_index`
    fn fhss_change_channel(&mut self, channel_index: u8) {}
    /// Channel activity detection finished
    fn cad_done(&mut self, activity_detected: bool) {}
}

impl<T: RadioEvents + ?Sized> RadioEvents for &mut T {
    fn tx_done(&mut self) {
        T::tx_done(self)
    }
    fn tx_timeout(&mut self) {
        T::tx_timeout(self)
    }
    fn rx_done(&mut self, payload: &[u8], rssi: i16, snr: i8) {
        T::rx_done(self, payload, rssi, snr)
    }
    fn rx_timeout(&mut self) {
        T::rx_timeout(self)
    }
    fn rx_error(&mut self) {
        T::rx_error(self)
    }
    fn fhss_change_channel(&mut self, channel_index: u8) {
        T::fhss_change_channel(self, channel_index)
    }
    fn cad_done(&mut self, activity_detected: bool) {
        T::cad_done(self, activity_detected)
    }
}

/// An event sink that discards everything
pub struct NoEvents;

impl RadioEvents for NoEvents {}

/// The caller-facing radio API shared by every supported chip family.
///
/// Callers that use the radio concurrently with the dispatch context must hold the lock
/// provided by [`crate::dispatch::SharedRadio::lock`] while calling these functions.
pub trait LoRaRadio {
    /// Receiver of the radio events
    type Events: RadioEvents;

    /// Register the event sink, reset the chip and load the default register set.
    async fn init_radio(&mut self, events: Self::Events) -> Result<(), RadioError>;

    /// Pulse the chip reset line
    async fn radio_reset(&mut self) -> Result<(), RadioError>;

    /// Tune the synthesizer to `frequency_in_hz`
    async fn set_channel(&mut self, frequency_in_hz: u32) -> Result<(), RadioError>;

    /// Set the reception parameters.
    ///
    /// * `bandwidth` - FSK: Hz; LoRa: 0 = 125 kHz, 1 = 250 kHz, 2 = 500 kHz
    /// * `datarate` - FSK: bits per second; LoRa: spreading factor
    /// * `coderate` - LoRa only: 1 = 4/5 ..= 4 = 4/8
    /// * `bandwidth_afc` - FSK only: AFC bandwidth in Hz
    /// * `symb_timeout` - single reception timeout (LoRa: symbols, FSK: bytes)
    /// * `payload_len` - payload length when `fix_len` is set
    #[allow(clippy::too_many_arguments)]
    async fn set_rx_config(
        &mut self,
        modem: RadioModem,
        bandwidth: u32,
        datarate: u32,
        coderate: u8,
        bandwidth_afc: u32,
        preamble_len: u16,
        symb_timeout: u16,
        fix_len: bool,
        payload_len: u8,
        crc_on: bool,
        freq_hop_on: bool,
        hop_period: u8,
        iq_inverted: bool,
        rx_continuous: bool,
    ) -> Result<(), RadioError>;

    /// Set the transmission parameters. `timeout` is the transmission timeout in ms.
    #[allow(clippy::too_many_arguments)]
    async fn set_tx_config(
        &mut self,
        modem: RadioModem,
        power: i8,
        fdev: u32,
        bandwidth: u32,
        datarate: u32,
        coderate: u8,
        preamble_len: u16,
        fix_len: bool,
        crc_on: bool,
        freq_hop_on: bool,
        hop_period: u8,
        iq_inverted: bool,
        timeout: u32,
    ) -> Result<(), RadioError>;

    /// Load `payload` and start transmitting it
    async fn send(&mut self, payload: &[u8]) -> Result<(), RadioError>;

    /// Start receiving with the current reception parameters
    async fn receive(&mut self) -> Result<(), RadioError>;

    /// Put the radio in sleep mode
    async fn sleep(&mut self) -> Result<(), RadioError>;

    /// Put the radio in standby mode
    async fn standby(&mut self) -> Result<(), RadioError>;

    /// Start a LoRa channel activity detection
    async fn start_cad(&mut self) -> Result<(), RadioError>;

    /// Select the public (LoRaWAN) or private LoRa sync word
    async fn set_public_network(&mut self, enable: bool) -> Result<(), RadioError>;

    /// Set the maximum payload length accepted by the receiver of `modem`
    async fn set_max_payload_length(&mut self, modem: RadioModem, max: u8) -> Result<(), RadioError>;

    /// Air time in ms of a `payload_len` bytes packet with the current parameters of `modem`
    async fn time_on_air(&mut self, modem: RadioModem, payload_len: u8) -> Result<u32, RadioError>;

    /// 32 bits of entropy gathered from the receiver. Leaves the radio asleep; the
    /// reception/transmission parameters must be set again afterwards.
    async fn random(&mut self) -> Result<u32, RadioError>;

    /// Listen on `frequency_in_hz` for up to `max_carrier_sense_time_ms` and report whether
    /// the channel stayed below `rssi_threshold` (dBm). Leaves the radio asleep.
    async fn perform_carrier_sense(
        &mut self,
        modem: RadioModem,
        frequency_in_hz: u32,
        rssi_threshold: i16,
        max_carrier_sense_time_ms: u32,
    ) -> Result<bool, RadioError>;

    /// Whether the chip can tune to `frequency_in_hz`
    fn check_rf_frequency(&self, frequency_in_hz: u32) -> bool;

    /// Emit an unmodulated carrier on `frequency_in_hz` for `time_s` seconds
    async fn set_tx_continuous_wave(&mut self, frequency_in_hz: u32, power: i8, time_s: u16)
        -> Result<(), RadioError>;

    /// Current driver state
    fn get_status(&self) -> RadioState;

    /// Handle one interrupt signal to completion
    async fn process_signal(&mut self, signal: IrqSignal) -> Result<(), RadioError>;
}
