mod irq;
mod radio_kind_params;
#[cfg(test)]
mod test;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;
use radio_kind_params::*;

use crate::interface::SpiInterface;
use crate::mod_params::*;
use crate::mod_traits::{InterfaceVariant, LoRaRadio, RadioEvents, Timer};
use crate::settings::*;

const XTAL_FREQ: u32 = 32_000_000;

// Constant values needed to compute the RSSI value
const RSSI_OFFSET_LF: i16 = -164;
const RSSI_OFFSET_HF: i16 = -157;
const RF_MID_BAND_THRESH: u32 = 525_000_000;

// Synthesizer range of the SX1276
const RF_FREQUENCY_MIN: u32 = 137_000_000;
const RF_FREQUENCY_MAX: u32 = 1_020_000_000;

// High band frequency used by the second image calibration point
const CALIBRATION_HF_FREQUENCY: u32 = 868_000_000;
// Upper bound for the image calibration busy-poll
const CALIBRATION_TIMEOUT_MS: u64 = 100;

// FSK FIFO streaming
const FSK_FIFO_SIZE: usize = 64;
const FSK_CHUNK_SIZE: u8 = 32;

const BUFFER_SIZE: usize = 255;

// RegIrqFlagsMask programs, a set bit disables the interrupt
const IRQ_MASK_TX: u8 = !0x08;
const IRQ_MASK_TX_HOPPING: u8 = !(0x08 | 0x02);
const IRQ_MASK_RX: u8 = 0x10 | 0x08 | 0x04 | 0x01 | 0x02;
const IRQ_MASK_RX_HOPPING: u8 = 0x10 | 0x08 | 0x04 | 0x01;
const IRQ_MASK_CAD: u8 = 0x80 | 0x40 | 0x20 | 0x10 | 0x08 | 0x02;
const IRQ_MASK_ALL: u8 = 0xff;

// Synthesizer register value for a frequency, Frf = freq * 2^19 / Fxosc
fn freq_to_frf(frequency_in_hz: u32) -> u32 {
    (((frequency_in_hz as u64) << 19) / XTAL_FREQ as u64) as u32
}

fn frf_to_freq(frf: u32) -> u32 {
    ((frf as u64 * XTAL_FREQ as u64) >> 19) as u32
}

/// Configuration for SX1276-based boards
pub struct Config {
    /// Whether the board clocks the chip from a TCXO instead of a crystal
    pub tcxo_used: bool,
    /// Whether to use PA_BOOST for transmit instead of RFO. NB! Depends on board layout.
    pub tx_boost: bool,
}

/// Interrupt driven SX1276 driver.
///
/// `TMR` provides the TX timeout, `EV` receives the radio events. The driver owns the
/// bus and the [`RadioSettings`]; see [`crate::dispatch::SharedRadio`] for sharing it with
/// the interrupt dispatch context.
pub struct Sx1276<SPI, IV, TMR, DLY, EV> {
    intf: SpiInterface<SPI, IV>,
    config: Config,
    timer: TMR,
    delay: DLY,
    events: Option<EV>,
    settings: RadioSettings,
    data_buffer: [u8; BUFFER_SIZE],
}

impl<SPI, IV, TMR, DLY, EV> Sx1276<SPI, IV, TMR, DLY, EV>
where
    SPI: SpiDevice<u8>,
    IV: InterfaceVariant,
    TMR: Timer,
    DLY: DelayNs,
    EV: RadioEvents,
{
    /// Create a driver instance. The chip is left untouched until [`LoRaRadio::init_radio`].
    pub fn new(spi: SPI, iv: IV, timer: TMR, delay: DLY, config: Config) -> Self {
        Self {
            intf: SpiInterface::new(spi, iv),
            config,
            timer,
            delay,
            events: None,
            settings: RadioSettings::default(),
            data_buffer: [0; BUFFER_SIZE],
        }
    }

    /// Current configuration and per-reception bookkeeping
    pub fn settings(&self) -> &RadioSettings {
        &self.settings
    }

    // Utility functions
    async fn read_register(&mut self, register: impl RegisterAddr) -> Result<u8, RadioError> {
        let mut read_buffer = [0x00u8];
        self.intf.read(&[register.read_addr()], &mut read_buffer).await?;
        Ok(read_buffer[0])
    }

    async fn write_register(&mut self, register: impl RegisterAddr, value: u8) -> Result<(), RadioError> {
        self.intf.write(&[register.write_addr(), value], false).await
    }

    // Read-modify-write: keep the bits selected by `mask`, then OR in `bits`
    async fn update_register(&mut self, register: impl RegisterAddr, mask: u8, bits: u8) -> Result<(), RadioError> {
        let value = self.read_register(register).await?;
        self.write_register(register, (value & mask) | bits).await
    }

    async fn write_fifo(&mut self, buf: &[u8]) -> Result<(), RadioError> {
        self.intf
            .write_with_payload(&[Register::Fifo.write_addr()], buf, false)
            .await
    }

    // Fill data_buffer[start..end] from the FIFO
    async fn read_fifo_into_buffer(&mut self, start: usize, end: usize) -> Result<(), RadioError> {
        if start >= end {
            return Ok(());
        }
        self.intf
            .read(&[Register::Fifo.read_addr()], &mut self.data_buffer[start..end])
            .await
    }

    async fn write_fifo_from_buffer(&mut self, start: usize, end: usize) -> Result<(), RadioError> {
        if start >= end {
            return Ok(());
        }
        self.intf
            .write_with_payload(&[Register::Fifo.write_addr()], &self.data_buffer[start..end], false)
            .await
    }

    fn rssi_offset(&self) -> i16 {
        if self.settings.channel > RF_MID_BAND_THRESH {
            RSSI_OFFSET_HF
        } else {
            RSSI_OFFSET_LF
        }
    }

    async fn set_operation_mode(&mut self, mode: OpMode) -> Result<(), RadioError> {
        // Low power state first so that two RF paths are never enabled together
        self.intf.iv.disable_rf_switch().await?;
        if mode != OpMode::Sleep {
            self.set_antenna_switch(mode).await?;
        }
        self.update_register(Register::OpMode, OpMode::MASK, mode.value()).await
    }

    async fn set_antenna_switch(&mut self, mode: OpMode) -> Result<(), RadioError> {
        match mode {
            OpMode::Transmitter => {
                let pa_config = self.read_register(Register::PaConfig).await?;
                let high_power = pa_config & PA_CONFIG_PA_BOOST == PA_CONFIG_PA_BOOST;
                self.intf.iv.enable_rf_switch_tx(high_power).await
            }
            OpMode::Receiver | OpMode::ReceiverSingle | OpMode::Cad => self.intf.iv.enable_rf_switch_rx().await,
            _ => self.intf.iv.disable_rf_switch().await,
        }
    }

    // The long range mode bit can only be changed in sleep mode, so the chip is queried
    // before anything is touched.
    async fn set_modem(&mut self, modem: RadioModem) -> Result<(), RadioError> {
        let op_mode = self.read_register(Register::OpMode).await?;
        let current = if op_mode & LONG_RANGE_MODE_ON == LONG_RANGE_MODE_ON {
            RadioModem::LoRa
        } else {
            RadioModem::Fsk
        };
        self.settings.modem = modem;
        if current == modem {
            return Ok(());
        }
        debug!("modem {} -> {}", current, modem);

        self.set_operation_mode(OpMode::Sleep).await?;
        let (long_range, (dio_mapping1, dio_mapping2)) = match modem {
            RadioModem::Fsk => (0x00, FSK_DIO_DEFAULTS),
            RadioModem::LoRa => (LONG_RANGE_MODE_ON, LORA_DIO_DEFAULTS),
        };
        self.update_register(Register::OpMode, LONG_RANGE_MODE_MASK, long_range)
            .await?;
        self.write_register(Register::DioMapping1, dio_mapping1).await?;
        self.write_register(Register::DioMapping2, dio_mapping2).await
    }

    async fn setup_registers(&mut self) -> Result<(), RadioError> {
        for init in RADIO_INIT_REGISTERS {
            match init {
                InitWrite::Fsk(register, value) => {
                    self.set_modem(RadioModem::Fsk).await?;
                    self.write_register(register, value).await?;
                }
                InitWrite::Common(register, value) => {
                    self.set_modem(RadioModem::Fsk).await?;
                    self.write_register(register, value).await?;
                }
                InitWrite::LoRa(register, value) => {
                    self.set_modem(RadioModem::LoRa).await?;
                    self.write_register(register, value).await?;
                }
            }
        }
        Ok(())
    }

    async fn enable_tcxo(&mut self) -> Result<(), RadioError> {
        if self.config.tcxo_used {
            self.update_register(Register::Tcxo, 0xff, TCXO_INPUT_ON).await?;
        }
        Ok(())
    }

    async fn channel_from_registers(&mut self) -> Result<u32, RadioError> {
        let msb = self.read_register(Register::FrfMsb).await? as u32;
        let mid = self.read_register(Register::FrfMid).await? as u32;
        let lsb = self.read_register(Register::FrfLsb).await? as u32;
        Ok(frf_to_freq((msb << 16) | (mid << 8) | lsb))
    }

    async fn calibrate_image(&mut self) -> Result<(), RadioError> {
        self.update_register(FskRegister::ImageCal, IMAGE_CAL_START_MASK, IMAGE_CAL_START)
            .await?;
        let start = self.timer.now_ms();
        loop {
            let image_cal = self.read_register(FskRegister::ImageCal).await?;
            if image_cal & IMAGE_CAL_RUNNING != IMAGE_CAL_RUNNING {
                return Ok(());
            }
            if self.timer.now_ms().saturating_sub(start) > CALIBRATION_TIMEOUT_MS {
                return Err(RadioError::PollingTimeout);
            }
        }
    }

    // Image rejection differs between bands, so the receiver is calibrated at the
    // current (low band) frequency and at 868 MHz. Only valid with the reset register
    // values, before any other configuration.
    async fn rx_chain_calibration(&mut self) -> Result<(), RadioError> {
        let pa_config = self.read_register(Register::PaConfig).await?;
        let initial_freq = self.channel_from_registers().await?;

        // Cut the PA just in case, RFO output, power = -1 dBm
        self.write_register(Register::PaConfig, 0x00).await?;

        self.calibrate_image().await?;
        self.set_channel(CALIBRATION_HF_FREQUENCY).await?;
        self.calibrate_image().await?;

        self.write_register(Register::PaConfig, pa_config).await?;
        self.set_channel(initial_freq).await
    }

    async fn set_rf_tx_power(&mut self, power: i8) -> Result<(), RadioError> {
        let mut pa_config = self.read_register(Register::PaConfig).await?;
        let mut pa_dac = self.read_register(Register::PaDac).await?;

        let pa_select = if self.config.tx_boost { PA_CONFIG_PA_BOOST } else { 0x00 };
        pa_config = (pa_config & PA_CONFIG_PA_SELECT_MASK) | pa_select;
        pa_config = (pa_config & PA_CONFIG_MAX_POWER_MASK) | PA_CONFIG_MAX_POWER;

        let output_power = if pa_config & PA_CONFIG_PA_BOOST == PA_CONFIG_PA_BOOST {
            let dac = if power > 17 { PA_DAC_20DBM_ON } else { PA_DAC_20DBM_OFF };
            pa_dac = (pa_dac & PA_DAC_MASK) | dac;
            if dac == PA_DAC_20DBM_ON {
                power.clamp(5, 20) - 5
            } else {
                power.clamp(2, 17) - 2
            }
        } else {
            power.clamp(-1, 14) + 1
        };
        debug!("tx power {} dBm, pa_config = {:02x}", power, pa_config);
        pa_config = (pa_config & PA_CONFIG_OUTPUT_POWER_MASK) | output_power as u8;

        self.write_register(Register::PaConfig, pa_config).await?;
        self.write_register(Register::PaDac, pa_dac).await
    }

    // Rounded bit rate register value, which must fit the 16 bit BitrateMsb/Lsb pair
    fn fsk_bitrate(datarate: u32) -> Result<u16, RadioError> {
        if datarate == 0 {
            return Err(ConfigError::Datarate(datarate).into());
        }
        u16::try_from((XTAL_FREQ + datarate / 2) / datarate).map_err(|_| ConfigError::Datarate(datarate).into())
    }

    async fn set_fsk_bitrate(&mut self, bitrate: u16) -> Result<(), RadioError> {
        self.write_register(FskRegister::BitrateMsb, (bitrate >> 8) as u8).await?;
        self.write_register(FskRegister::BitrateLsb, bitrate as u8).await
    }

    async fn set_fsk_packet_config(&mut self) -> Result<(), RadioError> {
        let fsk = self.settings.fsk;
        let preamble = fsk.preamble_len.to_be_bytes();
        self.write_register(FskRegister::PreambleMsb, preamble[0]).await?;
        self.write_register(FskRegister::PreambleLsb, preamble[1]).await?;

        let format = if fsk.fix_len { 0x00 } else { PACKET_CONFIG1_FORMAT_VARIABLE };
        let crc = if fsk.crc_on { PACKET_CONFIG1_CRC_ON } else { 0x00 };
        self.update_register(
            FskRegister::PacketConfig1,
            PACKET_CONFIG1_CRC_MASK & PACKET_CONFIG1_FORMAT_MASK,
            format | crc,
        )
        .await?;
        self.update_register(FskRegister::PacketConfig2, 0xff, PACKET_CONFIG2_DATA_MODE_PACKET)
            .await
    }

    // Modem config registers shared by the RX and TX configuration. `symb_timeout` is
    // only programmed for reception.
    async fn set_lora_modem_config(&mut self, symb_timeout: Option<u16>) -> Result<(), RadioError> {
        let lora = self.settings.lora;
        let bandwidth = lora.bandwidth.index() + 7;
        let sf = lora.datarate.factor();

        if lora.freq_hop_on {
            self.update_register(Register::PllHop, PLL_HOP_FAST_HOP_MASK, PLL_HOP_FAST_HOP_ON)
                .await?;
            self.write_register(LoRaRegister::HopPeriod, lora.hop_period).await?;
        }

        self.update_register(
            LoRaRegister::ModemConfig1,
            MODEM_CONFIG1_BW_MASK & MODEM_CONFIG1_CR_MASK & MODEM_CONFIG1_IMPLICIT_HEADER_MASK,
            (bandwidth << 4) | (lora.coderate.value() << 1) | lora.fix_len as u8,
        )
        .await?;

        let crc = (lora.crc_on as u8) << 2;
        match symb_timeout {
            Some(symb_timeout) => {
                self.update_register(
                    LoRaRegister::ModemConfig2,
                    MODEM_CONFIG2_SF_MASK & MODEM_CONFIG2_RX_PAYLOAD_CRC_MASK & MODEM_CONFIG2_SYMB_TIMEOUT_MSB_MASK,
                    (sf << 4) | crc | ((symb_timeout >> 8) & 0x03) as u8,
                )
                .await?;
                self.write_register(LoRaRegister::SymbTimeoutLsb, symb_timeout as u8)
                    .await?;
            }
            None => {
                self.update_register(
                    LoRaRegister::ModemConfig2,
                    MODEM_CONFIG2_SF_MASK & MODEM_CONFIG2_RX_PAYLOAD_CRC_MASK,
                    (sf << 4) | crc,
                )
                .await?;
            }
        }

        let ldro = if lora.low_datarate_optimize {
            MODEM_CONFIG3_LOW_DATA_RATE_OPTIMIZE_ON
        } else {
            0x00
        };
        self.update_register(LoRaRegister::ModemConfig3, MODEM_CONFIG3_LOW_DATA_RATE_OPTIMIZE_MASK, ldro)
            .await?;

        let preamble = lora.preamble_len.to_be_bytes();
        self.write_register(LoRaRegister::PreambleMsb, preamble[0]).await?;
        self.write_register(LoRaRegister::PreambleLsb, preamble[1]).await?;

        let (detect_optimize, detection_threshold) = if sf == 6 {
            (DETECTION_OPTIMIZE_SF6, DETECTION_THRESHOLD_SF6)
        } else {
            (DETECTION_OPTIMIZE_SF7_TO_SF12, DETECTION_THRESHOLD_SF7_TO_SF12)
        };
        self.update_register(LoRaRegister::DetectOptimize, DETECTION_OPTIMIZE_MASK, detect_optimize)
            .await?;
        self.write_register(LoRaRegister::DetectionThreshold, detection_threshold)
            .await
    }

    async fn transmit(&mut self, timeout_ms: u32) -> Result<(), RadioError> {
        match self.settings.modem {
            RadioModem::Fsk => {
                // DIO0 = PacketSent, DIO1 = FifoEmpty
                self.update_register(Register::DioMapping1, DIO0_MASK & DIO1_MASK & DIO2_MASK, DIO1_01)
                    .await?;
                self.update_register(Register::DioMapping2, DIO4_MASK & MAP_MASK, 0x00)
                    .await?;
                let fifo_thresh = self.read_register(FskRegister::FifoThresh).await?;
                self.settings.fsk_packet_handler.fifo_thresh = fifo_thresh & FIFO_THRESH_MASK;
            }
            RadioModem::LoRa => {
                if self.settings.lora.freq_hop_on {
                    self.write_register(LoRaRegister::IrqFlagsMask, IRQ_MASK_TX_HOPPING).await?;
                    // DIO0 = TxDone, DIO2 = FhssChangeChannel
                    self.update_register(Register::DioMapping1, DIO0_MASK & DIO2_MASK, DIO0_01 | DIO2_00)
                        .await?;
                } else {
                    self.write_register(LoRaRegister::IrqFlagsMask, IRQ_MASK_TX).await?;
                    self.update_register(Register::DioMapping1, DIO0_MASK, DIO0_01).await?;
                }
            }
        }

        self.settings.state = RadioState::TxRunning;
        self.timer.arm(timeout_ms);
        self.set_operation_mode(OpMode::Transmitter).await
    }

    async fn get_rssi(&mut self, modem: RadioModem) -> Result<i16, RadioError> {
        match modem {
            RadioModem::Fsk => {
                let rssi = self.read_register(FskRegister::RssiValue).await?;
                Ok(-((rssi >> 1) as i16))
            }
            RadioModem::LoRa => {
                let rssi = self.read_register(LoRaRegister::RssiValue).await?;
                Ok(self.rssi_offset() + rssi as i16)
            }
        }
    }

    async fn set_lora_iq(&mut self, rx: bool) -> Result<(), RadioError> {
        let inverted = self.settings.lora.iq_inverted;
        let (bits, iq2) = match (rx, inverted) {
            (true, true) => (INVERT_IQ_RX_ON | INVERT_IQ_TX_OFF, INVERT_IQ2_ON),
            (false, true) => (INVERT_IQ_TX_ON, INVERT_IQ2_ON),
            (_, false) => (INVERT_IQ_TX_OFF, INVERT_IQ2_OFF),
        };
        self.update_register(LoRaRegister::InvertIq, INVERT_IQ_TX_MASK & INVERT_IQ_RX_MASK, bits)
            .await?;
        self.write_register(LoRaRegister::InvertIq2, iq2).await
    }

    fn is_rx_continuous(&self) -> bool {
        match self.settings.modem {
            RadioModem::Fsk => self.settings.fsk.rx_continuous,
            RadioModem::LoRa => self.settings.lora.rx_continuous,
        }
    }
}

impl<SPI, IV, TMR, DLY, EV> LoRaRadio for Sx1276<SPI, IV, TMR, DLY, EV>
where
    SPI: SpiDevice<u8>,
    IV: InterfaceVariant,
    TMR: Timer,
    DLY: DelayNs,
    EV: RadioEvents,
{
    type Events = EV;

    async fn init_radio(&mut self, events: EV) -> Result<(), RadioError> {
        self.events = Some(events);

        self.radio_reset().await?;
        self.enable_tcxo().await?;
        self.rx_chain_calibration().await?;

        self.set_operation_mode(OpMode::Sleep).await?;
        self.setup_registers().await?;
        self.set_modem(RadioModem::Fsk).await?;

        self.settings.state = RadioState::Idle;
        Ok(())
    }

    async fn radio_reset(&mut self) -> Result<(), RadioError> {
        self.intf.iv.reset(&mut self.delay).await
    }

    async fn set_channel(&mut self, frequency_in_hz: u32) -> Result<(), RadioError> {
        debug!("channel = {}", frequency_in_hz);
        self.settings.channel = frequency_in_hz;
        let frf = freq_to_frf(frequency_in_hz);
        self.write_register(Register::FrfMsb, (frf >> 16) as u8).await?;
        self.write_register(Register::FrfMid, (frf >> 8) as u8).await?;
        self.write_register(Register::FrfLsb, frf as u8).await
    }

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
    ) -> Result<(), RadioError> {
        self.set_modem(modem).await?;

        match modem {
            RadioModem::Fsk => {
                let rx_bw = fsk_bandwidth_reg_value(&FSK_BANDWIDTHS, bandwidth)?;
                let afc_bw = fsk_bandwidth_reg_value(&FSK_BANDWIDTHS, bandwidth_afc)?;
                let bitrate = Self::fsk_bitrate(datarate)?;

                let fsk = &mut self.settings.fsk;
                fsk.bandwidth = bandwidth;
                fsk.datarate = datarate;
                fsk.bandwidth_afc = bandwidth_afc;
                fsk.preamble_len = preamble_len;
                fsk.fix_len = fix_len;
                fsk.payload_len = payload_len;
                fsk.crc_on = crc_on;
                fsk.iq_inverted = iq_inverted;
                fsk.rx_continuous = rx_continuous;
                fsk.rx_single_timeout = (symb_timeout as u32 + 1) / 2;

                self.set_fsk_bitrate(bitrate).await?;
                self.write_register(FskRegister::RxBw, rx_bw).await?;
                self.write_register(FskRegister::AfcBw, afc_bw).await?;
                let length = if fix_len { payload_len } else { 0xff };
                self.write_register(FskRegister::PayloadLength, length).await?;
                self.set_fsk_packet_config().await
            }
            RadioModem::LoRa => {
                // SF5 is not available on this chip
                self.settings.lora.configure(
                    bandwidth,
                    datarate.clamp(6, 12),
                    coderate,
                    preamble_len,
                    fix_len,
                    crc_on,
                    freq_hop_on,
                    hop_period,
                    iq_inverted,
                )?;
                self.settings.lora.payload_len = payload_len;
                self.settings.lora.rx_continuous = rx_continuous;

                self.set_lora_modem_config(Some(symb_timeout)).await?;
                if fix_len {
                    self.write_register(LoRaRegister::PayloadLength, payload_len).await?;
                }

                // Errata 2.1: sensitivity optimization with a 500 kHz bandwidth
                if self.settings.lora.bandwidth == Bandwidth::_500KHz {
                    let (test36, test3a) = if self.settings.channel > RF_MID_BAND_THRESH {
                        ERRATA_500KHZ_HF
                    } else {
                        ERRATA_500KHZ_LF
                    };
                    self.write_register(LoRaRegister::Test36, test36).await?;
                    self.write_register(LoRaRegister::Test3A, test3a).await
                } else {
                    self.write_register(LoRaRegister::Test36, ERRATA_500KHZ_OFF).await
                }
            }
        }
    }

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
    ) -> Result<(), RadioError> {
        self.set_modem(modem).await?;
        self.set_rf_tx_power(power).await?;

        match modem {
            RadioModem::Fsk => {
                let bitrate = Self::fsk_bitrate(datarate)?;
                let fsk = &mut self.settings.fsk;
                fsk.power = power;
                fsk.fdev = fdev;
                fsk.bandwidth = bandwidth;
                fsk.datarate = datarate;
                fsk.preamble_len = preamble_len;
                fsk.fix_len = fix_len;
                fsk.crc_on = crc_on;
                fsk.iq_inverted = iq_inverted;
                fsk.tx_timeout = timeout;

                let fdev = freq_to_frf(fdev) as u16;
                self.write_register(FskRegister::FdevMsb, (fdev >> 8) as u8).await?;
                self.write_register(FskRegister::FdevLsb, fdev as u8).await?;
                self.set_fsk_bitrate(bitrate).await?;
                self.set_fsk_packet_config().await
            }
            RadioModem::LoRa => {
                // SF5 is not available on this chip
                self.settings.lora.configure(
                    bandwidth,
                    datarate.clamp(6, 12),
                    coderate,
                    preamble_len,
                    fix_len,
                    crc_on,
                    freq_hop_on,
                    hop_period,
                    iq_inverted,
                )?;
                self.settings.lora.power = power;
                self.settings.lora.tx_timeout = timeout;
                self.set_lora_modem_config(None).await
            }
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        if payload.len() > BUFFER_SIZE {
            return Err(RadioError::PayloadSizeUnexpected(payload.len()));
        }
        let size = payload.len() as u8;

        let tx_timeout = match self.settings.modem {
            RadioModem::Fsk => {
                let handler = &mut self.settings.fsk_packet_handler;
                handler.nb_bytes = 0;
                handler.size = size;
                handler.chunk_size = if payload.len() <= FSK_FIFO_SIZE { size } else { FSK_CHUNK_SIZE };
                let chunk_size = handler.chunk_size;

                if self.settings.fsk.fix_len {
                    self.write_register(FskRegister::PayloadLength, size).await?;
                } else {
                    self.write_fifo(&[size]).await?;
                }

                // The remainder is streamed from data_buffer by the FIFO level interrupt
                self.data_buffer[..payload.len()].copy_from_slice(payload);
                self.write_fifo_from_buffer(0, chunk_size as usize).await?;
                self.settings.fsk_packet_handler.nb_bytes = chunk_size;
                self.settings.fsk.tx_timeout
            }
            RadioModem::LoRa => {
                self.set_lora_iq(false).await?;
                self.settings.lora.payload_len = size;
                self.write_register(LoRaRegister::PayloadLength, size).await?;

                self.write_register(LoRaRegister::FifoTxBaseAddr, 0x00).await?;
                self.write_register(LoRaRegister::FifoAddrPtr, 0x00).await?;

                // FIFO is only accessible outside of sleep mode
                let op_mode = self.read_register(Register::OpMode).await?;
                if op_mode & !OpMode::MASK == OpMode::Sleep.value() {
                    self.standby().await?;
                    self.delay.delay_ms(1).await;
                }
                self.write_fifo(payload).await?;
                self.settings.lora.tx_timeout
            }
        };

        self.transmit(tx_timeout).await
    }

    async fn receive(&mut self) -> Result<(), RadioError> {
        match self.settings.modem {
            RadioModem::Fsk => {
                // DIO0 = PayloadReady, DIO1 = FifoLevel, DIO2 = Timeout, DIO4 = PreambleDetect
                self.update_register(
                    Register::DioMapping1,
                    DIO0_MASK & DIO1_MASK & DIO2_MASK,
                    DIO0_00 | DIO1_00 | DIO2_10,
                )
                .await?;
                self.update_register(Register::DioMapping2, DIO4_MASK & MAP_MASK, DIO4_11 | MAP_PREAMBLEDETECT)
                    .await?;

                let fifo_thresh = self.read_register(FskRegister::FifoThresh).await?;
                self.settings.fsk_packet_handler.fifo_thresh = fifo_thresh & FIFO_THRESH_MASK;

                self.write_register(FskRegister::RxConfig, RX_CONFIG_AFCAUTO_AGCAUTO_TRIG_PREAMBLE)
                    .await?;
                let rx_timeout = if self.settings.fsk.rx_continuous {
                    0
                } else {
                    self.settings.fsk.rx_single_timeout.min(0xff) as u8
                };
                self.write_register(FskRegister::RxTimeout2, rx_timeout).await?;
            }
            RadioModem::LoRa => {
                self.set_lora_iq(true).await?;

                // Errata 2.3: receiver spurious reception of a LoRa signal
                if self.settings.lora.bandwidth == Bandwidth::_500KHz {
                    self.update_register(LoRaRegister::DetectOptimize, 0xff, DETECTION_OPTIMIZE_AUTOMATIC_IF_ON)
                        .await?;
                } else {
                    self.update_register(LoRaRegister::DetectOptimize, !DETECTION_OPTIMIZE_AUTOMATIC_IF_ON, 0x00)
                        .await?;
                    self.write_register(LoRaRegister::Test30, 0x00).await?;
                    self.write_register(LoRaRegister::Test2F, 0x40).await?;
                }

                if self.settings.lora.freq_hop_on {
                    self.write_register(LoRaRegister::IrqFlagsMask, IRQ_MASK_RX_HOPPING).await?;
                    // DIO0 = RxDone, DIO2 = FhssChangeChannel
                    self.update_register(Register::DioMapping1, DIO0_MASK & DIO2_MASK, DIO0_00 | DIO2_00)
                        .await?;
                } else {
                    self.write_register(LoRaRegister::IrqFlagsMask, IRQ_MASK_RX).await?;
                    self.update_register(Register::DioMapping1, DIO0_MASK, DIO0_00).await?;
                }
                self.write_register(LoRaRegister::FifoRxBaseAddr, 0x00).await?;
                self.write_register(LoRaRegister::FifoAddrPtr, 0x00).await?;
            }
        }

        self.settings.fsk_packet_handler.reset();
        self.settings.lora_packet_handler.reset();
        self.data_buffer.fill(0);
        self.settings.state = RadioState::RxRunning;

        let mode = match self.settings.modem {
            RadioModem::Fsk => OpMode::Receiver,
            RadioModem::LoRa if self.is_rx_continuous() => OpMode::Receiver,
            RadioModem::LoRa => OpMode::ReceiverSingle,
        };
        self.set_operation_mode(mode).await
    }

    async fn sleep(&mut self) -> Result<(), RadioError> {
        self.timer.disarm();
        self.set_operation_mode(OpMode::Sleep).await?;
        self.settings.state = RadioState::Idle;
        Ok(())
    }

    async fn standby(&mut self) -> Result<(), RadioError> {
        self.timer.disarm();
        self.set_operation_mode(OpMode::Standby).await?;
        self.settings.state = RadioState::Idle;
        Ok(())
    }

    async fn start_cad(&mut self) -> Result<(), RadioError> {
        if self.settings.modem != RadioModem::LoRa {
            warn!("CAD requested in FSK mode");
            return Ok(());
        }
        self.write_register(LoRaRegister::IrqFlagsMask, IRQ_MASK_CAD).await?;
        // DIO3 = CadDone
        self.update_register(Register::DioMapping1, DIO3_MASK, DIO3_00).await?;
        self.settings.state = RadioState::Cad;
        self.set_operation_mode(OpMode::Cad).await
    }

    async fn set_public_network(&mut self, enable: bool) -> Result<(), RadioError> {
        self.set_modem(RadioModem::LoRa).await?;
        self.settings.lora.public_network = enable;
        let syncword = if enable {
            LORA_MAC_PUBLIC_SYNCWORD
        } else {
            LORA_MAC_PRIVATE_SYNCWORD
        };
        self.write_register(LoRaRegister::SyncWord, syncword).await
    }

    async fn set_max_payload_length(&mut self, modem: RadioModem, max: u8) -> Result<(), RadioError> {
        self.set_modem(modem).await?;
        match modem {
            RadioModem::Fsk => {
                if !self.settings.fsk.fix_len {
                    self.write_register(FskRegister::PayloadLength, max).await?;
                }
                Ok(())
            }
            RadioModem::LoRa => self.write_register(LoRaRegister::PayloadMaxLength, max).await,
        }
    }

    async fn time_on_air(&mut self, modem: RadioModem, payload_len: u8) -> Result<u32, RadioError> {
        match modem {
            RadioModem::Fsk => {
                let sync_config = self.read_register(FskRegister::SyncConfig).await?;
                let packet_config1 = self.read_register(FskRegister::PacketConfig1).await?;
                let syncword_len = (sync_config & SYNC_CONFIG_SIZE_MASK) + 1;
                let address_filtering = packet_config1 & PACKET_CONFIG1_ADDRESS_FILTERING != 0;
                Ok(fsk_time_on_air(
                    &self.settings.fsk,
                    syncword_len,
                    address_filtering,
                    payload_len,
                ))
            }
            RadioModem::LoRa => Ok(lora_time_on_air(&self.settings.lora, payload_len)),
        }
    }

    async fn random(&mut self) -> Result<u32, RadioError> {
        self.set_modem(RadioModem::LoRa).await?;
        // Disable LoRa modem interrupts
        self.write_register(LoRaRegister::IrqFlagsMask, IRQ_MASK_ALL).await?;
        self.set_operation_mode(OpMode::Receiver).await?;

        let mut rnd = 0u32;
        for i in 0..32 {
            self.delay.delay_ms(1).await;
            // Unfiltered RSSI value reading, only the LSB is used
            let wideband = self.read_register(LoRaRegister::RssiWideband).await?;
            rnd |= ((wideband & 0x01) as u32) << i;
        }

        self.sleep().await?;
        Ok(rnd)
    }

    async fn perform_carrier_sense(
        &mut self,
        modem: RadioModem,
        frequency_in_hz: u32,
        rssi_threshold: i16,
        max_carrier_sense_time_ms: u32,
    ) -> Result<bool, RadioError> {
        self.set_modem(modem).await?;
        self.set_channel(frequency_in_hz).await?;
        self.set_operation_mode(OpMode::Receiver).await?;
        // Receiver turn-around
        self.delay.delay_ms(1).await;

        let mut clear = true;
        let start = self.timer.now_ms();
        while self.timer.now_ms().saturating_sub(start) < max_carrier_sense_time_ms as u64 {
            let rssi = self.get_rssi(modem).await?;
            if rssi > rssi_threshold {
                debug!("channel busy, rssi = {}", rssi);
                clear = false;
                break;
            }
        }

        self.sleep().await?;
        Ok(clear)
    }

    fn check_rf_frequency(&self, frequency_in_hz: u32) -> bool {
        (RF_FREQUENCY_MIN..=RF_FREQUENCY_MAX).contains(&frequency_in_hz)
    }

    async fn set_tx_continuous_wave(&mut self, frequency_in_hz: u32, power: i8, time_s: u16) -> Result<(), RadioError> {
        self.set_channel(frequency_in_hz).await?;
        self.set_tx_config(
            RadioModem::Fsk,
            power,
            0,
            0,
            4800,
            0,
            5,
            false,
            false,
            false,
            0,
            false,
            0,
        )
        .await?;

        // Continuous mode, all DIO interrupts routed away
        self.update_register(FskRegister::PacketConfig2, PACKET_CONFIG2_DATA_MODE_MASK, 0x00)
            .await?;
        self.write_register(Register::DioMapping1, DIO0_11 | DIO1_11).await?;
        self.write_register(Register::DioMapping2, DIO4_10 | DIO5_10).await?;

        self.settings.state = RadioState::TxRunning;
        self.timer.arm(time_s as u32 * 1000);
        self.set_operation_mode(OpMode::Transmitter).await
    }

    fn get_status(&self) -> RadioState {
        self.settings.state
    }

    async fn process_signal(&mut self, signal: IrqSignal) -> Result<(), RadioError> {
        match signal {
            IrqSignal::Dio0 => self.on_dio0().await,
            IrqSignal::Dio1 => self.on_dio1().await,
            IrqSignal::Dio2 => self.on_dio2().await,
            IrqSignal::Dio3 => self.on_dio3().await,
            IrqSignal::Dio4 => self.on_dio4(),
            IrqSignal::Dio5 => Ok(()),
            IrqSignal::Timeout => self.on_timeout().await,
        }
    }
}
