mod irq;
mod radio_kind_params;
#[cfg(test)]
mod test;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;
use radio_kind_params::*;
pub use radio_kind_params::TcxoCtrlVoltage;

use crate::interface::SpiInterface;
use crate::mod_params::*;
use crate::mod_traits::{InterfaceVariant, LoRaRadio, RadioEvents, Timer};
use crate::settings::*;

// Internal frequency of the radio
const XTAL_FREQ: u32 = 32_000_000;

// Scaling factor used to perform fixed-point operations
const PLL_STEP_SHIFT_AMOUNT: u32 = 14;

// PLL step - scaled with PLL_STEP_SHIFT_AMOUNT
const PLL_STEP_SCALED: u32 = XTAL_FREQ >> (25 - PLL_STEP_SHIFT_AMOUNT);

// Synthesizer range of the SUBGHZ radio
const RF_FREQUENCY_MIN: u32 = 150_000_000;
const RF_FREQUENCY_MAX: u32 = 960_000_000;

// Maximum value for parameter symbNum
const MAX_LORA_SYMB_NUM_TIMEOUT: u8 = 248;

// Time required for the TCXO to wakeup [ms]
const TCXO_WAKEUP_TIME: u32 = 10;

// Registers kept across warm start sleep
const MAX_NUMBER_REGS_IN_RETENTION: u8 = 4;

const RX_CONTINUOUS_TIMEOUT: u32 = 0xFF_FFFF;

// Over current protection limits, 2.5 mA steps
const OCP_LOW_POWER: u8 = 0x18;
const OCP_HIGH_POWER: u8 = 0x38;

const RX_GAIN_BOOSTED: u8 = 0x96;
const RX_GAIN_POWER_SAVING: u8 = 0x94;

const BUFFER_SIZE: usize = 255;

/// Power amplifier outputs routed to the antenna by the board
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaOutput {
    /// RFO_LP only, -17..=15 dBm
    LowPower,
    /// RFO_HP only, -9..=22 dBm
    HighPower,
    /// Both, RFO_HP is selected for powers above 15 dBm
    Both,
}

/// Configuration for STM32WL-based boards
pub struct Config {
    /// TCXO supply voltage, if the board clocks the radio from a TCXO driven by PB0-VDDTCXO
    pub tcxo_ctrl: Option<TcxoCtrlVoltage>,
    /// Whether the SMPS (DC-DC) regulator is fitted and should be used instead of the LDO
    pub use_dcdc: bool,
    /// Whether to boost receive sensitivity at the cost of ~2 mA
    pub rx_boost: bool,
    /// Power amplifier outputs available on the board
    pub pa_output: PaOutput,
}

/// Interrupt driven driver for the STM32WL SUBGHZ radio.
///
/// The SUBGHZ peripheral is reached through an `SpiDevice` over the internal SUBGHZSPI
/// bus; every radio interrupt arrives on the single radio IRQ line and is fed to
/// [`LoRaRadio::process_signal`] as [`IrqSignal::Dio1`].
pub struct Stm32wl<SPI, IV, TMR, DLY, EV> {
    intf: SpiInterface<SPI, IV>,
    config: Config,
    timer: TMR,
    delay: DLY,
    events: Option<EV>,
    settings: RadioSettings,
    data_buffer: [u8; BUFFER_SIZE],
    image_calibrated: bool,
    asleep: bool,
    tx_high_power: bool,
    // FSK single reception timeout
    rx_timeout_ms: u32,
}

impl<SPI, IV, TMR, DLY, EV> Stm32wl<SPI, IV, TMR, DLY, EV>
where
    SPI: SpiDevice<u8>,
    IV: InterfaceVariant,
    TMR: Timer,
    DLY: DelayNs,
    EV: RadioEvents,
{
    /// Create a driver instance. The radio is left untouched until [`LoRaRadio::init_radio`].
    pub fn new(spi: SPI, iv: IV, timer: TMR, delay: DLY, config: Config) -> Self {
        Self {
            intf: SpiInterface::new(spi, iv),
            config,
            timer,
            delay,
            events: None,
            settings: RadioSettings::default(),
            data_buffer: [0; BUFFER_SIZE],
            image_calibrated: false,
            asleep: false,
            tx_high_power: false,
            rx_timeout_ms: 0,
        }
    }

    /// Current configuration and per-reception bookkeeping
    pub fn settings(&self) -> &RadioSettings {
        &self.settings
    }

    // Any transfer wakes the radio from sleep, GetStatus is the harmless one
    async fn ensure_awake(&mut self) -> Result<(), RadioError> {
        if self.asleep {
            self.intf.write(&[OpCode::GetStatus.value(), 0x00], false).await?;
            self.asleep = false;
        }
        Ok(())
    }

    async fn write_command(&mut self, command: &[u8]) -> Result<(), RadioError> {
        self.ensure_awake().await?;
        self.intf.write(command, false).await
    }

    // Run a get command, failing on an error status
    async fn read_command(&mut self, op_code: OpCode, read_buffer: &mut [u8]) -> Result<(), RadioError> {
        self.ensure_awake().await?;
        let status = self.intf.read_with_status(&[op_code.value()], read_buffer).await?;
        if OpStatusErrorMask::is_error(status) {
            return Err(RadioError::OpError(status));
        }
        Ok(())
    }

    async fn write_register(&mut self, register: Register, value: &[u8]) -> Result<(), RadioError> {
        self.ensure_awake().await?;
        let op_code_and_addr = [OpCode::WriteRegister.value(), register.addr1(), register.addr2()];
        self.intf.write_with_payload(&op_code_and_addr, value, false).await
    }

    async fn read_registers(&mut self, register: Register, read_buffer: &mut [u8]) -> Result<(), RadioError> {
        self.ensure_awake().await?;
        self.intf
            .read(
                &[
                    OpCode::ReadRegister.value(),
                    register.addr1(),
                    register.addr2(),
                    0x00u8,
                ],
                read_buffer,
            )
            .await
    }

    async fn read_register(&mut self, register: Register) -> Result<u8, RadioError> {
        let mut value = [0x00u8];
        self.read_registers(register, &mut value).await?;
        Ok(value[0])
    }

    async fn add_register_to_retention_list(&mut self, register: Register) -> Result<(), RadioError> {
        let mut buffer = [0x00u8; (1 + (2 * MAX_NUMBER_REGS_IN_RETENTION)) as usize];

        // Read the address and registers already added to the list
        self.read_registers(Register::RetentionList, &mut buffer).await?;

        let number_of_registers = buffer[0];
        for i in 0..number_of_registers {
            if register.addr1() == buffer[(1 + (2 * i)) as usize] && register.addr2() == buffer[(2 + (2 * i)) as usize]
            {
                return Ok(()); // register already in list
            }
        }

        if number_of_registers < MAX_NUMBER_REGS_IN_RETENTION {
            buffer[0] += 1;
            buffer[(1 + (2 * number_of_registers)) as usize] = register.addr1();
            buffer[(2 + (2 * number_of_registers)) as usize] = register.addr2();
            self.write_register(Register::RetentionList, &buffer).await
        } else {
            warn!("retention list full");
            Ok(())
        }
    }

    async fn update_retention_list(&mut self) -> Result<(), RadioError> {
        self.add_register_to_retention_list(Register::RxGain).await?;
        self.add_register_to_retention_list(Register::TxModulation).await
    }

    // Set the number of symbols the radio will wait to detect a reception
    async fn set_lora_symbol_num_timeout(&mut self, symbol_num: u16) -> Result<(), RadioError> {
        let mut exp = 0u8;
        let mut mant = ((symbol_num.min(MAX_LORA_SYMB_NUM_TIMEOUT.into()) + 1) >> 1) as u8;
        while mant > 31 {
            mant = (mant + 3) >> 2;
            exp += 1;
        }
        let val: u8 = mant << ((2 * exp) + 1);
        self.write_command(&[OpCode::SetLoRaSymbTimeout.value(), val]).await?;

        if symbol_num > 0 {
            let val = exp + (mant << 3);
            self.write_register(Register::SynchTimeout, &[val]).await?;
        }
        Ok(())
    }

    async fn set_pa_config(&mut self, pa_duty_cycle: u8, hp_max: u8, device_sel: DeviceSel) -> Result<(), RadioError> {
        const PA_LUT_RESERVED: u8 = 0x01;
        let op_code_and_pa_config = [
            OpCode::SetPAConfig.value(),
            pa_duty_cycle,
            hp_max,
            device_sel as u8,
            PA_LUT_RESERVED,
        ];
        self.write_command(&op_code_and_pa_config).await
    }

    fn timeout_1(timeout: u32) -> u8 {
        ((timeout >> 16) & 0xFF) as u8
    }
    fn timeout_2(timeout: u32) -> u8 {
        ((timeout >> 8) & 0xFF) as u8
    }
    fn timeout_3(timeout: u32) -> u8 {
        (timeout & 0xFF) as u8
    }

    // Milliseconds to 15.625 us RTC steps, saturating at the 24 bit field
    fn timeout_steps(timeout_ms: u32) -> u32 {
        (timeout_ms.saturating_mul(64)).min(RX_CONTINUOUS_TIMEOUT - 1)
    }

    fn convert_freq_in_hz_to_pll_step(freq_in_hz: u32) -> u32 {
        // Get integer and fractional parts of the frequency computed with a PLL step scaled value
        let steps_int = freq_in_hz / PLL_STEP_SCALED;
        let steps_frac = freq_in_hz - (steps_int * PLL_STEP_SCALED);

        (steps_int << PLL_STEP_SHIFT_AMOUNT)
            + (((steps_frac << PLL_STEP_SHIFT_AMOUNT) + (PLL_STEP_SCALED >> 1)) / PLL_STEP_SCALED)
    }

    // Power-on configuration, also used to recover from a transmission timeout
    async fn configure_radio(&mut self) -> Result<(), RadioError> {
        self.asleep = false;
        self.image_calibrated = false;
        self.write_command(&[OpCode::SetStandby.value(), StandbyMode::RC.value()])
            .await?;

        // DC-DC regulator setup (default is LDO)
        if self.config.use_dcdc {
            self.write_command(&[OpCode::SetRegulatorMode.value(), RegulatorMode::UseDCDC.value()])
                .await?;
        }

        if let Some(voltage) = self.config.tcxo_ctrl {
            // XOSC_START_ERR is raised at power on until the radio learns it runs from a TCXO
            let mut device_errors = [0u8; 2];
            self.intf
                .read_with_status(&[OpCode::ClearDeviceErrors.value()], &mut device_errors)
                .await?;

            // Each unit is 15.625uS (which is 1/64th ms)
            let timeout = TCXO_WAKEUP_TIME << 6;
            self.write_command(&[
                OpCode::SetTCXOMode.value(),
                voltage.value() & 0x07,
                Self::timeout_1(timeout),
                Self::timeout_2(timeout),
                Self::timeout_3(timeout),
            ])
            .await?;
            // Re-run calibration now that the radio knows that it's running from TCXO
            self.write_command(&[OpCode::Calibrate.value(), 0b0111_1111]).await?;
        }

        self.write_command(&[OpCode::SetBufferBaseAddress.value(), 0x00, 0x00])
            .await?;
        self.set_irq_params(IrqMask::None.value()).await?;
        self.set_modem(RadioModem::Fsk).await?;
        // Update register list to support warm starts from sleep mode
        self.update_retention_list().await
    }

    // Route `irq_mask` to the radio IRQ line (DIO1 in the SX126x register map)
    async fn set_irq_params(&mut self, irq_mask: u16) -> Result<(), RadioError> {
        let irq = irq_mask.to_be_bytes();
        self.write_command(&[
            OpCode::CfgDIOIrq.value(),
            irq[0],
            irq[1],
            irq[0],
            irq[1],
            0x00,
            0x00,
            0x00,
            0x00,
        ])
        .await
    }

    // The packet type resets the LoRa syncword, so it is only issued on an actual change
    async fn set_modem(&mut self, modem: RadioModem) -> Result<(), RadioError> {
        let mut packet_type = [0x00u8];
        self.read_command(OpCode::GetPacketType, &mut packet_type).await?;
        self.settings.modem = modem;

        let target = PacketType::from(modem);
        if packet_type[0] == target.value() {
            return Ok(());
        }
        debug!("packet type {:02x} -> {}", packet_type[0], modem);
        self.write_command(&[OpCode::SetPacketType.value(), target.value()])
            .await?;
        if target == PacketType::LoRa {
            self.write_lora_syncword().await?;
        }
        Ok(())
    }

    async fn write_lora_syncword(&mut self) -> Result<(), RadioError> {
        let word = if self.settings.lora.public_network {
            LORA_MAC_PUBLIC_SYNCWORD
        } else {
            LORA_MAC_PRIVATE_SYNCWORD
        };
        self.write_register(Register::LoRaSyncword, &word.to_be_bytes()).await
    }

    // Calibrate the image rejection based on the given frequency
    async fn calibrate_image(&mut self, frequency_in_hz: u32) -> Result<(), RadioError> {
        let cal_freq = image_calibration_band(frequency_in_hz);
        self.write_command(&[OpCode::CalibrateImage.value(), cal_freq[0], cal_freq[1]])
            .await
    }

    async fn set_rf_tx_power(&mut self, power: i8) -> Result<(), RadioError> {
        let high_power = match self.config.pa_output {
            PaOutput::LowPower => false,
            PaOutput::HighPower => true,
            PaOutput::Both => power > 15,
        };

        let tx_params_power = if high_power {
            // Clamp power between [-9, 22] dBm
            let txp = power.clamp(-9, 22);
            self.set_pa_config(0x04, 0x07, DeviceSel::HighPowerPA).await?;
            self.write_register(Register::OCP, &[OCP_HIGH_POWER]).await?;
            txp
        } else {
            // Clamp power between [-17, 15] dBm
            let txp = power.clamp(-17, 15);
            if txp == 15 {
                self.set_pa_config(0x06, 0x00, DeviceSel::LowPowerPA).await?;
            } else {
                self.set_pa_config(0x04, 0x00, DeviceSel::LowPowerPA).await?;
            }
            self.write_register(Register::OCP, &[OCP_LOW_POWER]).await?;
            txp.min(14)
        };
        debug!("tx power {} dBm, high power PA = {}", power, high_power);
        self.tx_high_power = high_power;

        self.write_command(&[
            OpCode::SetTxParams.value(),
            tx_params_power as u8,
            RampTime::Ramp40Us.value(),
        ])
        .await
    }

    // Validate an FSK bandwidth/datarate pair, returning the bandwidth register value
    fn fsk_bandwidth_reg(bandwidth: u32, datarate: u32) -> Result<u8, RadioError> {
        if datarate == 0 {
            return Err(ConfigError::Datarate(datarate).into());
        }
        // The table holds double sided bandwidths
        fsk_bandwidth_reg_value(&FSK_BANDWIDTHS, bandwidth.saturating_mul(2))
            .map_err(|_| RadioError::from(ConfigError::FskBandwidth(bandwidth)))
    }

    async fn set_fsk_modulation_params(&mut self, bandwidth_reg: u8) -> Result<(), RadioError> {
        let fsk = self.settings.fsk;
        let br = ((32 * XTAL_FREQ as u64) / fsk.datarate as u64) as u32;
        let fdev = Self::convert_freq_in_hz_to_pll_step(fsk.fdev);
        self.write_command(&[
            OpCode::SetModulationParams.value(),
            Self::timeout_1(br),
            Self::timeout_2(br),
            Self::timeout_3(br),
            GFSK_PULSE_SHAPE_BT_1,
            bandwidth_reg,
            Self::timeout_1(fdev),
            Self::timeout_2(fdev),
            Self::timeout_3(fdev),
        ])
        .await
    }

    async fn set_fsk_packet_params(&mut self) -> Result<(), RadioError> {
        let fsk = self.settings.fsk;
        let preamble_bits = (fsk.preamble_len as u32 * 8).min(u16::MAX as u32) as u16;
        let header_type = if fsk.fix_len {
            GFSK_HEADER_FIXED
        } else {
            GFSK_HEADER_VARIABLE
        };
        let crc_type = if fsk.crc_on { GFSK_CRC_2_BYTES_INV } else { GFSK_CRC_OFF };
        self.write_command(&[
            OpCode::SetPacketParams.value(),
            (preamble_bits >> 8) as u8,
            preamble_bits as u8,
            GFSK_PREAMBLE_DETECTOR_08_BITS,
            (GFSK_SYNCWORD.len() * 8) as u8,
            GFSK_ADDRESS_FILTERING_OFF,
            header_type,
            fsk.payload_len,
            crc_type,
            GFSK_WHITENING_ON,
        ])
        .await
    }

    async fn set_fsk_registers(&mut self) -> Result<(), RadioError> {
        self.write_register(Register::Syncword, &GFSK_SYNCWORD).await?;
        self.write_register(Register::CrcSeed, &GFSK_CRC_CCITT_SEED.to_be_bytes())
            .await?;
        self.write_register(Register::CrcPolynomial, &GFSK_CRC_CCITT_POLYNOMIAL.to_be_bytes())
            .await?;
        self.write_register(Register::WhiteningSeed, &GFSK_WHITENING_SEED.to_be_bytes())
            .await
    }

    async fn set_lora_modulation_params(&mut self) -> Result<(), RadioError> {
        let lora = self.settings.lora;
        debug!(
            "sf = {}, bw = {}, cr = {}",
            lora.datarate, lora.bandwidth, lora.coderate
        );
        self.write_command(&[
            OpCode::SetModulationParams.value(),
            lora.datarate.factor(),
            bandwidth_value(lora.bandwidth),
            lora.coderate.value(),
            lora.low_datarate_optimize as u8,
        ])
        .await?;

        // Handle modulation quality with the 500 kHz LoRa bandwidth (see DS_SX1261-2_V1.2 datasheet chapter 15.1)
        let tx_mod = self.read_register(Register::TxModulation).await?;
        let tx_mod = if lora.bandwidth == Bandwidth::_500KHz {
            tx_mod & !(1 << 2)
        } else {
            tx_mod | (1 << 2)
        };
        self.write_register(Register::TxModulation, &[tx_mod]).await
    }

    async fn set_lora_packet_params(&mut self) -> Result<(), RadioError> {
        let lora = self.settings.lora;
        let mut preamble_length = lora.preamble_len;
        if matches!(lora.datarate, SpreadingFactor::_5 | SpreadingFactor::_6) && preamble_length < 12 {
            preamble_length = 12;
        }
        self.write_command(&[
            OpCode::SetPacketParams.value(),
            (preamble_length >> 8) as u8,
            preamble_length as u8,
            lora.fix_len as u8,
            lora.payload_len,
            lora.crc_on as u8,
            lora.iq_inverted as u8,
        ])
        .await?;

        // Optimize Inverted IQ Operation, otherwise packet loss with longer packets might occur.
        let iq_polarity = self.read_register(Register::IQPolarity).await?;
        let iq_polarity = if lora.iq_inverted {
            iq_polarity & !(1 << 2)
        } else {
            iq_polarity | (1 << 2)
        };
        self.write_register(Register::IQPolarity, &[iq_polarity]).await
    }

    async fn set_packet_params(&mut self) -> Result<(), RadioError> {
        match self.settings.modem {
            RadioModem::Fsk => self.set_fsk_packet_params().await,
            RadioModem::LoRa => self.set_lora_packet_params().await,
        }
    }

    async fn set_rx_gain(&mut self) -> Result<(), RadioError> {
        // if Rx boosted, set max LNA gain, increase current by ~2mA for around ~3dB in sensitivity
        let rx_gain = if self.config.rx_boost {
            RX_GAIN_BOOSTED
        } else {
            RX_GAIN_POWER_SAVING
        };
        self.write_register(Register::RxGain, &[rx_gain]).await
    }

    async fn set_rx(&mut self, timeout: u32) -> Result<(), RadioError> {
        self.write_command(&[
            OpCode::SetRx.value(),
            Self::timeout_1(timeout),
            Self::timeout_2(timeout),
            Self::timeout_3(timeout),
        ])
        .await
    }

    async fn get_rssi(&mut self) -> Result<i16, RadioError> {
        let mut rssi = [0x00u8];
        self.read_command(OpCode::GetRSSIInst, &mut rssi).await?;
        Ok(-((rssi[0] >> 1) as i16))
    }

    fn is_rx_continuous(&self) -> bool {
        match self.settings.modem {
            RadioModem::Fsk => self.settings.fsk.rx_continuous,
            RadioModem::LoRa => self.settings.lora.rx_continuous,
        }
    }
}

impl<SPI, IV, TMR, DLY, EV> LoRaRadio for Stm32wl<SPI, IV, TMR, DLY, EV>
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
        self.configure_radio().await?;
        self.settings.state = RadioState::Idle;
        Ok(())
    }

    async fn radio_reset(&mut self) -> Result<(), RadioError> {
        self.intf.iv.reset(&mut self.delay).await
    }

    async fn set_channel(&mut self, frequency_in_hz: u32) -> Result<(), RadioError> {
        debug!("channel = {}", frequency_in_hz);
        if !self.image_calibrated {
            self.calibrate_image(frequency_in_hz).await?;
            self.image_calibrated = true;
        }
        self.settings.channel = frequency_in_hz;
        let freq_in_pll_steps = Self::convert_freq_in_hz_to_pll_step(frequency_in_hz);
        let steps = freq_in_pll_steps.to_be_bytes();
        self.write_command(&[OpCode::SetRFFrequency.value(), steps[0], steps[1], steps[2], steps[3]])
            .await
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
        let max_payload_len = if fix_len { payload_len } else { 0xFF };

        match modem {
            RadioModem::Fsk => {
                let bandwidth_reg = Self::fsk_bandwidth_reg(bandwidth, datarate)?;
                let fsk = &mut self.settings.fsk;
                fsk.bandwidth = bandwidth;
                fsk.datarate = datarate;
                fsk.bandwidth_afc = bandwidth_afc;
                fsk.preamble_len = preamble_len;
                fsk.fix_len = fix_len;
                fsk.payload_len = max_payload_len;
                fsk.crc_on = crc_on;
                fsk.iq_inverted = iq_inverted;
                fsk.rx_continuous = rx_continuous;
                // symb_timeout is in bytes
                self.rx_timeout_ms = if rx_continuous {
                    0
                } else {
                    (symb_timeout as u64 * 8 * 1000 / datarate as u64) as u32
                };

                self.write_command(&[OpCode::SetStopRxTimerOnPreamble.value(), 0x00])
                    .await?;
                self.set_fsk_modulation_params(bandwidth_reg).await?;
                self.set_fsk_packet_params().await?;
                self.set_fsk_registers().await
            }
            RadioModem::LoRa => {
                self.settings.lora.configure(
                    bandwidth,
                    datarate,
                    coderate,
                    preamble_len,
                    fix_len,
                    crc_on,
                    freq_hop_on,
                    hop_period,
                    iq_inverted,
                )?;
                self.settings.lora.payload_len = max_payload_len;
                self.settings.lora.rx_continuous = rx_continuous;

                self.write_command(&[OpCode::SetStopRxTimerOnPreamble.value(), 0x00])
                    .await?;
                let symb_timeout = if rx_continuous { 0 } else { symb_timeout };
                self.set_lora_symbol_num_timeout(symb_timeout).await?;
                self.set_lora_modulation_params().await?;
                self.set_lora_packet_params().await
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

        match modem {
            RadioModem::Fsk => {
                let bandwidth_reg = Self::fsk_bandwidth_reg(bandwidth, datarate)?;
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

                self.set_fsk_modulation_params(bandwidth_reg).await?;
                self.set_fsk_packet_params().await?;
                self.set_fsk_registers().await?;
            }
            RadioModem::LoRa => {
                self.settings.lora.configure(
                    bandwidth,
                    datarate,
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

                self.set_lora_modulation_params().await?;
                self.set_lora_packet_params().await?;
            }
        }
        self.set_rf_tx_power(power).await
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        if payload.len() > BUFFER_SIZE {
            return Err(RadioError::PayloadSizeUnexpected(payload.len()));
        }
        let size = payload.len() as u8;

        let tx_timeout = match self.settings.modem {
            RadioModem::Fsk => {
                self.settings.fsk.payload_len = size;
                self.settings.fsk.tx_timeout
            }
            RadioModem::LoRa => {
                self.settings.lora.payload_len = size;
                self.settings.lora.tx_timeout
            }
        };
        self.set_packet_params().await?;

        self.ensure_awake().await?;
        self.intf
            .write_with_payload(&[OpCode::WriteBuffer.value(), 0x00], payload, false)
            .await?;
        self.set_irq_params(IrqMask::TxDone.value() | IrqMask::RxTxTimeout.value())
            .await?;

        self.settings.state = RadioState::TxRunning;
        self.intf.iv.enable_rf_switch_tx(self.tx_high_power).await?;
        self.timer.arm(tx_timeout);

        let timeout = Self::timeout_steps(tx_timeout);
        self.write_command(&[
            OpCode::SetTx.value(),
            Self::timeout_1(timeout),
            Self::timeout_2(timeout),
            Self::timeout_3(timeout),
        ])
        .await
    }

    async fn receive(&mut self) -> Result<(), RadioError> {
        self.set_irq_params(IrqMask::All.value()).await?;
        self.set_rx_gain().await?;

        self.settings.fsk_packet_handler.reset();
        self.settings.lora_packet_handler.reset();
        self.data_buffer.fill(0);
        self.settings.state = RadioState::RxRunning;
        self.intf.iv.enable_rf_switch_rx().await?;

        let timeout = match self.settings.modem {
            _ if self.is_rx_continuous() => RX_CONTINUOUS_TIMEOUT,
            RadioModem::Fsk => Self::timeout_steps(self.rx_timeout_ms),
            // Single LoRa reception ends on the symbol timeout
            RadioModem::LoRa => 0,
        };
        self.set_rx(timeout).await
    }

    async fn sleep(&mut self) -> Result<(), RadioError> {
        self.timer.disarm();
        self.intf.iv.disable_rf_switch().await?;
        let sleep_params = SleepParams {
            wakeup_rtc: false,
            reset: false,
            warm_start: true,
        };
        self.ensure_awake().await?;
        self.intf
            .write(&[OpCode::SetSleep.value(), sleep_params.value()], true)
            .await?;
        self.delay.delay_ms(2).await;
        self.asleep = true;
        self.settings.state = RadioState::Idle;
        Ok(())
    }

    async fn standby(&mut self) -> Result<(), RadioError> {
        self.timer.disarm();
        self.write_command(&[OpCode::SetStandby.value(), StandbyMode::RC.value()])
            .await?;
        self.intf.iv.disable_rf_switch().await?;
        self.settings.state = RadioState::Idle;
        Ok(())
    }

    async fn start_cad(&mut self) -> Result<(), RadioError> {
        if self.settings.modem != RadioModem::LoRa {
            warn!("CAD requested in FSK mode");
            return Ok(());
        }
        self.set_rx_gain().await?;
        self.set_irq_params(IrqMask::CADDone.value() | IrqMask::CADActivityDetected.value())
            .await?;

        // See:
        //  https://lora-developers.semtech.com/documentation/tech-papers-and-guides/channel-activity-detection-ensuring-your-lora-packets-are-sent/how-to-ensure-your-lora-packets-are-sent-properly
        // for default values used here.
        let spreading_factor_val = self.settings.lora.datarate.factor();
        self.write_command(&[
            OpCode::SetCADParams.value(),
            CADSymbols::_8.value(),      // number of symbols for detection
            spreading_factor_val + 13u8, // limit for detection of SNR peak
            10u8,                        // minimum symbol recognition
            0x00u8,                      // CAD exit mode without listen-before-send or subsequent receive processing
            0x00u8,                      // no timeout
            0x00u8,
            0x00u8,
        ])
        .await?;

        self.settings.state = RadioState::Cad;
        self.intf.iv.enable_rf_switch_rx().await?;
        self.write_command(&[OpCode::SetCAD.value()]).await
    }

    async fn set_public_network(&mut self, enable: bool) -> Result<(), RadioError> {
        self.settings.lora.public_network = enable;
        self.set_modem(RadioModem::LoRa).await?;
        self.write_lora_syncword().await
    }

    async fn set_max_payload_length(&mut self, modem: RadioModem, max: u8) -> Result<(), RadioError> {
        self.set_modem(modem).await?;
        match modem {
            RadioModem::Fsk => {
                if self.settings.fsk.fix_len {
                    return Ok(());
                }
                self.settings.fsk.payload_len = max;
            }
            RadioModem::LoRa => self.settings.lora.payload_len = max,
        }
        self.set_packet_params().await
    }

    async fn time_on_air(&mut self, modem: RadioModem, payload_len: u8) -> Result<u32, RadioError> {
        match modem {
            RadioModem::Fsk => Ok(fsk_time_on_air(
                &self.settings.fsk,
                GFSK_SYNCWORD.len() as u8,
                false,
                payload_len,
            )),
            RadioModem::LoRa => Ok(lora_time_on_air(&self.settings.lora, payload_len)),
        }
    }

    async fn random(&mut self) -> Result<u32, RadioError> {
        self.set_irq_params(IrqMask::None.value()).await?;

        // The random number generator samples the receiver noise with the LNA and mixer off
        let ana_lna = self.read_register(Register::AnaLNA).await?;
        self.write_register(Register::AnaLNA, &[ana_lna & !(1 << 0)]).await?;
        let ana_mixer = self.read_register(Register::AnaMixer).await?;
        self.write_register(Register::AnaMixer, &[ana_mixer & !(1 << 7)]).await?;

        self.set_rx(RX_CONTINUOUS_TIMEOUT).await?;
        let mut number = [0x00u8; 4];
        self.read_registers(Register::GeneratedRandomNumber, &mut number).await?;

        self.write_command(&[OpCode::SetStandby.value(), StandbyMode::RC.value()])
            .await?;
        self.write_register(Register::AnaLNA, &[ana_lna]).await?;
        self.write_register(Register::AnaMixer, &[ana_mixer]).await?;

        self.sleep().await?;
        Ok(u32::from_be_bytes(number))
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
        self.set_irq_params(IrqMask::None.value()).await?;
        self.intf.iv.enable_rf_switch_rx().await?;
        self.set_rx(RX_CONTINUOUS_TIMEOUT).await?;
        // Receiver turn-around
        self.delay.delay_ms(1).await;

        let mut clear = true;
        let start = self.timer.now_ms();
        while self.timer.now_ms().saturating_sub(start) < max_carrier_sense_time_ms as u64 {
            let rssi = self.get_rssi().await?;
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
        self.set_rf_tx_power(power).await?;
        self.set_irq_params(IrqMask::None.value()).await?;

        self.settings.state = RadioState::TxRunning;
        self.intf.iv.enable_rf_switch_tx(self.tx_high_power).await?;
        self.timer.arm(time_s as u32 * 1000);
        self.write_command(&[OpCode::SetTxContinuousWave.value()]).await
    }

    fn get_status(&self) -> RadioState {
        self.settings.state
    }

    async fn process_signal(&mut self, signal: IrqSignal) -> Result<(), RadioError> {
        match signal {
            IrqSignal::Dio1 => self.on_irq().await,
            IrqSignal::Timeout => self.on_timeout().await,
            _ => Ok(()),
        }
    }
}
