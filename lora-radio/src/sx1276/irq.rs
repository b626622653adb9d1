use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;

use super::radio_kind_params::*;
use super::{Sx1276, XTAL_FREQ};
use crate::mod_params::*;
use crate::mod_traits::{InterfaceVariant, LoRaRadio, RadioEvents, Timer};

// Interrupt handlers, run from process_signal in the dispatch context
impl<SPI, IV, TMR, DLY, EV> Sx1276<SPI, IV, TMR, DLY, EV>
where
    SPI: SpiDevice<u8>,
    IV: InterfaceVariant,
    TMR: Timer,
    DLY: DelayNs,
    EV: RadioEvents,
{
    fn emit(&mut self, f: impl FnOnce(&mut EV)) {
        if let Some(events) = self.events.as_mut() {
            f(events);
        }
    }

    // Single reception ends in Idle, continuous FSK reception restarts the receiver
    async fn end_fsk_reception(&mut self) -> Result<(), RadioError> {
        if self.is_rx_continuous() {
            self.update_register(FskRegister::RxConfig, 0xff, RX_CONFIG_RESTART_RX_WITHOUT_PLL_LOCK)
                .await
        } else {
            self.settings.state = RadioState::Idle;
            Ok(())
        }
    }

    async fn clear_fsk_rx_irqs(&mut self) -> Result<(), RadioError> {
        self.write_register(
            FskRegister::IrqFlags1,
            FSK_IRQ1_RSSI | FSK_IRQ1_PREAMBLEDETECT | FSK_IRQ1_SYNCADDRESSMATCH,
        )
        .await?;
        self.write_register(FskRegister::IrqFlags2, FSK_IRQ2_FIFOOVERRUN).await
    }

    // The first FIFO access of an FSK reception learns the expected packet size
    async fn fsk_read_size(&mut self) -> Result<(), RadioError> {
        let handler = self.settings.fsk_packet_handler;
        if handler.size != 0 || handler.nb_bytes != 0 {
            return Ok(());
        }
        let size = if self.settings.fsk.fix_len {
            self.read_register(FskRegister::PayloadLength).await?
        } else {
            let mut size = [0u8];
            self.intf.read(&[Register::Fifo.read_addr()], &mut size).await?;
            size[0]
        };
        self.settings.fsk_packet_handler.size = size;
        Ok(())
    }

    // Drain up to `max` bytes of the pending packet from the FIFO
    async fn fsk_drain(&mut self, max: u8) -> Result<(), RadioError> {
        let handler = self.settings.fsk_packet_handler;
        let remaining = handler.size.saturating_sub(handler.nb_bytes).min(max);
        let start = handler.nb_bytes as usize;
        self.read_fifo_into_buffer(start, start + remaining as usize).await?;
        self.settings.fsk_packet_handler.nb_bytes += remaining;
        Ok(())
    }

    pub(super) async fn on_dio0(&mut self) -> Result<(), RadioError> {
        match (self.settings.state, self.settings.modem) {
            (RadioState::RxRunning, RadioModem::Fsk) => self.on_fsk_payload_ready().await,
            (RadioState::RxRunning, RadioModem::LoRa) => self.on_lora_rx_done().await,
            (RadioState::TxRunning, modem) => {
                self.timer.disarm();
                if modem == RadioModem::LoRa {
                    self.write_register(LoRaRegister::IrqFlags, IrqMask::TxDone.value())
                        .await?;
                }
                self.settings.state = RadioState::Idle;
                self.emit(|events| events.tx_done());
                Ok(())
            }
            (state, _) => {
                warn!("DIO0 in state {}", state);
                Ok(())
            }
        }
    }

    async fn on_fsk_payload_ready(&mut self) -> Result<(), RadioError> {
        if self.settings.fsk.crc_on {
            let irq_flags = self.read_register(FskRegister::IrqFlags2).await?;
            if irq_flags & FSK_IRQ2_CRCOK != FSK_IRQ2_CRCOK {
                debug!("FSK CRC error");
                self.clear_fsk_rx_irqs().await?;
                self.timer.disarm();
                self.end_fsk_reception().await?;
                self.emit(|events| events.rx_error());
                self.settings.fsk_packet_handler.reset();
                return Ok(());
            }
        }

        let rssi = self.read_register(FskRegister::RssiValue).await?;
        let afc_msb = self.read_register(FskRegister::AfcMsb).await?;
        let afc_lsb = self.read_register(FskRegister::AfcLsb).await?;
        let lna = self.read_register(Register::Lna).await?;
        let afc = i16::from_be_bytes([afc_msb, afc_lsb]) as i64;
        let handler = &mut self.settings.fsk_packet_handler;
        handler.rssi_value = -((rssi >> 1) as i16);
        handler.afc_value = ((afc * XTAL_FREQ as i64) >> 19) as i32;
        handler.rx_gain = (lna >> 5) & 0x07;

        self.fsk_read_size().await?;
        self.fsk_drain(u8::MAX).await?;

        self.timer.disarm();
        self.end_fsk_reception().await?;

        let handler = self.settings.fsk_packet_handler;
        if let Some(events) = self.events.as_mut() {
            events.rx_done(&self.data_buffer[..handler.nb_bytes as usize], handler.rssi_value, 0);
        }
        self.settings.fsk_packet_handler.reset();
        Ok(())
    }

    async fn on_lora_rx_done(&mut self) -> Result<(), RadioError> {
        self.write_register(LoRaRegister::IrqFlags, IrqMask::RxDone.value())
            .await?;
        let irq_flags = self.read_register(LoRaRegister::IrqFlags).await?;

        if IrqMask::CrcError.is_set_in(irq_flags) {
            debug!("LoRa CRC error");
            self.write_register(LoRaRegister::IrqFlags, IrqMask::CrcError.value())
                .await?;
            if !self.is_rx_continuous() {
                self.settings.state = RadioState::Idle;
            }
            self.timer.disarm();
            self.emit(|events| events.rx_error());
            return Ok(());
        }

        let snr_value = self.read_register(LoRaRegister::PktSnrValue).await? as i8;
        // SNR register is two's complement in quarter dB
        let snr = if snr_value < 0 {
            -(-(snr_value as i16) >> 2)
        } else {
            snr_value as i16 >> 2
        };
        let pkt_rssi = self.read_register(LoRaRegister::PktRssiValue).await? as i16;
        let mut rssi = self.rssi_offset() + pkt_rssi + (pkt_rssi >> 4);
        if snr < 0 {
            rssi += snr;
        }

        let size = self.read_register(LoRaRegister::RxNbBytes).await?;
        let current = self.read_register(LoRaRegister::FifoRxCurrentAddr).await?;
        self.write_register(LoRaRegister::FifoAddrPtr, current).await?;
        self.read_fifo_into_buffer(0, size as usize).await?;

        let handler = &mut self.settings.lora_packet_handler;
        handler.snr_value = snr_value;
        handler.rssi_value = rssi;
        handler.size = size;

        if !self.is_rx_continuous() {
            self.settings.state = RadioState::Idle;
        }
        self.timer.disarm();

        if let Some(events) = self.events.as_mut() {
            events.rx_done(&self.data_buffer[..size as usize], rssi, snr_value);
        }
        Ok(())
    }

    pub(super) async fn on_dio1(&mut self) -> Result<(), RadioError> {
        match (self.settings.state, self.settings.modem) {
            (RadioState::RxRunning, RadioModem::Fsk) => {
                // FifoLevel
                self.fsk_read_size().await?;
                let fifo_thresh = self.settings.fsk_packet_handler.fifo_thresh;
                self.fsk_drain(fifo_thresh).await
            }
            (RadioState::RxRunning, RadioModem::LoRa) => {
                // Sync timeout
                self.timer.disarm();
                self.settings.state = RadioState::Idle;
                self.write_register(LoRaRegister::IrqFlags, IrqMask::RxTimeout.value())
                    .await?;
                self.emit(|events| events.rx_timeout());
                Ok(())
            }
            (RadioState::TxRunning, RadioModem::Fsk) => {
                // FifoEmpty, refill with the next chunk
                let handler = self.settings.fsk_packet_handler;
                let chunk = handler.size.saturating_sub(handler.nb_bytes).min(handler.chunk_size);
                let start = handler.nb_bytes as usize;
                self.write_fifo_from_buffer(start, start + chunk as usize).await?;
                self.settings.fsk_packet_handler.nb_bytes += chunk;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub(super) async fn on_dio2(&mut self) -> Result<(), RadioError> {
        match (self.settings.state, self.settings.modem) {
            (RadioState::RxRunning, RadioModem::Fsk) => {
                // RxTimeout2 expired
                self.settings.fsk_packet_handler.reset();
                self.write_register(
                    FskRegister::IrqFlags1,
                    FSK_IRQ1_RSSI | FSK_IRQ1_PREAMBLEDETECT | FSK_IRQ1_SYNCADDRESSMATCH | FSK_IRQ1_TIMEOUT,
                )
                .await?;
                self.write_register(FskRegister::IrqFlags2, FSK_IRQ2_FIFOOVERRUN).await?;
                if !self.is_rx_continuous() {
                    self.timer.disarm();
                }
                self.end_fsk_reception().await?;
                self.emit(|events| events.rx_timeout());
                Ok(())
            }
            (RadioState::RxRunning | RadioState::TxRunning, RadioModem::LoRa) if self.settings.lora.freq_hop_on => {
                self.write_register(LoRaRegister::IrqFlags, IrqMask::FhssChangedChannel.value())
                    .await?;
                let channel = self.read_register(LoRaRegister::HopChannel).await? & 0x3f;
                self.emit(|events| events.fhss_change_channel(channel));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub(super) async fn on_dio3(&mut self) -> Result<(), RadioError> {
        if self.settings.modem != RadioModem::LoRa {
            return Ok(());
        }
        let irq_flags = self.read_register(LoRaRegister::IrqFlags).await?;
        let detected = IrqMask::CadDetected.is_set_in(irq_flags);
        let clear = if detected {
            IrqMask::CadDetected.value() | IrqMask::CadDone.value()
        } else {
            IrqMask::CadDone.value()
        };
        self.write_register(LoRaRegister::IrqFlags, clear).await?;
        if self.settings.state == RadioState::Cad {
            self.settings.state = RadioState::Idle;
        }
        self.emit(|events| events.cad_done(detected));
        Ok(())
    }

    pub(super) fn on_dio4(&mut self) -> Result<(), RadioError> {
        if self.settings.state == RadioState::RxRunning && self.settings.modem == RadioModem::Fsk {
            self.settings.fsk_packet_handler.preamble_detected = true;
        }
        Ok(())
    }

    pub(super) async fn on_timeout(&mut self) -> Result<(), RadioError> {
        self.timer.disarm();
        match self.settings.state {
            RadioState::RxRunning => {
                if self.settings.modem == RadioModem::Fsk {
                    self.settings.fsk_packet_handler.reset();
                    self.clear_fsk_rx_irqs().await?;
                    self.end_fsk_reception().await?;
                } else {
                    self.settings.state = RadioState::Idle;
                }
                self.emit(|events| events.rx_timeout());
                Ok(())
            }
            RadioState::TxRunning => {
                // The chip is assumed wedged: start over from the power-on configuration
                warn!("TX timeout, re-initializing the radio");
                self.radio_reset().await?;
                self.enable_tcxo().await?;
                self.set_operation_mode(OpMode::Sleep).await?;
                self.setup_registers().await?;
                self.set_modem(RadioModem::Fsk).await?;
                let public_network = self.settings.lora.public_network;
                self.set_public_network(public_network).await?;
                self.settings.state = RadioState::Idle;
                self.emit(|events| events.tx_timeout());
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
