use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;

use super::radio_kind_params::*;
use super::Stm32wl;
use crate::mod_params::*;
use crate::mod_traits::{InterfaceVariant, LoRaRadio, RadioEvents, Timer};

impl<SPI, IV, TMR, DLY, EV> Stm32wl<SPI, IV, TMR, DLY, EV>
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

    // A single reception leaves the radio in standby once it completes
    fn end_reception(&mut self) {
        if !self.is_rx_continuous() {
            self.settings.state = RadioState::Idle;
        }
    }

    /// Read and clear the radio IRQ status, then act on it for the current state.
    ///
    /// Packets from other devices can cause unexpected interrupts; they are logged and
    /// otherwise ignored.
    pub(super) async fn on_irq(&mut self) -> Result<(), RadioError> {
        self.ensure_awake().await?;
        let mut irq_status = [0x00u8, 0x00u8];
        let read_status = self
            .intf
            .read_with_status(&[OpCode::GetIrqStatus.value()], &mut irq_status)
            .await?;
        let irq_flags = u16::from_be_bytes(irq_status);
        if irq_flags != 0 {
            self.write_command(&[OpCode::ClrIrqStatus.value(), irq_status[0], irq_status[1]])
                .await?;
        }
        if OpStatusErrorMask::is_error(read_status) {
            debug!("irq read status error = 0x{:x}", read_status);
        }
        debug!(
            "irq_flags = 0x{:x} in state {}",
            irq_flags, self.settings.state
        );

        match self.settings.state {
            RadioState::TxRunning => {
                if IrqMask::TxDone.is_set_in(irq_flags) {
                    self.timer.disarm();
                    self.intf.iv.disable_rf_switch().await?;
                    self.settings.state = RadioState::Idle;
                    self.emit(|events| events.tx_done());
                } else if IrqMask::RxTxTimeout.is_set_in(irq_flags) {
                    self.timer.disarm();
                    self.recover_from_tx_timeout().await?;
                }
                Ok(())
            }
            RadioState::RxRunning => self.on_rx_irq(irq_flags).await,
            RadioState::Cad => {
                if IrqMask::CADDone.is_set_in(irq_flags) {
                    let detected = IrqMask::CADActivityDetected.is_set_in(irq_flags);
                    self.intf.iv.disable_rf_switch().await?;
                    self.settings.state = RadioState::Idle;
                    self.emit(|events| events.cad_done(detected));
                }
                Ok(())
            }
            RadioState::Idle => {
                warn!("IRQ 0x{:x} while idle", irq_flags);
                Ok(())
            }
        }
    }

    async fn on_rx_irq(&mut self, irq_flags: u16) -> Result<(), RadioError> {
        if IrqMask::PreambleDetected.is_set_in(irq_flags) {
            self.settings.fsk_packet_handler.preamble_detected = true;
        }
        if IrqMask::SyncwordValid.is_set_in(irq_flags) {
            self.settings.fsk_packet_handler.sync_word_detected = true;
        }

        if IrqMask::RxDone.is_set_in(irq_flags) {
            if IrqMask::CRCError.is_set_in(irq_flags) {
                debug!("CRC error");
                self.timer.disarm();
                self.end_reception();
                self.emit(|events| events.rx_error());
                return Ok(());
            }
            return self.on_rx_done().await;
        }

        if IrqMask::RxTxTimeout.is_set_in(irq_flags) || IrqMask::HeaderError.is_set_in(irq_flags) {
            self.timer.disarm();
            self.end_reception();
            self.emit(|events| events.rx_timeout());
        }
        Ok(())
    }

    async fn on_rx_done(&mut self) -> Result<(), RadioError> {
        if !self.is_rx_continuous() {
            // implicit header mode timeout behavior (see DS_SX1261-2_V1.2 datasheet chapter 15.3)
            self.write_register(Register::RTCCtrl, &[0x00]).await?;
            let evt_clr = self.read_register(Register::EvtClr).await?;
            self.write_register(Register::EvtClr, &[evt_clr | (1 << 1)]).await?;
        }

        let mut rx_buffer_status = [0x00u8; 2];
        self.read_command(OpCode::GetRxBufferStatus, &mut rx_buffer_status)
            .await?;
        let size = rx_buffer_status[0];
        let offset = rx_buffer_status[1];
        if size > 0 {
            self.intf
                .read(
                    &[OpCode::ReadBuffer.value(), offset, 0x00u8],
                    &mut self.data_buffer[..size as usize],
                )
                .await?;
        }

        let mut pkt_status = [0x00u8; 3];
        self.read_command(OpCode::GetPacketStatus, &mut pkt_status).await?;
        let (rssi, snr) = match self.settings.modem {
            RadioModem::LoRa => {
                let rssi = -((pkt_status[0] >> 1) as i16);
                let snr = pkt_status[1] as i8;
                let handler = &mut self.settings.lora_packet_handler;
                handler.rssi_value = rssi;
                handler.snr_value = snr;
                handler.size = size;
                (rssi, snr)
            }
            RadioModem::Fsk => {
                // RSSI of the sync word
                let rssi = -((pkt_status[1] >> 1) as i16);
                let handler = &mut self.settings.fsk_packet_handler;
                handler.rssi_value = rssi;
                handler.size = size;
                handler.nb_bytes = size;
                (rssi, 0)
            }
        };

        self.timer.disarm();
        self.end_reception();
        if let Some(events) = self.events.as_mut() {
            events.rx_done(&self.data_buffer[..size as usize], rssi, snr);
        }
        Ok(())
    }

    pub(super) async fn on_timeout(&mut self) -> Result<(), RadioError> {
        self.timer.disarm();
        match self.settings.state {
            RadioState::TxRunning => self.recover_from_tx_timeout().await,
            RadioState::RxRunning => {
                self.write_command(&[OpCode::SetStandby.value(), StandbyMode::RC.value()])
                    .await?;
                self.settings.state = RadioState::Idle;
                self.emit(|events| events.rx_timeout());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // The radio is assumed wedged: start over from the power-on configuration
    async fn recover_from_tx_timeout(&mut self) -> Result<(), RadioError> {
        warn!("TX timeout, re-initializing the radio");
        self.radio_reset().await?;
        self.configure_radio().await?;
        let public_network = self.settings.lora.public_network;
        self.set_public_network(public_network).await?;
        self.settings.state = RadioState::Idle;
        self.emit(|events| events.tx_timeout());
        Ok(())
    }
}
