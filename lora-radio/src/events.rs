use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Sender;
use heapless::Vec;

use crate::mod_traits::RadioEvents;

/// Largest payload either chip family can receive
pub const MAX_PAYLOAD_LENGTH: usize = 255;

/// A radio event, as delivered by [`ChannelEvents`]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RadioEvent {
    TxDone,
    TxTimeout,
    RxDone {
        payload: Vec<u8, MAX_PAYLOAD_LENGTH>,
        rssi: i16,
        snr: i8,
    },
    RxTimeout,
    RxError,
    FhssChangeChannel(u8),
    CadDone(bool),
}

/// Event sink that forwards every event into a channel.
///
/// The consumer handles events in its own task, outside of the radio lock. An event
/// that does not fit in the channel is dropped with a warning.
pub struct ChannelEvents<'ch, M: RawMutex, const N: usize> {
    sender: Sender<'ch, M, RadioEvent, N>,
}

impl<'ch, M: RawMutex, const N: usize> ChannelEvents<'ch, M, N> {
    /// Forward events to `sender`
    pub fn new(sender: Sender<'ch, M, RadioEvent, N>) -> Self {
        Self { sender }
    }

    fn push(&mut self, event: RadioEvent) {
        if self.sender.try_send(event).is_err() {
            warn!("event queue full, event dropped");
        }
    }
}

impl<M: RawMutex, const N: usize> RadioEvents for ChannelEvents<'_, M, N> {
    fn tx_done(&mut self) {
        self.push(RadioEvent::TxDone);
    }

    fn tx_timeout(&mut self) {
        self.push(RadioEvent::TxTimeout);
    }

    fn rx_done(&mut self, payload: &[u8], rssi: i16, snr: i8) {
        match Vec::from_slice(payload) {
            Ok(payload) => self.push(RadioEvent::RxDone { payload, rssi, snr }),
            Err(()) => warn!("{} byte payload dropped", payload.len()),
        }
    }

    fn rx_timeout(&mut self) {
        self.push(RadioEvent::RxTimeout);
    }

    fn rx_error(&mut self) {
        self.push(RadioEvent::RxError);
    }

    fn fhss_change_channel(&mut self, channel_index: u8) {
        self.push(RadioEvent::FhssChangeChannel(channel_index));
    }

    fn cad_done(&mut self, activity_detected: bool) {
        self.push(RadioEvent::CadDone(activity_detected));
    }
}
