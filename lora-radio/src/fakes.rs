//! Board doubles shared by the per-chip driver tests

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal_async::delay::DelayNs;

use crate::mod_params::RadioError;
use crate::mod_traits::{InterfaceVariant, RadioEvents, Timer};

#[derive(Default)]
pub struct TimerLog {
    pub armed: Vec<u32>,
    pub disarms: usize,
    pub now: u64,
}

#[derive(Clone, Default)]
pub struct FakeTimer {
    pub log: Rc<RefCell<TimerLog>>,
}

impl Timer for FakeTimer {
    fn arm(&mut self, timeout_ms: u32) {
        self.log.borrow_mut().armed.push(timeout_ms);
    }
    fn disarm(&mut self) {
        self.log.borrow_mut().disarms += 1;
    }
    // Every query advances the clock by 1 ms
    fn now_ms(&mut self) -> u64 {
        let mut log = self.log.borrow_mut();
        log.now += 1;
        log.now
    }
}

pub struct Delayer;
impl DelayNs for Delayer {
    async fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Switch {
    Off,
    Rx,
    Tx { high_power: bool },
}

/// Records the RF switch position, every other line is a no-op
#[derive(Clone, Default)]
pub struct DummyVariant {
    pub switch: Rc<RefCell<Vec<Switch>>>,
    pub resets: Rc<RefCell<usize>>,
}

impl DummyVariant {
    pub fn last_switch(&self) -> Option<Switch> {
        self.switch.borrow().last().copied()
    }
}

impl InterfaceVariant for DummyVariant {
    async fn reset(&mut self, _delay: &mut impl DelayNs) -> Result<(), RadioError> {
        *self.resets.borrow_mut() += 1;
        Ok(())
    }
    async fn wait_on_busy(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
    async fn disable_rf_switch(&mut self) -> Result<(), RadioError> {
        self.switch.borrow_mut().push(Switch::Off);
        Ok(())
    }
    async fn enable_rf_switch_rx(&mut self) -> Result<(), RadioError> {
        self.switch.borrow_mut().push(Switch::Rx);
        Ok(())
    }
    async fn enable_rf_switch_tx(&mut self, high_power: bool) -> Result<(), RadioError> {
        self.switch.borrow_mut().push(Switch::Tx { high_power });
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    TxDone,
    TxTimeout,
    RxDone(Vec<u8>, i16, i8),
    RxTimeout,
    RxError,
    FhssChangeChannel(u8),
    CadDone(bool),
}

#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Rc<RefCell<Vec<Event>>>,
}

impl RadioEvents for Recorder {
    fn tx_done(&mut self) {
        self.events.borrow_mut().push(Event::TxDone);
    }
    fn tx_timeout(&mut self) {
        self.events.borrow_mut().push(Event::TxTimeout);
    }
    fn rx_done(&mut self, payload: &[u8], rssi: i16, snr: i8) {
        self.events.borrow_mut().push(Event::RxDone(payload.to_vec(), rssi, snr));
    }
    fn rx_timeout(&mut self) {
        self.events.borrow_mut().push(Event::RxTimeout);
    }
    fn rx_error(&mut self) {
        self.events.borrow_mut().push(Event::RxError);
    }
    fn fhss_change_channel(&mut self, channel_index: u8) {
        self.events.borrow_mut().push(Event::FhssChangeChannel(channel_index));
    }
    fn cad_done(&mut self, activity_detected: bool) {
        self.events.borrow_mut().push(Event::CadDone(activity_detected));
    }
}
