use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::{Mutex, MutexGuard};

use crate::mod_params::{IrqSignal, RadioError};
use crate::mod_traits::LoRaRadio;

/// A radio driver shared between its dispatch context and the application.
///
/// Interrupt handlers (DIO edges, timer expiry) only call [`SharedRadio::signal`], which
/// queues the signal without blocking. A single dispatch context, [`SharedRadio::run`],
/// takes each signal and processes it to completion with the driver locked, so events of
/// one radio are never handled concurrently. Application code takes the same lock with
/// [`SharedRadio::lock`] before reconfiguring the radio; dropping the guard unlocks it.
///
/// `N` is the depth of the signal queue.
pub struct SharedRadio<M: RawMutex, R, const N: usize> {
    radio: Mutex<M, R>,
    signals: Channel<M, IrqSignal, N>,
}

impl<M: RawMutex, R: LoRaRadio, const N: usize> SharedRadio<M, R, N> {
    /// Wrap a radio driver. The driver should be initialized through [`SharedRadio::lock`]
    /// before any signal is delivered.
    pub const fn new(radio: R) -> Self {
        Self {
            radio: Mutex::new(radio),
            signals: Channel::new(),
        }
    }

    /// Queue an interrupt signal for the dispatch context. Safe to call from interrupt context.
    pub fn signal(&self, signal: IrqSignal) -> Result<(), RadioError> {
        self.signals.try_send(signal).map_err(|_| {
            warn!("signal queue full, dropping {}", signal);
            RadioError::SignalQueueFull
        })
    }

    /// Exclusive access to the driver for the caller-facing API
    pub async fn lock(&self) -> MutexGuard<'_, M, R> {
        self.radio.lock().await
    }

    /// The dispatch loop. Run it in a dedicated, high priority task.
    pub async fn run(&self) -> ! {
        loop {
            let signal = self.signals.receive().await;
            if let Err(err) = self.dispatch(signal).await {
                error!("dispatch of {} failed: {}", signal, err);
            }
        }
    }

    /// Process every signal queued so far and return how many were handled.
    ///
    /// For executors without a dedicated dispatch task: call it after the interrupt
    /// wakes the application. Stops at the first failing signal.
    pub async fn dispatch_pending(&self) -> Result<usize, RadioError> {
        let mut handled = 0;
        while let Ok(signal) = self.signals.try_receive() {
            self.dispatch(signal).await?;
            handled += 1;
        }
        Ok(handled)
    }

    async fn dispatch(&self, signal: IrqSignal) -> Result<(), RadioError> {
        trace!("dispatch {}", signal);
        let mut radio = self.radio.lock().await;
        radio.process_signal(signal).await
    }
}
