use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use crate::mod_params::RadioError;
use crate::mod_params::RadioError::*;
use crate::mod_traits::InterfaceVariant;

fn set_optional<CTRL: OutputPin>(pin: &mut Option<CTRL>, high: bool, err: RadioError) -> Result<(), RadioError> {
    match pin {
        Some(pin) if high => pin.set_high().map_err(|_| err),
        Some(pin) => pin.set_low().map_err(|_| err),
        None => Ok(()),
    }
}

/// InterfaceVariant for an SX1276 board.
///
/// Boards differ in which antenna switch and PA control lines they route to the MCU, so
/// every control line except reset is optional.
pub struct GenericSx1276InterfaceVariant<CTRL> {
    reset: CTRL,
    rf_switch_ctrl1: Option<CTRL>,
    rf_switch_ctrl2: Option<CTRL>,
    txctl: Option<CTRL>,
    rxctl: Option<CTRL>,
    ant_switch: Option<CTRL>,
    pwr_amp_ctl: Option<CTRL>,
}

impl<CTRL> GenericSx1276InterfaceVariant<CTRL>
where
    CTRL: OutputPin,
{
    /// Create an InterfaceVariant instance for an SX1276 board
    pub fn new(
        reset: CTRL,
        rf_switch_ctrl1: Option<CTRL>,
        rf_switch_ctrl2: Option<CTRL>,
        txctl: Option<CTRL>,
        rxctl: Option<CTRL>,
        ant_switch: Option<CTRL>,
        pwr_amp_ctl: Option<CTRL>,
    ) -> Result<Self, RadioError> {
        Ok(Self {
            reset,
            rf_switch_ctrl1,
            rf_switch_ctrl2,
            txctl,
            rxctl,
            ant_switch,
            pwr_amp_ctl,
        })
    }
}

impl<CTRL> InterfaceVariant for GenericSx1276InterfaceVariant<CTRL>
where
    CTRL: OutputPin,
{
    async fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), RadioError> {
        self.reset.set_low().map_err(|_| Reset)?;
        delay.delay_ms(2).await;
        self.reset.set_high().map_err(|_| Reset)?;
        delay.delay_ms(6).await;
        Ok(())
    }
    async fn wait_on_busy(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    async fn disable_rf_switch(&mut self) -> Result<(), RadioError> {
        set_optional(&mut self.rf_switch_ctrl1, false, RfSwitchRx)?;
        set_optional(&mut self.rf_switch_ctrl2, false, RfSwitchRx)?;
        set_optional(&mut self.txctl, false, RfSwitchTx)?;
        set_optional(&mut self.rxctl, false, RfSwitchRx)?;
        set_optional(&mut self.ant_switch, false, RfSwitchTx)?;
        set_optional(&mut self.pwr_amp_ctl, false, RfSwitchTx)
    }
    async fn enable_rf_switch_rx(&mut self) -> Result<(), RadioError> {
        set_optional(&mut self.rf_switch_ctrl1, true, RfSwitchRx)?;
        set_optional(&mut self.rf_switch_ctrl2, true, RfSwitchRx)?;
        set_optional(&mut self.txctl, false, RfSwitchRx)?;
        set_optional(&mut self.rxctl, true, RfSwitchRx)?;
        set_optional(&mut self.ant_switch, false, RfSwitchRx)?;
        set_optional(&mut self.pwr_amp_ctl, false, RfSwitchRx)
    }
    async fn enable_rf_switch_tx(&mut self, high_power: bool) -> Result<(), RadioError> {
        // ctrl1/ctrl2 select PA_BOOST (1, 0) or RFO (0, 1)
        set_optional(&mut self.rf_switch_ctrl1, high_power, RfSwitchTx)?;
        set_optional(&mut self.rf_switch_ctrl2, !high_power, RfSwitchTx)?;
        set_optional(&mut self.rxctl, false, RfSwitchTx)?;
        set_optional(&mut self.txctl, true, RfSwitchTx)?;
        set_optional(&mut self.ant_switch, true, RfSwitchTx)?;
        set_optional(&mut self.pwr_amp_ctl, true, RfSwitchTx)
    }
}

/// InterfaceVariant for an STM32WL SoC.
///
/// `busy` is the SUBGHZ BUSY line (`RFBUSYS`, exposed by the HAL as an input that can be
/// awaited). `ctrl1`..`ctrl3` drive the board RF switch, see [`Stm32wlInterfaceVariant::new`].
pub struct Stm32wlInterfaceVariant<CTRL, WAIT> {
    reset: CTRL,
    busy: WAIT,
    ctrl1: Option<CTRL>,
    ctrl2: Option<CTRL>,
    ctrl3: Option<CTRL>,
}

impl<CTRL, WAIT> Stm32wlInterfaceVariant<CTRL, WAIT>
where
    CTRL: OutputPin,
    WAIT: Wait,
{
    /// Create an InterfaceVariant instance for an STM32WL board.
    ///
    /// The switch lines follow the Nucleo-WL55JC truth table:
    /// off `(0, 0, 0)`, RX `(1, 0, 1)`, low power TX `(1, 1, 1)`, high power TX `(0, 1, 1)`.
    pub fn new(
        reset: CTRL,
        busy: WAIT,
        ctrl1: Option<CTRL>,
        ctrl2: Option<CTRL>,
        ctrl3: Option<CTRL>,
    ) -> Result<Self, RadioError> {
        Ok(Self {
            reset,
            busy,
            ctrl1,
            ctrl2,
            ctrl3,
        })
    }

    fn set_switch(&mut self, levels: (bool, bool, bool), err: RadioError) -> Result<(), RadioError> {
        set_optional(&mut self.ctrl1, levels.0, err)?;
        set_optional(&mut self.ctrl2, levels.1, err)?;
        set_optional(&mut self.ctrl3, levels.2, err)
    }
}

impl<CTRL, WAIT> InterfaceVariant for Stm32wlInterfaceVariant<CTRL, WAIT>
where
    CTRL: OutputPin,
    WAIT: Wait,
{
    async fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), RadioError> {
        self.reset.set_low().map_err(|_| Reset)?;
        delay.delay_ms(1).await;
        self.reset.set_high().map_err(|_| Reset)?;
        delay.delay_ms(10).await;
        Ok(())
    }
    async fn wait_on_busy(&mut self) -> Result<(), RadioError> {
        self.busy.wait_for_low().await.map_err(|_| Busy)
    }

    async fn disable_rf_switch(&mut self) -> Result<(), RadioError> {
        self.set_switch((false, false, false), RfSwitchRx)
    }
    async fn enable_rf_switch_rx(&mut self) -> Result<(), RadioError> {
        self.set_switch((true, false, true), RfSwitchRx)
    }
    async fn enable_rf_switch_tx(&mut self, high_power: bool) -> Result<(), RadioError> {
        if high_power {
            self.set_switch((false, true, true), RfSwitchTx)
        } else {
            self.set_switch((true, true, true), RfSwitchTx)
        }
    }
}
