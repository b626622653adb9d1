#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(async_fn_in_trait)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
//!
//! ## Feature flags
#![doc = document_features::document_features!(feature_label = r#"<span class="stab portability"><code>{feature}</code></span>"#)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

/// Dispatch context serializing the interrupt handling of one radio
pub mod dispatch;
/// Channel-backed event sink
pub mod events;
/// The bus transport shared by both chip families
pub(crate) mod interface;
/// InterfaceVariant implementations using `embedded-hal`.
pub mod iv;
/// Parameters and errors used across the crate
pub mod mod_params;
/// Traits implemented externally or internally to support control of the radio chips
pub mod mod_traits;
/// Modem configuration, per-reception state and time on air
pub mod settings;
/// Specific implementation to support the STM32WL SUBGHZ radio
pub mod stm32wl;
/// Specific implementation to support the Semtech SX1276
pub mod sx1276;

#[cfg(test)]
mod fakes;

pub use embedded_hal_async::delay::DelayNs;
