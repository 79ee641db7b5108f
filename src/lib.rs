#![cfg_attr(not(test), no_std)]

// Copyright 2017, Romuald Texier-Marcadé <romualdtm@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! A reliable, point-to-point messaging layer for a pair of NRF24L01(+)
//! transceivers.
//!
//! One peer is the Master, the other the Slave. The Master drives every
//! exchange; the Slave only ever replies. On top of that half-duplex
//! request/reply rhythm this crate adds fragmentation of payloads larger
//! than a single 32-byte Enhanced ShockBurst frame, duplicate-frame
//! suppression, bounded retransmission, and a small outgoing queue so a
//! caller isn't blocked synchronously on the air.
//!
//! Two delivery models are offered:
//!
//! - [`channel`]: one discrete message at a time, queued and delivered
//!   whole (object mode).
//! - [`stream`]: a continuous byte pipe, for callers that want to push
//!   and pull bytes rather than whole messages.
//!
//! Both are built on the same [`protocol::ProtocolEngine`] state machine
//! and the same [`radio::RadioLink`] trait, so either can run over the
//! bundled [`radio::NRF24L01`] driver or a test double.
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! nrf24-link = "0.1"
//! ```
//!
//! ```rust,no_run
//! use nrf24_link::channel::{Channel, NoopEvents};
//! use nrf24_link::protocol::Role;
//! # fn connect() -> impl nrf24_link::radio::RadioLink { unimplemented!() }
//!
//! let radio = connect();
//! let mut channel: Channel<_, _, 64, 4> =
//!     Channel::new(radio, Role::Master, NoopEvents).with_timeout_ms(200);
//! channel.send(b"hello, slave");
//! channel.step();
//! ```

pub mod channel;
pub mod frame;
pub mod protocol;
pub mod radio;
pub mod rxasm;
pub mod stats;
pub mod stream;
mod time;
pub mod txasm;

pub use channel::{Channel, ChannelEvents, NoopEvents};
pub use frame::{CodecError, Frame};
pub use protocol::{ExchangeError, ProtocolEngine, Role};
pub use radio::{DataRate, OperatingMode, PALevel, RXConfig, RadioLink, TXConfig, NRF24L01};
pub use rxasm::ReceiveReassembler;
pub use stats::Stats;
pub use stream::StreamChannel;
pub use txasm::TransmitAssembler;
