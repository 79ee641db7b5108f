//! The object-mode Channel façade: a bounded Tx Queue driving repeated
//! Protocol Engine exchanges, with link-state tracking and pluggable
//! callbacks.

use heapless::{Deque, Vec};

use crate::protocol::{ProtocolEngine, Role};
use crate::radio::RadioLink;
use crate::time::{delay_ms, now_ms};

/// Hooks a caller can register on a [`Channel`]. All methods default to a
/// no-op, so implementors only override what they care about — the same
/// shape used by link-layer logger traits elsewhere in the embedded
/// ecosystem.
pub trait ChannelEvents {
    /// A complete message arrived from the peer.
    fn on_rx(&mut self, _data: &[u8]) {}
    /// The payload at the front of the Tx Queue was delivered and
    /// acknowledged.
    fn on_tx_ack(&mut self) {}
    /// The link transitioned up (`true`) or down (`false`).
    fn on_link_state(&mut self, _up: bool) {}
}

/// A [`ChannelEvents`] implementation that does nothing, for callers with
/// no interest in any of the hooks.
#[derive(Default)]
pub struct NoopEvents;
impl ChannelEvents for NoopEvents {}

/// How long a Master pauses after a failed exchange before retrying,
/// giving an unresponsive Slave time to come back before hammering the
/// air with back-to-back attempts.
fn master_retry_delay_ms(timeout_ms: u32, max_resend_requests: u8) -> u32 {
    timeout_ms.saturating_mul(max_resend_requests as u32 + 1)
}

/// Drives a [`ProtocolEngine`] against a bounded outgoing queue.
///
/// `N` is the maximum payload size in bytes, `TXQ` is the queue depth.
pub struct Channel<R: RadioLink, E: ChannelEvents, const N: usize, const TXQ: usize> {
    engine: ProtocolEngine<R, N>,
    events: E,
    txq: Deque<Vec<u8, N>, TXQ>,
    link_up: bool,
    t_last_ms: u32,
}

impl<R: RadioLink, E: ChannelEvents, const N: usize, const TXQ: usize> Channel<R, E, N, TXQ> {
    pub fn new(radio: R, role: Role, events: E) -> Self {
        Channel {
            engine: ProtocolEngine::new(radio, role),
            events,
            txq: Deque::new(),
            link_up: false,
            t_last_ms: now_ms(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.engine = self.engine.with_timeout_ms(timeout_ms);
        self
    }

    pub fn with_max_resend_requests(mut self, n: u8) -> Self {
        self.engine = self.engine.with_max_resend_requests(n);
        self
    }

    /// Queue a payload for delivery. Returns `false` without queuing
    /// anything if the payload doesn't fit in a single message (`> N`
    /// bytes) or the queue is already full. A `> N` payload is a caller
    /// bug rather than transient back-pressure (see DESIGN.md), but both
    /// cases return the same `false` — a full queue is worth retrying,
    /// an oversized payload never is.
    pub fn send(&mut self, data: &[u8]) -> bool {
        if data.len() > N {
            return false;
        }
        let mut item: Vec<u8, N> = Vec::new();
        let _ = item.extend_from_slice(data);
        self.txq.push_back(item).is_ok()
    }

    /// Is there room in the Tx Queue for another payload?
    pub fn tx_ready(&self) -> bool {
        !self.txq.is_full()
    }

    pub fn link_up(&self) -> bool {
        self.link_up
    }

    /// Milliseconds timestamp of the last successful exchange.
    pub fn t_last_ms(&self) -> u32 {
        self.t_last_ms
    }

    /// Run one exchange cycle: offer the front of the Tx Queue (or an
    /// empty payload if it's empty) to the Protocol Engine, and dispatch
    /// the outcome to the registered [`ChannelEvents`].
    pub fn step(&mut self) {
        let outgoing: Vec<u8, N> = self.txq.front().cloned().unwrap_or_default();
        let result = match self.engine.role() {
            Role::Master => self.engine.master_exchange(&outgoing),
            Role::Slave => self.engine.slave_exchange(&outgoing),
        };
        match result {
            Ok(received) => {
                if !outgoing.is_empty() {
                    self.txq.pop_front();
                    self.events.on_tx_ack();
                }
                if !received.is_empty() {
                    self.events.on_rx(&received);
                }
                self.t_last_ms = now_ms();
                if !self.link_up {
                    self.link_up = true;
                    self.events.on_link_state(true);
                }
            }
            Err(_err) => self.on_exchange_failure(),
        }
    }

    fn on_exchange_failure(&mut self) {
        if self.link_up {
            self.link_up = false;
            self.events.on_link_state(false);
        }
        if self.engine.role() == Role::Master {
            delay_ms(master_retry_delay_ms(
                self.engine.timeout_ms(),
                self.engine.max_resend_requests(),
            ));
        }
    }

    /// Drive exchanges forever. The caller spawns this as the body of its
    /// own concrete `#[embassy_executor::task]` function — `Channel` is
    /// generic over `R`/`E`, and embassy tasks cannot be.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, CMD_BYE};
    use heapless::Deque as MockDeque;

    struct MockRadio {
        inbox: MockDeque<[u8; 32], 8>,
    }

    impl MockRadio {
        fn new() -> Self {
            MockRadio {
                inbox: MockDeque::new(),
            }
        }
        fn queue(&mut self, frame: Frame) {
            let _ = self.inbox.push_back(*frame.as_bytes());
        }
    }

    impl RadioLink for MockRadio {
        fn start_listening(&mut self) {}
        fn stop_listening(&mut self) {}
        fn send_start(&mut self, _frame: &[u8; 32]) {}
        fn send_done(&mut self) -> Option<bool> {
            Some(true)
        }
        fn any(&mut self) -> bool {
            !self.inbox.is_empty()
        }
        fn recv(&mut self) -> Option<[u8; 32]> {
            self.inbox.pop_front()
        }
    }

    #[derive(Default)]
    struct Recorder {
        rx: Vec<u8, 64>,
        acked: bool,
        link_transitions: u8,
    }
    impl ChannelEvents for Recorder {
        fn on_rx(&mut self, data: &[u8]) {
            let _ = self.rx.extend_from_slice(data);
        }
        fn on_tx_ack(&mut self) {
            self.acked = true;
        }
        fn on_link_state(&mut self, _up: bool) {
            self.link_transitions += 1;
        }
    }

    #[test]
    fn successful_exchange_drains_queue_and_raises_link_up() {
        let mut radio = MockRadio::new();
        radio.queue(Frame::encode(CMD_BYE, b"pong", true, false, false));
        let mut channel: Channel<MockRadio, Recorder, 64, 4> =
            Channel::new(radio, Role::Master, Recorder::default());
        assert!(channel.send(b"ping"));
        channel.step();
        assert!(channel.link_up());
        assert!(channel.events.acked);
        assert_eq!(channel.events.rx.as_slice(), b"pong");
        assert!(channel.tx_ready());
    }
}
