//! The stream-mode variant: instead of one discrete message per exchange,
//! both sides keep a continuous byte pipe flowing, fragment by fragment,
//! for as long as the link runs.
//!
//! Unlike the object-mode [`crate::channel::Channel`], there is no
//! end-of-message `BYE` — the Master tags its reply `ACK` immediately
//! after it has just received data from the Slave, and `MSG` otherwise;
//! the Slave always replies `MSG`. This mirrors the asymmetric command
//! selection of the reference stream implementation this module is
//! modeled on.

use heapless::Vec;

use crate::frame::{Frame, CMD_ACK, CMD_MSG, MAX_FRAGMENT};
use crate::protocol::{max_polls, poll_recv, poll_send, ExchangeError, Role};
use crate::radio::RadioLink;
use crate::rxasm::ReceiveReassembler;
use crate::stats::Stats;
use crate::time::now_ms;

/// Bytes queued to go out next, drained `MAX_FRAGMENT` bytes at a time.
struct PendingTx<const N: usize> {
    buffer: Vec<u8, N>,
    pid: bool,
}

impl<const N: usize> PendingTx<N> {
    fn new() -> Self {
        PendingTx {
            buffer: Vec::new(),
            pid: false,
        }
    }

    fn push(&mut self, data: &[u8]) -> bool {
        self.buffer.extend_from_slice(data).is_ok()
    }

    fn next_chunk(&mut self) -> (heapless::Vec<u8, MAX_FRAGMENT>, bool) {
        let n = self.buffer.len().min(MAX_FRAGMENT);
        let mut chunk: heapless::Vec<u8, MAX_FRAGMENT> = heapless::Vec::new();
        let _ = chunk.extend_from_slice(&self.buffer[..n]);
        if n > 0 {
            self.buffer.copy_within(n.., 0);
            self.buffer.truncate(self.buffer.len() - n);
            self.pid = !self.pid;
        }
        (chunk, self.pid)
    }
}

/// A continuous byte-stream link over the radio, playing either the
/// Master or Slave role of the exchange.
pub struct StreamChannel<R: RadioLink, const N: usize> {
    radio: R,
    role: Role,
    timeout_ms: u32,
    pending_tx: PendingTx<N>,
    /// A Master-side frame already built and sent, still awaiting a
    /// reply. Re-offered unchanged (same bytes, same PID) on the next
    /// `step()` after a timeout, instead of drawing a fresh chunk —
    /// otherwise a lost reply would permanently drop the chunk it
    /// carried.
    pending_frame: Option<Frame>,
    rxasm: ReceiveReassembler<N>,
    last_rx_had_data: bool,
    link_up: bool,
    t_last_ms: u32,
    stats: Option<Stats>,
}

impl<R: RadioLink, const N: usize> StreamChannel<R, N> {
    pub fn new(radio: R, role: Role, collect_stats: bool) -> Self {
        StreamChannel {
            radio,
            role,
            timeout_ms: 200,
            pending_tx: PendingTx::new(),
            pending_frame: None,
            rxasm: ReceiveReassembler::new(),
            last_rx_had_data: false,
            link_up: false,
            t_last_ms: now_ms(),
            stats: if collect_stats { Some(Stats::new()) } else { None },
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Queue bytes to be written out over the stream. Returns `false` if
    /// they don't fit in the pending buffer.
    pub fn write(&mut self, data: &[u8]) -> bool {
        self.pending_tx.push(data)
    }

    /// Remove and return bytes up to and including the next `\n`, if a
    /// complete line has arrived.
    pub fn read_line(&mut self) -> Option<heapless::Vec<u8, N>> {
        self.rxasm.drain_line()
    }

    /// Remove and return up to `n` received bytes.
    pub fn read(&mut self, n: usize) -> heapless::Vec<u8, N> {
        self.rxasm.drain(n)
    }

    pub fn link_up(&self) -> bool {
        self.link_up
    }

    pub fn t_last_ms(&self) -> u32 {
        self.t_last_ms
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    /// Run one turn of the stream exchange.
    pub fn step(&mut self) -> Result<(), ExchangeError> {
        match self.role {
            Role::Master => self.master_turn(),
            Role::Slave => self.slave_turn(),
        }
    }

    /// Build (or, on a retry after a failed round trip, re-use) the
    /// frame to send this turn, then run it through [`Self::exchange_once`].
    /// Only on success does the next call draw a fresh chunk — a timeout
    /// or malformed reply re-sends the exact same bytes and PID next
    /// time, per the "retransmit the same frame" rule.
    fn master_turn(&mut self) -> Result<(), ExchangeError> {
        let frame = match self.pending_frame.take() {
            Some(frame) => frame,
            None => {
                let (chunk, pid) = self.pending_tx.next_chunk();
                let command = if self.last_rx_had_data { CMD_ACK } else { CMD_MSG };
                Frame::encode(command, &chunk, false, false, pid)
            }
        };
        match self.exchange_once(&frame) {
            Ok(()) => Ok(()),
            Err(err @ (ExchangeError::Timeout | ExchangeError::Codec(_))) => {
                self.pending_frame = Some(frame);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn slave_turn(&mut self) -> Result<(), ExchangeError> {
        let budget = max_polls(self.timeout_ms);
        let raw = poll_recv(&mut self.radio, budget).ok_or_else(|| {
            self.record_rx_timeout();
            ExchangeError::Timeout
        })?;
        let decoded = Frame::decode(&raw).map_err(ExchangeError::Codec)?;
        self.ingest(decoded.data, decoded.pid, decoded.pwr);

        let (chunk, pid) = self.pending_tx.next_chunk();
        let frame = Frame::encode(CMD_MSG, &chunk, false, false, pid);
        if !poll_send(&mut self.radio, &frame, budget) {
            self.record_tx_timeout();
        }
        self.mark_alive();
        Ok(())
    }

    /// Shared Master-side turn: send our chunk, wait for the Slave's
    /// reply, update the reassembler and the ACK/MSG tracking bit.
    fn exchange_once(&mut self, frame: &Frame) -> Result<(), ExchangeError> {
        let budget = max_polls(self.timeout_ms);
        if !poll_send(&mut self.radio, frame, budget) {
            self.record_tx_timeout();
        }
        let raw = poll_recv(&mut self.radio, budget).ok_or_else(|| {
            self.record_rx_timeout();
            ExchangeError::Timeout
        })?;
        let decoded = Frame::decode(&raw).map_err(ExchangeError::Codec)?;
        self.last_rx_had_data = !decoded.data.is_empty();
        self.ingest(decoded.data, decoded.pid, decoded.pwr);
        self.mark_alive();
        Ok(())
    }

    fn ingest(&mut self, data: &[u8], pid: bool, pwr: bool) {
        if pwr {
            self.rxasm.on_peer_pwr();
        }
        self.rxasm.ingest(data, pid);
        if let Some(stats) = &mut self.stats {
            stats.record_rx(data.len());
        }
    }

    fn record_rx_timeout(&mut self) {
        if let Some(stats) = &mut self.stats {
            stats.record_rx_timeout();
        }
        if self.link_up {
            self.link_up = false;
        }
    }

    fn record_tx_timeout(&mut self) {
        if let Some(stats) = &mut self.stats {
            stats.record_tx_timeout();
        }
    }

    fn mark_alive(&mut self) {
        self.t_last_ms = now_ms();
        self.link_up = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Deque;

    struct MockRadio {
        inbox: Deque<[u8; 32], 8>,
        sent: Vec<[u8; 32], 8>,
    }

    impl MockRadio {
        fn new() -> Self {
            MockRadio {
                inbox: Deque::new(),
                sent: Vec::new(),
            }
        }
        fn queue(&mut self, frame: Frame) {
            let _ = self.inbox.push_back(*frame.as_bytes());
        }
    }

    impl RadioLink for MockRadio {
        fn start_listening(&mut self) {}
        fn stop_listening(&mut self) {}
        fn send_start(&mut self, frame: &[u8; 32]) {
            let _ = self.sent.push(*frame);
        }
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

    /// Like `MockRadio`, but `send_start` never completes — `send_done`
    /// always reports "still in flight", isolating a TX timeout from an
    /// RX timeout so `Stats::tx_timeouts` can be tested on its own.
    struct StuckSendRadio {
        inbox: Deque<[u8; 32], 8>,
    }

    impl StuckSendRadio {
        fn new() -> Self {
            StuckSendRadio { inbox: Deque::new() }
        }
        fn queue(&mut self, frame: Frame) {
            let _ = self.inbox.push_back(*frame.as_bytes());
        }
    }

    impl RadioLink for StuckSendRadio {
        fn start_listening(&mut self) {}
        fn stop_listening(&mut self) {}
        fn send_start(&mut self, _frame: &[u8; 32]) {}
        fn send_done(&mut self) -> Option<bool> {
            None
        }
        fn any(&mut self) -> bool {
            !self.inbox.is_empty()
        }
        fn recv(&mut self) -> Option<[u8; 32]> {
            self.inbox.pop_front()
        }
    }

    #[test]
    fn tx_timeout_is_recorded_in_stats_independent_of_rx_outcome() {
        let mut radio = StuckSendRadio::new();
        radio.queue(Frame::encode(CMD_MSG, b"hi", false, false, false));
        let mut chan: StreamChannel<StuckSendRadio, 64> =
            StreamChannel::new(radio, Role::Master, true).with_timeout_ms(4);
        chan.write(b"yo");
        // The send never completes, but a reply is still queued, so the
        // overall turn succeeds — it's purely the TX side that timed out.
        chan.step().unwrap();
        assert_eq!(chan.stats().unwrap().tx_timeouts, 1);
        assert_eq!(chan.stats().unwrap().rx_timeouts, 0);
    }

    #[test]
    fn master_turn_ingests_slave_reply_and_sets_ack_flag() {
        let mut radio = MockRadio::new();
        radio.queue(Frame::encode(CMD_MSG, b"hi", false, false, false));
        let mut chan: StreamChannel<MockRadio, 64> = StreamChannel::new(radio, Role::Master, true);
        chan.write(b"yo");
        chan.step().unwrap();
        assert!(chan.link_up());
        assert!(chan.last_rx_had_data);
        let line = chan.read(2);
        assert_eq!(line.as_slice(), b"hi");
        assert_eq!(chan.stats().unwrap().rx_all, 1);
    }

    #[test]
    fn slave_turn_replies_with_msg_and_its_own_pending_data() {
        let mut radio = MockRadio::new();
        radio.queue(Frame::encode(CMD_MSG, b"hey", false, false, false));
        let mut chan: StreamChannel<MockRadio, 64> = StreamChannel::new(radio, Role::Slave, false);
        chan.write(b"reply");
        chan.step().unwrap();
        assert_eq!(chan.read(3).as_slice(), b"hey");
    }

    #[test]
    fn slave_turn_times_out_without_incoming_frame() {
        let radio = MockRadio::new();
        let mut chan: StreamChannel<MockRadio, 64> =
            StreamChannel::new(radio, Role::Slave, false).with_timeout_ms(4);
        assert_eq!(chan.step(), Err(ExchangeError::Timeout));
    }

    #[test]
    fn master_turn_resends_same_chunk_on_timeout_instead_of_dropping_it() {
        let radio = MockRadio::new();
        let mut chan: StreamChannel<MockRadio, 64> =
            StreamChannel::new(radio, Role::Master, true).with_timeout_ms(4);
        // Two chunks worth of data: 30 bytes, then 10.
        chan.write(&[0xabu8; 30]);
        chan.write(&[0xcdu8; 10]);

        assert_eq!(chan.step(), Err(ExchangeError::Timeout));
        assert_eq!(chan.radio.sent.len(), 1);
        let first_attempt = chan.radio.sent[0];

        assert_eq!(chan.step(), Err(ExchangeError::Timeout));
        assert_eq!(chan.radio.sent.len(), 2);
        assert_eq!(
            chan.radio.sent[1], first_attempt,
            "a retry after a TX timeout must resend the exact same frame"
        );
        assert_eq!(chan.stats().unwrap().tx_timeouts, 0);

        chan.radio.queue(Frame::encode(CMD_MSG, &[], false, false, false));
        chan.step().unwrap();
        assert_eq!(chan.radio.sent.len(), 3);
        assert_eq!(
            chan.radio.sent[2], first_attempt,
            "the successful send must still be the same 30-byte chunk, not the next one"
        );

        // Now that the first chunk was acknowledged, the next turn draws
        // the remaining 10 bytes rather than repeating the first chunk.
        assert_eq!(chan.step(), Err(ExchangeError::Timeout));
        assert_eq!(chan.radio.sent.len(), 4);
        assert_ne!(chan.radio.sent[3], first_attempt);
        assert_eq!(chan.radio.sent[3][1], 10);
    }
}
