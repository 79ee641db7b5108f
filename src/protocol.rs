//! The master/slave reliable-exchange state machine built on top of the
//! Packet Codec, Transmit Assembler and Receive Reassembler.

use heapless::Vec;

use crate::frame::{CodecError, DecodedFrame, Frame, CMD_BYE, CMD_OK, CMD_RESEND, CMD_START_SLAVE, MAX_FRAGMENT};
use crate::radio::RadioLink;
use crate::rxasm::ReceiveReassembler;
use crate::time::delay_ms;
use crate::txasm::TransmitAssembler;

/// Spacing between radio polls while waiting for a send to complete or a
/// frame to arrive.
const POLL_PERIOD_MS: u32 = 2;

/// Convert a timeout in milliseconds to a poll budget. Shared by
/// [`ProtocolEngine`] and the stream-mode channel so both honor the same
/// timeout semantics.
pub(crate) fn max_polls(timeout_ms: u32) -> u32 {
    (timeout_ms / POLL_PERIOD_MS).max(1)
}

/// Send `frame` and wait until the radio reports the transmission is
/// done, or `budget` polls have elapsed. Returns `true` if the radio
/// reported completion within the budget, `false` on a TX timeout.
pub(crate) fn poll_send<R: RadioLink>(radio: &mut R, frame: &Frame, budget: u32) -> bool {
    radio.stop_listening();
    radio.send_start(frame.as_bytes());
    let mut completed = false;
    for _ in 0..budget {
        if radio.send_done().is_some() {
            completed = true;
            break;
        }
        delay_ms(POLL_PERIOD_MS);
    }
    radio.start_listening();
    completed
}

/// Wait up to `budget` polls for an inbound frame.
pub(crate) fn poll_recv<R: RadioLink>(radio: &mut R, budget: u32) -> Option<[u8; 32]> {
    for _ in 0..budget {
        if let Some(frame) = radio.recv() {
            return Some(frame);
        }
        delay_ms(POLL_PERIOD_MS);
    }
    None
}

/// Which side of the exchange this engine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

/// Why an exchange could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeError {
    /// No frame arrived within the configured timeout, even after
    /// exhausting resends.
    Timeout,
    /// A received frame failed to decode.
    Codec(CodecError),
    /// The peer kept asking for a resend past `max_resend_requests`.
    GivenUp,
}

/// An inbound frame, decoupled from the lifetime of the receive buffer it
/// was decoded from.
struct FrameInfo {
    command: u8,
    txdone: bool,
    data: Vec<u8, MAX_FRAGMENT>,
}

impl FrameInfo {
    fn from_decoded(decoded: &DecodedFrame<'_>) -> Self {
        let mut data = Vec::new();
        let _ = data.extend_from_slice(decoded.data);
        FrameInfo {
            command: decoded.command,
            txdone: decoded.txdone,
            data,
        }
    }

}

/// Drives one side (master or slave) of a single logical message exchange
/// over a [`RadioLink`].
///
/// One `ProtocolEngine` is meant to live for the lifetime of a link and be
/// reused across many exchanges; `master_exchange`/`slave_exchange` each
/// perform one full bidirectional message transfer.
pub struct ProtocolEngine<R: RadioLink, const N: usize> {
    radio: R,
    role: Role,
    timeout_ms: u32,
    max_resend_requests: u8,
    txasm: TransmitAssembler<N>,
    rxasm: ReceiveReassembler<N>,
}

impl<R: RadioLink, const N: usize> ProtocolEngine<R, N> {
    pub fn new(radio: R, role: Role) -> Self {
        ProtocolEngine {
            radio,
            role,
            timeout_ms: 200,
            max_resend_requests: 1,
            txasm: TransmitAssembler::new(),
            rxasm: ReceiveReassembler::new(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_resend_requests(mut self, n: u8) -> Self {
        self.max_resend_requests = n;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn max_resend_requests(&self) -> u8 {
        self.max_resend_requests
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    fn transmit(&mut self, frame: &Frame) {
        let _ = poll_send(&mut self.radio, frame, max_polls(self.timeout_ms));
    }

    fn await_decoded(&mut self) -> Result<FrameInfo, ExchangeError> {
        let raw = poll_recv(&mut self.radio, max_polls(self.timeout_ms)).ok_or(ExchangeError::Timeout)?;
        let decoded = Frame::decode(&raw).map_err(ExchangeError::Codec)?;
        if decoded.pwr {
            self.rxasm.on_peer_pwr();
        }
        self.rxasm.ingest(decoded.data, decoded.pid);
        Ok(FrameInfo::from_decoded(&decoded))
    }

    /// Transmit `frame`, then wait for the peer's reply, retransmitting
    /// the same frame on silence or an explicit resend request, up to
    /// `max_resend_requests` times.
    fn send_and_await(&mut self, frame: &Frame) -> Result<FrameInfo, ExchangeError> {
        let mut resend_count = 0u8;
        loop {
            self.transmit(frame);
            match self.await_decoded() {
                Ok(info) if info.command == CMD_RESEND => {
                    resend_count += 1;
                    if resend_count > self.max_resend_requests {
                        return Err(ExchangeError::GivenUp);
                    }
                }
                Ok(info) => return Ok(info),
                Err(ExchangeError::Timeout) => {
                    resend_count += 1;
                    if resend_count > self.max_resend_requests {
                        return Err(ExchangeError::Timeout);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Initiate a message exchange: send `payload`, receive and return the
    /// peer's reply payload. The peer must be in [`Self::slave_exchange`].
    pub fn master_exchange(&mut self, payload: &[u8]) -> Result<Vec<u8, N>, ExchangeError> {
        self.txasm.load(payload);
        self.rxasm.on_peer_pwr();

        let mut first = true;
        loop {
            let final_fragment = self.txasm.is_last_fragment();
            let command = if first { CMD_START_SLAVE } else { CMD_OK };
            let frame = self.txasm.build_frame(command, final_fragment);
            let info = self.send_and_await(&frame)?;
            first = false;
            self.txasm.advance();

            if final_fragment && info.txdone {
                return Ok(self.rxasm.take_all());
            }
            // Either we still have fragments left to send, or our side is
            // done but the slave isn't yet — either way keep exchanging
            // (empty, once our side is exhausted) frames until it signals
            // completion.
        }
    }

    /// Wait for a master to open an exchange, then reply with `payload`
    /// fragment by fragment and return the master's message.
    pub fn slave_exchange(&mut self, payload: &[u8]) -> Result<Vec<u8, N>, ExchangeError> {
        self.txasm.load(payload);
        self.rxasm.on_peer_pwr();

        // Ignore a stray BYE left over from the tail of a previous
        // exchange; only a fresh START_SLAVE/OK begins a new one.
        let mut info = loop {
            let candidate = self.await_decoded()?;
            if candidate.command == CMD_BYE {
                continue;
            }
            break candidate;
        };

        loop {
            let final_fragment = self.txasm.is_last_fragment();
            let reply_cmd = if final_fragment && info.txdone {
                CMD_BYE
            } else {
                CMD_OK
            };
            let frame = self.txasm.build_frame(reply_cmd, final_fragment);

            if final_fragment && info.txdone {
                // Fire-and-forget: the exchange is over from our point of
                // view once we've sent the closing BYE.
                self.transmit(&frame);
                return Ok(self.rxasm.take_all());
            }
            self.txasm.advance();
            info = self.send_and_await(&frame)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CMD_BYE, CMD_RESEND};
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

    #[test]
    fn master_exchange_completes_on_first_reply() {
        let mut radio = MockRadio::new();
        radio.queue(Frame::encode(CMD_BYE, b"pong", true, false, false));
        let mut engine: ProtocolEngine<MockRadio, 64> =
            ProtocolEngine::new(radio, Role::Master);
        let reply = engine.master_exchange(b"ping").unwrap();
        assert_eq!(reply.as_slice(), b"pong");
    }

    #[test]
    fn master_exchange_retries_on_explicit_resend() {
        let mut radio = MockRadio::new();
        radio.queue(Frame::encode(CMD_RESEND, &[], false, false, false));
        radio.queue(Frame::encode(CMD_BYE, b"pong", true, false, false));
        let mut engine: ProtocolEngine<MockRadio, 64> =
            ProtocolEngine::new(radio, Role::Master).with_max_resend_requests(1);
        let reply = engine.master_exchange(b"ping").unwrap();
        assert_eq!(reply.as_slice(), b"pong");
    }

    #[test]
    fn master_exchange_times_out_on_silence() {
        let radio = MockRadio::new();
        let mut engine: ProtocolEngine<MockRadio, 64> = ProtocolEngine::new(radio, Role::Master)
            .with_timeout_ms(4)
            .with_max_resend_requests(0);
        let result = engine.master_exchange(b"ping");
        assert_eq!(result, Err(ExchangeError::Timeout));
    }

    #[test]
    fn slave_exchange_ignores_stray_bye_before_start() {
        let mut radio = MockRadio::new();
        radio.queue(Frame::encode(CMD_BYE, &[], true, false, true));
        radio.queue(Frame::encode(CMD_START_SLAVE, b"ping", true, true, false));
        let mut engine: ProtocolEngine<MockRadio, 64> = ProtocolEngine::new(radio, Role::Slave);
        let reply = engine.slave_exchange(b"pong").unwrap();
        assert_eq!(reply.as_slice(), b"ping");
    }

    /// A `RadioLink` whose `send_start` appends to one shared queue and
    /// whose `recv` pops from another, so a pair of these (with the
    /// queues crossed) lets two `ProtocolEngine`s talk to each other for
    /// real across threads instead of via pre-scripted frames.
    struct LinkedRadio {
        inbox: std::sync::Arc<std::sync::Mutex<Deque<[u8; 32], 16>>>,
        outbox: std::sync::Arc<std::sync::Mutex<Deque<[u8; 32], 16>>>,
    }

    impl RadioLink for LinkedRadio {
        fn start_listening(&mut self) {}
        fn stop_listening(&mut self) {}
        fn send_start(&mut self, frame: &[u8; 32]) {
            let _ = self.outbox.lock().unwrap().push_back(*frame);
        }
        fn send_done(&mut self) -> Option<bool> {
            Some(true)
        }
        fn any(&mut self) -> bool {
            !self.inbox.lock().unwrap().is_empty()
        }
        fn recv(&mut self) -> Option<[u8; 32]> {
            let frame = self.inbox.lock().unwrap().pop_front();
            if frame.is_none() {
                std::thread::yield_now();
            }
            frame
        }
    }

    #[test]
    fn master_and_slave_exchange_multi_fragment_payloads_end_to_end() {
        let a_to_b = std::sync::Arc::new(std::sync::Mutex::new(Deque::<[u8; 32], 16>::new()));
        let b_to_a = std::sync::Arc::new(std::sync::Mutex::new(Deque::<[u8; 32], 16>::new()));

        let master_radio = LinkedRadio {
            inbox: b_to_a.clone(),
            outbox: a_to_b.clone(),
        };
        let slave_radio = LinkedRadio {
            inbox: a_to_b,
            outbox: b_to_a,
        };

        // 75 bytes fragments into three frames (30 + 30 + 15), exercising
        // the alternating PID across a multi-fragment payload.
        let master_payload: Vec<u8, 128> = {
            let mut v = Vec::new();
            let _ = v.extend_from_slice(&[0x5au8; 75]);
            v
        };
        let slave_payload = b"ack from the slave side";

        let slave_thread = std::thread::spawn(move || {
            let mut slave: ProtocolEngine<LinkedRadio, 128> =
                ProtocolEngine::new(slave_radio, Role::Slave);
            slave.slave_exchange(slave_payload).unwrap()
        });

        let mut master: ProtocolEngine<LinkedRadio, 128> =
            ProtocolEngine::new(master_radio, Role::Master);
        let master_received = master.master_exchange(&master_payload).unwrap();
        let slave_received = slave_thread.join().unwrap();

        assert_eq!(master_received.as_slice(), slave_payload);
        assert_eq!(slave_received.as_slice(), master_payload.as_slice());
    }
}
