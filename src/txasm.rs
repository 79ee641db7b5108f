//! Fragments an outgoing payload into a sequence of wire frames.

use heapless::Vec;

use crate::frame::{Frame, MAX_FRAGMENT};

/// Splits a payload of up to `N` bytes into `MAX_FRAGMENT`-sized frames,
/// tracking the alternating PID bit and the PWR announcement window.
///
/// The PWR bit is set on the first two data-bearing frames of a payload so
/// a peer that missed the very first frame (e.g. it was mid-accumulation
/// of a previous message) still sees the "this is a new message" signal
/// before the payload ends.
pub struct TransmitAssembler<const N: usize> {
    payload: Vec<u8, N>,
    offset: usize,
    pid: bool,
    frames_sent: u8,
}

impl<const N: usize> TransmitAssembler<N> {
    pub fn new() -> Self {
        TransmitAssembler {
            payload: Vec::new(),
            offset: 0,
            pid: false,
            frames_sent: 0,
        }
    }

    /// Load a new payload to send, resetting fragmentation state. The PID
    /// bit is carried over unchanged from whatever it was after the
    /// previous payload's last data-bearing fragment; it only moves in
    /// [`Self::advance`], one flip per data-bearing fragment sent.
    pub fn load(&mut self, data: &[u8]) {
        self.payload.clear();
        let _ = self.payload.extend_from_slice(&data[..data.len().min(N)]);
        self.offset = 0;
        self.frames_sent = 0;
    }

    /// Is there fragmentation work left to send?
    pub fn is_done(&self) -> bool {
        self.offset >= self.payload.len()
    }

    /// Does the next (or current, not-yet-advanced) fragment cover the
    /// last of the payload's bytes? Unlike [`Self::is_done`], this is true
    /// for the last real fragment *before* it has been acknowledged and
    /// advanced past, which is what the exchange loop needs to decide
    /// whether to tag the frame it's about to build as done.
    pub fn is_last_fragment(&self) -> bool {
        self.offset + MAX_FRAGMENT >= self.payload.len()
    }

    /// Build the next frame to transmit, tagged `command`. `txdone` should
    /// be set by the caller once the logical exchange's send-side is
    /// complete (see the Protocol Engine).
    pub fn build_frame(&self, command: u8, txdone: bool) -> Frame {
        let end = (self.offset + MAX_FRAGMENT).min(self.payload.len());
        let slice = &self.payload[self.offset..end];
        let pwr = self.frames_sent < 2;
        Frame::encode(command, slice, txdone, pwr, self.pid)
    }

    /// Advance past the fragment just acknowledged. The PID bit flips iff
    /// that fragment carried at least one byte of data, so a zero-length
    /// fragment (possible only as the lone frame of an empty payload)
    /// leaves PID untouched.
    pub fn advance(&mut self) {
        let end = (self.offset + MAX_FRAGMENT).min(self.payload.len());
        if end > self.offset {
            self.pid = !self.pid;
        }
        self.offset = end;
        self.frames_sent = self.frames_sent.saturating_add(1);
    }

    /// Current PID bit in use for this payload.
    pub fn pid(&self) -> bool {
        self.pid
    }
}

impl<const N: usize> Default for TransmitAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_immediately_done() {
        let mut asm: TransmitAssembler<64> = TransmitAssembler::new();
        asm.load(b"");
        assert!(asm.is_done());
        assert!(asm.is_last_fragment());
    }

    #[test]
    fn single_short_fragment_is_last_before_being_advanced_past() {
        let mut asm: TransmitAssembler<64> = TransmitAssembler::new();
        asm.load(b"ping");
        assert!(!asm.is_done());
        assert!(asm.is_last_fragment());
    }

    #[test]
    fn fragments_long_payload_into_max_fragment_chunks() {
        let mut asm: TransmitAssembler<64> = TransmitAssembler::new();
        let data = [1u8; 45];
        asm.load(&data);
        assert!(!asm.is_done());
        let first = asm.build_frame(1, false);
        assert_eq!(first.as_bytes()[1] as usize, MAX_FRAGMENT);
        asm.advance();
        assert!(!asm.is_done());
        let second = asm.build_frame(1, true);
        assert_eq!(second.as_bytes()[1] as usize, 15);
        asm.advance();
        assert!(asm.is_done());
    }

    #[test]
    fn pwr_bit_set_only_on_first_two_frames() {
        let mut asm: TransmitAssembler<128> = TransmitAssembler::new();
        let data = [2u8; 3 * MAX_FRAGMENT];
        asm.load(&data);
        let f0 = asm.build_frame(1, false);
        assert_ne!(f0.as_bytes()[0] & 0x40, 0);
        asm.advance();
        let f1 = asm.build_frame(1, false);
        assert_ne!(f1.as_bytes()[0] & 0x40, 0);
        asm.advance();
        let f2 = asm.build_frame(1, true);
        assert_eq!(f2.as_bytes()[0] & 0x40, 0);
    }

    #[test]
    fn load_leaves_pid_unchanged_until_a_fragment_is_advanced_past() {
        let mut asm: TransmitAssembler<16> = TransmitAssembler::new();
        asm.load(b"a");
        let before = asm.pid();
        asm.load(b"b");
        assert_eq!(before, asm.pid());
    }

    #[test]
    fn advance_flips_pid_only_when_the_fragment_carried_data() {
        let mut asm: TransmitAssembler<16> = TransmitAssembler::new();
        asm.load(b"");
        let before = asm.pid();
        asm.advance();
        assert_eq!(before, asm.pid());

        asm.load(b"hi");
        let before = asm.pid();
        asm.advance();
        assert_ne!(before, asm.pid());
    }

    #[test]
    fn pid_flips_once_per_data_fragment_of_a_multi_fragment_payload() {
        let mut asm: TransmitAssembler<128> = TransmitAssembler::new();
        let data = [3u8; 3 * MAX_FRAGMENT];
        asm.load(&data);
        let pid0 = asm.pid();
        asm.advance();
        let pid1 = asm.pid();
        asm.advance();
        let pid2 = asm.pid();
        asm.advance();
        let pid3 = asm.pid();
        assert_ne!(pid0, pid1);
        assert_ne!(pid1, pid2);
        assert_ne!(pid2, pid3);
    }
}
