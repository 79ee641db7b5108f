//! The ambient clock the protocol layer polls against.
//!
//! Kept deliberately synchronous/blocking, mirroring how the existing
//! driver already waits inside `NRF24L01::send`/`scan` — a single
//! Enhanced ShockBurst exchange is short enough that blocking delays of a
//! few milliseconds don't starve the executor in practice.

#[cfg(all(feature = "embassy_rp", not(test)))]
pub fn now_ms() -> u32 {
    embassy_time::Instant::now().as_millis() as u32
}

#[cfg(all(feature = "embassy_rp", not(test)))]
pub fn delay_ms(ms: u32) {
    embassy_time::block_for(embassy_time::Duration::from_millis(ms as u64));
}

/// Under `cargo test` there is no embassy time driver running, so the
/// clock and delay are stubbed out; the protocol layer's timeouts are
/// expressed as poll counts, not wall-clock time, so this is sufficient
/// for exercising its logic.
#[cfg(any(not(feature = "embassy_rp"), test))]
pub fn now_ms() -> u32 {
    0
}

#[cfg(any(not(feature = "embassy_rp"), test))]
pub fn delay_ms(_ms: u32) {}
