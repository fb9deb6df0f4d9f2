//! Property-based checks for the protocol core's universal invariants:
//! address arithmetic stays in range, EBCDIC round trips over its bijective
//! subset, and RA's wraparound fill count matches the formula for "target
//! at or behind current position".

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tn3270_core::buffer::{ScreenBuffer, ScreenSize};
use tn3270_core::datastream::DataStreamProcessor;
use tn3270_core::ebcdic::CodePage;

fn cp() -> &'static CodePage {
    CodePage::cp037()
}

/// Truncated orders and unknown order bytes are recorded/skipped, never
/// panics — fuzz the parser with random transmissions seeded for
/// reproducibility.
#[test]
fn data_stream_processor_never_panics_on_arbitrary_bytes() {
    let mut rng = StdRng::seed_from_u64(0x3270);
    for _ in 0..256 {
        let len = rng.gen_range(0..64);
        let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        let mut buf = ScreenBuffer::new(ScreenSize::Model2);
        let mut proc = DataStreamProcessor::new();
        let _ = proc.process(&mut buf, &data);
        assert!((buf.cursor() as usize) < buf.len());
    }
}

proptest! {
    /// For every address and every supported screen size, `set_cursor`
    /// always lands the cursor in `[0, rows*cols)` — wraparound, never an
    /// out-of-range cursor.
    #[test]
    fn cursor_address_always_in_range(raw in any::<u16>()) {
        for size in [ScreenSize::Model2, ScreenSize::Model3, ScreenSize::Model4, ScreenSize::Model5] {
            let mut buf = ScreenBuffer::new(size);
            buf.set_cursor(raw);
            prop_assert!((buf.cursor() as usize) < buf.len());
        }
    }

    /// Every EBCDIC byte in the bijective subset of CP037 (the bytes with a
    /// real Latin-1 counterpart under 256) round-trips through
    /// `encode(decode(b)) == b`.
    #[test]
    fn cp037_round_trips_bijective_bytes(byte in any::<u8>()) {
        let page = cp();
        let ch = page.decode(byte);
        if let Some(back) = page.encode(ch) {
            prop_assert_eq!(back, byte);
        }
    }

    /// RA from `current` to `target` on a 1920-cell buffer fills exactly
    /// `(1920 - current) + target` cells when `target <= current` (the
    /// wraparound case, `target == current` being a full-buffer wrap: a
    /// fill count of `N` rather than `0`) and `target - current` cells when
    /// `target > current` — and in every case leaves the cursor at
    /// `target`.
    #[test]
    fn repeat_to_address_fills_exactly_the_modular_distance(
        current in 0u16..1920,
        target in 0u16..1920,
    ) {
        let mut buf = ScreenBuffer::new(ScreenSize::Model2);
        buf.set_cursor(current);
        buf.repeat_to_address(0xC1, target);

        let expected = if target <= current {
            (1920 - current as usize) + target as usize
        } else {
            (target - current) as usize
        };

        // Walk the same do-while shape the implementation uses: always
        // visit the starting cell at least once, stop after wrapping back
        // to `target`.
        let mut addr = current as usize;
        let mut filled = 0usize;
        loop {
            prop_assert_eq!(buf.read_at(addr as u16), Some(0xC1));
            filled += 1;
            addr = (addr + 1) % 1920;
            if addr == target as usize {
                break;
            }
        }
        prop_assert_eq!(filled, expected);
        prop_assert_eq!(buf.cursor(), target);
    }
}
