use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tn3270_core::buffer::{ScreenBuffer, ScreenSize};
use tn3270_core::codes::AidKey;
use tn3270_core::datastream::DataStreamProcessor;
use tn3270_core::ebcdic::CodePage;

fn sample_write_stream() -> Vec<u8> {
    // EW, WCC, then two fields ("USER:" protected, input unprotected) and a
    // repeat-to-address fill, mirroring seed scenario S4's buffer layout.
    vec![
        0x05, 0xC3, // EW, WCC (reset MDT + restore keyboard)
        0x1D, 0x20, // SF protected
        0xE4, 0xE2, 0xC5, 0xD9, 0x7A, // "USER:" in EBCDIC
        0x1D, 0x00, // SF unprotected
        0x3C, 0x00, 0x50, 0x40, // RA to address 80 with space
        0x13, // IC
    ]
}

fn bench_parse_write_stream(c: &mut Criterion) {
    let data = sample_write_stream();
    c.bench_function("parse_write_stream", |b| {
        b.iter(|| {
            let mut buffer = ScreenBuffer::new(ScreenSize::Model2);
            let mut processor = DataStreamProcessor::new();
            black_box(processor.process(black_box(&mut buffer), black_box(&data))).unwrap();
        })
    });
}

fn bench_read_modified_response(c: &mut Criterion) {
    let data = sample_write_stream();
    let mut buffer = ScreenBuffer::new(ScreenSize::Model2);
    let mut processor = DataStreamProcessor::new();
    processor.process(&mut buffer, &data).unwrap();
    buffer.write_at(7, 0xC1, false).unwrap();

    c.bench_function("read_modified_response", |b| {
        b.iter(|| {
            black_box(processor.read_modified_response(black_box(&buffer), AidKey::Enter))
        })
    });
}

fn bench_ebcdic_decode_row(c: &mut Criterion) {
    let page: &CodePage = CodePage::cp037();
    let row: Vec<u8> = (0u8..=255).cycle().take(80).collect();

    c.bench_function("ebcdic_decode_row", |b| {
        b.iter(|| black_box(page.decode_all(black_box(&row))))
    });
}

criterion_group!(
    benches,
    bench_parse_write_stream,
    bench_read_modified_response,
    bench_ebcdic_decode_row
);
criterion_main!(benches);
