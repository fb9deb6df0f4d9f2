//! One test per literal seed scenario named in the protocol core's worked
//! examples: exact bytes in, exact bytes or buffer state out.

use tn3270_core::actions::{self, Action, SessionMode};
use tn3270_core::buffer::{addressing, ScreenBuffer, ScreenSize};
use tn3270_core::codes::{AidKey, ATTR_PROTECTED, CMD_WRITE, ORDER_RA, ORDER_SBA, ORDER_SF};
use tn3270_core::datastream::DataStreamProcessor;
use tn3270_core::ebcdic::CodePage;
use tn3270_core::telnet;

fn cp() -> &'static CodePage {
    CodePage::cp037()
}

/// S1. RA wraparound: 24x80 buffer, cursor at 1900, order bytes
/// `\x3C \x00\x04 \x40` (RA to address 4 with EBCDIC space). Cells
/// 1900..1919, then 0..3, become space; address 4 itself is untouched;
/// the cursor ends up at 4, not 5.
#[test]
fn s1_repeat_to_address_wraps_and_stops_before_target() {
    let mut buf = ScreenBuffer::new(ScreenSize::Model2);
    let (hi, lo) = addressing::encode_14bit(1900);
    let mut proc = DataStreamProcessor::new();
    let data = vec![CMD_WRITE, 0x00, ORDER_SBA, hi, lo, ORDER_RA, 0x00, 0x04, 0x40];
    assert_eq!(ORDER_RA, 0x3C);
    proc.process(&mut buf, &data).unwrap();

    for addr in 1900..1920 {
        assert_eq!(buf.read_at(addr as u16), Some(0x40), "cell {addr} should be space");
    }
    for addr in 0..4 {
        assert_eq!(buf.read_at(addr as u16), Some(0x40), "cell {addr} should be space");
    }
    assert_eq!(buf.read_at(4), Some(0x00), "stop address itself is left untouched");
    assert_eq!(buf.cursor(), 4);
}

/// S2. 12-bit addressing: SBA with `\x11 \x40 \xC1`. Top bits `01` select
/// 12-bit addressing; decoded address is 1.
#[test]
fn s2_sba_decodes_12bit_address() {
    let mut buf = ScreenBuffer::new(ScreenSize::Model2);
    let mut proc = DataStreamProcessor::new();
    let data = vec![CMD_WRITE, 0x00, ORDER_SBA, 0x40, 0xC1];
    proc.process(&mut buf, &data).unwrap();
    assert_eq!(buf.cursor(), 1);
}

/// S3. Negotiation fallback: the host never offers TN3270E (and never
/// completes its sub-negotiation); the terminal still settles into usable
/// plain-3270 mode, and a Write command sent afterward parses normally.
#[tokio::test]
async fn s3_negotiation_falls_back_to_basic_3270_and_keeps_parsing() {
    use tn3270_core::config::{SessionConfig, TimingProfile};
    use tn3270_core::{logging, Session};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        use telnet::*;
        let (mut sock, _) = listener.accept().await.unwrap();
        // Host drives both directions of BINARY/SUPPRESS-GO-AHEAD/EOR to a
        // usable trio, offers TERMINAL-TYPE, but never brings up TN3270E.
        sock.write_all(&encode_negotiation(WILL, OPT_BINARY)).await.unwrap();
        sock.write_all(&encode_negotiation(DO, OPT_BINARY)).await.unwrap();
        sock.write_all(&encode_negotiation(WILL, OPT_SUPPRESS_GO_AHEAD)).await.unwrap();
        sock.write_all(&encode_negotiation(DO, OPT_SUPPRESS_GO_AHEAD)).await.unwrap();
        sock.write_all(&encode_negotiation(WILL, OPT_END_OF_RECORD)).await.unwrap();
        sock.write_all(&encode_negotiation(DO, OPT_END_OF_RECORD)).await.unwrap();
        sock.write_all(&encode_negotiation(DO, OPT_TERMINAL_TYPE)).await.unwrap();
        sock.write_all(&encode_negotiation(WONT, OPT_TN3270E)).await.unwrap();

        // Drain whatever replies the terminal sends during negotiation.
        let mut drain = [0u8; 256];
        let _ = tokio::time::timeout(std::time::Duration::from_millis(200), sock.read(&mut drain)).await;

        // Now push a Write command: "HI" at the top-left, keyboard restored.
        let payload = [CMD_WRITE, 0x02, 0xC8, 0xC9]; // WCC_RESTORE, EBCDIC 'H' 'I'
        sock.write_all(&payload).await.unwrap();
        sock.write_all(&[IAC, EOR]).await.unwrap();

        let mut buf = [0u8; 256];
        let _ = sock.read(&mut buf).await;
        sock
    });

    let mut config = SessionConfig::new();
    config.timing_profile = TimingProfile::Aggressive;
    let session = Session::connect(&addr.to_string(), config, logging::null()).await.unwrap();

    let snapshot = session.read_screen(std::time::Duration::from_secs(1)).await.unwrap();
    assert!(snapshot.rows[0].starts_with("HI"), "row 0 was {:?}", snapshot.rows[0]);

    session.close().await.unwrap();
    let _ = server.await.unwrap();
}

/// S4. Read-Modified: field A (protected, "USER:") at address 0, field B
/// (unprotected) at address 6. The user types "ABC" at address 7. On Enter,
/// only field B's edit is reported: AID, cursor address, one SBA + content.
#[test]
fn s4_read_modified_reports_only_the_user_edited_field() {
    let mut buf = ScreenBuffer::new(ScreenSize::Model2);
    let mut mode = SessionMode::default();

    // Host paints the prior screen: a protected label field and an
    // unprotected entry field, via the same Write path a real host uses.
    let mut write_data = vec![CMD_WRITE, 0x00, ORDER_SBA];
    let (hi, lo) = addressing::encode_12bit(0);
    write_data.push(hi);
    write_data.push(lo);
    write_data.push(ORDER_SF);
    write_data.push(ATTR_PROTECTED);
    for ch in "USER:".chars() {
        write_data.push(cp().encode(ch).unwrap());
    }
    write_data.push(ORDER_SF);
    write_data.push(0x00); // unprotected
    let mut proc = DataStreamProcessor::new();
    proc.process(&mut buf, &write_data).unwrap();

    assert!(!buf.fields()[0].is_modified(), "host paint must not set MDT");
    assert!(!buf.fields()[1].is_modified(), "host paint must not set MDT");

    buf.set_cursor(7);
    actions::dispatch(&Action::InsertText("ABC".to_string()), &mut buf, &mut mode, cp()).unwrap();
    let effect = actions::dispatch(&Action::Enter, &mut buf, &mut mode, cp()).unwrap();
    assert_eq!(effect, actions::Effect::Aid(AidKey::Enter));

    let response = proc.read_modified_response(&buf, AidKey::Enter);

    let mut expected = vec![AidKey::Enter.to_u8()];
    let (cur_hi, cur_lo) = addressing::encode_12bit(buf.cursor());
    expected.push(cur_hi);
    expected.push(cur_lo);
    expected.push(ORDER_SBA);
    let (addr_hi, addr_lo) = addressing::encode_12bit(7);
    expected.push(addr_hi);
    expected.push(addr_lo);
    expected.push(cp().encode('A').unwrap());
    expected.push(cp().encode('B').unwrap());
    expected.push(cp().encode('C').unwrap());

    assert_eq!(response, expected);
}

/// S5. Peer close: while idle, the underlying stream returns 0 bytes; the
/// session becomes unusable immediately, and subsequent calls raise
/// `NotConnected`.
#[tokio::test]
async fn s5_peer_close_fails_pending_and_subsequent_calls() {
    use tn3270_core::config::{SessionConfig, TimingProfile};
    use tn3270_core::error::Error;
    use tn3270_core::{logging, Session};
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        use telnet::*;
        let (mut sock, _) = listener.accept().await.unwrap();
        sock.write_all(&encode_negotiation(WILL, OPT_BINARY)).await.unwrap();
        sock.write_all(&encode_negotiation(DO, OPT_BINARY)).await.unwrap();
        sock.write_all(&encode_negotiation(WILL, OPT_SUPPRESS_GO_AHEAD)).await.unwrap();
        sock.write_all(&encode_negotiation(DO, OPT_SUPPRESS_GO_AHEAD)).await.unwrap();
        sock.write_all(&encode_negotiation(WILL, OPT_END_OF_RECORD)).await.unwrap();
        sock.write_all(&encode_negotiation(DO, OPT_END_OF_RECORD)).await.unwrap();
        sock.write_all(&encode_negotiation(WONT, OPT_TN3270E)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        // Dropping the socket here delivers a zero-length read to the client.
    });

    let mut config = SessionConfig::new();
    config.timing_profile = TimingProfile::Aggressive;
    let session = Session::connect(&addr.to_string(), config, logging::null()).await.unwrap();
    let _ = server.await.unwrap();

    let result = session.read_screen(std::time::Duration::from_secs(2)).await;
    assert!(matches!(result, Err(Error::NotConnected)), "expected NotConnected, got {result:?}");

    let result = session.send_action(Action::Enter).await;
    assert!(matches!(result, Err(Error::NotConnected)), "expected NotConnected, got {result:?}");
}

/// S6. Field attribute hidden from display: a Write places a field-attribute
/// byte at address 160 (column 0 of row 2 on an 80-column screen). That
/// position renders as space, and `fields()` reports a field whose data
/// starts one past it, at 161.
#[test]
fn s6_field_attribute_byte_is_hidden_from_render() {
    let mut buf = ScreenBuffer::new(ScreenSize::Model2);
    let mut proc = DataStreamProcessor::new();
    let (hi, lo) = addressing::encode_14bit(160);
    let data = vec![CMD_WRITE, 0x00, ORDER_SBA, hi, lo, ORDER_SF, 0xE8];
    proc.process(&mut buf, &data).unwrap();

    let row2 = buf.row_text(2, cp()).unwrap();
    assert_eq!(row2.chars().next(), Some(' '));

    let fields = buf.fields();
    let field = fields.iter().find(|f| f.address == 160).expect("field at 160");
    assert_eq!(field.data_start(buf.len()), 161);
}
