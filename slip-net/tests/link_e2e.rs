//! End-to-end tests for slip-net.
//!
//! Each test starts a real link (both threads) over a `UnixStream` pair and
//! plays the far end of the serial line from the test thread.
//!
//! Run:  cargo test --package slip-net --test link_e2e
//! Debug: RUST_LOG=debug cargo test --package slip-net --test link_e2e -- --nocapture

use std::collections::VecDeque;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use slip_core::constants::{buffer_capacity, DEFAULT_MTU, END, ESC, ESC_END};
use slip_core::encoder::frame;
use slip_net::{
    start_with_io, FrameReader, LinkConfig, LinkHandle, LinkId, NetDriver, NetworkStack, Packet,
    Transmit,
};

const TIMEOUT: Duration = Duration::from_secs(5);

// ─── Test stacks ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum TestEvent {
    V4(Vec<u8>),
    V6(Vec<u8>),
    Poll,
    Timer(u32),
}

/// Reports every call on a channel. Optionally brings the link up on attach,
/// and sends whatever is in `outbox` when polled.
struct Reporter {
    events: mpsc::Sender<TestEvent>,
    outbox: Arc<Mutex<VecDeque<Vec<u8>>>>,
    up_on_attach: bool,
}

impl Reporter {
    fn send_outbox(&mut self, packet: &mut Packet<'_>, tx: &mut dyn Transmit) {
        while let Some(data) = self.outbox.lock().unwrap().pop_front() {
            packet.fill(&data);
            tx.transmit(packet).unwrap();
        }
    }
}

impl NetworkStack for Reporter {
    fn attach(&mut self, driver: LinkHandle) {
        if self.up_on_attach {
            driver.up();
        }
    }

    fn ipv4_input(&mut self, packet: &mut Packet<'_>) {
        let _ = self.events.send(TestEvent::V4(packet.as_slice().to_vec()));
        packet.clear();
    }

    fn ipv6_input(&mut self, packet: &mut Packet<'_>) {
        let _ = self.events.send(TestEvent::V6(packet.as_slice().to_vec()));
        packet.clear();
    }

    fn poll(&mut self, packet: &mut Packet<'_>, tx: &mut dyn Transmit) {
        let _ = self.events.send(TestEvent::Poll);
        self.send_outbox(packet, tx);
    }

    fn timer_poll(&mut self, packet: &mut Packet<'_>, tx: &mut dyn Transmit, half_seconds: u32) {
        let _ = self.events.send(TestEvent::Timer(half_seconds));
        self.send_outbox(packet, tx);
    }
}

struct Harness {
    link: LinkHandle,
    remote: UnixStream,
    events: mpsc::Receiver<TestEvent>,
    outbox: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

fn start_reporter(name: &str, poll_interval: Duration, up_on_attach: bool) -> Harness {
    let (local, remote) = UnixStream::pair().unwrap();
    remote.set_read_timeout(Some(TIMEOUT)).unwrap();
    let (events_tx, events) = mpsc::channel();
    let outbox = Arc::new(Mutex::new(VecDeque::new()));
    let stack = Reporter {
        events: events_tx,
        outbox: outbox.clone(),
        up_on_attach,
    };
    let config = LinkConfig {
        name: name.into(),
        poll_interval,
        ..LinkConfig::default()
    };
    let link = start_with_io(LinkId(0), &config, local.try_clone().unwrap(), local, stack).unwrap();
    Harness {
        link,
        remote,
        events,
        outbox,
    }
}

impl Harness {
    /// Next input event, skipping polls.
    fn next_input(&self) -> TestEvent {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(left).expect("no input event") {
                TestEvent::Poll | TestEvent::Timer(_) => continue,
                other => return other,
            }
        }
    }

    fn peer_reader(&self) -> FrameReader<UnixStream> {
        FrameReader::new(self.remote.try_clone().unwrap(), "peer")
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

// ─── Receive path ────────────────────────────────────────────────────────────

#[test]
fn ipv4_datagram_reaches_stack() {
    let mut h = start_reporter("e2e-v4", Duration::from_secs(1), true);
    let mut datagram = vec![0x45, 0x00, 0x00, 0x14];
    datagram.extend_from_slice(&[0u8; 16]);

    let mut wire = vec![END];
    wire.extend_from_slice(&datagram);
    wire.push(END);
    h.remote.write_all(&wire).unwrap();

    assert_eq!(h.next_input(), TestEvent::V4(datagram));
    let snap = h.link.stats().snapshot();
    assert_eq!(snap.rx_packets, 1);
    assert_eq!(snap.rx_ipv4, 1);
}

#[test]
fn ipv6_datagram_reaches_stack() {
    let mut h = start_reporter("e2e-v6", Duration::from_secs(1), true);
    let datagram = vec![0x60, 0x00, 0x00, 0x00, END, ESC];
    h.remote.write_all(&frame(&datagram)).unwrap();
    assert_eq!(h.next_input(), TestEvent::V6(datagram));
}

#[test]
fn escaped_end_is_one_byte_packet() {
    let mut h = start_reporter("e2e-esc", Duration::from_secs(1), true);
    // 0xC0 alone is not an IP header: counted and dropped
    h.remote.write_all(&[END, ESC, ESC_END, END]).unwrap();
    let link = h.link.clone();
    assert!(wait_until(|| link.stats().snapshot().rx_errors == 1));

    h.remote.write_all(&frame(&[0x45, 0x07])).unwrap();
    assert_eq!(h.next_input(), TestEvent::V4(vec![0x45, 0x07]));
    let snap = h.link.stats().snapshot();
    // The END after the escaped byte closed the packet; nothing else came of it
    assert_eq!(snap.rx_packets, 2);
    assert_eq!(snap.rx_errors, 1);
}

#[test]
fn oversized_frame_truncated_without_fault() {
    let mut h = start_reporter("e2e-big", Duration::from_secs(1), true);
    let capacity = buffer_capacity(DEFAULT_MTU);
    let mut wire = vec![END];
    wire.extend(std::iter::repeat(0x45u8).take(capacity + 10));
    wire.push(END);
    h.remote.write_all(&wire).unwrap();

    match h.next_input() {
        TestEvent::V4(data) => assert_eq!(data.len(), capacity),
        other => panic!("expected IPv4, got {:?}", other),
    }
    assert_eq!(h.link.stats().snapshot().rx_dropped, 10);

    // The link keeps working
    h.remote.write_all(&frame(&[0x45, 0x01])).unwrap();
    assert_eq!(h.next_input(), TestEvent::V4(vec![0x45, 0x01]));
}

#[test]
fn input_ignored_until_up() {
    let mut h = start_reporter("e2e-down", Duration::from_millis(20), false);
    h.remote.write_all(&frame(&[0x45, 0x01])).unwrap();
    thread::sleep(Duration::from_millis(200));
    assert!(h.events.try_recv().is_err(), "down link must not call the stack");

    h.link.up();
    h.remote.write_all(&frame(&[0x45, 0x02])).unwrap();
    assert_eq!(h.next_input(), TestEvent::V4(vec![0x45, 0x02]));
}

// ─── Transmit path ───────────────────────────────────────────────────────────

#[test]
fn notify_sends_without_waiting_for_interval() {
    let h = start_reporter("e2e-notify", Duration::from_secs(30), true);
    let mut peer = h.peer_reader();
    let mut buf = [0u8; 64];

    h.outbox.lock().unwrap().push_back(vec![0x45, 0x10, END]);
    let start = Instant::now();
    h.link.notify_tx_available();

    let len = peer.next_packet(&mut buf).unwrap();
    assert_eq!(&buf[..len], &[0x45, 0x10, END]);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn periodic_timer_polls() {
    let h = start_reporter("e2e-timer", Duration::from_millis(50), true);
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match h.events.recv_timeout(left).expect("no timer poll") {
            TestEvent::Poll => continue,
            TestEvent::Timer(n) => {
                assert!(n >= 1);
                break;
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn no_polls_while_down() {
    let h = start_reporter("e2e-quiet", Duration::from_millis(20), false);
    thread::sleep(Duration::from_millis(200));
    assert!(h.events.try_recv().is_err());
    h.link.up();
    let event = h.events.recv_timeout(TIMEOUT).unwrap();
    assert!(matches!(event, TestEvent::Poll | TestEvent::Timer(_)));
}

// ─── Gate ────────────────────────────────────────────────────────────────────

/// Echoes every input as `45 AA n` and, on poll, sends the outbox. Counts
/// any call that starts while another is still running.
struct Exclusive {
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicU64>,
    outbox: Arc<Mutex<VecDeque<Vec<u8>>>>,
    follow_up: bool,
}

impl Exclusive {
    fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::yield_now();
    }

    fn leave(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl NetworkStack for Exclusive {
    fn attach(&mut self, driver: LinkHandle) {
        driver.up();
    }

    fn ipv4_input(&mut self, packet: &mut Packet<'_>) {
        self.enter();
        let seq = packet.as_slice()[2];
        if self.follow_up {
            self.outbox.lock().unwrap().push_back(vec![0x45, 0xBB, seq]);
        }
        packet.fill(&[0x45, 0xAA, seq]);
        self.leave();
    }

    fn ipv6_input(&mut self, packet: &mut Packet<'_>) {
        self.enter();
        packet.clear();
        self.leave();
    }

    fn poll(&mut self, packet: &mut Packet<'_>, tx: &mut dyn Transmit) {
        self.enter();
        while let Some(data) = self.outbox.lock().unwrap().pop_front() {
            packet.fill(&data);
            let _ = tx.transmit(packet);
        }
        self.leave();
    }
}

fn start_exclusive(name: &str, follow_up: bool) -> (LinkHandle, UnixStream, Exclusive) {
    let (local, remote) = UnixStream::pair().unwrap();
    remote.set_read_timeout(Some(TIMEOUT)).unwrap();
    let busy = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicU64::new(0));
    let outbox = Arc::new(Mutex::new(VecDeque::new()));
    let make = || Exclusive {
        busy: busy.clone(),
        overlaps: overlaps.clone(),
        outbox: outbox.clone(),
        follow_up,
    };
    let config = LinkConfig {
        name: name.into(),
        poll_interval: Duration::from_millis(5),
        ..LinkConfig::default()
    };
    let link =
        start_with_io(LinkId(1), &config, local.try_clone().unwrap(), local, make()).unwrap();
    (link, remote, make())
}

#[test]
fn stack_calls_never_overlap() {
    const N: u8 = 200;
    let (link, remote, stack) = start_exclusive("e2e-gate", false);

    let mut writer = remote.try_clone().unwrap();
    let sender = thread::spawn(move || {
        for i in 0..N {
            writer.write_all(&frame(&[0x45, 0x01, i])).unwrap();
        }
    });

    let outbox = stack.outbox.clone();
    let driver = link.clone();
    let originator = thread::spawn(move || {
        for i in 0..N {
            outbox.lock().unwrap().push_back(vec![0x45, 0xBB, i]);
            driver.notify_tx_available();
        }
    });

    let mut peer = FrameReader::new(remote, "peer");
    let mut buf = [0u8; 64];
    let (mut replies, mut originated) = (0, 0);
    for _ in 0..(2 * N as usize) {
        let len = peer.next_packet(&mut buf).unwrap();
        // Interleaved frames would show up as odd lengths or stray bytes
        assert_eq!(len, 3, "frame corrupted: {:02x?}", &buf[..len]);
        assert_eq!(buf[0], 0x45);
        match buf[1] {
            0xAA => replies += 1,
            0xBB => originated += 1,
            other => panic!("unexpected marker {:#04x}", other),
        }
    }
    sender.join().unwrap();
    originator.join().unwrap();

    assert_eq!(replies, N as usize);
    assert_eq!(originated, N as usize);
    assert_eq!(stack.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(peer.violations(), 0);
}

#[test]
fn inline_reply_precedes_later_poll_output() {
    let (_link, mut remote, _stack) = start_exclusive("e2e-order", true);
    let mut peer = FrameReader::new(remote.try_clone().unwrap(), "peer");
    let mut buf = [0u8; 64];

    for seq in 0..20u8 {
        remote.write_all(&frame(&[0x45, 0x01, seq])).unwrap();
        let len = peer.next_packet(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[0x45, 0xAA, seq]);
        let len = peer.next_packet(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[0x45, 0xBB, seq]);
    }
}
