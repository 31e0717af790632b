use core::convert::Infallible;

use zcmd_dht11::{
    Climate, Command, DeviceRole, ExtAddr, FreeData, HostRuntime, Notification, RxConfig,
    RxEvent, SerialLink, SharedRing, RX_BUFFER_SIZE,
};

#[derive(Default)]
struct Wire(Vec<u8>);

impl embedded_io::ErrorType for Wire {
    type Error = Infallible;
}

impl embedded_io::Write for Wire {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

struct Coordinator {
    free_data: Vec<Vec<u8>>,
}

impl HostRuntime for Coordinator {
    fn role(&self) -> DeviceRole {
        DeviceRole::Coordinator
    }

    fn short_addr(&self) -> u16 {
        0
    }

    fn coord_short_addr(&self) -> u16 {
        0
    }

    fn invoke_binding(&mut self) -> bool {
        true
    }

    fn send_free_data(&mut self, data: &FreeData) {
        self.free_data.push(data.payload().to_vec());
    }

    fn send_control(&mut self, _dst: ExtAddr, _data: &FreeData) {}

    fn report_climate(&mut self, _climate: Climate) {}
}

struct Harness {
    rx: SharedRing<RX_BUFFER_SIZE>,
    link: SerialLink<RX_BUFFER_SIZE>,
    host: Coordinator,
    wire: Wire,
}

impl Harness {
    fn new() -> Self {
        Self {
            rx: SharedRing::new(RxConfig::default()),
            link: SerialLink::new(),
            host: Coordinator {
                free_data: Vec::new(),
            },
            wire: Wire::default(),
        }
    }

    fn receive(&self, block: &[u8]) {
        self.rx.on_rx_event(RxEvent::IdleTimeout, block).unwrap();
    }

    fn poll(&mut self) -> Option<Command> {
        self.link
            .poll(&self.rx, &mut self.host, &mut self.wire)
            .unwrap()
    }

    fn output(&self) -> &str {
        core::str::from_utf8(&self.wire.0).unwrap()
    }
}

#[test]
fn echo_send_command_end_to_end() {
    let mut h = Harness::new();
    h.receive(b"@ZB+ECHOSDATA=1!");

    assert_eq!(h.poll(), Some(Command::EchoSendOn));
    assert!(h.link.session().echo_send);
    assert_eq!(h.output(), "OK\r\n");
    assert_eq!(h.rx.available(), 0);
}

#[test]
fn line_noise_before_a_frame_is_skipped() {
    let mut h = Harness::new();
    h.receive(b"\r\n\0garbage@ZB!");

    assert_eq!(h.poll(), Some(Command::CheckAlive));
    assert_eq!(h.output(), "OK\r\n");
}

#[test]
fn frame_split_across_blocks() {
    let mut h = Harness::new();
    h.receive(b"@ZB+DA");

    assert_eq!(h.poll(), None);
    assert!(h.output().is_empty());

    h.receive(b"TA=hello!");
    assert_eq!(h.poll(), Some(Command::SendFreeData));
    assert_eq!(h.host.free_data, [b"hello".to_vec()]);
    assert_eq!(h.output(), "OK\r\n");
}

#[test]
fn one_frame_per_poll() {
    let mut h = Harness::new();
    h.receive(b"@ZB+SHORTADDR!@ZB+COORDSHORTADDR!@ZB+NOPE!");

    assert_eq!(h.poll(), Some(Command::ShortAddress));
    assert_eq!(h.poll(), Some(Command::CoordShortAddress));
    assert_eq!(h.poll(), None);
    assert_eq!(h.poll(), None);

    assert_eq!(h.output(), "0\r\nCOORDINATOR!\r\nERROR\r\n");
}

#[test]
fn received_data_is_forwarded_after_echo_on() {
    let mut h = Harness::new();
    let incoming = Notification::FreeData {
        rssi: -71,
        short_addr: 0x1234,
        endpoint: 8,
        coord_addr: 0,
        data: b"ping",
    };

    assert_eq!(h.link.notify(&incoming, &mut h.wire), Ok(false));

    h.receive(b"@ZB+ECHORDATA=1!");
    assert_eq!(h.poll(), Some(Command::EchoReceiveOn));
    assert_eq!(h.link.notify(&incoming, &mut h.wire), Ok(true));

    assert_eq!(h.output(), "OK\r\n@ZBR:-71;4660;8;0;4;ping!\r\n");
}

#[test]
fn link_recovers_from_a_buffer_full_of_unterminated_frame() {
    let mut h = Harness::new();
    let mut noise = vec![b'@'];
    noise.resize(RX_BUFFER_SIZE, b'x');
    h.receive(&noise);
    assert!(h.rx.on_rx_event(RxEvent::IdleTimeout, b"@ZB!").is_err());

    assert_eq!(h.poll(), None);
    assert_eq!(h.rx.available(), 0);

    h.receive(b"@ZB!");
    assert_eq!(h.poll(), Some(Command::CheckAlive));
    assert_eq!(h.output(), "OK\r\n");
}
