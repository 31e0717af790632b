#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_sync::{blocking_mutex::raw::NoopRawMutex, channel::Channel};
use embassy_time::{Duration, Timer};
use esp_hal::{
    clock::CpuClock,
    delay::Delay,
    gpio::{Flex, Pull},
    timer::systimer::SystemTimer,
    uart::{Config as UartConfig, Uart, UartRx, UartTx},
    Async,
};
use zcmd_dht11::report::{hex_ext_addr, hex_u16};
use zcmd_dht11::{
    Climate, DeviceRole, Dht11, Dht11Config, ExtAddr, FreeData, HostRuntime, LinkConfig,
    OpenDrainLine, OverflowPolicy, RxConfig, RxEvent, SerialLink, SharedRing, RX_BUFFER_SIZE,
};
use {esp_backtrace as _, esp_println as _};

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

const HOST_BAUDRATE: u32 = 115_200;

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

type ClimateChannel = Channel<NoopRawMutex, Climate, 1>;

static RX: SharedRing<RX_BUFFER_SIZE> = SharedRing::new(RxConfig {
    overflow: OverflowPolicy::RejectNew,
});

/// Stand-in for the Zigbee runtime while the node runs on its own: it plays
/// the coordinator and logs what would go over the air.
struct StandaloneNode {
    short_addr: u16,
}

impl HostRuntime for StandaloneNode {
    fn role(&self) -> DeviceRole {
        DeviceRole::Coordinator
    }

    fn short_addr(&self) -> u16 {
        self.short_addr
    }

    fn coord_short_addr(&self) -> u16 {
        self.short_addr
    }

    fn invoke_binding(&mut self) -> bool {
        info!("binding requested, no network attached");
        true
    }

    fn send_free_data(&mut self, data: &FreeData) {
        info!("free data record: {=[u8]:a}", &data.padded()[..]);
    }

    fn send_control(&mut self, dst: ExtAddr, data: &FreeData) {
        info!(
            "control to {=[u8]:a}: {=[u8]:a}",
            &hex_ext_addr(&dst)[..],
            &data.padded()[..]
        );
    }

    fn report_climate(&mut self, climate: Climate) {
        info!(
            "report 0x{=[u8]:a} ({}% {}C)",
            &hex_u16(climate.packed())[..],
            climate.humidity,
            climate.temperature
        );
    }
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    let link_config = LinkConfig::default();

    let uart = match Uart::new(
        peripherals.UART0,
        UartConfig::default().with_baudrate(HOST_BAUDRATE),
    ) {
        Ok(uart) => uart
            .with_rx(peripherals.GPIO20)
            .with_tx(peripherals.GPIO21)
            .into_async(),
        Err(e) => {
            error!("uart config rejected: {:?}", e);
            return;
        }
    };
    let (uart_rx, uart_tx) = uart.split();

    let climate_channel = &*mk_static!(ClimateChannel, Channel::new());

    // The DHT11 data pin: open drain with the board's external pull-up.
    let mut dht_pin = Flex::new(peripherals.GPIO10);
    dht_pin.set_as_open_drain(Pull::None);

    spawner.spawn(uart_rx_task(uart_rx)).ok();
    spawner
        .spawn(command_task(uart_tx, climate_channel, link_config))
        .ok();
    spawner
        .spawn(dht_task(dht_pin, climate_channel, link_config))
        .ok();
    info!("Run in background");
}

#[embassy_executor::task]
async fn uart_rx_task(mut rx: UartRx<'static, Async>) {
    let mut block = [0u8; RX_BUFFER_SIZE];
    loop {
        match rx.read_async(&mut block).await {
            Ok(0) => {}
            Ok(len) => {
                if let Err(e) = RX.on_rx_event(RxEvent::IdleTimeout, &block[..len]) {
                    warn!("rx block truncated: {:?}", e);
                }
            }
            Err(e) => warn!("uart rx error: {:?}", e),
        }
    }
}

#[embassy_executor::task]
async fn command_task(
    mut tx: UartTx<'static, Async>,
    climate_channel: &'static ClimateChannel,
    config: LinkConfig,
) {
    let mut link = SerialLink::<RX_BUFFER_SIZE>::new();
    let mut node = StandaloneNode { short_addr: 0x0000 };

    loop {
        Timer::after(Duration::from_millis(config.poll_period_ms)).await;

        if let Ok(climate) = climate_channel.try_receive() {
            if link.publish(climate, &mut node, &mut tx).is_err() {
                warn!("failed to echo sensor report");
            }
        }

        match link.poll(&RX, &mut node, &mut tx) {
            Ok(Some(command)) => info!("handled {:?}", command),
            Ok(None) => {}
            Err(_) => warn!("failed to write reply"),
        }
    }
}

#[embassy_executor::task]
async fn dht_task(
    pin: Flex<'static>,
    climate_channel: &'static ClimateChannel,
    config: LinkConfig,
) {
    // Unpadded polls are far shorter than the sensor's pulses at full clock.
    let mut dht = Dht11::new(
        OpenDrainLine::new(pin),
        Delay::new(),
        Dht11Config::padded_polls(),
    );
    if dht.init().is_err() {
        warn!("dht11 line init failed");
    }
    // The sensor needs a second after power-up before it answers.
    Timer::after(Duration::from_secs(1)).await;

    loop {
        // Failures are logged by the driver; skip this period and try again.
        if let Ok(climate) = dht.measure() {
            climate_channel.try_send(climate).ok();
        }
        Timer::after(Duration::from_millis(config.sensor_period_ms)).await;
    }
}
