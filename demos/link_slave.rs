#![no_std]
#![no_main]
#![feature(type_alias_impl_trait)]

use embedded_alloc::Heap;
use nrf24_link::{Channel, ChannelEvents, DataRate, NRF24L01, OperatingMode, PALevel, Role, TXConfig};
use panic_probe as _;
use defmt_serial as _;

use core::cell::RefCell;

use embassy_embedded_hal::shared_bus::blocking::spi::SpiDeviceWithConfig;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::UART0;
use embassy_rp::spi::{Blocking, Spi};
use embassy_rp::uart;
use embassy_rp::uart::InterruptHandler;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Timer};

#[global_allocator]
static HEAP: Heap = Heap::empty();

embassy_rp::bind_interrupts!(struct Irqs {
    UART0_IRQ => InterruptHandler<UART0>;
});

/// Logs whatever the Master sent.
struct Logger;

impl ChannelEvents for Logger {
    fn on_rx(&mut self, data: &[u8]) {
        defmt::info!("master said: {:?}", data);
    }

    fn on_link_state(&mut self, up: bool) {
        defmt::info!("link up: {}", up);
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let peripherals_config = embassy_rp::config::Config::default();
    let peripherals = embassy_rp::init(peripherals_config);

    let mut led = Output::new(peripherals.PIN_25, Level::Low);

    let uart0_rx = peripherals.PIN_17;
    let uart0_tx = peripherals.PIN_16;
    let uart0_config = uart::Config::default();
    let uart0 = uart::Uart::new(
        peripherals.UART0,
        uart0_tx,
        uart0_rx,
        Irqs,
        peripherals.DMA_CH0,
        peripherals.DMA_CH1,
        uart0_config,
    );
    defmt_serial::defmt_serial(uart0);

    defmt::info!("setting up SPI0");
    let spi_clk = peripherals.PIN_18;
    let spi_mosi = peripherals.PIN_19;
    let spi_miso = peripherals.PIN_20;
    let spi_cs = peripherals.PIN_21;
    let ce = peripherals.PIN_22;

    let mut spi_config = embassy_rp::spi::Config::default();
    spi_config.frequency = 1_000_000;
    spi_config.phase = embassy_rp::spi::Phase::CaptureOnFirstTransition;
    spi_config.polarity = embassy_rp::spi::Polarity::IdleLow;
    let spi_cs_output = Output::new(spi_cs, Level::Low);
    let spi: Spi<'_, _, Blocking> =
        Spi::new_blocking(peripherals.SPI0, spi_clk, spi_mosi, spi_miso, spi_config.clone());
    let spi_bus: Mutex<NoopRawMutex, _> = Mutex::new(RefCell::new(spi));
    let spi_device = SpiDeviceWithConfig::new(&spi_bus, spi_cs_output, spi_config);
    defmt::info!("set up SPI0");

    let ce_output = Output::new(ce, Level::Low);
    let link_config = TXConfig {
        data_rate: DataRate::R1Mbps,
        channel: 108,
        pa_level: PALevel::Low,
        pipe0_address: *b"abcde",
        max_retries: 3,
        retry_delay: 2,
        ..Default::default()
    };
    let mut radio = NRF24L01::new(spi_device, ce_output).unwrap();
    radio.configure(&OperatingMode::TX(link_config)).unwrap();
    defmt::info!("configured link radio");

    let mut channel: Channel<_, _, 64, 4> = Channel::new(radio, Role::Slave, Logger).with_timeout_ms(200);

    if channel.tx_ready() {
        channel.send(b"pong");
    }

    loop {
        channel.step();
        if channel.link_up() {
            led.set_high();
        } else {
            led.set_low();
        }
        Timer::after(Duration::from_millis(10)).await;
    }
}
