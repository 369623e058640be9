#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::timer::timg::TimerGroup;
use log::info;
use static_cell::StaticCell;

use radar_proxy::ble::BleController;
use radar_proxy::config;
use radar_proxy::signals::toggle_shutdown;
use radar_proxy::tasks;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(config::LOG_LEVEL);

    // Initialise heap allocator for BLE support (64KB - BLE requires significant heap)
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Status LED on GPIO48, off until the first blink (active low)
    let led = Output::new(peripherals.GPIO48, Level::High, OutputConfig::default());

    // BOOT button starts and stops the bridge
    let button = Input::new(peripherals.GPIO0, InputConfig::default().with_pull(Pull::Up));

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Random static address from the eFuse MAC (top two bits set)
    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    let address: [u8; 6] = [mac[5], mac[4], mac[3], mac[2], mac[1], mac[0] | 0xC0];

    // Initialise esp-radio for BLE support (must be after esp_rtos::start)
    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialize esp-radio")
    );

    // Create BLE connector (ownership is passed to ExternalController)
    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    ).expect("Failed to initialize BLE connector");

    // Wrap in ExternalController for trouble-host compatibility
    let controller: BleController = trouble_host::prelude::ExternalController::new(ble_connector);

    info!("[Main] Setup complete");

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, led, button, controller, address));
    })
}

#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    led: Output<'static>,
    button: Input<'static>,
    ble_controller: BleController,
    address: [u8; 6],
) {
    spawner.must_spawn(led_task(led));
    spawner.must_spawn(button_task(button));
    spawner.must_spawn(ble_host_task(ble_controller, address));
}

/// Task that blinks the status LED
#[embassy_executor::task]
async fn led_task(led: Output<'static>) {
    tasks::led_task(led).await;
}

/// Task that toggles the bridge on every button press
#[embassy_executor::task]
async fn button_task(mut button: Input<'static>) {
    loop {
        button.wait_for_falling_edge().await;
        if toggle_shutdown() {
            info!("[Main] Button pressed, starting bridge");
        } else {
            info!("[Main] Button pressed, stopping bridge");
        }
        // Debounce
        embassy_time::Timer::after_millis(250).await;
    }
}

/// Task that runs the BLE host with both roles
#[embassy_executor::task]
async fn ble_host_task(controller: BleController, address: [u8; 6]) {
    tasks::ble_task(controller, address).await;
}
