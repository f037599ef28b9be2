//! Homeward firmware entry point.
//!
//! Boot order:
//! 1. Read the reset reason (before the SoftDevice claims POWER) and bring
//!    up the board and panel.
//! 2. Decide between cold boot, resume and re-sleep.
//! 3. Enable the SoftDevice, load the configuration from flash.
//! 4. Spawn the GPS, BLE and button tasks, then run the 20 ms main loop.
//!
//! The main loop owns the [`Controller`] and is the only place that
//! touches device state; the other tasks publish through channels and
//! atomics.

#![no_std]
#![no_main]

use core::mem;

use defmt::{info, unwrap, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_nrf::interrupt::{InterruptExt, Priority};
use embassy_nrf::peripherals::{SPI2, TIMER0, UARTE0};
use embassy_nrf::saadc::{self, ChannelConfig, Saadc};
use embassy_nrf::spim::{self, Spim};
use embassy_nrf::uarte::{self, Uarte, UarteRxWithIdle};
use embassy_nrf::{bind_interrupts, interrupt};
use embassy_time::{Delay, Duration, Instant, Ticker};
use embedded_hal_bus::spi::ExclusiveDevice;
use nrf_softdevice::{raw, Flash, Softdevice};
use panic_probe as _;
use static_cell::StaticCell;

use homeward::battery::BatteryReading;
use homeward::ble::server::{self, Server};
use homeward::ble::{COMMANDS, LINK_EVENTS, REPORTS};
use homeward::board::{self, Board};
use homeward::config::{BLE_ATT_MTU, BLE_DEVICE_NAME, LOOP_PERIOD_MS};
use homeward::fix::{FixTracker, NavigationFix};
use homeward::gps::{self, FIX_UPDATES};
use homeward::power::{self, NrfPower};
use homeward::power_logic::{self, BootDecision};
use homeward::remote::status_report;
use homeward::settings::PersistedConfig;
use homeward::storage::ConfigStore;
use homeward::ui::display::EpaperPanel;
use homeward::ui::{buttons, view, ActiveScreen};
use homeward::{Controller, Effect, Effects};

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<UARTE0>;
    SPIM2_SPIS2_SPI2 => spim::InterruptHandler<SPI2>;
    SAADC => saadc::InterruptHandler;
});

type Panel = EpaperPanel<
    ExclusiveDevice<Spim<'static, SPI2>, Output<'static>, Delay>,
    Input<'static>,
    Output<'static>,
    Output<'static>,
    Delay,
>;

/// How often the battery is re-sampled.
const BATTERY_INTERVAL: Duration = Duration::from_secs(60);

static SERVER: StaticCell<Server> = StaticCell::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn gps_runner(rx: UarteRxWithIdle<'static, UARTE0, TIMER0>) -> ! {
    gps::gps_task(rx).await
}

#[embassy_executor::task]
async fn ble_runner(sd: &'static Softdevice, server: &'static Server) -> ! {
    server::ble_task(sd, server).await
}

#[embassy_executor::task]
async fn button_runner(button: Input<'static>) -> ! {
    buttons::button_task(button).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("homeward starting");
    let wake = power::read_wake_cause();

    // The SoftDevice reserves priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);
    interrupt::UARTE0_UART0.set_priority(Priority::P3);
    interrupt::SPIM2_SPIS2_SPI2.set_priority(Priority::P3);
    interrupt::SAADC.set_priority(Priority::P3);

    let mut board = Board::new(
        Output::new(p.P0_04, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_27, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_26, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_05, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_23, Level::Low, OutputDrive::Standard),
    );
    // The panel sits on the switched rail.
    board.rail.set_high();

    let mut spi_config = spim::Config::default();
    spi_config.frequency = spim::Frequency::M4;
    let spim = Spim::new_txonly(p.SPI2, Irqs, p.P0_14, p.P0_13, spi_config);
    let cs = Output::new(p.P0_15, Level::High, OutputDrive::Standard);
    let spi = ExclusiveDevice::new(spim, cs, Delay).unwrap_or_else(|e| match e {});
    let mut panel: Panel = unwrap!(EpaperPanel::new(
        spi,
        Input::new(p.P0_16, Pull::None),
        Output::new(p.P0_03, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_17, Level::High, OutputDrive::Standard),
        Delay,
    ));

    let decision = {
        let defaults = PersistedConfig::default();
        let no_fix = NavigationFix::default();
        let mut hw = NrfPower::new(&mut board, |screen| {
            show(&mut panel, screen, &defaults, &no_fix, None)
        });
        power_logic::handle_wake(wake, &mut hw)
    };

    let sd = Softdevice::enable(&softdevice_config());
    let server = SERVER.init(unwrap!(Server::new(sd)));
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let mut store = ConfigStore::new(Flash::take(sd));
    let config = store.load().await;

    let now = Instant::now().as_millis();
    let controller = match decision {
        BootDecision::ColdBoot => {
            board.power_up();
            board.double_pulse().await;
            Controller::cold_boot(config, now)
        }
        BootDecision::Resume => Controller::resumed(config, now),
        // The sleep sequence ends in System OFF.
        BootDecision::ReSleep => loop {
            cortex_m::asm::wfe();
        },
    };

    let mut uart_config = uarte::Config::default();
    uart_config.baudrate = uarte::Baudrate::BAUD9600;
    uart_config.parity = uarte::Parity::EXCLUDED;
    let uart = Uarte::new(p.UARTE0, Irqs, p.P0_21, p.P0_22, uart_config);
    let (_gps_tx, gps_rx) = uart.split_with_idle(p.TIMER0, p.PPI_CH0, p.PPI_CH1);

    let mut adc = Saadc::new(
        p.SAADC,
        Irqs,
        saadc::Config::default(),
        [ChannelConfig::single_ended(p.P0_02)],
    );
    adc.calibrate().await;
    let battery = board::sample_battery(&mut adc).await;

    unwrap!(spawner.spawn(gps_runner(gps_rx)));
    unwrap!(spawner.spawn(ble_runner(sd, server)));
    unwrap!(spawner.spawn(button_runner(Input::new(p.P0_11, Pull::Up))));

    let mut app = App {
        controller,
        fixes: FixTracker::new(),
        panel,
        board,
        store,
        adc,
        battery,
        battery_sampled: Instant::now(),
    };
    app.run().await
}

struct App {
    controller: Controller,
    fixes: FixTracker,
    panel: Panel,
    board: Board,
    store: ConfigStore<Flash>,
    adc: Saadc<'static, 1>,
    battery: Option<BatteryReading>,
    battery_sampled: Instant,
}

impl App {
    async fn run(&mut self) -> ! {
        let mut ticker = Ticker::every(Duration::from_millis(LOOP_PERIOD_MS));
        loop {
            ticker.next().await;

            while let Ok(update) = FIX_UPDATES.try_receive() {
                self.fixes.apply(update);
            }

            if self.battery_sampled.elapsed() >= BATTERY_INTERVAL {
                self.battery = board::sample_battery(&mut self.adc).await;
                self.battery_sampled = Instant::now();
            }

            let now = Instant::now().as_millis();
            let (down, edge) = buttons::sample();
            let effects = self
                .controller
                .poll(now, down, edge, self.fixes.snapshot());
            self.apply(effects).await;

            while let Ok(raw) = COMMANDS.try_receive() {
                let effects = self.controller.handle_remote(&raw);
                self.apply(effects).await;
            }

            while let Ok(link) = LINK_EVENTS.try_receive() {
                let effects = self.controller.link_changed(link);
                self.apply(effects).await;
            }
        }
    }

    async fn apply(&mut self, effects: Effects) {
        for effect in effects {
            match effect {
                Effect::Render => show(
                    &mut self.panel,
                    self.controller.screen(),
                    self.controller.config(),
                    self.fixes.snapshot(),
                    self.battery,
                ),
                Effect::Persist(region) => {
                    if let Err(e) = self.store.commit(region, self.controller.config()).await {
                        warn!("config not saved: {:?}", e);
                    }
                }
                Effect::PushReport => {
                    let volts = self.battery.map(|b| b.supply_volts()).unwrap_or(0.0);
                    REPORTS.signal(status_report(self.controller.config(), volts));
                }
                Effect::Vibrate(ms) => self.board.vibrate(ms).await,
                Effect::Beep => self.board.beep().await,
                Effect::EnterSleep => {
                    let config = self.controller.config();
                    let fix = self.fixes.snapshot();
                    let battery = self.battery;
                    let panel = &mut self.panel;
                    let mut hw = NrfPower::new(&mut self.board, |screen| {
                        show(panel, screen, config, fix, battery)
                    });
                    power_logic::enter_sleep(&mut hw);
                }
            }
        }
    }
}

/// Draw one screen; a failed refresh is logged and the old image stays.
fn show(
    panel: &mut Panel,
    screen: ActiveScreen,
    config: &PersistedConfig,
    fix: &NavigationFix,
    battery: Option<BatteryReading>,
) {
    let percent = battery.map(|b| b.percent()).unwrap_or(0);
    let frame = view::frame(screen, config, fix, percent);
    if let Err(e) = panel.show(&frame) {
        warn!("display refresh failed: {:?}", e);
    }
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: BLE_ATT_MTU,
        }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: BLE_DEVICE_NAME.as_ptr() as _,
            current_len: BLE_DEVICE_NAME.len() as u16,
            max_len: BLE_DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}
