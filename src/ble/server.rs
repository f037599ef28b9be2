//! GATT server, advertising and the connection loop.

use core::sync::atomic::Ordering;

use crate::ble::{
    CommandBytes, COMMANDS, CONN_HANDLE, LINK_EVENTS, NO_CONNECTION, RADIO_ENABLED, REPORTS,
};
use crate::config::{BLE_DEVICE_NAME, BLE_IDLE_TIMEOUT_SECS, BLE_REPORT_MAX};
use crate::controller::LinkState;
use crate::error::{BleError, Error};
use defmt::{debug, info, warn};
use embassy_futures::select::{select, select4, Either, Either4};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Timer};
use heapless::Vec;
use nrf_softdevice::ble::advertisement_builder::{
    Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
};
use nrf_softdevice::ble::{gatt_server, peripheral, Connection};
use nrf_softdevice::{raw, Softdevice};

/// Status report as stored in the characteristic.
pub type ReportBytes = Vec<u8, BLE_REPORT_MAX>;

/// Command / report service, laid out like the Nordic UART service so
/// generic BLE terminal apps can talk to it.
#[nrf_softdevice::gatt_service(uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e")]
pub struct NavService {
    #[characteristic(uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e", write, write_without_response)]
    pub command: CommandBytes,
    #[characteristic(uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e", read, notify)]
    pub status: ReportBytes,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub nav: NavService,
}

/// Service UUID in advertising byte order.
const NAV_SERVICE_UUID_LE: [u8; 16] = [
    0x9e, 0xca, 0xdc, 0x24, 0x0e, 0xe5, 0xa9, 0xe0, 0x93, 0xf3, 0xa3, 0xb5, 0x01, 0x00, 0x40, 0x6e,
];

static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .services_128(ServiceList::Complete, &[NAV_SERVICE_UUID_LE])
    .build();

static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .full_name(BLE_DEVICE_NAME)
    .build();

/// Set on every command write; restarts the idle timer.
static WRITE_ACTIVITY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// The SoftDevice assigns handle 0 to the only advertising set.
const ADV_HANDLE: u8 = 0;

pub async fn ble_task(sd: &'static Softdevice, server: &'static Server) -> ! {
    loop {
        if !RADIO_ENABLED.load(Ordering::Acquire) {
            info!("BLE radio off");
            publish(LinkState::Off);
            // Nothing turns the radio back on before the next boot.
            core::future::pending::<()>().await;
        }

        publish(LinkState::Advertising);
        let conn = match select(advertise(sd), radio_off()).await {
            Either::First(Ok(conn)) => conn,
            Either::First(Err(e)) => {
                warn!("{:?}, retrying", e);
                Timer::after(Duration::from_secs(1)).await;
                continue;
            }
            Either::Second(()) => continue,
        };

        info!("BLE central connected");
        CONN_HANDLE.store(conn.handle().unwrap_or(NO_CONNECTION), Ordering::Release);
        publish(LinkState::Connected);
        WRITE_ACTIVITY.reset();

        let gatt = gatt_server::run(&conn, server, |event| match event {
            ServerEvent::Nav(NavServiceEvent::CommandWrite(data)) => {
                WRITE_ACTIVITY.signal(());
                if COMMANDS.try_send(data).is_err() {
                    warn!("command queue full, write dropped");
                }
            }
            ServerEvent::Nav(NavServiceEvent::StatusCccdWrite { notifications }) => {
                debug!("status notifications: {}", notifications);
            }
        });

        let ended = select4(gatt, notify_reports(server, &conn), idle_timeout(), radio_off()).await;
        CONN_HANDLE.store(NO_CONNECTION, Ordering::Release);
        match ended {
            Either4::First(e) => info!("BLE disconnected: {:?}", e),
            Either4::Second(_) => {}
            Either4::Third(()) => {
                warn!("BLE idle for {} s, powering radio down", BLE_IDLE_TIMEOUT_SECS);
                RADIO_ENABLED.store(false, Ordering::Release);
                if let Err(e) = conn.disconnect() {
                    debug!("disconnect: {:?}", e);
                }
            }
            Either4::Fourth(()) => {
                if let Err(e) = conn.disconnect() {
                    debug!("disconnect: {:?}", e);
                }
            }
        }
    }
}

fn publish(state: LinkState) {
    if LINK_EVENTS.try_send(state).is_err() {
        warn!("link event queue full, dropped {:?}", state);
    }
}

async fn advertise(sd: &Softdevice) -> Result<Connection, Error> {
    let config = peripheral::Config::default();
    let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
        adv_data: &ADV_DATA,
        scan_data: &SCAN_DATA,
    };
    peripheral::advertise_connectable(sd, adv, &config)
        .await
        .map_err(|e| {
            debug!("advertise_connectable: {:?}", e);
            Error::from(BleError::AdvertiseFailed)
        })
}

/// Notify each report the main loop produces to the connected central.
async fn notify_reports(server: &Server, conn: &Connection) -> ! {
    loop {
        let report = REPORTS.wait().await;
        match push_status(server, conn, report.as_bytes()) {
            Ok(()) => {}
            // The central has not subscribed; the value is still readable.
            Err(Error::Ble(BleError::NotifyFailed)) => debug!("status notify skipped"),
            Err(e) => warn!("status not updated: {:?}", e),
        }
    }
}

fn push_status(server: &Server, conn: &Connection, report: &[u8]) -> Result<(), Error> {
    let value = ReportBytes::from_slice(report).unwrap_or_default();
    server.nav.status_set(&value).map_err(|e| {
        debug!("status_set: {:?}", e);
        BleError::StatusUpdate
    })?;
    server
        .nav
        .status_notify(conn, &value)
        .map_err(|_| BleError::NotifyFailed)?;
    Ok(())
}

/// Stop advertising and drop the central from the caller's context.
///
/// Goes straight to the SoftDevice so it works while the executor is
/// blocked in the sleep sequence; the link layer runs in SoftDevice
/// interrupts and sends the termination during the settle delay.
pub fn stop_radio() -> Result<(), Error> {
    RADIO_ENABLED.store(false, Ordering::Release);

    // Not advertising is the only expected failure here.
    let ret = unsafe { raw::sd_ble_gap_adv_stop(ADV_HANDLE) };
    if ret != raw::NRF_SUCCESS {
        debug!("sd_ble_gap_adv_stop: {}", ret);
    }

    let handle = CONN_HANDLE.swap(NO_CONNECTION, Ordering::AcqRel);
    if handle == NO_CONNECTION {
        return Ok(());
    }
    let ret = unsafe {
        raw::sd_ble_gap_disconnect(handle, raw::BLE_HCI_REMOTE_USER_TERMINATED_CONNECTION as u8)
    };
    if ret != raw::NRF_SUCCESS {
        warn!("sd_ble_gap_disconnect({}) returned {}", handle, ret);
        return Err(BleError::DisconnectFailed.into());
    }
    info!("BLE link dropped for sleep");
    Ok(())
}

/// Completes after [`BLE_IDLE_TIMEOUT_SECS`] without a command write.
async fn idle_timeout() {
    let window = Duration::from_secs(BLE_IDLE_TIMEOUT_SECS);
    while with_timeout(window, WRITE_ACTIVITY.wait()).await.is_ok() {}
}

/// Completes once the sleep sequence has turned the radio off.
async fn radio_off() {
    while RADIO_ENABLED.load(Ordering::Acquire) {
        Timer::after(Duration::from_millis(200)).await;
    }
}
