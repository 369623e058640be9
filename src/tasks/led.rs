//! Status LED task
//!
//! Blinks once per interval, the interval following the upstream
//! [`ConnectionState`]. A state change re-times the blink immediately.

use embassy_futures::select::{select, Either};
use embassy_time::Timer;
use embedded_hal::digital::OutputPin;
use log::warn;

use crate::config::led::ON_MS;
use crate::signals::CONNECTION_STATE;
use crate::state::ConnectionState;

/// Blink `led` (active low) at the rate of the current connection state
pub async fn led_task<P: OutputPin>(mut led: P) {
    let Some(mut receiver) = CONNECTION_STATE.receiver() else {
        warn!("[Main] No connection state receiver left for the LED");
        return;
    };

    let mut state = receiver.try_get().unwrap_or(ConnectionState::Disconnected);

    loop {
        match select(receiver.changed(), Timer::after_millis(state.blink_interval_ms())).await {
            Either::First(changed) => state = changed,
            Either::Second(()) => {
                let _ = led.set_low();
                Timer::after_millis(ON_MS).await;
                let _ = led.set_high();
            }
        }
    }
}
