//! Clock/configuration controller protocol.
//!
//! The station's clock board is driven through three sequential
//! request/ack pairs: `SetClock`, `SetSplitters` and `SetBitmode`.
//! Requests are fire-and-forget through the [`ClockControl`] seam; the
//! acks come back as station events. The loopback implementation backs
//! the CLI simulation mode and the test suite.

use crate::controller::StationEvent;
use crate::observation::ResultCode;
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::mpsc;
use tracing::warn;

/// A command sent to the clock controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockCommand {
    /// Change the station sample clock (MHz).
    SetClock(u32),
    /// Switch the antenna splitters on or off.
    SetSplitters(bool),
    /// Change the station bit mode.
    SetBitMode(u8),
}

impl fmt::Display for ClockCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetClock(mhz) => write!(f, "SetClock({mhz})"),
            Self::SetSplitters(on) => write!(f, "SetSplitters({on})"),
            Self::SetBitMode(bits) => write!(f, "SetBitmode({bits})"),
        }
    }
}

/// Proxy for the station clock/configuration controller.
///
/// Each call is fire-and-forget; the matching acknowledgement arrives
/// as a [`StationEvent`] (`ClockAck`, `SplittersAck`, `BitModeAck`).
pub trait ClockControl: Send + Sync {
    /// Request a sample clock change.
    fn set_clock(&self, clock_mhz: u32);

    /// Request an antenna splitter change.
    fn set_splitters(&self, on: bool);

    /// Request a bit mode change.
    fn set_bit_mode(&self, bit_mode: u8);
}

/// In-process clock controller that acknowledges every command.
///
/// Commands are recorded for inspection and acknowledged by posting the
/// matching ack event back onto the station channel. Individual command
/// kinds can be scripted to fail, and ack delivery can be held to test
/// sequencing.
#[derive(Default)]
pub struct LoopbackClockControl {
    events: Mutex<Option<mpsc::UnboundedSender<StationEvent>>>,
    calls: Mutex<Vec<ClockCommand>>,
    fail_clock: Mutex<bool>,
    fail_splitters: Mutex<bool>,
    fail_bit_mode: Mutex<bool>,
    held: Mutex<Vec<StationEvent>>,
    holding: Mutex<bool>,
}

impl LoopbackClockControl {
    /// Creates a loopback clock controller; call
    /// [`attach`](Self::attach) before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects the controller to the station event channel.
    pub fn attach(&self, events: mpsc::UnboundedSender<StationEvent>) {
        *self.events.lock() = Some(events);
    }

    /// Commands received so far, in order.
    pub fn calls(&self) -> Vec<ClockCommand> {
        self.calls.lock().clone()
    }

    /// Scripts the next `SetClock` to fail.
    pub fn fail_clock(&self) {
        *self.fail_clock.lock() = true;
    }

    /// Scripts the next `SetSplitters` to fail.
    pub fn fail_splitters(&self) {
        *self.fail_splitters.lock() = true;
    }

    /// Scripts the next `SetBitmode` to fail.
    pub fn fail_bit_mode(&self) {
        *self.fail_bit_mode.lock() = true;
    }

    /// Holds acks instead of delivering them, until
    /// [`release`](Self::release) is called.
    pub fn hold(&self) {
        *self.holding.lock() = true;
    }

    /// Reports an out-of-band sample clock change, as the hardware
    /// monitor would after the station was reconfigured from outside
    /// the controller.
    pub fn report_clock(&self, clock_mhz: u32) {
        self.post(StationEvent::ClockAck {
            clock_mhz,
            result: ResultCode::NoError,
        });
    }

    /// Reports an out-of-band bit mode change.
    pub fn report_bit_mode(&self, bit_mode: u8) {
        self.post(StationEvent::BitModeAck {
            bit_mode,
            result: ResultCode::NoError,
        });
    }

    /// Delivers one held ack, oldest first. Returns true if one was
    /// delivered.
    pub fn release(&self) -> bool {
        let mut held = self.held.lock();
        if held.is_empty() {
            return false;
        }
        let event = held.remove(0);
        drop(held);
        self.post(event);
        true
    }

    fn post(&self, event: StationEvent) {
        let guard = self.events.lock();
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!("Station channel closed, dropping clock ack");
                }
            }
            None => warn!("Loopback clock control not attached, dropping ack"),
        }
    }

    fn ack(&self, event: StationEvent) {
        if *self.holding.lock() {
            self.held.lock().push(event);
        } else {
            self.post(event);
        }
    }

    fn take(flag: &Mutex<bool>) -> ResultCode {
        if std::mem::take(&mut *flag.lock()) {
            ResultCode::Unspecified
        } else {
            ResultCode::NoError
        }
    }
}

impl ClockControl for LoopbackClockControl {
    fn set_clock(&self, clock_mhz: u32) {
        self.calls.lock().push(ClockCommand::SetClock(clock_mhz));
        let result = Self::take(&self.fail_clock);
        self.ack(StationEvent::ClockAck { clock_mhz, result });
    }

    fn set_splitters(&self, on: bool) {
        self.calls.lock().push(ClockCommand::SetSplitters(on));
        let result = Self::take(&self.fail_splitters);
        self.ack(StationEvent::SplittersAck { on, result });
    }

    fn set_bit_mode(&self, bit_mode: u8) {
        self.calls.lock().push(ClockCommand::SetBitMode(bit_mode));
        let result = Self::take(&self.fail_bit_mode);
        self.ack(StationEvent::BitModeAck { bit_mode, result });
    }
}
