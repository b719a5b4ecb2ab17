//! Mock port for testing.

use crate::controller::selector;
use crate::port::{ConnectionHandle, IoPort, OsStatus, ServiceHandle};

use std::ffi::CStr;
use std::sync::{Arc, Mutex};

// Mirrors the registry's "no such object" failure for unknown handles.
const NO_SUCH_SERVICE: OsStatus = -1;

/// A scripted display service behind [`MockPort`].
#[derive(Debug, Clone)]
pub struct MockDisplay {
    /// Registry handle handed out by the fake lookup.
    pub handle: ServiceHandle,
    /// Current brightness parameter value.
    pub brightness: f32,
    /// Status returned for writes; zero accepts the write.
    pub set_status: OsStatus,
}

impl MockDisplay {
    /// A display that accepts reads and writes.
    pub fn new(handle: ServiceHandle, brightness: f32) -> Self {
        Self {
            handle,
            brightness,
            set_status: 0,
        }
    }
}

/// A recorded scalar method invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarCall {
    /// Connection the method was invoked on.
    pub connection: ConnectionHandle,
    /// Method selector.
    pub selector: u32,
    /// Scalar inputs as passed.
    pub inputs: Vec<u64>,
    /// Requested output capacity.
    pub output_count: u32,
}

/// A mock driver port for testing.
///
/// Models the keyboard backlight driver (LED register plus sensor pair) and
/// a set of display services, and records every release, close, parameter
/// access and scalar call so tests can assert on the traffic. This allows
/// testing code that depends on [`IoPort`] without real hardware.
///
/// Clones share state, so a test keeps one handle for assertions while the
/// controller owns the other.
///
/// # Example
///
/// ```
/// use lumakit::{Controller, MockPort};
///
/// let port = MockPort::new();
/// let controller = Controller::open(port.clone()).unwrap();
/// assert!(controller.set_display_brightness(0.8));
/// assert_eq!(port.display_brightness(MockPort::DISPLAY_SERVICE), Some(0.8));
/// ```
#[derive(Clone)]
pub struct MockPort {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    lmu_service: Option<ServiceHandle>,
    open_status: OsStatus,
    connection: ConnectionHandle,

    displays: Vec<MockDisplay>,
    display_lookup_status: OsStatus,
    parameter_read_status: OsStatus,

    scalar_status: OsStatus,
    led_raw: u64,
    sensors: (u64, u64),

    released: Vec<ServiceHandle>,
    closed: Vec<ConnectionHandle>,
    parameter_reads: Vec<ServiceHandle>,
    scalar_calls: Vec<ScalarCall>,
}

impl MockPort {
    /// Registry handle of the fake keyboard backlight service.
    pub const LMU_SERVICE: ServiceHandle = 0x1001;
    /// Connection handle handed out by a successful open.
    pub const CONNECTION: ConnectionHandle = 0x2001;
    /// Registry handle of the default fake display.
    pub const DISPLAY_SERVICE: ServiceHandle = 0x3001;

    /// A port with the backlight driver present, one display at half
    /// brightness, and the LED register at mid scale.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                lmu_service: Some(Self::LMU_SERVICE),
                open_status: 0,
                connection: Self::CONNECTION,
                displays: vec![MockDisplay::new(Self::DISPLAY_SERVICE, 0.5)],
                display_lookup_status: 0,
                parameter_read_status: 0,
                scalar_status: 0,
                led_raw: 0x800,
                sensors: (0, 0),
                released: Vec::new(),
                closed: Vec::new(),
                parameter_reads: Vec::new(),
                scalar_calls: Vec::new(),
            })),
        }
    }

    /// Remove the keyboard backlight service from the registry.
    pub fn without_backlight_service(self) -> Self {
        self.configure(|state| state.lmu_service = None)
    }

    /// Make the user-client open call fail with `status`.
    pub fn failing_open(self, status: OsStatus) -> Self {
        self.configure(|state| state.open_status = status)
    }

    /// Make display service enumeration fail with `status`.
    pub fn failing_display_lookup(self, status: OsStatus) -> Self {
        self.configure(|state| state.display_lookup_status = status)
    }

    /// Make display parameter reads fail with `status`.
    pub fn failing_parameter_reads(self, status: OsStatus) -> Self {
        self.configure(|state| state.parameter_read_status = status)
    }

    /// Make every scalar method call fail with `status`.
    pub fn failing_scalar_calls(self, status: OsStatus) -> Self {
        self.configure(|state| state.scalar_status = status)
    }

    /// Replace the display list.
    pub fn with_displays(self, displays: Vec<MockDisplay>) -> Self {
        self.configure(|state| state.displays = displays)
    }

    /// Preload the LED brightness register.
    pub fn with_led_raw(self, raw: u64) -> Self {
        self.configure(|state| state.led_raw = raw)
    }

    /// Preload the ambient light sensor channels.
    pub fn with_sensors(self, left: u64, right: u64) -> Self {
        self.configure(|state| state.sensors = (left, right))
    }

    fn configure(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.inner.lock().unwrap());
        self
    }

    /// Registry handles released so far, in release order.
    pub fn released(&self) -> Vec<ServiceHandle> {
        self.inner.lock().unwrap().released.clone()
    }

    /// Connections closed so far.
    pub fn closed(&self) -> Vec<ConnectionHandle> {
        self.inner.lock().unwrap().closed.clone()
    }

    /// Services whose brightness parameter was read.
    pub fn parameter_reads(&self) -> Vec<ServiceHandle> {
        self.inner.lock().unwrap().parameter_reads.clone()
    }

    /// Scalar method calls in invocation order.
    pub fn scalar_calls(&self) -> Vec<ScalarCall> {
        self.inner.lock().unwrap().scalar_calls.clone()
    }

    /// Current value of the LED brightness register.
    pub fn led_raw(&self) -> u64 {
        self.inner.lock().unwrap().led_raw
    }

    /// Current brightness of the display with `handle`.
    pub fn display_brightness(&self, handle: ServiceHandle) -> Option<f32> {
        self.inner
            .lock()
            .unwrap()
            .displays
            .iter()
            .find(|display| display.handle == handle)
            .map(|display| display.brightness)
    }
}

impl Default for MockPort {
    fn default() -> Self {
        Self::new()
    }
}

impl IoPort for MockPort {
    fn find_service(&self, _class: &CStr) -> Option<ServiceHandle> {
        self.inner.lock().unwrap().lmu_service
    }

    fn find_services(&self, _class: &CStr) -> Result<Vec<ServiceHandle>, OsStatus> {
        let state = self.inner.lock().unwrap();
        if state.display_lookup_status != 0 {
            return Err(state.display_lookup_status);
        }
        Ok(state.displays.iter().map(|display| display.handle).collect())
    }

    fn open(&self, _service: ServiceHandle) -> Result<ConnectionHandle, OsStatus> {
        let state = self.inner.lock().unwrap();
        if state.open_status != 0 {
            return Err(state.open_status);
        }
        Ok(state.connection)
    }

    fn close(&self, connection: ConnectionHandle) {
        self.inner.lock().unwrap().closed.push(connection);
    }

    fn release(&self, service: ServiceHandle) {
        self.inner.lock().unwrap().released.push(service);
    }

    fn float_parameter(
        &self,
        service: ServiceHandle,
        _index: u32,
        _key: &CStr,
    ) -> Result<f32, OsStatus> {
        let mut state = self.inner.lock().unwrap();
        state.parameter_reads.push(service);
        if state.parameter_read_status != 0 {
            return Err(state.parameter_read_status);
        }
        state
            .displays
            .iter()
            .find(|display| display.handle == service)
            .map(|display| display.brightness)
            .ok_or(NO_SUCH_SERVICE)
    }

    fn set_float_parameter(
        &self,
        service: ServiceHandle,
        _index: u32,
        _key: &CStr,
        value: f32,
    ) -> Result<(), OsStatus> {
        let mut state = self.inner.lock().unwrap();
        let Some(display) = state
            .displays
            .iter_mut()
            .find(|display| display.handle == service)
        else {
            return Err(NO_SUCH_SERVICE);
        };

        if display.set_status != 0 {
            return Err(display.set_status);
        }
        display.brightness = value;
        Ok(())
    }

    fn call_scalar(
        &self,
        connection: ConnectionHandle,
        selector: u32,
        inputs: &[u64],
        output_count: u32,
    ) -> Result<Vec<u64>, OsStatus> {
        let mut state = self.inner.lock().unwrap();
        state.scalar_calls.push(ScalarCall {
            connection,
            selector,
            inputs: inputs.to_vec(),
            output_count,
        });

        if state.scalar_status != 0 {
            return Err(state.scalar_status);
        }

        let mut outputs = match selector {
            selector::GET_SENSOR_READING => vec![state.sensors.0, state.sensors.1],
            selector::GET_LED_BRIGHTNESS => vec![state.led_raw],
            selector::SET_LED_BRIGHTNESS => {
                state.led_raw = inputs.get(1).copied().unwrap_or(0);
                vec![state.led_raw]
            }
            _ => Vec::new(),
        };

        // The caller's capacity bounds how much the driver hands back.
        outputs.truncate(output_count as usize);
        Ok(outputs)
    }
}
