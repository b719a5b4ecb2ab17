//! Backlight controller implementation.

use crate::error::ControllerError;
use crate::iokit::IoKitPort;
use crate::port::{ConnectionHandle, IoPort};
use crate::sensors::LightSensors;

use log::{debug, warn};
use std::ffi::CStr;

/// Registry class of the keyboard backlight / ambient light sensor driver.
pub const LMU_CONTROLLER_CLASS: &CStr = c"AppleLMUController";

/// Registry class matched for display backlight services.
pub const DISPLAY_CONNECT_CLASS: &CStr = c"IODisplayConnect";

/// Float parameter key for display backlight brightness.
pub const BRIGHTNESS_KEY: &CStr = c"brightness";

/// Full scale of the keyboard LED brightness register (12 bits).
pub const LED_BRIGHTNESS_MAX: u64 = 0xfff;

// Single-zone keyboards expose their backlight as LED 0.
const LED_INDEX: u64 = 0;

/// Scalar method selectors of the keyboard backlight driver.
///
/// The numbering is a fixed protocol contract with the driver.
pub mod selector {
    /// getSensorReading(int *, int *)
    pub const GET_SENSOR_READING: u32 = 0;
    /// getLEDBrightness(int, int *)
    pub const GET_LED_BRIGHTNESS: u32 = 1;
    /// setLEDBrightness(int, int, int *)
    pub const SET_LED_BRIGHTNESS: u32 = 2;
    /// setLEDFade(int, int, int, int *) - reserved, no public operation uses it.
    pub const SET_LED_FADE: u32 = 3;
}

// =============================================================================
// Brightness Conversions
// =============================================================================

/// Convert a raw 12-bit LED register value to a normalized brightness.
pub fn raw_to_normalized(raw: u64) -> f32 {
    raw as f32 / LED_BRIGHTNESS_MAX as f32
}

/// Convert a normalized brightness to the raw 12-bit LED register value.
///
/// Values outside `[0, 1]` are clamped before conversion; rounding is half
/// away from zero.
pub fn normalized_to_raw(brightness: f32) -> u64 {
    (brightness.clamp(0.0, 1.0) * LED_BRIGHTNESS_MAX as f32).round() as u64
}

// =============================================================================
// Controller
// =============================================================================

/// The backlight controller.
///
/// Owns the privileged user-client connection to the keyboard backlight
/// driver and exposes brightness operations for the display backlight, the
/// keyboard backlight, and the ambient light sensor pair. Display
/// operations go through the service registry on every call and need no
/// connection of their own.
///
/// Every operation is a synchronous one-shot call into the OS. The
/// controller keeps no internal locking; share one instance across threads
/// only behind external synchronization. The connection is closed again
/// when the controller is dropped.
///
/// # Example
///
/// ```no_run
/// use lumakit::Controller;
///
/// let controller = Controller::open_native()?;
/// if let Some(brightness) = controller.keyboard_brightness() {
///     println!("keyboard backlight at {:.0}%", brightness * 100.0);
/// }
/// # Ok::<(), lumakit::ControllerError>(())
/// ```
pub struct Controller<P: IoPort> {
    port: P,
    connection: ConnectionHandle,
}

impl<P: IoPort> Controller<P> {
    /// Open a controller over the given port.
    ///
    /// Locates the keyboard backlight driver service and opens a privileged
    /// user-client connection to it. The lookup handle is released on every
    /// path.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::ServiceNotFound`] if the driver service is not
    ///   registered
    /// - [`ControllerError::ConnectionFailed`] if the driver refuses the
    ///   connection
    pub fn open(port: P) -> Result<Self, ControllerError> {
        let service = port
            .find_service(LMU_CONTROLLER_CLASS)
            .ok_or(ControllerError::ServiceNotFound)?;

        let opened = port.open(service);
        port.release(service);

        let connection = opened.map_err(ControllerError::ConnectionFailed)?;
        debug!("opened backlight driver connection {:#x}", connection);

        Ok(Self { port, connection })
    }

    /// The raw user-client connection handle. Non-zero while open.
    pub fn connection(&self) -> ConnectionHandle {
        self.connection
    }

    /// Get the display backlight brightness as a value in `[0, 1]`.
    ///
    /// Only the first matched display service is read. Returns `None` when
    /// the service enumeration fails, when no display is matched, or when
    /// the driver refuses the read.
    pub fn display_brightness(&self) -> Option<f32> {
        let mut services = self
            .port
            .find_services(DISPLAY_CONNECT_CLASS)
            .ok()?
            .into_iter();

        let service = services.next()?;
        let value = self.port.float_parameter(service, 0, BRIGHTNESS_KEY);
        self.port.release(service);

        // Handles past the first match are never read, only released.
        for unread in services {
            self.port.release(unread);
        }

        value.ok()
    }

    /// Set the display backlight brightness on every matched display.
    ///
    /// Values outside `[0, 1]` are clamped. Returns `false` only when the
    /// service enumeration itself fails; a refused write on an individual
    /// display is logged and does not affect the result.
    pub fn set_display_brightness(&self, brightness: f32) -> bool {
        let brightness = brightness.clamp(0.0, 1.0);

        let services = match self.port.find_services(DISPLAY_CONNECT_CLASS) {
            Ok(services) => services,
            Err(status) => {
                warn!("display service enumeration failed: {}", status);
                return false;
            }
        };

        for service in services {
            if let Err(status) =
                self.port
                    .set_float_parameter(service, 0, BRIGHTNESS_KEY, brightness)
            {
                warn!("display {:#x} refused brightness write: {}", service, status);
            }
            self.port.release(service);
        }

        true
    }

    /// Get the keyboard backlight brightness as a value in `[0, 1]`.
    ///
    /// Returns `None` if the driver call fails or produces no output.
    pub fn keyboard_brightness(&self) -> Option<f32> {
        let outputs = self.call_scalar(selector::GET_LED_BRIGHTNESS, &[LED_INDEX], 1)?;
        outputs.first().map(|&raw| raw_to_normalized(raw))
    }

    /// Set the keyboard backlight brightness.
    ///
    /// Values outside `[0, 1]` are clamped. Returns the brightness the
    /// driver echoes back, or `None` if the call fails.
    pub fn set_keyboard_brightness(&self, brightness: f32) -> Option<f32> {
        let raw = normalized_to_raw(brightness);
        debug!("setting keyboard backlight register to {}", raw);

        let outputs = self.call_scalar(selector::SET_LED_BRIGHTNESS, &[LED_INDEX, raw], 1)?;
        outputs.first().map(|&echoed| raw_to_normalized(echoed))
    }

    /// Read the ambient light sensor pair.
    ///
    /// Returns `None` if the driver call fails or yields fewer than two
    /// channel values.
    pub fn light_sensors(&self) -> Option<LightSensors> {
        let outputs = self.call_scalar(selector::GET_SENSOR_READING, &[], 2)?;
        match outputs[..] {
            [left, right, ..] => Some(LightSensors {
                left: left as f32,
                right: right as f32,
            }),
            _ => None,
        }
    }

    /// Wake or sleep the display.
    ///
    /// The driver protocol reserves this capability but the crate does not
    /// implement it; the call always fails with
    /// [`ControllerError::Unimplemented`].
    pub fn set_display_wake(&self, _wake: bool) -> Result<bool, ControllerError> {
        Err(ControllerError::Unimplemented("display wake"))
    }

    /// Invoke a numbered driver method on the open connection.
    ///
    /// The low-level primitive behind the keyboard and sensor operations,
    /// also usable for reserved selectors such as
    /// [`selector::SET_LED_FADE`]. `output_count` states how many 64-bit
    /// scalar outputs the method produces; the driver's answer is returned
    /// only when the call reports success.
    pub fn call_scalar(&self, selector: u32, inputs: &[u64], output_count: u32) -> Option<Vec<u64>> {
        match self
            .port
            .call_scalar(self.connection, selector, inputs, output_count)
        {
            Ok(outputs) => Some(outputs),
            Err(status) => {
                debug!("scalar method {} failed: {}", selector, status);
                None
            }
        }
    }
}

impl Controller<IoKitPort> {
    /// Open a controller backed by the live system frameworks.
    ///
    /// # Errors
    ///
    /// [`ControllerError::FrameworkLoad`] if IOKit or CoreFoundation cannot
    /// be loaded, plus the [`Controller::open`] errors.
    pub fn open_native() -> Result<Self, ControllerError> {
        Self::open(IoKitPort::load()?)
    }
}

impl<P: IoPort> Drop for Controller<P> {
    fn drop(&mut self) {
        self.port.close(self.connection);
        debug!("closed backlight driver connection {:#x}", self.connection);
    }
}
