//! Unofficial Rust API for Apple laptop backlight control.
//!
//! This crate provides programmatic access to the display backlight, the
//! keyboard backlight and the ambient light sensor pair on Mac laptops by
//! talking directly to the OS driver services: display brightness goes
//! through the display connection services' float parameters, keyboard
//! brightness and the sensors through the keyboard backlight driver's
//! privileged user-client interface.
//!
//! # Requirements
//!
//! - macOS with the `AppleLMUController` keyboard backlight driver
//! - A built-in display registered under `IODisplayConnect`
//!
//! # Example
//!
//! ```no_run
//! use lumakit::Controller;
//!
//! fn main() -> Result<(), lumakit::ControllerError> {
//!     // Open the privileged driver connection (closed again on drop).
//!     let controller = Controller::open_native()?;
//!
//!     if let Some(brightness) = controller.display_brightness() {
//!         println!("display backlight at {:.0}%", brightness * 100.0);
//!     }
//!
//!     // Half keyboard backlight; the driver echoes the applied value.
//!     if let Some(applied) = controller.set_keyboard_brightness(0.5) {
//!         println!("keyboard backlight now at {:.0}%", applied * 100.0);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! Use [`MockPort`] to test code without hardware:
//!
//! ```
//! use lumakit::{Controller, MockPort};
//!
//! let port = MockPort::new().with_led_raw(0xfff);
//! let controller = Controller::open(port).unwrap();
//! assert_eq!(controller.keyboard_brightness(), Some(1.0));
//! ```
//!
//! # Disclaimer
//!
//! This is an **unofficial** library relying on private driver interfaces.
//! It is not affiliated with or endorsed by Apple. Use at your own risk.

#![warn(missing_docs)]

mod controller;
mod error;
mod iokit;
mod mock;
mod port;
mod sensors;

// Re-export public API
pub use controller::{
    BRIGHTNESS_KEY, Controller, DISPLAY_CONNECT_CLASS, LED_BRIGHTNESS_MAX, LMU_CONTROLLER_CLASS,
    normalized_to_raw, raw_to_normalized, selector,
};
pub use error::ControllerError;
pub use iokit::IoKitPort;
pub use mock::{MockDisplay, MockPort, ScalarCall};
pub use port::{ConnectionHandle, IoPort, OsStatus, ServiceHandle};
pub use sensors::LightSensors;

#[cfg(test)]
mod tests {
    use super::*;

    fn open_mock(port: &MockPort) -> Controller<MockPort> {
        Controller::open(port.clone()).expect("mock open should succeed")
    }

    #[test]
    fn led_conversion_round_trips() {
        for raw in [0u64, 1, 0x7ff, 0x800, 0xffe, 0xfff] {
            let recovered = normalized_to_raw(raw_to_normalized(raw));
            assert!(
                recovered.abs_diff(raw) <= 1,
                "raw {} came back as {}",
                raw,
                recovered
            );
        }

        for normalized in [0.0f32, 0.25, 0.5, 0.75, 1.0] {
            let reconstructed = raw_to_normalized(normalized_to_raw(normalized));
            assert!((reconstructed - normalized).abs() <= 1.0 / 4095.0);
        }
    }

    #[test]
    fn led_conversion_is_exact_at_full_scale() {
        assert_eq!(raw_to_normalized(LED_BRIGHTNESS_MAX), 1.0);
        assert_eq!(normalized_to_raw(1.0), LED_BRIGHTNESS_MAX);
        assert_eq!(normalized_to_raw(0.0), 0);
    }

    #[test]
    fn open_fails_when_the_driver_service_is_missing() {
        let port = MockPort::new().without_backlight_service();
        assert!(matches!(
            Controller::open(port),
            Err(ControllerError::ServiceNotFound)
        ));
    }

    #[test]
    fn open_surfaces_the_connection_status_code() {
        let port = MockPort::new().failing_open(-308);
        let result = Controller::open(port.clone());
        assert!(matches!(result, Err(ControllerError::ConnectionFailed(-308))));
        // The lookup handle is released on the failure path too.
        assert_eq!(port.released(), vec![MockPort::LMU_SERVICE]);
    }

    #[test]
    fn open_holds_the_driver_connection_handle() {
        let port = MockPort::new();
        let controller = open_mock(&port);
        assert_eq!(controller.connection(), MockPort::CONNECTION);
        assert_eq!(port.released(), vec![MockPort::LMU_SERVICE]);
    }

    #[test]
    fn dropping_the_controller_closes_the_connection() {
        let port = MockPort::new();
        let controller = open_mock(&port);
        drop(controller);
        assert_eq!(port.closed(), vec![MockPort::CONNECTION]);
    }

    #[test]
    fn keyboard_brightness_reads_the_led_register() {
        let port = MockPort::new().with_led_raw(0x400);
        let controller = open_mock(&port);

        let brightness = controller.keyboard_brightness().unwrap();
        assert_eq!(brightness, raw_to_normalized(0x400));

        let calls = port.scalar_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].connection, MockPort::CONNECTION);
        assert_eq!(calls[0].selector, selector::GET_LED_BRIGHTNESS);
        assert_eq!(calls[0].inputs, vec![0]);
        assert_eq!(calls[0].output_count, 1);
    }

    #[test]
    fn keyboard_brightness_is_absent_on_driver_failure() {
        let port = MockPort::new().failing_scalar_calls(-1);
        let controller = open_mock(&port);
        assert_eq!(controller.keyboard_brightness(), None);
    }

    #[test]
    fn set_keyboard_brightness_writes_the_rounded_register_value() {
        let port = MockPort::new();
        let controller = open_mock(&port);

        let echoed = controller.set_keyboard_brightness(0.5).unwrap();

        let calls = port.scalar_calls();
        assert_eq!(calls[0].selector, selector::SET_LED_BRIGHTNESS);
        // 0.5 * 0xfff = 2047.5, rounded half away from zero.
        assert_eq!(calls[0].inputs, vec![0, 2048]);
        assert_eq!(port.led_raw(), 2048);
        assert_eq!(echoed, raw_to_normalized(2048));
    }

    #[test]
    fn out_of_range_keyboard_brightness_is_clamped() {
        let port = MockPort::new();
        let controller = open_mock(&port);

        let _ = controller.set_keyboard_brightness(1.5);
        let _ = controller.set_keyboard_brightness(-0.5);

        let calls = port.scalar_calls();
        assert_eq!(calls[0].inputs, vec![0, LED_BRIGHTNESS_MAX]);
        assert_eq!(calls[1].inputs, vec![0, 0]);
    }

    #[test]
    fn display_brightness_reads_the_first_match_only() {
        let displays = vec![MockDisplay::new(0x31, 0.25), MockDisplay::new(0x32, 0.75)];
        let port = MockPort::new().with_displays(displays);
        let controller = open_mock(&port);

        assert_eq!(controller.display_brightness(), Some(0.25));
        // The second matched service is released without ever being read.
        assert_eq!(port.parameter_reads(), vec![0x31]);
        assert!(port.released().contains(&0x32));
    }

    #[test]
    fn display_brightness_is_absent_when_enumeration_fails() {
        let port = MockPort::new().failing_display_lookup(-1);
        let controller = open_mock(&port);
        assert_eq!(controller.display_brightness(), None);
    }

    #[test]
    fn display_brightness_is_absent_when_the_driver_refuses_the_read() {
        let port = MockPort::new().failing_parameter_reads(-1);
        let controller = open_mock(&port);
        assert_eq!(controller.display_brightness(), None);
    }

    #[test]
    fn display_brightness_is_absent_without_a_matched_display() {
        let port = MockPort::new().with_displays(Vec::new());
        let controller = open_mock(&port);
        assert_eq!(controller.display_brightness(), None);
    }

    #[test]
    fn set_display_brightness_writes_every_match() {
        let displays = vec![MockDisplay::new(0x31, 0.1), MockDisplay::new(0x32, 0.2)];
        let port = MockPort::new().with_displays(displays);
        let controller = open_mock(&port);

        assert!(controller.set_display_brightness(0.8));
        assert_eq!(port.display_brightness(0x31), Some(0.8));
        assert_eq!(port.display_brightness(0x32), Some(0.8));
        assert_eq!(port.released(), vec![MockPort::LMU_SERVICE, 0x31, 0x32]);
    }

    #[test]
    fn set_display_brightness_ignores_individual_write_failures() {
        let refusing = MockDisplay {
            handle: 0x31,
            brightness: 0.1,
            set_status: -1,
        };
        let port = MockPort::new().with_displays(vec![refusing, MockDisplay::new(0x32, 0.2)]);
        let controller = open_mock(&port);

        assert!(controller.set_display_brightness(0.9));
        assert_eq!(port.display_brightness(0x31), Some(0.1));
        assert_eq!(port.display_brightness(0x32), Some(0.9));
    }

    #[test]
    fn set_display_brightness_fails_only_when_enumeration_fails() {
        let port = MockPort::new().failing_display_lookup(-1);
        let controller = open_mock(&port);
        assert!(!controller.set_display_brightness(0.5));
    }

    #[test]
    fn set_display_brightness_clamps_out_of_range_values() {
        let port = MockPort::new();
        let controller = open_mock(&port);

        assert!(controller.set_display_brightness(1.5));
        assert_eq!(
            port.display_brightness(MockPort::DISPLAY_SERVICE),
            Some(1.0)
        );
    }

    #[test]
    fn light_sensors_parse_both_channels() {
        let port = MockPort::new().with_sensors(120, 340);
        let controller = open_mock(&port);

        let reading = controller.light_sensors().unwrap();
        assert_eq!(
            reading,
            LightSensors {
                left: 120.0,
                right: 340.0
            }
        );

        let calls = port.scalar_calls();
        assert_eq!(calls[0].selector, selector::GET_SENSOR_READING);
        assert!(calls[0].inputs.is_empty());
        assert_eq!(calls[0].output_count, 2);
    }

    #[test]
    fn light_sensors_are_absent_on_driver_failure() {
        let port = MockPort::new().failing_scalar_calls(-1);
        let controller = open_mock(&port);
        assert_eq!(controller.light_sensors(), None);
    }

    #[test]
    fn display_wake_is_explicitly_unimplemented() {
        let port = MockPort::new();
        let controller = open_mock(&port);
        assert!(matches!(
            controller.set_display_wake(true),
            Err(ControllerError::Unimplemented(_))
        ));
    }

    #[test]
    fn call_scalar_reaches_reserved_selectors() {
        let port = MockPort::new();
        let controller = open_mock(&port);

        let outputs = controller
            .call_scalar(selector::SET_LED_FADE, &[0, 0x800, 250], 1)
            .unwrap();
        assert!(outputs.is_empty());
        assert_eq!(port.scalar_calls()[0].selector, selector::SET_LED_FADE);
    }
}
