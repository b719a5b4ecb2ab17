//! Example: read the current backlight and sensor values.
//!
//! Run with: `cargo run --example read_brightness`

use lumakit::Controller;

fn main() -> Result<(), lumakit::ControllerError> {
    // Initialize logging (optional)
    env_logger::init();

    let controller = Controller::open_native()?;

    match controller.display_brightness() {
        Some(brightness) => println!("display backlight: {:.0}%", brightness * 100.0),
        None => println!("display backlight unavailable"),
    }

    match controller.keyboard_brightness() {
        Some(brightness) => println!("keyboard backlight: {:.0}%", brightness * 100.0),
        None => println!("keyboard backlight unavailable"),
    }

    match controller.light_sensors() {
        Some(reading) => println!(
            "ambient light: left={} right={}",
            reading.left, reading.right
        ),
        None => println!("ambient light sensors unavailable"),
    }

    Ok(())
}
