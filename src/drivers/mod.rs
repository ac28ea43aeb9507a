//! Peripheral drivers and the pure LED pattern engine.

pub mod led_patterns;
pub mod led_strip;
pub mod limit_switch;
pub mod stepper;
pub mod task_pin;
pub mod watchdog;
