#![no_std]

// Control core for the radio-synchronized wall clock.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library; board drivers plug in through the traits in `peripherals`.

pub mod arbiter;
pub mod brightness;
pub mod config;
pub mod controller;
pub mod display;
pub mod keypad;
pub mod mode;
pub mod peripherals;
pub mod power;
pub mod telemetry;
pub mod time;
pub mod timezone;
