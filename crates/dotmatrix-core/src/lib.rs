//! Game Boy and Game Boy Color emulation core.
//!
//! The whole machine lives in one owned [`GameBoy`] aggregate; the frontend
//! drives it by calling [`GameBoy::step_frame`] and pulling the finished
//! framebuffer and audio samples between frames.

pub mod alu;
pub mod apu;
pub mod cartridge;
pub mod cpu;
pub mod gameboy;
pub mod joypad;
pub mod mmu;
pub mod ppu;
pub mod registers;
pub mod serial;
pub mod timer;

pub use cartridge::{Cartridge, CartridgeError};
pub use gameboy::{GameBoy, Model};
pub use joypad::{KEY_A, KEY_B, KEY_DOWN, KEY_LEFT, KEY_RIGHT, KEY_SELECT, KEY_START, KEY_UP};
pub use ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

pub use apu::SAMPLE_RATE;

/// CPU clock in normal speed mode, in Hz.
pub const CPU_CLOCK_HZ: u32 = 4_194_304;
