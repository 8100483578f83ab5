//! Top-level machine: one CPU and one bus, stepped in lock-step at
//! whole-instruction granularity.

use crate::cartridge::Cartridge;
use crate::cpu::Cpu;
use crate::mmu::Mmu;
use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::serial::SerialHook;

/// Hardware revision to emulate. `Auto` follows the cartridge header's
/// CGB flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Model {
    Auto,
    Dmg,
    Cgb,
}

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    pub fn new(cart: Cartridge, model: Model) -> Self {
        let cgb = match model {
            Model::Dmg => false,
            Model::Cgb => true,
            Model::Auto => cart.header.cgb,
        };
        log::info!(
            "starting \"{}\" ({}, {} mode)",
            cart.header.title,
            cart.header.mbc,
            if cgb { "CGB" } else { "DMG" }
        );
        let mut mmu = Mmu::new_with_mode(cgb);
        mmu.load_cart(cart);
        Self {
            cpu: Cpu::new(cgb),
            mmu,
        }
    }

    /// Run one instruction (or interrupt dispatch) and feed the elapsed
    /// cycles to every peripheral. Returns the t-cycle cost in the CPU's
    /// clock domain.
    pub fn step(&mut self) -> u32 {
        let mut cycles = self.cpu.step(&mut self.mmu);
        // A general-purpose VRAM DMA freezes the CPU for the copy duration.
        cycles += self.mmu.take_dma_stall();
        self.mmu.timer.step(cycles, &mut self.mmu.if_reg);
        self.mmu.step_peripherals(cycles);
        cycles
    }

    /// Run until the PPU finishes the current frame.
    pub fn step_frame(&mut self) {
        while !self.mmu.ppu.frame_ready() {
            self.step();
        }
        self.mmu.ppu.clear_frame_flag();
    }

    pub fn framebuffer(&self) -> &[u16; SCREEN_WIDTH * SCREEN_HEIGHT] {
        self.mmu.ppu.framebuffer()
    }

    pub fn set_buttons(&mut self, state: u8) {
        self.mmu.joypad.update_state(state, &mut self.mmu.if_reg);
    }

    pub fn set_serial_hook(&mut self, hook: SerialHook) {
        self.mmu.serial.set_hook(hook);
    }

    pub fn audio_ready(&self) -> bool {
        self.mmu.apu.samples_ready()
    }

    pub fn take_audio(&mut self) -> Vec<i16> {
        self.mmu.apu.take_samples()
    }

    pub fn save_cart_ram(&mut self) {
        self.mmu.save_cart_ram();
    }

    /// Restart from the post-boot state, keeping the loaded cartridge.
    pub fn reset(&mut self) {
        let cgb = self.mmu.is_cgb();
        let cart = self.mmu.cart.take();
        self.mmu = Mmu::new_with_mode(cgb);
        if let Some(cart) = cart {
            self.mmu.load_cart(cart);
        }
        self.cpu = Cpu::new(cgb);
    }
}
