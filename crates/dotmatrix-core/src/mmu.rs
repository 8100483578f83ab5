use crate::{
    apu::Apu, cartridge::Cartridge, joypad::Joypad, ppu::Ppu, serial::Serial, timer::Timer,
};

const WRAM_BANK_SIZE: usize = 0x1000;

// OAM DMA copies 160 bytes, one per 4 t-cycles (2 in double speed).
const OAM_DMA_CYCLES: u32 = 640;

/// Transfer mode for color-mode VRAM DMA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DmaMode {
    /// General DMA (immediate)
    Gdma,
    /// H-blank DMA
    Hdma,
}

#[derive(Debug)]
struct HdmaState {
    /// 16-bit source pointer (upper 12 bits writable)
    src: u16,
    /// Destination in VRAM, kept as 0x8000 | (dst & 0x1FF0)
    dst: u16,
    /// Remaining 0x10-byte blocks
    blocks: u8,
    mode: DmaMode,
    active: bool,
    /// Set when an H-blank transfer was aborted via FF55.
    cancelled: bool,
}

pub struct Mmu {
    pub wram: [[u8; WRAM_BANK_SIZE]; 8],
    pub wram_bank: usize,
    pub hram: [u8; 0x7F],
    pub cart: Option<Cartridge>,
    pub if_reg: u8,
    pub ie_reg: u8,
    pub serial: Serial,
    pub ppu: Ppu,
    pub apu: Apu,
    pub timer: Timer,
    pub joypad: Joypad,
    hdma: HdmaState,
    /// Speed-switch register: bit 7 current speed, bit 0 armed.
    pub key1: u8,
    /// Remaining t-cycles of an in-flight OAM DMA.
    dma_cycles: u32,
    dma_source: u16,
    /// CPU stall cycles owed for completed VRAM DMA work.
    dma_stall: u32,
    cgb_mode: bool,
}

impl Mmu {
    pub fn new_with_mode(cgb: bool) -> Self {
        Self {
            wram: [[0; WRAM_BANK_SIZE]; 8],
            wram_bank: 1,
            hram: [0; 0x7F],
            cart: None,
            if_reg: 0xE1,
            ie_reg: 0,
            serial: Serial::new(),
            ppu: Ppu::new_with_mode(cgb),
            apu: Apu::new(),
            timer: Timer::new(),
            joypad: Joypad::new(),
            hdma: HdmaState {
                src: 0,
                dst: Self::sanitize_vram_dma_dest(0),
                blocks: 0,
                mode: DmaMode::Gdma,
                active: false,
                cancelled: false,
            },
            key1: 0,
            dma_cycles: 0,
            dma_source: 0,
            dma_stall: 0,
            cgb_mode: cgb,
        }
    }

    pub fn new() -> Self {
        Self::new_with_mode(false)
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb_mode
    }

    pub fn double_speed(&self) -> bool {
        self.key1 & 0x80 != 0
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    pub fn save_cart_ram(&mut self) {
        if let Some(cart) = &self.cart {
            if let Err(e) = cart.save_ram() {
                log::error!("failed to save cartridge RAM: {e}");
            }
        }
    }

    pub fn take_serial(&mut self) -> Vec<u8> {
        self.serial.take_output()
    }

    pub fn read_byte(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                self.cart.as_ref().map_or(0xFF, |c| c.read(addr))
            }
            0x8000..=0x9FFF => self.ppu.vram[self.ppu.vram_bank][(addr - 0x8000) as usize],
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize],
            0xD000..=0xDFFF => self.wram[self.wram_bank][(addr - 0xD000) as usize],
            // Echo RAM mirrors 0xC000-0xDDFF.
            0xE000..=0xEFFF => self.wram[0][(addr - 0xE000) as usize],
            0xF000..=0xFDFF => self.wram[self.wram_bank][(addr - 0xF000) as usize],
            0xFE00..=0xFE9F => {
                // OAM reads back open bus while OAM DMA holds its port.
                if self.dma_cycles > 0 {
                    0xFF
                } else {
                    self.ppu.oam[(addr - 0xFE00) as usize]
                }
            }
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => self.joypad.read(),
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg,
            0xFF10..=0xFF3F => self.apu.read_reg(addr),
            0xFF46 => self.ppu.dma,
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B | 0xFF68..=0xFF6C => self.ppu.read_reg(addr),
            0xFF4D if self.cgb_mode => (self.key1 & 0x81) | 0x7E,
            0xFF4F if self.cgb_mode => 0xFE | self.ppu.vram_bank as u8,
            0xFF51 if self.cgb_mode => (self.hdma.src >> 8) as u8,
            0xFF52 if self.cgb_mode => (self.hdma.src & 0x00F0) as u8,
            0xFF53 if self.cgb_mode => ((self.hdma.dst & 0x1F00) >> 8) as u8,
            0xFF54 if self.cgb_mode => (self.hdma.dst & 0x00F0) as u8,
            0xFF55 if self.cgb_mode => {
                if self.hdma.active {
                    // Busy: bit 7 clear, remaining blocks minus one below.
                    self.hdma.blocks.saturating_sub(1) & 0x7F
                } else if self.hdma.cancelled {
                    0x80
                } else {
                    0xFF
                }
            }
            0xFF70 if self.cgb_mode => 0xF8 | self.wram_bank as u8,
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg,
            _ => 0xFF,
        }
    }

    pub fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read_byte(addr);
        let hi = self.read_byte(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write(addr, val);
                }
            }
            0x8000..=0x9FFF => {
                self.ppu.vram[self.ppu.vram_bank][(addr - 0x8000) as usize] = val;
            }
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize] = val,
            0xD000..=0xDFFF => self.wram[self.wram_bank][(addr - 0xD000) as usize] = val,
            0xE000..=0xEFFF => self.wram[0][(addr - 0xE000) as usize] = val,
            0xF000..=0xFDFF => self.wram[self.wram_bank][(addr - 0xF000) as usize] = val,
            0xFE00..=0xFE9F => {
                // Dropped while OAM DMA is in flight.
                if self.dma_cycles == 0 {
                    self.ppu.oam[(addr - 0xFE00) as usize] = val;
                }
            }
            0xFEA0..=0xFEFF => {}
            0xFF00 => self.joypad.write(val),
            0xFF01 | 0xFF02 => self.serial.write(addr, val),
            0xFF04..=0xFF07 => self.timer.write(addr, val, &mut self.if_reg),
            0xFF0F => self.if_reg = (val & 0x1F) | (self.if_reg & 0xE0),
            0xFF10..=0xFF3F => self.apu.write_reg(addr, val),
            0xFF46 => {
                self.ppu.dma = val;
                self.start_oam_dma((val as u16) << 8);
            }
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B | 0xFF68..=0xFF6C => self.ppu.write_reg(addr, val),
            0xFF4D if self.cgb_mode => self.key1 = (self.key1 & 0x80) | (val & 0x01),
            0xFF4F if self.cgb_mode => self.ppu.vram_bank = (val & 0x01) as usize,
            0xFF51 if self.cgb_mode => {
                if !self.hdma.active {
                    self.hdma.src = (val as u16) << 8 | (self.hdma.src & 0x00FF);
                }
            }
            0xFF52 if self.cgb_mode => {
                if !self.hdma.active {
                    self.hdma.src = (self.hdma.src & 0xFF00) | (val & 0xF0) as u16;
                }
            }
            0xFF53 if self.cgb_mode => {
                if !self.hdma.active {
                    let raw = (((val & 0x1F) as u16) << 8) | (self.hdma.dst & 0x00F0);
                    self.hdma.dst = Self::sanitize_vram_dma_dest(raw);
                }
            }
            0xFF54 if self.cgb_mode => {
                if !self.hdma.active {
                    let raw = (self.hdma.dst & 0x1F00) | (val as u16 & 0x00F0);
                    self.hdma.dst = Self::sanitize_vram_dma_dest(raw);
                }
            }
            0xFF55 if self.cgb_mode => self.write_vram_dma_trigger(val),
            0xFF70 if self.cgb_mode => {
                let bank = (val & 0x07) as usize;
                self.wram_bank = if bank == 0 { 1 } else { bank };
            }
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie_reg = val,
            _ => {}
        }
    }

    pub fn write_word(&mut self, addr: u16, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.write_byte(addr, lo);
        self.write_byte(addr.wrapping_add(1), hi);
    }

    #[inline]
    fn sanitize_vram_dma_dest(addr: u16) -> u16 {
        0x8000 | (addr & 0x1FF0)
    }

    fn write_vram_dma_trigger(&mut self, val: u8) {
        self.hdma.dst = Self::sanitize_vram_dma_dest(self.hdma.dst);
        let requested_blocks = (val & 0x7F) + 1;
        if self.hdma.active && val & 0x80 == 0 {
            // Abort an ongoing H-blank transfer.
            self.hdma.active = false;
            self.hdma.blocks = 0;
            self.hdma.cancelled = true;
        } else if val & 0x80 == 0 {
            self.hdma.mode = DmaMode::Gdma;
            self.hdma.blocks = requested_blocks;
            self.run_gdma();
        } else {
            self.hdma.mode = DmaMode::Hdma;
            self.hdma.blocks = requested_blocks;
            self.hdma.active = true;
            self.hdma.cancelled = false;
            if self.ppu.in_hblank() {
                self.hdma_hblank_transfer();
            }
        }
    }

    /// Source read for DMA engines: unmapped source regions feed 0xFF.
    fn dma_read_byte(&mut self, addr: u16) -> u8 {
        match addr {
            0xFE00..=0xFFFF => 0xFF,
            _ => self.read_byte(addr),
        }
    }

    fn vram_dma_write(&mut self, addr: u16, val: u8) {
        self.ppu.vram[self.ppu.vram_bank][(addr - 0x8000) as usize] = val;
    }

    /// General DMA copies everything at once and charges the CPU a stall.
    fn run_gdma(&mut self) {
        let blocks = self.hdma.blocks;
        for _ in 0..blocks {
            self.copy_vram_dma_block();
        }
        self.hdma.active = false;
        self.hdma.blocks = 0;
        self.hdma.cancelled = false;
    }

    fn copy_vram_dma_block(&mut self) {
        self.hdma.dst = Self::sanitize_vram_dma_dest(self.hdma.dst);
        for _ in 0..0x10 {
            let byte = self.dma_read_byte(self.hdma.src);
            self.vram_dma_write(self.hdma.dst, byte);
            self.hdma.src = self.hdma.src.wrapping_add(1);
            self.hdma.dst = 0x8000 | (self.hdma.dst.wrapping_add(1) & 0x1FFF);
        }
        self.hdma.dst = Self::sanitize_vram_dma_dest(self.hdma.dst);
        self.dma_stall += if self.double_speed() { 64 } else { 32 };
    }

    /// One 0x10-byte H-blank DMA burst.
    pub fn hdma_hblank_transfer(&mut self) {
        if !(self.hdma.active && self.hdma.mode == DmaMode::Hdma) {
            return;
        }
        self.copy_vram_dma_block();
        self.hdma.blocks = self.hdma.blocks.saturating_sub(1);
        if self.hdma.blocks == 0 {
            self.hdma.active = false;
            self.hdma.cancelled = false;
        }
    }

    pub fn vram_dma_active(&self) -> bool {
        self.hdma.active
    }

    /// Stall cycles the CPU owes for VRAM DMA work since the last call.
    pub fn take_dma_stall(&mut self) -> u32 {
        std::mem::take(&mut self.dma_stall)
    }

    fn start_oam_dma(&mut self, src: u16) {
        self.dma_source = src;
        self.dma_cycles = if self.double_speed() {
            OAM_DMA_CYCLES / 2
        } else {
            OAM_DMA_CYCLES
        };
    }

    pub fn oam_dma_active(&self) -> bool {
        self.dma_cycles > 0
    }

    /// Advance an in-flight OAM DMA: one byte lands every 4 t-cycles
    /// (2 in double speed).
    pub fn oam_dma_step(&mut self, cycles: u32) {
        let per_byte = if self.double_speed() { 2 } else { 4 };
        let total = if self.double_speed() {
            OAM_DMA_CYCLES / 2
        } else {
            OAM_DMA_CYCLES
        };
        for _ in 0..cycles {
            if self.dma_cycles == 0 {
                return;
            }
            let elapsed = total - self.dma_cycles;
            if elapsed % per_byte == 0 {
                let idx = elapsed / per_byte;
                if idx < 0xA0 {
                    let byte = self.dma_read_byte(self.dma_source.wrapping_add(idx as u16));
                    self.ppu.oam[idx as usize] = byte;
                }
            }
            self.dma_cycles -= 1;
        }
    }

    /// Advance everything but the CPU and timer by an instruction's worth of
    /// t-cycles. `cycles` is in the CPU clock domain; video, audio and DMA
    /// run at single speed.
    pub fn step_peripherals(&mut self, cycles: u32) {
        self.serial.step(cycles, &mut self.if_reg);
        let hw_cycles = if self.double_speed() {
            cycles / 2
        } else {
            cycles
        };
        self.oam_dma_step(cycles);
        let hblank = self.ppu.step(hw_cycles, &mut self.if_reg);
        if hblank {
            self.hdma_hblank_transfer();
        }
        self.apu.step(hw_cycles);
    }

    /// Flip between normal and double speed if KEY1 is armed. Returns true
    /// if a switch happened.
    pub fn perform_speed_switch(&mut self) -> bool {
        if !self.cgb_mode || self.key1 & 0x01 == 0 {
            return false;
        }
        self.key1 = (self.key1 ^ 0x80) & 0x80;
        self.timer.reset_div(&mut self.if_reg);
        log::debug!(
            "speed switch: now {}",
            if self.double_speed() { "double" } else { "normal" }
        );
        true
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
