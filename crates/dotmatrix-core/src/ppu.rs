pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// T-cycles spent in each LCD mode
const MODE0_CYCLES: u32 = 204; // H-blank
const MODE1_CYCLES: u32 = 456; // one V-blank line
const MODE2_CYCLES: u32 = 80; // OAM scan
const MODE3_CYCLES: u32 = 172; // pixel transfer

const VBLANK_LINES: u8 = 10;

const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

const VRAM_BANK_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;
const PAL_RAM_SIZE: usize = 0x40;
const PAL_INDEX_MASK: u8 = 0x3F;
const PAL_UNUSED_BIT: u8 = 0x40;
const PAL_AUTO_INCREMENT_BIT: u8 = 0x80;

// Window X positions past this never draw.
const WINDOW_X_MAX: u8 = 166;

const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_0_BASE: usize = 0x0000;
const TILE_DATA_1_BASE: usize = 0x0800;

pub const MODE_HBLANK: u8 = 0;
pub const MODE_VBLANK: u8 = 1;
pub const MODE_OAM: u8 = 2;
pub const MODE_TRANSFER: u8 = 3;

/// Monochrome shades as 15-bit RGB555 greens, darkest last.
const DMG_SHADES: [u16; 4] = [0x06F3, 0x06B1, 0x1986, 0x04E1];

#[derive(Copy, Clone, Default)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
    oam_index: usize,
}

pub struct Ppu {
    pub vram: [[u8; VRAM_BANK_SIZE]; 2],
    pub vram_bank: usize,
    pub oam: [u8; OAM_SIZE],

    cgb: bool,

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    lyc_eq_ly: bool,
    pub dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    /// Internal window line counter, only advances on lines the window drew.
    win_line_counter: u8,

    bgpi: u8,
    bgpd: [u8; PAL_RAM_SIZE],
    obpi: u8,
    obpd: [u8; PAL_RAM_SIZE],
    /// Object priority mode register (OPRI)
    opri: u8,

    mode_clock: u32,
    pub mode: u8,

    /// 15-bit RGB555 pixels, one frame.
    pub framebuffer: [u16; SCREEN_WIDTH * SCREEN_HEIGHT],
    line_priority: [bool; SCREEN_WIDTH],
    line_color_zero: [bool; SCREEN_WIDTH],
    line_sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    frame_ready: bool,
    stat_irq_line: bool,
    frame_counter: u64,
}

impl Ppu {
    pub fn new_with_mode(cgb: bool) -> Self {
        Self {
            vram: [[0; VRAM_BANK_SIZE]; 2],
            vram_bank: 0,
            oam: [0; OAM_SIZE],
            cgb,
            lcdc: 0x91,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            lyc_eq_ly: false,
            dma: 0xFF,
            bgp: 0xFC,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            win_line_counter: 0,
            bgpi: PAL_UNUSED_BIT,
            bgpd: [0; PAL_RAM_SIZE],
            obpi: PAL_UNUSED_BIT,
            obpd: [0; PAL_RAM_SIZE],
            opri: 0,
            mode_clock: 0,
            mode: MODE_OAM,
            framebuffer: [0; SCREEN_WIDTH * SCREEN_HEIGHT],
            line_priority: [false; SCREEN_WIDTH],
            line_color_zero: [false; SCREEN_WIDTH],
            line_sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            frame_ready: false,
            stat_irq_line: false,
            frame_counter: 0,
        }
    }

    pub fn new() -> Self {
        Self::new_with_mode(false)
    }

    pub fn in_hblank(&self) -> bool {
        self.mode == MODE_HBLANK
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    /// True while a completed frame sits in `framebuffer`.
    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    pub fn framebuffer(&self) -> &[u16; SCREEN_WIDTH * SCREEN_HEIGHT] {
        &self.framebuffer
    }

    /// Acknowledge the frame after presenting it.
    pub fn clear_frame_flag(&mut self) {
        self.frame_ready = false;
    }

    /// Frames completed since power on.
    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    fn color_at(pal_ram: &[u8; PAL_RAM_SIZE], palette: usize, color_id: usize) -> u16 {
        let off = palette * 8 + color_id * 2;
        u16::from_le_bytes([pal_ram[off], pal_ram[off + 1]]) & 0x7FFF
    }

    fn sanitize_palette_index(value: u8) -> u8 {
        (value & (PAL_AUTO_INCREMENT_BIT | PAL_INDEX_MASK)) | PAL_UNUSED_BIT
    }

    fn palette_ram_index(index: u8) -> usize {
        (index & PAL_INDEX_MASK) as usize
    }

    fn step_palette_index(index: &mut u8) {
        let current = *index;
        let idx = current & PAL_INDEX_MASK;
        let next_idx = if current & PAL_AUTO_INCREMENT_BIT != 0 {
            idx.wrapping_add(1) & PAL_INDEX_MASK
        } else {
            idx
        };
        *index = (current & PAL_AUTO_INCREMENT_BIT) | PAL_UNUSED_BIT | next_idx;
    }

    fn update_lyc_compare(&mut self) {
        if self.lcdc & 0x80 != 0 {
            self.lyc_eq_ly = self.ly == self.lyc;
        }
    }

    pub fn read_reg(&mut self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                (self.stat & 0x78)
                    | 0x80
                    | (self.mode & 0x03)
                    | if self.lyc_eq_ly { 0x04 } else { 0 }
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            0xFF68 if self.cgb => self.bgpi,
            0xFF69 if self.cgb => {
                let val = self.bgpd[Self::palette_ram_index(self.bgpi)];
                Self::step_palette_index(&mut self.bgpi);
                val
            }
            0xFF6A if self.cgb => self.obpi,
            0xFF6B if self.cgb => {
                let val = self.obpd[Self::palette_ram_index(self.obpi)];
                Self::step_palette_index(&mut self.obpi);
                val
            }
            0xFF6C if self.cgb => self.opri | 0xFE,
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcdc & 0x80 != 0;
                self.lcdc = val;
                if was_on && self.lcdc & 0x80 == 0 {
                    self.mode = MODE_HBLANK;
                    self.mode_clock = 0;
                    self.win_line_counter = 0;
                    self.ly = 0;
                }
                if self.lcdc & 0x80 != 0 {
                    self.update_lyc_compare();
                }
            }
            0xFF41 => self.stat = (self.stat & 0x07) | (val & 0xF8),
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            // LY is read-only.
            0xFF44 => {}
            0xFF45 => {
                self.lyc = val;
                self.update_lyc_compare();
            }
            0xFF46 => self.dma = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            0xFF68 if self.cgb => self.bgpi = Self::sanitize_palette_index(val),
            0xFF69 if self.cgb => {
                let idx = Self::palette_ram_index(self.bgpi);
                // Bit 15 of each color is not wired; keep it clear in RAM.
                self.bgpd[idx] = if idx & 1 == 1 { val & 0x7F } else { val };
                Self::step_palette_index(&mut self.bgpi);
            }
            0xFF6A if self.cgb => self.obpi = Self::sanitize_palette_index(val),
            0xFF6B if self.cgb => {
                let idx = Self::palette_ram_index(self.obpi);
                self.obpd[idx] = if idx & 1 == 1 { val & 0x7F } else { val };
                Self::step_palette_index(&mut self.obpi);
            }
            0xFF6C if self.cgb => self.opri = val & 0x01,
            _ => {}
        }
    }

    /// Collect up to 10 sprites visible on the current scanline.
    fn oam_scan(&mut self) {
        let sprite_height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
        self.sprite_count = 0;
        for i in 0..TOTAL_SPRITES {
            if self.sprite_count >= MAX_SPRITES_PER_LINE {
                break;
            }
            let base = i * 4;
            let y = self.oam[base] as i16 - 16;
            if self.ly as i16 >= y && (self.ly as i16) < y + sprite_height {
                self.line_sprites[self.sprite_count] = Sprite {
                    x: self.oam[base + 1] as i16 - 8,
                    y,
                    tile: self.oam[base + 2],
                    flags: self.oam[base + 3],
                    oam_index: i,
                };
                self.sprite_count += 1;
            }
        }
        if self.cgb && self.opri & 0x01 == 0 {
            // color-style priority: table order only
            self.line_sprites[..self.sprite_count].sort_by_key(|s| s.oam_index);
        } else {
            // monochrome-style priority: x position, table order as tiebreak
            self.line_sprites[..self.sprite_count].sort_by_key(|s| (s.x, s.oam_index));
        }
    }

    #[inline(always)]
    fn dmg_shade(palette: u8, color_id: u8) -> u8 {
        (palette >> (color_id * 2)) & 0x03
    }

    fn render_scanline(&mut self) {
        if self.lcdc & 0x80 == 0 || self.ly as usize >= SCREEN_HEIGHT {
            return;
        }

        self.line_priority.fill(false);
        self.line_color_zero.fill(false);

        // In color mode LCDC bit 0 demotes background priority instead of
        // blanking it.
        let bg_enabled = self.cgb || self.lcdc & 0x01 != 0;
        let master_priority = !self.cgb || self.lcdc & 0x01 != 0;

        // Pre-fill with color 0 so a disabled background still gives sprites
        // a "background was zero" line to composite against.
        let bg_color = if self.cgb {
            Self::color_at(&self.bgpd, 0, 0)
        } else {
            DMG_SHADES[Self::dmg_shade(self.bgp, 0) as usize]
        };
        let row = self.ly as usize * SCREEN_WIDTH;
        for x in 0..SCREEN_WIDTH {
            self.framebuffer[row + x] = bg_color;
            self.line_color_zero[x] = true;
        }

        if bg_enabled {
            let tile_map_base = if self.lcdc & 0x08 != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };

            for x in 0..SCREEN_WIDTH as u16 {
                let px = x.wrapping_add(self.scx as u16) & 0xFF;
                let tile_col = (px / 8) as usize;
                let bg_y = (self.ly as u16 + self.scy as u16) & 0xFF;
                let tile_row = (bg_y / 8) as usize;
                let tile_y = (bg_y % 8) as usize;
                let map_index = tile_map_base + tile_row * 32 + tile_col;
                let tile_x = (px % 8) as usize;
                self.draw_tile_pixel(map_index, tile_x, tile_y, x as usize);
            }

            // window
            let mut window_drawn = false;
            if self.lcdc & 0x20 != 0 && self.ly >= self.wy && self.wx <= WINDOW_X_MAX {
                let wx = self.wx.wrapping_sub(7) as u16;
                let window_map_base = if self.lcdc & 0x40 != 0 {
                    BG_MAP_1_BASE
                } else {
                    BG_MAP_0_BASE
                };
                let window_y = self.win_line_counter as usize;
                for x in wx..SCREEN_WIDTH as u16 {
                    let window_x = (x - wx) as usize;
                    let map_index = window_map_base + (window_y / 8) * 32 + window_x / 8;
                    self.draw_tile_pixel(map_index, window_x % 8, window_y % 8, x as usize);
                }
                window_drawn = wx < SCREEN_WIDTH as u16;
            }
            if window_drawn {
                self.win_line_counter = self.win_line_counter.wrapping_add(1);
            }
        }

        // sprites
        if self.lcdc & 0x02 != 0 {
            let sprite_height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
            let mut drawn = [false; SCREEN_WIDTH];
            for s in &self.line_sprites[..self.sprite_count] {
                let mut tile = s.tile;
                if sprite_height == 16 {
                    tile &= 0xFE;
                }
                let mut line_idx = self.ly as i16 - s.y;
                if s.flags & 0x40 != 0 {
                    line_idx = sprite_height - 1 - line_idx;
                }
                let bank = if self.cgb {
                    ((s.flags >> 3) & 0x01) as usize
                } else {
                    0
                };
                for px in 0..8 {
                    let bit = if s.flags & 0x20 != 0 { px } else { 7 - px };
                    let addr = (tile + ((line_idx as usize) >> 3) as u8) as usize * 16
                        + (line_idx as usize & 7) * 2;
                    let lo = self.vram[bank][addr];
                    let hi = self.vram[bank][addr + 1];
                    let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                    if color_id == 0 {
                        continue;
                    }
                    let sx = s.x + px as i16;
                    if !(0i16..SCREEN_WIDTH as i16).contains(&sx) || drawn[sx as usize] {
                        continue;
                    }
                    let bg_zero = !bg_enabled || self.line_color_zero[sx as usize];
                    if master_priority {
                        if self.cgb && self.line_priority[sx as usize] && !bg_zero {
                            continue;
                        }
                        if s.flags & 0x80 != 0 && !bg_zero {
                            continue;
                        }
                    }
                    let color = if self.cgb {
                        Self::color_at(&self.obpd, (s.flags & 0x07) as usize, color_id as usize)
                    } else {
                        let pal = if s.flags & 0x10 != 0 {
                            self.obp1
                        } else {
                            self.obp0
                        };
                        DMG_SHADES[Self::dmg_shade(pal, color_id) as usize]
                    };
                    self.framebuffer[row + sx as usize] = color;
                    drawn[sx as usize] = true;
                }
            }
        }
    }

    /// Composite one background or window pixel at screen column `screen_x`.
    fn draw_tile_pixel(&mut self, map_index: usize, tile_x: usize, tile_y: usize, screen_x: usize) {
        let tile_index = self.vram[0][map_index];
        let addr = if self.lcdc & 0x10 != 0 {
            TILE_DATA_0_BASE + tile_index as usize * 16
        } else {
            TILE_DATA_1_BASE + ((tile_index as i8 as i16 + 128) as usize) * 16
        };
        let mut bit = 7 - tile_x;
        let mut tile_y = tile_y;
        let mut priority = false;
        let mut palette = 0usize;
        let mut bank = 0usize;
        if self.cgb {
            let attr = self.vram[1][map_index];
            palette = (attr & 0x07) as usize;
            bank = ((attr >> 3) & 0x01) as usize;
            if attr & 0x20 != 0 {
                bit = tile_x;
            }
            if attr & 0x40 != 0 {
                tile_y = 7 - tile_y;
            }
            priority = attr & 0x80 != 0;
        }
        let lo = self.vram[bank][addr + tile_y * 2];
        let hi = self.vram[bank][addr + tile_y * 2 + 1];
        let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
        let color = if self.cgb {
            Self::color_at(&self.bgpd, palette, color_id as usize)
        } else {
            DMG_SHADES[Self::dmg_shade(self.bgp, color_id) as usize]
        };
        self.framebuffer[self.ly as usize * SCREEN_WIDTH + screen_x] = color;
        self.line_priority[screen_x] = priority;
        self.line_color_zero[screen_x] = color_id == 0;
    }

    /// Advance the mode machine by `cycles` t-cycles. Returns true if an
    /// H-blank boundary was crossed (used to gate H-blank VRAM DMA).
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) -> bool {
        let mut remaining = cycles;
        let mut hblank_triggered = false;
        while remaining > 0 {
            let increment = remaining.min(4);
            remaining -= increment;
            if self.lcdc & 0x80 == 0 {
                self.mode = MODE_HBLANK;
                self.ly = 0;
                self.mode_clock = 0;
                self.win_line_counter = 0;
                continue;
            }

            self.update_lyc_compare();
            self.mode_clock += increment;

            match self.mode {
                MODE_HBLANK => {
                    if self.mode_clock >= MODE0_CYCLES {
                        self.mode_clock -= MODE0_CYCLES;
                        self.ly += 1;
                        self.update_lyc_compare();
                        if self.ly == SCREEN_HEIGHT as u8 {
                            self.frame_ready = true;
                            self.mode = MODE_VBLANK;
                            *if_reg |= 0x01;
                        } else {
                            self.mode = MODE_OAM;
                        }
                    }
                }
                MODE_VBLANK => {
                    if self.mode_clock >= MODE1_CYCLES {
                        self.mode_clock -= MODE1_CYCLES;
                        self.ly += 1;
                        self.update_lyc_compare();
                        if self.ly > SCREEN_HEIGHT as u8 + VBLANK_LINES - 1 {
                            self.ly = 0;
                            self.frame_ready = false;
                            self.win_line_counter = 0;
                            self.frame_counter = self.frame_counter.wrapping_add(1);
                            self.mode = MODE_OAM;
                            self.update_lyc_compare();
                        }
                    }
                }
                MODE_OAM => {
                    if self.mode_clock >= MODE2_CYCLES {
                        self.mode_clock -= MODE2_CYCLES;
                        self.oam_scan();
                        self.mode = MODE_TRANSFER;
                    }
                }
                MODE_TRANSFER => {
                    if self.mode_clock >= MODE3_CYCLES {
                        self.mode_clock -= MODE3_CYCLES;
                        self.render_scanline();
                        self.mode = MODE_HBLANK;
                        hblank_triggered = true;
                    }
                }
                _ => unreachable!("invalid LCD mode {}", self.mode),
            }

            self.update_stat_irq(if_reg);
        }
        hblank_triggered
    }

    /// STAT interrupts fire on the rising edge of the combined condition
    /// line, not per condition.
    fn update_stat_irq(&mut self, if_reg: &mut u8) {
        let coincidence = self.lyc_eq_ly && self.stat & 0x40 != 0;
        let mode_signal = match self.mode {
            MODE_HBLANK => self.stat & 0x08 != 0,
            MODE_VBLANK => self.stat & 0x10 != 0,
            MODE_OAM => self.stat & 0x20 != 0,
            _ => false,
        };
        let current = coincidence || mode_signal;
        if current && !self.stat_irq_line {
            *if_reg |= 0x02;
        }
        self.stat_irq_line = current;
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
