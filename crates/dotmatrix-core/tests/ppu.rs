use dotmatrix_core::ppu::{Ppu, MODE_HBLANK, MODE_OAM, MODE_TRANSFER, SCREEN_WIDTH};

const LINE_CYCLES: u32 = 456;

#[test]
fn frame_visits_every_line_once() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    for line in 0u8..154 {
        assert_eq!(ppu.ly(), line);
        ppu.step(LINE_CYCLES, &mut if_reg);
    }
    assert_eq!(ppu.ly(), 0);
    assert_eq!(ppu.frames(), 1);
}

#[test]
fn vblank_interrupt_fires_once_per_frame() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    ppu.step(LINE_CYCLES * 144, &mut if_reg);
    assert!(ppu.frame_ready());
    assert_eq!(if_reg & 0x01, 0x01);

    if_reg = 0;
    ppu.step(LINE_CYCLES * 10, &mut if_reg);
    assert_eq!(ppu.ly(), 0);
    assert_eq!(if_reg & 0x01, 0, "no second VBlank within the same frame");
}

#[test]
fn mode_sequence_within_a_line() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    assert_eq!(ppu.mode, MODE_OAM);
    ppu.step(80, &mut if_reg);
    assert_eq!(ppu.mode, MODE_TRANSFER);
    ppu.step(172, &mut if_reg);
    assert_eq!(ppu.mode, MODE_HBLANK);
    ppu.step(204, &mut if_reg);
    assert_eq!(ppu.mode, MODE_OAM);
    assert_eq!(ppu.ly(), 1);
}

#[test]
fn hblank_entry_is_reported_for_vram_dma() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    assert!(!ppu.step(80 + 172 - 4, &mut if_reg));
    assert!(ppu.step(4, &mut if_reg));
}

#[test]
fn stat_lyc_interrupt_on_match() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    ppu.write_reg(0xFF45, 5);
    ppu.write_reg(0xFF41, 0x40);
    ppu.step(LINE_CYCLES * 4, &mut if_reg);
    assert_eq!(ppu.ly(), 4);
    if_reg = 0;
    // The match happens when LY advances to 5 during this line.
    ppu.step(LINE_CYCLES, &mut if_reg);
    assert_eq!(ppu.ly(), 5);
    assert_eq!(if_reg & 0x02, 0x02);
}

#[test]
fn stat_read_composes_mode_and_coincidence() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    ppu.write_reg(0xFF45, 0);
    ppu.step(4, &mut if_reg);
    let stat = ppu.read_reg(0xFF41);
    assert_ne!(stat & 0x80, 0);
    assert_eq!(stat & 0x03, MODE_OAM);
    assert_ne!(stat & 0x04, 0, "LY==LYC==0 sets the coincidence bit");
}

#[test]
fn ly_is_read_only() {
    let mut ppu = Ppu::new();
    ppu.write_reg(0xFF44, 0x55);
    assert_eq!(ppu.read_reg(0xFF44), 0);
}

#[test]
fn lcd_off_holds_line_zero() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    ppu.step(LINE_CYCLES * 3, &mut if_reg);
    assert_eq!(ppu.ly(), 3);
    ppu.write_reg(0xFF40, 0x11); // bit 7 clear turns the LCD off
    assert_eq!(ppu.ly(), 0);
    ppu.step(LINE_CYCLES * 10, &mut if_reg);
    assert_eq!(ppu.ly(), 0);
    assert!(!ppu.frame_ready());
}

#[test]
fn blank_background_renders_shade_zero() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    // BGP 0xFC maps color 0 to the lightest shade.
    ppu.step(LINE_CYCLES * 144, &mut if_reg);
    assert!(ppu.frame_ready());
    let fb = ppu.framebuffer();
    assert_eq!(fb[0], 0x06F3);
    assert!(fb.iter().all(|&px| px == 0x06F3));
}

#[test]
fn bgp_remaps_color_zero() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    ppu.write_reg(0xFF47, 0xFF); // color 0 -> darkest shade
    ppu.step(LINE_CYCLES * 144, &mut if_reg);
    assert_eq!(ppu.framebuffer()[0], 0x04E1);
}

#[test]
fn solid_tile_renders_shade_three() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    // LCDC default 0x91 selects tile data at 0x8000 and map at 0x9800.
    // Tile 0 with every bit of both planes set is color 3 everywhere.
    for i in 0..16 {
        ppu.vram[0][i] = 0xFF;
    }
    ppu.write_reg(0xFF47, 0xE4); // identity palette
    ppu.step(LINE_CYCLES * 144, &mut if_reg);
    let fb = ppu.framebuffer();
    assert_eq!(fb[0], 0x04E1);
    assert_eq!(fb[SCREEN_WIDTH * 143 + 159], 0x04E1);
}

#[test]
fn sprite_pixel_composites_over_background() {
    let mut ppu = Ppu::new();
    let mut if_reg = 0;
    // Sprite tile 1: color 1 across the row (low plane set).
    for i in 0..8 {
        ppu.vram[0][16 + i * 2] = 0xFF;
    }
    // Sprite at top-left corner.
    ppu.oam[0] = 16; // y
    ppu.oam[1] = 8; // x
    ppu.oam[2] = 1; // tile
    ppu.oam[3] = 0; // attributes
    ppu.write_reg(0xFF40, 0x93); // enable sprites alongside the defaults
    ppu.write_reg(0xFF48, 0xE4); // OBP0 identity
    ppu.step(LINE_CYCLES * 144, &mut if_reg);
    // Color 1 under the identity palette is the second shade.
    assert_eq!(ppu.framebuffer()[0], 0x06B1);
    // Outside the sprite the blank background shows through.
    assert_eq!(ppu.framebuffer()[8], 0x06F3);
}

#[test]
fn cgb_palette_ram_autoincrements_and_masks() {
    let mut ppu = Ppu::new_with_mode(true);
    ppu.write_reg(0xFF68, 0x80); // index 0, auto-increment
    ppu.write_reg(0xFF69, 0x34);
    ppu.write_reg(0xFF69, 0xFF); // high byte keeps bit 15 clear
    ppu.write_reg(0xFF68, 0x00);
    assert_eq!(ppu.read_reg(0xFF69), 0x34);
    ppu.write_reg(0xFF68, 0x01);
    assert_eq!(ppu.read_reg(0xFF69), 0x7F);
}
