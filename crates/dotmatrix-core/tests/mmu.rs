use dotmatrix_core::{cartridge::Cartridge, mmu::Mmu};

#[test]
fn wram_echo_and_bank_switch() {
    let mut mmu = Mmu::new_with_mode(true);
    mmu.write_byte(0xC000, 0xAA);
    assert_eq!(mmu.read_byte(0xC000), 0xAA);
    mmu.write_byte(0xE000, 0xBB);
    assert_eq!(mmu.read_byte(0xC000), 0xBB);

    mmu.write_byte(0xFF70, 0x02);
    mmu.write_byte(0xD000, 0xCC);
    assert_eq!(mmu.read_byte(0xD000), 0xCC);

    mmu.write_byte(0xFF70, 0x03);
    assert_eq!(mmu.read_byte(0xD000), 0x00);
    mmu.write_byte(0xD000, 0xDD);
    assert_eq!(mmu.read_byte(0xD000), 0xDD);

    mmu.write_byte(0xFF70, 0x02);
    assert_eq!(mmu.read_byte(0xD000), 0xCC);
}

#[test]
fn wram_bank_zero_selects_one() {
    let mut mmu = Mmu::new_with_mode(true);
    mmu.write_byte(0xFF70, 0x00);
    assert_eq!(mmu.read_byte(0xFF70), 0xF8 | 1);
}

#[test]
fn vram_bank_switch() {
    let mut mmu = Mmu::new_with_mode(true);
    mmu.write_byte(0x8000, 0x11);
    assert_eq!(mmu.read_byte(0x8000), 0x11);

    mmu.write_byte(0xFF4F, 0x01);
    assert_eq!(mmu.read_byte(0xFF4F), 0xFF);
    assert_eq!(mmu.read_byte(0x8000), 0x00);
    mmu.write_byte(0x8000, 0x22);
    assert_eq!(mmu.read_byte(0x8000), 0x22);

    mmu.write_byte(0xFF4F, 0x00);
    assert_eq!(mmu.read_byte(0x8000), 0x11);
}

fn program_vram_dma(mmu: &mut Mmu) {
    for (i, addr) in (0xC000..0xC040).enumerate() {
        mmu.write_byte(addr, i as u8);
    }
    mmu.write_byte(0xFF51, 0xC0);
    mmu.write_byte(0xFF52, 0x00);
    mmu.write_byte(0xFF53, 0x00);
    mmu.write_byte(0xFF54, 0x00);
}

#[test]
fn gdma_copies_immediately_and_stalls_cpu() {
    let mut mmu = Mmu::new_with_mode(true);
    program_vram_dma(&mut mmu);

    // Two 16-byte blocks, bit 7 clear selects general-purpose mode.
    mmu.write_byte(0xFF55, 0x01);
    for i in 0..0x20u16 {
        assert_eq!(mmu.read_byte(0x8000 + i), i as u8);
    }
    assert_eq!(mmu.take_dma_stall(), 64);
    assert_eq!(mmu.take_dma_stall(), 0);
    assert_eq!(mmu.read_byte(0xFF55), 0xFF);
}

#[test]
fn hdma_transfers_one_block_per_hblank() {
    let mut mmu = Mmu::new_with_mode(true);
    program_vram_dma(&mut mmu);

    // Two blocks in H-blank mode. The PPU starts in OAM scan, so nothing
    // copies yet.
    mmu.write_byte(0xFF55, 0x81);
    assert_eq!(mmu.read_byte(0x8000), 0x00);
    assert_eq!(mmu.read_byte(0xFF55), 0x01);

    mmu.hdma_hblank_transfer();
    assert_eq!(mmu.read_byte(0x800F), 0x0F);
    assert_eq!(mmu.read_byte(0x8010), 0x00);
    assert_eq!(mmu.read_byte(0xFF55), 0x00);

    mmu.hdma_hblank_transfer();
    assert_eq!(mmu.read_byte(0x801F), 0x1F);
    assert_eq!(mmu.read_byte(0xFF55), 0xFF);
    assert!(!mmu.vram_dma_active());
}

#[test]
fn hdma_abort_reports_bit7() {
    let mut mmu = Mmu::new_with_mode(true);
    program_vram_dma(&mut mmu);

    mmu.write_byte(0xFF55, 0x83);
    mmu.hdma_hblank_transfer();
    // Writing with bit 7 clear aborts the remaining blocks.
    mmu.write_byte(0xFF55, 0x00);
    assert_eq!(mmu.read_byte(0xFF55), 0x80);
    // The already copied block stays.
    assert_eq!(mmu.read_byte(0x800F), 0x0F);
    // No further blocks move.
    mmu.hdma_hblank_transfer();
    assert_eq!(mmu.read_byte(0x8010), 0x00);
}

#[test]
fn oam_dma_transfer() {
    let mut mmu = Mmu::new();
    for i in 0..0xA0u16 {
        mmu.write_byte(0xC000 + i, i as u8);
    }
    mmu.write_byte(0xFF46, 0xC0);
    mmu.oam_dma_step(640);
    assert_eq!(mmu.ppu.oam[0], 0x00);
    assert_eq!(mmu.ppu.oam[0x9F], 0x9F);
    assert!(!mmu.oam_dma_active());
}

#[test]
fn oam_blocked_while_dma_in_flight() {
    let mut mmu = Mmu::new();
    mmu.ppu.oam[0] = 0x12;
    for i in 0..0xA0u16 {
        mmu.write_byte(0xC000 + i, 0x55);
    }
    mmu.write_byte(0xFF46, 0xC0);
    assert!(mmu.oam_dma_active());

    // Reads come back open bus and writes are dropped mid-transfer.
    mmu.oam_dma_step(8);
    assert_eq!(mmu.read_byte(0xFE00), 0xFF);
    mmu.write_byte(0xFE05, 0x99);

    mmu.oam_dma_step(632);
    assert_eq!(mmu.read_byte(0xFE00), 0x55);
    assert_eq!(mmu.read_byte(0xFE05), 0x55);
}

#[test]
fn unusable_region_reads_ff() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0xFEA0, 0x12);
    assert_eq!(mmu.read_byte(0xFEA0), 0xFF);
    assert_eq!(mmu.read_byte(0xFEFF), 0xFF);
}

#[test]
fn if_upper_bits_read_set() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0xFF0F, 0x00);
    assert_eq!(mmu.read_byte(0xFF0F), 0xE0);
    mmu.write_byte(0xFF0F, 0xFF);
    assert_eq!(mmu.read_byte(0xFF0F), 0xFF);
}

#[test]
fn serial_transfer_through_the_bus() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0xFF01, b'G');
    mmu.write_byte(0xFF02, 0x81);
    mmu.step_peripherals(512);
    assert_eq!(mmu.take_serial(), vec![b'G']);
    assert_ne!(mmu.if_reg & 0x08, 0);
    // Incoming side is disconnected and shifts in ones.
    assert_eq!(mmu.read_byte(0xFF01), 0xFF);
}

#[test]
fn mbc1_rom_bank_switching() {
    let mut rom = vec![0u8; 128 * 0x4000];
    rom[0x0147] = 0x01; // MBC1
    rom[0x0148] = 0x06; // 128 banks
    for i in 0..128 {
        rom[i * 0x4000] = i as u8;
    }

    let cart = Cartridge::load(rom).unwrap();
    let mut mmu = Mmu::new();
    mmu.load_cart(cart);

    // default bank 1 at 0x4000
    assert_eq!(mmu.read_byte(0x4000), 1);

    mmu.write_byte(0x2000, 0x02);
    assert_eq!(mmu.read_byte(0x4000), 2);

    mmu.write_byte(0x4000, 0x01); // upper bits -> bank 0x22
    assert_eq!(mmu.read_byte(0x4000), 34);

    // Selecting "bank 0" lands on the next bank up.
    mmu.write_byte(0x2000, 0x00);
    assert_eq!(mmu.read_byte(0x4000), 33);

    mmu.write_byte(0x6000, 0x01); // mode 1 remaps the fixed window
    assert_eq!(mmu.read_byte(0x0000), 32);
}

#[test]
fn mbc1_ram_enable_gate() {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x03; // MBC1 + RAM + battery
    rom[0x0149] = 0x03; // 4 banks
    let cart = Cartridge::load(rom).unwrap();
    let mut mmu = Mmu::new();
    mmu.load_cart(cart);

    mmu.write_byte(0xA000, 0x55);
    assert_eq!(mmu.read_byte(0xA000), 0xFF);

    mmu.write_byte(0x0000, 0x0A);
    mmu.write_byte(0xA000, 0x55);
    assert_eq!(mmu.read_byte(0xA000), 0x55);

    mmu.write_byte(0x0000, 0x00);
    assert_eq!(mmu.read_byte(0xA000), 0xFF);
}

#[test]
fn mbc2_nibble_ram_and_bank_decode() {
    let mut rom = vec![0u8; 16 * 0x4000];
    rom[0x0147] = 0x05; // MBC2
    rom[0x0148] = 0x03; // 16 banks
    for i in 0..16 {
        rom[i * 0x4000] = i as u8;
    }
    let cart = Cartridge::load(rom).unwrap();
    let mut mmu = Mmu::new();
    mmu.load_cart(cart);

    // Address bit 8 set selects the ROM bank register.
    mmu.write_byte(0x2100, 0x03);
    assert_eq!(mmu.read_byte(0x4000), 3);

    // Bit 8 clear toggles RAM enable.
    mmu.write_byte(0x0000, 0x0A);
    mmu.write_byte(0xA000, 0x35);
    // Only the low nibble is stored, upper bits read back open.
    assert_eq!(mmu.read_byte(0xA000), 0xF5);
    // The 512 nibbles mirror across the window.
    assert_eq!(mmu.read_byte(0xA200), 0xF5);
}

#[test]
fn mbc5_can_map_bank_zero() {
    let mut rom = vec![0u8; 64 * 0x4000];
    rom[0x0147] = 0x19; // MBC5
    rom[0x0148] = 0x05; // 64 banks
    for i in 0..64 {
        rom[i * 0x4000] = i as u8;
    }
    let cart = Cartridge::load(rom).unwrap();
    let mut mmu = Mmu::new();
    mmu.load_cart(cart);

    mmu.write_byte(0x2000, 0x05);
    assert_eq!(mmu.read_byte(0x4000), 5);

    mmu.write_byte(0x2000, 0x00);
    assert_eq!(mmu.read_byte(0x4000), 0);
}

#[test]
fn key1_and_speed_switch() {
    let mut mmu = Mmu::new_with_mode(true);
    assert!(!mmu.double_speed());
    assert_eq!(mmu.read_byte(0xFF4D), 0x7E);

    // Not armed: STOP does nothing.
    assert!(!mmu.perform_speed_switch());

    mmu.write_byte(0xFF4D, 0x01);
    assert!(mmu.perform_speed_switch());
    assert!(mmu.double_speed());
    assert_eq!(mmu.read_byte(0xFF4D), 0x80 | 0x7E);

    mmu.write_byte(0xFF4D, 0x01);
    assert!(mmu.perform_speed_switch());
    assert!(!mmu.double_speed());
}

#[test]
fn cgb_registers_hidden_in_dmg_mode() {
    let mut mmu = Mmu::new();
    assert_eq!(mmu.read_byte(0xFF4D), 0xFF);
    assert_eq!(mmu.read_byte(0xFF4F), 0xFF);
    assert_eq!(mmu.read_byte(0xFF55), 0xFF);
    assert_eq!(mmu.read_byte(0xFF70), 0xFF);
    mmu.write_byte(0xFF70, 0x03);
    mmu.write_byte(0xD000, 0x42);
    mmu.write_byte(0xFF70, 0x01);
    // Bank never moved.
    assert_eq!(mmu.read_byte(0xD000), 0x42);
}
