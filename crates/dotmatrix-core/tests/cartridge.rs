use dotmatrix_core::cartridge::{Cartridge, CartridgeError};

fn battery_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0134..0x0139].copy_from_slice(b"SAVED");
    rom[0x0147] = 0x03; // MBC1 + RAM + battery
    rom[0x0149] = 0x02; // one 8 KiB bank
    rom
}

#[test]
fn save_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");
    std::fs::write(&rom_path, battery_rom()).unwrap();

    {
        let mut cart = Cartridge::from_file(&rom_path).unwrap();
        cart.write(0x0000, 0x0A);
        cart.write(0xA000, 0x5A);
        cart.write(0xBFFF, 0xA5);
        cart.save_ram().unwrap();
    }
    assert!(dir.path().join("game.sav").exists());

    let mut cart = Cartridge::from_file(&rom_path).unwrap();
    cart.write(0x0000, 0x0A);
    assert_eq!(cart.read(0xA000), 0x5A);
    assert_eq!(cart.read(0xBFFF), 0xA5);
}

#[test]
fn save_without_battery_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x01; // MBC1, no battery
    rom[0x0149] = 0x02;
    std::fs::write(&rom_path, rom).unwrap();

    let mut cart = Cartridge::from_file(&rom_path).unwrap();
    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x77);
    cart.save_ram().unwrap();
    assert!(!dir.path().join("game.sav").exists());
}

#[test]
fn truncated_save_file_restores_what_it_has() {
    let dir = tempfile::tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");
    std::fs::write(&rom_path, battery_rom()).unwrap();
    std::fs::write(dir.path().join("game.sav"), [0x42u8; 0x10]).unwrap();

    let mut cart = Cartridge::from_file(&rom_path).unwrap();
    cart.write(0x0000, 0x0A);
    assert_eq!(cart.read(0xA000), 0x42);
    assert_eq!(cart.read(0xA00F), 0x42);
    assert_eq!(cart.read(0xA010), 0x00);
}

#[test]
fn missing_file_reports_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Cartridge::from_file(dir.path().join("nope.gb")).unwrap_err();
    assert!(matches!(err, CartridgeError::Io(_)));
}

#[test]
fn header_title_survives_loading() {
    let cart = Cartridge::load(battery_rom()).unwrap();
    assert_eq!(cart.header.title, "SAVED");
    assert!(cart.header.has_battery());
}

#[test]
fn rom_shorter_than_declared_reads_open_bus_in_padding() {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x01;
    rom[0x0148] = 0x02; // declares 8 banks, image holds 2
    let mut cart = Cartridge::load(rom).unwrap();
    cart.write(0x2000, 0x05);
    assert_eq!(cart.read(0x4000), 0xFF);
}
