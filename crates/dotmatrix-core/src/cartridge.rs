use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

#[derive(Debug)]
pub enum CartridgeError {
    /// ROM image shorter than the 0x150-byte header.
    TooShort(usize),
    /// Cartridge type byte names a mapper this core does not model.
    UnsupportedType(u8),
    Io(io::Error),
}

impl fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartridgeError::TooShort(len) => {
                write!(f, "ROM image too short for a cartridge header ({len} bytes)")
            }
            CartridgeError::UnsupportedType(t) => {
                write!(f, "unsupported cartridge type 0x{t:02X}")
            }
            CartridgeError::Io(e) => write!(f, "cartridge I/O error: {e}"),
        }
    }
}

impl std::error::Error for CartridgeError {}

impl From<io::Error> for CartridgeError {
    fn from(e: io::Error) -> Self {
        CartridgeError::Io(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    None,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

impl fmt::Display for MbcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MbcType::None => "ROM only",
            MbcType::Mbc1 => "MBC1",
            MbcType::Mbc2 => "MBC2",
            MbcType::Mbc3 => "MBC3",
            MbcType::Mbc5 => "MBC5",
        };
        f.write_str(name)
    }
}

/// Decoded cartridge header fields (0x0100-0x014F).
#[derive(Debug, Clone)]
pub struct Header {
    pub title: String,
    pub cgb: bool,
    pub cart_type: u8,
    pub mbc: MbcType,
    pub rom_banks: usize,
    pub ram_banks: usize,
    pub version: u8,
}

impl Header {
    pub fn parse(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < 0x150 {
            return Err(CartridgeError::TooShort(data.len()));
        }

        let mut title_bytes = &data[0x0134..0x0143];
        if let Some(pos) = title_bytes.iter().position(|&b| b == 0) {
            title_bytes = &title_bytes[..pos];
        }
        let title = String::from_utf8_lossy(title_bytes).trim().to_string();

        let cart_type = data[0x0147];
        let mbc = match cart_type {
            0x00 | 0x08 | 0x09 => MbcType::None,
            0x01..=0x03 => MbcType::Mbc1,
            0x05 | 0x06 => MbcType::Mbc2,
            0x0F..=0x13 => MbcType::Mbc3,
            0x19..=0x1E => MbcType::Mbc5,
            other => return Err(CartridgeError::UnsupportedType(other)),
        };

        let rom_banks = 2usize << (data[0x0148] & 0x0F).min(8);
        // MBC2 carries its 512x4-bit RAM internally; the header code is 0.
        let ram_banks = if mbc == MbcType::Mbc2 {
            1
        } else {
            match data[0x0149] {
                0x00 => 0,
                0x01 | 0x02 => 1,
                0x03 => 4,
                0x04 => 16,
                0x05 => 8,
                _ => 1,
            }
        };

        Ok(Self {
            title,
            cgb: data[0x0143] & 0x80 != 0,
            cart_type,
            mbc,
            rom_banks,
            ram_banks,
            version: data[0x014C],
        })
    }

    pub fn has_battery(&self) -> bool {
        matches!(
            self.cart_type,
            0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E
        )
    }
}

#[derive(Debug)]
enum MbcState {
    None,
    Mbc1 {
        rom_bank: u8,
        upper_bank: u8,
        mode: u8,
        ram_enable: bool,
    },
    Mbc2 {
        rom_bank: u8,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: u8,
        ram_bank: u8,
        ram_enable: bool,
    },
    Mbc5 {
        rom_bank: u16,
        ram_bank: u8,
        ram_enable: bool,
    },
}

/// A loaded cartridge. ROM and RAM are arenas of fixed-size banks; every
/// access resolves a bank index first, then indexes into that bank.
#[derive(Debug)]
pub struct Cartridge {
    rom_banks: Vec<Box<[u8; ROM_BANK_SIZE]>>,
    ram_banks: Vec<Box<[u8; RAM_BANK_SIZE]>>,
    pub header: Header,
    state: MbcState,
    save_path: Option<PathBuf>,
}

impl Cartridge {
    pub fn load(data: Vec<u8>) -> Result<Self, CartridgeError> {
        let header = Header::parse(&data)?;

        let mut rom_banks = Vec::with_capacity(header.rom_banks);
        for chunk in data.chunks(ROM_BANK_SIZE) {
            let mut bank = Box::new([0u8; ROM_BANK_SIZE]);
            bank[..chunk.len()].copy_from_slice(chunk);
            rom_banks.push(bank);
        }
        // Pad out to the declared bank count so bank arithmetic never
        // indexes past the arena.
        while rom_banks.len() < header.rom_banks {
            rom_banks.push(Box::new([0xFF; ROM_BANK_SIZE]));
        }

        let ram_banks = (0..header.ram_banks)
            .map(|_| Box::new([0u8; RAM_BANK_SIZE]))
            .collect();

        let state = match header.mbc {
            MbcType::None => MbcState::None,
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                upper_bank: 0,
                mode: 0,
                ram_enable: false,
            },
            MbcType::Mbc2 => MbcState::Mbc2 {
                rom_bank: 1,
                ram_enable: false,
            },
            MbcType::Mbc3 => MbcState::Mbc3 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
            },
            MbcType::Mbc5 => MbcState::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
            },
        };

        log::info!(
            "loaded {:?}: {} ({} ROM banks, {} RAM banks, CGB: {})",
            header.title,
            header.mbc,
            rom_banks.len(),
            header.ram_banks,
            header.cgb
        );

        Ok(Self {
            rom_banks,
            ram_banks,
            header,
            state,
            save_path: None,
        })
    }

    /// Load from a ROM file, picking up a `.sav` sibling for battery carts.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let data = fs::read(&path)?;
        let mut cart = Self::load(data)?;

        if cart.header.has_battery() {
            let mut save = PathBuf::from(path.as_ref());
            save.set_extension("sav");
            if let Ok(bytes) = fs::read(&save) {
                cart.restore_ram(&bytes);
            }
            cart.save_path = Some(save);
        }
        Ok(cart)
    }

    /// Fill RAM banks from a flat dump, in bank order.
    fn restore_ram(&mut self, bytes: &[u8]) {
        for (i, chunk) in bytes.chunks(RAM_BANK_SIZE).enumerate() {
            let Some(bank) = self.ram_banks.get_mut(i) else {
                break;
            };
            bank[..chunk.len()].copy_from_slice(chunk);
        }
    }

    /// Persist battery RAM as a flat concatenation of banks.
    pub fn save_ram(&self) -> io::Result<()> {
        let Some(path) = &self.save_path else {
            return Ok(());
        };
        if self.ram_banks.is_empty() {
            return Ok(());
        }
        let mut flat = Vec::with_capacity(self.ram_banks.len() * RAM_BANK_SIZE);
        for bank in &self.ram_banks {
            flat.extend_from_slice(&bank[..]);
        }
        fs::write(path, &flat)
    }

    /// Bank index for the fixed 0x0000-0x3FFF window. Only MBC1's banking
    /// mode 1 remaps it.
    fn low_bank(&self) -> usize {
        match &self.state {
            MbcState::Mbc1 {
                upper_bank, mode, ..
            } if *mode == 1 => (((*upper_bank as usize) & 0x03) << 5) % self.rom_banks.len(),
            _ => 0,
        }
    }

    /// Bank index for the switchable 0x4000-0x7FFF window, after the bank-0
    /// remap and modulo wrap.
    fn high_bank(&self) -> usize {
        let count = self.rom_banks.len();
        match &self.state {
            MbcState::None => 1 % count,
            MbcState::Mbc1 {
                rom_bank,
                upper_bank,
                ..
            } => {
                let mut bank = (((*upper_bank as usize) & 0x03) << 5) | (*rom_bank as usize & 0x1F);
                if bank & 0x1F == 0 {
                    bank |= 1;
                }
                bank % count
            }
            MbcState::Mbc2 { rom_bank, .. } | MbcState::Mbc3 { rom_bank, .. } => {
                let bank = if *rom_bank == 0 { 1 } else { *rom_bank as usize };
                bank % count
            }
            // MBC5 is the one mapper that can really map bank 0 here.
            MbcState::Mbc5 { rom_bank, .. } => (*rom_bank as usize) % count,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom_banks[self.low_bank()][addr as usize],
            0x4000..=0x7FFF => self.rom_banks[self.high_bank()][addr as usize - 0x4000],
            0xA000..=0xBFFF => self.read_ram(addr),
            _ => 0xFF,
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        match &self.state {
            MbcState::None => self
                .ram_banks
                .first()
                .map_or(0xFF, |b| b[(addr as usize - 0xA000) % RAM_BANK_SIZE]),
            MbcState::Mbc2 { ram_enable, .. } => {
                if !*ram_enable {
                    return 0xFF;
                }
                // 512 nibbles mirrored across the whole window, upper bits open.
                let idx = (addr as usize - 0xA000) & 0x01FF;
                self.ram_banks
                    .first()
                    .map_or(0xFF, |b| 0xF0 | (b[idx] & 0x0F))
            }
            MbcState::Mbc1 { ram_enable, .. }
            | MbcState::Mbc3 { ram_enable, .. }
            | MbcState::Mbc5 { ram_enable, .. } => {
                if !*ram_enable {
                    return 0xFF;
                }
                match self.ram_banks.get(self.ram_bank_index()) {
                    Some(bank) => bank[addr as usize - 0xA000],
                    None => 0xFF,
                }
            }
        }
    }

    fn ram_bank_index(&self) -> usize {
        let count = self.ram_banks.len().max(1);
        match &self.state {
            MbcState::Mbc1 {
                upper_bank, mode, ..
            } => {
                if *mode == 0 {
                    0
                } else {
                    ((*upper_bank as usize) & 0x03) % count
                }
            }
            MbcState::Mbc3 { ram_bank, .. } => ((*ram_bank as usize) & 0x03) % count,
            MbcState::Mbc5 { ram_bank, .. } => ((*ram_bank as usize) & 0x0F) % count,
            _ => 0,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match (&mut self.state, addr) {
            (MbcState::None, 0xA000..=0xBFFF) => {
                if let Some(bank) = self.ram_banks.first_mut() {
                    bank[(addr as usize - 0xA000) % RAM_BANK_SIZE] = val;
                }
            }

            (
                MbcState::Mbc2 {
                    rom_bank,
                    ram_enable,
                },
                0x0000..=0x3FFF,
            ) => {
                // Address bit 8 selects between RAM enable and ROM bank.
                if addr & 0x0100 == 0 {
                    *ram_enable = val & 0x0F == 0x0A;
                } else {
                    *rom_bank = val & 0x0F;
                    if *rom_bank == 0 {
                        *rom_bank = 1;
                    }
                }
            }
            (MbcState::Mbc2 { ram_enable, .. }, 0xA000..=0xBFFF) => {
                if *ram_enable {
                    let idx = (addr as usize - 0xA000) & 0x01FF;
                    if let Some(bank) = self.ram_banks.first_mut() {
                        bank[idx] = val & 0x0F;
                    }
                }
            }

            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x1F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc1 { upper_bank, .. }, 0x4000..=0x5FFF) => {
                *upper_bank = val & 0x03;
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
            }

            (MbcState::Mbc3 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x7F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc3 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x0F;
            }

            (MbcState::Mbc5 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x2000..=0x2FFF) => {
                *rom_bank = (*rom_bank & 0x100) | val as u16;
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x3000..=0x3FFF) => {
                *rom_bank = (*rom_bank & 0xFF) | (((val & 0x01) as u16) << 8);
            }
            (MbcState::Mbc5 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x0F;
            }

            (MbcState::Mbc1 { ram_enable, .. }, 0xA000..=0xBFFF)
            | (MbcState::Mbc3 { ram_enable, .. }, 0xA000..=0xBFFF)
            | (MbcState::Mbc5 { ram_enable, .. }, 0xA000..=0xBFFF) => {
                if *ram_enable {
                    let idx = self.ram_bank_index();
                    if let Some(bank) = self.ram_banks.get_mut(idx) {
                        bank[addr as usize - 0xA000] = val;
                    }
                }
            }

            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
        let mut data = vec![0u8; 0x8000];
        data[0x0147] = cart_type;
        data[0x0148] = rom_code;
        data[0x0149] = ram_code;
        data
    }

    #[test]
    fn header_bank_counts() {
        let h = Header::parse(&rom_with(0x00, 0x00, 0x00)).unwrap();
        assert_eq!(h.rom_banks, 2);
        assert_eq!(h.ram_banks, 0);

        let h = Header::parse(&rom_with(0x03, 0x01, 0x01)).unwrap();
        assert_eq!(h.rom_banks, 4);
        assert_eq!(h.ram_banks, 1);
        assert!(h.has_battery());

        let h = Header::parse(&rom_with(0x1B, 0x05, 0x04)).unwrap();
        assert_eq!(h.rom_banks, 64);
        assert_eq!(h.ram_banks, 16);
    }

    #[test]
    fn header_ram_code_two_is_one_bank() {
        let h = Header::parse(&rom_with(0x02, 0x00, 0x02)).unwrap();
        assert_eq!(h.ram_banks, 1);
    }

    #[test]
    fn short_image_is_rejected() {
        assert!(matches!(
            Header::parse(&[0u8; 0x100]),
            Err(CartridgeError::TooShort(0x100))
        ));
    }

    #[test]
    fn title_stops_at_nul() {
        let mut data = rom_with(0x00, 0x00, 0x00);
        data[0x0134..0x0139].copy_from_slice(b"TETRA");
        let h = Header::parse(&data).unwrap();
        assert_eq!(h.title, "TETRA");
    }

    #[test]
    fn unknown_mapper_is_an_error() {
        assert!(matches!(
            Header::parse(&rom_with(0xFC, 0x00, 0x00)),
            Err(CartridgeError::UnsupportedType(0xFC))
        ));
    }
}
