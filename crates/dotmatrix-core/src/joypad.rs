//! Joypad register (0xFF00). The frontend reports button state as a bitmask;
//! reads merge the selected matrix line, low means pressed.

pub const KEY_RIGHT: u8 = 0x01;
pub const KEY_LEFT: u8 = 0x02;
pub const KEY_UP: u8 = 0x04;
pub const KEY_DOWN: u8 = 0x08;
pub const KEY_A: u8 = 0x10;
pub const KEY_B: u8 = 0x20;
pub const KEY_SELECT: u8 = 0x40;
pub const KEY_START: u8 = 0x80;

pub struct Joypad {
    /// Select bits as last written (bit 4 directions, bit 5 buttons).
    select: u8,
    /// Currently held keys, 1 means pressed.
    state: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            state: 0,
        }
    }

    pub fn read(&self) -> u8 {
        let mut lines = 0x0F;
        if self.select & 0x10 == 0 {
            lines &= !(self.state & 0x0F);
        }
        if self.select & 0x20 == 0 {
            lines &= !(self.state >> 4);
        }
        0xC0 | self.select | lines
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    /// Replace the held-key mask. A newly pressed key on a selected line
    /// raises the joypad interrupt.
    pub fn update_state(&mut self, state: u8, if_reg: &mut u8) {
        let before = self.read() & 0x0F;
        self.state = state;
        let after = self.read() & 0x0F;
        if before & !after != 0 {
            *if_reg |= 0x10;
        }
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_line_reads_pressed_keys_low() {
        let mut j = Joypad::new();
        let mut if_reg = 0;
        j.write(0x20); // directions selected
        j.update_state(KEY_LEFT | KEY_A, &mut if_reg);
        assert_eq!(j.read() & 0x0F, 0x0F & !KEY_LEFT);
        j.write(0x10); // buttons selected
        assert_eq!(j.read() & 0x0F, 0x0F & !(KEY_A >> 4));
    }

    #[test]
    fn press_on_selected_line_raises_interrupt() {
        let mut j = Joypad::new();
        let mut if_reg = 0;
        j.write(0x20);
        j.update_state(KEY_DOWN, &mut if_reg);
        assert_eq!(if_reg, 0x10);
        if_reg = 0;
        // releasing does not
        j.update_state(0, &mut if_reg);
        assert_eq!(if_reg, 0);
    }

    #[test]
    fn nothing_selected_reads_high() {
        let mut j = Joypad::new();
        let mut if_reg = 0;
        j.write(0x30);
        j.update_state(0xFF, &mut if_reg);
        assert_eq!(j.read() & 0x0F, 0x0F);
    }
}
