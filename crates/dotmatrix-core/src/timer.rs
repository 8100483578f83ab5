pub struct Timer {
    /// 16-bit internal divider counter. The DIV register is its upper byte.
    pub div: u16,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    last_signal: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.div >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF04 => self.reset_div(if_reg),
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => {
                // Disabling the timer or changing the rate can itself drop
                // the selected bit and clock TIMA.
                let prev = Self::signal_with(self.div, self.tac);
                self.tac = val & 0x07;
                let new = Self::signal_with(self.div, self.tac);
                if prev && !new {
                    self.increment(if_reg);
                }
                self.last_signal = new;
            }
            _ => {}
        }
    }

    /// Advance the divider by `cycles` t-cycles. TIMA increments on each
    /// falling edge of the selected divider bit ANDed with the enable bit.
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        for _ in 0..cycles {
            self.div = self.div.wrapping_add(1);
            let new = Self::signal_with(self.div, self.tac);
            if self.last_signal && !new {
                self.increment(if_reg);
            }
            self.last_signal = new;
        }
    }

    /// Writing DIV zeroes the whole internal counter, which can produce a
    /// falling edge of its own.
    pub fn reset_div(&mut self, if_reg: &mut u8) {
        let prev = Self::signal_with(self.div, self.tac);
        self.div = 0;
        if prev {
            self.increment(if_reg);
        }
        self.last_signal = false;
    }

    fn increment(&mut self, if_reg: &mut u8) {
        if self.tima == 0xFF {
            self.tima = self.tma;
            *if_reg |= 0x04;
        } else {
            self.tima += 1;
        }
    }

    fn signal_with(div: u16, tac: u8) -> bool {
        if tac & 0x04 == 0 {
            return false;
        }
        let bit = match tac & 0x03 {
            0x00 => 9,
            0x01 => 3,
            0x02 => 5,
            _ => 7,
        };
        div & (1 << bit) != 0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
