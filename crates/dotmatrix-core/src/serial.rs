//! Serial port. No link partner is modeled: a transfer started with the
//! internal clock shifts out SB, shifts in 0xFF and completes after 512
//! t-cycles with a serial interrupt. Outgoing bytes go to the optional hook
//! and to a drainable log.

pub type SerialHook = Box<dyn FnMut(u8) + Send>;

pub struct Serial {
    pub sb: u8,
    pub sc: u8,
    /// Remaining t-cycles of an in-flight transfer, 0 when idle.
    countdown: u32,
    hook: Option<SerialHook>,
    out_buf: Vec<u8>,
}

const TRANSFER_CYCLES: u32 = 512;

impl Serial {
    pub fn new() -> Self {
        Self {
            sb: 0x00,
            sc: 0x00,
            countdown: 0,
            hook: None,
            out_buf: Vec::new(),
        }
    }

    pub fn set_hook(&mut self, hook: SerialHook) {
        self.hook = Some(hook);
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 => self.sc | 0x7E,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = val & 0x81;
                // Start bit with internal clock kicks off a transfer.
                if val & 0x80 != 0 && val & 0x01 != 0 {
                    self.countdown = TRANSFER_CYCLES;
                }
            }
            _ => {}
        }
    }

    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        if self.countdown == 0 {
            return;
        }
        if self.countdown > cycles {
            self.countdown -= cycles;
            return;
        }
        self.countdown = 0;
        let sent = self.sb;
        if let Some(hook) = &mut self.hook {
            hook(sent);
        }
        self.out_buf.push(sent);
        self.sb = 0xFF;
        self.sc &= !0x80;
        *if_reg |= 0x08;
    }

    /// Drain the bytes sent since the last call.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}
