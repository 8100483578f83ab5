use std::collections::VecDeque;

use crate::CPU_CLOCK_HZ;
// 512 Hz frame sequencer tick
const FRAME_SEQUENCER_PERIOD: u32 = 8192;
const VOLUME_FACTOR: i16 = 64;

pub const SAMPLE_RATE: u32 = 44_100;
/// Stereo frames handed out per `take_samples` quantum.
pub const BUFFER_FRAMES: usize = 1024;
// Keep at most ~190 ms of stereo samples queued when nobody drains.
const MAX_SAMPLES: usize = BUFFER_FRAMES * 16;

// Duty table for the pulse channels. The NRx1 duty selector picks a row:
// 0 -> 12.5%, 1 -> 25%, 2 -> 50%, 3 -> 75%.
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 1, 1, 1],
    [0, 1, 1, 1, 1, 1, 1, 0],
];

#[derive(Default, Clone, Copy)]
struct Envelope {
    initial: u8,
    period: u8,
    add: bool,
    volume: u8,
    timer: u8,
}

impl Envelope {
    fn clock(&mut self) {
        let period = if self.period == 0 { 8 } else { self.period };
        if self.timer == 0 {
            self.timer = period;
            if self.add && self.volume < 15 {
                self.volume += 1;
            } else if !self.add && self.volume > 0 {
                self.volume -= 1;
            }
        } else {
            self.timer -= 1;
        }
    }

    fn reset(&mut self, val: u8) {
        self.initial = val >> 4;
        self.volume = self.initial;
        self.period = val & 0x07;
        self.add = val & 0x08 != 0;
        self.timer = if self.period == 0 { 8 } else { self.period };
    }
}

#[derive(Default)]
struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow: u16,
    enabled: bool,
}

impl Sweep {
    fn calculate(&self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow.wrapping_add(delta)
        }
    }

    fn set_params(&mut self, val: u8) {
        self.period = (val >> 4) & 0x07;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;
    }

    fn reload(&mut self, freq: u16) {
        self.shadow = freq;
        self.timer = if self.period == 0 { 8 } else { self.period };
        self.enabled = self.period != 0 || self.shift != 0;
    }
}

#[derive(Default)]
struct SquareChannel {
    enabled: bool,
    dac_enabled: bool,
    length: u8,
    length_enable: bool,
    duty: u8,
    duty_pos: u8,
    frequency: u16,
    timer: i32,
    envelope: Envelope,
    sweep: Option<Sweep>,
}

impl SquareChannel {
    fn new(with_sweep: bool) -> Self {
        Self {
            sweep: with_sweep.then(Sweep::default),
            ..Default::default()
        }
    }

    fn period(&self) -> i32 {
        ((2048 - self.frequency) * 4) as i32
    }

    fn step(&mut self, cycles: u32) {
        if !self.enabled || !self.dac_enabled {
            return;
        }
        let mut cycles = cycles as i32;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            self.duty_pos = (self.duty_pos + 1) & 7;
        }
        self.timer -= cycles;
    }

    fn output(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        DUTY_TABLE[self.duty as usize][self.duty_pos as usize] * self.envelope.volume
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }

    /// Sweep iteration: recompute, write back, and run the overflow check
    /// a second time with the new shadow value.
    fn clock_sweep(&mut self) {
        let Some(sweep) = self.sweep.as_mut() else {
            return;
        };
        if !sweep.enabled {
            return;
        }
        if sweep.timer > 0 {
            sweep.timer -= 1;
        }
        if sweep.timer == 0 {
            sweep.timer = if sweep.period == 0 { 8 } else { sweep.period };
            if sweep.period != 0 {
                let new_freq = sweep.calculate();
                if new_freq > 2047 {
                    self.enabled = false;
                    sweep.enabled = false;
                } else if sweep.shift != 0 {
                    sweep.shadow = new_freq;
                    self.frequency = new_freq;
                    if sweep.calculate() > 2047 {
                        self.enabled = false;
                        sweep.enabled = false;
                    }
                }
            }
        }
    }
}

#[derive(Default)]
struct WaveChannel {
    enabled: bool,
    dac_enabled: bool,
    length: u16,
    length_enable: bool,
    volume: u8,
    position: u8,
    last_sample: u8,
    frequency: u16,
    timer: i32,
}

impl WaveChannel {
    fn period(&self) -> i32 {
        ((2048 - self.frequency) * 2) as i32
    }

    fn step(&mut self, cycles: u32, wave_ram: &[u8; 0x10]) {
        if !self.enabled || !self.dac_enabled {
            return;
        }
        let mut cycles = cycles as i32;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            self.position = (self.position + 1) & 0x1F;
            let byte = wave_ram[(self.position / 2) as usize];
            self.last_sample = if self.position & 1 == 0 {
                byte >> 4
            } else {
                byte & 0x0F
            };
        }
        self.timer -= cycles;
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        match self.volume {
            0 => 0,
            1 => self.last_sample,
            2 => self.last_sample >> 1,
            _ => self.last_sample >> 2,
        }
    }
}

#[derive(Default)]
struct NoiseChannel {
    enabled: bool,
    dac_enabled: bool,
    length: u8,
    length_enable: bool,
    envelope: Envelope,
    clock_shift: u8,
    divisor: u8,
    width7: bool,
    lfsr: u16,
    timer: i32,
}

impl NoiseChannel {
    fn period(&self) -> i32 {
        let r = match self.divisor {
            0 => 8,
            _ => (self.divisor as i32) * 16,
        };
        r << self.clock_shift
    }

    fn step(&mut self, cycles: u32) {
        if !self.enabled || !self.dac_enabled {
            return;
        }
        // Shifts of 14 and 15 stop the LFSR clock entirely.
        if self.clock_shift >= 14 {
            return;
        }
        let mut cycles = cycles as i32;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            let bit0 = self.lfsr & 1;
            let bit1 = (self.lfsr >> 1) & 1;
            // Feedback is the XNOR of bits 0 and 1.
            let bit = (!(bit0 ^ bit1)) & 1;
            self.lfsr >>= 1;
            self.lfsr |= bit << 14;
            if self.width7 {
                self.lfsr = (self.lfsr & !0x40) | (bit << 6);
            }
        }
        self.timer -= cycles;
    }

    fn output(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        if self.lfsr & 1 == 0 {
            self.envelope.volume
        } else {
            0
        }
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }
}

struct FrameSequencer {
    step: u8,
}

impl FrameSequencer {
    fn new() -> Self {
        Self { step: 0 }
    }

    fn advance(&mut self) -> u8 {
        let s = self.step;
        self.step = (self.step + 1) & 7;
        s
    }
}

pub struct Apu {
    ch1: SquareChannel,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    wave_ram: [u8; 0x10],
    nr50: u8,
    nr51: u8,
    power: bool,
    sequencer: FrameSequencer,
    sequencer_timer: u32,
    sample_timer: u32,
    sample_rate: u32,
    samples: VecDeque<i16>,
    regs: [u8; 0x30],
}

impl Apu {
    pub fn new() -> Self {
        let mut apu = Self {
            ch1: SquareChannel::new(true),
            ch2: SquareChannel::new(false),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::default(),
            wave_ram: [0; 0x10],
            nr50: 0x77,
            nr51: 0xF3,
            power: true,
            sequencer: FrameSequencer::new(),
            sequencer_timer: 0,
            sample_timer: 0,
            sample_rate: SAMPLE_RATE,
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            regs: [0; 0x30],
        };
        apu.regs[0x14] = 0x77;
        apu.regs[0x15] = 0xF3;

        // Power-on defaults leave channel 1 configured as the boot chime.
        apu.ch1.duty = 2;
        apu.ch1.length = 0x3F;
        apu.ch1.envelope.initial = 0xF;
        apu.ch1.envelope.volume = 0xF;
        apu.ch1.envelope.period = 3;
        apu.ch1.frequency = 0x03FF;
        apu.ch1.dac_enabled = true;
        apu.ch3.dac_enabled = true;
        apu
    }

    /// Register read-back masks: unreadable bits come back set.
    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 | 0xFF16 => 0x3F,
            0xFF12 | 0xFF17 | 0xFF21 | 0xFF22 | 0xFF24 | 0xFF25 => 0x00,
            0xFF13 | 0xFF18 | 0xFF1B | 0xFF1D | 0xFF20 => 0xFF,
            0xFF14 | 0xFF19 | 0xFF1E | 0xFF23 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1C => 0x9F,
            0xFF26 => 0x70,
            0xFF15 | 0xFF1F => 0xFF,
            0xFF30..=0xFF3F => 0x00,
            _ => 0xFF,
        }
    }

    fn power_off(&mut self) {
        self.ch1 = SquareChannel::new(true);
        self.ch2 = SquareChannel::new(false);
        self.ch3 = WaveChannel::default();
        self.ch4 = NoiseChannel::default();
        self.regs.fill(0);
        self.nr50 = 0;
        self.nr51 = 0;
        self.sequencer = FrameSequencer::new();
        self.sequencer_timer = 0;
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        if addr == 0xFF26 {
            let mut val = if self.power { 0x80 } else { 0x00 };
            if self.ch1.enabled {
                val |= 0x01;
            }
            if self.ch2.enabled {
                val |= 0x02;
            }
            if self.ch3.enabled {
                val |= 0x04;
            }
            if self.ch4.enabled {
                val |= 0x08;
            }
            return val | Self::read_mask(addr);
        }
        if (0xFF30..=0xFF3F).contains(&addr) {
            // Wave RAM is inaccessible while the channel plays.
            if self.ch3.enabled && self.ch3.dac_enabled {
                return 0xFF;
            }
            return self.wave_ram[(addr - 0xFF30) as usize];
        }
        let idx = (addr - 0xFF10) as usize;
        self.regs[idx] | Self::read_mask(addr)
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        // Power off drops everything except NR52 itself and wave RAM.
        if !self.power && addr != 0xFF26 && !(0xFF30..=0xFF3F).contains(&addr) {
            return;
        }

        if addr != 0xFF26 && (0xFF10..=0xFF3F).contains(&addr) {
            self.regs[(addr - 0xFF10) as usize] = val;
        }

        match addr {
            0xFF10 => {
                if let Some(s) = self.ch1.sweep.as_mut() {
                    s.set_params(val);
                }
            }
            0xFF11 => {
                self.ch1.duty = val >> 6;
                self.ch1.length = 64 - (val & 0x3F);
            }
            0xFF12 => {
                self.ch1.envelope.reset(val);
                self.ch1.dac_enabled = val & 0xF8 != 0;
                if !self.ch1.dac_enabled {
                    self.ch1.enabled = false;
                }
            }
            0xFF13 => self.ch1.frequency = (self.ch1.frequency & 0x700) | val as u16,
            0xFF14 => {
                self.ch1.length_enable = val & 0x40 != 0;
                self.ch1.frequency = (self.ch1.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                if val & 0x80 != 0 {
                    self.trigger_square(1);
                }
            }
            0xFF16 => {
                self.ch2.duty = val >> 6;
                self.ch2.length = 64 - (val & 0x3F);
            }
            0xFF17 => {
                self.ch2.envelope.reset(val);
                self.ch2.dac_enabled = val & 0xF8 != 0;
                if !self.ch2.dac_enabled {
                    self.ch2.enabled = false;
                }
            }
            0xFF18 => self.ch2.frequency = (self.ch2.frequency & 0x700) | val as u16,
            0xFF19 => {
                self.ch2.length_enable = val & 0x40 != 0;
                self.ch2.frequency = (self.ch2.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                if val & 0x80 != 0 {
                    self.trigger_square(2);
                }
            }
            0xFF1A => {
                self.ch3.dac_enabled = val & 0x80 != 0;
                if !self.ch3.dac_enabled {
                    self.ch3.enabled = false;
                }
            }
            0xFF1B => self.ch3.length = 256 - val as u16,
            0xFF1C => self.ch3.volume = (val >> 5) & 0x03,
            0xFF1D => self.ch3.frequency = (self.ch3.frequency & 0x700) | val as u16,
            0xFF1E => {
                self.ch3.length_enable = val & 0x40 != 0;
                self.ch3.frequency = (self.ch3.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                if val & 0x80 != 0 {
                    self.trigger_wave();
                }
            }
            0xFF20 => self.ch4.length = 64 - (val & 0x3F),
            0xFF21 => {
                self.ch4.envelope.reset(val);
                self.ch4.dac_enabled = val & 0xF8 != 0;
                if !self.ch4.dac_enabled {
                    self.ch4.enabled = false;
                }
            }
            0xFF22 => {
                self.ch4.clock_shift = val >> 4;
                self.ch4.width7 = val & 0x08 != 0;
                self.ch4.divisor = val & 0x07;
            }
            0xFF23 => {
                self.ch4.length_enable = val & 0x40 != 0;
                if val & 0x80 != 0 {
                    self.trigger_noise();
                }
            }
            0xFF24 => self.nr50 = val,
            0xFF25 => self.nr51 = val,
            0xFF26 => {
                if val & 0x80 == 0 {
                    self.power = false;
                    self.power_off();
                } else {
                    self.power = true;
                }
            }
            0xFF30..=0xFF3F => {
                if !(self.ch3.enabled && self.ch3.dac_enabled) {
                    self.wave_ram[(addr - 0xFF30) as usize] = val;
                }
            }
            _ => {}
        }
    }

    fn trigger_square(&mut self, idx: u8) {
        let ch = if idx == 1 { &mut self.ch1 } else { &mut self.ch2 };
        ch.enabled = ch.dac_enabled;
        if ch.length == 0 {
            ch.length = 64;
        }
        ch.timer = ch.period();
        ch.envelope.volume = ch.envelope.initial;
        ch.envelope.timer = if ch.envelope.period == 0 {
            8
        } else {
            ch.envelope.period
        };
        if let Some(s) = ch.sweep.as_mut() {
            s.reload(ch.frequency);
            // Immediate overflow check on trigger when a shift is set.
            if s.shift != 0 && s.calculate() > 2047 {
                ch.enabled = false;
                s.enabled = false;
            }
        }
    }

    fn trigger_wave(&mut self) {
        self.ch3.enabled = self.ch3.dac_enabled;
        self.ch3.position = 0;
        self.ch3.timer = self.ch3.period();
        if self.ch3.length == 0 {
            self.ch3.length = 256;
        }
    }

    fn trigger_noise(&mut self) {
        self.ch4.enabled = self.ch4.dac_enabled;
        self.ch4.lfsr = 0;
        self.ch4.timer = self.ch4.period();
        self.ch4.envelope.volume = self.ch4.envelope.initial;
        self.ch4.envelope.timer = if self.ch4.envelope.period == 0 {
            8
        } else {
            self.ch4.envelope.period
        };
        if self.ch4.length == 0 {
            self.ch4.length = 64;
        }
    }

    /// Length on even steps, sweep on 2 and 6, envelope on 7.
    fn clock_frame_sequencer(&mut self, step: u8) {
        if matches!(step, 0 | 2 | 4 | 6) {
            self.ch1.clock_length();
            self.ch2.clock_length();
            self.ch3.clock_length();
            self.ch4.clock_length();
        }
        if step == 2 || step == 6 {
            self.ch1.clock_sweep();
        }
        if step == 7 {
            self.ch1.envelope.clock();
            self.ch2.envelope.clock();
            self.ch4.envelope.clock();
        }
    }

    /// Advance the APU by `cycles` t-cycles, generating samples along the way.
    pub fn step(&mut self, cycles: u32) {
        let cps = CPU_CLOCK_HZ / self.sample_rate;
        for _ in 0..cycles {
            if self.power {
                self.sequencer_timer += 1;
                if self.sequencer_timer >= FRAME_SEQUENCER_PERIOD {
                    self.sequencer_timer -= FRAME_SEQUENCER_PERIOD;
                    let step = self.sequencer.advance();
                    self.clock_frame_sequencer(step);
                }
                self.ch1.step(1);
                self.ch2.step(1);
                self.ch3.step(1, &self.wave_ram);
                self.ch4.step(1);
            }
            self.sample_timer += 1;
            if self.sample_timer >= cps {
                self.sample_timer -= cps;
                let (left, right) = self.mix_output();
                self.push_sample(left);
                self.push_sample(right);
            }
        }
    }

    fn push_sample(&mut self, s: i16) {
        if self.samples.len() >= MAX_SAMPLES {
            let excess = self.samples.len() + 1 - MAX_SAMPLES;
            self.samples.drain(..excess);
        }
        self.samples.push_back(s);
    }

    fn mix_output(&self) -> (i16, i16) {
        if !self.power {
            return (0, 0);
        }
        let outs = [
            8 - self.ch1.output() as i16,
            8 - self.ch2.output() as i16,
            8 - self.ch3.output() as i16,
            8 - self.ch4.output() as i16,
        ];

        let mut left = 0i16;
        let mut right = 0i16;
        for (i, &out) in outs.iter().enumerate() {
            if self.nr51 & (0x10 << i) != 0 {
                left += out;
            }
            if self.nr51 & (0x01 << i) != 0 {
                right += out;
            }
        }

        let left_vol = ((self.nr50 >> 4) & 0x07) as i16 + 1;
        let right_vol = (self.nr50 & 0x07) as i16 + 1;
        (left * left_vol * VOLUME_FACTOR, right * right_vol * VOLUME_FACTOR)
    }

    /// Match the output device's rate. Takes effect on the next sample.
    pub fn set_sample_rate(&mut self, rate: u32) {
        if rate > 0 {
            self.sample_rate = rate;
        }
    }

    /// True once a device quantum of stereo samples is queued.
    pub fn samples_ready(&self) -> bool {
        self.samples.len() >= BUFFER_FRAMES * 2
    }

    /// Drain all queued interleaved stereo samples.
    pub fn take_samples(&mut self) -> Vec<i16> {
        self.samples.drain(..).collect()
    }

    pub fn queued_samples(&self) -> usize {
        self.samples.len()
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
