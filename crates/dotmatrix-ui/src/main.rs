mod audio;

use clap::Parser;
use dotmatrix_core::{
    Cartridge, GameBoy, Model, KEY_A, KEY_B, KEY_DOWN, KEY_LEFT, KEY_RIGHT, KEY_SELECT,
    KEY_START, KEY_UP, SCREEN_HEIGHT, SCREEN_WIDTH,
};
use pixels::{Pixels, SurfaceTexture};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::Window;

const SCALE: u32 = 2;
const GB_FPS: f64 = 59.7275;
const FRAME_TIME: Duration = Duration::from_nanos((1e9_f64 / GB_FPS) as u64);

#[derive(Parser)]
struct Args {
    /// Path to ROM file
    rom: std::path::PathBuf,

    /// Force DMG mode
    #[arg(long, conflicts_with = "cgb")]
    dmg: bool,

    /// Force CGB mode
    #[arg(long, conflicts_with = "dmg")]
    cgb: bool,

    /// Print serial output to stdout
    #[arg(long)]
    serial: bool,

    /// Print the cartridge header and exit
    #[arg(long)]
    info: bool,

    /// Run without opening a window
    #[arg(long)]
    headless: bool,

    /// Number of frames to run in headless mode
    #[arg(long)]
    frames: Option<u64>,
}

/// Expand packed 5-bit channels into the RGBA surface.
fn draw_game_screen(pixels: &mut Pixels<'_>, frame: &[u16]) {
    for (dst, &src) in pixels.frame_mut().chunks_exact_mut(4).zip(frame.iter()) {
        let r = (src & 0x1F) as u8;
        let g = ((src >> 5) & 0x1F) as u8;
        let b = ((src >> 10) & 0x1F) as u8;
        dst[0] = (r << 3) | (r >> 2);
        dst[1] = (g << 3) | (g >> 2);
        dst[2] = (b << 3) | (b >> 2);
        dst[3] = 0xFF;
    }
}

fn key_mask(code: KeyCode) -> Option<u8> {
    match code {
        KeyCode::ArrowRight => Some(KEY_RIGHT),
        KeyCode::ArrowLeft => Some(KEY_LEFT),
        KeyCode::ArrowUp => Some(KEY_UP),
        KeyCode::ArrowDown => Some(KEY_DOWN),
        KeyCode::KeyS => Some(KEY_A),
        KeyCode::KeyA => Some(KEY_B),
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Some(KEY_SELECT),
        KeyCode::Enter => Some(KEY_START),
        _ => None,
    }
}

fn print_info(cart: &Cartridge) {
    let h = &cart.header;
    println!("title:    {}", h.title);
    println!("mapper:   {}", h.mbc);
    println!("rom:      {} banks ({} KiB)", h.rom_banks, h.rom_banks * 16);
    println!("ram:      {} banks ({} KiB)", h.ram_banks, h.ram_banks * 8);
    println!("cgb:      {}", if h.cgb { "yes" } else { "no" });
    println!("battery:  {}", if h.has_battery() { "yes" } else { "no" });
    println!("version:  {}", h.version);
}

fn run_headless(mut gb: GameBoy, frames: Option<u64>) {
    let mut frame_count = 0u64;
    loop {
        gb.step_frame();
        frame_count += 1;
        // No device to feed; keep the queue from growing.
        if gb.audio_ready() {
            let _ = gb.take_audio();
        }
        if let Some(max) = frames {
            if frame_count >= max {
                break;
            }
        }
    }
    gb.save_cart_ram();
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let cart = match Cartridge::from_file(&args.rom) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load ROM: {e}");
            std::process::exit(1);
        }
    };

    if args.info {
        print_info(&cart);
        return;
    }

    let model = if args.dmg {
        Model::Dmg
    } else if args.cgb {
        Model::Cgb
    } else {
        Model::Auto
    };
    let mut gb = GameBoy::new(cart, model);

    if args.serial {
        gb.set_serial_hook(Box::new(|b| {
            print!("{}", b as char);
            let _ = std::io::stdout().flush();
        }));
    }

    if args.headless {
        run_headless(gb, args.frames);
        return;
    }

    let audio_queue: audio::SampleQueue = Arc::new(Mutex::new(VecDeque::new()));
    let audio_out = audio::start_stream(Arc::clone(&audio_queue));
    let sample_rate = match &audio_out {
        Some((_, rate)) => {
            gb.mmu.apu.set_sample_rate(*rate);
            *rate
        }
        None => {
            log::warn!("audio output unavailable, running silent");
            dotmatrix_core::SAMPLE_RATE
        }
    };

    let event_loop = EventLoop::builder().build().unwrap();
    let attrs = Window::default_attributes()
        .with_title("dotmatrix")
        .with_inner_size(LogicalSize::new(
            (SCREEN_WIDTH as u32 * SCALE) as f64,
            (SCREEN_HEIGHT as u32 * SCALE) as f64,
        ));
    #[allow(deprecated)]
    let window = Arc::new(event_loop.create_window(attrs).unwrap());

    let size = window.inner_size();
    let surface = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
    let mut pixels = Pixels::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, surface)
        .expect("pixels error");

    let mut buttons = 0u8;
    let mut fast = false;
    let mut next_frame = Instant::now() + FRAME_TIME;

    #[allow(deprecated)]
    let _ = event_loop.run(move |event, target| {
        target.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    gb.save_cart_ram();
                    target.exit();
                }
                WindowEvent::Resized(size) => {
                    if pixels.resize_surface(size.width, size.height).is_err() {
                        target.exit();
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        let pressed = event.state == ElementState::Pressed;
                        match code {
                            KeyCode::Space => fast = pressed,
                            KeyCode::Escape => {
                                if pressed {
                                    gb.save_cart_ram();
                                    target.exit();
                                }
                            }
                            _ => {
                                if let Some(mask) = key_mask(code) {
                                    if pressed {
                                        buttons |= mask;
                                    } else {
                                        buttons &= !mask;
                                    }
                                    gb.set_buttons(buttons);
                                }
                            }
                        }
                    }
                }
                WindowEvent::RedrawRequested => {
                    draw_game_screen(&mut pixels, gb.framebuffer());
                    if pixels.render().is_err() {
                        target.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                gb.step_frame();

                if gb.audio_ready() {
                    let samples = gb.take_audio();
                    if let Ok(mut q) = audio_queue.lock() {
                        q.extend(samples);
                        // Roughly one second of backlog at most.
                        let cap = sample_rate as usize * 2;
                        while q.len() > cap {
                            q.pop_front();
                        }
                    }
                }

                if fast {
                    next_frame = Instant::now();
                } else {
                    target.set_control_flow(ControlFlow::WaitUntil(next_frame));
                    while Instant::now() < next_frame {
                        std::hint::spin_loop();
                    }
                    next_frame += FRAME_TIME;
                }

                window.request_redraw();
            }
            Event::LoopExiting => {
                gb.save_cart_ram();
            }
            _ => {}
        }
    });
}
