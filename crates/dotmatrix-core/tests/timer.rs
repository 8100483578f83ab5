use dotmatrix_core::timer::Timer;

#[test]
fn div_counts_every_256_cycles() {
    let mut t = Timer::new();
    let mut if_reg = 0;
    t.step(255, &mut if_reg);
    assert_eq!(t.read(0xFF04), 0);
    t.step(1, &mut if_reg);
    assert_eq!(t.read(0xFF04), 1);
    t.step(512, &mut if_reg);
    assert_eq!(t.read(0xFF04), 3);
}

#[test]
fn tima_ticks_at_selected_rate() {
    let mut t = Timer::new();
    let mut if_reg = 0;
    t.write(0xFF07, 0x05, &mut if_reg); // enabled, 16-cycle period
    t.step(16, &mut if_reg);
    assert_eq!(t.read(0xFF05), 1);
    t.step(160, &mut if_reg);
    assert_eq!(t.read(0xFF05), 11);
}

#[test]
fn tima_does_not_tick_while_disabled() {
    let mut t = Timer::new();
    let mut if_reg = 0;
    t.write(0xFF07, 0x01, &mut if_reg); // rate set but enable clear
    t.step(1024, &mut if_reg);
    assert_eq!(t.read(0xFF05), 0);
}

#[test]
fn div_write_zeroes_counter_and_may_clock_tima() {
    let mut t = Timer::new();
    let mut if_reg = 0;
    t.write(0xFF07, 0x05, &mut if_reg);
    // Stop while the selected bit (bit 3) is high.
    t.step(12, &mut if_reg);
    assert_eq!(t.read(0xFF05), 0);
    t.write(0xFF04, 0x55, &mut if_reg);
    assert_eq!(t.read(0xFF04), 0);
    // The reset produced a falling edge.
    assert_eq!(t.read(0xFF05), 1);
}

#[test]
fn overflow_reloads_tma_and_requests_interrupt() {
    let mut t = Timer::new();
    let mut if_reg = 0;
    t.write(0xFF06, 0xAB, &mut if_reg);
    t.write(0xFF05, 0xFF, &mut if_reg);
    t.write(0xFF07, 0x05, &mut if_reg);
    t.step(16, &mut if_reg);
    assert_eq!(t.read(0xFF05), 0xAB);
    assert_eq!(if_reg & 0x04, 0x04);
}

#[test]
fn disabling_timer_can_clock_tima() {
    let mut t = Timer::new();
    let mut if_reg = 0;
    t.write(0xFF07, 0x05, &mut if_reg);
    t.step(12, &mut if_reg); // selected bit high
    t.write(0xFF07, 0x00, &mut if_reg);
    assert_eq!(t.read(0xFF05), 1);
}

#[test]
fn tac_upper_bits_read_set() {
    let mut t = Timer::new();
    let mut if_reg = 0;
    t.write(0xFF07, 0x05, &mut if_reg);
    assert_eq!(t.read(0xFF07), 0xF8 | 0x05);
}
