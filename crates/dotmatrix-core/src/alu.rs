//! Arithmetic and logic primitives.
//!
//! Every helper takes the flag byte by `&mut` and returns the result value,
//! so the instruction handlers stay free of flag bookkeeping. Half-carry is
//! computed from bit 3 for byte ops and bit 11 for the 16-bit add.

use crate::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

fn set(f: &mut u8, mask: u8, on: bool) {
    if on {
        *f |= mask;
    } else {
        *f &= !mask;
    }
}

pub fn add(f: &mut u8, a: u8, b: u8) -> u8 {
    let (res, carry) = a.overflowing_add(b);
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_N, false);
    set(f, FLAG_H, (a & 0x0F) + (b & 0x0F) > 0x0F);
    set(f, FLAG_C, carry);
    res
}

pub fn adc(f: &mut u8, a: u8, b: u8) -> u8 {
    let c = (*f & FLAG_C != 0) as u8;
    let res = a.wrapping_add(b).wrapping_add(c);
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_N, false);
    set(f, FLAG_H, (a & 0x0F) + (b & 0x0F) + c > 0x0F);
    set(f, FLAG_C, (a as u16) + (b as u16) + (c as u16) > 0xFF);
    res
}

pub fn sub(f: &mut u8, a: u8, b: u8) -> u8 {
    let res = a.wrapping_sub(b);
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_N, true);
    set(f, FLAG_H, (a & 0x0F) < (b & 0x0F));
    set(f, FLAG_C, a < b);
    res
}

pub fn sbc(f: &mut u8, a: u8, b: u8) -> u8 {
    let c = (*f & FLAG_C != 0) as u8;
    let res = a.wrapping_sub(b).wrapping_sub(c);
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_N, true);
    set(f, FLAG_H, (a & 0x0F) < (b & 0x0F) + c);
    set(f, FLAG_C, (a as u16) < (b as u16) + (c as u16));
    res
}

pub fn and(f: &mut u8, a: u8, b: u8) -> u8 {
    let res = a & b;
    *f = if res == 0 { FLAG_Z | FLAG_H } else { FLAG_H };
    res
}

pub fn or(f: &mut u8, a: u8, b: u8) -> u8 {
    let res = a | b;
    *f = if res == 0 { FLAG_Z } else { 0 };
    res
}

pub fn xor(f: &mut u8, a: u8, b: u8) -> u8 {
    let res = a ^ b;
    *f = if res == 0 { FLAG_Z } else { 0 };
    res
}

/// Compare discards the result; only the flags of `a - b` survive.
pub fn cp(f: &mut u8, a: u8, b: u8) {
    let _ = sub(f, a, b);
}

/// Increment leaves Carry untouched.
pub fn inc(f: &mut u8, v: u8) -> u8 {
    let res = v.wrapping_add(1);
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_N, false);
    set(f, FLAG_H, (v & 0x0F) + 1 > 0x0F);
    res
}

/// Decrement leaves Carry untouched.
pub fn dec(f: &mut u8, v: u8) -> u8 {
    let res = v.wrapping_sub(1);
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_N, true);
    set(f, FLAG_H, v & 0x0F == 0);
    res
}

/// 16-bit `ADD HL,rr`. Zero is left untouched.
pub fn add16(f: &mut u8, a: u16, b: u16) -> u16 {
    let (res, carry) = a.overflowing_add(b);
    set(f, FLAG_N, false);
    set(f, FLAG_H, (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF);
    set(f, FLAG_C, carry);
    res
}

/// `ADD SP,e8` and `LD HL,SP+e8`: the offset is signed but the H/C flags
/// come from unsigned low-byte arithmetic. Z and N are always cleared.
pub fn add_sp(f: &mut u8, sp: u16, offset: i8) -> u16 {
    let b = offset as u8;
    set(f, FLAG_Z, false);
    set(f, FLAG_N, false);
    set(f, FLAG_H, (sp & 0x0F) as u8 + (b & 0x0F) > 0x0F);
    set(f, FLAG_C, (sp & 0xFF) + (b as u16) > 0xFF);
    sp.wrapping_add(offset as i16 as u16)
}

pub fn rlc(f: &mut u8, v: u8) -> u8 {
    let res = v.rotate_left(1);
    *f = 0;
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_C, v & 0x80 != 0);
    res
}

pub fn rrc(f: &mut u8, v: u8) -> u8 {
    let res = v.rotate_right(1);
    *f = 0;
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_C, v & 0x01 != 0);
    res
}

pub fn rl(f: &mut u8, v: u8) -> u8 {
    let carry_in = (*f & FLAG_C != 0) as u8;
    let res = (v << 1) | carry_in;
    *f = 0;
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_C, v & 0x80 != 0);
    res
}

pub fn rr(f: &mut u8, v: u8) -> u8 {
    let carry_in = (*f & FLAG_C != 0) as u8;
    let res = (v >> 1) | (carry_in << 7);
    *f = 0;
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_C, v & 0x01 != 0);
    res
}

pub fn sla(f: &mut u8, v: u8) -> u8 {
    let res = v << 1;
    *f = 0;
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_C, v & 0x80 != 0);
    res
}

/// Arithmetic shift right keeps bit 7.
pub fn sra(f: &mut u8, v: u8) -> u8 {
    let res = (v >> 1) | (v & 0x80);
    *f = 0;
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_C, v & 0x01 != 0);
    res
}

pub fn srl(f: &mut u8, v: u8) -> u8 {
    let res = v >> 1;
    *f = 0;
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_C, v & 0x01 != 0);
    res
}

pub fn swap(f: &mut u8, v: u8) -> u8 {
    let res = v.rotate_left(4);
    *f = if res == 0 { FLAG_Z } else { 0 };
    res
}

/// `BIT n,r`: Z from the tested bit, H set, N cleared, C untouched.
pub fn bit(f: &mut u8, v: u8, n: u8) {
    set(f, FLAG_Z, v & (1 << n) == 0);
    set(f, FLAG_N, false);
    set(f, FLAG_H, true);
}

/// Decimal adjust after a BCD add or subtract. In add mode each out-of-range
/// nibble (or a carry flag) gets the 0x06/0x60 correction added and may set
/// Carry; in subtract mode the recorded H/C flags drive the same corrections
/// in reverse.
pub fn daa(f: &mut u8, a: u8) -> u8 {
    let mut correction = 0u8;
    let mut carry = *f & FLAG_C != 0;
    if *f & FLAG_N == 0 {
        if *f & FLAG_H != 0 || a & 0x0F > 0x09 {
            correction |= 0x06;
        }
        if carry || a > 0x99 {
            correction |= 0x60;
            carry = true;
        }
    } else {
        if *f & FLAG_H != 0 {
            correction |= 0x06;
        }
        if carry {
            correction |= 0x60;
        }
    }
    let res = if *f & FLAG_N == 0 {
        a.wrapping_add(correction)
    } else {
        a.wrapping_sub(correction)
    };
    set(f, FLAG_Z, res == 0);
    set(f, FLAG_H, false);
    set(f, FLAG_C, carry);
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_flags_match_reference() {
        for a in 0..=255u16 {
            for b in 0..=255u16 {
                let mut f = 0;
                let res = add(&mut f, a as u8, b as u8);
                assert_eq!(res, (a + b) as u8);
                assert_eq!(f & FLAG_H != 0, (a & 0x0F) + (b & 0x0F) > 0x0F);
                assert_eq!(f & FLAG_C != 0, a + b > 0xFF);
                assert_eq!(f & FLAG_Z != 0, (a + b) as u8 == 0);
                assert_eq!(f & FLAG_N, 0);
            }
        }
    }

    #[test]
    fn sub_flags_match_reference() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                let mut f = 0;
                let res = sub(&mut f, a, b);
                assert_eq!(res, a.wrapping_sub(b));
                assert_eq!(f & FLAG_H != 0, (a & 0x0F) < (b & 0x0F));
                assert_eq!(f & FLAG_C != 0, a < b);
                assert_ne!(f & FLAG_N, 0);
            }
        }
    }

    #[test]
    fn daa_bcd_addition() {
        let mut f = 0;
        let sum = add(&mut f, 0x45, 0x38);
        assert_eq!(sum, 0x7D);
        let adjusted = daa(&mut f, sum);
        assert_eq!(adjusted, 0x83);
        assert_eq!(f & FLAG_C, 0);
    }

    #[test]
    fn daa_subtraction_with_borrow() {
        let mut f = 0;
        let diff = sub(&mut f, 0x20, 0x13);
        assert_eq!(diff, 0x0D);
        assert_eq!(daa(&mut f, diff), 0x07);
    }

    #[test]
    fn adc_chains_carry() {
        let mut f = FLAG_C;
        assert_eq!(adc(&mut f, 0xFF, 0x00), 0x00);
        assert_ne!(f & FLAG_C, 0);
        assert_ne!(f & FLAG_Z, 0);
    }

    #[test]
    fn rotates_through_carry() {
        let mut f = FLAG_C;
        assert_eq!(rl(&mut f, 0x80), 0x01);
        assert_ne!(f & FLAG_C, 0);
        let mut f = 0;
        assert_eq!(rr(&mut f, 0x01), 0x00);
        assert_ne!(f & FLAG_C, 0);
        assert_ne!(f & FLAG_Z, 0);
    }

    #[test]
    fn add_sp_flags_from_low_byte() {
        let mut f = 0;
        assert_eq!(add_sp(&mut f, 0xFFF8, 8), 0x0000);
        assert_ne!(f & FLAG_H, 0);
        assert_ne!(f & FLAG_C, 0);
        assert_eq!(f & FLAG_Z, 0);
        // -1 is 0xFF unsigned: no nibble overflow, but the low byte carries.
        let mut f = 0;
        assert_eq!(add_sp(&mut f, 0x0010, -1), 0x000F);
        assert_eq!(f & FLAG_H, 0);
        assert_ne!(f & FLAG_C, 0);
    }
}
