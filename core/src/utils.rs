//! Formatting helpers for the debug/trace output a host harness prints:
//! colorized memory diffs and small per-field renderers used by
//! [`crate::framework::StageInfo`] consumers.

use ansi_term::Colour;
use ansi_term::Style;

use crate::framework::MEM_SIZE;

/// Get 64-bit unsigned integer value in little endian order.
pub fn get_u64(binary: &[u8]) -> u64 {
    let mut res = 0;
    for (i, byte) in binary.iter().enumerate().take(8) {
        res += (*byte as u64) << (i * 8);
    }
    res
}

/// Write 64-bit unsigned integer value to binary in little endian order.
pub fn put_u64(binary: &mut [u8], val: u64) {
    for (i, byte) in binary.iter_mut().enumerate().take(8) {
        *byte = (val >> (i * 8)) as u8;
    }
}

/// Print every differing 8-byte chunk between two memory images, old
/// bytes in red and new bytes in green, unchanged bytes dimmed.
pub fn mem_diff(left: &[u8; MEM_SIZE], right: &[u8; MEM_SIZE]) {
    for i in 0..MEM_SIZE >> 3 {
        let offset = i << 3;
        if get_u64(&left[offset..]) != get_u64(&right[offset..]) {
            let l = &left[offset..offset + 8];
            let r = &right[offset..offset + 8];

            print!("{:#06x}: ", offset);
            for i in 0..8 {
                let style = if l[i] != r[i] { Colour::Red.bold() } else { Style::new().dimmed() };
                print!("{}", style.paint(format!("{:02x}", l[i])));
            }
            print!(" -> ");
            for i in 0..8 {
                let style = if l[i] != r[i] { Colour::Green.bold() } else { Style::new().dimmed() };
                print!("{}", style.paint(format!("{:02x}", r[i])));
            }
            println!();
        }
    }
}

/// Print every nonzero 8-byte chunk of a memory image, up to the last
/// one touched.
pub fn mem_print(bin: &[u8; MEM_SIZE]) {
    let mut max_i = 0;
    for i in 0..MEM_SIZE >> 3 {
        if get_u64(&bin[i << 3..]) != 0 {
            max_i = i;
        }
    }
    for i in 0..=max_i {
        print!("{:#06x}: ", i << 3);
        for byte in bin[i << 3..].iter().take(8) {
            print!("{:02x}", *byte);
        }
        println!();
    }
}

/// Render a pipeline-register condition for trace output: a flushed
/// bubble, a held stall, or a normal latch.
pub fn format_ctrl(bubble: bool, stall: bool) -> String {
    if bubble {
        Colour::Red.bold().paint("Bubble").to_string()
    } else if stall {
        Colour::Red.bold().paint("Stall ").to_string()
    } else {
        Colour::Green.paint("Normal").to_string()
    }
}

/// Render a register value, dimming the common all-zero case and
/// dimming the leading-zero padding on nonzero values.
pub fn format_reg_val(val: u32) -> String {
    if val == 0 {
        Style::new().dimmed().paint(format!("{:08x}", 0)).to_string()
    } else {
        let num = format!("{val:x}");
        let prefix = "0".repeat(8 - num.len());
        format!("{}{}", Style::new().dimmed().paint(prefix), Style::new().bold().paint(num))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_round_trips_little_endian() {
        let mut buf = [0u8; 8];
        put_u64(&mut buf, 0x0102_0304_0506_0708);
        assert_eq!(get_u64(&buf), 0x0102_0304_0506_0708);
    }
}
