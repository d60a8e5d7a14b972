//! Exception vector numbers.
//!
//! Each vector's handler address is a long stored at `VBR + 4 * vector`.

pub const RESET_SSP: u8 = 0;
pub const RESET_PC: u8 = 1;
pub const BUS_ERROR: u8 = 2;
pub const ADDRESS_ERROR: u8 = 3;
pub const ILLEGAL_INSTRUCTION: u8 = 4;
pub const ZERO_DIVIDE: u8 = 5;
pub const CHK: u8 = 6;
pub const TRAPV: u8 = 7;
pub const PRIVILEGE_VIOLATION: u8 = 8;
pub const TRACE: u8 = 9;
pub const LINE_A: u8 = 10;
pub const LINE_F: u8 = 11;
pub const SPURIOUS_INTERRUPT: u8 = 24;
/// Level 1 autovector; levels 2-7 follow.
pub const AUTOVECTOR_BASE: u8 = 24;
/// TRAP #0; TRAP #n is `TRAP_BASE + n`.
pub const TRAP_BASE: u8 = 32;
/// First user-defined vector.
pub const USER_BASE: u8 = 64;

/// Size in bytes of the frame pushed for bus and address errors.
pub const LONG_FRAME_SIZE: u32 = 14;
/// Size in bytes of the frame pushed for every other exception.
pub const SHORT_FRAME_SIZE: u32 = 6;

/// Whether `vector` pushes the long (bus/address error) frame.
#[must_use]
pub const fn uses_long_frame(vector: u8) -> bool {
    matches!(vector, BUS_ERROR | ADDRESS_ERROR)
}

/// Frame size in bytes pushed for `vector`.
#[must_use]
pub const fn frame_size(vector: u8) -> u32 {
    if uses_long_frame(vector) {
        LONG_FRAME_SIZE
    } else {
        SHORT_FRAME_SIZE
    }
}

/// Address of the vector table entry for `vector`.
#[must_use]
pub const fn entry_address(vbr: u32, vector: u8) -> u32 {
    vbr.wrapping_add(4 * vector as u32)
}

/// Human-readable name for logs and the exception history.
#[must_use]
pub fn vector_name(vector: u8) -> &'static str {
    const TRAPS: [&str; 16] = [
        "TRAP #0", "TRAP #1", "TRAP #2", "TRAP #3", "TRAP #4", "TRAP #5", "TRAP #6", "TRAP #7",
        "TRAP #8", "TRAP #9", "TRAP #10", "TRAP #11", "TRAP #12", "TRAP #13", "TRAP #14",
        "TRAP #15",
    ];
    const AUTOVECTORS: [&str; 7] = [
        "Level 1 interrupt",
        "Level 2 interrupt",
        "Level 3 interrupt",
        "Level 4 interrupt",
        "Level 5 interrupt",
        "Level 6 interrupt",
        "Level 7 interrupt",
    ];

    match vector {
        RESET_SSP => "Reset SSP",
        RESET_PC => "Reset PC",
        BUS_ERROR => "Bus error",
        ADDRESS_ERROR => "Address error",
        ILLEGAL_INSTRUCTION => "Illegal instruction",
        ZERO_DIVIDE => "Divide by zero",
        CHK => "CHK instruction",
        TRAPV => "TRAPV instruction",
        PRIVILEGE_VIOLATION => "Privilege violation",
        TRACE => "Trace",
        LINE_A => "A-line trap",
        LINE_F => "F-line trap",
        SPURIOUS_INTERRUPT => "Spurious interrupt",
        25..=31 => AUTOVECTORS[(vector - 25) as usize],
        32..=47 => TRAPS[(vector - TRAP_BASE) as usize],
        12..=23 | 48..=63 => "Reserved",
        _ => "User interrupt",
    }
}
