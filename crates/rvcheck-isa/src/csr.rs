//! CSR numbers the checker knows by name.

pub const CSR_MCYCLE: u16 = 0xB00;
pub const CSR_MINSTRET: u16 = 0xB02;
pub const CSR_CYCLE: u16 = 0xC00;
pub const CSR_TIME: u16 = 0xC01;
pub const CSR_INSTRET: u16 = 0xC02;

/// CSRs with a display name.
const NAMED: [u16; 15] = [
    CSR_MCYCLE,
    CSR_MINSTRET,
    CSR_CYCLE,
    CSR_TIME,
    CSR_INSTRET,
    0xB80,
    0xB82,
    0xC80,
    0xC82,
    0x300,
    0x301,
    0x305,
    0x341,
    0x342,
    0xF14,
];

/// Get CSR name for display.
pub const fn csr_name(csr: u16) -> &'static str {
    match csr {
        CSR_MCYCLE => "mcycle",
        CSR_MINSTRET => "minstret",
        CSR_CYCLE => "cycle",
        CSR_TIME => "time",
        CSR_INSTRET => "instret",
        0xB80 => "mcycleh",
        0xB82 => "minstreth",
        0xC80 => "cycleh",
        0xC82 => "instreth",
        0x300 => "mstatus",
        0x301 => "misa",
        0x305 => "mtvec",
        0x341 => "mepc",
        0x342 => "mcause",
        0xF14 => "mhartid",
        _ => "???",
    }
}

/// Look up a CSR number by its display name.
pub fn csr_number(name: &str) -> Option<u16> {
    NAMED.into_iter().find(|&csr| csr_name(csr) == name)
}
