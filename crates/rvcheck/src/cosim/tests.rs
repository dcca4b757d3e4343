use std::collections::{BTreeMap, VecDeque};

use rvcheck_bus::{ClockError, Clocked};
use rvcheck_isa::csr::{CSR_CYCLE, CSR_MCYCLE};
use rvcheck_isa::{Rv32, Rv64};
use rvcheck_trace::{TraceEntry, TraceLog};

use super::*;
use crate::dut::CoreProbe;

const BASE: u64 = 0x8000_0000;

const ADDI_X5: u32 = 0x0010_0293;
const ADDI_X6: u32 = 0x0010_0313;
const LW_A0: u32 = 0x0005_a503;
const SB_A1: u32 = 0x00b5_0023;
const SH_A1: u32 = 0x00b5_1023;
const SD_A1: u32 = 0x00b5_3023;
const CSRR_MCYCLE: u32 = 0xb000_2573;
const EBREAK: u32 = 0x0010_0073;

/// What the fake core does when an instruction retires.
#[derive(Clone, Default)]
struct Commit {
    latency: u64,
    next_pc: u64,
    gpr: Option<(u8, u64)>,
    word: Option<(u64, u64)>,
}

/// Scripted core: retires one scripted commit after its latency, with a
/// free-running cycle counter.
struct FakeCore {
    script: VecDeque<Commit>,
    startup: u64,
    countdown: u64,
    half_cycles: u64,
    limit: Option<u64>,
    pc: u64,
    regs: [u64; 32],
    ram: BTreeMap<u64, u64>,
    mcycle: u64,
    commit: bool,
    forced: Vec<(u8, u64)>,
}

impl FakeCore {
    fn new(script: Vec<Commit>) -> Self {
        Self {
            script: script.into(),
            startup: 0,
            countdown: 0,
            half_cycles: 0,
            limit: None,
            pc: BASE,
            regs: [0; 32],
            ram: BTreeMap::new(),
            mcycle: 0,
            commit: false,
            forced: Vec::new(),
        }
    }

    fn tick(&mut self) {
        self.mcycle += 1;
        self.commit = false;
        if self.startup > 0 {
            self.startup -= 1;
            return;
        }
        if self.countdown == 0 {
            match self.script.front() {
                Some(next) => self.countdown = next.latency,
                None => return,
            }
        }
        self.countdown -= 1;
        if self.countdown == 0
            && let Some(done) = self.script.pop_front()
        {
            if let Some((rd, value)) = done.gpr {
                self.regs[rd as usize] = value;
            }
            if let Some((index, word)) = done.word {
                self.ram.insert(index, word);
            }
            self.pc = done.next_pc;
            self.commit = true;
        }
    }
}

impl Clocked for FakeCore {
    fn half_cycle(&mut self) -> Result<(), ClockError> {
        if let Some(limit) = self.limit
            && self.half_cycles / 2 >= limit
        {
            return Err(ClockError::CycleLimit { limit });
        }
        self.half_cycles += 1;
        if self.half_cycles % 2 == 0 {
            self.tick();
        }
        Ok(())
    }

    fn eval(&mut self) {}
}

impl CoreProbe for FakeCore {
    fn pc(&self) -> u64 {
        self.pc
    }

    fn gpr(&self, index: u8) -> u64 {
        if index == 0 { 0 } else { self.regs[index as usize] }
    }

    fn csr(&self, csr: u16) -> Option<u64> {
        matches!(csr, CSR_MCYCLE | CSR_CYCLE).then_some(self.mcycle)
    }

    fn commit_valid(&self) -> bool {
        self.commit
    }

    fn data_word(&self, index: u64) -> u64 {
        self.ram.get(&index).copied().unwrap_or(0)
    }

    fn force_gpr(&mut self, index: u8, value: u64) {
        self.forced.push((index, value));
        self.regs[index as usize] = value;
    }
}

fn entry(address: u64, encoding: u32, mnemonic: &str) -> TraceEntry {
    TraceEntry {
        core_id: 0,
        address,
        encoding,
        mnemonic: mnemonic.to_string(),
        rd: None,
        rd_value: 0,
        mem_addr: None,
        mem_value: None,
        terminal: false,
    }
}

fn writeback(address: u64, encoding: u32, rd: u8, value: u64) -> TraceEntry {
    TraceEntry {
        rd: Some(rd),
        rd_value: value,
        ..entry(address, encoding, "addi")
    }
}

fn store(address: u64, encoding: u32, addr: u64, value: u64) -> TraceEntry {
    TraceEntry {
        mem_addr: Some(addr),
        mem_value: Some(value),
        ..entry(address, encoding, "store")
    }
}

fn terminal(address: u64) -> TraceEntry {
    TraceEntry {
        terminal: true,
        ..entry(address, EBREAK, "ebreak")
    }
}

fn commit(next_pc: u64) -> Commit {
    Commit {
        latency: 1,
        next_pc,
        ..Commit::default()
    }
}

fn config() -> CheckConfig {
    CheckConfig {
        fill_cycles: 0,
        ..CheckConfig::default()
    }
}

fn run32(core: &mut FakeCore, config: &CheckConfig, trace: Vec<TraceEntry>) -> CheckReport {
    Checker::<_, Rv32>::new(core, config).run(&TraceLog::from(trace))
}

#[test]
fn test_store_byte_matches() {
    let mut core = FakeCore::new(vec![Commit {
        word: Some((0x400, 0xAB)),
        ..commit(BASE + 4)
    }]);
    let trace = vec![store(BASE, SB_A1, 0x1000, 0xAB), terminal(BASE + 4)];

    let report = run32(&mut core, &config(), trace);
    assert_eq!(report.verdict(), Verdict::Success);
    assert_eq!(report.instructions, 1);
    assert_eq!(report.cycles, 2);
}

#[test]
fn test_store_byte_mismatch() {
    let mut core = FakeCore::new(vec![Commit {
        word: Some((0x400, 0xCD)),
        ..commit(BASE + 4)
    }]);
    let trace = vec![store(BASE, SB_A1, 0x1000, 0xAB), terminal(BASE + 4)];

    let report = run32(&mut core, &config(), trace);
    assert_eq!(report.verdict(), Verdict::Failure);
    assert_eq!(report.verdict().code(), 1);
    let mismatch = report.first_mismatch().unwrap();
    assert_eq!(
        mismatch.kind,
        MismatchKind::Memory {
            addr: 0x1000,
            bytes: 1
        }
    );
    assert_eq!((mismatch.expected, mismatch.actual), (0xAB, 0xCD));
    assert_eq!(mismatch.address, BASE);
}

#[test]
fn test_store_half_uses_byte_lane() {
    let mut core = FakeCore::new(vec![Commit {
        word: Some((0x400, 0xBEEF_1234)),
        ..commit(BASE + 4)
    }]);
    let trace = vec![store(BASE, SH_A1, 0x1002, 0xBEEF), terminal(BASE + 4)];

    let report = run32(&mut core, &config(), trace);
    assert!(report.mismatches.is_empty());
}

#[test]
fn test_store_address_is_masked_to_window() {
    let mut core = FakeCore::new(vec![Commit {
        word: Some((0x4, 0x55)),
        ..commit(BASE + 4)
    }]);
    let trace = vec![store(BASE, SB_A1, 0x8001_0010, 0x55), terminal(BASE + 4)];

    let report = run32(&mut core, &config(), trace);
    assert_eq!(report.verdict(), Verdict::Success);
}

#[test]
fn test_store_double_on_rv64() {
    let mut core = FakeCore::new(vec![Commit {
        word: Some((0x201, 0x0123_4567_89AB_CDEF)),
        ..commit(BASE + 4)
    }]);
    let trace = vec![
        store(BASE, SD_A1, 0x1008, 0x0123_4567_89AB_CDEF),
        terminal(BASE + 4),
    ];

    let report = Checker::<_, Rv64>::new(&mut core, &config()).run(&TraceLog::from(trace));
    assert_eq!(report.verdict(), Verdict::Success);
}

#[test]
fn test_terminal_only_trace() {
    let mut core = FakeCore::new(Vec::new());
    let report = run32(&mut core, &config(), vec![terminal(BASE)]);

    assert_eq!(report.verdict(), Verdict::Success);
    assert_eq!(report.instructions, 0);
    assert_eq!(report.cycles, 1);
}

#[test]
fn test_fill_cycles_are_counted() {
    let mut core = FakeCore::new(vec![Commit {
        gpr: Some((5, 1)),
        ..commit(BASE + 4)
    }]);
    core.startup = 2;
    let config = CheckConfig {
        fill_cycles: 2,
        ..CheckConfig::default()
    };
    let trace = vec![writeback(BASE, ADDI_X5, 5, 1), terminal(BASE + 4)];

    let report = run32(&mut core, &config, trace);
    assert_eq!(report.verdict(), Verdict::Success);
    assert_eq!(report.cycles, 4);
}

#[test]
fn test_register_mismatch_does_not_stop_run() {
    let mut core = FakeCore::new(vec![
        Commit {
            gpr: Some((5, 1)),
            ..commit(BASE + 4)
        },
        Commit {
            gpr: Some((6, 3)),
            ..commit(BASE + 8)
        },
        Commit {
            gpr: Some((5, 7)),
            ..commit(BASE + 12)
        },
    ]);
    let trace = vec![
        writeback(BASE, ADDI_X5, 5, 1),
        writeback(BASE + 4, ADDI_X6, 6, 2),
        writeback(BASE + 8, ADDI_X5, 5, 7),
        terminal(BASE + 12),
    ];

    let report = run32(&mut core, &config(), trace);
    assert_eq!(report.instructions, 3);
    assert_eq!(report.mismatches.len(), 1);
    let mismatch = &report.mismatches[0];
    assert_eq!(mismatch.index, 1);
    assert_eq!(mismatch.kind, MismatchKind::Register { rd: 6 });
    assert_eq!((mismatch.expected, mismatch.actual), (2, 3));
    assert!(report.aborted.is_none());
}

#[test]
fn test_stop_on_first_mismatch() {
    let mut core = FakeCore::new(vec![
        Commit {
            gpr: Some((5, 9)),
            ..commit(BASE + 4)
        },
        Commit {
            gpr: Some((6, 9)),
            ..commit(BASE + 8)
        },
    ]);
    let config = CheckConfig {
        stop_on_first: true,
        ..config()
    };
    let trace = vec![
        writeback(BASE, ADDI_X5, 5, 1),
        writeback(BASE + 4, ADDI_X6, 6, 2),
        terminal(BASE + 8),
    ];

    let report = run32(&mut core, &config, trace);
    assert_eq!(report.instructions, 1);
    assert_eq!(report.mismatches.len(), 1);
    // The commit cycle plus the settle cycle.
    assert_eq!(report.cycles, 2);
}

#[test]
fn test_next_pc_mismatch() {
    let mut core = FakeCore::new(vec![Commit {
        gpr: Some((5, 1)),
        ..commit(BASE + 0x10)
    }]);
    let trace = vec![writeback(BASE, ADDI_X5, 5, 1), terminal(BASE + 4)];

    let report = run32(&mut core, &config(), trace);
    assert_eq!(report.mismatches.len(), 1);
    let mismatch = &report.mismatches[0];
    assert_eq!(mismatch.kind, MismatchKind::NextPc);
    assert_eq!((mismatch.expected, mismatch.actual), (BASE + 4, BASE + 0x10));
}

#[test]
fn test_pc_divergence_is_recorded_once() {
    let trace = vec![
        writeback(BASE, ADDI_X5, 5, 1),
        writeback(BASE + 4, ADDI_X6, 6, 2),
        terminal(BASE + 8),
    ];
    let script = vec![
        Commit {
            gpr: Some((5, 1)),
            ..commit(BASE + 0x10)
        },
        Commit {
            gpr: Some((6, 2)),
            ..commit(BASE + 8)
        },
    ];

    // The next-PC check after the first commit covers the second fetch.
    let mut core = FakeCore::new(script.clone());
    let report = run32(&mut core, &config(), trace.clone());
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].kind, MismatchKind::NextPc);
    assert_eq!(report.mismatches[0].index, 0);

    // Without it, the fetch check still reports the divergence.
    let mut core = FakeCore::new(script);
    let config = CheckConfig {
        check_next_pc: false,
        ..config()
    };
    let report = run32(&mut core, &config, trace);
    assert_eq!(report.mismatches.len(), 1);
    let mismatch = &report.mismatches[0];
    assert_eq!(mismatch.kind, MismatchKind::FetchPc);
    assert_eq!(mismatch.index, 1);
    assert_eq!((mismatch.expected, mismatch.actual), (BASE + 4, BASE + 0x10));
}

#[test]
fn test_fetch_pc_mismatch_and_disable() {
    let trace = vec![writeback(BASE, ADDI_X5, 5, 1), terminal(BASE + 4)];
    let script = vec![Commit {
        gpr: Some((5, 1)),
        ..commit(BASE + 4)
    }];

    let mut core = FakeCore::new(script.clone());
    core.pc = 0x100;
    let report = run32(&mut core, &config(), trace.clone());
    assert_eq!(report.mismatches[0].kind, MismatchKind::FetchPc);

    let mut core = FakeCore::new(script);
    core.pc = 0x100;
    let config = CheckConfig {
        check_fetch_pc: false,
        ..config()
    };
    let report = run32(&mut core, &config, trace);
    assert_eq!(report.verdict(), Verdict::Success);
}

#[test]
fn test_csr_read_corrected_and_forced() {
    // mcycle is 1 when the read commits; the corrected value is 0.
    let mut core = FakeCore::new(vec![
        Commit {
            gpr: Some((10, 0)),
            ..commit(BASE + 4)
        },
        Commit {
            gpr: Some((5, 0x1235)),
            ..commit(BASE + 8)
        },
    ]);
    let trace = vec![
        TraceEntry {
            rd: Some(10),
            rd_value: 0x1234,
            ..entry(BASE, CSRR_MCYCLE, "csrr a0, mcycle")
        },
        writeback(BASE + 4, ADDI_X5, 5, 0x1235),
        terminal(BASE + 8),
    ];

    let report = run32(&mut core, &config(), trace);
    assert_eq!(report.verdict(), Verdict::Success);
    assert_eq!(core.forced, vec![(10, 0x1234)]);
    assert_eq!(core.gpr(10), 0x1234);
}

#[test]
fn test_csr_read_mismatch() {
    let mut core = FakeCore::new(vec![Commit {
        gpr: Some((10, 5)),
        ..commit(BASE + 4)
    }]);
    let trace = vec![
        TraceEntry {
            rd: Some(10),
            rd_value: 0x1234,
            ..entry(BASE, CSRR_MCYCLE, "csrr a0, mcycle")
        },
        terminal(BASE + 4),
    ];

    let report = run32(&mut core, &config(), trace);
    let mismatch = report.first_mismatch().unwrap();
    assert_eq!(
        mismatch.kind,
        MismatchKind::Csr {
            csr: CSR_MCYCLE,
            rd: 10
        }
    );
    assert_eq!((mismatch.expected, mismatch.actual), (0, 5));
}

#[test]
fn test_csr_without_correction_uses_reference_value() {
    let mut core = FakeCore::new(vec![Commit {
        gpr: Some((10, 0x1234)),
        ..commit(BASE + 4)
    }]);
    let config = CheckConfig {
        csr_corrections: Vec::new(),
        ..config()
    };
    let trace = vec![
        TraceEntry {
            rd: Some(10),
            rd_value: 0x1234,
            ..entry(BASE, CSRR_MCYCLE, "csrr a0, mcycle")
        },
        terminal(BASE + 4),
    ];

    let report = run32(&mut core, &config, trace);
    assert_eq!(report.verdict(), Verdict::Success);
    assert!(core.forced.is_empty());
}

#[test]
fn test_fixed_commit_adds_memory_cycle() {
    let mut core = FakeCore::new(vec![
        Commit {
            gpr: Some((5, 1)),
            ..commit(BASE + 4)
        },
        Commit {
            latency: 2,
            gpr: Some((10, 0x42)),
            ..commit(BASE + 8)
        },
    ]);
    let config = CheckConfig {
        commit: CommitMode::SINGLE_CYCLE,
        ..config()
    };
    let trace = vec![
        writeback(BASE, ADDI_X5, 5, 1),
        TraceEntry {
            rd: Some(10),
            rd_value: 0x42,
            mem_addr: Some(0x1000),
            ..entry(BASE + 4, LW_A0, "lw a0, 0(a1)")
        },
        terminal(BASE + 8),
    ];

    let report = run32(&mut core, &config, trace);
    assert_eq!(report.verdict(), Verdict::Success);
    assert_eq!(report.cycles, 4);
}

#[test]
fn test_commit_timeout_aborts() {
    let mut core = FakeCore::new(Vec::new());
    let config = CheckConfig {
        commit_timeout: Some(3),
        ..config()
    };
    let trace = vec![writeback(BASE, ADDI_X5, 5, 1), terminal(BASE + 4)];

    let report = run32(&mut core, &config, trace);
    assert_eq!(report.verdict(), Verdict::Failure);
    assert!(report.mismatches.is_empty());
    assert_eq!(
        report.aborted,
        Some(CheckError::CommitTimeout {
            address: BASE,
            cycles: 3
        })
    );
    assert_eq!(report.cycles, 3);
}

#[test]
fn test_cycle_limit_aborts() {
    let mut core = FakeCore::new(Vec::new());
    core.limit = Some(2);
    let trace = vec![writeback(BASE, ADDI_X5, 5, 1), terminal(BASE + 4)];

    let report = run32(&mut core, &config(), trace);
    assert_eq!(report.verdict(), Verdict::Failure);
    assert_eq!(
        report.aborted,
        Some(CheckError::Clock(ClockError::CycleLimit { limit: 2 }))
    );
    assert_eq!(report.cycles, 2);
}

#[test]
fn test_mismatch_display() {
    let mismatch = Mismatch {
        index: 3,
        address: BASE,
        mnemonic: "sb a1, 0(a0)".to_string(),
        kind: MismatchKind::Memory {
            addr: 0x1000,
            bytes: 1,
        },
        expected: 0xAB,
        actual: 0xCD,
    };
    assert_eq!(
        mismatch.to_string(),
        "#3 0x80000000 `sb a1, 0(a0)`: 1-byte store mismatch at 0x1000 (expected 0xab, got 0xcd)"
    );
    assert_eq!(Verdict::Success.to_string(), "SUCCESS");
}
