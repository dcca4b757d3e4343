use super::*;

#[test]
fn test_classify_stores_by_funct3() {
    // sb a1, 0(a0)
    assert_eq!(
        classify(0x00b5_0023),
        InstrClass::Store {
            width: StoreWidth::Byte
        }
    );
    // sh a1, 2(a0)
    assert_eq!(
        classify(0x00b5_1123),
        InstrClass::Store {
            width: StoreWidth::Half
        }
    );
    // sw a1, 4(a0)
    assert_eq!(
        classify(0x00b5_2223),
        InstrClass::Store {
            width: StoreWidth::Word
        }
    );
    // sd a1, 8(a0)
    assert_eq!(
        classify(0x00b5_3423),
        InstrClass::Store {
            width: StoreWidth::Double
        }
    );
}

#[test]
fn test_classify_load() {
    // lw a0, 0(sp)
    let class = classify(0x0001_2503);
    assert_eq!(class, InstrClass::Load);
    assert!(class.is_memory());
}

#[test]
fn test_classify_csr_read() {
    // csrr t0, mcycle
    assert_eq!(
        classify(0xb000_22f3),
        InstrClass::CsrRead {
            csr: csr::CSR_MCYCLE
        }
    );
    // rdcycle a0
    assert_eq!(
        classify(0xc000_2573),
        InstrClass::CsrRead { csr: csr::CSR_CYCLE }
    );
}

#[test]
fn test_classify_system_and_other() {
    assert_eq!(classify(0x0010_0073), InstrClass::System); // ebreak
    assert_eq!(classify(0x0000_0073), InstrClass::System); // ecall
    assert_eq!(classify(0x0000_0297), InstrClass::Other); // auipc t0, 0
    assert_eq!(classify(0x0010_0093), InstrClass::Other); // addi ra, zero, 1
    assert!(!InstrClass::Other.is_memory());
}

#[test]
fn test_store_width_masks() {
    assert_eq!(StoreWidth::Byte.mask(), 0xFF);
    assert_eq!(StoreWidth::Half.mask(), 0xFFFF);
    assert_eq!(StoreWidth::Word.mask(), 0xFFFF_FFFF);
    assert_eq!(StoreWidth::Double.mask(), u64::MAX);
    assert_eq!(StoreWidth::Half.bytes(), 2);
}

#[test]
fn test_field_extraction() {
    // csrr t0, mcycle: rd = x5, funct3 = 2
    assert_eq!(decode_rd(0xb000_22f3), 5);
    assert_eq!(decode_funct3(0xb000_22f3), 2);
    assert_eq!(decode_opcode(0xb000_22f3), 0x73);
}

#[test]
fn test_xlen_word_encoding() {
    let mut buf = [0u8; 8];
    Rv32::reg_to_le(0xdead_beef, &mut buf);
    assert_eq!(&buf[..4], &[0xef, 0xbe, 0xad, 0xde]);
    assert_eq!(Rv32::reg_from_le(&buf), 0xdead_beef);

    Rv64::reg_to_le(0x0123_4567_89ab_cdef, &mut buf);
    assert_eq!(Rv64::reg_from_le(&buf), 0x0123_4567_89ab_cdef);

    assert_eq!(Rv32::truncate(0x1_0000_0001), 1);
    assert_eq!(Rv64::truncate(0x1_0000_0001), 0x1_0000_0001);
    assert_eq!(Rv32::AXI_SIZE, 0b010);
    assert_eq!(Rv64::FULL_STROBE, 0xFF);
}

#[test]
fn test_csr_names() {
    assert_eq!(csr::csr_name(csr::CSR_MCYCLE), "mcycle");
    assert_eq!(csr::csr_name(0x7ff), "???");
    assert_eq!(csr::csr_number("cycle"), Some(csr::CSR_CYCLE));
    assert_eq!(csr::csr_number("mhartid"), Some(0xF14));
    assert_eq!(csr::csr_number("???"), None);
    assert_eq!(csr::csr_number("bogus"), None);
}
