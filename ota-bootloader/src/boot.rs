// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot-bank selection and the jump to application firmware. Out of core
//! scope: the engine only needs to agree with this module on one thing,
//! the boot record's meaning, not on how a vector table gets loaded.

use ota_common::boot_record::{BankId, BootRecordStore};
use ota_common::config::{BANK_SIZE, BOOT_RECORD_ADDR, FLASH_SECTOR_SIZE, FW_A_ADDR, FW_B_ADDR};
use ota_common::crc::SoftwareCrc32;
use ota_common::flash::rp2040::Rp2040Flash;

struct VectorTable {
    initial_sp: u32,
    reset_vector: u32,
}

impl VectorTable {
    unsafe fn read_from(addr: u32) -> Self {
        Self {
            initial_sp: (addr as *const u32).read_volatile(),
            reset_vector: (addr as *const u32).offset(1).read_volatile(),
        }
    }

    /// A vector table is plausible if its stack pointer lands in SRAM and
    /// its reset vector lands in one of the two firmware banks (Thumb bit set).
    fn is_plausible(&self) -> bool {
        const SRAM_BASE: u32 = 0x2000_0000;
        const SRAM_END: u32 = 0x2004_2000;
        let sp_in_ram = (SRAM_BASE..SRAM_END).contains(&self.initial_sp);
        let pc_in_a_bank = (FW_A_ADDR..FW_A_ADDR + BANK_SIZE).contains(&self.reset_vector)
            || (FW_B_ADDR..FW_B_ADDR + BANK_SIZE).contains(&self.reset_vector);
        sp_in_ram && pc_in_a_bank && self.reset_vector & 1 == 1
    }
}

fn bank_address(bank: BankId) -> u32 {
    BootRecordStore::<Rp2040Flash>::bank_address(bank)
}

/// Read the boot record and validate the active bank's vector table.
/// Returns the flash address to jump to, or `None` if no bank looks bootable.
pub fn select_boot_bank() -> Option<u32> {
    let mut flash = Rp2040Flash::new();
    let mut crc = SoftwareCrc32::new();
    let store = BootRecordStore::new(&mut flash, BOOT_RECORD_ADDR, FLASH_SECTOR_SIZE);

    let record = store.read(&mut crc).ok()?;
    if !record.is_consistent() {
        return None;
    }
    let active = record.active_bank_id()?;
    let addr = bank_address(active);
    let vt = unsafe { VectorTable::read_from(addr) };
    if vt.is_plausible() {
        Some(addr)
    } else {
        None
    }
}

/// Check if update mode is requested via GP2 pin pulled low.
pub fn check_update_trigger(gp2_is_low: bool) -> bool {
    gp2_is_low
}

/// Jump into application firmware at `flash_addr`, never returning. Relocates
/// the vector table to the bank address and branches to its reset vector,
/// the same RAM-free XIP jump every fixed-bank RP2040 bootloader uses.
///
/// # Safety
/// `flash_addr` must point at a plausible, word-aligned vector table.
pub unsafe fn jump_to_firmware(flash_addr: u32) -> ! {
    cortex_m::interrupt::disable();

    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    NVIC_ICPR.write_volatile(0xFFFF_FFFF);
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    NVIC_ICER.write_volatile(0xFFFF_FFFF);

    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(flash_addr);
    cortex_m::asm::dsb();
    cortex_m::asm::isb();

    let vt = VectorTable::read_from(flash_addr);
    core::arch::asm!(
        "msr msp, {sp}",
        "cpsie i",
        "bx {reset}",
        sp = in(reg) vt.initial_sp,
        reset = in(reg) vt.reset_vector,
        options(noreturn)
    );
}

/// Run the normal boot sequence: pick a bank and jump, or fall into update
/// mode if neither bank is bootable.
pub fn run_normal_boot(p: &mut crate::peripherals::Peripherals) -> ! {
    use embedded_hal::delay::DelayNs;

    defmt::println!("Normal boot path");

    match select_boot_bank() {
        Some(addr) => {
            defmt::println!("Jumping to firmware at 0x{:08x}", addr);
            p.timer.delay_ms(10u32);
            unsafe { jump_to_firmware(addr) }
        }
        None => {
            defmt::println!("No bootable bank, entering update mode");
            crate::update::enter_update_mode(p);
        }
    }
}
