// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Sample application firmware. Not part of the OTA engine itself — this is
//! the thing a user would actually flash into a bank: it reads the boot
//! record to find out which bank it's running from, and blinks to prove
//! the bank swap the bootloader just performed actually boots.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use defmt_rtt as _;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use ota_common::boot_record::BootRecordStore;
use ota_common::config::{BOOT_RECORD_ADDR, FLASH_SECTOR_SIZE};
use ota_common::crc::SoftwareCrc32;
use ota_common::flash::rp2040::Rp2040Flash;
use panic_probe as _;
use rp2040_hal as hal;

defmt::timestamp!("{=u64:us}", { 0 });

#[entry]
fn main() -> ! {
    defmt::println!("sample firmware started");

    let mut pac = unsafe { hal::pac::Peripherals::steal() };
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let clocks = hal::clocks::init_clocks_and_plls(
        12_000_000u32,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();
    let mut timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );
    let mut led = pins.gpio25.into_push_pull_output();

    let mut flash = Rp2040Flash::new();
    let mut crc_engine = SoftwareCrc32::new();
    let store = BootRecordStore::new(&mut flash, BOOT_RECORD_ADDR, FLASH_SECTOR_SIZE);
    match store.read(&mut crc_engine) {
        Ok(record) => defmt::println!("running from bank {=u8}", record.active_bank as u8),
        Err(_) => defmt::println!("boot record unreadable"),
    }

    loop {
        led.set_high().ok();
        timer.delay_ms(100);
        led.set_low().ok();
        timer.delay_ms(900);
    }
}
