//! Measures one capacitor per power cycle and shows the result on a four-digit display.
#![no_std]
#![no_main]
#![doc(html_playground_url = "https://play.rust-lang.org/")]
#![warn(missing_docs)]

use cortex_m::{peripheral::syst::SystClkSource, singleton};
use defmt::{debug, info};
#[allow(unused_imports)]
use defmt_rtt as _;
#[allow(unused_imports)]
use panic_probe as _;
use rc_capmeter::{
    board::{ElapsedTicks, SharedTicks, ADC_FIFO, ELAPSED_TICKS, MULTIPLEXER},
    components::RcNetwork,
    config::{ADC_CLOCK_DIVIDER, DISPLAY_REFRESH_US},
    interrupt::{DISPLAY, MEASUREMENT},
    multiplex::{Multiplexer, ShiftRegisterDisplay},
    sequencer::Sequencer,
};
use rp2040_hal::{
    adc::AdcPin,
    clocks::init_clocks_and_plls,
    entry,
    gpio::{Pins, PullNone},
    pac, Adc, Clock, Sio, Timer, Watchdog,
};

/// Second-stage bootloader, from [rp2040-boot2](https://docs.rs/rp2040-boot2)
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;
/// External high-speed crystal on the pico board is 12Mhz
pub const XOSC_FREQ_HZ: u32 = 12_000_000;

/// Panic message if the ADC singleton was already taken
const ADC_TAKEN_PANIC_MSG: &str = "ADC has already been initialized";
/// Panic message if alarm 0 was already taken
const ALARM_TAKEN_PANIC_MSG: &str = "Timer alarm 0 is not available for the elapsed-time counter";
/// Panic message if the display lines cannot be driven low
const DISPLAY_INIT_PANIC_MSG: &str = "Unable to initialize the display shift registers";
/// Panic message if the path pins cannot be floated
const PATH_INIT_PANIC_MSG: &str = "Unable to float the charge/discharge path pins";
/// Panic message if a path pin fails during the measurement
const MEASUREMENT_PANIC_MSG: &str = "Path selection failed during measurement";

/// Run one measurement, then keep the display refreshing
#[entry]
fn main() -> ! {
    info!("Capacitance meter startup");
    let mut pac = pac::Peripherals::take().unwrap();
    let core = pac::CorePeripherals::take().unwrap();
    let mut watchdog = Watchdog::new(pac.WATCHDOG);
    let sio = Sio::new(pac.SIO);

    let clocks = init_clocks_and_plls(
        XOSC_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let pins = Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );
    let mut timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    // Display refresh runs for the whole program, measurement included
    let mut display = ShiftRegisterDisplay::new(
        pins.gpio2.into_push_pull_output(),
        pins.gpio3.into_push_pull_output(),
        pins.gpio4.into_push_pull_output(),
        timer,
    );
    display.init().expect(DISPLAY_INIT_PANIC_MSG);
    debug!("critical_section: init display multiplexer");
    critical_section::with(|cs| MULTIPLEXER.replace(cs, Some(Multiplexer::new(display))));

    let mut syst = core.SYST;
    syst.set_clock_source(SystClkSource::Core);
    // Ex. 125 MHz core clock, 4 ms refresh -> reload of 500k cycles
    syst.set_reload(clocks.system_clock.freq().to_Hz() / 1_000_000 * DISPLAY_REFRESH_US - 1);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();

    // Elapsed-time counter and its overflow alarm
    let alarm = timer.alarm_0().expect(ALARM_TAKEN_PANIC_MSG);
    debug!("critical_section: init elapsed-time counter");
    critical_section::with(|cs| ELAPSED_TICKS.replace(cs, Some(ElapsedTicks::new(timer, alarm))));

    // Free-running ADC, one interrupt per sample
    let adc = singleton!(: Adc = Adc::new(pac.ADC, &mut pac.RESETS)).expect(ADC_TAKEN_PANIC_MSG);
    let mut adc_pin0 = AdcPin::new(pins.gpio26.into_floating_input()).unwrap();
    let readings_fifo = adc
        .build_fifo()
        .set_channel(&mut adc_pin0)
        // Ex. 48 MHz ADC clock / (1 + 4999) -> 9.6 ksamples/s
        .clock_divider(ADC_CLOCK_DIVIDER, 0)
        .enable_interrupt(1)
        .start();
    debug!("critical_section: transfer readings FIFO to mutex");
    critical_section::with(|cs| ADC_FIFO.replace(cs, Some(readings_fifo)));

    // Both paths start floating
    let network = RcNetwork::new(
        pins.gpio6.into_pull_type::<PullNone>().into_push_pull_output(),
        pins.gpio5.into_pull_type::<PullNone>().into_push_pull_output(),
    )
    .expect(PATH_INIT_PANIC_MSG);

    unsafe {
        pac::NVIC::unmask(pac::Interrupt::ADC_IRQ_FIFO);
        pac::NVIC::unmask(pac::Interrupt::TIMER_IRQ_0);
    }

    let mut sequencer = Sequencer::new(network, SharedTicks, timer, &MEASUREMENT, &DISPLAY);
    let outcome = sequencer.run().expect(MEASUREMENT_PANIC_MSG);
    info!("Measurement complete: {}", outcome);

    loop {
        // Display refresh continues in SysTick until power is removed
        cortex_m::asm::wfi();
    }
}
