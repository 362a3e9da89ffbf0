use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::{self, BitOrder, Spi};
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
use embassy_sync::signal::Signal;
use embassy_time::Instant;
use portable_atomic::AtomicBool;

use clock_core::controller::ClockController;
use clock_core::power::MotionCell;
use clock_core::time::Millis;
use clock_core::timezone::Timezone;

use crate::config::{CLOCK_CONFIG, I2C_FREQUENCY_HZ, LOCAL_ZONE, VFD_SPI_FREQUENCY_HZ};
use crate::hw::analog::AnalogInputs;
use crate::hw::ds1307::BackupClock;
use crate::hw::vfd::VfdDisplay;
use crate::radio::{Dcf77Radio, RadioState};
use crate::telemetry::TelemetryMirror;

mod clock_task;
mod motion_task;
mod pulse_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

type VfdBus = Mutex<NoopRawMutex, RefCell<Spi<'static, Blocking>>>;

pub(super) type BoardController<'a> = ClockController<
    Dcf77Radio<'static, Output<'static>>,
    BackupClock<I2c<'static, Blocking>>,
    VfdDisplay<SpiDevice<'a, NoopRawMutex, Spi<'static, Blocking>, Output<'static>>>,
    Timezone,
>;

pub(super) static RADIO_STATE: RadioState = RadioState::new();
pub(super) static MOTION: MotionCell = MotionCell::new();
pub(super) static MOTION_LEVEL: AtomicBool = AtomicBool::new(false);
pub(super) static MOTION_WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Edge tasks run above thread mode so blocking startup pauses do not stall decoding.
static EDGE_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[hal::interrupt]
unsafe fn USART3_4_5_6_LPUART1() {
    unsafe { EDGE_EXECUTOR.on_interrupt() }
}

/// Monotonic milliseconds, wrapping with the controller's counter.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn now_millis() -> Millis {
    Millis::from_raw(Instant::now().as_millis() as u32)
}

#[embassy_executor::main]
pub async fn main(_spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA4,
        PA6,
        PA8,
        PB3,
        PB4,
        PB5,
        PB8,
        PB9,
        ADC1,
        I2C1,
        SPI1,
        EXTI1,
        EXTI8,
        ..
    } = hal::init(config);

    hal::interrupt::USART3_4_5_6_LPUART1.set_priority(Priority::P3);
    let edges = EDGE_EXECUTOR.start(hal::interrupt::USART3_4_5_6_LPUART1);
    edges
        .spawn(pulse_task::run(
            ExtiInput::new(PA1, EXTI1, Pull::Down),
            &RADIO_STATE,
        ))
        .expect("failed to spawn radio pulse task");
    edges
        .spawn(motion_task::run(ExtiInput::new(PA8, EXTI8, Pull::Down)))
        .expect("failed to spawn motion task");

    let radio = Dcf77Radio::new(&RADIO_STATE, Output::new(PA6, Level::High, Speed::Low));

    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = Hertz(I2C_FREQUENCY_HZ);
    let backup = BackupClock::new(I2c::new_blocking(I2C1, PB8, PB9, i2c_config));

    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(VFD_SPI_FREQUENCY_HZ);
    spi_config.bit_order = BitOrder::LsbFirst;
    spi_config.mode = spi::MODE_3;
    let vfd_bus: VfdBus = Mutex::new(RefCell::new(Spi::new_blocking_txonly(
        SPI1, PB3, PB5, spi_config,
    )));
    let vfd_strobe = Output::new(PB4, Level::High, Speed::Low);
    let display = VfdDisplay::new(
        SpiDevice::new(&vfd_bus, vfd_strobe),
        CLOCK_CONFIG.brightness.max_level,
    );

    let analog = AnalogInputs::new(Adc::new(ADC1), PA0.degrade_adc(), PA4.degrade_adc());

    let mut controller = ClockController::new(CLOCK_CONFIG, radio, backup, display, LOCAL_ZONE)
        .expect("invalid board clock configuration");
    let mut telemetry = TelemetryMirror::new();

    let outcome = controller.startup(&mut clock_task::EmbassyPacer::new(
        CLOCK_CONFIG.sync.startup_pause,
    ));
    defmt::info!("startup: {}", defmt::Debug2Format(&outcome));
    telemetry.drain(controller.telemetry());

    clock_task::run(controller, analog, telemetry).await
}
