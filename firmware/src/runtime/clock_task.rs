use core::sync::atomic::Ordering;
use core::time::Duration as CoreDuration;

use clock_core::controller::TickInput;
use clock_core::peripherals::StartupPacer;
use clock_core::time::{Millis, duration_to_millis};
use embassy_time::{Duration, Ticker, block_for};

use crate::hw::analog::AnalogInputs;
use crate::telemetry::TelemetryMirror;

use super::{BoardController, MOTION, MOTION_LEVEL, MOTION_WAKE, now_millis};

fn embassy_duration(duration: CoreDuration) -> Duration {
    Duration::from_millis(u64::from(duration_to_millis(duration)))
}

/// Busy-waits between startup polls; edge decoding runs on the interrupt executor.
pub struct EmbassyPacer {
    pause: Duration,
}

impl EmbassyPacer {
    pub fn new(pause: CoreDuration) -> Self {
        Self {
            pause: embassy_duration(pause),
        }
    }
}

impl StartupPacer for EmbassyPacer {
    fn now(&mut self) -> Millis {
        now_millis()
    }

    fn pause(&mut self) {
        block_for(self.pause);
    }
}

pub async fn run(
    mut controller: BoardController<'_>,
    mut analog: AnalogInputs<'static>,
    mut telemetry: TelemetryMirror,
) -> ! {
    let mut ticker = Ticker::every(embassy_duration(controller.config().tick_interval));
    loop {
        ticker.next().await;

        // Clear before sampling so an edge after the snapshot still wakes a suspend.
        MOTION_WAKE.reset();
        let input = TickInput {
            now: now_millis(),
            light_sample: analog.light(),
            keypad_sample: analog.keypad(),
            motion: MOTION.snapshot(),
            motion_asserted: MOTION_LEVEL.load(Ordering::Acquire),
        };
        let report = controller.tick(input);
        telemetry.drain(controller.telemetry());

        if report.suspend {
            defmt::info!("suspended until motion");
            MOTION_WAKE.wait().await;
            controller.resume(now_millis());
            telemetry.drain(controller.telemetry());
            ticker.reset();
        }
    }
}
