use core::sync::atomic::Ordering;

use embassy_stm32::exti::ExtiInput;

use super::{MOTION, MOTION_LEVEL, MOTION_WAKE, now_millis};

/// Tracks the PIR output level and stamps each rising edge.
#[embassy_executor::task]
pub async fn run(mut input: ExtiInput<'static>) -> ! {
    loop {
        input.wait_for_any_edge().await;
        let asserted = input.is_high();
        MOTION_LEVEL.store(asserted, Ordering::Release);
        if asserted {
            MOTION.record(now_millis());
            MOTION_WAKE.signal(());
        }
    }
}
