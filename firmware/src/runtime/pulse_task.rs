use embassy_stm32::exti::ExtiInput;

use crate::radio::{PulseFeed, RadioState};

use super::now_millis;

/// Receiver output is high for the duration of each carrier reduction.
#[embassy_executor::task]
pub async fn run(mut input: ExtiInput<'static>, state: &'static RadioState) -> ! {
    let mut feed = PulseFeed::new(state);
    loop {
        input.wait_for_rising_edge().await;
        match feed.rising(now_millis().raw()) {
            Some(Ok(frame)) => defmt::debug!(
                "dcf77 frame utc={} dst={}",
                frame.utc.as_secs(),
                frame.summer_time
            ),
            Some(Err(error)) => {
                defmt::debug!("dcf77 frame rejected: {}", defmt::Display2Format(&error));
            }
            None => {}
        }

        input.wait_for_falling_edge().await;
        feed.falling(now_millis().raw());
    }
}
