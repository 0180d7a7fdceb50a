//! RenderLoop — fixed-cadence repaint driven by the aggregator's change signal.
//!
//! Draws once up front, then sleeps on `wait_for_change` bounded by the
//! refresh period and redraws on every wake. Stops only when the aggregator
//! reports every slot finished, after one final frame.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::session::aggregator::StreamAggregator;

use super::FrameSink;

pub struct RenderLoop<S> {
    aggregator: Arc<StreamAggregator>,
    period: Duration,
    surface: S,
    frames: u64,
}

impl<S: FrameSink> RenderLoop<S> {
    pub fn new(aggregator: Arc<StreamAggregator>, period: Duration, surface: S) -> Self {
        Self {
            aggregator,
            period,
            surface,
            frames: 0,
        }
    }

    fn render(&mut self) -> anyhow::Result<()> {
        let panels = self.aggregator.snapshot();
        self.surface.draw(&panels)?;
        self.frames += 1;
        Ok(())
    }

    /// Run until every slot is finished. Hands the surface back so the
    /// caller decides when to tear it down.
    pub async fn run(mut self) -> anyhow::Result<S> {
        self.render()?;
        loop {
            self.aggregator.wait_for_change(self.period).await;
            if self.aggregator.all_done() {
                break;
            }
            self.render()?;
        }
        self.render()?;
        debug!(frames = self.frames, "render loop finished");
        Ok(self.surface)
    }
}
