//! Overlay used by the gateway process. There is no native window layer, so a highlight
//! is a structured log line the dashboard operator can follow.
//!
//! Nothing is drawn, so nothing is removed either: taking a box down once `duration` has
//! elapsed is the job of a real overlay backend. `highlight` returns immediately.

use std::time::Duration;

use aegis_core::ports::Overlay;
use aegis_core::{AegisResult, HighlightRegion};
use tracing::info;

#[derive(Debug, Default)]
pub struct LogOverlay;

impl Overlay for LogOverlay {
    fn highlight(&self, region: &HighlightRegion, duration: Duration) -> AegisResult<()> {
        info!(
            target: "aegis::overlay",
            level = %region.level,
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            secs = duration.as_secs_f32(),
            "highlight requested"
        );
        Ok(())
    }
}
