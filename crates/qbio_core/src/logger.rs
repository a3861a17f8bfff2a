use std::time::Instant;

use crate::settings::LogSettings;
use anyhow::{Context, Result};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install a stdout subscriber filtered at the configured level.
///
/// The level accepts anything `EnvFilter` understands, so `"debug"` and
/// `"qbio_core=trace,info"` both work. If a global subscriber is already in
/// place the existing one is kept and a warning is emitted through it.
pub fn setup_log(settings: &LogSettings) -> Result<()> {
    let env_filter = EnvFilter::try_new(settings.level.as_str())
        .with_context(|| format!("Invalid log level '{}'", settings.level))?;

    let timestamper = CompactTimestamp {
        start: Instant::now(),
    };

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false)
        .with_timer(timestamper);

    if let Err(err) = Registry::default()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()
    {
        tracing::warn!("Logging was already initialised: {err}");
    }

    Ok(())
}

#[derive(Clone)]
struct CompactTimestamp {
    start: Instant,
}

impl FormatTime for CompactTimestamp {
    fn format_time(
        &self,
        w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> Result<(), std::fmt::Error> {
        let elapsed = self.start.elapsed();
        let hours = elapsed.as_secs() / 3600;
        let minutes = (elapsed.as_secs() % 3600) / 60;
        let seconds = elapsed.as_secs() % 60;
        let millis = elapsed.subsec_millis();

        write!(w, "{:02}h {:02}m {:02}.{:03}s", hours, minutes, seconds, millis)
    }
}
