use std::{
    io::Write,
    time::{Duration, Instant},
};

use visbake::{BakeProgress, Control, ProgressSink, log::warn};

const REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Prints a single updating progress line and cancels the bake once the time
/// limit, if any, runs out.
pub struct TerminalProgress {
    start: Instant,
    last_report: Option<Instant>,
    time_limit: Option<Duration>,
}

impl TerminalProgress {
    pub fn new(time_limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            last_report: None,
            time_limit,
        }
    }

    /// Ends the progress line.
    pub fn finish(&self) {
        if self.last_report.is_some() {
            println!();
        }
    }

    fn print(&self, progress: &BakeProgress) {
        print!("\r{}", status_line(progress, self.start.elapsed()));
        std::io::stdout().flush().ok();
    }
}

fn status_line(progress: &BakeProgress, elapsed: Duration) -> String {
    let done = progress.fraction() * 100.0;
    let elapsed = elapsed.as_secs_f32();
    let remaining_time = if done > 0.0 {
        elapsed * (100.0 - done) / done
    } else {
        0.0
    };
    let stats = progress.stats;
    let los_rate = if stats.occlusion_queries > 0 {
        stats.clear_queries() as f32 * 100.0 / stats.occlusion_queries as f32
    } else {
        0.0
    };

    format!(
        "PVS Bake: {:.1}% | Time: {:.1}s | ETA: {:.1}s | Object: {}/{} | LoS: {}/{} ({:.1}%)",
        done,
        elapsed,
        remaining_time,
        progress.object + 1,
        progress.total_objects,
        stats.clear_queries(),
        stats.occlusion_queries,
        los_rate,
    )
}

impl ProgressSink for TerminalProgress {
    fn report(&mut self, progress: BakeProgress) -> Control {
        if let Some(limit) = self.time_limit {
            if self.start.elapsed() >= limit {
                self.finish();
                warn!("Time limit of {:.1}s reached", limit.as_secs_f32());
                return Control::Cancel;
            }
        }

        let now = Instant::now();
        let due = self
            .last_report
            .is_none_or(|last| now.duration_since(last) >= REPORT_INTERVAL);
        if due {
            self.print(&progress);
            self.last_report = Some(now);
        }
        Control::Continue
    }
}

#[cfg(test)]
mod tests {
    use visbake::BakeStats;

    use super::*;

    #[test]
    fn time_limit_cancels() {
        let mut sink = TerminalProgress::new(Some(Duration::ZERO));
        assert_eq!(sink.report(BakeProgress::default()), Control::Cancel);

        let mut sink = TerminalProgress::new(None);
        assert_eq!(sink.report(BakeProgress::default()), Control::Continue);
    }

    #[test]
    fn line_shows_line_of_sight_rate() {
        let progress = BakeProgress {
            object: 0,
            total_objects: 2,
            cell: 5,
            total_cells: 10,
            stats: BakeStats {
                cells: 5,
                shortcut_hits: 1,
                occlusion_queries: 8,
                visible: 3,
                ..Default::default()
            },
        };
        let line = status_line(&progress, Duration::from_secs(1));
        assert!(line.starts_with("PVS Bake: 25.0% | Time: 1.0s | ETA: 3.0s | Object: 1/2"));
        assert!(line.ends_with("LoS: 2/8 (25.0%)"), "{line}");

        let line = status_line(&BakeProgress::default(), Duration::ZERO);
        assert!(line.ends_with("LoS: 0/0 (0.0%)"), "{line}");
    }
}
