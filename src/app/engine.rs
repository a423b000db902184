use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Timelike, Utc};
use log::{info, warn};

use crate::lastfm::{ReportOutcome, TrackTags};
use crate::schedule::ScheduleWindow;
use crate::spinitron::{FeedError, PlaylistInfo, Spin};

/// Source feed seam: the station's most recent spin and its playlist.
pub trait SpinFeed {
    fn latest_spin(&self) -> Result<Spin, FeedError>;
    fn playlist(&self, id: u64) -> Result<PlaylistInfo, FeedError>;
}

/// Tracking service seam: now-playing and scrobble reports.
pub trait TrackReporter {
    fn now_playing(&self, track: &TrackTags) -> ReportOutcome;
    fn scrobble(&self, track: &TrackTags, timestamp: i64) -> ReportOutcome;
}

/// Cancellation flag shared with the signal handler. Sleeps poll it in
/// short slices so a pending multi-minute wait aborts promptly.
#[derive(Clone, Copy)]
pub struct Shutdown {
    flag: &'static AtomicBool,
}

impl Shutdown {
    const POLL_SLICE: Duration = Duration::from_millis(250);

    pub fn new(flag: &'static AtomicBool) -> Self {
        Self { flag }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Waits up to `duration`; returns false when shutdown was requested
    /// before the wait completed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_triggered() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(Self::POLL_SLICE));
        }
    }
}

/// Intervals and thresholds for the poll loop. Defaults match the rate
/// limits the services expect; tests compress them.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Base pause after any iteration without new-track work.
    pub miss_pause: Duration,
    /// Extra pause once `miss_threshold` consecutive misses are exceeded.
    pub degraded_pause: Duration,
    /// Guard pause after handling a new track.
    pub post_track_pause: Duration,
    /// Pause when the current spin itself started outside the window.
    pub out_of_window_spin_pause: Duration,
    pub miss_threshold: u32,
    /// Tracks at or under this length are never scrobbled.
    pub min_scrobble_secs: u32,
    /// Playlist category excluded from reporting.
    pub excluded_category: String,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            miss_pause: Duration::from_secs(30),
            degraded_pause: Duration::from_secs(180),
            post_track_pause: Duration::from_secs(5),
            out_of_window_spin_pause: Duration::from_secs(30),
            miss_threshold: 10,
            min_scrobble_secs: 30,
            excluded_category: "Automation".to_string(),
        }
    }
}

/// What a single poll iteration did, for logging and pause selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Spin or playlist fetch failed; counted as a miss, cursor untouched.
    FetchFailed { degraded: bool },
    /// Current hour is outside the broadcast window.
    AwaitWindow { wake_in: Duration },
    /// The spin itself started outside the broadcast window.
    SpinOutsideWindow,
    /// A new track was announced (and scrobbled when long enough).
    Reported { scrobbled: bool },
    /// New spin in the excluded category; recorded as seen, not reported.
    SkippedCategory { degraded: bool },
    /// No new spin (same id, or an already-ended entry).
    Miss { count: u32, degraded: bool },
    /// Shutdown was requested during an in-track wait.
    Interrupted,
}

pub struct Engine<'a, F, R> {
    feed: &'a F,
    reporter: &'a R,
    window: ScheduleWindow,
    tuning: Tuning,
    shutdown: Shutdown,
    last_seen_id: Option<u64>,
    miss_count: u32,
}

impl<'a, F: SpinFeed, R: TrackReporter> Engine<'a, F, R> {
    pub fn new(feed: &'a F, reporter: &'a R, window: ScheduleWindow, shutdown: Shutdown) -> Self {
        Self {
            feed,
            reporter,
            window,
            tuning: Tuning::default(),
            shutdown,
            last_seen_id: None,
            miss_count: 0,
        }
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Poll-act-sleep until shutdown is requested.
    pub fn run(&mut self) {
        while !self.shutdown.is_triggered() {
            let outcome = self.cycle(Utc::now());
            if outcome == CycleOutcome::Interrupted {
                break;
            }
            if !self.shutdown.sleep(self.pause_after(&outcome)) {
                break;
            }
        }
        info!("shutdown requested, stopping");
    }

    /// One poll iteration. Blocks for the track's remaining play time when a
    /// new track is being handled; all other pauses are the caller's, via
    /// `pause_after`.
    pub fn cycle(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        let spin = match self.feed.latest_spin() {
            Ok(spin) => spin,
            Err(err) => {
                warn!("spin fetch failed: {err}");
                let (_, degraded) = self.record_miss();
                return CycleOutcome::FetchFailed { degraded };
            }
        };
        let playlist = match self.feed.playlist(spin.playlist_id) {
            Ok(playlist) => playlist,
            Err(err) => {
                warn!("playlist {} fetch failed: {err}", spin.playlist_id);
                let (_, degraded) = self.record_miss();
                return CycleOutcome::FetchFailed { degraded };
            }
        };

        if !self.window.contains(now.hour()) {
            let wake_in = self.window.seconds_until_start(now);
            info!(
                "outside scheduled hours ({}:00-{}:00 UTC); sleeping {}s until {}:00 UTC",
                self.window.start_hour,
                self.window.end_hour,
                wake_in.as_secs(),
                self.window.start_hour
            );
            return CycleOutcome::AwaitWindow { wake_in };
        }

        if !self.window.contains(spin.start.hour()) {
            info!(
                "spin {} started at hour {} outside scheduled hours, not reporting",
                spin.id,
                spin.start.hour()
            );
            return CycleOutcome::SpinOutsideWindow;
        }

        let is_new = self.last_seen_id != Some(spin.id) && spin.end > now;
        if !is_new {
            let overdue = -spin.seconds_remaining_at(now);
            let (count, degraded) = self.record_miss();
            if degraded {
                info!(
                    "{count} polls since the last new spin ({overdue}s overdue); \
                     degrading poll rate"
                );
            }
            self.last_seen_id = Some(spin.id);
            return CycleOutcome::Miss { count, degraded };
        }

        if playlist.category.as_deref() == Some(self.tuning.excluded_category.as_str()) {
            info!(
                "skipping spin {} ({} - {}): playlist \"{}\" has category {}",
                spin.id,
                spin.song,
                spin.artist,
                playlist.title,
                self.tuning.excluded_category
            );
            let (_, degraded) = self.record_miss();
            self.last_seen_id = Some(spin.id);
            return CycleOutcome::SkippedCategory { degraded };
        }

        self.miss_count = 0;
        let outcome = self.report_track(&spin, now);
        if outcome != CycleOutcome::Interrupted {
            self.last_seen_id = Some(spin.id);
        }
        outcome
    }

    fn report_track(&self, spin: &Spin, now: DateTime<Utc>) -> CycleOutcome {
        info!("new spin: {} - {}", spin.song, spin.artist);
        let tags = TrackTags {
            artist: spin.artist.clone(),
            track: spin.song.clone(),
            album: spin.release.clone(),
            duration: Some(spin.duration),
        };

        match self.reporter.now_playing(&tags) {
            ReportOutcome::Success => info!("now playing updated, waiting for end of track"),
            outcome => warn!("now playing not accepted ({outcome:?}), continuing"),
        }

        let wait = (spin.end - now).to_std().unwrap_or_default();
        if spin.duration > self.tuning.min_scrobble_secs {
            if !self.shutdown.sleep(wait) {
                return CycleOutcome::Interrupted;
            }
            match self.reporter.scrobble(&tags, spin.end.timestamp()) {
                ReportOutcome::Success => info!("scrobbled {} - {}", spin.song, spin.artist),
                outcome => warn!("scrobble not accepted ({outcome:?})"),
            }
            CycleOutcome::Reported { scrobbled: true }
        } else {
            info!(
                "track length {}s is too short to scrobble, waiting {}s for the next spin",
                spin.duration,
                wait.as_secs()
            );
            if !self.shutdown.sleep(wait) {
                return CycleOutcome::Interrupted;
            }
            CycleOutcome::Reported { scrobbled: false }
        }
    }

    pub fn pause_after(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::AwaitWindow { wake_in } => *wake_in,
            CycleOutcome::SpinOutsideWindow => self.tuning.out_of_window_spin_pause,
            CycleOutcome::Reported { .. } => self.tuning.post_track_pause,
            CycleOutcome::Interrupted => Duration::ZERO,
            CycleOutcome::FetchFailed { degraded }
            | CycleOutcome::SkippedCategory { degraded }
            | CycleOutcome::Miss { degraded, .. } => {
                if *degraded {
                    self.tuning.miss_pause + self.tuning.degraded_pause
                } else {
                    self.tuning.miss_pause
                }
            }
        }
    }

    #[cfg(test)]
    pub fn last_seen_id(&self) -> Option<u64> {
        self.last_seen_id
    }

    fn record_miss(&mut self) -> (u32, bool) {
        self.miss_count += 1;
        (self.miss_count, self.miss_count > self.tuning.miss_threshold)
    }
}
