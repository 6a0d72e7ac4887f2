//! Read-out controller: fetch a feed, speak its entries, stop on button press.
//!
//! # Architecture
//!
//! One call to [`ReadFeed::run`] is one read-out:
//!
//! 1. The feed is fetched (awaited before anything else starts).
//! 2. Preconditions are checked; failures are spoken and logged.
//! 3. A fresh [`CancellationSignal`] is created and two detached threads start:
//!    - [`SpeechReader`] speaks entries and sets the signal when done
//!    - [`ButtonListener`] polls the stop button and sets the signal on press
//! 4. The controller polls the signal until it is set, then returns.
//!
//! The signal is the only state the threads share. Neither thread is joined;
//! the listener exits by itself within one poll interval of the signal being
//! set, and a speech callback that is mid-utterance finishes on its own.

mod button;
mod signal;
mod speech;

pub use button::{
    ButtonListener, GpioError, InputPin, ListenerExit, PinLevel, SysfsPin, Unconnected,
    DEFAULT_POLL_INTERVAL, SYSFS_GPIO_ROOT,
};
pub use signal::CancellationSignal;
pub use speech::{assemble_message, SpeakFn, SpeechReader};

use crate::feed::{FeedFetcher, FetchError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Spoken when the feed could not be fetched or has no entries.
pub const FEED_UNAVAILABLE_MESSAGE: &str = "Cannot get the feed";
/// Spoken when no properties were configured.
pub const NO_PROPERTIES_MESSAGE: &str = "No properties";

/// Default interval at which the controller checks the signal.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(100);

/// How a read-out ended.
///
/// Only informational: every outcome has already been reported to the user
/// through the speak callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Entries were read until the end or until the button was pressed.
    Finished,
    /// The feed was unreachable, unparseable or empty.
    FeedUnavailable,
    /// The property list was empty.
    NoProperties,
}

/// Polling intervals for one read-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderTiming {
    /// Controller wait loop; bounds the delay between cancellation and `run` returning.
    pub wait_interval: Duration,
    /// Pause between two reads of the button pin.
    pub button_interval: Duration,
}

impl Default for ReaderTiming {
    fn default() -> Self {
        Self {
            wait_interval: DEFAULT_WAIT_INTERVAL,
            button_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Per-invocation state, dropped when `run` returns.
struct RunContext {
    url: String,
    requested: usize,
    signal: CancellationSignal,
    speech: Option<JoinHandle<usize>>,
    button: Option<JoinHandle<ListenerExit>>,
}

/// Reads a feed aloud.
///
/// Configured once with a speak callback, a feed URL, an entry count and the
/// properties to speak; [`run`](ReadFeed::run) can then be called any number
/// of times, each call being independent of the previous ones.
pub struct ReadFeed {
    say: Option<SpeakFn>,
    url: String,
    count: usize,
    properties: Arc<[String]>,
    fetcher: FeedFetcher,
    button: Arc<dyn InputPin>,
    timing: ReaderTiming,
}

impl ReadFeed {
    pub fn new(
        say: Option<SpeakFn>,
        url: impl Into<String>,
        count: usize,
        properties: Vec<String>,
    ) -> Self {
        Self {
            say,
            url: url.into(),
            count,
            properties: properties.into(),
            fetcher: FeedFetcher::default(),
            button: Arc::new(Unconnected),
            timing: ReaderTiming::default(),
        }
    }

    pub fn with_button(mut self, pin: Arc<dyn InputPin>) -> Self {
        self.button = pin;
        self
    }

    pub fn with_fetcher(mut self, fetcher: FeedFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_timing(mut self, timing: ReaderTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Perform one read-out.
    ///
    /// Never fails: an unavailable feed or an empty property list is spoken
    /// through the callback and reported as a [`RunOutcome`]. Returns within
    /// one wait interval of the signal being set.
    pub async fn run(&self) -> RunOutcome {
        let entries = match self.fetcher.fetch(&self.url, self.count).await {
            Ok(entries) => entries,
            Err(e) => {
                match &e {
                    FetchError::EmptyFeed => {}
                    cause => tracing::warn!(feed = %self.url, error = %cause, "Feed fetch failed"),
                }
                self.report(FEED_UNAVAILABLE_MESSAGE);
                return RunOutcome::FeedUnavailable;
            }
        };

        if self.properties.is_empty() {
            self.report(NO_PROPERTIES_MESSAGE);
            return RunOutcome::NoProperties;
        }

        let mut ctx = RunContext {
            url: self.url.clone(),
            requested: self.count,
            signal: CancellationSignal::new(),
            speech: None,
            button: None,
        };

        tracing::info!(
            feed = %ctx.url,
            requested = ctx.requested,
            entries = entries.len(),
            "Starting read-out"
        );

        ctx.button = ButtonListener::new(self.button.clone(), ctx.signal.clone())
            .with_poll_interval(self.timing.button_interval)
            .spawn()
            .map_err(|e| tracing::warn!(error = %e, "Failed to start button listener"))
            .ok();

        ctx.speech = SpeechReader::new(
            entries,
            self.properties.clone(),
            self.say.clone(),
            ctx.signal.clone(),
        )
        .spawn()
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to start speech reader");
            // Nothing will ever set the signal otherwise
            ctx.signal.cancel();
        })
        .ok();

        self.wait_for(&ctx).await;

        tracing::info!(
            feed = %ctx.url,
            speech_running = ctx.speech.as_ref().is_some_and(|h| !h.is_finished()),
            button_running = ctx.button.as_ref().is_some_and(|h| !h.is_finished()),
            "Read-out finished"
        );

        RunOutcome::Finished
    }

    /// Poll until the signal is set or the speech thread has exited.
    async fn wait_for(&self, ctx: &RunContext) {
        // interval() panics on a zero period
        let period = self.timing.wait_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if ctx.signal.is_cancelled() {
                break;
            }
            if ctx.speech.as_ref().is_some_and(|h| h.is_finished()) {
                if ctx.signal.cancel() {
                    tracing::warn!("Speech reader exited without setting the signal");
                }
                break;
            }
            ticker.tick().await;
        }
    }

    fn report(&self, message: &str) {
        if let Some(say) = &self.say {
            say(message);
        }
        tracing::info!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let timing = ReaderTiming::default();
        assert_eq!(timing.wait_interval, Duration::from_millis(100));
        assert_eq!(timing.button_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_new_keeps_configuration() {
        let reader = ReadFeed::new(
            None,
            "http://feeds.bbci.co.uk/news/rss.xml?edition=uk#",
            4,
            vec!["title".into(), "summary".into()],
        );
        assert_eq!(reader.url(), "http://feeds.bbci.co.uk/news/rss.xml?edition=uk#");
        assert_eq!(reader.properties().to_vec(), vec!["title".to_string(), "summary".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_url_reports_unavailable() {
        let spoken = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = spoken.clone();
        let say: SpeakFn = Arc::new(move |text: &str| sink.lock().unwrap().push(text.to_string()));

        let reader = ReadFeed::new(Some(say), "file:///etc/passwd", 1, vec!["title".into()]);
        assert_eq!(reader.run().await, RunOutcome::FeedUnavailable);
        assert_eq!(*spoken.lock().unwrap(), vec![FEED_UNAVAILABLE_MESSAGE]);
    }
}
