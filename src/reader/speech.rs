use crate::feed::FeedEntry;
use crate::reader::signal::CancellationSignal;
use crate::util::replace_line_breaks;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Caller-supplied speech output. Receives one assembled line per entry.
pub type SpeakFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Separator between two properties of the same entry.
const PROPERTY_SEPARATOR: &str = ", ";

/// Builds the spoken line for one entry.
///
/// Properties are taken in the given order; those the entry lacks are
/// skipped. Each value has its `<br>` tags turned into newlines. An entry
/// with none of the properties yields an empty string.
pub fn assemble_message(entry: &FeedEntry, properties: &[String]) -> String {
    let mut message = String::new();

    for value in properties.iter().filter_map(|p| entry.get(p)) {
        if !message.is_empty() {
            message.push_str(PROPERTY_SEPARATOR);
        }
        message.push_str(&replace_line_breaks(value));
    }

    message
}

/// Sets the signal when dropped, including while unwinding.
struct CancelOnDrop<'a>(&'a CancellationSignal);

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Speaks a list of entries, stopping early when the signal is set.
///
/// The signal is checked before starting, before each entry, after building
/// its message and after speaking it. A press that lands while the callback is
/// running is only seen at the next check, so at most one more line can be
/// spoken after the button goes down.
pub struct SpeechReader {
    entries: Vec<FeedEntry>,
    properties: Arc<[String]>,
    say: Option<SpeakFn>,
    signal: CancellationSignal,
}

impl SpeechReader {
    pub fn new(
        entries: Vec<FeedEntry>,
        properties: Arc<[String]>,
        say: Option<SpeakFn>,
        signal: CancellationSignal,
    ) -> Self {
        Self {
            entries,
            properties,
            say,
            signal,
        }
    }

    /// Start reading on a detached background thread.
    pub fn spawn(self) -> io::Result<JoinHandle<usize>> {
        thread::Builder::new()
            .name("speech-reader".into())
            .spawn(move || self.read_all())
    }

    /// Read every entry unless cancelled, then set the signal.
    ///
    /// Returns the number of lines handed to the speak callback (or that
    /// would have been, when there is none). The signal is set even if the
    /// callback panics.
    pub fn read_all(&self) -> usize {
        let _guard = CancelOnDrop(&self.signal);
        self.speak_entries()
    }

    fn speak_entries(&self) -> usize {
        let mut spoken = 0;

        if self.cancelled() {
            return spoken;
        }

        for entry in &self.entries {
            if self.cancelled() {
                break;
            }

            let message = assemble_message(entry, &self.properties);

            if self.cancelled() {
                break;
            }

            if !message.is_empty() {
                tracing::debug!(message = %message, "Speaking entry");
            }
            if let Some(say) = &self.say {
                say(&message);
            }
            spoken += 1;

            if self.cancelled() {
                break;
            }
        }

        spoken
    }

    fn cancelled(&self) -> bool {
        let cancelled = self.signal.is_cancelled();
        if cancelled {
            tracing::info!("Cancel speech detected");
        }
        cancelled
    }
}
