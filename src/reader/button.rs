//! Physical stop button.
//!
//! A [`ButtonListener`] polls an [`InputPin`] on its own thread and sets the
//! read-out's [`CancellationSignal`] when the pin is pulled low. It stops on
//! its own as soon as the signal is set by anyone, so it never needs joining.

use crate::reader::signal::CancellationSignal;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Default sysfs GPIO location on Linux.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Default pause between two pin reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Attempts to configure a freshly exported pin before giving up.
const EXPORT_ATTEMPTS: u32 = 20;

/// Pause between those attempts. udev sets the attribute permissions
/// asynchronously after an export.
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("GPIO I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("GPIO {pin} is not available under {root}")]
    NotExported { pin: u32, root: String },

    #[error("Unexpected GPIO value: {0:?}")]
    InvalidValue(String),
}

/// Logic level read from an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

/// A digital input line. The button counts as pressed when it reads [`PinLevel::Low`].
pub trait InputPin: Send + Sync {
    fn read(&self) -> Result<PinLevel, GpioError>;
}

/// Stand-in for a board without a button: always reads high.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconnected;

impl InputPin for Unconnected {
    fn read(&self) -> Result<PinLevel, GpioError> {
        Ok(PinLevel::High)
    }
}

/// Input pin backed by the Linux sysfs GPIO interface.
#[derive(Debug, Clone)]
pub struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `pin` and configure it as an input.
    ///
    /// `pin` is the kernel's sysfs GPIO number. On older Raspberry Pi kernels
    /// this equals the BCM number; newer ones add the gpiochip base (see
    /// `/sys/class/gpio/gpiochip*/base`), so BCM 23 may be `512 + 23`.
    pub fn open(pin: u32) -> Result<Self, GpioError> {
        Self::open_in(Path::new(SYSFS_GPIO_ROOT), pin)
    }

    /// Same as [`SysfsPin::open`] with an explicit sysfs root.
    pub fn open_in(root: &Path, pin: u32) -> Result<Self, GpioError> {
        let pin_dir = root.join(format!("gpio{pin}"));

        if pin_dir.is_dir() {
            fs::write(pin_dir.join("direction"), "in")?;
        } else {
            tracing::debug!(pin = pin, root = %root.display(), "Exporting GPIO pin");
            fs::write(root.join("export"), pin.to_string())?;
            Self::set_input_after_export(root, &pin_dir, pin)?;
        }

        Ok(Self {
            pin,
            value_path: pin_dir.join("value"),
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// The pin directory and its writable `direction` file show up some time
    /// after the export write returns.
    fn set_input_after_export(root: &Path, pin_dir: &Path, pin: u32) -> Result<(), GpioError> {
        let direction = pin_dir.join("direction");

        for attempt in 1..=EXPORT_ATTEMPTS {
            if pin_dir.is_dir() {
                match fs::write(&direction, "in") {
                    Ok(()) => return Ok(()),
                    Err(e)
                        if attempt < EXPORT_ATTEMPTS
                            && matches!(
                                e.kind(),
                                io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
                            ) =>
                    {
                        tracing::trace!(pin = pin, attempt = attempt, "GPIO direction not writable yet");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            thread::sleep(EXPORT_RETRY_DELAY);
        }

        Err(GpioError::NotExported {
            pin,
            root: root.display().to_string(),
        })
    }
}

impl InputPin for SysfsPin {
    fn read(&self) -> Result<PinLevel, GpioError> {
        let raw = fs::read_to_string(&self.value_path)?;
        match raw.trim() {
            "0" => Ok(PinLevel::Low),
            "1" => Ok(PinLevel::High),
            other => Err(GpioError::InvalidValue(other.to_string())),
        }
    }
}

/// Why a listener stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// The pin read low and the listener set the signal.
    Pressed,
    /// Someone else set the signal first.
    AlreadyCancelled,
}

/// Polls a pin until it reads low or the signal is set elsewhere.
pub struct ButtonListener {
    pin: Arc<dyn InputPin>,
    signal: CancellationSignal,
    poll_interval: Duration,
}

impl ButtonListener {
    pub fn new(pin: Arc<dyn InputPin>, signal: CancellationSignal) -> Self {
        Self {
            pin,
            signal,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Pause between reads. Zero yields the thread instead of sleeping.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start listening on a detached background thread.
    ///
    /// The handle may be dropped: the thread exits within one poll interval
    /// once the signal is set.
    pub fn spawn(self) -> io::Result<JoinHandle<ListenerExit>> {
        thread::Builder::new()
            .name("button-listener".into())
            .spawn(move || self.listen())
    }

    /// Poll until pressed or cancelled. Blocks the calling thread.
    pub fn listen(&self) -> ListenerExit {
        let mut read_failed = false;

        while !self.signal.is_cancelled() {
            match self.pin.read() {
                Ok(PinLevel::Low) => {
                    if self.signal.cancel() {
                        tracing::info!("Button pressed, cancelling speech");
                    }
                    return ListenerExit::Pressed;
                }
                Ok(PinLevel::High) => {}
                Err(e) => {
                    // Treated as released; warn once rather than every poll
                    if !read_failed {
                        tracing::warn!(error = %e, "Failed to read button pin");
                        read_failed = true;
                    }
                }
            }

            if self.poll_interval.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(self.poll_interval);
            }
        }

        ListenerExit::AlreadyCancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Reads high until `low_after` reads have happened.
    struct ScriptedPin {
        reads: AtomicUsize,
        low_after: usize,
    }

    impl ScriptedPin {
        fn low_after(low_after: usize) -> Arc<Self> {
            Arc::new(Self {
                reads: AtomicUsize::new(0),
                low_after,
            })
        }
    }

    impl InputPin for ScriptedPin {
        fn read(&self) -> Result<PinLevel, GpioError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if n >= self.low_after {
                Ok(PinLevel::Low)
            } else {
                Ok(PinLevel::High)
            }
        }
    }

    struct BrokenPin;

    impl InputPin for BrokenPin {
        fn read(&self) -> Result<PinLevel, GpioError> {
            Err(GpioError::InvalidValue("x".into()))
        }
    }

    fn temp_gpio_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("feedvoice_gpio_test_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_press_sets_signal() {
        let signal = CancellationSignal::new();
        let listener = ButtonListener::new(ScriptedPin::low_after(3), signal.clone())
            .with_poll_interval(Duration::from_millis(1));

        assert_eq!(listener.listen(), ListenerExit::Pressed);
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_already_cancelled_stops_without_reading() {
        let signal = CancellationSignal::new();
        signal.cancel();
        let pin = ScriptedPin::low_after(0);
        let listener = ButtonListener::new(pin.clone(), signal);

        assert_eq!(listener.listen(), ListenerExit::AlreadyCancelled);
        assert_eq!(pin.reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_spawned_listener_exits_when_signal_set_elsewhere() {
        let signal = CancellationSignal::new();
        let handle = ButtonListener::new(Arc::new(Unconnected), signal.clone())
            .with_poll_interval(Duration::from_millis(1))
            .spawn()
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        signal.cancel();
        assert_eq!(handle.join().unwrap(), ListenerExit::AlreadyCancelled);
    }

    #[test]
    fn test_zero_interval_spins() {
        let signal = CancellationSignal::new();
        let listener = ButtonListener::new(ScriptedPin::low_after(1000), signal.clone())
            .with_poll_interval(Duration::ZERO);

        let started = Instant::now();
        assert_eq!(listener.listen(), ListenerExit::Pressed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_read_errors_keep_polling() {
        let signal = CancellationSignal::new();
        let handle = ButtonListener::new(Arc::new(BrokenPin), signal.clone())
            .with_poll_interval(Duration::from_millis(1))
            .spawn()
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(!signal.is_cancelled());
        signal.cancel();
        assert_eq!(handle.join().unwrap(), ListenerExit::AlreadyCancelled);
    }

    #[test]
    fn test_sysfs_pin_reads_levels() {
        let root = temp_gpio_root("levels");
        let pin_dir = root.join("gpio23");
        fs::create_dir_all(&pin_dir).unwrap();
        fs::write(pin_dir.join("value"), "1\n").unwrap();

        let pin = SysfsPin::open_in(&root, 23).unwrap();
        assert_eq!(pin.pin(), 23);
        assert_eq!(fs::read_to_string(pin_dir.join("direction")).unwrap(), "in");
        assert_eq!(pin.read().unwrap(), PinLevel::High);

        fs::write(pin_dir.join("value"), "0\n").unwrap();
        assert_eq!(pin.read().unwrap(), PinLevel::Low);

        fs::write(pin_dir.join("value"), "?\n").unwrap();
        assert!(matches!(pin.read(), Err(GpioError::InvalidValue(_))));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_sysfs_pin_export_requested_when_missing() {
        let root = temp_gpio_root("export");

        let result = SysfsPin::open_in(&root, 17);
        assert!(matches!(result, Err(GpioError::NotExported { pin: 17, .. })));
        assert_eq!(fs::read_to_string(root.join("export")).unwrap(), "17");

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_sysfs_pin_waits_for_slow_export() {
        let root = temp_gpio_root("slow_export");
        let pin_dir = root.join("gpio535");

        // The kernel creates the pin directory a little after the export write
        let creator = {
            let root = root.clone();
            let pin_dir = pin_dir.clone();
            thread::spawn(move || {
                while !root.join("export").exists() {
                    thread::sleep(Duration::from_millis(5));
                }
                thread::sleep(Duration::from_millis(120));
                fs::create_dir_all(&pin_dir).unwrap();
                fs::write(pin_dir.join("value"), "0\n").unwrap();
            })
        };

        let pin = SysfsPin::open_in(&root, 535).unwrap();
        creator.join().unwrap();

        assert_eq!(fs::read_to_string(root.join("export")).unwrap(), "535");
        assert_eq!(fs::read_to_string(pin_dir.join("direction")).unwrap(), "in");
        assert_eq!(pin.read().unwrap(), PinLevel::Low);

        fs::remove_dir_all(&root).ok();
    }
}
