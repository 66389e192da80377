//! Session runner: one controller thread per target window.
//!
//! All controllers share one template store and one stop signal. Each
//! thread builds its own frame source and message sink, since capture
//! devices are tied to the thread that created them.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

use crate::automation::input::{Injector, MessageSink};
use crate::automation::scheduler::{Cadence, StopSignal};
use crate::automation::state::{Controller, ExitReason, InjectionTarget};
use crate::capture::{FrameSource, WindowHandle};
use crate::config::GrabberConfig;
use crate::detection::{Detector, TemplateStore};
use crate::error::{CaptureError, ConfigError};

/// Running controllers.
pub struct Session {
    stop: StopSignal,
    workers: Vec<(WindowHandle, JoinHandle<ExitReason>)>,
}

impl Session {
    /// Spawns a controller for every handle in `targets`.
    ///
    /// `connect` runs on the controller's own thread and opens its source
    /// and sink; an error there ends that controller as `TargetGone`.
    pub fn start<C, F, S>(
        config: &GrabberConfig,
        templates: Arc<TemplateStore>,
        targets: &[WindowHandle],
        connect: C,
    ) -> Result<Self>
    where
        C: Fn(WindowHandle) -> Result<(F, S), CaptureError> + Send + Sync + 'static,
        F: FrameSource + 'static,
        S: MessageSink + 'static,
    {
        let mut seen = HashSet::new();
        for &handle in targets {
            if !seen.insert(handle) {
                return Err(ConfigError::DuplicateTarget(handle).into());
            }
        }

        let detector = Detector::new(config, templates)?;
        let connect = Arc::new(connect);
        let stop = StopSignal::new();
        let period = Duration::from_millis(config.cadence_ms);
        let mut session = Session {
            stop: stop.clone(),
            workers: Vec::with_capacity(targets.len()),
        };

        for &handle in targets {
            let detector = detector.clone();
            let target = InjectionTarget::from_config(handle, config);
            let click_hold_ms = config.click_hold_ms;
            let connect = Arc::clone(&connect);
            let stop = stop.clone();

            let spawned = thread::Builder::new()
                .name(format!("controller-{}", handle))
                .spawn(move || {
                    let (source, sink) = match connect(handle) {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!(window = %handle, error = %e, "Could not attach to window");
                            return ExitReason::TargetGone(e);
                        }
                    };
                    let injector = Injector::new(sink, click_hold_ms);
                    let mut controller = Controller::new(source, injector, detector, target);
                    controller.run(&stop, &mut Cadence::new(period))
                })
                .with_context(|| format!("Failed to spawn controller for window {}", handle));

            match spawned {
                Ok(worker) => session.workers.push((handle, worker)),
                Err(e) => {
                    // Don't leave already started controllers running
                    session.stop();
                    session.join();
                    return Err(e);
                }
            }
        }

        info!(controllers = session.workers.len(), "Session started");
        Ok(session)
    }

    /// Signal every controller to stop at its next cycle boundary.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Windows being driven, in start order.
    pub fn targets(&self) -> Vec<WindowHandle> {
        self.workers.iter().map(|(handle, _)| *handle).collect()
    }

    /// True once every controller has returned.
    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|(_, worker)| worker.is_finished())
    }

    /// Waits for every controller and reports why each one exited.
    pub fn join(self) -> Vec<(WindowHandle, ExitReason)> {
        let mut reasons = Vec::with_capacity(self.workers.len());
        for (handle, worker) in self.workers {
            let reason = match worker.join() {
                Ok(reason) => reason,
                Err(_) => {
                    error!(window = %handle, "Controller thread panicked");
                    ExitReason::Panicked
                }
            };
            info!(window = %handle, %reason, "Controller finished");
            reasons.push((handle, reason));
        }
        reasons
    }
}

/// Starts controllers for every `Slave` window found for the configured
/// process, capturing with Graphics Capture and posting with PostMessage.
#[cfg(windows)]
pub fn start_window_session(
    config: &GrabberConfig,
    assigned: &[(crate::capture::WindowInfo, crate::capture::WindowRole)],
) -> Result<Session> {
    use crate::automation::input::PostMessageSink;
    use crate::capture::{WindowCapturer, WindowRole};

    let targets: Vec<WindowHandle> = assigned
        .iter()
        .filter(|(_, role)| *role == WindowRole::Slave)
        .map(|(info, _)| info.handle)
        .collect();
    if targets.is_empty() {
        anyhow::bail!(
            "No window has the slave role (found {} window(s) of {})",
            assigned.len(),
            config.window.process_name
        );
    }

    let template_path = crate::paths::resolve(&config.template_path);
    let templates = Arc::new(TemplateStore::load(&template_path, &config.scales)?);
    let timeout_ms = config.capture_timeout_ms;

    Session::start(config, templates, &targets, move |handle| {
        let capturer = WindowCapturer::new(handle, timeout_ms)?;
        Ok((capturer, PostMessageSink::new(handle)))
    })
}
