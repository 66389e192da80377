//! The detection loop controller.
//!
//! Each cycle runs Capturing → Matching → Acting and returns to Idle. A
//! capture failure ends the loop; matching and injection failures only end
//! the current cycle's work. The stop signal is honoured between cycles.

use std::fmt;
use tracing::{error, info, warn};

use crate::automation::input::{InjectionOutcome, Injector, MessageSink};
use crate::automation::scheduler::{Cadence, StopSignal};
use crate::capture::{FrameSource, WindowHandle};
use crate::config::{ActionKind, CoordinateSpace, GrabberConfig};
use crate::coords::CoordinateMapper;
use crate::detection::Detector;
use crate::error::{CaptureError, MatchError};
use crate::geometry::Point;

/// Controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Between cycles
    Idle,
    Capturing,
    Matching,
    /// Posting input for this cycle's detections
    Acting,
    /// Loop has exited
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Idle => write!(f, "Idle"),
            ControllerState::Capturing => write!(f, "Capturing"),
            ControllerState::Matching => write!(f, "Matching"),
            ControllerState::Acting => write!(f, "Acting"),
            ControllerState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Where and how to act on detections in one window.
#[derive(Clone, Debug, PartialEq)]
pub struct InjectionTarget {
    pub window: WindowHandle,
    /// Capture-local drag origin; `None` means the capture centre
    pub reference_point: Option<Point>,
    pub minimum_drag_distance: u32,
    pub step_count: u32,
    pub total_duration_ms: u64,
    pub action: ActionKind,
    pub coordinate_space: CoordinateSpace,
}

impl InjectionTarget {
    pub fn from_config(window: WindowHandle, config: &GrabberConfig) -> Self {
        Self {
            window,
            reference_point: config.reference_point,
            minimum_drag_distance: config.min_drag_distance,
            step_count: config.drag_steps,
            total_duration_ms: config.drag_duration_ms,
            action: config.action,
            coordinate_space: config.coordinate_space,
        }
    }
}

/// What one cycle did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    pub raw: usize,
    pub kept: usize,
    /// Injector calls made, one per kept detection
    pub actions: usize,
    /// Drags below the minimum distance
    pub skipped_actions: usize,
    pub partial_actions: usize,
    pub match_error: Option<MatchError>,
}

/// Why `Controller::run` returned.
#[derive(Debug)]
pub enum ExitReason {
    Stopped,
    TargetGone(CaptureError),
    /// The controller thread panicked
    Panicked,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Stopped => write!(f, "stopped"),
            ExitReason::TargetGone(e) => write!(f, "target gone: {}", e),
            ExitReason::Panicked => write!(f, "panicked"),
        }
    }
}

/// Drives capture, detection and input for one window.
pub struct Controller<F: FrameSource, S: MessageSink> {
    source: F,
    injector: Injector<S>,
    detector: Detector,
    target: InjectionTarget,
    state: ControllerState,
    cycles: u64,
}

impl<F: FrameSource, S: MessageSink> Controller<F, S> {
    pub fn new(
        source: F,
        injector: Injector<S>,
        detector: Detector,
        target: InjectionTarget,
    ) -> Self {
        Self {
            source,
            injector,
            detector,
            target,
            state: ControllerState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn injector(&self) -> &Injector<S> {
        &self.injector
    }

    /// Performs exactly one capture → match → act pass.
    ///
    /// Only a capture failure is returned as an error; the controller is
    /// then `Stopped`.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CaptureError> {
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            ..Default::default()
        };
        info!(window = %self.target.window, cycle = report.cycle, "Cycle started");

        self.state = ControllerState::Capturing;
        let capture = match self.source.capture() {
            Ok(capture) => capture,
            Err(e) => {
                self.state = ControllerState::Stopped;
                return Err(e);
            }
        };
        let mapper = CoordinateMapper::new(&capture.region, self.target.coordinate_space);
        let reference = mapper.reference_point(self.target.reference_point);

        self.state = ControllerState::Matching;
        let pass = match self.detector.detect(&capture.frame, reference) {
            Ok(pass) => pass,
            Err(e) => {
                warn!(
                    window = %self.target.window,
                    cycle = report.cycle,
                    error = %e,
                    "Matching skipped"
                );
                report.match_error = Some(e);
                self.state = ControllerState::Idle;
                return Ok(report);
            }
        };
        report.raw = pass.raw.len();
        report.kept = pass.kept.len();

        self.state = ControllerState::Acting;
        for position in pass.kept.positions() {
            let outcome = self.act(&mapper, reference, position);
            report.actions += 1;
            match outcome {
                InjectionOutcome::Skipped => report.skipped_actions += 1,
                InjectionOutcome::Partial { .. } => report.partial_actions += 1,
                InjectionOutcome::Completed { .. } => {}
            }
        }

        self.state = ControllerState::Idle;
        info!(
            window = %self.target.window,
            cycle = report.cycle,
            raw = report.raw,
            kept = report.kept,
            actions = report.actions,
            skipped = report.skipped_actions,
            partial = report.partial_actions,
            "Cycle finished"
        );
        Ok(report)
    }

    fn act(
        &mut self,
        mapper: &CoordinateMapper,
        reference: Point,
        position: Point,
    ) -> InjectionOutcome {
        let to = mapper.to_client(position);
        let screen = mapper.to_screen(position);
        let outcome = match self.target.action {
            ActionKind::Click => self.injector.click(to),
            ActionKind::Drag => self.injector.drag(
                mapper.to_client(reference),
                to,
                self.target.total_duration_ms,
                self.target.step_count,
                self.target.minimum_drag_distance,
            ),
        };
        match &outcome {
            InjectionOutcome::Partial {
                posted,
                expected,
                error,
            } => warn!(
                window = %self.target.window,
                action = ?self.target.action,
                %screen,
                posted,
                expected,
                error = %error,
                "Action interrupted"
            ),
            _ => info!(
                window = %self.target.window,
                action = ?self.target.action,
                %screen,
                client = %to,
                ?outcome,
                "Action"
            ),
        }
        outcome
    }

    /// Runs cycles on `cadence` until `stop` is raised or the target goes away.
    pub fn run(&mut self, stop: &StopSignal, cadence: &mut Cadence) -> ExitReason {
        info!(
            window = %self.target.window,
            period_ms = cadence.period().as_millis() as u64,
            "Controller started"
        );
        loop {
            cadence.wait(stop);
            if stop.is_stopped() {
                self.state = ControllerState::Stopped;
                info!(window = %self.target.window, cycles = self.cycles, "Controller stopped");
                return ExitReason::Stopped;
            }
            if let Err(e) = self.run_cycle() {
                error!(window = %self.target.window, cycle = self.cycles, error = %e, "Target lost");
                return ExitReason::TargetGone(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::input::WindowMessage;
    use crate::capture::{Capture, CaptureRegion, Frame};
    use crate::detection::pipeline::tests::{green_marker, scene_with_marker};
    use crate::detection::TemplateStore;
    use crate::error::InjectionError;
    use image::RgbaImage;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    const WINDOW: WindowHandle = WindowHandle(0x1000);

    /// Hands out queued captures, then reports the window gone.
    struct FakeSource {
        captures: VecDeque<Capture>,
        stop_on_capture: Option<StopSignal>,
    }

    impl FrameSource for FakeSource {
        fn capture(&mut self) -> Result<Capture, CaptureError> {
            if let Some(stop) = &self.stop_on_capture {
                stop.stop();
            }
            self.captures
                .pop_front()
                .ok_or(CaptureError::WindowGone(WINDOW))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        messages: Vec<WindowMessage>,
        broken: bool,
    }

    impl MessageSink for RecordingSink {
        fn post(&mut self, message: WindowMessage) -> Result<(), InjectionError> {
            if self.broken {
                return Err(InjectionError::Os("queue full".to_string()));
            }
            self.messages.push(message);
            Ok(())
        }
    }

    fn capture_at(frame: Frame, origin: Point, dpi: f32) -> Capture {
        let region =
            CaptureRegion::new(origin, frame.width(), frame.height(), Point::new(0, 0), dpi).unwrap();
        Capture { region, frame }
    }

    fn scene() -> (Frame, TemplateStore) {
        let (marker, gray) = green_marker(16, 9);
        let frame = scene_with_marker(200, 150, &marker, 140, 20);
        (frame, TemplateStore::from_image(gray, &[1.0]).unwrap())
    }

    fn config(action: ActionKind, space: CoordinateSpace) -> GrabberConfig {
        GrabberConfig {
            action,
            coordinate_space: space,
            drag_steps: 4,
            drag_duration_ms: 4,
            click_hold_ms: 1,
            ..Default::default()
        }
    }

    fn controller(
        captures: Vec<Capture>,
        templates: TemplateStore,
        config: &GrabberConfig,
        sink: RecordingSink,
    ) -> Controller<FakeSource, RecordingSink> {
        let source = FakeSource {
            captures: captures.into(),
            stop_on_capture: None,
        };
        let detector = Detector::new(config, Arc::new(templates)).unwrap();
        Controller::new(
            source,
            Injector::new(sink, config.click_hold_ms),
            detector,
            InjectionTarget::from_config(WINDOW, config),
        )
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", ControllerState::Idle), "Idle");
        assert_eq!(format!("{}", ControllerState::Matching), "Matching");
        assert_eq!(format!("{}", ControllerState::Stopped), "Stopped");
    }

    #[test]
    fn test_cycle_drags_from_centre_to_marker() {
        let (frame, templates) = scene();
        let config = config(ActionKind::Drag, CoordinateSpace::Physical);
        let capture = capture_at(frame, Point::new(1000, 500), 1.0);
        let mut controller = controller(vec![capture], templates, &config, RecordingSink::default());

        let report = controller.run_cycle().unwrap();
        assert_eq!(
            report,
            CycleReport {
                cycle: 1,
                raw: 1,
                kept: 1,
                actions: 1,
                ..Default::default()
            }
        );
        assert_eq!(controller.state(), ControllerState::Idle);

        // Client coordinates: unaffected by the window's screen origin
        let messages = &controller.injector().sink().messages;
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0], WindowMessage::ButtonDown(Point::new(100, 75)));
        assert_eq!(messages[5], WindowMessage::ButtonUp(Point::new(148, 28)));
    }

    #[test]
    fn test_click_in_logical_space() {
        let (frame, templates) = scene();
        let config = config(ActionKind::Click, CoordinateSpace::Logical);
        let capture = capture_at(frame, Point::new(0, 0), 2.0);
        let mut controller = controller(vec![capture], templates, &config, RecordingSink::default());

        controller.run_cycle().unwrap();
        assert_eq!(
            controller.injector().sink().messages,
            vec![
                WindowMessage::ButtonDown(Point::new(74, 14)),
                WindowMessage::ButtonUp(Point::new(74, 14)),
            ]
        );
    }

    #[test]
    fn test_logical_drag_distance_uses_posted_points() {
        let (frame, templates) = scene();
        let config = GrabberConfig {
            // 8 capture pixels from the marker at (148, 28), outside the radius
            reference_point: Some(Point::new(140, 28)),
            exclusion_radius: 5,
            min_drag_distance: 6,
            ..config(ActionKind::Drag, CoordinateSpace::Logical)
        };
        let capture = capture_at(frame, Point::new(0, 0), 2.0);
        let mut controller = controller(vec![capture], templates, &config, RecordingSink::default());

        // Posted drag is (70, 14) -> (74, 14): 4 logical pixels, under the minimum
        let report = controller.run_cycle().unwrap();
        assert_eq!((report.kept, report.actions, report.skipped_actions), (1, 1, 1));
        assert!(controller.injector().sink().messages.is_empty());
    }

    #[test]
    fn test_nothing_found_posts_nothing() {
        let (_, templates) = scene();
        let config = config(ActionKind::Drag, CoordinateSpace::Physical);
        let empty = Frame::new(RgbaImage::from_pixel(200, 150, image::Rgba([10, 10, 10, 255])));
        let capture = capture_at(empty, Point::new(0, 0), 1.0);
        let mut controller = controller(vec![capture], templates, &config, RecordingSink::default());

        let report = controller.run_cycle().unwrap();
        assert_eq!((report.raw, report.kept, report.actions), (0, 0, 0));
        assert!(controller.injector().sink().messages.is_empty());
    }

    #[test]
    fn test_capture_failure_ends_run() {
        let (_, templates) = scene();
        let config = config(ActionKind::Drag, CoordinateSpace::Physical);
        let mut controller = controller(vec![], templates, &config, RecordingSink::default());

        let reason = controller.run(&StopSignal::new(), &mut Cadence::new(Duration::from_millis(1)));
        assert!(matches!(
            reason,
            ExitReason::TargetGone(CaptureError::WindowGone(WINDOW))
        ));
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert_eq!(controller.cycles(), 1);
    }

    #[test]
    fn test_match_error_does_not_stop_loop() {
        let (frame, templates) = scene();
        let config = config(ActionKind::Drag, CoordinateSpace::Physical);
        let tiny = Frame::new(RgbaImage::from_pixel(8, 8, image::Rgba([0, 200, 0, 255])));
        let captures = vec![
            capture_at(tiny, Point::new(0, 0), 1.0),
            capture_at(frame, Point::new(0, 0), 1.0),
        ];
        let mut controller = controller(captures, templates, &config, RecordingSink::default());

        let first = controller.run_cycle().unwrap();
        assert!(matches!(
            first.match_error,
            Some(MatchError::TemplateTooLarge { .. })
        ));
        assert_eq!(first.actions, 0);

        let reason = controller.run(&StopSignal::new(), &mut Cadence::new(Duration::from_millis(1)));
        assert!(matches!(reason, ExitReason::TargetGone(_)));
        assert_eq!(controller.cycles(), 3);
        assert_eq!(controller.injector().sink().messages.len(), 6);
    }

    #[test]
    fn test_partial_injection_continues_cycle() {
        let (frame, templates) = scene();
        let config = config(ActionKind::Drag, CoordinateSpace::Physical);
        let sink = RecordingSink {
            broken: true,
            ..Default::default()
        };
        let capture = capture_at(frame, Point::new(0, 0), 1.0);
        let mut controller = controller(vec![capture], templates, &config, sink);

        let report = controller.run_cycle().unwrap();
        assert_eq!(report.actions, 1);
        assert_eq!(report.partial_actions, 1);
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_stop_takes_effect_at_cycle_boundary() {
        let (frame, templates) = scene();
        let config = config(ActionKind::Drag, CoordinateSpace::Physical);
        let stop = StopSignal::new();
        let mut controller = controller(
            vec![capture_at(frame, Point::new(0, 0), 1.0)],
            templates,
            &config,
            RecordingSink::default(),
        );
        // Raised mid-cycle, during capture
        controller.source.stop_on_capture = Some(stop.clone());

        let reason = controller.run(&stop, &mut Cadence::new(Duration::from_secs(60)));
        assert!(matches!(reason, ExitReason::Stopped));
        assert_eq!(controller.cycles(), 1);
        // The interrupted cycle still finished its gesture
        assert_eq!(controller.injector().sink().messages.len(), 6);
        assert_eq!(controller.state(), ControllerState::Stopped);
    }

    #[test]
    fn test_stopped_before_first_cycle() {
        let (_, templates) = scene();
        let config = config(ActionKind::Drag, CoordinateSpace::Physical);
        let stop = StopSignal::new();
        stop.stop();
        let mut controller = controller(vec![], templates, &config, RecordingSink::default());

        let reason = controller.run(&stop, &mut Cadence::new(Duration::from_millis(1)));
        assert!(matches!(reason, ExitReason::Stopped));
        assert_eq!(controller.cycles(), 0);
    }
}
