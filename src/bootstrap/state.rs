//! The client loader as an explicit state machine.
//!
//! [`Loader::handle`] is the transition function: it takes one event,
//! moves to the next state and returns the side effects the page must
//! perform. The inline script emitted by [`super::loader`] implements the
//! same states, events and effects in JavaScript; this model is what the
//! tests exercise.

use crate::config::PresentationConfig;
use crate::encoder::VIRTUAL_ROOT;

/// Progress events with a known total that are ignored before the bar is drawn.
pub const PROGRESS_SKIP_EVENTS: u32 = 5;
/// Full width of the progress bar in pixels.
pub const PROGRESS_BAR_WIDTH: f64 = 300.0;
/// Delay of the yields between loader phases.
pub const TICK_MS: u32 = 50;

pub const MSG_PLAY: &str = "Click to Play";
pub const MSG_LOAD: &str = "Downloading Game...";
pub const MSG_PARSE: &str = "Preparing Game...";
pub const MSG_EXECUTE: &str = "Starting Game...";
pub const MSG_DOWNLOAD_ERROR: &str =
    "Error while downloading game data.\nCheck your internet connection.";
pub const MSG_NO_WEBGL: &str = "Your browser does not support <a href=\"http://khronos.org/webgl/wiki/Getting_a_WebGL_Implementation\">WebGL</a>.<br>Find out how to get it <a href=\"http://get.webgl.org/\">here</a>.";
pub const MSG_RUNTIME_ERROR: &str = "The game stopped because of an error.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Downloading,
    Preparing,
    Executing,
    Running,
    Failed(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Transport error or non-200 status. The user may click to retry.
    Delivery { status: Option<String> },
    /// The runtime exited right after its entry point ran.
    Capability,
    /// An error escaped to the global error hook.
    Runtime { detail: String },
}

impl LoaderState {
    /// Names shared with the emitted script (`S.*` values).
    pub const NAMES: [&'static str; 6] = [
        "idle",
        "downloading",
        "preparing",
        "executing",
        "running",
        "failed",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => Self::NAMES[0],
            Self::Downloading => Self::NAMES[1],
            Self::Preparing => Self::NAMES[2],
            Self::Executing => Self::NAMES[3],
            Self::Running => Self::NAMES[4],
            Self::Failed(_) => Self::NAMES[5],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Running | Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent {
    Click,
    /// XHR progress; `total` is `None` when the length is not computable.
    Progress { loaded: u64, total: Option<u64> },
    /// `onerror` / `onabort` on the request.
    TransportError,
    /// `onload`, with the HTTP status.
    Loaded { status: u16, status_text: String },
    /// A deferred tick scheduled by [`Effect::Defer`] fired.
    Tick,
    /// The runtime called its `preInit` hook.
    RuntimeReady,
    /// The runtime called `postRun`; `still_running` mirrors `noExitRuntime`.
    PostRun { still_running: bool },
    /// `window.onerror` fired.
    RuntimeError {
        message: String,
        source: Option<String>,
        line: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBar {
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetClickable(bool),
    ScrollIntoView,
    ShowMessage(String),
    DrawProgress(ProgressBar),
    StartFetch { url: String },
    Defer { ms: u32 },
    InstallErrorHook,
    ConfigureRuntime { memory_bytes: u64, stack_bytes: u64 },
    InjectScript,
    /// Hand the runtime a cloned canvas and stub out `setWindowTitle`.
    AttachCanvas,
    InvokeEntry { args: Vec<String> },
    SwapCanvas,
    ReleaseReferences,
    ShowOverlay(String),
}

/// One play session on one page.
#[derive(Debug, Clone)]
pub struct Loader {
    state: LoaderState,
    clickable: bool,
    progress_events: u32,
    bundle_url: String,
    canvas: (u32, u32),
    memory_bytes: u64,
    stack_bytes: u64,
}

impl Loader {
    pub fn new(config: &PresentationConfig) -> Self {
        Self {
            state: LoaderState::Idle,
            clickable: true,
            progress_events: 0,
            bundle_url: config.bundle_file(),
            canvas: (config.width, config.height),
            memory_bytes: config.memory_bytes(),
            stack_bytes: config.stack_bytes(),
        }
    }

    pub fn state(&self) -> &LoaderState {
        &self.state
    }

    pub fn accepts_click(&self) -> bool {
        self.clickable
    }

    /// Effects to run once when the page loads.
    pub fn setup(&self) -> Vec<Effect> {
        vec![Effect::ShowMessage(MSG_PLAY.to_string())]
    }

    pub fn handle(&mut self, event: LoaderEvent) -> Vec<Effect> {
        use LoaderEvent as E;
        use LoaderState as S;

        match (self.state.clone(), event) {
            (_, E::Click) => self.click(),

            (S::Downloading, E::Progress { loaded, total }) => self.progress(loaded, total),

            (S::Downloading, E::TransportError) => self.delivery_failed(None),

            (S::Downloading, E::Loaded { status, status_text }) => {
                if status != 200 {
                    let detail = format!("{status} {status_text}").trim_end().to_string();
                    return self.delivery_failed(Some(detail));
                }
                self.state = S::Preparing;
                vec![
                    Effect::ShowMessage(MSG_PARSE.to_string()),
                    Effect::Defer { ms: TICK_MS },
                ]
            }

            (S::Preparing, E::Tick) => vec![
                Effect::InstallErrorHook,
                Effect::ConfigureRuntime {
                    memory_bytes: self.memory_bytes,
                    stack_bytes: self.stack_bytes,
                },
                Effect::InjectScript,
            ],

            (S::Preparing, E::RuntimeReady) => {
                self.state = S::Executing;
                vec![
                    Effect::ShowMessage(MSG_EXECUTE.to_string()),
                    Effect::AttachCanvas,
                    Effect::Defer { ms: TICK_MS },
                ]
            }

            (S::Executing, E::Tick) => vec![Effect::InvokeEntry {
                args: vec![VIRTUAL_ROOT.to_string()],
            }],

            (S::Executing, E::PostRun { still_running }) => {
                if !still_running {
                    self.state = S::Failed(Failure::Capability);
                    return vec![Effect::ShowOverlay(MSG_NO_WEBGL.to_string())];
                }
                self.state = S::Running;
                vec![Effect::SwapCanvas, Effect::ReleaseReferences]
            }

            (
                S::Preparing | S::Executing | S::Running,
                E::RuntimeError {
                    message,
                    source,
                    line,
                },
            ) => {
                let detail = error_detail(&message, source.as_deref(), line);
                let overlay = format!("{MSG_RUNTIME_ERROR}<br><br>{detail}");
                self.state = S::Failed(Failure::Runtime { detail });
                vec![Effect::ShowOverlay(overlay)]
            }

            _ => Vec::new(),
        }
    }

    fn click(&mut self) -> Vec<Effect> {
        if !self.clickable {
            return Vec::new();
        }
        self.clickable = false;
        self.progress_events = 0;
        self.state = LoaderState::Downloading;
        vec![
            Effect::SetClickable(false),
            Effect::ScrollIntoView,
            Effect::ShowMessage(MSG_LOAD.to_string()),
            Effect::StartFetch {
                url: self.bundle_url.clone(),
            },
        ]
    }

    fn progress(&mut self, loaded: u64, total: Option<u64>) -> Vec<Effect> {
        let Some(total) = total else {
            return Vec::new();
        };
        let seen = self.progress_events;
        self.progress_events += 1;
        if seen < PROGRESS_SKIP_EVENTS {
            return Vec::new();
        }
        vec![Effect::DrawProgress(progress_bar(self.canvas, loaded, total))]
    }

    fn delivery_failed(&mut self, status: Option<String>) -> Vec<Effect> {
        let message = match &status {
            Some(s) => format!("{MSG_DOWNLOAD_ERROR}\nStatus: {s}"),
            None => MSG_DOWNLOAD_ERROR.to_string(),
        };
        self.state = LoaderState::Failed(Failure::Delivery { status });
        self.clickable = true;
        vec![Effect::ShowMessage(message), Effect::SetClickable(true)]
    }
}

/// Geometry of the progress bar for a canvas of `(width, height)`.
pub fn progress_bar(canvas: (u32, u32), loaded: u64, total: u64) -> ProgressBar {
    let ratio = if total == 0 {
        1.0
    } else {
        (loaded as f64 / total as f64).min(1.0)
    };
    ProgressBar {
        x: f64::from(canvas.0) / 2.0 - PROGRESS_BAR_WIDTH / 2.0,
        y: f64::from(canvas.1) * 0.6,
        width: ratio * PROGRESS_BAR_WIDTH,
    }
}

fn error_detail(message: &str, source: Option<&str>, line: Option<u32>) -> String {
    match (source, line) {
        (Some(src), Some(line)) => format!("{message}<br>({src}:{line})"),
        (Some(src), None) => format!("{message}<br>({src})"),
        _ => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> Loader {
        let config = PresentationConfig {
            base_name: "slime-split".into(),
            ..PresentationConfig::default()
        };
        Loader::new(&config)
    }

    fn downloading() -> Loader {
        let mut l = loader();
        l.handle(LoaderEvent::Click);
        l
    }

    fn executing() -> Loader {
        let mut l = downloading();
        l.handle(LoaderEvent::Loaded {
            status: 200,
            status_text: "OK".into(),
        });
        l.handle(LoaderEvent::Tick);
        l.handle(LoaderEvent::RuntimeReady);
        assert_eq!(l.state(), &LoaderState::Executing);
        l
    }

    fn progress(total: Option<u64>) -> LoaderEvent {
        LoaderEvent::Progress { loaded: 50, total }
    }

    #[test]
    fn starts_idle_and_clickable() {
        let l = loader();
        assert_eq!(l.state(), &LoaderState::Idle);
        assert!(l.accepts_click());
        assert_eq!(l.setup(), vec![Effect::ShowMessage(MSG_PLAY.into())]);
    }

    #[test]
    fn only_click_leaves_idle() {
        let events = [
            progress(Some(100)),
            LoaderEvent::TransportError,
            LoaderEvent::Loaded {
                status: 200,
                status_text: "OK".into(),
            },
            LoaderEvent::Tick,
            LoaderEvent::RuntimeReady,
            LoaderEvent::PostRun { still_running: true },
            LoaderEvent::RuntimeError {
                message: "boom".into(),
                source: None,
                line: None,
            },
        ];
        for event in events {
            let mut l = loader();
            assert!(l.handle(event.clone()).is_empty(), "{event:?} had effects");
            assert_eq!(l.state(), &LoaderState::Idle, "{event:?} left idle");
        }
    }

    #[test]
    fn click_starts_download() {
        let mut l = loader();
        let effects = l.handle(LoaderEvent::Click);
        assert_eq!(l.state(), &LoaderState::Downloading);
        assert!(!l.accepts_click());
        assert!(effects.contains(&Effect::StartFetch {
            url: "slime-split.js".into()
        }));
        assert!(effects.contains(&Effect::ShowMessage(MSG_LOAD.into())));
    }

    #[test]
    fn clicks_during_session_are_ignored() {
        let mut l = downloading();
        assert!(l.handle(LoaderEvent::Click).is_empty());
        assert_eq!(l.state(), &LoaderState::Downloading);

        let mut l = executing();
        assert!(l.handle(LoaderEvent::Click).is_empty());
        assert_eq!(l.state(), &LoaderState::Executing);
    }

    #[test]
    fn progress_without_total_never_draws() {
        let mut l = downloading();
        for _ in 0..20 {
            assert!(l.handle(progress(None)).is_empty());
        }
    }

    #[test]
    fn progress_skips_first_computable_events() {
        let mut l = downloading();
        for _ in 0..PROGRESS_SKIP_EVENTS {
            assert!(l.handle(progress(Some(100))).is_empty());
        }
        let effects = l.handle(progress(Some(100)));
        assert_eq!(
            effects,
            vec![Effect::DrawProgress(ProgressBar {
                x: 170.0,
                y: 288.0,
                width: 150.0,
            })]
        );
    }

    #[test]
    fn unknown_total_does_not_count_toward_skip() {
        let mut l = downloading();
        for _ in 0..10 {
            l.handle(progress(None));
        }
        for _ in 0..PROGRESS_SKIP_EVENTS {
            assert!(l.handle(progress(Some(100))).is_empty());
        }
        assert_eq!(l.handle(progress(Some(100))).len(), 1);
    }

    #[test]
    fn progress_width_is_clamped() {
        assert_eq!(progress_bar((640, 480), 500, 100).width, 300.0);
        assert_eq!(progress_bar((640, 480), 0, 100).width, 0.0);
        assert_eq!(progress_bar((640, 480), 10, 0).width, 300.0);
    }

    #[test]
    fn transport_error_fails_and_rearms_click() {
        let mut l = downloading();
        let effects = l.handle(LoaderEvent::TransportError);
        assert_eq!(
            l.state(),
            &LoaderState::Failed(Failure::Delivery { status: None })
        );
        assert!(l.accepts_click());
        assert!(effects.contains(&Effect::SetClickable(true)));
        assert!(effects.contains(&Effect::ShowMessage(MSG_DOWNLOAD_ERROR.into())));
    }

    #[test]
    fn not_found_reports_status_and_allows_retry() {
        let mut l = downloading();
        let effects = l.handle(LoaderEvent::Loaded {
            status: 404,
            status_text: "Not Found".into(),
        });
        let Effect::ShowMessage(msg) = &effects[0] else {
            panic!("expected a message, got {effects:?}");
        };
        assert!(msg.contains("404"), "{msg}");
        assert!(msg.ends_with("Status: 404 Not Found"));
        assert!(matches!(l.state(), LoaderState::Failed(Failure::Delivery { .. })));
        assert!(l.accepts_click());

        l.handle(LoaderEvent::Click);
        assert_eq!(l.state(), &LoaderState::Downloading);
        assert!(!l.accepts_click());
    }

    #[test]
    fn successful_download_prepares_then_injects() {
        let mut l = downloading();
        let effects = l.handle(LoaderEvent::Loaded {
            status: 200,
            status_text: "OK".into(),
        });
        assert_eq!(l.state(), &LoaderState::Preparing);
        assert_eq!(effects[1], Effect::Defer { ms: TICK_MS });

        let effects = l.handle(LoaderEvent::Tick);
        assert_eq!(
            effects,
            vec![
                Effect::InstallErrorHook,
                Effect::ConfigureRuntime {
                    memory_bytes: 256 * 1024 * 1024,
                    stack_bytes: 8 * 1024 * 1024,
                },
                Effect::InjectScript,
            ]
        );
        assert_eq!(l.state(), &LoaderState::Preparing);
    }

    #[test]
    fn executing_invokes_entry_with_virtual_root() {
        let mut l = executing();
        assert_eq!(
            l.handle(LoaderEvent::Tick),
            vec![Effect::InvokeEntry {
                args: vec!["/l".into()]
            }]
        );
    }

    #[test]
    fn exited_runtime_fails_without_running() {
        let mut l = executing();
        let effects = l.handle(LoaderEvent::PostRun {
            still_running: false,
        });
        assert_eq!(l.state(), &LoaderState::Failed(Failure::Capability));
        assert_eq!(effects, vec![Effect::ShowOverlay(MSG_NO_WEBGL.into())]);

        l.handle(LoaderEvent::PostRun { still_running: true });
        assert_eq!(l.state(), &LoaderState::Failed(Failure::Capability));
        assert!(!l.accepts_click());
    }

    #[test]
    fn live_runtime_reaches_running_and_releases() {
        let mut l = executing();
        let effects = l.handle(LoaderEvent::PostRun { still_running: true });
        assert_eq!(l.state(), &LoaderState::Running);
        assert!(l.state().is_terminal());
        assert_eq!(effects, vec![Effect::SwapCanvas, Effect::ReleaseReferences]);
    }

    #[test]
    fn runtime_error_after_launch_shows_location() {
        let mut l = executing();
        l.handle(LoaderEvent::PostRun { still_running: true });
        let effects = l.handle(LoaderEvent::RuntimeError {
            message: "attempt to index nil".into(),
            source: Some("game.js".into()),
            line: Some(42),
        });
        let Effect::ShowOverlay(html) = &effects[0] else {
            panic!("expected overlay, got {effects:?}");
        };
        assert!(html.contains("attempt to index nil<br>(game.js:42)"));
        assert!(matches!(l.state(), LoaderState::Failed(Failure::Runtime { .. })));
    }

    #[test]
    fn runtime_error_before_hook_is_ignored() {
        let mut l = downloading();
        let effects = l.handle(LoaderEvent::RuntimeError {
            message: "x".into(),
            source: None,
            line: None,
        });
        assert!(effects.is_empty());
        assert_eq!(l.state(), &LoaderState::Downloading);
    }

    #[test]
    fn state_names_cover_every_state() {
        let states = [
            LoaderState::Idle,
            LoaderState::Downloading,
            LoaderState::Preparing,
            LoaderState::Executing,
            LoaderState::Running,
            LoaderState::Failed(Failure::Capability),
        ];
        let names: Vec<&str> = states.iter().map(LoaderState::name).collect();
        assert_eq!(names, LoaderState::NAMES);
    }
}
