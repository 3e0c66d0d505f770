//! Headless media engine
//!
//! Understands the common subset of the launch-line grammar and simulates
//! pipeline state changes and bus traffic without rendering anything. Used
//! when no native media framework is available and by the test-suite, which
//! reaches the built pipelines through [`PipelineProbe`]s.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BusMessage, EngineError, EnginePipeline, MediaEngine, PlaybackState, Result, VideoSink};
use crate::session::event_loop::BusSender;
use crate::session::surface::RawSurfaceHandle;

/// Element factories the headless engine accepts
const KNOWN_FACTORIES: &[&str] = &[
    // sources
    "videotestsrc", "audiotestsrc", "udpsrc", "rtspsrc", "filesrc", "v4l2src",
    "appsrc", "failsrc",
    // filters and converters
    "videoconvert", "videoscale", "videorate", "audioconvert", "audioresample",
    "capsfilter", "textoverlay", "timeoverlay", "clockoverlay", "identity",
    "queue", "queue2", "tee", "videomixer", "compositor", "edgetv", "agingtv",
    // depayloaders, parsers, demuxers, decoders
    "rtpjitterbuffer", "rtph264depay", "rtph265depay", "rtpav1depay",
    "h264parse", "h265parse", "av1parse", "tsparse", "tsdemux", "decodebin",
    "avdec_h264", "avdec_h265", "dav1ddec", "jpegdec",
    // sinks
    "fakesink", "autovideosink", "glimagesink", "ximagesink", "xvimagesink",
    "waylandsink", "d3d11videosink", "osxvideosink", "autoaudiosink", "appsink",
];

/// Sinks that can render into a native window
const OVERLAY_SINKS: &[&str] = &[
    "autovideosink", "glimagesink", "ximagesink", "xvimagesink",
    "waylandsink", "d3d11videosink", "osxvideosink",
];

/// Elements that fail once data would start flowing
const FAILING_FACTORIES: &[&str] = &["failsrc"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct ElementSpec {
    factory: String,
    name: String,
    properties: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Link,
}

fn tokenize(description: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut quoted = false;

    for c in description.chars() {
        match c {
            '"' => quoted = !quoted,
            c if quoted => word.push(c),
            '!' => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
                tokens.push(Token::Link);
            }
            c if c.is_whitespace() => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
            }
            c => word.push(c),
        }
    }

    if quoted {
        return Err(EngineError::Parse("unterminated quoted string".into()));
    }
    if !word.is_empty() {
        tokens.push(Token::Word(word));
    }
    Ok(tokens)
}

/// `media/type,field=value` rather than `property=/some/path`
fn is_caps(word: &str) -> bool {
    word.split([',', '=']).next().is_some_and(|head| head.contains('/'))
}

/// Parse a launch description into its element list
fn parse_description(description: &str) -> Result<Vec<ElementSpec>> {
    let tokens = tokenize(description)?;
    if tokens.is_empty() {
        return Err(EngineError::Parse("empty pipeline not allowed".into()));
    }

    let mut elements: Vec<ElementSpec> = Vec::new();
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut references: Vec<String> = Vec::new();
    // True at the start and right after a link: an element or reference must follow
    let mut expect_element = true;

    let mut new_element = |factory: &str, elements: &mut Vec<ElementSpec>| {
        let n = counters.entry(factory.to_string()).or_insert(0);
        let name = format!("{}{}", factory, n);
        *n += 1;
        elements.push(ElementSpec {
            factory: factory.to_string(),
            name,
            properties: Vec::new(),
        });
    };

    for token in tokens {
        match token {
            Token::Link => {
                if expect_element {
                    return Err(EngineError::Parse("syntax error".into()));
                }
                expect_element = true;
            }
            Token::Word(word) if is_caps(&word) => {
                // Caps filter, e.g. video/x-raw,width=640
                new_element("capsfilter", &mut elements);
                if let Some(caps) = elements.last_mut() {
                    caps.properties.push(("caps".into(), word));
                }
                expect_element = false;
            }
            Token::Word(word) if word.contains('=') => {
                let element = match elements.last_mut() {
                    Some(element) if !expect_element => element,
                    _ => return Err(EngineError::Parse("syntax error".into())),
                };
                let (key, value) = word.split_once('=').unwrap_or((word.as_str(), ""));
                if key.is_empty() {
                    return Err(EngineError::Parse("syntax error".into()));
                }
                if key == "name" {
                    element.name = value.to_string();
                }
                element.properties.push((key.to_string(), value.to_string()));
            }
            Token::Word(word) if word.ends_with('.') => {
                references.push(word.trim_end_matches('.').to_string());
                expect_element = false;
            }
            Token::Word(word) => {
                if !KNOWN_FACTORIES.contains(&word.as_str()) {
                    return Err(EngineError::Parse(format!("no element \"{}\"", word)));
                }
                new_element(&word, &mut elements);
                expect_element = false;
            }
        }
    }

    if expect_element {
        return Err(EngineError::Parse("syntax error".into()));
    }
    for reference in references {
        if !elements.iter().any(|e| e.name == reference) {
            return Err(EngineError::Parse(format!(
                "no element named \"{}\"",
                reference
            )));
        }
    }
    Ok(elements)
}

enum BusLink {
    /// No observer yet: messages queue up
    Pending(Vec<BusMessage>),
    Watching(BusSender),
}

struct Bus {
    link: Mutex<BusLink>,
}

impl Bus {
    fn new() -> Self {
        Self {
            link: Mutex::new(BusLink::Pending(Vec::new())),
        }
    }

    fn post(&self, message: BusMessage) {
        match &mut *self.link.lock() {
            BusLink::Pending(queue) => queue.push(message),
            BusLink::Watching(sender) => {
                sender.post(message);
            }
        }
    }

    fn watch(&self, sender: BusSender) {
        let mut link = self.link.lock();
        if let BusLink::Pending(queue) = &mut *link {
            for message in queue.drain(..) {
                sender.post(message);
            }
        }
        *link = BusLink::Watching(sender);
    }

    fn unwatch(&self) {
        *self.link.lock() = BusLink::Pending(Vec::new());
    }
}

/// Video sink stand-in that records what it was asked to do
#[derive(Debug)]
pub struct HeadlessSink {
    element: String,
    bound: Mutex<Option<RawSurfaceHandle>>,
    binds: AtomicUsize,
    exposes: AtomicUsize,
}

impl HeadlessSink {
    fn new(element: &str) -> Self {
        Self {
            element: element.to_string(),
            bound: Mutex::new(None),
            binds: AtomicUsize::new(0),
            exposes: AtomicUsize::new(0),
        }
    }

    pub fn element_name(&self) -> &str {
        &self.element
    }

    /// Surface currently bound, if any
    pub fn bound_handle(&self) -> Option<RawSurfaceHandle> {
        *self.bound.lock()
    }

    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn expose_count(&self) -> usize {
        self.exposes.load(Ordering::SeqCst)
    }
}

impl VideoSink for HeadlessSink {
    fn bind_display(&self, handle: Option<RawSurfaceHandle>) {
        log::debug!("{}: window handle set to {:?}", self.element, handle);
        *self.bound.lock() = handle;
        self.binds.fetch_add(1, Ordering::SeqCst);
    }

    fn expose(&self) {
        self.exposes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Observation handle onto a headless pipeline, valid after it is dropped
#[derive(Clone)]
pub struct PipelineProbe {
    name: String,
    elements: Arc<Vec<String>>,
    state: Arc<Mutex<PlaybackState>>,
    sink: Option<Arc<HeadlessSink>>,
    bus: Arc<Bus>,
}

impl PipelineProbe {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element names in description order
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    pub fn sink(&self) -> Option<Arc<HeadlessSink>> {
        self.sink.clone()
    }

    /// Post an error message on the pipeline's bus as if `source` failed
    pub fn post_error(&self, source: &str, message: &str, debug: Option<&str>) {
        self.bus.post(BusMessage::Error {
            source: source.to_string(),
            message: message.to_string(),
            debug: debug.map(str::to_string),
        });
    }
}

#[derive(Default)]
struct Registry {
    next_pipeline: AtomicUsize,
    built: AtomicUsize,
    failed: AtomicUsize,
    live: AtomicUsize,
    last: Mutex<Option<PipelineProbe>>,
}

struct HeadlessPipeline {
    name: String,
    elements: Vec<ElementSpec>,
    state: Arc<Mutex<PlaybackState>>,
    sink: Option<Arc<HeadlessSink>>,
    bus: Arc<Bus>,
    registry: Arc<Registry>,
}

impl HeadlessPipeline {
    fn post_transition(&self, old: PlaybackState, current: PlaybackState, target: PlaybackState) {
        let pending = if current == target {
            PlaybackState::VoidPending
        } else {
            target
        };
        // Children settle before the pipeline reports its own transition
        for element in &self.elements {
            self.bus.post(BusMessage::StateChanged {
                source: element.name.clone(),
                from_pipeline: false,
                old,
                current,
                pending,
            });
        }
        self.bus.post(BusMessage::StateChanged {
            source: self.name.clone(),
            from_pipeline: true,
            old,
            current,
            pending,
        });
    }
}

impl EnginePipeline for HeadlessPipeline {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_state(&self, target: PlaybackState) -> Result<()> {
        if target == PlaybackState::VoidPending {
            return Err(EngineError::StateChange(target));
        }

        let mut state = self.state.lock();
        while let Some(next) = state.step_towards(target) {
            let old = *state;
            *state = next;
            self.post_transition(old, next, target);

            if old == PlaybackState::Ready && next == PlaybackState::Paused {
                let failing = self
                    .elements
                    .iter()
                    .find(|e| FAILING_FACTORIES.contains(&e.factory.as_str()));
                if let Some(element) = failing {
                    self.bus.post(BusMessage::Error {
                        source: element.name.clone(),
                        message: "Internal data stream error.".into(),
                        debug: Some(format!(
                            "streaming stopped, reason error ({}): simulated failure",
                            element.name
                        )),
                    });
                    return Err(EngineError::StateChange(target));
                }
            }
        }
        Ok(())
    }

    fn video_sink(&self) -> Option<Arc<dyn VideoSink>> {
        self.sink.clone().map(|sink| sink as Arc<dyn VideoSink>)
    }

    fn watch_bus(&self, bus: BusSender) {
        self.bus.watch(bus);
    }

    fn unwatch_bus(&self) {
        self.bus.unwatch();
    }
}

impl Drop for HeadlessPipeline {
    fn drop(&mut self) {
        log::debug!("Disposing headless pipeline {}", self.name);
        self.registry.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Dry-run engine; cheap to clone, clones share their counters
#[derive(Clone, Default)]
pub struct HeadlessEngine {
    registry: Arc<Registry>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe onto the most recently built pipeline
    pub fn last_pipeline(&self) -> Option<PipelineProbe> {
        self.registry.last.lock().clone()
    }

    /// Pipelines built and not yet dropped
    pub fn live_pipelines(&self) -> usize {
        self.registry.live.load(Ordering::SeqCst)
    }

    pub fn built_pipelines(&self) -> usize {
        self.registry.built.load(Ordering::SeqCst)
    }

    pub fn failed_builds(&self) -> usize {
        self.registry.failed.load(Ordering::SeqCst)
    }

    /// Post an error on the most recent pipeline's bus
    pub fn inject_error(&self, source: &str, message: &str) -> bool {
        match self.last_pipeline() {
            Some(probe) => {
                probe.post_error(source, message, None);
                true
            }
            None => false,
        }
    }
}

impl MediaEngine for HeadlessEngine {
    fn name(&self) -> &str {
        "headless"
    }

    fn build_pipeline(&self, description: &str) -> Result<Box<dyn EnginePipeline>> {
        let elements = match parse_description(description) {
            Ok(elements) => elements,
            Err(e) => {
                self.registry.failed.fetch_add(1, Ordering::SeqCst);
                return Err(e);
            }
        };

        let index = self.registry.next_pipeline.fetch_add(1, Ordering::SeqCst);
        let name = format!("pipeline{}", index);
        let sink = elements
            .iter()
            .find(|e| OVERLAY_SINKS.contains(&e.factory.as_str()))
            .map(|e| Arc::new(HeadlessSink::new(&e.name)));

        let pipeline = HeadlessPipeline {
            name: name.clone(),
            state: Arc::new(Mutex::new(PlaybackState::Null)),
            sink,
            bus: Arc::new(Bus::new()),
            registry: self.registry.clone(),
            elements,
        };

        let probe = PipelineProbe {
            name,
            elements: Arc::new(pipeline.elements.iter().map(|e| e.name.clone()).collect()),
            state: pipeline.state.clone(),
            sink: pipeline.sink.clone(),
            bus: pipeline.bus.clone(),
        };
        log::debug!(
            "Built headless pipeline {} with {} elements",
            probe.name,
            probe.elements.len()
        );
        *self.registry.last.lock() = Some(probe);
        self.registry.built.fetch_add(1, Ordering::SeqCst);
        self.registry.live.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(pipeline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::event_loop::{LoopContext, LoopEvent};

    #[test]
    fn parses_fallback_style_description() {
        let elements = parse_description(
            "videotestsrc pattern=ball ! videoconvert ! textoverlay text=\"FALL BACK\" font-desc=28 ! autovideosink",
        )
        .unwrap();
        let names: Vec<_> = elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["videotestsrc0", "videoconvert0", "textoverlay0", "autovideosink0"]
        );
        assert!(elements[2]
            .properties
            .contains(&("text".to_string(), "FALL BACK".to_string())));
    }

    #[test]
    fn parses_caps_names_and_references() {
        let elements = parse_description(
            "videotestsrc ! video/x-raw,width=640 ! tee name=t ! queue ! autovideosink t. ! queue ! fakesink",
        )
        .unwrap();
        assert_eq!(elements[1].factory, "capsfilter");
        assert_eq!(elements[2].name, "t");
        assert_eq!(elements[5].name, "queue1");

        let elements = parse_description("filesrc location=/tmp/a.ts ! tsdemux ! fakesink").unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(
            elements[0].properties,
            vec![("location".to_string(), "/tmp/a.ts".to_string())]
        );
    }

    #[test]
    fn rejects_malformed_descriptions() {
        let err = parse_description("not a valid description !!!").unwrap_err();
        assert_eq!(err.to_string(), "no element \"not\"");

        assert_eq!(
            parse_description("   ").unwrap_err().to_string(),
            "empty pipeline not allowed"
        );
        assert_eq!(
            parse_description("videotestsrc ! ! fakesink").unwrap_err().to_string(),
            "syntax error"
        );
        assert_eq!(
            parse_description("videotestsrc !").unwrap_err().to_string(),
            "syntax error"
        );
        assert!(parse_description("videotestsrc ! x. ! fakesink").is_err());
        assert!(parse_description("textoverlay text=\"open").is_err());
    }

    #[test]
    fn queued_messages_are_flushed_in_order_on_watch() {
        let engine = HeadlessEngine::new();
        let pipeline = engine.build_pipeline("videotestsrc ! fakesink").unwrap();
        pipeline.set_state(PlaybackState::Ready).unwrap();

        let (ctx, handle) = LoopContext::new();
        pipeline.watch_bus(ctx.bus_sender());
        handle.quit();

        let mut sources = Vec::new();
        ctx.run(|event| {
            if let LoopEvent::Bus(BusMessage::StateChanged { source, .. }) = event {
                sources.push(source);
            }
        });
        assert_eq!(sources, vec!["videotestsrc0", "fakesink0", "pipeline0"]);
    }

    #[test]
    fn only_the_pipeline_object_is_flagged_as_pipeline() {
        let engine = HeadlessEngine::new();
        let pipeline = engine.build_pipeline("videotestsrc name=pipeline0 ! fakesink").unwrap();
        pipeline.set_state(PlaybackState::Ready).unwrap();

        let (ctx, handle) = LoopContext::new();
        pipeline.watch_bus(ctx.bus_sender());
        handle.quit();

        let mut seen = Vec::new();
        ctx.run(|event| {
            if let LoopEvent::Bus(BusMessage::StateChanged {
                source,
                from_pipeline,
                ..
            }) = event
            {
                seen.push((source, from_pipeline));
            }
        });
        assert_eq!(
            seen,
            vec![
                ("pipeline0".to_string(), false),
                ("fakesink0".to_string(), false),
                ("pipeline0".to_string(), true),
            ]
        );
    }

    #[test]
    fn messages_posted_while_watch_starts_keep_their_order() {
        let engine = HeadlessEngine::new();
        let pipeline = engine.build_pipeline("videotestsrc ! fakesink").unwrap();
        let handle_on_bus = engine.last_pipeline().unwrap();

        let poster = std::thread::spawn(move || {
            for i in 0..500 {
                handle_on_bus.post_error("videotestsrc0", &i.to_string(), None);
            }
        });
        let (ctx, handle) = LoopContext::new();
        pipeline.watch_bus(ctx.bus_sender());
        poster.join().unwrap();
        handle.quit();

        let mut seen = Vec::new();
        ctx.run(|event| {
            if let LoopEvent::Bus(BusMessage::Error { message, .. }) = event {
                seen.push(message.parse::<usize>().unwrap());
            }
        });
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn failing_source_errors_on_preroll() {
        let engine = HeadlessEngine::new();
        let pipeline = engine.build_pipeline("failsrc ! fakesink").unwrap();
        assert!(pipeline.set_state(PlaybackState::Ready).is_ok());
        assert!(pipeline.set_state(PlaybackState::Playing).is_err());
        assert_eq!(engine.last_pipeline().unwrap().state(), PlaybackState::Paused);
    }

    #[test]
    fn live_count_tracks_drops() {
        let engine = HeadlessEngine::new();
        let pipeline = engine.build_pipeline("videotestsrc ! glimagesink").unwrap();
        assert_eq!(engine.live_pipelines(), 1);
        assert!(pipeline.video_sink().is_some());
        assert!(engine.build_pipeline("bogus").is_err());
        assert_eq!(engine.failed_builds(), 1);
        drop(pipeline);
        assert_eq!(engine.live_pipelines(), 0);
        assert_eq!(engine.built_pipelines(), 1);
    }
}
