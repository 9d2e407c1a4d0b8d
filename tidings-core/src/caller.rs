//! Caller resolution
//!
//! Finds the first stack frame that does not belong to the logging core so
//! that escalated warnings point at the code that actually reported the
//! failure, not at `StructuredLogger::network`.
//!
//! The walk is innermost-first:
//! 1. frames before the first logging-core frame are the stack walker's own
//!    machinery and are ignored,
//! 2. logging-core frames are skipped,
//! 3. the next frame with a source file or a symbol name is the caller.
//!
//! A frame belongs to the core when its source file matches one of
//! [`CORE_SOURCES`] by path suffix. Frames without line tables are matched
//! by symbol path against [`CORE_MODULES`] instead, so the caller's function
//! is still reported (with the unknown-file sentinel) in builds that carry
//! symbols but no debug info. With neither, the sentinel location is
//! returned.

use std::path::{Path, PathBuf};

use backtrace::{Backtrace, BacktraceSymbol};

use crate::record::{CallerLocation, UNKNOWN_FILE, UNKNOWN_FUNCTION};
use crate::{escalation, logger};

/// Source files that make up the logging core, as recorded by `file!()`
pub const CORE_SOURCES: &[&str] = &[file!(), logger::SOURCE, escalation::SOURCE];

/// Module paths of the logging core, for frames without line tables
pub const CORE_MODULES: &[&str] = &[module_path!(), logger::MODULE, escalation::MODULE];

/// Something that can tell who called into the logger
pub trait CallerLocator: Send + Sync {
    fn locate(&self, capture_stack: bool) -> CallerLocation;
}

/// Native stack inspection through the `backtrace` crate
#[derive(Debug, Clone)]
pub struct BacktraceLocator {
    sources: Vec<String>,
    modules: Vec<String>,
}

impl BacktraceLocator {
    pub fn new() -> Self {
        Self {
            sources: CORE_SOURCES.iter().map(|s| s.to_string()).collect(),
            modules: CORE_MODULES.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Treat frames from `path` as internal too (e.g. a logging facade)
    pub fn skip_source(mut self, path: impl Into<String>) -> Self {
        self.sources.push(path.into());
        self
    }

    /// Treat symbols under `module` as internal when line tables are missing
    pub fn skip_module(mut self, module: impl Into<String>) -> Self {
        self.modules.push(module.into());
        self
    }

    pub fn skipped_sources(&self) -> &[String] {
        &self.sources
    }

    pub fn skipped_modules(&self) -> &[String] {
        &self.modules
    }
}

impl Default for BacktraceLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl CallerLocator for BacktraceLocator {
    fn locate(&self, capture_stack: bool) -> CallerLocation {
        resolve(&self.sources, &self.modules, capture_stack)
    }
}

/// Walk the current stack and return the first frame outside the core
///
/// Never fails: the sentinel location is returned when the stack is
/// exhausted or carries neither source nor symbol information.
pub fn resolve<S, M>(sources: &[S], modules: &[M], capture_stack: bool) -> CallerLocation
where
    S: AsRef<str>,
    M: AsRef<str>,
{
    let backtrace = Backtrace::new();
    let frames: Vec<FrameView> = backtrace
        .frames()
        .iter()
        .flat_map(|frame| frame.symbols())
        .map(FrameView::from_symbol)
        .collect();

    match caller_index(&frames, sources, modules) {
        Some(idx) => {
            let stack = capture_stack.then(|| render_stack(&frames[idx..]));
            frames[idx].location().with_stack(stack)
        }
        None => CallerLocation::unknown(),
    }
}

/// One symbolized frame, detached from the backtrace
#[derive(Debug, Clone, PartialEq, Eq)]
struct FrameView {
    file: Option<PathBuf>,
    line: u32,
    function: Option<String>,
}

impl FrameView {
    fn from_symbol(symbol: &BacktraceSymbol) -> Self {
        Self {
            file: symbol.filename().map(Path::to_path_buf),
            line: symbol.lineno().unwrap_or(0),
            // `{:#}` drops the trailing hash
            function: symbol.name().map(|name| format!("{name:#}")),
        }
    }

    fn is_core<S: AsRef<str>, M: AsRef<str>>(&self, sources: &[S], modules: &[M]) -> bool {
        match (&self.file, &self.function) {
            (Some(file), _) => sources.iter().any(|s| file.ends_with(s.as_ref())),
            (None, Some(function)) => modules.iter().any(|m| in_module(function, m.as_ref())),
            (None, None) => false,
        }
    }

    fn is_symbolized(&self) -> bool {
        self.file.is_some() || self.function.is_some()
    }

    fn location(&self) -> CallerLocation {
        CallerLocation::new(
            self.file
                .as_ref()
                .map(|f| f.display().to_string())
                .unwrap_or_else(|| UNKNOWN_FILE.to_string()),
            self.line,
            self.function.as_deref().unwrap_or(UNKNOWN_FUNCTION),
        )
    }
}

fn caller_index<S, M>(frames: &[FrameView], sources: &[S], modules: &[M]) -> Option<usize>
where
    S: AsRef<str>,
    M: AsRef<str>,
{
    let mut entered_core = false;
    for (idx, frame) in frames.iter().enumerate() {
        if frame.is_core(sources, modules) {
            entered_core = true;
            continue;
        }
        if entered_core && frame.is_symbolized() {
            return Some(idx);
        }
    }
    None
}

/// `tidings_core::logger::X::f` and `<tidings_core::logger::X as T>::f` are
/// in `tidings_core::logger`; `tidings_core::logger_ext::f` is not
fn in_module(function: &str, module: &str) -> bool {
    function
        .trim_start_matches('<')
        .strip_prefix(module)
        .is_some_and(|rest| rest.starts_with("::"))
}

/// Most recent call last, starting from the outermost frame
fn render_stack(frames: &[FrameView]) -> String {
    let mut out = String::from("Stack (most recent call last):");
    for frame in frames.iter().rev() {
        let location = frame.location();
        out.push_str(&format!(
            "\n  {}\n    at {}:{}",
            location.function, location.file, location.line
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(file: Option<&str>, line: u32, function: Option<&str>) -> FrameView {
        FrameView {
            file: file.map(PathBuf::from),
            line,
            function: function.map(str::to_string),
        }
    }

    fn symbols_only(functions: &[&str]) -> Vec<FrameView> {
        functions.iter().map(|f| frame(None, 0, Some(f))).collect()
    }

    #[test]
    fn test_core_sources_come_from_file_macro() {
        assert_eq!(CORE_SOURCES[0], file!());
        assert_eq!(CORE_MODULES[0], module_path!().trim_end_matches("::tests"));
        assert_eq!(CORE_SOURCES.len(), CORE_MODULES.len());
    }

    #[test]
    fn test_skip_matches_path_suffix() {
        let skip = ["tidings-core/src/logger.rs"];
        let none: [&str; 0] = [];
        let core = |path: &str| frame(Some(path), 1, None).is_core(&skip, &none);

        assert!(core("/build/ws/tidings-core/src/logger.rs"));
        assert!(core("tidings-core/src/logger.rs"));
        assert!(!core("/build/ws/tidings-core/src/my_logger.rs"));
        assert!(!core("/build/ws/app/src/main.rs"));
    }

    #[test]
    fn test_module_match_respects_path_boundaries() {
        assert!(in_module("tidings_core::logger::StructuredLogger::network", "tidings_core::logger"));
        assert!(in_module(
            "<tidings_core::caller::BacktraceLocator as tidings_core::caller::CallerLocator>::locate",
            "tidings_core::caller"
        ));
        assert!(!in_module("tidings_core::logger_ext::wrap", "tidings_core::logger"));
        assert!(!in_module("app::tidings_core::logger::f", "tidings_core::logger"));
    }

    #[test]
    fn test_dependency_layout_paths() {
        // Registry and git checkouts record absolute paths for `file!()`
        let logger = "/home/u/.cargo/registry/src/idx/tidings-core-0.1.0/src/logger.rs";
        let frames = vec![
            frame(
                Some("/home/u/.cargo/registry/src/idx/backtrace-0.3.71/src/capture.rs"),
                9,
                Some("backtrace::capture::Backtrace::new"),
            ),
            frame(
                Some(logger),
                212,
                Some("tidings_core::logger::StructuredLogger::network"),
            ),
            frame(Some("/srv/app/src/feed.rs"), 40, Some("app::feed::reconnect")),
        ];
        let none: [&str; 0] = [];
        assert_eq!(caller_index(&frames, &[logger], &none), Some(2));
    }

    #[test]
    fn test_symbol_fallback_without_line_tables() {
        let frames = symbols_only(&[
            "backtrace::backtrace::trace",
            "tidings_core::caller::resolve",
            "<tidings_core::caller::BacktraceLocator as tidings_core::caller::CallerLocator>::locate",
            "tidings_core::logger::StructuredLogger::network",
            "app::feed::reconnect",
            "main",
        ]);

        let idx = caller_index(&frames, CORE_SOURCES, CORE_MODULES).unwrap();
        let loc = frames[idx].location();
        assert_eq!(loc.function, "app::feed::reconnect");
        assert_eq!(loc.file, UNKNOWN_FILE);
        assert_eq!(loc.line, 0);
    }

    #[test]
    fn test_unsymbolized_frames_are_passed_over() {
        let mut frames = symbols_only(&["tidings_core::logger::StructuredLogger::network"]);
        frames.push(frame(None, 0, None));
        frames.push(frame(Some("/srv/app/src/main.rs"), 3, Some("app::main")));
        assert_eq!(caller_index(&frames, CORE_SOURCES, CORE_MODULES), Some(2));

        // Nothing symbolized at all
        let bare = vec![frame(None, 0, None); 4];
        assert_eq!(caller_index(&bare, CORE_SOURCES, CORE_MODULES), None);
    }

    #[test]
    fn test_render_stack_outermost_first() {
        let frames = vec![
            frame(Some("app/src/feed.rs"), 40, Some("app::feed::reconnect")),
            frame(None, 0, Some("main")),
        ];
        assert_eq!(
            render_stack(&frames),
            "Stack (most recent call last):\n  main\n    at (unknown file):0\n  app::feed::reconnect\n    at app/src/feed.rs:40"
        );
    }

    #[test]
    fn test_unmatched_skip_set_yields_sentinel() {
        // Core never appears on the stack, so no frame qualifies
        let loc = resolve(&["no/such/source.rs"], &["no_such::module"], false);
        assert!(loc.is_unknown());
        assert_eq!(loc.function, UNKNOWN_FUNCTION);
        assert!(loc.stack.is_none());
    }

    #[test]
    fn test_resolve_skips_core_frames() {
        let loc = resolve(CORE_SOURCES, CORE_MODULES, false);
        assert!(
            !CORE_SOURCES.iter().any(|s| Path::new(&loc.file).ends_with(s)),
            "resolved into the logging core: {loc}"
        );
    }

    #[test]
    fn test_locator_extends_skip_set() {
        let locator = BacktraceLocator::new()
            .skip_source("app/src/facade.rs")
            .skip_module("app::facade");
        assert_eq!(locator.skipped_sources().len(), CORE_SOURCES.len() + 1);
        assert_eq!(locator.skipped_modules().len(), CORE_MODULES.len() + 1);
        assert!(locator
            .skipped_sources()
            .iter()
            .any(|s| s == "app/src/facade.rs"));
    }
}
