// Diagnostic reporting for the Zena compiler.
// Rust-style error messages with spans, colors, and suggestions.

use colored::Colorize;
use std::fmt;
use std::path::Path;

pub mod span_map;
pub use span_map::SpanMap;

/// Source code location. `start`/`end` are byte offsets into the source
/// file; `line`/`column` are the corresponding human-facing position of
/// `start`, computed once at construction so renderers never re-scan
/// the source to find them.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(file: String, line: usize, column: usize, start: usize, end: usize) -> Self {
        Self {
            file,
            line,
            column,
            start,
            end,
        }
    }

    pub fn from_file_and_range(file: &str, source: &str, range: std::ops::Range<usize>) -> Self {
        let before = &source[..range.start.min(source.len())];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.len() + 1, |pos| before.len() - pos);

        Self {
            file: file.to_string(),
            line,
            column,
            start: range.start,
            end: range.end,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
            start: 0,
            end: 0,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self {
            file: path.display().to_string(),
            line: 0,
            column: 0,
            start: 0,
            end: 0,
        }
    }

    pub fn length(&self) -> usize {
        self.end.saturating_sub(self.start).max(1)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,
    Warning,
    Info,
    Note,
    Help,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorLevel::Error => write!(f, "{}", "error".red().bold()),
            ErrorLevel::Warning => write!(f, "{}", "warning".yellow().bold()),
            ErrorLevel::Info => write!(f, "{}", "info".blue().bold()),
            ErrorLevel::Note => write!(f, "{}", "note".cyan().bold()),
            ErrorLevel::Help => write!(f, "{}", "help".green().bold()),
        }
    }
}

/// Structured diagnostic message: `{code, message, span{line, column,
/// start, end}}` plus whatever auxiliary notes/help/suggestion the
/// checker chose to attach.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub code: String,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
    pub suggestion: Option<Suggestion>,
    pub primary_label: Option<String>,
    pub related: Vec<RelatedSpan>,
}

/// A secondary span referenced from a diagnostic, e.g. "first declared
/// here" pointing at an earlier declaration.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub message: String,
    pub replacement: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(level: ErrorLevel, code: &str, message: String, span: Span) -> Self {
        Self {
            level,
            code: code.to_string(),
            message,
            span,
            notes: Vec::new(),
            help: None,
            suggestion: None,
            primary_label: None,
            related: Vec::new(),
        }
    }

    pub fn error(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Error, code, message, span)
    }

    pub fn warning(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Warning, code, message, span)
    }

    pub fn info(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Info, code, message, span)
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn with_suggestion(mut self, message: String, replacement: String, span: Span) -> Self {
        self.suggestion = Some(Suggestion {
            message,
            replacement,
            span,
        });
        self
    }

    pub fn with_primary_label(mut self, label: String) -> Self {
        self.primary_label = Some(label);
        self
    }

    pub fn with_related(mut self, span: Span, message: String) -> Self {
        self.related.push(RelatedSpan { span, message });
        self
    }

    pub fn format(&self, source_code: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));

        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));

        if let Some(snippet) = self.get_source_snippet(source_code) {
            output.push_str(&snippet);
        }

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        if let Some(suggestion) = &self.suggestion {
            output.push_str(&format!(
                " {} {}\n",
                "help:".green().bold(),
                suggestion.message
            ));
            if let Some(suggested_snippet) = self.get_suggestion_snippet(source_code) {
                output.push_str(&suggested_snippet);
            }
        }

        output
    }

    fn format_simple(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));

        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        output
    }

    fn get_source_snippet(&self, source_code: &str) -> Option<String> {
        let lines: Vec<&str> = source_code.lines().collect();

        if self.span.line == 0 || self.span.line > lines.len() {
            return None;
        }

        let line_idx = self.span.line - 1;
        let line = lines[line_idx];

        let mut snippet = String::new();
        let line_num_width = self.span.line.to_string().len().max(2);

        snippet.push_str(&format!(" {}\n", " ".repeat(line_num_width + 1).cyan()));
        snippet.push_str(&format!(
            " {} {} {}\n",
            format!("{:>width$}", self.span.line, width = line_num_width)
                .cyan()
                .bold(),
            "|".cyan().bold(),
            line
        ));

        let padding = " ".repeat(line_num_width + 3 + self.span.column.saturating_sub(1));
        let underline = "^".repeat(self.span.length());
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(line_num_width + 1).cyan(),
            padding,
            underline.red().bold()
        ));

        Some(snippet)
    }

    fn get_suggestion_snippet(&self, source_code: &str) -> Option<String> {
        let suggestion = self.suggestion.as_ref()?;
        let lines: Vec<&str> = source_code.lines().collect();

        if suggestion.span.line == 0 || suggestion.span.line > lines.len() {
            return None;
        }

        let line_idx = suggestion.span.line - 1;
        let line = lines[line_idx];

        let mut snippet = String::new();
        let line_num_width = suggestion.span.line.to_string().len().max(2);

        let col = suggestion.span.column.saturating_sub(1);
        if col > line.len() {
            return None;
        }
        let before = &line[..col];
        let after = &line[(col + suggestion.span.length()).min(line.len())..];
        let modified_line = format!("{}{}{}", before, &suggestion.replacement, after);

        snippet.push_str(&format!(
            " {} {}\n",
            format!("{:>width$}", suggestion.span.line, width = line_num_width)
                .cyan()
                .bold(),
            "| ".cyan().bold()
        ));
        snippet.push_str(&format!(
            " {} {}\n",
            " ".repeat(line_num_width + 1).cyan(),
            modified_line
        ));

        let padding = " ".repeat(line_num_width + 3 + col);
        let indicator = "+".repeat(suggestion.replacement.len());
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(line_num_width + 1).cyan(),
            padding,
            indicator.green().bold()
        ));

        Some(snippet)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

/// Diagnostic collection and reporting sink. The checker owns one of
/// these per compile and never panics on a semantic error, only ever
/// emits into it.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            ErrorLevel::Error => self.error_count += 1,
            ErrorLevel::Warning => self.warning_count += 1,
            ErrorLevel::Info => self.info_count += 1,
            _ => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn emit_error(&mut self, code: &str, message: String, span: Span) {
        self.emit(Diagnostic::error(code, message, span));
    }

    pub fn emit_warning(&mut self, code: &str, message: String, span: Span) {
        self.emit(Diagnostic::warning(code, message, span));
    }

    pub fn emit_info(&mut self, code: &str, message: String, span: Span) {
        self.emit(Diagnostic::info(code, message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn info_count(&self) -> usize {
        self.info_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn print_all(&self, source_code: &str) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.format(source_code));
        }
    }

    pub fn print_summary(&self) {
        if self.error_count > 0 {
            eprintln!(
                "\n{}: {} error{} emitted",
                "error".red().bold(),
                self.error_count,
                if self.error_count == 1 { "" } else { "s" }
            );
        }

        if self.warning_count > 0 {
            eprintln!(
                "{}: {} warning{} emitted",
                "warning".yellow().bold(),
                self.warning_count,
                if self.warning_count == 1 { "" } else { "s" }
            );
        }

        if self.info_count > 0 {
            eprintln!(
                "{}: {} info message{} emitted",
                "info".blue().bold(),
                self.info_count,
                if self.info_count == 1 { "" } else { "s" }
            );
        }
    }

    /// Serialize to the `{code, message, span{line, column, start,
    /// end}}` record shape, one array entry per diagnostic.
    pub fn to_json(&self) -> String {
        let mut json = String::from("{\"diagnostics\":[");

        for (i, diag) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                json.push(',');
            }

            let level_str = match diag.level {
                ErrorLevel::Error => "error",
                ErrorLevel::Warning => "warning",
                ErrorLevel::Info => "info",
                ErrorLevel::Note => "note",
                ErrorLevel::Help => "help",
            };

            json.push_str(&format!(
                "{{\"level\":\"{}\",\"code\":\"{}\",\"message\":\"{}\",\"span\":{{\"file\":\"{}\",\"line\":{},\"column\":{},\"start\":{},\"end\":{}}}",
                level_str,
                diag.code,
                diag.message.replace('"', "\\\""),
                diag.span.file,
                diag.span.line,
                diag.span.column,
                diag.span.start,
                diag.span.end
            ));

            if !diag.notes.is_empty() {
                json.push_str(",\"notes\":[");
                for (j, note) in diag.notes.iter().enumerate() {
                    if j > 0 {
                        json.push(',');
                    }
                    json.push_str(&format!("\"{}\"", note.replace('"', "\\\"")));
                }
                json.push(']');
            }

            if let Some(help) = &diag.help {
                json.push_str(&format!(",\"help\":\"{}\"", help.replace('"', "\\\"")));
            }

            if let Some(label) = &diag.primary_label {
                json.push_str(&format!(
                    ",\"primary_label\":\"{}\"",
                    label.replace('"', "\\\"")
                ));
            }

            if !diag.related.is_empty() {
                json.push_str(",\"related\":[");
                for (j, rel) in diag.related.iter().enumerate() {
                    if j > 0 {
                        json.push(',');
                    }
                    json.push_str(&format!(
                        "{{\"span\":{{\"file\":\"{}\",\"line\":{},\"column\":{},\"start\":{},\"end\":{}}},\"message\":\"{}\"}}",
                        rel.span.file,
                        rel.span.line,
                        rel.span.column,
                        rel.span.start,
                        rel.span.end,
                        rel.message.replace('"', "\\\"")
                    ));
                }
                json.push(']');
            }

            json.push('}');
        }

        json.push_str("]}");
        json
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
        self.info_count = 0;
    }
}

/// Convenience constructors, one per required diagnostic code.
impl DiagnosticEngine {
    pub fn type_mismatch(&mut self, expected: &str, found: &str, span: Span) {
        self.emit(
            Diagnostic::error(
                error_codes::TYPE_MISMATCH,
                "mismatched types".to_string(),
                span,
            )
            .with_note(format!("expected `{}`, found `{}`", expected, found)),
        );
    }

    pub fn symbol_not_found(&mut self, name: &str, span: Span, suggestions: Vec<String>) {
        let mut diag = Diagnostic::error(
            error_codes::SYMBOL_NOT_FOUND,
            format!("cannot find `{}` in this scope", name),
            span,
        );

        if !suggestions.is_empty() {
            diag = diag.with_help(format!("did you mean `{}`?", suggestions.join("`, `")));
        }

        self.emit(diag);
    }

    pub fn duplicate_declaration(&mut self, name: &str, span: Span, first_span: Span) {
        self.emit(
            Diagnostic::error(
                error_codes::DUPLICATE_DECLARATION,
                format!("`{}` is declared more than once", name),
                span,
            )
            .with_note(format!("first declared at {}", first_span)),
        );
    }

    pub fn return_outside_function(&mut self, span: Span) {
        self.emit(Diagnostic::error(
            error_codes::RETURN_OUTSIDE_FUNCTION,
            "`return` outside of a function body".to_string(),
            span,
        ));
    }

    pub fn abstract_method_in_concrete_class(&mut self, method: &str, class: &str, span: Span) {
        self.emit(
            Diagnostic::error(
                error_codes::ABSTRACT_METHOD_IN_CONCRETE_CLASS,
                format!("abstract method `{}` in non-abstract class `{}`", method, class),
                span,
            )
            .with_help(format!("mark `{}` as `abstract`, or give `{}` a body", class, method)),
        );
    }

    pub fn abstract_method_not_implemented(&mut self, method: &str, class: &str, span: Span) {
        self.emit(Diagnostic::error(
            error_codes::ABSTRACT_METHOD_NOT_IMPLEMENTED,
            format!("class `{}` does not implement abstract method `{}`", class, method),
            span,
        ));
    }

    pub fn property_not_found(&mut self, property: &str, ty: &str, span: Span, suggestions: Vec<String>) {
        let mut diag = Diagnostic::error(
            error_codes::PROPERTY_NOT_FOUND,
            format!("no property `{}` on type `{}`", property, ty),
            span,
        );

        if !suggestions.is_empty() {
            diag = diag.with_help(format!("did you mean `{}`?", suggestions.join("`, `")));
        }

        self.emit(diag);
    }

    pub fn generic_type_argument_mismatch(&mut self, name: &str, expected: usize, found: usize, span: Span) {
        self.emit(Diagnostic::error(
            error_codes::GENERIC_TYPE_ARGUMENT_MISMATCH,
            format!(
                "`{}` expects {} type argument{} but {} {} supplied",
                name,
                expected,
                if expected == 1 { "" } else { "s" },
                found,
                if found == 1 { "was" } else { "were" }
            ),
            span,
        ));
    }

    pub fn constructor_in_mixin(&mut self, mixin: &str, span: Span) {
        self.emit(Diagnostic::error(
            error_codes::CONSTRUCTOR_IN_MIXIN,
            format!("mixin `{}` may not declare a constructor", mixin),
            span,
        ));
    }

    pub fn unknown_error(&mut self, message: String, span: Span) {
        self.emit(Diagnostic::error(error_codes::UNKNOWN_ERROR, message, span));
    }
}

/// The exact diagnostic codes a conforming checker may emit.
pub mod error_codes {
    pub const TYPE_MISMATCH: &str = "TypeMismatch";
    pub const SYMBOL_NOT_FOUND: &str = "SymbolNotFound";
    pub const DUPLICATE_DECLARATION: &str = "DuplicateDeclaration";
    pub const RETURN_OUTSIDE_FUNCTION: &str = "ReturnOutsideFunction";
    pub const ABSTRACT_METHOD_IN_CONCRETE_CLASS: &str = "AbstractMethodInConcreteClass";
    pub const ABSTRACT_METHOD_NOT_IMPLEMENTED: &str = "AbstractMethodNotImplemented";
    pub const PROPERTY_NOT_FOUND: &str = "PropertyNotFound";
    pub const GENERIC_TYPE_ARGUMENT_MISMATCH: &str = "GenericTypeArgumentMismatch";
    pub const CONSTRUCTOR_IN_MIXIN: &str = "ConstructorInMixin";
    pub const UNKNOWN_ERROR: &str = "UnknownError";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_format() {
        let source = "fn main() {\n    let x: i32 = \"hello\";\n}";

        let span = Span::new("test.zena".to_string(), 2, 18, 23, 30);
        let diag = Diagnostic::error(
            error_codes::TYPE_MISMATCH,
            "mismatched types".to_string(),
            span,
        )
        .with_note("expected `i32`, found `string`".to_string());

        let formatted = diag.format(source);
        assert!(formatted.contains("error[TypeMismatch]"));
        assert!(formatted.contains("mismatched types"));
        assert!(formatted.contains("test.zena:2:18"));
    }

    #[test]
    fn test_to_json_includes_span_offsets() {
        let mut engine = DiagnosticEngine::new();
        engine.symbol_not_found(
            "fob",
            Span::new("test.zena".to_string(), 1, 1, 0, 3),
            vec!["foo".to_string()],
        );

        let json = engine.to_json();
        assert!(json.contains("\"start\":0"));
        assert!(json.contains("\"end\":3"));
        assert!(json.contains("SymbolNotFound"));
    }

    #[test]
    fn test_engine_counts() {
        let mut engine = DiagnosticEngine::new();
        engine.return_outside_function(Span::unknown());
        engine.emit_warning("W0001", "unused variable `x`".to_string(), Span::unknown());
        assert_eq!(engine.error_count(), 1);
        assert_eq!(engine.warning_count(), 1);
        assert!(engine.has_errors());
    }
}

/// Fuzzy matching utilities for "did you mean?" suggestions.
pub mod fuzzy {
    use strsim::jaro_winkler;

    pub fn find_similar_names(
        target: &str,
        candidates: &[String],
        threshold: f64,
        max_suggestions: usize,
    ) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|candidate| (candidate.clone(), jaro_winkler(target, candidate)))
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(max_suggestions)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn find_similar_members(target: &str, candidates: &[String]) -> Vec<String> {
        let prefix_matches: Vec<String> = candidates
            .iter()
            .filter(|c| {
                c.to_lowercase()
                    .starts_with(&target.to_lowercase().chars().take(2).collect::<String>())
            })
            .cloned()
            .collect();

        if !prefix_matches.is_empty() {
            return prefix_matches.into_iter().take(3).collect();
        }

        find_similar_names(target, candidates, 0.7, 3)
    }
}
