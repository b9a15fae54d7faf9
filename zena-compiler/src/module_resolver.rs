//! Module resolution (SPEC_FULL §5): loads and caches every module
//! reachable from an entry point's `import` statements through a
//! [`ModuleHost`], so a multi-module compile only parses each module
//! once regardless of how many other modules import it.
//!
//! Adapted from the teacher's `vex_compiler::module_resolver`: same
//! cache-by-specifier shape, but sourced through the `ModuleHost`
//! abstraction instead of reading the filesystem directly, and using
//! `log` instead of the teacher's `eprintln!` progress lines.

use std::collections::{HashMap, HashSet};

use zena_ast::Program;
use zena_parser::Parser;

use crate::driver::{CompileError, ModuleHost};

/// `zena:`-prefixed specifiers name a built-in module baked into the
/// compiler rather than resolved through the host; reserved so user
/// code can't shadow `zena:io`, `zena:collections`, etc.
const RESERVED_PREFIX: &str = "zena:";

pub struct ModuleResolver {
    module_cache: HashMap<String, Program>,
    in_progress: HashSet<String>,
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleResolver {
    pub fn new() -> Self {
        Self {
            module_cache: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Resolves every `import` reachable from `program`, loading and
    /// parsing each module through `host` at most once. `entry` is the
    /// specifier `program` itself was loaded from, used only for
    /// circular-import bookkeeping.
    pub fn resolve_imports(&mut self, program: &mut Program, entry: &str, host: &dyn ModuleHost) -> Result<(), CompileError> {
        self.in_progress.insert(entry.to_string());
        for import in program.imports.clone() {
            self.load_module(&import.module, host)?;
        }
        self.in_progress.remove(entry);
        Ok(())
    }

    fn load_module(&mut self, module_path: &str, host: &dyn ModuleHost) -> Result<(), CompileError> {
        if module_path.starts_with(RESERVED_PREFIX) {
            log::trace!("module `{module_path}` is a built-in, skipping host load");
            self.module_cache.entry(module_path.to_string()).or_insert_with(Program::new);
            return Ok(());
        }
        if self.module_cache.contains_key(module_path) {
            log::trace!("module `{module_path}` already cached");
            return Ok(());
        }
        if self.in_progress.contains(module_path) {
            return Err(CompileError::CircularDependency {
                module: module_path.to_string(),
            });
        }

        log::debug!("loading module `{module_path}`");
        self.in_progress.insert(module_path.to_string());
        let source = host.load(module_path)?;
        let mut parser = Parser::new(&source)?;
        let parsed = parser.parse_file()?;

        for import in parsed.imports.clone() {
            self.load_module(&import.module, host)?;
        }
        self.in_progress.remove(module_path);
        self.module_cache.insert(module_path.to_string(), parsed);
        Ok(())
    }

    pub fn is_loaded(&self, module_path: &str) -> bool {
        self.module_cache.contains_key(module_path)
    }

    pub fn get_module(&self, module_path: &str) -> Option<&Program> {
        self.module_cache.get(module_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zena_ast::{Import, NodeId};

    struct StubHost {
        files: HashMap<&'static str, &'static str>,
    }

    impl ModuleHost for StubHost {
        fn load(&self, module_path: &str) -> Result<String, CompileError> {
            self.files
                .get(module_path)
                .map(|s| s.to_string())
                .ok_or_else(|| CompileError::ModuleNotFound { module: module_path.to_string() })
        }
    }

    fn import(module: &str) -> Import {
        Import {
            items: vec![],
            module: module.to_string(),
            alias: None,
            span: NodeId::DUMMY,
        }
    }

    #[test]
    fn caches_a_module_loaded_twice() {
        let mut files = HashMap::new();
        files.insert("sibling", "fn helper(): i32 { return 1; }");
        let host = StubHost { files };
        let mut resolver = ModuleResolver::new();

        let mut program = Program::new();
        program.imports.push(import("sibling"));
        resolver.resolve_imports(&mut program, "entry", &host).unwrap();
        assert!(resolver.is_loaded("sibling"));

        // Loading it again (as if another module also imports it)
        // must not re-read or re-parse the source.
        resolver.load_module("sibling", &host).unwrap();
        assert!(resolver.get_module("sibling").unwrap().items.len() == 1);
    }

    #[test]
    fn missing_module_is_reported() {
        let host = StubHost { files: HashMap::new() };
        let mut resolver = ModuleResolver::new();
        let mut program = Program::new();
        program.imports.push(import("missing"));
        let result = resolver.resolve_imports(&mut program, "entry", &host);
        assert!(matches!(result, Err(CompileError::ModuleNotFound { .. })));
    }

    #[test]
    fn builtin_modules_skip_the_host() {
        let host = StubHost { files: HashMap::new() };
        let mut resolver = ModuleResolver::new();
        let mut program = Program::new();
        program.imports.push(import("zena:collections"));
        resolver.resolve_imports(&mut program, "entry", &host).unwrap();
        assert!(resolver.is_loaded("zena:collections"));
    }
}
