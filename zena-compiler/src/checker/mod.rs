//! Declaration and statement checker (spec §4.3): validates classes,
//! interfaces, mixins, type aliases, enums, variable declarations,
//! control flow and pattern bindings, and assembles the `ClassType`/
//! `InterfaceType`/`MixinType` records and their vtables at the
//! semantic level.

pub mod declarations;
pub mod expressions;
pub mod patterns;
pub mod statements;

use std::collections::HashMap;
use std::rc::Rc;

use zena_ast::Program;
use zena_diagnostics::SpanMap;

use crate::context::CheckerContext;
use crate::types::{print_type, ClassType, FunctionType, InterfaceType, MixinType, Type, TypeAliasData};

/// Every named declaration a program produced, keyed by name, so later
/// passes (statement/expression checking, codegen) can resolve a
/// reference without re-walking the AST.
#[derive(Default)]
pub struct ProgramTypes {
    pub classes: HashMap<String, Rc<ClassType>>,
    pub interfaces: HashMap<String, Rc<InterfaceType>>,
    pub mixins: HashMap<String, Rc<MixinType>>,
    pub aliases: HashMap<String, Rc<TypeAliasData>>,
    pub functions: HashMap<String, Rc<FunctionType>>,
    pub consts: HashMap<String, Type>,
    /// Desugared enum variants: enum name -> variant name -> field types,
    /// plus the variant's synthesized subclass.
    pub enum_variants: HashMap<String, HashMap<String, (Vec<Type>, Rc<ClassType>)>>,
    /// Extension classes declared anywhere in global scope (rule 16 of
    /// assignability: primitives/arrays satisfying an interface through
    /// an extension class), indexed by the type they extend's printed
    /// name so the checker can look them up without a full type scan.
    pub extensions_by_target: HashMap<String, Vec<Rc<ClassType>>>,
}

pub struct CheckResult {
    pub ctx: CheckerContext,
    pub program_types: ProgramTypes,
}

/// `assignable` plus rule 16 of the assignability cascade: an interface
/// target may also be satisfied by an extension class declared anywhere
/// in global scope whose `onType` is (or itself further assigns to)
/// `source`. `assign::assignable` has no registry to consult for this,
/// so the lookup happens here and retries the cascade against each
/// candidate extension class.
pub(crate) fn assignable(types: &ProgramTypes, source: &Type, target: &Type) -> bool {
    if crate::assign::assignable(source, target) {
        return true;
    }
    if matches!(target, Type::Interface(_)) {
        // A literal's extensions (if any) are registered under its
        // widened base type's printed name, not the literal itself.
        let widened = match source {
            Type::Literal(lit) => crate::assign::literal_base(lit),
            other => other.clone(),
        };
        if let Some(candidates) = types.extensions_by_target.get(&print_type(&widened)) {
            return candidates
                .iter()
                .any(|ext| crate::assign::assignable(&Type::Class(ext.clone()), target));
        }
    }
    false
}

/// Runs the full two-pass checker over one parsed module: declarations
/// are registered as skeletons first (so method bodies can reference
/// sibling declarations regardless of source order), then every body is
/// type-checked against the now-complete program.
pub fn check_program(program: &Program, file: &str, span_map: SpanMap) -> CheckResult {
    let mut ctx = CheckerContext::new(file, span_map);
    declarations::register_well_known_types(&mut ctx);

    let mut program_types = ProgramTypes::default();
    declarations::register_skeletons(&mut ctx, program, &mut program_types);
    declarations::check_bodies(&mut ctx, program, &mut program_types);

    CheckResult { ctx, program_types }
}
