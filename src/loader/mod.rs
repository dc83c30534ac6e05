//! Single-file module loading: read a source file, parse it, and
//! record which names it imports and exports. Parsing only: no module
//! graph, no path resolution, no cross-module calls — just the
//! bookkeeping a caller needs to know what one file declares.

mod loaderror;

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::ast::{Ast, ExportDecl, StmtKind};
use crate::position::Position;

pub use loaderror::FileLoadError;

/// A parsed file plus the module-level facts about it: what it pulls
/// in from elsewhere and what it makes available to importers. Neither
/// list is resolved against the filesystem; `imports` is the raw
/// specifier strings as written (`./util`, `@std/io`, ...).
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub file_path: PathBuf,
    pub ast: Ast,
    pub imports: Vec<(String, Position)>,
    pub exports: Vec<String>,
}

/// Read and parse the file at `path`, returning its [`Module`]
/// metadata. Type checking, desugaring, and compilation are the
/// caller's job (see [`crate::compile_source`]); this only gets far
/// enough to answer "what does this file import and export".
pub fn load_module(path: impl AsRef<Path>) -> Result<Module, FileLoadError> {
    let path = path.as_ref();
    debug!("loading module for file '{}'", path.display());

    let source = fs::read_to_string(path).map_err(|e| FileLoadError {
        message: format!("could not read file '{}': {e}", path.display()),
        position: None,
    })?;

    let ast = crate::parse_source(&source).map_err(|e| FileLoadError {
        message: format!("failed to parse '{}': {e}", path.display()),
        position: None,
    })?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "<module>".to_string());

    Ok(Module {
        name,
        file_path: path.to_path_buf(),
        imports: extract_imports(&ast),
        exports: extract_exports(&ast),
        ast,
    })
}

/// Every module specifier an `import` declaration names at the top
/// level of `ast`, paired with its source position for error
/// reporting.
pub fn extract_imports(ast: &Ast) -> Vec<(String, Position)> {
    ast.statements()
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            StmtKind::Import(decl) => Some((decl.module.clone(), decl.pos)),
            _ => None,
        })
        .collect()
}

/// Every binding name an `export` declaration at the top level of
/// `ast` makes available to importers.
pub fn extract_exports(ast: &Ast) -> Vec<String> {
    let mut names = vec![];
    for stmt in ast.statements() {
        if let StmtKind::Export(export) = &stmt.kind {
            match export {
                ExportDecl::Declaration(inner) => collect_declared_names(inner, &mut names),
                ExportDecl::Default(_) => names.push("default".to_string()),
                ExportDecl::Named { specifiers, .. } => {
                    names.extend(specifiers.iter().map(|s| s.local.clone()));
                }
            }
        }
    }
    names
}

fn collect_declared_names(stmt: &crate::ast::Stmt, names: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::FunctionDecl(decl) => names.push(decl.name.clone()),
        StmtKind::ClassDecl(decl) => names.push(decl.name.clone()),
        StmtKind::TypeAliasDecl(decl) => names.push(decl.name.clone()),
        StmtKind::InterfaceDecl(decl) => names.push(decl.name.clone()),
        StmtKind::VarDecl { declarators, .. } => {
            for d in declarators {
                d.pattern.bound_names(names);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Ast {
        crate::parse_source(src).unwrap()
    }

    #[test]
    fn extracts_import_specifiers() {
        let ast = parse("import { foo } from \"./util\";\nimport bar from \"bar\";\n");
        let imports = extract_imports(&ast);
        let paths: Vec<&str> = imports.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["./util", "bar"]);
    }

    #[test]
    fn extracts_export_names() {
        let ast = parse("export function greet() {}\nexport class Widget {}\nexport const x = 1;\n");
        let exports = extract_exports(&ast);
        assert_eq!(exports, vec!["greet", "Widget", "x"]);
    }

    #[test]
    fn load_module_reports_missing_file() {
        let err = load_module("/nonexistent/path/does-not-exist.ts").unwrap_err();
        assert!(err.message.contains("could not read file"));
    }
}
