//! `paserati`: a compiler and register-machine VM for a statically
//! typed subset of JavaScript.
//!
//! Pipeline: [`lexer`] -> [`parser`] -> [`checker`] -> [`desugar`] ->
//! [`compiler`] -> [`vm`], wired together by [`compile_source`] and
//! [`run_source`] below. Every stage takes a [`diagnostics::Config`]
//! instead of reaching into process-wide statics.

pub mod ast;
pub mod checker;
pub mod compiler;
pub mod desugar;
pub mod diagnostics;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod position;
pub mod printer;
pub mod types;
pub mod vm;

use log::info;

use ast::Ast;
use compiler::chunk::FunctionProto;
use diagnostics::{CompileError, Config, RuntimeError, SyntaxError, TypeError};
use vm::Value;

/// Every way the pipeline can fail, tagged by which stage raised it.
#[derive(Debug, Clone)]
pub enum PipelineError {
    Syntax(Vec<SyntaxError>),
    Type(Vec<TypeError>),
    Compile(Vec<CompileError>),
    Runtime(RuntimeError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Syntax(errors) => {
                for e in errors {
                    writeln!(f, "{e}")?;
                }
                Ok(())
            }
            PipelineError::Type(errors) => {
                for e in errors {
                    writeln!(f, "{e}")?;
                }
                Ok(())
            }
            PipelineError::Compile(errors) => {
                for e in errors {
                    writeln!(f, "{e}")?;
                }
                Ok(())
            }
            PipelineError::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Lex and parse `source`, returning the raw AST before type checking.
/// Used by the `disasm`/`build` CLI paths and by [`printer`]'s
/// round-trip tests, which only need a parsed tree.
pub fn parse_source(source: &str) -> Result<Ast, PipelineError> {
    let tokens = lexer::Lexer::new(source)
        .lex()
        .map_err(|e| PipelineError::Syntax(vec![e]))?;
    let (ast, errors) = parser::Parser::parse(tokens);
    if !errors.is_empty() {
        return Err(PipelineError::Syntax(errors));
    }
    Ok(ast)
}

/// Run the full front end (lex, parse, check, desugar) and compile the
/// result into a top-level script prototype, without executing it.
pub fn compile_source(source: &str, config: &Config) -> Result<FunctionProto, PipelineError> {
    let ast = parse_source(source)?;
    if config.debug_ast {
        info!("AST:\n{ast:#?}");
    }

    checker::check(&ast, config).map_err(PipelineError::Type)?;

    let ast = desugar::desugar(ast);

    let proto = compiler::compile(&ast, config).map_err(PipelineError::Compile)?;
    if config.debug_bytecode {
        info!("bytecode:\n{}", proto.chunk.disassemble("<script>"));
    }
    Ok(proto)
}

/// Compile and execute `source`, returning the top-level script's
/// final expression-statement value.
pub fn run_source(source: &str, config: &Config) -> Result<Value, PipelineError> {
    let proto = compile_source(source, config)?;
    vm::run(proto, config).map_err(PipelineError::Runtime)
}
