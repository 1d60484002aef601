//! Compilador de plantillas stencil.
//!
//! # Front end
//! Cada plantilla deriva de un único archivo de código fuente, más las
//! importaciones (`_imports.stencil`) de sus directorios ancestros.
//! El texto se divide en marcado y transiciones `@` por medio de
//! análisis sintáctico en [`parse`], el cual delega en [`lex`] el
//! escaneo de fragmentos de código Rust incrustados. Las directivas
//! reconocidas se describen en [`directive`]. El árbol sintáctico se
//! somete a una secuencia de pases en [`pass`], de lo cual se obtiene
//! una representación intermedia descrita en [`ir`], con lo cual
//! concluyen las fases delanteras del compilador.
//!
//! # Back end
//! El cuerpo de la plantilla se reduce a sentencias de escritura en
//! [`lower`]. Los constructores del tipo base se reenvían en
//! [`forward`], y finalmente [`codegen`] emite una unidad de código Rust
//! que enlaza contra `stencil-runtime`. [`compile`] orquesta todo lo
//! anterior con aislamiento por archivo y una caché de resultados.
//!
//! Ningún error de plantilla detiene al compilador; ver [`error`].

#[macro_use]
mod macros;

pub mod codegen;
pub mod compile;
pub mod directive;
pub mod error;
pub mod forward;
pub mod ir;
pub mod lex;
pub mod lower;
pub mod options;
pub mod parse;
pub mod pass;
pub mod source;

pub use compile::{CompileOutput, CompiledUnit, Compiler};
pub use options::{Accessibility, Edition, GlobalOptions, InputFile, TemplateSource};
