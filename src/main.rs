//! Punto de entrada ("driver").
//!
//! Este módulo descubre importaciones, invoca al compilador y escribe
//! las unidades generadas. Expone una CLI.

use anyhow::{self, Context};
use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use stencil::{
    options::{CodeUnit, ImportSource},
    Accessibility, Compiler, Edition, GlobalOptions, InputFile, TemplateSource,
};

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

/// Nombre de las plantillas de importación.
const IMPORTS: &str = "_imports.stencil";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parsing de CLI
    let args = cli().get_matches();

    let options = global_options(&args)?;
    let root = args
        .get_one::<PathBuf>("root")
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new("."));

    let root = fs::canonicalize(root)
        .with_context(|| format!("Failed to read root directory: {}", root.display()))?;

    let namespace = args.get_one::<String>("namespace");
    let accessibility = args
        .get_one::<String>("accessibility")
        .map(|accessibility| accessibility.parse::<Accessibility>())
        .transpose()?;

    let mut sources = Vec::new();
    for path in args.get_many::<PathBuf>("templates").into_iter().flatten() {
        if path.file_name().map_or(false, |name| name == IMPORTS) {
            log::info!("Skipping import template {}", path.display());
            continue;
        }

        let absolute = fs::canonicalize(path)
            .with_context(|| format!("Failed to read template: {}", path.display()))?;

        let text = fs::read_to_string(&absolute)
            .with_context(|| format!("Failed to read template: {}", path.display()))?;

        let mut file = InputFile::new(relative(&root, &absolute));
        if let Some(namespace) = namespace {
            file = file.with_root_namespace(namespace);
        }

        if let Some(accessibility) = accessibility {
            file = file.with_accessibility(accessibility);
        }

        let mut source = TemplateSource::new(file, text);
        source.imports = discover_imports(&root, &absolute)?;

        sources.push(source);
    }

    let mut compiler = Compiler::new(options);
    let output = compiler.compile(&sources);

    // Se escriben unidades aún en presencia de errores
    let destination = args.get_one::<String>("output").map_or("-", String::as_str);
    if destination == "-" {
        let mut stdout = io::stdout();
        for unit in &output.units {
            stdout
                .write_all(unit.text.as_bytes())
                .context("Failed to write to stdout")?;
        }

        stdout.flush().context("Failed to write to stdout")?;
    } else {
        let directory = Path::new(destination);
        fs::create_dir_all(directory)
            .with_context(|| format!("Failed to create directory: {}", directory.display()))?;

        for unit in &output.units {
            let path = directory.join(&unit.name);
            fs::write(&path, &unit.text)
                .with_context(|| format!("Failed to open for writing: {}", path.display()))?;

            log::info!("Wrote {}", path.display());
        }
    }

    eprint!("{}", output.diagnostics);
    if output.diagnostics.has_errors() {
        process::exit(1);
    }

    Ok(())
}

fn cli() -> Command {
    Command::new("stencil")
        .version(crate_version!())
        .about("Compiles stencil templates into Rust source")
        .arg(
            Arg::new("templates")
                .value_name("TEMPLATE")
                .num_args(1..)
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Template files to compile"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .required(true)
                .help("Output directory ('-' for stdout)"),
        )
        .arg(
            Arg::new("namespace")
                .short('n')
                .long("namespace")
                .value_name("NAMESPACE")
                .help("Root namespace, extended by each template's directories"),
        )
        .arg(
            Arg::new("accessibility")
                .short('a')
                .long("accessibility")
                .value_name("ACCESSIBILITY")
                .value_parser(["public", "internal"])
                .help("Accessibility of every compiled template"),
        )
        .arg(
            Arg::new("default-accessibility")
                .long("default-accessibility")
                .value_name("ACCESSIBILITY")
                .value_parser(["public", "internal"])
                .help("Accessibility of templates without their own"),
        )
        .arg(
            Arg::new("edition")
                .short('e')
                .long("edition")
                .value_name("EDITION")
                .default_value("2021")
                .value_parser(["2015", "2018", "2021"])
                .help("Edition of the crate that includes the generated code"),
        )
        .arg(
            Arg::new("base-unit")
                .short('b')
                .long("base-unit")
                .value_name("FILE")
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .help("Rust source declaring additional base templates"),
        )
        .arg(
            Arg::new("no-embedded-runtime")
                .long("no-embedded-runtime")
                .action(ArgAction::SetTrue)
                .help("Ignore the runtime's base templates when forwarding constructors"),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Project root, where the search for _imports.stencil stops"),
        )
}

fn global_options(args: &ArgMatches) -> anyhow::Result<GlobalOptions> {
    let edition = match args.get_one::<String>("edition") {
        Some(edition) => edition.parse::<Edition>()?,
        None => Edition::default(),
    };

    let default_accessibility = args
        .get_one::<String>("default-accessibility")
        .map(|accessibility| accessibility.parse::<Accessibility>())
        .transpose()?;

    let mut additional_units = Vec::new();
    for path in args.get_many::<PathBuf>("base-unit").into_iter().flatten() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read base unit: {}", path.display()))?;

        additional_units.push(CodeUnit {
            name: path.display().to_string(),
            text,
        });
    }

    Ok(GlobalOptions {
        edition,
        embed_runtime: !args.get_flag("no-embedded-runtime"),
        default_accessibility,
        additional_units,
    })
}

/// Busca `_imports.stencil` desde la raíz hasta el directorio de la
/// plantilla, de la importación más externa a la más interna.
fn discover_imports(root: &Path, template: &Path) -> anyhow::Result<Vec<ImportSource>> {
    let mut directories = Vec::new();
    for directory in template.ancestors().skip(1) {
        directories.push(directory);
        if directory == root || !directory.starts_with(root) {
            break;
        }
    }

    let mut imports = Vec::new();
    for directory in directories.into_iter().rev() {
        let path = directory.join(IMPORTS);
        if !path.is_file() {
            continue;
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read imports: {}", path.display()))?;

        log::debug!("{}: found {}", template.display(), path.display());
        imports.push(ImportSource {
            path: relative(root, &path),
            text,
        });
    }

    Ok(imports)
}

/// Ruta relativa a la raíz, o la ruta completa si está fuera de ella.
fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
