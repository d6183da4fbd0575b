use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use mdlmtlx::builder::IncrementalModuleBuilder;
use mdlmtlx::codegen::MdlLibraryGenerator;
use mdlmtlx::config::{Config, SearchPath};
use mdlmtlx::document::xml;
use mdlmtlx::host::HostGraph;
use mdlmtlx::modules::{artifact_root, ModuleResolver};
use mdlmtlx::postprocess::{convert_srgb_to_linear, export_dependent_files};
use mdlmtlx::translate::{translate_custom_root, translate_material, translate_subgraph, TranslateOptions};

/// MDL shading graph / MaterialX translator and MDL library generator
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// `;`-separated MaterialX search path, overrides the configuration
    #[arg(long, global = true)]
    search_path: Option<String>,

    /// MDL root directory, overrides `paths.mdl_output`
    #[arg(long, global = true)]
    mdl_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the shared proxy module
    Shared,
    /// Generate a single MDL module and print it
    Module {
        /// Module name, e.g. `stdlib` or `fruit/apple`
        name: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Regenerate every configured module whose sources changed
    Rebuild {
        /// Regenerate even when the recorded hash matches
        #[arg(long)]
        force: bool,
    },
    /// Translate a host graph snapshot into a MaterialX document
    Translate {
        /// Host graph JSON file
        graph: PathBuf,
        /// Name of the exported material or node
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = Mode::Material)]
        mode: Mode,
        /// Identifier of the root node for `custom-root`
        #[arg(long)]
        root: Option<String>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Insert explicit sRGB to linear conversions after image nodes
        #[arg(long)]
        srgb_to_linear: bool,
        /// Copy the module documents the result depends on next to the output
        #[arg(long, requires = "output")]
        with_dependencies: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Material,
    Subgraph,
    CustomRoot,
}

fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> mdlmtlx::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let mut patterns = BTreeMap::new();
    if let Some(dir) = path.parent() {
        patterns.insert("CONFIG_DIR".to_string(), dir.to_string_lossy().into_owned());
    }
    Config::load(path, &patterns)
}

fn write_or_print(output: Option<&Path>, text: &str) -> mdlmtlx::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| mdlmtlx::Error::io(parent, e))?;
            }
            std::fs::write(path, text).map_err(|e| mdlmtlx::Error::io(path, e))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn run(cli: Cli) -> mdlmtlx::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let search_path = match &cli.search_path {
        Some(joined) => SearchPath::parse(joined),
        None => config.search_path(),
    };
    let resolver = ModuleResolver::new(search_path);
    let mdl_root = cli.mdl_root.clone().unwrap_or_else(|| config.mdl_output());
    let builder = IncrementalModuleBuilder::new(&resolver, &config.generator, artifact_root(&mdl_root));

    match cli.command {
        Command::Shared => {
            let path = builder.write_shared_module()?;
            println!("{}", path.display());
        }
        Command::Module { name, output } => {
            let digest = resolver.content_hash(&name)?;
            let generated = MdlLibraryGenerator::new(&resolver, &config.generator).generate_module(&name)?;
            write_or_print(output.as_deref(), &generated.artifact(&digest))?;
        }
        Command::Rebuild { force } => {
            let outcomes = if force {
                builder.write_shared_module()?;
                config
                    .materialx
                    .std_modules
                    .iter()
                    .map(|module| builder.force_rebuild(module))
                    .collect::<mdlmtlx::Result<Vec<_>>>()?
            } else {
                builder.rebuild_modules(&config.materialx.std_modules)?
            };
            for outcome in &outcomes {
                let state = if outcome.was_rebuilt() { "rebuilt" } else { "up to date" };
                println!("{}: {} ({})", outcome.module(), outcome.artifact().display(), state);
            }
        }
        Command::Translate {
            graph,
            name,
            mode,
            root,
            output,
            srgb_to_linear,
            with_dependencies,
        } => {
            let host = HostGraph::load(&graph)?;
            let options = TranslateOptions {
                resource_root: config.resource_root(),
            };
            let mut doc = match mode {
                Mode::Material => translate_material(&host, &name, &resolver, &options)?,
                Mode::Subgraph => translate_subgraph(&host, &name, &resolver, &options)?,
                Mode::CustomRoot => {
                    let root = match root {
                        Some(root) => root,
                        None => host.root_node()?.identifier.clone(),
                    };
                    translate_custom_root(&host, &name, &root, &resolver, &options)?
                }
            };
            if srgb_to_linear {
                convert_srgb_to_linear(&mut doc, &resolver)?;
            }
            write_or_print(output.as_deref(), &xml::write_to_string(&doc))?;

            if let Some(target) = output.as_deref().filter(|_| with_dependencies) {
                let target_dir = target.parent().unwrap_or_else(|| Path::new("."));
                export_dependent_files(target_dir, &doc, &resolver, &BTreeSet::new())?;
            }
        }
    }
    Ok(())
}
