//! Render command

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use kube::core::DynamicObject;
use tracing::info;
use wsd_common::DEFAULT_NAMESPACE;

use crate::config::load_context;
use crate::Result;

/// Output encoding for rendered objects
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Multi-document YAML
    #[default]
    Yaml,
    /// A JSON array
    Json,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Installation config (YAML)
    #[arg(long, env = "WSD_CONFIG")]
    pub config: PathBuf,

    /// Component version manifest (YAML)
    #[arg(long, env = "WSD_VERSIONS")]
    pub versions: PathBuf,

    /// Namespace for the rendered resources
    #[arg(long, short = 'n', default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

pub fn run(args: RenderArgs) -> Result<()> {
    let ctx = load_context(&args.config, &args.versions, &args.namespace)?;
    let objects = wsd_workload::render(&ctx)?;
    info!(objects = objects.len(), format = ?args.output, "writing manifests");

    let rendered = format_objects(&objects, args.output)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Serialize objects in the requested format
pub fn format_objects(objects: &[DynamicObject], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => {
            let mut out = String::new();
            for object in objects {
                out.push_str("---\n");
                out.push_str(&serde_yaml::to_string(object)?);
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(objects)?;
            out.push('\n');
            Ok(out)
        }
    }
}
