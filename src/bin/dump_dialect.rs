//! Compile a dialect file and print its derived wire layouts.

use anyhow::Context;
use std::env;
use std::fs;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "dialects/testlink.dialect".to_string());
    let source = fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let dialect =
        mavwire::compile_source(&source).with_context(|| format!("compiling {}", path))?;

    print!("{}", mavwire::dump_layouts(&dialect));
    Ok(())
}
