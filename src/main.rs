use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "llm-image-translator-rust",
    version,
    about = "Detect, translate and re-typeset text in images using OCR and LLMs"
)]
struct Cli {
    /// Image file to analyze (prints the analysis JSON)
    #[arg(short = 'd', long = "data")]
    data: Option<String>,

    /// Write the occlusion mask PNG to this path
    #[arg(long = "mask-out")]
    mask_out: Option<String>,

    /// Write a composited preview (PNG or JPEG by extension; a directory gets {stem}-translated.png)
    #[arg(long = "export-out")]
    export_out: Option<String>,

    /// Mask padding in pixels (overrides settings [mask].padding)
    #[arg(long = "padding")]
    padding: Option<f32>,

    /// Draw black text areas on white instead of white on black
    #[arg(long = "invert-mask")]
    invert_mask: bool,

    /// Model name or provider:model (e.g. gemini:gemini-2.5-flash)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Run the HTTP server on this address (e.g. 127.0.0.1:8787)
    #[arg(long = "server", num_args = 0..=1, default_missing_value = "")]
    server: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    llm_image_translator_rust::logging::init(cli.verbose)?;

    if let Some(addr) = cli.server {
        return llm_image_translator_rust::serve(cli.read_settings, Some(addr)).await;
    }

    let output = llm_image_translator_rust::run(llm_image_translator_rust::Config {
        data: cli.data,
        mask_out: cli.mask_out,
        export_out: cli.export_out,
        padding: cli.padding,
        invert_mask: cli.invert_mask,
        model: cli.model,
        key: cli.key,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
