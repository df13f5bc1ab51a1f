use clap::Parser;
use sf_query_profiler::services::record_source::validate_query_id;
use sf_query_profiler::services::{
    FileRecordSource, HtmlExporter, RecordSource, SnowflakeRecordSource, render_rows,
};
use sf_query_profiler::utils::init_logging;
use sf_query_profiler::{AppError, Cli, Config};
use std::io::Write;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err.downcast_ref::<AppError>().map(AppError::exit_code).unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (mut config, load_report) = Config::load(cli.config.as_deref())
        .map_err(|e| AppError::config(format!("{:#}", e)))?;
    cli.apply_to(&mut config);
    let _log_guard = init_logging(&config.logging)?;
    load_report.log();

    let source: Box<dyn RecordSource> = match &cli.input {
        Some(path) => Box::new(FileRecordSource::new(path)),
        None => {
            validate_query_id(&cli.query_id)?;
            Box::new(SnowflakeRecordSource::from_config(&config.snowflake)?)
        },
    };

    tracing::info!("Loading operator stats for {} from {}", cli.query_id, source.describe());
    let rows = source.fetch_rows(cli.query_id.trim()).await?;
    let rendered = render_rows(&rows, config.render, &config.style).map_err(AppError::from)?;

    if config.output.print_dot {
        tracing::info!("Generated DOT digraph:");
        print_dot(&mut std::io::stdout().lock(), &rendered.dot).map_err(AppError::from)?;
    }

    if let Some(path) = cli.dot_path(&config) {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(AppError::from)?;
        }
        std::fs::write(&path, &rendered.dot).map_err(AppError::from)?;
        tracing::info!("Wrote {}", path.display());
    }

    let html_path = cli.html_path(&config);
    HtmlExporter::new()?.write(&html_path, &cli.query_id, &rendered.dot)?;

    Ok(())
}

/// Stdout carries the DOT text and nothing else, so it can be redirected to a file
fn print_dot(out: &mut impl Write, dot: &str) -> std::io::Result<()> {
    out.write_all(dot.as_bytes())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdout_holds_only_the_digraph() {
        let dot = "digraph G {\n  n0 [ label=\"Result\" ]\n}\n";
        let mut out = Vec::new();
        print_dot(&mut out, dot).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), dot);
    }
}
