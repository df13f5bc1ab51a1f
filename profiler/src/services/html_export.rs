//! Self-contained HTML viewer for a rendered plan
//!
//! The page template is compiled into the binary and draws the DOT text with
//! d3-graphviz in the browser.

use crate::services::plan_graph::format::escape_label;
use crate::utils::{AppError, AppResult};
use rust_embed::RustEmbed;
use std::path::Path;

const TEMPLATE_NAME: &str = "viewer.html";

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

pub struct HtmlExporter {
    template: String,
}

impl HtmlExporter {
    pub fn new() -> AppResult<Self> {
        let file = Assets::get(TEMPLATE_NAME)
            .ok_or_else(|| AppError::internal_error(format!("missing asset {}", TEMPLATE_NAME)))?;
        let template = String::from_utf8(file.data.into_owned()).map_err(|e| {
            AppError::internal_error(format!("asset {} is not UTF-8: {}", TEMPLATE_NAME, e))
        })?;
        Ok(Self { template })
    }

    /// Fill the template; the DOT text sits inside a `<textarea>` and is escaped
    pub fn render(&self, title: &str, dot: &str) -> String {
        self.template
            .replace("{{TITLE}}", &escape_label(title))
            .replace("{{DIGRAPH}}", &escape_label(dot))
    }

    pub fn write(&self, path: &Path, title: &str, dot: &str) -> AppResult<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }

        tracing::info!("Generating {} file...", path.display());
        std::fs::write(path, self.render(title, dot))?;
        Ok(())
    }
}
