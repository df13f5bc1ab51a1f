// sf-query-profiler - Build Task Runner
// cargo xtask <command>

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use xshell::{cmd, Shell};

const BINARY: &str = "sf-query-profiler";
const PACKAGE_DIRS: &[&str] = &["bin", "conf", "output", "logs"];

fn main() -> Result<()> {
    let sh = Shell::new()?;
    let args: Vec<_> = std::env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        Some("build") => {
            let release = args.iter().any(|a| a == "--release");
            build(&sh, release)
        }
        Some("test") => test(&sh),
        Some("format") => {
            let check = args.iter().any(|a| a == "--check");
            format(&sh, check)
        }
        Some("clippy") => clippy(&sh),
        Some("run") => run(&sh, &args[1..]),
        Some("clean") => clean(&sh),
        Some("coverage") => coverage(&sh),
        Some("ci") => ci(&sh),
        Some("dist") => dist(&sh),
        Some("install") => match args.get(1) {
            Some(destination) => install(&sh, destination),
            None => {
                eprintln!("Error: install requires a destination path");
                eprintln!("Usage: cargo xtask install <destination>");
                std::process::exit(1);
            }
        },
        _ => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("sf-query-profiler - Build Commands:");
    println!();
    println!("Usage: cargo xtask <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  build [--release]   Build the profiler");
    println!("  test                Run all tests");
    println!("  format [--check]    Format code (check mode doesn't modify)");
    println!("  clippy              Run clippy checks");
    println!("  run [ARGS...]       Build and run the profiler with ARGS");
    println!("  clean               Clean build artifacts");
    println!("  coverage            Generate test coverage report");
    println!("  ci                  Run all CI checks (format + clippy + build + test)");
    println!("  dist                Create distribution package (tar.gz)");
    println!("  install <path>      Build and install the binary to <path>");
    println!();
    println!("Examples:");
    println!("  cargo xtask build --release");
    println!("  cargo xtask run -- 01b0f3c2-0604-8c3a-0000-0005d1e2a3f1 --input stats.json");
    println!("  cargo xtask format --check");
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building {}{}...", BINARY, if release { " (release)" } else { "" });
    let _dir = sh.push_dir(project_root());

    if release {
        cmd!(sh, "cargo build --release -p {BINARY}")
            .run()
            .context("Failed to build in release mode")?;
        create_distribution(sh)?;
    } else {
        cmd!(sh, "cargo build -p {BINARY}").run().context("Failed to build")?;
    }

    println!("✅ Build complete");
    Ok(())
}

/// Lay out build/dist with the binary and a default config
fn create_distribution(sh: &Shell) -> Result<()> {
    let project = project_root();
    let dist_dir = project.join("build/dist");

    for dir in PACKAGE_DIRS {
        sh.create_dir(dist_dir.join(dir))?;
    }

    let binary_src = project.join("target/release").join(BINARY);
    sh.copy_file(&binary_src, dist_dir.join("bin"))
        .with_context(|| format!("Failed to copy {}", binary_src.display()))?;

    let config_src = project.join("profiler/conf/profiler.toml");
    sh.copy_file(&config_src, dist_dir.join("conf"))
        .context("Failed to copy default config")?;

    Ok(())
}

fn test(sh: &Shell) -> Result<()> {
    println!("🧪 Running tests...");
    let _dir = sh.push_dir(project_root());

    cmd!(sh, "cargo test --workspace").run().context("Tests failed")?;

    println!("✅ All tests passed!");
    Ok(())
}

fn format(sh: &Shell, check: bool) -> Result<()> {
    println!("🎨 Formatting Rust code...");
    let _dir = sh.push_dir(project_root());

    if check {
        cmd!(sh, "cargo fmt --all -- --check")
            .run()
            .context("Rust code is not formatted")?;
        println!("✅ Rust code is properly formatted");
    } else {
        cmd!(sh, "cargo fmt --all").run().context("Failed to format Rust code")?;
        println!("✅ Rust code formatted");
    }

    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    let _dir = sh.push_dir(project_root());

    cmd!(sh, "cargo clippy --workspace --all-targets -- --deny warnings --allow clippy::uninlined-format-args")
        .run()
        .context("Clippy checks failed")?;

    Ok(())
}

fn run(sh: &Shell, args: &[String]) -> Result<()> {
    let _dir = sh.push_dir(project_root());
    let args = args.iter().skip_while(|a| *a == "--");

    cmd!(sh, "cargo run -p {BINARY} --")
        .args(args)
        .run()
        .context("Failed to run profiler")?;

    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("🧹 Cleaning build artifacts...");
    let project = project_root();
    let _dir = sh.push_dir(&project);

    cmd!(sh, "cargo clean").run()?;

    for dir in ["build", "profiler/output"] {
        let path = project.join(dir);
        if path.exists() {
            sh.remove_path(&path)?;
        }
    }

    println!("✅ Clean complete!");
    Ok(())
}

fn ci(sh: &Shell) -> Result<()> {
    println!("🔄 Running CI pipeline...");
    println!();

    println!("📝 [1/4] Checking code format...");
    format(sh, true)?;
    println!();

    println!("🔍 [2/4] Running clippy checks...");
    clippy(sh)?;
    println!();

    println!("🔨 [3/4] Building project...");
    build(sh, true)?;
    println!();

    println!("🧪 [4/4] Running tests...");
    test(sh)?;
    println!();

    println!("🎉 CI pipeline completed successfully!");
    Ok(())
}

fn dist(sh: &Shell) -> Result<()> {
    println!("📦 Creating distribution package...");
    build(sh, true)?;

    let dist_dir = project_root().join("build/dist");
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let package_name = format!("{}-{}.tar.gz", BINARY, timestamp);
    let package_path = dist_dir.join(&package_name);

    println!("📋 Creating tarball: {}...", package_name);
    let _dir = sh.push_dir(&dist_dir);
    cmd!(sh, "tar czf {package_name} {PACKAGE_DIRS...}")
        .run()
        .context("Failed to create tarball")?;

    println!();
    println!("✅ Distribution package created!");
    println!("   Location: {}", package_path.display());
    println!("   Size: {} KB", std::fs::metadata(&package_path)?.len() / 1024);

    Ok(())
}

fn install(sh: &Shell, destination: &str) -> Result<()> {
    println!("📦 Installing {} to {}...", BINARY, destination);
    build(sh, true)?;

    let binary_src = project_root().join("target/release").join(BINARY);
    let dest_path = Path::new(destination);

    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create destination directory")?;
    }
    std::fs::copy(&binary_src, dest_path).context("Failed to copy binary")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(dest_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(dest_path, perms)?;
    }

    println!("✅ Installation complete!");
    Ok(())
}

fn coverage(sh: &Shell) -> Result<()> {
    println!("📊 Generating test coverage report...");
    let _dir = sh.push_dir(project_root());

    if cmd!(sh, "cargo tarpaulin --version").quiet().ignore_stdout().run().is_err() {
        println!("⚠️  cargo-tarpaulin not found. Installing...");
        cmd!(sh, "cargo install cargo-tarpaulin")
            .run()
            .context("Failed to install cargo-tarpaulin")?;
    }

    cmd!(sh, "cargo tarpaulin --workspace --out Html --out Xml --output-dir build/coverage")
        .run()
        .context("Failed to generate coverage report")?;

    println!("✅ Coverage report: build/coverage/index.html");
    Ok(())
}

fn project_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
}
