use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const BINARIES: &[&str] = &["protoforge-server", "protoforge-mcp"];

type TaskResult = Result<(), String>;

fn main() {
    let task = env::args().nth(1).unwrap_or_default();

    let result = match task.as_str() {
        "dist" => dist(),
        _ => {
            eprintln!("Usage: cargo run -p xtask -- dist");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("xtask {task}: {e}");
        std::process::exit(1);
    }
}

/// Build release binaries and copy them to `dist/` as `<name>-<triple>`.
fn dist() -> TaskResult {
    let triple = target_triple()?;
    let root = workspace_root()?;
    let out_dir = root.join("dist");
    std::fs::create_dir_all(&out_dir).map_err(|e| format!("creating {}: {e}", out_dir.display()))?;

    let mut args = vec!["build", "--release"];
    for bin in BINARIES {
        args.extend(["-p", *bin]);
    }
    println!("Building {} for {triple}...", BINARIES.join(", "));
    let status = Command::new("cargo")
        .args(&args)
        .current_dir(&root)
        .status()
        .map_err(|e| format!("running cargo build: {e}"))?;
    if !status.success() {
        return Err(format!("cargo build exited with {status}"));
    }

    for bin in BINARIES {
        let dst = copy_binary(&root, &out_dir, bin, &triple)?;
        println!("  {}", dst.display());
    }
    Ok(())
}

fn copy_binary(root: &Path, out_dir: &Path, bin: &str, triple: &str) -> Result<PathBuf, String> {
    let ext = if cfg!(windows) { ".exe" } else { "" };
    let src = root.join("target").join("release").join(format!("{bin}{ext}"));
    let dst = out_dir.join(dist_name(bin, triple, ext));
    std::fs::copy(&src, &dst)
        .map_err(|e| format!("copying {} -> {}: {e}", src.display(), dst.display()))?;
    Ok(dst)
}

fn dist_name(bin: &str, triple: &str, ext: &str) -> String {
    format!("{bin}-{triple}{ext}")
}

fn target_triple() -> Result<String, String> {
    // `rustc --print host-tuple` is stable since 1.84
    if let Ok(out) = Command::new("rustc").args(["--print", "host-tuple"]).output() {
        let triple = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if out.status.success() && !triple.is_empty() {
            return Ok(triple);
        }
    }

    let out = Command::new("rustc")
        .arg("-vV")
        .output()
        .map_err(|e| format!("running rustc: {e}"))?;
    host_from_verbose(&String::from_utf8_lossy(&out.stdout))
        .ok_or_else(|| "could not determine host triple from rustc -vV".to_string())
}

fn host_from_verbose(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.strip_prefix("host: "))
        .map(str::to_string)
}

fn workspace_root() -> Result<PathBuf, String> {
    let mut dir = env::current_dir().map_err(|e| format!("no current dir: {e}"))?;
    loop {
        let is_workspace = std::fs::read_to_string(dir.join("Cargo.toml"))
            .is_ok_and(|contents| contents.contains("[workspace]"));
        if is_workspace {
            return Ok(dir);
        }
        if !dir.pop() {
            return Err("could not find workspace root".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_line_is_found() {
        let verbose = "rustc 1.84.0 (9fc6b4312 2025-01-07)\nbinary: rustc\nhost: x86_64-unknown-linux-gnu\nrelease: 1.84.0\n";
        assert_eq!(host_from_verbose(verbose).as_deref(), Some("x86_64-unknown-linux-gnu"));
        assert_eq!(host_from_verbose("binary: rustc\n"), None);
    }

    #[test]
    fn dist_names_carry_the_triple() {
        assert_eq!(
            dist_name("protoforge-mcp", "aarch64-apple-darwin", ""),
            "protoforge-mcp-aarch64-apple-darwin"
        );
        assert_eq!(
            dist_name("protoforge-server", "x86_64-pc-windows-msvc", ".exe"),
            "protoforge-server-x86_64-pc-windows-msvc.exe"
        );
    }
}
