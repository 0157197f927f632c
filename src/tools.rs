// External tool resolver for the ffmpeg encoder.
//
// Resolution order:
// 1) Environment variable override (SENTRYCAM_FFMPEG_PATH)
// 2) Sidecar binary next to the executable
// 3) bin/ subdirectory next to the executable
// 4) PATH fallback

use std::env;
use std::path::PathBuf;

/// Get the directory containing the current executable
fn exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Resolve a bundled tool path.
fn resolve_tool(env_key: &str, default_name: &str) -> PathBuf {
    // 1) Check environment variable override
    if let Ok(v) = env::var(env_key) {
        let p = PathBuf::from(&v);
        if p.exists() {
            return p;
        }
    }

    // Add .exe on Windows
    let mut filename = default_name.to_string();
    if cfg!(windows) && !filename.to_lowercase().ends_with(".exe") {
        filename.push_str(".exe");
    }

    // 2) Check sidecar next to executable
    if let Some(dir) = exe_dir() {
        let candidate = dir.join(&filename);
        if candidate.exists() {
            return candidate;
        }

        // 3) Check bin/ subdirectory (common bundling pattern)
        let bin_candidate = dir.join("bin").join(&filename);
        if bin_candidate.exists() {
            return bin_candidate;
        }
    }

    // 4) Fall back to PATH
    PathBuf::from(filename)
}

/// Path to the ffmpeg binary used for clip and snapshot encoding.
pub fn ffmpeg_path() -> PathBuf {
    resolve_tool("SENTRYCAM_FFMPEG_PATH", "ffmpeg")
}
