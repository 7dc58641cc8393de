use std::path::PathBuf;

fn bin_path() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_pixelport")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "pixelport.exe"
            } else {
                "pixelport"
            });
            p
        })
}

#[test]
fn cli_simulate_writes_png() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();

    let script_path = dir.join("session.json");
    let out_path = dir.join("frame.png");
    let _ = std::fs::remove_file(&out_path);

    // A short session: stream in one pixel, zoom onto it, place another.
    let script = serde_json::json!([
        { "event": "tick", "now": 0.0 },
        { "event": "server", "now": 0.1, "message": {
            "type": "region_data", "region_x": 8, "region_y": 8,
            "pixels": { "0,0": { "color": "#FF3366", "timestamp": 1.0, "user_id": "ada" } }
        }},
        { "event": "zoom", "sx": 32.0, "sy": 32.0, "factor": 8.0, "now": 0.5 },
        { "event": "click", "sx": 32.0, "sy": 32.0, "color": "#00CC88", "now": 1.0 },
        { "event": "tick", "now": 1.5 }
    ]);
    let f = std::fs::File::create(&script_path).unwrap();
    serde_json::to_writer_pretty(f, &script).unwrap();

    let script_arg = script_path.to_string_lossy().to_string();
    let out_arg = out_path.to_string_lossy().to_string();

    let status = std::process::Command::new(bin_path())
        .args([
            "simulate",
            "--script",
            script_arg.as_str(),
            "--out",
            out_arg.as_str(),
            "--width",
            "64",
            "--height",
            "64",
        ])
        .status()
        .unwrap();

    assert!(status.success());
    assert!(out_path.exists());
}

#[test]
fn cli_grid_prints_the_layout() {
    let output = std::process::Command::new(bin_path())
        .arg("grid")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("regions 16x16"), "got: {stdout}");
}
