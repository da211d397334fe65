use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Drop a remux config template next to the build output
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../h264_fmp4.template.toml");

    let template = r#"# h264-fmp4 remux configuration template
# Copy this file to 'h264_fmp4.toml' and adjust the values

# Nominal frame rate of the incoming stream
fps = 60

# Coded pictures per emitted fragment
frames_per_fragment = 60

# Movie/media timescale (ticks per second)
timescale = 3600
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
