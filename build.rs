use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    // The binary resolves config.json and the template next to itself
    let target_dir = target_dir();
    copy_templates(&target_dir);
    copy_config(&target_dir);
}

/// `target/<profile>`, three levels above OUT_DIR.
fn target_dir() -> PathBuf {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    Path::new(&out_dir)
        .ancestors()
        .nth(3) // out -> hash -> build -> profile
        .expect("Could not find target directory")
        .to_path_buf()
}

/// Copies the template folder so the executable can find the marker image.
fn copy_templates(target_dir: &Path) {
    let template_src = Path::new("resources/template");
    let template_dst = target_dir.join("resources").join("template");

    if template_src.exists() {
        copy_dir_recursive(template_src, &template_dst);
        println!("cargo:rerun-if-changed=resources/template/");
    }
}

/// Recursively copies a directory and its contents.
fn copy_dir_recursive(src: &Path, dst: &Path) {
    let _ = fs::create_dir_all(dst);

    if let Ok(entries) = fs::read_dir(src) {
        for entry in entries.flatten() {
            let src_path = entry.path();
            let dst_path = dst.join(entry.file_name());

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path);
            } else {
                let _ = fs::copy(&src_path, &dst_path);
            }
        }
    }
}

/// Copies config.json next to the executable.
fn copy_config(target_dir: &Path) {
    let config_src = Path::new("config.json");
    if config_src.exists() {
        let _ = fs::copy(config_src, target_dir.join("config.json"));
        println!("cargo:rerun-if-changed=config.json");
    }
}
