//! Build script for generating Rust code from protobuf definitions.

use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tell Cargo to rerun if proto files change
    println!("cargo:rerun-if-changed=proto/");

    // Prefer a protoc from the environment, fall back to the vendored binary
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_server(true)
        // Client code is used by the transport tests
        .build_client(true)
        .build_transport(false)
        .file_descriptor_set_path(out_dir.join("tbapi_descriptor.bin"))
        .compile_protos(&["proto/tbapi/v1/tbapi.proto"], &["proto/"])?;

    Ok(())
}
