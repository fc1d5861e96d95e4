fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile the matchmaking frontend definitions (client for the engine,
    // server for the in-process round trip tests)
    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(&["proto/frontend.proto"], &["proto/"])?;

    // Tell cargo to rerun if proto files change
    println!("cargo:rerun-if-changed=proto/frontend.proto");

    Ok(())
}
