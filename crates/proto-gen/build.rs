// Build script to compile Protocol Buffer definitions

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("src/generated")?;

    // Compile the service definition with both server and client stubs
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/generated")
        .compile_protos(&["../../proto/todo.proto"], &["../../proto/"])?;

    // Tell Cargo to rerun if proto files change
    println!("cargo:rerun-if-changed=../../proto/todo.proto");

    Ok(())
}
