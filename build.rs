fn main() -> Result<(), Box<dyn std::error::Error>> {
    // vendored protoc, so the build does not depend on a system protobuf install
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path().expect("vendored protoc available"));

    tonic_build::configure()
        .bytes(["."])
        .compile_protos(&["proto/discovery.proto", "proto/runtime_config.proto"], &["proto"])
        .unwrap_or_else(|e| panic!("protobuf compile error: {}", e));

    println!("cargo:rerun-if-changed=proto");
    Ok(())
}
