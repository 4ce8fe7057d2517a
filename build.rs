fn main() {
    println!("cargo::rerun-if-changed=src/backend/adios2/shim.h");
    println!("cargo::rerun-if-changed=src/backend/adios2/shim.cpp");

    if std::env::var("CARGO_FEATURE_BACKEND_ADIOS2").is_err() {
        return;
    }

    let adios2 = pkg_config::Config::new()
        .atleast_version("2.8.0")
        .probe("adios2")
        .map_err(|e| eprintln!("{e}"))
        .expect("backend-adios2 requires ADIOS2 >= 2.8.0 discoverable via pkg-config");

    let mut build = cxx_build::bridge("src/backend/adios2/sys.rs");
    build
        .file("src/backend/adios2/shim.cpp")
        .include(".")
        .std("c++17");
    for path in &adios2.include_paths {
        build.include(path);
    }
    build.compile("openpmd-io-core-adios2-shim");

    for path in &adios2.link_paths {
        println!("cargo::rustc-link-search=native={}", path.display());
    }
    for lib in &adios2.libs {
        println!("cargo::rustc-link-lib={lib}");
    }
}
