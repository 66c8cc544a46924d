use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=MOCKCHAT_SQLCIPHER_KEY");

    // SQLCipher's bundled OpenSSL needs the Windows crypto API.
    if env::var_os("CARGO_FEATURE_SQLCIPHER_PERSISTENCE").is_none() {
        return;
    }
    if let Ok(target) = env::var("CARGO_CFG_TARGET_OS") {
        if target == "windows" {
            println!("cargo:rustc-link-lib=dylib=advapi32");
        }
    }
}
