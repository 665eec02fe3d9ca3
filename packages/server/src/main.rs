#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geovisor server binary.

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if std::env::args().any(|arg| arg == "--interactive") {
        geovisor_server::interactive::run().await
    } else {
        geovisor_server::run_server().await
    }
}
