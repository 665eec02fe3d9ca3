//! Interactive mode for the server.
//!
//! Prompts the user for bind address, port, and the upload/static
//! directories before starting the server.

use dialoguer::{Confirm, Input};

/// Runs the server in interactive mode, prompting for configuration.
///
/// Asks the user for a bind address, port, upload directory, and static
/// directory, sets the corresponding environment variables (`BIND_ADDR`,
/// `PORT`, `UPLOAD_DIR`, `STATIC_DIR`), and delegates to
/// [`super::run_server`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Geovisor");
    println!();

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default("127.0.0.1".to_string())
        .interact_text()
        .unwrap_or_else(|_| "127.0.0.1".to_string());

    let port_str: String = Input::new()
        .with_prompt("Port")
        .default("8080".to_string())
        .interact_text()
        .unwrap_or_else(|_| "8080".to_string());

    let upload_dir: String = Input::new()
        .with_prompt("Upload directory")
        .default("uploads".to_string())
        .interact_text()
        .unwrap_or_else(|_| "uploads".to_string());

    let static_dir: String = Input::new()
        .with_prompt("Static (rendered maps) directory")
        .default("static".to_string())
        .interact_text()
        .unwrap_or_else(|_| "static".to_string());

    // SAFETY: We are single-threaded at this point (before server starts) and
    // these variables are only read once during server initialisation.
    unsafe {
        std::env::set_var("BIND_ADDR", &bind_addr);
        std::env::set_var("PORT", &port_str);
        std::env::set_var("UPLOAD_DIR", &upload_dir);
        std::env::set_var("STATIC_DIR", &static_dir);
    }

    if !Confirm::new()
        .with_prompt(format!(
            "Start server on {bind_addr}:{port_str} (uploads in {upload_dir}, maps in {static_dir})?"
        ))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server().await
}
