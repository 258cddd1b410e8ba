//! Generates the OpenAPI specification and writes it to a file.
//!
//! Used by the mobile client build to regenerate its typed API layer:
//!
//! ```bash
//! cargo run --package pillbot-server --bin gen-openapi -- openapi.json
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use pillbot_server::api::get_openapi_json;

fn main() -> anyhow::Result<()> {
    let output = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("openapi.json"), PathBuf::from);

    let spec = get_openapi_json();
    std::fs::write(&output, spec)?;

    println!("OpenAPI specification written to {}", output.display());
    Ok(())
}
