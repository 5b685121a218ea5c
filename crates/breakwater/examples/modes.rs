//! Preset Mode Example
//!
//! Selects a server preset via `--mode=basic|secure|dev` and serves a small
//! status endpoint with it. An unknown mode exits nonzero.
//!
//! # Running This Example
//!
//! ```bash
//! cargo run --example modes -p breakwater -- --mode=secure
//! ```

use asupersync::runtime::RuntimeBuilder;
use breakwater::prelude::*;

fn config_for_mode(mode: &str) -> Option<ServerConfig> {
    match mode {
        "basic" => Some(ServerConfig::basic()),
        "secure" => Some(ServerConfig::secure()),
        "dev" => Some(ServerConfig::dev()),
        _ => None,
    }
}

fn main() {
    let mode = std::env::args()
        .find_map(|arg| arg.strip_prefix("--mode=").map(str::to_string))
        .unwrap_or_else(|| "basic".to_string());

    let Some(config) = config_for_mode(&mode) else {
        eprintln!("unknown mode `{mode}`; expected basic, secure, or dev");
        std::process::exit(2);
    };

    println!(
        "mode={mode} max_connections={} header_timeout_ms={}",
        config.max_connections, config.header_timeout_ms
    );

    let mut server = create_server_with_config(config).expect("presets validate");
    server
        .get("/status", move |ctx: &mut Context| {
            ctx.json(format!("{{\"mode\":\"{mode}\"}}"));
            Ok(())
        })
        .expect("room for the status route");

    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("runtime must build");
    rt.block_on(async {
        let cx = asupersync::Cx::for_testing();
        if let Err(e) = server.listen(&cx).await {
            eprintln!("server stopped: {e}");
        }
    });
}
