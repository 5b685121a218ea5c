//! Hello World Example - Minimal breakwater server
//!
//! Demonstrates the smallest possible setup: one GET route returning JSON,
//! served on localhost.
//!
//! # Running This Example
//!
//! ```bash
//! cargo run --example hello_world -p breakwater
//! curl -i http://127.0.0.1:8080/hello
//! ```

use asupersync::runtime::RuntimeBuilder;
use breakwater::prelude::*;

fn main() {
    let mut server = create_server("127.0.0.1", 8080).expect("default config is valid");

    server
        .get("/hello", |ctx: &mut Context| {
            ctx.json("{\"ok\":true}");
            Ok(())
        })
        .expect("room for one route");

    server
        .get("/greet/:name", |ctx: &mut Context| {
            let name = ctx.param("name").unwrap_or("world").to_string();
            ctx.text(format!("Hello, {name}!"));
            Ok(())
        })
        .expect("room for a second route");

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
