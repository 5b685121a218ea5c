//! JSON Echo Example
//!
//! Accepts a POST body and echoes it back, demonstrating body handling,
//! status overrides, cookies, and a logging pipeline step.
//!
//! # Running This Example
//!
//! ```bash
//! cargo run --example json_echo -p breakwater
//! curl -i -d '{"hello":"world"}' http://127.0.0.1:8080/echo
//! ```

use asupersync::runtime::RuntimeBuilder;
use breakwater::prelude::*;
use breakwater::core::{ControlFlow, Cookie};

/// Tags every request with a state entry before the handler runs.
struct RequestTagger;

impl Middleware for RequestTagger {
    fn before(&self, ctx: &mut Context) -> Result<ControlFlow, HttpError> {
        ctx.set_state("tagged", "yes");
        Ok(ControlFlow::Continue)
    }
}

fn main() {
    let config = ServerConfig::default()
        .with_max_body_size(64 * 1024)
        .with_log_level(LogLevel::Debug);
    let mut server = create_server_with_config(config).expect("config is valid");

    server.middleware(RequestTagger).expect("room for one step");

    server
        .post("/echo", |ctx: &mut Context| {
            let body = ctx.request().body().unwrap_or(b"{}").to_vec();
            ctx.response_mut()
                .set_cookie(Cookie::new("seen", "1").path("/").http_only(true));
            ctx.json(body);
            Ok(())
        })
        .expect("room for the echo route");

    server
        .get("/fail", |_ctx: &mut Context| {
            Err(HttpError::internal().with_detail("deliberate failure"))
        })
        .expect("room for the failure route");

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
