//! Access lines straight to the terminal through a levelled logger.
//!
//! Run with:
//!   cargo run --example console
//!
//! Then `curl http://localhost:5000/` for an info line, or
//! `curl http://localhost:5000/xxx` for an error line.

use tsu_access_log::middleware::access_log::{AccessLog, Leveled, LeveledSink};
use tsu_access_log::{Request, Router, Server};

struct Console;

impl LeveledSink for Console {
    fn info(&self, message: &str) { println!("[INFO]  {message}") }
    fn warn(&self, message: &str) { println!("[WARN]  {message}") }
    fn error(&self, message: &str) { eprintln!("[ERROR] {message}") }
}

#[tokio::main]
async fn main() -> Result<(), tsu_access_log::Error> {
    let app = Router::new()
        .get("/", |_req: Request| async { "hello world" })
        .wrap(AccessLog::new(Leveled(Console)));

    Server::bind("127.0.0.1:5000").serve(app).await
}
